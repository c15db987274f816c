//! Recipe entities and field patches.
//!
//! A [`Recipe`] is identified by its [`RecipeId`]; every other field is open and
//! collaborator-defined, so it lives in a JSON object map. The core reads only a
//! handful of fields through typed accessors.
//!
//! # Public API
//! - [`RecipeId`]: Opaque identifier, accepts JSON strings or numbers
//! - [`Recipe`]: Entity value held by the cache
//! - [`RecipePatch`]: Partial field set merged into a recipe

use crate::core::error::{Result, SyncError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecipeId(String);

impl RecipeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecipeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for RecipeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Number(number) => Self(number.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Recipe {
    pub fn new(id: impl Into<RecipeId>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter, mostly for fixtures.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Non-empty string value of `key`.
    fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.text("name").or_else(|| self.text("title"))
    }

    pub fn description(&self) -> Option<&str> {
        self.text("description").or_else(|| self.text("desc"))
    }

    pub fn category(&self) -> Option<&str> {
        self.text("category")
    }

    pub fn user_id(&self) -> Option<String> {
        match self.fields.get("user_id")? {
            Value::String(user) => Some(user.clone()),
            Value::Number(user) => Some(user.to_string()),
            _ => None,
        }
    }

    pub fn slug(&self) -> Option<&str> {
        self.text("slug")
    }

    /// Backends disagree on the field name and on the encoding (`true`, `1`,
    /// `"1"`), so either field counts when it is truthy.
    pub fn is_favorited(&self) -> bool {
        let flag = |key: &str| self.fields.get(key).is_some_and(truthy);
        flag("is_favorited") || flag("favorited")
    }

    /// Patch that sets the favorite flag to `value` in every field this recipe
    /// carries it in.
    pub fn favorite_patch(&self, value: bool) -> RecipePatch {
        let patch = RecipePatch::new().set("is_favorited", value);
        if self.fields.contains_key("favorited") {
            patch.set("favorited", value)
        } else {
            patch
        }
    }

    /// Returns a copy with every patch field written over this recipe's fields.
    pub fn merged(&self, patch: &RecipePatch) -> Self {
        let mut merged = self.clone();
        for (key, value) in patch.iter() {
            merged.fields.insert(key.clone(), value.clone());
        }
        merged
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Partial field set applied to a recipe. An `id` key is never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipePatch(Map<String, Value>);

impl RecipePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        if key != "id" {
            self.0.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter().filter(|(key, _)| key.as_str() != "id")
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Parses `key=value` assignments. Values that parse as JSON (numbers,
    /// booleans, quoted strings) keep their type; anything else is a string.
    pub fn from_assignments<S: AsRef<str>>(assignments: &[S]) -> Result<Self> {
        let mut patch = Self::new();
        for assignment in assignments {
            let assignment = assignment.as_ref();
            let (key, raw) = assignment
                .split_once('=')
                .ok_or_else(|| SyncError::invalid_patch(assignment))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(SyncError::invalid_patch(assignment));
            }
            let value = serde_json::from_str::<Value>(raw)
                .unwrap_or_else(|_| Value::String(raw.to_string()));
            patch = patch.set(key, value);
        }
        Ok(patch)
    }
}

impl From<Map<String, Value>> for RecipePatch {
    fn from(mut fields: Map<String, Value>) -> Self {
        fields.remove("id");
        Self(fields)
    }
}
