//! Collection filters and page tokens.
//!
//! A [`Filter`] names one logical paginated collection. Two filters are the same
//! collection exactly when they compare equal, so the type is a plain value key.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Filter {
    /// The unfiltered collection.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.user_id, &self.category) {
            (None, None) => f.write_str("{all}"),
            (Some(user), None) => write!(f, "{{user_id={user}}}"),
            (None, Some(category)) => write!(f, "{{category={category}}}"),
            (Some(user), Some(category)) => write!(f, "{{user_id={user}, category={category}}}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(String);

impl PageToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_structurally_equal_filters_are_one_collection() {
        let mut seen = HashSet::new();
        seen.insert(Filter::category("makanan"));
        seen.insert(Filter::all().with_category("makanan"));
        seen.insert(Filter::user("u1").with_category("makanan"));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_filter_display() {
        assert_eq!(Filter::all().to_string(), "{all}");
        assert_eq!(Filter::category("minuman").to_string(), "{category=minuman}");
        assert_eq!(
            Filter::user("7").with_category("makanan").to_string(),
            "{user_id=7, category=makanan}"
        );
    }
}
