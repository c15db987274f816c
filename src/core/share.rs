//! Shareable recipe links.
//!
//! Links point at `{base}/recipes/{id}` with an optional `-{slug}` suffix so the
//! URL stays readable when pasted into a chat.

use crate::core::recipe::{Recipe, RecipeId};

/// Lower-cases `name` and replaces each whitespace run with a single `-`.
/// Leading and trailing runs become dashes too.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for ch in name.to_lowercase().chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                slug.push('-');
            }
            in_whitespace = true;
        } else {
            slug.push(ch);
            in_whitespace = false;
        }
    }
    slug
}

pub fn share_url(base: &str, id: &RecipeId, slug: &str) -> String {
    let base = base.trim_end_matches('/');
    if slug.is_empty() {
        format!("{base}/recipes/{id}")
    } else {
        format!("{base}/recipes/{id}-{slug}")
    }
}

impl Recipe {
    /// The recipe's own slug, or one derived from its name.
    pub fn share_slug(&self) -> String {
        match self.slug() {
            Some(slug) => slug.to_string(),
            None => self
                .field("name")
                .and_then(serde_json::Value::as_str)
                .map(slugify)
                .unwrap_or_default(),
        }
    }

    pub fn share_url(&self, base: &str) -> String {
        share_url(base, &self.id, &self.share_slug())
    }
}
