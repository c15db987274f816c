//! Common assertion helpers for test output validation
//!
//! Provides predicates for validating recipe-sync command output and
//! helpers for checking what a list view currently shows.

#![allow(dead_code)]

use predicates::prelude::*;
use recipe_sync::core::recipe::Recipe;

/// Creates a predicate that checks for the formatted error prefix
pub fn has_error(message: &str) -> impl Predicate<str> {
    predicates::str::contains("Error:").and(predicates::str::contains(message.to_string()))
}

/// Creates a predicate that checks for a numbered list row
pub fn has_row(index: usize, name: &str) -> impl Predicate<str> {
    predicates::str::contains(format!("[{index}] {name}"))
}

/// Creates a predicate that checks for the "more pages" hint
pub fn has_more_hint() -> impl Predicate<str> {
    predicates::str::contains("more available")
}

/// Ids of a materialized list, in display order.
pub fn ids(recipes: &[Recipe]) -> Vec<&str> {
    recipes.iter().map(|recipe| recipe.id.as_str()).collect()
}

/// Value of `key` on the recipe with `id` inside a materialized list.
pub fn field_of<'a>(recipes: &'a [Recipe], id: &str, key: &str) -> Option<&'a serde_json::Value> {
    recipes
        .iter()
        .find(|recipe| recipe.id.as_str() == id)
        .and_then(|recipe| recipe.field(key))
}
