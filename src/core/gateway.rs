//! Boundary to the remote recipe API.
//!
//! The sync layer treats the remote side as an abstract set of asynchronous,
//! fallible calls. Everything runs on one logical thread, so the futures do not
//! need to be `Send`.

use crate::core::error::Result;
use crate::core::filter::{Filter, PageToken};
use crate::core::recipe::{Recipe, RecipeId, RecipePatch};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One page of a filtered listing. `next_page_token == None` means exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    pub items: Vec<Recipe>,
    pub next_page_token: Option<PageToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Favorite,
}

impl RelationKind {
    /// Recipe field that mirrors the relation for the current actor.
    pub fn field(self) -> &'static str {
        match self {
            Self::Favorite => "is_favorited",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Favorite => f.write_str("favorite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    pub recipe_id: RecipeId,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

#[async_trait(?Send)]
pub trait RecipeGateway {
    async fn list(&self, filter: &Filter, page: Option<&PageToken>) -> Result<ListPage>;

    async fn get(&self, id: &RecipeId) -> Result<Recipe>;

    /// Returns the authoritative post-update recipe.
    async fn update(&self, id: &RecipeId, patch: &RecipePatch) -> Result<Recipe>;

    /// Flips a relation and returns its new state for `actor`.
    async fn toggle_relation(&self, id: &RecipeId, kind: RelationKind, actor: &str)
        -> Result<bool>;

    async fn create_review(&self, review: &NewReview) -> Result<()>;
}
