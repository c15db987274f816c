//! Gateway backed by a JSON document on disk.
//!
//! Stands in for the remote recipe API when running the CLI locally. The document
//! looks like `{"recipes": [...], "favorites": {...}, "reviews": [...]}`; only
//! `recipes` is required. Accepted writes are saved back to the same file.
//!
//! Page tokens are item offsets rendered as strings.
//!
//! Favorites are kept per actor in `favorites` and never written into the recipe
//! records. Recipes handed out carry `is_favorited` for the actor the gateway was
//! opened for.

use crate::core::error::{Result, SyncError};
use crate::core::filter::{Filter, PageToken};
use crate::core::gateway::{ListPage, NewReview, RecipeGateway, RelationKind};
use crate::core::recipe::{Recipe, RecipeId, RecipePatch};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecipeDocument {
    recipes: Vec<Recipe>,
    /// Actor identifier -> favorited recipe ids.
    #[serde(default)]
    favorites: BTreeMap<String, Vec<RecipeId>>,
    #[serde(default)]
    reviews: Vec<NewReview>,
}

pub struct JsonFileGateway {
    path: PathBuf,
    page_size: usize,
    actor: String,
    document: RefCell<RecipeDocument>,
}

impl JsonFileGateway {
    pub fn open(path: impl AsRef<Path>, page_size: usize, actor: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| SyncError::data_read_failed(&path, e))?;
        let document: RecipeDocument = serde_json::from_str(&content)
            .map_err(|e| SyncError::data_parse_failed(&path, e))?;

        log::debug!(
            "Loaded {} recipes from {}",
            document.recipes.len(),
            path.display()
        );
        Ok(Self {
            path,
            page_size: page_size.max(1),
            actor: actor.into(),
            document: RefCell::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// The recipe as the session actor sees it.
    fn view(&self, document: &RecipeDocument, recipe: &Recipe) -> Recipe {
        let favorited = document
            .favorites
            .get(&self.actor)
            .is_some_and(|favorites| favorites.contains(&recipe.id));
        let mut view = recipe.clone();
        view.fields
            .insert(RelationKind::Favorite.field().to_string(), Value::Bool(favorited));
        view
    }

    fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&*self.document.borrow())?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn matches(filter: &Filter, recipe: &Recipe) -> bool {
        let user_ok = filter
            .user_id
            .as_ref()
            .map_or(true, |user| recipe.user_id().as_deref() == Some(user.as_str()));
        let category_ok = filter
            .category
            .as_ref()
            .map_or(true, |category| recipe.category() == Some(category.as_str()));
        user_ok && category_ok
    }

    fn validate(patch: &RecipePatch) -> Result<()> {
        if let Some(name) = patch.get("name") {
            if name.as_str().map_or(true, |name| name.trim().is_empty()) {
                return Err(SyncError::validation("name must be a non-empty string"));
            }
        }
        if let Some(rating) = patch.get("rating") {
            if rating.as_f64().map_or(true, |rating| !(0.0..=5.0).contains(&rating)) {
                return Err(SyncError::validation("rating must be a number between 0 and 5"));
            }
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl RecipeGateway for JsonFileGateway {
    async fn list(&self, filter: &Filter, page: Option<&PageToken>) -> Result<ListPage> {
        let offset = match page {
            Some(token) => token
                .as_str()
                .parse::<usize>()
                .map_err(|_| SyncError::validation(format!("invalid page token '{token}'")))?,
            None => 0,
        };

        let document = self.document.borrow();
        let matching: Vec<&Recipe> = document
            .recipes
            .iter()
            .filter(|recipe| Self::matches(filter, recipe))
            .collect();
        let items: Vec<Recipe> = matching
            .iter()
            .skip(offset)
            .take(self.page_size)
            .map(|recipe| self.view(&document, recipe))
            .collect();
        let next = offset.saturating_add(self.page_size);
        let next_page_token = (next < matching.len()).then(|| PageToken::new(next.to_string()));

        Ok(ListPage {
            items,
            next_page_token,
        })
    }

    async fn get(&self, id: &RecipeId) -> Result<Recipe> {
        let document = self.document.borrow();
        document
            .recipes
            .iter()
            .find(|recipe| &recipe.id == id)
            .map(|recipe| self.view(&document, recipe))
            .ok_or_else(|| SyncError::not_found(id.as_str()))
    }

    async fn update(&self, id: &RecipeId, patch: &RecipePatch) -> Result<Recipe> {
        Self::validate(patch)?;

        let updated = {
            let mut document = self.document.borrow_mut();
            let index = document
                .recipes
                .iter()
                .position(|recipe| &recipe.id == id)
                .ok_or_else(|| SyncError::not_found(id.as_str()))?;
            let mut merged = document.recipes[index].merged(patch);
            merged.fields.remove(RelationKind::Favorite.field());
            merged.fields.insert(
                "updated_at".to_string(),
                Value::String(chrono::Utc::now().to_rfc3339()),
            );
            let view = self.view(&document, &merged);
            document.recipes[index] = merged;
            view
        };
        self.save()?;
        Ok(updated)
    }

    async fn toggle_relation(
        &self,
        id: &RecipeId,
        kind: RelationKind,
        actor: &str,
    ) -> Result<bool> {
        let favorited = {
            let mut document = self.document.borrow_mut();
            if !document.recipes.iter().any(|recipe| &recipe.id == id) {
                return Err(SyncError::not_found(id.as_str()));
            }

            let favorites = document.favorites.entry(actor.to_string()).or_default();
            match favorites.iter().position(|favorite| favorite == id) {
                Some(index) => {
                    favorites.remove(index);
                    false
                }
                None => {
                    favorites.push(id.clone());
                    true
                }
            }
        };
        log::debug!("{kind} on {id} for {actor} is now {favorited}");
        self.save()?;
        Ok(favorited)
    }

    async fn create_review(&self, review: &NewReview) -> Result<()> {
        if !(1..=5).contains(&review.rating) {
            return Err(SyncError::validation("rating must be between 1 and 5"));
        }

        {
            let mut document = self.document.borrow_mut();
            if !document.recipes.iter().any(|recipe| recipe.id == review.recipe_id) {
                return Err(SyncError::not_found(review.recipe_id.as_str()));
            }
            document.reviews.push(review.clone());

            let ratings: Vec<u32> = document
                .reviews
                .iter()
                .filter(|existing| existing.recipe_id == review.recipe_id)
                .map(|existing| u32::from(existing.rating))
                .collect();
            let average = f64::from(ratings.iter().sum::<u32>()) / ratings.len() as f64;

            if let Some(recipe) = document
                .recipes
                .iter_mut()
                .find(|recipe| recipe.id == review.recipe_id)
            {
                recipe.fields.insert("rating".to_string(), Value::from(average));
                recipe
                    .fields
                    .insert("rating_count".to_string(), Value::from(ratings.len()));
            }
        }
        self.save()
    }
}
