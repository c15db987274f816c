//! In-memory gateway with scripted failures
//!
//! Every call yields once to the executor before answering, so a test can run a
//! second future (with `tokio::join!`) while the first request is in flight.

#![allow(dead_code)]

use async_trait::async_trait;
use recipe_sync::core::{
    error::{Result, SyncError},
    filter::{Filter, PageToken},
    gateway::{ListPage, NewReview, RecipeGateway, RelationKind},
    recipe::{Recipe, RecipeId, RecipePatch},
};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub get: usize,
    pub update: usize,
    pub toggle: usize,
    pub review: usize,
}

pub struct ScriptedGateway {
    recipes: RefCell<Vec<Recipe>>,
    page_size: usize,
    calls: Cell<CallCounts>,
    list_failures: RefCell<VecDeque<SyncError>>,
    get_failures: RefCell<VecDeque<SyncError>>,
    update_failures: RefCell<VecDeque<SyncError>>,
    toggle_failures: RefCell<VecDeque<SyncError>>,
    favorites: RefCell<HashSet<(String, RecipeId)>>,
    forced_favorite: Cell<Option<bool>>,
    requested_tokens: RefCell<Vec<Option<PageToken>>>,
}

impl ScriptedGateway {
    pub fn new(recipes: Vec<Recipe>, page_size: usize) -> Self {
        Self {
            recipes: RefCell::new(recipes),
            page_size,
            calls: Cell::new(CallCounts::default()),
            list_failures: RefCell::new(VecDeque::new()),
            get_failures: RefCell::new(VecDeque::new()),
            update_failures: RefCell::new(VecDeque::new()),
            toggle_failures: RefCell::new(VecDeque::new()),
            favorites: RefCell::new(HashSet::new()),
            forced_favorite: Cell::new(None),
            requested_tokens: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> CallCounts {
        self.calls.get()
    }

    /// Tokens passed to `list`, in call order.
    pub fn requested_tokens(&self) -> Vec<Option<PageToken>> {
        self.requested_tokens.borrow().clone()
    }

    pub fn fail_next_list(&self, error: SyncError) {
        self.list_failures.borrow_mut().push_back(error);
    }

    pub fn fail_next_get(&self, error: SyncError) {
        self.get_failures.borrow_mut().push_back(error);
    }

    pub fn fail_next_update(&self, error: SyncError) {
        self.update_failures.borrow_mut().push_back(error);
    }

    pub fn fail_next_toggle(&self, error: SyncError) {
        self.toggle_failures.borrow_mut().push_back(error);
    }

    /// Makes `toggle_relation` answer `value` regardless of the stored state.
    pub fn force_favorite_answer(&self, value: bool) {
        self.forced_favorite.set(Some(value));
    }

    /// Changes the server-side copy without going through the client.
    pub fn edit_server_side(&self, id: &str, patch: &RecipePatch) {
        if let Some(recipe) = self
            .recipes
            .borrow_mut()
            .iter_mut()
            .find(|recipe| recipe.id.as_str() == id)
        {
            *recipe = recipe.merged(patch);
        }
    }

    pub fn delete_server_side(&self, id: &str) {
        self.recipes.borrow_mut().retain(|recipe| recipe.id.as_str() != id);
    }

    fn count(&self, bump: impl FnOnce(&mut CallCounts)) {
        let mut calls = self.calls.get();
        bump(&mut calls);
        self.calls.set(calls);
    }

    fn matches(filter: &Filter, recipe: &Recipe) -> bool {
        filter
            .category
            .as_deref()
            .map_or(true, |category| recipe.category() == Some(category))
            && filter
                .user_id
                .as_deref()
                .map_or(true, |user| recipe.user_id().as_deref() == Some(user))
    }
}

#[async_trait(?Send)]
impl RecipeGateway for ScriptedGateway {
    async fn list(&self, filter: &Filter, page: Option<&PageToken>) -> Result<ListPage> {
        self.count(|calls| calls.list += 1);
        self.requested_tokens.borrow_mut().push(page.cloned());
        tokio::task::yield_now().await;

        if let Some(error) = self.list_failures.borrow_mut().pop_front() {
            return Err(error);
        }

        let offset = page
            .map(|token| token.as_str().parse::<usize>())
            .transpose()
            .map_err(|_| SyncError::validation("bad page token"))?
            .unwrap_or(0);
        let matching: Vec<Recipe> = self
            .recipes
            .borrow()
            .iter()
            .filter(|recipe| Self::matches(filter, recipe))
            .cloned()
            .collect();
        let items: Vec<Recipe> = matching
            .iter()
            .skip(offset)
            .take(self.page_size)
            .cloned()
            .collect();
        let next = offset + self.page_size;

        Ok(ListPage {
            items,
            next_page_token: (next < matching.len()).then(|| PageToken::new(next.to_string())),
        })
    }

    async fn get(&self, id: &RecipeId) -> Result<Recipe> {
        self.count(|calls| calls.get += 1);
        tokio::task::yield_now().await;

        if let Some(error) = self.get_failures.borrow_mut().pop_front() {
            return Err(error);
        }
        self.recipes
            .borrow()
            .iter()
            .find(|recipe| &recipe.id == id)
            .cloned()
            .ok_or_else(|| SyncError::not_found(id.as_str()))
    }

    async fn update(&self, id: &RecipeId, patch: &RecipePatch) -> Result<Recipe> {
        self.count(|calls| calls.update += 1);
        tokio::task::yield_now().await;

        if let Some(error) = self.update_failures.borrow_mut().pop_front() {
            return Err(error);
        }
        let mut recipes = self.recipes.borrow_mut();
        let recipe = recipes
            .iter_mut()
            .find(|recipe| &recipe.id == id)
            .ok_or_else(|| SyncError::not_found(id.as_str()))?;
        let mut updated = recipe.merged(patch);
        updated
            .fields
            .insert("server_revision".to_string(), Value::from(self.calls().update));
        *recipe = updated.clone();
        Ok(updated)
    }

    async fn toggle_relation(
        &self,
        id: &RecipeId,
        kind: RelationKind,
        actor: &str,
    ) -> Result<bool> {
        self.count(|calls| calls.toggle += 1);
        tokio::task::yield_now().await;

        if let Some(error) = self.toggle_failures.borrow_mut().pop_front() {
            return Err(error);
        }
        if let Some(forced) = self.forced_favorite.get() {
            return Ok(forced);
        }

        let key = (actor.to_string(), id.clone());
        let mut favorites = self.favorites.borrow_mut();
        let favorited = if favorites.remove(&key) {
            false
        } else {
            favorites.insert(key);
            true
        };
        if let Some(recipe) = self
            .recipes
            .borrow_mut()
            .iter_mut()
            .find(|recipe| &recipe.id == id)
        {
            recipe
                .fields
                .insert(kind.field().to_string(), Value::Bool(favorited));
        }
        Ok(favorited)
    }

    async fn create_review(&self, review: &NewReview) -> Result<()> {
        self.count(|calls| calls.review += 1);
        tokio::task::yield_now().await;

        if !(1..=5).contains(&review.rating) {
            return Err(SyncError::validation("rating must be between 1 and 5"));
        }
        let mut recipes = self.recipes.borrow_mut();
        let recipe = recipes
            .iter_mut()
            .find(|recipe| recipe.id == review.recipe_id)
            .ok_or_else(|| SyncError::not_found(review.recipe_id.as_str()))?;
        let count = recipe
            .field("rating_count")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let average = recipe.field("rating").and_then(Value::as_f64).unwrap_or(0.0);
        let total = average * count as f64 + f64::from(review.rating);
        recipe
            .fields
            .insert("rating".to_string(), Value::from(total / (count + 1) as f64));
        recipe
            .fields
            .insert("rating_count".to_string(), Value::from(count + 1));
        Ok(())
    }
}
