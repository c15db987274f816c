//! The sync client: one explicitly constructed object that owns the entity cache,
//! the collection cursors and the gateway.
//!
//! Create it once at application start and share it by reference (or `Rc`) with
//! every consumer. Each client is fully isolated, so tests can build as many as
//! they like.
//!
//! # Public API
//! - [`SyncClient`]: Reads, collection paging, optimistic mutations
//!
//! # Suspension points
//! Only the gateway calls suspend. Every operation is split into a synchronous
//! start, the awaited gateway call, and a synchronous completion; the internal
//! `RefCell` is never borrowed across an `.await`. Optimistic writes finish before
//! the gateway call starts, so no reader sees a half-applied patch.
//!
//! # Pending patches
//! While a mutation is pending its patch is kept aside and merged into any server
//! data that lands for the same recipe (list pages, refetches, other commits), so
//! a fetch racing the mutation cannot hide the optimistic value.

use crate::core::cache::{CacheEntry, CacheEvent, EntityCache, Lookup, Subscription};
use crate::core::clock::{SharedClock, SystemClock};
use crate::core::config::SyncConfig;
use crate::core::cursor::{CursorHandle, CursorRegistry, CursorStatus, FetchOutcome};
use crate::core::error::{Result, SyncError};
use crate::core::filter::Filter;
use crate::core::gateway::{NewReview, RecipeGateway, RelationKind};
use crate::core::mutation::{self, Mutation};
use crate::core::recipe::{Recipe, RecipeId, RecipePatch};
use crate::core::trigger::VisibilityTrigger;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::rc::Rc;

pub struct SyncState {
    pub cache: EntityCache<RecipeId, Recipe>,
    pub cursors: CursorRegistry,
    next_mutation_id: u64,
    /// Patches of unsettled mutations, oldest first.
    pending: HashMap<RecipeId, Vec<(u64, RecipePatch)>>,
    toggles_in_flight: HashSet<RecipeId>,
}

impl SyncState {
    fn begin_mutation(&mut self, id: RecipeId, patch: RecipePatch) -> Mutation {
        self.next_mutation_id += 1;
        let mutation = mutation::apply_optimistic(
            self.next_mutation_id,
            id,
            patch,
            &mut self.cache,
            &mut self.cursors,
        );
        self.pending
            .entry(mutation.entity_id().clone())
            .or_default()
            .push((mutation.id(), mutation.patch().clone()));
        mutation
    }

    fn settle_pending(&mut self, mutation: &Mutation) {
        let id = mutation.entity_id();
        if let Some(patches) = self.pending.get_mut(id) {
            patches.retain(|(mutation_id, _)| *mutation_id != mutation.id());
            if patches.is_empty() {
                self.pending.remove(id);
            }
        }
    }

    fn overlay_pending(&self, recipe: Recipe) -> Recipe {
        match self.pending.get(&recipe.id) {
            Some(patches) => patches
                .iter()
                .fold(recipe, |recipe, (_, patch)| recipe.merged(patch)),
            None => recipe,
        }
    }
}

/// What [`SyncClient::collect_garbage`] dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Eviction {
    pub recipes: Vec<RecipeId>,
    pub collections: Vec<Filter>,
}

/// Clears the in-flight mark of a favorite toggle, even if the toggle future is
/// dropped mid-request.
struct ToggleGuard<'a> {
    state: &'a RefCell<SyncState>,
    id: RecipeId,
}

impl Drop for ToggleGuard<'_> {
    fn drop(&mut self) {
        self.state.borrow_mut().toggles_in_flight.remove(&self.id);
    }
}

pub struct SyncClient<G> {
    gateway: G,
    state: RefCell<SyncState>,
    trigger: VisibilityTrigger,
    config: SyncConfig,
}

impl<G: RecipeGateway> SyncClient<G> {
    pub fn new(gateway: G, config: SyncConfig) -> Self {
        Self::with_clock(gateway, config, Rc::new(SystemClock))
    }

    pub fn with_clock(gateway: G, config: SyncConfig, clock: SharedClock) -> Self {
        let state = SyncState {
            cache: EntityCache::new(clock.clone(), config.recipe_stale_after()),
            cursors: CursorRegistry::new(clock, config.list_stale_after()),
            next_mutation_id: 0,
            pending: HashMap::new(),
            toggles_in_flight: HashSet::new(),
        };
        Self {
            gateway,
            state: RefCell::new(state),
            trigger: VisibilityTrigger::new(config.prefetch_distance),
            config,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs `f` against the state, then delivers cache notifications once the
    /// borrow is released so listeners may read back through the client.
    fn with_state<R>(&self, f: impl FnOnce(&mut SyncState) -> R) -> R {
        let (result, deliveries) = {
            let mut state = self.state.borrow_mut();
            state.cache.defer_notifications();
            let result = f(&mut *state);
            let deliveries = state.cache.take_deferred();
            (result, deliveries)
        };
        for delivery in deliveries {
            delivery.deliver();
        }
        result
    }

    // === Entity cache ===

    pub fn get(&self, id: &RecipeId) -> Option<CacheEntry<Recipe>> {
        self.state.borrow().cache.get(id).cloned()
    }

    pub fn lookup(&self, id: &RecipeId) -> Option<Lookup<Recipe>> {
        self.state.borrow().cache.lookup(id)
    }

    pub fn cached_len(&self) -> usize {
        self.state.borrow().cache.len()
    }

    pub fn set(&self, recipe: Recipe) {
        self.with_state(|state| {
            let id = recipe.id.clone();
            state.cache.set(id.clone(), recipe);
            state.cursors.mark_dirty_containing(&id);
        });
    }

    pub fn update(&self, id: &RecipeId, transform: impl FnOnce(&Recipe) -> Recipe) -> bool {
        self.with_state(|state| {
            let applied = state.cache.update(id, transform);
            if applied {
                state.cursors.mark_dirty_containing(id);
            }
            applied
        })
    }

    pub fn invalidate(&self, id: &RecipeId) -> bool {
        self.with_state(|state| state.cache.invalidate(id))
    }

    pub fn subscribe(
        &self,
        id: RecipeId,
        listener: impl Fn(&CacheEvent<Recipe>) + 'static,
    ) -> Subscription<Recipe> {
        self.state.borrow_mut().cache.subscribe(id, listener)
    }

    /// Returns the cached recipe when there is one (flagging it for refetch if
    /// stale), otherwise fetches it.
    pub async fn load_recipe(&self, id: &RecipeId) -> Result<Lookup<Recipe>> {
        if let Some(lookup) = self.lookup(id) {
            if lookup.needs_refetch {
                log::debug!("Serving stale recipe {id}; refetch due");
            }
            return Ok(lookup);
        }

        let value = self.refresh_recipe(id).await?;
        Ok(Lookup {
            value,
            needs_refetch: false,
        })
    }

    /// Fetches the recipe from the gateway. A recipe the server no longer knows is
    /// dropped from the cache.
    pub async fn refresh_recipe(&self, id: &RecipeId) -> Result<Recipe> {
        match self.gateway.get(id).await {
            Ok(recipe) => {
                let recipe = self.with_state(|state| {
                    let recipe = state.overlay_pending(recipe);
                    state.cache.set(recipe.id.clone(), recipe.clone());
                    state.cursors.mark_dirty_containing(&recipe.id);
                    recipe
                });
                Ok(recipe)
            }
            Err(err @ SyncError::NotFound { .. }) => {
                log::warn!("Recipe {id} vanished server-side; dropping it from the cache");
                self.with_state(|state| {
                    state.cache.remove(id);
                    state.cursors.mark_dirty_containing(id);
                });
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    // === Collections ===

    pub fn open(&self, filter: &Filter) -> CursorHandle {
        self.with_state(|state| state.cursors.open(filter))
    }

    /// Fetches the next page for `handle`. Exhausted or already-fetching cursors
    /// return [`FetchOutcome::Skipped`] without touching the gateway.
    pub async fn fetch_next(&self, handle: &CursorHandle) -> Result<FetchOutcome> {
        let Some(ticket) = self.with_state(|state| state.cursors.begin_fetch(handle)) else {
            return Ok(FetchOutcome::Skipped);
        };

        log::debug!(
            "Fetching page {} for {}",
            ticket.token.as_ref().map_or("<first>", |token| token.as_str()),
            ticket.filter
        );
        let response = self.gateway.list(&ticket.filter, ticket.token.as_ref()).await;

        match response {
            Ok(mut page) => Ok(self.with_state(|state| {
                page.items = page
                    .items
                    .into_iter()
                    .map(|recipe| state.overlay_pending(recipe))
                    .collect();
                let SyncState { cache, cursors, .. } = state;
                cursors.complete_fetch(&ticket, page, cache)
            })),
            Err(err) => {
                let current = self.with_state(|state| {
                    let current = state.cursors.is_current(&ticket);
                    state.cursors.fail_fetch(&ticket);
                    current
                });
                if !current {
                    return Ok(FetchOutcome::Discarded);
                }
                log::warn!("Fetching {} failed: {err}", ticket.filter);
                Err(err)
            }
        }
    }

    /// Called by list views when the last visible row changes.
    pub async fn on_near_end(
        &self,
        handle: &CursorHandle,
        last_visible: usize,
    ) -> Result<FetchOutcome> {
        if !self.trigger.should_fetch(&self.status(handle), last_visible) {
            return Ok(FetchOutcome::Skipped);
        }
        self.fetch_next(handle).await
    }

    pub fn materialize(&self, handle: &CursorHandle) -> Vec<Recipe> {
        self.with_state(|state| {
            let SyncState { cache, cursors, .. } = state;
            cursors.materialize(handle, cache)
        })
    }

    pub fn status(&self, handle: &CursorHandle) -> CursorStatus {
        self.state.borrow().cursors.status(handle)
    }

    pub fn invalidate_collection(&self, filter: &Filter) -> bool {
        self.with_state(|state| state.cursors.invalidate(filter))
    }

    pub fn invalidate_all_collections(&self) {
        self.with_state(|state| state.cursors.invalidate_all());
    }

    pub fn close(&self, filter: &Filter) -> bool {
        self.with_state(|state| state.cursors.close(filter))
    }

    /// Drops cursors not opened within `gc_after`, then recipes written that long
    /// ago with no subscriber and no pending mutation. Views that showed an
    /// evicted recipe rebuild without it.
    pub fn collect_garbage(&self) -> Eviction {
        let gc_after = self.config.gc_after();
        let eviction = self.with_state(|state| {
            let SyncState {
                cache,
                cursors,
                pending,
                ..
            } = state;
            let collections = cursors.evict_unused(gc_after);
            let recipes = cache.evict_unused(gc_after, |id| pending.contains_key(id));
            for id in &recipes {
                cursors.mark_dirty_containing(id);
            }
            Eviction {
                recipes,
                collections,
            }
        });
        if !eviction.recipes.is_empty() || !eviction.collections.is_empty() {
            log::debug!(
                "Evicted {} recipes and {} collections",
                eviction.recipes.len(),
                eviction.collections.len()
            );
        }
        eviction
    }

    // === Mutations ===

    /// Snapshots `id` and applies `patch` everywhere it is shown.
    pub fn begin_mutation(&self, id: RecipeId, patch: RecipePatch) -> Mutation {
        self.with_state(|state| state.begin_mutation(id, patch))
    }

    /// Installs `server_value`, with the patches of other mutations still pending
    /// on the same recipe merged over it.
    pub fn commit_mutation(&self, mutation: &mut Mutation, server_value: Recipe) -> Result<()> {
        self.with_state(|state| {
            state.settle_pending(mutation);
            let server_value = state.overlay_pending(server_value);
            let SyncState { cache, cursors, .. } = state;
            mutation::commit(mutation, server_value, cache, cursors)
        })
    }

    pub fn confirm_mutation(&self, mutation: &mut Mutation) -> Result<()> {
        self.with_state(|state| {
            state.settle_pending(mutation);
            mutation::confirm(mutation, &mut state.cursors)
        })
    }

    pub fn rollback_mutation(&self, mutation: &mut Mutation) -> Result<()> {
        self.with_state(|state| {
            state.settle_pending(mutation);
            let SyncState { cache, cursors, .. } = state;
            mutation::rollback(mutation, cache, cursors)
        })
    }

    /// Number of mutations not yet committed or rolled back.
    pub fn pending_mutations(&self) -> usize {
        self.state.borrow().pending.values().map(Vec::len).sum()
    }

    /// Optimistically applies `patch`, then runs `commit_fn`. The server's value
    /// wins on success; any failure restores the snapshot and is returned as-is.
    pub async fn mutate<F, Fut>(
        &self,
        id: RecipeId,
        patch: RecipePatch,
        commit_fn: F,
    ) -> Result<Recipe>
    where
        F: FnOnce(RecipeId, RecipePatch) -> Fut,
        Fut: Future<Output = Result<Recipe>>,
    {
        let mut mutation = self.begin_mutation(id.clone(), patch.clone());

        match commit_fn(id, patch).await {
            Ok(server_value) => {
                self.commit_mutation(&mut mutation, server_value.clone())?;
                Ok(server_value)
            }
            Err(err) => {
                self.rollback_mutation(&mut mutation)?;
                Err(err)
            }
        }
    }

    pub async fn update_recipe(&self, id: &RecipeId, patch: RecipePatch) -> Result<Recipe> {
        self.mutate(id.clone(), patch, |id, patch| async move {
            self.gateway.update(&id, &patch).await
        })
        .await
    }

    /// Flips the favorite flag right away, then asks the server. The server's
    /// answer is the final state; a failure flips it back.
    ///
    /// Returns `None` without a request while another toggle of the same recipe
    /// is in flight.
    pub async fn toggle_favorite(&self, id: &RecipeId, actor: &str) -> Result<Option<bool>> {
        let kind = RelationKind::Favorite;
        let started = self.with_state(|state| {
            if !state.toggles_in_flight.insert(id.clone()) {
                return None;
            }
            let cached = state.cache.value(id).cloned();
            let current = cached.as_ref().is_some_and(Recipe::is_favorited);
            let patch = favorite_patch(cached.as_ref(), kind, !current);
            Some((current, cached, state.begin_mutation(id.clone(), patch)))
        });
        let Some((current, cached, mut mutation)) = started else {
            log::debug!("Favorite toggle for {id} already in flight; ignoring");
            return Ok(None);
        };
        let _guard = ToggleGuard {
            state: &self.state,
            id: id.clone(),
        };

        match self.gateway.toggle_relation(id, kind, actor).await {
            Ok(favorited) => {
                if favorited == current {
                    let settled = favorite_patch(cached.as_ref(), kind, favorited);
                    self.with_state(|state| {
                        state.cache.update(id, |recipe| recipe.merged(&settled));
                        state.cursors.patch_materialized(id, |recipe| recipe.merged(&settled));
                    });
                }
                self.confirm_mutation(&mut mutation)?;
                Ok(Some(favorited))
            }
            Err(err) => {
                self.rollback_mutation(&mut mutation)?;
                Err(err)
            }
        }
    }

    /// Posts a review. Not optimistic: on success the recipe and every collection
    /// showing it are invalidated so the next read picks up new aggregates.
    pub async fn submit_review(&self, review: &NewReview) -> Result<()> {
        self.gateway.create_review(review).await?;

        self.with_state(|state| {
            state.cache.invalidate(&review.recipe_id);
            for filter in state.cursors.filters_containing(&review.recipe_id) {
                state.cursors.invalidate(&filter);
            }
        });
        log::debug!("Review saved for {}; related views invalidated", review.recipe_id);
        Ok(())
    }
}

fn favorite_patch(cached: Option<&Recipe>, kind: RelationKind, value: bool) -> RecipePatch {
    match cached {
        Some(recipe) => recipe.favorite_patch(value),
        None => RecipePatch::new().set(kind.field(), value),
    }
}
