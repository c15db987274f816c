//! Paginated collection cursors.
//!
//! One [`CollectionCursor`] exists per distinct [`Filter`]. It records the pages
//! fetched so far (as entity ids, in fetch order), the token for the next page and
//! whether a fetch is in flight or the collection is exhausted. Entity values live
//! in the [`EntityCache`]; a cursor only resolves its ids against it.
//!
//! # Public API
//! - [`CursorRegistry`]: Owns every cursor, keyed by filter
//! - [`CursorHandle`]: What consumers hold after `open`
//! - [`FetchTicket`]: Proof that a fetch was started, tagged with the cursor generation
//! - [`FetchOutcome`]: What a completed `fetch_next` did
//! - [`CursorStatus`]: Read model for list views
//!
//! # Generations
//! Every cursor carries a generation drawn from a registry-wide counter. Invalidating
//! or closing a cursor retires its generation, so a response that arrives for an
//! older generation is discarded instead of being appended to the wrong list.

use crate::core::cache::EntityCache;
use crate::core::clock::SharedClock;
use crate::core::filter::{Filter, PageToken};
use crate::core::gateway::ListPage;
use crate::core::recipe::{Recipe, RecipeId};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CursorHandle {
    filter: Filter,
}

impl CursorHandle {
    pub fn filter(&self) -> &Filter {
        &self.filter
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<RecipeId>,
    /// Token this page was requested with; `None` for the first page.
    pub token: Option<PageToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub filter: Filter,
    pub generation: u64,
    pub token: Option<PageToken>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Appended {
        page_index: usize,
        items: usize,
        exhausted: bool,
    },
    /// Exhausted or already fetching; no request was made.
    Skipped,
    /// The response belonged to a retired generation and was dropped.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorStatus {
    pub pages: usize,
    pub items: usize,
    pub has_next_page: bool,
    pub is_fetching: bool,
    pub is_loading: bool,
    pub exhausted: bool,
    pub is_stale: bool,
}

#[derive(Debug, Clone)]
pub struct CollectionCursor {
    pages: Vec<Page>,
    next_token: Option<PageToken>,
    exhausted: bool,
    fetch_in_flight: bool,
    generation: u64,
    invalidated: bool,
    fetched_at: Option<DateTime<Utc>>,
    last_opened: DateTime<Utc>,
    materialized: Option<Vec<Recipe>>,
}

impl CollectionCursor {
    fn new(generation: u64, now: DateTime<Utc>) -> Self {
        Self {
            pages: Vec::new(),
            next_token: None,
            exhausted: false,
            fetch_in_flight: false,
            generation,
            invalidated: false,
            fetched_at: None,
            last_opened: now,
            materialized: None,
        }
    }

    fn restart(&mut self) {
        self.pages.clear();
        self.next_token = None;
        self.exhausted = false;
        self.fetch_in_flight = false;
        self.invalidated = false;
        self.fetched_at = None;
        self.materialized = None;
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn next_token(&self) -> Option<&PageToken> {
        self.next_token.as_ref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_in_flight
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn item_ids(&self) -> impl Iterator<Item = &RecipeId> {
        self.pages.iter().flat_map(|page| page.items.iter())
    }

    pub fn contains(&self, id: &RecipeId) -> bool {
        self.item_ids().any(|item| item == id)
    }

    fn mark_dirty(&mut self) {
        self.materialized = None;
    }
}

pub struct CursorRegistry {
    cursors: HashMap<Filter, CollectionCursor>,
    next_generation: u64,
    stale_after: Duration,
    clock: SharedClock,
}

impl CursorRegistry {
    pub fn new(clock: SharedClock, stale_after: Duration) -> Self {
        Self {
            cursors: HashMap::new(),
            next_generation: 0,
            stale_after,
            clock,
        }
    }

    fn allocate_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Returns the cursor for `filter`, creating it on first use. An invalidated
    /// cursor starts over from the first page.
    pub fn open(&mut self, filter: &Filter) -> CursorHandle {
        let now = self.clock.now();
        if !self.cursors.contains_key(filter) {
            let generation = self.allocate_generation();
            log::debug!("Opening cursor {filter} (generation {generation})");
            self.cursors
                .insert(filter.clone(), CollectionCursor::new(generation, now));
        }

        if let Some(cursor) = self.cursors.get_mut(filter) {
            cursor.last_opened = now;
            if cursor.invalidated {
                log::debug!("Restarting invalidated cursor {filter}");
                cursor.restart();
            }
        }

        CursorHandle {
            filter: filter.clone(),
        }
    }

    pub fn get(&self, handle: &CursorHandle) -> Option<&CollectionCursor> {
        self.cursors.get(&handle.filter)
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Starts a fetch unless the cursor is exhausted or already fetching.
    pub fn begin_fetch(&mut self, handle: &CursorHandle) -> Option<FetchTicket> {
        self.open(&handle.filter);
        let cursor = self.cursors.get_mut(&handle.filter)?;

        if cursor.exhausted || cursor.fetch_in_flight {
            log::debug!(
                "Skipping fetch for {} (exhausted: {}, in flight: {})",
                handle.filter,
                cursor.exhausted,
                cursor.fetch_in_flight
            );
            return None;
        }

        cursor.fetch_in_flight = true;
        Some(FetchTicket {
            filter: handle.filter.clone(),
            generation: cursor.generation,
            token: cursor.next_token.clone(),
        })
    }

    /// True while `ticket` still belongs to the cursor's current generation.
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.cursors
            .get(&ticket.filter)
            .is_some_and(|cursor| cursor.generation == ticket.generation && cursor.fetch_in_flight)
    }

    fn live_cursor(&mut self, ticket: &FetchTicket) -> Option<&mut CollectionCursor> {
        self.cursors
            .get_mut(&ticket.filter)
            .filter(|cursor| cursor.generation == ticket.generation && cursor.fetch_in_flight)
    }

    /// Commits a fetched page: entities go into the cache first, then the page is
    /// appended and the in-flight flag cleared.
    pub fn complete_fetch(
        &mut self,
        ticket: &FetchTicket,
        page: ListPage,
        cache: &mut EntityCache<RecipeId, Recipe>,
    ) -> FetchOutcome {
        if self.live_cursor(ticket).is_none() {
            log::debug!(
                "Discarding page for {} from retired generation {}",
                ticket.filter,
                ticket.generation
            );
            return FetchOutcome::Discarded;
        }

        let ids: Vec<RecipeId> = page.items.iter().map(|recipe| recipe.id.clone()).collect();
        for recipe in page.items {
            cache.set(recipe.id.clone(), recipe);
        }
        for id in &ids {
            self.mark_dirty_containing(id);
        }

        let now = self.clock.now();
        let Some(cursor) = self.live_cursor(ticket) else {
            return FetchOutcome::Discarded;
        };
        let exhausted = page.next_page_token.is_none();
        let items = ids.len();
        cursor.pages.push(Page {
            items: ids,
            token: ticket.token.clone(),
        });
        cursor.next_token = page.next_page_token;
        cursor.exhausted = exhausted;
        cursor.fetched_at.get_or_insert(now);
        cursor.mark_dirty();
        cursor.fetch_in_flight = false;

        let page_index = cursor.pages.len() - 1;
        log::debug!(
            "Appended page {page_index} ({items} items) to {}{}",
            ticket.filter,
            if exhausted { ", collection exhausted" } else { "" }
        );
        FetchOutcome::Appended {
            page_index,
            items,
            exhausted,
        }
    }

    /// Clears the in-flight flag after a failed request; pages stay untouched.
    pub fn fail_fetch(&mut self, ticket: &FetchTicket) {
        if let Some(cursor) = self.live_cursor(ticket) {
            cursor.fetch_in_flight = false;
        }
    }

    /// Resolves every id against the cache in page order, skipping ids the cache
    /// no longer holds.
    pub fn materialize(
        &mut self,
        handle: &CursorHandle,
        cache: &EntityCache<RecipeId, Recipe>,
    ) -> Vec<Recipe> {
        let Some(cursor) = self.cursors.get_mut(&handle.filter) else {
            return Vec::new();
        };

        if let Some(materialized) = &cursor.materialized {
            return materialized.clone();
        }

        let items: Vec<Recipe> = cursor
            .item_ids()
            .filter_map(|id| cache.value(id).cloned())
            .collect();
        cursor.materialized = Some(items.clone());
        items
    }

    pub fn status(&self, handle: &CursorHandle) -> CursorStatus {
        let Some(cursor) = self.cursors.get(&handle.filter) else {
            return CursorStatus {
                has_next_page: true,
                ..CursorStatus::default()
            };
        };

        let now = self.clock.now();
        let is_stale = cursor.invalidated
            || cursor
                .fetched_at
                .is_some_and(|fetched_at| now >= fetched_at + self.stale_after);
        CursorStatus {
            pages: cursor.pages.len(),
            items: cursor.item_ids().count(),
            has_next_page: !cursor.exhausted,
            is_fetching: cursor.fetch_in_flight,
            is_loading: cursor.fetch_in_flight && cursor.pages.is_empty(),
            exhausted: cursor.exhausted,
            is_stale,
        }
    }

    /// Marks a cursor for restart. Its pages stay readable until it is reopened;
    /// any response in flight for it will be discarded.
    pub fn invalidate(&mut self, filter: &Filter) -> bool {
        let generation = self.allocate_generation();
        let Some(cursor) = self.cursors.get_mut(filter) else {
            return false;
        };
        cursor.invalidated = true;
        cursor.fetch_in_flight = false;
        cursor.generation = generation;
        log::debug!("Invalidated cursor {filter} (generation {generation})");
        true
    }

    pub fn invalidate_all(&mut self) {
        let filters: Vec<Filter> = self.cursors.keys().cloned().collect();
        for filter in &filters {
            self.invalidate(filter);
        }
    }

    pub fn close(&mut self, filter: &Filter) -> bool {
        self.cursors.remove(filter).is_some()
    }

    /// Drops cursors nobody has opened or fetched within `unused_for`. Cursors
    /// with a request in flight are kept.
    pub fn evict_unused(&mut self, unused_for: Duration) -> Vec<Filter> {
        let now = self.clock.now();
        let mut evicted = Vec::new();
        self.cursors.retain(|filter, cursor| {
            let idle = !cursor.fetch_in_flight && now >= cursor.last_opened + unused_for;
            if idle {
                evicted.push(filter.clone());
            }
            !idle
        });
        evicted
    }

    pub fn filters_containing(&self, id: &RecipeId) -> Vec<Filter> {
        self.cursors
            .iter()
            .filter(|(_, cursor)| cursor.contains(id))
            .map(|(filter, _)| filter.clone())
            .collect()
    }

    /// Drops memoized views that include `id` so they rebuild on next read.
    pub fn mark_dirty_containing(&mut self, id: &RecipeId) -> usize {
        let mut marked = 0;
        for cursor in self.cursors.values_mut() {
            if cursor.contains(id) {
                cursor.mark_dirty();
                marked += 1;
            }
        }
        marked
    }

    /// Rewrites `id` inside every memoized view. Returns each view's previous
    /// value of the item so the caller can put it back.
    pub fn patch_materialized(
        &mut self,
        id: &RecipeId,
        transform: impl Fn(&Recipe) -> Recipe,
    ) -> Vec<(Filter, Recipe)> {
        let mut previous = Vec::new();
        for (filter, cursor) in &mut self.cursors {
            let Some(items) = cursor.materialized.as_mut() else {
                continue;
            };
            for item in items.iter_mut().filter(|item| &item.id == id) {
                previous.push((filter.clone(), item.clone()));
                *item = transform(item);
            }
        }
        previous
    }

    /// Puts a previously recorded item value back into a memoized view.
    pub fn restore_materialized(&mut self, filter: &Filter, previous: &Recipe) {
        let Some(items) = self
            .cursors
            .get_mut(filter)
            .and_then(|cursor| cursor.materialized.as_mut())
        else {
            return;
        };
        for item in items.iter_mut().filter(|item| item.id == previous.id) {
            *item = previous.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use std::rc::Rc;

    struct Fixture {
        registry: CursorRegistry,
        cache: EntityCache<RecipeId, Recipe>,
        clock: Rc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Rc::new(ManualClock::new());
        Fixture {
            registry: CursorRegistry::new(clock.clone(), Duration::minutes(2)),
            cache: EntityCache::new(clock.clone(), Duration::minutes(5)),
            clock,
        }
    }

    fn page(ids: &[&str], next: Option<&str>) -> ListPage {
        ListPage {
            items: ids.iter().map(|id| Recipe::new(*id)).collect(),
            next_page_token: next.map(PageToken::from),
        }
    }

    fn ids(recipes: &[Recipe]) -> Vec<&str> {
        recipes.iter().map(|recipe| recipe.id.as_str()).collect()
    }

    #[test]
    fn test_open_is_idempotent_per_filter() {
        let mut f = fixture();
        let first = f.registry.open(&Filter::category("makanan"));
        let second = f.registry.open(&Filter::category("makanan"));
        assert_eq!(first, second);
        assert_eq!(f.registry.len(), 1);

        f.registry.open(&Filter::category("minuman"));
        assert_eq!(f.registry.len(), 2);
    }

    #[test]
    fn test_pages_append_in_fetch_order() {
        let mut f = fixture();
        let handle = f.registry.open(&Filter::category("makanan"));

        let ticket = f.registry.begin_fetch(&handle).unwrap();
        assert_eq!(ticket.token, None);
        f.registry
            .complete_fetch(&ticket, page(&["a", "b"], Some("p2")), &mut f.cache);
        assert_eq!(ids(&f.registry.materialize(&handle, &f.cache)), vec!["a", "b"]);

        let ticket = f.registry.begin_fetch(&handle).unwrap();
        assert_eq!(ticket.token, Some(PageToken::from("p2")));
        let outcome = f
            .registry
            .complete_fetch(&ticket, page(&["c"], None), &mut f.cache);
        assert_eq!(
            outcome,
            FetchOutcome::Appended {
                page_index: 1,
                items: 1,
                exhausted: true
            }
        );
        assert_eq!(
            ids(&f.registry.materialize(&handle, &f.cache)),
            vec!["a", "b", "c"]
        );

        let cursor = f.registry.get(&handle).unwrap();
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.pages()[1].token, Some(PageToken::from("p2")));
        assert!(f.registry.begin_fetch(&handle).is_none());
    }

    #[test]
    fn test_second_begin_while_in_flight_is_dropped() {
        let mut f = fixture();
        let handle = f.registry.open(&Filter::all());
        let ticket = f.registry.begin_fetch(&handle).unwrap();
        assert!(f.registry.begin_fetch(&handle).is_none());
        assert!(f.registry.status(&handle).is_loading);

        f.registry
            .complete_fetch(&ticket, page(&["a"], Some("2")), &mut f.cache);
        assert_eq!(f.registry.get(&handle).unwrap().pages().len(), 1);
        assert!(f.registry.begin_fetch(&handle).is_some());
    }

    #[test]
    fn test_failed_fetch_leaves_pages_unchanged() {
        let mut f = fixture();
        let handle = f.registry.open(&Filter::all());
        let ticket = f.registry.begin_fetch(&handle).unwrap();
        f.registry
            .complete_fetch(&ticket, page(&["a"], Some("2")), &mut f.cache);

        let ticket = f.registry.begin_fetch(&handle).unwrap();
        f.registry.fail_fetch(&ticket);

        let cursor = f.registry.get(&handle).unwrap();
        assert!(!cursor.is_fetching());
        assert_eq!(cursor.pages().len(), 1);
        assert_eq!(cursor.next_token(), Some(&PageToken::from("2")));
        assert_eq!(f.registry.begin_fetch(&handle).unwrap().token, Some("2".into()));
    }

    #[test]
    fn test_materialize_skips_evicted_ids() {
        let mut f = fixture();
        let handle = f.registry.open(&Filter::all());
        let ticket = f.registry.begin_fetch(&handle).unwrap();
        f.registry
            .complete_fetch(&ticket, page(&["a", "b", "c"], None), &mut f.cache);

        f.cache.remove(&RecipeId::new("b"));
        f.registry.mark_dirty_containing(&RecipeId::new("b"));
        assert_eq!(ids(&f.registry.materialize(&handle, &f.cache)), vec!["a", "c"]);
    }

    #[test]
    fn test_idle_cursors_are_evicted_unless_fetching() {
        let mut f = fixture();
        let idle = f.registry.open(&Filter::category("minuman"));
        let busy = f.registry.open(&Filter::category("makanan"));
        let reopened = f.registry.open(&Filter::all());
        let ticket = f.registry.begin_fetch(&busy).unwrap();

        f.clock.advance(Duration::minutes(10));
        f.registry.open(reopened.filter());
        let evicted = f.registry.evict_unused(Duration::minutes(10));

        assert_eq!(evicted, vec![idle.filter().clone()]);
        assert!(f.registry.get(&idle).is_none());
        assert!(f.registry.is_current(&ticket));
        assert!(f.registry.get(&reopened).is_some());
    }

    #[test]
    fn test_invalidated_cursor_discards_late_response_and_restarts() {
        let mut f = fixture();
        let filter = Filter::user("u1");
        let handle = f.registry.open(&filter);
        let ticket = f.registry.begin_fetch(&handle).unwrap();
        f.registry
            .complete_fetch(&ticket, page(&["a"], Some("2")), &mut f.cache);

        let late = f.registry.begin_fetch(&handle).unwrap();
        assert!(f.registry.invalidate(&filter));

        // old pages stay readable until reopened
        assert_eq!(ids(&f.registry.materialize(&handle, &f.cache)), vec!["a"]);
        let outcome = f
            .registry
            .complete_fetch(&late, page(&["z"], None), &mut f.cache);
        assert_eq!(outcome, FetchOutcome::Discarded);
        assert!(!f.cache.contains_key(&RecipeId::new("z")));

        let handle = f.registry.open(&filter);
        let cursor = f.registry.get(&handle).unwrap();
        assert!(cursor.pages().is_empty());
        assert!(!cursor.is_exhausted());
        assert_eq!(f.registry.begin_fetch(&handle).unwrap().token, None);
    }

    #[test]
    fn test_closed_then_reopened_cursor_rejects_old_ticket() {
        let mut f = fixture();
        let filter = Filter::category("minuman");
        let handle = f.registry.open(&filter);
        let stale = f.registry.begin_fetch(&handle).unwrap();
        assert!(f.registry.close(&filter));

        let handle = f.registry.open(&filter);
        let fresh = f.registry.begin_fetch(&handle).unwrap();
        assert_ne!(stale.generation, fresh.generation);
        assert_eq!(
            f.registry
                .complete_fetch(&stale, page(&["old"], None), &mut f.cache),
            FetchOutcome::Discarded
        );
        assert!(matches!(
            f.registry
                .complete_fetch(&fresh, page(&["new"], None), &mut f.cache),
            FetchOutcome::Appended { .. }
        ));
    }

    #[test]
    fn test_patch_and_restore_materialized_items() {
        let mut f = fixture();
        let handle = f.registry.open(&Filter::all());
        let ticket = f.registry.begin_fetch(&handle).unwrap();
        f.registry.complete_fetch(
            &ticket,
            ListPage {
                items: vec![Recipe::new("a").with("rating", 4), Recipe::new("b")],
                next_page_token: None,
            },
            &mut f.cache,
        );
        f.registry.materialize(&handle, &f.cache);

        let id = RecipeId::new("a");
        let previous = f
            .registry
            .patch_materialized(&id, |recipe| recipe.clone().with("rating", 5));
        assert_eq!(previous.len(), 1);
        let patched = f.registry.materialize(&handle, &f.cache);
        assert_eq!(patched[0].field("rating"), Some(&serde_json::json!(5)));

        for (filter, item) in &previous {
            f.registry.restore_materialized(filter, item);
        }
        let restored = f.registry.materialize(&handle, &f.cache);
        assert_eq!(restored[0].field("rating"), Some(&serde_json::json!(4)));
    }

    #[test]
    fn test_status_reports_staleness_after_ttl() {
        let mut f = fixture();
        let handle = f.registry.open(&Filter::all());
        let ticket = f.registry.begin_fetch(&handle).unwrap();
        f.registry
            .complete_fetch(&ticket, page(&["a"], Some("2")), &mut f.cache);

        let status = f.registry.status(&handle);
        assert!(status.has_next_page);
        assert!(!status.is_stale);
        assert_eq!(status.items, 1);

        f.clock.advance(Duration::minutes(2));
        assert!(f.registry.status(&handle).is_stale);
    }
}
