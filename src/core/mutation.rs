//! Optimistic mutation protocol.
//!
//! A [`Mutation`] moves through `Pending -> Committed | RolledBack`. Starting one
//! captures an [`OptimisticSnapshot`] and applies the patch to the entity cache and
//! to every materialized collection view that shows the entity, synchronously, so
//! readers see the change before the server call is issued. Settling the mutation
//! either installs the server's value or puts the snapshot back.
//!
//! Mutations on the same entity are not serialized. Each one snapshots
//! independently, so a failure that resolves late can roll back over another
//! mutation's optimistic write.

use crate::core::cache::{CacheEntry, EntityCache};
use crate::core::cursor::CursorRegistry;
use crate::core::error::{Result, SyncError};
use crate::core::filter::Filter;
use crate::core::recipe::{Recipe, RecipeId, RecipePatch};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Pending,
    Committed,
    RolledBack,
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionPatch {
    pub filter: Filter,
    pub previous_item: Recipe,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticSnapshot {
    pub entity_id: RecipeId,
    /// Cache entry before the optimistic write; `None` if the entity was not cached.
    pub previous_entry: Option<CacheEntry<Recipe>>,
    pub collection_patches: Vec<CollectionPatch>,
}

impl OptimisticSnapshot {
    pub fn previous(&self) -> Option<&Recipe> {
        self.previous_entry.as_ref().map(|entry| &entry.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    id: u64,
    entity_id: RecipeId,
    patch: RecipePatch,
    state: MutationState,
    snapshot: Option<OptimisticSnapshot>,
}

impl Mutation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn entity_id(&self) -> &RecipeId {
        &self.entity_id
    }

    pub fn patch(&self) -> &RecipePatch {
        &self.patch
    }

    pub fn state(&self) -> MutationState {
        self.state
    }

    /// Present while pending; discarded once the mutation settles.
    pub fn snapshot(&self) -> Option<&OptimisticSnapshot> {
        self.snapshot.as_ref()
    }

    fn ensure_pending(&self) -> Result<()> {
        match self.state {
            MutationState::Pending => Ok(()),
            _ => Err(SyncError::MutationSettled { id: self.id }),
        }
    }
}

/// Snapshots the entity, then merges `patch` into the cache entry (if any) and
/// into every materialized view showing it.
pub fn apply_optimistic(
    id: u64,
    entity_id: RecipeId,
    patch: RecipePatch,
    cache: &mut EntityCache<RecipeId, Recipe>,
    cursors: &mut CursorRegistry,
) -> Mutation {
    let previous_entry = cache.get(&entity_id).cloned();
    cache.update(&entity_id, |recipe| recipe.merged(&patch));

    let collection_patches = cursors
        .patch_materialized(&entity_id, |recipe| recipe.merged(&patch))
        .into_iter()
        .map(|(filter, previous_item)| CollectionPatch {
            filter,
            previous_item,
        })
        .collect::<Vec<_>>();

    log::debug!(
        "Mutation {id}: optimistic patch on {entity_id} ({} cached, {} views)",
        if previous_entry.is_some() { "was" } else { "not" },
        collection_patches.len()
    );

    Mutation {
        id,
        snapshot: Some(OptimisticSnapshot {
            entity_id: entity_id.clone(),
            previous_entry,
            collection_patches,
        }),
        entity_id,
        patch,
        state: MutationState::Pending,
    }
}

/// Installs the server's value and lets views containing the entity rebuild.
pub fn commit(
    mutation: &mut Mutation,
    server_value: Recipe,
    cache: &mut EntityCache<RecipeId, Recipe>,
    cursors: &mut CursorRegistry,
) -> Result<()> {
    mutation.ensure_pending()?;

    cache.set(mutation.entity_id.clone(), server_value);
    let views = cursors.mark_dirty_containing(&mutation.entity_id);
    mutation.state = MutationState::Committed;
    mutation.snapshot = None;

    log::debug!(
        "Mutation {}: committed {} ({views} views to rebuild)",
        mutation.id,
        mutation.entity_id
    );
    Ok(())
}

/// Commits while keeping the optimistic value, for commits whose server reply
/// is an acknowledgement rather than an entity.
pub fn confirm(mutation: &mut Mutation, cursors: &mut CursorRegistry) -> Result<()> {
    mutation.ensure_pending()?;

    cursors.mark_dirty_containing(&mutation.entity_id);
    mutation.state = MutationState::Committed;
    mutation.snapshot = None;
    log::debug!("Mutation {}: confirmed {}", mutation.id, mutation.entity_id);
    Ok(())
}

/// Puts the snapshot back: the previous cache value (or no entry at all) and
/// every collection item that was patched.
pub fn rollback(
    mutation: &mut Mutation,
    cache: &mut EntityCache<RecipeId, Recipe>,
    cursors: &mut CursorRegistry,
) -> Result<()> {
    mutation.ensure_pending()?;

    if let Some(snapshot) = mutation.snapshot.take() {
        match snapshot.previous_entry {
            Some(entry) => cache.restore(snapshot.entity_id.clone(), entry),
            None => {
                cache.remove(&snapshot.entity_id);
            }
        }
        for patch in &snapshot.collection_patches {
            cursors.restore_materialized(&patch.filter, &patch.previous_item);
        }
        // Views rebuilt while the patch was pending picked up the optimistic value.
        cursors.mark_dirty_containing(&snapshot.entity_id);
    }
    mutation.state = MutationState::RolledBack;

    log::warn!(
        "Mutation {}: rolled back optimistic patch on {}",
        mutation.id,
        mutation.entity_id
    );
    Ok(())
}
