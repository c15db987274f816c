//! Recipe Sync - the client-side data layer of a recipe-sharing application.
//!
//! The crate keeps list and detail views of recipes consistent with each other
//! and with the server: an entity cache with staleness, paginated collection
//! cursors that collapse concurrent fetches, and optimistic mutations that roll
//! back cleanly when the server refuses a write.
//!
//! # Public API
//! The main public interface is re-exported from the [`core`] module, which provides:
//! - [`SyncClient`], the single object consumers talk to
//! - The [`RecipeGateway`] trait and a JSON-file implementation
//! - Cache, cursor and mutation building blocks
//! - Error handling and result types

pub mod commands;
pub mod core;

// Re-export the core public API for external users
pub use core::{
    CacheEntry,
    CacheEvent,
    CursorHandle,
    CursorStatus,
    Eviction,
    FetchOutcome,
    Filter,
    JsonFileGateway,
    ListPage,
    Lookup,
    ManualClock,
    Mutation,
    MutationState,
    NewReview,
    PageToken,
    Recipe,
    // Gateway
    RecipeGateway,
    RecipeId,
    RecipePatch,
    RelationKind,
    Result,
    Subscription,
    // Client
    SyncClient,
    SyncConfig,
    // Error handling
    SyncError,
    VisibilityTrigger,
};
