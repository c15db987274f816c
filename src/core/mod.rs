//! Core functionality for the recipe-sync layer.
//!
//! This module provides the entity cache, paginated collection cursors, the
//! optimistic mutation coordinator and the gateway abstraction they talk to.

pub mod cache;
pub mod client;
pub mod clock;
pub mod command_init;
pub mod config;
pub mod cursor;
pub mod dirs;
pub mod error;
pub mod file_gateway;
pub mod filter;
pub mod gateway;
pub mod mutation;
pub mod output;
pub mod recipe;
pub mod share;
pub mod trigger;

// === Error handling ===
// Core error types and result type used throughout the crate
pub use error::{Result, SyncError};

// === Data model ===
// Recipes are an id plus an open field map; patches merge into them
pub use recipe::{Recipe, RecipeId, RecipePatch};
pub use filter::{Filter, PageToken};

// === Entity cache ===
// Keyed values with staleness metadata and per-key subscriptions
pub use cache::{CacheEntry, CacheEvent, EntityCache, Lookup, Subscription};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};

// === Collections ===
// Per-filter page sequences, fetch tickets and the visibility trigger
pub use cursor::{CursorHandle, CursorRegistry, CursorStatus, FetchOutcome, Page};
pub use trigger::VisibilityTrigger;

// === Mutations ===
// Optimistic apply with snapshot-based rollback
pub use mutation::{Mutation, MutationState, OptimisticSnapshot};

// === Gateway ===
// Remote API abstraction and the local JSON-backed implementation
pub use file_gateway::JsonFileGateway;
pub use gateway::{ListPage, NewReview, RecipeGateway, RelationKind};

// === Client ===
pub use client::{Eviction, SyncClient};
pub use config::SyncConfig;

// === Command initialization ===
// Centralized setup of config, recipe document and client for CLI commands
pub use command_init::{CommandContext, CommandInit, SessionOptions};

// === Output formatting ===
// Unified output formatting for consistent CLI presentation
pub use output::{
    format_recipe_row, print_error, print_info, print_recipe_details, print_section_header,
    print_success,
};
