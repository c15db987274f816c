//! Shared test utilities for recipe-sync
//!
//! Integration tests run the real `SyncClient` against an in-memory gateway
//! whose calls can be counted, delayed and made to fail on demand.

pub mod assertions;
pub mod fixtures;
pub mod gateway;
