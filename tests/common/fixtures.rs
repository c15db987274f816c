//! Test data and client builders
//!
//! Provides a small recipe catalogue, clients wired to the scripted gateway with
//! a manual clock, and recipe documents on disk for CLI tests.

#![allow(dead_code)]

use super::gateway::ScriptedGateway;
use recipe_sync::core::{clock::ManualClock, config::SyncConfig, recipe::Recipe, SyncClient};
use serde_json::json;
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;

pub type TestClient = SyncClient<ScriptedGateway>;

pub fn recipe(id: &str, name: &str, category: &str) -> Recipe {
    Recipe::new(id)
        .with("name", name)
        .with("category", category)
        .with("user_id", "u1")
        .with("rating", 4.0)
        .with("rating_count", 1)
        .with("is_favorited", false)
}

/// Scenario: three "makanan" recipes a, b, c plus one drink in between.
pub fn makanan_catalogue() -> Vec<Recipe> {
    vec![
        recipe("a", "Soto Ayam", "makanan"),
        recipe("b", "Rendang", "makanan"),
        recipe("t", "Es Teh", "minuman"),
        recipe("c", "Gado-gado", "makanan"),
    ]
}

/// Client over `recipes` served `page_size` at a time, with a clock the test drives.
pub fn client_with(recipes: Vec<Recipe>, page_size: usize) -> (TestClient, Rc<ManualClock>) {
    let clock = Rc::new(ManualClock::new());
    let client = SyncClient::with_clock(
        ScriptedGateway::new(recipes, page_size),
        SyncConfig::default(),
        clock.clone(),
    );
    (client, clock)
}

/// The makanan catalogue served two per page.
pub fn makanan_client() -> (TestClient, Rc<ManualClock>) {
    client_with(makanan_catalogue(), 2)
}

/// A recipe document plus an empty config in a temp directory, for CLI runs.
pub struct TestData {
    pub dir: TempDir,
    pub data: PathBuf,
    pub config: PathBuf,
}

impl TestData {
    pub fn read_document(&self) -> serde_json::Value {
        let content = std::fs::read_to_string(&self.data).unwrap();
        serde_json::from_str(&content).unwrap()
    }
}

pub fn setup_test_data() -> anyhow::Result<TestData> {
    let dir = TempDir::new()?;
    let data = dir.path().join("recipes.json");
    let config = dir.path().join("config.json");

    let document = json!({
        "recipes": [
            {"id": 1, "name": "Soto Ayam", "category": "makanan", "user_id": 7, "rating": 4.0, "rating_count": 1},
            {"id": 2, "name": "Rendang", "category": "makanan", "user_id": 7},
            {"id": 3, "name": "Es Teh Manis", "category": "minuman", "user_id": 8},
            {"id": 4, "name": "Gado-gado", "category": "makanan", "user_id": 8, "slug": "gado-gado-jakarta"}
        ]
    });
    std::fs::write(&data, serde_json::to_string_pretty(&document)?)?;
    std::fs::write(&config, r#"{"page_size": 2, "actor": "tester"}"#)?;

    Ok(TestData { dir, data, config })
}
