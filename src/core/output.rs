//! Unified output formatting utilities for consistent CLI presentation.
//!
//! # Design Principles
//! - **Consistent color scheme**: Red for errors, green for success, blue for indices,
//!   bright_black for secondary details
//! - **Standardized spacing**: Newline before and after all command outputs

use crate::core::recipe::Recipe;
use colored::*;

/// Formats and prints an error message with consistent styling
///
/// # Format
/// ```text
///
/// ✕ Error: <message>
///
/// ```
pub fn print_error(message: &str) {
    println!("\n{} {}\n", "✕ Error:".red(), message.white());
}

/// Formats and prints a success message with consistent styling
pub fn print_success(message: &str) {
    println!("\n{} {}", "✓".green(), message.white());
}

/// Formats and prints an informational message with consistent styling
pub fn print_info(message: &str) {
    println!("\n{}\n", message.white());
}

/// Formats and prints a section header with consistent styling
pub fn print_section_header(header: &str) {
    println!("\n{}:\n", header.white());
}

/// Renders one list row: `[n] name (id) ★rating ♥`
pub fn format_recipe_row(index: usize, recipe: &Recipe) -> String {
    let name = recipe.name().unwrap_or("(untitled)");
    let rating = recipe
        .field("rating")
        .and_then(serde_json::Value::as_f64)
        .map(|rating| format!(" ★{rating:.1}"))
        .unwrap_or_default();
    let favorite = if recipe.is_favorited() { " ♥" } else { "" };

    format!(
        "{} {} {}{}{}",
        format!("[{index}]").blue(),
        name.white(),
        format!("({})", recipe.id).bright_black(),
        rating.yellow(),
        favorite.red()
    )
}

/// Prints every field of a recipe, one per line, in key order.
pub fn print_recipe_details(recipe: &Recipe) {
    println!("\n{} {}", "Recipe".white(), recipe.id.to_string().blue());
    let mut keys: Vec<&String> = recipe.fields.keys().collect();
    keys.sort();
    for key in keys {
        let value = &recipe.fields[key];
        let rendered = match value.as_str() {
            Some(text) => text.to_string(),
            None => value.to_string(),
        };
        println!("  {}  {}", format!("{key}:").bright_black(), rendered.white());
    }
}
