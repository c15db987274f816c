use crate::core::{
    command_init::{CommandInit, SessionOptions},
    error::Result,
    recipe::RecipeId,
};
use colored::*;

/// Prints the share link for a recipe, using the configured base URL.
pub async fn execute_share(options: &SessionOptions, id: &str) -> Result<()> {
    let context = CommandInit::initialize(options)?;
    let recipe = context.client.load_recipe(&RecipeId::new(id)).await?.value;
    let url = recipe.share_url(&context.config().share_base());

    println!(
        "\n{} {}\n",
        recipe.name().unwrap_or("(untitled)").white(),
        url.blue()
    );
    Ok(())
}
