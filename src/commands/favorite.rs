use crate::core::{
    command_init::{CommandInit, SessionOptions},
    error::Result,
    print_info, print_success,
    recipe::RecipeId,
};

/// Toggles the favorite flag of a recipe for the session's actor.
pub async fn execute_favorite(options: &SessionOptions, id: &str) -> Result<()> {
    let context = CommandInit::initialize(options)?;
    let client = &context.client;
    let id = RecipeId::new(id);
    let actor = &context.config().actor;

    let recipe = client.load_recipe(&id).await?.value;
    let name = recipe.name().unwrap_or(id.as_str());
    match client.toggle_favorite(&id, actor).await? {
        Some(true) => print_success(&format!("Added '{name}' to favorites of {actor}")),
        Some(false) => print_success(&format!("Removed '{name}' from favorites of {actor}")),
        None => print_info(&format!("A favorite change for '{name}' is already running")),
    }
    println!();
    Ok(())
}
