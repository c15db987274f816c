use crate::core::{
    command_init::{CommandInit, SessionOptions},
    error::Result,
    output::print_recipe_details,
    print_info, print_success,
    recipe::{RecipeId, RecipePatch},
    RecipeGateway,
};

/// Applies `key=value` assignments to a recipe.
///
/// The edit is shown as soon as it is applied locally, before the gateway has
/// answered; the saved recipe (or the restored one, on failure) follows.
pub async fn execute_edit(options: &SessionOptions, id: &str, assignments: Vec<String>) -> Result<()> {
    let patch = RecipePatch::from_assignments(&assignments)?;
    let context = CommandInit::initialize(options)?;
    let client = &context.client;
    let id = RecipeId::new(id);

    client.load_recipe(&id).await?;

    // Runs after the optimistic apply and before the request goes out.
    let saved = client
        .mutate(id.clone(), patch, |id, patch| async move {
            if let Some(entry) = client.get(&id) {
                print_info(&format!(
                    "Applied locally: {}",
                    entry.value.name().unwrap_or(id.as_str())
                ));
            }
            client.gateway().update(&id, &patch).await
        })
        .await;

    match saved {
        Ok(saved) => {
            print_success(&format!("Saved recipe {id}"));
            print_recipe_details(&saved);
            println!();
            Ok(())
        }
        Err(err) => {
            print_info(&format!("Edit rejected; recipe {id} restored"));
            Err(err)
        }
    }
}
