use crate::core::{
    command_init::{CommandInit, SessionOptions},
    error::Result,
    output::print_recipe_details,
    recipe::RecipeId,
};

pub async fn execute_show(options: &SessionOptions, id: &str) -> Result<()> {
    let context = CommandInit::initialize(options)?;
    let lookup = context.client.load_recipe(&RecipeId::new(id)).await?;
    print_recipe_details(&lookup.value);
    println!();
    Ok(())
}
