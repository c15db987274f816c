use crate::core::{
    command_init::{CommandInit, SessionOptions},
    error::Result,
    gateway::NewReview,
    print_success,
    recipe::RecipeId,
};

pub async fn execute_review(
    options: &SessionOptions,
    id: &str,
    rating: u8,
    comment: Option<String>,
) -> Result<()> {
    let context = CommandInit::initialize(options)?;
    let client = &context.client;
    let id = RecipeId::new(id);

    client.load_recipe(&id).await?;
    client
        .submit_review(&NewReview {
            recipe_id: id.clone(),
            rating,
            comment: comment.unwrap_or_default(),
        })
        .await?;

    // The review invalidated the cached recipe; read the new aggregates back.
    let lookup = client.load_recipe(&id).await?;
    let recipe = if lookup.needs_refetch {
        client.refresh_recipe(&id).await?
    } else {
        lookup.value
    };

    let rating = recipe
        .field("rating")
        .and_then(serde_json::Value::as_f64)
        .unwrap_or_default();
    let count = recipe
        .field("rating_count")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or_default();
    print_success(&format!(
        "Review saved; rating is now {rating:.1} ({count} reviews)"
    ));
    println!();
    Ok(())
}
