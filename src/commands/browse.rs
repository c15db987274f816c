use crate::core::{
    command_init::{CommandInit, SessionOptions},
    cursor::FetchOutcome,
    error::Result,
    filter::Filter,
    output::format_recipe_row,
    print_info, print_section_header,
};

/// Lists recipes matching `filter`, loading up to `pages` pages.
///
/// Pages after the first are pulled the way a scrolling list would: the last
/// row is reported as visible and the visibility trigger decides whether to
/// fetch.
pub async fn execute_browse(options: &SessionOptions, filter: Filter, pages: usize) -> Result<()> {
    let context = CommandInit::initialize(options)?;
    let client = &context.client;
    let handle = client.open(&filter);

    client.fetch_next(&handle).await?;
    while client.status(&handle).pages < pages.max(1) {
        let last_visible = client.status(&handle).items.saturating_sub(1);
        match client.on_near_end(&handle, last_visible).await? {
            FetchOutcome::Appended { .. } => {}
            FetchOutcome::Skipped | FetchOutcome::Discarded => break,
        }
    }

    let recipes = client.materialize(&handle);
    if recipes.is_empty() {
        print_info(&format!("No recipes found for {filter}"));
        return Ok(());
    }

    print_section_header(&format!("Recipes {filter}"));
    for (index, recipe) in recipes.iter().enumerate() {
        println!("{}", format_recipe_row(index + 1, recipe));
    }

    let status = client.status(&handle);
    if status.has_next_page {
        print_info(&format!(
            "Showing {} recipes from {} page(s); more available (use --pages {})",
            status.items,
            status.pages,
            status.pages + 1
        ));
    } else {
        println!();
    }
    Ok(())
}
