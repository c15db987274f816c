use clap::{Parser, Subcommand};
use recipe_sync::commands::*;
use recipe_sync::core::{command_init::SessionOptions, error::Result, filter::Filter, print_error};
use std::env;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recipe-sync")]
#[command(about = "Browse, edit and share recipes through the sync layer")]
#[command(version = "0.1.0")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Recipe document to serve (defaults to recipes.json in the config directory)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Config file (defaults to config.json in the config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List recipes, optionally filtered
    Browse {
        /// Only recipes in this category
        #[arg(long)]
        category: Option<String>,
        /// Only recipes created by this user
        #[arg(long)]
        user: Option<String>,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Show every field of a recipe
    Show { id: String },
    /// Edit a recipe with optimistic local apply
    Edit {
        id: String,
        /// Field assignment (e.g., name="Soto Betawi", rating=4.5)
        #[arg(long = "set", required = true)]
        assignments: Vec<String>,
    },
    /// Toggle a recipe in the actor's favorites
    Favorite {
        id: String,
        /// Who is favoriting (defaults to the configured actor)
        #[arg(long)]
        actor: Option<String>,
    },
    /// Post a review for a recipe
    Review {
        id: String,
        /// Rating from 1 to 5
        #[arg(long)]
        rating: u8,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Print the share link of a recipe
    Share { id: String },
}

async fn run(command: Commands, options: &SessionOptions) -> Result<()> {
    match command {
        Commands::Browse {
            category,
            user,
            pages,
        } => {
            let filter = Filter {
                user_id: user,
                category,
            };
            execute_browse(options, filter, pages).await
        }
        Commands::Show { id } => execute_show(options, &id).await,
        Commands::Edit { id, assignments } => execute_edit(options, &id, assignments).await,
        Commands::Favorite { id, actor } => {
            let options = SessionOptions {
                actor,
                ..options.clone()
            };
            execute_favorite(&options, &id).await
        }
        Commands::Review {
            id,
            rating,
            comment,
        } => execute_review(options, &id, rating, comment).await,
        Commands::Share { id } => execute_share(options, &id).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configure logging based on --debug flag
    if cli.debug {
        env::set_var("RUST_LOG", "debug");
    } else {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let options = SessionOptions {
        data: cli.data,
        config: cli.config,
        actor: None,
    };

    if let Err(e) = run(cli.command, &options).await {
        print_error(&e.to_string());
        std::process::exit(1);
    }

    Ok(())
}
