use anyhow::Result;
use clap::Subcommand;

use respawn::{
    CategoryUpdate, DocumentStore,
    catalog::{create_category, delete_category, list_categories, update_category},
};

use crate::context::AppContext;
use crate::examples::ExampleGroup;
use crate::output::{CategoryList, OutputManager};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Categories",
    commands: &[
        "respawn --as admin --email admin@example.com category create --title \"Role Playing\" --image-url https://cdn.example.com/rpg.png",
        "respawn category list",
        "respawn --as admin --email admin@example.com category update <category-id> --title \"RPG\"",
        "respawn --as admin --email admin@example.com category delete <category-id>",
    ],
}];

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create a category (admin only)
    #[command(name = "create")]
    Create {
        /// Category name
        #[arg(long)]
        title: String,

        #[arg(long)]
        image_url: String,
    },

    /// Rename a category or replace its image (admin only)
    #[command(name = "update")]
    Update {
        category_id: String,

        /// New category name
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        image_url: Option<String>,
    },

    /// Delete a category (admin only)
    #[command(name = "delete")]
    Delete { category_id: String },

    /// List categories by name
    #[command(name = "list")]
    List,
}

pub async fn handle_category_commands<S: DocumentStore>(
    command: CategoryCommands,
    ctx: &AppContext,
    store: &S,
    output: &OutputManager,
) -> Result<()> {
    match command {
        CategoryCommands::Create { title, image_url } => {
            ctx.sign_in()?;
            let category = create_category(store, &ctx.session, &title, &image_url).await?;
            output.success(&format!("Category \"{}\" has been successfully created!", category.name));
            output.display(&CategoryList(vec![category]))?;
        }
        CategoryCommands::Update {
            category_id,
            title,
            image_url,
        } => {
            ctx.sign_in()?;
            let update = CategoryUpdate { name: title, image_url };
            let category = update_category(store, &ctx.session, &category_id, update).await?;
            output.success(&format!("Category \"{}\" has been updated!", category.name));
            output.display(&CategoryList(vec![category]))?;
        }
        CategoryCommands::Delete { category_id } => {
            ctx.sign_in()?;
            delete_category(store, &ctx.session, &category_id).await?;
            output.success(&format!("Deleted category {category_id}"));
        }
        CategoryCommands::List => {
            output.display(&CategoryList(list_categories(store).await?))?;
        }
    }
    Ok(())
}
