use anyhow::Result;
use clap::Subcommand;

use respawn::{
    CatalogError, DocumentStore, PostDraft, PostFilter,
    catalog::{create_post, delete_post, get_post, list_posts},
};

use crate::context::AppContext;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, PostDetail, PostList};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Publishing",
        commands: &[
            "respawn --as kara post create --title \"Speedrun tips\" --description \"Frame-perfect jumps\" --category <id>",
            "respawn --as kara post delete <post-id>",
        ],
    },
    ExampleGroup {
        title: "Browsing",
        commands: &[
            "respawn post list                       # Newest published posts",
            "respawn post list --category rpg        # Only one category",
            "respawn --output json post show <post-id>",
        ],
    },
];

#[derive(Subcommand)]
pub enum PostCommands {
    /// Publish a new post as the signed-in user
    #[command(name = "create")]
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        /// Category id
        #[arg(long)]
        category: String,

        /// Public id of an uploaded cover image
        #[arg(long, default_value = "")]
        image: String,
    },

    /// Show one post with its vote sets
    #[command(name = "show")]
    Show { id: String },

    /// List posts, newest first
    #[command(name = "list")]
    List {
        /// Only posts in the category with this slug
        #[arg(long)]
        category: Option<String>,

        /// Only posts by this author id
        #[arg(long)]
        author: Option<String>,

        /// Include unpublished posts
        #[arg(long)]
        all: bool,
    },

    /// Delete a post (author or admin only)
    #[command(name = "delete")]
    Delete { id: String },
}

pub async fn handle_post_commands<S: DocumentStore>(
    command: PostCommands,
    ctx: &AppContext,
    store: &S,
    output: &OutputManager,
) -> Result<()> {
    ctx.sign_in()?;

    match command {
        PostCommands::Create {
            title,
            description,
            category,
            image,
        } => {
            let draft = PostDraft {
                title,
                description,
                category_id: category,
                image_public_id: image,
            };
            let post = match create_post(store, &ctx.session, draft).await {
                Ok(post) => post,
                Err(CatalogError::Validation(err)) => {
                    output.error("Please fill out all fields correctly");
                    for issue in &err.issues {
                        output.bullet(&format!("{}: {}", issue.field, issue.message));
                    }
                    anyhow::bail!("Post was not created");
                }
                Err(err) => return Err(err.into()),
            };
            output.success(&format!("Post created successfully: {}", post.id));
            output.display(&PostDetail(post))?;
        }
        PostCommands::Show { id } => {
            output.display(&PostDetail(get_post(store, &id).await?))?;
        }
        PostCommands::List { category, author, all } => {
            let filter = PostFilter {
                category_slug: category,
                author_id: author,
                include_unpublished: all,
            };
            let posts = list_posts(store, &filter).await?;
            output.verbose(&format!("{} posts matched", posts.len()));
            output.display(&PostList(posts))?;
        }
        PostCommands::Delete { id } => {
            delete_post(store, &ctx.session, &id).await?;
            output.success(&format!("Post {id} deleted"));
        }
    }

    Ok(())
}
