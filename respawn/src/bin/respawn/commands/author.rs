use anyhow::Result;
use clap::Subcommand;

use respawn::{DocumentStore, catalog::list_authors};

use crate::context::AppContext;
use crate::examples::ExampleGroup;
use crate::output::{AuthorList, OutputManager};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Authors",
    commands: &["respawn --as admin --email admin@example.com author list"],
}];

#[derive(Subcommand)]
pub enum AuthorCommands {
    /// List every user with their post count (admin only)
    #[command(name = "list")]
    List,
}

pub async fn handle_author_commands<S: DocumentStore>(
    command: AuthorCommands,
    ctx: &AppContext,
    store: &S,
    output: &OutputManager,
) -> Result<()> {
    match command {
        AuthorCommands::List => {
            ctx.sign_in()?;
            output.display(&AuthorList(list_authors(store, &ctx.session).await?))?;
        }
    }
    Ok(())
}
