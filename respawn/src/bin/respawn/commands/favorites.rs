use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;

use respawn::{DocumentStore, FavoritesFeed};

use super::within_timeout;
use crate::context::AppContext;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, PostList};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Favorites",
    commands: &[
        "respawn --as kara favorites                 # Favorite posts, newest first",
        "respawn --as kara --output compact favorites",
    ],
}];

#[derive(Args, Debug, Default)]
pub struct FavoritesArgs {
    /// Ids per batched lookup (1-10, defaults to the configured value)
    #[arg(long)]
    pub batch_size: Option<usize>,
}

pub async fn handle_favorites(
    args: FavoritesArgs,
    ctx: &AppContext,
    store: &Arc<impl DocumentStore>,
    output: &OutputManager,
) -> Result<()> {
    ctx.sign_in()?.context("Pass --as <uid> to list favorites")?;
    let batch_size = args.batch_size.unwrap_or(ctx.config.favorites.batch_size);

    let Some(feed) = FavoritesFeed::open(store.clone(), &ctx.session).await? else {
        anyhow::bail!("No user is signed in");
    };
    let mut feed = feed.with_batch_size(batch_size);

    output.progress("Loading favorites");
    let posts = within_timeout("the profile snapshot", feed.next())
        .await?
        .context("Profile listener closed")??;
    output.clear_line();

    if posts.is_empty() {
        output.info("No favorite posts yet");
        return Ok(());
    }
    output.heading("Favorite posts");
    output.display(&PostList(posts))
}
