use anyhow::{Context, Result};
use clap::Subcommand;
use std::sync::Arc;

use respawn::{DocumentStore, EngagementError, PostEngagement, ToggleOutcome, catalog::get_post};

use super::within_timeout;
use crate::context::AppContext;
use crate::examples::ExampleGroup;
use crate::output::{EngagementView, OutputManager};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Voting",
        commands: &[
            "respawn --as kara vote like <post-id>      # Like, or clear an existing like",
            "respawn --as kara vote dislike <post-id>   # Dislike, or clear an existing dislike",
        ],
    },
    ExampleGroup {
        title: "Favorites",
        commands: &[
            "respawn --as kara vote favorite <post-id>  # Add to or remove from favorites",
            "respawn --as kara vote status <post-id>",
        ],
    },
];

#[derive(Subcommand)]
pub enum VoteCommands {
    /// Toggle a like on a post
    #[command(name = "like")]
    Like { post_id: String },

    /// Toggle a dislike on a post
    #[command(name = "dislike")]
    Dislike { post_id: String },

    /// Toggle a post in the signed-in user's favorites
    #[command(name = "favorite")]
    Favorite { post_id: String },

    /// Show the current score and the signed-in user's votes
    #[command(name = "status")]
    Status { post_id: String },
}

impl VoteCommands {
    fn post_id(&self) -> &str {
        match self {
            Self::Like { post_id } | Self::Dislike { post_id } | Self::Favorite { post_id } | Self::Status { post_id } => {
                post_id
            }
        }
    }
}

pub async fn handle_vote_commands<S: DocumentStore>(
    command: VoteCommands,
    ctx: &AppContext,
    store: &Arc<S>,
    output: &OutputManager,
) -> Result<()> {
    ctx.sign_in()?;
    let post_id = command.post_id().to_string();
    get_post(store.as_ref(), &post_id).await?;

    let engagement = PostEngagement::activate(store.clone(), ctx.session.clone(), post_id.as_str()).await?;
    let mut notices = engagement.notices();
    let before = within_timeout("the post snapshot", engagement.ready()).await??;

    let outcome = match command {
        VoteCommands::Like { .. } => Some(engagement.toggle_like().await),
        VoteCommands::Dislike { .. } => Some(engagement.toggle_dislike().await),
        VoteCommands::Favorite { .. } => Some(engagement.toggle_favorite().await),
        VoteCommands::Status { .. } => None,
    };
    while let Ok(notice) = notices.try_recv() {
        output.notice(&notice);
    }

    let state = match outcome {
        None => before,
        Some(Ok(ToggleOutcome::Applied)) => engagement.state(),
        Some(Ok(ToggleOutcome::Skipped)) => {
            output.warning("Another update for this post is still in flight");
            before
        }
        Some(Err(EngagementError::Unauthenticated { action })) => {
            engagement.deactivate().await;
            anyhow::bail!("Pass --as <uid> to {action}");
        }
        Some(Err(err)) => {
            engagement.deactivate().await;
            return Err(err).context("Vote was not recorded");
        }
    };
    engagement.deactivate().await;

    output.display(&EngagementView { post_id, state })
}
