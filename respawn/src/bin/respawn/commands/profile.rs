use anyhow::{Context, Result};
use clap::Subcommand;
use std::sync::Arc;

use respawn::{DocumentStore, ProfileSync, ProfileView, RenameOutcome, UpsertOutcome};

use super::within_timeout;
use crate::context::AppContext;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, ProfileDetail};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Profiles",
    commands: &[
        "respawn --as kara --email kara@example.com profile register",
        "respawn --as kara --name \"Kara\" profile sync   # Refresh display fields after sign-in",
        "respawn --as kara profile show",
        "respawn --as kara profile rename Kara_99",
    ],
}];

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Register a new account and create its profile
    #[command(name = "register")]
    Register,

    /// Sign in and refresh the stored profile from the identity
    #[command(name = "sync")]
    Sync,

    /// Show the merged profile of the signed-in user
    #[command(name = "show")]
    Show,

    /// Change the signed-in user's display name
    #[command(name = "rename")]
    Rename { display_name: String },
}

pub async fn handle_profile_commands<S: DocumentStore>(
    command: ProfileCommands,
    ctx: &AppContext,
    store: &Arc<S>,
    output: &OutputManager,
) -> Result<()> {
    match command {
        ProfileCommands::Register => {
            let user = ctx.sign_up()?;
            let outcome = ProfileSync::new(store.clone()).sync(&user).await?;
            if outcome == UpsertOutcome::Updated {
                output.warning(&format!("A profile for {} already existed and was refreshed", user.uid));
            } else {
                output.success(&format!("Registered {}", user.uid));
            }
        }
        ProfileCommands::Sync => {
            let user = ctx.sign_in()?.context("Pass --as <uid> to sync a profile")?;
            let outcome = ProfileSync::new(store.clone()).sync(&user).await?;
            output.success(&format!("Profile {} {}", user.uid, match outcome {
                UpsertOutcome::Created => "created",
                UpsertOutcome::Updated => "updated",
            }));
        }
        ProfileCommands::Show => {
            ctx.sign_in()?.context("Pass --as <uid> to show a profile")?;
            let Some(mut view) = ProfileView::open(store.as_ref(), &ctx.session).await? else {
                anyhow::bail!("No user is signed in");
            };
            let profile = within_timeout("the profile snapshot", view.next())
                .await?
                .context("Profile listener closed")??;
            output.display(&ProfileDetail(profile))?;
        }
        ProfileCommands::Rename { display_name } => {
            ctx.sign_in()?.context("Pass --as <uid> to rename a profile")?;
            match ProfileSync::new(store.clone()).rename(&ctx.session, &display_name).await? {
                RenameOutcome::Renamed => output.success("Profile updated successfully!"),
                RenameOutcome::Unchanged => output.info("No changes detected"),
            }
        }
    }
    Ok(())
}
