pub mod author;
pub mod category;
pub mod favorites;
pub mod post;
pub mod profile;
pub mod vote;

use anyhow::{Context, Result};
use std::{future::Future, time::Duration};

/// How long a command waits for the store to push a snapshot.
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn within_timeout<T>(what: &str, future: impl Future<Output = T>) -> Result<T> {
    tokio::time::timeout(SNAPSHOT_TIMEOUT, future)
        .await
        .with_context(|| format!("Timed out waiting for {what}"))
}
