//! Resolution of a user's favorite post ids into posts.

use std::{collections::BTreeSet, sync::Arc};

use log::{debug, warn};

use crate::{
    errors::StoreError,
    identity::Session,
    store::{DocumentStore, MAX_BATCH_IDS, Subscription},
    types::{DocumentPath, POSTS, Post, UserProfile, decode_document},
};

/// Fetches the posts behind `ids`, newest first.
///
/// Issues one batched lookup per [`MAX_BATCH_IDS`] ids. Ids that no longer
/// resolve are skipped.
pub async fn resolve_favorites<S: DocumentStore>(store: &S, ids: &BTreeSet<String>) -> Result<Vec<Post>, StoreError> {
    resolve_in_batches(store, ids, MAX_BATCH_IDS).await
}

/// Like [`resolve_favorites`] with a smaller batch size. The size is clamped to
/// `1..=MAX_BATCH_IDS`.
pub async fn resolve_in_batches<S: DocumentStore>(
    store: &S,
    ids: &BTreeSet<String>,
    batch_size: usize,
) -> Result<Vec<Post>, StoreError> {
    let batch_size = batch_size.clamp(1, MAX_BATCH_IDS);
    let ids: Vec<String> = ids.iter().cloned().collect();
    let mut posts = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(batch_size) {
        for (id, document) in store.get_many(POSTS, chunk).await? {
            posts.push(decode_document::<Post>(&DocumentPath::post(id), &document)?);
        }
    }
    if posts.len() < ids.len() {
        debug!("{} favorite ids no longer resolve", ids.len() - posts.len());
    }
    sort_newest_first(&mut posts);
    Ok(posts)
}

fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Live list of the signed-in user's favorite posts.
///
/// Follows the user document and re-resolves the list each time the set of
/// favorite ids changes. The posts themselves are fetched once per change and
/// are not followed.
pub struct FavoritesFeed<S> {
    store: Arc<S>,
    subscription: Subscription,
    batch_size: usize,
    ids: Option<BTreeSet<String>>,
}

impl<S: DocumentStore> FavoritesFeed<S> {
    /// Opens a feed for the current user, or `None` when nobody is signed in.
    pub async fn open(store: Arc<S>, session: &Session) -> Result<Option<Self>, StoreError> {
        let Some(user) = session.current_user() else {
            return Ok(None);
        };
        let subscription = store.subscribe(&DocumentPath::user(&user.uid)).await?;
        Ok(Some(Self {
            store,
            subscription,
            batch_size: MAX_BATCH_IDS,
            ids: None,
        }))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Favorite ids behind the last successfully resolved list.
    pub fn ids(&self) -> Option<&BTreeSet<String>> {
        self.ids.as_ref()
    }

    /// Waits until the favorite ids change and returns the resolved posts.
    ///
    /// The first call resolves whatever the user document holds. Returns `None`
    /// once the listener is detached.
    pub async fn next(&mut self) -> Option<Result<Vec<Post>, StoreError>> {
        loop {
            let snapshot = match self.subscription.next().await? {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!("favorites listener on {} failed: {err}", self.subscription.path());
                    return Some(Err(err));
                }
            };
            let ids = match snapshot.decode::<UserProfile>() {
                Ok(profile) => profile.map(|profile| profile.favorite_post_ids).unwrap_or_default(),
                Err(err) => return Some(Err(err)),
            };
            if self.ids.as_ref() == Some(&ids) {
                continue;
            }
            let resolved = if ids.is_empty() {
                Ok(Vec::new())
            } else {
                resolve_in_batches(self.store.as_ref(), &ids, self.batch_size).await
            };
            // A failed resolve leaves the ids unset so the next snapshot retries.
            if resolved.is_ok() {
                self.ids = Some(ids);
            }
            return Some(resolved);
        }
    }
}
