//! Like, dislike and favorite toggles for one (post, viewer) pair.
//!
//! State is never mutated locally after a write. A listener task derives
//! [`EngagementState`] from the post and user documents as the store delivers
//! them, so the displayed counters always reflect a value the store accepted.

use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::Utc;
use log::{debug, error, warn};
use serde::Serialize;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};

use crate::{
    errors::{EngagementError, StoreError},
    identity::{AuthUser, Session},
    notice::{Notice, Notifier},
    profile::new_profile,
    store::{DocumentStore, FieldOperation, SnapshotEvent, Subscription},
    types::{DocumentPath, Post, UserProfile, Vote, encode_document, timestamp},
};

const LIKED_BY: &str = "likedBy";
const DISLIKED_BY: &str = "dislikedBy";
const FAVORITED_BY: &str = "favoritedBy";
const LIKE_COUNT: &str = "likeCount";
const FAVORITE_POST_IDS: &str = "favoritePostIds";

/// Upper bound on waiting for an accepted write to come back through the listener.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// View state derived from the latest post and user snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngagementState {
    pub is_liked: bool,
    pub is_disliked: bool,
    pub is_favorited: bool,
    pub like_count: i64,
}

impl EngagementState {
    pub fn vote(&self) -> Vote {
        if self.is_liked {
            Vote::Liked
        } else if self.is_disliked {
            Vote::Disliked
        } else {
            Vote::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The write was accepted by the store.
    Applied,
    /// Another toggle on this handle was still in flight; nothing was written.
    Skipped,
}

/// Vote reached by a like toggle from `vote`.
pub fn vote_after_like(vote: Vote) -> Vote {
    if vote == Vote::Liked { Vote::Neutral } else { Vote::Liked }
}

/// Vote reached by a dislike toggle from `vote`.
pub fn vote_after_dislike(vote: Vote) -> Vote {
    if vote == Vote::Disliked { Vote::Neutral } else { Vote::Disliked }
}

/// Post-document writes for a like toggle from `vote`.
pub fn like_transition(vote: Vote, uid: &str) -> Vec<FieldOperation> {
    match vote {
        Vote::Liked => vec![
            FieldOperation::array_remove(LIKED_BY, uid),
            FieldOperation::increment(LIKE_COUNT, -1),
        ],
        Vote::Disliked => vec![
            FieldOperation::array_remove(DISLIKED_BY, uid),
            FieldOperation::array_union(LIKED_BY, uid),
            FieldOperation::increment(LIKE_COUNT, 2),
        ],
        Vote::Neutral => vec![
            FieldOperation::array_union(LIKED_BY, uid),
            FieldOperation::increment(LIKE_COUNT, 1),
        ],
    }
}

/// Post-document writes for a dislike toggle from `vote`.
pub fn dislike_transition(vote: Vote, uid: &str) -> Vec<FieldOperation> {
    match vote {
        Vote::Disliked => vec![
            FieldOperation::array_remove(DISLIKED_BY, uid),
            FieldOperation::increment(LIKE_COUNT, 1),
        ],
        Vote::Liked => vec![
            FieldOperation::array_remove(LIKED_BY, uid),
            FieldOperation::array_union(DISLIKED_BY, uid),
            FieldOperation::increment(LIKE_COUNT, -2),
        ],
        Vote::Neutral => vec![
            FieldOperation::array_union(DISLIKED_BY, uid),
            FieldOperation::increment(LIKE_COUNT, -1),
        ],
    }
}

fn favorite_list_operation(add: bool, post_id: &str) -> FieldOperation {
    if add {
        FieldOperation::array_union(FAVORITE_POST_IDS, post_id)
    } else {
        FieldOperation::array_remove(FAVORITE_POST_IDS, post_id)
    }
}

fn favorited_by_operation(add: bool, uid: &str) -> FieldOperation {
    if add {
        FieldOperation::array_union(FAVORITED_BY, uid)
    } else {
        FieldOperation::array_remove(FAVORITED_BY, uid)
    }
}

/// Clears the in-flight flag when the toggle finishes, however it finishes.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl<'a> ProcessingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Engagement handle for one post as seen by the user signed in at activation.
pub struct PostEngagement<S> {
    store: Arc<S>,
    session: Session,
    viewer: Option<AuthUser>,
    post_id: String,
    state: watch::Receiver<EngagementState>,
    ready: watch::Receiver<bool>,
    in_flight: AtomicBool,
    notifier: Notifier,
    listener: Option<JoinHandle<()>>,
}

impl<S: DocumentStore> PostEngagement<S> {
    /// Attaches listeners on the post and, when someone is signed in, on their
    /// user document.
    pub async fn activate(store: Arc<S>, session: Session, post_id: impl Into<String>) -> Result<Self, EngagementError> {
        let post_id = post_id.into();
        let viewer = session.current_user();

        let post_subscription = store
            .subscribe(&DocumentPath::post(&post_id))
            .await
            .map_err(EngagementError::Listener)?;
        let user_subscription = match &viewer {
            Some(user) => Some(
                store
                    .subscribe(&DocumentPath::user(&user.uid))
                    .await
                    .map_err(EngagementError::Listener)?,
            ),
            None => None,
        };

        let (state_tx, state) = watch::channel(EngagementState::default());
        let (ready_tx, ready) = watch::channel(false);
        let notifier = Notifier::new();
        let listener = tokio::spawn(listen(
            post_id.clone(),
            viewer.as_ref().map(|user| user.uid.clone()),
            Some(post_subscription),
            user_subscription,
            state_tx,
            ready_tx,
            notifier.clone(),
        ));
        debug!("activated engagement for post {post_id}");

        Ok(Self {
            store,
            session,
            viewer,
            post_id,
            state,
            ready,
            in_flight: AtomicBool::new(false),
            notifier,
            listener: Some(listener),
        })
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    /// Latest derived state.
    pub fn state(&self) -> EngagementState {
        *self.state.borrow()
    }

    /// Waits until the first snapshot of every attached listener has been applied.
    ///
    /// Toggles wait for this themselves before computing a transition.
    pub async fn ready(&self) -> Result<EngagementState, EngagementError> {
        let mut ready = self.ready.clone();
        ready
            .wait_for(|ready| *ready)
            .await
            .map_err(|_| EngagementError::Listener(StoreError::other("engagement listener stopped")))?;
        Ok(self.state())
    }

    pub fn watch(&self) -> watch::Receiver<EngagementState> {
        self.state.clone()
    }

    /// Waits until the derived state satisfies `predicate`.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&EngagementState) -> bool,
    ) -> Result<EngagementState, EngagementError> {
        let mut receiver = self.state.clone();
        let state = receiver
            .wait_for(|state| predicate(state))
            .await
            .map_err(|_| EngagementError::Listener(StoreError::other("engagement listener stopped")))?;
        Ok(*state)
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    /// Whether a toggle on this handle is currently in flight.
    pub fn is_processing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn toggle_like(&self) -> Result<ToggleOutcome, EngagementError> {
        let user = self.require_user("like posts")?;
        let Some(_guard) = ProcessingGuard::acquire(&self.in_flight) else {
            return Ok(ToggleOutcome::Skipped);
        };
        let vote = self.ready().await?.vote();
        self.write_vote(&like_transition(vote, &user.uid), "Failed to update like status")
            .await?;
        self.settle(|state| state.vote() == vote_after_like(vote)).await;
        Ok(ToggleOutcome::Applied)
    }

    pub async fn toggle_dislike(&self) -> Result<ToggleOutcome, EngagementError> {
        let user = self.require_user("dislike posts")?;
        let Some(_guard) = ProcessingGuard::acquire(&self.in_flight) else {
            return Ok(ToggleOutcome::Skipped);
        };
        let vote = self.ready().await?.vote();
        self.write_vote(&dislike_transition(vote, &user.uid), "Failed to update dislike status")
            .await?;
        self.settle(|state| state.vote() == vote_after_dislike(vote)).await;
        Ok(ToggleOutcome::Applied)
    }

    /// Adds the post to (or removes it from) the viewer's favorites.
    ///
    /// The user document is written first, then the post document. If the post
    /// write fails the user write is reverted; if that also fails the link is left
    /// inconsistent and [`EngagementError::PartialFavoriteUpdate`] is returned.
    pub async fn toggle_favorite(&self) -> Result<ToggleOutcome, EngagementError> {
        let user = self.require_user("favorite posts")?;
        let Some(_guard) = ProcessingGuard::acquire(&self.in_flight) else {
            return Ok(ToggleOutcome::Skipped);
        };

        let add = !self.ready().await?.is_favorited;
        let now = Utc::now();
        let user_path = DocumentPath::user(&user.uid);
        let post_path = DocumentPath::post(&self.post_id);

        let initial_favorites = if add {
            BTreeSet::from([self.post_id.clone()])
        } else {
            BTreeSet::new()
        };
        let create = encode_document::<UserProfile>(&new_profile(&user, now, initial_favorites))
            .map_err(|err| self.reject(err, "Failed to update favorite status"))?;
        let user_operations = [
            favorite_list_operation(add, &self.post_id),
            FieldOperation::assign("updatedAt", timestamp(now)),
        ];
        self.store
            .upsert(&user_path, create, &user_operations)
            .await
            .map_err(|err| self.reject(err, "Failed to update favorite status"))?;

        if let Err(err) = self.store.update(&post_path, &[favorited_by_operation(add, &user.uid)]).await {
            let revert = [
                favorite_list_operation(!add, &self.post_id),
                FieldOperation::assign("updatedAt", timestamp(Utc::now())),
            ];
            return match self.store.update(&user_path, &revert).await {
                Ok(()) => {
                    warn!("reverted favorite of {post_path} by {} after post write failed", user.uid);
                    Err(self.reject(err, "Failed to update favorite status"))
                }
                Err(compensation) => {
                    error!(
                        "favorite link {user_path} <-> {post_path} left inconsistent: {err}; revert failed: {compensation}"
                    );
                    self.notifier.error("Failed to update favorite status");
                    Err(EngagementError::PartialFavoriteUpdate {
                        post_id: self.post_id.clone(),
                        user_id: user.uid.clone(),
                        source: err,
                    })
                }
            };
        }

        self.settle(|state| state.is_favorited == add).await;
        self.notifier.success(if add {
            "Added to favorites"
        } else {
            "Removed from favorites"
        });
        Ok(ToggleOutcome::Applied)
    }

    /// Detaches both listeners and waits for the listener task to stop.
    pub async fn deactivate(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            let _ = listener.await;
        }
        debug!("deactivated engagement for post {}", self.post_id);
    }

    /// The signed-in user, provided it is the viewer this handle was activated for.
    fn require_user(&self, action: &'static str) -> Result<AuthUser, EngagementError> {
        let viewer = self.viewer.as_ref().map(|user| user.uid.as_str());
        match self.session.current_user() {
            Some(user) if Some(user.uid.as_str()) == viewer => Ok(user),
            _ => {
                self.notifier.error(format!("You must be logged in to {action}"));
                Err(EngagementError::Unauthenticated { action })
            }
        }
    }

    async fn write_vote(&self, operations: &[FieldOperation], failure: &'static str) -> Result<(), EngagementError> {
        self.store
            .update(&DocumentPath::post(&self.post_id), operations)
            .await
            .map_err(|err| self.reject(err, failure))
    }

    /// Holds the caller (and so the in-flight guard) until the derived state shows
    /// the accepted write. The next toggle then computes its transition from it.
    async fn settle(&self, settled: impl FnMut(&EngagementState) -> bool) {
        let mut receiver = self.state.clone();
        match tokio::time::timeout(SETTLE_TIMEOUT, receiver.wait_for(settled)).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => debug!("engagement listener for post {} stopped before settling", self.post_id),
            Err(_) => warn!(
                "post {} state did not reflect the accepted write within {SETTLE_TIMEOUT:?}",
                self.post_id
            ),
        }
    }

    fn reject(&self, err: StoreError, failure: &'static str) -> EngagementError {
        warn!("engagement write on post {} rejected: {err}", self.post_id);
        self.notifier.error(failure);
        EngagementError::WriteRejected(err)
    }
}

impl<S> Drop for PostEngagement<S> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

async fn next_event(subscription: &mut Option<Subscription>) -> Option<SnapshotEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

/// Applies snapshots to the derived state until both listeners are gone.
///
/// A listener that reports an error is dropped; the state keeps its last good
/// values for the fields that listener owned.
async fn listen(
    post_id: String,
    viewer: Option<String>,
    mut post: Option<Subscription>,
    mut user: Option<Subscription>,
    state: watch::Sender<EngagementState>,
    ready: watch::Sender<bool>,
    notifier: Notifier,
) {
    let mut post_seen = false;
    let mut user_seen = user.is_none();
    while post.is_some() || user.is_some() {
        if post_seen && user_seen && !*ready.borrow() {
            ready.send_replace(true);
        }
        tokio::select! {
            event = next_event(&mut post) => {
                post_seen = true;
                if !apply_post_event(event, &post_id, viewer.as_deref(), &state, &notifier) {
                    post = None;
                }
            }
            event = next_event(&mut user) => {
                user_seen = true;
                if !apply_user_event(event, &post_id, &state, &notifier) {
                    user = None;
                }
            }
        }
    }
}

/// Returns `false` once the post listener should be dropped.
fn apply_post_event(
    event: Option<SnapshotEvent>,
    post_id: &str,
    viewer: Option<&str>,
    state: &watch::Sender<EngagementState>,
    notifier: &Notifier,
) -> bool {
    match event {
        Some(Ok(snapshot)) => {
            match snapshot.decode::<Post>() {
                Ok(Some(document)) => state.send_modify(|current| {
                    let vote = viewer.map_or(Vote::Neutral, |uid| document.vote_of(uid));
                    current.like_count = document.like_count;
                    current.is_liked = vote == Vote::Liked;
                    current.is_disliked = vote == Vote::Disliked;
                }),
                Ok(None) => debug!("post {post_id} does not exist"),
                Err(err) => warn!("ignoring malformed snapshot of post {post_id}: {err}"),
            }
            true
        }
        Some(Err(err)) => {
            warn!("listener on post {post_id} failed: {err}");
            notifier.error("Lost connection to post updates");
            false
        }
        None => false,
    }
}

/// Returns `false` once the user listener should be dropped.
fn apply_user_event(
    event: Option<SnapshotEvent>,
    post_id: &str,
    state: &watch::Sender<EngagementState>,
    notifier: &Notifier,
) -> bool {
    match event {
        Some(Ok(snapshot)) => {
            match snapshot.decode::<UserProfile>() {
                Ok(profile) => {
                    let favorited = profile.is_some_and(|profile| profile.favorite_post_ids.contains(post_id));
                    state.send_if_modified(|current| {
                        let changed = current.is_favorited != favorited;
                        current.is_favorited = favorited;
                        changed
                    });
                }
                Err(err) => warn!("ignoring malformed snapshot of {}: {err}", snapshot.path),
            }
            true
        }
        Some(Err(err)) => {
            warn!("listener on viewer profile for post {post_id} failed: {err}");
            notifier.error("Lost connection to favorite updates");
            false
        }
        None => false,
    }
}
