pub(crate) use chrono::{DateTime, Duration as ChronoDuration, Utc};
pub(crate) use respawn::{
    AuthUser, DocumentPath, DocumentStore, EngagementError, FieldOperation, IdentityProvider, LocalIdentityProvider,
    MemoryStore, NoticeLevel, Post, PostEngagement, Session, ToggleOutcome, UserProfile, Vote,
    engagement::{vote_after_dislike, vote_after_like},
    store::fetch,
    types::{POSTS, timestamp},
};
pub(crate) use serde_json::json;
pub(crate) use std::{collections::BTreeSet, future::Future, sync::Arc, time::Duration};

pub(crate) const ADMIN_EMAIL: &str = "admin@example.com";

/// Upper bound for any wait on a pushed snapshot.
pub(crate) async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), future)
        .await
        .expect("timed out waiting for the store")
}

pub(crate) fn user(uid: &str) -> AuthUser {
    AuthUser::new(uid).with_email(format!("{uid}@example.com"))
}

pub(crate) fn session_for(user: AuthUser) -> (Arc<LocalIdentityProvider>, Session) {
    let identity = Arc::new(LocalIdentityProvider::new());
    identity.sign_in(user).expect("sign in");
    let session = Session::new(identity.clone()).with_admin_email(ADMIN_EMAIL);
    (identity, session)
}

pub(crate) fn anonymous_session() -> (Arc<LocalIdentityProvider>, Session) {
    let identity = Arc::new(LocalIdentityProvider::new());
    let session = Session::new(identity.clone()).with_admin_email(ADMIN_EMAIL);
    (identity, session)
}

pub(crate) fn admin_session() -> (Arc<LocalIdentityProvider>, Session) {
    session_for(AuthUser::new("admin").with_email(ADMIN_EMAIL))
}

pub(crate) async fn seed_post_at(store: &MemoryStore, author: &str, created_at: DateTime<Utc>) -> String {
    let document = json!({
        "title": "Hollow Knight",
        "description": "Pogo practice",
        "authorId": author,
        "createdAt": timestamp(created_at),
        "updatedAt": timestamp(created_at),
        "published": true,
        "likeCount": 0,
        "likedBy": [],
        "dislikedBy": [],
        "favoritedBy": [],
    });
    store
        .create(POSTS, document.as_object().cloned().expect("object"))
        .await
        .expect("seed post")
}

pub(crate) async fn seed_post(store: &MemoryStore, author: &str) -> String {
    seed_post_at(store, author, Utc::now()).await
}

pub(crate) async fn stored_post(store: &MemoryStore, id: &str) -> Post {
    fetch::<Post, _>(store, id).await.expect("fetch post").expect("post exists")
}

pub(crate) async fn stored_profile(store: &MemoryStore, uid: &str) -> Option<UserProfile> {
    fetch::<UserProfile, _>(store, uid).await.expect("fetch profile")
}

/// Activates an engagement handle for `uid` and waits for the first snapshots.
pub(crate) async fn engagement_for(
    store: &Arc<MemoryStore>,
    uid: &str,
    post_id: &str,
) -> (Arc<LocalIdentityProvider>, PostEngagement<MemoryStore>) {
    let (identity, session) = session_for(user(uid));
    let engagement = PostEngagement::activate(store.clone(), session, post_id)
        .await
        .expect("activate");
    within(engagement.ready()).await.expect("ready");
    (identity, engagement)
}
