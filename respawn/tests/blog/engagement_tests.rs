use crate::support::*;
use futures_util::future::join_all;

#[derive(Clone, Copy)]
enum Action {
    Like,
    Dislike,
}

async fn toggle(engagement: &PostEngagement<MemoryStore>, action: Action) -> Vote {
    let expected = match action {
        Action::Like => vote_after_like(engagement.state().vote()),
        Action::Dislike => vote_after_dislike(engagement.state().vote()),
    };
    let outcome = match action {
        Action::Like => engagement.toggle_like().await,
        Action::Dislike => engagement.toggle_dislike().await,
    };
    assert_eq!(outcome.expect("toggle"), ToggleOutcome::Applied);
    within(engagement.wait_for(|state| state.vote() == expected))
        .await
        .expect("state");
    expected
}

#[tokio::test]
async fn like_then_dislike_then_other_user_like_nets_zero() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let (_a_identity, a) = engagement_for(&store, "user-a", &post_id).await;

    toggle(&a, Action::Like).await;
    assert_eq!(a.state().like_count, 1);
    toggle(&a, Action::Dislike).await;
    let state = a.state();
    assert!(state.is_disliked && !state.is_liked);
    assert_eq!(state.like_count, -1);

    let (_b_identity, b) = engagement_for(&store, "user-b", &post_id).await;
    toggle(&b, Action::Like).await;

    let post = stored_post(&store, &post_id).await;
    assert_eq!(post.liked_by, BTreeSet::from(["user-b".to_string()]));
    assert_eq!(post.disliked_by, BTreeSet::from(["user-a".to_string()]));
    assert_eq!(post.like_count, 0);

    let seen_by_a = within(a.wait_for(|state| state.like_count == 0)).await.unwrap();
    assert!(seen_by_a.is_disliked);
}

#[tokio::test]
async fn every_transition_keeps_votes_exclusive_and_score_consistent() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let (_identity, engagement) = engagement_for(&store, "voter", &post_id).await;

    let script = [
        Action::Like,
        Action::Like,
        Action::Dislike,
        Action::Dislike,
        Action::Like,
        Action::Dislike,
        Action::Like,
        Action::Dislike,
        Action::Dislike,
    ];
    for action in script {
        let expected = toggle(&engagement, action).await;
        let state = engagement.state();
        assert!(!(state.is_liked && state.is_disliked));

        let post = stored_post(&store, &post_id).await;
        assert!(post.liked_by.intersection(&post.disliked_by).next().is_none());
        assert_eq!(post.vote_of("voter"), expected);
        assert_eq!(post.like_count, post.tallied_score());
        assert_eq!(state.like_count, post.like_count);
    }
}

#[tokio::test]
async fn concurrent_voters_leave_counter_consistent() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let mut voters = Vec::new();
    for index in 0..6 {
        voters.push(engagement_for(&store, &format!("voter-{index}"), &post_id).await);
    }

    let runs = voters.iter().enumerate().map(|(index, (_, engagement))| async move {
        for step in 0..8 {
            let action = if (index + step) % 3 == 0 { Action::Dislike } else { Action::Like };
            toggle(engagement, action).await;
        }
    });
    join_all(runs).await;

    let post = stored_post(&store, &post_id).await;
    assert_eq!(post.like_count, post.tallied_score());
    for (index, (_, engagement)) in voters.iter().enumerate() {
        assert_eq!(post.vote_of(&format!("voter-{index}")), engagement.state().vote());
    }
}

#[tokio::test]
async fn double_toggle_applies_once() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let (_identity, engagement) = engagement_for(&store, "clicker", &post_id).await;

    let (first, second) = tokio::join!(engagement.toggle_like(), engagement.toggle_like());
    let outcomes = [first.unwrap(), second.unwrap()];
    assert!(outcomes.contains(&ToggleOutcome::Applied));
    assert!(outcomes.contains(&ToggleOutcome::Skipped));
    assert!(!engagement.is_processing());

    within(engagement.wait_for(|state| state.is_liked)).await.unwrap();
    let post = stored_post(&store, &post_id).await;
    assert_eq!(post.liked_by, BTreeSet::from(["clicker".to_string()]));
    assert_eq!(post.like_count, 1);
}

#[tokio::test]
async fn guard_covers_every_toggle_kind() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let (_identity, engagement) = engagement_for(&store, "clicker", &post_id).await;

    let (like, favorite) = tokio::join!(engagement.toggle_like(), engagement.toggle_favorite());
    assert_eq!(like.unwrap(), ToggleOutcome::Applied);
    assert_eq!(favorite.unwrap(), ToggleOutcome::Skipped);
    assert!(stored_profile(&store, "clicker").await.is_none());
}

#[tokio::test]
async fn favorite_links_user_and_post_both_ways() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let (_identity, engagement) = engagement_for(&store, "fan", &post_id).await;
    let mut notices = engagement.notices();
    assert!(stored_profile(&store, "fan").await.is_none());

    assert_eq!(engagement.toggle_favorite().await.unwrap(), ToggleOutcome::Applied);
    within(engagement.wait_for(|state| state.is_favorited)).await.unwrap();
    let profile = stored_profile(&store, "fan").await.expect("profile created on first favorite");
    assert_eq!(profile.favorite_post_ids, BTreeSet::from([post_id.clone()]));
    assert_eq!(profile.display_name, "fan");
    assert!(stored_post(&store, &post_id).await.favorited_by.contains("fan"));
    let notice = within(notices.recv()).await.unwrap();
    assert_eq!((notice.level, notice.message.as_str()), (NoticeLevel::Success, "Added to favorites"));

    engagement.toggle_favorite().await.unwrap();
    within(engagement.wait_for(|state| !state.is_favorited)).await.unwrap();
    assert!(stored_profile(&store, "fan").await.unwrap().favorite_post_ids.is_empty());
    assert!(stored_post(&store, &post_id).await.favorited_by.is_empty());
    let notice = within(notices.recv()).await.unwrap();
    assert_eq!(notice.message, "Removed from favorites");
}

#[tokio::test]
async fn anonymous_toggles_write_nothing() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let (_identity, session) = anonymous_session();
    let engagement = PostEngagement::activate(store.clone(), session, post_id.as_str())
        .await
        .unwrap();
    within(engagement.ready()).await.unwrap();
    let mut notices = engagement.notices();

    let err = engagement.toggle_like().await.unwrap_err();
    assert!(matches!(err, EngagementError::Unauthenticated { .. }));
    let notice = within(notices.recv()).await.unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, "You must be logged in to like posts");

    assert!(matches!(
        engagement.toggle_favorite().await,
        Err(EngagementError::Unauthenticated { .. })
    ));
    let post = stored_post(&store, &post_id).await;
    assert_eq!(post.like_count, 0);
    assert!(post.liked_by.is_empty() && post.favorited_by.is_empty());
    assert!(store.list("users").await.unwrap().is_empty());
}

#[tokio::test]
async fn switching_user_after_activation_is_unauthenticated() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let (identity, engagement) = engagement_for(&store, "user-a", &post_id).await;

    identity.sign_in(user("user-b")).unwrap();
    assert!(matches!(
        engagement.toggle_dislike().await,
        Err(EngagementError::Unauthenticated { .. })
    ));
    assert!(stored_post(&store, &post_id).await.disliked_by.is_empty());
}

#[tokio::test]
async fn rejected_write_keeps_confirmed_state() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let (_identity, engagement) = engagement_for(&store, "voter", &post_id).await;
    let mut notices = engagement.notices();
    store.deny_writes(&DocumentPath::post(&post_id)).unwrap();

    let err = engagement.toggle_like().await.unwrap_err();
    assert!(matches!(err, EngagementError::WriteRejected(_)));
    let notice = within(notices.recv()).await.unwrap();
    assert_eq!(notice.message, "Failed to update like status");
    assert_eq!(engagement.state().vote(), Vote::Neutral);
    assert_eq!(engagement.state().like_count, 0);
    assert!(!engagement.is_processing());

    store.allow_all_writes().unwrap();
    toggle(&engagement, Action::Like).await;
}

#[tokio::test]
async fn failed_post_write_reverts_user_favorites() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let (_identity, engagement) = engagement_for(&store, "fan", &post_id).await;
    store.deny_writes(&DocumentPath::post(&post_id)).unwrap();

    let err = engagement.toggle_favorite().await.unwrap_err();
    assert!(matches!(err, EngagementError::WriteRejected(_)));

    let profile = stored_profile(&store, "fan").await.expect("user write happened first");
    assert!(profile.favorite_post_ids.is_empty());
    assert!(stored_post(&store, &post_id).await.favorited_by.is_empty());
    within(engagement.wait_for(|state| !state.is_favorited)).await.unwrap();
}

#[tokio::test]
async fn failed_revert_reports_partial_update() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let (_identity, engagement) = engagement_for(&store, "fan", &post_id).await;
    let mut notices = engagement.notices();
    store.deny_writes(&DocumentPath::post(&post_id)).unwrap();
    store.deny_writes_after(&DocumentPath::user("fan"), 1).unwrap();

    match engagement.toggle_favorite().await {
        Err(EngagementError::PartialFavoriteUpdate { post_id: failed, user_id, .. }) => {
            assert_eq!(failed, post_id);
            assert_eq!(user_id, "fan");
        }
        other => panic!("expected partial update, got {other:?}"),
    }
    let notice = within(notices.recv()).await.unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);

    let profile = stored_profile(&store, "fan").await.unwrap();
    assert!(profile.favorite_post_ids.contains(&post_id));
    assert!(stored_post(&store, &post_id).await.favorited_by.is_empty());
}

#[tokio::test]
async fn listener_failure_freezes_state_and_notifies() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let post_path = DocumentPath::post(&post_id);
    let (_identity, engagement) = engagement_for(&store, "viewer", &post_id).await;
    let mut notices = engagement.notices();

    store.fail_listeners(&post_path, "connection reset").unwrap();
    let notice = within(notices.recv()).await.unwrap();
    assert_eq!(notice.message, "Lost connection to post updates");

    store
        .update(
            &post_path,
            &[
                FieldOperation::array_union("likedBy", "someone-else"),
                FieldOperation::increment("likeCount", 1),
            ],
        )
        .await
        .unwrap();
    let moved = tokio::time::timeout(
        Duration::from_millis(100),
        engagement.wait_for(|state| state.like_count == 1),
    )
    .await;
    assert!(moved.is_err());
    assert_eq!(engagement.state().like_count, 0);
}

#[tokio::test]
async fn deactivate_detaches_both_listeners() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let post_path = DocumentPath::post(&post_id);
    let user_path = DocumentPath::user("viewer");
    let (_identity, engagement) = engagement_for(&store, "viewer", &post_id).await;
    assert_eq!(store.listener_count(&post_path).unwrap(), 1);
    assert_eq!(store.listener_count(&user_path).unwrap(), 1);

    engagement.deactivate().await;
    assert_eq!(store.listener_count(&post_path).unwrap(), 0);
    assert_eq!(store.listener_count(&user_path).unwrap(), 0);
}

#[tokio::test]
async fn anonymous_view_tracks_score_without_user_listener() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let (_identity, session) = anonymous_session();
    let viewer = PostEngagement::activate(store.clone(), session, post_id.as_str())
        .await
        .unwrap();
    within(viewer.ready()).await.unwrap();
    assert_eq!(store.listener_count(&DocumentPath::post(&post_id)).unwrap(), 1);

    let (_identity, voter) = engagement_for(&store, "voter", &post_id).await;
    toggle(&voter, Action::Like).await;
    let state = within(viewer.wait_for(|state| state.like_count == 1)).await.unwrap();
    assert_eq!(state.vote(), Vote::Neutral);
}

#[tokio::test]
async fn back_to_back_toggles_read_the_previous_write() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let (_identity, engagement) = engagement_for(&store, "clicker", &post_id).await;

    engagement.toggle_like().await.unwrap();
    assert!(engagement.state().is_liked);
    engagement.toggle_like().await.unwrap();
    assert_eq!(engagement.state().vote(), Vote::Neutral);
    let post = stored_post(&store, &post_id).await;
    assert!(post.liked_by.is_empty());
    assert_eq!(post.like_count, 0);
    assert_eq!(post.like_count, post.tallied_score());

    engagement.toggle_like().await.unwrap();
    engagement.toggle_dislike().await.unwrap();
    engagement.toggle_dislike().await.unwrap();
    let post = stored_post(&store, &post_id).await;
    assert_eq!(post.vote_of("clicker"), Vote::Neutral);
    assert_eq!(post.like_count, post.tallied_score());
    assert_eq!(engagement.state().like_count, 0);

    engagement.toggle_favorite().await.unwrap();
    assert!(engagement.state().is_favorited);
    engagement.toggle_favorite().await.unwrap();
    assert!(!engagement.state().is_favorited);
    assert!(stored_profile(&store, "clicker").await.unwrap().favorite_post_ids.is_empty());
    assert!(stored_post(&store, &post_id).await.favorited_by.is_empty());
}

#[tokio::test]
async fn toggle_before_first_snapshot_uses_stored_vote() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    store
        .update(
            &DocumentPath::post(&post_id),
            &[
                FieldOperation::array_union("likedBy", "returning"),
                FieldOperation::increment("likeCount", 1),
            ],
        )
        .await
        .unwrap();
    let (_identity, session) = session_for(user("returning"));
    let engagement = PostEngagement::activate(store.clone(), session, post_id.as_str())
        .await
        .unwrap();

    assert_eq!(engagement.toggle_like().await.unwrap(), ToggleOutcome::Applied);
    let post = stored_post(&store, &post_id).await;
    assert!(post.liked_by.is_empty());
    assert_eq!(post.like_count, 0);
}
