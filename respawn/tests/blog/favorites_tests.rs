use crate::support::*;
use respawn::{
    FavoritesFeed, ProfileSync,
    favorites::{resolve_favorites, resolve_in_batches},
};

async fn seed_posts(store: &MemoryStore, count: i64) -> BTreeSet<String> {
    let base = Utc::now() - ChronoDuration::days(1);
    let mut ids = BTreeSet::new();
    for minute in 0..count {
        ids.insert(seed_post_at(store, "author", base + ChronoDuration::minutes(minute)).await);
    }
    ids
}

fn assert_newest_first(posts: &[Post]) {
    assert!(posts.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));
}

#[tokio::test]
async fn twenty_three_favorites_take_three_queries() {
    let store = MemoryStore::new();
    let ids = seed_posts(&store, 23).await;

    let before = store.batch_query_count();
    let posts = resolve_favorites(&store, &ids).await.unwrap();
    assert_eq!(store.batch_query_count() - before, 3);
    assert_eq!(posts.len(), 23);
    assert_newest_first(&posts);
    let resolved: BTreeSet<String> = posts.iter().map(|post| post.id.clone()).collect();
    assert_eq!(resolved, ids);
}

#[tokio::test]
async fn deleted_posts_are_skipped() {
    let store = MemoryStore::new();
    let mut ids = seed_posts(&store, 4).await;
    ids.insert("deleted-post".to_string());

    let posts = resolve_favorites(&store, &ids).await.unwrap();
    assert_eq!(posts.len(), 4);
    assert!(posts.iter().all(|post| post.id != "deleted-post"));
}

#[tokio::test]
async fn smaller_batches_issue_more_queries() {
    let store = MemoryStore::new();
    let ids = seed_posts(&store, 23).await;

    let before = store.batch_query_count();
    let posts = resolve_in_batches(&store, &ids, 5).await.unwrap();
    assert_eq!(store.batch_query_count() - before, 5);
    assert_eq!(posts.len(), 23);

    let before = store.batch_query_count();
    resolve_in_batches(&store, &ids, 50).await.unwrap();
    assert_eq!(store.batch_query_count() - before, 3);
}

#[tokio::test]
async fn feed_resolves_only_when_favorite_ids_change() {
    let store = Arc::new(MemoryStore::new());
    let ids: Vec<String> = seed_posts(&store, 3).await.into_iter().collect();
    let (_identity, session) = session_for(user("fan"));
    ProfileSync::new(store.clone()).sync(&user("fan")).await.unwrap();
    let user_path = DocumentPath::user("fan");
    store
        .update(&user_path, &[FieldOperation::array_union("favoritePostIds", ids[0].as_str())])
        .await
        .unwrap();

    let mut feed = FavoritesFeed::open(store.clone(), &session).await.unwrap().expect("signed in");
    let first = within(feed.next()).await.unwrap().unwrap();
    assert_eq!(first.len(), 1);

    let queries = store.batch_query_count();
    store
        .update(&user_path, &[FieldOperation::assign("displayName", "Fan")])
        .await
        .unwrap();
    store
        .update(&user_path, &[FieldOperation::array_union("favoritePostIds", ids[1].as_str())])
        .await
        .unwrap();
    let second = within(feed.next()).await.unwrap().unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(store.batch_query_count() - queries, 1);
    assert_newest_first(&second);
    assert_eq!(feed.ids().map(BTreeSet::len), Some(2));
}

#[tokio::test]
async fn empty_favorites_skip_queries() {
    let store = Arc::new(MemoryStore::new());
    let (_identity, session) = session_for(user("newcomer"));

    let mut feed = FavoritesFeed::open(store.clone(), &session).await.unwrap().unwrap();
    let posts = within(feed.next()).await.unwrap().unwrap();
    assert!(posts.is_empty());
    assert_eq!(store.batch_query_count(), 0);
}

#[tokio::test]
async fn feed_requires_signed_in_user() {
    let store = Arc::new(MemoryStore::new());
    let (_identity, session) = anonymous_session();
    assert!(FavoritesFeed::open(store, &session).await.unwrap().is_none());
}

#[tokio::test]
async fn failed_resolution_retries_on_next_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let post_id = seed_post(&store, "author").await;
    let post_path = DocumentPath::post(&post_id);
    store
        .update(&post_path, &[FieldOperation::assign("likeCount", "lots")])
        .await
        .unwrap();
    let (_identity, session) = session_for(user("fan"));
    ProfileSync::new(store.clone()).sync(&user("fan")).await.unwrap();
    let user_path = DocumentPath::user("fan");
    store
        .update(&user_path, &[FieldOperation::array_union("favoritePostIds", post_id.as_str())])
        .await
        .unwrap();

    let mut feed = FavoritesFeed::open(store.clone(), &session).await.unwrap().unwrap();
    assert!(within(feed.next()).await.unwrap().is_err());
    assert!(feed.ids().is_none());

    store
        .update(&post_path, &[FieldOperation::assign("likeCount", 0)])
        .await
        .unwrap();
    store
        .update(&user_path, &[FieldOperation::assign("displayName", "Fan")])
        .await
        .unwrap();
    let posts = within(feed.next()).await.unwrap().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, post_id);
}
