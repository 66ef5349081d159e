use crate::support::*;
use respawn::{
    CatalogError, CategoryUpdate, PostDraft, PostFilter, ProfileSync,
    catalog::{
        create_category, create_post, delete_category, delete_post, get_category, get_post, list_authors,
        list_categories, list_posts, update_category,
    },
};

fn draft(title: &str, category_id: &str) -> PostDraft {
    PostDraft {
        title: title.to_string(),
        description: "<p>Tips and tricks</p>".to_string(),
        category_id: category_id.to_string(),
        image_public_id: String::new(),
    }
}

#[tokio::test]
async fn only_admin_creates_categories() {
    let store = MemoryStore::new();
    let (_admin, admin) = admin_session();
    let (_player, player) = session_for(user("player"));

    let category = create_category(&store, &admin, "Role Playing Games", "https://cdn.example.com/rpg.png")
        .await
        .unwrap();
    assert_eq!(category.slug, "role-playing-games");
    assert!(category.created_at.is_some());

    let err = create_category(&store, &player, "Shooters", "https://cdn.example.com/fps.png")
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Forbidden { .. }));
}

#[tokio::test]
async fn category_input_is_validated() {
    let store = MemoryStore::new();
    let (_admin, admin) = admin_session();

    let err = create_category(&store, &admin, "Puzzle", "not a url").await.unwrap_err();
    assert!(matches!(err, CatalogError::Validation(_)));

    create_category(&store, &admin, "Puzzle", "https://cdn.example.com/p.png")
        .await
        .unwrap();
    let duplicate = create_category(&store, &admin, "  puzzle ", "https://cdn.example.com/p.png")
        .await
        .unwrap_err();
    assert!(matches!(duplicate, CatalogError::Validation(err) if err.issues[0].code == "unique"));
}

#[tokio::test]
async fn categories_list_by_name() {
    let store = MemoryStore::new();
    let (_admin, admin) = admin_session();
    for name in ["Strategy", "action", "Indie"] {
        create_category(&store, &admin, name, "https://cdn.example.com/c.png")
            .await
            .unwrap();
    }
    let names: Vec<String> = list_categories(&store)
        .await
        .unwrap()
        .into_iter()
        .map(|category| category.name)
        .collect();
    assert_eq!(names, ["action", "Indie", "Strategy"]);
}

#[tokio::test]
async fn new_posts_are_stamped_from_identity() {
    let store = MemoryStore::new();
    let (_admin, admin) = admin_session();
    let category = create_category(&store, &admin, "Indie", "https://cdn.example.com/indie.png")
        .await
        .unwrap();
    let (_author, author) = session_for(user("kara"));

    let post = create_post(&store, &author, draft("  Celeste  ", &category.id)).await.unwrap();
    assert_eq!(post.title, "Celeste");
    assert_eq!(post.author_id, "kara");
    assert_eq!(post.author_name, "kara");
    assert_eq!(post.author_email.as_deref(), Some("kara@example.com"));
    assert_eq!(post.category_slug, "indie");
    assert!(post.published);

    let stored = get_post(&store, &post.id).await.unwrap();
    assert_eq!(stored, post);
    assert_eq!(stored.like_count, 0);
    assert!(stored.liked_by.is_empty() && stored.disliked_by.is_empty() && stored.favorited_by.is_empty());
}

#[tokio::test]
async fn post_creation_requires_identity_and_known_category() {
    let store = MemoryStore::new();
    let (_anonymous, anonymous) = anonymous_session();
    let (_author, author) = session_for(user("kara"));

    let err = create_post(&store, &anonymous, draft("Celeste", "c1")).await.unwrap_err();
    assert!(matches!(err, CatalogError::Unauthenticated { .. }));

    let err = create_post(&store, &author, draft("Celeste", "missing")).await.unwrap_err();
    assert!(matches!(err, CatalogError::NotFound { entity: "category", .. }));

    let err = create_post(&store, &author, draft("", "missing")).await.unwrap_err();
    assert!(matches!(err, CatalogError::Validation(_)));
    assert!(store.list(POSTS).await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_filters_and_sorts_newest_first() {
    let store = MemoryStore::new();
    let (_admin, admin) = admin_session();
    let indie = create_category(&store, &admin, "Indie", "https://cdn.example.com/i.png")
        .await
        .unwrap();
    let rpg = create_category(&store, &admin, "RPG", "https://cdn.example.com/r.png")
        .await
        .unwrap();
    let (_author, author) = session_for(user("kara"));

    let first = create_post(&store, &author, draft("Celeste", &indie.id)).await.unwrap();
    store
        .update(
            &DocumentPath::post(&first.id),
            &[FieldOperation::assign("createdAt", timestamp(Utc::now() - ChronoDuration::hours(1)))],
        )
        .await
        .unwrap();
    let second = create_post(&store, &author, draft("Baldur's Gate", &rpg.id)).await.unwrap();
    let hidden = create_post(&store, &author, draft("Draft", &rpg.id)).await.unwrap();
    store
        .update(&DocumentPath::post(&hidden.id), &[FieldOperation::assign("published", false)])
        .await
        .unwrap();

    let all = list_posts(&store, &PostFilter::default()).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|post| post.id.as_str()).collect();
    assert_eq!(ids, [second.id.as_str(), first.id.as_str()]);

    let rpg_only = PostFilter {
        category_slug: Some("rpg".into()),
        include_unpublished: true,
        ..PostFilter::default()
    };
    assert_eq!(list_posts(&store, &rpg_only).await.unwrap().len(), 2);
}

#[tokio::test]
async fn only_author_or_admin_deletes_posts() {
    let store = MemoryStore::new();
    let post_id = seed_post(&store, "kara").await;
    let (_other, other) = session_for(user("mika"));
    let (_admin, admin) = admin_session();

    let err = delete_post(&store, &other, &post_id).await.unwrap_err();
    assert!(matches!(err, CatalogError::Forbidden { .. }));

    delete_post(&store, &admin, &post_id).await.unwrap();
    assert!(matches!(
        get_post(&store, &post_id).await,
        Err(CatalogError::NotFound { entity: "post", .. })
    ));
}

#[tokio::test]
async fn admin_renames_category_and_keeps_slug_unique() {
    let store = MemoryStore::new();
    let (_admin, admin) = admin_session();
    let (_player, player) = session_for(user("player"));
    let rpg = create_category(&store, &admin, "RPG", "https://cdn.example.com/r.png")
        .await
        .unwrap();
    create_category(&store, &admin, "Indie", "https://cdn.example.com/i.png")
        .await
        .unwrap();

    let rename = CategoryUpdate {
        name: Some("Role Playing".into()),
        image_url: None,
    };
    let err = update_category(&store, &player, &rpg.id, rename.clone()).await.unwrap_err();
    assert!(matches!(err, CatalogError::Forbidden { .. }));

    let updated = update_category(&store, &admin, &rpg.id, rename).await.unwrap();
    assert_eq!((updated.name.as_str(), updated.slug.as_str()), ("Role Playing", "role-playing"));
    let stored = get_category(&store, &rpg.id).await.unwrap();
    assert_eq!(stored.slug, "role-playing");
    assert_eq!(stored.image_url, "https://cdn.example.com/r.png");
    assert!(stored.updated_at.is_some());

    let clash = CategoryUpdate {
        name: Some("indie".into()),
        image_url: None,
    };
    let err = update_category(&store, &admin, &rpg.id, clash).await.unwrap_err();
    assert!(matches!(err, CatalogError::Validation(err) if err.issues[0].code == "unique"));

    let same_slug = CategoryUpdate {
        name: Some("ROLE playing".into()),
        image_url: Some("https://cdn.example.com/rpg-v2.png".into()),
    };
    let updated = update_category(&store, &admin, &rpg.id, same_slug).await.unwrap();
    assert_eq!(updated.image_url, "https://cdn.example.com/rpg-v2.png");

    let bad_image = CategoryUpdate {
        name: None,
        image_url: Some("not a url".into()),
    };
    assert!(matches!(
        update_category(&store, &admin, &rpg.id, bad_image).await,
        Err(CatalogError::Validation(_))
    ));
}

#[tokio::test]
async fn admin_deletes_categories() {
    let store = MemoryStore::new();
    let (_admin, admin) = admin_session();
    let (_player, player) = session_for(user("player"));
    let puzzle = create_category(&store, &admin, "Puzzle", "https://cdn.example.com/p.png")
        .await
        .unwrap();

    let err = delete_category(&store, &player, &puzzle.id).await.unwrap_err();
    assert!(matches!(err, CatalogError::Forbidden { .. }));

    delete_category(&store, &admin, &puzzle.id).await.unwrap();
    assert!(list_categories(&store).await.unwrap().is_empty());
    assert!(matches!(
        delete_category(&store, &admin, &puzzle.id).await,
        Err(CatalogError::NotFound { entity: "category", .. })
    ));
    assert!(matches!(
        update_category(&store, &admin, &puzzle.id, CategoryUpdate::default()).await,
        Err(CatalogError::NotFound { .. })
    ));
}

#[tokio::test]
async fn authors_list_counts_posts_newest_account_first() {
    let store = Arc::new(MemoryStore::new());
    let sync = ProfileSync::new(store.clone());
    sync.sync(&user("veteran")).await.unwrap();
    store
        .update(
            &DocumentPath::user("veteran"),
            &[FieldOperation::assign("createdAt", timestamp(Utc::now() - ChronoDuration::days(30)))],
        )
        .await
        .unwrap();
    sync.sync(&AuthUser::new("admin").with_email(ADMIN_EMAIL)).await.unwrap();
    sync.sync(&user("lurker")).await.unwrap();
    for _ in 0..2 {
        seed_post(&store, "veteran").await;
    }
    seed_post(&store, "admin").await;

    let (_player, player) = session_for(user("lurker"));
    assert!(matches!(
        list_authors(store.as_ref(), &player).await,
        Err(CatalogError::Forbidden { .. })
    ));

    let (_admin, admin) = admin_session();
    let authors = list_authors(store.as_ref(), &admin).await.unwrap();
    let rows: Vec<(&str, usize, bool)> = authors
        .iter()
        .map(|author| (author.profile.uid.as_str(), author.post_count, author.is_admin))
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2], ("veteran", 2, false));
    assert!(rows.contains(&("admin", 1, true)));
    assert!(rows.contains(&("lurker", 0, false)));
}
