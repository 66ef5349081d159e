//! Post and category management.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{CatalogError, ValidationError, ValidationIssue},
    identity::{AuthUser, Session},
    store::{DocumentStore, FieldOperation, fetch, fetch_all},
    types::{CATEGORIES, Category, DocumentPath, POSTS, Post, UserProfile, encode_document, timestamp},
    validators::{is_valid_url, slugify},
};

pub const TITLE_MAX_LENGTH: usize = 20;
pub const DESCRIPTION_MAX_LENGTH: usize = 100;

/// Author-supplied fields of a new post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub description: String,
    pub category_id: String,
    #[serde(default)]
    pub image_public_id: String,
}

impl PostDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        let title = self.title.trim();
        if title.is_empty() {
            issues.push(ValidationIssue::new("title", "required", "title is required"));
        } else if title.chars().count() > TITLE_MAX_LENGTH {
            issues.push(ValidationIssue::new(
                "title",
                "length.max",
                format!("title must be at most {TITLE_MAX_LENGTH} characters"),
            ));
        }
        if self.description.trim().is_empty() {
            issues.push(ValidationIssue::new("description", "required", "description is required"));
        } else if self.description.chars().count() > DESCRIPTION_MAX_LENGTH {
            issues.push(ValidationIssue::new(
                "description",
                "length.max",
                format!("description must be at most {DESCRIPTION_MAX_LENGTH} characters"),
            ));
        }
        if self.category_id.trim().is_empty() {
            issues.push(ValidationIssue::new("categoryId", "required", "category is required"));
        }
        if issues.is_empty() { Ok(()) } else { Err(ValidationError::new(issues)) }
    }
}

/// Which posts [`list_posts`] returns.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub category_slug: Option<String>,
    pub author_id: Option<String>,
    pub include_unpublished: bool,
}

impl PostFilter {
    fn matches(&self, post: &Post) -> bool {
        (self.include_unpublished || post.published)
            && self.category_slug.as_deref().is_none_or(|slug| post.category_slug == slug)
            && self.author_id.as_deref().is_none_or(|author| post.author_id == author)
    }
}

/// Changes to an existing category. `None` fields are left as stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub image_url: Option<String>,
}

/// A user as listed on the admin authors page.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorSummary {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub post_count: usize,
    pub is_admin: bool,
}

fn signed_in(session: &Session, action: &'static str) -> Result<AuthUser, CatalogError> {
    session.current_user().ok_or(CatalogError::Unauthenticated { action })
}

fn require_admin(session: &Session, action: &'static str) -> Result<AuthUser, CatalogError> {
    let user = signed_in(session, action)?;
    if !session.is_admin() {
        return Err(CatalogError::Forbidden { action });
    }
    Ok(user)
}

/// Slug for `name`, unique among categories other than `except`.
async fn unique_slug<S: DocumentStore>(store: &S, name: &str, except: Option<&str>) -> Result<String, CatalogError> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(ValidationError::single("name", "required", "category name is required").into());
    }
    let taken = fetch_all::<Category, S>(store)
        .await?
        .iter()
        .any(|category| category.slug == slug && Some(category.id.as_str()) != except);
    if taken {
        return Err(ValidationError::single("name", "unique", format!("category '{slug}' already exists")).into());
    }
    Ok(slug)
}

fn check_image_url(image_url: &str) -> Result<(), CatalogError> {
    if is_valid_url(image_url) {
        Ok(())
    } else {
        Err(ValidationError::single("imageUrl", "url.invalid", "image url must be a valid url").into())
    }
}

/// Publishes a post authored by the signed-in user.
pub async fn create_post<S: DocumentStore>(store: &S, session: &Session, draft: PostDraft) -> Result<Post, CatalogError> {
    let author = signed_in(session, "create a post")?;
    draft.validate()?;
    let category: Category = fetch(store, draft.category_id.trim())
        .await?
        .ok_or_else(|| CatalogError::NotFound {
            entity: "category",
            id: draft.category_id.clone(),
        })?;

    let now = Utc::now();
    let mut post = Post {
        id: String::new(),
        title: draft.title.trim().to_string(),
        description: draft.description,
        category_id: category.id,
        category_name: category.name,
        category_slug: category.slug,
        author_id: author.uid.clone(),
        author_name: author.fallback_display_name(),
        author_email: author.email.clone(),
        author_photo_url: author.photo_url.clone(),
        created_at: now,
        updated_at: now,
        published: true,
        image_public_id: draft.image_public_id,
        like_count: 0,
        liked_by: BTreeSet::new(),
        disliked_by: BTreeSet::new(),
        favorited_by: BTreeSet::new(),
    };
    post.id = store.create(POSTS, encode_document(&post)?).await?;
    info!("post {} created by {}", post.id, author.uid);
    Ok(post)
}

pub async fn get_post<S: DocumentStore>(store: &S, id: &str) -> Result<Post, CatalogError> {
    fetch(store, id).await?.ok_or_else(|| CatalogError::NotFound {
        entity: "post",
        id: id.to_string(),
    })
}

/// Posts matching `filter`, newest first.
pub async fn list_posts<S: DocumentStore>(store: &S, filter: &PostFilter) -> Result<Vec<Post>, CatalogError> {
    let mut posts: Vec<Post> = fetch_all::<Post, S>(store)
        .await?
        .into_iter()
        .filter(|post| filter.matches(post))
        .collect();
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(posts)
}

/// Deletes a post. Only its author or the admin may do so.
pub async fn delete_post<S: DocumentStore>(store: &S, session: &Session, id: &str) -> Result<(), CatalogError> {
    let user = signed_in(session, "delete posts")?;
    let post = get_post(store, id).await?;
    if post.author_id != user.uid && !session.is_admin() {
        return Err(CatalogError::Forbidden { action: "delete this post" });
    }
    store.delete(&DocumentPath::post(id)).await?;
    info!("post {id} deleted by {}", user.uid);
    Ok(())
}

/// Creates a category. Admin only.
pub async fn create_category<S: DocumentStore>(
    store: &S,
    session: &Session,
    name: &str,
    image_url: &str,
) -> Result<Category, CatalogError> {
    require_admin(session, "create categories")?;

    let name = name.trim();
    let mut issues = Vec::new();
    if slugify(name).is_empty() {
        issues.push(ValidationIssue::new("name", "required", "category name is required"));
    }
    if !is_valid_url(image_url) {
        issues.push(ValidationIssue::new("imageUrl", "url.invalid", "image url must be a valid url"));
    }
    if !issues.is_empty() {
        return Err(ValidationError::new(issues).into());
    }
    let slug = unique_slug(store, name, None).await?;

    let mut category = Category {
        id: String::new(),
        name: name.to_string(),
        slug,
        image_url: image_url.to_string(),
        created_at: Some(Utc::now()),
        updated_at: None,
    };
    category.id = store.create(CATEGORIES, encode_document(&category)?).await?;
    debug!("category {} created as {}", category.slug, category.id);
    Ok(category)
}

pub async fn get_category<S: DocumentStore>(store: &S, id: &str) -> Result<Category, CatalogError> {
    fetch(store, id).await?.ok_or_else(|| CatalogError::NotFound {
        entity: "category",
        id: id.to_string(),
    })
}

/// Renames a category or replaces its image. Admin only.
///
/// Posts keep the category name and slug they were created with.
pub async fn update_category<S: DocumentStore>(
    store: &S,
    session: &Session,
    id: &str,
    update: CategoryUpdate,
) -> Result<Category, CatalogError> {
    require_admin(session, "edit categories")?;
    let mut category = get_category(store, id).await?;

    let mut operations = Vec::new();
    if let Some(name) = update.name.as_deref().map(str::trim) {
        let slug = unique_slug(store, name, Some(id)).await?;
        operations.push(FieldOperation::assign("name", name));
        operations.push(FieldOperation::assign("slug", slug.as_str()));
        category.name = name.to_string();
        category.slug = slug;
    }
    if let Some(image_url) = update.image_url.filter(|url| *url != category.image_url) {
        check_image_url(&image_url)?;
        operations.push(FieldOperation::assign("imageUrl", image_url.as_str()));
        category.image_url = image_url;
    }
    if operations.is_empty() {
        return Ok(category);
    }

    let now = Utc::now();
    operations.push(FieldOperation::assign("updatedAt", timestamp(now)));
    store.update(&DocumentPath::category(id), &operations).await?;
    category.updated_at = Some(now);
    info!("category {id} updated as {}", category.slug);
    Ok(category)
}

/// Deletes a category. Admin only. Posts filed under it are kept.
pub async fn delete_category<S: DocumentStore>(store: &S, session: &Session, id: &str) -> Result<(), CatalogError> {
    require_admin(session, "delete categories")?;
    if !store.delete(&DocumentPath::category(id)).await? {
        return Err(CatalogError::NotFound {
            entity: "category",
            id: id.to_string(),
        });
    }
    info!("category {id} deleted");
    Ok(())
}

/// Every category, sorted by name.
pub async fn list_categories<S: DocumentStore>(store: &S) -> Result<Vec<Category>, CatalogError> {
    let mut categories = fetch_all::<Category, S>(store).await?;
    categories.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(categories)
}

/// Every user profile with the number of posts they wrote, newest account first.
/// Admin only.
pub async fn list_authors<S: DocumentStore>(store: &S, session: &Session) -> Result<Vec<AuthorSummary>, CatalogError> {
    require_admin(session, "manage authors")?;
    let mut post_counts: HashMap<String, usize> = HashMap::new();
    for post in fetch_all::<Post, S>(store).await? {
        *post_counts.entry(post.author_id).or_default() += 1;
    }

    let mut authors: Vec<AuthorSummary> = fetch_all::<UserProfile, S>(store)
        .await?
        .into_iter()
        .map(|profile| AuthorSummary {
            post_count: post_counts.get(&profile.uid).copied().unwrap_or_default(),
            is_admin: session.is_admin_email(&profile.email),
            profile,
        })
        .collect();
    authors.sort_by(|a, b| {
        b.profile
            .created_at
            .cmp(&a.profile.created_at)
            .then_with(|| a.profile.uid.cmp(&b.profile.uid))
    });
    Ok(authors)
}
