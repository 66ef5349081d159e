//! Typed records and the decoder applied at the store boundary.
//!
//! Documents travel through the store as JSON objects with camelCase field names.
//! Every read goes through [`decode_document`], which drops `null` fields so that
//! serde defaults apply uniformly, injects the document id, and rejects values of
//! the wrong shape with [`StoreError::Decode`].

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::errors::StoreError;

/// Raw document body as held by a store.
pub type Document = Map<String, Value>;

pub const USERS: &str = "users";
pub const POSTS: &str = "posts";
pub const CATEGORIES: &str = "categories";

/// Address of a single document: `collection/id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn post(id: impl Into<String>) -> Self {
        Self::new(POSTS, id)
    }

    pub fn user(uid: impl Into<String>) -> Self {
        Self::new(USERS, uid)
    }

    pub fn category(id: impl Into<String>) -> Self {
        Self::new(CATEGORIES, id)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A typed record living in one collection.
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: &'static str;
    /// Field that carries the document id inside the decoded record.
    const ID_FIELD: &'static str;
    /// Whether the id field is also persisted in the document body.
    const STORES_ID: bool = false;

    fn id(&self) -> &str;
}

/// Decodes a stored document into `T`, normalizing missing and `null` fields.
pub fn decode_document<T: Record>(path: &DocumentPath, document: &Document) -> Result<T, StoreError> {
    let mut normalized: Document = document
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    normalized.insert(T::ID_FIELD.to_string(), Value::String(path.id.clone()));
    serde_json::from_value(Value::Object(normalized)).map_err(|err| StoreError::Decode {
        path: path.clone(),
        message: err.to_string(),
    })
}

/// Encodes a record into the document body written to the store.
pub fn encode_document<T: Record>(record: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(mut map)) => {
            if !T::STORES_ID {
                map.remove(T::ID_FIELD);
            }
            Ok(map)
        }
        Ok(_) => Err(StoreError::other("record did not serialize to an object")),
        Err(err) => Err(StoreError::other(format!("failed to serialize record: {err}"))),
    }
}

/// Timestamp value as stored in documents (RFC 3339, UTC).
pub fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn unknown_author() -> String {
    "unknown".to_string()
}

fn anonymous() -> String {
    "Anonymous".to_string()
}

fn password_provider() -> String {
    "password".to_string()
}

/// How a single viewer currently votes on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Liked,
    Disliked,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub category_slug: String,
    #[serde(default = "unknown_author")]
    pub author_id: String,
    #[serde(default = "anonymous")]
    pub author_name: String,
    #[serde(default)]
    pub author_email: Option<String>,
    #[serde(default, rename = "authorPhotoURL")]
    pub author_photo_url: Option<String>,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub image_public_id: String,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub liked_by: BTreeSet<String>,
    #[serde(default)]
    pub disliked_by: BTreeSet<String>,
    #[serde(default)]
    pub favorited_by: BTreeSet<String>,
}

impl Post {
    pub fn vote_of(&self, uid: &str) -> Vote {
        if self.liked_by.contains(uid) {
            Vote::Liked
        } else if self.disliked_by.contains(uid) {
            Vote::Disliked
        } else {
            Vote::Neutral
        }
    }

    /// Net score recomputed from the vote sets.
    pub fn tallied_score(&self) -> i64 {
        self.liked_by.len() as i64 - self.disliked_by.len() as i64
    }
}

impl Record for Post {
    const COLLECTION: &'static str = POSTS;
    const ID_FIELD: &'static str = "id";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(default = "password_provider")]
    pub provider: String,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub favorite_post_ids: BTreeSet<String>,
}

impl Record for UserProfile {
    const COLLECTION: &'static str = USERS;
    const ID_FIELD: &'static str = "uid";
    const STORES_ID: bool = true;

    fn id(&self) -> &str {
        &self.uid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Category {
    const COLLECTION: &'static str = CATEGORIES;
    const ID_FIELD: &'static str = "id";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Value of a document as delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: DocumentPath,
    pub data: Option<Document>,
}

impl Snapshot {
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Decodes the snapshot, returning `None` when the document does not exist.
    pub fn decode<T: Record>(&self) -> Result<Option<T>, StoreError> {
        self.data
            .as_ref()
            .map(|data| decode_document(&self.path, data))
            .transpose()
    }
}
