//! Respawn core library.
//!
//! Engagement (likes, dislikes, favorites) for a gaming blog on top of a
//! document store with atomic field operations and push subscriptions. Two
//! backends ship with the crate: [`MemoryStore`] for tests and local use, and
//! [`RedisStore`] on Redis Stack (RedisJSON + pub/sub).

pub mod catalog;
pub mod config;
pub mod engagement;
pub mod errors;
pub mod favorites;
pub mod id;
pub mod identity;
pub mod keys;
pub mod notice;
pub mod profile;
pub mod runtime;
pub mod store;
pub mod types;
pub mod validators;

pub use catalog::{AuthorSummary, CategoryUpdate, PostDraft, PostFilter};
pub use config::{Backend, Config};
pub use engagement::{EngagementState, PostEngagement, ToggleOutcome};
pub use errors::*;
pub use favorites::{FavoritesFeed, resolve_favorites};
pub use identity::{AuthUser, IdentityProvider, LocalIdentityProvider, Session};
pub use notice::{Notice, NoticeLevel, Notifier};
pub use profile::{ProfileSync, ProfileView, RenameOutcome};
pub use store::{DocumentStore, FieldOperation, MAX_BATCH_IDS, MemoryStore, RedisStore, Subscription, UpsertOutcome};
pub use types::{Category, Document, DocumentPath, Post, Snapshot, UserProfile, Vote};

pub use redis;
