use std::{borrow::Cow, path::PathBuf};

use thiserror::Error;

use crate::types::DocumentPath;

/// Error type returned by every [`DocumentStore`](crate::store::DocumentStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Target document was not found when performing an update.
    #[error("document not found: {path}")]
    NotFound { path: DocumentPath },

    /// Invalid input supplied to a store operation.
    #[error("invalid request: {message}")]
    InvalidRequest { message: Cow<'static, str> },

    /// A stored document could not be decoded into its typed record.
    #[error("malformed document {path}: {message}")]
    Decode { path: DocumentPath, message: String },

    /// The store refused the write.
    #[error("permission denied writing {path}")]
    PermissionDenied { path: DocumentPath },

    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

impl StoreError {
    pub fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidRequest { message: message.into() }
    }

    pub fn other(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Other { message: message.into() }
    }
}

/// Failures surfaced by the vote/favorite engine.
#[derive(Debug, Error)]
pub enum EngagementError {
    /// A toggle was attempted without a signed-in user. No write was issued.
    #[error("you must be signed in to {action}")]
    Unauthenticated { action: &'static str },

    /// The store rejected the update. The view stays at the last confirmed snapshot.
    #[error("write rejected: {0}")]
    WriteRejected(#[source] StoreError),

    /// The user document changed but the post document did not, and the
    /// compensating write failed too.
    #[error("favorite link between user '{user_id}' and post '{post_id}' is inconsistent")]
    PartialFavoriteUpdate {
        post_id: String,
        user_id: String,
        #[source]
        source: StoreError,
    },

    /// A subscription could not be attached or its push channel failed.
    #[error("listener error: {0}")]
    Listener(#[source] StoreError),
}

/// Failures surfaced by post and category management.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("you must be signed in to {action}")]
    Unauthenticated { action: &'static str },

    #[error("not allowed to {action}")]
    Forbidden { action: &'static str },

    #[error("validation failed")]
    Validation(#[from] ValidationError),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures surfaced by profile edits.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("you must be signed in to {action}")]
    Unauthenticated { action: &'static str },

    #[error("validation failed")]
    Validation(#[from] ValidationError),

    /// The user has no profile document yet.
    #[error("profile '{uid}' not found")]
    NotFound { uid: String },

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures raised by an identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid email address '{0}'")]
    InvalidEmail(String),

    #[error("this email is reserved, please use a different email")]
    ReservedEmail,

    #[error("invalid photo url '{0}'")]
    InvalidPhotoUrl(String),

    #[error("no user is signed in")]
    NotSignedIn,
}

/// Failures loading `.respawn/config.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("environment variable {0} not set")]
    MissingEnv(String),

    #[error("invalid configuration: {0}")]
    Invalid(Cow<'static, str>),
}

/// Collection of validation issues encountered while preparing a write.
#[derive(Debug, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Detailed validation failure for a single field.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}
