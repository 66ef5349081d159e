//! Mirrors identity-provider users into `users` documents.

use std::{collections::BTreeSet, sync::Arc};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::{
    errors::{ProfileError, StoreError, ValidationError},
    identity::{AuthUser, IdentityProvider, Session},
    store::{DocumentStore, FieldOperation, Subscription, UpsertOutcome, fetch},
    types::{DocumentPath, UserProfile, encode_document, timestamp},
    validators::is_valid_display_name,
};

pub const DISPLAY_NAME_MAX_LENGTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,
    /// The stored name already matched; nothing was written.
    Unchanged,
}

/// Trims `name` and checks it is a usable display name.
pub fn validate_display_name(name: &str) -> Result<&str, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::single("displayName", "required", "Name cannot be empty"));
    }
    if name.chars().count() > DISPLAY_NAME_MAX_LENGTH {
        return Err(ValidationError::single(
            "displayName",
            "length.max",
            format!("Name must be {DISPLAY_NAME_MAX_LENGTH} characters or less"),
        ));
    }
    if !is_valid_display_name(name) {
        return Err(ValidationError::single("displayName", "charset", "Invalid characters used"));
    }
    Ok(name)
}

/// Profile written the first time a user is seen.
pub fn new_profile(user: &AuthUser, now: DateTime<Utc>, favorite_post_ids: BTreeSet<String>) -> UserProfile {
    UserProfile {
        uid: user.uid.clone(),
        display_name: user.fallback_display_name(),
        email: user.email.clone().unwrap_or_default(),
        photo_url: user.photo_url.clone(),
        provider: user.provider_id.clone(),
        created_at: now,
        updated_at: now,
        last_login: Some(now),
        favorite_post_ids,
    }
}

/// Stored profile with identity values filling any blank display field.
pub fn merge_profile(user: &AuthUser, stored: Option<UserProfile>, now: DateTime<Utc>) -> UserProfile {
    let Some(mut profile) = stored else {
        return new_profile(user, now, BTreeSet::new());
    };
    if profile.display_name.is_empty() {
        profile.display_name = user.fallback_display_name();
    }
    if profile.email.is_empty() {
        profile.email = user.email.clone().unwrap_or_default();
    }
    if profile.photo_url.as_deref().is_none_or(str::is_empty) {
        profile.photo_url = user.photo_url.clone();
    }
    profile
}

pub struct ProfileSync<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> ProfileSync<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates the user's document, or refreshes its display fields while keeping
    /// the stored favorites.
    pub async fn sync(&self, user: &AuthUser) -> Result<UpsertOutcome, StoreError> {
        let now = Utc::now();
        let path = DocumentPath::user(&user.uid);
        let create = encode_document(&new_profile(user, now, BTreeSet::new()))?;

        let mut operations = vec![
            FieldOperation::assign("lastLogin", timestamp(now)),
            FieldOperation::assign("updatedAt", timestamp(now)),
            // Initializes a missing favorites list without touching an existing one.
            FieldOperation::ArrayUnion {
                field: "favoritePostIds".to_string(),
                values: Vec::new(),
            },
        ];
        if let Some(email) = user.email.as_deref() {
            operations.push(FieldOperation::assign("email", email));
        }
        if let Some(name) = user.display_name.as_deref().filter(|name| !name.is_empty()) {
            operations.push(FieldOperation::assign("displayName", name));
        }
        if let Some(photo_url) = user.photo_url.as_deref().filter(|url| !url.is_empty()) {
            operations.push(FieldOperation::assign("photoURL", photo_url));
        }

        let outcome = self.store.upsert(&path, create, &operations).await?;
        debug!("profile sync for {}: {outcome:?}", user.uid);
        Ok(outcome)
    }

    /// Changes the signed-in user's display name in both the profile document and
    /// the identity provider.
    pub async fn rename(&self, session: &Session, name: &str) -> Result<RenameOutcome, ProfileError> {
        let user = session
            .current_user()
            .ok_or(ProfileError::Unauthenticated { action: "update your profile" })?;
        let name = validate_display_name(name)?;
        let stored = fetch::<UserProfile, S>(self.store.as_ref(), &user.uid)
            .await?
            .ok_or_else(|| ProfileError::NotFound { uid: user.uid.clone() })?;
        if stored.display_name == name {
            return Ok(RenameOutcome::Unchanged);
        }

        let operations = [
            FieldOperation::assign("displayName", name),
            FieldOperation::assign("updatedAt", timestamp(Utc::now())),
        ];
        self.store.update(&DocumentPath::user(&user.uid), &operations).await?;
        session.identity().sign_in(user.clone().with_display_name(name))?;
        info!("profile {} renamed to {name}", user.uid);
        Ok(RenameOutcome::Renamed)
    }

    /// Syncs on every auth-state change to a signed-in user. Returns once the
    /// identity provider goes away.
    pub async fn follow(&self, session: &Session) {
        let mut auth_state = session.auth_state();
        loop {
            let current = auth_state.borrow_and_update().clone();
            if let Some(user) = current
                && let Err(err) = self.sync(&user).await
            {
                warn!("profile sync for {} failed: {err}", user.uid);
            }
            if auth_state.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Live view of the signed-in user's profile.
pub struct ProfileView {
    user: AuthUser,
    subscription: Subscription,
    current: Option<UserProfile>,
}

impl ProfileView {
    /// Opens a view for the current user, or `None` when nobody is signed in.
    pub async fn open<S: DocumentStore>(store: &S, session: &Session) -> Result<Option<Self>, StoreError> {
        let Some(user) = session.current_user() else {
            return Ok(None);
        };
        let subscription = store.subscribe(&DocumentPath::user(&user.uid)).await?;
        Ok(Some(Self {
            user,
            subscription,
            current: None,
        }))
    }

    /// Latest merged profile, if one has been delivered.
    pub fn current(&self) -> Option<&UserProfile> {
        self.current.as_ref()
    }

    /// Waits for the next snapshot and merges it with the identity values.
    ///
    /// A missing document yields a profile built from the identity alone. Returns
    /// `None` once the listener is detached.
    pub async fn next(&mut self) -> Option<Result<UserProfile, StoreError>> {
        let event = self.subscription.next().await?;
        let merged = event
            .and_then(|snapshot| snapshot.decode::<UserProfile>())
            .map(|stored| merge_profile(&self.user, stored, Utc::now()));
        match merged {
            Ok(profile) => {
                self.current = Some(profile.clone());
                Some(Ok(profile))
            }
            Err(err) => {
                warn!("profile listener for {} failed: {err}", self.user.uid);
                Some(Err(err))
            }
        }
    }
}
