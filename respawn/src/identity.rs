//! Identity provider seam and the injected session context.
//!
//! The engine never reaches for an ambient "current user". Every service that needs
//! one receives a [`Session`], which wraps whichever [`IdentityProvider`] the
//! application wired in.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{
    errors::IdentityError,
    validators::{is_valid_email, is_valid_url},
};

/// Authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    /// Sign-in method, e.g. `password` or `google.com`.
    pub provider_id: String,
}

impl AuthUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
            provider_id: "password".to_string(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_photo_url(mut self, photo_url: impl Into<String>) -> Self {
        self.photo_url = Some(photo_url.into());
        self
    }

    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = provider_id.into();
        self
    }

    /// Display name, else the local part of the email, else `"User"`.
    pub fn fallback_display_name(&self) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|name| !name.is_empty()) {
            return name.to_string();
        }
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or("User")
            .to_string()
    }

    fn validate(&self) -> Result<(), IdentityError> {
        if let Some(email) = &self.email
            && !is_valid_email(email)
        {
            return Err(IdentityError::InvalidEmail(email.clone()));
        }
        if let Some(photo_url) = &self.photo_url
            && !is_valid_url(photo_url)
        {
            return Err(IdentityError::InvalidPhotoUrl(photo_url.clone()));
        }
        Ok(())
    }
}

pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<AuthUser>;

    /// Accepts an identity already verified by the provider and makes it current.
    fn sign_in(&self, user: AuthUser) -> Result<AuthUser, IdentityError>;

    fn sign_out(&self) -> Result<(), IdentityError>;

    /// Receiver that observes every auth-state change.
    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>>;
}

/// In-process identity provider holding the signed-in user in a watch channel.
pub struct LocalIdentityProvider {
    state: watch::Sender<Option<AuthUser>>,
    reserved_email: Option<String>,
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            reserved_email: None,
        }
    }

    /// Rejects new registrations using `email` (the demo admin account).
    pub fn with_reserved_email(mut self, email: impl Into<String>) -> Self {
        self.reserved_email = Some(email.into());
        self
    }

    /// Registers a new account and signs it in.
    pub fn sign_up(&self, user: AuthUser) -> Result<AuthUser, IdentityError> {
        if let (Some(reserved), Some(email)) = (&self.reserved_email, &user.email)
            && reserved.eq_ignore_ascii_case(email)
        {
            return Err(IdentityError::ReservedEmail);
        }
        self.sign_in(user)
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().clone()
    }

    fn sign_in(&self, user: AuthUser) -> Result<AuthUser, IdentityError> {
        user.validate()?;
        self.state.send_replace(Some(user.clone()));
        Ok(user)
    }

    fn sign_out(&self) -> Result<(), IdentityError> {
        if self.state.borrow().is_none() {
            return Err(IdentityError::NotSignedIn);
        }
        self.state.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.state.subscribe()
    }
}

/// Explicitly injected authentication context.
#[derive(Clone)]
pub struct Session {
    identity: Arc<dyn IdentityProvider>,
    admin_email: Option<String>,
}

impl Session {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            identity,
            admin_email: None,
        }
    }

    pub fn with_admin_email(mut self, admin_email: impl Into<String>) -> Self {
        self.admin_email = Some(admin_email.into());
        self
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.identity.current_user()
    }

    /// Whether the signed-in user's email matches the configured admin email.
    pub fn is_admin(&self) -> bool {
        self.current_user()
            .and_then(|user| user.email)
            .is_some_and(|email| self.is_admin_email(&email))
    }

    /// Whether `email` is the configured admin email, ignoring case.
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_email
            .as_deref()
            .is_some_and(|admin| admin.eq_ignore_ascii_case(email))
    }

    pub fn auth_state(&self) -> watch::Receiver<Option<AuthUser>> {
        self.identity.subscribe()
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }
}
