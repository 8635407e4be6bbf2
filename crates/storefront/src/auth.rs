//! Authentication session.
//!
//! Holds the bearer token and profile of the signed-in shopper and mirrors
//! them to the key-value store under `token`, `sessionId` and `user`. The
//! session identifier is the token itself once signed in, so the cart
//! snapshot follows the account. Profile reads and edits refresh the stored
//! `user` entry.

use medmart_core::{Email, SessionId, ShippingAddress};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::{
    ApiError, AuthResponse, AuthService, Credentials, PasswordChange, ProfileUpdate, Registration,
    User,
};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::store::{KeyValueStore, keys};

/// Errors that can occur during login or registration.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] medmart_core::EmailError),

    #[error("password cannot be empty")]
    EmptyPassword,

    #[error("name cannot be empty")]
    MissingName,

    /// Profile and password operations need a signed-in session.
    #[error("not signed in")]
    NotSignedIn,

    /// The new password and its confirmation differ.
    #[error("new passwords do not match")]
    PasswordMismatch,

    #[error("nothing to update")]
    NothingToUpdate,

    /// The auth service rejected the request or could not be reached.
    #[error("auth service error: {0}")]
    Api(#[from] ApiError),
}

/// Sign-up form input.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub name: String,
    pub email: String,
    pub password: SecretString,
    pub phone: Option<String>,
    pub address: Option<ShippingAddress>,
}

/// Profile edit form input; `None` leaves a field as it is. An empty phone
/// clears it.
#[derive(Debug, Clone, Default)]
pub struct ProfileEdit {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<ShippingAddress>,
}

/// Signed-in state for the current shopper.
#[derive(Debug)]
pub struct AuthSession<S: KeyValueStore> {
    store: S,
    token: Option<SecretString>,
    user: Option<User>,
    session: SessionId,
}

impl<S: KeyValueStore> AuthSession<S> {
    /// Signed-out session with a fresh anonymous identifier.
    pub fn new(store: S) -> Self {
        Self {
            store,
            token: None,
            user: None,
            session: SessionId::anonymous(),
        }
    }

    /// Rebuild the session from whatever the store holds.
    ///
    /// Unreadable entries are logged and treated as absent, so a damaged
    /// store degrades to a signed-out session rather than an error.
    #[instrument(skip_all)]
    pub fn restore(store: S) -> Self {
        let read = |key: &str| match store.get(key) {
            Ok(value) => value.filter(|value| !value.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "Failed to read auth session");
                None
            }
        };

        let token = read(keys::TOKEN).map(SecretString::from);
        let user = read(keys::USER).and_then(|raw| {
            serde_json::from_str::<User>(&raw)
                .inspect_err(|e| warn!(error = %e, "Discarding unreadable stored user"))
                .ok()
        });
        let session = read(keys::SESSION_ID)
            .and_then(|raw| SessionId::parse(raw).ok())
            .unwrap_or_else(SessionId::anonymous);

        if let Some(user) = &user {
            set_sentry_user(&user.id, Some(user.email.as_str()));
        }

        Self {
            store,
            token,
            user,
            session,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub const fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    /// Identifier the cart snapshot is stored under.
    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::EmptyPassword` before
    /// contacting the service, and `AuthError::Api` if the service refuses.
    #[instrument(skip(self, service, password))]
    pub async fn login(
        &mut self,
        service: &dyn AuthService,
        email: &str,
        password: SecretString,
    ) -> Result<&User, AuthError> {
        let email = Email::parse(email)?;
        if password.expose_secret().is_empty() {
            return Err(AuthError::EmptyPassword);
        }

        let response = service.login(&Credentials { email, password }).await?;
        Ok(self.establish(response))
    }

    /// Create an account and sign in.
    ///
    /// # Errors
    ///
    /// Returns a validation `AuthError` for a blank name, malformed email or
    /// empty password, and `AuthError::Api` if the service refuses.
    #[instrument(skip_all)]
    pub async fn register(
        &mut self,
        service: &dyn AuthService,
        form: SignUp,
    ) -> Result<&User, AuthError> {
        let name = form.name.trim();
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }
        let email = Email::parse(&form.email)?;
        if form.password.expose_secret().is_empty() {
            return Err(AuthError::EmptyPassword);
        }

        let address = match form.address {
            Some(address) => Some(serde_json::to_string(&address).map_err(ApiError::from)?),
            None => None,
        };
        let registration = Registration {
            name: name.to_string(),
            email,
            password: form.password,
            phone: form.phone.filter(|phone| !phone.trim().is_empty()),
            address,
        };

        let response = service.register(&registration).await?;
        Ok(self.establish(response))
    }

    /// Fetch the profile from the service and store it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` without a session and `AuthError::Api`
    /// if the service refuses. The stored profile is kept on error.
    #[instrument(skip_all)]
    pub async fn refresh_profile(&mut self, service: &dyn AuthService) -> Result<&User, AuthError> {
        let token = self.token.as_ref().ok_or(AuthError::NotSignedIn)?;
        let user = service.profile(token.expose_secret()).await?;
        Ok(self.replace_user(user))
    }

    /// Change profile fields and store the updated profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` without a session, a validation
    /// `AuthError` for a blank name, malformed email or empty edit, and
    /// `AuthError::Api` if the service refuses.
    #[instrument(skip_all)]
    pub async fn update_profile(
        &mut self,
        service: &dyn AuthService,
        edit: ProfileEdit,
    ) -> Result<&User, AuthError> {
        let token = self.token.as_ref().ok_or(AuthError::NotSignedIn)?;

        let name = match edit.name {
            Some(name) if name.trim().is_empty() => return Err(AuthError::MissingName),
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        let email = edit.email.as_deref().map(Email::parse).transpose()?;
        let address = match edit.address {
            Some(address) => Some(serde_json::to_string(&address).map_err(ApiError::from)?),
            None => None,
        };
        let update = ProfileUpdate {
            name,
            email,
            phone: edit.phone.map(|phone| phone.trim().to_string()),
            address,
        };
        if update.is_empty() {
            return Err(AuthError::NothingToUpdate);
        }

        let user = service
            .update_profile(token.expose_secret(), &update)
            .await?;
        info!(user_id = %user.id, "Profile updated");
        Ok(self.replace_user(user))
    }

    /// Change the account password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` without a session,
    /// `AuthError::EmptyPassword` or `AuthError::PasswordMismatch` before
    /// contacting the service, and `AuthError::Api` if the service refuses.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        service: &dyn AuthService,
        current: SecretString,
        new: SecretString,
        confirm: &SecretString,
    ) -> Result<(), AuthError> {
        let token = self.token.as_ref().ok_or(AuthError::NotSignedIn)?;
        if current.expose_secret().is_empty() || new.expose_secret().is_empty() {
            return Err(AuthError::EmptyPassword);
        }
        if new.expose_secret() != confirm.expose_secret() {
            return Err(AuthError::PasswordMismatch);
        }

        service
            .change_password(token.expose_secret(), &PasswordChange { current, new })
            .await?;
        info!("Password changed");
        Ok(())
    }

    /// Sign out. Local state is cleared even if the service call fails.
    #[instrument(skip_all)]
    pub async fn logout(&mut self, service: &dyn AuthService) {
        if let Some(token) = self.token.take() {
            if let Err(e) = service.logout(token.expose_secret()).await {
                warn!(error = %e, "Remote logout failed, clearing local session anyway");
            }
        }

        self.user = None;
        self.session = SessionId::anonymous();
        for key in [keys::TOKEN, keys::SESSION_ID, keys::USER] {
            if let Err(e) = self.store.delete(key) {
                warn!(key, error = %e, "Failed to erase auth session");
            }
        }
        clear_sentry_user();
        info!("Signed out");
    }

    fn establish(&mut self, response: AuthResponse) -> &User {
        let AuthResponse { token, user } = response;

        self.session = SessionId::parse(token.expose_secret()).unwrap_or_else(|e| {
            warn!(error = %e, "Token cannot serve as a session id, using an anonymous one");
            SessionId::anonymous()
        });

        self.write(keys::TOKEN, token.expose_secret());
        self.write(keys::SESSION_ID, self.session.as_str());
        match serde_json::to_string(&user) {
            Ok(encoded) => self.write(keys::USER, &encoded),
            Err(e) => warn!(error = %e, "Failed to encode user profile"),
        }

        set_sentry_user(&user.id, Some(user.email.as_str()));
        info!(user_id = %user.id, "Signed in");

        self.token = Some(token);
        self.user.insert(user)
    }

    fn replace_user(&mut self, user: User) -> &User {
        match serde_json::to_string(&user) {
            Ok(encoded) => self.write(keys::USER, &encoded),
            Err(e) => warn!(error = %e, "Failed to encode user profile"),
        }
        self.user.insert(user)
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!(key, error = %e, "Failed to persist auth session");
        }
    }
}
