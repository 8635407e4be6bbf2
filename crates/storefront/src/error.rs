//! Unified error handling with Sentry integration.
//!
//! Provides a unified `StorefrontError` type over the per-module errors.
//! Front ends call [`StorefrontError::report`] before showing
//! [`StorefrontError::user_message`] to the shopper.

use thiserror::Error;

use crate::api::ApiError;
use crate::auth::AuthError;
use crate::cart::{CartError, SnapshotError};
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::orders::OrderError;
use crate::store::StoreError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Catalog or auth API call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Login or registration failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Persisted cart could not be decoded.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Local key-value store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed identifier supplied by the caller.
    #[error("Invalid id: {0}")]
    Id(#[from] medmart_core::IdError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl StorefrontError {
    /// Whether the error points at a fault outside the shopper's control.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        match self {
            Self::Store(_) | Self::Config(_) | Self::Snapshot(_) => true,
            Self::Api(err) | Self::Auth(AuthError::Api(err)) => matches!(
                err,
                ApiError::Http(_)
                    | ApiError::Parse(_)
                    | ApiError::InvalidResponse(_)
                    | ApiError::Url(_)
            ) || matches!(err, ApiError::Status { status, .. } if *status >= 500),
            _ => false,
        }
    }

    /// Capture internal errors to Sentry and log them.
    pub fn report(&self) {
        if self.is_internal() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront error"
            );
        } else {
            tracing::debug!(error = %self, "Storefront error");
        }
    }

    /// Message suitable for showing to a shopper. Internal details are not
    /// exposed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message(),
            Self::Auth(err) => match err {
                AuthError::Api(err) => err.user_message(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::EmptyPassword => "Please enter your password".to_string(),
                AuthError::MissingName => "Please enter your name".to_string(),
                AuthError::NotSignedIn => "Please log in first".to_string(),
                AuthError::PasswordMismatch => "New passwords do not match".to_string(),
                AuthError::NothingToUpdate => "Nothing to update".to_string(),
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => "Your cart is empty".to_string(),
                CheckoutError::PrescriptionRequired => {
                    "Please upload a prescription for the prescription items in your cart"
                        .to_string()
                }
                CheckoutError::IncompleteAddress => {
                    "Please fill in your full shipping address".to_string()
                }
                CheckoutError::NotAuthenticated => "Please log in to place an order".to_string(),
            },
            Self::Cart(CartError::InvalidQuantity { .. }) => {
                "Quantity must be at least 1".to_string()
            }
            Self::Cart(CartError::TotalTooLarge) => {
                "That quantity is more than a single order can hold".to_string()
            }
            Self::Order(err) => err.to_string(),
            Self::Id(_) | Self::NotFound(_) => self.to_string(),
            Self::Store(_) | Self::Snapshot(_) => {
                "Saved data could not be read, please try again".to_string()
            }
            Self::Config(err) => err.to_string(),
        }
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use medmart_core::OrderId;

    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorefrontError::NotFound("order abc".to_string());
        assert_eq!(err.to_string(), "Not found: order abc");

        let err = StorefrontError::from(CheckoutError::EmptyCart);
        assert_eq!(err.to_string(), "Checkout error: cannot check out an empty cart");
    }

    #[test]
    fn test_internal_classification() {
        assert!(StorefrontError::from(StoreError::Poisoned).is_internal());
        assert!(
            StorefrontError::from(ApiError::Status {
                status: 503,
                message: String::new(),
            })
            .is_internal()
        );
        assert!(
            !StorefrontError::from(ApiError::Status {
                status: 400,
                message: "bad".to_string(),
            })
            .is_internal()
        );
        assert!(!StorefrontError::from(ApiError::RateLimited(5)).is_internal());
        assert!(!StorefrontError::from(CheckoutError::PrescriptionRequired).is_internal());
        assert!(
            !StorefrontError::from(OrderError::NotFound(OrderId::generate())).is_internal()
        );
    }

    #[test]
    fn test_user_messages_hide_internals() {
        let err = StorefrontError::from(StoreError::Poisoned);
        assert_eq!(
            err.user_message(),
            "Saved data could not be read, please try again"
        );

        let err = StorefrontError::from(AuthError::Api(ApiError::Unauthorized(String::new())));
        assert_eq!(err.user_message(), "Invalid email or password");

        let err = StorefrontError::from(CartError::InvalidQuantity { quantity: 0 });
        assert_eq!(err.user_message(), "Quantity must be at least 1");

        let err = StorefrontError::from(CartError::TotalTooLarge);
        assert_eq!(
            err.user_message(),
            "That quantity is more than a single order can hold"
        );

        let err = StorefrontError::from(AuthError::PasswordMismatch);
        assert_eq!(err.user_message(), "New passwords do not match");
    }
}
