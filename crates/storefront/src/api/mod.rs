//! Remote catalog and authentication services.
//!
//! # Architecture
//!
//! - The remote catalog is the source of truth; nothing is synced locally
//! - [`CatalogService`] and [`AuthService`] are the seams the state managers
//!   talk to, so the HTTP client and the offline mock are interchangeable
//! - In-memory caching via `moka` for catalog responses (5 minute TTL)
//!
//! # Example
//!
//! ```rust,ignore
//! use medmart_storefront::api::{ApiClient, CatalogService, ProductQuery};
//!
//! let client = ApiClient::new(&config.api)?;
//! let page = client.products(&ProductQuery::first_page(20)).await?;
//! ```

mod client;
pub mod fixtures;
mod mock;
pub mod types;

pub use client::ApiClient;
pub use mock::MockApi;
pub use types::*;

use async_trait::async_trait;
use medmart_core::{Product, ProductId};
use thiserror::Error;

/// Errors that can occur when talking to the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The response parsed but carried invalid values.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The requested product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The credentials were rejected or the token expired.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the server.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The service could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The configured endpoint could not be turned into a request URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Short message suitable for showing to a shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { message, .. } | Self::Unauthorized(message) if !message.is_empty() => {
                message.clone()
            }
            Self::ProductNotFound(_) | Self::NotFound(_) => "Product not found".to_string(),
            Self::RateLimited(_) => "Too many requests, please try again shortly".to_string(),
            Self::Unauthorized(_) => "Invalid email or password".to_string(),
            _ => "Unable to reach the store, please try again".to_string(),
        }
    }
}

/// Read access to the product catalog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Fetch one page of products matching the query.
    async fn products(&self, query: &ProductQuery) -> Result<ProductPage, ApiError>;

    /// Fetch a single product.
    async fn product(&self, id: &ProductId) -> Result<Product, ApiError>;

    /// Fetch the category names offered by the catalog.
    async fn categories(&self) -> Result<Vec<String>, ApiError>;

    /// Fetch the pharmacies selling through the catalog.
    async fn pharmacies(&self) -> Result<Vec<medmart_core::PharmacyRef>, ApiError>;
}

/// Account operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Exchange credentials for a token and profile.
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError>;

    /// Create an account and sign in.
    async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError>;

    /// Invalidate the given token on the server.
    async fn logout(&self, token: &str) -> Result<(), ApiError>;

    /// Fetch the profile of the account `token` belongs to.
    async fn profile(&self, token: &str) -> Result<User, ApiError>;

    /// Change profile fields and return the updated profile.
    async fn update_profile(&self, token: &str, update: &ProfileUpdate)
    -> Result<User, ApiError>;

    async fn change_password(&self, token: &str, change: &PasswordChange) -> Result<(), ApiError>;
}
