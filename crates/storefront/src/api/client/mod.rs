//! HTTP client for the storefront REST API.
//!
//! Uses `reqwest` 0.13 for HTTP. Catalog reads are cached with `moka`
//! (5-minute TTL); free-text searches always go to the server.

mod cache;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use medmart_core::{PharmacyRef, Product, ProductId};
use moka::future::Cache;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::api::types::{
    AuthResponseBody, CategoriesBody, Envelope, ErrorBody, PharmaciesBody, ProductBody,
    ProductPageBody, ProfileBody, ProfileUpdateBody,
};
use crate::api::{
    ApiError, AuthResponse, AuthService, CatalogService, Credentials, PasswordChange, ProductPage,
    ProductQuery, ProfileUpdate, Registration, User,
};
use crate::config::ApiConfig;

use cache::{CacheKey, CacheValue};

/// Longest slice of a response body included in logs and errors.
const BODY_SNIPPET_LEN: usize = 500;

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the storefront REST API.
///
/// Cloning is cheap; clones share the connection pool and the cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
    token: Option<SecretString>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        // Endpoints are joined relative to the root, which needs a trailing slash
        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url,
                cache,
            }),
            token: config.token.clone(),
        })
    }

    /// A client sharing this one's pool and cache that authenticates as `token`.
    #[must_use]
    pub fn with_token(&self, token: SecretString) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            token: Some(token),
        }
    }

    /// Resolve an endpoint path against the API root.
    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path)?)
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder, token: Option<&str>) -> Result<String, ApiError> {
        let token = token.or_else(|| self.token.as_ref().map(|t| t.expose_secret()));
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if status.is_success() {
            return Ok(response_text);
        }

        let message = serde_json::from_str::<ErrorBody>(&response_text)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_default();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ApiError::Unauthorized(message))
            }
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(message)),
            _ => {
                tracing::error!(
                    status = %status,
                    body = %snippet(&response_text),
                    "Storefront API returned non-success status"
                );
                Err(ApiError::Status {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    /// Parse a response body, logging the body on failure.
    fn parse<T: DeserializeOwned>(response_text: &str) -> Result<T, ApiError> {
        serde_json::from_str::<Envelope<T>>(response_text)
            .map(Envelope::into_inner)
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    body = %snippet(response_text),
                    "Failed to parse storefront API response"
                );
                ApiError::Parse(e)
            })
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let body = self.send(self.inner.client.get(url), None).await?;
        Self::parse(&body)
    }

    async fn post<B, T>(&self, url: Url, payload: &B) -> Result<T, ApiError>
    where
        B: serde::Serialize + Sync,
        T: DeserializeOwned,
    {
        let body = self
            .send(self.inner.client.post(url).json(payload), None)
            .await?;
        Self::parse(&body)
    }

    async fn fetch_user(&self, request: RequestBuilder, token: &str) -> Result<User, ApiError> {
        let body = self.send(request, Some(token)).await?;
        let profile: ProfileBody = Self::parse(&body)?;
        User::try_from(profile).map_err(ApiError::InvalidResponse)
    }

    async fn authenticate(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<AuthResponse, ApiError> {
        let body: AuthResponseBody = self.post(self.endpoint(path)?, payload).await?;
        let user = User::try_from(body.user).map_err(ApiError::InvalidResponse)?;
        Ok(AuthResponse {
            token: SecretString::from(body.token),
            user,
        })
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(BODY_SNIPPET_LEN).collect()
}

// =============================================================================
// Catalog
// =============================================================================

#[async_trait]
impl CatalogService for ApiClient {
    #[instrument(skip(self), fields(page = query.page, search = %query.filters.search))]
    async fn products(&self, query: &ProductQuery) -> Result<ProductPage, ApiError> {
        let cache_key = CacheKey::for_query(query);

        // Check cache (only for queries without search)
        if let Some(key) = &cache_key
            && let Some(CacheValue::Products(page)) = self.inner.cache.get(key).await
        {
            debug!("Cache hit for products");
            return Ok(page);
        }

        let mut url = self.endpoint("products")?;
        url.query_pairs_mut().extend_pairs(query.query_pairs());

        let body: ProductPageBody = self.get(url).await?;
        let page = body.into_page(query);

        if let Some(key) = cache_key {
            self.inner
                .cache
                .insert(key, CacheValue::Products(page.clone()))
                .await;
        }

        Ok(page)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn product(&self, id: &ProductId) -> Result<Product, ApiError> {
        let cache_key = CacheKey::Product(id.clone());

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let url = self.endpoint(&format!("products/{id}"))?;
        let product: Product = match self.get::<ProductBody>(url).await {
            Ok(body) => body.into(),
            Err(ApiError::NotFound(_)) => return Err(ApiError::ProductNotFound(id.clone())),
            Err(e) => return Err(e),
        };

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    #[instrument(skip(self))]
    async fn categories(&self) -> Result<Vec<String>, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let body: CategoriesBody = self.get(self.endpoint("products/categories")?).await?;
        let categories = Vec::from(body);

        self.inner
            .cache
            .insert(CacheKey::Categories, CacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }

    #[instrument(skip(self))]
    async fn pharmacies(&self) -> Result<Vec<PharmacyRef>, ApiError> {
        if let Some(CacheValue::Pharmacies(pharmacies)) =
            self.inner.cache.get(&CacheKey::Pharmacies).await
        {
            debug!("Cache hit for pharmacies");
            return Ok(pharmacies);
        }

        let body: PharmaciesBody = self.get(self.endpoint("products/pharmacies")?).await?;
        let pharmacies = Vec::from(body);

        self.inner
            .cache
            .insert(CacheKey::Pharmacies, CacheValue::Pharmacies(pharmacies.clone()))
            .await;

        Ok(pharmacies)
    }
}

// =============================================================================
// Authentication
// =============================================================================

#[async_trait]
impl AuthService for ApiClient {
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let payload = serde_json::json!({
            "email": credentials.email.as_str(),
            "password": credentials.password.expose_secret(),
        });
        self.authenticate("auth/login", &payload).await
    }

    #[instrument(skip(self, registration), fields(email = %registration.email))]
    async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        let payload = serde_json::json!({
            "name": registration.name,
            "email": registration.email.as_str(),
            "password": registration.password.expose_secret(),
            "phone": registration.phone,
            "address": registration.address,
        });
        self.authenticate("auth/register", &payload).await
    }

    #[instrument(skip_all)]
    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let url = self.endpoint("auth/logout")?;
        self.send(self.inner.client.post(url), Some(token)).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn profile(&self, token: &str) -> Result<User, ApiError> {
        let url = self.endpoint("users/profile")?;
        self.fetch_user(self.inner.client.get(url), token).await
    }

    #[instrument(skip_all)]
    async fn update_profile(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<User, ApiError> {
        let url = self.endpoint("users/profile")?;
        let request = self.inner.client.put(url).json(&ProfileUpdateBody::from(update));
        self.fetch_user(request, token).await
    }

    #[instrument(skip_all)]
    async fn change_password(&self, token: &str, change: &PasswordChange) -> Result<(), ApiError> {
        let url = self.endpoint("users/password")?;
        let payload = serde_json::json!({
            "oldPassword": change.current.expose_secret(),
            "newPassword": change.new.expose_secret(),
        });
        self.send(self.inner.client.put(url).json(&payload), Some(token))
            .await?;
        Ok(())
    }
}
