//! Offline implementation of the storefront services.
//!
//! Serves the catalog from an in-memory product list with the same filtering
//! and pagination contract as the server, and can be told to fail so the
//! fallback paths of the state managers can be exercised. Accounts exist
//! only for the lifetime of the mock: a token issued by one instance is
//! unknown to the next.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use medmart_core::{PharmacyRef, Product, ProductId, UserId};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::types::pages_for;
use super::{
    ApiError, AuthResponse, AuthService, CatalogService, Credentials, DEFAULT_PAGE_SIZE,
    PasswordChange, ProductPage, ProductQuery, ProfileUpdate, Registration, User, fixtures,
};

/// In-memory catalog and account service.
#[derive(Clone)]
pub struct MockApi {
    inner: Arc<MockApiInner>,
}

struct MockApiInner {
    products: Vec<Product>,
    categories: Vec<String>,
    pharmacies: Vec<PharmacyRef>,
    failure_rate: f64,
    offline: AtomicBool,
    requests: AtomicUsize,
    /// Signed-in accounts by token.
    sessions: Mutex<HashMap<String, User>>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApi {
    /// A mock serving the built-in fixtures.
    #[must_use]
    pub fn new() -> Self {
        Self::build(fixtures::products(), fixtures::categories(), fixtures::pharmacies(), 0.0)
    }

    /// A mock serving `products`; categories and pharmacies are derived from them.
    #[must_use]
    pub fn with_products(products: Vec<Product>) -> Self {
        let mut categories: Vec<String> = Vec::new();
        let mut pharmacies: Vec<PharmacyRef> = Vec::new();
        for product in &products {
            if !categories.contains(&product.category) {
                categories.push(product.category.clone());
            }
            if !pharmacies.iter().any(|p| p.name() == product.pharmacy_name()) {
                pharmacies.push(product.pharmacy.clone());
            }
        }
        Self::build(products, categories, pharmacies, 0.0)
    }

    /// Make each call fail with probability `rate` (clamped to `[0, 1]`).
    #[must_use]
    pub fn with_failure_rate(&self, rate: f64) -> Self {
        let inner = &self.inner;
        Self::build(
            inner.products.clone(),
            inner.categories.clone(),
            inner.pharmacies.clone(),
            rate.clamp(0.0, 1.0),
        )
    }

    fn build(
        products: Vec<Product>,
        categories: Vec<String>,
        pharmacies: Vec<PharmacyRef>,
        failure_rate: f64,
    ) -> Self {
        Self {
            inner: Arc::new(MockApiInner {
                products,
                categories,
                pharmacies,
                failure_rate,
                offline: AtomicBool::new(false),
                requests: AtomicUsize::new(0),
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Fail every call until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.inner.requests.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), ApiError> {
        self.inner.requests.fetch_add(1, Ordering::SeqCst);

        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Unavailable("mock service is offline".to_string()));
        }
        if self.inner.failure_rate > 0.0 && rand::random::<f64>() < self.inner.failure_rate {
            debug!("Injected mock failure");
            return Err(ApiError::Unavailable("injected mock failure".to_string()));
        }
        Ok(())
    }

    fn matches(product: &Product, query: &ProductQuery) -> bool {
        let filters = &query.filters;
        let search = filters.search.trim().to_lowercase();

        let matches_search = search.is_empty()
            || [
                Some(product.name.as_str()),
                Some(product.description.as_str()),
                product.generic_name.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&search));

        matches_search
            && (filters.category.is_empty() || product.category == filters.category)
            && (filters.pharmacy.is_empty() || product.pharmacy_name() == filters.pharmacy)
    }

    fn user_for(email: &medmart_core::Email, name: Option<&str>) -> Result<User, ApiError> {
        let local = email.as_str().split('@').next().unwrap_or_default();
        let id = UserId::parse(format!("mock-{}", uuid::Uuid::new_v4().simple()))
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        Ok(User {
            id,
            email: email.clone(),
            name: name.map_or_else(|| local.to_string(), str::to_string),
            phone: None,
            address: None,
        })
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, User>> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a token for `user` and remember the account behind it.
    fn sign_in(&self, user: User) -> AuthResponse {
        let token = format!("mock-token-{}", uuid::Uuid::new_v4().simple());
        self.sessions().insert(token.clone(), user.clone());
        AuthResponse {
            token: SecretString::from(token),
            user,
        }
    }

    fn session_expired() -> ApiError {
        ApiError::Unauthorized("Session expired, please log in again".to_string())
    }
}

#[async_trait]
impl CatalogService for MockApi {
    async fn products(&self, query: &ProductQuery) -> Result<ProductPage, ApiError> {
        self.check_available()?;

        let limit = if query.limit == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            query.limit
        };
        let page = query.page.max(1);

        let matching: Vec<&Product> = self
            .inner
            .products
            .iter()
            .filter(|product| Self::matches(product, query))
            .collect();
        let total = u64::try_from(matching.len()).unwrap_or(u64::MAX);

        let skip = usize::try_from((page - 1).saturating_mul(limit)).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(usize::MAX);

        Ok(ProductPage {
            products: matching.into_iter().skip(skip).take(take).cloned().collect(),
            page,
            total_pages: pages_for(total, limit),
            total,
        })
    }

    async fn product(&self, id: &ProductId) -> Result<Product, ApiError> {
        self.check_available()?;
        self.inner
            .products
            .iter()
            .find(|product| &product.id == id)
            .cloned()
            .ok_or_else(|| ApiError::ProductNotFound(id.clone()))
    }

    async fn categories(&self) -> Result<Vec<String>, ApiError> {
        self.check_available()?;
        Ok(self.inner.categories.clone())
    }

    async fn pharmacies(&self) -> Result<Vec<PharmacyRef>, ApiError> {
        self.check_available()?;
        Ok(self.inner.pharmacies.clone())
    }
}

#[async_trait]
impl AuthService for MockApi {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        self.check_available()?;
        if credentials.password.expose_secret().is_empty() {
            return Err(ApiError::Unauthorized("Invalid email or password".to_string()));
        }
        Ok(self.sign_in(Self::user_for(&credentials.email, None)?))
    }

    async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        self.check_available()?;
        let mut user = Self::user_for(&registration.email, Some(&registration.name))?;
        user.phone.clone_from(&registration.phone);
        user.address.clone_from(&registration.address);
        Ok(self.sign_in(user))
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        self.check_available()?;
        self.sessions().remove(token);
        Ok(())
    }

    async fn profile(&self, token: &str) -> Result<User, ApiError> {
        self.check_available()?;
        self.sessions()
            .get(token)
            .cloned()
            .ok_or_else(Self::session_expired)
    }

    async fn update_profile(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<User, ApiError> {
        self.check_available()?;
        let mut sessions = self.sessions();
        let user = sessions.get_mut(token).ok_or_else(Self::session_expired)?;
        if let Some(name) = &update.name {
            user.name = name.trim().to_string();
        }
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        if let Some(phone) = &update.phone {
            user.phone = Some(phone.clone()).filter(|phone| !phone.is_empty());
        }
        if let Some(address) = &update.address {
            user.address = Some(address.clone());
        }
        Ok(user.clone())
    }

    async fn change_password(&self, token: &str, change: &PasswordChange) -> Result<(), ApiError> {
        self.check_available()?;
        if !self.sessions().contains_key(token) {
            return Err(Self::session_expired());
        }
        if change.current.expose_secret().is_empty() {
            return Err(ApiError::Unauthorized("Current password is incorrect".to_string()));
        }
        Ok(())
    }
}
