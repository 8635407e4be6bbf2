//! Storefront state shared by every front end.
//!
//! [`Storefront`] owns one of each state manager and the services they talk
//! to. It is the only place where managers are composed: login moves the
//! cart to the signed-in session and checkout records the order it derives.

use std::sync::Arc;

use medmart_core::{OrderId, OrderStatus, Product, ProductId};
use secrecy::SecretString;
use tracing::{info, instrument, warn};

use crate::api::{ApiClient, AuthService, CatalogService, MockApi, User};
use crate::auth::{AuthSession, ProfileEdit, SignUp};
use crate::cart::{CartManager, SnapshotError};
use crate::catalog::{CatalogState, LoadOutcome};
use crate::checkout::{self, CheckoutDetails, CheckoutError, CheckoutSummary, Order};
use crate::config::StorefrontConfig;
use crate::error::{Result, StorefrontError, add_breadcrumb};
use crate::orders::OrderHistory;
use crate::store::KeyValueStore;

/// Catalog, cart, orders and auth for one shopper.
pub struct Storefront<S: KeyValueStore> {
    catalog_service: Arc<dyn CatalogService>,
    auth_service: Arc<dyn AuthService>,
    catalog: CatalogState,
    cart: CartManager<S>,
    orders: OrderHistory,
    auth: AuthSession<S>,
    store: S,
    /// HTTP client as configured, before any session token is attached.
    http: Option<ApiClient>,
}

impl<S: KeyValueStore> Storefront<S> {
    /// Assemble a storefront over explicit services.
    ///
    /// The auth session and order history are restored from `store`; the
    /// cart starts empty under the restored session (see
    /// [`Self::rehydrate_cart`]).
    pub fn new(
        store: S,
        catalog_service: Arc<dyn CatalogService>,
        auth_service: Arc<dyn AuthService>,
        catalog: CatalogState,
    ) -> Self {
        let auth = AuthSession::restore(store.clone());
        let cart = CartManager::new(store.clone(), auth.session_id().clone());
        let orders = OrderHistory::load(&store).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load order history");
            OrderHistory::new()
        });

        Self {
            catalog_service,
            auth_service,
            catalog,
            cart,
            orders,
            auth,
            store,
            http: None,
        }
    }

    /// Assemble a storefront from configuration.
    ///
    /// Mock mode serves the fixture catalog and enables demo fallbacks;
    /// otherwise the HTTP client is used, carrying the session token in place
    /// of any configured static token for as long as a session exists.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Api` if the HTTP client cannot be built.
    pub fn from_config(config: &StorefrontConfig, store: S) -> Result<Self> {
        let catalog = CatalogState::new(config.page_size).with_demo_mode(config.mock.enabled);

        if config.mock.enabled {
            let mock = MockApi::new().with_failure_rate(config.mock.failure_rate);
            info!(failure_rate = config.mock.failure_rate, "Using mock catalog");
            let mock = Arc::new(mock);
            return Ok(Self::new(store, mock.clone(), mock, catalog));
        }

        let client = ApiClient::new(&config.api)?;
        let shared = Arc::new(client.clone());
        let mut shop = Self::new(store, shared.clone(), shared, catalog);
        shop.http = Some(client);
        shop.session_changed();
        Ok(shop)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub const fn catalog(&self) -> &CatalogState {
        &self.catalog
    }

    /// Mutable catalog state, for filter changes.
    pub const fn catalog_mut(&mut self) -> &mut CatalogState {
        &mut self.catalog
    }

    #[must_use]
    pub const fn cart(&self) -> &CartManager<S> {
        &self.cart
    }

    /// Mutable cart, for quantity changes and removals.
    pub const fn cart_mut(&mut self) -> &mut CartManager<S> {
        &mut self.cart
    }

    #[must_use]
    pub const fn orders(&self) -> &OrderHistory {
        &self.orders
    }

    #[must_use]
    pub const fn auth(&self) -> &AuthSession<S> {
        &self.auth
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Fetch page 1 with the current filters.
    pub async fn fetch_products(&mut self) -> LoadOutcome {
        self.catalog.fetch_products(self.catalog_service.as_ref()).await
    }

    /// Fetch an arbitrary page, replacing the item set.
    pub async fn fetch_page(&mut self, page: u32) -> LoadOutcome {
        self.catalog
            .fetch_page(self.catalog_service.as_ref(), page)
            .await
    }

    pub async fn load_more(&mut self) -> LoadOutcome {
        self.catalog.load_more(self.catalog_service.as_ref()).await
    }

    /// Populate the category and pharmacy option lists.
    ///
    /// # Errors
    ///
    /// Returns the first service error; both lists are attempted regardless.
    pub async fn fetch_options(&mut self) -> Result<()> {
        let service = self.catalog_service.as_ref();
        let categories = self.catalog.fetch_categories(service).await;
        let pharmacies = self.catalog.fetch_pharmacies(service).await;
        categories?;
        pharmacies?;
        Ok(())
    }

    /// Resolve a product for a detail view.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Api` with `ApiError::ProductNotFound` if the
    /// product does not exist.
    pub async fn product(&self, id: &ProductId) -> Result<Product> {
        Ok(self
            .catalog
            .fetch_product(self.catalog_service.as_ref(), id)
            .await?)
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Add a product to the cart by id, resolving it from the loaded items
    /// or the catalog service. Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Cart` for a non-positive quantity and
    /// `StorefrontError::Api` if the product cannot be resolved.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn add_to_cart(&mut self, id: &ProductId, quantity: i64) -> Result<u32> {
        let product = match self.catalog.product(id) {
            Some(product) => product.clone(),
            None => self.product(id).await?,
        };
        let quantity = self.cart.add_item(&product, quantity)?;
        add_breadcrumb("cart", "Added item", Some(&[("product_id", id.as_str())]));
        Ok(quantity)
    }

    /// Restore the persisted cart. Returns the number of lines restored.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` if the stored snapshot is malformed.
    pub async fn rehydrate_cart(&mut self) -> std::result::Result<usize, SnapshotError> {
        self.cart.rehydrate(self.catalog_service.as_ref()).await
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Sign in and move the cart to the signed-in session.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Auth` if validation or the service fails.
    pub async fn login(&mut self, email: &str, password: SecretString) -> Result<User> {
        let user = self
            .auth
            .login(self.auth_service.as_ref(), email, password)
            .await?
            .clone();
        self.session_changed();
        Ok(user)
    }

    /// Create an account, sign in and move the cart to the new session.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Auth` if validation or the service fails.
    pub async fn register(&mut self, form: SignUp) -> Result<User> {
        let user = self
            .auth
            .register(self.auth_service.as_ref(), form)
            .await?
            .clone();
        self.session_changed();
        Ok(user)
    }

    /// Sign out. The cart is kept under a fresh anonymous session.
    pub async fn logout(&mut self) {
        self.auth.logout(self.auth_service.as_ref()).await;
        self.session_changed();
    }

    /// Fetch the signed-in profile from the service.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Auth` when signed out or if the service
    /// fails.
    pub async fn profile(&mut self) -> Result<User> {
        Ok(self
            .auth
            .refresh_profile(self.auth_service.as_ref())
            .await?
            .clone())
    }

    /// Change profile fields.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Auth` when signed out, for invalid input or
    /// if the service fails.
    pub async fn update_profile(&mut self, edit: ProfileEdit) -> Result<User> {
        let user = self
            .auth
            .update_profile(self.auth_service.as_ref(), edit)
            .await?
            .clone();
        add_breadcrumb("auth", "Updated profile", None);
        Ok(user)
    }

    /// Change the account password; `confirm` must repeat `new`.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Auth` when signed out, for invalid input or
    /// if the service fails.
    pub async fn change_password(
        &self,
        current: SecretString,
        new: SecretString,
        confirm: &SecretString,
    ) -> Result<()> {
        Ok(self
            .auth
            .change_password(self.auth_service.as_ref(), current, new, confirm)
            .await?)
    }

    /// Follow a login or logout: move the cart to the current session and
    /// point the HTTP client at the current token.
    fn session_changed(&mut self) {
        self.cart.set_session(self.auth.session_id().clone());

        if let Some(base) = &self.http {
            let client = match self.auth.token() {
                Some(token) => base.with_token(token.clone()),
                None => base.clone(),
            };
            let client = Arc::new(client);
            self.catalog_service = client.clone();
            self.auth_service = client;
        }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    #[must_use]
    pub fn checkout_summary(&self) -> CheckoutSummary {
        CheckoutSummary::for_cart(self.cart.cart())
    }

    /// Place an order from the cart, record it and empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotAuthenticated` when signed out, otherwise
    /// any other `CheckoutError`. Nothing changes on error.
    #[instrument(skip_all)]
    pub fn place_order(&mut self, details: &CheckoutDetails) -> Result<Order> {
        if !self.auth.is_authenticated() {
            return Err(CheckoutError::NotAuthenticated.into());
        }

        let order = checkout::place_order(&mut self.cart, details)?;
        self.orders.record(order.clone());
        self.save_orders();
        Ok(order)
    }

    /// Move an order one status step forward.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError::Order` for an unknown or delivered order.
    pub fn advance_order(&mut self, id: OrderId) -> Result<OrderStatus> {
        let status = self.orders.advance(id)?;
        self.save_orders();
        Ok(status)
    }

    fn save_orders(&self) {
        if let Err(e) = self.orders.save(&self.store) {
            warn!(error = %e, "Failed to persist order history");
        }
    }
}

impl<S: KeyValueStore> std::fmt::Debug for Storefront<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("catalog_items", &self.catalog.items().len())
            .field("cart_items", &self.cart.item_count())
            .field("orders", &self.orders.len())
            .field("authenticated", &self.auth.is_authenticated())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use medmart_core::{PaymentMethod, ShippingAddress};

    use super::*;
    use crate::api::ApiError;
    use crate::auth::AuthError;
    use crate::store::{MemoryStore, keys};

    fn storefront(store: MemoryStore) -> Storefront<MemoryStore> {
        let api = Arc::new(MockApi::new());
        Storefront::new(store, api.clone(), api, CatalogState::default().with_demo_mode(true))
    }

    fn details(prescription_uploaded: bool) -> CheckoutDetails {
        CheckoutDetails {
            shipping_address: ShippingAddress {
                street: "1 Main St".to_string(),
                city: "Austin".to_string(),
                state: "TX".to_string(),
                zip_code: "78701".to_string(),
            },
            payment_method: PaymentMethod::Insurance,
            prescription_uploaded,
        }
    }

    fn id(raw: &str) -> ProductId {
        ProductId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_checkout_requires_login() {
        let mut shop = storefront(MemoryStore::new());
        shop.add_to_cart(&id("1"), 1).await.unwrap();

        let err = shop.place_order(&details(false)).unwrap_err();
        assert!(matches!(
            err,
            StorefrontError::Checkout(CheckoutError::NotAuthenticated)
        ));
        assert_eq!(shop.cart().item_count(), 1);
    }

    #[tokio::test]
    async fn test_login_moves_cart_to_session() {
        let store = MemoryStore::new();
        let mut shop = storefront(store.clone());
        shop.add_to_cart(&id("1"), 2).await.unwrap();

        shop.login("jane@example.com", SecretString::from("pw".to_string()))
            .await
            .unwrap();
        let token = store.get(keys::TOKEN).unwrap().unwrap();
        assert_eq!(
            store.get(keys::CART).unwrap(),
            Some(format!("{token}/1:2"))
        );
    }

    #[tokio::test]
    async fn test_place_order_records_history() {
        let store = MemoryStore::new();
        let mut shop = storefront(store.clone());
        shop.login("jane@example.com", SecretString::from("pw".to_string()))
            .await
            .unwrap();
        shop.add_to_cart(&id("1"), 2).await.unwrap();
        shop.add_to_cart(&id("7"), 1).await.unwrap();

        let summary = shop.checkout_summary();
        let order = shop.place_order(&details(false)).unwrap();
        assert_eq!(order.total(), summary.total);
        assert!(shop.cart().is_empty());
        assert_eq!(shop.orders().orders().first(), Some(&order));

        assert_eq!(shop.advance_order(order.id()).unwrap(), OrderStatus::Approved);
        let reloaded = OrderHistory::load(&store).unwrap();
        assert_eq!(
            reloaded.get(order.id()).unwrap().status(),
            OrderStatus::Approved
        );
    }

    #[tokio::test]
    async fn test_prescription_item_blocks_checkout() {
        let mut shop = storefront(MemoryStore::new());
        shop.login("jane@example.com", SecretString::from("pw".to_string()))
            .await
            .unwrap();
        shop.add_to_cart(&id("2"), 1).await.unwrap();

        let err = shop.place_order(&details(false)).unwrap_err();
        assert!(matches!(
            err,
            StorefrontError::Checkout(CheckoutError::PrescriptionRequired)
        ));
        assert_eq!(shop.cart().item_count(), 1);
        assert!(shop.orders().is_empty());

        assert!(shop.place_order(&details(true)).is_ok());
    }

    #[tokio::test]
    async fn test_add_unknown_product() {
        let mut shop = storefront(MemoryStore::new());
        let err = shop.add_to_cart(&id("999"), 1).await.unwrap_err();
        assert!(matches!(
            err,
            StorefrontError::Api(ApiError::ProductNotFound(_))
        ));
        assert!(shop.cart().is_empty());
    }

    #[tokio::test]
    async fn test_logout_keeps_cart() {
        let mut shop = storefront(MemoryStore::new());
        shop.login("jane@example.com", SecretString::from("pw".to_string()))
            .await
            .unwrap();
        shop.add_to_cart(&id("3"), 1).await.unwrap();

        shop.logout().await;
        assert!(!shop.auth().is_authenticated());
        assert_eq!(shop.cart().item_count(), 1);
        assert_eq!(shop.cart().session(), shop.auth().session_id());
    }

    #[tokio::test]
    async fn test_restart_restores_everything() {
        let store = MemoryStore::new();
        {
            let mut shop = storefront(store.clone());
            shop.login("jane@example.com", SecretString::from("pw".to_string()))
                .await
                .unwrap();
            shop.add_to_cart(&id("1"), 1).await.unwrap();
            shop.place_order(&details(false)).unwrap();
            shop.add_to_cart(&id("4"), 3).await.unwrap();
        }

        let mut shop = storefront(store);
        assert!(shop.auth().is_authenticated());
        assert_eq!(shop.orders().len(), 1);
        assert_eq!(shop.rehydrate_cart().await.unwrap(), 1);
        assert_eq!(shop.cart().item_count(), 3);
    }

    #[tokio::test]
    async fn test_profile_edit_round_trip() {
        let store = MemoryStore::new();
        let mut shop = storefront(store.clone());
        assert!(matches!(
            shop.profile().await,
            Err(StorefrontError::Auth(AuthError::NotSignedIn))
        ));

        shop.login("jane@example.com", SecretString::from("pw".to_string()))
            .await
            .unwrap();
        let edit = ProfileEdit {
            name: Some("Jane Doe".to_string()),
            email: Some("jane.doe@example.com".to_string()),
            ..ProfileEdit::default()
        };
        let updated = shop.update_profile(edit).await.unwrap();
        assert_eq!(updated.email.as_str(), "jane.doe@example.com");
        assert_eq!(shop.profile().await.unwrap(), updated);
        assert_eq!(shop.auth().user(), Some(&updated));

        let reopened = storefront(store);
        assert_eq!(reopened.auth().user(), Some(&updated));

        shop.change_password(
            SecretString::from("pw".to_string()),
            SecretString::from("new-pw".to_string()),
            &SecretString::from("new-pw".to_string()),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_fetch_options() {
        let mut shop = storefront(MemoryStore::new());
        shop.fetch_options().await.unwrap();
        assert!(!shop.catalog().categories().is_empty());
        assert_eq!(shop.catalog().pharmacies().len(), 3);
    }

    #[test]
    fn test_from_config_mock_mode() {
        let mut config = StorefrontConfig::default();
        config.mock.enabled = true;
        let shop = Storefront::from_config(&config, MemoryStore::new()).unwrap();
        assert!(shop.catalog().is_demo_mode());
    }

    #[test]
    fn test_from_config_http() {
        let shop = Storefront::from_config(&StorefrontConfig::default(), MemoryStore::new()).unwrap();
        assert!(!shop.catalog().is_demo_mode());
    }
}
