//! Catalog state manager.
//!
//! Holds the fetched item set, the active filters, the derived visible
//! subset and the pagination cursor. The visible subset is recomputed
//! synchronously whenever items or filters change.
//!
//! Remote requests go through [`FetchTicket`]s: every request carries a
//! generation number together with the filters and page it was issued for,
//! and a response is only applied if its ticket is still the current one and
//! the filters have not changed since. Anything else is discarded as stale,
//! so a slow response can never overwrite a more recent one.
//!
//! # Failure policy
//!
//! - A failed first-page fetch records the error; items become empty, or the
//!   built-in fixtures in demo mode.
//! - A failed load-more records the error and keeps the items already shown,
//!   in both modes.

mod filter;
mod pagination;

pub use filter::{FILTER_DEBOUNCE, FilterKind, ProductFilters, filter_products};
pub use pagination::Pagination;

use medmart_core::{PharmacyRef, Product, ProductId};
use tracing::{debug, info, instrument, warn};

use crate::api::{
    ApiError, CatalogService, DEFAULT_PAGE_SIZE, ProductPage, ProductQuery, fixtures,
};

/// Whether a request replaces the item set or extends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Replace,
    Append,
}

/// A tagged in-flight product request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    kind: FetchKind,
    query: ProductQuery,
}

impl FetchTicket {
    /// The request to send.
    #[must_use]
    pub const fn query(&self) -> &ProductQuery {
        &self.query
    }

    #[must_use]
    pub const fn kind(&self) -> FetchKind {
        self.kind
    }
}

/// Result of applying a product response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The item set was replaced with `count` products.
    Replaced { count: usize },
    /// `count` products were appended to the item set.
    Appended { count: usize },
    /// The fetch failed and the item set was replaced with `count` fixtures.
    FellBackToFixtures { count: usize },
    /// The fetch failed; see [`CatalogState::error`].
    Failed,
    /// No request was issued.
    Skipped,
    /// The response was superseded and discarded.
    Stale,
}

/// Client-side catalog state.
#[derive(Debug, Clone)]
pub struct CatalogState {
    items: Vec<Product>,
    visible: Vec<Product>,
    filters: ProductFilters,
    pagination: Pagination,
    categories: Vec<String>,
    pharmacies: Vec<PharmacyRef>,
    loading: bool,
    loading_more: bool,
    error: Option<String>,
    demo_mode: bool,
    generation: u64,
    pending: Option<u64>,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl CatalogState {
    /// Empty catalog requesting `page_size` products per page.
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            visible: Vec::new(),
            filters: ProductFilters::default(),
            pagination: Pagination::new(page_size.max(1)),
            categories: Vec::new(),
            pharmacies: Vec::new(),
            loading: false,
            loading_more: false,
            error: None,
            demo_mode: false,
            generation: 0,
            pending: None,
        }
    }

    /// Enable or disable the fixture fallback on failed fetches.
    #[must_use]
    pub const fn with_demo_mode(mut self, demo_mode: bool) -> Self {
        self.demo_mode = demo_mode;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Every product fetched so far, in server order.
    #[must_use]
    pub fn items(&self) -> &[Product] {
        &self.items
    }

    /// The items passing the current filters.
    #[must_use]
    pub fn visible(&self) -> &[Product] {
        &self.visible
    }

    #[must_use]
    pub const fn filters(&self) -> &ProductFilters {
        &self.filters
    }

    #[must_use]
    pub const fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.pagination.has_more()
    }

    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    #[must_use]
    pub fn pharmacies(&self) -> &[PharmacyRef] {
        &self.pharmacies
    }

    /// Pharmacy option labels, with blank names replaced by a placeholder.
    #[must_use]
    pub fn pharmacy_names(&self) -> Vec<&str> {
        self.pharmacies.iter().map(PharmacyRef::display_name).collect()
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub const fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    /// Message describing the last failed request, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub const fn is_demo_mode(&self) -> bool {
        self.demo_mode
    }

    /// Look up a product in the current item set.
    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.items.iter().find(|product| &product.id == id)
    }

    // =========================================================================
    // Filters
    // =========================================================================

    /// Replace the search text. Returns whether it changed.
    pub fn set_search_query(&mut self, text: impl Into<String>) -> bool {
        self.set_filter(FilterKind::Search, text)
    }

    /// Replace the category filter; empty clears it. Returns whether it changed.
    pub fn set_category(&mut self, category: impl Into<String>) -> bool {
        self.set_filter(FilterKind::Category, category)
    }

    /// Replace the pharmacy filter; empty clears it. Returns whether it changed.
    pub fn set_pharmacy(&mut self, pharmacy: impl Into<String>) -> bool {
        self.set_filter(FilterKind::Pharmacy, pharmacy)
    }

    /// Reset one filter dimension. Returns whether it changed.
    pub fn clear_filter(&mut self, kind: FilterKind) -> bool {
        self.set_filter(kind, String::new())
    }

    /// Replace every filter dimension at once.
    pub fn set_filters(&mut self, filters: ProductFilters) {
        if self.filters != filters {
            self.filters = filters;
            self.recompute_visible();
        }
    }

    fn set_filter(&mut self, kind: FilterKind, value: impl Into<String>) -> bool {
        let changed = self.filters.set(kind, value);
        if changed {
            debug!(?kind, value = self.filters.get(kind), "Filter changed");
            self.recompute_visible();
        }
        changed
    }

    fn recompute_visible(&mut self) {
        self.visible = filter_products(&self.items, &self.filters)
            .into_iter()
            .cloned()
            .collect();
    }

    // =========================================================================
    // Tickets
    // =========================================================================

    /// Start a fetch of `page` with the current filters, superseding any
    /// request in flight.
    pub fn begin_fetch(&mut self, page: u32) -> FetchTicket {
        self.loading = true;
        self.loading_more = false;
        self.issue(FetchKind::Replace, page.max(1))
    }

    /// Start a load of the next page, or `None` if a request is already in
    /// flight or there are no further pages.
    pub fn begin_load_more(&mut self) -> Option<FetchTicket> {
        if self.pending.is_some() || !self.pagination.has_more() {
            return None;
        }
        self.loading_more = true;
        Some(self.issue(FetchKind::Append, self.pagination.next_page()))
    }

    fn issue(&mut self, kind: FetchKind, page: u32) -> FetchTicket {
        self.generation += 1;
        self.pending = Some(self.generation);
        FetchTicket {
            generation: self.generation,
            kind,
            query: ProductQuery {
                filters: self.filters.clone(),
                page,
                limit: self.pagination.page_size(),
            },
        }
    }

    /// Apply the response to a ticket.
    pub fn apply(
        &mut self,
        ticket: &FetchTicket,
        result: Result<ProductPage, ApiError>,
    ) -> LoadOutcome {
        if self.pending != Some(ticket.generation) {
            debug!(generation = ticket.generation, "Discarding superseded response");
            return LoadOutcome::Stale;
        }

        self.pending = None;
        self.loading = false;
        self.loading_more = false;

        if ticket.query.filters != self.filters {
            debug!(generation = ticket.generation, "Discarding response for old filters");
            return LoadOutcome::Stale;
        }

        match (ticket.kind, result) {
            (FetchKind::Replace, Ok(page)) => {
                let count = page.products.len();
                self.pagination = Pagination::from_page(&page, self.pagination.page_size());
                self.items = page.products;
                self.error = None;
                self.recompute_visible();
                info!(count, page = self.pagination.current_page(), "Loaded products");
                LoadOutcome::Replaced { count }
            }
            (FetchKind::Append, Ok(page)) => {
                let count = page.products.len();
                self.pagination = Pagination::from_page(&page, self.pagination.page_size());
                self.items.extend(page.products);
                self.error = None;
                self.recompute_visible();
                info!(count, page = self.pagination.current_page(), "Loaded more products");
                LoadOutcome::Appended { count }
            }
            (FetchKind::Replace, Err(e)) => {
                warn!(error = %e, "Failed to fetch products");
                self.error = Some(e.user_message());
                let page_size = self.pagination.page_size();
                if self.demo_mode {
                    self.items = fixtures::products();
                    self.pagination = Pagination::single_page(self.items.len(), page_size);
                    self.recompute_visible();
                    LoadOutcome::FellBackToFixtures {
                        count: self.items.len(),
                    }
                } else {
                    self.items.clear();
                    self.pagination = Pagination::new(page_size);
                    self.recompute_visible();
                    LoadOutcome::Failed
                }
            }
            (FetchKind::Append, Err(e)) => {
                warn!(error = %e, "Failed to load more products");
                self.error = Some(e.user_message());
                LoadOutcome::Failed
            }
        }
    }

    // =========================================================================
    // Remote operations
    // =========================================================================

    /// Fetch page 1 with the current filters.
    #[instrument(skip(self, service), fields(filters = ?self.filters))]
    pub async fn fetch_products(&mut self, service: &dyn CatalogService) -> LoadOutcome {
        self.fetch_page(service, 1).await
    }

    /// Fetch `page` with the current filters, replacing the item set.
    pub async fn fetch_page(&mut self, service: &dyn CatalogService, page: u32) -> LoadOutcome {
        let ticket = self.begin_fetch(page);
        let result = service.products(ticket.query()).await;
        self.apply(&ticket, result)
    }

    /// Fetch the next page and append it. No request is issued when a load
    /// is in flight or there are no further pages.
    #[instrument(skip(self, service), fields(next_page = self.pagination.next_page()))]
    pub async fn load_more(&mut self, service: &dyn CatalogService) -> LoadOutcome {
        let Some(ticket) = self.begin_load_more() else {
            debug!("Nothing more to load");
            return LoadOutcome::Skipped;
        };
        let result = service.products(ticket.query()).await;
        self.apply(&ticket, result)
    }

    /// Populate the category option list.
    ///
    /// # Errors
    ///
    /// Returns the service error after recording it; the list is left as-is,
    /// or filled from the fixtures in demo mode.
    #[instrument(skip_all)]
    pub async fn fetch_categories(&mut self, service: &dyn CatalogService) -> Result<(), ApiError> {
        match service.categories().await {
            Ok(categories) => {
                self.categories = categories;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch categories");
                self.error = Some(e.user_message());
                if self.demo_mode {
                    self.categories = fixtures::categories();
                }
                Err(e)
            }
        }
    }

    /// Populate the pharmacy option list.
    ///
    /// # Errors
    ///
    /// Returns the service error after recording it; the list is left as-is,
    /// or filled from the fixtures in demo mode.
    #[instrument(skip_all)]
    pub async fn fetch_pharmacies(&mut self, service: &dyn CatalogService) -> Result<(), ApiError> {
        match service.pharmacies().await {
            Ok(pharmacies) => {
                self.pharmacies = pharmacies;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch pharmacies");
                self.error = Some(e.user_message());
                if self.demo_mode {
                    self.pharmacies = fixtures::pharmacies();
                }
                Err(e)
            }
        }
    }

    /// Resolve a product for a detail view.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::ProductNotFound` if the product does not exist, or
    /// the service error if it could not be reached (in demo mode a fixture
    /// with the same id is returned instead).
    #[instrument(skip(self, service), fields(product_id = %id))]
    pub async fn fetch_product(
        &self,
        service: &dyn CatalogService,
        id: &ProductId,
    ) -> Result<Product, ApiError> {
        match service.product(id).await {
            Ok(product) => Ok(product),
            Err(e) if self.demo_mode && !matches!(e, ApiError::ProductNotFound(_)) => {
                warn!(error = %e, "Falling back to fixture product");
                fixtures::products()
                    .into_iter()
                    .find(|product| &product.id == id)
                    .ok_or_else(|| ApiError::ProductNotFound(id.clone()))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mockall::predicate::always;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::api::MockCatalogService;

    fn product(id: &str, name: &str) -> Product {
        let raw = medmart_core::RawProduct {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            price: dec!(10),
            image: String::new(),
            category: "General".to_string(),
            pharmacy: None,
            requires_prescription: false,
            in_stock: Some(true),
            stock_quantity: None,
            generic_name: None,
            dosage: None,
            manufacturer: None,
        };
        Product::try_from(raw).unwrap()
    }

    fn page(products: Vec<Product>, page: u32, total_pages: u32) -> ProductPage {
        let total = products.len() as u64;
        ProductPage {
            products,
            page,
            total_pages,
            total,
        }
    }

    fn unavailable() -> ApiError {
        ApiError::Unavailable("down".to_string())
    }

    #[test]
    fn test_search_then_clear_restores_visible() {
        let mut state = CatalogState::default();
        let ticket = state.begin_fetch(1);
        state.apply(&ticket, Ok(page(vec![product("A", "Aspirin")], 1, 1)));
        assert_eq!(state.visible().len(), 1);

        assert!(state.set_search_query("zzz"));
        assert!(state.visible().is_empty());
        assert_eq!(state.items().len(), 1);

        assert!(state.set_search_query(""));
        assert_eq!(state.visible().len(), 1);
        assert_eq!(state.visible()[0].id.as_str(), "A");
    }

    #[test]
    fn test_clear_filter() {
        let mut state = CatalogState::default();
        state.set_category("Vitamins");
        assert!(state.clear_filter(FilterKind::Category));
        assert!(!state.clear_filter(FilterKind::Category));
        assert!(state.filters().is_empty());
    }

    #[test]
    fn test_failed_fetch_clears_items_in_normal_mode() {
        let mut state = CatalogState::default();
        let ticket = state.begin_fetch(1);
        state.apply(&ticket, Ok(page(vec![product("A", "Aspirin")], 1, 2)));

        let ticket = state.begin_fetch(1);
        assert!(state.is_loading());
        assert_eq!(state.apply(&ticket, Err(unavailable())), LoadOutcome::Failed);
        assert!(state.items().is_empty());
        assert!(state.visible().is_empty());
        assert!(!state.has_more());
        assert!(state.error().is_some());
        assert!(!state.is_loading());
    }

    #[test]
    fn test_failed_fetch_falls_back_to_fixtures_in_demo_mode() {
        let mut state = CatalogState::default().with_demo_mode(true);
        let ticket = state.begin_fetch(1);
        let outcome = state.apply(&ticket, Err(unavailable()));

        let fixtures = fixtures::products();
        assert_eq!(
            outcome,
            LoadOutcome::FellBackToFixtures {
                count: fixtures.len()
            }
        );
        assert_eq!(state.items(), fixtures.as_slice());
        assert!(state.error().is_some());
    }

    #[test]
    fn test_demo_fallback_respects_filters() {
        let mut state = CatalogState::default().with_demo_mode(true);
        state.set_category("Vitamins");
        let ticket = state.begin_fetch(1);
        state.apply(&ticket, Err(unavailable()));
        assert_eq!(state.visible().len(), 1);
        assert_eq!(state.visible()[0].category, "Vitamins");
    }

    #[test]
    fn test_failed_load_more_keeps_items() {
        for demo in [false, true] {
            let mut state = CatalogState::default().with_demo_mode(demo);
            let ticket = state.begin_fetch(1);
            state.apply(&ticket, Ok(page(vec![product("A", "Aspirin")], 1, 2)));

            let ticket = state.begin_load_more().unwrap();
            assert_eq!(ticket.query().page, 2);
            assert_eq!(state.apply(&ticket, Err(unavailable())), LoadOutcome::Failed);
            assert_eq!(state.items().len(), 1);
            assert_eq!(state.items()[0].id.as_str(), "A");
            assert!(state.has_more());
        }
    }

    #[test]
    fn test_load_more_appends() {
        let mut state = CatalogState::default();
        let ticket = state.begin_fetch(1);
        state.apply(&ticket, Ok(page(vec![product("A", "Aspirin")], 1, 2)));

        let ticket = state.begin_load_more().unwrap();
        let outcome = state.apply(&ticket, Ok(page(vec![product("B", "Bandage")], 2, 2)));
        assert_eq!(outcome, LoadOutcome::Appended { count: 1 });

        let ids: Vec<&str> = state.items().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert!(!state.has_more());
        assert!(state.begin_load_more().is_none());
    }

    #[test]
    fn test_load_more_refused_while_in_flight() {
        let mut state = CatalogState::default();
        let ticket = state.begin_fetch(1);
        state.apply(&ticket, Ok(page(vec![product("A", "Aspirin")], 1, 3)));

        let _first = state.begin_load_more().unwrap();
        assert!(state.is_loading_more());
        assert!(state.begin_load_more().is_none());
    }

    #[test]
    fn test_superseded_response_is_stale() {
        let mut state = CatalogState::default();
        let old = state.begin_fetch(1);
        let new = state.begin_fetch(1);

        assert_eq!(
            state.apply(&new, Ok(page(vec![product("N", "New")], 1, 1))),
            LoadOutcome::Replaced { count: 1 }
        );
        assert_eq!(
            state.apply(&old, Ok(page(vec![product("O", "Old")], 1, 1))),
            LoadOutcome::Stale
        );
        assert_eq!(state.items()[0].id.as_str(), "N");
    }

    #[test]
    fn test_response_for_old_filters_is_stale() {
        let mut state = CatalogState::default();
        let ticket = state.begin_fetch(1);
        state.set_search_query("bandage");

        let outcome = state.apply(&ticket, Ok(page(vec![product("A", "Aspirin")], 1, 1)));
        assert_eq!(outcome, LoadOutcome::Stale);
        assert!(state.items().is_empty());
        assert!(!state.is_loading());
    }

    #[test]
    fn test_product_lookup() {
        let mut state = CatalogState::default();
        let ticket = state.begin_fetch(1);
        state.apply(&ticket, Ok(page(vec![product("A", "Aspirin")], 1, 1)));

        assert!(state.product(&ProductId::parse("A").unwrap()).is_some());
        assert!(state.product(&ProductId::parse("Z").unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_load_more_without_more_pages_issues_no_request() {
        let mut service = MockCatalogService::new();
        service
            .expect_products()
            .with(always())
            .once()
            .returning(|_| Ok(page(vec![product("A", "Aspirin")], 1, 1)));

        let mut state = CatalogState::default();
        assert_eq!(
            state.fetch_products(&service).await,
            LoadOutcome::Replaced { count: 1 }
        );
        assert!(!state.has_more());

        assert_eq!(state.load_more(&service).await, LoadOutcome::Skipped);
        assert_eq!(state.items().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_sends_current_filters() {
        let mut service = MockCatalogService::new();
        service
            .expect_products()
            .withf(|query| {
                query.page == 1 && query.limit == 5 && query.filters.category == "Vitamins"
            })
            .once()
            .returning(|_| Ok(ProductPage::default()));

        let mut state = CatalogState::new(5);
        state.set_category("Vitamins");
        state.fetch_products(&service).await;
    }

    #[tokio::test]
    async fn test_option_lists() {
        let mut service = MockCatalogService::new();
        service
            .expect_categories()
            .once()
            .returning(|| Ok(vec!["Vitamins".to_string()]));
        service.expect_pharmacies().once().returning(|| {
            Ok(vec![
                PharmacyRef::Name("WellCare".to_string()),
                PharmacyRef::Name(String::new()),
            ])
        });

        let mut state = CatalogState::default();
        state.fetch_categories(&service).await.unwrap();
        state.fetch_pharmacies(&service).await.unwrap();

        assert_eq!(state.categories(), ["Vitamins".to_string()]);
        assert_eq!(state.pharmacy_names(), vec!["WellCare", "Unnamed Pharmacy"]);
    }

    #[tokio::test]
    async fn test_option_list_failure_keeps_lists() {
        let mut service = MockCatalogService::new();
        let mut calls = 0;
        service.expect_categories().times(2).returning(move || {
            calls += 1;
            if calls == 1 {
                Ok(vec!["Vitamins".to_string()])
            } else {
                Err(ApiError::Unavailable("down".to_string()))
            }
        });

        let mut state = CatalogState::default();
        state.fetch_categories(&service).await.unwrap();
        assert!(state.fetch_categories(&service).await.is_err());
        assert_eq!(state.categories(), ["Vitamins".to_string()]);
        assert!(state.error().is_some());
    }

    #[tokio::test]
    async fn test_fetch_product_demo_fallback() {
        let mut service = MockCatalogService::new();
        service
            .expect_product()
            .returning(|_| Err(ApiError::Unavailable("down".to_string())));

        let id = ProductId::parse("1").unwrap();
        let normal = CatalogState::default();
        assert!(normal.fetch_product(&service, &id).await.is_err());

        let demo = CatalogState::default().with_demo_mode(true);
        let product = demo.fetch_product(&service, &id).await.unwrap();
        assert_eq!(product.name, "Aspirin 325mg");

        let missing = ProductId::parse("missing").unwrap();
        assert!(matches!(
            demo.fetch_product(&service, &missing).await,
            Err(ApiError::ProductNotFound(_))
        ));
    }
}
