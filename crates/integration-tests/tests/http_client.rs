//! The HTTP client against canned responses from a local server.
//!
//! Run with: cargo test -p medmart-integration-tests --test http_client

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use medmart_core::ProductId;
use medmart_integration_tests::{Canned, CannedServer, PAGE_SIZE};
use medmart_storefront::Storefront;
use medmart_storefront::api::{ApiClient, ApiError, CatalogService, ProductQuery};
use medmart_storefront::catalog::{CatalogState, LoadOutcome};
use medmart_storefront::auth::ProfileEdit;
use medmart_storefront::config::{ApiConfig, StorefrontConfig};
use medmart_storefront::store::{KeyValueStore, MemoryStore, keys};
use secrecy::SecretString;

const LOGIN: &str = r#"{"token":"tok-123","user":{"_id":"u1","email":"jane@example.com",
    "firstName":"Jane","lastName":"Doe","phone":"555-0100"}}"#;

const PRODUCTS: &str = r#"{"data":{"products":[
    {"_id":"1","name":"Aspirin 325mg","price":8.99,"category":"Pain Relief","stockQuantity":150},
    {"_id":"4","name":"Ibuprofen 200mg","price":"7.49","category":"Pain Relief","inStock":true},
    {"_id":"bad:id","name":"Broken","price":1}
  ],
  "pagination":{"currentPage":1,"totalPages":2,"totalItems":6}}}"#;

fn client(server: &CannedServer) -> ApiClient {
    ApiClient::new(&ApiConfig {
        base_url: server.base_url().to_string(),
        ..ApiConfig::default()
    })
    .unwrap()
}

fn pain_relief() -> ProductQuery {
    let mut query = ProductQuery::first_page(PAGE_SIZE);
    query.filters.category = "Pain Relief".to_string();
    query
}

#[tokio::test]
async fn test_product_listing_is_parsed_and_cached() {
    let server = CannedServer::start(vec![("products", Canned::json(200, PRODUCTS))])
        .await
        .unwrap();
    let api = client(&server);

    let page = api.products(&pain_relief()).await.unwrap();
    assert_eq!(page.products.len(), 2);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.total, 6);

    let requests = server.requests();
    let line = requests.first().unwrap();
    assert!(line.starts_with("GET /api/v1/products?"));
    assert!(line.contains("category=Pain+Relief"));
    assert!(line.contains("limit=4"));

    api.products(&pain_relief()).await.unwrap();
    assert_eq!(server.hits("products"), 1);
}

#[tokio::test]
async fn test_searches_bypass_the_cache() {
    let server = CannedServer::start(vec![("products", Canned::json(200, PRODUCTS))])
        .await
        .unwrap();
    let api = client(&server);

    let mut query = pain_relief();
    query.filters.search = "aspirin".to_string();
    api.products(&query).await.unwrap();
    api.products(&query).await.unwrap();

    assert_eq!(server.hits("products"), 2);
    assert!(server.requests().iter().all(|line| line.contains("search=aspirin")));
}

#[tokio::test]
async fn test_missing_product_maps_to_not_found() {
    let server = CannedServer::start(Vec::new()).await.unwrap();
    let api = client(&server);

    let id = ProductId::parse("42").unwrap();
    let err = api.product(&id).await.unwrap_err();
    assert!(matches!(err, ApiError::ProductNotFound(missing) if missing == id));
}

#[tokio::test]
async fn test_error_statuses() {
    let server = CannedServer::start(vec![
        (
            "products/categories",
            Canned::json(429, "{}").header("retry-after", "7"),
        ),
        (
            "products/pharmacies",
            Canned::json(500, r#"{"message":"database unavailable"}"#),
        ),
    ])
    .await
    .unwrap();
    let api = client(&server);

    assert!(matches!(
        api.categories().await,
        Err(ApiError::RateLimited(7))
    ));
    match api.pharmacies().await {
        Err(ApiError::Status { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "database unavailable");
        }
        other => panic!("expected a status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_catalog_state_over_http() {
    let server = CannedServer::start(vec![
        ("products", Canned::json(200, PRODUCTS)),
        (
            "products/categories",
            Canned::json(200, r#"{"data":["Pain Relief","Vitamins"]}"#),
        ),
        (
            "products/pharmacies",
            Canned::json(200, r#"["WellCare Drugstore",{"_id":"p1","name":"MedMart Pharmacy"}]"#),
        ),
    ])
    .await
    .unwrap();
    let api = Arc::new(client(&server));
    let mut shop = Storefront::new(
        MemoryStore::new(),
        api.clone(),
        api,
        CatalogState::new(PAGE_SIZE),
    );

    assert_eq!(shop.fetch_products().await, LoadOutcome::Replaced { count: 2 });
    assert!(shop.catalog().has_more());

    shop.fetch_options().await.unwrap();
    assert_eq!(shop.catalog().categories(), ["Pain Relief", "Vitamins"]);
    assert_eq!(
        shop.catalog().pharmacy_names(),
        ["WellCare Drugstore", "MedMart Pharmacy"]
    );
}

#[tokio::test]
async fn test_login_over_http_persists_session() {
    let server = CannedServer::start(vec![(
        "auth/login",
        Canned::json(200, LOGIN),
    )])
    .await
    .unwrap();
    let api = Arc::new(client(&server));
    let store = MemoryStore::new();
    let mut shop = Storefront::new(store.clone(), api.clone(), api, CatalogState::new(PAGE_SIZE));

    let user = shop
        .login("jane@example.com", SecretString::from("secret"))
        .await
        .unwrap();
    assert_eq!(user.name, "Jane Doe");
    assert_eq!(user.phone.as_deref(), Some("555-0100"));

    assert_eq!(store.get(keys::TOKEN).unwrap().as_deref(), Some("tok-123"));
    assert_eq!(store.get(keys::SESSION_ID).unwrap().as_deref(), Some("tok-123"));
    assert_eq!(shop.auth().session_id().as_str(), "tok-123");
    assert!(server.requests().first().unwrap().starts_with("POST /api/v1/auth/login"));
}

#[tokio::test]
async fn test_rejected_login_leaves_session_signed_out() {
    let server = CannedServer::start(vec![(
        "auth/login",
        Canned::json(401, r#"{"message":"Invalid email or password"}"#),
    )])
    .await
    .unwrap();
    let api = Arc::new(client(&server));
    let store = MemoryStore::new();
    let mut shop = Storefront::new(store.clone(), api.clone(), api, CatalogState::new(PAGE_SIZE));

    let err = shop
        .login("jane@example.com", SecretString::from("wrong"))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Invalid email or password");
    assert!(!shop.auth().is_authenticated());
    assert_eq!(store.get(keys::TOKEN).unwrap(), None);
}

#[tokio::test]
async fn test_token_is_sent_as_bearer() {
    let server = CannedServer::start(vec![(
        "products/categories",
        Canned::json(200, r#"["Vitamins"]"#),
    )])
    .await
    .unwrap();
    let api = client(&server).with_token(SecretString::from("tok-123"));

    assert_eq!(api.categories().await.unwrap(), ["Vitamins"]);
    assert_eq!(
        server.header_values("authorization"),
        [Some("Bearer tok-123".to_string())]
    );
}

fn shop_over(server: &CannedServer) -> Storefront<MemoryStore> {
    let config = StorefrontConfig {
        api: ApiConfig {
            base_url: server.base_url().to_string(),
            ..ApiConfig::default()
        },
        page_size: PAGE_SIZE,
        ..StorefrontConfig::default()
    };
    Storefront::from_config(&config, MemoryStore::new()).unwrap()
}

#[tokio::test]
async fn test_catalog_requests_follow_the_session_token() {
    let server = CannedServer::start(vec![
        ("products", Canned::json(200, PRODUCTS)),
        ("auth/login", Canned::json(200, LOGIN)),
        ("auth/logout", Canned::json(200, "{}")),
    ])
    .await
    .unwrap();
    let mut shop = shop_over(&server);
    // Searches skip the cache, so every fetch reaches the server
    shop.catalog_mut().set_search_query("aspirin");

    shop.fetch_products().await;
    shop.login("jane@example.com", SecretString::from("secret"))
        .await
        .unwrap();
    shop.fetch_products().await;
    shop.logout().await;
    shop.fetch_products().await;

    let catalog_auth: Vec<Option<String>> = server
        .requests()
        .iter()
        .zip(server.header_values("authorization"))
        .filter(|(line, _)| line.contains(" /api/v1/products"))
        .map(|(_, auth)| auth)
        .collect();
    assert_eq!(
        catalog_auth,
        [None, Some("Bearer tok-123".to_string()), None]
    );
}

#[tokio::test]
async fn test_profile_update_over_http() {
    let server = CannedServer::start(vec![
        ("auth/login", Canned::json(200, LOGIN)),
        (
            "users/profile",
            Canned::json(
                200,
                r#"{"user":{"_id":"u1","email":"jane@example.com","firstName":"Jane",
                    "lastName":"Roe","phone":"555-0199"}}"#,
            ),
        ),
    ])
    .await
    .unwrap();
    let mut shop = shop_over(&server);
    shop.login("jane@example.com", SecretString::from("secret"))
        .await
        .unwrap();

    let edit = ProfileEdit {
        name: Some("Jane Roe".to_string()),
        phone: Some("555-0199".to_string()),
        ..ProfileEdit::default()
    };
    let user = shop.update_profile(edit).await.unwrap();
    assert_eq!(user.name, "Jane Roe");
    assert_eq!(shop.auth().user(), Some(&user));
    let stored = shop.store().get(keys::USER).unwrap().unwrap();
    assert!(stored.contains("555-0199"));

    let requests = server.requests();
    assert!(requests.last().unwrap().starts_with("PUT /api/v1/users/profile"));
    assert_eq!(
        server.header_values("authorization").last().unwrap().as_deref(),
        Some("Bearer tok-123")
    );
}
