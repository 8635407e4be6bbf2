//! Integration tests for MedMart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p medmart-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `catalog_scenarios` - Filtering, pagination and fallback against the mock API
//! - `cart_checkout` - Cart arithmetic, checkout gating and order history
//! - `persistence` - State surviving a restart through the file store
//! - `http_client` - The HTTP client against a canned local server
//!
//! Everything runs in-process: the offline [`MockApi`] stands in for the
//! storefront API, except in `http_client`, which serves canned responses
//! from a local socket.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

use medmart_core::{PaymentMethod, ShippingAddress};
use medmart_storefront::Storefront;
use medmart_storefront::api::MockApi;
use medmart_storefront::catalog::CatalogState;
use medmart_storefront::checkout::CheckoutDetails;
use medmart_storefront::store::{KeyValueStore, MemoryStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Page size used by the test storefronts.
pub const PAGE_SIZE: u32 = 4;

// =============================================================================
// Storefront fixtures
// =============================================================================

/// A storefront over the mock API, with handles to its collaborators.
pub struct TestContext<S: KeyValueStore> {
    pub shop: Storefront<S>,
    pub api: MockApi,
    pub store: S,
}

impl TestContext<MemoryStore> {
    /// Fresh storefront over an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_api(MockApi::new(), MemoryStore::new())
    }
}

impl Default for TestContext<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: KeyValueStore> TestContext<S> {
    /// Storefront over `api` and `store`, without demo fallback.
    #[must_use]
    pub fn with_api(api: MockApi, store: S) -> Self {
        let shared = Arc::new(api.clone());
        let shop = Storefront::new(
            store.clone(),
            shared.clone(),
            shared,
            CatalogState::new(PAGE_SIZE),
        );
        Self { shop, api, store }
    }

    /// Storefront that falls back to the fixture catalog on failure.
    #[must_use]
    pub fn demo(api: MockApi, store: S) -> Self {
        let shared = Arc::new(api.clone());
        let shop = Storefront::new(
            store.clone(),
            shared.clone(),
            shared,
            CatalogState::new(PAGE_SIZE).with_demo_mode(true),
        );
        Self { shop, api, store }
    }
}

/// A complete shipping address.
#[must_use]
pub fn address() -> ShippingAddress {
    ShippingAddress {
        street: "12 Elm St".to_string(),
        city: "Portland".to_string(),
        state: "OR".to_string(),
        zip_code: "97201".to_string(),
    }
}

/// Checkout details paying by card to [`address`].
#[must_use]
pub fn card_checkout(prescription_uploaded: bool) -> CheckoutDetails {
    CheckoutDetails {
        shipping_address: address(),
        payment_method: PaymentMethod::Card,
        prescription_uploaded,
    }
}

// =============================================================================
// Canned HTTP server
// =============================================================================

/// A canned HTTP response.
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl Canned {
    #[must_use]
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Serves canned responses keyed by request path over a local socket and
/// records the head of every request it receives.
pub struct CannedServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl CannedServer {
    /// Bind to an ephemeral port and serve `routes` until the runtime stops.
    /// Unknown paths get a 404.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start(routes: Vec<(&str, Canned)>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}/api/v1", listener.local_addr()?);
        let routes: Arc<HashMap<String, Canned>> = Arc::new(
            routes
                .into_iter()
                .map(|(path, canned)| (format!("/api/v1/{path}"), canned))
                .collect(),
        );
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(respond(socket, Arc::clone(&routes), Arc::clone(&log)));
            }
        });

        Ok(Self { base_url, requests })
    }

    /// API root to configure the client with.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request lines received so far, such as `GET /api/v1/products?page=1 HTTP/1.1`.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.heads()
            .iter()
            .map(|head| head.lines().next().unwrap_or_default().to_string())
            .collect()
    }

    /// Values of header `name` in each request received so far.
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<Option<String>> {
        self.heads()
            .iter()
            .map(|head| {
                head.lines()
                    .skip(1)
                    .filter_map(|line| line.split_once(':'))
                    .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
                    .map(|(_, value)| value.trim().to_string())
            })
            .collect()
    }

    fn heads(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests whose target starts with `prefix` under the API root.
    #[must_use]
    pub fn hits(&self, prefix: &str) -> usize {
        let target = format!(" /api/v1/{prefix}");
        self.requests()
            .iter()
            .filter(|line| line.contains(&target))
            .count()
    }
}

async fn respond(
    mut socket: TcpStream,
    routes: Arc<HashMap<String, Canned>>,
    log: Arc<Mutex<Vec<String>>>,
) {
    let Some(head) = read_request(&mut socket).await else {
        return;
    };
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|target| target.split('?').next())
        .unwrap_or("/")
        .to_string();
    log.lock().unwrap_or_else(PoisonError::into_inner).push(head);

    let canned = routes
        .get(&path)
        .cloned()
        .unwrap_or_else(|| Canned::json(404, r#"{"message":"Not found"}"#));

    let mut response = format!(
        "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
        canned.status,
        canned.body.len()
    );
    for (name, value) in &canned.headers {
        let _ = write!(response, "{name}: {value}\r\n");
    }
    response.push_str("\r\n");
    response.push_str(&canned.body);

    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Read the request head and any body announced by `content-length`.
async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(chunk.get(..n)?);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(buf.get(..head_end)?).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(chunk.get(..n)?);
    }

    Some(head)
}
