//! Request and response types for the storefront API.
//!
//! Wire shapes are deserialized into private `*Body` structs and converted
//! into the public types here, so the loose parts of the API (optional
//! `data` envelopes, bare lists versus keyed objects, products that fail
//! validation) never leak past this module.

use medmart_core::{Email, PharmacyRef, Product, RawProduct, UserId};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::ProductFilters;

/// Default number of products per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

// =============================================================================
// Catalog
// =============================================================================

/// Parameters of a product listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    /// Active filters; empty filters are omitted from the request.
    pub filters: ProductFilters,
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

impl ProductQuery {
    /// Unfiltered first page.
    #[must_use]
    pub fn first_page(limit: u32) -> Self {
        Self {
            filters: ProductFilters::default(),
            page: 1,
            limit,
        }
    }

    /// Query string parameters, skipping empty filters.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.max(1).to_string()),
            ("limit", self.limit.to_string()),
        ];
        for (key, value) in [
            ("search", &self.filters.search),
            ("category", &self.filters.category),
            ("pharmacy", &self.filters.pharmacy),
        ] {
            if !value.trim().is_empty() {
                pairs.push((key, value.clone()));
            }
        }
        pairs
    }

    /// Whether the query carries a free-text search.
    #[must_use]
    pub fn is_search(&self) -> bool {
        !self.filters.search.trim().is_empty()
    }
}

/// One page of products.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductPage {
    pub products: Vec<Product>,
    /// 1-based page number this response covers.
    pub page: u32,
    pub total_pages: u32,
    /// Total number of matching products across all pages.
    pub total: u64,
}

/// Body of `GET /products`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProductPageBody {
    #[serde(default)]
    products: Vec<RawProduct>,
    #[serde(default)]
    pagination: Option<PaginationBody>,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    total_pages: Option<u32>,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaginationBody {
    #[serde(default, alias = "currentPage")]
    page: Option<u32>,
    #[serde(default)]
    total_pages: Option<u32>,
    #[serde(default, alias = "totalItems")]
    total: Option<u64>,
}

impl ProductPageBody {
    /// Normalize the body, dropping products that fail validation.
    pub(crate) fn into_page(self, query: &ProductQuery) -> ProductPage {
        let fetched = self.products.len();
        let products: Vec<Product> = self
            .products
            .into_iter()
            .filter_map(|raw| {
                let id = raw.id.clone();
                Product::try_from(raw)
                    .map_err(|e| warn!(product_id = %id, error = %e, "Dropping invalid product"))
                    .ok()
            })
            .collect();

        let (page, total_pages, total) = match self.pagination {
            Some(p) => (p.page, p.total_pages, p.total),
            None => (self.page, self.total_pages, self.total),
        };

        let total = total.unwrap_or_else(|| u64::try_from(fetched).unwrap_or(u64::MAX));
        let total_pages = total_pages.unwrap_or_else(|| pages_for(total, query.limit));

        ProductPage {
            products,
            page: page.unwrap_or(query.page).max(1),
            total_pages,
            total,
        }
    }
}

/// Number of pages needed to show `total` items at `limit` per page.
#[must_use]
pub fn pages_for(total: u64, limit: u32) -> u32 {
    if limit == 0 {
        return u32::from(total > 0);
    }
    u32::try_from(total.div_ceil(u64::from(limit))).unwrap_or(u32::MAX)
}

/// A response that may or may not be wrapped in `{ "data": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

/// Body of `GET /products/categories`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CategoriesBody {
    List(Vec<String>),
    Keyed { categories: Vec<String> },
}

impl From<CategoriesBody> for Vec<String> {
    fn from(body: CategoriesBody) -> Self {
        match body {
            CategoriesBody::List(categories) | CategoriesBody::Keyed { categories } => categories,
        }
    }
}

/// Body of `GET /products/pharmacies`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PharmaciesBody {
    List(Vec<PharmacyRef>),
    Keyed { pharmacies: Vec<PharmacyRef> },
}

impl From<PharmaciesBody> for Vec<PharmacyRef> {
    fn from(body: PharmaciesBody) -> Self {
        match body {
            PharmaciesBody::List(pharmacies) | PharmaciesBody::Keyed { pharmacies } => pharmacies,
        }
    }
}

/// Body of `GET /products/:id`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ProductBody {
    Keyed { product: Product },
    Bare(Product),
}

impl From<ProductBody> for Product {
    fn from(body: ProductBody) -> Self {
        match body {
            ProductBody::Keyed { product } | ProductBody::Bare(product) => product,
        }
    }
}

/// Error payload returned with non-success statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default, alias = "error")]
    pub message: Option<String>,
}

// =============================================================================
// Authentication
// =============================================================================

/// Login credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: Email,
    pub password: SecretString,
}

/// Account registration details.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: Email,
    pub password: SecretString,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A signed-in user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Free-form or JSON encoded default shipping address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Profile fields to change; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub phone: Option<String>,
    /// JSON encoded default shipping address.
    pub address: Option<String>,
}

impl ProfileUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.address.is_none()
    }
}

/// Current and replacement password.
#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub current: SecretString,
    pub new: SecretString,
}

/// Successful login or registration.
#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub token: SecretString,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponseBody {
    pub token: String,
    pub user: UserBody,
}

/// Body of `GET /users/profile` and `PUT /users/profile`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ProfileBody {
    Keyed { user: UserBody },
    Bare(UserBody),
}

impl TryFrom<ProfileBody> for User {
    type Error = String;

    fn try_from(body: ProfileBody) -> Result<Self, Self::Error> {
        match body {
            ProfileBody::Keyed { user } | ProfileBody::Bare(user) => Self::try_from(user),
        }
    }
}

/// Request body of `PUT /users/profile`. The API stores first and last
/// names separately.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProfileUpdateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<&'a str>,
}

impl<'a> From<&'a ProfileUpdate> for ProfileUpdateBody<'a> {
    fn from(update: &'a ProfileUpdate) -> Self {
        let (first_name, last_name) = match update.name.as_deref().map(str::trim) {
            Some(name) => match name.split_once(char::is_whitespace) {
                Some((first, last)) => (Some(first), Some(last.trim())),
                None => (Some(name), Some("")),
            },
            None => (None, None),
        };
        Self {
            first_name,
            last_name,
            email: update.email.as_ref().map(Email::as_str),
            phone: update.phone.as_deref(),
            address: update.address.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserBody {
    #[serde(alias = "_id")]
    id: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    address: Option<serde_json::Value>,
}

impl TryFrom<UserBody> for User {
    type Error = String;

    fn try_from(body: UserBody) -> Result<Self, Self::Error> {
        let id = UserId::parse(body.id).map_err(|e| e.to_string())?;
        let email = Email::parse(&body.email).map_err(|e| e.to_string())?;

        let name = body
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| {
                [body.first_name, body.last_name]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .trim()
                    .to_string()
            });

        let address = match body.address {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        Ok(Self {
            id,
            email,
            name,
            phone: body.phone,
            address,
        })
    }
}
