//! Cache types for storefront API responses.

use medmart_core::{PharmacyRef, Product, ProductId};

use crate::api::{ProductPage, ProductQuery};

/// Cache key for catalog responses.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Product(ProductId),
    Products {
        page: u32,
        limit: u32,
        category: String,
        pharmacy: String,
    },
    Categories,
    Pharmacies,
}

impl CacheKey {
    /// Key for a listing request, or `None` for searches, which are never cached.
    pub fn for_query(query: &ProductQuery) -> Option<Self> {
        if query.is_search() {
            return None;
        }
        Some(Self::Products {
            page: query.page,
            limit: query.limit,
            category: query.filters.category.clone(),
            pharmacy: query.filters.pharmacy.clone(),
        })
    }
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(ProductPage),
    Categories(Vec<String>),
    Pharmacies(Vec<PharmacyRef>),
}
