//! Catalog product and pharmacy types.
//!
//! The remote catalog is loose about two fields: `pharmacy` may be a bare name
//! or a full record, and stock may be reported as a boolean `inStock` or a
//! numeric `stockQuantity`. Both are normalized exactly once, when a
//! [`RawProduct`] is converted into a [`Product`], so the rest of the system
//! only deals with [`PharmacyRef`] and [`Stock`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{IdError, ProductId};
use super::price::{Price, PriceError};

/// Display name used for pharmacies without a name.
pub const UNNAMED_PHARMACY: &str = "Unnamed Pharmacy";

/// Quantity cap used when a product does not report a stock count.
pub const DEFAULT_MAX_ORDER_QUANTITY: u32 = 10;

/// Errors that can occur when normalizing a [`RawProduct`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    /// The product identifier is invalid.
    #[error("invalid product id: {0}")]
    Id(#[from] IdError),
    /// The product price is invalid.
    #[error("invalid price for product {id}: {source}")]
    Price {
        /// Raw identifier of the offending product.
        id: String,
        /// Underlying price error.
        source: PriceError,
    },
}

/// A pharmacy record as returned by the catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pharmacy {
    /// Remote identifier.
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name; the only field used for filtering.
    #[serde(default)]
    pub name: String,
    /// Street address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Contact phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Pharmacy license number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
}

/// The pharmacy a product is sold by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PharmacyRef {
    /// Only the pharmacy name is known.
    Name(String),
    /// The full pharmacy record.
    Record(Pharmacy),
}

impl PharmacyRef {
    /// The pharmacy name, whichever form was received.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Record(pharmacy) => &pharmacy.name,
        }
    }

    /// The name to show in option lists; blank names get a placeholder.
    #[must_use]
    pub fn display_name(&self) -> &str {
        display_pharmacy_name(self.name())
    }
}

impl Default for PharmacyRef {
    fn default() -> Self {
        Self::Name(String::new())
    }
}

/// Substitute [`UNNAMED_PHARMACY`] for a blank pharmacy name.
#[must_use]
pub fn display_pharmacy_name(name: &str) -> &str {
    if name.trim().is_empty() {
        UNNAMED_PHARMACY
    } else {
        name
    }
}

/// Stock information for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stock {
    /// A unit count was reported.
    Quantity(u32),
    /// Only an availability flag was reported.
    Flag(bool),
}

impl Stock {
    /// Normalize the two wire fields; `stock_quantity` wins when both are set.
    #[must_use]
    pub fn from_wire(in_stock: Option<bool>, stock_quantity: Option<i64>) -> Self {
        match stock_quantity {
            Some(quantity) => Self::Quantity(u32::try_from(quantity.max(0)).unwrap_or(u32::MAX)),
            None => Self::Flag(in_stock.unwrap_or(false)),
        }
    }

    /// Whether the product can currently be ordered.
    #[must_use]
    pub const fn is_in_stock(self) -> bool {
        match self {
            Self::Quantity(quantity) => quantity > 0,
            Self::Flag(in_stock) => in_stock,
        }
    }

    /// Human readable stock label.
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Quantity(quantity) if quantity > 0 => format!("{quantity} in stock"),
            Self::Flag(true) => "In stock".to_string(),
            _ => "Out of stock".to_string(),
        }
    }

    /// Largest quantity a shopper may select for a single add.
    #[must_use]
    pub const fn max_order_quantity(self) -> u32 {
        match self {
            Self::Quantity(quantity) if quantity > 0 => quantity,
            _ => DEFAULT_MAX_ORDER_QUANTITY,
        }
    }
}

/// A product exactly as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: rust_decimal::Decimal,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pharmacy: Option<PharmacyRef>,
    #[serde(default)]
    pub requires_prescription: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
}

/// A normalized catalog product.
///
/// Products are immutable on the client: they are created from catalog
/// responses and replaced wholesale on re-fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawProduct", into = "RawProduct")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub image: String,
    pub category: String,
    pub pharmacy: PharmacyRef,
    pub requires_prescription: bool,
    pub stock: Stock,
    pub generic_name: Option<String>,
    pub dosage: Option<String>,
    pub manufacturer: Option<String>,
}

impl Product {
    /// The resolved pharmacy name used for filtering and cart snapshots.
    #[must_use]
    pub fn pharmacy_name(&self) -> &str {
        self.pharmacy.name()
    }

    /// Whether the product can currently be ordered.
    #[must_use]
    pub const fn is_in_stock(&self) -> bool {
        self.stock.is_in_stock()
    }
}

impl TryFrom<RawProduct> for Product {
    type Error = ProductError;

    fn try_from(raw: RawProduct) -> Result<Self, Self::Error> {
        let price = Price::new(raw.price).map_err(|source| ProductError::Price {
            id: raw.id.clone(),
            source,
        })?;

        Ok(Self {
            id: ProductId::parse(raw.id)?,
            name: raw.name,
            description: raw.description,
            price,
            image: raw.image,
            category: raw.category,
            pharmacy: raw.pharmacy.unwrap_or_default(),
            requires_prescription: raw.requires_prescription,
            stock: Stock::from_wire(raw.in_stock, raw.stock_quantity),
            generic_name: raw.generic_name,
            dosage: raw.dosage,
            manufacturer: raw.manufacturer,
        })
    }
}

impl From<Product> for RawProduct {
    fn from(product: Product) -> Self {
        let (in_stock, stock_quantity) = match product.stock {
            Stock::Quantity(quantity) => (None, Some(i64::from(quantity))),
            Stock::Flag(flag) => (Some(flag), None),
        };

        Self {
            id: product.id.into_inner(),
            name: product.name,
            description: product.description,
            price: product.price.amount(),
            image: product.image,
            category: product.category,
            pharmacy: Some(product.pharmacy),
            requires_prescription: product.requires_prescription,
            in_stock,
            stock_quantity,
            generic_name: product.generic_name,
            dosage: product.dosage,
            manufacturer: product.manufacturer,
        }
    }
}
