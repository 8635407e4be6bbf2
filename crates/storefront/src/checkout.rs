//! Order derivation at checkout.
//!
//! [`derive_order`] is a pure function from a cart and the checkout form to
//! an [`Order`]. [`place_order`] runs it against a live [`CartManager`] and
//! clears the cart only once the order exists, so a rejected checkout leaves
//! the cart exactly as it was.

use chrono::{DateTime, TimeDelta, Utc};
use medmart_core::{OrderId, OrderStatus, PaymentMethod, ShippingAddress, round_to_cents};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use crate::cart::{Cart, CartLine, CartManager};
use crate::store::KeyValueStore;

/// Sales tax applied to the subtotal (8%).
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

/// Days between placing an order and its estimated delivery.
pub const DELIVERY_ESTIMATE_DAYS: i64 = 3;

/// Reasons a checkout is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("cannot check out an empty cart")]
    EmptyCart,

    /// The cart holds a prescription item and no prescription was uploaded.
    #[error("a prescription is required for one or more items in the cart")]
    PrescriptionRequired,

    /// A shipping address field is blank.
    #[error("shipping address is incomplete")]
    IncompleteAddress,

    #[error("you must be logged in to place an order")]
    NotAuthenticated,
}

/// What the checkout form collects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDetails {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub prescription_uploaded: bool,
}

/// Totals shown before the customer confirms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSummary {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub requires_prescription: bool,
}

impl CheckoutSummary {
    /// The total is the subtotal plus tax, rounded to cents as a whole, so
    /// it can differ from `subtotal + tax` by a cent when the subtotal has
    /// fractional cents.
    #[must_use]
    pub fn for_cart(cart: &Cart) -> Self {
        let subtotal = cart.total();
        Self {
            subtotal,
            tax: tax_for(subtotal),
            total: total_for(subtotal),
            requires_prescription: cart.requires_prescription(),
        }
    }
}

/// Tax on `subtotal`, rounded to cents with halves away from zero.
#[must_use]
pub fn tax_for(subtotal: Decimal) -> Decimal {
    round_to_cents(subtotal * TAX_RATE)
}

/// `subtotal` with tax added, rounded to cents with halves away from zero.
#[must_use]
pub fn total_for(subtotal: Decimal) -> Decimal {
    round_to_cents(subtotal * (Decimal::ONE + TAX_RATE))
}

/// A placed order. Immutable apart from its status, which only
/// [`crate::orders::OrderHistory`] advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    lines: Vec<CartLine>,
    subtotal: Decimal,
    tax: Decimal,
    total: Decimal,
    status: OrderStatus,
    shipping_address: ShippingAddress,
    payment_method: PaymentMethod,
    prescription_uploaded: bool,
    placed_at: DateTime<Utc>,
    estimated_delivery: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub const fn id(&self) -> OrderId {
        self.id
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub const fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    #[must_use]
    pub const fn tax(&self) -> Decimal {
        self.tax
    }

    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.total
    }

    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    #[must_use]
    pub const fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    #[must_use]
    pub const fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    #[must_use]
    pub const fn prescription_uploaded(&self) -> bool {
        self.prescription_uploaded
    }

    #[must_use]
    pub const fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    #[must_use]
    pub const fn estimated_delivery(&self) -> DateTime<Utc> {
        self.estimated_delivery
    }

    /// Total number of units ordered.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    pub(crate) const fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
    }
}

/// Check that `cart` and `details` make an acceptable order.
///
/// # Errors
///
/// Returns the first `CheckoutError` that applies, checked in the order
/// empty cart, missing prescription, incomplete address.
pub fn validate(cart: &Cart, details: &CheckoutDetails) -> Result<(), CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    if cart.requires_prescription() && !details.prescription_uploaded {
        return Err(CheckoutError::PrescriptionRequired);
    }
    if !details.shipping_address.is_complete() {
        return Err(CheckoutError::IncompleteAddress);
    }
    Ok(())
}

/// Build an order from `cart` as placed at `now`.
///
/// # Errors
///
/// See [`validate`].
pub fn derive_order(
    cart: &Cart,
    details: &CheckoutDetails,
    now: DateTime<Utc>,
) -> Result<Order, CheckoutError> {
    validate(cart, details)?;

    let summary = CheckoutSummary::for_cart(cart);
    Ok(Order {
        id: OrderId::generate(),
        lines: cart.lines().to_vec(),
        subtotal: summary.subtotal,
        tax: summary.tax,
        total: summary.total,
        status: OrderStatus::Pending,
        shipping_address: details.shipping_address.clone(),
        payment_method: details.payment_method,
        prescription_uploaded: details.prescription_uploaded,
        placed_at: now,
        estimated_delivery: now + TimeDelta::days(DELIVERY_ESTIMATE_DAYS),
    })
}

/// Turn the cart into an order and empty the cart.
///
/// # Errors
///
/// See [`validate`]. The cart is untouched when an error is returned.
#[instrument(skip_all, fields(items = cart.item_count()))]
pub fn place_order<S: KeyValueStore>(
    cart: &mut CartManager<S>,
    details: &CheckoutDetails,
) -> Result<Order, CheckoutError> {
    let order = derive_order(cart.cart(), details, Utc::now())?;
    cart.clear();
    info!(order_id = %order.id, total = %order.total, "Order placed");
    Ok(order)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use medmart_core::{PharmacyRef, Product, RawProduct, SessionId};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::store::{MemoryStore, keys};

    fn product(id: &str, price: Decimal, rx: bool) -> Product {
        Product::try_from(RawProduct {
            id: id.to_string(),
            name: format!("Product {id}"),
            description: String::new(),
            price,
            image: String::new(),
            category: "General".to_string(),
            pharmacy: Some(PharmacyRef::Name("MedMart Pharmacy".to_string())),
            requires_prescription: rx,
            in_stock: Some(true),
            stock_quantity: None,
            generic_name: None,
            dosage: None,
            manufacturer: None,
        })
        .unwrap()
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            street: "1 Main St".to_string(),
            city: "Austin".to_string(),
            state: "TX".to_string(),
            zip_code: "78701".to_string(),
        }
    }

    fn details(prescription_uploaded: bool) -> CheckoutDetails {
        CheckoutDetails {
            shipping_address: address(),
            payment_method: PaymentMethod::Card,
            prescription_uploaded,
        }
    }

    fn cart_with(items: &[(Product, i64)]) -> (CartManager<MemoryStore>, MemoryStore) {
        let store = MemoryStore::new();
        let mut cart = CartManager::new(store.clone(), SessionId::parse("s").unwrap());
        for (product, quantity) in items {
            cart.add_item(product, *quantity).unwrap();
        }
        (cart, store)
    }

    #[test]
    fn test_tax_rounding() {
        assert_eq!(tax_for(dec!(100)), dec!(8.00));
        assert_eq!(tax_for(dec!(8.99)), dec!(0.72));
        // 0.0625 * 0.08 = 0.005 rounds up
        assert_eq!(tax_for(dec!(0.0625)), dec!(0.01));
    }

    #[test]
    fn test_total_rounds_fractional_cents() {
        let (cart, _) = cart_with(&[(product("A", dec!(0.125), false), 1)]);
        let summary = CheckoutSummary::for_cart(cart.cart());
        assert_eq!(summary.subtotal, dec!(0.125));
        assert_eq!(summary.tax, dec!(0.01));
        assert_eq!(summary.total, dec!(0.14));
        assert_eq!(summary.total, round_to_cents(summary.subtotal * dec!(1.08)));

        let (cart, _) = cart_with(&[(product("B", dec!(3.3333), false), 3)]);
        let order = derive_order(cart.cart(), &details(false), Utc::now()).unwrap();
        assert_eq!(order.subtotal(), dec!(9.9999));
        assert_eq!(order.total(), dec!(10.80));
    }

    #[test]
    fn test_summary() {
        let (cart, _) = cart_with(&[(product("A", dec!(10), false), 2)]);
        let summary = CheckoutSummary::for_cart(cart.cart());
        assert_eq!(summary.subtotal, dec!(20));
        assert_eq!(summary.tax, dec!(1.60));
        assert_eq!(summary.total, dec!(21.60));
        assert!(!summary.requires_prescription);
    }

    #[test]
    fn test_derive_order_fields() {
        let (cart, _) = cart_with(&[
            (product("A", dec!(8.99), false), 2),
            (product("B", dec!(15.50), true), 1),
        ]);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let order = derive_order(cart.cart(), &details(true), now).unwrap();
        assert_eq!(order.subtotal(), dec!(33.48));
        assert_eq!(order.tax(), dec!(2.68));
        assert_eq!(order.total(), dec!(36.16));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.lines(), cart.lines());
        assert_eq!(order.item_count(), 3);
        assert_eq!(
            order.estimated_delivery(),
            Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
        );
        assert!(order.prescription_uploaded());
    }

    #[test]
    fn test_order_ids_are_unique() {
        let (cart, _) = cart_with(&[(product("A", dec!(1), false), 1)]);
        let now = Utc::now();
        let first = derive_order(cart.cart(), &details(false), now).unwrap();
        let second = derive_order(cart.cart(), &details(false), now).unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_prescription_required_leaves_cart() {
        let (mut cart, store) = cart_with(&[(product("RX", dec!(15.50), true), 1)]);
        let before = store.get(keys::CART).unwrap();

        assert_eq!(
            place_order(&mut cart, &details(false)).unwrap_err(),
            CheckoutError::PrescriptionRequired
        );
        assert_eq!(cart.item_count(), 1);
        assert_eq!(store.get(keys::CART).unwrap(), before);
    }

    #[test]
    fn test_empty_cart_rejected() {
        let (mut cart, _) = cart_with(&[]);
        assert_eq!(
            place_order(&mut cart, &details(true)).unwrap_err(),
            CheckoutError::EmptyCart
        );
    }

    #[test]
    fn test_incomplete_address_rejected() {
        let (mut cart, _) = cart_with(&[(product("A", dec!(1), false), 1)]);
        let mut form = details(false);
        form.shipping_address.zip_code.clear();
        assert_eq!(
            place_order(&mut cart, &form).unwrap_err(),
            CheckoutError::IncompleteAddress
        );
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_place_order_clears_cart() {
        let (mut cart, store) = cart_with(&[
            (product("A", dec!(12.50), false), 2),
            (product("B", dec!(3.25), false), 4),
        ]);

        let order = place_order(&mut cart, &details(false)).unwrap();
        assert_eq!(order.subtotal(), dec!(38.00));
        assert_eq!(order.total(), round_to_cents(dec!(38.00) * dec!(1.08)));
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Decimal::ZERO);
        assert_eq!(store.get(keys::CART).unwrap(), None);
    }

    #[test]
    fn test_order_serde_roundtrip() {
        let (cart, _) = cart_with(&[(product("A", dec!(2), false), 1)]);
        let order = derive_order(cart.cart(), &details(false), Utc::now()).unwrap();
        let json = serde_json::to_string(&order).unwrap();
        assert!(json.contains("\"paymentMethod\":\"card\""));
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back, order);
    }
}
