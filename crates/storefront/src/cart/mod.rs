//! Cart state manager.
//!
//! The in-memory [`Cart`] is authoritative. After every mutation its
//! [`CartSnapshot`] is written through to the key-value store so a later run
//! can restore it; store failures are logged and never fail the mutation.

mod snapshot;

pub use snapshot::{CartSnapshot, SnapshotError};

use medmart_core::{Price, Product, ProductId, SessionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::api::{ApiError, CatalogService};
use crate::store::{KeyValueStore, keys};

/// Largest cart total accepted, 2^64 dollars. Keeps taxed totals well inside
/// the range of [`Decimal`].
pub const MAX_TOTAL: Decimal = Decimal::from_parts(0, 0, 1, false, 0);

/// Errors raised by cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Quantities must be positive and fit in a cart line.
    #[error("invalid quantity {quantity}: must be at least 1")]
    InvalidQuantity { quantity: i64 },

    /// The cart total would exceed [`MAX_TOTAL`].
    #[error("cart total is too large")]
    TotalTooLarge,
}

/// One product in the cart with the details captured when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image: String,
    pub pharmacy: String,
    pub requires_prescription: bool,
    pub quantity: u32,
}

impl CartLine {
    fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            image: product.image.clone(),
            pharmacy: product.pharmacy_name().to_string(),
            requires_prescription: product.requires_prescription,
            quantity,
        }
    }

    /// Price times quantity. Saturates at `Decimal::MAX`, which lines held
    /// by a cart never reach.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price.times(self.quantity).unwrap_or(Decimal::MAX)
    }
}

/// Ordered cart lines, at most one per product, with a cached total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cart {
    lines: Vec<CartLine>,
    total: Decimal,
}

impl Cart {
    /// Lines in the order they were first added.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn line(&self, id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.product_id == id)
    }

    /// Sum of price times quantity over all lines.
    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.total
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether any line needs a prescription.
    #[must_use]
    pub fn requires_prescription(&self) -> bool {
        self.lines.iter().any(|line| line.requires_prescription)
    }

    /// Replace the lines if their total stays within [`MAX_TOTAL`].
    fn replace_lines(&mut self, lines: Vec<CartLine>) -> Result<(), CartError> {
        self.total = checked_total(&lines)?;
        self.lines = lines;
        Ok(())
    }
}

/// Sum of the line totals, refusing anything above [`MAX_TOTAL`].
fn checked_total(lines: &[CartLine]) -> Result<Decimal, CartError> {
    lines
        .iter()
        .try_fold(Decimal::ZERO, |total, line| {
            line.price
                .times(line.quantity)
                .and_then(|line_total| total.checked_add(line_total))
        })
        .filter(|total| *total <= MAX_TOTAL)
        .ok_or(CartError::TotalTooLarge)
}

/// Validate a requested quantity.
fn to_quantity(quantity: i64) -> Result<u32, CartError> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or(CartError::InvalidQuantity { quantity })
}

/// Owns the cart for one session and mirrors it to a key-value store.
#[derive(Debug, Clone)]
pub struct CartManager<S: KeyValueStore> {
    cart: Cart,
    store: S,
    session: SessionId,
}

impl<S: KeyValueStore> CartManager<S> {
    /// Empty cart for `session`.
    pub fn new(store: S, session: SessionId) -> Self {
        Self {
            cart: Cart::default(),
            store,
            session,
        }
    }

    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        self.cart.lines()
    }

    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.cart.total()
    }

    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.cart.item_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cart.is_empty()
    }

    #[must_use]
    pub fn requires_prescription(&self) -> bool {
        self.cart.requires_prescription()
    }

    #[must_use]
    pub const fn session(&self) -> &SessionId {
        &self.session
    }

    /// Add `quantity` units of `product`, merging with an existing line.
    /// Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `quantity` is below 1 or the
    /// line quantity would overflow, and `CartError::TotalTooLarge` if the
    /// cart total would exceed [`MAX_TOTAL`]. The cart is unchanged in either
    /// case.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub fn add_item(&mut self, product: &Product, quantity: i64) -> Result<u32, CartError> {
        let quantity = to_quantity(quantity)?;

        let mut lines = self.cart.lines.clone();
        let new_quantity = if let Some(line) = lines
            .iter_mut()
            .find(|line| line.product_id == product.id)
        {
            line.quantity = line.quantity.checked_add(quantity).ok_or(
                CartError::InvalidQuantity {
                    quantity: i64::from(line.quantity) + i64::from(quantity),
                },
            )?;
            line.quantity
        } else {
            lines.push(CartLine::from_product(product, quantity));
            quantity
        };

        self.cart.replace_lines(lines)?;
        self.persist();
        Ok(new_quantity)
    }

    /// Set a line's quantity; anything below 1 removes the line. Unknown
    /// products are ignored.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `quantity` does not fit in a
    /// cart line, and `CartError::TotalTooLarge` if the cart total would
    /// exceed [`MAX_TOTAL`]. The cart is unchanged in either case.
    #[instrument(skip(self))]
    pub fn set_quantity(&mut self, id: &ProductId, quantity: i64) -> Result<(), CartError> {
        if quantity < 1 {
            self.remove_item(id);
            return Ok(());
        }
        let quantity = to_quantity(quantity)?;

        let mut lines = self.cart.lines.clone();
        if let Some(line) = lines.iter_mut().find(|line| &line.product_id == id) {
            line.quantity = quantity;
            self.cart.replace_lines(lines)?;
            self.persist();
        } else {
            debug!("Ignoring quantity change for product not in cart");
        }
        Ok(())
    }

    /// Remove a line. Returns whether it was present.
    #[instrument(skip(self))]
    pub fn remove_item(&mut self, id: &ProductId) -> bool {
        let Some(position) = self.cart.lines.iter().position(|line| &line.product_id == id) else {
            return false;
        };
        let removed = self.cart.lines.remove(position);
        // Lines never hold more than the total, so subtracting cannot underflow
        self.cart.total -= removed.line_total();
        self.persist();
        true
    }

    /// Empty the cart and erase the persisted snapshot.
    pub fn clear(&mut self) {
        self.cart = Cart::default();
        if let Err(e) = self.store.delete(keys::CART) {
            warn!(error = %e, "Failed to erase cart snapshot");
        }
    }

    /// Move the cart to another session and re-persist it under that prefix.
    pub fn set_session(&mut self, session: SessionId) {
        if self.session != session {
            self.session = session;
            if !self.cart.is_empty() {
                self.persist();
            }
        }
    }

    /// Snapshot of the current cart.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            session: self.session.clone(),
            items: self
                .cart
                .lines
                .iter()
                .map(|line| (line.product_id.clone(), line.quantity))
                .collect(),
        }
    }

    /// Read the persisted snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns a `SnapshotError` if the stored value is malformed. A store
    /// that cannot be read is treated as holding no snapshot.
    pub fn restore_snapshot(&self) -> Result<Option<CartSnapshot>, SnapshotError> {
        match self.store.get(keys::CART) {
            Ok(Some(raw)) => CartSnapshot::decode(&raw).map(Some),
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(error = %e, "Failed to read cart snapshot");
                Ok(None)
            }
        }
    }

    /// Rebuild the cart from the persisted snapshot, resolving each product
    /// through `service`. Products that no longer exist are dropped; if the
    /// service could not be reached for some line the stored snapshot is
    /// left untouched. Returns the number of lines restored.
    ///
    /// # Errors
    ///
    /// Returns a `SnapshotError` if the stored snapshot is malformed; the
    /// cart is left empty in that case.
    #[instrument(skip_all)]
    pub async fn rehydrate(&mut self, service: &dyn CatalogService) -> Result<usize, SnapshotError> {
        let Some(snapshot) = self.restore_snapshot()? else {
            return Ok(0);
        };
        if snapshot.session != self.session {
            debug!(stored = %snapshot.session, "Restoring cart saved under another session");
        }

        let mut lines = Vec::with_capacity(snapshot.items.len());
        let mut unreachable = false;
        for (id, quantity) in snapshot.items {
            match service.product(&id).await {
                Ok(product) => {
                    lines.push(CartLine::from_product(&product, quantity));
                    if checked_total(&lines).is_err() {
                        warn!(product_id = %id, "Dropping cart line that overflows the total");
                        lines.pop();
                    }
                }
                Err(ApiError::ProductNotFound(_)) => {
                    warn!(product_id = %id, "Dropping cart line for removed product");
                }
                Err(e) => {
                    warn!(product_id = %id, error = %e, "Could not resolve cart line");
                    unreachable = true;
                }
            }
        }

        let restored = lines.len();
        self.cart.total = checked_total(&lines).unwrap_or_default();
        self.cart.lines = lines;
        // Keep the stored snapshot intact until every line could be resolved
        if !unreachable {
            self.persist();
        }
        Ok(restored)
    }

    fn persist(&self) {
        let encoded = self.snapshot().encode();
        if let Err(e) = self.store.set(keys::CART, &encoded) {
            warn!(error = %e, "Failed to persist cart snapshot");
        }
    }
}
