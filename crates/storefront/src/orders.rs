//! Order history for the current session.

use medmart_core::{OrderId, OrderStatus};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::checkout::Order;
use crate::store::{KeyValueStore, StoreError, keys};

/// Errors raised by order history operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("order {0} has already been delivered")]
    AlreadyDelivered(OrderId),
}

/// Placed orders, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderHistory {
    orders: Vec<Order>,
}

impl OrderHistory {
    #[must_use]
    pub const fn new() -> Self {
        Self { orders: Vec::new() }
    }

    /// Load the history persisted under the `orders` key.
    ///
    /// A missing key yields an empty history. A value that no longer parses
    /// is logged and discarded.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store itself cannot be read.
    pub fn load(store: &impl KeyValueStore) -> Result<Self, StoreError> {
        let Some(raw) = store.get(keys::ORDERS)? else {
            return Ok(Self::new());
        };
        match serde_json::from_str(&raw) {
            Ok(orders) => Ok(Self { orders }),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable order history");
                Ok(Self::new())
            }
        }
    }

    /// Persist the history under the `orders` key.
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the history cannot be encoded or written.
    pub fn save(&self, store: &impl KeyValueStore) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(&self.orders)?;
        store.set(keys::ORDERS, &encoded)
    }

    /// Add a freshly placed order at the front.
    pub fn record(&mut self, order: Order) {
        self.orders.insert(0, order);
    }

    #[must_use]
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    #[must_use]
    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|order| order.id() == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Move an order one status step forward. Returns the new status.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown id and
    /// `OrderError::AlreadyDelivered` once the order is terminal.
    #[instrument(skip(self), fields(order_id = %id))]
    pub fn advance(&mut self, id: OrderId) -> Result<OrderStatus, OrderError> {
        let order = self
            .orders
            .iter_mut()
            .find(|order| order.id() == id)
            .ok_or(OrderError::NotFound(id))?;

        let next = order
            .status()
            .next()
            .ok_or(OrderError::AlreadyDelivered(id))?;
        order.set_status(next);
        info!(status = %next, "Order status advanced");
        Ok(next)
    }
}
