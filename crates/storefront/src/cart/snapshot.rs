//! Compact cart snapshot codec.
//!
//! The format is `sessionId/id1:qty1,id2:qty2`. Identifiers can never contain
//! one of the separators (see [`medmart_core::RESERVED_CHARS`]), so every
//! snapshot has exactly one decoding.

use std::fmt;
use std::str::FromStr;

use medmart_core::{IdError, ProductId, SessionId};
use thiserror::Error;

/// Errors that can occur when decoding a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// The `/` between session and items is missing.
    #[error("snapshot is missing the session separator")]
    MissingSeparator,

    /// The session part is not a valid session id.
    #[error("invalid session in snapshot: {0}")]
    Session(IdError),

    /// An item is not of the form `id:qty`.
    #[error("malformed snapshot item {0:?}")]
    MalformedItem(String),

    /// An item's product id is invalid.
    #[error("invalid product in snapshot: {0}")]
    Product(IdError),

    /// An item's quantity is not a positive integer.
    #[error("invalid quantity in snapshot item {0:?}")]
    Quantity(String),

    /// The same product appears twice.
    #[error("product {0} appears more than once in snapshot")]
    DuplicateItem(ProductId),
}

/// Session id plus `(product, quantity)` pairs in cart order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub session: SessionId,
    pub items: Vec<(ProductId, u32)>,
}

impl CartSnapshot {
    /// Encode as `session/id:qty,id:qty`.
    #[must_use]
    pub fn encode(&self) -> String {
        let items = self
            .items
            .iter()
            .map(|(id, quantity)| format!("{id}:{quantity}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}/{items}", self.session)
    }

    /// Decode and validate a snapshot string.
    ///
    /// # Errors
    ///
    /// Returns a `SnapshotError` describing the first problem found.
    pub fn decode(raw: &str) -> Result<Self, SnapshotError> {
        let (session, items) = raw.split_once('/').ok_or(SnapshotError::MissingSeparator)?;
        let session = SessionId::parse(session).map_err(SnapshotError::Session)?;

        let mut decoded: Vec<(ProductId, u32)> = Vec::new();
        if !items.is_empty() {
            for item in items.split(',') {
                let (id, quantity) = item
                    .split_once(':')
                    .ok_or_else(|| SnapshotError::MalformedItem(item.to_string()))?;
                let id = ProductId::parse(id).map_err(SnapshotError::Product)?;
                let quantity = quantity
                    .parse::<u32>()
                    .ok()
                    .filter(|q| *q >= 1)
                    .ok_or_else(|| SnapshotError::Quantity(item.to_string()))?;

                if decoded.iter().any(|(existing, _)| *existing == id) {
                    return Err(SnapshotError::DuplicateItem(id));
                }
                decoded.push((id, quantity));
            }
        }

        Ok(Self {
            session,
            items: decoded,
        })
    }
}

impl fmt::Display for CartSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for CartSnapshot {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(raw: &str) -> ProductId {
        ProductId::parse(raw).unwrap()
    }

    #[test]
    fn test_encode() {
        let snapshot = CartSnapshot {
            session: SessionId::parse("sess-1").unwrap(),
            items: vec![(id("1"), 2), (id("64f0c2"), 1)],
        };
        assert_eq!(snapshot.encode(), "sess-1/1:2,64f0c2:1");
        assert_eq!(snapshot.to_string(), snapshot.encode());
    }

    #[test]
    fn test_decode_matches_encode() {
        let raw = "sess-1/1:2,64f0c2:1";
        let snapshot: CartSnapshot = raw.parse().unwrap();
        assert_eq!(snapshot.session.as_str(), "sess-1");
        assert_eq!(snapshot.items, vec![(id("1"), 2), (id("64f0c2"), 1)]);
        assert_eq!(snapshot.encode(), raw);
    }

    #[test]
    fn test_empty_cart() {
        let snapshot = CartSnapshot::decode("sess-1/").unwrap();
        assert!(snapshot.items.is_empty());
        assert_eq!(snapshot.encode(), "sess-1/");
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            CartSnapshot::decode("no-separator"),
            Err(SnapshotError::MissingSeparator)
        );
        assert!(matches!(
            CartSnapshot::decode("/1:2"),
            Err(SnapshotError::Session(IdError::Empty { .. }))
        ));
        assert!(matches!(
            CartSnapshot::decode("s/1"),
            Err(SnapshotError::MalformedItem(_))
        ));
        assert!(matches!(
            CartSnapshot::decode("s/:2"),
            Err(SnapshotError::Product(_))
        ));
        assert!(matches!(
            CartSnapshot::decode("s/1:0"),
            Err(SnapshotError::Quantity(_))
        ));
        assert!(matches!(
            CartSnapshot::decode("s/1:-3"),
            Err(SnapshotError::Quantity(_))
        ));
        assert!(matches!(
            CartSnapshot::decode("s/1:2,"),
            Err(SnapshotError::MalformedItem(_))
        ));
        assert!(matches!(
            CartSnapshot::decode("s/a/b:1"),
            Err(SnapshotError::Product(IdError::ReservedChar { ch: '/', .. }))
        ));
        assert_eq!(
            CartSnapshot::decode("s/1:2,1:3"),
            Err(SnapshotError::DuplicateItem(id("1")))
        );
    }
}
