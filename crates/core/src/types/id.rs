//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.
//!
//! Identifiers that end up inside the cart snapshot string must never contain
//! one of the [`RESERVED_CHARS`], so every generated type validates its input
//! on construction and on deserialization.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters used as separators by the cart snapshot encoding.
pub const RESERVED_CHARS: [char; 3] = ['/', ':', ','];

/// Errors that can occur when parsing an identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("{kind} cannot be empty")]
    Empty {
        /// Name of the identifier type.
        kind: &'static str,
    },
    /// The input contains a separator or control character.
    #[error("{kind} contains reserved character {ch:?}")]
    ReservedChar {
        /// Name of the identifier type.
        kind: &'static str,
        /// The offending character.
        ch: char,
    },
}

/// Validate a raw identifier string for the given identifier kind.
///
/// # Errors
///
/// Returns `IdError::Empty` for an empty input and `IdError::ReservedChar`
/// if the input contains a snapshot separator or a control character.
pub fn validate_id(kind: &'static str, raw: &str) -> Result<(), IdError> {
    if raw.is_empty() {
        return Err(IdError::Empty { kind });
    }

    match raw
        .chars()
        .find(|c| RESERVED_CHARS.contains(c) || c.is_control())
    {
        Some(ch) => Err(IdError::ReservedChar { kind, ch }),
        None => Ok(()),
    }
}

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` as a plain string, validated on the way in
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `parse()`, `as_str()`, `into_inner()`
/// - `Display`, `FromStr`, `AsRef<str>` and `TryFrom<String>`
///
/// # Example
///
/// ```rust
/// # use medmart_core::define_id;
/// define_id!(PrescriptionId);
///
/// let id = PrescriptionId::parse("rx-1").unwrap();
/// assert_eq!(id.as_str(), "rx-1");
/// assert!(PrescriptionId::parse("rx/1").is_err());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse an identifier, rejecting empty input and reserved characters.
            ///
            /// # Errors
            ///
            /// Returns an `IdError` if the input is not a valid identifier.
            pub fn parse(raw: impl Into<String>) -> ::core::result::Result<Self, $crate::IdError> {
                let raw = raw.into();
                $crate::validate_id(stringify!($name), &raw)?;
                Ok(Self(raw))
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the identifier and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl ::core::convert::TryFrom<String> for $name {
            type Error = $crate::IdError;

            fn try_from(raw: String) -> ::core::result::Result<Self, Self::Error> {
                Self::parse(raw)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(ProductId);
define_id!(UserId);
define_id!(SessionId);

/// Order identifier.
///
/// Orders are created client-side at checkout, so the identifier is a random
/// UUID rather than a server-assigned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(uuid::Uuid);

impl OrderId {
    /// Generate a fresh random order ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OrderId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

impl SessionId {
    /// Generate an anonymous session identifier for a visitor without a login.
    #[must_use]
    pub fn anonymous() -> Self {
        Self(format!("anon-{}", uuid::Uuid::new_v4().simple()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_ids() {
        assert!(ProductId::parse("1").is_ok());
        assert!(ProductId::parse("sku-42_A").is_ok());
        assert!(ProductId::parse("64f0c2a9e1b3").is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(
            ProductId::parse(""),
            Err(IdError::Empty { kind: "ProductId" })
        );
    }

    #[test]
    fn test_parse_rejects_separators() {
        for bad in ["a/b", "a:b", "a,b"] {
            assert!(
                matches!(ProductId::parse(bad), Err(IdError::ReservedChar { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_control_chars() {
        assert!(SessionId::parse("abc\n").is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: ProductId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(ok.as_str(), "42");

        let err = serde_json::from_str::<ProductId>("\"4:2\"");
        assert!(err.is_err());
    }

    #[test]
    fn test_anonymous_session_is_valid() {
        let session = SessionId::anonymous();
        assert!(session.as_str().starts_with("anon-"));
        assert!(SessionId::parse(session.as_str()).is_ok());
    }

    #[test]
    fn test_order_id_roundtrip_display() {
        let id = OrderId::generate();
        let parsed: OrderId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
