//! Shipping address captured at checkout.

use serde::{Deserialize, Serialize};

/// A US shipping address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
}

impl ShippingAddress {
    /// Prefill an address from a stored profile value.
    ///
    /// Profiles hold either a JSON-encoded address or a free-form string; a
    /// free-form string becomes the street line.
    #[must_use]
    pub fn from_profile(value: Option<&str>) -> Self {
        let Some(raw) = value.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Self::default();
        };

        serde_json::from_str::<Self>(raw).unwrap_or_else(|_| Self {
            street: raw.to_owned(),
            ..Self::default()
        })
    }

    /// Whether every field has been filled in.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        [&self.street, &self.city, &self.state, &self.zip_code]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

impl std::fmt::Display for ShippingAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {} {}",
            self.street, self.city, self.state, self.zip_code
        )
    }
}
