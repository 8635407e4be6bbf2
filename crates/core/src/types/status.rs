//! Status and tag enums for orders and checkout.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// Orders start as `Pending` and move forward one step at a time until they
/// reach `Delivered`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    Pending,
    Approved,
    Shipped,
    Delivered,
}

impl OrderStatus {
    /// The status that follows this one, or `None` if terminal.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Approved),
            Self::Approved => Some(Self::Shipped),
            Self::Shipped => Some(Self::Delivered),
            Self::Delivered => None,
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Approved => write!(f, "Approved"),
            Self::Shipped => write!(f, "Shipped"),
            Self::Delivered => write!(f, "Delivered"),
        }
    }
}

/// Payment method selected at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Credit or debit card.
    #[default]
    Card,
    /// `PayPal` account.
    #[serde(rename = "paypal")]
    PayPal,
    /// Health insurance billing.
    Insurance,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Card => write!(f, "card"),
            Self::PayPal => write!(f, "paypal"),
            Self::Insurance => write!(f, "insurance"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "paypal" => Ok(Self::PayPal),
            "insurance" => Ok(Self::Insurance),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}
