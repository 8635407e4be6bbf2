//! Core types for MedMart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod email;
pub mod id;
pub mod price;
pub mod product;
pub mod status;

pub use address::ShippingAddress;
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceError, format_money, round_to_cents};
pub use product::*;
pub use status::*;
