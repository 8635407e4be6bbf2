//! MedMart Core - Shared domain types.
//!
//! This crate provides the types used across all MedMart components:
//! - `storefront` - Catalog, cart and checkout state managers
//! - `cli` - Command-line shopping client
//!
//! # Architecture
//!
//! The core crate contains only types and pure normalization - no I/O, no
//! HTTP clients, no storage. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Identifiers, prices, emails, products, addresses and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
