//! MedMart storefront library.
//!
//! State managers for a medical-supplies storefront: catalog browsing with
//! filters and pagination, a persisted cart, checkout and order history, and
//! the shopper's auth session. Front ends (the `medmart` CLI, tests) drive a
//! [`state::Storefront`] and render its state.
//!
//! # Modules
//!
//! - [`api`] - Catalog and auth services: HTTP client, offline mock, fixtures
//! - [`catalog`] - Filter criteria, pagination and fetch tickets
//! - [`cart`] - Cart lines, totals and the snapshot codec
//! - [`checkout`] - Order derivation
//! - [`orders`] - Order history and status advancement
//! - [`auth`] - Login, registration and session persistence
//! - [`store`] - Local key-value store

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod orders;
pub mod state;
pub mod store;

pub use error::{Result, StorefrontError};
pub use state::Storefront;
