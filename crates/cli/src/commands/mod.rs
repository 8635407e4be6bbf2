//! Command implementations.
//!
//! Every command opens the storefront over the state file, performs one
//! intent and renders the resulting state to `out`.

mod account;
mod cart;
mod catalog;
mod orders;

use std::io::{self, Write};

use medmart_core::{IdError, ProductId};
use medmart_storefront::catalog::ProductFilters;
use medmart_storefront::config::StorefrontConfig;
use medmart_storefront::store::{FileStore, KeyValueStore, StoreError};
use medmart_storefront::{Storefront, StorefrontError};
use thiserror::Error;

use crate::Command;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// A storefront operation failed.
    #[error(transparent)]
    Storefront(#[from] StorefrontError),

    /// Writing to the terminal failed.
    #[error("output error: {0}")]
    Io(#[from] io::Error),

    /// The catalog could not be loaded.
    #[error("unable to load products: {0}")]
    FetchFailed(String),

    #[error("invalid order id {0:?}")]
    InvalidOrderId(String),
}

impl CliError {
    /// Log the error, capturing internal faults to Sentry.
    pub fn report(&self) {
        match self {
            Self::Storefront(err) => err.report(),
            Self::Io(err) => tracing::error!(error = %err, "Output error"),
            Self::FetchFailed(message) => tracing::warn!(error = %message, "Catalog fetch failed"),
            Self::InvalidOrderId(_) => {}
        }
    }

    /// Message shown to the shopper.
    pub fn user_message(&self) -> String {
        match self {
            Self::Storefront(err) => err.user_message(),
            _ => self.to_string(),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        Self::Storefront(err.into())
    }
}

impl From<IdError> for CliError {
    fn from(err: IdError) -> Self {
        Self::Storefront(err.into())
    }
}

/// Run one command against the storefront described by `config`.
pub async fn run(
    command: Command,
    config: &StorefrontConfig,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let store = FileStore::open(&config.state_file)?;
    let mut shop = Storefront::from_config(config, store)?;
    dispatch(command, &mut shop, out).await
}

/// Dispatch one command to an already assembled storefront.
pub async fn dispatch<S>(
    command: Command,
    shop: &mut Storefront<S>,
    out: &mut impl Write,
) -> Result<(), CliError>
where
    S: KeyValueStore,
{
    match command {
        Command::Products {
            search,
            category,
            pharmacy,
            page,
            all,
        } => {
            let filters = ProductFilters {
                search,
                category,
                pharmacy,
            };
            catalog::products(shop, out, filters, page, all).await
        }
        Command::Categories => catalog::categories(shop, out).await,
        Command::Pharmacies => catalog::pharmacies(shop, out).await,
        Command::Product { id } => catalog::product(shop, out, &parse_product(&id)?).await,
        Command::Cart { action } => cart::run(shop, out, action).await,
        Command::Login { email, password } => account::login(shop, out, &email, password).await,
        Command::Register {
            email,
            name,
            password,
            phone,
        } => account::register(shop, out, email, name, password, phone).await,
        Command::Logout => account::logout(shop, out).await,
        Command::Profile { action } => account::profile(shop, out, action).await,
        Command::Checkout(args) => orders::checkout(shop, out, args).await,
        Command::Orders { action } => orders::run(shop, out, action),
    }
}

fn parse_product(raw: &str) -> Result<ProductId, CliError> {
    Ok(ProductId::parse(raw.trim())?)
}
