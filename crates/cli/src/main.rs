//! MedMart CLI - Browse the catalog, manage the cart and place orders.
//!
//! # Usage
//!
//! ```bash
//! # Browse and filter the catalog
//! medmart products --search aspirin --category "Pain Relief"
//! medmart product 1
//!
//! # Manage the cart
//! medmart cart add 1 --quantity 2
//! medmart cart show
//!
//! # Sign in and check out
//! medmart login jane@example.com --password secret
//! medmart profile update --phone 555-0100
//! medmart checkout --street "1 Main St" --city Austin --state TX --zip 78701
//! medmart orders
//! ```
//!
//! State (cart, session, order history) persists in the file named by
//! `MEDMART_STATE_FILE`. `--mock` serves the built-in fixture catalog.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use medmart_core::PaymentMethod;
use medmart_storefront::config::StorefrontConfig;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "medmart")]
#[command(author, version, about = "MedMart storefront client")]
struct Cli {
    /// Serve the catalog from built-in fixtures
    #[arg(long, global = true)]
    mock: bool,

    /// Override the state file location
    #[arg(long, global = true, value_name = "PATH")]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List products
    Products {
        /// Match name or description
        #[arg(short, long, default_value = "")]
        search: String,

        /// Exact category name
        #[arg(short, long, default_value = "")]
        category: String,

        /// Exact pharmacy name
        #[arg(short, long, default_value = "")]
        pharmacy: String,

        /// Page to show
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Keep loading pages until the listing is exhausted
        #[arg(long)]
        all: bool,
    },
    /// List product categories
    Categories,
    /// List pharmacies
    Pharmacies,
    /// Show one product
    Product {
        /// Product ID
        id: String,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: Option<CartAction>,
    },
    /// Sign in
    Login {
        email: String,

        #[arg(long, env = "MEDMART_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        #[arg(long, env = "MEDMART_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        phone: Option<String>,
    },
    /// Sign out
    Logout,
    /// Show or edit the signed-in profile
    Profile {
        #[command(subcommand)]
        action: Option<ProfileAction>,
    },
    /// Place an order from the cart
    Checkout(CheckoutArgs),
    /// Show order history
    Orders {
        #[command(subcommand)]
        action: Option<OrderAction>,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart contents (default)
    Show,
    /// Add a product
    Add {
        id: String,
        #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Set a line's quantity; 0 or less removes it
    Set {
        id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a product
    Remove { id: String },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Show the profile (default)
    Show,
    /// Change profile fields; address fields not given keep their value
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Empty to remove the phone number
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        street: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        zip: Option<String>,
    },
    /// Change the password
    Password {
        #[arg(long, env = "MEDMART_PASSWORD", hide_env_values = true)]
        current: String,

        #[arg(long, env = "MEDMART_NEW_PASSWORD", hide_env_values = true)]
        new: String,

        /// Repeat the new password
        #[arg(long)]
        confirm: String,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// List orders, newest first (default)
    List,
    /// Move an order to its next status
    Advance {
        /// Order ID
        id: String,
    },
}

/// Checkout form. Blank address fields are filled from the signed-in
/// profile.
#[derive(clap::Args)]
struct CheckoutArgs {
    #[arg(long, default_value = "")]
    street: String,
    #[arg(long, default_value = "")]
    city: String,
    #[arg(long, default_value = "")]
    state: String,
    #[arg(long, default_value = "")]
    zip: String,

    /// `card`, `paypal` or `insurance`
    #[arg(long, default_value = "card")]
    payment: PaymentMethod,

    /// Confirm a prescription has been uploaded
    #[arg(long)]
    prescription_uploaded: bool,

    /// Show the summary without placing the order
    #[arg(long)]
    dry_run: bool,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            let _ = writeln!(io::stderr(), "Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if cli.mock {
        config.mock.enabled = true;
    }
    if let Some(path) = cli.state_file.clone() {
        config.state_file = path;
    }

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "medmart_storefront=info,medmart=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let mut out = io::stdout().lock();
    match commands::run(cli.command, &config, &mut out).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            e.report();
            let _ = writeln!(io::stderr(), "Error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
