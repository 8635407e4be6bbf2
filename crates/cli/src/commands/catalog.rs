//! Catalog browsing commands.

use std::io::Write;

use medmart_core::{Product, ProductId};
use medmart_storefront::Storefront;
use medmart_storefront::catalog::{LoadOutcome, ProductFilters};
use medmart_storefront::store::KeyValueStore;

use super::CliError;

/// List products matching `filters`, starting at `page`.
pub async fn products<S: KeyValueStore>(
    shop: &mut Storefront<S>,
    out: &mut impl Write,
    filters: ProductFilters,
    page: u32,
    all: bool,
) -> Result<(), CliError> {
    shop.catalog_mut().set_filters(filters);

    let outcome = if page > 1 {
        shop.fetch_page(page).await
    } else {
        shop.fetch_products().await
    };
    match outcome {
        LoadOutcome::Failed => {
            let message = shop.catalog().error().unwrap_or("request failed");
            return Err(CliError::FetchFailed(message.to_string()));
        }
        LoadOutcome::FellBackToFixtures { .. } => {
            writeln!(out, "Store unreachable, showing the offline catalog.")?;
        }
        _ => {}
    }

    if all {
        while shop.catalog().has_more() {
            if !matches!(shop.load_more().await, LoadOutcome::Appended { .. }) {
                break;
            }
        }
        if let Some(error) = shop.catalog().error() {
            writeln!(out, "Stopped early: {error}")?;
        }
    }

    let catalog = shop.catalog();
    if catalog.visible().is_empty() {
        writeln!(out, "No products found.")?;
    }
    for product in catalog.visible() {
        write_row(out, product)?;
    }

    let cursor = catalog.pagination();
    writeln!(
        out,
        "Page {} of {} ({} products)",
        cursor.current_page(),
        cursor.total_pages().max(1),
        cursor.total_items()
    )?;
    if catalog.has_more() {
        writeln!(out, "More available with --page {}", cursor.next_page())?;
    }
    Ok(())
}

pub async fn categories<S: KeyValueStore>(
    shop: &mut Storefront<S>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    load_options(shop, out, |shop| shop.catalog().categories().is_empty()).await?;
    for category in shop.catalog().categories() {
        writeln!(out, "{category}")?;
    }
    Ok(())
}

pub async fn pharmacies<S: KeyValueStore>(
    shop: &mut Storefront<S>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    load_options(shop, out, |shop| shop.catalog().pharmacies().is_empty()).await?;
    for name in shop.catalog().pharmacy_names() {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

/// Fetch the option lists; an error only fails the command when it left
/// the wanted list empty.
async fn load_options<S: KeyValueStore>(
    shop: &mut Storefront<S>,
    out: &mut impl Write,
    is_empty: impl Fn(&Storefront<S>) -> bool,
) -> Result<(), CliError> {
    if let Err(e) = shop.fetch_options().await {
        if is_empty(shop) {
            return Err(e.into());
        }
        writeln!(out, "Store unreachable, showing offline options.")?;
    }
    Ok(())
}

/// Show a product detail view.
pub async fn product<S: KeyValueStore>(
    shop: &mut Storefront<S>,
    out: &mut impl Write,
    id: &ProductId,
) -> Result<(), CliError> {
    let product = shop.product(id).await?;

    writeln!(out, "{} ({})", product.name, product.id)?;
    writeln!(out, "  Price:        {}", product.price)?;
    writeln!(out, "  Category:     {}", product.category)?;
    writeln!(out, "  Pharmacy:     {}", product.pharmacy.display_name())?;
    writeln!(out, "  Availability: {}", product.stock.label())?;
    writeln!(out, "  Max per add:  {}", product.stock.max_order_quantity())?;
    if product.requires_prescription {
        writeln!(out, "  Prescription required")?;
    }
    for (label, value) in [
        ("Generic name:", &product.generic_name),
        ("Dosage:", &product.dosage),
        ("Manufacturer:", &product.manufacturer),
    ] {
        if let Some(value) = value {
            writeln!(out, "  {label:<13} {value}")?;
        }
    }
    if !product.description.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", product.description)?;
    }
    Ok(())
}

fn write_row(out: &mut impl Write, product: &Product) -> std::io::Result<()> {
    writeln!(
        out,
        "{:<6} {:<28} {:>9}  {:<20} {}{}",
        product.id.as_str(),
        product.name,
        product.price.to_string(),
        product.pharmacy.display_name(),
        product.stock.label(),
        if product.requires_prescription { " [Rx]" } else { "" }
    )
}
