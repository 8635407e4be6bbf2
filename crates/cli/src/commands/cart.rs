//! Cart commands.

use std::io::Write;

use medmart_core::format_money;
use medmart_storefront::store::KeyValueStore;
use medmart_storefront::{Storefront, StorefrontError};

use super::{CliError, parse_product};
use crate::CartAction;

/// Restore the persisted cart, apply `action` and print the result.
pub async fn run<S: KeyValueStore>(
    shop: &mut Storefront<S>,
    out: &mut impl Write,
    action: Option<CartAction>,
) -> Result<(), CliError> {
    restore(shop, out).await?;

    match action.unwrap_or(CartAction::Show) {
        CartAction::Show => {}
        CartAction::Add { id, quantity } => {
            let id = parse_product(&id)?;
            let quantity = shop.add_to_cart(&id, quantity).await?;
            writeln!(out, "{id} now x{quantity}")?;
        }
        CartAction::Set { id, quantity } => {
            let id = parse_product(&id)?;
            shop.cart_mut()
                .set_quantity(&id, quantity)
                .map_err(StorefrontError::from)?;
        }
        CartAction::Remove { id } => {
            let id = parse_product(&id)?;
            if !shop.cart_mut().remove_item(&id) {
                writeln!(out, "{id} was not in the cart")?;
            }
        }
        CartAction::Clear => shop.cart_mut().clear(),
    }

    show(shop, out)
}

/// Rebuild the cart from the state file. A damaged snapshot is reported and
/// the cart starts empty.
pub async fn restore<S: KeyValueStore>(
    shop: &mut Storefront<S>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    if let Err(e) = shop.rehydrate_cart().await {
        tracing::warn!(error = %e, "Ignoring damaged cart snapshot");
        writeln!(out, "Saved cart could not be read and was discarded.")?;
    }
    Ok(())
}

pub fn show<S: KeyValueStore>(shop: &Storefront<S>, out: &mut impl Write) -> Result<(), CliError> {
    let cart = shop.cart();
    if cart.is_empty() {
        writeln!(out, "Your cart is empty.")?;
        return Ok(());
    }

    for line in cart.lines() {
        writeln!(
            out,
            "{:<6} {:<28} {:>4} x {:>9} = {:>10}{}",
            line.product_id.as_str(),
            line.name,
            line.quantity,
            line.price.to_string(),
            format_money(line.line_total()),
            if line.requires_prescription { "  [Rx]" } else { "" }
        )?;
    }

    let summary = shop.checkout_summary();
    writeln!(out, "Items:    {}", cart.item_count())?;
    writeln!(out, "Subtotal: {}", format_money(summary.subtotal))?;
    writeln!(out, "Tax:      {}", format_money(summary.tax))?;
    writeln!(out, "Total:    {}", format_money(summary.total))?;
    if summary.requires_prescription {
        writeln!(out, "A prescription upload is required at checkout.")?;
    }
    Ok(())
}
