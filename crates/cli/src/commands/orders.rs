//! Checkout and order history.

use std::io::Write;

use medmart_core::{OrderId, ShippingAddress, format_money};
use medmart_storefront::Storefront;
use medmart_storefront::checkout::{CheckoutDetails, Order};
use medmart_storefront::store::KeyValueStore;

use super::CliError;
use super::cart::{restore, show};
use crate::{CheckoutArgs, OrderAction};

/// Place an order from the persisted cart.
pub async fn checkout<S: KeyValueStore>(
    shop: &mut Storefront<S>,
    out: &mut impl Write,
    args: CheckoutArgs,
) -> Result<(), CliError> {
    restore(shop, out).await?;

    let profile = shop.auth().user().and_then(|user| user.address.as_deref());
    let shipping_address = merge_address(ShippingAddress::from_profile(profile), &args);
    let details = CheckoutDetails {
        shipping_address,
        payment_method: args.payment,
        prescription_uploaded: args.prescription_uploaded,
    };

    if args.dry_run {
        show(shop, out)?;
        writeln!(out, "Ship to:  {}", details.shipping_address)?;
        writeln!(out, "Payment:  {}", details.payment_method)?;
        return Ok(());
    }

    let order = shop.place_order(&details)?;
    writeln!(out, "Order {} placed.", order.id())?;
    write_order(out, &order)?;
    Ok(())
}

/// Command-line fields override the profile address when non-blank.
fn merge_address(mut address: ShippingAddress, args: &CheckoutArgs) -> ShippingAddress {
    for (slot, value) in [
        (&mut address.street, &args.street),
        (&mut address.city, &args.city),
        (&mut address.state, &args.state),
        (&mut address.zip_code, &args.zip),
    ] {
        if !value.trim().is_empty() {
            value.trim().clone_into(slot);
        }
    }
    address
}

pub fn run<S: KeyValueStore>(
    shop: &mut Storefront<S>,
    out: &mut impl Write,
    action: Option<OrderAction>,
) -> Result<(), CliError> {
    match action.unwrap_or(OrderAction::List) {
        OrderAction::List => {
            if shop.orders().is_empty() {
                writeln!(out, "No orders yet.")?;
            }
            for order in shop.orders().orders() {
                writeln!(out, "Order {}", order.id())?;
                write_order(out, order)?;
            }
        }
        OrderAction::Advance { id } => {
            let id: OrderId = id
                .trim()
                .parse()
                .map_err(|_| CliError::InvalidOrderId(id.clone()))?;
            let status = shop.advance_order(id)?;
            writeln!(out, "Order {id} is now {status}")?;
        }
    }
    Ok(())
}

fn write_order(out: &mut impl Write, order: &Order) -> std::io::Result<()> {
    writeln!(
        out,
        "  Placed {}  Status: {}  Estimated delivery {}",
        order.placed_at().format("%Y-%m-%d %H:%M"),
        order.status(),
        order.estimated_delivery().format("%Y-%m-%d")
    )?;
    for line in order.lines() {
        writeln!(out, "  {} x{}  {}", line.name, line.quantity, format_money(line.line_total()))?;
    }
    writeln!(
        out,
        "  Subtotal {}  Tax {}  Total {}  ({})",
        format_money(order.subtotal()),
        format_money(order.tax()),
        format_money(order.total()),
        order.payment_method()
    )?;
    writeln!(out, "  Ship to {}", order.shipping_address())
}
