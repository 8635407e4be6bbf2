//! Login, registration, logout and the profile.

use std::io::Write;

use medmart_core::ShippingAddress;
use medmart_storefront::Storefront;
use medmart_storefront::api::User;
use medmart_storefront::auth::{ProfileEdit, SignUp};
use medmart_storefront::store::KeyValueStore;
use secrecy::SecretString;

use super::CliError;
use super::cart::restore;
use crate::ProfileAction;

pub async fn login<S: KeyValueStore>(
    shop: &mut Storefront<S>,
    out: &mut impl Write,
    email: &str,
    password: String,
) -> Result<(), CliError> {
    // Restore first so the saved cart moves to the signed-in session
    restore(shop, out).await?;
    let user = shop.login(email, SecretString::from(password)).await?;
    writeln!(out, "Signed in as {} <{}>", user.name, user.email.as_str())?;
    Ok(())
}

pub async fn register<S: KeyValueStore>(
    shop: &mut Storefront<S>,
    out: &mut impl Write,
    email: String,
    name: String,
    password: String,
    phone: Option<String>,
) -> Result<(), CliError> {
    restore(shop, out).await?;
    let form = SignUp {
        name,
        email,
        password: SecretString::from(password),
        phone,
        address: None,
    };
    let user = shop.register(form).await?;
    writeln!(out, "Welcome, {}! Your account has been created.", user.name)?;
    Ok(())
}

pub async fn logout<S: KeyValueStore>(
    shop: &mut Storefront<S>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    if !shop.auth().is_authenticated() {
        writeln!(out, "Not signed in.")?;
        return Ok(());
    }
    restore(shop, out).await?;
    shop.logout().await;
    writeln!(out, "Signed out.")?;
    Ok(())
}

pub async fn profile<S: KeyValueStore>(
    shop: &mut Storefront<S>,
    out: &mut impl Write,
    action: Option<ProfileAction>,
) -> Result<(), CliError> {
    match action.unwrap_or(ProfileAction::Show) {
        ProfileAction::Show => {
            let user = shop.profile().await?;
            render(out, &user)
        }
        ProfileAction::Update {
            name,
            email,
            phone,
            street,
            city,
            state,
            zip,
        } => {
            let address = if [&street, &city, &state, &zip].iter().any(|f| f.is_some()) {
                let current = shop.auth().user().and_then(|user| user.address.as_deref());
                let mut address = ShippingAddress::from_profile(current);
                for (field, value) in [
                    (&mut address.street, street),
                    (&mut address.city, city),
                    (&mut address.state, state),
                    (&mut address.zip_code, zip),
                ] {
                    if let Some(value) = value {
                        *field = value;
                    }
                }
                Some(address)
            } else {
                None
            };

            let edit = ProfileEdit {
                name,
                email,
                phone,
                address,
            };
            let user = shop.update_profile(edit).await?;
            writeln!(out, "Profile updated.")?;
            render(out, &user)
        }
        ProfileAction::Password {
            current,
            new,
            confirm,
        } => {
            shop.change_password(
                SecretString::from(current),
                SecretString::from(new),
                &SecretString::from(confirm),
            )
            .await?;
            writeln!(out, "Password updated.")?;
            Ok(())
        }
    }
}

fn render(out: &mut impl Write, user: &User) -> Result<(), CliError> {
    let address = ShippingAddress::from_profile(user.address.as_deref());
    writeln!(out, "Name:    {}", user.name)?;
    writeln!(out, "Email:   {}", user.email.as_str())?;
    writeln!(out, "Phone:   {}", user.phone.as_deref().unwrap_or("-"))?;
    if address == ShippingAddress::default() {
        writeln!(out, "Address: -")?;
    } else {
        writeln!(out, "Address: {address}")?;
    }
    Ok(())
}
