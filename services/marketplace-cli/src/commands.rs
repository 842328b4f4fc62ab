//! Command execution
//!
//! Credential-issuing commands (login, signup, verify, resend-otp,
//! forgot-password) start from a fresh context. Everything else restores the
//! stored session first and refuses to run signed out.

use anyhow::{Context, Result, bail};
use marketplace_client::{
    Cart, Location, MarketplaceApi, NewProduct, Product, ProductUpdate, ProfileUpdate,
    SessionContext, SignupRequest, Upload, User,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cli::{CartCommand, Command};

pub async fn run(command: Command, api: MarketplaceApi) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let password = password.into_secret()?;
            let mut session = SessionContext::new(api);
            session
                .login(&email, &password)
                .await
                .context(failure(&session))?;
            if let Some(user) = session.user() {
                println!("Logged in as {} <{}>", user.display_name(), user.email);
            }
        }
        Command::Signup {
            email,
            password,
            first_name,
            last_name,
            image,
        } => {
            let request = SignupRequest {
                email: email.clone(),
                password: password.into_secret()?,
                first_name,
                last_name,
                profile_image: read_upload(image.as_deref()).await?,
            };
            let mut session = SessionContext::new(api);
            session.signup(&request).await.context(failure(&session))?;
            println!("Account created. A verification code was sent to {email}.");
        }
        Command::Verify { email, otp } => {
            let mut session = SessionContext::new(api);
            session
                .verify_otp(&email, &otp)
                .await
                .context(failure(&session))?;
            match session.user() {
                Some(user) => println!("Verified. Logged in as {}", user.display_name()),
                None => println!("Verified. Run `marketplace login` to sign in."),
            }
        }
        Command::ResendOtp { email } => {
            let mut session = SessionContext::new(api);
            session
                .resend_otp(&email)
                .await
                .context(failure(&session))?;
            println!("Verification code sent to {email}.");
        }
        Command::ForgotPassword { email } => {
            api.forgot_password(&email)
                .await
                .context("Failed to request password reset")?;
            println!("Password reset instructions sent to {email}.");
        }
        Command::Logout => {
            let mut session = SessionContext::initialize(api).await;
            session.logout().await;
            println!("Logged out.");
        }
        Command::Whoami => {
            let session = SessionContext::initialize(api).await;
            match session.user() {
                Some(user) => print_json(user)?,
                None => println!("Not logged in."),
            }
        }
        command => {
            let mut session = SessionContext::initialize(api).await;
            if !session.is_logged_in() {
                bail!("not logged in; run `marketplace login` first");
            }
            let result = run_signed_in(command, &mut session).await;
            if let Some(e) = result
                .as_ref()
                .err()
                .and_then(|e| e.downcast_ref::<marketplace_client::Error>())
            {
                session.report(e);
                debug!(signed_in = session.is_logged_in(), error = %e, "command failed");
            }
            result?;
        }
    }
    Ok(())
}

async fn run_signed_in(command: Command, session: &mut SessionContext) -> Result<()> {
    match command {
        Command::Profile { id } => {
            let user: User = session
                .api()
                .get_profile(id.as_deref())
                .await
                .context("Failed to load profile")?;
            print_json(&user)?;
        }
        Command::UpdateProfile {
            first_name,
            last_name,
            image,
        } => {
            let update = ProfileUpdate {
                first_name,
                last_name,
                profile_image: read_upload(image.as_deref()).await?,
            };
            let user = session
                .update_profile(&update)
                .await
                .context(failure(session))?;
            print_json(&user)?;
        }
        Command::Products { page, limit } => {
            let page = session
                .api()
                .get_products(page, limit)
                .await
                .context("Failed to load products")?;
            print_products(&page.items);
            if page.has_next_page {
                println!("(more results on the next page)");
            }
        }
        Command::Search { query } => {
            let products = session
                .api()
                .search_products(&query)
                .await
                .context("Search failed")?;
            print_products(&products);
        }
        Command::Product { id } => {
            let product = session.api().get_product(&id).await?;
            print_json(&product)?;
        }
        Command::CreateProduct {
            title,
            description,
            price,
            location,
            images,
        } => {
            let product = NewProduct {
                title,
                description,
                price,
                location: Location {
                    name: location.location_name,
                    latitude: location.latitude,
                    longitude: location.longitude,
                },
                images: read_uploads(&images).await?,
            };
            let created = session.api().create_product(&product).await?;
            println!("Created product {}", created.id);
        }
        Command::UpdateProduct {
            id,
            title,
            description,
            price,
            location,
            images,
        } => {
            let location = match (location.location_name, location.latitude, location.longitude) {
                (Some(name), Some(latitude), Some(longitude)) => Some(Location {
                    name,
                    latitude,
                    longitude,
                }),
                _ => None,
            };
            let update = ProductUpdate {
                title,
                description,
                price,
                location,
                new_images: read_uploads(&images).await?,
            };
            let updated = session.api().update_product(&id, &update).await?;
            print_json(&updated)?;
        }
        Command::DeleteProduct { id } => {
            session.api().delete_product(&id).await?;
            println!("Deleted product {id}");
        }
        Command::Cart { action } => run_cart(action, session).await?,
        other => bail!("unexpected command: {other:?}"),
    }
    Ok(())
}

async fn run_cart(action: CartCommand, session: &SessionContext) -> Result<()> {
    let store = &**session.api().client().credentials().backing();
    let mut cart = Cart::load(store).await.context("Failed to read cart")?;

    match action {
        CartCommand::Show => {}
        CartCommand::Add { id } => {
            let product = session.api().get_product(&id).await?;
            if session.user().is_some_and(|user| product.is_owned_by(user)) {
                bail!("cannot add your own product to the cart");
            }
            cart.add(product);
        }
        CartCommand::Remove { id } => cart.remove(&id),
        CartCommand::Set { id, quantity } => cart.update_quantity(&id, quantity),
        CartCommand::Clear => cart.clear(),
    }

    cart.save(store).await.context("Failed to save cart")?;

    if cart.is_empty() {
        println!("Cart is empty.");
        return Ok(());
    }
    for item in cart.items() {
        println!(
            "{:>3} x {:<32} {:>10.2}",
            item.quantity,
            item.product.title,
            item.subtotal()
        );
    }
    println!("{} items, total {:.2}", cart.total_items(), cart.total());
    Ok(())
}

/// Last user-facing message recorded by the session.
fn failure(session: &SessionContext) -> String {
    session
        .last_error()
        .unwrap_or("Request failed")
        .to_owned()
}

async fn read_upload(path: Option<&Path>) -> Result<Option<Upload>> {
    match path {
        Some(path) => Ok(Some(Upload::from_path(path).await?)),
        None => Ok(None),
    }
}

async fn read_uploads(paths: &[PathBuf]) -> Result<Vec<Upload>> {
    let mut uploads = Vec::with_capacity(paths.len());
    for path in paths {
        uploads.push(Upload::from_path(path).await?);
    }
    Ok(uploads)
}

fn print_products(products: &[Product]) {
    if products.is_empty() {
        println!("No products found.");
        return;
    }
    for product in products {
        println!("{:<26} {:<32} {:>10.2}", product.id, product.title, product.price);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
