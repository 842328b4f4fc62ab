//! Command-line surface

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use common::Secret;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "marketplace", author, version, about = "Marketplace API client", long_about = None)]
pub struct Cli {
    /// Config file (default: $MARKETPLACE_CONFIG, then marketplace.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and store the issued tokens
    Login {
        #[arg(short, long)]
        email: String,
        #[command(flatten)]
        password: PasswordArg,
    },
    /// Sign out and forget stored tokens
    Logout,
    /// Register a new account; a verification code is emailed
    Signup {
        #[arg(short, long)]
        email: String,
        #[command(flatten)]
        password: PasswordArg,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// Profile picture
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Confirm an email address with the emailed code
    Verify {
        #[arg(short, long)]
        email: String,
        #[arg(long)]
        otp: String,
    },
    /// Send a new verification code
    ResendOtp {
        #[arg(short, long)]
        email: String,
    },
    /// Request a password reset email
    ForgotPassword {
        #[arg(short, long)]
        email: String,
    },
    /// Show the signed-in user
    Whoami,
    /// Show a user's profile (own profile when ID is omitted)
    Profile { id: Option<String> },
    /// Edit the signed-in user's profile
    UpdateProfile {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// List products page by page
    Products {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "10")]
        limit: u32,
    },
    /// Search products by text
    Search { query: String },
    /// Show one product
    Product { id: String },
    /// List a new product
    CreateProduct {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        price: f64,
        #[command(flatten)]
        location: LocationArgs,
        /// Product photo; repeat for several
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Change fields of an existing product
    UpdateProduct {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        price: Option<f64>,
        #[command(flatten)]
        location: OptionalLocationArgs,
        /// Photo to append; repeat for several
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Remove a product
    DeleteProduct { id: String },
    /// Local shopping cart
    Cart {
        #[command(subcommand)]
        action: CartCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum CartCommand {
    /// List cart lines and the total
    Show,
    /// Add one unit of a product
    Add { id: String },
    /// Drop a product from the cart
    Remove { id: String },
    /// Set a line's quantity (0 removes it)
    Set { id: String, quantity: u32 },
    /// Empty the cart
    Clear,
}

#[derive(Args, Debug)]
pub struct PasswordArg {
    #[arg(short, long, env = "MARKETPLACE_PASSWORD", hide_env_values = true)]
    pub password: String,
}

impl PasswordArg {
    pub fn into_secret(self) -> Result<Secret<String>> {
        let password = Secret::new(self.password);
        if password.is_blank() {
            bail!("password must not be empty");
        }
        Ok(password)
    }
}

#[derive(Args, Debug)]
pub struct LocationArgs {
    #[arg(long)]
    pub location_name: String,
    #[arg(long, allow_negative_numbers = true)]
    pub latitude: f64,
    #[arg(long, allow_negative_numbers = true)]
    pub longitude: f64,
}

#[derive(Args, Debug)]
pub struct OptionalLocationArgs {
    #[arg(long, requires = "latitude")]
    pub location_name: Option<String>,
    #[arg(long, allow_negative_numbers = true, requires = "longitude")]
    pub latitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true, requires = "location_name")]
    pub longitude: Option<f64>,
}
