//! Marketplace API client
//!
//! `AuthenticatedClient` sends requests against a fixed base URL, attaching
//! the stored bearer token and renewing it once when the server answers 401.
//! `MarketplaceApi` wraps every endpoint the marketplace exposes, and
//! `SessionContext` tracks whether the user is signed in.
//!
//! Request lifecycle:
//! 1. Caller builds an immutable `ApiRequest`
//! 2. `AuthenticatedClient::send` reads the access token and dispatches
//! 3. On 401 it exchanges the refresh token, stores the new pair, and
//!    resends the same descriptor once with `Attempt::Retried`
//! 4. If renewal is impossible the credentials are cleared and the call
//!    fails with `Error::AuthExpired`

pub mod api;
pub mod cart;
pub mod client;
pub mod error;
pub mod metrics;
pub mod models;
pub mod request;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::MarketplaceApi;
pub use cart::{CART_KEY, Cart, CartItem};
pub use client::{AuthenticatedClient, ClientOptions, DEFAULT_TIMEOUT, REQUEST_ID_HEADER};
pub use error::{Error, Result};
pub use models::{
    ImageRef, Location, NewProduct, Page, Product, ProductOwner, ProductUpdate, ProfileUpdate,
    SignupRequest, Upload, User,
};
pub use request::{ApiRequest, Attempt, FormField, RequestBody};
pub use session::{SessionContext, SessionEvent, SessionState, transition};
