//! Common types shared by the marketplace crates

mod envelope;
mod error;
mod secret;

pub use envelope::{Envelope, ErrorBody, Pagination};
pub use error::{Error, Result};
pub use secret::Secret;
