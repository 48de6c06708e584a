//! Pages direct-upload API.
//!
//! [`PagesPlatform`] is the seam the deploy pipeline talks to; [`Client`]
//! implements it over HTTPS with `reqwest`.

pub mod client;
pub mod error;
pub mod platform;

pub use client::{Client, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
pub use error::ApiError;
pub use platform::{ApiFuture, PagesPlatform};
