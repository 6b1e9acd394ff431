//! Core domain entities.
//!
//! - [`ShortUrl`] - A stored short URL record
//! - [`NewShortUrl`] - Input for creating a record
//! - [`Saved`] / [`DeleteOutcome`] - Expected, non-error outcomes of store calls

pub mod short_url;

pub use short_url::{DeleteOutcome, NewShortUrl, OwnerId, Saved, ShortUrl};
