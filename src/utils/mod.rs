//! Helpers shared across layers.
//!
//! - [`uid_codec`] - Short code encoding and syntax checks
//! - [`nonce_generator`] - Strictly increasing millisecond nonces
//! - [`db_error`] - PostgreSQL error classification

pub mod db_error;
pub mod nonce_generator;
pub mod uid_codec;
