//! Repository trait definitions for the domain layer.
//!
//! Traits define the contract for data operations; implementations live in
//! `crate::infrastructure::persistence`. A mock is generated via `mockall` for
//! unit tests.
//!
//! See integration tests in `tests/repository_*.rs` for usage examples.

pub mod short_url_repository;

pub use short_url_repository::{Operation, ShortUrlRepository, StoreError, StoreResult};

#[cfg(test)]
pub use short_url_repository::MockShortUrlRepository;
