//! Data Transfer Objects for API requests and responses.
//!
//! Request DTOs derive `validator::Validate`; handlers call `validate()` before
//! touching the service layer.

pub mod batch;
pub mod shorten;
pub mod user_urls;
