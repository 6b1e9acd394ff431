//! HTTP middleware for request processing.

pub mod compression;
pub mod owner;
pub mod tracing;
