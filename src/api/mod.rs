//! HTTP layer translating requests into service calls.
//!
//! - [`dto`] - Request/response bodies
//! - [`handlers`] - Endpoint handlers
//! - [`middleware`] - Owner resolution and request tracing
//! - [`routes`] - Owner-scoped route table

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;
