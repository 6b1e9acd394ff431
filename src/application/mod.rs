//! Application layer services implementing business logic.
//!
//! # Available Services
//!
//! - [`services::link_service::LinkService`] - Shortening, redirects, listing and deletion
//! - [`services::auth_service::AuthService`] - Owner identification through a signed cookie

pub mod services;
