//! Infrastructure layer for external integrations.
//!
//! Implements the repository trait defined by the domain layer on top of
//! memory, a local file or PostgreSQL.

pub mod persistence;
