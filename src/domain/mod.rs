//! Domain layer containing business entities and logic.
//!
//! - [`entities`] - Short URL records and save/delete outcomes
//! - [`repositories`] - Storage trait implemented by the infrastructure layer
//! - [`deletion_event`] - Messages and settings of the deletion pipeline
//! - [`deletion_worker`] - Batched background soft deletion
//!
//! # Deletion Flow
//!
//! 1. HTTP handler accepts a delete request and answers `202 Accepted`
//! 2. [`deletion_worker::DeletionPipeline::push`] validates and resolves the codes
//! 3. Resolved records reach the worker as [`deletion_event::DeletionEvent::Delete`]
//! 4. The worker applies them through [`repositories::ShortUrlRepository::batch_soft_delete`]

pub mod deletion_event;
pub mod deletion_worker;
pub mod entities;
pub mod repositories;
