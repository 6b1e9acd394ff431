//! Storage backends for short URL records.
//!
//! Each backend implements [`crate::domain::repositories::ShortUrlRepository`].
//!
//! - [`MemoryRepository`] - process memory, lost on restart
//! - [`FileRepository`] - append-only JSON lines log replayed on open
//! - [`PgRepository`] - PostgreSQL with unique constraints doing dedup

pub mod file_repository;
pub mod memory_repository;
pub mod pg_repository;
pub mod record_index;

pub use file_repository::FileRepository;
pub use memory_repository::MemoryRepository;
pub use pg_repository::PgRepository;
