//! SQLite persistence adapter.
//!
//! Implements the core `StoragePort`: a keyed `users` table with atomic
//! upsert plus insert-only `chat_log` / `file_log` tables.

mod pool;
mod store;

pub use pool::SqlitePoolManager;
pub use store::SqliteStore;
