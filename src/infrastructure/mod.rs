// Core infrastructure modules
pub mod database;        // Store contract used by the allocator
pub mod sqlite_database; // SQLite implementation

pub use database::{PartitionQuery, SequenceStore};
pub use sqlite_database::SqliteSequenceStore;
