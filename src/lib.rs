// Autonumber - Grouped sequence numbers for entity fields

// Grouping key derivation, allocation and the update policy
pub mod autonumber;

// Ent Framework - Schemas, records, hooks and repository
pub mod ent_framework;

// Infrastructure - Persisted store
pub mod infrastructure;

// Common utilities
pub mod config;
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
