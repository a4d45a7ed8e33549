// Ent Framework - Entity schema, records, hooks and the save pipeline

pub mod ent_hooks;
pub mod ent_record;
pub mod ent_repository;
pub mod ent_schema;

// Re-export all ent framework types for convenience
pub use ent_hooks::{EntHook, HookContext, HookOperation, HookRegistry, HookTiming};
pub use ent_record::{EntityRecord, FieldValue};
pub use ent_repository::EntityRepository;
pub use ent_schema::{DatetimeType, EntitySchema, FieldDefinition, FieldType};
