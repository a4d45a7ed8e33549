// Ent Hooks System - Middleware pattern for entity mutations
// Before hooks prepare the record, after hooks observe the persisted result

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use crate::autonumber::allocator::SequenceAllocator;
use crate::autonumber::processor::{AutonumberField, Processor, SaveOutcome};
use crate::ent_framework::ent_record::{EntityRecord, FieldValue};
use crate::ent_framework::ent_schema::EntitySchema;
use crate::error::{AppError, AppResult};

/// Hook context containing mutation information
#[derive(Debug, Clone)]
pub struct HookContext {
    pub operation: HookOperation,
    /// Record being saved, mutable by before hooks
    pub entity: EntityRecord,
    /// Last persisted revision, `None` for new records
    pub original: Option<EntityRecord>,
    pub metadata: HashMap<String, Value>,
}

impl HookContext {
    pub fn new(
        operation: HookOperation,
        entity: EntityRecord,
        original: Option<EntityRecord>,
    ) -> Self {
        Self {
            operation,
            entity,
            original,
            metadata: HashMap::new(),
        }
    }
}

/// Types of operations that can trigger hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOperation {
    Create,
    Update,
    Delete,
}

/// Hook execution timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookTiming {
    Before,
    After,
}

/// Trait for implementing entity hooks
#[async_trait]
pub trait EntHook: Send + Sync {
    /// Execute the hook logic
    async fn execute(&self, ctx: &mut HookContext) -> AppResult<()>;

    /// Get hook name for debugging
    fn name(&self) -> &str;

    /// Get supported operations
    fn operations(&self) -> Vec<HookOperation>;

    /// Get hook timing
    fn timing(&self) -> HookTiming;
}

/// Hook registry for managing entity hooks
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Vec<Box<dyn EntHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for an entity type; hooks run in registration order
    pub fn register_hook(&mut self, entity_type: &str, hook: Box<dyn EntHook>) {
        self.hooks.entry(entity_type.to_string()).or_default().push(hook);
    }

    pub fn hook_names(&self, entity_type: &str) -> Vec<&str> {
        self.hooks
            .get(entity_type)
            .map(|hooks| hooks.iter().map(|h| h.name()).collect())
            .unwrap_or_default()
    }

    /// Execute all applicable hooks for an operation, stopping at the first failure
    pub async fn execute_hooks(
        &self,
        entity_type: &str,
        operation: HookOperation,
        timing: HookTiming,
        ctx: &mut HookContext,
    ) -> AppResult<()> {
        if let Some(hooks) = self.hooks.get(entity_type) {
            for hook in hooks {
                if hook.operations().contains(&operation) && hook.timing() == timing {
                    if let Err(e) = hook.execute(ctx).await {
                        error!("Hook '{}' failed: {}", hook.name(), e);
                        return Err(e);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Timestamp hook - sets `created` on new records and `changed` on every save
pub struct TimestampHook;

#[async_trait]
impl EntHook for TimestampHook {
    async fn execute(&self, ctx: &mut HookContext) -> AppResult<()> {
        let now = chrono::Utc::now().timestamp();

        if ctx.operation == HookOperation::Create && ctx.entity.is_field_empty("created") {
            ctx.entity.set("created", FieldValue::Timestamp(now));
        }
        ctx.entity.set("changed", FieldValue::Timestamp(now));

        Ok(())
    }

    fn name(&self) -> &str {
        "timestamp_hook"
    }

    fn operations(&self) -> Vec<HookOperation> {
        vec![HookOperation::Create, HookOperation::Update]
    }

    fn timing(&self) -> HookTiming {
        HookTiming::Before
    }
}

/// Autonumber hook - allocates or restores one autonumber field before persisting
pub struct AutonumberHook {
    name: String,
    processor: Processor,
}

impl AutonumberHook {
    pub fn new(processor: Processor) -> Self {
        Self {
            name: format!("autonumber_hook:{}", processor.field().field_name()),
            processor,
        }
    }
}

#[async_trait]
impl EntHook for AutonumberHook {
    async fn execute(&self, ctx: &mut HookContext) -> AppResult<()> {
        let outcome = self
            .processor
            .on_save(&mut ctx.entity, ctx.original.as_ref())
            .await?;

        let summary = match outcome {
            SaveOutcome::Allocated { value, auto_grouping } => {
                json!({ "allocated": value, "auto_grouping": auto_grouping })
            }
            SaveOutcome::Preserved => json!({ "preserved": true }),
        };
        ctx.metadata.insert(self.name.clone(), summary);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn operations(&self) -> Vec<HookOperation> {
        vec![HookOperation::Create, HookOperation::Update]
    }

    fn timing(&self) -> HookTiming {
        HookTiming::Before
    }
}

/// Default hooks for a schema: timestamps first, then one autonumber hook per field.
///
/// `date_fields` maps an autonumber field to its reference date field; fields
/// not listed use `created`.
pub fn create_default_hook_registry(
    schema: &EntitySchema,
    allocator: Arc<SequenceAllocator>,
    date_fields: &[(&str, &str)],
) -> AppResult<HookRegistry> {
    for (field_name, _) in date_fields {
        if !schema
            .autonumber_fields()
            .any(|(definition, _)| definition.name == *field_name)
        {
            return Err(AppError::FieldNotFound(format!(
                "'{}' is not an autonumber field of '{}'",
                field_name, schema.entity_type
            )));
        }
    }

    let mut registry = HookRegistry::new();
    registry.register_hook(&schema.entity_type, Box::new(TimestampHook));

    for (definition, _) in schema.autonumber_fields() {
        let mut field = AutonumberField::bind(schema, &definition.name)?;
        if let Some((_, date_field)) = date_fields
            .iter()
            .find(|(field_name, _)| *field_name == definition.name)
        {
            field = field.with_date_field(schema, date_field)?;
        }
        let processor = Processor::new(field, allocator.clone());
        registry.register_hook(&schema.entity_type, Box::new(AutonumberHook::new(processor)));
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autonumber::allocator::AllocationStrategy;
    use crate::config::AllocationConfig;
    use crate::ent_framework::ent_schema::{DatetimeType, FieldDefinition, FieldType};
    use crate::infrastructure::sqlite_database::SqliteSequenceStore;

    async fn allocator() -> Arc<SequenceAllocator> {
        let store = Arc::new(SqliteSequenceStore::new_in_memory().await.unwrap());
        Arc::new(SequenceAllocator::new(
            store,
            &AllocationConfig {
                strategy: AllocationStrategy::MaxPlusOne,
                query_timeout_ms: 1000,
            },
        ))
    }

    struct FailingHook;

    #[async_trait]
    impl EntHook for FailingHook {
        async fn execute(&self, _ctx: &mut HookContext) -> AppResult<()> {
            Err(AppError::Validation("rejected".to_string()))
        }

        fn name(&self) -> &str {
            "failing_hook"
        }

        fn operations(&self) -> Vec<HookOperation> {
            vec![HookOperation::Update]
        }

        fn timing(&self) -> HookTiming {
            HookTiming::Before
        }
    }

    #[tokio::test]
    async fn test_timestamp_hook() {
        let mut ctx =
            HookContext::new(HookOperation::Create, EntityRecord::new("invoice", 1), None);
        TimestampHook.execute(&mut ctx).await.unwrap();
        assert!(matches!(ctx.entity.get("created"), Some(FieldValue::Timestamp(_))));
        assert!(matches!(ctx.entity.get("changed"), Some(FieldValue::Timestamp(_))));

        let entity =
            EntityRecord::new("invoice", 1).with_value("created", FieldValue::Timestamp(5));
        let mut ctx = HookContext::new(HookOperation::Create, entity, None);
        TimestampHook.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.entity.get("created"), Some(&FieldValue::Timestamp(5)));
    }

    #[tokio::test]
    async fn test_default_registry_order_and_allocation() {
        let schema = EntitySchema::new("invoice")
            .with_field(FieldDefinition::autonumber("number", "YYYY"))
            .with_field(FieldDefinition::autonumber("yearly", ""));
        let registry = create_default_hook_registry(&schema, allocator().await, &[]).unwrap();

        assert_eq!(
            registry.hook_names("invoice"),
            vec!["timestamp_hook", "autonumber_hook:number", "autonumber_hook:yearly"]
        );

        let mut ctx =
            HookContext::new(HookOperation::Create, EntityRecord::new("invoice", 1), None);
        registry
            .execute_hooks("invoice", HookOperation::Create, HookTiming::Before, &mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.entity.autonumber("number").unwrap().value, Some(1));
        assert_eq!(
            ctx.entity.autonumber("yearly").unwrap().auto_grouping.as_deref(),
            Some("YYYY-QQ-MM-DD")
        );
        assert_eq!(ctx.metadata["autonumber_hook:number"]["allocated"], 1);
    }

    #[tokio::test]
    async fn test_registry_with_date_field() {
        let schema = EntitySchema::new("invoice")
            .with_field(FieldDefinition::autonumber("number", "YYYY-QQ"))
            .with_field(FieldDefinition::new("title", FieldType::String))
            .with_field(FieldDefinition::new(
                "issued",
                FieldType::Datetime(DatetimeType::Date),
            ));

        assert!(matches!(
            create_default_hook_registry(&schema, allocator().await, &[("title", "issued")]),
            Err(AppError::FieldNotFound(_))
        ));
        assert!(matches!(
            create_default_hook_registry(&schema, allocator().await, &[("number", "title")]),
            Err(AppError::UnsupportedDateFieldType(_))
        ));

        let registry =
            create_default_hook_registry(&schema, allocator().await, &[("number", "issued")])
                .unwrap();
        let entity = EntityRecord::new("invoice", 1)
            .with_value("issued", FieldValue::Text("2023-11-30".to_string()));
        let mut ctx = HookContext::new(HookOperation::Create, entity, None);
        registry
            .execute_hooks("invoice", HookOperation::Create, HookTiming::Before, &mut ctx)
            .await
            .unwrap();

        // `created` is now, but the bucket follows `issued`
        assert_eq!(
            ctx.entity.autonumber("number").unwrap().auto_grouping.as_deref(),
            Some("2023-4-MM-DD")
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_error_kind() {
        let mut registry = HookRegistry::new();
        registry.register_hook("invoice", Box::new(FailingHook));

        let mut ctx =
            HookContext::new(HookOperation::Create, EntityRecord::new("invoice", 1), None);
        registry
            .execute_hooks("invoice", HookOperation::Create, HookTiming::Before, &mut ctx)
            .await
            .unwrap();

        let mut ctx =
            HookContext::new(HookOperation::Update, EntityRecord::new("invoice", 1), None);
        let result = registry
            .execute_hooks("invoice", HookOperation::Update, HookTiming::Before, &mut ctx)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
