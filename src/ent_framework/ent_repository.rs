// Entity Repository - Save pipeline for records carrying autonumber fields
// Only autonumber sub-values are persisted here; other fields belong to the host's storage

use std::sync::Arc;
use tracing::debug;

use crate::autonumber::allocator::SequenceAllocator;
use crate::ent_framework::ent_hooks::{
    create_default_hook_registry, HookContext, HookOperation, HookRegistry, HookTiming,
};
use crate::ent_framework::ent_record::{EntityRecord, FieldValue};
use crate::ent_framework::ent_schema::EntitySchema;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::SequenceStore;

pub struct EntityRepository {
    schema: EntitySchema,
    store: Arc<dyn SequenceStore>,
    hooks: HookRegistry,
}

impl EntityRepository {
    pub fn new(schema: EntitySchema, store: Arc<dyn SequenceStore>, hooks: HookRegistry) -> Self {
        Self { schema, store, hooks }
    }

    /// Repository with timestamp and autonumber hooks for every autonumber field of `schema`
    pub fn with_default_hooks(
        schema: EntitySchema,
        allocator: Arc<SequenceAllocator>,
    ) -> AppResult<Self> {
        Self::with_date_fields(schema, allocator, &[])
    }

    /// Like `with_default_hooks`, numbering the listed `(autonumber field, date field)`
    /// pairs by their own reference date instead of `created`
    pub fn with_date_fields(
        schema: EntitySchema,
        allocator: Arc<SequenceAllocator>,
        date_fields: &[(&str, &str)],
    ) -> AppResult<Self> {
        let hooks = create_default_hook_registry(&schema, allocator.clone(), date_fields)?;
        Ok(Self::new(schema, allocator.store().clone(), hooks))
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Stored autonumber values of `entity_id`, `None` when nothing was persisted yet
    pub async fn load(&self, entity_id: i64) -> AppResult<Option<EntityRecord>> {
        let mut record = EntityRecord::new(&self.schema.entity_type, entity_id);
        let mut found = false;

        for (definition, _) in self.schema.autonumber_fields() {
            if let Some(item) = self
                .store
                .load_value(&self.schema.entity_type, entity_id, &definition.name)
                .await?
            {
                record.set(&definition.name, FieldValue::Autonumber(item));
                found = true;
            }
        }

        Ok(found.then_some(record))
    }

    /// Run before hooks, persist every autonumber field, then run after hooks.
    ///
    /// A record saved without a manual group keeps the one already stored;
    /// an empty string clears it.
    /// The fields are written in one batch, so a failed save stores none of them.
    /// `entity` is only updated once everything succeeded.
    pub async fn save(&self, entity: &mut EntityRecord) -> AppResult<HookOperation> {
        self.check_type(entity)?;

        let original = self.load(entity.id).await?;
        let operation = if original.is_some() {
            HookOperation::Update
        } else {
            HookOperation::Create
        };
        let entity_type = self.schema.entity_type.as_str();

        let mut record = entity.clone();
        if let Some(original) = &original {
            self.keep_manual_groups(&mut record, original);
        }

        let mut ctx = HookContext::new(operation, record, original);
        self.hooks
            .execute_hooks(entity_type, operation, HookTiming::Before, &mut ctx)
            .await?;

        let values: Vec<_> = self
            .schema
            .autonumber_fields()
            .filter_map(|(definition, _)| {
                ctx.entity
                    .autonumber(&definition.name)
                    .map(|item| (definition.name.as_str(), item))
            })
            .collect();
        if !values.is_empty() {
            self.store
                .save_values(entity_type, ctx.entity.id, &values)
                .await?;
        }

        self.hooks
            .execute_hooks(entity_type, operation, HookTiming::After, &mut ctx)
            .await?;

        debug!("Saved {} {} ({:?})", entity_type, ctx.entity.id, operation);
        *entity = ctx.entity;
        Ok(operation)
    }

    /// Delete stored values of `entity_id`; false when nothing was stored
    pub async fn delete(&self, entity_id: i64) -> AppResult<bool> {
        let entity_type = self.schema.entity_type.as_str();
        let original = match self.load(entity_id).await? {
            Some(record) => record,
            None => return Ok(false),
        };

        let mut ctx = HookContext::new(HookOperation::Delete, original.clone(), Some(original));
        self.hooks
            .execute_hooks(entity_type, HookOperation::Delete, HookTiming::Before, &mut ctx)
            .await?;

        let removed = self.store.delete_values(entity_type, entity_id).await?;

        self.hooks
            .execute_hooks(entity_type, HookOperation::Delete, HookTiming::After, &mut ctx)
            .await?;
        Ok(removed > 0)
    }

    /// Fill unset manual groups of `record` from the stored revision
    fn keep_manual_groups(&self, record: &mut EntityRecord, original: &EntityRecord) {
        for (definition, _) in self.schema.autonumber_fields() {
            let stored = match original
                .autonumber(&definition.name)
                .and_then(|item| item.manual_group())
            {
                Some(group) => group,
                None => continue,
            };
            let item = record.autonumber_mut(&definition.name);
            if item.manual_grouping.is_none() {
                item.manual_grouping = Some(stored.to_string());
            }
        }
    }

    fn check_type(&self, entity: &EntityRecord) -> AppResult<()> {
        if entity.entity_type != self.schema.entity_type {
            return Err(AppError::Validation(format!(
                "repository for '{}' cannot save a '{}' record",
                self.schema.entity_type, entity.entity_type
            )));
        }
        Ok(())
    }
}
