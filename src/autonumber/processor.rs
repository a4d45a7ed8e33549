// Autonumber Processor - Decides per save whether to allocate or carry values forward

use std::sync::Arc;
use tracing::{info, warn};

use crate::autonumber::allocator::SequenceAllocator;
use crate::autonumber::grouping::{derive_grouping_key, ensure_date_source, resolve_reference_date};
use crate::autonumber::item::{AutonumberSettings, SequenceFieldValue};
use crate::ent_framework::ent_record::EntityRecord;
use crate::ent_framework::ent_schema::{EntitySchema, FieldDefinition, FieldType};
use crate::error::{AppError, AppResult};

/// Reference field used when none is configured
pub const DEFAULT_DATE_FIELD: &str = "created";

/// An autonumber field bound to its schema, with the reference date field checked up front
#[derive(Debug, Clone)]
pub struct AutonumberField {
    entity_type: String,
    field_name: String,
    settings: AutonumberSettings,
    date_field: FieldDefinition,
}

impl AutonumberField {
    /// Bind `field_name` of `schema`, using `created` as reference date
    pub fn bind(schema: &EntitySchema, field_name: &str) -> AppResult<Self> {
        let settings = match schema.field(field_name).map(|f| &f.field_type) {
            Some(FieldType::Autonumber(settings)) => settings.clone(),
            Some(other) => {
                return Err(AppError::FieldNotFound(format!(
                    "field '{}' on '{}' is of type '{}', not autonumber",
                    field_name,
                    schema.entity_type,
                    other.name()
                )))
            }
            None => {
                return Err(AppError::FieldNotFound(format!(
                    "field '{}' does not exist on '{}'",
                    field_name, schema.entity_type
                )))
            }
        };

        Ok(Self {
            entity_type: schema.entity_type.clone(),
            field_name: field_name.to_string(),
            settings,
            date_field: ensure_date_source(schema, DEFAULT_DATE_FIELD)?.clone(),
        })
    }

    /// Use another date or timestamp field as the reference date
    pub fn with_date_field(mut self, schema: &EntitySchema, date_field: &str) -> AppResult<Self> {
        self.date_field = ensure_date_source(schema, date_field)?.clone();
        Ok(self)
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn date_field(&self) -> &str {
        &self.date_field.name
    }

    pub fn pattern(&self) -> &str {
        &self.settings.auto_grouping_pattern
    }

    /// Bucket key for `entity` under the configured pattern
    pub fn grouping_key(&self, entity: &EntityRecord) -> AppResult<String> {
        let reference = resolve_reference_date(entity, &self.date_field)?;
        Ok(derive_grouping_key(reference, self.pattern()))
    }
}

/// What `Processor::on_save` did to the field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Allocated { value: i64, auto_grouping: String },
    Preserved,
}

/// Stored value of the previous revision, if it has a meaningful one
fn previous_value<'a>(
    original: Option<&'a EntityRecord>,
    field: &str,
) -> Option<&'a SequenceFieldValue> {
    original
        .and_then(|record| record.autonumber(field))
        .filter(|item| !item.is_empty())
}

/// A new number is needed when there is no prior revision or its value is empty
pub fn should_update_value(original: Option<&EntityRecord>, field: &str) -> bool {
    previous_value(original, field).is_none()
}

pub struct Processor {
    field: AutonumberField,
    allocator: Arc<SequenceAllocator>,
}

impl Processor {
    pub fn new(field: AutonumberField, allocator: Arc<SequenceAllocator>) -> Self {
        Self { field, allocator }
    }

    pub fn field(&self) -> &AutonumberField {
        &self.field
    }

    /// Fill in or carry forward the field before `entity` is persisted.
    ///
    /// `original` is the last persisted revision, `None` for new records. On
    /// error nothing on `entity` has been modified.
    pub async fn on_save(
        &self,
        entity: &mut EntityRecord,
        original: Option<&EntityRecord>,
    ) -> AppResult<SaveOutcome> {
        if entity.entity_type != self.field.entity_type {
            return Err(AppError::Validation(format!(
                "autonumber field '{}' belongs to '{}', got a '{}' record",
                self.field.field_name, self.field.entity_type, entity.entity_type
            )));
        }
        let field = self.field.field_name.as_str();

        if let Some(previous) = previous_value(original, field) {
            entity.autonumber_mut(field).restore_from(previous);
            return Ok(SaveOutcome::Preserved);
        }

        if original.is_some_and(|o| o.autonumber(field).is_some()) {
            warn!(
                "{} {} has an empty stored '{}', allocating a new number",
                entity.entity_type, entity.id, field
            );
        }

        let auto_grouping = self.field.grouping_key(entity)?;
        let manual_group = entity
            .autonumber(field)
            .and_then(|item| item.manual_group())
            .map(str::to_string);

        let value = self
            .allocator
            .next_value(
                &self.field.entity_type,
                field,
                Some(&auto_grouping),
                manual_group.as_deref(),
            )
            .await?;

        entity
            .autonumber_mut(field)
            .assign(value, auto_grouping.clone(), self.field.pattern().to_string());

        info!(
            "Assigned {} = {} to {} {} (bucket '{}')",
            field, value, entity.entity_type, entity.id, auto_grouping
        );
        Ok(SaveOutcome::Allocated { value, auto_grouping })
    }
}
