// Ent Schema - Field declarations for an entity type
// The autonumber processor reads declared field types from here, never from values

use serde::{Deserialize, Serialize};

use crate::autonumber::item::AutonumberSettings;

/// Storage format of a `Datetime` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatetimeType {
    /// Stored as `YYYY-MM-DD`
    Date,
    /// Stored as `YYYY-MM-DDTHH:MM:SS`
    DateTime,
}

impl DatetimeType {
    /// chrono format string for the stored text
    pub fn storage_format(&self) -> &'static str {
        match self {
            DatetimeType::Date => "%Y-%m-%d",
            DatetimeType::DateTime => "%Y-%m-%dT%H:%M:%S",
        }
    }
}

/// Field types an entity can declare
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    /// Creation time, epoch seconds
    Created,
    /// Last change time, epoch seconds
    Changed,
    /// Arbitrary epoch seconds
    Timestamp,
    /// Calendar text in the storage timezone
    Datetime(DatetimeType),
    Autonumber(AutonumberSettings),
    String,
    Int,
}

impl FieldType {
    /// Whether a field of this type can supply the reference date for grouping
    pub fn is_date_source(&self) -> bool {
        matches!(
            self,
            FieldType::Created | FieldType::Changed | FieldType::Timestamp | FieldType::Datetime(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Created => "created",
            FieldType::Changed => "changed",
            FieldType::Timestamp => "timestamp",
            FieldType::Datetime(_) => "datetime",
            FieldType::Autonumber(_) => "autonumber",
            FieldType::String => "string",
            FieldType::Int => "int",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldDefinition {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
        }
    }

    /// Autonumber field with the given grouping pattern
    pub fn autonumber(name: &str, auto_grouping_pattern: &str) -> Self {
        Self::new(
            name,
            FieldType::Autonumber(AutonumberSettings::new(auto_grouping_pattern)),
        )
    }
}

/// All fields declared for one entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub entity_type: String,
    pub fields: Vec<FieldDefinition>,
}

impl EntitySchema {
    /// New schema; every entity type carries `created` and `changed` fields
    pub fn new(entity_type: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            fields: vec![
                FieldDefinition::new("created", FieldType::Created),
                FieldDefinition::new("changed", FieldType::Changed),
            ],
        }
    }

    /// Add or replace a field definition
    pub fn with_field(mut self, definition: FieldDefinition) -> Self {
        self.fields.retain(|f| f.name != definition.name);
        self.fields.push(definition);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Autonumber fields in declaration order
    pub fn autonumber_fields(
        &self,
    ) -> impl Iterator<Item = (&FieldDefinition, &AutonumberSettings)> {
        self.fields.iter().filter_map(|f| match &f.field_type {
            FieldType::Autonumber(settings) => Some((f, settings)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_sources() {
        assert!(FieldType::Created.is_date_source());
        assert!(FieldType::Changed.is_date_source());
        assert!(FieldType::Timestamp.is_date_source());
        assert!(FieldType::Datetime(DatetimeType::Date).is_date_source());
        assert!(!FieldType::String.is_date_source());
        assert!(!FieldType::Int.is_date_source());
        assert!(!FieldType::Autonumber(AutonumberSettings::default()).is_date_source());
    }

    #[test]
    fn test_schema_lookup() {
        let schema = EntitySchema::new("invoice")
            .with_field(FieldDefinition::autonumber("number", "YYYY"))
            .with_field(FieldDefinition::new("title", FieldType::String));

        assert_eq!(schema.field("created").unwrap().field_type, FieldType::Created);
        assert!(schema.field("missing").is_none());

        let numbered: Vec<_> = schema.autonumber_fields().map(|(f, _)| f.name.clone()).collect();
        assert_eq!(numbered, vec!["number".to_string()]);
    }

    #[test]
    fn test_with_field_replaces() {
        let schema = EntitySchema::new("invoice")
            .with_field(FieldDefinition::new("created", FieldType::Timestamp));
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.field("created").unwrap().field_type, FieldType::Timestamp);
    }
}
