// Entity Record - In-memory field values of one entity
// Fields are addressed by name and hold typed values, never raw dynamic members

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::autonumber::item::SequenceFieldValue;

/// Value held by a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Epoch seconds
    Timestamp(i64),
    /// Text, including stored calendar dates
    Text(String),
    Int(i64),
    Autonumber(SequenceFieldValue),
    Empty,
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::Autonumber(item) => item.is_empty(),
            FieldValue::Timestamp(_) | FieldValue::Int(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_type: String,
    pub id: i64,
    values: HashMap<String, FieldValue>,
}

impl EntityRecord {
    pub fn new(entity_type: &str, id: i64) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            id,
            values: HashMap::new(),
        }
    }

    pub fn with_value(mut self, field: &str, value: FieldValue) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn set(&mut self, field: &str, value: FieldValue) {
        self.values.insert(field.to_string(), value);
    }

    /// True when the field is absent or holds an empty value
    pub fn is_field_empty(&self, field: &str) -> bool {
        self.values.get(field).map_or(true, FieldValue::is_empty)
    }

    /// Autonumber sub-values of `field`, if the field holds them
    pub fn autonumber(&self, field: &str) -> Option<&SequenceFieldValue> {
        match self.values.get(field) {
            Some(FieldValue::Autonumber(item)) => Some(item),
            _ => None,
        }
    }

    /// Mutable autonumber sub-values, replacing any non-autonumber value with an empty item
    pub fn autonumber_mut(&mut self, field: &str) -> &mut SequenceFieldValue {
        let slot = self
            .values
            .entry(field.to_string())
            .or_insert_with(|| FieldValue::Autonumber(SequenceFieldValue::new()));
        if !matches!(slot, FieldValue::Autonumber(_)) {
            *slot = FieldValue::Autonumber(SequenceFieldValue::new());
        }
        match slot {
            FieldValue::Autonumber(item) => item,
            _ => unreachable!("slot was just set to an autonumber value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_emptiness() {
        let record = EntityRecord::new("invoice", 1)
            .with_value("created", FieldValue::Timestamp(0))
            .with_value("title", FieldValue::Text(String::new()))
            .with_value("other", FieldValue::Empty);

        assert!(!record.is_field_empty("created"));
        assert!(record.is_field_empty("title"));
        assert!(record.is_field_empty("other"));
        assert!(record.is_field_empty("missing"));
    }

    #[test]
    fn test_autonumber_mut_creates_item() {
        let mut record = EntityRecord::new("invoice", 1);
        assert!(record.autonumber("number").is_none());

        record.autonumber_mut("number").value = Some(3);
        assert_eq!(record.autonumber("number").unwrap().value, Some(3));
    }

    #[test]
    fn test_autonumber_mut_replaces_foreign_value() {
        let mut record = EntityRecord::new("invoice", 1)
            .with_value("number", FieldValue::Text("abc".to_string()));
        assert!(record.autonumber("number").is_none());

        assert!(record.autonumber_mut("number").is_empty());
        assert!(record.autonumber("number").is_some());
    }
}
