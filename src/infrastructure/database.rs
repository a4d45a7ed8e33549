// Database Interface - Store contract required by the autonumber allocator
// One relation keyed by (entity type, field name) holding every allocated value

use async_trait::async_trait;

use crate::autonumber::item::SequenceFieldValue;
use crate::error::AppResult;

/// Rows a MAX(value) lookup is restricted to.
///
/// `auto_grouping` and `manual_grouping` are independent filters; `None`
/// widens the match to every bucket or group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionQuery {
    pub entity_type: String,
    pub field_name: String,
    pub auto_grouping: Option<String>,
    pub manual_grouping: Option<String>,
}

impl PartitionQuery {
    /// Empty strings are treated as "no restriction"
    pub fn new(
        entity_type: &str,
        field_name: &str,
        auto_grouping: Option<&str>,
        manual_grouping: Option<&str>,
    ) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            field_name: field_name.to_string(),
            auto_grouping: auto_grouping.filter(|k| !k.is_empty()).map(str::to_string),
            manual_grouping: manual_grouping.filter(|g| !g.is_empty()).map(str::to_string),
        }
    }
}

#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Highest stored value in the partition, `None` when no row matches
    async fn max_value(&self, query: &PartitionQuery) -> AppResult<Option<i64>>;

    /// Atomically advance and return the partition counter.
    /// A missing counter is seeded from `max_value` so existing rows are respected.
    async fn next_counter_value(&self, query: &PartitionQuery) -> AppResult<i64>;

    /// Insert or replace the stored sub-values of several fields of one entity.
    /// Either every field is written or none is.
    async fn save_values(
        &self,
        entity_type: &str,
        entity_id: i64,
        values: &[(&str, &SequenceFieldValue)],
    ) -> AppResult<()>;

    /// Insert or replace the stored sub-values of one entity field
    async fn save_value(
        &self,
        entity_type: &str,
        entity_id: i64,
        field_name: &str,
        value: &SequenceFieldValue,
    ) -> AppResult<()> {
        self.save_values(entity_type, entity_id, &[(field_name, value)])
            .await
    }

    async fn load_value(
        &self,
        entity_type: &str,
        entity_id: i64,
        field_name: &str,
    ) -> AppResult<Option<SequenceFieldValue>>;

    /// Remove every stored field of an entity, returning the number of rows removed
    async fn delete_values(&self, entity_type: &str, entity_id: i64) -> AppResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_query_normalizes_blanks() {
        let query = PartitionQuery::new("invoice", "number", Some(""), Some(""));
        assert_eq!(query.auto_grouping, None);
        assert_eq!(query.manual_grouping, None);

        let query = PartitionQuery::new("invoice", "number", Some("2024-1-02-15"), None);
        assert_eq!(query.auto_grouping.as_deref(), Some("2024-1-02-15"));
        assert_eq!(query.manual_grouping, None);
    }
}
