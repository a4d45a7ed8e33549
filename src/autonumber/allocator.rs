// Sequence Allocator - Next number inside a (bucket key, manual group) partition

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::AllocationConfig;
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::{PartitionQuery, SequenceStore};

/// How the next value of a partition is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// Read MAX(value) and add one. The read and the later write are not atomic:
    /// two concurrent saves in the same partition can receive the same number.
    MaxPlusOne,
    /// Atomic increment-and-read of a per-partition counter row. No duplicates,
    /// but a save that fails after allocation leaves a gap.
    Counter,
}

impl FromStr for AllocationStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "max_plus_one" => Ok(AllocationStrategy::MaxPlusOne),
            "counter" => Ok(AllocationStrategy::Counter),
            other => Err(anyhow::anyhow!(
                "unknown allocation strategy '{}', expected 'max_plus_one' or 'counter'",
                other
            )),
        }
    }
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationStrategy::MaxPlusOne => write!(f, "max_plus_one"),
            AllocationStrategy::Counter => write!(f, "counter"),
        }
    }
}

pub struct SequenceAllocator {
    store: Arc<dyn SequenceStore>,
    strategy: AllocationStrategy,
    query_timeout: Duration,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn SequenceStore>, config: &AllocationConfig) -> Self {
        Self {
            store,
            strategy: config.strategy,
            query_timeout: config.query_timeout(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SequenceStore> {
        &self.store
    }

    /// Next value for the partition, always >= 1.
    ///
    /// Empty `bucket_key` or `manual_group` widen the match instead of
    /// restricting it. Store failures are returned, never replaced by 1.
    pub async fn next_value(
        &self,
        entity_type: &str,
        field_name: &str,
        bucket_key: Option<&str>,
        manual_group: Option<&str>,
    ) -> AppResult<i64> {
        let query = PartitionQuery::new(entity_type, field_name, bucket_key, manual_group);

        let next = match self.strategy {
            AllocationStrategy::MaxPlusOne => {
                let current = self.with_timeout(&query, self.store.max_value(&query)).await?;
                current.unwrap_or(0).max(0) + 1
            }
            AllocationStrategy::Counter => {
                self.with_timeout(&query, self.store.next_counter_value(&query)).await?
            }
        };

        debug!(
            "Allocated {} for {}.{} in bucket {:?} group {:?} ({})",
            next, entity_type, field_name, query.auto_grouping, query.manual_grouping, self.strategy
        );
        Ok(next)
    }

    async fn with_timeout<T>(
        &self,
        query: &PartitionQuery,
        operation: impl std::future::Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.query_timeout, operation).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Allocation query for {}.{} timed out after {:?}",
                    query.entity_type, query.field_name, self.query_timeout
                );
                Err(AppError::AllocationStoreError(format!(
                    "query for {}.{} timed out after {:?}",
                    query.entity_type, query.field_name, self.query_timeout
                )))
            }
        }
    }
}
