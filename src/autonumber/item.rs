// Autonumber Item - Persisted sub-values of one autonumber field

use serde::{Deserialize, Serialize};

/// Per-field configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutonumberSettings {
    /// Template containing any of `YYYY`, `QQ`, `MM`, `DD`
    pub auto_grouping_pattern: String,
}

impl AutonumberSettings {
    pub fn new(auto_grouping_pattern: &str) -> Self {
        Self {
            auto_grouping_pattern: auto_grouping_pattern.to_string(),
        }
    }
}

/// One autonumber field value as stored for an entity.
///
/// `value` is unique only inside its (bucket key, manual group) partition.
/// `auto_grouping_pattern` is a snapshot of the setting at allocation time, so
/// later pattern changes never touch numbers that were already handed out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceFieldValue {
    pub value: Option<i64>,
    pub auto_grouping: Option<String>,
    pub auto_grouping_pattern: Option<String>,
    /// Caller-managed partition label, never computed here
    pub manual_grouping: Option<String>,
}

impl SequenceFieldValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manual_grouping(mut self, manual_grouping: &str) -> Self {
        self.manual_grouping = Some(manual_grouping.to_string());
        self
    }

    /// No number allocated yet. Allocation starts at 1, so 0 counts as empty too.
    pub fn is_empty(&self) -> bool {
        matches!(self.value, None | Some(0))
    }

    /// Manual group to partition by, if one is set
    pub fn manual_group(&self) -> Option<&str> {
        self.manual_grouping.as_deref().filter(|g| !g.is_empty())
    }

    /// Overwrite the three computed sub-values
    pub(crate) fn assign(&mut self, value: i64, auto_grouping: String, pattern: String) {
        self.value = Some(value);
        self.auto_grouping = Some(auto_grouping);
        self.auto_grouping_pattern = Some(pattern);
    }

    /// Copy the three computed sub-values from a previous revision
    pub(crate) fn restore_from(&mut self, previous: &SequenceFieldValue) {
        self.value = previous.value;
        self.auto_grouping = previous.auto_grouping.clone();
        self.auto_grouping_pattern = previous.auto_grouping_pattern.clone();
    }
}
