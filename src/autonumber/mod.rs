// Autonumber - Grouped, strictly increasing field values assigned at save time

pub mod allocator;
pub mod grouping;
pub mod item;
pub mod processor;

pub use allocator::{AllocationStrategy, SequenceAllocator};
pub use grouping::{derive_grouping_key, GroupingComponents};
pub use item::{AutonumberSettings, SequenceFieldValue};
pub use processor::{should_update_value, AutonumberField, Processor, SaveOutcome};
