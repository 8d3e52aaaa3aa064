//! Flat batch processing: decoding, planning and sequential execution of
//! one ordered, mixed-kind list of operations.

mod executor;
mod planner;
mod service;
mod types;

pub use executor::{BatchExecutor, ExecutionTally};
pub use planner::{mark_barriers, needs_barrier, plan, BatchPlan, PlanStep, StepTasks};
pub use service::{FlatBatchService, FlatBatchStats};
pub use types::{validate_items, BatchItem, BatchOperation, BatchResult, FlatBatchRequest};
