//! Flat batch orchestration for switch control sessions.
//!
//! A flat batch is one ordered list of flow, group and meter operations.
//! Processing it takes three stages:
//!
//! - planning: consecutive same-kind items become one step, and barriers
//!   are placed after entity-kind groupings and between dependent steps
//! - execution: steps run one after another, each through its typed batch
//!   RPC, optionally stopping at the first failed step
//! - aggregation: item failures are reported with their original batch
//!   order, whatever order the device answered in
//!
//! Single-item operations go through the [`EntityRpcs`] trait;
//! [`SessionEntityRpcs`] implements it on top of `ofswitch-session`.

pub mod config;
pub mod error;
pub mod flat_batch;
pub mod services;
pub mod session_rpcs;
pub mod typed;

pub use config::{BatchConfig, OfSwitchConfig};
pub use error::{BatchError, BatchRpcResult};
pub use flat_batch::{
    plan, BatchExecutor, BatchItem, BatchOperation, BatchPlan, BatchResult, FlatBatchRequest,
    FlatBatchService, FlatBatchStats, PlanStep, StepTasks,
};
pub use services::EntityRpcs;
pub use session_rpcs::{EntityCodec, EntityRequest, JsonCodec, SessionEntityRpcs};
pub use typed::{
    BatchFailure, BatchItemId, BatchRpc, BatchTask, ChainError, EntityKind, EntityOp,
    EntityUpdate, ErrorOrigin, TypedBatchOutput, TypedBatchRpcs,
};
