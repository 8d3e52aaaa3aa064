//! Typed batch RPCs, one per entity kind and operation.

mod rpcs;
mod types;

pub use rpcs::TypedBatchRpcs;
pub use types::{
    BatchFailure, BatchItemId, BatchRpc, BatchTask, ChainError, EntityKind, EntityOp,
    EntityUpdate, ErrorOrigin, TypedBatchOutput,
};
