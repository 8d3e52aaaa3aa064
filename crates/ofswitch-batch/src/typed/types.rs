//! Typed batch RPC inputs and outputs.

use std::fmt;

use ofswitch_session::SessionError;
use ofswitch_types::{FlowId, GroupId, MeterId};
use serde::{Deserialize, Serialize};

/// Entity family a batch operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Flow,
    Group,
    Meter,
}

/// Operation applied to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityOp {
    Add,
    Remove,
    Update,
}

/// One of the typed batch RPCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchRpc {
    AddFlowsBatch,
    RemoveFlowsBatch,
    UpdateFlowsBatch,
    AddGroupsBatch,
    RemoveGroupsBatch,
    UpdateGroupsBatch,
    AddMetersBatch,
    RemoveMetersBatch,
    UpdateMetersBatch,
}

impl BatchRpc {
    pub const ALL: [BatchRpc; 9] = [
        BatchRpc::AddFlowsBatch,
        BatchRpc::RemoveFlowsBatch,
        BatchRpc::UpdateFlowsBatch,
        BatchRpc::AddGroupsBatch,
        BatchRpc::RemoveGroupsBatch,
        BatchRpc::UpdateGroupsBatch,
        BatchRpc::AddMetersBatch,
        BatchRpc::RemoveMetersBatch,
        BatchRpc::UpdateMetersBatch,
    ];

    pub const fn entity(&self) -> EntityKind {
        match self {
            BatchRpc::AddFlowsBatch | BatchRpc::RemoveFlowsBatch | BatchRpc::UpdateFlowsBatch => {
                EntityKind::Flow
            }
            BatchRpc::AddGroupsBatch
            | BatchRpc::RemoveGroupsBatch
            | BatchRpc::UpdateGroupsBatch => EntityKind::Group,
            BatchRpc::AddMetersBatch
            | BatchRpc::RemoveMetersBatch
            | BatchRpc::UpdateMetersBatch => EntityKind::Meter,
        }
    }

    pub const fn op(&self) -> EntityOp {
        match self {
            BatchRpc::AddFlowsBatch | BatchRpc::AddGroupsBatch | BatchRpc::AddMetersBatch => {
                EntityOp::Add
            }
            BatchRpc::RemoveFlowsBatch
            | BatchRpc::RemoveGroupsBatch
            | BatchRpc::RemoveMetersBatch => EntityOp::Remove,
            BatchRpc::UpdateFlowsBatch
            | BatchRpc::UpdateGroupsBatch
            | BatchRpc::UpdateMetersBatch => EntityOp::Update,
        }
    }
}

impl fmt::Display for BatchRpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchRpc::AddFlowsBatch => "add-flows-batch",
            BatchRpc::RemoveFlowsBatch => "remove-flows-batch",
            BatchRpc::UpdateFlowsBatch => "update-flows-batch",
            BatchRpc::AddGroupsBatch => "add-groups-batch",
            BatchRpc::RemoveGroupsBatch => "remove-groups-batch",
            BatchRpc::UpdateGroupsBatch => "update-groups-batch",
            BatchRpc::AddMetersBatch => "add-meters-batch",
            BatchRpc::RemoveMetersBatch => "remove-meters-batch",
            BatchRpc::UpdateMetersBatch => "update-meters-batch",
        };
        f.write_str(s)
    }
}

/// One item of a typed batch, tagged with its position in the flat batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTask<T> {
    pub batch_order: u32,
    pub payload: T,
}

impl<T> BatchTask<T> {
    pub fn new(batch_order: u32, payload: T) -> Self {
        Self {
            batch_order,
            payload,
        }
    }
}

/// Original and updated versions of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityUpdate<T> {
    pub original: T,
    pub updated: T,
}

/// Identifier echoed in a failure report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchItemId {
    Flow(FlowId),
    Group(GroupId),
    Meter(MeterId),
}

impl fmt::Display for BatchItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchItemId::Flow(id) => write!(f, "flow {}", id),
            BatchItemId::Group(id) => write!(f, "group {}", id),
            BatchItemId::Meter(id) => write!(f, "meter {}", id),
        }
    }
}

/// A failed batch item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Position of the item in the submitted batch.
    pub batch_order: u32,
    /// Identifier carried by the request.
    pub id: BatchItemId,
    pub error: SessionError,
}

/// Where a chain-level error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOrigin {
    /// A single item's RPC.
    Item { batch_order: u32 },
    /// The barrier sent after a step.
    Barrier { after: BatchRpc },
}

/// An error collected into a batch result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainError {
    pub origin: ErrorOrigin,
    pub error: SessionError,
}

impl ChainError {
    pub fn item(batch_order: u32, error: SessionError) -> Self {
        Self {
            origin: ErrorOrigin::Item { batch_order },
            error,
        }
    }

    pub fn barrier(after: BatchRpc, error: SessionError) -> Self {
        Self {
            origin: ErrorOrigin::Barrier { after },
            error,
        }
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            ErrorOrigin::Item { batch_order } => {
                write!(f, "item {} failed: {}", batch_order, self.error)
            }
            ErrorOrigin::Barrier { after } => {
                write!(f, "barrier after {} failed: {}", after, self.error)
            }
        }
    }
}

/// Output of one typed batch RPC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypedBatchOutput {
    /// Failed items in submission order.
    pub failures: Vec<BatchFailure>,
    pub errors: Vec<ChainError>,
}

impl TypedBatchOutput {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rpc_entity_and_op() {
        assert_eq!(BatchRpc::UpdateGroupsBatch.entity(), EntityKind::Group);
        assert_eq!(BatchRpc::UpdateGroupsBatch.op(), EntityOp::Update);
        assert_eq!(BatchRpc::RemoveMetersBatch.entity(), EntityKind::Meter);
        assert_eq!(BatchRpc::AddFlowsBatch.op(), EntityOp::Add);
    }

    #[test]
    fn test_chain_error_display() {
        let err = ChainError::barrier(BatchRpc::AddFlowsBatch, SessionError::ConnectionLost);
        assert_eq!(
            err.to_string(),
            "barrier after add-flows-batch failed: Device disconnected"
        );
        let err = ChainError::item(3, SessionError::validation("bad"));
        assert_eq!(err.to_string(), "item 3 failed: Invalid request: bad");
    }

    #[test]
    fn test_empty_output_is_success() {
        assert!(TypedBatchOutput::default().is_success());
    }
}
