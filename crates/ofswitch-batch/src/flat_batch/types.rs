//! Flat batch input and output types.

use ofswitch_types::{DeviceRef, FlowEntry, GroupEntry, MeterEntry};
use serde::{Deserialize, Serialize};

use crate::error::{BatchError, BatchRpcResult};
use crate::typed::{BatchFailure, BatchItemId, BatchRpc, ChainError, TypedBatchOutput};

/// One operation of a flat batch.
///
/// Serialized with an internal `kind` tag, e.g.
/// `{"kind": "flow-add", "flow": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BatchOperation {
    FlowAdd {
        flow: FlowEntry,
    },
    FlowRemove {
        flow: FlowEntry,
    },
    FlowUpdate {
        original: FlowEntry,
        updated: FlowEntry,
    },
    GroupAdd {
        group: GroupEntry,
    },
    GroupRemove {
        group: GroupEntry,
    },
    GroupUpdate {
        original: GroupEntry,
        updated: GroupEntry,
    },
    MeterAdd {
        meter: MeterEntry,
    },
    MeterRemove {
        meter: MeterEntry,
    },
    MeterUpdate {
        original: MeterEntry,
        updated: MeterEntry,
    },
}

impl BatchOperation {
    /// Typed batch RPC that executes this operation.
    pub fn rpc(&self) -> BatchRpc {
        match self {
            BatchOperation::FlowAdd { .. } => BatchRpc::AddFlowsBatch,
            BatchOperation::FlowRemove { .. } => BatchRpc::RemoveFlowsBatch,
            BatchOperation::FlowUpdate { .. } => BatchRpc::UpdateFlowsBatch,
            BatchOperation::GroupAdd { .. } => BatchRpc::AddGroupsBatch,
            BatchOperation::GroupRemove { .. } => BatchRpc::RemoveGroupsBatch,
            BatchOperation::GroupUpdate { .. } => BatchRpc::UpdateGroupsBatch,
            BatchOperation::MeterAdd { .. } => BatchRpc::AddMetersBatch,
            BatchOperation::MeterRemove { .. } => BatchRpc::RemoveMetersBatch,
            BatchOperation::MeterUpdate { .. } => BatchRpc::UpdateMetersBatch,
        }
    }

    /// Identifier of the targeted entity, as carried by the request.
    pub fn item_id(&self) -> BatchItemId {
        match self {
            BatchOperation::FlowAdd { flow } | BatchOperation::FlowRemove { flow } => {
                BatchItemId::Flow(flow.id.clone())
            }
            BatchOperation::FlowUpdate { updated, .. } => BatchItemId::Flow(updated.id.clone()),
            BatchOperation::GroupAdd { group } | BatchOperation::GroupRemove { group } => {
                BatchItemId::Group(group.id)
            }
            BatchOperation::GroupUpdate { updated, .. } => BatchItemId::Group(updated.id),
            BatchOperation::MeterAdd { meter } | BatchOperation::MeterRemove { meter } => {
                BatchItemId::Meter(meter.id)
            }
            BatchOperation::MeterUpdate { updated, .. } => BatchItemId::Meter(updated.id),
        }
    }

    /// Rejects updates whose two versions name different entities.
    pub fn validate(&self) -> BatchRpcResult<()> {
        let mismatch = match self {
            BatchOperation::FlowUpdate { original, updated } => original.id != updated.id,
            BatchOperation::GroupUpdate { original, updated } => original.id != updated.id,
            BatchOperation::MeterUpdate { original, updated } => original.id != updated.id,
            _ => false,
        };
        if mismatch {
            return Err(BatchError::validation(format!(
                "{} changes the entity id",
                self.rpc()
            )));
        }
        Ok(())
    }
}

/// One client-submitted operation with its submission position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub batch_order: u32,
    #[serde(flatten)]
    pub operation: BatchOperation,
}

impl BatchItem {
    pub fn new(batch_order: u32, operation: BatchOperation) -> Self {
        Self {
            batch_order,
            operation,
        }
    }
}

/// Checks that items are numbered 0, 1, 2, ... in submission order and
/// that each operation is well formed.
pub fn validate_items(items: &[BatchItem]) -> BatchRpcResult<()> {
    for (position, item) in items.iter().enumerate() {
        if u32::try_from(position).ok() != Some(item.batch_order) {
            return Err(BatchError::validation(format!(
                "batch order {} at position {}",
                item.batch_order, position
            )));
        }
        item.operation.validate()?;
    }
    Ok(())
}

/// Aggregate outcome of a flat batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// True iff no item failed and no chain-level error occurred.
    pub success: bool,
    /// Failed items, ascending by batch order.
    pub failures: Vec<BatchFailure>,
    pub errors: Vec<ChainError>,
}

impl Default for BatchResult {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchResult {
    /// An empty, successful result.
    pub fn new() -> Self {
        Self {
            success: true,
            failures: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Folds one step's output into the aggregate.
    pub fn merge(&mut self, output: TypedBatchOutput) {
        if !output.is_success() {
            self.success = false;
        }
        self.failures.extend(output.failures);
        // stable, steps arrive in order so this is usually a no-op
        self.failures.sort_by_key(|failure| failure.batch_order);
        self.errors.extend(output.errors);
    }

    /// Batch orders of the failed items.
    pub fn failed_orders(&self) -> Vec<u32> {
        self.failures.iter().map(|f| f.batch_order).collect()
    }
}

/// A flat batch request as received from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatBatchRequest {
    /// Target device, e.g. `"openflow:1"`.
    pub node: DeviceRef,
    #[serde(default)]
    pub items: Vec<BatchItem>,
    #[serde(default)]
    pub exit_on_first_error: bool,
    /// Barrier after each entity-kind grouping; the service default
    /// applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barrier_requested: Option<bool>,
}

impl FlatBatchRequest {
    /// Decodes and validates a JSON request.
    pub fn from_json(json: &str) -> BatchRpcResult<Self> {
        let request: Self = serde_json::from_str(json)
            .map_err(|e| BatchError::validation(format!("malformed request: {}", e)))?;
        validate_items(&request.items)?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofswitch_session::SessionError;
    use ofswitch_types::{FlowId, GroupId, GroupType};
    use pretty_assertions::assert_eq;

    fn flow(id: &str) -> FlowEntry {
        FlowEntry::new(FlowId::new(id).unwrap())
    }

    fn failure(batch_order: u32, id: &str) -> BatchFailure {
        BatchFailure {
            batch_order,
            id: BatchItemId::Flow(FlowId::new(id).unwrap()),
            error: SessionError::validation("rejected"),
        }
    }

    #[test]
    fn test_operation_rpc_and_id() {
        let op = BatchOperation::GroupRemove {
            group: GroupEntry::new(GroupId::new(9).unwrap(), GroupType::Indirect),
        };
        assert_eq!(op.rpc(), BatchRpc::RemoveGroupsBatch);
        assert_eq!(op.item_id(), BatchItemId::Group(GroupId::new(9).unwrap()));
    }

    #[test]
    fn test_update_must_keep_id() {
        let op = BatchOperation::FlowUpdate {
            original: flow("f1"),
            updated: flow("f2"),
        };
        assert!(matches!(op.validate(), Err(BatchError::Validation { .. })));
    }

    #[test]
    fn test_validate_items_requires_dense_orders() {
        let items = vec![
            BatchItem::new(0, BatchOperation::FlowAdd { flow: flow("a") }),
            BatchItem::new(2, BatchOperation::FlowAdd { flow: flow("b") }),
        ];
        let err = validate_items(&items).unwrap_err();
        assert_eq!(err.to_string(), "Invalid batch: batch order 2 at position 1");

        assert!(validate_items(&items[..1]).is_ok());
        assert!(validate_items(&[]).is_ok());
    }

    #[test]
    fn test_merge_keeps_failures_sorted() {
        let mut result = BatchResult::new();
        assert!(result.is_success());

        result.merge(TypedBatchOutput {
            failures: vec![failure(4, "d")],
            errors: vec![ChainError::item(4, SessionError::validation("rejected"))],
        });
        result.merge(TypedBatchOutput {
            failures: vec![failure(1, "a")],
            errors: vec![ChainError::item(1, SessionError::validation("rejected"))],
        });
        result.merge(TypedBatchOutput::default());

        assert!(!result.is_success());
        assert_eq!(result.failed_orders(), vec![1, 4]);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_request_from_json() {
        let request = FlatBatchRequest::from_json(
            r#"{
                "node": "openflow:7",
                "exit_on_first_error": true,
                "items": [
                    {"batch_order": 0, "kind": "flow-add", "flow": {"id": "f1", "priority": 10}},
                    {"batch_order": 1, "kind": "group-remove",
                     "group": {"id": 3, "group_type": "select"}},
                    {"batch_order": 2, "kind": "meter-add", "meter": {"id": 5}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(request.node, DeviceRef::new(7));
        assert!(request.exit_on_first_error);
        assert_eq!(request.barrier_requested, None);
        let rpcs: Vec<BatchRpc> = request.items.iter().map(|i| i.operation.rpc()).collect();
        assert_eq!(
            rpcs,
            vec![
                BatchRpc::AddFlowsBatch,
                BatchRpc::RemoveGroupsBatch,
                BatchRpc::AddMetersBatch
            ]
        );
    }

    #[test]
    fn test_request_rejects_unknown_kind() {
        let err = FlatBatchRequest::from_json(
            r#"{"node": "openflow:1", "items": [{"batch_order": 0, "kind": "port-add"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::Validation { .. }));
    }

    #[test]
    fn test_request_rejects_invalid_ids() {
        let err = FlatBatchRequest::from_json(
            r#"{"node": "openflow:1", "items": [{"batch_order": 0, "kind": "group-add",
                "group": {"id": 0}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::Validation { .. }));
    }
}
