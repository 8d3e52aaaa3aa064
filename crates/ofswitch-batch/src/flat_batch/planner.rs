//! Batch planner.
//!
//! Splits a flat batch into steps, each a maximal run of consecutive items
//! of the same kind, and decides which steps are followed by a barrier.
//! Only adjacency matters: `A A B A` plans as three steps.

use std::collections::BTreeSet;

use ofswitch_types::{FlowEntry, GroupEntry, MeterEntry};
use tracing::debug;

use super::types::{BatchItem, BatchOperation};
use crate::typed::{BatchRpc, BatchTask, EntityUpdate};

/// Tasks of one step, typed by the RPC that executes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTasks {
    AddFlows(Vec<BatchTask<FlowEntry>>),
    RemoveFlows(Vec<BatchTask<FlowEntry>>),
    UpdateFlows(Vec<BatchTask<EntityUpdate<FlowEntry>>>),
    AddGroups(Vec<BatchTask<GroupEntry>>),
    RemoveGroups(Vec<BatchTask<GroupEntry>>),
    UpdateGroups(Vec<BatchTask<EntityUpdate<GroupEntry>>>),
    AddMeters(Vec<BatchTask<MeterEntry>>),
    RemoveMeters(Vec<BatchTask<MeterEntry>>),
    UpdateMeters(Vec<BatchTask<EntityUpdate<MeterEntry>>>),
}

impl From<BatchItem> for StepTasks {
    fn from(item: BatchItem) -> Self {
        let order = item.batch_order;
        match item.operation {
            BatchOperation::FlowAdd { flow } => Self::AddFlows(vec![BatchTask::new(order, flow)]),
            BatchOperation::FlowRemove { flow } => {
                Self::RemoveFlows(vec![BatchTask::new(order, flow)])
            }
            BatchOperation::FlowUpdate { original, updated } => Self::UpdateFlows(vec![
                BatchTask::new(order, EntityUpdate { original, updated }),
            ]),
            BatchOperation::GroupAdd { group } => {
                Self::AddGroups(vec![BatchTask::new(order, group)])
            }
            BatchOperation::GroupRemove { group } => {
                Self::RemoveGroups(vec![BatchTask::new(order, group)])
            }
            BatchOperation::GroupUpdate { original, updated } => Self::UpdateGroups(vec![
                BatchTask::new(order, EntityUpdate { original, updated }),
            ]),
            BatchOperation::MeterAdd { meter } => {
                Self::AddMeters(vec![BatchTask::new(order, meter)])
            }
            BatchOperation::MeterRemove { meter } => {
                Self::RemoveMeters(vec![BatchTask::new(order, meter)])
            }
            BatchOperation::MeterUpdate { original, updated } => Self::UpdateMeters(vec![
                BatchTask::new(order, EntityUpdate { original, updated }),
            ]),
        }
    }
}

impl StepTasks {
    /// Appends `item` if it has the same kind, otherwise hands it back.
    pub fn try_push(&mut self, item: BatchItem) -> Result<(), BatchItem> {
        let order = item.batch_order;
        match (self, item.operation) {
            (Self::AddFlows(tasks), BatchOperation::FlowAdd { flow })
            | (Self::RemoveFlows(tasks), BatchOperation::FlowRemove { flow }) => {
                tasks.push(BatchTask::new(order, flow))
            }
            (Self::UpdateFlows(tasks), BatchOperation::FlowUpdate { original, updated }) => {
                tasks.push(BatchTask::new(order, EntityUpdate { original, updated }))
            }
            (Self::AddGroups(tasks), BatchOperation::GroupAdd { group })
            | (Self::RemoveGroups(tasks), BatchOperation::GroupRemove { group }) => {
                tasks.push(BatchTask::new(order, group))
            }
            (Self::UpdateGroups(tasks), BatchOperation::GroupUpdate { original, updated }) => {
                tasks.push(BatchTask::new(order, EntityUpdate { original, updated }))
            }
            (Self::AddMeters(tasks), BatchOperation::MeterAdd { meter })
            | (Self::RemoveMeters(tasks), BatchOperation::MeterRemove { meter }) => {
                tasks.push(BatchTask::new(order, meter))
            }
            (Self::UpdateMeters(tasks), BatchOperation::MeterUpdate { original, updated }) => {
                tasks.push(BatchTask::new(order, EntityUpdate { original, updated }))
            }
            (_, operation) => {
                return Err(BatchItem {
                    batch_order: order,
                    operation,
                })
            }
        }
        Ok(())
    }

    /// Typed batch RPC that executes this step.
    pub fn rpc(&self) -> BatchRpc {
        match self {
            Self::AddFlows(_) => BatchRpc::AddFlowsBatch,
            Self::RemoveFlows(_) => BatchRpc::RemoveFlowsBatch,
            Self::UpdateFlows(_) => BatchRpc::UpdateFlowsBatch,
            Self::AddGroups(_) => BatchRpc::AddGroupsBatch,
            Self::RemoveGroups(_) => BatchRpc::RemoveGroupsBatch,
            Self::UpdateGroups(_) => BatchRpc::UpdateGroupsBatch,
            Self::AddMeters(_) => BatchRpc::AddMetersBatch,
            Self::RemoveMeters(_) => BatchRpc::RemoveMetersBatch,
            Self::UpdateMeters(_) => BatchRpc::UpdateMetersBatch,
        }
    }

    /// Batch orders of the tasks, in step order.
    pub fn batch_orders(&self) -> Vec<u32> {
        fn orders<T>(tasks: &[BatchTask<T>]) -> Vec<u32> {
            tasks.iter().map(|t| t.batch_order).collect()
        }
        match self {
            Self::AddFlows(t) | Self::RemoveFlows(t) => orders(t),
            Self::UpdateFlows(t) => orders(t),
            Self::AddGroups(t) | Self::RemoveGroups(t) => orders(t),
            Self::UpdateGroups(t) => orders(t),
            Self::AddMeters(t) | Self::RemoveMeters(t) => orders(t),
            Self::UpdateMeters(t) => orders(t),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::AddFlows(t) | Self::RemoveFlows(t) => t.len(),
            Self::UpdateFlows(t) => t.len(),
            Self::AddGroups(t) | Self::RemoveGroups(t) => t.len(),
            Self::UpdateGroups(t) => t.len(),
            Self::AddMeters(t) | Self::RemoveMeters(t) => t.len(),
            Self::UpdateMeters(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One unit of sequential execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub tasks: StepTasks,
    /// Send a barrier once every task of this step has completed.
    pub barrier_after: bool,
    /// Number of items in earlier steps.
    pub offset: u32,
}

impl PlanStep {
    pub fn rpc(&self) -> BatchRpc {
        self.tasks.rpc()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// True when the tasks are numbered `offset`, `offset + 1`, ...
    pub fn is_dense(&self) -> bool {
        self.tasks
            .batch_orders()
            .into_iter()
            .zip(self.offset..)
            .all(|(order, expected)| order == expected)
    }
}

/// Ordered steps of one flat batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    pub steps: Vec<PlanStep>,
}

impl BatchPlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn rpcs(&self) -> Vec<BatchRpc> {
        self.steps.iter().map(PlanStep::rpc).collect()
    }

    pub fn barrier_count(&self) -> usize {
        self.steps.iter().filter(|s| s.barrier_after).count()
    }
}

impl IntoIterator for BatchPlan {
    type Item = PlanStep;
    type IntoIter = std::vec::IntoIter<PlanStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}

/// Groups `items` into steps.
///
/// With `barrier_requested`, a barrier follows the last step of every run
/// of one entity kind. With `dependency_barriers`, a barrier is also
/// placed wherever the next step may depend on one sent before it, see
/// [`needs_barrier`].
pub fn plan(items: Vec<BatchItem>, barrier_requested: bool, dependency_barriers: bool) -> BatchPlan {
    let mut runs: Vec<StepTasks> = Vec::new();
    for item in items {
        let item = match runs.last_mut() {
            Some(current) => match current.try_push(item) {
                Ok(()) => continue,
                Err(item) => item,
            },
            None => item,
        };
        runs.push(StepTasks::from(item));
    }

    let rpcs: Vec<BatchRpc> = runs.iter().map(StepTasks::rpc).collect();
    let barriers = mark_barriers(&rpcs, barrier_requested, dependency_barriers);

    let mut offset = 0u32;
    let steps: Vec<PlanStep> = runs
        .into_iter()
        .zip(barriers)
        .map(|(tasks, barrier_after)| {
            let step = PlanStep {
                barrier_after,
                offset,
                tasks,
            };
            offset = offset.saturating_add(u32::try_from(step.len()).unwrap_or(u32::MAX));
            step
        })
        .collect();

    debug!(
        steps = steps.len(),
        barriers = steps.iter().filter(|s| s.barrier_after).count(),
        "planned flat batch"
    );
    BatchPlan { steps }
}

/// Barrier flag for each step of `rpcs`.
pub fn mark_barriers(
    rpcs: &[BatchRpc],
    barrier_requested: bool,
    dependency_barriers: bool,
) -> Vec<bool> {
    let mut flags = Vec::with_capacity(rpcs.len());
    let mut since_barrier = BTreeSet::new();

    for (index, rpc) in rpcs.iter().enumerate() {
        since_barrier.insert(*rpc);
        let next = rpcs.get(index + 1);

        let grouping_ends = next.map_or(true, |next| next.entity() != rpc.entity());
        let dependency = next.is_some_and(|next| needs_barrier(&since_barrier, *next));
        let barrier = (barrier_requested && grouping_ends) || (dependency_barriers && dependency);

        if barrier {
            since_barrier.clear();
        }
        flags.push(barrier);
    }
    flags
}

/// Whether a step of kind `next` must wait for the steps in `since_barrier`
/// to be acknowledged first.
pub fn needs_barrier(since_barrier: &BTreeSet<BatchRpc>, next: BatchRpc) -> bool {
    let seen = |rpc: BatchRpc| since_barrier.contains(&rpc);
    match next {
        // flows may reference new groups or meters
        BatchRpc::AddFlowsBatch | BatchRpc::UpdateFlowsBatch => {
            seen(BatchRpc::AddGroupsBatch) || seen(BatchRpc::AddMetersBatch)
        }
        // chained groups
        BatchRpc::AddGroupsBatch => {
            seen(BatchRpc::AddGroupsBatch) || seen(BatchRpc::UpdateGroupsBatch)
        }
        // a group can only go once nothing references it
        BatchRpc::RemoveGroupsBatch => {
            seen(BatchRpc::RemoveFlowsBatch)
                || seen(BatchRpc::UpdateFlowsBatch)
                || seen(BatchRpc::RemoveGroupsBatch)
                || seen(BatchRpc::UpdateGroupsBatch)
        }
        BatchRpc::RemoveMetersBatch => {
            seen(BatchRpc::RemoveFlowsBatch) || seen(BatchRpc::UpdateFlowsBatch)
        }
        _ => false,
    }
}
