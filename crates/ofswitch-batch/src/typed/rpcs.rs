//! Typed batch RPCs.
//!
//! Each RPC fans the tasks of one step out to the matching single-item RPC,
//! waits for every item, then optionally sends a barrier. Items run
//! concurrently up to `max_concurrent_items`; results are collected in
//! submission order no matter which item finishes first.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use ofswitch_session::SessionResult;
use ofswitch_types::{DeviceRef, FlowEntry, GroupEntry, MeterEntry};
use tracing::{debug, instrument, warn};

use super::types::{
    BatchFailure, BatchItemId, BatchRpc, BatchTask, ChainError, EntityUpdate, TypedBatchOutput,
};
use crate::services::EntityRpcs;

type ItemCall<T> = fn(Arc<dyn EntityRpcs>, DeviceRef, T) -> BoxFuture<'static, SessionResult<()>>;

/// Batch RPCs for flows, groups and meters.
#[derive(Clone)]
pub struct TypedBatchRpcs {
    rpcs: Arc<dyn EntityRpcs>,
    max_concurrent_items: usize,
}

impl std::fmt::Debug for TypedBatchRpcs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedBatchRpcs")
            .field("max_concurrent_items", &self.max_concurrent_items)
            .finish()
    }
}

impl TypedBatchRpcs {
    pub fn new(rpcs: Arc<dyn EntityRpcs>, max_concurrent_items: usize) -> Self {
        Self {
            rpcs,
            max_concurrent_items: max_concurrent_items.max(1),
        }
    }

    pub async fn add_flows_batch(
        &self,
        device: DeviceRef,
        tasks: Vec<BatchTask<FlowEntry>>,
        barrier_after: bool,
    ) -> TypedBatchOutput {
        self.run(
            device,
            BatchRpc::AddFlowsBatch,
            tasks,
            barrier_after,
            |flow| BatchItemId::Flow(flow.id.clone()),
            |rpcs, device, flow| async move { rpcs.add_flow(device, &flow).await }.boxed(),
        )
        .await
    }

    pub async fn remove_flows_batch(
        &self,
        device: DeviceRef,
        tasks: Vec<BatchTask<FlowEntry>>,
        barrier_after: bool,
    ) -> TypedBatchOutput {
        self.run(
            device,
            BatchRpc::RemoveFlowsBatch,
            tasks,
            barrier_after,
            |flow| BatchItemId::Flow(flow.id.clone()),
            |rpcs, device, flow| async move { rpcs.remove_flow(device, &flow).await }.boxed(),
        )
        .await
    }

    pub async fn update_flows_batch(
        &self,
        device: DeviceRef,
        tasks: Vec<BatchTask<EntityUpdate<FlowEntry>>>,
        barrier_after: bool,
    ) -> TypedBatchOutput {
        self.run(
            device,
            BatchRpc::UpdateFlowsBatch,
            tasks,
            barrier_after,
            |update| BatchItemId::Flow(update.updated.id.clone()),
            |rpcs, device, update| {
                async move {
                    rpcs.update_flow(device, &update.original, &update.updated)
                        .await
                }
                .boxed()
            },
        )
        .await
    }

    pub async fn add_groups_batch(
        &self,
        device: DeviceRef,
        tasks: Vec<BatchTask<GroupEntry>>,
        barrier_after: bool,
    ) -> TypedBatchOutput {
        self.run(
            device,
            BatchRpc::AddGroupsBatch,
            tasks,
            barrier_after,
            |group| BatchItemId::Group(group.id),
            |rpcs, device, group| async move { rpcs.add_group(device, &group).await }.boxed(),
        )
        .await
    }

    pub async fn remove_groups_batch(
        &self,
        device: DeviceRef,
        tasks: Vec<BatchTask<GroupEntry>>,
        barrier_after: bool,
    ) -> TypedBatchOutput {
        self.run(
            device,
            BatchRpc::RemoveGroupsBatch,
            tasks,
            barrier_after,
            |group| BatchItemId::Group(group.id),
            |rpcs, device, group| async move { rpcs.remove_group(device, &group).await }.boxed(),
        )
        .await
    }

    pub async fn update_groups_batch(
        &self,
        device: DeviceRef,
        tasks: Vec<BatchTask<EntityUpdate<GroupEntry>>>,
        barrier_after: bool,
    ) -> TypedBatchOutput {
        self.run(
            device,
            BatchRpc::UpdateGroupsBatch,
            tasks,
            barrier_after,
            |update| BatchItemId::Group(update.updated.id),
            |rpcs, device, update| {
                async move {
                    rpcs.update_group(device, &update.original, &update.updated)
                        .await
                }
                .boxed()
            },
        )
        .await
    }

    pub async fn add_meters_batch(
        &self,
        device: DeviceRef,
        tasks: Vec<BatchTask<MeterEntry>>,
        barrier_after: bool,
    ) -> TypedBatchOutput {
        self.run(
            device,
            BatchRpc::AddMetersBatch,
            tasks,
            barrier_after,
            |meter| BatchItemId::Meter(meter.id),
            |rpcs, device, meter| async move { rpcs.add_meter(device, &meter).await }.boxed(),
        )
        .await
    }

    pub async fn remove_meters_batch(
        &self,
        device: DeviceRef,
        tasks: Vec<BatchTask<MeterEntry>>,
        barrier_after: bool,
    ) -> TypedBatchOutput {
        self.run(
            device,
            BatchRpc::RemoveMetersBatch,
            tasks,
            barrier_after,
            |meter| BatchItemId::Meter(meter.id),
            |rpcs, device, meter| async move { rpcs.remove_meter(device, &meter).await }.boxed(),
        )
        .await
    }

    pub async fn update_meters_batch(
        &self,
        device: DeviceRef,
        tasks: Vec<BatchTask<EntityUpdate<MeterEntry>>>,
        barrier_after: bool,
    ) -> TypedBatchOutput {
        self.run(
            device,
            BatchRpc::UpdateMetersBatch,
            tasks,
            barrier_after,
            |update| BatchItemId::Meter(update.updated.id),
            |rpcs, device, update| {
                async move {
                    rpcs.update_meter(device, &update.original, &update.updated)
                        .await
                }
                .boxed()
            },
        )
        .await
    }

    #[instrument(skip_all, fields(device = %device, rpc = %rpc, tasks = tasks.len()))]
    async fn run<T>(
        &self,
        device: DeviceRef,
        rpc: BatchRpc,
        tasks: Vec<BatchTask<T>>,
        barrier_after: bool,
        id_of: fn(&T) -> BatchItemId,
        call: ItemCall<T>,
    ) -> TypedBatchOutput
    where
        T: Send + 'static,
    {
        let keys: Vec<(u32, BatchItemId)> = tasks
            .iter()
            .map(|task| (task.batch_order, id_of(&task.payload)))
            .collect();

        let rpcs = &self.rpcs;
        let results: Vec<SessionResult<()>> = futures::stream::iter(tasks)
            .map(|task| call(Arc::clone(rpcs), device, task.payload))
            .buffered(self.max_concurrent_items)
            .collect()
            .await;

        let mut output = TypedBatchOutput::default();
        for ((batch_order, id), result) in keys.into_iter().zip(results) {
            if let Err(error) = result {
                debug!(batch_order, %id, %error, "batch item failed");
                output.errors.push(ChainError::item(batch_order, error.clone()));
                output.failures.push(BatchFailure {
                    batch_order,
                    id,
                    error,
                });
            }
        }

        // only once every item outcome is known
        if barrier_after {
            if let Err(error) = self.rpcs.send_barrier(device).await {
                warn!(%error, "barrier after batch failed");
                output.errors.push(ChainError::barrier(rpc, error));
            }
        }

        output
    }
}
