//! Recording fake of the single-item entity RPCs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use ofswitch_batch::{BatchItemId, EntityKind, EntityOp, EntityRpcs};
use ofswitch_session::{SessionError, SessionResult};
use ofswitch_types::{DeviceRef, FlowEntry, GroupEntry, MeterEntry};

/// One recorded RPC invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcCall {
    Entity {
        device: DeviceRef,
        op: EntityOp,
        id: BatchItemId,
    },
    Barrier {
        device: DeviceRef,
    },
}

impl RpcCall {
    pub fn is_barrier(&self) -> bool {
        matches!(self, RpcCall::Barrier { .. })
    }
}

#[derive(Debug, Default)]
struct Script {
    failures: HashMap<BatchItemId, SessionError>,
    delays: HashMap<BatchItemId, Duration>,
    barrier_failure: Option<SessionError>,
}

/// Entity RPCs that record every call and answer from a script.
///
/// Items succeed unless a failure is scripted for their id. A scripted
/// delay holds an item back so completion order can differ from
/// submission order. Calls are recorded when they complete.
#[derive(Debug, Clone, Default)]
pub struct RecordingRpcs {
    calls: Arc<Mutex<Vec<RpcCall>>>,
    script: Arc<Mutex<Script>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingRpcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation on `id` fail with `error`.
    pub fn fail(self, id: BatchItemId, error: SessionError) -> Self {
        lock(&self.script).failures.insert(id, error);
        self
    }

    /// Holds every operation on `id` back for `delay`.
    pub fn delay(self, id: BatchItemId, delay: Duration) -> Self {
        lock(&self.script).delays.insert(id, delay);
        self
    }

    /// Makes every barrier fail with `error`.
    pub fn fail_barriers(self, error: SessionError) -> Self {
        lock(&self.script).barrier_failure = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<RpcCall> {
        lock(&self.calls).clone()
    }

    /// Number of entity calls of `kind` and `op`.
    pub fn count(&self, kind: EntityKind, op: EntityOp) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| match call {
                RpcCall::Entity {
                    op: call_op, id, ..
                } => *call_op == op && entity_kind(id) == kind,
                RpcCall::Barrier { .. } => false,
            })
            .count()
    }

    pub fn barrier_count(&self) -> usize {
        lock(&self.calls).iter().filter(|c| c.is_barrier()).count()
    }

    /// Ids of the entity calls, in completion order.
    pub fn completed_ids(&self) -> Vec<BatchItemId> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                RpcCall::Entity { id, .. } => Some(id.clone()),
                RpcCall::Barrier { .. } => None,
            })
            .collect()
    }

    async fn entity(&self, device: DeviceRef, op: EntityOp, id: BatchItemId) -> SessionResult<()> {
        let (delay, outcome) = {
            let script = lock(&self.script);
            (
                script.delays.get(&id).copied(),
                script.failures.get(&id).cloned(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        lock(&self.calls).push(RpcCall::Entity { device, op, id });
        match outcome {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn entity_kind(id: &BatchItemId) -> EntityKind {
    match id {
        BatchItemId::Flow(_) => EntityKind::Flow,
        BatchItemId::Group(_) => EntityKind::Group,
        BatchItemId::Meter(_) => EntityKind::Meter,
    }
}

#[async_trait]
impl EntityRpcs for RecordingRpcs {
    async fn add_flow(&self, device: DeviceRef, flow: &FlowEntry) -> SessionResult<()> {
        self.entity(device, EntityOp::Add, BatchItemId::Flow(flow.id.clone()))
            .await
    }

    async fn remove_flow(&self, device: DeviceRef, flow: &FlowEntry) -> SessionResult<()> {
        self.entity(device, EntityOp::Remove, BatchItemId::Flow(flow.id.clone()))
            .await
    }

    async fn update_flow(
        &self,
        device: DeviceRef,
        _original: &FlowEntry,
        updated: &FlowEntry,
    ) -> SessionResult<()> {
        self.entity(device, EntityOp::Update, BatchItemId::Flow(updated.id.clone()))
            .await
    }

    async fn add_group(&self, device: DeviceRef, group: &GroupEntry) -> SessionResult<()> {
        self.entity(device, EntityOp::Add, BatchItemId::Group(group.id))
            .await
    }

    async fn remove_group(&self, device: DeviceRef, group: &GroupEntry) -> SessionResult<()> {
        self.entity(device, EntityOp::Remove, BatchItemId::Group(group.id))
            .await
    }

    async fn update_group(
        &self,
        device: DeviceRef,
        _original: &GroupEntry,
        updated: &GroupEntry,
    ) -> SessionResult<()> {
        self.entity(device, EntityOp::Update, BatchItemId::Group(updated.id))
            .await
    }

    async fn add_meter(&self, device: DeviceRef, meter: &MeterEntry) -> SessionResult<()> {
        self.entity(device, EntityOp::Add, BatchItemId::Meter(meter.id))
            .await
    }

    async fn remove_meter(&self, device: DeviceRef, meter: &MeterEntry) -> SessionResult<()> {
        self.entity(device, EntityOp::Remove, BatchItemId::Meter(meter.id))
            .await
    }

    async fn update_meter(
        &self,
        device: DeviceRef,
        _original: &MeterEntry,
        updated: &MeterEntry,
    ) -> SessionResult<()> {
        self.entity(device, EntityOp::Update, BatchItemId::Meter(updated.id))
            .await
    }

    async fn send_barrier(&self, device: DeviceRef) -> SessionResult<()> {
        lock(&self.calls).push(RpcCall::Barrier { device });
        match lock(&self.script).barrier_failure.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
