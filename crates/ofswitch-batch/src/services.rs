//! Single-item entity RPCs consumed by the typed batch RPCs.

use async_trait::async_trait;
use ofswitch_session::SessionResult;
use ofswitch_types::{DeviceRef, FlowEntry, GroupEntry, MeterEntry};

/// Single-item operations against one device.
///
/// Each call resolves once the device has acknowledged (or rejected) the
/// operation. `send_barrier` resolves once every operation issued before it
/// on the same connection has been acknowledged.
#[async_trait]
pub trait EntityRpcs: Send + Sync {
    async fn add_flow(&self, device: DeviceRef, flow: &FlowEntry) -> SessionResult<()>;

    async fn remove_flow(&self, device: DeviceRef, flow: &FlowEntry) -> SessionResult<()>;

    async fn update_flow(
        &self,
        device: DeviceRef,
        original: &FlowEntry,
        updated: &FlowEntry,
    ) -> SessionResult<()>;

    async fn add_group(&self, device: DeviceRef, group: &GroupEntry) -> SessionResult<()>;

    async fn remove_group(&self, device: DeviceRef, group: &GroupEntry) -> SessionResult<()>;

    async fn update_group(
        &self,
        device: DeviceRef,
        original: &GroupEntry,
        updated: &GroupEntry,
    ) -> SessionResult<()>;

    async fn add_meter(&self, device: DeviceRef, meter: &MeterEntry) -> SessionResult<()>;

    async fn remove_meter(&self, device: DeviceRef, meter: &MeterEntry) -> SessionResult<()>;

    async fn update_meter(
        &self,
        device: DeviceRef,
        original: &MeterEntry,
        updated: &MeterEntry,
    ) -> SessionResult<()>;

    async fn send_barrier(&self, device: DeviceRef) -> SessionResult<()>;
}
