//! Single-item entity RPCs on top of device sessions.
//!
//! Each operation is encoded by an [`EntityCodec`], issued on the device's
//! session and awaited. Modification messages are acknowledged by the next
//! barrier reply, or fail with the device's error for their xid.

use std::sync::Arc;

use async_trait::async_trait;
use ofswitch_session::{MessageKind, OutboundMessage, SessionError, SessionRegistry, SessionResult};
use ofswitch_types::{DeviceRef, FlowEntry, GroupEntry, MeterEntry};
use serde::Serialize;
use tracing::trace;

use crate::services::EntityRpcs;

/// A single-item operation before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum EntityRequest<'a> {
    AddFlow {
        flow: &'a FlowEntry,
    },
    RemoveFlow {
        flow: &'a FlowEntry,
    },
    UpdateFlow {
        original: &'a FlowEntry,
        updated: &'a FlowEntry,
    },
    AddGroup {
        group: &'a GroupEntry,
    },
    RemoveGroup {
        group: &'a GroupEntry,
    },
    UpdateGroup {
        original: &'a GroupEntry,
        updated: &'a GroupEntry,
    },
    AddMeter {
        meter: &'a MeterEntry,
    },
    RemoveMeter {
        meter: &'a MeterEntry,
    },
    UpdateMeter {
        original: &'a MeterEntry,
        updated: &'a MeterEntry,
    },
}

impl EntityRequest<'_> {
    pub fn message_kind(&self) -> MessageKind {
        match self {
            EntityRequest::AddFlow { .. }
            | EntityRequest::RemoveFlow { .. }
            | EntityRequest::UpdateFlow { .. } => MessageKind::FlowMod,
            EntityRequest::AddGroup { .. }
            | EntityRequest::RemoveGroup { .. }
            | EntityRequest::UpdateGroup { .. } => MessageKind::GroupMod,
            EntityRequest::AddMeter { .. }
            | EntityRequest::RemoveMeter { .. }
            | EntityRequest::UpdateMeter { .. } => MessageKind::MeterMod,
        }
    }
}

/// Turns entity requests into message bodies.
pub trait EntityCodec: Send + Sync {
    fn encode(&self, request: &EntityRequest<'_>) -> SessionResult<Vec<u8>>;
}

/// Encodes requests as JSON documents tagged with a `command` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl EntityCodec for JsonCodec {
    fn encode(&self, request: &EntityRequest<'_>) -> SessionResult<Vec<u8>> {
        serde_json::to_vec(request)
            .map_err(|e| SessionError::validation(format!("failed to encode request: {}", e)))
    }
}

/// [`EntityRpcs`] backed by the sessions of a [`SessionRegistry`].
pub struct SessionEntityRpcs<C = JsonCodec> {
    registry: Arc<SessionRegistry>,
    codec: C,
}

impl<C> std::fmt::Debug for SessionEntityRpcs<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEntityRpcs")
            .field("sessions", &self.registry.len())
            .finish()
    }
}

impl<C: EntityCodec> SessionEntityRpcs<C> {
    pub fn new(registry: Arc<SessionRegistry>, codec: C) -> Self {
        Self { registry, codec }
    }

    async fn send(&self, device: DeviceRef, request: EntityRequest<'_>) -> SessionResult<()> {
        let session = self.registry.get(device)?;
        let payload = self.codec.encode(&request)?;
        let pending = session.issue(OutboundMessage::new(request.message_kind(), payload))?;
        trace!(%device, xid = %pending.xid(), kind = %request.message_kind(), "issued");
        pending.await.map(|_| ())
    }
}

#[async_trait]
impl<C: EntityCodec> EntityRpcs for SessionEntityRpcs<C> {
    async fn add_flow(&self, device: DeviceRef, flow: &FlowEntry) -> SessionResult<()> {
        self.send(device, EntityRequest::AddFlow { flow }).await
    }

    async fn remove_flow(&self, device: DeviceRef, flow: &FlowEntry) -> SessionResult<()> {
        self.send(device, EntityRequest::RemoveFlow { flow }).await
    }

    async fn update_flow(
        &self,
        device: DeviceRef,
        original: &FlowEntry,
        updated: &FlowEntry,
    ) -> SessionResult<()> {
        self.send(device, EntityRequest::UpdateFlow { original, updated })
            .await
    }

    async fn add_group(&self, device: DeviceRef, group: &GroupEntry) -> SessionResult<()> {
        self.send(device, EntityRequest::AddGroup { group }).await
    }

    async fn remove_group(&self, device: DeviceRef, group: &GroupEntry) -> SessionResult<()> {
        self.send(device, EntityRequest::RemoveGroup { group }).await
    }

    async fn update_group(
        &self,
        device: DeviceRef,
        original: &GroupEntry,
        updated: &GroupEntry,
    ) -> SessionResult<()> {
        self.send(device, EntityRequest::UpdateGroup { original, updated })
            .await
    }

    async fn add_meter(&self, device: DeviceRef, meter: &MeterEntry) -> SessionResult<()> {
        self.send(device, EntityRequest::AddMeter { meter }).await
    }

    async fn remove_meter(&self, device: DeviceRef, meter: &MeterEntry) -> SessionResult<()> {
        self.send(device, EntityRequest::RemoveMeter { meter }).await
    }

    async fn update_meter(
        &self,
        device: DeviceRef,
        original: &MeterEntry,
        updated: &MeterEntry,
    ) -> SessionResult<()> {
        self.send(device, EntityRequest::UpdateMeter { original, updated })
            .await
    }

    async fn send_barrier(&self, device: DeviceRef) -> SessionResult<()> {
        let session = self.registry.get(device)?;
        session.send_barrier()?.await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofswitch_types::{FlowId, GroupId, GroupType, MeterId};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_kinds() {
        let flow = FlowEntry::new(FlowId::new("f1").unwrap());
        let group = GroupEntry::new(GroupId::new(1).unwrap(), GroupType::All);
        let meter = MeterEntry::new(MeterId::new(1).unwrap());

        assert_eq!(
            EntityRequest::UpdateFlow {
                original: &flow,
                updated: &flow
            }
            .message_kind(),
            MessageKind::FlowMod
        );
        assert_eq!(
            EntityRequest::RemoveGroup { group: &group }.message_kind(),
            MessageKind::GroupMod
        );
        assert_eq!(
            EntityRequest::AddMeter { meter: &meter }.message_kind(),
            MessageKind::MeterMod
        );
    }

    #[test]
    fn test_json_codec_tags_command() {
        let flow = FlowEntry::new(FlowId::new("f1").unwrap()).with_priority(7);
        let bytes = JsonCodec
            .encode(&EntityRequest::RemoveFlow { flow: &flow })
            .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["command"], "remove-flow");
        assert_eq!(value["flow"]["id"], "f1");
        assert_eq!(value["flow"]["priority"], 7);
    }

    #[tokio::test]
    async fn test_unknown_device_not_connected() {
        let rpcs = SessionEntityRpcs::new(Arc::new(SessionRegistry::new()), JsonCodec);
        let flow = FlowEntry::new(FlowId::new("f1").unwrap());

        let err = rpcs.add_flow(DeviceRef::new(9), &flow).await.unwrap_err();
        assert_eq!(err, SessionError::not_connected(DeviceRef::new(9)));

        let err = rpcs.send_barrier(DeviceRef::new(9)).await.unwrap_err();
        assert!(err.is_local());
    }
}
