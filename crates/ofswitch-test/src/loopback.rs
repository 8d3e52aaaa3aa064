//! Loopback device
//!
//! Starts a real [`DeviceSession`] and answers its outbound frames the way a
//! switch would: modifications are silent unless rejected, barriers get a
//! barrier reply, everything else gets an explicit reply.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use ofswitch_session::{
    DeviceErrorType, DeviceSession, InboundMessage, MessageKind, OutboundFrame, ReplyPolicy,
    SessionConfig, SessionResult, TransactionId,
};
use ofswitch_types::DeviceRef;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// How the loopback device answers.
#[derive(Debug, Clone)]
pub struct LoopbackBehavior {
    /// Entity ids, as they appear in the encoded request, to reject.
    pub rejected_ids: HashSet<String>,
    /// When false, barriers are never answered.
    pub answer_barriers: bool,
}

impl Default for LoopbackBehavior {
    fn default() -> Self {
        Self {
            rejected_ids: HashSet::new(),
            answer_barriers: true,
        }
    }
}

impl LoopbackBehavior {
    /// Rejects every request naming `id` with a device error.
    pub fn reject(mut self, id: impl Into<String>) -> Self {
        self.rejected_ids.insert(id.into());
        self
    }

    pub fn silent_barriers(mut self) -> Self {
        self.answer_barriers = false;
        self
    }
}

/// A session wired to an in-process fake switch.
pub struct LoopbackDevice {
    session: Arc<DeviceSession>,
    frames: Arc<Mutex<Vec<(TransactionId, MessageKind)>>>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for LoopbackDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackDevice")
            .field("session", &self.session)
            .finish()
    }
}

impl LoopbackDevice {
    /// Starts a session for `device` and the task answering it.
    pub fn start(
        device: DeviceRef,
        config: SessionConfig,
        behavior: LoopbackBehavior,
    ) -> SessionResult<Self> {
        let (session, io) = DeviceSession::start(device, config)?;
        let frames = Arc::new(Mutex::new(Vec::new()));
        let task = tokio::spawn(answer(
            io.outbound,
            io.inbound,
            behavior,
            Arc::clone(&frames),
        ));
        Ok(Self {
            session,
            frames,
            task,
        })
    }

    pub fn session(&self) -> &Arc<DeviceSession> {
        &self.session
    }

    /// Frames received so far, in arrival order.
    pub fn frames(&self) -> Vec<(TransactionId, MessageKind)> {
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of frames of `kind` received so far.
    pub fn frame_count(&self, kind: MessageKind) -> usize {
        self.frames().iter().filter(|(_, k)| *k == kind).count()
    }

    /// Drops the connection; the session closes once its dispatcher
    /// notices.
    pub fn disconnect(&self) {
        self.task.abort();
    }
}

impl Drop for LoopbackDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn answer(
    mut outbound: mpsc::Receiver<OutboundFrame>,
    inbound: mpsc::Sender<InboundMessage>,
    behavior: LoopbackBehavior,
    frames: Arc<Mutex<Vec<(TransactionId, MessageKind)>>>,
) {
    while let Some(frame) = outbound.recv().await {
        let xid = frame.xid;
        let message = frame.message;
        frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((xid, message.kind));

        let reply = if message.kind == MessageKind::Barrier {
            behavior
                .answer_barriers
                .then_some(InboundMessage::BarrierReply { xid })
        } else if let Some(id) = rejected_id(&message.payload, &behavior.rejected_ids) {
            Some(InboundMessage::Error {
                xid,
                err_type: error_type(message.kind).as_raw(),
                code: 0,
                data: format!("{}-rejected", id).into_bytes(),
            })
        } else if message.policy == ReplyPolicy::Explicit {
            Some(InboundMessage::Reply {
                xid,
                payload: Vec::new(),
            })
        } else {
            None
        };

        if let Some(reply) = reply {
            debug!(%xid, "loopback reply");
            if inbound.send(reply).await.is_err() {
                break;
            }
        }
    }
}

fn error_type(kind: MessageKind) -> DeviceErrorType {
    match kind {
        MessageKind::FlowMod => DeviceErrorType::FlowModFailed,
        MessageKind::GroupMod => DeviceErrorType::GroupModFailed,
        MessageKind::MeterMod => DeviceErrorType::MeterModFailed,
        _ => DeviceErrorType::BadRequest,
    }
}

/// Finds a rejected id in a JSON-encoded entity request.
fn rejected_id(payload: &[u8], rejected: &HashSet<String>) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    ["flow", "group", "meter", "updated"]
        .iter()
        .filter_map(|field| value.get(*field)?.get("id"))
        .map(|id| match id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .find(|id| rejected.contains(id))
}
