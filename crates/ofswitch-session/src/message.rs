//! Outbound requests and inbound replies as seen by the correlation layer.
//!
//! Payloads are already encoded; this layer never looks inside them. It only
//! needs the message kind (to pick a reply policy and to validate) and, on the
//! inbound side, the transaction id the reply belongs to.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DeviceErrorType, SessionError};
use crate::xid::TransactionId;

/// Size of the fixed message header that precedes every payload.
pub const HEADER_LEN: usize = 8;

/// Kind of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    FlowMod,
    GroupMod,
    MeterMod,
    Barrier,
    Echo,
    MultipartRequest,
    Experimenter,
}

impl MessageKind {
    /// Reply policy the device applies to this kind of request.
    ///
    /// Modification messages are only answered on error; success is
    /// confirmed by a later barrier reply.
    pub fn default_policy(&self) -> ReplyPolicy {
        match self {
            MessageKind::FlowMod | MessageKind::GroupMod | MessageKind::MeterMod => {
                ReplyPolicy::ImpliedByBarrier
            }
            _ => ReplyPolicy::Explicit,
        }
    }

    /// Returns true if requests of this kind carry no body.
    pub fn is_bodyless(&self) -> bool {
        matches!(self, MessageKind::Barrier)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::FlowMod => "flow-mod",
            MessageKind::GroupMod => "group-mod",
            MessageKind::MeterMod => "meter-mod",
            MessageKind::Barrier => "barrier",
            MessageKind::Echo => "echo",
            MessageKind::MultipartRequest => "multipart-request",
            MessageKind::Experimenter => "experimenter",
        };
        f.write_str(s)
    }
}

/// How a pending request learns that it succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplyPolicy {
    /// The device sends a reply carrying the same transaction id.
    Explicit,
    /// The device only replies on error; a barrier reply for a later
    /// request completes this one successfully.
    ImpliedByBarrier,
}

/// An encoded request ready to be handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub kind: MessageKind,
    pub policy: ReplyPolicy,
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    /// Creates a message using the kind's default reply policy.
    pub fn new(kind: MessageKind, payload: Vec<u8>) -> Self {
        Self {
            kind,
            policy: kind.default_policy(),
            payload,
        }
    }

    /// Creates a barrier request.
    pub fn barrier() -> Self {
        Self::new(MessageKind::Barrier, Vec::new())
    }

    /// Overrides the reply policy.
    pub fn with_policy(mut self, policy: ReplyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Length of the message on the wire, header included.
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}

/// Successful completion of a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub xid: TransactionId,
    pub payload: Vec<u8>,
    /// True when success was inferred from a later barrier reply.
    pub implied: bool,
}

impl Reply {
    pub fn new(xid: TransactionId, payload: Vec<u8>) -> Self {
        Self {
            xid,
            payload,
            implied: false,
        }
    }

    pub fn implied(xid: TransactionId) -> Self {
        Self {
            xid,
            payload: Vec::new(),
            implied: true,
        }
    }
}

/// A decoded message received from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Positive reply to an explicit request.
    Reply { xid: TransactionId, payload: Vec<u8> },
    /// Error message referencing the failed request.
    Error {
        xid: TransactionId,
        err_type: u16,
        code: u16,
        data: Vec<u8>,
    },
    /// Reply to a barrier request.
    BarrierReply { xid: TransactionId },
}

impl InboundMessage {
    pub fn xid(&self) -> TransactionId {
        match self {
            InboundMessage::Reply { xid, .. }
            | InboundMessage::Error { xid, .. }
            | InboundMessage::BarrierReply { xid } => *xid,
        }
    }

    /// Converts an error message into the session error handed to the caller.
    pub fn to_error(err_type: u16, code: u16, data: &[u8]) -> SessionError {
        SessionError::device(
            DeviceErrorType::from_raw(err_type),
            code,
            String::from_utf8_lossy(data).into_owned(),
        )
    }
}
