//! Outbound transport seam.
//!
//! The correlation layer never writes to a socket. It hands each encoded
//! request, tagged with its xid, to a [`Transport`]. The connection's writer
//! task owns the other end.

use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{SessionError, SessionResult};
use crate::message::OutboundMessage;
use crate::xid::TransactionId;

/// Accepts encoded requests for transmission.
///
/// `submit` must not block; the issuer calls it while returning a handle to
/// its caller.
pub trait Transport: Send + Sync {
    fn submit(&self, xid: TransactionId, message: &OutboundMessage) -> SessionResult<()>;
}

/// A request queued for the connection writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub xid: TransactionId,
    pub message: OutboundMessage,
}

/// Transport backed by a bounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: mpsc::Sender<OutboundFrame>,
}

impl ChannelTransport {
    /// Creates a transport and the receiver the connection writer drains.
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<OutboundFrame>) {
        let (sender, receiver) = mpsc::channel(depth);
        (Self { sender }, receiver)
    }
}

impl Transport for ChannelTransport {
    fn submit(&self, xid: TransactionId, message: &OutboundMessage) -> SessionResult<()> {
        let frame = OutboundFrame {
            xid,
            message: message.clone(),
        };
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                warn!(%xid, "outbound queue full");
                SessionError::transport("outbound queue full")
            }
            mpsc::error::TrySendError::Closed(_) => SessionError::ConnectionLost,
        })
    }
}
