//! Request issuer.
//!
//! `issue` is the single entry point single-item operations use to reach the
//! device. It validates the request, allocates an xid, registers the result
//! slot and submits the message, all without awaiting. The returned
//! [`PendingReply`] resolves once the inbound dispatcher completes the xid.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, warn};

use crate::error::{SessionError, SessionResult};
use crate::message::{OutboundMessage, Reply};
use crate::table::{ReplySlot, TransactionTable};
use crate::transport::Transport;
use crate::xid::TransactionId;

/// Handle to an issued request.
///
/// Await it (or call [`wait`](Self::wait)) to obtain the reply.
pub struct PendingReply {
    xid: TransactionId,
    slot: ReplySlot,
    timeout: Option<Duration>,
    table: Arc<TransactionTable>,
}

impl std::fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply")
            .field("xid", &self.xid)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PendingReply {
    pub fn xid(&self) -> TransactionId {
        self.xid
    }

    /// Waits for the reply.
    ///
    /// With a timeout configured, an unanswered request is withdrawn from
    /// the table once the timeout elapses and fails with
    /// [`SessionError::Timeout`].
    pub async fn wait(self) -> SessionResult<Reply> {
        let PendingReply {
            xid,
            mut slot,
            timeout,
            table,
        } = self;

        let received = match timeout {
            None => (&mut slot).await,
            Some(limit) => match tokio::time::timeout(limit, &mut slot).await {
                Ok(received) => received,
                Err(_) => {
                    if table.cancel(xid) {
                        table.note_timeout();
                        warn!(%xid, timeout_ms = limit.as_millis() as u64, "request timed out");
                        return Err(SessionError::Timeout { xid });
                    }
                    // completed between the deadline and the cancel
                    match slot.try_recv() {
                        Ok(result) => Ok(result),
                        Err(TryRecvError::Empty) => return Err(SessionError::Timeout { xid }),
                        Err(TryRecvError::Closed) => return Err(SessionError::ConnectionLost),
                    }
                }
            },
        };

        received.unwrap_or(Err(SessionError::ConnectionLost))
    }
}

impl IntoFuture for PendingReply {
    type Output = SessionResult<Reply>;
    type IntoFuture = Pin<Box<dyn Future<Output = SessionResult<Reply>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

/// Issues requests over one connection.
///
/// Registration and submission happen under one lock, so the table's issue
/// sequence matches the order frames reach the transport. A barrier reply
/// can then only imply requests that were written before the barrier.
#[derive(Clone)]
pub struct RequestIssuer {
    table: Arc<TransactionTable>,
    transport: Arc<dyn Transport>,
    submit_lock: Arc<Mutex<()>>,
    max_message_len: usize,
    request_timeout: Option<Duration>,
}

impl std::fmt::Debug for RequestIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestIssuer")
            .field("table", &self.table)
            .field("max_message_len", &self.max_message_len)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl RequestIssuer {
    pub fn new(
        table: Arc<TransactionTable>,
        transport: Arc<dyn Transport>,
        max_message_len: usize,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            table,
            transport,
            submit_lock: Arc::new(Mutex::new(())),
            max_message_len,
            request_timeout,
        }
    }

    pub fn table(&self) -> &Arc<TransactionTable> {
        &self.table
    }

    /// Issues one request and returns its pending reply immediately.
    ///
    /// Validation failures are reported before an xid is allocated. If the
    /// transport refuses the message, its entry is withdrawn again.
    ///
    /// Concurrent callers are serialized only around registration and
    /// submission, which never await.
    pub fn issue(&self, message: OutboundMessage) -> SessionResult<PendingReply> {
        self.validate(&message)?;

        let (xid, slot) = {
            let _ordered = self
                .submit_lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let (xid, slot) = self.table.register(message.kind, message.policy)?;
            if let Err(e) = self.transport.submit(xid, &message) {
                self.table.cancel(xid);
                debug!(%xid, kind = %message.kind, error = %e, "submit failed");
                return Err(e);
            }
            (xid, slot)
        };

        Ok(PendingReply {
            xid,
            slot,
            timeout: self.request_timeout,
            table: Arc::clone(&self.table),
        })
    }

    /// Issues a barrier request.
    pub fn send_barrier(&self) -> SessionResult<PendingReply> {
        self.issue(OutboundMessage::barrier())
    }

    fn validate(&self, message: &OutboundMessage) -> SessionResult<()> {
        if message.kind.is_bodyless() {
            if !message.payload.is_empty() {
                return Err(SessionError::validation(format!(
                    "{} carries no body",
                    message.kind
                )));
            }
        } else if message.payload.is_empty() {
            return Err(SessionError::validation(format!(
                "{} requires a body",
                message.kind
            )));
        }

        if message.wire_len() > self.max_message_len {
            return Err(SessionError::validation(format!(
                "{} of {} bytes exceeds limit of {}",
                message.kind,
                message.wire_len(),
                self.max_message_len
            )));
        }

        Ok(())
    }
}
