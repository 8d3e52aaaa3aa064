//! Device session: one connection's table, issuer and inbound dispatch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ofswitch_types::DeviceRef;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, Instrument};

use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::issuer::{PendingReply, RequestIssuer};
use crate::message::{InboundMessage, MessageKind, OutboundMessage, Reply, ReplyPolicy};
use crate::table::{TableStats, TransactionTable};
use crate::transport::{ChannelTransport, OutboundFrame, Transport};
use crate::xid::TransactionId;

/// Channel ends connecting a started session to its connection tasks.
#[derive(Debug)]
pub struct SessionIo {
    /// Requests to be written to the device, in issue order.
    pub outbound: mpsc::Receiver<OutboundFrame>,
    /// Decoded messages read from the device. Dropping this closes the
    /// session.
    pub inbound: mpsc::Sender<InboundMessage>,
}

/// Control-plane session with one device.
///
/// Each session owns its own [`TransactionTable`]; sessions for different
/// devices share nothing.
///
/// Modification messages are only acknowledged through barriers, so the
/// session sends one on its own once `barrier_count_limit` of them are
/// unflushed, or when the barrier scheduler finds any left after
/// `barrier_interval_ms`.
pub struct DeviceSession {
    device: DeviceRef,
    table: Arc<TransactionTable>,
    issuer: RequestIssuer,
    config: SessionConfig,
    unflushed: AtomicUsize,
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("device", &self.device)
            .field("outstanding", &self.table.outstanding())
            .field("closed", &self.table.is_closed())
            .finish()
    }
}

impl DeviceSession {
    /// Creates a session that submits requests through `transport`.
    pub fn new(device: DeviceRef, transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let table = Arc::new(TransactionTable::new());
        let issuer = RequestIssuer::new(
            Arc::clone(&table),
            transport,
            config.max_message_len,
            config.request_timeout(),
        );
        Self {
            device,
            table,
            issuer,
            config,
            unflushed: AtomicUsize::new(0),
        }
    }

    /// Creates a session over a channel transport and spawns its
    /// dispatcher, barrier scheduler and (if configured) expiry sweeper.
    ///
    /// Must be called from within a tokio runtime. Fails without spawning
    /// anything if `config` does not validate.
    pub fn start(
        device: DeviceRef,
        config: SessionConfig,
    ) -> SessionResult<(Arc<Self>, SessionIo)> {
        config.validate()?;

        let (transport, outbound) = ChannelTransport::new(config.outbound_queue_depth);
        let (inbound, inbound_rx) = mpsc::channel(config.inbound_queue_depth);
        let session = Arc::new(Self::new(device, Arc::new(transport), config));

        session.spawn_dispatcher(inbound_rx);
        session.spawn_barrier_scheduler();
        session.spawn_expiry_sweeper();
        info!(%device, "session started");

        Ok((session, SessionIo { outbound, inbound }))
    }

    pub fn device(&self) -> DeviceRef {
        self.device
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn issuer(&self) -> &RequestIssuer {
        &self.issuer
    }

    pub fn table(&self) -> &Arc<TransactionTable> {
        &self.table
    }

    /// Issues a request on this session.
    pub fn issue(&self, message: OutboundMessage) -> SessionResult<PendingReply> {
        if message.kind == MessageKind::Barrier {
            // reset first so requests racing with the barrier are not lost
            let unflushed = self.unflushed.swap(0, Ordering::AcqRel);
            return self.issuer.issue(message).inspect_err(|_| {
                self.unflushed.fetch_add(unflushed, Ordering::AcqRel);
            });
        }

        let implied = message.policy == ReplyPolicy::ImpliedByBarrier;
        let pending = self.issuer.issue(message)?;
        if implied && self.unflushed.fetch_add(1, Ordering::AcqRel) + 1 >= self.config.barrier_count_limit
        {
            self.flush();
        }
        Ok(pending)
    }

    /// Issues a barrier on this session.
    pub fn send_barrier(&self) -> SessionResult<PendingReply> {
        self.issue(OutboundMessage::barrier())
    }

    /// Sends a barrier if barrier-acknowledged requests are unflushed.
    ///
    /// Nobody waits on the barrier itself; its reply only completes the
    /// requests issued before it.
    pub fn flush(&self) -> Option<TransactionId> {
        if self.unflushed.load(Ordering::Relaxed) == 0 {
            return None;
        }
        match self.send_barrier() {
            Ok(pending) => {
                debug!(device = %self.device, xid = %pending.xid(), "flushed with barrier");
                Some(pending.xid())
            }
            Err(e) => {
                debug!(device = %self.device, error = %e, "barrier flush failed");
                None
            }
        }
    }

    /// Routes one inbound message to its pending request.
    ///
    /// Returns false if the message matched nothing and was discarded.
    pub fn on_inbound(&self, message: InboundMessage) -> bool {
        match message {
            InboundMessage::Reply { xid, payload } => {
                self.table.complete(xid, Ok(Reply::new(xid, payload)))
            }
            InboundMessage::Error {
                xid,
                err_type,
                code,
                data,
            } => {
                let error = InboundMessage::to_error(err_type, code, &data);
                debug!(device = %self.device, %xid, %error, "device reported error");
                self.table.complete(xid, Err(error))
            }
            InboundMessage::BarrierReply { xid } => self.table.complete_barrier(xid).is_some(),
        }
    }

    /// Marks the connection as gone; every outstanding request fails.
    pub fn on_disconnect(&self) -> usize {
        let failed = self.table.close();
        info!(device = %self.device, failed, "session closed");
        failed
    }

    pub fn is_closed(&self) -> bool {
        self.table.is_closed()
    }

    pub fn stats(&self) -> TableStats {
        self.table.stats()
    }

    /// Spawns the inbound dispatcher.
    ///
    /// The dispatcher completes requests as messages arrive and closes the
    /// session when the channel closes.
    pub fn spawn_dispatcher(
        self: &Arc<Self>,
        mut inbound: mpsc::Receiver<InboundMessage>,
    ) -> JoinHandle<()> {
        let session = Arc::clone(self);
        let span = info_span!("dispatcher", device = %self.device);
        tokio::spawn(
            async move {
                while let Some(message) = inbound.recv().await {
                    session.on_inbound(message);
                }
                session.on_disconnect();
            }
            .instrument(span),
        )
    }

    /// Spawns the periodic barrier flush. Stops once the session is closed.
    pub fn spawn_barrier_scheduler(self: &Arc<Self>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        let interval = self.config.barrier_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if session.is_closed() {
                    break;
                }
                session.flush();
            }
        })
    }

    /// Spawns the expiry sweeper if a timeout and sweep interval are set.
    ///
    /// The sweeper stops once the session is closed.
    pub fn spawn_expiry_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let interval = self.config.expiry_sweep_interval()?;
        let max_age = self.config.request_timeout()?;
        let table = Arc::clone(&self.table);
        let device = self.device;

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if table.is_closed() {
                    debug!(%device, "expiry sweeper stopping");
                    break;
                }
                table.expire(max_age);
            }
        }))
    }
}
