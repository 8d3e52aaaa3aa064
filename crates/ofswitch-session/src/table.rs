//! Per-connection transaction table.
//!
//! # Architecture
//!
//! ```text
//!   RequestIssuer ──register──▶ ┌──────────────────────────────┐
//!                               │ TransactionTable             │
//!                               │  DashMap<xid, PendingEntry>  │
//!   inbound dispatcher ─complete▶│  next_xid / next_seq        │
//!   disconnect ─────────close──▶ │  closed                     │
//!                               └──────────────────────────────┘
//!                                        │ oneshot
//!                                        ▼
//!                                  PendingReply (caller)
//! ```
//!
//! Every entry is removed from the map before its result slot is filled, so
//! an entry can only be completed once: whichever path removes it wins and
//! every later completion for the same xid finds nothing and is discarded.
//!
//! Xids wrap around after `u32::MAX`. Allocation skips any xid that is still
//! outstanding. Barrier ordering uses a separate 64-bit issue sequence that
//! never wraps in practice. The sequence only reflects wire order if callers
//! serialize registration with submission; [`RequestIssuer`] does.
//!
//! [`RequestIssuer`]: crate::RequestIssuer

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::{SessionError, SessionResult};
use crate::message::{MessageKind, Reply, ReplyPolicy};
use crate::xid::TransactionId;

/// Receiving half of a pending request's result slot.
pub type ReplySlot = oneshot::Receiver<SessionResult<Reply>>;

struct PendingEntry {
    sender: oneshot::Sender<SessionResult<Reply>>,
    kind: MessageKind,
    policy: ReplyPolicy,
    seq: u64,
    issued_at: Instant,
}

impl PendingEntry {
    fn finish(self, xid: TransactionId, result: SessionResult<Reply>) {
        if self.sender.send(result).is_err() {
            trace!(%xid, kind = %self.kind, "caller dropped pending reply");
        }
    }
}

#[derive(Debug, Default)]
struct TableCounters {
    issued: AtomicU64,
    completed: AtomicU64,
    implied: AtomicU64,
    discarded: AtomicU64,
    failed_on_close: AtomicU64,
    timed_out: AtomicU64,
}

/// Snapshot of transaction table statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableStats {
    /// Number of transaction ids allocated.
    pub issued: u64,
    /// Number of entries completed by an explicit reply or error.
    pub completed: u64,
    /// Number of entries completed by a later barrier reply.
    pub implied: u64,
    /// Number of replies discarded for unknown transaction ids.
    pub discarded: u64,
    /// Number of entries failed because the connection closed.
    pub failed_on_close: u64,
    /// Number of entries failed by timeout or expiry.
    pub timed_out: u64,
}

/// Maps outstanding transaction ids to their result slots.
pub struct TransactionTable {
    pending: DashMap<TransactionId, PendingEntry>,
    next_xid: AtomicU32,
    next_seq: AtomicU64,
    closed: AtomicBool,
    counters: TableCounters,
}

impl std::fmt::Debug for TransactionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionTable")
            .field("outstanding", &self.pending.len())
            .field("next_xid", &self.next_xid.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for TransactionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionTable {
    /// Creates an empty table whose first xid is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates an empty table whose first xid is `first_xid`.
    pub fn starting_at(first_xid: u32) -> Self {
        Self {
            pending: DashMap::new(),
            next_xid: AtomicU32::new(first_xid),
            next_seq: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            counters: TableCounters::default(),
        }
    }

    /// Allocates a transaction id and registers a result slot for it.
    ///
    /// Fails with [`SessionError::Shutdown`] once the table is closed. A
    /// registration that races with [`close`](Self::close) is withdrawn
    /// again, so it can never be left pending.
    pub fn register(
        &self,
        kind: MessageKind,
        policy: ReplyPolicy,
    ) -> SessionResult<(TransactionId, ReplySlot)> {
        if self.is_closed() {
            return Err(SessionError::Shutdown);
        }

        let (sender, receiver) = oneshot::channel();
        let entry = PendingEntry {
            sender,
            kind,
            policy,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            issued_at: Instant::now(),
        };

        let xid = self.insert_vacant(entry)?;
        if self.is_closed() {
            self.pending.remove(&xid);
            return Err(SessionError::Shutdown);
        }
        self.counters.issued.fetch_add(1, Ordering::Relaxed);

        trace!(%xid, %kind, "registered transaction");
        Ok((xid, receiver))
    }

    fn insert_vacant(&self, entry: PendingEntry) -> SessionResult<TransactionId> {
        if self.pending.len() >= u32::MAX as usize {
            return Err(SessionError::XidExhausted);
        }
        for _ in 0..=u32::MAX {
            let xid = TransactionId::new(self.next_xid.fetch_add(1, Ordering::Relaxed));
            match self.pending.entry(xid) {
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                    return Ok(xid);
                }
                Entry::Occupied(_) => {
                    debug!(%xid, "xid still outstanding after wrap, skipping");
                }
            }
        }
        Err(SessionError::XidExhausted)
    }

    /// Completes the entry for `xid` with `result`.
    ///
    /// Returns false if no entry was outstanding (duplicate or unmatched
    /// reply); the result is then discarded.
    pub fn complete(&self, xid: TransactionId, result: SessionResult<Reply>) -> bool {
        match self.pending.remove(&xid) {
            Some((_, entry)) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                entry.finish(xid, result);
                true
            }
            None => {
                self.counters.discarded.fetch_add(1, Ordering::Relaxed);
                debug!(%xid, "discarding reply for unknown transaction");
                false
            }
        }
    }

    /// Completes a barrier and every earlier barrier-acknowledged entry.
    ///
    /// Entries registered with [`ReplyPolicy::ImpliedByBarrier`] before the
    /// barrier complete successfully first, then the barrier itself. Returns
    /// the number of implied completions, or `None` if the barrier xid was
    /// not outstanding.
    pub fn complete_barrier(&self, xid: TransactionId) -> Option<usize> {
        let Some((_, barrier)) = self.pending.remove(&xid) else {
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(%xid, "discarding barrier reply for unknown transaction");
            return None;
        };

        let barrier_seq = barrier.seq;
        let implied: Vec<TransactionId> = self
            .pending
            .iter()
            .filter(|e| e.policy == ReplyPolicy::ImpliedByBarrier && e.seq < barrier_seq)
            .map(|e| *e.key())
            .collect();

        let mut count = 0;
        for earlier in implied {
            if let Some((_, entry)) = self.pending.remove(&earlier) {
                entry.finish(earlier, Ok(Reply::implied(earlier)));
                count += 1;
            }
        }

        self.counters
            .implied
            .fetch_add(count as u64, Ordering::Relaxed);
        self.counters.completed.fetch_add(1, Ordering::Relaxed);
        barrier.finish(xid, Ok(Reply::new(xid, Vec::new())));

        trace!(%xid, implied = count, "barrier completed");
        Some(count)
    }

    /// Removes an entry without completing it.
    ///
    /// Used by a caller that stopped waiting for its own reply.
    pub fn cancel(&self, xid: TransactionId) -> bool {
        self.pending.remove(&xid).is_some()
    }

    /// Fails every outstanding entry with `error`. Returns how many failed.
    pub fn fail_all(&self, error: SessionError) -> usize {
        let xids: Vec<TransactionId> = self.pending.iter().map(|e| *e.key()).collect();
        let mut count = 0;
        for xid in xids {
            if let Some((_, entry)) = self.pending.remove(&xid) {
                entry.finish(xid, Err(error.clone()));
                count += 1;
            }
        }
        if count > 0 {
            self.counters
                .failed_on_close
                .fetch_add(count as u64, Ordering::Relaxed);
        }
        count
    }

    /// Stops accepting registrations and fails everything outstanding
    /// with [`SessionError::ConnectionLost`].
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        let failed = self.fail_all(SessionError::ConnectionLost);
        if failed > 0 {
            warn!(failed, "connection closed with outstanding transactions");
        }
        failed
    }

    /// Fails entries that have been outstanding for at least `max_age`.
    pub fn expire(&self, max_age: Duration) -> Vec<TransactionId> {
        let now = Instant::now();
        let stale: Vec<TransactionId> = self
            .pending
            .iter()
            .filter(|e| now.saturating_duration_since(e.issued_at) >= max_age)
            .map(|e| *e.key())
            .collect();

        let mut expired = Vec::with_capacity(stale.len());
        for xid in stale {
            if let Some((_, entry)) = self.pending.remove(&xid) {
                entry.finish(xid, Err(SessionError::Timeout { xid }));
                expired.push(xid);
            }
        }
        if !expired.is_empty() {
            self.counters
                .timed_out
                .fetch_add(expired.len() as u64, Ordering::Relaxed);
            warn!(count = expired.len(), "expired unanswered transactions");
        }
        expired
    }

    pub(crate) fn note_timeout(&self) {
        self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns true if `xid` is outstanding.
    pub fn contains(&self, xid: TransactionId) -> bool {
        self.pending.contains_key(&xid)
    }

    /// Number of outstanding entries.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of the table counters.
    pub fn stats(&self) -> TableStats {
        TableStats {
            issued: self.counters.issued.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            implied: self.counters.implied.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
            failed_on_close: self.counters.failed_on_close.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn register_flow_mod(table: &TransactionTable) -> (TransactionId, ReplySlot) {
        table
            .register(MessageKind::FlowMod, ReplyPolicy::ImpliedByBarrier)
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_and_complete() {
        let table = TransactionTable::new();
        let (xid, slot) = table
            .register(MessageKind::Echo, ReplyPolicy::Explicit)
            .unwrap();
        assert_eq!(xid, TransactionId::new(1));
        assert_eq!(table.outstanding(), 1);

        assert!(table.complete(xid, Ok(Reply::new(xid, b"pong".to_vec()))));
        let reply = slot.await.unwrap().unwrap();
        assert_eq!(reply.payload, b"pong".to_vec());
        assert_eq!(table.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_completion_is_discarded() {
        let table = TransactionTable::new();
        let (xid, slot) = register_flow_mod(&table);

        assert!(table.complete(xid, Err(SessionError::ConnectionLost)));
        assert!(!table.complete(xid, Ok(Reply::new(xid, Vec::new()))));

        assert_eq!(slot.await.unwrap(), Err(SessionError::ConnectionLost));
        assert_eq!(table.stats().discarded, 1);
    }

    #[test]
    fn test_unknown_xid_is_discarded() {
        let table = TransactionTable::new();
        assert!(!table.complete(TransactionId::new(99), Err(SessionError::ConnectionLost)));
        assert_eq!(table.complete_barrier(TransactionId::new(100)), None);
        assert_eq!(table.stats().discarded, 2);
    }

    #[test]
    fn test_xids_are_monotonic() {
        let table = TransactionTable::new();
        let xids: Vec<u32> = (0..5).map(|_| register_flow_mod(&table).0.as_u32()).collect();
        assert_eq!(xids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_wraparound_skips_outstanding_xid() {
        let table = TransactionTable::starting_at(0);
        let (zero, _slot0) = register_flow_mod(&table);
        assert_eq!(zero.as_u32(), 0);

        table.next_xid.store(u32::MAX, Ordering::Relaxed);
        let (max, _slot_max) = register_flow_mod(&table);
        assert_eq!(max.as_u32(), u32::MAX);

        // 0 is still outstanding, so allocation moves on to 1
        let (next, _slot_next) = register_flow_mod(&table);
        assert_eq!(next.as_u32(), 1);
    }

    #[tokio::test]
    async fn test_barrier_completes_earlier_implied_entries() {
        let table = TransactionTable::new();
        let (flow1, slot1) = register_flow_mod(&table);
        let (echo, _echo_slot) = table
            .register(MessageKind::Echo, ReplyPolicy::Explicit)
            .unwrap();
        let (barrier, barrier_slot) = table
            .register(MessageKind::Barrier, ReplyPolicy::Explicit)
            .unwrap();
        let (flow2, _slot2) = register_flow_mod(&table);

        assert_eq!(table.complete_barrier(barrier), Some(1));

        let reply = slot1.await.unwrap().unwrap();
        assert_eq!(reply, Reply::implied(flow1));
        assert!(!barrier_slot.await.unwrap().unwrap().implied);

        // explicit and later entries stay pending
        assert!(table.contains(echo));
        assert!(table.contains(flow2));
        assert_eq!(table.stats().implied, 1);
    }

    #[tokio::test]
    async fn test_close_fails_outstanding_and_rejects_new() {
        let table = TransactionTable::new();
        let (_a, slot_a) = register_flow_mod(&table);
        let (_b, slot_b) = register_flow_mod(&table);

        assert_eq!(table.close(), 2);
        assert_eq!(slot_a.await.unwrap(), Err(SessionError::ConnectionLost));
        assert_eq!(slot_b.await.unwrap(), Err(SessionError::ConnectionLost));

        let err = table
            .register(MessageKind::FlowMod, ReplyPolicy::ImpliedByBarrier)
            .unwrap_err();
        assert_eq!(err, SessionError::Shutdown);
        assert_eq!(table.stats().failed_on_close, 2);
    }

    #[tokio::test]
    async fn test_expire_fails_old_entries() {
        let table = TransactionTable::new();
        let (xid, slot) = register_flow_mod(&table);

        assert!(table.expire(Duration::from_secs(3600)).is_empty());
        assert_eq!(table.expire(Duration::ZERO), vec![xid]);
        assert_eq!(slot.await.unwrap(), Err(SessionError::Timeout { xid }));
    }

    #[test]
    fn test_cancel_removes_without_completion() {
        let table = TransactionTable::new();
        let (xid, _slot) = register_flow_mod(&table);
        assert!(table.cancel(xid));
        assert!(!table.cancel(xid));
        assert_eq!(table.outstanding(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration_yields_unique_xids() {
        let table = Arc::new(TransactionTable::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let table = Arc::clone(&table);
            handles.push(tokio::spawn(async move {
                (0..250)
                    .map(|_| {
                        table
                            .register(MessageKind::FlowMod, ReplyPolicy::ImpliedByBarrier)
                            .map(|(xid, _)| xid)
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 2000);
        assert_eq!(table.outstanding(), 2000);
    }

    #[test]
    fn test_issued_counts_only_accepted_registrations() {
        let table = Arc::new(TransactionTable::new());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    (0..500)
                        .filter(|_| {
                            table
                                .register(MessageKind::FlowMod, ReplyPolicy::ImpliedByBarrier)
                                .is_ok()
                        })
                        .count()
                })
            })
            .collect();

        std::thread::sleep(Duration::from_millis(1));
        table.close();
        let accepted: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();

        // registrations withdrawn by a racing close are not counted
        assert_eq!(table.stats().issued, accepted as u64);
        assert!(matches!(
            table.register(MessageKind::Barrier, ReplyPolicy::Explicit),
            Err(SessionError::Shutdown)
        ));
        assert_eq!(table.stats().issued, accepted as u64);
    }
}
