//! Flat batch service, the top-level entry point.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ofswitch_types::DeviceRef;
use tracing::{info, instrument};

use super::executor::BatchExecutor;
use super::planner::plan;
use super::types::{validate_items, BatchItem, BatchResult, FlatBatchRequest};
use crate::config::BatchConfig;
use crate::error::BatchRpcResult;
use crate::services::EntityRpcs;
use crate::typed::TypedBatchRpcs;

/// Counters accumulated over all processed batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlatBatchStats {
    pub batches: u64,
    pub steps_executed: u64,
    pub steps_skipped: u64,
    pub item_failures: u64,
    pub barriers: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    batches: AtomicU64,
    steps_executed: AtomicU64,
    steps_skipped: AtomicU64,
    item_failures: AtomicU64,
    barriers: AtomicU64,
}

/// Plans and executes flat batches against single-item entity RPCs.
#[derive(Debug)]
pub struct FlatBatchService {
    executor: BatchExecutor,
    config: BatchConfig,
    stats: StatsCounters,
}

impl FlatBatchService {
    pub fn new(rpcs: Arc<dyn EntityRpcs>, config: BatchConfig) -> Self {
        let typed = TypedBatchRpcs::new(rpcs, config.max_concurrent_items);
        Self {
            executor: BatchExecutor::new(typed),
            config,
            stats: StatsCounters::default(),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Processes `items` with the configured barrier placement.
    ///
    /// Returns an error only if the batch is rejected before anything is
    /// sent; device-side failures are reported in the [`BatchResult`].
    pub async fn process_flat_batch(
        &self,
        device: DeviceRef,
        items: Vec<BatchItem>,
        exit_on_first_error: bool,
    ) -> BatchRpcResult<BatchResult> {
        self.run(
            device,
            items,
            exit_on_first_error,
            self.config.barrier_after_groupings,
        )
        .await
    }

    /// Processes a decoded client request.
    pub async fn process(&self, request: FlatBatchRequest) -> BatchRpcResult<BatchResult> {
        let barrier_requested = request
            .barrier_requested
            .unwrap_or(self.config.barrier_after_groupings);
        self.run(
            request.node,
            request.items,
            request.exit_on_first_error,
            barrier_requested,
        )
        .await
    }

    #[instrument(skip(self, items), fields(device = %device, items = items.len()))]
    async fn run(
        &self,
        device: DeviceRef,
        items: Vec<BatchItem>,
        exit_on_first_error: bool,
        barrier_requested: bool,
    ) -> BatchRpcResult<BatchResult> {
        validate_items(&items)?;

        let plan = plan(items, barrier_requested, self.config.dependency_barriers);
        let (result, tally) = self
            .executor
            .execute_tallied(device, plan, exit_on_first_error)
            .await;

        self.stats.batches.fetch_add(1, Ordering::Relaxed);
        self.stats
            .steps_executed
            .fetch_add(tally.steps_executed, Ordering::Relaxed);
        self.stats
            .steps_skipped
            .fetch_add(tally.steps_skipped, Ordering::Relaxed);
        self.stats.barriers.fetch_add(tally.barriers, Ordering::Relaxed);
        self.stats
            .item_failures
            .fetch_add(result.failures.len() as u64, Ordering::Relaxed);

        info!(
            success = result.success,
            failures = result.failures.len(),
            errors = result.errors.len(),
            steps_executed = tally.steps_executed,
            steps_skipped = tally.steps_skipped,
            "flat batch processed"
        );
        Ok(result)
    }

    pub fn stats(&self) -> FlatBatchStats {
        FlatBatchStats {
            batches: self.stats.batches.load(Ordering::Relaxed),
            steps_executed: self.stats.steps_executed.load(Ordering::Relaxed),
            steps_skipped: self.stats.steps_skipped.load(Ordering::Relaxed),
            item_failures: self.stats.item_failures.load(Ordering::Relaxed),
            barriers: self.stats.barriers.load(Ordering::Relaxed),
        }
    }
}
