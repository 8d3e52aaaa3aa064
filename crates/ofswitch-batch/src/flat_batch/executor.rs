//! Batch executor.
//!
//! Drives a plan one step at a time. A step starts only after the previous
//! step, including its barrier, has finished.

use ofswitch_types::DeviceRef;
use tracing::{debug, warn};

use super::planner::{BatchPlan, PlanStep, StepTasks};
use super::types::BatchResult;
use crate::typed::{TypedBatchOutput, TypedBatchRpcs};

/// Step counts of one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionTally {
    pub steps_executed: u64,
    pub steps_skipped: u64,
    pub barriers: u64,
}

/// Sequential driver over the steps of a plan.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    rpcs: TypedBatchRpcs,
}

impl BatchExecutor {
    pub fn new(rpcs: TypedBatchRpcs) -> Self {
        Self { rpcs }
    }

    /// Runs `plan` and returns the aggregated result.
    ///
    /// With `exit_on_first_error`, steps after the first failing one are
    /// skipped without invoking their RPC. The step that failed still runs
    /// to completion.
    pub async fn execute(
        &self,
        device: DeviceRef,
        plan: BatchPlan,
        exit_on_first_error: bool,
    ) -> BatchResult {
        self.execute_tallied(device, plan, exit_on_first_error)
            .await
            .0
    }

    pub(crate) async fn execute_tallied(
        &self,
        device: DeviceRef,
        plan: BatchPlan,
        exit_on_first_error: bool,
    ) -> (BatchResult, ExecutionTally) {
        let mut result = BatchResult::new();
        let mut tally = ExecutionTally::default();

        for (index, step) in plan.into_iter().enumerate() {
            if exit_on_first_error && !result.is_success() {
                debug!(step = index, rpc = %step.rpc(), "skipping step after failure");
                tally.steps_skipped += 1;
                continue;
            }

            if cfg!(debug_assertions) && !step.is_dense() {
                warn!(
                    step = index,
                    offset = step.offset,
                    orders = ?step.tasks.batch_orders(),
                    "step batch orders do not follow its offset"
                );
            }

            debug!(
                step = index,
                rpc = %step.rpc(),
                tasks = step.len(),
                barrier_after = step.barrier_after,
                "executing step"
            );
            if step.barrier_after {
                tally.barriers += 1;
            }
            tally.steps_executed += 1;

            let output = self.invoke(device, step).await;
            if !output.is_success() {
                debug!(
                    step = index,
                    failures = output.failures.len(),
                    errors = output.errors.len(),
                    "step failed"
                );
            }
            result.merge(output);
        }

        (result, tally)
    }

    async fn invoke(&self, device: DeviceRef, step: PlanStep) -> TypedBatchOutput {
        let barrier = step.barrier_after;
        let rpcs = &self.rpcs;
        match step.tasks {
            StepTasks::AddFlows(tasks) => rpcs.add_flows_batch(device, tasks, barrier).await,
            StepTasks::RemoveFlows(tasks) => rpcs.remove_flows_batch(device, tasks, barrier).await,
            StepTasks::UpdateFlows(tasks) => rpcs.update_flows_batch(device, tasks, barrier).await,
            StepTasks::AddGroups(tasks) => rpcs.add_groups_batch(device, tasks, barrier).await,
            StepTasks::RemoveGroups(tasks) => {
                rpcs.remove_groups_batch(device, tasks, barrier).await
            }
            StepTasks::UpdateGroups(tasks) => {
                rpcs.update_groups_batch(device, tasks, barrier).await
            }
            StepTasks::AddMeters(tasks) => rpcs.add_meters_batch(device, tasks, barrier).await,
            StepTasks::RemoveMeters(tasks) => {
                rpcs.remove_meters_batch(device, tasks, barrier).await
            }
            StepTasks::UpdateMeters(tasks) => {
                rpcs.update_meters_batch(device, tasks, barrier).await
            }
        }
    }
}
