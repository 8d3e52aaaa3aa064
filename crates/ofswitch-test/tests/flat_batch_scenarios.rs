//! Flat batch scenarios against recording entity RPCs
//!
//! Each test submits a flat batch to a [`FlatBatchService`] whose single-item
//! RPCs are a [`RecordingRpcs`] fake, then checks the aggregated result and
//! exactly which RPCs ran.

use std::sync::Arc;
use std::time::Duration;

use ofswitch_batch::{
    BatchConfig, BatchItemId, BatchRpc, ChainError, EntityKind, EntityOp, ErrorOrigin,
    FlatBatchRequest, FlatBatchService,
};
use ofswitch_session::{DeviceErrorType, SessionError};
use ofswitch_test::{init_tracing, BatchBuilder, RecordingRpcs, ResultVerifier, RpcCall};
use ofswitch_types::{DeviceRef, FlowId, GroupId};
use pretty_assertions::assert_eq;

const DEVICE: DeviceRef = DeviceRef::new(1);

fn flow_id(id: &str) -> BatchItemId {
    BatchItemId::Flow(FlowId::new(id).unwrap())
}

fn service(rpcs: &RecordingRpcs) -> FlatBatchService {
    init_tracing();
    FlatBatchService::new(Arc::new(rpcs.clone()), BatchConfig::default())
}

/// Scenario:
/// 1. Add f1, remove f2, update f3; the removal is rejected
/// 2. Verify one failure at batch order 1 echoing f2
/// 3. Verify add and update ran once and a single barrier closed the run
#[tokio::test]
async fn test_flow_remove_failure_scenario() {
    let rpcs = RecordingRpcs::new().fail(
        flow_id("f2"),
        SessionError::device(DeviceErrorType::FlowModFailed, 0, "flow-remove-fail-1"),
    );
    let service = service(&rpcs);

    let items = BatchBuilder::new()
        .flow_add("f1")
        .flow_remove("f2")
        .flow_update("f3")
        .build();
    let result = service.process_flat_batch(DEVICE, items, false).await.unwrap();

    ResultVerifier::new(&result)
        .assert_success(false)
        .and_then(|v| v.assert_error_count(1))
        .and_then(|v| v.assert_failed_orders(&[1]))
        .and_then(|v| v.assert_failure_id(1, &flow_id("f2")))
        .unwrap();
    assert_eq!(
        result.failures[0].error.to_string(),
        "Device error OFPET_FLOW_MOD_FAILED code 0: flow-remove-fail-1"
    );

    assert_eq!(rpcs.count(EntityKind::Flow, EntityOp::Add), 1);
    assert_eq!(rpcs.count(EntityKind::Flow, EntityOp::Remove), 1);
    assert_eq!(rpcs.count(EntityKind::Flow, EntityOp::Update), 1);
    assert_eq!(rpcs.barrier_count(), 1);
    assert!(rpcs.calls().last().is_some_and(RpcCall::is_barrier));
}

#[tokio::test]
async fn test_all_success_two_flow_adds() {
    let rpcs = RecordingRpcs::new();
    let service = service(&rpcs);

    let items = BatchBuilder::new().flow_add("f1").flow_add("f2").build();
    let result = service.process_flat_batch(DEVICE, items, false).await.unwrap();

    assert!(result.success);
    assert!(result.failures.is_empty());
    assert!(result.errors.is_empty());
    assert_eq!(rpcs.count(EntityKind::Flow, EntityOp::Add), 2);
    assert_eq!(rpcs.barrier_count(), 1);
    assert_eq!(service.stats().steps_executed, 1);
}

fn four_step_batch() -> BatchBuilder {
    // flows, groups, meters, flows: four steps
    BatchBuilder::new()
        .flow_add("f1")
        .group_add(1)
        .meter_add(1)
        .flow_remove("f9")
}

fn four_step_rpcs() -> RecordingRpcs {
    RecordingRpcs::new()
        .fail(
            BatchItemId::Group(GroupId::new(1).unwrap()),
            SessionError::device(DeviceErrorType::GroupModFailed, 0, "group-add-fail"),
        )
        .fail(
            flow_id("f9"),
            SessionError::device(DeviceErrorType::FlowModFailed, 2, "flow-remove-fail"),
        )
}

#[tokio::test]
async fn test_exit_on_first_error_skips_later_steps() {
    let rpcs = four_step_rpcs();
    let service = service(&rpcs);

    let result = service
        .process_flat_batch(DEVICE, four_step_batch().build(), true)
        .await
        .unwrap();

    ResultVerifier::new(&result)
        .assert_success(false)
        .and_then(|v| v.assert_failed_orders(&[1]))
        .unwrap();
    assert_eq!(rpcs.count(EntityKind::Flow, EntityOp::Add), 1);
    assert_eq!(rpcs.count(EntityKind::Group, EntityOp::Add), 1);
    assert_eq!(rpcs.count(EntityKind::Meter, EntityOp::Add), 0);
    assert_eq!(rpcs.count(EntityKind::Flow, EntityOp::Remove), 0);

    let stats = service.stats();
    assert_eq!(stats.steps_executed, 2);
    assert_eq!(stats.steps_skipped, 2);
}

#[tokio::test]
async fn test_without_exit_on_first_error_all_steps_run() {
    let rpcs = four_step_rpcs();
    let service = service(&rpcs);

    let result = service
        .process_flat_batch(DEVICE, four_step_batch().build(), false)
        .await
        .unwrap();

    ResultVerifier::new(&result)
        .assert_success(false)
        .and_then(|v| v.assert_failed_orders(&[1, 3]))
        .and_then(|v| v.assert_failure_id(3, &flow_id("f9")))
        .and_then(|v| v.assert_error_count(2))
        .unwrap();
    assert_eq!(rpcs.count(EntityKind::Meter, EntityOp::Add), 1);
    assert_eq!(rpcs.count(EntityKind::Flow, EntityOp::Remove), 1);
    assert_eq!(service.stats().steps_skipped, 0);
}

/// Items of one step completing in reverse must still be reported in
/// submission order.
#[tokio::test]
async fn test_completion_order_does_not_leak() {
    let rpcs = RecordingRpcs::new()
        .delay(flow_id("a"), Duration::from_millis(80))
        .delay(flow_id("c"), Duration::from_millis(30))
        .fail(flow_id("a"), SessionError::validation("a rejected"))
        .fail(flow_id("c"), SessionError::validation("c rejected"));
    let service = service(&rpcs);

    let items = BatchBuilder::new()
        .flow_add("a")
        .flow_add("b")
        .flow_add("c")
        .build();
    let result = service.process_flat_batch(DEVICE, items, false).await.unwrap();

    assert_eq!(
        rpcs.completed_ids(),
        vec![flow_id("b"), flow_id("c"), flow_id("a")]
    );
    ResultVerifier::new(&result)
        .assert_failed_orders(&[0, 2])
        .and_then(|v| v.assert_failure_id(0, &flow_id("a")))
        .unwrap();
    let error_orders: Vec<ErrorOrigin> = result.errors.iter().map(|e| e.origin).collect();
    assert_eq!(
        error_orders,
        vec![
            ErrorOrigin::Item { batch_order: 0 },
            ErrorOrigin::Item { batch_order: 2 }
        ]
    );
}

#[tokio::test]
async fn test_adjacency_decides_steps() {
    let rpcs = RecordingRpcs::new();
    let service = service(&rpcs);

    let items = BatchBuilder::new()
        .flow_add("f1")
        .flow_add("f2")
        .group_add(1)
        .flow_add("f3")
        .build();
    let result = service.process_flat_batch(DEVICE, items, false).await.unwrap();

    assert!(result.success);
    assert_eq!(service.stats().steps_executed, 3);
    assert_eq!(rpcs.count(EntityKind::Flow, EntityOp::Add), 3);
}

#[tokio::test]
async fn test_barrier_failure_is_generic_error() {
    let rpcs = RecordingRpcs::new().fail_barriers(SessionError::ConnectionLost);
    let service = service(&rpcs);

    let items = BatchBuilder::new().flow_add("f1").flow_add("f2").build();
    let result = service.process_flat_batch(DEVICE, items, true).await.unwrap();

    assert!(!result.success);
    assert!(result.failures.is_empty());
    assert_eq!(
        result.errors,
        vec![ChainError::barrier(
            BatchRpc::AddFlowsBatch,
            SessionError::ConnectionLost
        )]
    );
}

#[tokio::test]
async fn test_dependent_steps_get_barrier_between() {
    let rpcs = RecordingRpcs::new();
    init_tracing();
    let service = FlatBatchService::new(
        Arc::new(rpcs.clone()),
        BatchConfig {
            barrier_after_groupings: false,
            ..Default::default()
        },
    );

    // the flow references group 1, which must be acknowledged first
    let items = BatchBuilder::new().group_add(1).flow_add("f1").build();
    service.process_flat_batch(DEVICE, items, false).await.unwrap();

    let calls = rpcs.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[1].is_barrier());
}

#[tokio::test]
async fn test_json_request_end_to_end() -> anyhow::Result<()> {
    let rpcs = RecordingRpcs::new();
    let service = service(&rpcs);

    let request = FlatBatchRequest::from_json(
        r#"{
            "node": "openflow:1",
            "barrier_requested": false,
            "items": [
                {"batch_order": 0, "kind": "meter-add", "meter": {"id": 3}},
                {"batch_order": 1, "kind": "meter-update",
                 "original": {"id": 3}, "updated": {"id": 3, "flags": {"kbps": true}}}
            ]
        }"#,
    )?;
    let result = service.process(request).await?;

    assert!(result.success);
    assert_eq!(rpcs.count(EntityKind::Meter, EntityOp::Add), 1);
    assert_eq!(rpcs.count(EntityKind::Meter, EntityOp::Update), 1);
    assert_eq!(rpcs.barrier_count(), 0);
    assert!(rpcs
        .calls()
        .iter()
        .all(|call| matches!(call, RpcCall::Entity { device, .. } if *device == DEVICE)));
    Ok(())
}

#[test]
fn test_builder_request_blocking() {
    let rpcs = RecordingRpcs::new();
    let service = service(&rpcs);

    let request = BatchBuilder::new()
        .group_add(2)
        .group_update(2)
        .group_remove(2)
        .request(DEVICE, true);
    let result = tokio_test::block_on(service.process(request)).unwrap();

    assert!(result.success);
    assert_eq!(rpcs.count(EntityKind::Group, EntityOp::Update), 1);
    assert_eq!(service.stats().steps_executed, 3);
}
