//! Session integration tests
//!
//! Runs flat batches through [`SessionEntityRpcs`] against a loopback
//! device, so every item goes through the transaction table, the outbound
//! queue and the inbound dispatcher.

use std::sync::Arc;
use std::time::Duration;

use ofswitch_batch::{
    BatchConfig, BatchItemId, EntityRpcs, FlatBatchService, JsonCodec, SessionEntityRpcs,
};
use ofswitch_session::{
    InboundMessage, MessageKind, OutboundMessage, SessionConfig, SessionError, SessionRegistry,
    TransactionId,
};
use ofswitch_test::{
    entity_fixtures, init_tracing, BatchBuilder, LoopbackBehavior, LoopbackDevice,
    ResultVerifier,
};
use ofswitch_types::{DeviceRef, FlowId};
use pretty_assertions::assert_eq;

const DEVICE: DeviceRef = DeviceRef::new(0x00aa);

fn fast_config() -> SessionConfig {
    SessionConfig {
        barrier_interval_ms: 10,
        ..Default::default()
    }
}

fn connect(
    behavior: LoopbackBehavior,
    config: SessionConfig,
) -> (LoopbackDevice, Arc<SessionRegistry>) {
    init_tracing();
    let loopback = LoopbackDevice::start(DEVICE, config, behavior).unwrap();
    let registry = Arc::new(SessionRegistry::new());
    registry.insert(Arc::clone(loopback.session()));
    (loopback, registry)
}

fn batch_service(registry: &Arc<SessionRegistry>) -> FlatBatchService {
    let rpcs = SessionEntityRpcs::new(Arc::clone(registry), JsonCodec);
    FlatBatchService::new(Arc::new(rpcs), BatchConfig::default())
}

/// Scenario:
/// 1. Add f1, remove f2, update f3; the device rejects f2
/// 2. Verify the rejection is reported at batch order 1
/// 3. Verify the other two items were acknowledged through barriers
#[tokio::test]
async fn test_flat_batch_over_session() {
    let (loopback, registry) = connect(LoopbackBehavior::default().reject("f2"), fast_config());
    let service = batch_service(&registry);

    let items = BatchBuilder::new()
        .flow_add("f1")
        .flow_remove("f2")
        .flow_update("f3")
        .build();
    let result = service.process_flat_batch(DEVICE, items, false).await.unwrap();

    ResultVerifier::new(&result)
        .assert_success(false)
        .and_then(|v| v.assert_failed_orders(&[1]))
        .and_then(|v| {
            v.assert_failure_id(1, &BatchItemId::Flow(FlowId::new("f2").unwrap()))
        })
        .and_then(|v| v.assert_error_count(1))
        .unwrap();
    assert_eq!(
        result.failures[0].error.to_string(),
        "Device error OFPET_FLOW_MOD_FAILED code 0: f2-rejected"
    );

    assert_eq!(loopback.frame_count(MessageKind::FlowMod), 3);
    assert!(loopback.frame_count(MessageKind::Barrier) >= 1);

    assert_eq!(loopback.session().stats().implied, 2);
    assert_eq!(loopback.session().table().outstanding(), 0);
}

#[tokio::test]
async fn test_groups_and_meters_over_session() {
    let (loopback, registry) = connect(LoopbackBehavior::default(), fast_config());
    let service = batch_service(&registry);

    let items = BatchBuilder::new()
        .group_add(1)
        .meter_add(2)
        .flow_add("f1")
        .build();
    let result = service.process_flat_batch(DEVICE, items, true).await.unwrap();

    assert!(result.success);
    assert_eq!(loopback.frame_count(MessageKind::GroupMod), 1);
    assert_eq!(loopback.frame_count(MessageKind::MeterMod), 1);
    assert_eq!(loopback.frame_count(MessageKind::FlowMod), 1);

    // the group and meter are acknowledged before the flow is sent
    let frames = loopback.frames();
    let flow_at = frames
        .iter()
        .position(|(_, kind)| *kind == MessageKind::FlowMod)
        .unwrap();
    assert!(frames[..flow_at]
        .iter()
        .any(|(_, kind)| *kind == MessageKind::Barrier));
}

#[tokio::test]
async fn test_disconnect_fails_outstanding() {
    // default interval, so no flush barrier lands between the two requests
    let (loopback, _registry) = connect(
        LoopbackBehavior::default().silent_barriers(),
        SessionConfig::default(),
    );
    let session = Arc::clone(loopback.session());

    let first = session
        .issue(OutboundMessage::new(MessageKind::FlowMod, b"{}".to_vec()))
        .unwrap();
    let second = session.send_barrier().unwrap();
    assert_eq!(session.table().outstanding(), 2);

    loopback.disconnect();

    assert_eq!(first.await.unwrap_err(), SessionError::ConnectionLost);
    assert_eq!(second.await.unwrap_err(), SessionError::ConnectionLost);
    assert!(session.is_closed());

    // closed sessions refuse new work without allocating an xid
    let issued = session.stats().issued;
    let err = session
        .issue(OutboundMessage::new(MessageKind::FlowMod, b"{}".to_vec()))
        .unwrap_err();
    assert!(err.is_local());
    assert_eq!(session.stats().issued, issued);
}

#[tokio::test]
async fn test_batch_after_disconnect_reports_not_connected() {
    let (loopback, registry) = connect(LoopbackBehavior::default(), fast_config());
    let service = batch_service(&registry);

    loopback.disconnect();
    while !loopback.session().is_closed() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let items = BatchBuilder::new().flow_add("f1").build();
    let result = service.process_flat_batch(DEVICE, items, false).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.failed_orders(), vec![0]);
    assert_eq!(
        result.failures[0].error,
        SessionError::not_connected(DEVICE)
    );
}

#[tokio::test]
async fn test_invalid_config_refuses_to_start() {
    init_tracing();
    let config = SessionConfig {
        outbound_queue_depth: 0,
        ..fast_config()
    };
    let err = LoopbackDevice::start(DEVICE, config, LoopbackBehavior::default()).unwrap_err();
    assert!(matches!(err, SessionError::Validation { .. }));
}

#[tokio::test]
async fn test_unmatched_reply_is_discarded() {
    let (loopback, _registry) = connect(LoopbackBehavior::default(), fast_config());
    let session = loopback.session();

    let stray = InboundMessage::Reply {
        xid: TransactionId::new(0xdead),
        payload: Vec::new(),
    };
    assert!(!session.on_inbound(stray.clone()));
    assert!(!session.on_inbound(stray));
    assert_eq!(session.stats().discarded, 2);
    assert!(!session.is_closed());
}

#[tokio::test]
async fn test_explicit_request_gets_reply() {
    let (loopback, _registry) = connect(LoopbackBehavior::default(), fast_config());

    let pending = loopback
        .session()
        .issue(OutboundMessage::new(MessageKind::Echo, b"ping".to_vec()))
        .unwrap();
    let xid = pending.xid();
    let reply = pending.await.unwrap();

    assert_eq!(reply.xid, xid);
    assert!(!reply.implied);
}

#[tokio::test]
async fn test_unanswered_request_times_out() {
    let config = SessionConfig {
        request_timeout_ms: Some(50),
        ..fast_config()
    };
    let (_loopback, registry) = connect(LoopbackBehavior::default().silent_barriers(), config);
    let rpcs = SessionEntityRpcs::new(registry, JsonCodec);

    let err = rpcs
        .add_flow(DEVICE, &entity_fixtures::flow("f1"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Timeout { .. }));
    assert!(err.is_retryable());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issuers_get_distinct_xids() {
    let (loopback, _registry) = connect(LoopbackBehavior::default(), fast_config());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let session = Arc::clone(loopback.session());
        handles.push(tokio::spawn(async move {
            let mut xids = Vec::new();
            for _ in 0..50 {
                let pending = session
                    .issue(OutboundMessage::new(MessageKind::Echo, b"ping".to_vec()))
                    .unwrap();
                xids.push(pending.xid());
                pending.await.unwrap();
            }
            xids
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    let total = all.len();
    all.sort_by_key(|xid| xid.as_u32());
    all.dedup();
    assert_eq!(all.len(), total);
    assert_eq!(loopback.session().table().outstanding(), 0);
}
