use hioto_broker::{
    BrokerError, BrokerRegistry, MessagePublisher, NamedRegistry, RecordingPublisher,
    RetryPolicy, run_with_refresh,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[test]
fn named_registry_lookup_and_teardown() {
    let registry: NamedRegistry<u32> = NamedRegistry::new();
    registry.insert("mqtt-local", 1).expect("insert");
    registry.insert("mqtt-cloud", 2).expect("insert");
    assert_eq!(registry.get("mqtt-cloud").expect("found"), 2);

    let err = registry.get("mqtt-edge").expect_err("missing");
    assert!(matches!(err, BrokerError::InstanceNotFound(name) if name == "mqtt-edge"));

    let mut drained = registry.take_all();
    drained.sort();
    assert_eq!(drained.len(), 2);
    assert!(registry.names().is_empty());
}

#[tokio::test]
async fn unknown_instance_is_reported_and_close_all_is_idempotent() {
    let registry = BrokerRegistry::new(RetryPolicy::default());
    assert!(matches!(
        registry.mqtt("mqtt-local"),
        Err(BrokerError::InstanceNotFound(_))
    ));
    assert!(matches!(
        registry.amqp("rmq-cloud"),
        Err(BrokerError::InstanceNotFound(_))
    ));
    registry.close_all().await;
    registry.close_all().await;
}

#[tokio::test]
async fn recording_publisher_keeps_order() {
    let publisher = RecordingPublisher::new();
    publisher
        .publish_topic("mqtt-local", "aktuator", b"a1#0")
        .await
        .expect("publish");
    publisher
        .publish_queue("rmq-cloud", b"{}", "rules_response_queue", "amq.direct")
        .await
        .expect("publish");
    let published = publisher.published();
    assert_eq!(published.len(), 2);
    assert!(published[0].is_topic("aktuator"));
    assert_eq!(published[0].payload_text(), "a1#0");
    assert!(published[1].is_queue("rules_response_queue"));
}

#[tokio::test]
async fn refresh_restarts_routes_until_cancelled() {
    let cycles = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();

    let supervisor = {
        let cycles = cycles.clone();
        let stopped = stopped.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            run_with_refresh(cancel, Some(Duration::from_millis(10)), move |token| {
                cycles.fetch_add(1, Ordering::SeqCst);
                let stopped = stopped.clone();
                vec![tokio::spawn(async move {
                    token.cancelled().await;
                    stopped.fetch_add(1, Ordering::SeqCst);
                })]
            })
            .await;
        })
    };

    for _ in 0..200 {
        if cycles.load(Ordering::SeqCst) >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();
    supervisor.await.expect("supervisor");

    let started = cycles.load(Ordering::SeqCst);
    assert!(started >= 3);
    assert_eq!(stopped.load(Ordering::SeqCst), started);
}

#[tokio::test]
async fn refresh_disabled_runs_single_cycle() {
    let cycles = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();
    let counter = cycles.clone();
    let token = cancel.clone();
    let supervisor = tokio::spawn(async move {
        run_with_refresh(token, None, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        })
        .await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    supervisor.await.expect("supervisor");
    assert_eq!(cycles.load(Ordering::SeqCst), 1);
}
