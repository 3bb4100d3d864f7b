use domain::{ConnectivityStatus, DeviceCommand, DeviceType};
use hioto_broker::RecordingPublisher;
use hioto_rules::{EvaluationReport, RuleError, RuleService, generate_rule_rows};
use hioto_storage::{DeviceRecord, DeviceStore, InMemoryStore, LogStore, RuleStore};
use hioto_sync::{CloudSync, SyncTargets};
use std::sync::Arc;

const NODE: &str = "aa:bb:cc:dd:ee:ff";

fn targets() -> SyncTargets {
    SyncTargets {
        local_mqtt_instance: "mqtt-local".to_string(),
        actuator_topic: "aktuator".to_string(),
        cloud_amqp_instance: "rmq-cloud".to_string(),
        exchange: "amq.direct".to_string(),
        register_queue: "register_res_cloud".to_string(),
        update_queue: "update_res_cloud".to_string(),
        delete_queue: "delete_res_cloud".to_string(),
        rules_queue: "rules_response_queue".to_string(),
        logs_queue: "logs_queue".to_string(),
        actuator_logs_queue: "logs_aktuator_queue".to_string(),
        monitoring_queue: "monitoring_response_queue".to_string(),
    }
}

fn device(guid: &str, device_type: DeviceType) -> DeviceRecord {
    DeviceRecord {
        id: 0,
        guid: guid.to_string(),
        mac: format!("mac-{guid}"),
        device_type,
        quantity: 1,
        name: format!("name-{guid}"),
        version: "1".to_string(),
        minor: "0".to_string(),
        status: device_type.initial_status().to_string(),
        status_device: ConnectivityStatus::On,
        last_seen_ms: 0,
        created_at_ms: 0,
        updated_at_ms: 0,
        room_id: None,
    }
}

async fn setup(devices: &[(&str, DeviceType)]) -> (InMemoryStore, Arc<RecordingPublisher>, RuleService) {
    let store = InMemoryStore::new();
    for (guid, device_type) in devices {
        store
            .create_device(device(guid, *device_type))
            .await
            .expect("device");
    }
    let publisher = Arc::new(RecordingPublisher::new());
    let sync = CloudSync::new(publisher.clone(), targets(), NODE);
    let service = RuleService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        sync,
    );
    (store, publisher, service)
}

fn guids(count: usize) -> Vec<String> {
    (1..=count).map(|index| format!("a{index}")).collect()
}

#[test]
fn truth_table_has_expected_shape_for_every_width() {
    for width in 1..=8usize {
        let actuators = guids(width);
        let rows = generate_rule_rows("s1", &actuators, 0);
        assert_eq!(rows.len(), (1 << width) * width, "width {width}");
        for row in &rows {
            assert_eq!(row.input_value.len(), width);
            let index = actuators
                .iter()
                .position(|guid| *guid == row.output_guid)
                .expect("actuator");
            let bit = row.input_value.as_bytes()[index];
            let expected = if bit == b'1' { "0" } else { "1" };
            assert_eq!(row.output_value, expected);
        }
    }
}

#[tokio::test]
async fn create_rules_persists_and_publishes_one_batch() {
    let (store, publisher, service) = setup(&[
        ("s1", DeviceType::Sensor),
        ("a1", DeviceType::Aktuator),
        ("a2", DeviceType::Aktuator),
    ])
    .await;

    let rows = service
        .create_rules("s1", &["a1".to_string(), "a2".to_string()])
        .await
        .expect("rules");
    assert_eq!(rows.len(), 8);
    let pattern_10: Vec<(String, String)> = rows
        .iter()
        .filter(|row| row.input_value == "10")
        .map(|row| (row.output_guid.clone(), row.output_value.clone()))
        .collect();
    assert_eq!(
        pattern_10,
        vec![
            ("a1".to_string(), "0".to_string()),
            ("a2".to_string(), "1".to_string())
        ]
    );
    assert_eq!(store.list_rules_for_guid("s1").await.expect("list").len(), 8);

    let published = publisher.published();
    assert_eq!(published.len(), 1);
    assert!(published[0].is_queue("rules_response_queue"));

    // 重复创建会追加
    service
        .create_rules("s1", &["a1".to_string(), "a2".to_string()])
        .await
        .expect("rules");
    assert_eq!(store.list_rules_for_guid("s1").await.expect("list").len(), 16);
}

#[tokio::test]
async fn create_rules_rejects_bad_actuator_counts() {
    let (_, publisher, service) = setup(&[("s1", DeviceType::Sensor)]).await;
    let err = service.create_rules("s1", &[]).await.expect_err("empty");
    assert!(matches!(err, RuleError::Validation(_)));
    let err = service
        .create_rules("s1", &guids(9))
        .await
        .expect_err("too many");
    assert!(matches!(err, RuleError::Validation(_)));
    assert!(publisher.published().is_empty());
}

#[tokio::test]
async fn create_rules_requires_known_devices() {
    let (store, _, service) = setup(&[("s1", DeviceType::Sensor), ("a1", DeviceType::Aktuator)]).await;
    let err = service
        .create_rules("ghost", &["a1".to_string()])
        .await
        .expect_err("sensor");
    assert!(matches!(err, RuleError::NotFound(_)));
    let err = service
        .create_rules("s1", &["a1".to_string(), "a9".to_string()])
        .await
        .expect_err("actuator");
    assert!(matches!(err, RuleError::NotFound(_)));
    assert!(store.list_rules_for_guid("s1").await.expect("list").is_empty());
}

#[tokio::test]
async fn evaluation_drives_every_matched_actuator() {
    let (store, publisher, service) = setup(&[
        ("s1", DeviceType::Sensor),
        ("a1", DeviceType::Aktuator),
        ("a2", DeviceType::Aktuator),
    ])
    .await;
    service
        .create_rules("s1", &["a1".to_string(), "a2".to_string()])
        .await
        .expect("rules");
    let before = publisher.published().len();

    let report = service
        .evaluate(&DeviceCommand::new("s1", "10"))
        .await
        .expect("evaluate");
    assert_eq!(
        report,
        EvaluationReport {
            matched: 2,
            applied: 2,
            skipped: 0
        }
    );

    let a1 = store.find_device("a1").await.expect("find").expect("a1");
    let a2 = store.find_device("a2").await.expect("find").expect("a2");
    assert_eq!(a1.status, "0");
    assert_eq!(a2.status, "1");

    let logs = store.list_rule_logs().await.expect("logs");
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|log| log.input_guid == "s1" && log.input_value == "10"));
    assert_eq!(logs[0].input_name, "name-s1");

    let published = &publisher.published()[before..];
    let commands: Vec<String> = published
        .iter()
        .filter(|message| message.is_topic("aktuator"))
        .map(|message| message.payload_text())
        .collect();
    assert_eq!(commands, vec!["a1#0", "a2#1"]);
    let snapshots = published
        .iter()
        .filter(|message| message.is_queue("update_res_cloud"))
        .count();
    assert_eq!(snapshots, 2);
}

#[tokio::test]
async fn evaluation_without_match_is_a_no_op() {
    let (store, publisher, service) = setup(&[("s1", DeviceType::Sensor)]).await;
    let report = service
        .evaluate(&DeviceCommand::new("s1", "11"))
        .await
        .expect("evaluate");
    assert_eq!(report, EvaluationReport::default());
    assert!(store.list_rule_logs().await.expect("logs").is_empty());
    assert!(publisher.published().is_empty());
}

#[tokio::test]
async fn missing_actuator_only_skips_its_own_row() {
    let (store, publisher, service) = setup(&[("s1", DeviceType::Sensor), ("a2", DeviceType::Aktuator)]).await;
    // a1 已被移除但规则仍在
    store
        .create_rules(generate_rule_rows("s1", &["a1".to_string(), "a2".to_string()], 0))
        .await
        .expect("rules");

    let report = service
        .evaluate(&DeviceCommand::new("s1", "01"))
        .await
        .expect("evaluate");
    assert_eq!(report.matched, 2);
    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped, 1);

    let a2 = store.find_device("a2").await.expect("find").expect("a2");
    assert_eq!(a2.status, "0");
    let logs = store.list_rule_logs().await.expect("logs");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].output_guid, "a2");
    let commands: Vec<String> = publisher
        .published()
        .iter()
        .filter(|message| message.is_topic("aktuator"))
        .map(|message| message.payload_text())
        .collect();
    assert_eq!(commands, vec!["a2#0"]);
}

#[tokio::test]
async fn rule_lookup_and_sensor_deletion() {
    let (_, _, service) = setup(&[
        ("s1", DeviceType::Sensor),
        ("t1", DeviceType::SensorTemperature),
        ("a1", DeviceType::Aktuator),
    ])
    .await;
    assert!(matches!(
        service.rules_for_device("a1").await,
        Err(RuleError::NotFound(_))
    ));
    service
        .create_rules("s1", &["a1".to_string()])
        .await
        .expect("rules");
    assert_eq!(service.rules_for_device("a1").await.expect("rules").len(), 2);

    assert!(matches!(
        service.delete_rules_for_sensor("t1").await,
        Err(RuleError::Validation(_))
    ));
    assert!(matches!(
        service.delete_rules_for_sensor("ghost").await,
        Err(RuleError::NotFound(_))
    ));
    assert_eq!(service.delete_rules_for_sensor("s1").await.expect("delete"), 2);
    assert!(matches!(
        service.rules_for_device("s1").await,
        Err(RuleError::NotFound(_))
    ));
}
