use api_contract::{CloudRegistrationDto, DeleteDeviceDto, RegistrationDto};
use domain::{ConnectivityStatus, DeviceCommand, DeviceType};
use hioto_broker::RecordingPublisher;
use hioto_control::{ControlError, DeviceService};
use hioto_rules::generate_rule_rows;
use hioto_storage::{DeviceFilter, DeviceStore, InMemoryStore, LogStore, RuleStore};
use hioto_sync::{CloudSync, SyncTargets};
use std::sync::Arc;
use std::time::Duration;

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

fn registration(guid: &str, device_type: DeviceType) -> RegistrationDto {
    RegistrationDto {
        guid: guid.to_string(),
        mac: format!("mac-{guid}"),
        device_type,
        quantity: 1,
        name: format!("name-{guid}"),
        version: "1".to_string(),
        minor: "0".to_string(),
        room_id: None,
    }
}

fn setup() -> (InMemoryStore, Arc<RecordingPublisher>, DeviceService) {
    let store = InMemoryStore::new();
    let publisher = Arc::new(RecordingPublisher::new());
    let sync = CloudSync::new(publisher.clone(), targets(), NODE);
    let service = DeviceService::new(Arc::new(store.clone()), Arc::new(store.clone()), sync);
    (store, publisher, service)
}

#[tokio::test]
async fn local_registration_sets_initial_status_and_reports() {
    let (_, publisher, service) = setup();
    let actuator = service
        .register_local(&registration("a1", DeviceType::Aktuator))
        .await
        .expect("register");
    assert_eq!(actuator.status, "0");
    assert_eq!(actuator.status_device, ConnectivityStatus::On);
    let sensor = service
        .register_local(&registration("t1", DeviceType::SensorTemperature))
        .await
        .expect("register");
    assert_eq!(sensor.status, "");

    let published = publisher.published();
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|message| message.is_queue("register_res_cloud")));
    let body: serde_json::Value =
        serde_json::from_slice(&published[0].payload).expect("json");
    assert_eq!(body["guid"], "a1");
    assert_eq!(body["type"], "AKTUATOR");
    assert_eq!(body["mac_server"], NODE);

    let err = service
        .register_local(&registration("a1", DeviceType::Aktuator))
        .await
        .expect_err("duplicate");
    assert!(matches!(err, ControlError::Validation(_)));
}

#[tokio::test]
async fn cloud_registration_checks_identity_and_does_not_echo() {
    let (store, publisher, service) = setup();
    let foreign = CloudRegistrationDto {
        registration: registration("a1", DeviceType::Aktuator),
        mac_server: "other".to_string(),
    };
    let err = service
        .register_from_cloud(&foreign)
        .await
        .expect_err("foreign");
    assert!(matches!(err, ControlError::ForeignOrigin(_)));
    assert!(store.find_device("a1").await.expect("find").is_none());

    let own = CloudRegistrationDto {
        registration: registration("a1", DeviceType::Aktuator),
        mac_server: NODE.to_string(),
    };
    service.register_from_cloud(&own).await.expect("register");
    assert!(store.find_device("a1").await.expect("find").is_some());
    assert!(publisher.published().is_empty());
}

#[tokio::test]
async fn update_reports_snapshot_and_requires_device() {
    let (_, publisher, service) = setup();
    service
        .register_local(&registration("a1", DeviceType::Aktuator))
        .await
        .expect("register");
    let mut update = registration("a1", DeviceType::Aktuator);
    update.name = "lamp".to_string();
    let device = service.update(&update).await.expect("update");
    assert_eq!(device.name, "lamp");
    assert!(publisher.published()[1].is_queue("update_res_cloud"));

    let err = service
        .update(&registration("ghost", DeviceType::Aktuator))
        .await
        .expect_err("missing");
    assert!(matches!(err, ControlError::NotFound(_)));
}

#[tokio::test]
async fn deleting_devices_cascades_rules_by_type() {
    let (store, publisher, service) = setup();
    for (guid, device_type) in [
        ("s1", DeviceType::Sensor),
        ("a1", DeviceType::Aktuator),
        ("a2", DeviceType::Aktuator),
        ("t1", DeviceType::SensorTemperature),
    ] {
        service
            .register_local(&registration(guid, device_type))
            .await
            .expect("register");
    }
    store
        .create_rules(generate_rule_rows(
            "s1",
            &["a1".to_string(), "a2".to_string()],
            0,
        ))
        .await
        .expect("rules");

    let removal = service.delete("t1").await.expect("delete");
    assert_eq!(removal.rules_removed, 0);
    assert_eq!(store.list_rules_for_guid("s1").await.expect("rules").len(), 8);

    let removal = service.delete("a1").await.expect("delete");
    assert_eq!(removal.rules_removed, 4);
    assert!(store.list_rules_for_guid("a1").await.expect("rules").is_empty());
    assert_eq!(store.list_rules_for_guid("s1").await.expect("rules").len(), 4);

    let removal = service.delete("s1").await.expect("delete");
    assert_eq!(removal.rules_removed, 4);
    assert!(store.list_rules_for_guid("a2").await.expect("rules").is_empty());
    assert!(store.find_device("s1").await.expect("find").is_none());

    let notices: Vec<serde_json::Value> = publisher
        .published()
        .iter()
        .filter(|message| message.is_queue("delete_res_cloud"))
        .map(|message| serde_json::from_slice(&message.payload).expect("json"))
        .collect();
    assert_eq!(notices.len(), 3);
    assert_eq!(notices[2]["guid"], "s1");
    assert_eq!(notices[2]["mac_server"], NODE);

    let err = service.delete("s1").await.expect_err("gone");
    assert!(matches!(err, ControlError::NotFound(_)));
}

#[tokio::test]
async fn cloud_delete_checks_identity() {
    let (store, _, service) = setup();
    service
        .register_local(&registration("a1", DeviceType::Aktuator))
        .await
        .expect("register");
    let request = DeleteDeviceDto {
        guid: "a1".to_string(),
        mac_server: Some("other".to_string()),
    };
    let err = service
        .delete_from_cloud(&request)
        .await
        .expect_err("foreign");
    assert!(matches!(err, ControlError::ForeignOrigin(_)));
    assert!(store.find_device("a1").await.expect("find").is_some());

    let request = DeleteDeviceDto {
        guid: "a1".to_string(),
        mac_server: Some(NODE.to_string()),
    };
    service.delete_from_cloud(&request).await.expect("delete");
    assert!(store.find_device("a1").await.expect("find").is_none());
}

#[tokio::test]
async fn monitoring_updates_status_and_appends_history() {
    let (store, _, service) = setup();
    service
        .register_local(&registration("w1", DeviceType::SensorWaterTank))
        .await
        .expect("register");
    let device = service
        .record_monitoring(&DeviceCommand::new("w1", "73"))
        .await
        .expect("monitoring");
    assert_eq!(device.status, "73");
    let history = store.list_monitoring().await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].device_type, DeviceType::SensorWaterTank);
    assert_eq!(history[0].value, "73");

    let err = service
        .record_monitoring(&DeviceCommand::new("ghost", "1"))
        .await
        .expect_err("missing");
    assert!(matches!(err, ControlError::NotFound(_)));
    assert_eq!(store.list_monitoring().await.expect("history").len(), 1);
}

#[tokio::test]
async fn heartbeat_and_inactive_sweep() {
    let (store, _, service) = setup();
    service
        .register_local(&registration("a1", DeviceType::Aktuator))
        .await
        .expect("register");

    // 阈值为 0 时所有早于当前时刻的设备都会离线
    tokio::time::sleep(Duration::from_millis(5)).await;
    let marked = service.mark_inactive(Duration::ZERO).await.expect("sweep");
    assert_eq!(marked, 1);
    let device = service.get("a1").await.expect("device");
    assert_eq!(device.status_device, ConnectivityStatus::Off);

    let device = service
        .heartbeat(&DeviceCommand::new("a1", "1"))
        .await
        .expect("heartbeat");
    assert_eq!(device.status, "1");
    assert_eq!(device.status_device, ConnectivityStatus::On);

    let marked = service
        .mark_inactive(Duration::from_secs(60))
        .await
        .expect("sweep");
    assert_eq!(marked, 0);

    let listed = service
        .list(&DeviceFilter::default())
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
    assert!(store.list_actuator_logs().await.expect("logs").is_empty());
}
