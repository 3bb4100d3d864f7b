use domain::{ConnectivityStatus, DeviceCommand, DeviceType};
use hioto_broker::{PublishTarget, RecordingPublisher};
use hioto_storage::{DeviceRecord, RuleRecord};
use hioto_sync::{CloudSync, SyncTargets};
use std::sync::Arc;

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

#[tokio::test]
async fn actuator_command_goes_to_local_topic_in_wire_format() {
    let publisher = Arc::new(RecordingPublisher::new());
    let sync = CloudSync::new(publisher.clone(), targets(), "aa:bb");
    sync.command_actuator(&DeviceCommand::new("a1", "0")).await;

    let published = publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].instance, "mqtt-local");
    assert!(published[0].is_topic("aktuator"));
    assert_eq!(published[0].payload_text(), "a1#0");
}

#[tokio::test]
async fn cloud_payloads_carry_node_identity() {
    let publisher = Arc::new(RecordingPublisher::new());
    let sync = CloudSync::new(publisher.clone(), targets(), "aa:bb");
    let device = DeviceRecord {
        id: 7,
        guid: "a1".to_string(),
        mac: "m".to_string(),
        device_type: DeviceType::Aktuator,
        quantity: 1,
        name: "lamp".to_string(),
        version: "1".to_string(),
        minor: "0".to_string(),
        status: "1".to_string(),
        status_device: ConnectivityStatus::On,
        last_seen_ms: 5,
        created_at_ms: 1,
        updated_at_ms: 5,
        room_id: None,
    };
    sync.device_updated(&device).await;
    sync.device_deleted("a1").await;
    sync.rules_created(&[RuleRecord {
        id: 1,
        input_guid: "s1".to_string(),
        input_value: "1".to_string(),
        output_guid: "a1".to_string(),
        output_value: "0".to_string(),
        created_at_ms: 1,
        updated_at_ms: 1,
    }])
    .await;

    let published = publisher.published();
    assert_eq!(published.len(), 3);
    assert_eq!(
        published[0].target,
        PublishTarget::Queue {
            queue: "update_res_cloud".to_string(),
            exchange: "amq.direct".to_string(),
        }
    );
    let snapshot: serde_json::Value = serde_json::from_slice(&published[0].payload).expect("json");
    assert_eq!(snapshot["guid"], "a1");
    assert_eq!(snapshot["type"], "AKTUATOR");
    assert_eq!(snapshot["status"], "1");
    assert_eq!(snapshot["mac_server"], "aa:bb");

    let notice: serde_json::Value = serde_json::from_slice(&published[1].payload).expect("json");
    assert_eq!(notice, serde_json::json!({"guid": "a1", "mac_server": "aa:bb"}));

    assert!(published[2].is_queue("rules_response_queue"));
    let rules: serde_json::Value = serde_json::from_slice(&published[2].payload).expect("json");
    assert_eq!(rules[0]["mac_server"], "aa:bb");
    assert_eq!(rules[0]["output_value"], "0");
}
