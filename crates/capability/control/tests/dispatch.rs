use api_contract::ControlDto;
use async_trait::async_trait;
use domain::{ConnectivityStatus, DeviceType};
use hioto_broker::RecordingPublisher;
use hioto_control::{ControlError, ControlOutcome, ControlService};
use hioto_rules::RuleService;
use hioto_storage::{
    ActuatorLogRecord, DeviceRecord, DeviceStore, InMemoryStore, LogStore, MonitoringRecord,
    StorageError, StoreTransaction, TransactionalStore,
};
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

fn control(device_type: DeviceType, message: &str, mac_server: Option<&str>) -> ControlDto {
    ControlDto {
        device_type,
        message: message.to_string(),
        mac_server: mac_server.map(str::to_string),
    }
}

struct Fixture {
    store: InMemoryStore,
    publisher: Arc<RecordingPublisher>,
    rules: RuleService,
    control: ControlService,
}

async fn fixture_with(transactions: Arc<dyn TransactionalStore>, store: InMemoryStore) -> Fixture {
    for (guid, device_type) in [
        ("s1", DeviceType::Sensor),
        ("a1", DeviceType::Aktuator),
        ("a2", DeviceType::Aktuator),
    ] {
        store
            .create_device(device(guid, device_type))
            .await
            .expect("device");
    }
    let publisher = Arc::new(RecordingPublisher::new());
    let sync = CloudSync::new(publisher.clone(), targets(), NODE);
    let rules = RuleService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        sync.clone(),
    );
    let control = ControlService::new(transactions, rules.clone(), sync);
    Fixture {
        store,
        publisher,
        rules,
        control,
    }
}

async fn fixture() -> Fixture {
    let store = InMemoryStore::new();
    fixture_with(Arc::new(store.clone()), store).await
}

/// 执行器日志写入失败的事务包装。
struct FailingLogStore {
    inner: InMemoryStore,
}

struct FailingLogTransaction {
    inner: Box<dyn StoreTransaction>,
}

#[async_trait]
impl TransactionalStore for FailingLogStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StorageError> {
        Ok(Box::new(FailingLogTransaction {
            inner: self.inner.begin().await?,
        }))
    }
}

#[async_trait]
impl StoreTransaction for FailingLogTransaction {
    async fn find_device(&mut self, guid: &str) -> Result<Option<DeviceRecord>, StorageError> {
        self.inner.find_device(guid).await
    }

    async fn update_device_status(
        &mut self,
        guid: &str,
        status: &str,
        updated_at_ms: i64,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        self.inner
            .update_device_status(guid, status, updated_at_ms)
            .await
    }

    async fn create_actuator_log(&mut self, _record: ActuatorLogRecord) -> Result<(), StorageError> {
        Err(StorageError::new("log insert failed"))
    }

    async fn create_monitoring(&mut self, record: MonitoringRecord) -> Result<(), StorageError> {
        self.inner.create_monitoring(record).await
    }

    async fn delete_device(&mut self, guid: &str) -> Result<bool, StorageError> {
        self.inner.delete_device(guid).await
    }

    async fn delete_rules_by_input(&mut self, input_guid: &str) -> Result<u64, StorageError> {
        self.inner.delete_rules_by_input(input_guid).await
    }

    async fn delete_rules_by_output(&mut self, output_guid: &str) -> Result<u64, StorageError> {
        self.inner.delete_rules_by_output(output_guid).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.inner.rollback().await
    }
}

#[tokio::test]
async fn actuator_control_commits_and_notifies() {
    let fx = fixture().await;
    let outcome = fx
        .control
        .control_local(&control(DeviceType::Aktuator, "a1#1", None))
        .await
        .expect("control");
    let ControlOutcome::Actuated(device) = outcome else {
        panic!("expected actuator outcome");
    };
    assert_eq!(device.status, "1");

    let stored = fx.store.find_device("a1").await.expect("find").expect("a1");
    assert_eq!(stored.status, "1");
    let logs = fx.store.list_actuator_logs().await.expect("logs");
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].guid, "a1");
    assert_eq!(logs[0].name, "name-a1");
    assert_eq!(logs[0].value, "1");

    let published = fx.publisher.published();
    assert_eq!(published.len(), 2);
    assert!(published[0].is_topic("aktuator"));
    assert_eq!(published[0].payload_text(), "a1#1");
    assert!(published[1].is_queue("update_res_cloud"));
}

#[tokio::test]
async fn actuator_control_is_all_or_nothing() {
    let store = InMemoryStore::new();
    let fx = fixture_with(
        Arc::new(FailingLogStore {
            inner: store.clone(),
        }),
        store,
    )
    .await;

    let err = fx
        .control
        .control_local(&control(DeviceType::Aktuator, "a1#1", None))
        .await
        .expect_err("log failure");
    assert!(matches!(err, ControlError::Storage(_)));

    let stored = fx.store.find_device("a1").await.expect("find").expect("a1");
    assert_eq!(stored.status, "0");
    assert!(fx.store.list_actuator_logs().await.expect("logs").is_empty());
    assert!(fx.publisher.published().is_empty());
}

#[tokio::test]
async fn unknown_actuator_is_not_found() {
    let fx = fixture().await;
    let err = fx
        .control
        .control_local(&control(DeviceType::Aktuator, "ghost#1", None))
        .await
        .expect_err("missing");
    assert!(matches!(err, ControlError::NotFound(_)));
    assert!(fx.publisher.published().is_empty());
}

#[tokio::test]
async fn malformed_message_is_rejected() {
    let fx = fixture().await;
    for message in ["a1", "a1#1#2", "#1"] {
        let err = fx
            .control
            .control_local(&control(DeviceType::Aktuator, message, None))
            .await
            .expect_err("malformed");
        assert!(matches!(err, ControlError::Validation(_)), "{message}");
    }
}

#[tokio::test]
async fn sensor_control_runs_rule_evaluation() {
    let fx = fixture().await;
    fx.rules
        .create_rules("s1", &["a1".to_string(), "a2".to_string()])
        .await
        .expect("rules");

    let outcome = fx
        .control
        .control_local(&control(DeviceType::Sensor, "s1#10", None))
        .await
        .expect("control");
    let ControlOutcome::Evaluated { reading, report } = outcome else {
        panic!("expected evaluation outcome");
    };
    assert_eq!(reading.value, "10");
    assert_eq!(report.applied, 2);
    assert_eq!(
        fx.store.find_device("a1").await.expect("find").expect("a1").status,
        "0"
    );
    assert_eq!(
        fx.store.find_device("a2").await.expect("find").expect("a2").status,
        "1"
    );
    // 规则路径不写执行器控制日志
    assert!(fx.store.list_actuator_logs().await.expect("logs").is_empty());
}

#[tokio::test]
async fn cloud_control_requires_node_identity() {
    let fx = fixture().await;
    let err = fx
        .control
        .control_from_cloud(&control(DeviceType::Aktuator, "a1#1", Some("other")))
        .await
        .expect_err("foreign");
    assert!(matches!(err, ControlError::ForeignOrigin(_)));
    let err = fx
        .control
        .control_from_cloud(&control(DeviceType::Aktuator, "a1#1", None))
        .await
        .expect_err("missing identity");
    assert!(matches!(err, ControlError::ForeignOrigin(_)));
    assert_eq!(
        fx.store.find_device("a1").await.expect("find").expect("a1").status,
        "0"
    );

    fx.control
        .control_from_cloud(&control(DeviceType::Aktuator, "a1#1", Some(NODE)))
        .await
        .expect("own node");
    assert_eq!(
        fx.store.find_device("a1").await.expect("find").expect("a1").status,
        "1"
    );
}
