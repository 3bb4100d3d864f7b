use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 设备类型。
///
/// 序列化值与设备固件、云端约定一致，执行器沿用 `AKTUATOR` 拼写。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "AI")]
    Ai,
    #[serde(rename = "SENSOR")]
    Sensor,
    #[serde(rename = "SENSOR_TEMPERATURE")]
    SensorTemperature,
    #[serde(rename = "SENSOR_WATER_TANK")]
    SensorWaterTank,
    #[serde(rename = "SENSOR_CAMERA")]
    SensorCamera,
    #[serde(rename = "SENSOR_PARKING")]
    SensorParking,
    #[serde(rename = "SENSOR_GAS_DETECTOR")]
    SensorGasDetector,
    #[serde(rename = "AKTUATOR")]
    Aktuator,
}

impl DeviceType {
    pub const ALL: [DeviceType; 8] = [
        DeviceType::Ai,
        DeviceType::Sensor,
        DeviceType::SensorTemperature,
        DeviceType::SensorWaterTank,
        DeviceType::SensorCamera,
        DeviceType::SensorParking,
        DeviceType::SensorGasDetector,
        DeviceType::Aktuator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Ai => "AI",
            DeviceType::Sensor => "SENSOR",
            DeviceType::SensorTemperature => "SENSOR_TEMPERATURE",
            DeviceType::SensorWaterTank => "SENSOR_WATER_TANK",
            DeviceType::SensorCamera => "SENSOR_CAMERA",
            DeviceType::SensorParking => "SENSOR_PARKING",
            DeviceType::SensorGasDetector => "SENSOR_GAS_DETECTOR",
            DeviceType::Aktuator => "AKTUATOR",
        }
    }

    /// 是否参与规则引擎的输入侧（仅通用 SENSOR）。
    pub fn is_rule_sensor(&self) -> bool {
        matches!(self, DeviceType::Sensor)
    }

    /// 是否参与规则引擎的输出侧。
    pub fn is_actuator(&self) -> bool {
        matches!(self, DeviceType::Aktuator)
    }

    /// 注册时的初始状态值：执行器默认关闭（"0"），其他类型为空。
    pub fn initial_status(&self) -> &'static str {
        if self.is_actuator() { "0" } else { "" }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 未知设备类型字符串。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown device type: {0}")]
pub struct UnknownDeviceType(pub String);

impl FromStr for DeviceType {
    type Err = UnknownDeviceType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DeviceType::ALL
            .iter()
            .copied()
            .find(|item| item.as_str() == value)
            .ok_or_else(|| UnknownDeviceType(value.to_string()))
    }
}

/// 设备在线状态（由 last_seen 是否过期推导）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityStatus {
    #[default]
    On,
    Off,
}

impl ConnectivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityStatus::On => "on",
            ConnectivityStatus::Off => "off",
        }
    }

    pub fn from_db(value: &str) -> Self {
        if value.eq_ignore_ascii_case("off") {
            ConnectivityStatus::Off
        } else {
            ConnectivityStatus::On
        }
    }
}
