//! 网关共享领域模型。
//!
//! - [`DeviceType`]：设备类型（线上字符串与设备固件保持一致，如 `AKTUATOR`）
//! - [`ConnectivityStatus`]：设备在线状态
//! - [`DeviceCommand`]：`guid#value` 报文在边界处解析后的类型化命令

pub mod command;
pub mod device;

pub use command::{CommandParseError, DeviceCommand};
pub use device::{ConnectivityStatus, DeviceType, UnknownDeviceType};

/// 当前 Unix 时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
