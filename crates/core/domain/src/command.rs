use std::fmt;
use std::str::FromStr;

/// 设备命令分隔符。
pub const COMMAND_DELIMITER: char = '#';

/// `guid#value` 报文解析后的设备命令。
///
/// 线上格式保持不变；进入系统后只传递该结构体。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    pub guid: String,
    pub value: String,
}

/// 命令报文解析错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandParseError {
    #[error("expected exactly 2 fields separated by '#', got {0}")]
    FieldCount(usize),
    #[error("device guid is empty")]
    EmptyGuid,
    #[error("payload is not valid utf-8")]
    Encoding,
}

impl DeviceCommand {
    pub fn new(guid: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            value: value.into(),
        }
    }

    /// 从原始消息体解析（MQTT/AMQP payload）。
    pub fn from_payload(payload: &[u8]) -> Result<Self, CommandParseError> {
        let text = std::str::from_utf8(payload).map_err(|_| CommandParseError::Encoding)?;
        text.parse()
    }

    /// 线上格式 `guid#value`。
    pub fn to_wire(&self) -> String {
        format!("{}{}{}", self.guid, COMMAND_DELIMITER, self.value)
    }
}

impl FromStr for DeviceCommand {
    type Err = CommandParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let parts: Vec<&str> = text.split(COMMAND_DELIMITER).collect();
        if parts.len() != 2 {
            return Err(CommandParseError::FieldCount(parts.len()));
        }
        let guid = parts[0].trim();
        if guid.is_empty() {
            return Err(CommandParseError::EmptyGuid);
        }
        Ok(Self::new(guid, parts[1].trim()))
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.guid, COMMAND_DELIMITER, self.value)
    }
}
