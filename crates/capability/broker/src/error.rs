/// 消息代理错误。
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("connect error: {0}")]
    Connect(String),
    #[error("channel error: {0}")]
    Channel(String),
    #[error("declare error: {0}")]
    Declare(String),
    #[error("consume error: {0}")]
    Consume(String),
    #[error("publish error: {0}")]
    Publish(String),
    #[error("subscribe error: {0}")]
    Subscribe(String),
    #[error("instance not found: {0}")]
    InstanceNotFound(String),
    #[error("registry error: {0}")]
    Registry(String),
    #[error("handler error: {0}")]
    Handler(String),
}

impl From<lapin::Error> for BrokerError {
    fn from(err: lapin::Error) -> Self {
        BrokerError::Channel(err.to_string())
    }
}
