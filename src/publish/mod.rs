pub mod encode;
pub mod frame;
pub mod pool;
pub mod throttle;

pub use encode::PayloadEncoder;
pub use frame::{FramePublisher, FrameReport};
pub use pool::{Dispatcher, PublishJob, Publisher};
pub use throttle::ImageThrottle;

use std::sync::atomic::{AtomicU64, Ordering};

/// Outbound side of the pub/sub broker.
pub trait MessageSink: Send + Sync {
    fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

/// 发布错误类型
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Broker rejected publish: {0}")]
    Broker(String),
    #[error("Publish queue is closed")]
    QueueClosed,
    #[error("Failed to start publish worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// 发布计数器, 在帧线程与发布线程之间共享
#[derive(Debug, Default)]
pub struct PublishStats {
    states_sent: AtomicU64,
    images_sent: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub states_sent: u64,
    pub images_sent: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl PublishStats {
    pub fn record_state(&self) {
        self.states_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_image(&self) {
        self.images_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_drop(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            states_sent: self.states_sent.load(Ordering::Relaxed),
            images_sent: self.images_sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{MessageSink, PublishError};
    use std::sync::Mutex;

    /// Keeps every published message in memory.
    #[derive(Default)]
    pub struct RecordingSink {
        messages: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl RecordingSink {
        pub fn messages(&self) -> Vec<(String, Vec<u8>)> {
            self.messages.lock().unwrap().clone()
        }

        pub fn on_channel(&self, channel: &str) -> Vec<String> {
            self.messages()
                .into_iter()
                .filter(|(c, _)| c == channel)
                .map(|(_, payload)| String::from_utf8(payload).unwrap())
                .collect()
        }
    }

    impl MessageSink for RecordingSink {
        fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), PublishError> {
            self.messages
                .lock()
                .unwrap()
                .push((channel.to_string(), payload));
            Ok(())
        }
    }

    pub struct RejectingSink;

    impl MessageSink for RejectingSink {
        fn publish(&self, _channel: &str, _payload: Vec<u8>) -> Result<(), PublishError> {
            Err(PublishError::Broker("connection refused".to_string()))
        }
    }
}
