use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Timing and capacity knobs of a [`GnssLink`](crate::GnssLink)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkConfig {
    /// Transport read timeout outside of binary frames
    pub read_timeout: Duration,
    /// Read timeout while the remainder of a binary frame is awaited
    pub frame_timeout: Duration,
    /// Pause of the I/O loop after a read attempt found no data
    pub idle_sleep: Duration,
    pub sentence_queue_capacity: usize,
    pub frame_queue_capacity: usize,
    /// How long a command waits for its ACK/NAK
    pub ack_timeout: Duration,
    pub ack_poll_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            frame_timeout: Duration::from_secs(10),
            idle_sleep: Duration::from_millis(100),
            sentence_queue_capacity: 1000,
            frame_queue_capacity: 1000,
            ack_timeout: Duration::from_secs(10),
            ack_poll_interval: Duration::from_millis(100),
        }
    }
}

impl LinkConfig {
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    pub fn with_idle_sleep(mut self, sleep: Duration) -> Self {
        self.idle_sleep = sleep;
        self
    }

    /// Sets both read queue capacities
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.sentence_queue_capacity = capacity;
        self.frame_queue_capacity = capacity;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_ack_poll_interval(mut self, interval: Duration) -> Self {
        self.ack_poll_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device_timing() {
        let config = LinkConfig::default();
        assert_eq!(config.read_timeout, Duration::from_millis(100));
        assert_eq!(config.frame_timeout, Duration::from_secs(10));
        assert_eq!(config.sentence_queue_capacity, 1000);
        assert_eq!(config.frame_queue_capacity, 1000);
        assert_eq!(config.ack_timeout, Duration::from_secs(10));
    }

    #[test]
    fn builders_override_fields() {
        let config = LinkConfig::default()
            .with_queue_capacity(4)
            .with_ack_timeout(Duration::from_millis(50))
            .with_idle_sleep(Duration::ZERO);
        assert_eq!(config.sentence_queue_capacity, 4);
        assert_eq!(config.frame_queue_capacity, 4);
        assert_eq!(config.ack_timeout, Duration::from_millis(50));
        assert_eq!(config.idle_sleep, Duration::ZERO);
        assert_eq!(config.frame_timeout, Duration::from_secs(10));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: LinkConfig =
            serde_json::from_str(r#"{"sentence_queue_capacity": 5}"#).unwrap();
        assert_eq!(config.sentence_queue_capacity, 5);
        assert_eq!(config.frame_queue_capacity, 1000);
    }
}
