use std::path::Path;
use std::time::Duration;

use sensorlink_frame::MESSAGE_TYPE;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// Default delay before an unacknowledged frame is sent again.
pub const DEFAULT_RESEND_TIMEOUT_MS: u64 = 5000;
/// Default number of transmissions before a frame is given up.
pub const DEFAULT_MAX_RESENDS: u32 = 3;
/// Default wait for an expected answer.
pub const DEFAULT_ANSWER_TIMEOUT_MS: u64 = 2500;
/// Default number of endpoint slots.
pub const DEFAULT_CAPACITY: usize = 8;

/// Transport engine configuration.
///
/// Every field has a default, so a JSON document may override any subset:
///
/// ```
/// # use sensorlink_transport::TransportConfig;
/// let config = TransportConfig::from_json(r#"{ "max_resends": 5 }"#).unwrap();
/// assert_eq!(config.max_resends, 5);
/// assert_eq!(config.capacity, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Delay between transmissions of an unacknowledged frame.
    pub resend_timeout_ms: u64,
    /// Transmissions (first attempt included) before ABORT.
    pub max_resends: u32,
    /// How long `expect_answer` waits before closing the channel.
    pub answer_timeout_ms: u64,
    /// Number of endpoint slots.
    pub capacity: usize,
    /// Protocol type tag in the first header byte.
    pub message_type: u8,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            resend_timeout_ms: DEFAULT_RESEND_TIMEOUT_MS,
            max_resends: DEFAULT_MAX_RESENDS,
            answer_timeout_ms: DEFAULT_ANSWER_TIMEOUT_MS,
            capacity: DEFAULT_CAPACITY,
            message_type: MESSAGE_TYPE,
        }
    }
}

impl TransportConfig {
    pub fn with_resend_timeout(mut self, timeout: Duration) -> Self {
        self.resend_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_max_resends(mut self, max_resends: u32) -> Self {
        self.max_resends = max_resends;
        self
    }

    pub fn with_answer_timeout(mut self, timeout: Duration) -> Self {
        self.answer_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_message_type(mut self, message_type: u8) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn resend_timeout(&self) -> Duration {
        Duration::from_millis(self.resend_timeout_ms)
    }

    pub fn answer_timeout(&self) -> Duration {
        Duration::from_millis(self.answer_timeout_ms)
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            TransportError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(TransportError::InvalidConfig(
                "capacity must be at least 1".to_string(),
            ));
        }
        if self.max_resends == 0 {
            return Err(TransportError::InvalidConfig(
                "max_resends must be at least 1".to_string(),
            ));
        }
        if self.resend_timeout_ms == 0 {
            return Err(TransportError::InvalidConfig(
                "resend_timeout_ms must be positive".to_string(),
            ));
        }
        if self.answer_timeout_ms == 0 {
            return Err(TransportError::InvalidConfig(
                "answer_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
