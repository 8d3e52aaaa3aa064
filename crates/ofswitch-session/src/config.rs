//! Session configuration.
//!
//! Loaded from the `[session]` table of a TOML file, with every field
//! optional and falling back to the defaults below.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{SessionError, SessionResult};
use crate::message::HEADER_LEN;

/// Per-connection session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Upper bound on waiting for a reply, in milliseconds.
    ///
    /// Unset means callers wait until the device replies or the
    /// connection closes.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    /// Interval of the background expiry sweep, in milliseconds.
    ///
    /// Only used together with `request_timeout_ms`.
    #[serde(default)]
    pub expiry_sweep_interval_ms: Option<u64>,

    /// Largest message accepted for sending, header included.
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,

    /// Number of barrier-acknowledged requests after which a barrier is
    /// sent automatically.
    #[serde(default = "default_barrier_count_limit")]
    pub barrier_count_limit: usize,

    /// Interval after which unacknowledged modifications are flushed with
    /// a barrier, in milliseconds.
    #[serde(default = "default_barrier_interval_ms")]
    pub barrier_interval_ms: u64,

    /// Capacity of the outbound queue between issuer and connection writer.
    #[serde(default = "default_outbound_queue_depth")]
    pub outbound_queue_depth: usize,

    /// Capacity of the inbound queue between connection reader and dispatcher.
    #[serde(default = "default_inbound_queue_depth")]
    pub inbound_queue_depth: usize,
}

fn default_max_message_len() -> usize {
    u16::MAX as usize
}

fn default_barrier_count_limit() -> usize {
    25600
}

fn default_barrier_interval_ms() -> u64 {
    500
}

fn default_outbound_queue_depth() -> usize {
    1024
}

fn default_inbound_queue_depth() -> usize {
    1024
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: None,
            expiry_sweep_interval_ms: None,
            max_message_len: default_max_message_len(),
            barrier_count_limit: default_barrier_count_limit(),
            barrier_interval_ms: default_barrier_interval_ms(),
            outbound_queue_depth: default_outbound_queue_depth(),
            inbound_queue_depth: default_inbound_queue_depth(),
        }
    }
}

impl SessionConfig {
    /// Reply timeout as a Duration, if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Expiry sweep interval, if both the sweep and a timeout are configured.
    pub fn expiry_sweep_interval(&self) -> Option<Duration> {
        match (self.request_timeout_ms, self.expiry_sweep_interval_ms) {
            (Some(_), Some(interval)) => Some(Duration::from_millis(interval)),
            _ => None,
        }
    }

    /// Barrier flush interval as a Duration.
    pub fn barrier_interval(&self) -> Duration {
        Duration::from_millis(self.barrier_interval_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> SessionResult<()> {
        if self.max_message_len <= HEADER_LEN || self.max_message_len > u16::MAX as usize {
            return Err(SessionError::validation(format!(
                "max_message_len must be {}-{}",
                HEADER_LEN + 1,
                u16::MAX
            )));
        }

        if self.request_timeout_ms == Some(0) {
            return Err(SessionError::validation("request_timeout_ms must be > 0"));
        }

        if self.expiry_sweep_interval_ms == Some(0) {
            return Err(SessionError::validation(
                "expiry_sweep_interval_ms must be > 0",
            ));
        }

        if self.barrier_count_limit == 0 || self.barrier_interval_ms == 0 {
            return Err(SessionError::validation(
                "barrier_count_limit and barrier_interval_ms must be > 0",
            ));
        }

        if self.outbound_queue_depth == 0 || self.inbound_queue_depth == 0 {
            return Err(SessionError::validation("queue depths must be > 0"));
        }

        Ok(())
    }
}
