//! Configuration types for the link engine
//!
//! The target endpoint is fixed for the lifetime of a link once the
//! configuration is constructed.

use serde::{Deserialize, Serialize};

/// Main link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Server hostname to resolve and connect to
    pub host: String,

    /// Server TCP port
    pub port: u16,

    /// Optional engine tuning
    #[serde(default)]
    pub tuning: TuningConfig,
}

impl LinkConfig {
    /// Create a configuration with default tuning
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tuning: TuningConfig::default(),
        }
    }

    /// Set the tuning parameters
    pub fn with_tuning(mut self, tuning: TuningConfig) -> Self {
        self.tuning = tuning;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::LinkError> {
        if self.host.is_empty() {
            return Err(crate::LinkError::config("host cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::LinkError::config("port cannot be 0"));
        }
        if self.tuning.recv_buffer_bytes == 0 {
            return Err(crate::LinkError::config("recv_buffer_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Engine tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Delay before retrying a failed resolution or connection attempt
    /// (in milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Size of the scratch buffer used by the receive loop (in bytes)
    ///
    /// Inbound chunks are never larger than this; each delivered payload is
    /// a fresh copy sized to the bytes actually read.
    #[serde(default = "default_recv_buffer_bytes")]
    pub recv_buffer_bytes: usize,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            recv_buffer_bytes: default_recv_buffer_bytes(),
        }
    }
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_recv_buffer_bytes() -> usize {
    1024
}
