// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use codec::QoS;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants;
use crate::error::{Error, ErrorKind};

/// Broker configuration, deserialized from a TOML file.
///
/// Every option has a default, an empty file is a valid configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub general: General,

    #[serde(default)]
    pub queues: Queues,

    #[serde(default)]
    pub security: Security,

    #[serde(default)]
    pub storage: Storage,

    #[serde(default)]
    pub log: Log,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            Error::from_string(
                ErrorKind::ConfigError,
                format!("Failed to read config file {:?}, {err}", path.as_ref()),
            )
        })?;
        toml::from_str(&content).map_err(|err| {
            Error::from_string(
                ErrorKind::ConfigError,
                format!("Invalid toml config file {:?}, {err}", path.as_ref()),
            )
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct General {
    /// Address the daemon binds its MQTT listener to.
    #[serde(default = "General::default_listen_address")]
    pub listen_address: String,

    /// Maximum publish payload size accepted; 0 means no limit below the
    /// protocol ceiling of 268,435,455 bytes.
    #[serde(default)]
    pub message_size_limit: usize,

    /// Maximum whole-packet size advertised in CONNACK and enforced on
    /// inbound packets; 0 means no limit.
    #[serde(default)]
    pub max_packet_size: usize,

    /// Ceiling on negotiated keepalive. v5 clients above it are clamped via
    /// `server-keep-alive`; v3 clients are rejected. 0 disables checks.
    #[serde(default = "General::default_max_keepalive")]
    pub max_keepalive: u16,

    /// Highest QoS granted and accepted, 0..=2.
    #[serde(default = "General::default_max_qos")]
    pub max_qos: u8,

    /// Whether the RETAIN flag is honored.
    #[serde(default = "General::default_true")]
    pub retain_available: bool,

    /// Number of topic aliases an MQTT v5 client may create; 0 disallows
    /// aliases.
    #[serde(default = "General::default_max_topic_alias")]
    pub max_topic_alias: u16,

    /// Seconds from transport open to a complete CONNECT.
    #[serde(default = "General::default_timeout_handshake")]
    pub timeout_handshake: u64,

    /// Seconds to flush after a disconnect intent.
    #[serde(default = "General::default_timeout_close")]
    pub timeout_close: u64,

    /// Engine-side ping interval in seconds; 0 disables it.
    #[serde(default = "General::default_ping_interval")]
    pub ping_interval: u64,

    /// Emit a v5 DISCONNECT with a reason code on post-session protocol
    /// errors, instead of a bare close.
    #[serde(default = "General::default_true")]
    pub send_disconnect_on_error: bool,
}

impl General {
    fn default_listen_address() -> String {
        "0.0.0.0:1883".to_string()
    }

    const fn default_max_keepalive() -> u16 {
        constants::DEFAULT_MAX_KEEPALIVE
    }

    const fn default_max_qos() -> u8 {
        2
    }

    const fn default_true() -> bool {
        true
    }

    const fn default_max_topic_alias() -> u16 {
        constants::DEFAULT_MAX_TOPIC_ALIAS
    }

    const fn default_timeout_handshake() -> u64 {
        constants::DEFAULT_HANDSHAKE_TIMEOUT
    }

    const fn default_timeout_close() -> u64 {
        constants::DEFAULT_CLOSE_TIMEOUT
    }

    const fn default_ping_interval() -> u64 {
        constants::DEFAULT_PING_INTERVAL
    }

    /// Get `max_qos` as a codec level.
    #[must_use]
    pub fn max_qos(&self) -> QoS {
        match self.max_qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactOnce,
        }
    }

    /// Effective payload limit.
    #[must_use]
    pub fn payload_limit(&self) -> usize {
        if self.message_size_limit == 0 {
            constants::MAX_PAYLOAD_SIZE
        } else {
            self.message_size_limit.min(constants::MAX_PAYLOAD_SIZE)
        }
    }
}

impl Default for General {
    fn default() -> Self {
        Self {
            listen_address: Self::default_listen_address(),
            message_size_limit: 0,
            max_packet_size: 0,
            max_keepalive: Self::default_max_keepalive(),
            max_qos: Self::default_max_qos(),
            retain_available: true,
            max_topic_alias: Self::default_max_topic_alias(),
            timeout_handshake: Self::default_timeout_handshake(),
            timeout_close: Self::default_timeout_close(),
            ping_interval: Self::default_ping_interval(),
            send_disconnect_on_error: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Queues {
    /// Byte budget of unacked outbound QoS 1/2 messages; 0 means no limit.
    #[serde(default)]
    pub max_inflight_bytes: usize,

    /// Cap of concurrently unacked outbound messages. 0 means no maximum,
    /// 1 guarantees in-order delivery.
    #[serde(default = "Queues::default_max_inflight_messages")]
    pub max_inflight_messages: usize,

    /// Byte cap of the queued backlog beyond inflight; 0 means no limit.
    #[serde(default)]
    pub max_queued_bytes: usize,

    /// Message cap of the queued backlog beyond inflight; messages over the
    /// cap are silently dropped. 0 means no maximum.
    #[serde(default = "Queues::default_max_queued_messages")]
    pub max_queued_messages: usize,
}

impl Queues {
    const fn default_max_inflight_messages() -> usize {
        constants::DEFAULT_MAX_INFLIGHT_MESSAGES
    }

    const fn default_max_queued_messages() -> usize {
        constants::DEFAULT_MAX_QUEUED_MESSAGES
    }
}

impl Default for Queues {
    fn default() -> Self {
        Self {
            max_inflight_bytes: 0,
            max_inflight_messages: Self::default_max_inflight_messages(),
            max_queued_bytes: 0,
            max_queued_messages: Self::default_max_queued_messages(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Security {
    /// Whether clients that connect without a username are allowed.
    #[serde(default = "Security::default_true")]
    pub allow_anonymous: bool,

    /// Allow zero-length client ids; the broker assigns one.
    #[serde(default)]
    pub allow_zero_length_clientid: bool,

    /// Replace the client id with the authenticated username.
    #[serde(default)]
    pub use_username_as_clientid: bool,
}

impl Security {
    const fn default_true() -> bool {
        true
    }
}

impl Default for Security {
    fn default() -> Self {
        Self {
            allow_anonymous: true,
            allow_zero_length_clientid: false,
            use_username_as_clientid: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Storage {
    /// Whether client, credential and retained stores are written to disk.
    #[serde(default = "Storage::default_true")]
    pub persistence: bool,

    /// Directory holding persisted state.
    #[serde(default = "Storage::default_db_path")]
    pub db_path: PathBuf,

    /// Credential store file.
    #[serde(default = "Storage::default_password_file")]
    pub password_file: PathBuf,
}

impl Storage {
    const fn default_true() -> bool {
        true
    }

    fn default_db_path() -> PathBuf {
        PathBuf::from("/var/lib/faro")
    }

    fn default_password_file() -> PathBuf {
        PathBuf::from("/var/lib/faro/users.json")
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            persistence: true,
            db_path: Self::default_db_path(),
            password_file: Self::default_password_file(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Log {
    #[serde(default = "Log::default_console_log")]
    pub console_log: bool,

    #[serde(default = "Log::default_level")]
    pub level: LogLevel,

    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Log {
    const fn default_console_log() -> bool {
        true
    }

    const fn default_level() -> LogLevel {
        LogLevel::Info
    }
}

impl Default for Log {
    fn default() -> Self {
        Self {
            console_log: true,
            level: LogLevel::Info,
            log_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.general.max_keepalive, 65535);
        assert_eq!(config.general.max_qos(), QoS::ExactOnce);
        assert_eq!(config.queues.max_inflight_messages, 20);
        assert_eq!(config.queues.max_queued_messages, 1000);
        assert!(config.security.allow_anonymous);
        assert!(!config.security.allow_zero_length_clientid);
        assert!(config.general.retain_available);
        assert_eq!(config.general.max_topic_alias, 10);
    }

    #[test]
    fn test_partial_config() {
        let content = r#"
[general]
max_qos = 1
message_size_limit = 1024

[security]
allow_anonymous = false
"#;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.general.max_qos(), QoS::AtLeastOnce);
        assert_eq!(config.general.payload_limit(), 1024);
        assert!(!config.security.allow_anonymous);
        assert!(config.general.send_disconnect_on_error);
    }
}
