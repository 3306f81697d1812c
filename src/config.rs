//! # Configuration Management
//!
//! Centralized configuration for the protocol and session core.
//!
//! This module provides structured configuration for servers and clients,
//! including connection parameters, timeouts, chat/moderation defaults, and
//! control-plane settings.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Operational Considerations
//! - The handshake deadline bounds unauthenticated sockets
//! - The frame cap bounds per-message memory on both paths
//! - Chat defaults (broadcast color, kick messages) are validated at load time

use crate::core::wire::Color;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Current wire protocol version, exchanged during the handshake.
pub const PROTOCOL_VERSION: u16 = 2;

/// Default server port when a client address omits one.
pub const DEFAULT_PORT: u16 = 17230;

/// Max allowed frame size on either path (4 MB).
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Channel every session joins on activation.
pub const DEFAULT_CHANNEL: &str = "main";

/// Policy applied when an inbound message names an unregistered data type.
///
/// `Drop` skips the single frame and keeps the connection (tolerates protocol
/// version skew between independently updated builds); `Disconnect` closes the
/// peer on first contact with an unknown identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownDataPolicy {
    #[default]
    Drop,
    Disconnect,
}

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Chat and moderation defaults
    #[serde(default)]
    pub chat: ChatConfig,

    /// Administrative control-plane configuration
    #[serde(default)]
    pub control: ControlConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Start with defaults
        let mut config = Self::default();

        // Override with environment variables
        if let Ok(addr) = std::env::var("COOPNET_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(max) = std::env::var("COOPNET_MAX_CONNECTIONS") {
            if let Ok(val) = max.parse::<usize>() {
                config.server.max_connections = val;
            }
        }

        if let Ok(timeout) = std::env::var("COOPNET_AUTH_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.server.auth_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(password) = std::env::var("COOPNET_CONTROL_PASSWORD") {
            config.control.password = Some(password);
        }

        if let Ok(level) = std::env::var("COOPNET_LOG_LEVEL") {
            if let Ok(val) = level.parse::<Level>() {
                config.logging.log_level = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.chat.validate());
        errors.extend(self.control.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server listen address (e.g., "0.0.0.0:17230")
    pub address: String,

    /// Maximum number of concurrent sessions
    pub max_connections: usize,

    /// Deadline for a new peer to complete the handshake
    #[serde(with = "duration_serde")]
    pub auth_timeout: Duration,

    /// Time allowed for a disconnecting session to flush queued messages
    #[serde(with = "duration_serde")]
    pub disconnect_grace: Duration,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Maximum allowed frame size in bytes
    pub max_frame_size: usize,

    /// What to do with messages naming unregistered data types
    #[serde(default)]
    pub unknown_data: UnknownDataPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("0.0.0.0:{DEFAULT_PORT}"),
            max_connections: 256,
            auth_timeout: Duration::from_secs(10),
            disconnect_grace: Duration::from_secs(3),
            shutdown_timeout: Duration::from_secs(10),
            max_frame_size: MAX_FRAME_SIZE,
            unknown_data: UnknownDataPolicy::Drop,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:17230')",
                self.address
            ));
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure system resources can support this)",
                self.max_connections
            ));
        }

        if self.auth_timeout.as_millis() < 100 {
            errors.push("Auth timeout too short (minimum: 100ms)".to_string());
        } else if self.auth_timeout.as_secs() > 300 {
            errors.push("Auth timeout too long (maximum: 300s)".to_string());
        }

        if self.disconnect_grace.as_millis() < 100 {
            errors.push("Disconnect grace too short (minimum: 100ms)".to_string());
        } else if self.disconnect_grace.as_secs() > 60 {
            errors.push("Disconnect grace too long (maximum: 60s)".to_string());
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        if self.max_frame_size < 1024 {
            errors.push("Max frame size too small (minimum: 1 KB)".to_string());
        } else if self.max_frame_size > 64 * 1024 * 1024 {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum recommended: 64 MB)",
                self.max_frame_size
            ));
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Target server, "host" or "host:port" (port defaults to [`DEFAULT_PORT`])
    pub server: String,

    /// Display name sent in the handshake
    pub name: String,

    /// Login key for registered users; empty means guest
    pub key: String,

    /// Persistent random token identifying this installation across
    /// reconnects. Generated on first connect when absent.
    pub client_token: Option<u64>,

    /// Timeout for connection attempts
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Whether to automatically reconnect on connection loss
    pub auto_reconnect: bool,

    /// Maximum number of reconnect attempts before giving up
    pub max_reconnect_attempts: u32,

    /// Delay between reconnect attempts
    #[serde(with = "duration_serde")]
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: format!("127.0.0.1:{DEFAULT_PORT}"),
            name: String::from("Guest"),
            key: String::new(),
            client_token: None,
            connect_timeout: Duration::from_secs(5),
            auto_reconnect: true,
            max_reconnect_attempts: 3,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    /// Split the configured server string into host and port, applying
    /// [`DEFAULT_PORT`] when none is given.
    pub fn host_port(&self) -> (String, u16) {
        match self.server.rsplit_once(':') {
            Some((host, port)) => match port.parse::<u16>() {
                Ok(port) => (host.to_string(), port),
                Err(_) => (self.server.clone(), DEFAULT_PORT),
            },
            None => (self.server.clone(), DEFAULT_PORT),
        }
    }

    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.server.is_empty() {
            errors.push("Client server address cannot be empty".to_string());
        }

        if self.name.trim().is_empty() {
            errors.push("Client display name cannot be empty".to_string());
        } else if self.name.len() > 32 {
            errors.push(format!(
                "Client display name too long: {} characters (maximum: 32)",
                self.name.len()
            ));
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        }

        if self.auto_reconnect && self.max_reconnect_attempts == 0 {
            errors.push(
                "Max reconnect attempts must be greater than 0 when auto_reconnect is enabled"
                    .to_string(),
            );
        }

        if self.reconnect_delay.as_millis() < 10 {
            errors.push("Reconnect delay too short (minimum: 10ms)".to_string());
        } else if self.reconnect_delay.as_secs() > 60 {
            errors.push("Reconnect delay too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Chat and moderation defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Color applied to broadcasts unless the command input overrides it
    pub broadcast_color: String,

    /// Leave reason recorded on a non-quiet kick, shown to other players
    pub message_kick: String,

    /// Leave reason for an ordinary disconnect
    pub message_leave: String,

    /// Join announcement text
    pub message_join: String,

    /// Reason text sent to the kicked player when the operator gave none
    pub default_kick_reason: String,

    /// Number of delivered messages retained in the chat log
    pub log_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            broadcast_color: String::from("#00adee"),
            message_kick: String::from("got kicked"),
            message_leave: String::from("left the server"),
            message_join: String::from("joined the server"),
            default_kick_reason: String::from("You have been kicked from the server."),
            log_length: 128,
        }
    }
}

impl ChatConfig {
    /// Parsed broadcast color; falls back to white if the configured string
    /// slipped past validation.
    pub fn broadcast_color(&self) -> Color {
        Color::from_hex(&self.broadcast_color).unwrap_or(Color::WHITE)
    }

    /// Validate chat configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if Color::from_hex(&self.broadcast_color).is_none() {
            errors.push(format!(
                "Invalid broadcast color: '{}' (expected hex like '#00adee')",
                self.broadcast_color
            ));
        }

        if self.message_kick.is_empty() {
            errors.push("Kick message cannot be empty".to_string());
        }

        if self.message_leave.is_empty() {
            errors.push("Leave message cannot be empty".to_string());
        }

        if self.default_kick_reason.is_empty() {
            errors.push("Default kick reason cannot be empty".to_string());
        }

        if self.log_length == 0 {
            errors.push("Chat log length must be greater than 0".to_string());
        } else if self.log_length > 100_000 {
            errors.push(format!(
                "Chat log length very high: {} (maximum recommended: 100,000)",
                self.log_length
            ));
        }

        errors
    }
}

/// Administrative control-plane configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    /// Password the frontend must present to `auth`; `None` disables
    /// authentication entirely (every MustAuth command is rejected)
    pub password: Option<String>,

    /// Capacity of the frontend notification channel
    pub notify_capacity: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            password: None,
            notify_capacity: 64,
        }
    }
}

impl ControlConfig {
    /// Validate control configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Some(ref password) = self.password {
            if password.len() < 8 {
                errors.push("Control password too short (minimum: 8 characters)".to_string());
            }
        }

        if self.notify_capacity == 0 {
            errors.push("Notify capacity must be greater than 0".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("coopnet"),
            log_level: Level::INFO,
            log_to_console: true,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if !self.log_to_console {
            errors.push("At least one logging output must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
