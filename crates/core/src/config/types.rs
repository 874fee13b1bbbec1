use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Issued session tokens (used with `method = "session_token"`).
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    SessionToken,
}

/// A session token and the user it resolves to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    pub token: String,
    pub user_id: String,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: DatabaseBackend,
    /// SQLite file path (ignored by the memory backend).
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::default(),
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("ticketdesk.db")
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseBackend {
    Memory,
    #[default]
    Sqlite,
}

/// Ticket engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Namespace shared by every collection of this deployment.
    #[serde(default = "default_application_id")]
    pub application_id: String,
    /// Pending operations a single user's dispatch loop can queue before
    /// callers wait for a slot.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
    /// Snapshots buffered per listener. A listener that falls further behind
    /// loses the oldest ones.
    #[serde(default = "default_snapshot_buffer")]
    pub snapshot_buffer: usize,
    /// Seconds a collection with no listeners and no requests keeps its
    /// dispatch loop before the loop is retired. 0 keeps loops forever.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl EngineConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            application_id: default_application_id(),
            command_buffer: default_command_buffer(),
            snapshot_buffer: default_snapshot_buffer(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

fn default_application_id() -> String {
    "ticketdesk".to_string()
}

fn default_command_buffer() -> usize {
    64
}

fn default_snapshot_buffer() -> usize {
    16
}

fn default_idle_timeout_secs() -> u64 {
    300
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    /// Number of configured sessions; tokens themselves are never exposed.
    pub sessions_configured: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::SessionToken => "session_token".to_string(),
                },
                sessions_configured: config.auth.sessions.len(),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            engine: config.engine.clone(),
        }
    }
}
