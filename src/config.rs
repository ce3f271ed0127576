//! Configuration
//!
//! Defaults for every setting, overridable through `PAPER_TANKS_*`
//! environment variables.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::network::lobby::DEFAULT_COUNTDOWN_SECONDS;
use crate::network::manager::{
    ManagerConfig, DEFAULT_HEARTBEAT_MS, DEFAULT_INTERPOLATION_DELAY_MS, DEFAULT_SNAPSHOT_BUFFER,
    DEFAULT_SNAPSHOT_RATE,
};
use crate::network::frame::DEFAULT_MAX_FRAME_LEN;
use crate::network::transport::TransportConfig;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PAPER_TANKS_";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

/// Simulation settings.
#[derive(Clone, Debug)]
pub struct GameConfig {
    /// Ticks per second
    pub tick_rate: u32,
    /// Level asset name
    pub level: String,
    /// Directory searched for level files
    pub assets_dir: String,
    /// Seed for AI randomness
    pub seed: u64,
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: crate::TICK_RATE,
            level: "level1".to_string(),
            assets_dir: "assets".to_string(),
            seed: 0x5EED,
            log_level: "info".to_string(),
        }
    }
}

impl GameConfig {
    /// Seconds per tick.
    pub fn tick_seconds(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Tick period.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate.max(1) as u64)
    }

    /// Defaults overridden from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            tick_rate: parse_var("TICK_RATE", defaults.tick_rate)?,
            level: string_var("LEVEL", defaults.level),
            assets_dir: string_var("ASSETS_DIR", defaults.assets_dir),
            seed: parse_var("SEED", defaults.seed)?,
            log_level: string_var("LOG_LEVEL", defaults.log_level),
        })
    }
}

/// Transport and replication settings.
#[derive(Clone, Debug)]
pub struct NetConfig {
    /// Largest accepted frame payload
    pub max_frame_len: usize,
    /// Outbound frames buffered per connection
    pub queue_capacity: usize,
    /// Snapshots sent per second
    pub snapshot_rate: u32,
    /// Render delay behind the newest snapshot (ms)
    pub interpolation_delay_ms: u64,
    /// Snapshots kept for interpolation
    pub snapshot_buffer: usize,
    /// Socket read size
    pub read_chunk: usize,
    /// Heartbeat period (ms)
    pub heartbeat_ms: u64,
    /// Silence before a peer is dropped (ms)
    pub idle_timeout_ms: u64,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            queue_capacity: 256,
            snapshot_rate: DEFAULT_SNAPSHOT_RATE,
            interpolation_delay_ms: DEFAULT_INTERPOLATION_DELAY_MS,
            snapshot_buffer: DEFAULT_SNAPSHOT_BUFFER,
            read_chunk: 4096,
            heartbeat_ms: DEFAULT_HEARTBEAT_MS,
            idle_timeout_ms: 10_000,
        }
    }
}

impl NetConfig {
    /// Defaults overridden from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_frame_len: parse_var("MAX_FRAME_LEN", defaults.max_frame_len)?,
            queue_capacity: parse_var("QUEUE_CAPACITY", defaults.queue_capacity)?,
            snapshot_rate: parse_var("SNAPSHOT_RATE", defaults.snapshot_rate)?,
            interpolation_delay_ms: parse_var("INTERPOLATION_DELAY_MS", defaults.interpolation_delay_ms)?,
            snapshot_buffer: parse_var("SNAPSHOT_BUFFER", defaults.snapshot_buffer)?,
            read_chunk: parse_var("READ_CHUNK", defaults.read_chunk)?,
            heartbeat_ms: parse_var("HEARTBEAT_MS", defaults.heartbeat_ms)?,
            idle_timeout_ms: parse_var("IDLE_TIMEOUT_MS", defaults.idle_timeout_ms)?,
        })
    }

    /// Transport view.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            max_frame_len: self.max_frame_len,
            queue_capacity: self.queue_capacity,
            read_chunk: self.read_chunk,
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            ..TransportConfig::default()
        }
    }

    /// Network manager view.
    pub fn manager(&self) -> ManagerConfig {
        ManagerConfig {
            snapshot_rate: self.snapshot_rate,
            interpolation_delay_ms: self.interpolation_delay_ms,
            snapshot_buffer: self.snapshot_buffer,
            heartbeat_ms: self.heartbeat_ms,
            ..ManagerConfig::default()
        }
    }
}

/// Server endpoint settings.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen (server) or dial (client) address
    pub addr: SocketAddr,
    /// Maximum concurrent connections
    pub max_connections: usize,
    /// Lobby countdown length (seconds)
    pub countdown_seconds: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 7777)),
            max_connections: 8,
            countdown_seconds: DEFAULT_COUNTDOWN_SECONDS,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            addr: parse_var("ADDR", defaults.addr)?,
            max_connections: parse_var("MAX_CONNECTIONS", defaults.max_connections)?,
            countdown_seconds: parse_var("COUNTDOWN_SECONDS", defaults.countdown_seconds)?,
        })
    }
}

fn lookup(key: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{key}")).ok()
}

fn string_var(key: &str, default: String) -> String {
    lookup(key).unwrap_or(default)
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key: format!("{ENV_PREFIX}{key}"),
        value: raw.to_string(),
    })
}

// =============================================================================
// TESTS
// =============================================================================
