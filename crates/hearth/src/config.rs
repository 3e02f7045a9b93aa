//! Server configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! { "bind_addr": "0.0.0.0:7777", "tick_rate_hz": 20, "allow_guests": true }
//! ```

use std::path::Path;
use std::time::Duration;

use hearth_protocol::{DEFAULT_MAX_FRAME_LEN, RoomId};
use hearth_session::SpawnBox;
use hearth_tick::{TickConfig, TickPolicy};
use serde::{Deserialize, Serialize};

/// Rejected configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything the server needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Authoritative ticks per second. 0 applies each message on arrival.
    pub tick_rate_hz: u32,
    /// What a late tick does to the schedule.
    pub tick_policy: TickPolicy,
    /// Share of the tick period (0.0 to 1.0) above which tick work is
    /// logged as over budget.
    pub tick_budget_warn_threshold: f64,
    /// Keep tick timing counters, logged when the server stops.
    pub tick_metrics: bool,
    /// World units moved per `Move`.
    pub move_step: i32,
    pub spawn: SpawnBox,
    pub rooms: Vec<RoomId>,
    /// Room new players appear in. Must be one of `rooms`.
    pub spawn_room: RoomId,
    pub credential_timeout_ms: u64,
    /// Rejected logins tolerated before the connection is kicked.
    pub max_auth_failures: u32,
    pub max_frame_len: usize,
    /// Messages buffered per client. A client whose queue fills up is
    /// disconnected.
    pub outbound_queue_len: usize,
    /// Let `AddPlayer` spawn an unauthenticated guest.
    pub allow_guests: bool,
    /// Fixed seed for spawn placement. Random when absent.
    pub spawn_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7777".to_string(),
            tick_rate_hz: 30,
            tick_policy: TickPolicy::default(),
            tick_budget_warn_threshold: 0.8,
            tick_metrics: true,
            move_step: 1,
            spawn: SpawnBox::default(),
            rooms: ["town_square", "forest", "harbor"]
                .into_iter()
                .map(RoomId::new)
                .collect(),
            spawn_room: RoomId::new("town_square"),
            credential_timeout_ms: 2_000,
            max_auth_failures: 3,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            outbound_queue_len: 256,
            allow_guests: false,
            spawn_seed: None,
        }
    }
}

impl ServerConfig {
    /// Parses a JSON document and validates it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn credential_timeout(&self) -> Duration {
        Duration::from_millis(self.credential_timeout_ms)
    }

    /// Scheduler settings for the tick loop.
    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            tick_rate_hz: self.tick_rate_hz,
            policy: self.tick_policy,
            budget_warn_threshold: self.tick_budget_warn_threshold,
            metrics_enabled: self.tick_metrics,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rooms.is_empty() {
            return Err(ConfigError::Invalid("at least one room is required".into()));
        }
        if !self.rooms.contains(&self.spawn_room) {
            return Err(ConfigError::Invalid(format!(
                "spawn_room {} is not in rooms",
                self.spawn_room
            )));
        }
        if !self.spawn.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "spawn box is inverted: {:?}",
                self.spawn
            )));
        }
        if self.move_step == 0 {
            return Err(ConfigError::Invalid("move_step must be non-zero".into()));
        }
        if self.max_frame_len == 0 {
            return Err(ConfigError::Invalid("max_frame_len must be non-zero".into()));
        }
        if self.outbound_queue_len == 0 {
            return Err(ConfigError::Invalid("outbound_queue_len must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&self.tick_budget_warn_threshold) {
            return Err(ConfigError::Invalid(format!(
                "tick_budget_warn_threshold {} is outside 0.0..=1.0",
                self.tick_budget_warn_threshold
            )));
        }
        Ok(())
    }
}
