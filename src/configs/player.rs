use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Playback and session-lifecycle tuning.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlayerConfig {
    /// Initial music volume of a new session, in percent (0-200).
    #[serde(default = "default_volume")]
    pub default_volume: u16,
    /// Initial speech-clip volume of a new session, in percent (0-200).
    #[serde(default = "default_tts_volume")]
    pub tts_volume: u16,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    #[serde(default = "default_inactive_timeout_minutes")]
    pub inactive_timeout_minutes: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_auto_leave_timeout_secs")]
    pub auto_leave_timeout_secs: u64,
    #[serde(default = "default_resolve_timeout_secs")]
    pub resolve_timeout_secs: u64,
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl PlayerConfig {
    pub fn inactive_timeout(&self) -> Duration {
        Duration::from_secs(self.inactive_timeout_minutes * 60)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn auto_leave_timeout(&self) -> Duration {
        Duration::from_secs(self.auto_leave_timeout_secs)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            tts_volume: default_tts_volume(),
            max_queue_size: default_max_queue_size(),
            max_sessions: default_max_sessions(),
            inactive_timeout_minutes: default_inactive_timeout_minutes(),
            sweep_interval_secs: default_sweep_interval_secs(),
            auto_leave_timeout_secs: default_auto_leave_timeout_secs(),
            resolve_timeout_secs: default_resolve_timeout_secs(),
            notify_timeout_secs: default_notify_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_volume() -> u16 {
    20
}

fn default_tts_volume() -> u16 {
    100
}

fn default_max_queue_size() -> usize {
    9000
}

fn default_max_sessions() -> usize {
    10_000
}

fn default_inactive_timeout_minutes() -> u64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_auto_leave_timeout_secs() -> u64 {
    10
}

fn default_resolve_timeout_secs() -> u64 {
    20
}

fn default_notify_timeout_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    35
}
