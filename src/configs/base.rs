use serde::{Deserialize, Serialize};

use crate::{common::types::AnyResult, configs::*};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn load() -> AnyResult<Self> {
        let config_path = if std::path::Path::new("config.toml").exists() {
            "config.toml"
        } else if std::path::Path::new("config.default.toml").exists() {
            "config.default.toml"
        } else {
            return Err("config.toml or config.default.toml not found".into());
        };

        println!("Loading configuration from: {}", config_path);

        let config_str = std::fs::read_to_string(config_path)?;
        if config_str.trim().is_empty() {
            return Err(format!("{} is empty", config_path).into());
        }

        Self::from_toml(&config_str)
    }

    pub fn from_toml(raw: &str) -> AnyResult<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AnyResult<()> {
        let player = &self.player;
        if player.default_volume > 200 {
            return Err(format!(
                "player.default_volume must be within 0..=200, got {}",
                player.default_volume
            )
            .into());
        }
        if player.tts_volume > 200 {
            return Err(format!(
                "player.tts_volume must be within 0..=200, got {}",
                player.tts_volume
            )
            .into());
        }
        if player.max_queue_size == 0 {
            return Err("player.max_queue_size must be greater than 0".into());
        }
        if player.max_sessions == 0 {
            return Err("player.max_sessions must be greater than 0".into());
        }
        if self.server.password.is_empty() {
            return Err("server.password must not be empty".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            password = "secret"
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.server.port, 2444);
        assert_eq!(config.player.default_volume, 20);
        assert_eq!(config.player.max_queue_size, 9000);
        assert_eq!(config.voice.sink, SinkKind::Null);
        assert!(config.logging.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000
            password = "pw"

            [player]
            default_volume = 50
            max_queue_size = 3
            auto_leave_timeout_secs = 60

            [voice]
            sink = "wav"
            wav_dir = "/tmp/caps"

            [logging]
            level = "debug"

            [logging.file]
            path = "logs/voxmix.log"
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.player.max_queue_size, 3);
        assert_eq!(config.player.auto_leave_timeout().as_secs(), 60);
        assert_eq!(config.voice.sink, SinkKind::Wav);
        let file = config.logging.and_then(|l| l.file).expect("file logging");
        assert_eq!(file.max_lines, 10_000);
    }

    #[test]
    fn test_rejects_out_of_range_volume() {
        let err = Config::from_toml(
            r#"
            [server]
            password = "pw"
            [player]
            default_volume = 250
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_zero_queue() {
        let err = Config::from_toml(
            r#"
            [server]
            password = "pw"
            [player]
            max_queue_size = 0
            "#,
        );
        assert!(err.is_err());
    }
}
