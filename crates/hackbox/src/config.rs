//! Server configuration: TOML file, environment, and command-line overrides.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hackbox_room::{Categories, RoundConfig};
use serde::{Deserialize, Serialize};

use crate::HackboxError;

/// Everything the server can be tuned with.
///
/// Every field has a default, so a config file only needs the keys it
/// changes:
///
/// ```toml
/// listen_addr = "127.0.0.1:4000"
///
/// [round]
/// round_length = 30.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub listen_addr: String,
    /// Comma- or newline-separated category list, read once at startup.
    pub categories_path: PathBuf,
    /// Command queue length of each room.
    pub room_channel_size: usize,
    /// A connection that sends nothing for this long, pongs included, is
    /// closed.
    pub idle_timeout_secs: u64,
    /// Interval between server pings on each connection.
    pub heartbeat_interval_secs: u64,
    pub round: RoundConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            categories_path: PathBuf::from("data/categories.csv"),
            room_channel_size: 64,
            idle_timeout_secs: 300,
            heartbeat_interval_secs: 30,
            round: RoundConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads a config file. With no path, `hackbox.toml` in the working
    /// directory is used if present, otherwise the defaults.
    ///
    /// An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, HackboxError> {
        let (path, required) = match path {
            Some(p) => (p, true),
            None => (Path::new("hackbox.toml"), false),
        };

        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_toml(&content)?;
                tracing::info!(path = %path.display(), "loaded configuration");
                Ok(config)
            }
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no hackbox.toml found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(HackboxError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, HackboxError> {
        toml::from_str(content).map_err(|e| HackboxError::Config(e.to_string()))
    }

    /// Applies the `PORT` environment variable, if set.
    pub fn apply_env(&mut self) -> Result<(), HackboxError> {
        if let Ok(port) = std::env::var("PORT") {
            if !port.is_empty() {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| HackboxError::Config(format!("PORT is not a port number: {port:?}")))?;
                self.set_port(port)?;
            }
        }
        Ok(())
    }

    /// Keeps the host of `listen_addr` and replaces its port.
    pub fn set_port(&mut self, port: u16) -> Result<(), HackboxError> {
        let mut addr = self.socket_addr()?;
        addr.set_port(port);
        self.listen_addr = addr.to_string();
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, HackboxError> {
        self.listen_addr
            .parse()
            .map_err(|_| HackboxError::Config(format!("listen_addr {:?} is not a socket address", self.listen_addr)))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Rejects values the server cannot run with.
    pub fn validate(&self) -> Result<(), HackboxError> {
        self.socket_addr()?;

        let invalid = |msg: &str| -> Result<(), HackboxError> { Err(HackboxError::Config(msg.to_string())) };
        if self.room_channel_size == 0 {
            return invalid("room_channel_size must be > 0");
        }
        if self.idle_timeout_secs == 0 {
            return invalid("idle_timeout_secs must be > 0");
        }
        if self.heartbeat_interval_secs == 0 || self.heartbeat_interval_secs >= self.idle_timeout_secs {
            return invalid("heartbeat_interval_secs must be > 0 and below idle_timeout_secs");
        }

        let round = &self.round;
        if !(round.round_length > 0.0) {
            return invalid("round.round_length must be > 0");
        }
        if !(round.tick_step > 0.0) {
            return invalid("round.tick_step must be > 0");
        }
        if round.tick_interval_ms == 0 {
            return invalid("round.tick_interval_ms must be > 0");
        }
        if !(0.0..1.0).contains(&round.decay_rate) {
            return invalid("round.decay_rate must be in [0, 1)");
        }
        Ok(())
    }

    /// Reads the category master list.
    pub fn load_categories(&self) -> Result<Categories, HackboxError> {
        let text = std::fs::read_to_string(&self.categories_path).map_err(|source| HackboxError::Io {
            path: self.categories_path.clone(),
            source,
        })?;
        let categories = Categories::parse(&text);
        if categories.is_empty() {
            tracing::warn!(
                path = %self.categories_path.display(),
                "category list is empty, no round can start"
            );
        } else {
            tracing::info!(count = categories.len(), "loaded categories");
        }
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
        assert_eq!(cfg.categories_path, PathBuf::from("data/categories.csv"));
        assert_eq!(cfg.room_channel_size, 64);
        assert_eq!(cfg.idle_timeout(), Duration::from_secs(300));
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(cfg.round, RoundConfig::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let cfg = ServerConfig::from_toml(
            r#"
            listen_addr = "127.0.0.1:4000"

            [round]
            round_length = 30.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:4000");
        assert_eq!(cfg.round.round_length, 30.0);
        assert_eq!(cfg.round.tick_step, 0.5);
        assert_eq!(cfg.idle_timeout_secs, 300);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = ServerConfig::from_toml("listen_addr = [").unwrap_err();
        assert!(matches!(err, HackboxError::Config(_)));
    }

    #[test]
    fn test_set_port_keeps_host() {
        let mut cfg = ServerConfig::default();
        cfg.set_port(8123).unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8123");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            ServerConfig {
                listen_addr: "not an address".into(),
                ..Default::default()
            },
            ServerConfig {
                room_channel_size: 0,
                ..Default::default()
            },
            ServerConfig {
                heartbeat_interval_secs: 0,
                ..Default::default()
            },
            ServerConfig {
                idle_timeout_secs: 20,
                heartbeat_interval_secs: 20,
                ..Default::default()
            },
            ServerConfig {
                round: RoundConfig {
                    tick_step: 0.0,
                    ..Default::default()
                },
                ..Default::default()
            },
            ServerConfig {
                round: RoundConfig {
                    round_length: f64::NAN,
                    ..Default::default()
                },
                ..Default::default()
            },
            ServerConfig {
                round: RoundConfig {
                    tick_interval_ms: 0,
                    ..Default::default()
                },
                ..Default::default()
            },
            ServerConfig {
                round: RoundConfig {
                    decay_rate: 1.0,
                    ..Default::default()
                },
                ..Default::default()
            },
        ];
        for cfg in bad {
            assert!(
                matches!(cfg.validate(), Err(HackboxError::Config(_))),
                "accepted {cfg:?}"
            );
        }
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = ServerConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, HackboxError::Io { .. }));
    }

    #[test]
    fn test_missing_categories_file_is_an_error() {
        let cfg = ServerConfig {
            categories_path: PathBuf::from("/definitely/not/categories.csv"),
            ..Default::default()
        };
        assert!(matches!(cfg.load_categories(), Err(HackboxError::Io { .. })));
    }

    #[test]
    fn test_load_categories_from_file() {
        let path = std::env::temp_dir().join(format!("hackbox-categories-{}.csv", std::process::id()));
        std::fs::write(&path, "Animals, Foods\nMovies\n").unwrap();
        let cfg = ServerConfig {
            categories_path: path.clone(),
            ..Default::default()
        };
        let categories = cfg.load_categories().unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(categories.as_slice(), ["Animals", "Foods", "Movies"]);
    }
}
