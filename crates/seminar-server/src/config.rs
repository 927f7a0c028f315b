//! Server configuration loading from file and environment variables.

use seminar_types::DEFAULT_MAX_PARTICIPANTS;
use seminar_voice::{AgentConfig, LiveKitConfig};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// LiveKit room service credentials.
    #[serde(default)]
    pub livekit: LiveKitConfig,

    /// How to launch the conversational agent.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Defaults for new seminar rooms.
    #[serde(default)]
    pub seminar: SeminarConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "seminar_orchestrator=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Defaults applied when a create request leaves a field out.
#[derive(Debug, Clone, Deserialize)]
pub struct SeminarConfig {
    #[serde(default = "default_max_participants")]
    pub default_max_participants: u32,

    #[serde(default = "default_recording_enabled")]
    pub default_recording_enabled: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_participants() -> u32 {
    DEFAULT_MAX_PARTICIPANTS
}

fn default_recording_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for SeminarConfig {
    fn default() -> Self {
        Self {
            default_max_participants: default_max_participants(),
            default_recording_enabled: default_recording_enabled(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but is unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `SEMINAR_HOST` overrides `server.host`
/// - `SEMINAR_PORT` overrides `server.port`
/// - `SEMINAR_LOG_LEVEL` overrides `logging.level`
/// - `SEMINAR_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `LIVEKIT_URL`, `LIVEKIT_API_KEY`, `LIVEKIT_API_SECRET` override `livekit.*`
/// - `SEMINAR_AGENT_PROGRAM` overrides `agent.program`
/// - `SEMINAR_AGENT_GRACE_MS` overrides `agent.grace_period_ms`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if the result fails validation.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;

    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("SEMINAR_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("SEMINAR_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = var("SEMINAR_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("SEMINAR_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(url) = var("LIVEKIT_URL") {
        config.livekit.url = url;
    }
    if let Some(key) = var("LIVEKIT_API_KEY") {
        config.livekit.api_key = key;
    }
    if let Some(secret) = var("LIVEKIT_API_SECRET") {
        config.livekit.api_secret = secret;
    }
    if let Some(program) = var("SEMINAR_AGENT_PROGRAM") {
        config.agent.program = program;
    }
    if let Some(grace) = var("SEMINAR_AGENT_GRACE_MS") {
        if let Ok(parsed) = grace.parse() {
            config.agent.grace_period_ms = parsed;
        }
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.seminar.default_max_participants == 0 {
        return Err(ConfigError::Invalid(
            "seminar.default_max_participants must be positive".to_string(),
        ));
    }
    if config.agent.program.trim().is_empty() {
        return Err(ConfigError::Invalid("agent.program must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn missing_file_uses_defaults() {
        let config = load_config(Some("/nonexistent/seminar.toml")).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.seminar.default_max_participants, 100);
        assert_eq!(config.agent.grace_period_ms, 5000);
    }

    #[test]
    fn file_sections_are_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [server]
            port = 8080

            [logging]
            level = "debug"
            json = true

            [livekit]
            url = "wss://example.livekit.cloud"
            api_key = "key"
            api_secret = "secret"

            [agent]
            program = "/usr/bin/python3"
            args = ["agent/seminar_agent.py", "start"]
            grace_period_ms = 2000

            [seminar]
            default_max_participants = 25
            "#
        )
        .unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.logging.json);
        assert_eq!(config.livekit.url, "wss://example.livekit.cloud");
        assert_eq!(config.agent.program, "/usr/bin/python3");
        assert_eq!(config.agent.grace_period_ms, 2000);
        assert_eq!(config.seminar.default_max_participants, 25);
        assert!(config.seminar.default_recording_enabled);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[server\nport = ").unwrap();
        assert!(matches!(
            load_config(file.path().to_str()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn zero_participants_is_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[seminar]\ndefault_max_participants = 0\n").unwrap();
        assert!(matches!(
            load_config(file.path().to_str()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("SEMINAR_PORT", "9000"),
            ("SEMINAR_LOG_JSON", "1"),
            ("LIVEKIT_URL", "ws://lk:7880"),
            ("LIVEKIT_API_SECRET", "from-env"),
            ("SEMINAR_AGENT_GRACE_MS", "750"),
            ("SEMINAR_HOST", "not-an-ip"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9000);
        assert!(config.logging.json);
        assert_eq!(config.livekit.url, "ws://lk:7880");
        assert_eq!(config.livekit.api_secret, "from-env");
        assert_eq!(config.agent.grace_period_ms, 750);
        assert_eq!(config.server.host, default_host(), "unparseable host is ignored");
    }
}
