//! Configuration management for live-serve.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::session::{LiveOptions, DEFAULT_PORT};
use crate::watcher::{WatchOptions, DEFAULT_DEBOUNCE, DEFAULT_IGNORE_PATTERNS};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerSection,
    /// Watcher configuration.
    pub watch: WatchSection,
    /// Directory to serve; `None` means the working directory.
    pub root: Option<PathBuf>,
    /// Inject the reload client into served HTML.
    pub inject_script: bool,
    /// Logging configuration.
    pub logging: LoggingSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            watch: WatchSection::default(),
            root: None,
            inject_script: true,
            logging: LoggingSection::default(),
        }
    }
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Walk forward to a free port when `port` is taken.
    pub port_fallback: bool,
    /// Send permissive CORS headers.
    pub cors: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            port_fallback: false,
            cors: true,
        }
    }
}

/// Watcher configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    /// Globs, relative to the root, whose changes are ignored.
    pub ignore_patterns: Vec<String>,
    /// Debounce window in milliseconds.
    pub debounce_ms: u64,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup (for testing).
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("LIVE_SERVE_HOST") {
            self.server.host = host;
        }

        if let Some(port) = lookup("LIVE_SERVE_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Some(root) = lookup("LIVE_SERVE_ROOT") {
            if !root.is_empty() {
                self.root = Some(PathBuf::from(root));
            }
        }

        if let Some(level) = lookup("LIVE_SERVE_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(ref root) = args.root {
            self.root = Some(root.clone());
        }

        for pattern in &args.ignore {
            if !self.watch.ignore_patterns.contains(pattern) {
                self.watch.ignore_patterns.push(pattern.clone());
            }
        }

        if let Some(ms) = args.debounce_ms {
            self.watch.debounce_ms = ms;
        }

        if args.port_fallback {
            self.server.port_fallback = true;
        }
        if args.no_inject {
            self.inject_script = false;
        }
        if args.no_cors {
            self.server.cors = false;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Convert to the options `go_live` takes.
    pub fn to_live_options(&self) -> Result<LiveOptions, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;

        Ok(LiveOptions {
            root: self.root.clone(),
            host: host.to_string(),
            port: self.server.port,
            port_fallback: self.server.port_fallback,
            cors: self.server.cors,
            inject_script: self.inject_script,
            watch: WatchOptions {
                ignore_patterns: self.watch.ignore_patterns.clone(),
                debounce: Duration::from_millis(self.watch.debounce_ms),
            },
            ..LiveOptions::default()
        })
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5500);
        assert!(config.server.cors);
        assert!(config.inject_script);
        assert_eq!(config.watch.debounce_ms, 100);
        assert!(config.watch.ignore_patterns.contains(&".git/**".to_string()));
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "server": { "host": "0.0.0.0", "port": 8080, "port_fallback": true },
            "watch": { "ignore_patterns": ["dist/**"], "debounce_ms": 250 },
            "root": "public",
            "inject_script": false
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert!(config.server.port_fallback);
        assert_eq!(config.watch.ignore_patterns, vec!["dist/**".to_string()]);
        assert_eq!(config.watch.debounce_ms, 250);
        assert_eq!(config.root, Some(PathBuf::from("public")));
        assert!(!config.inject_script);
    }

    #[test]
    fn test_config_partial_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{ "server": { "port": 9000 } }"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert!(config.inject_script);
    }

    #[test]
    fn test_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_apply_env() {
        let vars: HashMap<&str, &str> = [
            ("LIVE_SERVE_HOST", "0.0.0.0"),
            ("LIVE_SERVE_PORT", "7000"),
            ("LIVE_SERVE_ROOT", "site"),
            ("RUST_LOG", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.root, Some(PathBuf::from("site")));
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_env_log_level_beats_rust_log() {
        let mut config = Config::default();
        config.apply_env_from(|k| match k {
            "LIVE_SERVE_LOG_LEVEL" => Some("warn".to_string()),
            "RUST_LOG" => Some("trace".to_string()),
            _ => None,
        });
        assert_eq!(config.log_filter(), "warn");
    }

    #[test]
    fn test_env_bad_port_ignored() {
        let mut config = Config::default();
        config.apply_env_from(|k| (k == "LIVE_SERVE_PORT").then(|| "lots".to_string()));
        assert_eq!(config.server.port, 5500);
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            host: Some("192.168.1.1".parse().unwrap()),
            port: Some(5000),
            root: Some(PathBuf::from("docs")),
            ignore: vec!["dist/**".to_string()],
            debounce_ms: Some(50),
            no_inject: true,
            no_cors: true,
            port_fallback: true,
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.root, Some(PathBuf::from("docs")));
        assert!(config.watch.ignore_patterns.contains(&"dist/**".to_string()));
        assert!(config.watch.ignore_patterns.contains(&".git/**".to_string()));
        assert_eq!(config.watch.debounce_ms, 50);
        assert!(!config.inject_script);
        assert!(!config.server.cors);
        assert!(config.server.port_fallback);
    }

    #[test]
    fn test_unset_args_keep_lower_priority_values() {
        let mut config = Config::default();
        config.server.port = 7000;
        config.apply_args(&Args::default());
        assert_eq!(config.server.port, 7000);
        assert!(config.inject_script);
    }

    #[test]
    fn test_to_live_options() {
        let mut config = Config::default();
        config.root = Some(PathBuf::from("public"));
        config.watch.debounce_ms = 30;

        let options = config.to_live_options().unwrap();
        assert_eq!(options.host, "127.0.0.1");
        assert_eq!(options.port, 5500);
        assert_eq!(options.root, Some(PathBuf::from("public")));
        assert_eq!(options.watch.debounce, Duration::from_millis(30));
        assert!(options.inject_script);
    }

    #[test]
    fn test_invalid_host() {
        let mut config = Config::default();
        config.server.host = "not-an-ip".to_string();

        let result = config.to_live_options();
        assert!(matches!(result, Err(ConfigError::InvalidHost(_))));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"ignore_patterns\""));
        assert!(json.contains("\"port\""));
    }
}
