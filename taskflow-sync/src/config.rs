//! Configuration system for the `TaskFlow` sync server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskflow-sync/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;

use taskflow_proto::task::MAX_TASK_TEXT_LENGTH;

/// Errors that can occur when loading sync server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure for the sync server.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncConfigFile {
    server: ServerFileConfig,
}

/// `[server]` section of the sync config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    max_text_len: Option<usize>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the sync server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "TaskFlow sync server")]
pub struct SyncCliArgs {
    /// Address to bind the sync server to.
    #[arg(short, long, env = "TASKFLOW_SYNC_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/taskflow-sync/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum task text length in characters.
    #[arg(long)]
    pub max_text_len: Option<usize>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKFLOW_SYNC_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved sync server configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:7878`).
    pub bind_addr: String,
    /// Maximum task text length in characters.
    pub max_text_len: usize,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7878".to_string(),
            max_text_len: MAX_TASK_TEXT_LENGTH,
            log_level: "info".to_string(),
        }
    }
}

impl SyncConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &SyncCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `SyncConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. Separated from `load()` to enable
    /// unit testing without CLI parsing.
    #[must_use]
    fn resolve(cli: &SyncCliArgs, file: &SyncConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            max_text_len: cli
                .max_text_len
                .or(file.server.max_text_len)
                .unwrap_or(defaults.max_text_len),
            log_level: cli.log_level.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and a missing
/// file is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<SyncConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(SyncConfigFile::default());
        };
        config_dir.join("taskflow-sync").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SyncConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:7878");
        assert_eq!(config.max_text_len, MAX_TASK_TEXT_LENGTH);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn toml_parsing_full() {
        let toml_str = r#"
[server]
bind_addr = "127.0.0.1:9100"
max_text_len = 200
"#;
        let file: SyncConfigFile = toml::from_str(toml_str).unwrap();
        let cli = SyncCliArgs {
            log_level: "info".to_string(),
            ..Default::default()
        };
        let config = SyncConfig::resolve(&cli, &file);

        assert_eq!(config.bind_addr, "127.0.0.1:9100");
        assert_eq!(config.max_text_len, 200);
    }

    #[test]
    fn cli_overrides_file() {
        let toml_str = r#"
[server]
bind_addr = "127.0.0.1:9100"
"#;
        let file: SyncConfigFile = toml::from_str(toml_str).unwrap();
        let cli = SyncCliArgs {
            bind: Some("127.0.0.1:9200".to_string()),
            log_level: "debug".to_string(),
            ..Default::default()
        };
        let config = SyncConfig::resolve(&cli, &file);

        assert_eq!(config.bind_addr, "127.0.0.1:9200");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn toml_parsing_empty() {
        let file: SyncConfigFile = toml::from_str("").unwrap();
        let cli = SyncCliArgs {
            log_level: "info".to_string(),
            ..Default::default()
        };
        let config = SyncConfig::resolve(&cli, &file);
        assert_eq!(config.bind_addr, "0.0.0.0:7878");
    }

    #[test]
    fn missing_default_config_file_is_ok() {
        assert!(load_config_file(None).is_ok());
    }

    #[test]
    fn explicit_missing_config_file_is_error() {
        let result = load_config_file(Some(std::path::Path::new("/nonexistent/config.toml")));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}
