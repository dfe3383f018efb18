//! Configuration for the sigcomp command-line tool
//!
//! Sources, highest priority first:
//! 1. Command-line flags
//! 2. `SIGCOMP_*` environment variables
//! 3. Configuration files (.sigcomp.yaml, .sigcomp.json, ...)
//! 4. Built-in defaults

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sigcomp_engine::EngineConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SigcompConfig {
    /// Sampling grids and sentinels handed to the engine
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How results are printed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Pretty-print JSON results
    #[serde(default = "default_true")]
    pub pretty: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Force debug logging regardless of `level`
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<LogLevel> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            debug: false,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Warn
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the first config file found, then apply environment overrides
    pub fn load() -> Result<SigcompConfig> {
        let mut config = Self::load_from_files()?;
        Self::apply_environment_variables(&mut config)?;
        Ok(config)
    }

    /// Load an explicit file, then apply environment overrides
    pub fn load_with_file(path: &Path) -> Result<SigcompConfig> {
        let mut config = Self::load_from_file(path)?;
        Self::apply_environment_variables(&mut config)?;
        Ok(config)
    }

    fn load_from_files() -> Result<SigcompConfig> {
        for path in Self::find_config_files() {
            if path.is_file() {
                info!("Loading configuration from: {}", path.display());
                return Self::load_from_file(&path);
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(SigcompConfig::default())
    }

    /// Candidate configuration paths in priority order
    pub fn find_config_files() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(config_path) = env::var("SIGCOMP_CONFIG") {
            if !config_path.is_empty() {
                paths.push(PathBuf::from(config_path));
            }
        }

        if let Ok(current_dir) = env::current_dir() {
            for name in [
                ".sigcomp.yaml",
                ".sigcomp.yml",
                ".sigcomp.json",
                ".sigcomp.toml",
                "sigcomp.config.yaml",
                "sigcomp.config.yml",
                "sigcomp.config.json",
                "sigcomp.config.toml",
            ] {
                paths.push(current_dir.join(name));
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".sigcomp.yaml"));
            paths.push(home_dir.join(".config/sigcomp/config.yaml"));
            paths.push(home_dir.join(".config/sigcomp/config.yml"));
            paths.push(home_dir.join(".config/sigcomp/config.json"));
            paths.push(home_dir.join(".config/sigcomp/config.toml"));
        }

        paths
    }

    /// Parse a config file, choosing the format from its extension
    pub fn load_from_file(path: &Path) -> Result<SigcompConfig> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            _ => {
                if let Ok(config) = serde_yaml::from_str(&content) {
                    config
                } else if let Ok(config) = toml::from_str(&content) {
                    config
                } else if let Ok(config) = serde_json::from_str(&content) {
                    config
                } else {
                    return Err(anyhow::anyhow!(
                        "Could not parse config file {} (tried YAML, TOML, JSON)",
                        path.display()
                    ));
                }
            }
        };

        Ok(config)
    }

    fn apply_environment_variables(config: &mut SigcompConfig) -> Result<()> {
        if let Some(points) = env_points("SIGCOMP_CONV_POINTS")? {
            config.engine.convolution.points = points;
        }
        if let Some(points) = env_points("SIGCOMP_FREQ_POINTS")? {
            config.engine.frequency.points = points;
        }
        if let Some(points) = env_points("SIGCOMP_STEP_POINTS")? {
            config.engine.step.points = points;
        }

        if let Some(pretty) = env::var("SIGCOMP_PRETTY").ok().and_then(|v| parse_bool(&v)) {
            config.output.pretty = pretty;
        }

        if let Ok(debug) = env::var("SIGCOMP_DEBUG") {
            config.logging.debug = parse_bool(&debug).unwrap_or(false);
        }

        if let Some(level) = env::var("SIGCOMP_LOG_LEVEL")
            .ok()
            .and_then(|v| LogLevel::parse(&v))
        {
            config.logging.level = level;
        }

        Ok(())
    }

    /// Write a config file, choosing the format from its extension (YAML
    /// when there is none)
    pub fn save_to_file(config: &SigcompConfig, path: &Path) -> Result<()> {
        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(config)
                .context("Failed to serialize config to JSON")?,
            Some("toml") => {
                toml::to_string_pretty(config).context("Failed to serialize config to TOML")?
            }
            _ => serde_yaml::to_string(config).context("Failed to serialize config to YAML")?,
        };

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    pub fn generate_sample_config() -> String {
        let config = SigcompConfig::default();
        serde_yaml::to_string(&config).unwrap_or_else(|_| "# Failed to generate config".to_string())
    }
}

/// Grid sizes must be at least 2 for the sampled outputs to be meaningful
fn env_points(name: &str) -> Result<Option<usize>> {
    let Ok(value) = env::var(name) else {
        return Ok(None);
    };
    if value.trim().is_empty() {
        return Ok(None);
    }
    let points: usize = value
        .trim()
        .parse()
        .with_context(|| format!("{name} must be a positive integer, got '{value}'"))?;
    if points < 2 {
        anyhow::bail!("{name} must be at least 2, got {points}");
    }
    Ok(Some(points))
}

/// Parse a boolean value from string with various formats
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enable" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disable" | "disabled" => Some(false),
        "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::Mutex;
    use tempfile::TempDir;

    static ENV_GUARD: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ENV_VARS: [&str; 6] = [
        "SIGCOMP_CONV_POINTS",
        "SIGCOMP_FREQ_POINTS",
        "SIGCOMP_STEP_POINTS",
        "SIGCOMP_PRETTY",
        "SIGCOMP_LOG_LEVEL",
        "SIGCOMP_DEBUG",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = SigcompConfig::default();
        assert_eq!(config.engine, EngineConfig::default());
        assert!(config.output.pretty);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(!config.logging.debug);
    }

    #[test]
    fn test_yaml_serialization() {
        let config = SigcompConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: SigcompConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let parsed: SigcompConfig =
            serde_yaml::from_str("output:\n  pretty: false\nlogging:\n  level: debug\n").unwrap();
        assert!(!parsed.output.pretty);
        assert_eq!(parsed.logging.level, LogLevel::Debug);
        assert_eq!(parsed.engine.convolution.points, 200);
    }

    #[test]
    fn test_file_loading_by_extension() {
        let temp_dir = TempDir::new().unwrap();

        let mut config = SigcompConfig::default();
        config.engine.convolution.points = 64;
        config.engine.frequency.points = 32;
        config.output.pretty = false;

        for name in [".sigcomp.yaml", "sigcomp.config.json", "sigcomp.config.toml"] {
            let path = temp_dir.path().join(name);
            ConfigLoader::save_to_file(&config, &path).unwrap();
            let loaded = ConfigLoader::load_from_file(&path).unwrap();
            assert_eq!(loaded, config, "{name}");
        }
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(ConfigLoader::load_from_file(&path).is_err());
    }

    #[test]
    fn test_sample_config_parses() {
        let sample = ConfigLoader::generate_sample_config();
        let parsed: SigcompConfig = serde_yaml::from_str(&sample).unwrap();
        assert_eq!(parsed, SigcompConfig::default());
    }

    #[test]
    fn test_bool_parsing() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("invalid"), None);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::parse("TRACE"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse(" warn "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
    }

    #[test]
    fn test_environment_overrides() {
        let _lock = ENV_GUARD.lock().unwrap();
        clear_env();
        env::set_var("SIGCOMP_CONV_POINTS", "50");
        env::set_var("SIGCOMP_FREQ_POINTS", "20");
        env::set_var("SIGCOMP_STEP_POINTS", "30");
        env::set_var("SIGCOMP_PRETTY", "off");
        env::set_var("SIGCOMP_LOG_LEVEL", "trace");
        env::set_var("SIGCOMP_DEBUG", "1");

        let mut config = SigcompConfig::default();
        let applied = ConfigLoader::apply_environment_variables(&mut config);
        clear_env();
        applied.unwrap();

        assert_eq!(config.engine.convolution.points, 50);
        assert_eq!(config.engine.frequency.points, 20);
        assert_eq!(config.engine.step.points, 30);
        assert!(!config.output.pretty);
        assert_eq!(config.logging.level, LogLevel::Trace);
        assert!(config.logging.debug);
    }

    #[test]
    fn test_invalid_point_counts_are_rejected() {
        let _lock = ENV_GUARD.lock().unwrap();
        clear_env();

        env::set_var("SIGCOMP_CONV_POINTS", "many");
        let mut config = SigcompConfig::default();
        assert!(ConfigLoader::apply_environment_variables(&mut config).is_err());

        env::set_var("SIGCOMP_CONV_POINTS", "1");
        assert!(ConfigLoader::apply_environment_variables(&mut config).is_err());

        env::set_var("SIGCOMP_CONV_POINTS", "");
        ConfigLoader::apply_environment_variables(&mut config).unwrap();
        assert_eq!(config.engine.convolution.points, 200);

        clear_env();
    }
}
