// Configuration loading and parsing (league.toml, engine.toml, credentials.toml).

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use subsync_core::engine::EngineSettings;
use subsync_core::throttle::ThrottleSettings;
use subsync_core::verifier::VerifySettings;
use subsync_core::{ExecutionPolicy, PositionCode};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub api: ApiConfig,
    pub engine: EngineConfig,
    pub verify: VerifyConfig,
    pub throttle: ThrottleConfig,
    /// Player id -> position token ("D", "MID", ...).
    pub positions: HashMap<String, String>,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[league]` table in league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub league_id: String,
    pub team_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// engine.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire engine.toml file.
#[derive(Debug, Clone, Deserialize)]
struct EngineFile {
    api: ApiConfig,
    engine: EngineConfig,
    verify: VerifyConfig,
    throttle: ThrottleConfig,
    #[serde(default)]
    positions: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub policy: String,
    pub ensure_unlocked: bool,
    pub apply_to_future_periods: bool,
    #[serde(default)]
    pub target_period: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyConfig {
    pub attempts: u32,
    pub delay_ms: u64,
    #[serde(default)]
    pub jitter_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    pub inter_phase_ms: u64,
    pub inter_swap_ms: u64,
    pub inter_swap_jitter_ms: u64,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    /// Raw `Cookie` header value of a logged-in browser session.
    pub cookie: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversion into engine settings
// ---------------------------------------------------------------------------

impl Config {
    /// Policy from engine.toml. Validation guarantees it parses.
    pub fn policy(&self) -> ExecutionPolicy {
        ExecutionPolicy::from_str_policy(&self.engine.policy).unwrap_or_default()
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let position_overrides = self
            .positions
            .iter()
            .filter_map(|(id, token)| PositionCode::from_token(token).map(|c| (id.clone(), c)))
            .collect();

        EngineSettings {
            policy: self.policy(),
            ensure_unlocked: self.engine.ensure_unlocked,
            apply_to_future_periods: self.engine.apply_to_future_periods,
            target_period: self.engine.target_period,
            position_overrides,
            verify: VerifySettings {
                attempts: self.verify.attempts,
                delay: Duration::from_millis(self.verify.delay_ms),
                jitter: Duration::from_millis(self.verify.jitter_ms),
            },
            throttle: ThrottleSettings {
                inter_phase: Duration::from_millis(self.throttle.inter_phase_ms),
                inter_swap: Duration::from_millis(self.throttle.inter_swap_ms),
                inter_swap_jitter: Duration::from_millis(self.throttle.inter_swap_jitter_ms),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml`,
/// `config/engine.toml`, and (optionally) `config/credentials.toml`,
/// all relative to the given `base_dir`.
///
/// Does not copy defaults. Prefer `load_config()` which does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- league.toml (required) ---
    let league_path = config_dir.join("league.toml");
    let league_file: LeagueFile = parse_file(&league_path)?;

    // --- engine.toml (required) ---
    let engine_path = config_dir.join("engine.toml");
    let engine_file: EngineFile = parse_file(&engine_path)?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        parse_file(&credentials_path)?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        league: league_file.league,
        api: engine_file.api,
        engine: engine_file.engine,
        verify: engine_file.verify,
        throttle: engine_file.throttle,
        positions: engine_file.positions,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };

        // Templates such as credentials.toml.example stay behind.
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to `base_dir`, copying defaults first.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = read_file(path)?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.league.league_id.trim().is_empty() {
        return Err(invalid("league.league_id", "must not be empty"));
    }
    if config.league.team_id.trim().is_empty() {
        return Err(invalid("league.team_id", "must not be empty"));
    }

    let base = &config.api.base_url;
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(invalid(
            "api.base_url",
            format!("must start with http:// or https://, got {base:?}"),
        ));
    }
    if config.api.timeout_secs == 0 {
        return Err(invalid("api.timeout_secs", "must be greater than 0"));
    }

    if ExecutionPolicy::from_str_policy(&config.engine.policy).is_none() {
        return Err(invalid(
            "engine.policy",
            format!(
                "must be \"strict\" or \"best_effort\", got {:?}",
                config.engine.policy
            ),
        ));
    }
    if config.engine.target_period == Some(0) {
        return Err(invalid(
            "engine.target_period",
            "must be greater than 0 when set",
        ));
    }

    if config.verify.attempts == 0 {
        return Err(invalid("verify.attempts", "must be greater than 0"));
    }

    for (player_id, token) in &config.positions {
        if PositionCode::from_token(token).is_none() {
            return Err(invalid(
                &format!("positions.{player_id}"),
                format!("unknown position {token:?}"),
            ));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Path to the subsync-cli crate root, whether tests run from the crate
    /// or the workspace root.
    fn project_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        if cwd.join("defaults").exists() {
            cwd
        } else if cwd.join("crates/subsync-cli/defaults").exists() {
            cwd.join("crates/subsync-cli")
        } else {
            panic!("Cannot locate defaults/ directory from CWD {:?}", cwd);
        }
    }

    /// Fresh temp dir with the shipped defaults under config/.
    fn temp_config(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let config_dir = tmp.join("config");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&config_dir).unwrap();

        let root = project_root();
        for file in ["league.toml", "engine.toml"] {
            fs::copy(root.join("defaults").join(file), config_dir.join(file)).unwrap();
        }
        tmp
    }

    fn assert_invalid(err: ConfigError, expected_field: &str) {
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected_field),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn load_shipped_defaults() {
        let tmp = temp_config("subsync_config_defaults");
        let config = load_config_from(&tmp).expect("defaults should load");

        assert_eq!(config.api.base_url, "https://www.fantrax.com");
        assert_eq!(config.api.timeout_secs, 20);
        assert_eq!(config.policy(), ExecutionPolicy::BestEffort);
        assert!(config.engine.ensure_unlocked);
        assert!(!config.engine.apply_to_future_periods);
        assert!(config.engine.target_period.is_none());
        assert!(config.positions.is_empty());
        assert!(config.credentials.cookie.is_none());

        let settings = config.engine_settings();
        assert_eq!(settings.verify, VerifySettings::default());
        assert_eq!(settings.throttle, ThrottleSettings::default());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_and_overrides() {
        let tmp = temp_config("subsync_config_creds");
        let config_dir = tmp.join("config");
        fs::write(
            config_dir.join("credentials.toml"),
            "cookie = \"JSESSIONID=abc; FX_RM=def\"\n",
        )
        .unwrap();
        let mut engine = fs::read_to_string(config_dir.join("engine.toml")).unwrap();
        engine.push_str("\n[positions]\np77 = \"MID\"\n");
        fs::write(config_dir.join("engine.toml"), engine).unwrap();

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(
            config.credentials.cookie.as_deref(),
            Some("JSESSIONID=abc; FX_RM=def")
        );
        assert_eq!(
            config.engine_settings().position_overrides.get("p77"),
            Some(&PositionCode::Midfielder)
        );

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_unknown_policy() {
        let tmp = temp_config("subsync_config_bad_policy");
        let path = tmp.join("config/engine.toml");
        let text = fs::read_to_string(&path)
            .unwrap()
            .replace("policy = \"best_effort\"", "policy = \"yolo\"");
        fs::write(&path, text).unwrap();

        assert_invalid(load_config_from(&tmp).unwrap_err(), "engine.policy");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_empty_team_id() {
        let tmp = temp_config("subsync_config_empty_team");
        fs::write(
            tmp.join("config/league.toml"),
            "[league]\nleague_id = \"abc\"\nteam_id = \"\"\n",
        )
        .unwrap();

        assert_invalid(load_config_from(&tmp).unwrap_err(), "league.team_id");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_unknown_override_position() {
        let tmp = temp_config("subsync_config_bad_override");
        let path = tmp.join("config/engine.toml");
        let mut text = fs::read_to_string(&path).unwrap();
        text.push_str("\n[positions]\np1 = \"striker-ish\"\n");
        fs::write(&path, text).unwrap();

        assert_invalid(load_config_from(&tmp).unwrap_err(), "positions.p1");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_engine_toml() {
        let tmp = temp_config("subsync_config_missing_engine");
        fs::remove_file(tmp.join("config/engine.toml")).unwrap();

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("engine.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let tmp = temp_config("subsync_config_malformed");
        fs::write(tmp.join("config/league.toml"), "[league\nleague_id = ").unwrap();

        assert!(matches!(
            load_config_from(&tmp).unwrap_err(),
            ConfigError::ParseError { .. }
        ));
        let _ = fs::remove_dir_all(&tmp);
    }
}
