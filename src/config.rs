use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::monitor::types::{DisposalMethod, MonitorRule, ServiceConfig};

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_DIR: &str = "drive-sweeper";

/// Commented template written when no config file exists yet.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# drive-sweeper configuration
#
# disposal = "delete" or "move"; move_to is used (and required) only with "move".
# trigger_percent is the free-space percentage below which a rule fires.
# A negative trigger_percent makes the rule fire on every check.

poll_interval_secs = 3600
verbose = false
# log_file = "/var/log/drive-sweeper.log"

[[rule]]
volume = "/"
watch_path = "/var/tmp/drive-sweeper"
disposal = "delete"
older_than_days = 30
move_to = ""
trigger_percent = 10
"#;

/// Root configuration structure, as written on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between evaluation passes
    pub poll_interval_secs: u64,
    /// Log per-candidate diagnostics
    pub verbose: bool,
    /// Activity log location (default: state dir)
    pub log_file: Option<PathBuf>,
    /// Rules, evaluated in file order
    #[serde(rename = "rule")]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Mount point or device of the volume to measure
    pub volume: String,
    /// Directory whose direct children are retired
    pub watch_path: PathBuf,
    pub disposal: DisposalKind,
    /// Minimum age in days before an entry qualifies
    pub older_than_days: u32,
    /// Destination directory for "move"
    #[serde(default)]
    pub move_to: Option<PathBuf>,
    /// Free-space percentage (0-100) below which the rule fires; negative = always
    pub trigger_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisposalKind {
    Delete,
    Move,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3600,
            verbose: false,
            log_file: None,
            rules: vec![],
        }
    }
}

impl Config {
    /// Load and validate the config file.
    ///
    /// With no explicit path the default location is used, and a missing
    /// default file yields `Config::default()`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let path = default_config_path()?;
                if path.exists() {
                    Self::read(&path)?
                } else {
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but writes the default template first if the
    /// file does not exist yet.
    pub fn load_or_create(path: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };

        if !path.exists() {
            tracing::warn!(
                "Config file {} not found, writing default configuration",
                path.display()
            );
            write_default_config(&path, false)?;
        }

        let config = Self::read(&path)?;
        config.validate()?;
        Ok((config, path))
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }

        for (index, rule) in self.rules.iter().enumerate() {
            let n = index + 1;

            if rule.volume.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("rule {n}: volume is empty")));
            }

            if rule.watch_path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "rule {n}: watch_path is empty"
                )));
            }

            // NaN fails this comparison as well
            if !(rule.trigger_percent <= 100.0) {
                return Err(ConfigError::Invalid(format!(
                    "rule {n}: trigger_percent must be at most 100, got {}",
                    rule.trigger_percent
                )));
            }

            if rule.disposal == DisposalKind::Move && !has_destination(rule) {
                return Err(ConfigError::Invalid(format!(
                    "rule {n}: disposal \"move\" requires a non-empty move_to"
                )));
            }
        }

        Ok(())
    }

    /// Settings that are valid but probably not what the operator meant.
    pub fn warnings(&self) -> Vec<String> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.trigger_percent < 0.0)
            .map(|(index, rule)| {
                format!(
                    "rule {}: negative trigger_percent, {} will be swept on every check",
                    index + 1,
                    rule.watch_path.display()
                )
            })
            .collect()
    }

    /// Convert into the immutable snapshot consumed by the engine.
    pub fn into_service_config(self) -> Result<ServiceConfig, ConfigError> {
        self.validate()?;
        for warning in self.warnings() {
            tracing::warn!("{}", warning);
        }

        let log_file = match self.log_file {
            Some(path) => path,
            None => default_log_file(),
        };

        let rules = self
            .rules
            .into_iter()
            .map(|rule| {
                let disposal = match rule.disposal {
                    DisposalKind::Delete => DisposalMethod::Delete,
                    DisposalKind::Move => DisposalMethod::Move {
                        // validate() guarantees a non-empty destination
                        destination: rule.move_to.unwrap_or_default(),
                    },
                };

                MonitorRule {
                    volume: rule.volume,
                    watch_path: rule.watch_path,
                    disposal,
                    age_threshold_days: rule.older_than_days,
                    trigger_ratio: rule.trigger_percent / 100.0,
                }
            })
            .collect();

        Ok(ServiceConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            verbose: self.verbose,
            log_file,
            rules,
        })
    }
}

fn has_destination(rule: &RuleConfig) -> bool {
    rule.move_to
        .as_ref()
        .is_some_and(|dest| !dest.as_os_str().is_empty())
}

/// `$XDG_CONFIG_HOME/drive-sweeper/config.toml`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

/// `$XDG_STATE_HOME/drive-sweeper/monitor.log`, falling back to /tmp
pub fn default_log_file() -> PathBuf {
    let state_dir = std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .ok()
        .or_else(dirs::state_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"));

    state_dir.join(APP_DIR).join("monitor.log")
}

/// Write [`DEFAULT_CONFIG_TEMPLATE`] to `path`, creating parent directories.
pub fn write_default_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }

    let write_err = |source| ConfigError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }

    fs::write(path, DEFAULT_CONFIG_TEMPLATE).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(disposal: DisposalKind, move_to: Option<&str>, trigger_percent: f64) -> RuleConfig {
        RuleConfig {
            volume: "/".to_string(),
            watch_path: PathBuf::from("/data/captures"),
            disposal,
            older_than_days: 30,
            move_to: move_to.map(PathBuf::from),
            trigger_percent,
        }
    }

    fn with_rules(rules: Vec<RuleConfig>) -> Config {
        Config {
            rules,
            ..Config::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval_secs, 3600);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn template_parses_and_validates() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].disposal, DisposalKind::Delete);
        assert_eq!(config.rules[0].older_than_days, 30);
    }

    #[test]
    fn config_serializes_to_toml() {
        let config = with_rules(vec![rule(DisposalKind::Delete, None, 10.0)]);
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[[rule]]"));
        assert!(toml_str.contains("disposal = \"delete\""));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = Config {
            poll_interval_secs: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn move_without_destination_is_rejected() {
        for move_to in [None, Some("")] {
            let config = with_rules(vec![rule(DisposalKind::Move, move_to, 10.0)]);
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("move_to"));
        }
    }

    #[test]
    fn delete_ignores_empty_destination() {
        let config = with_rules(vec![rule(DisposalKind::Delete, Some(""), 10.0)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn trigger_above_hundred_is_rejected() {
        let config = with_rules(vec![rule(DisposalKind::Delete, None, 120.0)]);
        assert!(config.validate().is_err());

        let config = with_rules(vec![rule(DisposalKind::Delete, None, f64::NAN)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_trigger_is_accepted() {
        let config = with_rules(vec![rule(DisposalKind::Delete, None, -1.0)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn negative_trigger_warns_once_per_rule() {
        let config = with_rules(vec![
            rule(DisposalKind::Delete, None, -1.0),
            rule(DisposalKind::Delete, None, 10.0),
        ]);

        config.validate().unwrap();
        config.validate().unwrap();

        let warnings = config.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("rule 1: negative trigger_percent"));
        assert!(with_rules(vec![rule(DisposalKind::Delete, None, 0.0)])
            .warnings()
            .is_empty());
    }

    #[test]
    fn conversion_builds_engine_rules() {
        let mut config = with_rules(vec![
            rule(DisposalKind::Delete, None, 10.0),
            rule(DisposalKind::Move, Some("/archive"), -5.0),
        ]);
        config.poll_interval_secs = 90;
        config.log_file = Some(PathBuf::from("/tmp/sweeper.log"));

        let service = config.into_service_config().unwrap();

        assert_eq!(service.poll_interval, Duration::from_secs(90));
        assert_eq!(service.log_file, PathBuf::from("/tmp/sweeper.log"));
        assert_eq!(service.rules[0].disposal, DisposalMethod::Delete);
        assert!((service.rules[0].trigger_ratio - 0.10).abs() < 1e-9);
        assert_eq!(
            service.rules[1].disposal,
            DisposalMethod::Move {
                destination: PathBuf::from("/archive")
            }
        );
        assert!(service.rules[1].trigger_ratio < 0.0);
    }

    #[test]
    fn write_default_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        write_default_config(&path, false).unwrap();
        assert!(path.exists());

        let err = write_default_config(&path, false).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists(_)));

        assert!(write_default_config(&path, true).is_ok());
    }

    #[test]
    fn load_or_create_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let (config, used) = Config::load_or_create(Some(&path)).unwrap();

        assert_eq!(used, path);
        assert!(path.exists());
        assert_eq!(config.rules.len(), 1);
    }

    #[test]
    fn default_log_file_is_named() {
        assert!(default_log_file().ends_with("drive-sweeper/monitor.log"));
    }
}
