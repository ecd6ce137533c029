//! Runtime configuration.
//!
//! Layering, lowest to highest precedence: built-in defaults, an optional YAML
//! file, then `PATCHKIT_*` environment variables (`__` separates nesting, e.g.
//! `PATCHKIT_LOGGING__LEVEL=debug`).

use std::env;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::telemetry::LoggingConfig;

pub const ENV_PREFIX: &str = "PATCHKIT_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("HOME is not set; cannot expand '{0}'")]
    HomeMissing(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PatchkitConfig {
    /// Settings document location. A leading `~` expands to the home directory.
    pub settings_path: String,
    /// Prefix of every persisted key.
    pub key_prefix: String,
    /// Kill-switch state used when nothing has been persisted yet.
    pub global_enabled_default: bool,
    pub logging: LoggingConfig,
}

impl Default for PatchkitConfig {
    fn default() -> Self {
        Self {
            settings_path: "~/.patchkit/settings.json".to_owned(),
            key_prefix: "Patchkit".to_owned(),
            global_enabled_default: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl PatchkitConfig {
    /// Loads defaults, then `file` (if given and present), then the environment.
    ///
    /// # Errors
    /// Returns [`ConfigError::Load`] on malformed YAML, unknown keys, or values
    /// of the wrong type.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::figment(file).extract().map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// The provider stack [`load`](Self::load) extracts from.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// `settings_path` with `~` expanded.
    ///
    /// # Errors
    /// Returns [`ConfigError::HomeMissing`] when the path starts with `~` and
    /// no home directory is known.
    pub fn resolved_settings_path(&self) -> Result<PathBuf, ConfigError> {
        expand_tilde(&self.settings_path)
    }
}

fn expand_tilde(raw: &str) -> Result<PathBuf, ConfigError> {
    let rest = if raw == "~" {
        ""
    } else if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        rest
    } else {
        return Ok(PathBuf::from(raw));
    };
    let home = env::home_dir().ok_or_else(|| ConfigError::HomeMissing(raw.to_owned()))?;
    Ok(if rest.is_empty() { home } else { home.join(rest) })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::telemetry::LogFormat;

    #[test]
    fn defaults_without_sources() {
        figment::Jail::expect_with(|_| {
            let cfg: PatchkitConfig = PatchkitConfig::figment(None).extract()?;
            assert_eq!(cfg, PatchkitConfig::default());
            Ok(())
        });
    }

    #[test]
    fn yaml_then_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "patchkit.yaml",
                "key_prefix: Ext\nlogging:\n  level: debug\n  format: json\n",
            )?;
            jail.set_env("PATCHKIT_KEY_PREFIX", "FromEnv");
            let cfg: PatchkitConfig =
                PatchkitConfig::figment(Some(Path::new("patchkit.yaml"))).extract()?;
            assert_eq!(cfg.key_prefix, "FromEnv");
            assert_eq!(cfg.logging.level, "debug");
            assert_eq!(cfg.logging.format, LogFormat::Json);
            assert!(cfg.global_enabled_default);
            Ok(())
        });
    }

    #[test]
    fn unknown_keys_are_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("bad.yaml", "no_such_field: 1\n")?;
            assert!(PatchkitConfig::load(Some(Path::new("bad.yaml"))).is_err());
            Ok(())
        });
    }

    #[test]
    fn plain_paths_are_untouched() {
        assert_eq!(
            expand_tilde("/var/lib/patchkit.json").unwrap(),
            PathBuf::from("/var/lib/patchkit.json")
        );
    }
}
