//! `.horizonrc` settings.
//!
//! The file is `key = value` lines plus `include <path>`. Values are checked
//! as they are read; errors carry the file and line.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::views::View;

const RC_ENV_VAR: &str = "HORIZONRC";
const RC_FILE_NAME: &str = ".horizonrc";
const DATA_DIR_NAME: &str = ".horizon";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error("unknown setting '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `data.location`; `None` means `~/.horizon`.
    pub data_location: Option<PathBuf>,
    pub default_view: View,
    pub color: bool,
    /// `timezone.offset`, minutes east of UTC.
    pub timezone_offset: Option<f64>,
    /// `timezone`, an IANA zone name.
    pub timezone: Option<String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_location: None,
            default_view: View::Today,
            color: true,
            timezone_offset: None,
            timezone: None,
            loaded_files: vec![],
        }
    }
}

impl Config {
    /// Loads the rc named by `rc_override`, else `$HORIZONRC`, else
    /// `~/.horizonrc` when it exists. `HORIZONRC=/dev/null` skips loading.
    #[tracing::instrument(skip(rc_override))]
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Config::default();

        match rc_path(rc_override)? {
            Some(path) => {
                info!(rc = %path.display(), "loading horizonrc");
                cfg.read_rc(&path)?;
            }
            None => debug!("no horizonrc; using defaults"),
        }

        Ok(cfg)
    }

    /// Applies `rc.<key>=<value>` style overrides from the command line.
    /// Unlike rc files, an unknown key here is an error.
    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in overrides {
            let key = key.strip_prefix("rc.").unwrap_or(&key);
            debug!(key, value = %value, "applying override");
            self.set(key, &value)
                .with_context(|| format!("invalid override rc.{key}"))?;
        }
        Ok(())
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingError> {
        let value = value.trim();
        match key {
            "data.location" => {
                if value.is_empty() {
                    return Err(invalid("data.location", value, "path cannot be empty"));
                }
                self.data_location = Some(expand_tilde(Path::new(value)));
            }
            "default.view" => {
                self.default_view = View::parse(value).ok_or_else(|| {
                    invalid("default.view", value, "expected a view name")
                })?;
            }
            "color" => {
                self.color = parse_switch(value)
                    .ok_or_else(|| invalid("color", value, "expected on or off"))?;
            }
            "timezone.offset" => {
                let minutes = value
                    .parse::<f64>()
                    .ok()
                    .filter(|m| m.is_finite())
                    .ok_or_else(|| {
                        invalid("timezone.offset", value, "expected minutes east of UTC")
                    })?;
                self.timezone_offset = Some(minutes);
            }
            "timezone" => {
                value
                    .parse::<Tz>()
                    .map_err(|_| invalid("timezone", value, "expected an IANA zone name"))?;
                self.timezone = Some(value.to_string());
            }
            other => return Err(SettingError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn read_rc(&mut self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        self.loaded_files.push(path.clone());

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.split_once('#').map_or(raw, |(before, _)| before).trim();
            if line.is_empty() {
                continue;
            }
            let at = || format!("{}:{}", path.display(), idx + 1);

            if let Some(target) = line.strip_prefix("include ") {
                let target = target.trim();
                if target.is_empty() {
                    return Err(anyhow!("{}: include needs a path", at()));
                }
                let include = base_dir.join(expand_tilde(Path::new(target)));
                if self.loaded_files.contains(&include) {
                    warn!(include = %include.display(), "include already loaded; skipping");
                } else if include.exists() {
                    self.read_rc(&include)?;
                } else {
                    warn!(include = %include.display(), "include file does not exist; skipping");
                }
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| anyhow!("{}: expected key = value, got: {raw}", at()))?;

            match self.set(key.trim(), value) {
                Ok(()) => {}
                Err(SettingError::UnknownKey(key)) => {
                    warn!(at = %at(), key = %key, "ignoring unknown setting");
                }
                Err(err) => return Err(anyhow!("{}: {err}", at())),
            }
        }

        Ok(())
    }
}

fn invalid(key: &'static str, value: &str, reason: &'static str) -> SettingError {
    SettingError::InvalidValue {
        key,
        value: value.to_string(),
        reason,
    }
}

/// The data directory: `override_dir`, else `data.location`, else
/// `~/.horizon`. Created when missing.
#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = match override_dir.or(cfg.data_location.as_deref()) {
        Some(dir) => dir.to_path_buf(),
        None => home_dir()?.join(DATA_DIR_NAME),
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

fn rc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(from_env) = std::env::var(RC_ENV_VAR) {
        return Ok((from_env != "/dev/null").then(|| PathBuf::from(from_env)));
    }

    let candidate = home_dir()?.join(RC_FILE_NAME);
    Ok(candidate.exists().then_some(candidate))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))
}

fn expand_tilde(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Some(true),
        "off" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}
