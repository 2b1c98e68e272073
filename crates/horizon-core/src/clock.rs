//! Resolves the caller's offset from
//! UTC and, from it, "today".
//!
//! The engine only understands a
//! linear offset in minutes east of
//! UTC. IANA zone names are accepted
//! here for convenience and collapsed
//! to the offset in force at `now`.

use std::fs;
use std::path::{
  Path,
  PathBuf
};

use chrono::{
  DateTime,
  Offset,
  Utc
};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::calendar::{
  parse_offset_minutes,
  today_string
};
use crate::config::Config;

const TIME_CONFIG_FILE: &str =
  "horizon-time.toml";
const OFFSET_ENV_VAR: &str =
  "HORIZON_TZ_OFFSET";
const TIME_CONFIG_ENV_VAR: &str =
  "HORIZON_TIME_CONFIG";

#[derive(Debug, Deserialize)]
struct TimeConfig {
  offset_minutes: Option<f64>,
  timezone:       Option<String>,
  time:           Option<TimeSection>
}

#[derive(Debug, Deserialize)]
struct TimeSection {
  offset_minutes: Option<f64>,
  timezone:       Option<String>
}

/// Every place an offset can come
/// from, highest priority first.
#[derive(Debug, Clone, Default)]
pub struct OffsetSources {
  pub flag:        Option<String>,
  pub env:         Option<String>,
  pub time_file:   Option<PathBuf>,
  pub rc_offset:   Option<f64>,
  pub rc_timezone: Option<String>
}

impl OffsetSources {
  /// Collects the sources from the
  /// process environment and `cfg`.
  pub fn gather(
    flag: Option<&str>,
    cfg: &Config
  ) -> Self {
    Self {
      flag:        flag
        .map(str::to_string),
      env:         std::env::var(
        OFFSET_ENV_VAR
      )
      .ok(),
      time_file:   time_config_path(),
      rc_offset:   cfg.timezone_offset,
      rc_timezone: cfg.timezone.clone()
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clock {
  pub now:            DateTime<Utc>,
  pub offset_minutes: f64,
  pub source:         String
}

impl Clock {
  #[tracing::instrument(skip(sources, now))]
  pub fn resolve(
    sources: &OffsetSources,
    now: DateTime<Utc>
  ) -> Self {
    let (offset_minutes, source) =
      resolve_offset(sources, now);
    tracing::info!(
      offset_minutes,
      source = %source,
      "resolved client offset"
    );
    Self {
      now,
      offset_minutes,
      source
    }
  }

  #[must_use]
  pub fn today(&self) -> String {
    today_string(
      self.now,
      self.offset_minutes
    )
  }
}

fn resolve_offset(
  sources: &OffsetSources,
  now: DateTime<Utc>
) -> (f64, String) {
  if let Some(raw) =
    sources.flag.as_deref()
  {
    return (
      parse_offset_minutes(raw),
      "flag".to_string()
    );
  }

  if let Some(raw) =
    sources.env.as_deref()
    && !raw.trim().is_empty()
  {
    return (
      parse_offset_minutes(raw),
      OFFSET_ENV_VAR.to_string()
    );
  }

  if let Some(path) =
    sources.time_file.as_deref()
    && let Some(offset) =
      load_offset_from_file(path, now)
  {
    return (
      offset,
      format!("file:{}", path.display())
    );
  }

  if let Some(offset) = sources.rc_offset
  {
    return (
      offset,
      "rc:timezone.offset".to_string()
    );
  }

  if let Some(offset) = sources
    .rc_timezone
    .as_deref()
    .and_then(|raw| {
      zone_offset_minutes(
        raw,
        "rc:timezone",
        now
      )
    })
  {
    return (
      offset,
      "rc:timezone".to_string()
    );
  }

  (0.0, "default".to_string())
}

fn time_config_path() -> Option<PathBuf>
{
  if let Ok(raw) =
    std::env::var(TIME_CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir()
    .ok()
    .map(|dir| {
      dir.join(TIME_CONFIG_FILE)
    })
}

fn load_offset_from_file(
  path: &Path,
  now: DateTime<Utc>
) -> Option<f64> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "time config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading time config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimeConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing time config file"
      );
      return None;
    }
  };

  let (section_offset, section_zone) =
    parsed
      .time
      .map(|section| {
        (
          section.offset_minutes,
          section.timezone
        )
      })
      .unwrap_or((None, None));

  if let Some(offset) = parsed
    .offset_minutes
    .or(section_offset)
    .filter(|value| value.is_finite())
  {
    return Some(offset);
  }

  let Some(zone) =
    parsed.timezone.or(section_zone)
  else {
    tracing::warn!(
      file = %path.display(),
      "time config had no offset_minutes or timezone field"
    );
    return None;
  };

  zone_offset_minutes(
    &zone,
    &format!("file:{}", path.display()),
    now
  )
}

/// The offset of an IANA zone at
/// `now`, in minutes east of UTC.
pub fn zone_offset_minutes(
  raw: &str,
  source: &str,
  now: DateTime<Utc>
) -> Option<f64> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      let seconds = now
        .with_timezone(&tz)
        .offset()
        .fix()
        .local_minus_utc();
      Some(f64::from(seconds) / 60.0)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use tempfile::tempdir;

  use super::*;

  fn now() -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(2026, 2, 8, 20, 0, 0)
      .single()
      .expect("valid now")
  }

  #[test]
  fn flag_wins_over_everything() {
    let sources = OffsetSources {
      flag: Some("540".to_string()),
      env: Some("-300".to_string()),
      rc_offset: Some(60.0),
      ..OffsetSources::default()
    };
    let clock = Clock::resolve(&sources, now());
    assert_eq!(clock.offset_minutes, 540.0);
    assert_eq!(clock.source, "flag");
    assert_eq!(clock.today(), "2026-02-09");
  }

  #[test]
  fn unparseable_flag_means_utc() {
    let sources = OffsetSources {
      flag: Some("NaN".to_string()),
      ..OffsetSources::default()
    };
    let clock = Clock::resolve(&sources, now());
    assert_eq!(clock.offset_minutes, 0.0);
    assert_eq!(clock.today(), "2026-02-08");
  }

  #[test]
  fn reads_offset_from_time_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("horizon-time.toml");
    fs::write(
      &path,
      "[time]\noffset_minutes = -480\n"
    )
    .expect("write time file");

    let sources = OffsetSources {
      time_file: Some(path),
      rc_offset: Some(60.0),
      ..OffsetSources::default()
    };
    let clock = Clock::resolve(&sources, now());
    assert_eq!(clock.offset_minutes, -480.0);
    assert!(clock.source.starts_with("file:"));
  }

  #[test]
  fn time_file_zone_name() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("horizon-time.toml");
    fs::write(
      &path,
      "timezone = \"Asia/Tokyo\"\n"
    )
    .expect("write time file");

    let sources = OffsetSources {
      time_file: Some(path),
      ..OffsetSources::default()
    };
    let clock = Clock::resolve(&sources, now());
    assert_eq!(clock.offset_minutes, 540.0);
  }

  #[test]
  fn missing_file_falls_through_to_rc() {
    let dir = tempdir().expect("tempdir");
    let sources = OffsetSources {
      time_file: Some(
        dir.path().join("absent.toml")
      ),
      rc_timezone: Some(
        "America/New_York".to_string()
      ),
      ..OffsetSources::default()
    };
    let clock = Clock::resolve(&sources, now());
    assert_eq!(clock.offset_minutes, -300.0);
    assert_eq!(clock.source, "rc:timezone");
  }

  #[test]
  fn unknown_zone_defaults_to_utc() {
    let sources = OffsetSources {
      rc_timezone: Some(
        "Mars/Olympus".to_string()
      ),
      ..OffsetSources::default()
    };
    let clock = Clock::resolve(&sources, now());
    assert_eq!(clock.offset_minutes, 0.0);
    assert_eq!(clock.source, "default");
  }
}
