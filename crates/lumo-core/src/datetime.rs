use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  NaiveDate,
  NaiveDateTime,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "lumo-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "LUMO_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "LUMO_TIME_CONFIG";
const DEFAULT_DISPLAY_TIMEZONE: &str =
  "UTC";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  display:  Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Resolution order: `LUMO_TIMEZONE`,
/// the `display.timezone` rc key,
/// `lumo-time.toml`, then UTC.
pub fn resolve_display_timezone(
  configured: Option<&str>
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(raw) = configured
    && let Some(tz) = parse_timezone(
      raw,
      "display.timezone"
    )
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_DISPLAY_TIMEZONE,
    "DEFAULT_DISPLAY_TIMEZONE"
  )
  .unwrap_or(chrono_tz::UTC)
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  dirs::home_dir().map(|home| {
    home
      .join(".lumo")
      .join(TIMEZONE_CONFIG_FILE)
  })
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
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
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.display.and_then(
        |section| section.timezone
      )
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
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
      tracing::debug!(
        source,
        timezone = %trimmed,
        "resolved display timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::warn!(
        source,
        timezone = %trimmed,
        error = %err,
        "invalid timezone; ignoring"
      );
      None
    }
  }
}

/// Server timestamps: RFC 3339, naive
/// `YYYY-MM-DDTHH:MM[:SS[.f]]` (taken
/// as UTC) or a bare date.
pub fn parse_timestamp(
  raw: &str
) -> Option<DateTime<Utc>> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  if let Ok(parsed) =
    DateTime::parse_from_rfc3339(
      trimmed
    )
  {
    return Some(
      parsed.with_timezone(&Utc)
    );
  }

  for format in [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M"
  ] {
    if let Ok(naive) =
      NaiveDateTime::parse_from_str(
        trimmed, format
      )
    {
      return Some(naive.and_utc());
    }
  }

  NaiveDate::parse_from_str(
    trimmed, "%Y-%m-%d"
  )
  .ok()
  .and_then(|date| {
    date.and_hms_opt(0, 0, 0)
  })
  .map(|naive| naive.and_utc())
}

#[must_use]
pub fn format_display(
  dt: DateTime<Utc>,
  tz: Tz
) -> String {
  dt.with_timezone(&tz)
    .format("%d/%m/%Y %H:%M")
    .to_string()
}

/// Builds the `dueDate` sent to the
/// server. Both parts are required;
/// either one missing means no due
/// date.
pub fn compose_due(
  date: Option<&str>,
  time: Option<&str>
) -> anyhow::Result<Option<String>> {
  let date = date
    .map(str::trim)
    .filter(|d| !d.is_empty());
  let time = time
    .map(str::trim)
    .filter(|t| !t.is_empty());

  let (Some(date), Some(time)) =
    (date, time)
  else {
    return Ok(None);
  };

  let day = NaiveDate::parse_from_str(
    date, "%Y-%m-%d"
  )
  .map_err(|_| {
    anyhow!(
      "invalid date (expected \
       YYYY-MM-DD): {date}"
    )
  })?;
  let (hour, minute) =
    parse_clock_time(time)
      .ok_or_else(|| {
        anyhow!(
          "invalid time (expected \
           HH:MM): {time}"
        )
      })?;

  Ok(Some(format!(
    "{}T{hour:02}:{minute:02}",
    day.format("%Y-%m-%d")
  )))
}

static CLOCK_RE: LazyLock<
  Option<Regex>
> = LazyLock::new(|| {
  Regex::new(
    r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$",
  )
  .ok()
});

fn parse_clock_time(
  token: &str
) -> Option<(u32, u32)> {
  let captures =
    LazyLock::force(&CLOCK_RE)
      .as_ref()?
      .captures(token.trim())?;

  let raw_hour = captures
    .name("hour")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let minute = captures
    .name("minute")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  if minute > 59 {
    return None;
  }

  let Some(ampm) = captures
    .name("ampm")
    .map(|m| {
      m.as_str().to_ascii_lowercase()
    })
  else {
    return (raw_hour <= 23)
      .then_some((raw_hour, minute));
  };

  if raw_hour == 0 || raw_hour > 12 {
    return None;
  }
  let hour = match (
    ampm.as_str(),
    raw_hour
  ) {
    | ("am", 12) => 0,
    | ("am", h) => h,
    | ("pm", 12) => 12,
    | ("pm", h) => h + 12,
    | _ => return None
  };

  Some((hour, minute))
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::{
    compose_due,
    format_display,
    parse_clock_time,
    parse_timestamp
  };

  #[test]
  fn timestamps_accept_server_and_form_shapes()
   {
    let expected = Utc
      .with_ymd_and_hms(
        2025, 9, 16, 10, 30, 0
      )
      .unwrap();

    assert_eq!(
      parse_timestamp(
        "2025-09-16T10:30:00.000Z"
      ),
      Some(expected)
    );
    assert_eq!(
      parse_timestamp(
        "2025-09-16T10:30"
      ),
      Some(expected)
    );
    assert_eq!(
      parse_timestamp("2025-09-16")
        .map(|d| d.date_naive()),
      Some(expected.date_naive())
    );
    assert_eq!(
      parse_timestamp("mañana"),
      None
    );
  }

  #[test]
  fn display_format_uses_timezone() {
    let dt = Utc
      .with_ymd_and_hms(
        2025, 1, 2, 3, 4, 0
      )
      .unwrap();
    assert_eq!(
      format_display(
        dt,
        chrono_tz::UTC
      ),
      "02/01/2025 03:04"
    );
    assert_eq!(
      format_display(
        dt,
        chrono_tz::America::Bogota
      ),
      "01/01/2025 22:04"
    );
  }

  #[test]
  fn due_requires_both_parts() {
    assert_eq!(
      compose_due(
        Some("2025-09-16"),
        Some("7:05 pm")
      )
      .unwrap()
      .as_deref(),
      Some("2025-09-16T19:05")
    );
    assert_eq!(
      compose_due(
        Some("2025-09-16"),
        None
      )
      .unwrap(),
      None
    );
    assert!(
      compose_due(
        Some("16/09/2025"),
        Some("10:00")
      )
      .is_err()
    );
  }

  #[test]
  fn clock_time_rejects_out_of_range()
  {
    assert_eq!(
      parse_clock_time("12:00 am"),
      Some((0, 0))
    );
    assert_eq!(
      parse_clock_time("24:00"),
      None
    );
    assert_eq!(
      parse_clock_time("13:00 pm"),
      None
    );
  }
}
