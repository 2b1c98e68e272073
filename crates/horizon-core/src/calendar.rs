//! Calendar arithmetic over `YYYY-MM-DD` strings.
//!
//! Every function here is total: malformed input produces `None` (or a
//! clamped value) instead of an error.

use std::sync::OnceLock;

use chrono::{
  DateTime,
  Datelike,
  Duration,
  Month,
  NaiveDate,
  Utc
};
use regex::Regex;

pub const DATE_FORMAT: &str =
  "%Y-%m-%d";

/// `NaiveDate::num_days_from_ce` of
/// 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i64 =
  719_163;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
)]
pub struct YearMonth {
  pub year:  i32,
  pub month: u32
}

fn date_pattern() -> Option<&'static Regex>
{
  static DATE_RE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  DATE_RE
    .get_or_init(|| {
      Regex::new(
        r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$"
      )
      .ok()
    })
    .as_ref()
}

/// Splits a strictly shaped date into
/// its numeric components without
/// checking that they name a real day.
pub fn split_ymd(
  date: &str
) -> Option<(i32, u32, u32)> {
  if !date_pattern()?.is_match(date) {
    return None;
  }

  let year = date.get(0..4)?.parse().ok()?;
  let month =
    date.get(5..7)?.parse().ok()?;
  let day =
    date.get(8..10)?.parse().ok()?;
  Some((year, month, day))
}

#[must_use]
pub fn parse_date(
  date: &str
) -> Option<NaiveDate> {
  let (year, month, day) =
    split_ymd(date)?;
  NaiveDate::from_ymd_opt(
    year, month, day
  )
}

#[must_use]
pub fn format_date(
  date: NaiveDate
) -> String {
  date.format(DATE_FORMAT).to_string()
}

#[must_use]
pub fn is_valid_date(date: &str) -> bool {
  parse_date(date).is_some()
}

fn naive_to_day_number(
  date: NaiveDate
) -> i64 {
  i64::from(date.num_days_from_ce())
    - UNIX_EPOCH_DAYS_FROM_CE
}

fn day_number_to_naive(
  n: i64
) -> NaiveDate {
  let min =
    naive_to_day_number(NaiveDate::MIN);
  let max =
    naive_to_day_number(NaiveDate::MAX);
  let days_from_ce = n.clamp(min, max)
    + UNIX_EPOCH_DAYS_FROM_CE;

  i32::try_from(days_from_ce)
    .ok()
    .and_then(
      NaiveDate::from_num_days_from_ce_opt
    )
    .unwrap_or(if n < 0 {
      NaiveDate::MIN
    } else {
      NaiveDate::MAX
    })
}

/// Days since 1970-01-01 for a valid
/// `YYYY-MM-DD` string.
#[must_use]
pub fn date_to_day_number(
  date: &str
) -> Option<i64> {
  parse_date(date)
    .map(naive_to_day_number)
}

/// Inverse of [`date_to_day_number`].
/// Values beyond the representable
/// calendar clamp to its ends.
#[must_use]
pub fn day_number_to_date(
  n: i64
) -> String {
  format_date(day_number_to_naive(n))
}

/// The calendar date of `now` shifted
/// by `offset_minutes` east of UTC.
///
/// The offset is a plain linear shift:
/// no DST rules apply. Non-finite
/// offsets count as zero, and a shift
/// that leaves the representable range
/// falls back to no shift at all.
#[must_use]
pub fn today_string(
  now: DateTime<Utc>,
  offset_minutes: f64
) -> String {
  let offset =
    if offset_minutes.is_finite() {
      offset_minutes
    } else {
      0.0
    };

  // saturating cast; out of range
  // values are rejected below
  let shift_ms =
    (offset * 60_000.0).trunc() as i64;

  let shifted =
    Duration::try_milliseconds(shift_ms)
      .and_then(|delta| {
        now.checked_add_signed(delta)
      })
      .unwrap_or(now);

  format_date(shifted.date_naive())
}

/// Parses an offset header value in
/// minutes. Anything unparseable or
/// non-finite yields zero.
#[must_use]
pub fn parse_offset_minutes(
  raw: &str
) -> f64 {
  raw
    .trim()
    .parse::<f64>()
    .ok()
    .filter(|value| value.is_finite())
    .unwrap_or(0.0)
}

#[must_use]
pub fn shift_month(
  from: YearMonth,
  delta: i32
) -> YearMonth {
  let index = i64::from(from.year) * 12
    + i64::from(from.month)
    - 1
    + i64::from(delta);

  let year = index.div_euclid(12);
  let month = index.rem_euclid(12) + 1;

  YearMonth {
    year:  i32::try_from(year)
      .unwrap_or(if year < 0 {
        i32::MIN
      } else {
        i32::MAX
      }),
    month: u32::try_from(month)
      .unwrap_or(1)
  }
}

#[must_use]
pub fn year_month_of(
  date: &str
) -> Option<YearMonth> {
  let parsed = parse_date(date)?;
  Some(YearMonth {
    year:  parsed.year(),
    month: parsed.month()
  })
}

#[must_use]
pub fn first_of_month_day_number(
  ym: YearMonth
) -> Option<i64> {
  NaiveDate::from_ymd_opt(
    ym.year, ym.month, 1
  )
  .map(naive_to_day_number)
}

#[must_use]
pub fn month_end_day_number(
  ym: YearMonth
) -> Option<i64> {
  first_of_month_day_number(
    shift_month(ym, 1)
  )
  .map(|first| first - 1)
}

#[must_use]
pub fn day_of_month(n: i64) -> u32 {
  day_number_to_naive(n).day()
}

#[must_use]
pub fn year_of(n: i64) -> i32 {
  day_number_to_naive(n).year()
}

/// English weekday name, e.g.
/// `Monday`.
#[must_use]
pub fn weekday_name(n: i64) -> String {
  day_number_to_naive(n)
    .format("%A")
    .to_string()
}

/// English month name for `1..=12`,
/// empty otherwise.
#[must_use]
pub fn month_name(
  month: u32
) -> &'static str {
  u8::try_from(month)
    .ok()
    .and_then(|m| Month::try_from(m).ok())
    .map(|m| m.name())
    .unwrap_or("")
}
