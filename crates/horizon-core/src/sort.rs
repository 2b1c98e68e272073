//! The one ordering law every view
//! uses.
//!
//! Undated tasks come first, newest
//! first. Dated tasks follow, earliest
//! date first, newest first among
//! equal dates. The narrower sorts are
//! restrictions of that law for inputs
//! already known to be homogeneous.

use std::cmp::Reverse;

use chrono::{
  DateTime,
  NaiveDateTime
};

use crate::calendar::parse_date;
use crate::task::TaskRecord;

const NAIVE_TIMESTAMP_FORMATS: [&str;
  2] = [
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S%.f"
];

/// Milliseconds since the epoch for a
/// creation timestamp. Missing or
/// unparseable values count as the
/// epoch itself, i.e. oldest.
#[must_use]
pub fn created_at_millis(
  raw: Option<&str>
) -> i64 {
  let Some(raw) =
    raw.map(str::trim)
  else {
    return 0;
  };

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(raw)
  {
    return dt.timestamp_millis();
  }

  for fmt in NAIVE_TIMESTAMP_FORMATS {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        raw, fmt
      )
    {
      return ndt
        .and_utc()
        .timestamp_millis();
    }
  }

  parse_date(raw)
    .and_then(|date| {
      date.and_hms_opt(0, 0, 0)
    })
    .map(|ndt| {
      ndt.and_utc().timestamp_millis()
    })
    .unwrap_or(0)
}

fn date_key(task: &TaskRecord) -> String {
  task
    .date()
    .map(str::to_string)
    .unwrap_or_default()
}

/// Partitions into `(undated, dated)`,
/// preserving input order in each.
#[must_use]
pub fn split_by_date(
  tasks: &[TaskRecord]
) -> (Vec<TaskRecord>, Vec<TaskRecord>)
{
  tasks
    .iter()
    .cloned()
    .partition(|task| {
      task.date().is_none()
    })
}

#[must_use]
pub fn sort_created_desc(
  tasks: &[TaskRecord]
) -> Vec<TaskRecord> {
  let mut out = tasks.to_vec();
  out.sort_by_cached_key(|task| {
    Reverse(created_at_millis(
      task.created_at()
    ))
  });
  out
}

#[must_use]
pub fn sort_dated_by_date_asc_then_created_desc(
  tasks: &[TaskRecord]
) -> Vec<TaskRecord> {
  let mut out = tasks.to_vec();
  out.sort_by_cached_key(|task| {
    (
      date_key(task),
      Reverse(created_at_millis(
        task.created_at()
      ))
    )
  });
  out
}

/// The canonical comparator: undated
/// tasks always precede dated ones,
/// however far away the dates are.
#[must_use]
pub fn sort_mixed_by_date_and_created(
  tasks: &[TaskRecord]
) -> Vec<TaskRecord> {
  let (undated, dated) =
    split_by_date(tasks);

  let mut out =
    sort_created_desc(&undated);
  out.extend(
    sort_dated_by_date_asc_then_created_desc(
      &dated
    )
  );
  out
}
