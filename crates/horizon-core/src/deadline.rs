//! Precedence rules between a task's
//! scheduled date and its deadline.

use crate::calendar::{
  date_to_day_number,
  is_valid_date
};

fn valid(
  raw: Option<&str>
) -> Option<&str> {
  raw.filter(|value| {
    is_valid_date(value)
  })
}

/// True only when both values are
/// valid dates and `date` falls after
/// `deadline`.
#[must_use]
pub fn is_date_after_deadline(
  date: Option<&str>,
  deadline: Option<&str>
) -> bool {
  match (valid(date), valid(deadline))
  {
    | (Some(date), Some(deadline)) => {
      date > deadline
    }
    | _ => false
  }
}

/// True when a caller is about to set
/// `someday` while a valid deadline is
/// present. Committing would drop the
/// deadline, so the caller has to ask
/// first.
#[must_use]
pub fn should_warn_someday_with_deadline(
  deadline: Option<&str>,
  next_someday: bool
) -> bool {
  next_someday
    && valid(deadline).is_some()
}

/// The date that decides whether a
/// task is overdue: the deadline when
/// valid, else the scheduled date.
#[must_use]
pub fn get_overdue_reference_date(
  date: Option<&str>,
  deadline: Option<&str>
) -> Option<String> {
  valid(deadline)
    .or_else(|| valid(date))
    .map(str::to_string)
}

#[must_use]
pub fn is_overdue(
  date: Option<&str>,
  deadline: Option<&str>,
  today: &str
) -> bool {
  if !is_valid_date(today) {
    return false;
  }

  get_overdue_reference_date(
    date, deadline
  )
  .is_some_and(|reference| {
    reference.as_str() < today
  })
}

/// `"Nd ago"` for a reference date
/// strictly before `today`.
#[must_use]
pub fn format_overdue_days_ago(
  reference: Option<&str>,
  today: &str
) -> Option<String> {
  let reference =
    date_to_day_number(reference?)?;
  let today =
    date_to_day_number(today)?;

  let days = today - reference;
  (days > 0)
    .then(|| format!("{days}d ago"))
}
