use thiserror::Error;
use tracing::debug;

use crate::calendar::is_valid_date;
use crate::deadline::{is_date_after_deadline, should_warn_someday_with_deadline};
use crate::task::StoredTask;

/// How a patch treats one optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldChange {
    #[default]
    Keep,
    Clear,
    Set(String),
}

impl FieldChange {
    fn apply(&self, current: Option<&str>) -> Option<String> {
        match self {
            FieldChange::Keep => current.map(str::to_string),
            FieldChange::Clear => None,
            FieldChange::Set(value) => Some(value.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulePatch {
    pub date: FieldChange,
    pub deadline: FieldChange,
    pub someday: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleState {
    pub date: Option<String>,
    pub deadline: Option<String>,
    pub someday: bool,
}

impl From<&StoredTask> for ScheduleState {
    fn from(task: &StoredTask) -> Self {
        Self {
            date: task.date.clone(),
            deadline: task.deadline.clone(),
            someday: task.someday,
        }
    }
}

impl ScheduleState {
    pub fn write_to(self, task: &mut StoredTask) {
        task.date = self.date;
        task.deadline = self.deadline;
        task.someday = self.someday;
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleRejection {
    #[error("invalid {field} '{value}': expected YYYY-MM-DD")]
    InvalidDate { field: &'static str, value: String },

    #[error("date {date} is after deadline {deadline}")]
    DateAfterDeadline { date: String, deadline: String },

    #[error("moving to someday would drop deadline {deadline}; confirm to continue")]
    SomedayDropsDeadline { deadline: String },
}

fn check_shape(field: &'static str, change: &FieldChange) -> Result<(), ScheduleRejection> {
    match change {
        FieldChange::Set(value) if !is_valid_date(value) => Err(ScheduleRejection::InvalidDate {
            field,
            value: value.clone(),
        }),
        _ => Ok(()),
    }
}

/// Computes the schedule a task would have after `patch`, or the reason the
/// change must not be written.
///
/// Someday tasks carry neither date nor deadline, and a task with a date or
/// a deadline is never someday. Moving to someday is refused unless
/// `confirmed` whenever a deadline would be dropped, including one set by the
/// same patch.
pub fn plan_schedule_change(
    current: &ScheduleState,
    patch: &SchedulePatch,
    confirmed: bool,
) -> Result<ScheduleState, ScheduleRejection> {
    check_shape("date", &patch.date)?;
    check_shape("deadline", &patch.deadline)?;

    let date = patch.date.apply(current.date.as_deref());
    let deadline = patch.deadline.apply(current.deadline.as_deref());

    if patch.someday == Some(true) {
        if should_warn_someday_with_deadline(deadline.as_deref(), true) && !confirmed {
            return Err(ScheduleRejection::SomedayDropsDeadline {
                deadline: deadline.unwrap_or_default(),
            });
        }

        debug!("moving to someday; clearing date and deadline");
        return Ok(ScheduleState {
            date: None,
            deadline: None,
            someday: true,
        });
    }

    let someday = if date.is_some() || deadline.is_some() {
        false
    } else {
        patch.someday.unwrap_or(current.someday)
    };

    if is_date_after_deadline(date.as_deref(), deadline.as_deref()) {
        return Err(ScheduleRejection::DateAfterDeadline {
            date: date.unwrap_or_default(),
            deadline: deadline.unwrap_or_default(),
        });
    }

    Ok(ScheduleState {
        date,
        deadline,
        someday,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(date: Option<&str>, deadline: Option<&str>, someday: bool) -> ScheduleState {
        ScheduleState {
            date: date.map(str::to_string),
            deadline: deadline.map(str::to_string),
            someday,
        }
    }

    #[test]
    fn setting_a_date_leaves_someday() {
        let current = state(None, None, true);
        let patch = SchedulePatch {
            date: FieldChange::Set("2026-02-10".to_string()),
            ..SchedulePatch::default()
        };
        let next = plan_schedule_change(&current, &patch, false).expect("valid change");
        assert_eq!(next, state(Some("2026-02-10"), None, false));
    }

    #[test]
    fn rejects_date_after_deadline() {
        let current = state(None, Some("2026-02-20"), false);
        let patch = SchedulePatch {
            date: FieldChange::Set("2026-02-21".to_string()),
            ..SchedulePatch::default()
        };
        assert_eq!(
            plan_schedule_change(&current, &patch, true),
            Err(ScheduleRejection::DateAfterDeadline {
                date: "2026-02-21".to_string(),
                deadline: "2026-02-20".to_string(),
            })
        );
    }

    #[test]
    fn someday_with_deadline_needs_confirmation() {
        let current = state(Some("2026-02-10"), Some("2026-02-20"), false);
        let patch = SchedulePatch {
            someday: Some(true),
            ..SchedulePatch::default()
        };

        let err = plan_schedule_change(&current, &patch, false).expect_err("needs confirmation");
        assert_eq!(
            err,
            ScheduleRejection::SomedayDropsDeadline {
                deadline: "2026-02-20".to_string()
            }
        );
        assert!(err.to_string().contains("2026-02-20"));

        let next = plan_schedule_change(&current, &patch, true).expect("confirmed change");
        assert_eq!(next, state(None, None, true));
    }

    #[test]
    fn someday_without_deadline_just_clears_date() {
        let current = state(Some("2026-02-10"), None, false);
        let patch = SchedulePatch {
            someday: Some(true),
            ..SchedulePatch::default()
        };
        let next = plan_schedule_change(&current, &patch, false).expect("valid change");
        assert_eq!(next, state(None, None, true));
    }

    #[test]
    fn malformed_dates_are_refused() {
        let current = state(None, None, false);
        let patch = SchedulePatch {
            deadline: FieldChange::Set("2026-2-20".to_string()),
            ..SchedulePatch::default()
        };
        assert_eq!(
            plan_schedule_change(&current, &patch, false),
            Err(ScheduleRejection::InvalidDate {
                field: "deadline",
                value: "2026-2-20".to_string(),
            })
        );
    }

    #[test]
    fn clearing_fields() {
        let current = state(Some("2026-02-10"), Some("2026-02-20"), false);
        let patch = SchedulePatch {
            date: FieldChange::Clear,
            deadline: FieldChange::Clear,
            someday: None,
        };
        let next = plan_schedule_change(&current, &patch, false).expect("valid change");
        assert_eq!(next, state(None, None, false));
    }

    #[test]
    fn setting_a_deadline_leaves_someday() {
        let current = state(None, None, true);
        let patch = SchedulePatch {
            deadline: FieldChange::Set("2026-02-20".to_string()),
            ..SchedulePatch::default()
        };
        let next = plan_schedule_change(&current, &patch, false).expect("valid change");
        assert_eq!(next, state(None, Some("2026-02-20"), false));
    }

    #[test]
    fn deadline_set_with_someday_needs_confirmation() {
        let current = state(None, None, false);
        let patch = SchedulePatch {
            deadline: FieldChange::Set("2026-02-20".to_string()),
            someday: Some(true),
            ..SchedulePatch::default()
        };

        assert_eq!(
            plan_schedule_change(&current, &patch, false),
            Err(ScheduleRejection::SomedayDropsDeadline {
                deadline: "2026-02-20".to_string()
            })
        );
        let next = plan_schedule_change(&current, &patch, true).expect("confirmed change");
        assert_eq!(next, state(None, None, true));
    }

    #[test]
    fn clearing_the_deadline_while_moving_to_someday_needs_no_confirmation() {
        let current = state(None, Some("2026-02-20"), false);
        let patch = SchedulePatch {
            deadline: FieldChange::Clear,
            someday: Some(true),
            ..SchedulePatch::default()
        };
        let next = plan_schedule_change(&current, &patch, false).expect("valid change");
        assert_eq!(next, state(None, None, true));
    }
}
