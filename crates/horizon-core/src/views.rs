use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::calendar::is_valid_date;
use crate::deadline::is_overdue;
use crate::sort::sort_mixed_by_date_and_created;
use crate::task::{StoredTask, TaskRecord};
use crate::upcoming::{UpcomingSection, build_upcoming_sections};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Today,
    Upcoming,
    Anytime,
    Someday,
    Logbook,
    Inbox,
}

impl View {
    pub const ALL: [View; 6] = [
        View::Today,
        View::Upcoming,
        View::Anytime,
        View::Someday,
        View::Logbook,
        View::Inbox,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            View::Today => "today",
            View::Upcoming => "upcoming",
            View::Anytime => "anytime",
            View::Someday => "someday",
            View::Logbook => "logbook",
            View::Inbox => "inbox",
        }
    }

    /// Case-insensitive; accepts any unambiguous prefix.
    pub fn parse(token: &str) -> Option<View> {
        let lower = token.trim().to_ascii_lowercase();
        if lower.is_empty() {
            return None;
        }

        if let Some(exact) = Self::ALL.iter().find(|v| v.as_str() == lower) {
            return Some(*exact);
        }

        let mut matches = Self::ALL.iter().filter(|v| v.as_str().starts_with(&lower));
        let first = matches.next()?;
        if matches.next().is_some() {
            None
        } else {
            Some(*first)
        }
    }

    /// The store-side predicate deciding whether `task` belongs to this view.
    pub fn is_eligible(&self, task: &StoredTask, today: &str) -> bool {
        if task.is_archived() {
            return false;
        }

        let open = !task.is_completed() && !task.someday;
        let date = valid_date(task.date.as_deref());
        match self {
            View::Logbook => task.is_completed(),
            View::Someday => !task.is_completed() && task.someday,
            View::Inbox => {
                open && date.is_none() && valid_date(task.deadline.as_deref()).is_none()
            }
            View::Upcoming => open && date.is_some_and(|d| d > today),
            View::Anytime => open && date.is_none_or(|d| d <= today),
            View::Today => {
                let deadline = task.deadline.as_deref();
                open && (date.is_some_and(|d| d <= today)
                    || is_overdue(date, deadline, today)
                    || valid_date(deadline) == Some(today))
            }
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn valid_date(raw: Option<&str>) -> Option<&str> {
    raw.filter(|d| is_valid_date(d))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "layout", content = "data", rename_all = "lowercase")]
pub enum ViewOutput {
    Flat(Vec<TaskRecord>),
    Grouped(Vec<UpcomingSection>),
}

impl ViewOutput {
    pub fn task_count(&self) -> usize {
        match self {
            ViewOutput::Flat(tasks) => tasks.len(),
            ViewOutput::Grouped(sections) => sections.iter().map(|s| s.items().len()).sum(),
        }
    }
}

/// Filters `tasks` to the view and orders them. Upcoming is grouped into
/// sections; every other view is a flat list under the shared ordering law.
#[tracing::instrument(skip(tasks), fields(count = tasks.len()))]
pub fn build_view(view: View, tasks: &[StoredTask], today: &str) -> ViewOutput {
    let eligible: Vec<TaskRecord> = tasks
        .iter()
        .filter(|task| view.is_eligible(task, today))
        .map(TaskRecord::from)
        .collect();

    debug!(%view, eligible = eligible.len(), "filtered tasks for view");

    match view {
        View::Upcoming => ViewOutput::Grouped(build_upcoming_sections(&eligible, today)),
        _ => ViewOutput::Flat(sort_mixed_by_date_and_created(&eligible)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    const TODAY: &str = "2026-02-08";

    fn stored(title: &str, date: Option<&str>, deadline: Option<&str>) -> StoredTask {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 1, 8, 0, 0)
            .single()
            .expect("valid now");
        let mut task = StoredTask::new(title.to_string(), now);
        task.id = title.to_string();
        task.date = date.map(str::to_string);
        task.deadline = deadline.map(str::to_string);
        task
    }

    fn views_of(task: &StoredTask) -> Vec<View> {
        View::ALL
            .into_iter()
            .filter(|v| v.is_eligible(task, TODAY))
            .collect()
    }

    #[test]
    fn parses_view_names_and_prefixes() {
        assert_eq!(View::parse("Today"), Some(View::Today));
        assert_eq!(View::parse("up"), Some(View::Upcoming));
        assert_eq!(View::parse("l"), Some(View::Logbook));
        assert_eq!(View::parse("s"), Some(View::Someday));
        assert_eq!(View::parse("a"), Some(View::Anytime));
        assert_eq!(View::parse("x"), None);
        assert_eq!(View::parse(""), None);
    }

    #[test]
    fn eligibility_per_view() {
        let inbox = stored("inbox", None, None);
        assert_eq!(views_of(&inbox), vec![View::Anytime, View::Inbox]);

        let due_today = stored("due-today", Some(TODAY), None);
        assert_eq!(views_of(&due_today), vec![View::Today, View::Anytime]);

        let future = stored("future", Some("2026-02-20"), None);
        assert_eq!(views_of(&future), vec![View::Upcoming]);

        let future_overdue_deadline = stored("late", Some("2026-02-20"), Some("2026-02-01"));
        assert_eq!(
            views_of(&future_overdue_deadline),
            vec![View::Today, View::Upcoming]
        );

        let deadline_only = stored("deadline-only", None, Some("2026-03-01"));
        assert_eq!(views_of(&deadline_only), vec![View::Anytime]);

        let deadline_today = stored("deadline-today", Some("2026-02-20"), Some(TODAY));
        assert_eq!(
            views_of(&deadline_today),
            vec![View::Today, View::Upcoming]
        );

        let overdue_deadline_only = stored("overdue", None, Some("2026-02-07"));
        assert_eq!(
            views_of(&overdue_deadline_only),
            vec![View::Today, View::Anytime]
        );

        let mut someday = stored("someday", None, None);
        someday.someday = true;
        assert_eq!(views_of(&someday), vec![View::Someday]);

        let mut done = stored("done", Some("2026-02-01"), None);
        done.completed_at = done.created_at;
        assert_eq!(views_of(&done), vec![View::Logbook]);

        let mut archived = stored("archived", None, None);
        archived.completed_at = archived.created_at;
        archived.archived_at = archived.created_at;
        assert!(views_of(&archived).is_empty());
    }

    #[test]
    fn today_and_someday_share_the_ordering_law() {
        let mut tasks = vec![
            stored("dated-late", Some("2026-02-07"), None),
            stored("undated", None, Some("2026-02-01")),
            stored("dated-early", Some("2026-01-15"), None),
        ];
        let ViewOutput::Flat(today) = build_view(View::Today, &tasks, TODAY) else {
            panic!("today view should be flat");
        };
        let ids: Vec<&str> = today.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["undated", "dated-early", "dated-late"]);

        for task in &mut tasks {
            task.someday = true;
        }
        let ViewOutput::Flat(someday) = build_view(View::Someday, &tasks, TODAY) else {
            panic!("someday view should be flat");
        };
        let ids: Vec<&str> = someday.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["undated", "dated-early", "dated-late"]);
    }

    #[test]
    fn upcoming_is_grouped() {
        let tasks = vec![
            stored("tomorrow", Some("2026-02-09"), None),
            stored("today", Some(TODAY), None),
        ];
        let output = build_view(View::Upcoming, &tasks, TODAY);
        assert_eq!(output.task_count(), 1);
        let ViewOutput::Grouped(sections) = output else {
            panic!("upcoming view should be grouped");
        };
        assert_eq!(sections[0].title(), "Tomorrow");
        assert_eq!(sections[0].items()[0].id, "tomorrow");
    }
}
