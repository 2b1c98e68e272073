//! Buckets future-dated tasks into the
//! Upcoming cascade: seven single days,
//! the rest of the current month, the
//! next three months, then whole years.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{
  debug,
  trace
};

use crate::calendar::{
  YearMonth,
  date_to_day_number,
  day_number_to_date,
  day_of_month,
  first_of_month_day_number,
  month_end_day_number,
  month_name,
  shift_month,
  weekday_name,
  year_month_of,
  year_of
};
use crate::sort::sort_dated_by_date_asc_then_created_desc;
use crate::task::TaskRecord;

const DAY_BUCKETS: i64 = 7;
const MONTH_BUCKETS: usize = 3;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
  Day,
  Range,
  Month,
  Year
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
#[serde(
  tag = "kind",
  rename_all = "lowercase"
)]
pub enum UpcomingSection {
  Day {
    key:   String,
    title: String,
    date:  String,
    items: Vec<TaskRecord>
  },
  Range {
    key:   String,
    title: String,
    start: String,
    end:   String,
    items: Vec<TaskRecord>
  },
  Month {
    key:   String,
    title: String,
    year:  i32,
    month: u32,
    items: Vec<TaskRecord>
  },
  Year {
    key:   String,
    title: String,
    year:  i32,
    items: Vec<TaskRecord>
  }
}

impl UpcomingSection {
  pub fn kind(&self) -> SectionKind {
    match self {
      | Self::Day { .. } => {
        SectionKind::Day
      }
      | Self::Range { .. } => {
        SectionKind::Range
      }
      | Self::Month { .. } => {
        SectionKind::Month
      }
      | Self::Year { .. } => {
        SectionKind::Year
      }
    }
  }

  pub fn key(&self) -> &str {
    match self {
      | Self::Day { key, .. }
      | Self::Range { key, .. }
      | Self::Month { key, .. }
      | Self::Year { key, .. } => key
    }
  }

  pub fn title(&self) -> &str {
    match self {
      | Self::Day { title, .. }
      | Self::Range { title, .. }
      | Self::Month { title, .. }
      | Self::Year { title, .. } => title
    }
  }

  pub fn items(&self) -> &[TaskRecord] {
    match self {
      | Self::Day { items, .. }
      | Self::Range { items, .. }
      | Self::Month { items, .. }
      | Self::Year { items, .. } => items
    }
  }
}

/// Window boundaries derived from
/// `today`, all as day numbers.
struct Cascade {
  today:       i64,
  current:     YearMonth,
  month_end:   i64,
  range_start: i64,
  months:      [(YearMonth, i64);
    MONTH_BUCKETS],
  years_start: i64
}

impl Cascade {
  fn new(today: &str) -> Option<Self> {
    let today_n =
      date_to_day_number(today)?;
    let current = year_month_of(today)?;
    let month_end =
      month_end_day_number(current)?;

    let mut months = [(current, 0);
      MONTH_BUCKETS];
    for (idx, slot) in
      months.iter_mut().enumerate()
    {
      let ym = shift_month(
        current,
        i32::try_from(idx + 1).ok()?
      );
      *slot =
        (ym, month_end_day_number(ym)?);
    }

    let years_start =
      first_of_month_day_number(
        shift_month(
          current,
          i32::try_from(MONTH_BUCKETS + 1)
            .ok()?
        )
      )?;

    Some(Self {
      today: today_n,
      current,
      month_end,
      range_start: today_n
        + DAY_BUCKETS
        + 1,
      months,
      years_start
    })
  }
}

#[derive(Default)]
struct Buckets {
  days:   Vec<Vec<TaskRecord>>,
  range:  Vec<TaskRecord>,
  months: [Vec<TaskRecord>;
    MONTH_BUCKETS],
  years:  BTreeMap<i32, Vec<TaskRecord>>
}

impl Buckets {
  fn place(
    &mut self,
    cascade: &Cascade,
    task: &TaskRecord
  ) {
    let Some(day) = task
      .date()
      .and_then(date_to_day_number)
    else {
      trace!(id = %task.id, "skipping task without a valid date");
      return;
    };

    let offset = day - cascade.today;
    if offset < 1 {
      trace!(id = %task.id, offset, "skipping task not after today");
      return;
    }

    if offset <= DAY_BUCKETS {
      if let Some(slot) = usize::try_from(
        offset - 1
      )
      .ok()
      .and_then(|idx| {
        self.days.get_mut(idx)
      }) {
        slot.push(task.clone());
      }
      return;
    }

    if day <= cascade.month_end {
      self.range.push(task.clone());
      return;
    }

    if day < cascade.years_start
      && let Some(idx) = cascade
        .months
        .iter()
        .position(|(_, end)| day <= *end)
    {
      self.months[idx].push(task.clone());
      return;
    }

    self
      .years
      .entry(year_of(day))
      .or_default()
      .push(task.clone());
  }
}

/// Builds the Upcoming sections for
/// tasks already restricted to dates
/// after `today`.
///
/// The range section is dropped when
/// its window is empty and year
/// sections only exist for years with
/// tasks, but the three month sections
/// are always present. Each task lands
/// in the first section whose window
/// holds its date. An invalid `today`
/// yields no sections.
#[tracing::instrument(skip(tasks), fields(count = tasks.len()))]
pub fn build_upcoming_sections(
  tasks: &[TaskRecord],
  today: &str
) -> Vec<UpcomingSection> {
  let Some(cascade) = Cascade::new(today)
  else {
    debug!(
      today,
      "invalid today; no upcoming sections"
    );
    return vec![];
  };

  let mut buckets = Buckets {
    days: vec![
      Vec::new();
      DAY_BUCKETS as usize
    ],
    ..Buckets::default()
  };
  for task in tasks {
    buckets.place(&cascade, task);
  }

  let mut sections = Vec::new();

  for (idx, items) in
    buckets.days.into_iter().enumerate()
  {
    let day = cascade.today
      + idx as i64
      + 1;
    let date = day_number_to_date(day);
    let title = if idx == 0 {
      "Tomorrow".to_string()
    } else {
      weekday_name(day)
    };
    sections.push(UpcomingSection::Day {
      key: format!("day:{date}"),
      title,
      date,
      items: sort_dated_by_date_asc_then_created_desc(&items)
    });
  }

  if cascade.range_start
    <= cascade.month_end
  {
    let start = day_number_to_date(
      cascade.range_start
    );
    let end = day_number_to_date(
      cascade.month_end
    );
    sections.push(UpcomingSection::Range {
      key: format!("range:{start}:{end}"),
      title: format!(
        "{} {}\u{2013}{}",
        month_name(cascade.current.month),
        day_of_month(cascade.range_start),
        day_of_month(cascade.month_end)
      ),
      start,
      end,
      items: sort_dated_by_date_asc_then_created_desc(
        &buckets.range
      )
    });
  }

  for ((ym, _), items) in cascade
    .months
    .iter()
    .zip(buckets.months)
  {
    sections.push(UpcomingSection::Month {
      key: format!(
        "month:{:04}-{:02}",
        ym.year, ym.month
      ),
      title: month_name(ym.month)
        .to_string(),
      year: ym.year,
      month: ym.month,
      items: sort_dated_by_date_asc_then_created_desc(&items)
    });
  }

  for (year, items) in buckets.years {
    sections.push(UpcomingSection::Year {
      key: format!("year:{year}"),
      title: year.to_string(),
      year,
      items: sort_dated_by_date_asc_then_created_desc(&items)
    });
  }

  debug!(
    sections = sections.len(),
    "built upcoming sections"
  );
  sections
}
