use std::collections::HashMap;
use std::io::{IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::calendar::is_valid_date;
use crate::config::Config;
use crate::deadline::{format_overdue_days_ago, get_overdue_reference_date};
use crate::task::{StoredTask, TaskRecord};
use crate::upcoming::UpcomingSection;
use crate::views::{View, ViewOutput};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color && std::io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Writes a view as a table, or as headed tables per section for
    /// grouped views. `titles` maps task ids back to stored tasks.
    #[tracing::instrument(skip(self, out, output, titles))]
    pub fn write_view<W: Write>(
        &self,
        mut out: W,
        view: View,
        output: &ViewOutput,
        titles: &HashMap<&str, &StoredTask>,
        today: &str,
    ) -> anyhow::Result<()> {
        match output {
            ViewOutput::Flat(tasks) => {
                writeln!(out, "{}", self.paint(&heading(view), "1"))?;
                if tasks.is_empty() {
                    writeln!(out, "No tasks.")?;
                    return Ok(());
                }
                write_table(&mut out, headers(), self.rows(tasks, titles, today))?;
            }
            ViewOutput::Grouped(sections) => {
                writeln!(out, "{}", self.paint(&heading(view), "1"))?;
                for section in sections {
                    self.write_section(&mut out, section, titles, today)?;
                }
            }
        }
        Ok(())
    }

    fn write_section<W: Write>(
        &self,
        mut out: W,
        section: &UpcomingSection,
        titles: &HashMap<&str, &StoredTask>,
        today: &str,
    ) -> anyhow::Result<()> {
        writeln!(out)?;
        let label = match section {
            UpcomingSection::Day { title, date, .. } => format!("{title} ({date})"),
            UpcomingSection::Range { title, .. }
            | UpcomingSection::Month { title, .. }
            | UpcomingSection::Year { title, .. } => title.clone(),
        };
        writeln!(out, "{}", self.paint(&label, "36"))?;

        if section.items().is_empty() {
            writeln!(out, "  -")?;
            return Ok(());
        }
        write_table(&mut out, headers(), self.rows(section.items(), titles, today))
    }

    fn rows(
        &self,
        tasks: &[TaskRecord],
        titles: &HashMap<&str, &StoredTask>,
        today: &str,
    ) -> Vec<Vec<String>> {
        tasks
            .iter()
            .map(|task| {
                let stored = titles.get(task.id.as_str());
                let id = stored
                    .map(|s| s.short_id().to_string())
                    .unwrap_or_else(|| task.id.clone());
                let title = stored.map(|s| s.title.clone()).unwrap_or_default();

                let date = task.date().unwrap_or_default().to_string();
                let deadline = task
                    .deadline()
                    .filter(|d| is_valid_date(d))
                    .map(|d| format!("due {d}"))
                    .unwrap_or_default();

                let reference = get_overdue_reference_date(task.date(), task.deadline());
                let overdue = format_overdue_days_ago(reference.as_deref(), today)
                    .map(|label| self.paint(&label, "31"))
                    .unwrap_or_default();

                vec![self.paint(&id, "33"), date, deadline, title, overdue]
            })
            .collect()
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn heading(view: View) -> String {
    let name = view.as_str();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn headers() -> Vec<String> {
    ["ID", "Date", "Deadline", "Title", "Overdue"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
