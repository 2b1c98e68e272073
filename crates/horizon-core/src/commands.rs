use std::collections::HashMap;
use std::io::{self, Write};

use anyhow::{Context, anyhow};
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::cli::{AddArgs, Command, IdArgs, Invocation, ScheduleArgs, ScheduleFields};
use crate::clock::Clock;
use crate::datastore::DataStore;
use crate::render::Renderer;
use crate::schedule::{FieldChange, SchedulePatch, ScheduleState, plan_schedule_change};
use crate::task::StoredTask;
use crate::views::{View, ViewOutput, build_view};

#[derive(Debug, Serialize)]
struct ViewJson<'a> {
    view: View,
    today: &'a str,
    output: &'a ViewOutput,
}

#[instrument(skip(store, renderer, clock, inv))]
pub fn dispatch(
    store: &DataStore,
    renderer: &Renderer,
    clock: &Clock,
    inv: Invocation,
    json: bool,
) -> anyhow::Result<()> {
    debug!(
        command = ?inv.command,
        args = ?inv.command_args,
        today = %clock.today(),
        "dispatching command"
    );

    match inv.command {
        Command::Show(view) => cmd_show(store, renderer, clock, view, json),
        Command::Add => cmd_add(store, clock, &inv.command_args),
        Command::Schedule => cmd_schedule(store, &inv.command_args),
        Command::Done => cmd_done(store, clock, &inv.command_args),
        Command::Archive => cmd_archive(store, clock, &inv.command_args),
        Command::TodayDate => {
            println!("{}", clock.today());
            Ok(())
        }
    }
}

#[instrument(skip(store, renderer, clock))]
fn cmd_show(
    store: &DataStore,
    renderer: &Renderer,
    clock: &Clock,
    view: View,
    json: bool,
) -> anyhow::Result<()> {
    info!("command show");

    let tasks = store.load()?;
    let today = clock.today();
    let output = build_view(view, &tasks, &today);
    debug!(
        total = tasks.len(),
        shown = output.task_count(),
        "built view"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        let payload = ViewJson {
            view,
            today: &today,
            output: &output,
        };
        serde_json::to_writer_pretty(&mut out, &payload).context("failed to serialize view")?;
        writeln!(out)?;
        return Ok(());
    }

    let titles: HashMap<&str, &StoredTask> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    renderer.write_view(&mut out, view, &output, &titles, &today)
}

#[instrument(skip(store, clock, args))]
fn cmd_add(store: &DataStore, clock: &Clock, args: &[String]) -> anyhow::Result<()> {
    info!("command add");

    let args = AddArgs::try_parse_from(args)?;
    let title = args.title.join(" ").trim().to_string();
    if title.is_empty() {
        return Err(anyhow!("add requires a title"));
    }

    let patch = SchedulePatch {
        date: args.date.map_or(FieldChange::Keep, FieldChange::Set),
        deadline: args.deadline.map_or(FieldChange::Keep, FieldChange::Set),
        someday: args.someday.then_some(true),
    };
    let blank = ScheduleState {
        date: None,
        deadline: None,
        someday: false,
    };
    let planned = plan_schedule_change(&blank, &patch, false)?;

    let mut task = StoredTask::new(title, clock.now);
    planned.write_to(&mut task);
    let short = task.short_id().to_string();
    let tasks = store.add(task)?;

    debug!(total = tasks.len(), "task added");
    println!("Created task {short}.");
    Ok(())
}

fn patch_from_fields(fields: &ScheduleFields) -> SchedulePatch {
    let change = |set: &Option<String>, clear: bool| match (set, clear) {
        (Some(value), _) => FieldChange::Set(value.clone()),
        (None, true) => FieldChange::Clear,
        (None, false) => FieldChange::Keep,
    };

    let someday = if fields.someday {
        Some(true)
    } else if fields.no_someday {
        Some(false)
    } else {
        None
    };

    SchedulePatch {
        date: change(&fields.date, fields.clear_date),
        deadline: change(&fields.deadline, fields.clear_deadline),
        someday,
    }
}

#[instrument(skip(store, args))]
fn cmd_schedule(store: &DataStore, args: &[String]) -> anyhow::Result<()> {
    info!("command schedule");

    let args = ScheduleArgs::try_parse_from(args)?;
    let patch = patch_from_fields(&args.fields);
    if patch == SchedulePatch::default() {
        return Err(anyhow!("schedule needs at least one change"));
    }

    let updated = store.update(&args.id, |task| {
        let current = ScheduleState::from(&*task);
        let next = plan_schedule_change(&current, &patch, args.yes).inspect_err(|err| {
            warn!(id = %task.id, error = %err, "schedule change rejected");
        })?;
        next.write_to(task);
        Ok(())
    })?;

    let describe = |value: Option<&str>| value.unwrap_or("-").to_string();
    println!(
        "Scheduled task {}: date {}, deadline {}{}.",
        updated.short_id(),
        describe(updated.date.as_deref()),
        describe(updated.deadline.as_deref()),
        if updated.someday { ", someday" } else { "" }
    );
    Ok(())
}

#[instrument(skip(store, clock, args))]
fn cmd_done(store: &DataStore, clock: &Clock, args: &[String]) -> anyhow::Result<()> {
    info!("command done");

    let args = IdArgs::try_parse_from(args)?;
    let updated = store.update(&args.id, |task| {
        if task.is_completed() {
            return Err(anyhow!("task {} is already completed", task.short_id()));
        }
        task.completed_at = Some(clock.now);
        Ok(())
    })?;

    println!("Completed task {} '{}'.", updated.short_id(), updated.title);
    Ok(())
}

#[instrument(skip(store, clock, args))]
fn cmd_archive(store: &DataStore, clock: &Clock, args: &[String]) -> anyhow::Result<()> {
    info!("command archive");

    let args = IdArgs::try_parse_from(args)?;
    let updated = store.update(&args.id, |task| {
        if task.is_archived() {
            return Err(anyhow!("task {} is already archived", task.short_id()));
        }
        task.archived_at = Some(clock.now);
        Ok(())
    })?;

    println!("Archived task {} '{}'.", updated.short_id(), updated.title);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_map_to_patch() {
        let fields = ScheduleFields {
            date: Some("2026-02-10".to_string()),
            clear_deadline: true,
            no_someday: true,
            ..ScheduleFields::default()
        };
        let patch = patch_from_fields(&fields);
        assert_eq!(patch.date, FieldChange::Set("2026-02-10".to_string()));
        assert_eq!(patch.deadline, FieldChange::Clear);
        assert_eq!(patch.someday, Some(false));

        assert_eq!(
            patch_from_fields(&ScheduleFields::default()),
            SchedulePatch::default()
        );
    }
}
