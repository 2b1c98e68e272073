pub mod calendar;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod deadline;
pub mod render;
pub mod schedule;
pub mod sort;
pub mod task;
pub mod upcoming;
pub mod views;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use crate::task::TaskRecord;
pub use crate::upcoming::{
  UpcomingSection,
  build_upcoming_sections
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting horizon CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.horizonrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  )?;

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let renderer =
    render::Renderer::new(&cfg);
  let clock = clock::Clock::resolve(
    &clock::OffsetSources::gather(
      cli.tz_offset.as_deref(),
      &cfg
    ),
    Utc::now()
  );
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  commands::dispatch(
    &store, &renderer, &clock, inv,
    cli.json
  )?;

  info!("done");
  Ok(())
}
