use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::views::View;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "horizon",
    version,
    about = "Horizon: Today, Upcoming, Anytime, Someday, Logbook and Inbox views over a task file",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "horizonrc")]
    pub horizonrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    /// Minutes east of UTC used to work out today's date.
    #[arg(long = "tz-offset", allow_hyphen_values = true)]
    pub tz_offset: Option<String>,

    /// Print views as JSON instead of tables.
    #[arg(long = "json")]
    pub json: bool,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Show(View),
    Add,
    Schedule,
    Done,
    Archive,
    TodayDate,
}

impl Command {
    const ACTIONS: [(&'static str, Command); 5] = [
        ("add", Command::Add),
        ("schedule", Command::Schedule),
        ("done", Command::Done),
        ("archive", Command::Archive),
        ("today-date", Command::TodayDate),
    ];

    pub fn names() -> Vec<&'static str> {
        View::ALL
            .iter()
            .map(View::as_str)
            .chain(Self::ACTIONS.iter().map(|(name, _)| *name))
            .collect()
    }

    fn from_name(name: &str) -> Option<Command> {
        Self::ACTIONS
            .iter()
            .find(|(action, _)| *action == name)
            .map(|(_, command)| *command)
            .or_else(|| View::parse(name).map(Command::Show))
    }

    /// Resolves an exact name or an unambiguous prefix of one.
    pub fn parse(token: &str) -> Option<Command> {
        let names = Self::names();
        let full = expand_command_abbrev(token, &names)?;
        Self::from_name(full)
    }
}

pub fn expand_command_abbrev<'a>(token: &str, known: &[&'a str]) -> Option<&'a str> {
    if let Some(exact) = known.iter().copied().find(|name| *name == token) {
        return Some(exact);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: Command,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        let Some((first, args)) = tokens.split_first() else {
            debug!(view = %cfg.default_view, "no explicit command, using default view");
            return Ok(Self {
                command: Command::Show(cfg.default_view),
                command_args: vec![],
            });
        };

        let command = Command::parse(&first.to_ascii_lowercase())
            .ok_or_else(|| anyhow!("unknown or ambiguous command: {first}"))?;
        debug!(token = %first, ?command, "resolved command token");

        Ok(Self {
            command,
            command_args: args.to_vec(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "horizon add", no_binary_name = true)]
pub struct AddArgs {
    /// Task title.
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,

    #[arg(long)]
    pub date: Option<String>,

    #[arg(long)]
    pub deadline: Option<String>,

    #[arg(long, conflicts_with_all = ["date", "deadline"])]
    pub someday: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "horizon schedule", no_binary_name = true)]
pub struct ScheduleArgs {
    /// Id or unique id prefix of the task.
    pub id: String,

    #[command(flatten)]
    pub fields: ScheduleFields,

    /// Confirm changes that drop a deadline.
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScheduleFields {
    #[arg(long, conflicts_with = "clear_date")]
    pub date: Option<String>,

    #[arg(long)]
    pub clear_date: bool,

    #[arg(long, conflicts_with = "clear_deadline")]
    pub deadline: Option<String>,

    #[arg(long)]
    pub clear_deadline: bool,

    #[arg(long, conflicts_with = "no_someday")]
    pub someday: bool,

    #[arg(long)]
    pub no_someday: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "horizon", no_binary_name = true)]
pub struct IdArgs {
    /// Id or unique id prefix of the task.
    pub id: String,
}
