use std::fmt;
use std::sync::Arc;

use practice_core::model::{HistoryId, TestId, TestKind};
use services::{
    Clock, HistoryService, HttpQuestionSource, PracticeLoopService, SessionConfig,
};
use storage::Storage;
use storage::repository::QuestionSource;
use tracing_subscriber::EnvFilter;

mod terminal;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidTestId { raw: String },
    InvalidKind { raw: String },
    InvalidLimit { raw: String },
    InvalidHistoryId { raw: String },
    MissingHistoryId,
    ApiNotConfigured,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidTestId { raw } => write!(f, "invalid --test-id value: {raw}"),
            ArgsError::InvalidKind { raw } => write!(f, "invalid --kind value: {raw}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
            ArgsError::InvalidHistoryId { raw } => write!(f, "invalid history id: {raw}"),
            ArgsError::MissingHistoryId => write!(f, "delete requires a history id"),
            ArgsError::ApiNotConfigured => {
                write!(f, "--source api requires PRACTICE_API_BASE_URL")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    History,
    Delete,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "history" => Some(Self::History),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Sqlite,
    Api,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Args {
    db_url: String,
    kind: TestKind,
    test_id: TestId,
    source: Source,
    limit: Option<u32>,
    history_id: Option<HistoryId>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            db_url: "sqlite://practice.sqlite3".into(),
            kind: TestKind::Reading,
            test_id: TestId::new(1),
            source: Source::Sqlite,
            limit: None,
            history_id: None,
        }
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- run     [--db <sqlite_url>] [--kind <kind>] [--test-id <id>] [--source sqlite|api]");
    eprintln!("  cargo run -p app -- history [--db <sqlite_url>] [--limit <n>]");
    eprintln!("  cargo run -p app -- delete  <history-id> [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults for run:");
    eprintln!("  --db sqlite://practice.sqlite3");
    eprintln!("  --kind reading");
    eprintln!("  --test-id 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PRACTICE_DB_URL, PRACTICE_TEST_ID, PRACTICE_TEST_KIND,");
    eprintln!("  PRACTICE_SHOW_ANSWER_AFTER_EACH, PRACTICE_FONT_SIZE, PRACTICE_HISTORY_LIMIT,");
    eprintln!("  PRACTICE_API_BASE_URL, PRACTICE_API_TOKEN, RUST_LOG");
}

impl Args {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            db_url: std::env::var("PRACTICE_DB_URL")
                .ok()
                .map_or(defaults.db_url, normalize_sqlite_url),
            kind: std::env::var("PRACTICE_TEST_KIND")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.kind),
            test_id: std::env::var("PRACTICE_TEST_ID")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.test_id),
            ..defaults
        }
    }

    fn parse(
        mut self,
        cmd: Command,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    self.db_url = normalize_sqlite_url(value);
                }
                "--kind" => {
                    let value = require_value(args, "--kind")?;
                    self.kind = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidKind { raw: value.clone() })?;
                }
                "--test-id" => {
                    let value = require_value(args, "--test-id")?;
                    self.test_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidTestId { raw: value.clone() })?;
                }
                "--source" => {
                    let value = require_value(args, "--source")?;
                    self.source = match value.as_str() {
                        "sqlite" => Source::Sqlite,
                        "api" => Source::Api,
                        _ => return Err(ArgsError::UnknownArg(value)),
                    };
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    self.limit = Some(
                        value
                            .parse()
                            .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?,
                    );
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other if cmd == Command::Delete && !other.starts_with("--") => {
                    let id = other
                        .parse()
                        .map_err(|_| ArgsError::InvalidHistoryId { raw: arg.clone() })?;
                    self.history_id = Some(id);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if cmd == Command::Delete && self.history_id.is_none() {
            return Err(ArgsError::MissingHistoryId);
        }
        Ok(self)
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn parse_command_line(argv: Vec<String>, base: Args) -> Result<Option<(Command, Args)>, ArgsError> {
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Run,
        Some("--help" | "-h") => return Ok(None),
        Some(first) if first.starts_with("--") => Command::Run,
        Some(first) => {
            Command::from_arg(first).ok_or_else(|| ArgsError::UnknownArg(first.to_string()))?
        }
    };

    let mut iter = argv.into_iter().peekable();
    if iter.peek().is_some_and(|first| !first.starts_with("--")) {
        iter.next();
    }
    base.parse(cmd, &mut iter).map(|args| Some((cmd, args)))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let Some((cmd, args)) = parse_command_line(argv, Args::from_env()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?
    else {
        print_usage();
        return Ok(());
    };

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let storage = Storage::sqlite(&args.db_url).await?;
    let clock = Clock::system();
    let config = SessionConfig::from_env();

    match cmd {
        Command::Run => {
            let questions: Arc<dyn QuestionSource> = match args.source {
                Source::Sqlite => Arc::clone(&storage.questions),
                Source::Api => {
                    Arc::new(HttpQuestionSource::from_env().ok_or(ArgsError::ApiNotConfigured)?)
                }
            };
            let session_loop =
                PracticeLoopService::new(clock, questions, Arc::clone(&storage.history))
                    .with_config(config);
            terminal::run_session(&session_loop, args.kind, args.test_id).await
        }
        Command::History => {
            let history = HistoryService::new(clock, Arc::clone(&storage.history));
            let items = history
                .list_recent(args.limit.unwrap_or(config.history_list_limit))
                .await?;
            if items.is_empty() {
                println!("No completed sessions yet.");
            }
            for item in items {
                println!(
                    "{}  {}  {:<9} {} #{} {:<20} {:>3}%  ({}/{} correct, {} skipped)",
                    item.history_id,
                    item.completed_at.format("%Y-%m-%d %H:%M"),
                    item.test_kind.as_str(),
                    item.level,
                    item.test_id,
                    item.title,
                    item.percentage,
                    item.correct,
                    item.total,
                    item.skipped,
                );
            }
            Ok(())
        }
        Command::Delete => {
            let id = args.history_id.ok_or(ArgsError::MissingHistoryId)?;
            let history = HistoryService::new(clock, Arc::clone(&storage.history));
            if history.delete(id).await? {
                println!("Deleted {id}");
            } else {
                println!("No history record {id}");
            }
            Ok(())
        }
    }
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so they do not interleave with the question view.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
