mod repl;
mod telemetry;

use std::fmt;
use std::sync::Arc;

use quiz_core::model::{DEFAULT_SCOPE, QuizId, QuizIdentity};
use services::{
    FakeQuizService, HttpQuizService, LeaderboardView, QuizService, QuizSessionController,
    ServiceConfig,
};
use storage::Storage;

const DEFAULT_DB_URL: &str = "sqlite://quiz-state.sqlite3";
const DEFAULT_LEADERBOARD_LIMIT: u32 = 20;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLimit { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  quiz [play]       [--api <url>] [--quiz <id>] [--db <sqlite_url>] [--scope <name>] [--offline]");
    eprintln!("  quiz leaderboard  [--api <url>] [--limit <n>] [--offline]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --api http://localhost:8000");
    eprintln!("  --quiz quiz1");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --scope {DEFAULT_SCOPE}");
    eprintln!("  --limit {DEFAULT_LEADERBOARD_LIMIT}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_API_BASE_URL, QUIZ_API_TIMEOUT_SECS, QUIZ_ID, QUIZ_PASS_SCORE,");
    eprintln!("  QUIZ_DB_URL, QUIZ_LOG_JSON, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Leaderboard,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "leaderboard" => Some(Self::Leaderboard),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    api_url: Option<String>,
    quiz_id: Option<String>,
    db_url: String,
    scope: String,
    offline: bool,
    limit: u32,
}

impl Args {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        env_db_url: Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            api_url: None,
            quiz_id: None,
            db_url: env_db_url.map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url),
            scope: DEFAULT_SCOPE.into(),
            offline: false,
            limit: DEFAULT_LEADERBOARD_LIMIT,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api" => parsed.api_url = Some(require_value(args, "--api")?),
                "--quiz" => parsed.quiz_id = Some(require_value(args, "--quiz")?),
                "--scope" => parsed.scope = require_value(args, "--scope")?,
                "--offline" => parsed.offline = true,
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    parsed.limit = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
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
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

fn build_service(
    args: &Args,
    config: &ServiceConfig,
) -> Result<Arc<dyn QuizService>, Box<dyn std::error::Error>> {
    if args.offline {
        tracing::info!("Using the built-in offline quiz");
        return Ok(Arc::new(FakeQuizService::sample()));
    }
    Ok(Arc::new(HttpQuizService::new(config)?))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter(), std::env::var("QUIZ_DB_URL").ok()).map_err(
        |e| {
            eprintln!("{e}");
            print_usage();
            e
        },
    )?;

    telemetry::init_tracing(telemetry::json_from_env())?;

    let mut config = ServiceConfig::from_env()?;
    if let Some(api_url) = &parsed.api_url {
        config = config.with_base_url(api_url)?;
    }
    if let Some(quiz_id) = &parsed.quiz_id {
        config = config.with_quiz_id(QuizId::new(quiz_id.as_str()));
    }
    let service = build_service(&parsed, &config)?;

    if let Err(err) = service.health().await {
        tracing::warn!(error = %err, base_url = %config.base_url, "Quiz service health check failed");
        eprintln!("warning: quiz service looks unavailable ({err})");
    }

    match cmd {
        Command::Leaderboard => {
            let mut board = LeaderboardView::new(service);
            println!("{}", board.refresh(parsed.limit).await);
            Ok(())
        }
        Command::Play => {
            // Open + migrate SQLite here so services stay storage-agnostic.
            prepare_sqlite_file(&parsed.db_url)?;
            let storage = Storage::sqlite(&parsed.db_url).await?;

            let identity = QuizIdentity::new(config.quiz_id.clone(), parsed.scope.as_str());
            let mut quiz = QuizSessionController::new(
                identity,
                Arc::clone(&storage.kv),
                Arc::clone(&service),
            )
            .with_pass_threshold(config.default_pass_score);
            let mut board = LeaderboardView::new(service);

            repl::play(&mut quiz, &mut board).await
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
