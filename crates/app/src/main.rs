use std::fmt;
use std::path::Path;

use course_core::model::{MaterialId, Quiz, ResourceCatalog, UserId, WeekId};
use course_core::quiz::QuizSession;
use services::{AppConfig, AppServices, SyncResult, Verbosity, init_logging};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidUser { raw: String },
    InvalidWeek { raw: String },
    InvalidMaterial { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw:?}"),
            ArgsError::InvalidWeek { raw } => write!(f, "invalid week: {raw}"),
            ArgsError::InvalidMaterial { raw } => write!(f, "invalid material id: {raw}"),
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
    eprintln!("  course-progress status [options]");
    eprintln!("  course-progress toggle <week> <material> [options]");
    eprintln!("  course-progress watch  [options]");
    eprintln!("  course-progress quiz <quiz.json>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>     defaults to sqlite://course.sqlite3");
    eprintln!("  --user <id>           sign in as <id>; anonymous when omitted");
    eprintln!("  --catalog <path|url>  weekly resource catalog (JSON)");
    eprintln!("  -v, --verbose | -q, --quiet");
    eprintln!();
    eprintln!("In watch mode, type `<week> <material>` to toggle, `status`, `retry` or `quit`.");
    eprintln!("In a quiz, answer with an option number; `n`/`p` move, `done` scores early.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COURSE_DB_URL, COURSE_USER, COURSE_CATALOG, COURSE_RETRY_INTERVAL_SECS,");
    eprintln!("  COURSE_CACHE_TTL_SECS, COURSE_FIRESTORE_PROJECT, COURSE_FIRESTORE_TOKEN,");
    eprintln!("  COURSE_FIRESTORE_COLLECTION, COURSE_FIRESTORE_BASE_URL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Status,
    Toggle(WeekId, MaterialId),
    Watch,
}

struct Args {
    command: Command,
    config: AppConfig,
    verbosity: Verbosity,
}

impl Args {
    fn parse(
        command: Command,
        args: &mut impl Iterator<Item = String>,
        mut config: AppConfig,
    ) -> Result<Self, ArgsError> {
        let mut verbosity = Verbosity::Normal;
        config.db_url = normalize_sqlite_url(config.db_url);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    config.db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    let user = UserId::new(value.trim())
                        .map_err(|_| ArgsError::InvalidUser { raw: value.clone() })?;
                    config.user = Some(user);
                }
                "--catalog" => {
                    let value = require_value(args, "--catalog")?;
                    config.catalog = Some(services::CatalogLocation::parse(value.trim()));
                }
                "-v" | "--verbose" => verbosity = Verbosity::Verbose,
                "-q" | "--quiet" => verbosity = Verbosity::Quiet,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            command,
            config,
            verbosity,
        })
    }
}

fn parse_target(week: &str, material: &str) -> Result<Command, ArgsError> {
    let week = week.parse::<WeekId>().map_err(|_| ArgsError::InvalidWeek {
        raw: week.to_string(),
    })?;
    let material = material
        .parse::<MaterialId>()
        .map_err(|_| ArgsError::InvalidMaterial {
            raw: material.to_string(),
        })?;
    Ok(Command::Toggle(week, material))
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.contains("mode=memory") {
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
    if db_url == "sqlite::memory:" || db_url.contains("mode=memory") {
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

fn describe(outcome: &SyncResult) -> String {
    match outcome {
        SyncResult::Success => "synced".to_string(),
        SyncResult::Degraded(issue) => format!("saved locally ({issue})"),
        SyncResult::Failed(issue) => format!("not applied ({issue})"),
    }
}

fn print_status(app: &AppServices, catalog: &ResourceCatalog) {
    let sync = app.sync();
    match sync.current_user() {
        Some(user) => println!("user: {user}"),
        None => println!("user: anonymous"),
    }
    for week in catalog.weeks() {
        let title = week.title.as_deref().unwrap_or("");
        println!(
            "week {:>4}  {:>3}%  {title}",
            week.week.to_string(),
            sync.percent_complete(catalog, week.week)
        );
    }
    println!("total      {:>3}%", sync.percent_complete_total(catalog));
    println!("completed: {}", sync.progress().completed_count());
    if let Some(message) = sync.sync_error() {
        println!("note: {message}");
    }
}

async fn toggle(app: &AppServices, week: WeekId, material: MaterialId) {
    let outcome = app.sync().toggle_completion(week, material).await;
    let state = if app.sync().is_completed(week, material) {
        "completed"
    } else {
        "not completed"
    };
    println!("{week}-{material}: {state}, {}", describe(&outcome));
}

async fn watch(
    app: &AppServices,
    catalog: &ResourceCatalog,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            return Ok(());
        };

        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => {}
            ["quit" | "exit"] => return Ok(()),
            ["status"] => print_status(app, catalog),
            ["retry"] => match app.sync().current_user() {
                Some(user) => {
                    let outcome = app.sync().retry_pending_syncs(&user).await;
                    println!("retry: {}", describe(&outcome));
                }
                None => println!("retry: nothing to sync while anonymous"),
            },
            [week, material] => match parse_target(week, material) {
                Ok(Command::Toggle(week, material)) => toggle(app, week, material).await,
                Ok(_) => {}
                Err(err) => println!("{err}"),
            },
            _ => println!("expected `<week> <material>`, `status`, `retry` or `quit`"),
        }
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuizInput {
    Answer(usize),
    Next,
    Previous,
    Done,
}

/// Options are shown 1-based; `0` and anything unrecognised yield `None`.
fn parse_quiz_input(raw: &str) -> Option<QuizInput> {
    match raw.trim() {
        "n" | "next" => Some(QuizInput::Next),
        "p" | "prev" => Some(QuizInput::Previous),
        "done" => Some(QuizInput::Done),
        other => other
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .map(QuizInput::Answer),
    }
}

/// Apply one input; returns `true` once the attempt should be scored.
fn quiz_step(session: &mut QuizSession, input: QuizInput) -> Result<bool, course_core::Error> {
    match input {
        QuizInput::Next => session.next()?,
        QuizInput::Previous => session.previous()?,
        QuizInput::Done => return Ok(true),
        QuizInput::Answer(option) => {
            session.answer(option)?;
            if session.is_last() {
                return Ok(true);
            }
            session.next()?;
        }
    }
    Ok(false)
}

async fn run_quiz(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let quiz: Quiz = serde_json::from_str(&raw)?;
    println!("{} (week {}, {} questions)", quiz.title, quiz.week, quiz.len());

    let mut session = QuizSession::new(quiz);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let question = session.current_question();
        println!();
        println!("{}. {}", session.current_index() + 1, question.prompt);
        for (i, option) in question.options.iter().enumerate() {
            println!("  {}) {option}", i + 1);
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(input) = parse_quiz_input(&line) else {
            println!("answer with an option number, or `n`, `p`, `done`");
            continue;
        };
        match quiz_step(&mut session, input) {
            Ok(true) => break,
            Ok(false) => {}
            Err(err) => println!("{err}"),
        }
    }

    let score = session.finish().map_err(course_core::Error::from)?;
    println!(
        "score: {}/{} ({}%), {} answered",
        score.correct,
        score.total,
        score.percent,
        session.answered_count()
    );
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let command = match argv.next().as_deref() {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some("status") => Command::Status,
        Some("watch") => Command::Watch,
        Some("toggle") => {
            let week = require_value(&mut argv, "toggle")?;
            let material = require_value(&mut argv, "toggle")?;
            parse_target(&week, &material)?
        }
        Some("quiz") => {
            let path = require_value(&mut argv, "quiz")?;
            if let Some(extra) = argv.next() {
                return Err(ArgsError::UnknownArg(extra).into());
            }
            init_logging(Verbosity::Normal);
            return run_quiz(Path::new(&path)).await;
        }
        Some(other) => return Err(ArgsError::UnknownArg(other.to_string()).into()),
    };

    let args = Args::parse(command, &mut argv, AppConfig::from_env()?)?;
    init_logging(args.verbosity);
    prepare_sqlite_file(&args.config.db_url)?;
    debug!(db = %args.config.db_url, "opening progress store");

    let app = AppServices::new(&args.config).await?;
    let loaded = app.start_session(args.config.user.clone()).await;
    if let Some(issue) = loaded.issue() {
        eprintln!("warning: {issue}");
    }
    let catalog = app.catalog().await?;

    let result = match args.command {
        Command::Status => {
            print_status(&app, &catalog);
            Ok(())
        }
        Command::Toggle(week, material) => {
            toggle(&app, week, material).await;
            Ok(())
        }
        Command::Watch => watch(&app, &catalog).await,
    };

    app.shutdown();
    result
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
