use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use util::config::AppConfig;
use util::document::DocumentError;
use util::execution_config::GradingOptions;
use util::rubric::load_rubric;
use util::submission::{DEFAULT_STUDENT_ID_COLUMN, load_submissions, load_submissions_csv};

use marker::{GradingJob, MarkerError, export, registry};

const LOG_DIR: &str = "logs";

#[derive(Debug, Parser)]
#[command(name = "marker", version, about = "Grade submissions against a rubric")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Grade every submission in a file and write the results.
    Grade(GradeArgs),
    /// Check a rubric without grading anything.
    Validate {
        #[arg(long)]
        rubric: PathBuf,
    },
}

#[derive(Debug, Args)]
struct GradeArgs {
    /// Rubric file (.yaml, .yml or .json).
    #[arg(long)]
    rubric: PathBuf,

    /// Submissions file (.yaml, .yml, .json or .csv).
    #[arg(long)]
    submissions: PathBuf,

    /// Column holding the student id when submissions are a CSV file.
    #[arg(long, default_value = DEFAULT_STUDENT_ID_COLUMN)]
    student_col: String,

    /// Where to write the results; printed as JSON when omitted.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Also write one row of totals per student.
    #[arg(long)]
    csv_summary: Option<PathBuf>,

    /// Also write one row per student and rule.
    #[arg(long)]
    csv_detailed: Option<PathBuf>,

    /// Also write a Canvas gradebook import.
    #[arg(long)]
    canvas: Option<PathBuf>,

    /// Grading threads; overrides GRADING_WORKERS.
    #[arg(long, env = "GRADING_WORKERS")]
    workers: Option<usize>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let cfg = AppConfig::global().clone();
    let _log_guard = init_logging(&cfg);

    let result = match cli.command {
        Command::Grade(args) => run_grade(&cfg, args),
        Command::Validate { rubric } => run_validate(&cfg, rubric),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "marker failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn run_grade(cfg: &AppConfig, args: GradeArgs) -> Result<(), MarkerError> {
    let rubric = load_rubric(&args.rubric)?;
    let submissions = if is_csv(&args.submissions) {
        load_submissions_csv(&args.submissions, &args.student_col)?
    } else {
        load_submissions(&args.submissions)?
    };

    let mut options = GradingOptions::from_config(cfg);
    if let Some(workers) = args.workers {
        options.workers = workers;
    }

    let report = GradingJob::new(&rubric)
        .with_options(options)
        .with_progress(|done, total| tracing::debug!(done, total, "Submission graded"))
        .grade(&submissions)?;

    for result in &report.results {
        tracing::info!("{}", result.summary());
    }

    match &args.output {
        Some(path) => {
            util::document::write_document(&report, path)?;
            tracing::info!(path = %path.display(), "Results written");
        }
        None => {
            let json = serde_json::to_string_pretty(&report).map_err(|source| DocumentError::Json {
                path: PathBuf::from("<stdout>"),
                source,
            })?;
            println!("{json}");
        }
    }

    if let Some(path) = &args.csv_summary {
        export::write_summary_csv(&report, path)?;
    }
    if let Some(path) = &args.csv_detailed {
        export::write_detailed_csv(&report, path)?;
    }
    if let Some(path) = &args.canvas {
        export::write_canvas_csv(&report, path)?;
    }
    Ok(())
}

fn run_validate(cfg: &AppConfig, rubric: PathBuf) -> Result<(), MarkerError> {
    let rubric = load_rubric(&rubric)?;
    let limits = GradingOptions::from_config(cfg).script_limits;
    registry::global().validate_rubric_with(&rubric, &limits)?;
    println!(
        "{}: {} rule(s), {} point(s) declared",
        rubric.name,
        rubric.rules.len(),
        rubric.declared_max_points()
    );
    Ok(())
}

/// Creates the rolling log directory, reporting on stderr when it cannot be
/// created since no subscriber exists yet.
fn prepare_log_dir(dir: &Path) -> bool {
    match std::fs::create_dir_all(dir) {
        Ok(()) => true,
        Err(err) => {
            eprintln!(
                "warning: cannot create log directory {}: {err}; file logging disabled",
                dir.display()
            );
            false
        }
    }
}

/// Installs the global subscriber. The returned guard flushes the file writer
/// on drop, so it must live until `main` returns.
fn init_logging(cfg: &AppConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let env_filter =
        EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    let console_layer = cfg.log_to_stdout.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
            .with_thread_ids(true)
    });

    let log_file = cfg
        .log_file
        .as_ref()
        .filter(|_| prepare_log_dir(Path::new(LOG_DIR)));
    let (file_layer, guard) = match log_file {
        Some(log_file) => {
            let (writer, guard) = tracing_appender::non_blocking(rolling::daily(LOG_DIR, log_file));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unusable_log_dir_disables_file_logging() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        assert!(!prepare_log_dir(&blocker.join("logs")));
        assert!(prepare_log_dir(&dir.path().join("nested/logs")));
        assert!(dir.path().join("nested/logs").is_dir());
    }

    #[test]
    fn csv_submissions_are_picked_by_extension() {
        assert!(is_csv(Path::new("subs.csv")));
        assert!(is_csv(Path::new("subs.CSV")));
        assert!(!is_csv(Path::new("subs.yaml")));
        assert!(!is_csv(Path::new("csv")));
    }

    #[test]
    fn grade_flags_parse() {
        let cli = Cli::try_parse_from([
            "marker", "grade", "--rubric", "r.yaml", "--submissions", "s.csv",
            "--student-col", "sid", "--csv-summary", "sum.csv", "--canvas", "canvas.csv",
        ])
        .unwrap();
        let Command::Grade(args) = cli.command else {
            panic!("expected grade");
        };
        assert_eq!(args.student_col, "sid");
        assert_eq!(args.csv_summary, Some(PathBuf::from("sum.csv")));
        assert_eq!(args.csv_detailed, None);
        assert_eq!(args.canvas, Some(PathBuf::from("canvas.csv")));

        let defaults = Cli::try_parse_from(["marker", "grade", "--rubric", "r", "--submissions", "s"]).unwrap();
        let Command::Grade(args) = defaults.command else {
            panic!("expected grade");
        };
        assert_eq!(args.student_col, DEFAULT_STUDENT_ID_COLUMN);
    }
}
