//! tutorgrade CLI — administrator and student entry points.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use tutorgrade_core::error::{ExamError, StoreError};
use tutorgrade_store::OpenError;

mod commands;

#[derive(Parser)]
#[command(
    name = "tutorgrade",
    version,
    about = "LLM-graded exams and personalized tutoring reports"
)]
struct Cli {
    /// Config file path (default: ./tutorgrade.toml, then ~/.config/tutorgrade/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and a sample question bank
    Init,

    /// Manage the question bank
    #[command(subcommand)]
    Question(commands::question::QuestionCommand),

    /// Load the built-in sample questions
    Seed {
        /// Also generate this many first-grade additions and as many subtractions
        #[arg(long)]
        arithmetic: Option<u32>,
    },

    /// Take an exam and receive a tutoring report
    Exam {
        /// Student name
        #[arg(long)]
        name: String,

        /// Subject to draw questions from
        #[arg(long)]
        subject: String,

        /// Grade label, e.g. "grade 1"
        #[arg(long)]
        grade: Option<String>,

        /// Answers separated by '|' instead of reading them from stdin
        #[arg(long, value_delimiter = '|')]
        answers: Option<Vec<String>>,

        /// Grading backend name from the config
        #[arg(long)]
        backend: Option<String>,

        /// Questions per exam (default from config)
        #[arg(long)]
        count: Option<u32>,

        /// Only serve questions of this difficulty
        #[arg(long)]
        difficulty: Option<String>,

        /// Save the report to the report directory
        #[arg(long)]
        save: bool,

        /// Saved report formats: text, json, all
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Regenerate the tutoring report of a finished exam
    Report {
        #[arg(long)]
        exam_id: i64,

        #[arg(long)]
        backend: Option<String>,

        #[arg(long)]
        save: bool,

        /// Saved report formats: text, json, all
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show a student's weak points, most frequent first
    WeakPoints {
        #[arg(long)]
        student_id: i64,

        #[arg(long)]
        subject: Option<String>,
    },

    /// List configured grading backends
    Backends,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tutorgrade=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Question(cmd) => commands::question::execute(cmd, config).await,
        Commands::Seed { arithmetic } => commands::seed::execute(arithmetic, config),
        Commands::Exam {
            name,
            subject,
            grade,
            answers,
            backend,
            count,
            difficulty,
            save,
            format,
        } => {
            commands::exam::execute(
                commands::exam::ExamArgs {
                    name,
                    subject,
                    grade,
                    answers,
                    backend,
                    count,
                    difficulty,
                    save,
                    format,
                },
                config,
            )
            .await
        }
        Commands::Report {
            exam_id,
            backend,
            save,
            format,
        } => commands::report::execute(exam_id, backend, save, format, config).await,
        Commands::WeakPoints {
            student_id,
            subject,
        } => commands::weak_points::execute(student_id, subject, config),
        Commands::Backends => commands::backends::execute(config),
    };

    if let Err(e) = result {
        if is_store_failure(&e) {
            tracing::error!("store failure: {e:#}");
        }
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

/// Whether an error chain originates in the question store.
fn is_store_failure(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        cause.is::<StoreError>()
            || cause.is::<OpenError>()
            || matches!(cause.downcast_ref::<ExamError>(), Some(ExamError::Store(_)))
    })
}
