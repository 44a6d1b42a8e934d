//! The `tutorgrade question` commands.

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Table};
use tracing::warn;

use tutorgrade_core::authoring::generate_question;
use tutorgrade_core::bank::{parse_bank, validate_bank};
use tutorgrade_core::model::{Difficulty, NewQuestion};
use tutorgrade_core::report::{truncate_question, QUESTION_PREVIEW_CHARS};
use tutorgrade_core::traits::QuestionStore;
use tutorgrade_providers::config::load_config_from;

use super::open_store;

#[derive(Subcommand)]
pub enum QuestionCommand {
    /// Add a single question
    Add {
        #[arg(long)]
        subject: String,

        /// easy, medium, or hard
        #[arg(long, default_value = "medium")]
        difficulty: String,

        /// Question text
        #[arg(long)]
        text: String,

        /// Standard answer
        #[arg(long)]
        answer: String,

        /// Comma-separated knowledge points
        #[arg(long, value_delimiter = ',')]
        knowledge_points: Vec<String>,

        #[arg(long, default_value = "System")]
        created_by: String,
    },

    /// List stored questions
    List {
        #[arg(long)]
        subject: Option<String>,
    },

    /// Import a TOML question bank
    Import {
        #[arg(long)]
        file: PathBuf,
    },

    /// Check a TOML question bank without importing it
    Validate {
        #[arg(long)]
        file: PathBuf,
    },

    /// Ask the grading backend to write a new question
    Generate {
        #[arg(long)]
        subject: String,

        #[arg(long, default_value = "medium")]
        difficulty: String,

        /// Comma-separated knowledge points
        #[arg(long, value_delimiter = ',', required = true)]
        knowledge_points: Vec<String>,

        #[arg(long)]
        backend: Option<String>,

        /// Store the generated question
        #[arg(long)]
        save: bool,
    },
}

pub async fn execute(cmd: QuestionCommand, config_path: Option<PathBuf>) -> Result<()> {
    match cmd {
        QuestionCommand::Add {
            subject,
            difficulty,
            text,
            answer,
            knowledge_points,
            created_by,
        } => {
            let question = NewQuestion {
                subject,
                difficulty: parse_difficulty(&difficulty)?,
                text,
                standard_answer: answer,
                knowledge_points: clean_points(knowledge_points),
                created_by,
            };
            if let Some(field) = question.missing_field() {
                anyhow::bail!("{field} must not be empty");
            }

            let config = load_config_from(config_path.as_deref())?;
            let store = open_store(&config)?;
            let id = store.add_question(&question)?;
            println!("Added question {id}");
            Ok(())
        }
        QuestionCommand::List { subject } => {
            let config = load_config_from(config_path.as_deref())?;
            let store = open_store(&config)?;
            list(&store, subject.as_deref())
        }
        QuestionCommand::Import { file } => {
            let config = load_config_from(config_path.as_deref())?;
            let store = open_store(&config)?;
            import(&store, file)
        }
        QuestionCommand::Validate { file } => validate(file),
        QuestionCommand::Generate {
            subject,
            difficulty,
            knowledge_points,
            backend,
            save,
        } => {
            let config = load_config_from(config_path.as_deref())?;
            let difficulty = parse_difficulty(&difficulty)?;
            let knowledge_points = clean_points(knowledge_points);
            let client = config.client(backend.as_deref())?;

            println!("Generating a {difficulty} {subject} question with {}...", client.name());
            let generated = generate_question(
                client.as_ref(),
                &config.grading.call_policy(),
                &subject,
                difficulty,
                &knowledge_points,
            )
            .await?;

            println!("Question: {}", generated.question);
            if !generated.question_type.is_empty() {
                println!("Type: {}", generated.question_type);
            }
            println!("Standard answer: {}", generated.standard_answer);
            println!("Knowledge points: {}", generated.knowledge_points.join(", "));
            if !generated.explanation.is_empty() {
                println!("Explanation: {}", generated.explanation);
            }

            if save {
                let store = open_store(&config)?;
                let created_by = format!("generated by {}", client.name());
                let id = store.add_question(&generated.into_new_question(
                    &subject,
                    difficulty,
                    &created_by,
                ))?;
                println!("Saved as question {id}");
            }
            Ok(())
        }
    }
}

fn parse_difficulty(raw: &str) -> Result<Difficulty> {
    raw.parse().map_err(|e: String| anyhow::anyhow!(e))
}

fn clean_points(points: Vec<String>) -> Vec<String> {
    points
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn list(store: &dyn QuestionStore, subject: Option<&str>) -> Result<()> {
    let questions = store.list_questions(subject)?;
    if questions.is_empty() {
        println!("No questions stored. Run `tutorgrade seed` or `tutorgrade question import`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID",
        "Subject",
        "Difficulty",
        "Question",
        "Answer",
        "Knowledge points",
    ]);
    for q in &questions {
        table.add_row(vec![
            Cell::new(q.id),
            Cell::new(&q.subject),
            Cell::new(q.difficulty),
            Cell::new(truncate_question(&q.text, QUESTION_PREVIEW_CHARS)),
            Cell::new(truncate_question(&q.standard_answer, QUESTION_PREVIEW_CHARS)),
            Cell::new(q.knowledge_points.join(", ")),
        ]);
    }
    println!("{table}");
    println!("{} question(s)", questions.len());
    Ok(())
}

fn import(store: &dyn QuestionStore, file: PathBuf) -> Result<()> {
    let bank = parse_bank(&file)?;
    println!("Question bank: {} ({} questions)", bank.name, bank.questions.len());

    let mut imported = 0;
    for (i, question) in bank.questions.iter().enumerate() {
        if let Some(field) = question.missing_field() {
            println!("  [{}] skipped: {field} is empty", i + 1);
            continue;
        }
        match store.add_question(question) {
            Ok(_) => imported += 1,
            Err(e) => {
                warn!(position = i + 1, "failed to import question: {e}");
                println!("  [{}] skipped: {e}", i + 1);
            }
        }
    }

    println!("Imported {imported} of {} questions.", bank.questions.len());
    Ok(())
}

fn validate(file: PathBuf) -> Result<()> {
    let bank = parse_bank(&file)?;
    println!("Question bank: {} ({} questions)", bank.name, bank.questions.len());

    let warnings = validate_bank(&bank);
    for w in &warnings {
        let prefix = w
            .position
            .map(|p| format!("  [{p}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Question bank valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }
    Ok(())
}
