//! The `tutorgrade exam` command.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use tutorgrade_core::engine::{
    AnswerSource, ExamOrchestrator, ExamOutcome, ExamReporter, ScriptedAnswers,
};
use tutorgrade_core::grading::GradeOutcome;
use tutorgrade_core::model::{Difficulty, Question};
use tutorgrade_core::traits::{GradingClient, QuestionStore};
use tutorgrade_providers::config::load_config_from;

use super::{open_store, save_report};

pub struct ExamArgs {
    pub name: String,
    pub subject: String,
    pub grade: Option<String>,
    pub answers: Option<Vec<String>>,
    pub backend: Option<String>,
    pub count: Option<u32>,
    pub difficulty: Option<String>,
    pub save: bool,
    pub format: String,
}

/// Reads one line per question from stdin.
struct ConsoleAnswers;

impl AnswerSource for ConsoleAnswers {
    fn answer(&mut self, _number: usize, _question: &Question) -> String {
        print!("Your answer: ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(_) => line,
            // An unreadable stdin counts as no answer.
            Err(_) => String::new(),
        }
    }
}

/// Prints each question and its immediate feedback.
struct ConsoleReporter;

impl ExamReporter for ConsoleReporter {
    fn on_exam_start(&self, student_name: &str, subject: &str, available: usize, requested: u32) {
        println!("Exam for {student_name}: {subject}, {available} question(s)");
        if available < requested as usize {
            println!("(only {available} of {requested} questions available)");
        }
    }

    fn on_question(&self, number: usize, question: &Question) {
        println!("\nQuestion {number}: {}", question.text);
    }

    fn on_graded(&self, _number: usize, outcome: &GradeOutcome) {
        let result = &outcome.result;
        println!("Score: {}/10", result.score);
        println!("Analysis: {}", result.analysis);
        if !result.suggestions.is_empty() {
            println!("Suggestions: {}", result.suggestions);
        }
        if !result.weak_points.is_empty() {
            println!("Weak points: {}", result.weak_points.join(", "));
        }
        println!("Reference answer: {}", result.correct_answer);
    }

    fn on_exam_complete(&self, outcome: &ExamOutcome) {
        println!(
            "\nExam {} finished. Total score: {}/{}",
            outcome.exam_id, outcome.total_score, outcome.max_score
        );
    }
}

pub async fn execute(args: ExamArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = open_store(&config)?;
    let client: Arc<dyn GradingClient> = Arc::from(config.client(args.backend.as_deref())?);

    let mut exam_config = config.exam_config();
    if let Some(count) = args.count {
        anyhow::ensure!(count > 0, "--count must be at least 1");
        exam_config.question_count = count;
    }
    if let Some(raw) = &args.difficulty {
        exam_config.difficulty = Some(raw.parse::<Difficulty>().map_err(|e| anyhow::anyhow!(e))?);
    }

    let mut answers: Box<dyn AnswerSource> = match args.answers {
        Some(list) => Box::new(ScriptedAnswers::new(list)),
        None => Box::new(ConsoleAnswers),
    };

    let orchestrator = ExamOrchestrator::new(client, exam_config);
    let outcome = orchestrator
        .run_exam(
            &store,
            answers.as_mut(),
            &ConsoleReporter,
            &args.name,
            &args.subject,
            args.grade.as_deref(),
        )
        .await?;

    println!("\nGenerating tutoring report...\n");
    let report = orchestrator.final_report(&store, outcome.exam_id).await?;
    println!("{report}");

    if args.save {
        let results = store
            .exam_results(outcome.exam_id)?
            .with_context(|| format!("exam {} disappeared", outcome.exam_id))?;
        save_report(&config.report_dir, &results, &report, &args.format)?;
    }

    Ok(())
}
