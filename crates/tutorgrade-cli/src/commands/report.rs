//! The `tutorgrade report` command.

use std::path::PathBuf;

use anyhow::Result;

use tutorgrade_core::report::ReportSynthesizer;
use tutorgrade_core::statistics::ExamSummary;
use tutorgrade_core::traits::QuestionStore;
use tutorgrade_providers::config::load_config_from;

use super::{open_store, save_report};

pub async fn execute(
    exam_id: i64,
    backend: Option<String>,
    save: bool,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = open_store(&config)?;

    let results = store
        .exam_results(exam_id)?
        .ok_or_else(|| anyhow::anyhow!("exam {exam_id} not found"))?;
    let summary = ExamSummary::from_results(&results);

    println!(
        "Exam {exam_id}: {} ({}), {} answer(s), score {}/{} [{}]",
        results.student_name,
        results.exam.subject,
        summary.answered,
        summary.total_score,
        summary.max_score,
        results.exam.status,
    );

    let client = config.client(backend.as_deref())?;
    let synthesizer = ReportSynthesizer::new(client.as_ref(), config.grading.call_policy());
    let report = synthesizer
        .build_report(&results.student_name, &results)
        .await;
    println!("\n{report}");

    if save {
        save_report(&config.report_dir, &results, &report, &format)?;
    }

    Ok(())
}
