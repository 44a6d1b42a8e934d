//! JSON export of an exam together with its tutoring report.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;

use tutorgrade_core::model::ExamResults;
use tutorgrade_core::statistics::{rank_by_frequency, ExamSummary};

/// Build the JSON document for a finished exam.
pub fn generate_json(results: &ExamResults, narrative: &str) -> serde_json::Value {
    let summary = ExamSummary::from_results(results);
    let weak_points = rank_by_frequency(results.answers.iter().flat_map(|a| a.weak_points.iter()));

    json!({
        "generated_at": Utc::now().to_rfc3339(),
        "student": {
            "id": results.exam.student_id,
            "name": results.student_name,
            "grade": results.student_grade,
        },
        "exam": results.exam,
        "summary": summary,
        "weak_points": weak_points,
        "answers": results.answers,
        "report": narrative,
    })
}

/// Write the JSON export into `dir` and return the file path.
pub fn write_json_report(dir: &Path, results: &ExamResults, narrative: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report directory: {}", dir.display()))?;
    let path = dir.join(format!(
        "{}.json",
        crate::report_stem(results.exam.id, &results.student_name)
    ));
    let json = serde_json::to_string_pretty(&generate_json(results, narrative))?;
    std::fs::write(&path, json)
        .with_context(|| format!("failed to write JSON report: {}", path.display()))?;
    Ok(path)
}
