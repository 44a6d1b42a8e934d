//! Plain-text report file: a short header, a separator line, the narrative.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use tutorgrade_core::model::ExamResults;

const SEPARATOR_WIDTH: usize = 60;

/// Render the report file body.
pub fn render_text_report(results: &ExamResults, narrative: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("Student: {}\n", results.student_name));
    if let Some(grade) = &results.student_grade {
        out.push_str(&format!("Grade: {grade}\n"));
    }
    out.push_str(&format!("Subject: {}\n", results.exam.subject));
    out.push_str(&format!(
        "Total score: {}/{}\n",
        results.exam.total_score,
        results.max_score()
    ));
    out.push_str(&format!("Exam ID: {}\n", results.exam.id));
    out.push_str(&"=".repeat(SEPARATOR_WIDTH));
    out.push('\n');
    out.push_str(narrative);
    if !narrative.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Write the text report into `dir` and return the file path.
pub fn write_text_report(dir: &Path, results: &ExamResults, narrative: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report directory: {}", dir.display()))?;
    let path = dir.join(format!(
        "{}.txt",
        crate::report_stem(results.exam.id, &results.student_name)
    ));
    std::fs::write(&path, render_text_report(results, narrative))
        .with_context(|| format!("failed to write report: {}", path.display()))?;
    Ok(path)
}
