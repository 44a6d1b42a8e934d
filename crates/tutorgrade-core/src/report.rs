//! Personalized tutoring report synthesis.
//!
//! Aggregates weak points across an exam's answers, builds a second prompt,
//! and returns the backend's narrative unmodified. Failures produce a fixed
//! notice instead of an error.

use serde::Serialize;
use tracing::{info, warn};

use crate::grading::{chat_with_policy, CallPolicy};
use crate::model::ExamResults;
use crate::statistics::top_k;
use crate::traits::GradingClient;

/// System instruction for the report call.
pub const TUTOR_SYSTEM_PROMPT: &str = r#"You are a personalized tutor. Based on how the student answered, give professional study advice.
Focus on:
1. The student's learning patterns and characteristics
2. Knowledge gaps and weak areas
3. Targeted study methods and resources
4. A personalized study plan
5. Encouraging advice

Write a detailed tutoring report containing:
- Current learning status
- Summary of weak areas
- Personalized study suggestions
- Recommended study resources
- Follow-up study plan"#;

/// Question text longer than this many characters is abbreviated in prompts.
pub const QUESTION_PREVIEW_CHARS: usize = 50;

/// How many weak points the prompt lists.
pub const TOP_WEAK_POINTS: usize = 5;

/// One answered question as it appears in the report prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisEntry {
    pub question: String,
    pub score: f64,
    pub analysis: String,
}

/// Abbreviate a question to its first `max_chars` characters plus "...".
pub fn truncate_question(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// The most frequent weak points across all answers of an exam.
pub fn top_weak_points(results: &ExamResults, k: usize) -> Vec<String> {
    top_k(
        results
            .answers
            .iter()
            .flat_map(|a| a.weak_points.iter()),
        k,
    )
}

/// Build the user turn of the report call.
pub fn build_report_prompt(student_name: &str, results: &ExamResults) -> String {
    let entries: Vec<AnalysisEntry> = results
        .answers
        .iter()
        .map(|a| AnalysisEntry {
            question: truncate_question(&a.question, QUESTION_PREVIEW_CHARS),
            score: a.score,
            analysis: a.analysis.clone(),
        })
        .collect();
    let details = serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string());
    let weak_points = top_weak_points(results, TOP_WEAK_POINTS);

    format!(
        "Student name: {student_name}\nSubject: {}\nTotal score: {}/{}\nAnswer details: {details}\nMain weak knowledge points: {}\n\nPlease write a detailed personalized tutoring report for this student.",
        results.exam.subject,
        results.exam.total_score,
        results.max_score(),
        weak_points.join(", "),
    )
}

/// The notice returned when the report call fails.
pub fn fallback_report(student_name: &str) -> String {
    format!(
        "An error occurred while generating the tutoring report for {student_name}. Please try again later."
    )
}

/// Builds tutoring reports with an explicitly chosen backend.
pub struct ReportSynthesizer<'a> {
    client: &'a dyn GradingClient,
    policy: CallPolicy,
}

impl<'a> ReportSynthesizer<'a> {
    pub fn new(client: &'a dyn GradingClient, policy: CallPolicy) -> Self {
        Self { client, policy }
    }

    /// Produce the narrative report. Never returns an error.
    pub async fn build_report(&self, student_name: &str, results: &ExamResults) -> String {
        let prompt = build_report_prompt(student_name, results);
        info!(
            exam_id = results.exam.id,
            backend = self.client.name(),
            "generating tutoring report"
        );

        match chat_with_policy(self.client, &self.policy, TUTOR_SYSTEM_PROMPT, &prompt).await {
            Ok(report) => report,
            Err(e) => {
                warn!(exam_id = results.exam.id, "report generation failed: {e:#}");
                fallback_report(student_name)
            }
        }
    }
}
