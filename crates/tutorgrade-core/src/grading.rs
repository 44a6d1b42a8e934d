//! Answer scoring through a grading backend.
//!
//! `grade_answer` never fails: transport errors, timeouts, and unparseable
//! replies all turn into the fixed fallback result.

use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::model::{GradingResult, MAX_QUESTION_SCORE};
use crate::parser::{parse_json_response, JsonObject};
use crate::traits::GradingClient;

/// System instruction for the grading call.
pub const GRADER_SYSTEM_PROMPT: &str = r#"You are an experienced expert grader. Score the student's answer and explain your judgement.
Grading rules:
1. The full score is 10 points; scores range from 0 to 10.
2. Judge accuracy, completeness, and reasoning.
3. State concretely why points were deducted.
4. Identify the knowledge points the student has not mastered (weak points).
5. Give suggestions for improvement.

Respond strictly with JSON in this format:
{
    "score": <number from 0 to 10>,
    "analysis": "detailed analysis of the answer",
    "weak_points": ["weak knowledge point 1", "weak knowledge point 2"],
    "suggestions": "how to improve",
    "correct_answer": "key points of the correct answer"
}"#;

/// Analysis recorded when no usable grading result could be obtained.
pub const FALLBACK_ANALYSIS: &str = "grading system error";

/// Suggestion recorded alongside the fallback analysis.
pub const FALLBACK_SUGGESTIONS: &str = "resubmit";

/// Analysis used when a parsed reply has no `analysis` field.
pub const MISSING_ANALYSIS: &str = "no analysis";

/// Timeout and retry behaviour for one backend call.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    /// Upper bound on a single call.
    pub timeout: Duration,
    /// Retry once after a transient failure.
    pub retry_once: bool,
    /// Pause before the retry.
    pub retry_delay: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retry_once: true,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Inputs of one grading call, embedded verbatim in the prompt.
#[derive(Debug, Clone, Copy)]
pub struct GradeRequest<'a> {
    pub question: &'a str,
    pub standard_answer: &'a str,
    pub student_answer: &'a str,
    pub knowledge_points: &'a [String],
}

/// A grading result and, when the fallback was used, the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeOutcome {
    pub result: GradingResult,
    pub fallback_reason: Option<String>,
}

impl GradeOutcome {
    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Build the user turn of a grading call.
pub fn build_grading_prompt(request: &GradeRequest<'_>) -> String {
    format!(
        "Question: {}\nStandard answer: {}\nStudent answer: {}\nKnowledge points: {}\n\nPlease score and analyze the student's answer.",
        request.question,
        request.standard_answer,
        request.student_answer,
        request.knowledge_points.join(", "),
    )
}

/// The fixed result substituted whenever grading cannot produce one.
pub fn fallback_result(standard_answer: &str) -> GradingResult {
    GradingResult {
        score: 0.0,
        analysis: FALLBACK_ANALYSIS.to_string(),
        weak_points: Vec::new(),
        suggestions: FALLBACK_SUGGESTIONS.to_string(),
        correct_answer: standard_answer.to_string(),
    }
}

/// Read a grading result out of a parsed reply, defaulting absent fields.
pub fn grading_result_from_json(obj: &JsonObject, standard_answer: &str) -> GradingResult {
    GradingResult {
        score: obj.get("score").map(normalize_score).unwrap_or(0.0),
        analysis: obj
            .get("analysis")
            .and_then(value_as_text)
            .unwrap_or_else(|| MISSING_ANALYSIS.to_string()),
        weak_points: obj.get("weak_points").map(string_list).unwrap_or_default(),
        suggestions: obj
            .get("suggestions")
            .and_then(value_as_text)
            .unwrap_or_default(),
        correct_answer: obj
            .get("correct_answer")
            .and_then(value_as_text)
            .unwrap_or_else(|| standard_answer.to_string()),
    }
}

/// Score a student's answer. Never returns an error.
pub async fn grade_answer(
    client: &dyn GradingClient,
    policy: &CallPolicy,
    request: &GradeRequest<'_>,
) -> GradeOutcome {
    let prompt = build_grading_prompt(request);

    let reply = match chat_with_policy(client, policy, GRADER_SYSTEM_PROMPT, &prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(backend = client.name(), "grading call failed: {e:#}");
            return GradeOutcome {
                result: fallback_result(request.standard_answer),
                fallback_reason: Some(format!("{e:#}")),
            };
        }
    };

    match parse_json_response(&reply) {
        Ok(obj) => GradeOutcome {
            result: grading_result_from_json(&obj, request.standard_answer),
            fallback_reason: None,
        },
        Err(e) => {
            warn!(backend = client.name(), "unparseable grading reply: {e}");
            debug!(reply = %reply, "raw grading reply");
            GradeOutcome {
                result: fallback_result(request.standard_answer),
                fallback_reason: Some(e.to_string()),
            }
        }
    }
}

/// Send one chat call under a timeout, retrying once on transient failures.
pub async fn chat_with_policy(
    client: &dyn GradingClient,
    policy: &CallPolicy,
    system: &str,
    user: &str,
) -> Result<String> {
    let attempts = if policy.retry_once { 2 } else { 1 };
    let mut retry_delay = policy.retry_delay;
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            tokio::time::sleep(retry_delay).await;
        }

        let error = match tokio::time::timeout(policy.timeout, client.chat(system, user)).await {
            Ok(Ok(reply)) => return Ok(reply),
            Ok(Err(e)) => e,
            Err(_) => ProviderError::Timeout(policy.timeout.as_secs()).into(),
        };

        if let Some(provider_error) = error.downcast_ref::<ProviderError>() {
            if provider_error.is_permanent() {
                return Err(error);
            }
            // A server-requested pause never exceeds the per-call timeout.
            if let Some(ms) = provider_error.retry_after_ms() {
                retry_delay = Duration::from_millis(ms).min(policy.timeout);
            }
        }
        debug!(attempt, "backend call failed: {error:#}");
        last_error = Some(error);
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("no backend call was attempted")))
}

/// Clamp a reported score into the 0..=10 range; non-numbers count as 0.
fn normalize_score(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, MAX_QUESTION_SCORE)
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(value_as_text)
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}
