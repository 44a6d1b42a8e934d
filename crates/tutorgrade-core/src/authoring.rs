//! LLM-assisted question authoring.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::grading::{chat_with_policy, CallPolicy};
use crate::model::{Difficulty, NewQuestion};
use crate::parser::{parse_json_response, ResponseParseError};
use crate::traits::GradingClient;

/// System instruction for question generation.
pub const QUESTION_GENERATOR_PROMPT: &str = r#"You are a professional teacher who writes high-quality exam questions for a given set of knowledge points and difficulty.
Requirements:
1. The question must accurately test how well the student has mastered the knowledge points.
2. The wording is clear and unambiguous.
3. The difficulty matches the requested level.
4. The question may be multiple choice, fill in the blank, short answer, or calculation.
5. Every question has a definite standard answer.

Respond strictly with JSON in this format:
{
    "question": "question text",
    "question_type": "question type",
    "difficulty": "difficulty level",
    "knowledge_points": ["knowledge point 1", "knowledge point 2"],
    "standard_answer": "standard answer",
    "explanation": "explanation of the answer"
}"#;

/// A question proposed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    #[serde(default)]
    pub question_type: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub knowledge_points: Vec<String>,
    pub standard_answer: String,
    #[serde(default)]
    pub explanation: String,
}

impl GeneratedQuestion {
    /// Turn the proposal into a storable question under the requested subject.
    ///
    /// The requested difficulty wins over whatever label the backend echoed.
    pub fn into_new_question(
        self,
        subject: &str,
        difficulty: Difficulty,
        created_by: &str,
    ) -> NewQuestion {
        NewQuestion {
            subject: subject.to_string(),
            difficulty,
            text: self.question,
            standard_answer: self.standard_answer,
            knowledge_points: self.knowledge_points,
            created_by: created_by.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("question generation call failed: {0:#}")]
    Backend(anyhow::Error),

    #[error(transparent)]
    Unparseable(#[from] ResponseParseError),

    #[error("generated question is missing fields: {0}")]
    Incomplete(String),
}

/// Build the user turn of a generation call.
pub fn build_generation_prompt(
    subject: &str,
    difficulty: Difficulty,
    knowledge_points: &[String],
) -> String {
    format!(
        "Subject: {subject}\nDifficulty: {difficulty}\nKnowledge points: {}\n\nPlease write one high-quality exam question based on the information above.",
        knowledge_points.join(", ")
    )
}

/// Ask the backend for a new question.
pub async fn generate_question(
    client: &dyn GradingClient,
    policy: &CallPolicy,
    subject: &str,
    difficulty: Difficulty,
    knowledge_points: &[String],
) -> Result<GeneratedQuestion, GenerationError> {
    let prompt = build_generation_prompt(subject, difficulty, knowledge_points);
    let reply = chat_with_policy(client, policy, QUESTION_GENERATOR_PROMPT, &prompt)
        .await
        .map_err(GenerationError::Backend)?;

    let obj = parse_json_response(&reply).inspect_err(|e| {
        warn!("unparseable question generation reply: {e}");
    })?;

    let mut generated: GeneratedQuestion = serde_json::from_value(obj.into())
        .map_err(|e| GenerationError::Incomplete(e.to_string()))?;

    if generated.question.trim().is_empty() || generated.standard_answer.trim().is_empty() {
        return Err(GenerationError::Incomplete(
            "question or standard_answer is empty".into(),
        ));
    }
    if generated.knowledge_points.is_empty() {
        generated.knowledge_points = knowledge_points.to_vec();
    }

    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedClient(&'static str);

    #[async_trait]
    impl GradingClient for FixedClient {
        fn name(&self) -> &str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed"
        }

        async fn chat(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn policy() -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(5),
            retry_once: false,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn prompt_lists_inputs() {
        let prompt = build_generation_prompt(
            "math",
            Difficulty::Hard,
            &["quadratic functions".into(), "extrema".into()],
        );
        assert!(prompt.contains("Subject: math"));
        assert!(prompt.contains("Difficulty: hard"));
        assert!(prompt.contains("quadratic functions, extrema"));
    }

    #[tokio::test]
    async fn generates_question_from_fenced_json() {
        let client = FixedClient(
            "```json\n{\"question\": \"Find the minimum of f(x) = x^2 - 4x + 3\", \"question_type\": \"calculation\", \"difficulty\": \"hard\", \"knowledge_points\": [\"quadratic functions\"], \"standard_answer\": \"-1 at x = 2\", \"explanation\": \"complete the square\"}\n```",
        );
        let q = generate_question(&client, &policy(), "math", Difficulty::Hard, &[])
            .await
            .unwrap();
        assert_eq!(q.standard_answer, "-1 at x = 2");
        assert_eq!(q.knowledge_points, vec!["quadratic functions"]);

        let new = q.into_new_question("math", Difficulty::Hard, "generator");
        assert_eq!(new.subject, "math");
        assert_eq!(new.missing_field(), None);
    }

    #[tokio::test]
    async fn missing_knowledge_points_use_request() {
        let client = FixedClient(r#"{"question": "2 + 2 = ?", "standard_answer": "4"}"#);
        let kps = vec!["addition".to_string()];
        let q = generate_question(&client, &policy(), "math", Difficulty::Easy, &kps)
            .await
            .unwrap();
        assert_eq!(q.knowledge_points, kps);
    }

    #[tokio::test]
    async fn prose_reply_is_rejected() {
        let client = FixedClient("Sure! What is 2 + 2?");
        let err = generate_question(&client, &policy(), "math", Difficulty::Easy, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Unparseable(_)));
    }

    #[tokio::test]
    async fn empty_answer_is_incomplete() {
        let client = FixedClient(r#"{"question": "2 + 2 = ?", "standard_answer": " "}"#);
        let err = generate_question(&client, &policy(), "math", Difficulty::Easy, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Incomplete(_)));
    }
}
