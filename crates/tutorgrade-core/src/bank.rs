//! TOML question bank loader.
//!
//! Loads question banks for batch import and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Difficulty, NewQuestion};

/// Intermediate TOML structure for question bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    #[serde(default)]
    bank: TomlBankHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlBankHeader {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    default_subject: Option<String>,
    #[serde(default)]
    default_created_by: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default = "default_difficulty")]
    difficulty: String,
    question: String,
    standard_answer: String,
    #[serde(default)]
    knowledge_points: Vec<String>,
    #[serde(default)]
    created_by: Option<String>,
}

fn default_difficulty() -> String {
    "medium".to_string()
}

fn default_created_by() -> String {
    "System".to_string()
}

/// A parsed question bank.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    pub name: String,
    pub questions: Vec<NewQuestion>,
}

/// Parse a question bank file.
pub fn parse_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question bank: {}", path.display()))?;

    parse_bank_str(&content, path)
}

/// Parse a TOML string into a `QuestionBank` (useful for testing).
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<QuestionBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let name = parsed.bank.name.unwrap_or_else(|| {
        source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "questions".to_string())
    });

    let questions = parsed
        .questions
        .into_iter()
        .enumerate()
        .map(|(i, q)| {
            let difficulty: Difficulty = q
                .difficulty
                .parse()
                .map_err(|e: String| anyhow::anyhow!("question {}: {}", i + 1, e))?;
            let subject = q
                .subject
                .or_else(|| parsed.bank.default_subject.clone())
                .ok_or_else(|| anyhow::anyhow!("question {}: no subject", i + 1))?;
            let created_by = q
                .created_by
                .or_else(|| parsed.bank.default_created_by.clone())
                .unwrap_or_else(default_created_by);

            Ok(NewQuestion {
                subject,
                difficulty,
                text: q.question,
                standard_answer: q.standard_answer,
                knowledge_points: q
                    .knowledge_points
                    .into_iter()
                    .map(|kp| kp.trim().to_string())
                    .filter(|kp| !kp.is_empty())
                    .collect(),
                created_by,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuestionBank { name, questions })
}

/// A warning from question bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// 1-based position of the question in the file.
    pub position: Option<usize>,
    pub message: String,
}

/// Validate a question bank for common issues.
pub fn validate_bank(bank: &QuestionBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if bank.questions.is_empty() {
        warnings.push(ValidationWarning {
            position: None,
            message: "bank contains no questions".into(),
        });
    }

    for (i, q) in bank.questions.iter().enumerate() {
        if let Some(field) = q.missing_field() {
            warnings.push(ValidationWarning {
                position: Some(i + 1),
                message: format!("{field} is empty"),
            });
        }
    }

    // Duplicate question text within one subject
    let mut seen = HashSet::new();
    for (i, q) in bank.questions.iter().enumerate() {
        if !seen.insert((q.subject.as_str(), q.text.trim())) {
            warnings.push(ValidationWarning {
                position: Some(i + 1),
                message: format!("duplicate question in {}: {}", q.subject, q.text.trim()),
            });
        }
    }

    for (i, q) in bank.questions.iter().enumerate() {
        if q.knowledge_points.is_empty() {
            warnings.push(ValidationWarning {
                position: Some(i + 1),
                message: "no knowledge points; weak-point analysis will be vague".into(),
            });
        }
    }

    warnings
}
