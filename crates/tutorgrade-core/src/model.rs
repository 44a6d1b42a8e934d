//! Core data model types for tutorgrade.
//!
//! Questions and students are referenced by exams and answers; an exam owns
//! its answers. Identifiers are the store's integer row ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type QuestionId = i64;
pub type StudentId = i64;
pub type ExamId = i64;
pub type AnswerId = i64;

/// Highest score a single answer can receive.
pub const MAX_QUESTION_SCORE: f64 = 10.0;

/// Number of questions served per exam unless configured otherwise.
pub const DEFAULT_QUESTION_COUNT: u32 = 5;

/// Ordered difficulty label of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" | "简单" => Ok(Difficulty::Easy),
            "medium" | "中等" => Ok(Difficulty::Medium),
            "hard" | "困难" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// A stored question with its standard answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    /// Category label, e.g. "math".
    pub subject: String,
    pub difficulty: Difficulty,
    /// The prompt shown to the student.
    pub text: String,
    pub standard_answer: String,
    /// Topical tags describing what the question tests, in authoring order.
    #[serde(default)]
    pub knowledge_points: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to add a question to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub subject: String,
    pub difficulty: Difficulty,
    pub text: String,
    pub standard_answer: String,
    #[serde(default)]
    pub knowledge_points: Vec<String>,
    pub created_by: String,
}

impl NewQuestion {
    /// Returns the name of the first required field that is blank, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.subject.trim().is_empty() {
            Some("subject")
        } else if self.text.trim().is_empty() {
            Some("question")
        } else if self.standard_answer.trim().is_empty() {
            Some("standard_answer")
        } else if self.created_by.trim().is_empty() {
            Some("created_by")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    #[serde(default)]
    pub grade: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state of an exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamStatus {
    InProgress,
    Completed,
}

impl ExamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamStatus::InProgress => "in_progress",
            ExamStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ExamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(ExamStatus::InProgress),
            "completed" => Ok(ExamStatus::Completed),
            other => Err(format!("unknown exam status: {other}")),
        }
    }
}

/// One attempt by one student at one subject.
///
/// `end_time` is set exactly when `status` is `Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: ExamId,
    pub student_id: StudentId,
    pub subject: String,
    pub question_count: u32,
    pub total_score: f64,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub status: ExamStatus,
}

/// A graded answer joined with the question it grades.
///
/// Answers are created once per question per exam and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerDetail {
    pub answer_id: AnswerId,
    pub question_id: QuestionId,
    pub question: String,
    pub standard_answer: String,
    pub student_answer: String,
    pub score: f64,
    pub analysis: String,
    #[serde(default)]
    pub weak_points: Vec<String>,
    pub answered_at: DateTime<Utc>,
}

/// A full exam with its student's name and its answers in answering order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResults {
    pub exam: Exam,
    pub student_name: String,
    #[serde(default)]
    pub student_grade: Option<String>,
    pub answers: Vec<AnswerDetail>,
}

impl ExamResults {
    /// Highest total reachable under the exam's question-count policy.
    pub fn max_score(&self) -> f64 {
        f64::from(self.exam.question_count) * MAX_QUESTION_SCORE
    }
}

/// Structured result of grading one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    pub score: f64,
    pub analysis: String,
    #[serde(default)]
    pub weak_points: Vec<String>,
    #[serde(default)]
    pub suggestions: String,
    #[serde(default)]
    pub correct_answer: String,
}
