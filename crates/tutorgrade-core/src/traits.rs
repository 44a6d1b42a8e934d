//! Collaborator traits for grading backends and the question store.
//!
//! `GradingClient` is implemented by the `tutorgrade-providers` crate and
//! `QuestionStore` by `tutorgrade-store`.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{
    AnswerId, Difficulty, Exam, ExamId, ExamResults, NewQuestion, Question, QuestionId, Student,
    StudentId,
};

// ---------------------------------------------------------------------------
// Grading client trait
// ---------------------------------------------------------------------------

/// A hosted language model that turns an instruction plus a user turn into text.
#[async_trait]
pub trait GradingClient: Send + Sync {
    /// Backend name (e.g. "qwen").
    fn name(&self) -> &str;

    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Send one system instruction and one user turn, returning the reply text.
    ///
    /// Failures are `ProviderError`s wrapped in `anyhow::Error`.
    async fn chat(&self, system: &str, user: &str) -> anyhow::Result<String>;
}

// ---------------------------------------------------------------------------
// Question store trait
// ---------------------------------------------------------------------------

pub type StoreResult<T> = Result<T, StoreError>;

/// Fields of an answer record about to be persisted.
#[derive(Debug, Clone, Copy)]
pub struct NewAnswer<'a> {
    pub exam_id: ExamId,
    pub question_id: QuestionId,
    pub student_answer: &'a str,
    pub score: f64,
    pub analysis: &'a str,
    pub weak_points: &'a [String],
}

/// Persistence for questions, students, exams, and answers.
///
/// Each operation is atomic on its own; there are no multi-call transactions.
pub trait QuestionStore {
    fn add_question(&self, question: &NewQuestion) -> StoreResult<QuestionId>;

    /// Random selection without replacement, at most `limit` questions.
    fn questions_by_subject(
        &self,
        subject: &str,
        difficulty: Option<Difficulty>,
        limit: u32,
    ) -> StoreResult<Vec<Question>>;

    /// All questions ordered by id, optionally restricted to one subject.
    fn list_questions(&self, subject: Option<&str>) -> StoreResult<Vec<Question>>;

    fn get_question(&self, id: QuestionId) -> StoreResult<Option<Question>>;

    fn create_student(&self, name: &str, grade: Option<&str>) -> StoreResult<StudentId>;

    fn get_student(&self, id: StudentId) -> StoreResult<Option<Student>>;

    fn delete_student(&self, id: StudentId) -> StoreResult<()>;

    /// Open a new exam in progress with a zero score.
    fn create_exam(
        &self,
        student_id: StudentId,
        subject: &str,
        question_count: u32,
    ) -> StoreResult<ExamId>;

    fn get_exam(&self, id: ExamId) -> StoreResult<Option<Exam>>;

    /// Remove an exam together with its answers.
    fn delete_exam(&self, id: ExamId) -> StoreResult<()>;

    fn save_answer(&self, answer: &NewAnswer<'_>) -> StoreResult<AnswerId>;

    /// Record the final score, stamp the end time, and mark the exam completed.
    fn complete_exam(&self, id: ExamId, total_score: f64) -> StoreResult<()>;

    /// The exam, its student's name, and its answers joined with question text.
    fn exam_results(&self, id: ExamId) -> StoreResult<Option<ExamResults>>;

    /// Weak-point tags across a student's answers, most frequent first.
    fn student_weak_points(
        &self,
        student_id: StudentId,
        subject: Option<&str>,
    ) -> StoreResult<Vec<String>>;
}
