//! Exam orchestrator.
//!
//! Drives one exam from start to completion: registers the student, opens the
//! exam, serves questions one at a time, grades each answer, persists it, and
//! marks the exam completed with the accumulated score.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::error::ExamError;
use crate::grading::{grade_answer, CallPolicy, GradeOutcome, GradeRequest};
use crate::model::{
    Difficulty, ExamId, Question, StudentId, DEFAULT_QUESTION_COUNT, MAX_QUESTION_SCORE,
};
use crate::report::ReportSynthesizer;
use crate::traits::{GradingClient, NewAnswer, QuestionStore};

/// Recorded when the student submits nothing.
pub const NO_ANSWER: &str = "(no answer)";

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct ExamConfig {
    /// Questions requested per exam.
    pub question_count: u32,
    /// Restrict the exam to one difficulty.
    pub difficulty: Option<Difficulty>,
    /// Timeout and retry behaviour for backend calls.
    pub call_policy: CallPolicy,
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            question_count: DEFAULT_QUESTION_COUNT,
            difficulty: None,
            call_policy: CallPolicy::default(),
        }
    }
}

/// Supplies the student's raw answer for each question.
pub trait AnswerSource {
    /// `number` is 1-based.
    fn answer(&mut self, number: usize, question: &Question) -> String;
}

/// Answers taken from a fixed list; missing entries are blank.
pub struct ScriptedAnswers {
    answers: Vec<String>,
}

impl ScriptedAnswers {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }
}

impl AnswerSource for ScriptedAnswers {
    fn answer(&mut self, number: usize, _question: &Question) -> String {
        self.answers
            .get(number.saturating_sub(1))
            .cloned()
            .unwrap_or_default()
    }
}

/// Progress reporting trait.
pub trait ExamReporter {
    fn on_exam_start(&self, student_name: &str, subject: &str, available: usize, requested: u32);
    fn on_question(&self, number: usize, question: &Question);
    fn on_graded(&self, number: usize, outcome: &GradeOutcome);
    fn on_exam_complete(&self, outcome: &ExamOutcome);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ExamReporter for NoopReporter {
    fn on_exam_start(&self, _: &str, _: &str, _: usize, _: u32) {}
    fn on_question(&self, _: usize, _: &Question) {}
    fn on_graded(&self, _: usize, _: &GradeOutcome) {}
    fn on_exam_complete(&self, _: &ExamOutcome) {}
}

/// Result of a completed exam.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamOutcome {
    pub exam_id: ExamId,
    pub student_id: StudentId,
    pub total_score: f64,
    /// Number of answers recorded.
    pub answered: usize,
    /// Highest total reachable under the question-count policy.
    pub max_score: f64,
}

/// Runs exams against a store with an explicitly chosen grading backend.
pub struct ExamOrchestrator {
    client: Arc<dyn GradingClient>,
    config: ExamConfig,
}

impl ExamOrchestrator {
    pub fn new(client: Arc<dyn GradingClient>, config: ExamConfig) -> Self {
        Self { client, config }
    }

    /// Run one exam to completion.
    ///
    /// With zero questions available the freshly created exam and student
    /// rows are deleted and `ExamError::NoQuestions` is returned. With fewer
    /// questions than requested the exam proceeds with what exists.
    #[instrument(skip(self, store, answers, reporter), fields(backend = self.client.name()))]
    pub async fn run_exam(
        &self,
        store: &dyn QuestionStore,
        answers: &mut dyn AnswerSource,
        reporter: &dyn ExamReporter,
        student_name: &str,
        subject: &str,
        grade: Option<&str>,
    ) -> Result<ExamOutcome, ExamError> {
        let student_id = store.create_student(student_name, grade)?;
        let exam_id = store.create_exam(student_id, subject, self.config.question_count)?;

        let questions =
            store.questions_by_subject(subject, self.config.difficulty, self.config.question_count)?;

        if questions.is_empty() {
            warn!(exam_id, subject, "no questions available, discarding exam");
            store.delete_exam(exam_id)?;
            store.delete_student(student_id)?;
            return Err(ExamError::NoQuestions {
                subject: subject.to_string(),
            });
        }
        if questions.len() < self.config.question_count as usize {
            warn!(
                exam_id,
                available = questions.len(),
                requested = self.config.question_count,
                "not enough questions, running a shorter exam"
            );
        }

        reporter.on_exam_start(
            student_name,
            subject,
            questions.len(),
            self.config.question_count,
        );

        let mut total_score = 0.0;
        for (i, question) in questions.iter().enumerate() {
            let number = i + 1;
            reporter.on_question(number, question);

            let raw = answers.answer(number, question);
            let student_answer = match raw.trim() {
                "" => NO_ANSWER.to_string(),
                trimmed => trimmed.to_string(),
            };

            let outcome = grade_answer(
                self.client.as_ref(),
                &self.config.call_policy,
                &GradeRequest {
                    question: &question.text,
                    standard_answer: &question.standard_answer,
                    student_answer: &student_answer,
                    knowledge_points: &question.knowledge_points,
                },
            )
            .await;

            store.save_answer(&NewAnswer {
                exam_id,
                question_id: question.id,
                student_answer: &student_answer,
                score: outcome.result.score,
                analysis: &outcome.result.analysis,
                weak_points: &outcome.result.weak_points,
            })?;
            total_score += outcome.result.score;

            info!(
                exam_id,
                question_id = question.id,
                score = outcome.result.score,
                fallback = outcome.is_fallback(),
                "answer graded"
            );
            reporter.on_graded(number, &outcome);
        }

        store.complete_exam(exam_id, total_score)?;

        let outcome = ExamOutcome {
            exam_id,
            student_id,
            total_score,
            answered: questions.len(),
            max_score: f64::from(self.config.question_count) * MAX_QUESTION_SCORE,
        };
        info!(exam_id, total_score, "exam completed");
        reporter.on_exam_complete(&outcome);
        Ok(outcome)
    }

    /// Generate the tutoring report for a stored exam.
    pub async fn final_report(
        &self,
        store: &dyn QuestionStore,
        exam_id: ExamId,
    ) -> Result<String, ExamError> {
        let results = store
            .exam_results(exam_id)?
            .ok_or(ExamError::ExamNotFound(exam_id))?;
        let synthesizer =
            ReportSynthesizer::new(self.client.as_ref(), self.config.call_policy.clone());
        Ok(synthesizer
            .build_report(&results.student_name, &results)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, StoreError};
    use crate::grading::FALLBACK_ANALYSIS;
    use crate::model::{
        AnswerDetail, AnswerId, Exam, ExamResults, ExamStatus, NewQuestion, QuestionId, Student,
    };
    use crate::traits::StoreResult;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct SavedAnswer {
        exam_id: ExamId,
        question_id: QuestionId,
        student_answer: String,
        score: f64,
        analysis: String,
        weak_points: Vec<String>,
    }

    /// Single-threaded in-memory store that returns questions in insertion order.
    #[derive(Default)]
    struct MemoryStore {
        questions: RefCell<Vec<Question>>,
        students: RefCell<HashMap<StudentId, Student>>,
        exams: RefCell<HashMap<ExamId, Exam>>,
        answers: RefCell<Vec<SavedAnswer>>,
        next_id: RefCell<i64>,
        fail_saves: bool,
    }

    impl MemoryStore {
        fn next_id(&self) -> i64 {
            let mut id = self.next_id.borrow_mut();
            *id += 1;
            *id
        }

        fn with_questions(count: usize) -> Self {
            let store = MemoryStore::default();
            for i in 0..count {
                store
                    .add_question(&NewQuestion {
                        subject: "math".into(),
                        difficulty: Difficulty::Easy,
                        text: format!("{i} + {i} = ?"),
                        standard_answer: (i * 2).to_string(),
                        knowledge_points: vec!["addition".into()],
                        created_by: "test".into(),
                    })
                    .unwrap();
            }
            store
        }
    }

    impl QuestionStore for MemoryStore {
        fn add_question(&self, q: &NewQuestion) -> StoreResult<QuestionId> {
            let id = self.next_id();
            self.questions.borrow_mut().push(Question {
                id,
                subject: q.subject.clone(),
                difficulty: q.difficulty,
                text: q.text.clone(),
                standard_answer: q.standard_answer.clone(),
                knowledge_points: q.knowledge_points.clone(),
                created_by: q.created_by.clone(),
                created_at: Utc::now(),
            });
            Ok(id)
        }

        fn questions_by_subject(
            &self,
            subject: &str,
            difficulty: Option<Difficulty>,
            limit: u32,
        ) -> StoreResult<Vec<Question>> {
            Ok(self
                .questions
                .borrow()
                .iter()
                .filter(|q| q.subject == subject && difficulty.map_or(true, |d| q.difficulty == d))
                .take(limit as usize)
                .cloned()
                .collect())
        }

        fn list_questions(&self, _subject: Option<&str>) -> StoreResult<Vec<Question>> {
            Ok(self.questions.borrow().clone())
        }

        fn get_question(&self, id: QuestionId) -> StoreResult<Option<Question>> {
            Ok(self.questions.borrow().iter().find(|q| q.id == id).cloned())
        }

        fn create_student(&self, name: &str, grade: Option<&str>) -> StoreResult<StudentId> {
            let id = self.next_id();
            self.students.borrow_mut().insert(
                id,
                Student {
                    id,
                    name: name.into(),
                    grade: grade.map(Into::into),
                    created_at: Utc::now(),
                },
            );
            Ok(id)
        }

        fn get_student(&self, id: StudentId) -> StoreResult<Option<Student>> {
            Ok(self.students.borrow().get(&id).cloned())
        }

        fn delete_student(&self, id: StudentId) -> StoreResult<()> {
            self.students.borrow_mut().remove(&id);
            Ok(())
        }

        fn create_exam(
            &self,
            student_id: StudentId,
            subject: &str,
            question_count: u32,
        ) -> StoreResult<ExamId> {
            let id = self.next_id();
            self.exams.borrow_mut().insert(
                id,
                Exam {
                    id,
                    student_id,
                    subject: subject.into(),
                    question_count,
                    total_score: 0.0,
                    start_time: Utc::now(),
                    end_time: None,
                    status: ExamStatus::InProgress,
                },
            );
            Ok(id)
        }

        fn get_exam(&self, id: ExamId) -> StoreResult<Option<Exam>> {
            Ok(self.exams.borrow().get(&id).cloned())
        }

        fn delete_exam(&self, id: ExamId) -> StoreResult<()> {
            self.exams.borrow_mut().remove(&id);
            self.answers.borrow_mut().retain(|a| a.exam_id != id);
            Ok(())
        }

        fn save_answer(&self, answer: &NewAnswer<'_>) -> StoreResult<AnswerId> {
            if self.fail_saves {
                return Err(StoreError::unavailable("save_answer", "database is locked"));
            }
            self.answers.borrow_mut().push(SavedAnswer {
                exam_id: answer.exam_id,
                question_id: answer.question_id,
                student_answer: answer.student_answer.into(),
                score: answer.score,
                analysis: answer.analysis.into(),
                weak_points: answer.weak_points.to_vec(),
            });
            Ok(self.next_id())
        }

        fn complete_exam(&self, id: ExamId, total_score: f64) -> StoreResult<()> {
            let mut exams = self.exams.borrow_mut();
            let exam = exams.get_mut(&id).ok_or(StoreError::NotFound {
                entity: "exam",
                id,
            })?;
            exam.total_score = total_score;
            exam.end_time = Some(Utc::now());
            exam.status = ExamStatus::Completed;
            Ok(())
        }

        fn exam_results(&self, id: ExamId) -> StoreResult<Option<ExamResults>> {
            let Some(exam) = self.exams.borrow().get(&id).cloned() else {
                return Ok(None);
            };
            let student = self.students.borrow().get(&exam.student_id).cloned();
            let questions = self.questions.borrow();
            let answers = self
                .answers
                .borrow()
                .iter()
                .filter(|a| a.exam_id == id)
                .map(|a| {
                    let q = questions.iter().find(|q| q.id == a.question_id).unwrap();
                    AnswerDetail {
                        answer_id: 0,
                        question_id: a.question_id,
                        question: q.text.clone(),
                        standard_answer: q.standard_answer.clone(),
                        student_answer: a.student_answer.clone(),
                        score: a.score,
                        analysis: a.analysis.clone(),
                        weak_points: a.weak_points.clone(),
                        answered_at: Utc::now(),
                    }
                })
                .collect();
            Ok(Some(ExamResults {
                exam,
                student_name: student.as_ref().map(|s| s.name.clone()).unwrap_or_default(),
                student_grade: student.and_then(|s| s.grade),
                answers,
            }))
        }

        fn student_weak_points(
            &self,
            _student_id: StudentId,
            _subject: Option<&str>,
        ) -> StoreResult<Vec<String>> {
            Ok(vec![])
        }
    }

    /// Scores 10 when the student's answer matches the standard answer in the prompt.
    struct ExactMatchGrader;

    #[async_trait]
    impl GradingClient for ExactMatchGrader {
        fn name(&self) -> &str {
            "exact"
        }

        fn model(&self) -> &str {
            "exact-match"
        }

        async fn chat(&self, _system: &str, user: &str) -> anyhow::Result<String> {
            let field = |label: &str| {
                user.lines()
                    .find_map(|l| l.strip_prefix(label))
                    .unwrap_or_default()
                    .trim()
                    .to_string()
            };
            let (score, weak) = if field("Standard answer:") == field("Student answer:") {
                (10, "[]")
            } else {
                (0, r#"["addition"]"#)
            };
            Ok(format!(
                r#"{{"score": {score}, "analysis": "graded", "weak_points": {weak}}}"#
            ))
        }
    }

    struct BrokenGrader;

    #[async_trait]
    impl GradingClient for BrokenGrader {
        fn name(&self) -> &str {
            "broken"
        }

        fn model(&self) -> &str {
            "broken"
        }

        async fn chat(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            Err(ProviderError::NetworkError("unreachable".into()).into())
        }
    }

    fn config() -> ExamConfig {
        ExamConfig {
            call_policy: CallPolicy {
                timeout: Duration::from_secs(5),
                retry_once: false,
                retry_delay: Duration::from_millis(1),
            },
            ..ExamConfig::default()
        }
    }

    #[tokio::test]
    async fn full_exam_sums_scores() {
        let store = MemoryStore::with_questions(5);
        let orchestrator = ExamOrchestrator::new(Arc::new(ExactMatchGrader), config());
        // standard answers are 0, 2, 4, 6, 8
        let mut answers = ScriptedAnswers::new(["0", "3", "4", "5", "8"]);

        let outcome = orchestrator
            .run_exam(&store, &mut answers, &NoopReporter, "Ming", "math", Some("1"))
            .await
            .unwrap();

        assert_eq!(outcome.answered, 5);
        assert_eq!(outcome.total_score, 30.0);
        assert_eq!(outcome.max_score, 50.0);

        let exam = store.get_exam(outcome.exam_id).unwrap().unwrap();
        assert_eq!(exam.status, ExamStatus::Completed);
        assert!(exam.end_time.is_some());
        let persisted: f64 = store.answers.borrow().iter().map(|a| a.score).sum();
        assert_eq!(exam.total_score, persisted);
    }

    #[tokio::test]
    async fn short_bank_runs_degraded_exam() {
        let store = MemoryStore::with_questions(3);
        let orchestrator = ExamOrchestrator::new(Arc::new(ExactMatchGrader), config());
        let mut answers = ScriptedAnswers::new(["0", "2", "4"]);

        let outcome = orchestrator
            .run_exam(&store, &mut answers, &NoopReporter, "Ming", "math", None)
            .await
            .unwrap();

        assert_eq!(outcome.answered, 3);
        assert_eq!(store.answers.borrow().len(), 3);
        let exam = store.get_exam(outcome.exam_id).unwrap().unwrap();
        assert_eq!(exam.status, ExamStatus::Completed);
    }

    #[tokio::test]
    async fn empty_bank_aborts_and_cleans_up() {
        let store = MemoryStore::with_questions(2);
        let orchestrator = ExamOrchestrator::new(Arc::new(ExactMatchGrader), config());
        let mut answers = ScriptedAnswers::new(Vec::<String>::new());

        let err = orchestrator
            .run_exam(&store, &mut answers, &NoopReporter, "Ming", "history", None)
            .await
            .unwrap_err();

        assert!(matches!(err, ExamError::NoQuestions { ref subject } if subject == "history"));
        assert!(store.answers.borrow().is_empty());
        assert!(store.exams.borrow().is_empty());
        assert!(store.students.borrow().is_empty());
    }

    #[tokio::test]
    async fn blank_answers_are_recorded_as_no_answer() {
        let store = MemoryStore::with_questions(2);
        let orchestrator = ExamOrchestrator::new(Arc::new(ExactMatchGrader), config());
        let mut answers = ScriptedAnswers::new(["   "]);

        orchestrator
            .run_exam(&store, &mut answers, &NoopReporter, "Ming", "math", None)
            .await
            .unwrap();

        let saved = store.answers.borrow();
        assert_eq!(saved.len(), 2);
        assert!(saved.iter().all(|a| a.student_answer == NO_ANSWER));
    }

    #[tokio::test]
    async fn grading_failure_still_records_answers() {
        let store = MemoryStore::with_questions(4);
        let orchestrator = ExamOrchestrator::new(Arc::new(BrokenGrader), config());
        let mut answers = ScriptedAnswers::new(["0", "2", "4", "6"]);

        let outcome = orchestrator
            .run_exam(&store, &mut answers, &NoopReporter, "Ming", "math", None)
            .await
            .unwrap();

        assert_eq!(outcome.total_score, 0.0);
        let saved = store.answers.borrow();
        assert_eq!(saved.len(), 4);
        for answer in saved.iter() {
            assert_eq!(answer.score, 0.0);
            assert_eq!(answer.analysis, FALLBACK_ANALYSIS);
            assert!(answer.weak_points.is_empty());
        }
    }

    #[tokio::test]
    async fn store_failure_aborts_exam() {
        let mut store = MemoryStore::with_questions(2);
        store.fail_saves = true;
        let orchestrator = ExamOrchestrator::new(Arc::new(ExactMatchGrader), config());
        let mut answers = ScriptedAnswers::new(["0", "2"]);

        let err = orchestrator
            .run_exam(&store, &mut answers, &NoopReporter, "Ming", "math", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExamError::Store(StoreError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn weak_points_are_persisted_per_answer() {
        let store = MemoryStore::with_questions(2);
        let orchestrator = ExamOrchestrator::new(Arc::new(ExactMatchGrader), config());
        let mut answers = ScriptedAnswers::new(["0", "wrong"]);

        orchestrator
            .run_exam(&store, &mut answers, &NoopReporter, "Ming", "math", None)
            .await
            .unwrap();

        let saved = store.answers.borrow();
        assert!(saved[0].weak_points.is_empty());
        assert_eq!(saved[1].weak_points, vec!["addition"]);
        assert_eq!(saved[1].question_id, store.questions.borrow()[1].id);
    }

    #[tokio::test]
    async fn final_report_for_missing_exam() {
        let store = MemoryStore::default();
        let orchestrator = ExamOrchestrator::new(Arc::new(ExactMatchGrader), config());
        let err = orchestrator.final_report(&store, 99).await.unwrap_err();
        assert!(matches!(err, ExamError::ExamNotFound(99)));
    }

    #[tokio::test]
    async fn final_report_falls_back_on_backend_failure() {
        let store = MemoryStore::with_questions(1);
        let orchestrator = ExamOrchestrator::new(Arc::new(BrokenGrader), config());
        let mut answers = ScriptedAnswers::new(["0"]);
        let outcome = orchestrator
            .run_exam(&store, &mut answers, &NoopReporter, "Ming", "math", None)
            .await
            .unwrap();

        let report = orchestrator
            .final_report(&store, outcome.exam_id)
            .await
            .unwrap();
        assert!(report.contains("Ming"));
        assert!(report.contains("error"));
    }
}
