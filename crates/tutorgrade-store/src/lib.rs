//! SQLite-backed question store.
//!
//! Every operation runs as a single statement or a single implicit
//! transaction. Knowledge points and weak points are stored as JSON arrays in
//! TEXT columns; timestamps as RFC 3339 TEXT.
//!
//! Returned connections always have `foreign_keys=ON` and all migrations
//! applied.

pub mod migrations;

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::{debug, error, info};

use tutorgrade_core::error::StoreError;
use tutorgrade_core::model::{
    AnswerDetail, AnswerId, Difficulty, Exam, ExamId, ExamResults, ExamStatus, NewQuestion,
    Question, QuestionId, Student, StudentId,
};
use tutorgrade_core::statistics::rank_by_frequency;
use tutorgrade_core::traits::{NewAnswer, QuestionStore, StoreResult};

/// Failures while opening a database.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl From<OpenError> for StoreError {
    fn from(value: OpenError) -> Self {
        StoreError::unavailable("open", value)
    }
}

const QUESTION_SELECT_SQL: &str = "SELECT
    id,
    subject,
    difficulty,
    question,
    standard_answer,
    knowledge_points,
    created_by,
    created_at
FROM questions";

const EXAM_SELECT_SQL: &str = "SELECT
    id,
    student_id,
    subject,
    total_questions,
    total_score,
    start_time,
    end_time,
    status
FROM exams";

/// Question store over a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and apply pending migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let started_at = Instant::now();

        let mut conn = Connection::open(path)?;
        bootstrap(&mut conn).inspect_err(|e| {
            error!(path = %path.display(), "database bootstrap failed: {e}");
        })?;

        info!(
            path = %path.display(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            "opened question store"
        );
        Ok(Self { conn })
    }

    /// Open a private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, OpenError> {
        let mut conn = Connection::open_in_memory()?;
        bootstrap(&mut conn)?;
        debug!("opened in-memory question store");
        Ok(Self { conn })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn bootstrap(conn: &mut Connection) -> Result<(), OpenError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    migrations::apply_migrations(conn)
}

fn now_text() -> String {
    Utc::now().to_rfc3339()
}

fn unavailable(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |e| StoreError::unavailable(operation, e)
}

fn parse_time(raw: &str, column: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("{column} '{raw}': {e}")))
}

fn parse_list(raw: &str, column: &str) -> StoreResult<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| StoreError::InvalidData(format!("{column}: {e}")))
}

fn list_to_db(items: &[String]) -> String {
    // A Vec<String> always serializes.
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Raw question row before text columns are decoded.
struct QuestionRow {
    id: QuestionId,
    subject: String,
    difficulty: String,
    text: String,
    standard_answer: String,
    knowledge_points: String,
    created_by: String,
    created_at: String,
}

impl QuestionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            subject: row.get(1)?,
            difficulty: row.get(2)?,
            text: row.get(3)?,
            standard_answer: row.get(4)?,
            knowledge_points: row.get(5)?,
            created_by: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn decode(self) -> StoreResult<Question> {
        let difficulty: Difficulty = self
            .difficulty
            .parse()
            .map_err(|e: String| StoreError::InvalidData(format!("question {}: {e}", self.id)))?;
        Ok(Question {
            id: self.id,
            subject: self.subject,
            difficulty,
            text: self.text,
            standard_answer: self.standard_answer,
            knowledge_points: parse_list(&self.knowledge_points, "knowledge_points")?,
            created_by: self.created_by,
            created_at: parse_time(&self.created_at, "created_at")?,
        })
    }
}

struct ExamRow {
    id: ExamId,
    student_id: StudentId,
    subject: String,
    question_count: u32,
    total_score: f64,
    start_time: String,
    end_time: Option<String>,
    status: String,
}

impl ExamRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_id: row.get(1)?,
            subject: row.get(2)?,
            question_count: row.get(3)?,
            total_score: row.get(4)?,
            start_time: row.get(5)?,
            end_time: row.get(6)?,
            status: row.get(7)?,
        })
    }

    fn decode(self) -> StoreResult<Exam> {
        let status: ExamStatus = self
            .status
            .parse()
            .map_err(|e: String| StoreError::InvalidData(format!("exam {}: {e}", self.id)))?;
        let end_time = self
            .end_time
            .as_deref()
            .map(|t| parse_time(t, "end_time"))
            .transpose()?;
        Ok(Exam {
            id: self.id,
            student_id: self.student_id,
            subject: self.subject,
            question_count: self.question_count,
            total_score: self.total_score,
            start_time: parse_time(&self.start_time, "start_time")?,
            end_time,
            status,
        })
    }
}

struct AnswerRow {
    answer_id: AnswerId,
    question_id: QuestionId,
    question: String,
    standard_answer: String,
    student_answer: String,
    score: f64,
    analysis: String,
    weak_points: String,
    answered_at: String,
}

impl AnswerRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            answer_id: row.get(0)?,
            question_id: row.get(1)?,
            question: row.get(2)?,
            standard_answer: row.get(3)?,
            student_answer: row.get(4)?,
            score: row.get(5)?,
            analysis: row.get(6)?,
            weak_points: row.get(7)?,
            answered_at: row.get(8)?,
        })
    }

    fn decode(self) -> StoreResult<AnswerDetail> {
        Ok(AnswerDetail {
            answer_id: self.answer_id,
            question_id: self.question_id,
            question: self.question,
            standard_answer: self.standard_answer,
            student_answer: self.student_answer,
            score: self.score,
            analysis: self.analysis,
            weak_points: parse_list(&self.weak_points, "weak_points")?,
            answered_at: parse_time(&self.answered_at, "answered_at")?,
        })
    }
}

impl SqliteStore {
    fn query_questions(
        &self,
        operation: &'static str,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<Question>> {
        let mut stmt = self.conn.prepare(sql).map_err(unavailable(operation))?;
        let rows = stmt
            .query_map(params, QuestionRow::from_row)
            .map_err(unavailable(operation))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(unavailable(operation))?;
        rows.into_iter().map(QuestionRow::decode).collect()
    }
}

impl QuestionStore for SqliteStore {
    fn add_question(&self, question: &NewQuestion) -> StoreResult<QuestionId> {
        if let Some(field) = question.missing_field() {
            return Err(StoreError::InvalidData(format!(
                "question {field} must not be empty"
            )));
        }

        self.conn
            .execute(
                "INSERT INTO questions (
                    subject,
                    difficulty,
                    question,
                    standard_answer,
                    knowledge_points,
                    created_by,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    question.subject.as_str(),
                    question.difficulty.as_str(),
                    question.text.as_str(),
                    question.standard_answer.as_str(),
                    list_to_db(&question.knowledge_points),
                    question.created_by.as_str(),
                    now_text(),
                ],
            )
            .map_err(unavailable("add_question"))?;

        let id = self.conn.last_insert_rowid();
        debug!(question_id = id, subject = %question.subject, "added question");
        Ok(id)
    }

    fn questions_by_subject(
        &self,
        subject: &str,
        difficulty: Option<Difficulty>,
        limit: u32,
    ) -> StoreResult<Vec<Question>> {
        self.query_questions(
            "questions_by_subject",
            &format!(
                "{QUESTION_SELECT_SQL}
                 WHERE subject = ?1
                   AND (?2 IS NULL OR difficulty = ?2)
                 ORDER BY RANDOM()
                 LIMIT ?3;"
            ),
            params![subject, difficulty.map(|d| d.as_str()), limit],
        )
    }

    fn list_questions(&self, subject: Option<&str>) -> StoreResult<Vec<Question>> {
        self.query_questions(
            "list_questions",
            &format!(
                "{QUESTION_SELECT_SQL}
                 WHERE (?1 IS NULL OR subject = ?1)
                 ORDER BY id;"
            ),
            params![subject],
        )
    }

    fn get_question(&self, id: QuestionId) -> StoreResult<Option<Question>> {
        let row = self
            .conn
            .query_row(
                &format!("{QUESTION_SELECT_SQL} WHERE id = ?1;"),
                params![id],
                QuestionRow::from_row,
            )
            .optional()
            .map_err(unavailable("get_question"))?;
        row.map(QuestionRow::decode).transpose()
    }

    fn create_student(&self, name: &str, grade: Option<&str>) -> StoreResult<StudentId> {
        self.conn
            .execute(
                "INSERT INTO students (name, grade, created_at) VALUES (?1, ?2, ?3);",
                params![name, grade, now_text()],
            )
            .map_err(unavailable("create_student"))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_student(&self, id: StudentId) -> StoreResult<Option<Student>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, grade, created_at FROM students WHERE id = ?1;",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, StudentId>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(unavailable("get_student"))?;

        row.map(|(id, name, grade, created_at)| {
            Ok(Student {
                id,
                name,
                grade,
                created_at: parse_time(&created_at, "created_at")?,
            })
        })
        .transpose()
    }

    fn delete_student(&self, id: StudentId) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM students WHERE id = ?1;", params![id])
            .map_err(unavailable("delete_student"))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                entity: "student",
                id,
            });
        }
        Ok(())
    }

    fn create_exam(
        &self,
        student_id: StudentId,
        subject: &str,
        question_count: u32,
    ) -> StoreResult<ExamId> {
        self.conn
            .execute(
                "INSERT INTO exams (student_id, subject, total_questions, total_score, start_time, status)
                 VALUES (?1, ?2, ?3, 0, ?4, ?5);",
                params![
                    student_id,
                    subject,
                    question_count,
                    now_text(),
                    ExamStatus::InProgress.as_str(),
                ],
            )
            .map_err(unavailable("create_exam"))?;

        let id = self.conn.last_insert_rowid();
        debug!(exam_id = id, student_id, subject, "created exam");
        Ok(id)
    }

    fn get_exam(&self, id: ExamId) -> StoreResult<Option<Exam>> {
        let row = self
            .conn
            .query_row(
                &format!("{EXAM_SELECT_SQL} WHERE id = ?1;"),
                params![id],
                ExamRow::from_row,
            )
            .optional()
            .map_err(unavailable("get_exam"))?;
        row.map(ExamRow::decode).transpose()
    }

    fn delete_exam(&self, id: ExamId) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM exams WHERE id = ?1;", params![id])
            .map_err(unavailable("delete_exam"))?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity: "exam", id });
        }
        Ok(())
    }

    fn save_answer(&self, answer: &NewAnswer<'_>) -> StoreResult<AnswerId> {
        self.conn
            .execute(
                "INSERT INTO answers (
                    exam_id,
                    question_id,
                    student_answer,
                    score,
                    analysis,
                    weak_points,
                    answered_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    answer.exam_id,
                    answer.question_id,
                    answer.student_answer,
                    answer.score,
                    answer.analysis,
                    list_to_db(answer.weak_points),
                    now_text(),
                ],
            )
            .map_err(unavailable("save_answer"))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn complete_exam(&self, id: ExamId, total_score: f64) -> StoreResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE exams
                 SET total_score = ?1, end_time = ?2, status = ?3
                 WHERE id = ?4;",
                params![
                    total_score,
                    now_text(),
                    ExamStatus::Completed.as_str(),
                    id
                ],
            )
            .map_err(unavailable("complete_exam"))?;
        if changed == 0 {
            return Err(StoreError::NotFound { entity: "exam", id });
        }
        Ok(())
    }

    fn exam_results(&self, id: ExamId) -> StoreResult<Option<ExamResults>> {
        let header = self
            .conn
            .query_row(
                "SELECT
                    e.id, e.student_id, e.subject, e.total_questions,
                    e.total_score, e.start_time, e.end_time, e.status,
                    s.name, s.grade
                 FROM exams e
                 JOIN students s ON e.student_id = s.id
                 WHERE e.id = ?1;",
                params![id],
                |row| {
                    Ok((
                        ExamRow::from_row(row)?,
                        row.get::<_, String>(8)?,
                        row.get::<_, Option<String>>(9)?,
                    ))
                },
            )
            .optional()
            .map_err(unavailable("exam_results"))?;

        let Some((exam_row, student_name, student_grade)) = header else {
            return Ok(None);
        };
        let exam = exam_row.decode()?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT
                    a.id, a.question_id, q.question, q.standard_answer,
                    a.student_answer, a.score, a.analysis, a.weak_points,
                    a.answered_at
                 FROM answers a
                 JOIN questions q ON a.question_id = q.id
                 WHERE a.exam_id = ?1
                 ORDER BY a.id;",
            )
            .map_err(unavailable("exam_results"))?;
        let rows = stmt
            .query_map(params![id], AnswerRow::from_row)
            .map_err(unavailable("exam_results"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(unavailable("exam_results"))?;
        let answers = rows
            .into_iter()
            .map(AnswerRow::decode)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Some(ExamResults {
            exam,
            student_name,
            student_grade,
            answers,
        }))
    }

    fn student_weak_points(
        &self,
        student_id: StudentId,
        subject: Option<&str>,
    ) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT a.weak_points
                 FROM answers a
                 JOIN exams e ON a.exam_id = e.id
                 WHERE e.student_id = ?1
                   AND (?2 IS NULL OR e.subject = ?2)
                 ORDER BY a.id;",
            )
            .map_err(unavailable("student_weak_points"))?;
        let raw = stmt
            .query_map(params![student_id, subject], |row| row.get::<_, String>(0))
            .map_err(unavailable("student_weak_points"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(unavailable("student_weak_points"))?;

        let mut tags = Vec::new();
        for list in &raw {
            tags.extend(parse_list(list, "weak_points")?);
        }
        Ok(rank_by_frequency(tags))
    }
}
