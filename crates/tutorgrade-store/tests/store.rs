use rusqlite::Connection;
use tutorgrade_core::error::StoreError;
use tutorgrade_core::model::{Difficulty, ExamStatus, NewQuestion};
use tutorgrade_core::traits::{NewAnswer, QuestionStore};
use tutorgrade_store::migrations::latest_version;
use tutorgrade_store::{OpenError, SqliteStore};

fn question(subject: &str, difficulty: Difficulty, text: &str, answer: &str) -> NewQuestion {
    NewQuestion {
        subject: subject.into(),
        difficulty,
        text: text.into(),
        standard_answer: answer.into(),
        knowledge_points: vec!["addition within 20".into(), "mental math".into()],
        created_by: "System".into(),
    }
}

fn seeded(count: usize) -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    for i in 0..count {
        store
            .add_question(&question(
                "math",
                Difficulty::Easy,
                &format!("{i} + 1 = ?"),
                &(i + 1).to_string(),
            ))
            .unwrap();
    }
    store
}

fn answer<'a>(exam_id: i64, question_id: i64, score: f64, weak: &'a [String]) -> NewAnswer<'a> {
    NewAnswer {
        exam_id,
        question_id,
        student_answer: "7",
        score,
        analysis: "checked",
        weak_points: weak,
    }
}

#[test]
fn migrations_applied_on_open() {
    let store = SqliteStore::open_in_memory().unwrap();
    let version: u32 = store
        .connection()
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());
}

#[test]
fn reopening_file_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tutorgrade.db");

    let store = SqliteStore::open(&path).unwrap();
    let id = store
        .add_question(&question("math", Difficulty::Medium, "3 x 4 = ?", "12"))
        .unwrap();
    drop(store);

    let store = SqliteStore::open(&path).unwrap();
    let q = store.get_question(id).unwrap().unwrap();
    assert_eq!(q.text, "3 x 4 = ?");
    assert_eq!(q.difficulty, Difficulty::Medium);
    assert_eq!(
        q.knowledge_points,
        vec!["addition within 20".to_string(), "mental math".to_string()]
    );
}

#[test]
fn newer_schema_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match SqliteStore::open(&path) {
        Err(OpenError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        }) => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected an error"),
    }
}

#[test]
fn random_selection_respects_limit() {
    let store = seeded(10);
    for _ in 0..5 {
        let picked = store.questions_by_subject("math", None, 5).unwrap();
        assert_eq!(picked.len(), 5);

        let mut ids: Vec<i64> = picked.iter().map(|q| q.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5, "selection must be without replacement");
        assert!(picked.iter().all(|q| q.subject == "math"));
    }
}

#[test]
fn short_bank_returns_everything() {
    let store = seeded(3);
    assert_eq!(store.questions_by_subject("math", None, 5).unwrap().len(), 3);
    assert!(store
        .questions_by_subject("history", None, 5)
        .unwrap()
        .is_empty());
}

#[test]
fn difficulty_filter() {
    let store = seeded(2);
    store
        .add_question(&question("math", Difficulty::Hard, "Solve x^2 = 16", "x = 4 or x = -4"))
        .unwrap();

    let hard = store
        .questions_by_subject("math", Some(Difficulty::Hard), 5)
        .unwrap();
    assert_eq!(hard.len(), 1);
    assert_eq!(hard[0].difficulty, Difficulty::Hard);
}

#[test]
fn list_questions_in_id_order() {
    let store = seeded(3);
    store
        .add_question(&question("chinese", Difficulty::Easy, "Who wrote 'Quiet Night Thought'?", "Li Bai"))
        .unwrap();

    let all = store.list_questions(None).unwrap();
    assert_eq!(all.len(), 4);
    assert!(all.windows(2).all(|w| w[0].id < w[1].id));

    let chinese = store.list_questions(Some("chinese")).unwrap();
    assert_eq!(chinese.len(), 1);
}

#[test]
fn exam_lifecycle() {
    let store = seeded(2);
    let qs = store.list_questions(None).unwrap();
    let student = store.create_student("Ming", Some("grade 1")).unwrap();
    let exam = store.create_exam(student, "math", 5).unwrap();

    let opened = store.get_exam(exam).unwrap().unwrap();
    assert_eq!(opened.status, ExamStatus::InProgress);
    assert_eq!(opened.total_score, 0.0);
    assert!(opened.end_time.is_none());

    store.save_answer(&answer(exam, qs[1].id, 8.0, &[])).unwrap();
    store.save_answer(&answer(exam, qs[0].id, 6.5, &[])).unwrap();
    store.complete_exam(exam, 14.5).unwrap();

    let results = store.exam_results(exam).unwrap().unwrap();
    assert_eq!(results.student_name, "Ming");
    assert_eq!(results.student_grade.as_deref(), Some("grade 1"));
    assert_eq!(results.exam.status, ExamStatus::Completed);
    assert_eq!(results.exam.total_score, 14.5);
    assert!(results.exam.end_time.is_some());
    assert_eq!(results.max_score(), 50.0);

    // Answering order, not question order.
    assert_eq!(results.answers.len(), 2);
    assert_eq!(results.answers[0].question_id, qs[1].id);
    assert_eq!(results.answers[0].question, qs[1].text);
    assert_eq!(results.answers[1].standard_answer, qs[0].standard_answer);
}

#[test]
fn missing_records() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(store.exam_results(42).unwrap().is_none());
    assert!(store.get_exam(42).unwrap().is_none());
    assert!(store.get_student(42).unwrap().is_none());
    assert!(matches!(
        store.complete_exam(42, 1.0),
        Err(StoreError::NotFound { entity: "exam", id: 42 })
    ));
}

#[test]
fn weak_points_ranked_per_student() {
    let store = seeded(3);
    let qs = store.list_questions(None).unwrap();
    let ming = store.create_student("Ming", None).unwrap();
    let hong = store.create_student("Hong", None).unwrap();

    let first = store.create_exam(ming, "math", 5).unwrap();
    let a = vec!["A".to_string(), "A".to_string()];
    let b = vec!["B".to_string(), "C".to_string()];
    store.save_answer(&answer(first, qs[0].id, 5.0, &a)).unwrap();
    store.save_answer(&answer(first, qs[1].id, 5.0, &b)).unwrap();

    let second = store.create_exam(ming, "chinese", 5).unwrap();
    let c = vec!["C".to_string(), "C".to_string()];
    store.save_answer(&answer(second, qs[2].id, 5.0, &c)).unwrap();

    let other = store.create_exam(hong, "math", 5).unwrap();
    let z = vec!["Z".to_string()];
    store.save_answer(&answer(other, qs[0].id, 0.0, &z)).unwrap();

    assert_eq!(
        store.student_weak_points(ming, None).unwrap(),
        vec!["C", "A", "B"]
    );
    assert_eq!(
        store.student_weak_points(ming, Some("math")).unwrap(),
        vec!["A", "B", "C"]
    );
    assert_eq!(store.student_weak_points(hong, None).unwrap(), vec!["Z"]);
    assert!(store.student_weak_points(999, None).unwrap().is_empty());
}

#[test]
fn deleting_exam_removes_answers() {
    let store = seeded(1);
    let q = store.list_questions(None).unwrap().remove(0);
    let student = store.create_student("Ming", None).unwrap();
    let exam = store.create_exam(student, "math", 5).unwrap();
    let weak = vec!["carrying".to_string()];
    store.save_answer(&answer(exam, q.id, 2.0, &weak)).unwrap();

    store.delete_exam(exam).unwrap();
    assert!(store.get_exam(exam).unwrap().is_none());

    let remaining: i64 = store
        .connection()
        .query_row("SELECT COUNT(*) FROM answers;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);

    store.delete_student(student).unwrap();
    assert!(store.get_student(student).unwrap().is_none());
    assert!(matches!(
        store.delete_student(student),
        Err(StoreError::NotFound { .. })
    ));
}
