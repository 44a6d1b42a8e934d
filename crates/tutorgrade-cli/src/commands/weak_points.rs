//! The `tutorgrade weak-points` command.

use std::path::PathBuf;

use anyhow::Result;

use tutorgrade_core::traits::QuestionStore;
use tutorgrade_providers::config::load_config_from;

use super::open_store;

pub fn execute(student_id: i64, subject: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = open_store(&config)?;

    let student = store
        .get_student(student_id)?
        .ok_or_else(|| anyhow::anyhow!("student {student_id} not found"))?;
    let points = store.student_weak_points(student_id, subject.as_deref())?;

    match &subject {
        Some(s) => println!("Weak points of {} in {s}:", student.name),
        None => println!("Weak points of {}:", student.name),
    }
    if points.is_empty() {
        println!("  none recorded");
    }
    for (i, point) in points.iter().enumerate() {
        println!("  {}. {point}", i + 1);
    }

    Ok(())
}
