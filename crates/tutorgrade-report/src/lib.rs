//! tutorgrade-report — Writers for saved tutoring reports.

pub mod json;
pub mod text;

/// File name stem shared by every report format: `tutoring_report_<exam>_<student>`.
///
/// Path separators and control characters in the student name become `_`.
pub fn report_stem(exam_id: i64, student_name: &str) -> String {
    let safe: String = student_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
            {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("tutoring_report_{exam_id}_{safe}")
}
