//! Frequency ranking and score summaries.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{ExamResults, MAX_QUESTION_SCORE};

/// Rank tags by descending frequency.
///
/// Ties keep first-seen order: a tag that appears earlier in the input ranks
/// above a later tag with the same count.
pub fn rank_by_frequency<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for tag in tags {
        let tag = tag.as_ref();
        match index.get(tag) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(tag.to_string(), counts.len());
                counts.push((tag.to_string(), 1));
            }
        }
    }

    // Stable sort keeps insertion order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().map(|(tag, _)| tag).collect()
}

/// The `k` most frequent tags, ties broken by first-seen order.
pub fn top_k<I, S>(tags: I, k: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ranked = rank_by_frequency(tags);
    ranked.truncate(k);
    ranked
}

/// Aggregate numbers for one finished exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSummary {
    pub answered: usize,
    pub total_score: f64,
    pub max_score: f64,
    /// Share of the maximum score, 0.0..=1.0.
    pub ratio: f64,
    /// Answers that received the full score.
    pub full_marks: usize,
}

impl ExamSummary {
    pub fn from_results(results: &ExamResults) -> Self {
        let max_score = results.max_score();
        let total_score = results.exam.total_score;
        let ratio = if max_score > 0.0 {
            total_score / max_score
        } else {
            0.0
        };
        Self {
            answered: results.answers.len(),
            total_score,
            max_score,
            ratio,
            full_marks: results
                .answers
                .iter()
                .filter(|a| a.score >= MAX_QUESTION_SCORE)
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerDetail, Exam, ExamStatus};
    use chrono::Utc;

    #[test]
    fn ranks_by_count_then_first_seen() {
        let tags = ["A", "A", "B", "C", "C", "C"];
        assert_eq!(top_k(tags, 3), vec!["C", "A", "B"]);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let tags = ["B", "A", "A", "B", "C"];
        assert_eq!(rank_by_frequency(tags), vec!["B", "A", "C"]);
    }

    #[test]
    fn top_k_truncates() {
        let tags = ["a", "b", "c", "d", "e", "f", "g"];
        assert_eq!(top_k(tags, 5), vec!["a", "b", "c", "d", "e"]);
        assert!(top_k(Vec::<String>::new(), 5).is_empty());
    }

    #[test]
    fn summary_of_results() {
        let now = Utc::now();
        let answer = |score: f64| AnswerDetail {
            answer_id: 1,
            question_id: 1,
            question: "q".into(),
            standard_answer: "a".into(),
            student_answer: "a".into(),
            score,
            analysis: String::new(),
            weak_points: vec![],
            answered_at: now,
        };
        let results = ExamResults {
            exam: Exam {
                id: 1,
                student_id: 1,
                subject: "math".into(),
                question_count: 5,
                total_score: 25.0,
                start_time: now,
                end_time: Some(now),
                status: ExamStatus::Completed,
            },
            student_name: "Ming".into(),
            student_grade: None,
            answers: vec![answer(10.0), answer(10.0), answer(5.0)],
        };

        let summary = ExamSummary::from_results(&results);
        assert_eq!(summary.answered, 3);
        assert_eq!(summary.max_score, 50.0);
        assert_eq!(summary.ratio, 0.5);
        assert_eq!(summary.full_marks, 2);
    }
}
