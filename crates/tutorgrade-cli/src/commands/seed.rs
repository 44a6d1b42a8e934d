//! The `tutorgrade seed` command: built-in sample questions and a
//! first-grade arithmetic generator.

use std::path::PathBuf;

use anyhow::Result;
use rand::Rng;

use tutorgrade_core::model::{Difficulty, NewQuestion};
use tutorgrade_core::traits::QuestionStore;
use tutorgrade_providers::config::load_config_from;

use super::open_store;

const CREATED_BY: &str = "System";

/// Sums and minuends stay within this bound.
const ARITHMETIC_LIMIT: u32 = 20;

pub fn execute(arithmetic: Option<u32>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = open_store(&config)?;

    let mut questions = sample_questions();
    if let Some(count) = arithmetic {
        questions.extend(arithmetic_questions(&mut rand::thread_rng(), count));
        questions.extend(word_problems());
    }

    let added = add_all(&store, &questions);
    println!("Added {added} of {} questions.", questions.len());
    Ok(())
}

fn add_all(store: &dyn QuestionStore, questions: &[NewQuestion]) -> usize {
    questions
        .iter()
        .filter(|q| match store.add_question(q) {
            Ok(_) => true,
            Err(e) => {
                eprintln!("  skipped '{}': {e}", q.text);
                false
            }
        })
        .count()
}

fn question(
    subject: &str,
    difficulty: Difficulty,
    text: &str,
    answer: &str,
    knowledge_points: &[&str],
) -> NewQuestion {
    NewQuestion {
        subject: subject.to_string(),
        difficulty,
        text: text.to_string(),
        standard_answer: answer.to_string(),
        knowledge_points: knowledge_points.iter().map(|s| s.to_string()).collect(),
        created_by: CREATED_BY.to_string(),
    }
}

/// Five math and two Chinese questions covering every difficulty.
pub fn sample_questions() -> Vec<NewQuestion> {
    vec![
        question(
            "math",
            Difficulty::Medium,
            "Solve 2x + 5 = 13 for x",
            "x = 4",
            &["linear equations", "algebra"],
        ),
        question(
            "math",
            Difficulty::Medium,
            "Compute (3 + 4) × 2 - 5",
            "9",
            &["four operations", "order of operations"],
        ),
        question(
            "math",
            Difficulty::Easy,
            "A square has sides of 5 cm. What is its area?",
            "25 square centimetres",
            &["plane figures", "area"],
        ),
        question(
            "math",
            Difficulty::Hard,
            "Given f(x) = x² - 4x + 3, find the minimum value of f(x)",
            "The minimum is -1, reached at x = 2",
            &["quadratic functions", "extrema"],
        ),
        question(
            "math",
            Difficulty::Medium,
            "In a right triangle one acute angle is 30° and the hypotenuse is 10. How long is the side opposite that angle?",
            "5",
            &["trigonometry", "right triangles"],
        ),
        question(
            "chinese",
            Difficulty::Medium,
            "Explain the line \"春风得意马蹄疾，一日看尽长安花\"",
            "From Meng Jiao's 'After Passing the Exam': the poet's joy at passing the imperial examination; things go quickly and smoothly when one is in high spirits",
            &["classical poetry comprehension", "literary appreciation"],
        ),
        question(
            "chinese",
            Difficulty::Easy,
            "Who wrote the poem 'Quiet Night Thought' (静夜思)?",
            "Li Bai",
            &["classical poetry", "literary knowledge"],
        ),
    ]
}

/// `count` additions and `count` subtractions within 20.
pub fn arithmetic_questions(rng: &mut impl Rng, count: u32) -> Vec<NewQuestion> {
    let mut questions = Vec::with_capacity(count as usize * 2);

    for _ in 0..count {
        let a = rng.gen_range(1..ARITHMETIC_LIMIT);
        let b = rng.gen_range(1..=ARITHMETIC_LIMIT - a);
        questions.push(question(
            "math",
            Difficulty::Easy,
            &format!("{a} + {b} = ?"),
            &(a + b).to_string(),
            &["addition within 20", "basic arithmetic"],
        ));
    }

    for _ in 0..count {
        let a = rng.gen_range(1..=ARITHMETIC_LIMIT);
        let b = rng.gen_range(1..=a);
        questions.push(question(
            "math",
            Difficulty::Easy,
            &format!("{a} - {b} = ?"),
            &(a - b).to_string(),
            &["subtraction within 20", "basic arithmetic"],
        ));
    }

    questions
}

/// First-grade word problems.
pub fn word_problems() -> Vec<NewQuestion> {
    vec![
        question(
            "math",
            Difficulty::Easy,
            "Ming has 5 apples and his mother gives him 3 more. How many apples does he have now?",
            "8 apples",
            &["addition within 20", "word problems"],
        ),
        question(
            "math",
            Difficulty::Easy,
            "There are 12 birds in a tree and 4 fly away. How many birds are left?",
            "8 birds",
            &["subtraction within 20", "word problems"],
        ),
        question(
            "math",
            Difficulty::Easy,
            "A class has 9 boys and 7 girls. How many students are in the class?",
            "16 students",
            &["addition within 20", "word problems"],
        ),
        question(
            "math",
            Difficulty::Easy,
            "Mother bought 15 oranges and 6 were eaten. How many oranges are left?",
            "9 oranges",
            &["subtraction within 20", "word problems"],
        ),
        question(
            "math",
            Difficulty::Easy,
            "Hong has 8 pencils and Ming gives her 5 more. How many pencils does Hong have now?",
            "13 pencils",
            &["addition within 20", "word problems"],
        ),
    ]
}
