//! The `tutorgrade init` command.

use anyhow::Result;

use tutorgrade_providers::config::STARTER_CONFIG;

pub fn execute() -> Result<()> {
    if std::path::Path::new("tutorgrade.toml").exists() {
        println!("tutorgrade.toml already exists, skipping.");
    } else {
        std::fs::write("tutorgrade.toml", STARTER_CONFIG)?;
        println!("Created tutorgrade.toml");
    }

    std::fs::create_dir_all("questions")?;
    let bank_path = std::path::Path::new("questions/sample.toml");
    if bank_path.exists() {
        println!("questions/sample.toml already exists, skipping.");
    } else {
        std::fs::write(bank_path, SAMPLE_BANK)?;
        println!("Created questions/sample.toml");
    }

    println!("\nNext steps:");
    println!("  1. export DASHSCOPE_API_KEY=... (or GOOGLE_API_KEY=...)");
    println!("  2. Run: tutorgrade question import --file questions/sample.toml");
    println!("  3. Run: tutorgrade exam --name <student> --subject math");

    Ok(())
}

const SAMPLE_BANK: &str = r#"[bank]
name = "Sample questions"
default_subject = "math"
default_created_by = "System"

[[questions]]
difficulty = "easy"
question = "7 + 8 = ?"
standard_answer = "15"
knowledge_points = ["addition within 20", "carrying"]

[[questions]]
difficulty = "easy"
question = "13 - 5 = ?"
standard_answer = "8"
knowledge_points = ["subtraction within 20", "borrowing"]

[[questions]]
difficulty = "medium"
question = "Solve 2x + 5 = 13 for x"
standard_answer = "x = 4"
knowledge_points = ["linear equations", "algebra"]

[[questions]]
subject = "chinese"
difficulty = "easy"
question = "Who wrote the poem 'Quiet Night Thought'?"
standard_answer = "Li Bai"
knowledge_points = ["classical poetry", "literary knowledge"]
"#;
