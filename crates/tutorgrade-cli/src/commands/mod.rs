pub mod backends;
pub mod exam;
pub mod init;
pub mod question;
pub mod report;
pub mod seed;
pub mod weak_points;

use std::path::Path;

use anyhow::{Context, Result};

use tutorgrade_core::model::ExamResults;
use tutorgrade_providers::TutorConfig;
use tutorgrade_store::SqliteStore;

/// Open the configured database, creating it on first use.
pub fn open_store(config: &TutorConfig) -> Result<SqliteStore> {
    if let Some(parent) = config
        .database
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    SqliteStore::open(&config.database)
        .with_context(|| format!("failed to open database: {}", config.database.display()))
}

/// Write a report in each requested format ("text", "json", or "all").
pub fn save_report(
    dir: &Path,
    results: &ExamResults,
    narrative: &str,
    formats: &str,
) -> Result<()> {
    let formats: Vec<&str> = formats.split(',').map(str::trim).collect();
    let all = formats.contains(&"all");

    if let Some(unknown) = formats
        .iter()
        .find(|f| !matches!(**f, "text" | "json" | "all"))
    {
        anyhow::bail!("unknown report format: {unknown} (expected text, json, or all)");
    }

    if all || formats.contains(&"text") {
        let path = tutorgrade_report::text::write_text_report(dir, results, narrative)?;
        println!("Report saved to: {}", path.display());
    }
    if all || formats.contains(&"json") {
        let path = tutorgrade_report::json::write_json_report(dir, results, narrative)?;
        println!("JSON report saved to: {}", path.display());
    }
    Ok(())
}
