//! The `tutorgrade backends` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use tutorgrade_providers::config::load_config_from;

pub fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let backends = config.backends();

    if backends.is_empty() {
        println!(
            "No backends configured. Set DASHSCOPE_API_KEY or GOOGLE_API_KEY, or run `tutorgrade init`."
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Name", "Type", "Model", "API key", "Default"]);
    for (name, backend) in backends {
        let key = match backend.has_api_key() {
            Some(true) => "set",
            Some(false) => "missing",
            None => "-",
        };
        let default = if name == config.default_backend { "*" } else { "" };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(backend.kind()),
            Cell::new(backend.model()),
            Cell::new(key),
            Cell::new(default),
        ]);
    }
    println!("{table}");

    Ok(())
}
