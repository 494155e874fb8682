//! The `adaptest validate` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_store::bank::{self, Severity};

pub fn execute(bank_path: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let bank_path = match bank_path {
        Some(p) => p,
        None => super::load_config(config)?.bank_dir,
    };

    let banks = if bank_path.is_dir() {
        bank::load_bank_directory(&bank_path)?
    } else {
        vec![bank::parse_bank(&bank_path)?]
    };

    let mut warnings = 0;
    let mut errors = 0;

    for b in &banks {
        let eligible = b.eligible_items().len();
        println!(
            "Assignment: {} ({} questions, {eligible} eligible)",
            b.assignment_id,
            b.entries.len()
        );

        for issue in bank::validate_bank(b) {
            let prefix = issue
                .item_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            let label = match issue.severity {
                Severity::Warning => {
                    warnings += 1;
                    "WARNING"
                }
                Severity::Error => {
                    errors += 1;
                    "ERROR"
                }
            };
            println!("{prefix} {label}: {}", issue.message);
        }
    }

    if warnings == 0 && errors == 0 {
        println!("All banks valid.");
    } else {
        println!("\n{errors} error(s), {warnings} warning(s) found.");
    }

    if errors > 0 {
        anyhow::bail!("{errors} bank error(s)");
    }
    Ok(())
}
