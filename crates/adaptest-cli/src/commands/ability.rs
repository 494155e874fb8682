//! The `adaptest ability` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use adaptest_store::FileAbilityStore;

#[derive(Serialize)]
struct AbilityView {
    examinee_id: String,
    course_id: String,
    theta: f64,
    version: u64,
    updated_at: String,
}

pub async fn execute(
    examinee: Option<String>,
    course: Option<String>,
    json: bool,
    config: Option<PathBuf>,
) -> Result<()> {
    let config = super::load_config(config)?;
    let store = FileAbilityStore::new(&config.data_dir);

    let rows: Vec<AbilityView> = store
        .all()
        .await?
        .into_iter()
        .filter(|(key, _)| examinee.as_ref().map_or(true, |e| &key.examinee_id == e))
        .filter(|(key, _)| course.as_ref().map_or(true, |c| &key.course_id == c))
        .map(|(key, ability)| AbilityView {
            examinee_id: key.examinee_id,
            course_id: key.course_id,
            theta: super::round3(ability.theta),
            version: ability.version,
            updated_at: ability.updated_at.to_rfc3339(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No stored abilities.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Examinee", "Course", "Theta", "Version", "Updated"]);
    for row in &rows {
        table.add_row(vec![
            row.examinee_id.clone(),
            row.course_id.clone(),
            format!("{:.3}", row.theta),
            row.version.to_string(),
            row.updated_at.clone(),
        ]);
    }
    println!("{table}");
    Ok(())
}
