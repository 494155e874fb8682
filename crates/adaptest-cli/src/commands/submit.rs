//! The `adaptest submit` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Table};

use adaptest_core::engine::SubmitRequest;
use adaptest_core::estimation::{EstimationMethod, FallbackReason};

pub struct Args {
    pub examinee: String,
    pub course: String,
    pub assignment: String,
    pub answered: Vec<String>,
    pub responses: Vec<u8>,
    pub alpha: Option<f64>,
    pub json: bool,
}

pub async fn execute(args: Args, config: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config)?;
    let engine = super::open_engine(&config)?;

    let request = SubmitRequest {
        examinee_id: args.examinee,
        course_id: args.course,
        assignment_id: args.assignment,
        answered_item_ids: args.answered,
        responses: super::parse_responses(&args.responses)?,
        smoothing_alpha: args.alpha.unwrap_or(config.engine.smoothing_alpha),
    };
    let mut outcome = engine.submit(&request).await?;
    outcome.final_theta = super::round3(outcome.final_theta);
    outcome.updated_stored_theta = super::round3(outcome.updated_stored_theta);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Result".to_string(), outcome.result_id.to_string()]);
    table.add_row(vec![
        "Score".to_string(),
        format!("{}/{}", outcome.correct_count, outcome.total_count),
    ]);
    table.add_row(vec![
        "Session theta".to_string(),
        format!("{:.3}", outcome.final_theta),
    ]);
    table.add_row(vec![
        "Stored theta".to_string(),
        format!("{:.3}", outcome.updated_stored_theta),
    ]);
    table.add_row(vec!["Method".to_string(), describe(outcome.method)]);
    println!("{table}");
    Ok(())
}

fn describe(method: EstimationMethod) -> String {
    match method {
        EstimationMethod::MaximumLikelihood => "maximum likelihood".to_string(),
        EstimationMethod::Fallback(FallbackReason::InsufficientHistory) => {
            "fallback (short history)".to_string()
        }
        EstimationMethod::Fallback(FallbackReason::Degraded(failure)) => {
            format!("fallback ({failure:?})")
        }
    }
}
