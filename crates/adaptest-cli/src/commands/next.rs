//! The `adaptest next` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::engine::NextQuestionRequest;

pub struct Args {
    pub examinee: String,
    pub course: String,
    pub assignment: String,
    pub answered: Vec<String>,
    pub responses: Vec<u8>,
    pub theta: Option<f64>,
    pub seed: Option<u64>,
    pub json: bool,
}

pub async fn execute(args: Args, config: Option<PathBuf>) -> Result<()> {
    let mut config = super::load_config(config)?;
    if args.seed.is_some() {
        config.engine.seed = args.seed;
    }
    let engine = super::open_engine(&config)?;

    let request = NextQuestionRequest {
        examinee_id: args.examinee,
        course_id: args.course,
        assignment_id: args.assignment,
        answered_item_ids: args.answered,
        responses: super::parse_responses(&args.responses)?,
        current_theta: args.theta,
    };
    let mut next = engine.next_question(&request).await?;
    next.temp_theta = super::round3(next.temp_theta);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&next)?);
        return Ok(());
    }

    println!("Question {} (theta {:.3})", next.item_id, next.temp_theta);
    println!("  {}", next.content);
    for choice in &next.choices {
        println!("    {}: {}", choice.id, choice.content);
    }
    Ok(())
}
