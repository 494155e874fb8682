//! adaptest CLI: Run adaptive testing sessions from the command line.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "adaptest", version, about = "Computerized adaptive testing engine")]
struct Cli {
    /// Config file path (default: ./adaptest.toml, then ~/.config/adaptest/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and an example question bank
    Init,

    /// Validate question bank JSON files
    Validate {
        /// Bank file or directory (default: bank_dir from config)
        #[arg(long)]
        bank: Option<PathBuf>,
    },

    /// Pick the next question for a running session
    Next {
        #[arg(long)]
        examinee: String,

        #[arg(long)]
        course: String,

        #[arg(long)]
        assignment: String,

        /// Item ids answered so far, in order (comma-separated)
        #[arg(long, value_delimiter = ',')]
        answered: Vec<String>,

        /// Responses aligned with --answered: 1 correct, 0 incorrect (comma-separated)
        #[arg(long, value_delimiter = ',')]
        responses: Vec<u8>,

        /// Running ability estimate held by the client
        #[arg(long, allow_hyphen_values = true)]
        theta: Option<f64>,

        /// Seed for item selection (overrides config)
        #[arg(long)]
        seed: Option<u64>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Finalize a session and update the stored ability
    Submit {
        #[arg(long)]
        examinee: String,

        #[arg(long)]
        course: String,

        #[arg(long)]
        assignment: String,

        /// Item ids answered, in order (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        answered: Vec<String>,

        /// Responses aligned with --answered (comma-separated 1/0)
        #[arg(long, value_delimiter = ',', required = true)]
        responses: Vec<u8>,

        /// Smoothing weight of the session estimate (default: from config)
        #[arg(long)]
        alpha: Option<f64>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show stored abilities
    Ability {
        /// Only this examinee
        #[arg(long)]
        examinee: Option<String>,

        /// Only this course
        #[arg(long)]
        course: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("adaptest=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { bank } => commands::validate::execute(bank, config),
        Commands::Next {
            examinee,
            course,
            assignment,
            answered,
            responses,
            theta,
            seed,
            json,
        } => {
            commands::next::execute(
                commands::next::Args {
                    examinee,
                    course,
                    assignment,
                    answered,
                    responses,
                    theta,
                    seed,
                    json,
                },
                config,
            )
            .await
        }
        Commands::Submit {
            examinee,
            course,
            assignment,
            answered,
            responses,
            alpha,
            json,
        } => {
            commands::submit::execute(
                commands::submit::Args {
                    examinee,
                    course,
                    assignment,
                    answered,
                    responses,
                    alpha,
                    json,
                },
                config,
            )
            .await
        }
        Commands::Ability {
            examinee,
            course,
            json,
        } => commands::ability::execute(examinee, course, json, config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
