pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "pairadox",
    about = "Pairadox operator CLI",
    long_about = "Inspect configuration, check readiness, apply migrations, and run offline substitute predictions.",
    after_help = "Examples:\n  pairadox doctor --json\n  pairadox config\n  pairadox predict --catalog catalog.csv 1001 --feedback 1001=1002"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity, and schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Rank substitutes for a product using a catalog file, without the server")]
    Predict {
        #[arg(long, help = "Delimited catalog export with a header row")]
        catalog: PathBuf,
        #[arg(help = "Code of the out-of-stock product")]
        product: String,
        #[arg(
            long = "feedback",
            value_name = "SOURCE=SUBSTITUTE",
            help = "Observed substitution to learn before predicting (repeatable)"
        )]
        feedback: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Predict { catalog, product, feedback } => {
            commands::predict::run(&commands::predict::PredictArgs { catalog, product, feedback })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
