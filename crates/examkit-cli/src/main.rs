//! examkit CLI — the instructor-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "examkit", version, about = "Exam scoring and grading toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate exam definition TOML files
    Validate {
        /// Path to an exam file or directory
        #[arg(long)]
        exam: PathBuf,
    },

    /// Score a response set offline
    Score {
        /// Path to the exam TOML
        #[arg(long)]
        exam: PathBuf,

        /// Path to the responses JSON (question id -> answer)
        #[arg(long)]
        responses: PathBuf,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Reconcile manual marks into a final grade
    Grade {
        /// Path to the exam TOML
        #[arg(long)]
        exam: PathBuf,

        /// Path to the responses JSON
        #[arg(long)]
        responses: PathBuf,

        /// Path to the manual marks JSON (question id -> {points, feedback})
        #[arg(long)]
        marks: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Render a saved attempt report
    Report {
        /// Path to the attempt report JSON
        #[arg(long)]
        attempt: PathBuf,

        /// Output format: text, markdown, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create starter config and an example exam
    Init,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("examkit=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { exam } => commands::validate::execute(exam),
        Commands::Score {
            exam,
            responses,
            format,
        } => commands::score::execute(exam, responses, format),
        Commands::Grade {
            exam,
            responses,
            marks,
            format,
        } => commands::grade::execute(exam, responses, marks, format),
        Commands::Report { attempt, format } => commands::report::execute(attempt, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
