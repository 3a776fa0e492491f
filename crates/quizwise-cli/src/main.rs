//! quizwise CLI: timed, adaptive multiple-choice quizzes from the terminal.
//!
//! Each invocation is one request against the client's stored session.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use quizwise_core::session::Navigation;

mod commands;
mod render;

#[derive(Parser)]
#[command(name = "quizwise", version, about = "Adaptive multiple-choice quizzes")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Client identity; each client has its own quiz session
    #[arg(long, global = true, default_value = "default")]
    client: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and sample question bank
    Init,

    /// Validate a question bank file
    Validate {
        /// Bank file (defaults to the configured bank)
        #[arg(long)]
        bank: Option<PathBuf>,
    },

    /// Start a new quiz (the current one must be completed or reset)
    Start {
        /// Number of questions
        #[arg(long)]
        questions: Option<u32>,

        /// Time limit in minutes for exam mode (0 = untimed)
        #[arg(long)]
        minutes: Option<u32>,

        /// Quiz mode: exam or practice
        #[arg(long)]
        mode: Option<String>,

        /// When to show per-question results: immediate or end
        #[arg(long)]
        show_results: Option<String>,

        /// Reveal the correct answers
        #[arg(long)]
        reveal: bool,
    },

    /// Show the current page or the final report
    Show,

    /// Answer questions, e.g. `answer 1=Paris 2=b`
    Answer {
        /// POSITION=CHOICE pairs; CHOICE is the choice text or its letter
        #[arg(required = true)]
        answers: Vec<String>,
    },

    /// Go to the next page
    Next,

    /// Go to the previous page
    Prev,

    /// Jump to a page or to the page holding a question
    Goto {
        /// Page number
        #[arg(long, conflicts_with = "question", required_unless_present = "question")]
        page: Option<usize>,

        /// Question position
        #[arg(long)]
        question: Option<usize>,
    },

    /// Submit the quiz for grading
    Finish,

    /// Show the report of a completed quiz
    Report {
        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Discard the current quiz
    Reset,

    /// Show per-question performance statistics
    Stats {
        /// Number of weakest questions to list
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quizwise=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let client = cli.client.as_str();

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { bank } => commands::validate::execute(bank, config),
        Commands::Start {
            questions,
            minutes,
            mode,
            show_results,
            reveal,
        } => commands::quiz::start(
            config,
            client,
            commands::quiz::StartOptions {
                questions,
                minutes,
                mode,
                show_results,
                reveal,
            },
        ),
        Commands::Show => commands::quiz::show(config, client),
        Commands::Answer { answers } => commands::quiz::answer(config, client, &answers),
        Commands::Next => commands::quiz::navigate(config, client, Navigation::Next),
        Commands::Prev => commands::quiz::navigate(config, client, Navigation::Prev),
        Commands::Goto { page, question } => match (page, question) {
            (Some(p), _) => commands::quiz::navigate(config, client, Navigation::Page(p)),
            (None, Some(q)) => commands::quiz::navigate(config, client, Navigation::Question(q)),
            (None, None) => Err(anyhow::anyhow!("goto needs --page or --question")),
        },
        Commands::Finish => commands::quiz::finish(config, client),
        Commands::Report { format } => commands::quiz::report(config, client, &format),
        Commands::Reset => commands::quiz::reset(config, client),
        Commands::Stats { limit } => commands::stats::execute(config, limit),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
