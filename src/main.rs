//! Formgate CLI
//!
//! Headless driver for the form engine.
//!
//! # Usage
//!
//! ```bash
//! formgate show 8b9f0c1e-...
//! formgate fill 8b9f0c1e-... --answers answers.json --file q-cv=./cv.pdf --code ABC123
//! formgate fill 8b9f0c1e-... --ai "I'm Ada, I agree to the terms" --dry-run
//! formgate resend-code --email ada@example.com
//! formgate config init --base-url https://forms.example.com/api
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "formgate")]
#[command(version)]
#[command(about = "Fill and submit access-code gated forms", long_about = None)]
struct Cli {
    /// Backend base URL
    #[arg(long, env = "FORMGATE_BASE_URL")]
    base_url: Option<String>,

    /// Profile name from config file
    #[arg(long, short)]
    profile: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "text")]
    format: cli::output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a form's questions as they would be rendered
    Show { form_id: String },
    /// Fill a form and submit it
    Fill(FillArgs),
    /// E-mail the access code again
    ResendCode {
        #[arg(long)]
        email: String,
    },
    /// Configure CLI
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(clap::Args)]
pub struct FillArgs {
    form_id: String,
    /// JSON object mapping question id to answer
    #[arg(long)]
    answers: Option<PathBuf>,
    /// Attach a file: QUESTION_ID=PATH
    #[arg(long = "file", value_name = "QUESTION_ID=PATH")]
    files: Vec<String>,
    /// Describe your answers in plain language and let the server draft them
    #[arg(long)]
    ai: Option<String>,
    /// Access code; prompted for when omitted
    #[arg(long, env = "FORMGATE_CODE")]
    code: Option<String>,
    /// Print the assembled responses instead of sending them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a profile file
    Init {
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let profile = cli::profile::Profile::load(cli.profile.as_deref()).unwrap_or_else(|e| {
        eprintln!("Warning: ignoring profile: {}", e);
        Default::default()
    });
    // defaults < profile < FORMGATE_* env < flags
    let mut config = match profile.client_config().overlay_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }

    formgate_client::telemetry::init_tracing(&config.log_level);

    let result = match cli.command {
        Commands::Show { form_id } => cli::commands::show(&config, &form_id, cli.format).await,
        Commands::Fill(args) => cli::commands::fill(&config, args, cli.format).await,
        Commands::ResendCode { email } => cli::commands::resend_code(&config, &email).await,
        Commands::Config { action } => match action {
            ConfigCommands::Init { base_url } => {
                cli::profile::init(cli.profile.as_deref(), base_url.or(cli.base_url))
            }
            ConfigCommands::Show => {
                cli.format.print(&config);
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
