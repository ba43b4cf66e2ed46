//! Facegate CLI - live face login, password reset and enrollment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use facegate_core::{ApiConfig, SessionConfig};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod presenter;

use exit_codes::ExitCode;

#[derive(Parser)]
#[command(name = "facegate")]
#[command(author, version, about = "Live face verification for login and password reset", long_about = None)]
#[command(after_help = exit_codes::HELP)]
struct Cli {
    /// Base URL of the account and verification API
    #[arg(long, global = true, env = "FACEGATE_API_URL", value_name = "URL")]
    api_url: Option<String>,

    /// Show debug logs
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print results and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with a password, or with a live face session when no password is given
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: Option<String>,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Reset a password after verifying your face
    Reset {
        #[arg(long)]
        email: String,

        #[arg(long)]
        new_password: String,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Capture a single enrollment picture for registration
    Enroll {
        #[arg(long)]
        email: String,

        /// Password to register alongside the face
        #[arg(long)]
        password: Option<String>,

        /// Write the captured JPEG here
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Register the account with the captured face
        #[arg(long)]
        register: bool,

        /// Capture immediately instead of waiting for Enter
        #[arg(long)]
        now: bool,

        #[command(flatten)]
        camera: CameraArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CameraArgs {
    /// Replay the images of a directory as the camera
    #[arg(long, value_name = "DIR")]
    pub frames: Option<PathBuf>,

    /// Use a synthetic camera and mock services (matches on the third attempt)
    #[arg(long)]
    pub mock: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    #[command(flatten)]
    pub camera: CameraArgs,

    /// Run a precheck before the confirm call
    #[arg(long)]
    pub precheck: bool,

    /// Give up after this many verification requests
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Give up after this many seconds
    #[arg(long, value_name = "SECS")]
    pub max_duration: Option<u64>,

    /// Per-request timeout in seconds (0 waits forever)
    #[arg(long, value_name = "SECS", default_value_t = 15)]
    pub request_timeout: u64,
}

impl SessionArgs {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_precheck(self.precheck)
            .with_max_attempts(self.max_attempts)
            .with_max_duration(self.max_duration.map(Duration::from_secs))
            .with_request_timeout(
                (self.request_timeout > 0).then(|| Duration::from_secs(self.request_timeout)),
            )
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "facegate_cli=debug,facegate_core=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let api = match cli.api_url {
        Some(url) => ApiConfig::from_env().with_base_url(url),
        None => ApiConfig::from_env(),
    };
    let ctx = commands::Context {
        api,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Login {
            email,
            password,
            session,
        } => commands::login::execute(&ctx, email, password, session).await,
        Commands::Reset {
            email,
            new_password,
            session,
        } => commands::reset::execute(&ctx, email, new_password, session).await,
        Commands::Enroll {
            email,
            password,
            output,
            register,
            now,
            camera,
        } => {
            let request = commands::enroll::EnrollRequest {
                email,
                password,
                output,
                register,
                now,
                camera,
            };
            commands::enroll::execute(&ctx, request).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    init_tracing(cli.verbose, cli.quiet);

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };
    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
