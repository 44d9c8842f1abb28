//! Gatehouse - admin console login gate CLI

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;

use gatehouse::{
    provider::ProviderConfig, GateConfig, GateResult, HttpIdentityProvider, LockoutStatus,
};
use gatehouse_core::format_remaining;

/// Gatehouse - brute-force-resistant admin login
#[derive(Parser)]
#[command(name = "gatehouse")]
#[command(about = "Lockout-guarded, single-identity login gate for the admin console")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (defaults to $GATEHOUSE_CONFIG or the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a new config file
    Init {
        /// The only identity allowed into the admin console
        #[arg(long)]
        privileged_identity: String,

        /// Auth service base URL
        #[arg(long)]
        base_url: String,

        /// Auth service public API key
        #[arg(long)]
        api_key: String,

        /// Consecutive failures before lockout
        #[arg(long, default_value = "5")]
        max_attempts: u32,

        /// Lockout duration in seconds
        #[arg(long, default_value = "900")]
        lockout_secs: u64,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Attempt an admin login
    Login {
        /// Identity (email) to sign in as
        #[arg(long)]
        identity: String,

        /// Read the credential from this environment variable instead of stdin
        #[arg(long)]
        credential_env: Option<String>,

        /// Print the session access token to stdout on success
        #[arg(long)]
        print_token: bool,
    },

    /// Show the current lockout status
    Status,

    /// Wait for an active lockout to expire, showing a countdown
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatehouse=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(GateConfig::default_path);

    match cli.command {
        Commands::Init {
            privileged_identity,
            base_url,
            api_key,
            max_attempts,
            lockout_secs,
            force,
        } => {
            if config_path.exists() && !force {
                error!("Config already exists at {:?}. Use --force to overwrite.", config_path);
                return Ok(ExitCode::FAILURE);
            }

            let mut config = GateConfig::new(
                privileged_identity,
                ProviderConfig {
                    base_url,
                    api_key,
                    ..Default::default()
                },
            );
            config.max_attempts = max_attempts;
            config.lockout_duration_secs = lockout_secs;
            config.validate()?;
            config.save(&config_path)?;

            info!("Wrote config to {:?}", config_path);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Login {
            identity,
            credential_env,
            print_token,
        } => {
            let config = GateConfig::load(&config_path)?;
            let provider = Arc::new(HttpIdentityProvider::new(&config.provider)?);
            let gate = config.build_gate(provider)?;

            let credential = read_credential(credential_env.as_deref())?;
            let result = gate.attempt_login(&identity, &credential).await?;
            println!("{}", result);

            match result {
                GateResult::Authorized { session } => {
                    if print_token {
                        println!("{}", session.access_token.as_str());
                    }
                    Ok(ExitCode::SUCCESS)
                }
                GateResult::Locked { .. } => {
                    println!("Run `gatehouse watch` to wait for the lockout to end.");
                    Ok(ExitCode::FAILURE)
                }
                _ => Ok(ExitCode::FAILURE),
            }
        }

        Commands::Status => {
            let config = GateConfig::load(&config_path)?;
            print_status(&config.lockout_timer()?.tick()?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Watch => {
            let config = GateConfig::load(&config_path)?;
            let mut handle = config.lockout_timer()?.spawn();
            let mut status = *handle.status.borrow();
            print_status(&status);

            while status.is_locked() {
                if handle.status.changed().await.is_err() {
                    break;
                }
                status = *handle.status.borrow();
                print_status(&status);
            }

            handle.task.await??;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_status(status: &LockoutStatus) {
    match status {
        LockoutStatus::Open {
            attempts_remaining, ..
        } => println!("Open: {} attempts remaining", attempts_remaining),
        LockoutStatus::Locked { remaining } => {
            println!("Locked: {} remaining", format_remaining(*remaining))
        }
    }
}

fn read_credential(env_var: Option<&str>) -> anyhow::Result<Zeroizing<String>> {
    if let Some(name) = env_var {
        let value = std::env::var(name)
            .map_err(|_| anyhow::anyhow!("Environment variable {} is not set", name))?;
        return Ok(Zeroizing::new(value));
    }

    let mut line = Zeroizing::new(String::new());
    std::io::stdin().lock().read_line(&mut line)?;
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}
