//! CLI entry and dispatch.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use keyline_core::client::AuthClient;
use keyline_core::config;
use keyline_core::controller::SessionController;
use keyline_core::store::FileStore;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;

/// Environment variable holding the tracing filter directive.
const LOG_ENV: &str = "KEYLINE_LOG";

#[derive(Parser)]
#[command(name = "keyline")]
#[command(version)]
#[command(about = "Register, log in and manage your account from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL (overrides KEYLINE_API_URL and the config file)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Create a new account
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long, env = "KEYLINE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Read from stdin when omitted
        #[arg(long)]
        confirm_password: Option<String>,
    },

    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long, env = "KEYLINE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Log out and clear the stored session
    Logout,

    /// Show the cached profile, then refresh it from the backend
    Profile,

    /// Show whether a session is stored
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Save the backend base URL to the config file
    SetUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli { command, api_url } = cli;

    let connect = || -> Result<SessionController> {
        let config = config::Config::load().context("load config")?;
        session_controller(&config, api_url.as_deref())
    };

    match command {
        Commands::Register {
            first_name,
            last_name,
            email,
            password,
            confirm_password,
        } => {
            commands::auth::register(
                &connect()?,
                commands::auth::RegisterArgs {
                    first_name: &first_name,
                    last_name: &last_name,
                    email: &email,
                    password,
                    confirm_password,
                },
            )
            .await
        }
        Commands::Login { email, password } => {
            commands::auth::login(&connect()?, &email, password).await
        }
        Commands::Logout => commands::auth::logout(&connect()?).await,
        Commands::Profile => commands::profile::show(&connect()?).await,
        Commands::Status => commands::auth::status(&connect()?),

        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetUrl { url } => commands::config::set_url(&url),
        },
    }
}

fn session_controller(
    config: &config::Config,
    api_url_override: Option<&str>,
) -> Result<SessionController> {
    let base_url = match api_url_override.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => {
            config::validate_url(url)?;
            url.to_string()
        }
        None => config.effective_api_url()?,
    };
    debug!(api_url = %base_url, "resolved backend");

    let client = AuthClient::new(base_url, config.request_timeout())?;
    let store = Arc::new(FileStore::open_default());
    Ok(SessionController::new(client, store)
        .with_clear_on_unauthorized(config.clear_session_on_unauthorized))
}
