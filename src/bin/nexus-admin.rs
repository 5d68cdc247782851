//! Creates the `admin` user.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use resource_nexus::auth::create_admin;
use resource_nexus::config::{load_config, LogFormat, LoggingConfig};
use resource_nexus::observability::logging;
use resource_nexus::store::PgStore;

#[derive(Parser)]
#[command(
    name = "nexus-admin",
    version,
    about = "Bootstrap the resource-nexus administrator account"
)]
struct Cli {
    /// Config file (TOML). Defaults apply when it does not exist.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Password for the `admin` user.
    #[arg(long, env = "NEXUS_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: String,
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli.config)?;

    let store = PgStore::connect_lazy(&config.database)?;
    store.ensure_schema().await?;
    let result = create_admin(&store, &cli.admin_password, &config.security.password_hashing).await;
    store.close().await;
    result?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let stdout = LoggingConfig {
        level: "info".to_string(),
        format: LogFormat::Json,
    };
    if let Err(e) = logging::init(&stdout) {
        eprintln!("failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "failed to create administrator");
            ExitCode::FAILURE
        }
    }
}
