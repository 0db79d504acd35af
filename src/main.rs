use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::BufReader;

use cohort_funnel::admin::AdminSession;
use cohort_funnel::api::HttpClient;
use cohort_funnel::cli::Console;
use cohort_funnel::config::{FunnelConfig, normalize_base_url};
use cohort_funnel::funnel::{EntryMode, LaunchpadFunnel, SoulmateFunnel};
use cohort_funnel::store::{LibSqlStore, SessionStore};

#[derive(Parser, Debug)]
#[command(
    name = "cohort-funnel",
    about = "Register for the Soulmate and Couples' Launchpad cohorts from the terminal",
    version
)]
struct Cli {
    /// Override FUNNEL_API_BASE_URL
    #[arg(long, global = true)]
    api_base_url: Option<String>,
    /// Override FUNNEL_DB_PATH
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,
    /// Keep this applicant's progress apart from others sharing the database
    #[arg(long, global = true)]
    session: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the Soulmate registration flow
    Soulmate {
        /// Entry mode; `admin` opens the admin viewer instead of the funnel
        #[arg(long, value_enum)]
        mode: Option<Mode>,
    },
    /// Run the Couples' Launchpad wizard
    Launchpad,
    /// Open the admin viewer
    Admin,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Admin,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the prompts.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = FunnelConfig::from_env().context("Invalid FUNNEL_* configuration")?;
    if let Some(url) = cli.api_base_url.as_deref() {
        config.api_base_url = normalize_base_url(url)?;
    }
    if let Some(path) = cli.db_path {
        config.db_path = path;
    }

    let mut libsql = LibSqlStore::new_local(&config.db_path)
        .await
        .with_context(|| format!("Failed to open session store at {}", config.db_path.display()))?;
    if let Some(session) = cli.session {
        libsql = libsql.with_namespace(session);
    }
    let client = Arc::new(HttpClient::from_config(&config));
    tracing::info!(
        api = %client.base_url(),
        db = %config.db_path.display(),
        session = libsql.namespace(),
        "Cohort funnel starting"
    );
    let store: Arc<dyn SessionStore> = Arc::new(libsql);

    let mut admin = AdminSession::new(client.clone(), store.clone());
    let mut console = Console::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());

    match cli.command {
        Command::Soulmate { mode } => {
            let mode = match mode {
                Some(Mode::Admin) => EntryMode::Admin,
                None => EntryMode::Applicant,
            };
            let funnel = SoulmateFunnel::open(store, client, mode).await;
            console.run_soulmate(&funnel, &mut admin, &config).await?;
        }
        Command::Launchpad => {
            let funnel = LaunchpadFunnel::open(store, client, config.advisory_ttl).await;
            console.run_launchpad(&funnel, &config).await?;
        }
        Command::Admin => console.run_admin(&mut admin).await?,
    }

    Ok(())
}
