//! Inventory valuer command line entry point.
//!
//! Loads configuration, initialises structured logging, wires the remote
//! sources and local storage into the valuation pipeline, and cancels the
//! run cleanly on Ctrl+C.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use inventory_valuer::config::{
    AppConfig, ChecksConfig, ConfigEdit, CredentialBackend, CredentialsConfig, ProjectConfig,
    SourcesConfig, StorageConfig, SupplementConfig,
};
use inventory_valuer::credentials::{
    CredentialName, CredentialStore, EnvCredentialStore, FileCredentialStore,
};
use inventory_valuer::duration::{format_duration, parse_duration};
use inventory_valuer::engine::{
    remaining_cooldown, FailurePolicy, PipelineSources, PipelineStorage, RunOptions,
    ValuationPipeline,
};
use inventory_valuer::report::to_major_units;
use inventory_valuer::sources::{
    AccountStatusSource, CsFloatClient, SteamInventoryClient, SteamWebApiClient,
};
use inventory_valuer::storage::{
    load_supplement, JsonHistoryLedger, JsonSnapshotSink, RunHistoryLedger,
};
use inventory_valuer::types::CURRENCY_LABEL;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "inventory-valuer",
    version,
    about = "Value an item inventory at live median market prices"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Value the configured inventory and store a snapshot
    Run {
        /// Print the valuation table and items without a price
        #[arg(long)]
        print_results: bool,
        /// Fail the run if any item has no price
        #[arg(long)]
        exit_on_no_price: bool,
    },
    /// Write a new configuration file
    Init {
        /// Project name, 4-16 lowercase letters
        #[arg(long)]
        project: String,
        /// Minimum time between runs (e.g. 12h, 1d, 1w2d)
        #[arg(long, value_parser = parse_duration)]
        cooldown: Duration,
        /// 64-bit account id to value
        #[arg(long)]
        account: u64,
        /// JSON file with additional items
        #[arg(long)]
        supplement: Option<PathBuf>,
        #[arg(long)]
        skip_services_check: bool,
        #[arg(long)]
        skip_user_check: bool,
        /// Also value items that are marketable but not tradable
        #[arg(long)]
        skip_untradable_filter: bool,
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage API credentials
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
    /// Show the last run and when the next run is allowed
    History,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Load and validate the configuration
    Validate,
    /// Change individual configuration values
    Edit {
        #[arg(long)]
        project: Option<String>,
        #[arg(long, value_parser = parse_duration)]
        cooldown: Option<Duration>,
        #[arg(long)]
        account: Option<u64>,
        /// JSON file with additional items
        #[arg(long, conflicts_with = "clear_supplement")]
        supplement: Option<PathBuf>,
        /// Stop valuing a supplement file
        #[arg(long)]
        clear_supplement: bool,
        #[arg(long)]
        skip_services_check: Option<bool>,
        #[arg(long)]
        skip_user_check: Option<bool>,
        #[arg(long)]
        skip_untradable_filter: Option<bool>,
    },
    /// Delete the configuration file
    Delete {
        /// Also delete every stored credential
        #[arg(long)]
        secrets: bool,
    },
}

#[derive(Subcommand)]
enum SecretAction {
    /// Store a credential (steam_api_key, csfloat_api_key)
    Set {
        name: CredentialName,
        /// Value to store; read from stdin when omitted
        #[arg(long)]
        value: Option<String>,
    },
    /// Report which credentials are present
    Check,
    /// Remove a stored credential
    Delete { name: CredentialName },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .to_str()
        .context("Config path is not valid UTF-8")?
        .to_string();

    let result = match cli.command {
        Commands::Run {
            print_results,
            exit_on_no_price,
        } => cmd_run(&config_path, print_results, exit_on_no_price).await,
        Commands::Init {
            project,
            cooldown,
            account,
            supplement,
            skip_services_check,
            skip_user_check,
            skip_untradable_filter,
            force,
        } => {
            let cfg = AppConfig {
                project: ProjectConfig {
                    name: project,
                    cooldown,
                    account_id: account,
                },
                checks: ChecksConfig {
                    skip_services_check,
                    skip_user_check,
                    skip_untradable_filter,
                },
                supplement: SupplementConfig { file: supplement },
                storage: StorageConfig::default(),
                credentials: CredentialsConfig::default(),
                sources: SourcesConfig::default(),
            };
            cmd_init(&config_path, &cfg, force)
        }
        Commands::Config { action } => cmd_config(&config_path, action),
        Commands::Secret { action } => cmd_secret(&config_path, action),
        Commands::History => cmd_history(&config_path),
    };

    if let Err(e) = &result {
        error!(error = format!("{e:#}"), "Command failed");
    }
    result
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("inventory_valuer=info"));

    let json_logging = std::env::var("INVENTORY_VALUER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}

fn credential_store(cfg: &AppConfig) -> Box<dyn CredentialStore> {
    match cfg.credentials.backend {
        CredentialBackend::Env => Box::new(EnvCredentialStore::new(&cfg.credentials.env_prefix)),
        CredentialBackend::File => Box::new(FileCredentialStore::in_data_dir(&cfg.storage.data_dir)),
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: &str, print_results: bool, exit_on_no_price: bool) -> Result<()> {
    let cfg = AppConfig::load(config_path)?;
    let store = credential_store(&cfg);
    let timeout = Duration::from_secs(cfg.sources.timeout_secs);

    info!(
        project = %cfg.project.name,
        cooldown = %format_duration(&cfg.project.cooldown),
        account_id = cfg.project.account_id,
        credentials = store.backend(),
        "Starting valuation run"
    );

    let csfloat_key = store
        .load(CredentialName::CsFloatApiKey)
        .context("Price source credential unavailable")?;
    let prices = CsFloatClient::new(&cfg.sources.csfloat_url, csfloat_key, timeout)?;

    let status: Option<Arc<dyn AccountStatusSource>> = if cfg.needs_status_checks() {
        let steam_key = store
            .load(CredentialName::SteamApiKey)
            .context("Account check credential unavailable")?;
        Some(Arc::new(SteamWebApiClient::new(&cfg.sources.steam_api_url, steam_key, timeout)?))
    } else {
        None
    };

    let inventory = SteamInventoryClient::new(&cfg.sources.steam_community_url, timeout)?;

    let supplement = match &cfg.supplement.file {
        Some(path) => Some(load_supplement(path)?),
        None => None,
    };

    let options = RunOptions {
        filter: cfg.filter_policy(),
        failure_policy: if exit_on_no_price {
            FailurePolicy::Strict
        } else {
            FailurePolicy::Tolerant
        },
        skip_services_check: cfg.checks.skip_services_check,
        skip_user_check: cfg.checks.skip_user_check,
        print_results,
    };

    let pipeline = ValuationPipeline::new(
        cfg.project.clone(),
        options,
        supplement,
        PipelineSources {
            inventory: Arc::new(inventory),
            prices: Arc::new(prices),
            status,
        },
        PipelineStorage {
            ledger: Arc::new(JsonHistoryLedger::in_data_dir(&cfg.storage.data_dir)),
            sink: Arc::new(JsonSnapshotSink::in_data_dir(&cfg.storage.data_dir)),
        },
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            on_signal.cancel();
        }
    });

    let summary = pipeline.run(&cancel).await?;

    println!(
        "Run completed successfully: {} items valued at {:.2} {CURRENCY_LABEL} ({} without price)",
        summary.record.total_amount(),
        to_major_units(summary.record.total_value()),
        summary.failures.len()
    );
    println!("Snapshot: {}", summary.snapshot_path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// init / config
// ---------------------------------------------------------------------------

fn cmd_init(config_path: &str, cfg: &AppConfig, force: bool) -> Result<()> {
    if Path::new(config_path).exists() && !force {
        bail!("{config_path} already exists, pass --force to overwrite");
    }
    cfg.save(config_path)?;
    info!(path = config_path, project = %cfg.project.name, "Configuration written");
    println!("Configuration written to {config_path}");
    Ok(())
}

fn cmd_config(config_path: &str, action: ConfigAction) -> Result<()> {
    let cfg = AppConfig::load(config_path)?;
    match action {
        ConfigAction::Show => {
            let rendered = toml::to_string_pretty(&cfg).context("Failed to render config")?;
            println!("{rendered}");
        }
        ConfigAction::Validate => println!("{config_path} is valid"),
        ConfigAction::Edit {
            project,
            cooldown,
            account,
            supplement,
            clear_supplement,
            skip_services_check,
            skip_user_check,
            skip_untradable_filter,
        } => {
            let edit = ConfigEdit {
                project_name: project,
                cooldown,
                account_id: account,
                supplement,
                clear_supplement,
                skip_services_check,
                skip_user_check,
                skip_untradable_filter,
            };
            let updated = cfg.edited(&edit)?;
            updated.save(config_path)?;
            info!(path = config_path, project = %updated.project.name, "Configuration updated");
            println!("Configuration updated");
        }
        ConfigAction::Delete { secrets } => {
            if secrets {
                credential_store(&cfg).delete_all()?;
                println!("All stored credentials deleted");
            }
            std::fs::remove_file(config_path)
                .with_context(|| format!("Failed to delete {config_path}"))?;
            info!(path = config_path, "Configuration deleted");
            println!("{config_path} deleted");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// secret
// ---------------------------------------------------------------------------

fn cmd_secret(config_path: &str, action: SecretAction) -> Result<()> {
    let cfg = AppConfig::load(config_path)?;
    let store = credential_store(&cfg);

    match action {
        SecretAction::Set { name, value } => {
            let value = match value {
                Some(v) => v,
                None => {
                    eprintln!("Enter value for {name}:");
                    let mut line = String::new();
                    std::io::stdin()
                        .lock()
                        .read_line(&mut line)
                        .context("Failed to read credential from stdin")?;
                    line.trim().to_string()
                }
            };
            store.save(name, SecretString::new(value))?;
            println!("{name} saved ({} backend)", store.backend());
        }
        SecretAction::Delete { name } => {
            if store.delete(name)? {
                println!("{name} deleted");
            } else {
                println!("{name} was not stored");
            }
        }
        SecretAction::Check => {
            for name in CredentialName::ALL {
                let state = if store.exists(*name)? { "present" } else { "missing" };
                println!("{name}: {state}");
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// history
// ---------------------------------------------------------------------------

fn cmd_history(config_path: &str) -> Result<()> {
    let cfg = AppConfig::load(config_path)?;
    let ledger = JsonHistoryLedger::in_data_dir(&cfg.storage.data_dir);

    let Some(history) = ledger.read()? else {
        println!("No runs recorded yet");
        return Ok(());
    };
    println!("Last run: {history}");

    if history.project_name != cfg.project.name {
        println!(
            "History belongs to project '{}', configured project is '{}'",
            history.project_name, cfg.project.name
        );
        return Ok(());
    }

    if let Some(last_run) = history.last_run {
        match remaining_cooldown(last_run, cfg.project.cooldown, chrono::Utc::now()) {
            Some(wait) => println!("Next run allowed in {}", format_duration(&wait)),
            None => println!("Next run allowed now"),
        }
    }

    let sink = JsonSnapshotSink::in_data_dir(&cfg.storage.data_dir);
    if let Some(latest) = sink.load_latest(&cfg.project.name)? {
        println!(
            "Latest snapshot: {} items, {:.2} {CURRENCY_LABEL}",
            latest.total_amount(),
            to_major_units(latest.total_value())
        );
    }
    Ok(())
}
