//! CLI Module
//!
//! Command-line interface for pinbot using Clap v4.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::archive::{self, RefreshJob};
use crate::command::{Dispatcher, Services, builtin_registry};
use crate::config::Config;
use crate::slack::SlackBot;
use crate::store::{MessageStore, SqliteStore};

/// pinbot - Slack pin keeper and message leaderboards
#[derive(Parser, Debug)]
#[command(name = "pinbot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug mode (writes daily log files)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to Slack and answer mentions (default)
    Run,

    /// Import a Slack workspace export directory into the message archive
    Load {
        /// Directory containing channels.json and one folder per channel
        export_dir: PathBuf,
    },

    /// Archive yesterday's channel history now
    Refresh,

    /// Database operations
    Db {
        #[command(subcommand)]
        operation: DbCommands,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration
    Config {
        /// Show tokens instead of masking them
        #[arg(short, long)]
        show_secrets: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Initialize database
    Init,
    /// Show database statistics
    Stats,
}

/// Main CLI entry point
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        None | Some(Commands::Run) => cmd_run(&config).await,
        Some(Commands::Load { export_dir }) => cmd_load(&config, &export_dir).await,
        Some(Commands::Refresh) => cmd_refresh(&config).await,
        Some(Commands::Db { operation }) => cmd_db(&config, operation).await,
        Some(Commands::Init { force }) => cmd_init(force),
        Some(Commands::Config { show_secrets }) => cmd_config(&config, show_secrets),
    }
}

/// Load configuration from file or defaults
pub fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    config.validate()?;
    Ok(config)
}

async fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::connect(&config.database.path)
        .await
        .with_context(|| format!("Failed to open database {:?}", config.database.path))?;
    Ok(Arc::new(store))
}

fn permalink_base_url(config: &Config) -> Result<&str> {
    let base = config.slack.permalink_base_url.as_str();
    if base.is_empty() {
        anyhow::bail!(
            "slack.permalink_base_url is not set (or PINBOT_PERMALINK_BASE_URL), \
             e.g. https://myteam.slack.com/archives"
        );
    }
    Ok(base)
}

/// Run the bot until Ctrl-C or the listener exits.
async fn cmd_run(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let (bot_token, app_token) = config.slack_tokens()?;
    let bot = SlackBot::new(bot_token, app_token)?;
    let bot_user_id = bot
        .resolve_bot_user_id(config.slack.bot_user_id.clone())
        .await;

    let services = Services {
        slack: bot.api(),
        pins: store.clone(),
        messages: store.clone(),
    };

    let registry = builtin_registry().context("Invalid command table")?;
    let dispatcher = Dispatcher::new(
        registry,
        config.commands.default_sub_commands(),
        config.commands.settings(),
    )
    .with_bot_user_id(bot_user_id.as_deref());

    let refresh = if config.archive.refresh_enabled {
        let base = permalink_base_url(config)?;
        let job = RefreshJob::new(services.slack.clone(), store.clone(), base);
        Some(job.spawn_daily(config.archive.refresh_hour))
    } else {
        tracing::info!("Archive refresh disabled");
        None
    };

    let listener = bot.start(dispatcher, services, bot_user_id);

    tokio::select! {
        result = listener => {
            if let Err(e) = result {
                tracing::error!("Slack listener task failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    if let Some(refresh) = refresh {
        refresh.abort();
    }
    Ok(())
}

async fn cmd_load(config: &Config, export_dir: &std::path::Path) -> Result<()> {
    let base = permalink_base_url(config)?;
    let store = open_store(config).await?;

    println!("📥 Loading export from {}", export_dir.display());
    let report = archive::load_export(export_dir, base, store.as_ref()).await?;

    println!(
        "✅ Archived {} messages ({} new) from {} channels, {} files",
        report.archived, report.inserted, report.channels, report.files
    );
    if !report.skipped_dirs.is_empty() {
        println!("⚠️  Skipped unknown channels: {}", report.skipped_dirs.join(", "));
    }
    Ok(())
}

async fn cmd_refresh(config: &Config) -> Result<()> {
    let base = permalink_base_url(config)?;
    let store = open_store(config).await?;
    let (bot_token, app_token) = config.slack_tokens()?;
    let bot = SlackBot::new(bot_token, app_token)?;

    let job = RefreshJob::new(bot.api(), store, base);
    let report = job.refresh_previous_day(&chrono::Local::now()).await?;

    println!(
        "✅ Archived {} messages ({} new) from {} channels, {} failed",
        report.archived, report.inserted, report.channels, report.failed_channels
    );
    Ok(())
}

/// Database operations
async fn cmd_db(config: &Config, operation: DbCommands) -> Result<()> {
    match operation {
        DbCommands::Init => {
            println!("🗄️  Initializing database...");
            let store = open_store(config).await?;
            store.run_migrations().await?;
            println!(
                "✅ Database initialized at: {}",
                config.database.path.display()
            );
            Ok(())
        }
        DbCommands::Stats => {
            println!("📊 Database Statistics\n");
            let store = open_store(config).await?;
            println!("Pins: {}", store.pin_count().await?);
            println!("Archived messages: {}", store.count().await?);
            Ok(())
        }
    }
}

/// Write a default configuration file
fn cmd_init(force: bool) -> Result<()> {
    let config_path = Config::system_config_path();

    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at: {}\nUse --force to overwrite",
            config_path.display()
        );
    }

    Config::default().save(&config_path)?;

    println!("✅ Configuration initialized at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set SLACK_BOT_TOKEN and SLACK_APP_TOKEN (or edit the file)");
    println!("   2. Set slack.permalink_base_url to https://<team>.slack.com/archives");
    println!("   3. Run 'pinbot' to start");

    Ok(())
}

/// Show configuration
fn cmd_config(config: &Config, show_secrets: bool) -> Result<()> {
    let shown = if show_secrets {
        config.clone()
    } else {
        config.redacted()
    };
    let toml = toml::to_string_pretty(&shown).context("Failed to serialize config")?;
    println!("{}", toml);

    if !show_secrets {
        println!("💡 Use --show-secrets to display tokens");
    }
    Ok(())
}
