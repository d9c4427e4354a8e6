//! Court monitor CLI
//!
//! `serve` runs the scheduler, the bot poller and the HTTP API in one
//! process; the other commands are one-shot.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use court_monitor::{
    config::{DEFAULT_CONFIG_PATH, EffectiveSettings, load_config},
    error::{AppError, Result},
    models::Config,
    notify::{BotChannel, BotCommands, BotService, DigestSender, Dispatcher, TelegramApi, WebhookChannel},
    pipeline::{Orchestrator, RunOutcome},
    scheduler::{RunController, Scheduler},
    services::CourtClient,
    storage::Database,
    utils::{dates::local_date, log::summary},
};

/// Court monitor - hearing and ruling watcher for court portals
#[derive(Parser, Debug)]
#[command(name = "court-monitor", version, about = "Court hearing and ruling monitor")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler, the bot poller and the HTTP API
    Serve,

    /// Run one check now and send notifications
    Run,

    /// Render the weekly digest and send it, or write it to a file
    Digest {
        /// Write the rendered digest here instead of sending it
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration
    Validate,

    /// Show store counters and the latest attempts
    Status,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Everything the long-running and one-shot commands share.
struct App {
    config: Arc<Config>,
    db: Database,
    bot: Option<Arc<BotChannel>>,
    controller: Arc<RunController>,
}

impl App {
    fn build(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let db = Database::open(&config.store.database_path)?;
        log::info!("Database at {}", config.store.database_path);

        let bot = match config.telegram.credentials() {
            Some((token, chat_id)) => {
                let api = TelegramApi::new(&config.telegram, token)?;
                Some(Arc::new(BotChannel::new(
                    api,
                    chat_id,
                    config.notify.detail_threshold,
                )))
            }
            None => {
                log::warn!("Telegram not configured, bot notifications disabled");
                None
            }
        };

        let mut dispatcher = Dispatcher::new();
        if let Some(bot) = &bot {
            dispatcher = dispatcher.with_channel(bot.clone());
        }
        dispatcher = dispatcher.with_channel(Arc::new(WebhookChannel::new(
            db.clone(),
            &config.webhook,
        )?));

        let source = Arc::new(CourtClient::new(Arc::clone(&config))?);
        let orchestrator = Orchestrator::new(db.clone(), source, &config);
        let controller = RunController::new(orchestrator, dispatcher);

        Ok(Self {
            config,
            db,
            bot,
            controller,
        })
    }

    fn digest(&self) -> DigestSender {
        DigestSender::new(self.db.clone(), Arc::clone(&self.config), self.bot.clone())
    }
}

async fn serve(app: App) -> Result<()> {
    let settings = EffectiveSettings::load(&app.db, &app.config)?;
    let scheduler = Scheduler::start(
        Arc::clone(&app.controller),
        Arc::new(app.digest()),
        &settings,
    )
    .await?;

    if let Some(bot) = &app.bot {
        let commands = BotCommands::new(
            app.db.clone(),
            Arc::clone(&app.controller),
            Arc::clone(&app.config),
        );
        let service = BotService::new(
            bot.api().clone(),
            bot.chat_id(),
            commands,
            app.config.telegram.poll_timeout_secs,
        );
        tokio::spawn(service.run());
    }

    #[cfg(feature = "server")]
    {
        let state = court_monitor::api::AppState::new(
            app.db.clone(),
            Arc::clone(&app.config),
            Arc::clone(&app.controller),
        );
        tokio::select! {
            served = court_monitor::api::serve(state) => served?,
            _ = tokio::signal::ctrl_c() => log::info!("Shutting down"),
        }
    }

    #[cfg(not(feature = "server"))]
    {
        tokio::signal::ctrl_c().await?;
        log::info!("Shutting down");
    }

    scheduler.shutdown().await
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Court monitor starting...");
    let config = load_config(&cli.config)?;
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Serve => serve(App::build(config)?).await?,

        Command::Run => {
            let app = App::build(config)?;
            match app.controller.run_and_dispatch().await? {
                RunOutcome::Completed(report) => {
                    if !report.errors.is_empty() {
                        log::warn!("{} request(s) failed", report.errors.len());
                    }
                }
                RunOutcome::Skipped => log::info!("A run is already in progress"),
            }
        }

        Command::Digest { output } => {
            let app = App::build(config)?;
            let digest = app.digest();
            match output {
                Some(path) => {
                    let (_, document) = digest.build(Utc::now())?;
                    std::fs::write(&path, document.to_text())?;
                    log::info!(
                        "Digest written to {} ({} pages)",
                        path.display(),
                        document.page_count()
                    );
                }
                None => {
                    if !digest.send(Utc::now()).await? {
                        return Err(AppError::config(
                            "Telegram is not configured; use --output to write the digest",
                        ));
                    }
                }
            }
        }

        // load_config already validated; reaching here means it passed
        Command::Validate => {
            log::info!("✓ Config OK ({} courts)", config.courts.len());
            if let Err(e) = config.timezone() {
                log::error!("Timezone check failed: {}", e);
                return Err(e);
            }
            log::info!("All validations passed!");
        }

        Command::Status => {
            let db = Database::open(&config.store.database_path)?;
            let today = local_date(Utc::now(), config.timezone()?);
            let stats = db.dashboard_stats(today, Utc::now())?;
            summary(
                "Store",
                &[
                    ("Active subjects", stats.subjects.to_string()),
                    ("Hearings", db.count_hearings()?.to_string()),
                    ("Upcoming", stats.upcoming.to_string()),
                    ("Today", stats.today.to_string()),
                    ("Tomorrow", stats.tomorrow.to_string()),
                    ("New (24h)", stats.new_24h.to_string()),
                    ("Changes (24h)", stats.changes_24h.to_string()),
                    (
                        "Last check",
                        stats
                            .last_check
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| "never".to_string()),
                    ),
                ],
            );
            for entry in db.list_run_log(1, 5)?.data {
                log::info!(
                    "  {} {} @ {}: {} found, {} new{}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.subject_name.as_deref().unwrap_or("?"),
                    entry.court_code,
                    entry.found,
                    entry.new_count,
                    entry
                        .error
                        .as_deref()
                        .map(|e| format!(" ({e})"))
                        .unwrap_or_default()
                );
            }
        }
    }

    log::info!("Done!");
    Ok(())
}
