use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use anketa_bot::api::{ApiState, api_routes};
use anketa_bot::attachments::{AttachmentStore, FetcherRegistry};
use anketa_bot::bot::Dispatcher;
use anketa_bot::channels::{ChannelManager, CliChannel, TelegramChannel};
use anketa_bot::config::{BotConfig, SheetsConfig};
use anketa_bot::export::{Exporter, GoogleSheetsSink, HeaderStatus};
use anketa_bot::store::{Database, LibSqlBackend};
use anketa_bot::wizard::WizardManager;

#[derive(Parser, Debug)]
#[command(author, version, about = "Questionnaire bot for job applicants", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the bot (default)
    Run,
    /// Check that the spreadsheet is reachable and has a header row
    CheckSheets {
        /// Write the header row into an empty sheet
        #[arg(long)]
        write_header: bool,
    },
    /// Export every submitted form that has not reached the spreadsheet
    Reconcile,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let command = args.command.unwrap_or(Commands::Run);

    let config = match command {
        Commands::Run => BotConfig::from_env(),
        _ => BotConfig::for_maintenance(|key| std::env::var(key).ok()),
    }
    .context("Invalid configuration")?;

    let _log_guard = init_tracing(config.log_dir.as_deref());

    match command {
        Commands::Run => run(config).await,
        Commands::CheckSheets { write_header } => check_sheets(&config, write_header).await,
        Commands::Reconcile => reconcile(config).await,
    }
}

/// Console logging, plus a daily rolling file when a log directory is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "anketa-bot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}

async fn open_store(config: &BotConfig) -> anyhow::Result<Arc<dyn Database>> {
    let backend = LibSqlBackend::new_local(&config.db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;
    Ok(Arc::new(backend))
}

fn sheets_sink(sheets: &SheetsConfig) -> GoogleSheetsSink {
    let sink = GoogleSheetsSink::new(
        sheets.spreadsheet_id.clone(),
        sheets.range.clone(),
        sheets.access_token.clone(),
        sheets.timeout,
    );
    match &sheets.api_base {
        Some(base) => sink.with_api_base(base.clone()),
        None => sink,
    }
}

async fn run(config: BotConfig) -> anyhow::Result<()> {
    eprintln!("📝 Anketa Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Attachments: {}", config.data_dir.display());
    eprintln!("   Progress layout: {:?}", config.progress_layout);

    let db = open_store(&config).await?;

    // ── Export ──────────────────────────────────────────────────────────
    let exporter = match &config.sheets {
        Some(sheets) => {
            let sink = sheets_sink(sheets);
            if let Err(e) = sink.ensure_header().await {
                tracing::warn!("Spreadsheet not ready, exports will be retried: {e}");
            }
            eprintln!(
                "   Export: Google Sheets {} ({}), reconcile every {}s",
                sheets.spreadsheet_id,
                sheets.range,
                config.reconcile_interval.as_secs()
            );
            Some(Arc::new(Exporter::new(Arc::clone(&db), Arc::new(sink))))
        }
        None => {
            eprintln!("   Export: disabled (GOOGLE_SHEETS_ID not set)");
            None
        }
    };

    // ── Channels ────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();
    let mut fetchers = FetcherRegistry::new();

    if let Some(telegram) = &config.telegram {
        eprintln!(
            "   Telegram: enabled (allowed: {})",
            if telegram.allowed_users.iter().any(|u| u == "*") {
                "everyone".to_string()
            } else {
                telegram.allowed_users.join(", ")
            }
        );
        let mut channel =
            TelegramChannel::new(telegram.bot_token.clone(), telegram.allowed_users.clone());
        if let Some(base) = &telegram.api_base {
            channel = channel.with_api_base(base.clone());
        }
        let channel = Arc::new(channel);
        fetchers.register("telegram", channel.clone());
        channels.add(channel);
    }

    if config.cli_enabled {
        eprintln!("   CLI: enabled (/attach <path> sends a file, /press <token> presses a button)");
        let channel = Arc::new(CliChannel::new());
        fetchers.register("cli", channel.clone());
        channels.add(channel);
    }

    // ── Wizard ──────────────────────────────────────────────────────────
    let mut wizard = WizardManager::new(
        Arc::clone(&db),
        Arc::new(fetchers),
        AttachmentStore::new(&config.data_dir),
    )
    .with_layout(config.progress_layout);
    if let Some(exporter) = &exporter {
        wizard = wizard.with_exporter(Arc::clone(exporter));
    }
    let wizard = Arc::new(wizard);

    // ── Admin API ───────────────────────────────────────────────────────
    if let Some(port) = config.api_port {
        let app = api_routes(ApiState {
            db: Arc::clone(&db),
            wizard: Arc::clone(&wizard),
            exporter: exporter.clone(),
        });
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("Failed to bind admin API port {port}"))?;
        eprintln!("   Admin API: http://0.0.0.0:{port}/api/health");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Admin API stopped: {e}");
            }
        });
    } else {
        eprintln!("   Admin API: disabled");
    }
    eprintln!();

    let mut dispatcher =
        Dispatcher::new(Arc::new(channels), wizard).with_session_idle(config.session_idle);
    if let Some(exporter) = exporter {
        dispatcher = dispatcher.with_exporter(exporter, config.reconcile_interval);
    }
    dispatcher.run().await?;

    Ok(())
}

async fn check_sheets(config: &BotConfig, write_header: bool) -> anyhow::Result<()> {
    let sheets = config
        .sheets
        .as_ref()
        .context("GOOGLE_SHEETS_ID is not set")?;
    let sink = sheets_sink(sheets);

    if write_header && sink.ensure_header().await? {
        println!("Header row written to {}", sheets.range);
        return Ok(());
    }

    match sink.check().await? {
        HeaderStatus::Present => println!("OK: {} has the expected header", sheets.range),
        HeaderStatus::Missing => {
            println!("Sheet is empty; run with --write-header to add the header row")
        }
        HeaderStatus::Mismatch { columns } => {
            println!("Header row has {columns} columns, expected {}", anketa_bot::export::COLUMN_COUNT)
        }
    }
    Ok(())
}

async fn reconcile(config: BotConfig) -> anyhow::Result<()> {
    let sheets = config
        .sheets
        .as_ref()
        .context("GOOGLE_SHEETS_ID is not set")?;
    let db = open_store(&config).await?;
    let exporter = Exporter::new(db, Arc::new(sheets_sink(sheets)));

    let report = exporter.reconcile().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.failed > 0 {
        anyhow::bail!("{} form(s) could not be exported", report.failed);
    }
    Ok(())
}
