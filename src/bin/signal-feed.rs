// Signal Feed - operator CLI
// Inspect, watch and maintain the shared trading-signal dataset

use clap::{Parser, Subcommand};
use signal_feed::{
    ActionFilter, BroadcastNotifier, ClearOutcome, Confidence, Config, ConfigError, Confirmation,
    Dashboard, DashboardView, DataVersionWatcher, Database, FeedError, FeedResult, FilterCriteria,
    NewSignal, ResubscribePolicy, SessionFilter, Settings, SettingsStore, SqliteRecordStore,
    SqliteStorage,
};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "signal-feed")]
#[command(version)]
#[command(about = "Live trading-signal feed, filters and statistics", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "feed.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the database schema
    Init,

    /// List signals, most recent first
    List {
        /// Case-insensitive pair substring (e.g. "eur")
        #[arg(short, long, default_value = "")]
        search: String,

        /// all | buy | sell
        #[arg(short, long, default_value = "all")]
        action: ActionFilter,

        /// all | asian | london | "new york"
        #[arg(long, default_value = "all")]
        session: SessionFilter,
    },

    /// Show summary statistics and dataset size
    Stats,

    /// Follow the dataset and print statistics on every change
    Watch,

    /// Store a signal (stand-in for the external generator)
    Add {
        /// Instrument, e.g. EUR/USD
        pair: String,

        /// buy | sell
        #[arg(short, long)]
        action: signal_feed::Action,

        /// 0-100
        #[arg(long)]
        confidence: u8,

        /// asian | london | "new york"
        #[arg(long)]
        session: signal_feed::Session,
    },

    /// Settings management
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Delete every signal from the database
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Print the stored settings
    Show,

    /// Change one or more settings
    Set {
        #[arg(long)]
        telegram: Option<bool>,

        #[arg(long)]
        auto_mode: Option<bool>,

        /// 70-99
        #[arg(long)]
        threshold: Option<u32>,

        /// Minutes between generated signals, 1-15
        #[arg(long)]
        frequency: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Init runs before a config exists
    let config = match &cli.command {
        Commands::Init => Config::default().with_env_overrides(),
        _ => load_config_or_exit(&cli.config),
    };

    // Setup logging first so command failures are visible
    let log_level = if cli.verbose { "debug".to_string() } else { config.logging.level.clone() };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("📡 Signal Feed v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Init => init_workspace(&cli.config).await,
        Commands::List { search, action, session } => {
            let criteria = FilterCriteria { search_term: search, action, session };
            list_signals(&config, criteria).await
        }
        Commands::Stats => show_stats(&config).await,
        Commands::Watch => watch_signals(&config).await,
        Commands::Add { pair, action, confidence, session } => {
            add_signal(&config, pair, action, confidence, session).await
        }
        Commands::Settings(cmd) => handle_settings_command(cmd, &config),
        Commands::Clear { yes } => clear_signals(&config, yes).await,
    };

    if let Err(e) = result {
        error!("❌ {}", e.user_message());
        std::process::exit(1);
    }

    Ok(())
}

/// Load config or exit with helpful error message
fn load_config_or_exit(path: &str) -> Config {
    match Config::from_file(path) {
        Ok(config) => config.with_env_overrides(),
        Err(ConfigError::FileNotFound(_)) => {
            eprintln!("⚠️  {} not found, using defaults (run: signal-feed init)", path);
            Config::default().with_env_overrides()
        }
        Err(e) => {
            eprintln!("❌ Configuration Error");
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn open_database(config: &Config) -> FeedResult<Database> {
    let db = Database::new(&config.database.path)?;
    db.run_migrations()?;
    Ok(db)
}

async fn open_dashboard(config: &Config, db: &Database, notifier: BroadcastNotifier) -> Dashboard {
    let store = SqliteRecordStore::new(db.clone());
    let storage = SqliteStorage::new(db.clone(), config.settings.namespace.clone());
    let (initial, max) = config.resubscribe_backoff();

    Dashboard::open(
        Arc::new(store),
        Arc::new(notifier),
        Arc::new(storage),
        ResubscribePolicy::new(initial, max),
    )
    .await
}

async fn init_workspace(config_path: &str) -> FeedResult<()> {
    info!("🔧 Initializing workspace...");

    let config = if std::path::Path::new(config_path).exists() {
        warn!("⚠️  {} already exists, keeping it", config_path);
        Config::from_file(config_path)?.with_env_overrides()
    } else {
        let config = Config::default().with_env_overrides();
        config.to_file(config_path)?;
        info!("📝 Created {}", config_path);
        config
    };

    let db = open_database(&config)?;
    info!("🗄️  Database ready at {}", config.database.path);
    info!("✅ {} signals stored", SqliteRecordStore::new(db).count().await?);
    Ok(())
}

async fn list_signals(config: &Config, criteria: FilterCriteria) -> FeedResult<()> {
    let db = open_database(config)?;
    let mut dashboard = open_dashboard(config, &db, BroadcastNotifier::new(config.notifier.channel_capacity)).await;
    dashboard.set_filter_criteria(criteria);

    let view = dashboard.view();
    if let Some(err) = &view.status.last_error {
        warn!("⚠️  {}", err);
    }

    if view.visible.is_empty() {
        info!("No signals found");
    }
    for signal in &view.visible {
        info!(
            "{}  {:<9} {:<4} {:>4}  {:<8}  {}",
            signal.created_at.format("%Y-%m-%d %H:%M:%S"),
            signal.pair,
            signal.action,
            signal.confidence,
            signal.session,
            signal.id,
        );
    }
    info!("{}", view.summary());

    dashboard.close().await;
    Ok(())
}

fn print_stats(view: &DashboardView) {
    info!(
        "📊 Total: {}  Buy: {}  Sell: {}  Avg confidence: {}%",
        view.stats.total, view.stats.buy_count, view.stats.sell_count, view.stats.avg_confidence
    );
}

async fn show_stats(config: &Config) -> FeedResult<()> {
    let db = open_database(config)?;
    let dashboard = open_dashboard(config, &db, BroadcastNotifier::new(config.notifier.channel_capacity)).await;

    print_stats(&dashboard.view());
    let footprint = dashboard.footprint()?;
    info!("🗄️  {} signals, {} KB", footprint.total_signals, footprint.size_kb);

    dashboard.close().await;
    Ok(())
}

async fn watch_signals(config: &Config) -> FeedResult<()> {
    let db = open_database(config)?;
    let notifier = BroadcastNotifier::new(config.notifier.channel_capacity);
    let _watcher = DataVersionWatcher::spawn(&config.database.path, config.poll_interval(), notifier.clone())?;

    let dashboard = open_dashboard(config, &db, notifier).await;
    let mut updates = dashboard.updates();

    print_stats(&dashboard.view());
    info!("👀 Watching for changes. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = dashboard.view();
                print_stats(&view);
                if let Some(latest) = view.visible.first() {
                    info!("🆕 Latest: {} {} {} ({})", latest.pair, latest.action, latest.confidence, latest.session);
                }
            }
        }
    }

    info!("Shutting down...");
    dashboard.close().await;
    Ok(())
}

async fn add_signal(
    config: &Config,
    pair: String,
    action: signal_feed::Action,
    confidence: u8,
    session: signal_feed::Session,
) -> FeedResult<()> {
    let confidence = Confidence::new(confidence).ok_or_else(|| {
        FeedError::Validation(vec![signal_feed::FieldViolation {
            field: "confidence",
            value: confidence.to_string(),
            expected: "0..=100".to_string(),
        }])
    })?;

    let store = SqliteRecordStore::new(open_database(config)?);
    let signal = store.insert(NewSignal::new(pair, action, confidence, session)).await?;
    info!("✅ Stored {} {} {} ({})", signal.pair, signal.action, signal.confidence, signal.id);
    Ok(())
}

fn handle_settings_command(cmd: SettingsCommands, config: &Config) -> FeedResult<()> {
    let db = open_database(config)?;
    let store = SettingsStore::new(Arc::new(SqliteStorage::new(db, config.settings.namespace.clone())));

    match cmd {
        SettingsCommands::Show => {
            print_settings(&store.load());
        }
        SettingsCommands::Set { telegram, auto_mode, threshold, frequency } => {
            let current = store.load();
            let updated = Settings {
                telegram_enabled: telegram.unwrap_or(current.telegram_enabled),
                auto_mode_enabled: auto_mode.unwrap_or(current.auto_mode_enabled),
                confidence_threshold: threshold.unwrap_or(current.confidence_threshold),
                signal_frequency_minutes: frequency.unwrap_or(current.signal_frequency_minutes),
            };

            let ack = store.save(&updated)?;
            info!("✅ {}", ack.message());
            print_settings(&ack.settings);
        }
    }
    Ok(())
}

fn print_settings(settings: &Settings) {
    info!("⚙️  Telegram notifications: {}", settings.telegram_enabled);
    info!("⚙️  Auto mode: {}", settings.auto_mode_enabled);
    info!("⚙️  Confidence threshold: {}%", settings.confidence_threshold);
    info!("⚙️  Signal frequency: every {} minutes", settings.signal_frequency_minutes);
}

async fn clear_signals(config: &Config, yes: bool) -> FeedResult<()> {
    let confirmation = if yes || confirm("Are you sure you want to clear all trading signals? This action cannot be undone.")? {
        Confirmation::Confirmed
    } else {
        Confirmation::Declined
    };

    let db = open_database(config)?;
    let dashboard = open_dashboard(config, &db, BroadcastNotifier::new(config.notifier.channel_capacity)).await;

    let outcome = dashboard.clear_all_signals(confirmation).await;
    dashboard.close().await;

    match outcome? {
        ClearOutcome::Cancelled => info!("Nothing deleted"),
        cleared => {
            if let Some(ack) = cleared.acknowledgement() {
                info!("✅ {}", ack);
            }
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> FeedResult<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
