mod config_commands;

use std::{
    fs::OpenOptions,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use {
    clap::{Parser, Subcommand},
    eanbot_barcode::Ean13Renderer,
    eanbot_config::{ConfigStore, FileConfigStore, LogLevel},
    eanbot_telegram::{BotService, LogLevelControl},
    secrecy::{ExposeSecret, Secret},
    tracing::{info, warn},
    tracing_subscriber::{
        EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
    },
};

#[derive(Parser)]
#[command(name = "eanbot", about = "eanbot, a Telegram EAN-13 barcode bot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: ./eanbot.toml, then ~/.config/eanbot/eanbot.toml).
    #[arg(long, global = true, env = "EANBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Bot token (overrides the config file value).
    #[arg(long, env = "EANBOT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error). Pins the level so
    /// `/reloadcfg` leaves it alone.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Also append logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (default when no subcommand is provided).
    Run,
    /// Validate the configuration file and print a summary.
    Check,
}

/// Reload handle for the global log filter.
///
/// A level given by `RUST_LOG` or `--log-level` is pinned and config
/// reloads don't touch it.
struct LogFilterHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
}

impl LogFilterHandle {
    fn set_initial(&self, level: LogLevel) -> anyhow::Result<()> {
        if self.pinned {
            return Ok(());
        }
        self.handle.reload(filter_for(level.as_str())?)?;
        Ok(())
    }
}

impl LogLevelControl for LogFilterHandle {
    fn set_level(&self, level: LogLevel) -> anyhow::Result<()> {
        if self.pinned {
            anyhow::bail!("log level is pinned by RUST_LOG or --log-level");
        }
        self.handle.reload(filter_for(level.as_str())?)?;
        info!(log_level = %level, "log level changed");
        Ok(())
    }
}

/// Build the filter for `level`, keeping HTTP client internals quiet.
fn filter_for(level: &str) -> anyhow::Result<EnvFilter> {
    Ok(EnvFilter::try_new(format!(
        "{level},hyper=info,hyper_util=info,reqwest=info"
    ))?)
}

/// Normalize a `--log-level` value. Anything `LogLevel` doesn't know is
/// handed to `EnvFilter` as written, so directives like `eanbot=trace` work.
fn requested_level(level: &str) -> &str {
    match LogLevel::parse(level) {
        Some(parsed) => parsed.as_str(),
        None => level,
    }
}

fn init_telemetry(cli: &Cli) -> anyhow::Result<LogFilterHandle> {
    let (filter, pinned) = match (EnvFilter::try_from_default_env(), &cli.log_level) {
        (Ok(filter), _) => (filter, true),
        (Err(_), Some(level)) => {
            (filter_for(requested_level(level))?, true)
        },
        (Err(_), None) => (filter_for(LogLevel::default().as_str())?, false),
    };
    let (filter, handle) = reload::Layer::new(filter);

    let file_layer = match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_thread_ids(false)
                    .with_writer(Mutex::new(file)),
            )
        },
        None => None,
    };
    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }

    Ok(LogFilterHandle { handle, pinned })
}

async fn run(cli: Cli, log_control: Arc<LogFilterHandle>) -> anyhow::Result<()> {
    let path = cli
        .config
        .unwrap_or_else(eanbot_config::find_or_default_config_path);
    let store = Arc::new(FileConfigStore::new(&path));
    let mut config = store.load()?;

    if let Some(token) = cli.token {
        config.token = Secret::new(token);
    }
    if config.token.expose_secret().is_empty() {
        anyhow::bail!(
            "no bot token: set `token` in {} or EANBOT_TOKEN",
            path.display()
        );
    }
    if config.admin_ids.is_empty() {
        warn!("no admin ids configured, private chats will be denied");
    }
    log_control.set_initial(config.log_level)?;

    info!(
        config = %path.display(),
        admin_count = config.admin_ids.len(),
        log_level = %config.log_level,
        "config loaded"
    );

    let service = BotService::new(&config, store, Arc::new(Ean13Renderer::default()))
        .with_log_control(log_control);
    let cancel = eanbot_telegram::start_polling(&config.token, Arc::new(service)).await?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("shutting down");
        },
        () = cancel.cancelled() => {
            warn!("polling stopped, exiting");
        },
    }
    cancel.cancel();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_control = Arc::new(init_telemetry(&cli)?);

    info!(version = env!("CARGO_PKG_VERSION"), "eanbot starting");

    match cli.command {
        None | Some(Commands::Run) => run(cli, log_control).await,
        Some(Commands::Check) => config_commands::check(cli.config.as_deref()),
    }
}
