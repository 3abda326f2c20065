mod check;
mod serve;

use std::{path::PathBuf, sync::Arc};

use {
    clap::{Parser, Subcommand},
    parley_auto_reply::{Dispatcher, HandlerRegistry, ListenerRegistry},
    parley_channels::{Credential, Resolver},
    parley_config::{ParleyConfig, Severity},
    parley_discord::DiscordConnector,
    parley_metrics::{MetricsRecorderConfig, init_metrics},
    parley_sessions::{PoolConfig, SessionPool},
    parley_tools::{DefaultCommandCatalog, ToolContext, ToolRegistry, default_registry},
    tokio::io::BufReader,
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "parley", about = "Parley: Discord bot sessions as agent tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (defaults to ./parley.toml, then ~/.config/parley/).
    #[arg(long, global = true, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve tool calls as JSON lines on stdin/stdout (default).
    Serve,
    /// Print the tool schemas as JSON.
    Tools,
    /// Validate the configuration and report problems.
    Check,
}

fn init_telemetry(cli: &Cli, config: &ParleyConfig) {
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries tool responses.
    if cli.json_logs || config.logging.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Wire the pool, listeners and tools against the live Discord connector.
fn build(config: &ParleyConfig) -> (Arc<SessionPool>, ToolRegistry) {
    let handlers = Arc::new(HandlerRegistry::with_builtins());
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&handlers)));
    let pool = SessionPool::new(
        Arc::new(DiscordConnector::new()),
        dispatcher,
        PoolConfig {
            idle_timeout: config.sessions.idle_timeout(),
            sweep_interval: config.sessions.sweep_interval(),
        },
    );
    let resolver = Resolver::new(config.retry.policy());

    let ctx = Arc::new(ToolContext {
        pool: Arc::clone(&pool),
        resolver: resolver.clone(),
        listeners: ListenerRegistry::new(resolver),
        handlers,
        default_credential: config.discord.default_token().map(Credential::new),
        commands: Arc::new(DefaultCommandCatalog),
        command_guild: config.discord.command_guild_id.clone(),
    });
    (pool, default_registry(ctx))
}

async fn run_server(config: &ParleyConfig) -> anyhow::Result<()> {
    ensure_valid(config)?;
    let (pool, registry) = build(config);
    pool.start_sweeper();
    info!(
        tools = registry.names().len(),
        default_token = config.discord.default_token().is_some(),
        "serving tool calls on stdin"
    );

    let reader = BufReader::new(tokio::io::stdin());
    let outcome = tokio::select! {
        result = serve::serve(&registry, reader, tokio::io::stdout()) => result.map(|handled| {
            info!(handled, "input closed");
        }),
        result = tokio::signal::ctrl_c() => {
            info!("interrupt received");
            result.map_err(Into::into)
        },
    };

    pool.destroy_all().await;
    info!("all sessions closed");
    outcome
}

/// Refuse to serve with a configuration `check` would reject.
fn ensure_valid(config: &ParleyConfig) -> anyhow::Result<()> {
    let result = parley_config::validate(config);
    for diagnostic in &result.diagnostics {
        match diagnostic.severity {
            Severity::Error => error!(%diagnostic, "invalid configuration"),
            Severity::Warning => warn!(%diagnostic, "configuration warning"),
        }
    }
    if result.has_errors() {
        anyhow::bail!("invalid configuration; run `parley check` for details");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = parley_config::load_or_discover(cli.config.as_deref())?;
    parley_config::apply_env_overrides(&mut config);

    init_telemetry(&cli, &config);
    info!(version = env!("CARGO_PKG_VERSION"), "parley starting");

    let _metrics = init_metrics(MetricsRecorderConfig {
        enabled: cfg!(feature = "prometheus"),
        global_labels: Vec::new(),
    })
    .inspect_err(|e| warn!(error = %e, "failed to install metrics recorder"))
    .ok();

    match cli.command {
        None | Some(Commands::Serve) => run_server(&config).await,
        Some(Commands::Tools) => {
            let (_, registry) = build(&config);
            println!(
                "{}",
                serde_json::to_string_pretty(&registry.list_schemas())?
            );
            Ok(())
        },
        Some(Commands::Check) => {
            if !check::check(&config, cli.config.as_deref()) {
                std::process::exit(1);
            }
            Ok(())
        },
    }
}
