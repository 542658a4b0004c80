mod bridge;
mod check;
mod console;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "chatsync", about = "Relay RuneScape clan or friends chat to a Discord channel")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (defaults to ./chatsync.toml or the user config dir).
    #[arg(long, global = true, env = "CHATSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge and read operator commands from stdin (default).
    Run,
    /// Validate the config file and exit.
    Check,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

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
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "chatsync starting");

    let loaded = chatsync_config::discover_and_load(cli.config.as_deref())?;
    let report = chatsync_config::validate(&loaded);

    match cli.command {
        Some(Commands::Check) => {
            check::print_report(&report);
            if report.has_errors() {
                std::process::exit(1);
            }
            Ok(())
        },
        None | Some(Commands::Run) => {
            if report.has_errors() {
                check::print_report(&report);
                anyhow::bail!("config has errors, not starting");
            }
            check::log_warnings(&report);
            bridge::run(loaded.config).await
        },
    }
}
