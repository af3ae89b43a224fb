use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use lotto_server::{CliOverrides, Config};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `has_won` is externally supplied; the bet store has no opinion on what
/// makes a winner. A real deployment would check a bet's number against the
/// national lottery's published winning number; lacking that external source
/// here, the winning number comes from config/CLI so the binary stays
/// runnable end to end without a network dependency.
fn winning_number_predicate(winning_number: u64) -> lotto_server::WinnerPredicate {
    Arc::new(move |bet: &lotto_server::protocol::Bet| bet.number == winning_number)
}

#[derive(Parser)]
#[command(name = "lotto-server")]
#[command(version = VERSION)]
#[command(about = "Concurrent intake-and-rendezvous server for the agency lottery protocol")]
struct Cli {
    /// Path to a YAML config file.
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// TCP port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Listen backlog size.
    #[arg(long)]
    listen_backlog: Option<u32>,

    /// Number of agencies expected to connect before the draw can run.
    #[arg(long)]
    client_count: Option<usize>,

    /// Path to the durable bet store file.
    #[arg(long)]
    storage_path: Option<PathBuf>,

    /// Per-read timeout on client sockets, in seconds.
    #[arg(long)]
    read_timeout_secs: Option<u64>,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// The lottery's winning number, used to classify bets during the draw.
    #[arg(long, default_value_t = 7477)]
    winning_number: u64,
}

fn init_logging(log_file: Option<&PathBuf>) {
    let builder_env = env_logger::Env::default().default_filter_or("info");
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .unwrap_or_else(|e| panic!("failed to create log file at {path:?}: {e}"));
            env_logger::Builder::from_env(builder_env)
                .target(env_logger::Target::Pipe(Box::new(file)))
                .format_timestamp_secs()
                .init();
        }
        None => {
            env_logger::Builder::from_env(builder_env)
                .format_timestamp_secs()
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        port: cli.port,
        listen_backlog: cli.listen_backlog,
        client_count: cli.client_count,
        storage_path: cli.storage_path.clone(),
        read_timeout_secs: cli.read_timeout_secs,
        log_file: cli.log_file.clone(),
    };
    let config = Config::load(&cli.config, &cli_overrides)?;

    init_logging(config.log_file.as_ref());
    log::info!("action: server_start | result: in_progress | version: {VERSION}");

    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn(lotto_server::shutdown::wait_for_shutdown_signal(
        shutdown.clone(),
    ));

    let has_won = winning_number_predicate(cli.winning_number);
    let result = lotto_server::server::run(config, has_won, shutdown).await;

    signal_task.abort();
    result
}
