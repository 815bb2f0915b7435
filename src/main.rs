use stylus_trader_sim::{EngineConfig, TradingSystem};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_help() {
    eprintln!(
        r#"Stylus Trader Sim - simulated automated-trading backend

USAGE:
    stylus-trader-sim [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    HOST                    Server host (default: 0.0.0.0)
    PORT                    Server port (default: 3000)
    FEED_URL                Upstream feed base URL
    INSTRUMENTS             Comma-separated instrument list
    OSCILLATOR_PERIOD       Oscillator lookback in samples
    MOVING_AVERAGE_PERIOD   Moving-average lookback in samples
    BUY_THRESHOLD           Oscillator level gating long entries
    SELL_THRESHOLD          Oscillator level gating short entries
    STOP_LOSS_PCT           Stop-loss distance from entry
    TAKE_PROFIT_PCT         Take-profit distance from entry
    TRADE_SIZE              Size attached to every position
    EVAL_INTERVAL_MS        Evaluation scheduler interval
    BROADCAST_THROTTLE_MS   Market broadcast throttle
    RECONNECT_DELAY_MS      Feed reconnect backoff
    WINDOW_SIZE             Price window capacity
    HISTORY_CAP             Closed-trade history cap
    EVENT_CAPACITY          Broadcast channel capacity
    RUST_LOG                Log level filter

EXAMPLES:
    # Run with defaults (BTCUSDT, ETHUSDT)
    stylus-trader-sim

    # Run with config file
    stylus-trader-sim --config config.json

    # Run with custom instruments
    INSTRUMENTS=BTCUSDT,SOLUSDT stylus-trader-sim
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stylus_trader_sim=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = if let Some(path) = config_path {
        tracing::info!("loading configuration from: {}", path);
        EngineConfig::from_file(&path)?
    } else {
        EngineConfig::from_env()?
    };

    let system = TradingSystem::new(config)?;

    tracing::info!("starting trading backend");
    tracing::info!(
        "query surface: http://{}:{}/api/",
        system.config.host,
        system.config.port
    );
    tracing::info!(
        "push channel:  ws://{}:{}/ws",
        system.config.host,
        system.config.port
    );
    tracing::info!("available endpoints:");
    tracing::info!("  GET /api/trades");
    tracing::info!("  GET /api/positions");
    tracing::info!("  GET /api/stats");

    system.run().await
}
