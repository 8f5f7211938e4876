use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod strategies;

#[derive(Parser)]
#[command(name = "qk")]
#[command(about = "QuantKernel backtest CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest over a price CSV
    Backtest {
        /// Layered config paths in merge order (base -> overrides)
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Price CSV (symbol,time|ts_utc,price[,open][,factor]); overrides data.prices
        #[arg(long)]
        prices: Option<String>,

        /// Comma-separated universe, e.g. SPY,QQQ; overrides universe.symbols
        #[arg(long)]
        universe: Option<String>,

        /// Builtin strategy name (see `qk strategies`)
        #[arg(long)]
        strategy: Option<String>,

        /// Symbol the strategy trades (defaults to the first universe symbol)
        #[arg(long)]
        symbol: Option<String>,

        /// Write manifest + CSV artifacts into this directory
        #[arg(long = "out")]
        out_dir: Option<String>,

        /// Fail on config keys qk does not read
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// List builtin strategies
    Strategies,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Backtest {
            config_paths,
            prices,
            universe,
            strategy,
            symbol,
            out_dir,
            strict,
        } => {
            commands::backtest::run_backtest(commands::backtest::BacktestArgs {
                config_paths,
                prices,
                universe,
                strategy,
                symbol,
                out_dir,
                strict,
            })?;
        }
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = qk_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
        Commands::Strategies => {
            let params = strategies::StrategyParams {
                symbol: qk_schemas::Symbol::equity("SPY"),
                quantity: 1,
            };
            let registry = strategies::builtin_registry(&params)?;
            for meta in registry.list() {
                println!("{}\t{}\t{}", meta.name, meta.version, meta.description);
            }
        }
    }
    Ok(())
}

/// Logs go to stderr; stdout carries the key=value report.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
