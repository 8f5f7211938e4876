//! `qk backtest`: layered config + price CSV -> run -> artifacts.

use anyhow::{bail, Context, Result};
use qk_artifacts::ArtifactMeta;
use qk_backtest::{BacktestConfig, BacktestEngine, BacktestSettings, Collaborators};
use qk_config::{LoadedConfig, UnusedKeyPolicy};
use qk_md::InMemoryPriceSource;
use qk_schemas::{format_micros, Symbol};
use qk_universe::StaticUniverse;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::strategies::{builtin_registry, StrategyParams};

const DEFAULT_QUANTITY: i64 = 100;

#[derive(Debug, Default, Deserialize)]
struct UniverseSection {
    #[serde(default)]
    symbols: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StrategySection {
    name: Option<String>,
    symbol: Option<String>,
    quantity: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct DataSection {
    prices: Option<String>,
}

pub struct BacktestArgs {
    pub config_paths: Vec<String>,
    pub prices: Option<String>,
    pub universe: Option<String>,
    pub strategy: Option<String>,
    pub symbol: Option<String>,
    pub out_dir: Option<String>,
    pub strict: bool,
}

pub fn run_backtest(args: BacktestArgs) -> Result<()> {
    let path_refs: Vec<&str> = args.config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = qk_config::load_layered_yaml(&path_refs)?;

    let policy = if args.strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    qk_config::report_unused_keys(&loaded.config_json, policy)?;

    let settings: BacktestSettings = loaded.section("/backtest")?;
    let universe = resolve_universe(&loaded, args.universe.as_deref())?;
    let strategy_cfg: StrategySection = loaded.optional_section("/strategy")?.unwrap_or_default();
    let data_cfg: DataSection = loaded.optional_section("/data")?.unwrap_or_default();

    let strategy_name = args
        .strategy
        .or(strategy_cfg.name)
        .unwrap_or_else(|| "noop".to_string());

    let symbol = match args.symbol.or(strategy_cfg.symbol) {
        Some(s) => parse_symbol(&s)?,
        None => match universe.first() {
            Some(s) => s.clone(),
            None => bail!("no symbol: pass --symbol or --universe, or set universe.symbols"),
        },
    };
    let universe = if universe.is_empty() {
        vec![symbol.clone()]
    } else {
        universe
    };
    let quantity = strategy_cfg.quantity.unwrap_or(DEFAULT_QUANTITY);
    if quantity <= 0 {
        bail!("strategy quantity must be > 0, got {quantity}");
    }

    let prices_path = args
        .prices
        .or(data_cfg.prices)
        .context("no price data: pass --prices or set data.prices in config")?;
    let points = qk_md::load_csv_file(&prices_path)
        .with_context(|| format!("load prices csv failed: {prices_path}"))?;
    let points_loaded = points.len();
    let source = InMemoryPriceSource::from_points(points);

    let registry = builtin_registry(&StrategyParams { symbol, quantity })?;
    let strategy = registry.instantiate(&strategy_name)?;

    info!(
        config_hash = %loaded.config_hash,
        strategy = %strategy_name,
        universe = universe.len(),
        points = points_loaded,
        "starting backtest"
    );

    let config = BacktestConfig::new(settings, StaticUniverse::new(universe));
    let mut engine = BacktestEngine::new(config, Collaborators::in_memory(source)).context("invalid backtest config")?;
    engine.add_strategy(strategy)?;
    let result = engine.run().context("backtest run failed")?;

    if let Some(dir) = args.out_dir.as_deref() {
        let mut meta = ArtifactMeta::new(loaded.config_hash.clone());
        if let Some(git) = super::get_git_hash() {
            meta = meta.with_git_hash(git);
        }
        qk_artifacts::write_run_artifacts(Path::new(dir), &result, &meta)
            .with_context(|| format!("write run artifacts failed: {dir}"))?;
        println!("artifacts_written=true out_dir={dir} run_id={}", meta.run_id);
    } else {
        println!("artifacts_written=false");
    }

    println!("backtest_ok={}", result.is_complete());
    println!("strategy={}", result.strategy);
    println!("config_hash={}", loaded.config_hash);
    println!("points_loaded={points_loaded}");
    println!("steps={}", result.steps);
    println!("orders={}", result.orders.len());
    println!("fills={}", result.fills().count());
    println!("final_cash={}", format_micros(result.final_cash_micros));
    println!("final_equity={}", format_micros(result.final_equity_micros()));
    for w in &result.warnings {
        println!("warning={w}");
    }

    if let Some(e) = result.error {
        bail!("backtest aborted: {e}");
    }
    Ok(())
}

/// `--universe` wins over `universe.symbols`.
fn resolve_universe(loaded: &LoadedConfig, flag: Option<&str>) -> Result<Vec<Symbol>> {
    let raw: Vec<String> = match flag {
        Some(csv) => csv
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
        None => {
            let section: UniverseSection = loaded.optional_section("/universe")?.unwrap_or_default();
            section.symbols
        }
    };
    raw.iter().map(|s| parse_symbol(s)).collect()
}

fn parse_symbol(s: &str) -> Result<Symbol> {
    Symbol::parse(s).with_context(|| format!("invalid symbol: {s}"))
}
