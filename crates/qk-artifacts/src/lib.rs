use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use qk_backtest::{BacktestSettings, RunResult};
use qk_orders::OrderType;
use qk_schemas::format_micros;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

pub const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub schema_version: i32,
    pub run_id: Uuid,
    /// Same settings + strategy always share this id.
    pub replay_id: Uuid,
    pub strategy: String,
    pub git_hash: String,
    pub config_hash: String,
    pub created_at_utc: DateTime<Utc>,
    pub settings: BacktestSettings,
    pub summary: RunSummary,
    pub artifacts: ArtifactList,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub steps: u64,
    pub orders: usize,
    pub fills: usize,
    pub final_cash: String,
    pub final_equity: String,
    pub realized_pnl: String,
    pub complete: bool,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl RunSummary {
    pub fn of(result: &RunResult) -> Self {
        Self {
            steps: result.steps,
            orders: result.orders.len(),
            fills: result.fills().count(),
            final_cash: format_micros(result.final_cash_micros),
            final_equity: format_micros(result.final_equity_micros()),
            realized_pnl: format_micros(result.realized_pnl_micros),
            complete: result.is_complete(),
            error: result.error.as_ref().map(|e| e.to_string()),
            warnings: result.warnings.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactList {
    pub manifest_json: String,
    pub orders_csv: String,
    pub order_events_csv: String,
    pub equity_curve_csv: String,
}

impl Default for ArtifactList {
    fn default() -> Self {
        Self {
            manifest_json: "manifest.json".to_string(),
            orders_csv: "orders.csv".to_string(),
            order_events_csv: "order_events.csv".to_string(),
            equity_curve_csv: "equity_curve.csv".to_string(),
        }
    }
}

/// Caller-supplied identity of a run.
#[derive(Debug, Clone)]
pub struct ArtifactMeta {
    pub run_id: Uuid,
    pub config_hash: String,
    pub git_hash: String,
}

impl ArtifactMeta {
    /// Fresh random run id.
    pub fn new(config_hash: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            config_hash: config_hash.into(),
            git_hash: "UNKNOWN".to_string(),
        }
    }

    pub fn with_git_hash(mut self, git_hash: impl Into<String>) -> Self {
        self.git_hash = git_hash.into();
        self
    }
}

pub struct WrittenArtifacts {
    pub run_dir: PathBuf,
    pub manifest_path: PathBuf,
}

#[derive(Serialize)]
struct OrderRow<'a> {
    order_id: u64,
    symbol: String,
    quantity: i64,
    order_type: &'static str,
    status: &'static str,
    submitted: String,
    fill_time: Option<String>,
    fill_price: Option<String>,
    tag: Option<&'a str>,
}

#[derive(Serialize)]
struct OrderEventRow {
    seq: u64,
    order_id: u64,
    symbol: String,
    quantity: i64,
    status: &'static str,
    time: String,
    fill_price: Option<String>,
}

#[derive(Serialize)]
struct EquityRow {
    date: String,
    equity: String,
    cash: String,
}

fn order_type_str(t: OrderType) -> &'static str {
    match t {
        OrderType::Market => "market",
        OrderType::MarketOnOpen => "market_on_open",
    }
}

/// Write `manifest.json`, `orders.csv`, `order_events.csv` and
/// `equity_curve.csv` into `dir`, creating it if needed. Existing files are
/// overwritten.
pub fn write_run_artifacts(dir: &Path, result: &RunResult, meta: &ArtifactMeta) -> Result<WrittenArtifacts> {
    fs::create_dir_all(dir).with_context(|| format!("create artifacts dir failed: {}", dir.display()))?;
    let list = ArtifactList::default();

    write_csv(
        &dir.join(&list.orders_csv),
        &[
            "order_id",
            "symbol",
            "quantity",
            "order_type",
            "status",
            "submitted",
            "fill_time",
            "fill_price",
            "tag",
        ],
        result.orders.iter().map(|o| OrderRow {
            order_id: o.id.0,
            symbol: o.symbol.to_string(),
            quantity: o.quantity,
            order_type: order_type_str(o.order_type),
            status: o.status.as_str(),
            submitted: o.submitted.to_string(),
            fill_time: o.fill_time.map(|t| t.to_string()),
            fill_price: o.fill_price_micros.map(format_micros),
            tag: o.tag.as_deref(),
        }),
    )?;

    write_csv(
        &dir.join(&list.order_events_csv),
        &["seq", "order_id", "symbol", "quantity", "status", "time", "fill_price"],
        result.order_events.iter().map(|e| OrderEventRow {
            seq: e.seq,
            order_id: e.order_id.0,
            symbol: e.symbol.to_string(),
            quantity: e.quantity,
            status: e.status.as_str(),
            time: e.time.to_string(),
            fill_price: e.fill_price_micros.map(format_micros),
        }),
    )?;

    write_csv(
        &dir.join(&list.equity_curve_csv),
        &["date", "equity", "cash"],
        result.equity_curve.iter().map(|p| EquityRow {
            date: p.date.to_string(),
            equity: format_micros(p.equity_micros),
            cash: format_micros(p.cash_micros),
        }),
    )?;

    let manifest = RunManifest {
        schema_version: SCHEMA_VERSION,
        run_id: meta.run_id,
        replay_id: result.replay_id,
        strategy: result.strategy.clone(),
        git_hash: meta.git_hash.clone(),
        config_hash: meta.config_hash.clone(),
        created_at_utc: Utc::now(),
        settings: result.settings.clone(),
        summary: RunSummary::of(result),
        artifacts: list,
    };
    let manifest_path = dir.join(&manifest.artifacts.manifest_json);
    let json = serde_json::to_string_pretty(&manifest).context("serialize manifest failed")?;
    fs::write(&manifest_path, format!("{json}\n"))
        .with_context(|| format!("write manifest failed: {}", manifest_path.display()))?;

    info!(run_id = %meta.run_id, dir = %dir.display(), "run artifacts written");
    Ok(WrittenArtifacts {
        run_dir: dir.to_path_buf(),
        manifest_path,
    })
}

fn write_csv<T: Serialize>(path: &Path, header: &[&str], rows: impl Iterator<Item = T>) -> Result<()> {
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("create csv failed: {}", path.display()))?;
    w.write_record(header)
        .with_context(|| format!("write csv header failed: {}", path.display()))?;
    for row in rows {
        w.serialize(row)
            .with_context(|| format!("write csv row failed: {}", path.display()))?;
    }
    w.flush().with_context(|| format!("flush csv failed: {}", path.display()))?;
    Ok(())
}
