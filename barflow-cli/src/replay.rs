//! Drives a calculator graph over recorded candles the way a live host would.

use std::io::Write;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use barflow_core::{Candle, CandleSeries, SessionRule};
use barflow_indicators::{CalculatorGraph, ParamValue, RecomputeState};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// `node.param=value` parameter write requested on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamOverride {
    pub node: String,
    pub name: String,
    pub value: ParamValue,
}

impl FromStr for ParamOverride {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let (target, value) = raw
            .split_once('=')
            .ok_or_else(|| anyhow!("expected NODE.PARAM=VALUE, got `{raw}`"))?;
        let (node, name) = target
            .split_once('.')
            .ok_or_else(|| anyhow!("expected NODE.PARAM before `=`, got `{target}`"))?;
        if node.trim().is_empty() || name.trim().is_empty() || value.trim().is_empty() {
            bail!("incomplete override `{raw}`");
        }
        let value = match value.parse::<ParamValue>() {
            Ok(value) => value,
            Err(never) => match never {},
        };
        Ok(Self {
            node: node.trim().to_string(),
            name: name.trim().to_string(),
            value,
        })
    }
}

/// How candles and parameter writes are interleaved.
#[derive(Debug, Clone, Default)]
pub struct ReplayPlan {
    /// Tentative candles delivered before each final candle.
    pub revisions_per_bar: usize,
    /// Session boundaries for the host series.
    pub sessions: SessionRule,
    /// Parameter writes to apply.
    pub overrides: Vec<ParamOverride>,
    /// Bar before which the overrides are applied; `None` applies them up front.
    pub change_at: Option<usize>,
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub bars: usize,
    pub steps: usize,
    pub replays: usize,
}

/// Intermediate state of `candle` after `k` of `total` ticks.
///
/// The close moves linearly from the open towards the final close and the
/// volume accumulates proportionally.
fn tentative(candle: &Candle, k: usize, total: usize) -> Candle {
    let fraction = Decimal::from(k as u64) / Decimal::from(total as u64 + 1);
    let close = candle.open + (candle.close - candle.open) * fraction;
    Candle {
        timestamp: candle.timestamp,
        open: candle.open,
        high: candle.open.max(close),
        low: candle.open.min(close),
        close,
        volume: candle.volume * fraction,
    }
}

/// Feed `candles` into `graph`, returning the host series it read from.
pub fn run_replay(
    graph: &mut CalculatorGraph,
    candles: &[Candle],
    plan: &ReplayPlan,
) -> Result<(CandleSeries, ReplaySummary)> {
    let mut host = CandleSeries::new(plan.sessions);
    let mut summary = ReplaySummary {
        bars: candles.len(),
        ..ReplaySummary::default()
    };
    let change_at = plan.change_at.unwrap_or(0);

    for (bar, candle) in candles.iter().enumerate() {
        if bar == change_at {
            apply_overrides(graph, &plan.overrides, bar)?;
        }
        if bar > 0 && graph.state() == RecomputeState::Dirty {
            summary.replays += 1;
        }
        for k in 1..=plan.revisions_per_bar {
            let partial = tentative(candle, k, plan.revisions_per_bar);
            if k == 1 {
                host.push(partial);
            } else {
                host.revise_last(partial)?;
            }
            graph
                .step(bar, &host)
                .with_context(|| format!("tentative update {k} of bar {bar}"))?;
            summary.steps += 1;
        }
        if plan.revisions_per_bar == 0 {
            host.push(candle.clone());
        } else {
            host.revise_last(candle.clone())?;
        }
        graph
            .step(bar, &host)
            .with_context(|| format!("bar {bar}"))?;
        summary.steps += 1;
    }

    if change_at >= candles.len() && !plan.overrides.is_empty() {
        apply_overrides(graph, &plan.overrides, change_at)?;
        if !candles.is_empty() {
            graph.recalculate(&host).context("recalculation after the last bar")?;
            summary.replays += 1;
        }
    }

    info!(
        bars = summary.bars,
        steps = summary.steps,
        replays = summary.replays,
        "replay finished"
    );
    Ok((host, summary))
}

fn apply_overrides(
    graph: &mut CalculatorGraph,
    overrides: &[ParamOverride],
    bar: usize,
) -> Result<()> {
    for item in overrides {
        graph
            .set_parameter(&item.node, &item.name, item.value.clone())
            .with_context(|| format!("cannot set {}.{} = {}", item.node, item.name, item.value))?;
        debug!(node = %item.node, param = %item.name, value = %item.value, bar, "parameter changed");
    }
    Ok(())
}

/// Write one row per bar: `bar,timestamp,<column>...`.
pub fn write_outputs<W: Write>(
    graph: &CalculatorGraph,
    host: &CandleSeries,
    columns: &[String],
    precision: Option<u32>,
    writer: W,
) -> Result<()> {
    for column in columns {
        graph
            .output(column)
            .with_context(|| format!("cannot print column `{column}`"))?;
    }
    let mut csv = csv::Writer::from_writer(writer);
    let mut header = vec!["bar".to_string(), "timestamp".to_string()];
    header.extend(columns.iter().cloned());
    csv.write_record(&header)?;

    for (bar, candle) in host.candles().iter().enumerate() {
        let mut record = vec![bar.to_string(), candle.timestamp.to_rfc3339()];
        for column in columns {
            let cell = match graph.value(column, bar) {
                Ok(value) => {
                    let value = match precision {
                        Some(dp) => value.round_dp(dp),
                        None => value,
                    };
                    value.normalize().to_string()
                }
                Err(err) => {
                    warn!(column = %column, bar, error = %err, "missing output value");
                    String::new()
                }
            };
            record.push(cell);
        }
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}
