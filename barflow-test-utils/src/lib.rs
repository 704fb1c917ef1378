//! Fixtures shared by the Barflow test suites.
//!
//! The `naive_*` helpers recompute each window from scratch. They are slow
//! on purpose and serve as the reference the incremental calculators are
//! checked against.

use barflow_core::{Candle, CandleSeries, SessionRule};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

/// Timestamp of `bar` in a one-minute series starting 2024-01-02 00:00 UTC.
pub fn timestamp(bar: usize) -> DateTime<Utc> {
    let start = Utc
        .with_ymd_and_hms(2024, 1, 2, 0, 0, 0)
        .single()
        .expect("valid start timestamp");
    start + Duration::minutes(bar as i64)
}

/// Candle for `bar` with explicit OHLCV values.
pub fn candle(
    bar: usize,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
) -> Candle {
    Candle {
        timestamp: timestamp(bar),
        open,
        high,
        low,
        close,
        volume,
    }
}

/// Flat one-lot candles, one per close price.
pub fn closes(prices: &[Decimal]) -> Vec<Candle> {
    prices
        .iter()
        .enumerate()
        .map(|(bar, price)| Candle::flat(timestamp(bar), *price, Decimal::ONE))
        .collect()
}

/// Continuous-session host series over `candles`.
pub fn series(candles: Vec<Candle>) -> CandleSeries {
    CandleSeries::from_candles(candles, SessionRule::Continuous)
}

/// Deterministic price walk driven by a 64-bit LCG.
///
/// Moves at most one unit per bar in steps of 0.01 and never drops below 1.
#[derive(Debug, Clone)]
pub struct PriceWalk {
    state: u64,
    price: Decimal,
}

impl PriceWalk {
    /// Walk starting at 100.
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed,
            price: Decimal::ONE_HUNDRED,
        }
    }

    fn next_step(&mut self) -> Decimal {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let cents = ((self.state >> 33) % 201) as i64 - 100;
        Decimal::new(cents, 2)
    }
}

impl Iterator for PriceWalk {
    type Item = Decimal;

    fn next(&mut self) -> Option<Self::Item> {
        self.price = (self.price + self.next_step()).max(Decimal::ONE);
        Some(self.price)
    }
}

/// `len` prices from a walk seeded with `seed`.
pub fn walk(seed: u64, len: usize) -> Vec<Decimal> {
    PriceWalk::new(seed).take(len).collect()
}

/// `len` candles around a seeded walk, with wicks and varying volume.
pub fn walk_candles(seed: u64, len: usize) -> Vec<Candle> {
    let closes = walk(seed, len);
    closes
        .iter()
        .enumerate()
        .map(|(bar, close)| {
            let open = if bar == 0 { *close } else { closes[bar - 1] };
            let wick = Decimal::new((bar % 7) as i64 * 5, 2);
            let volume = Decimal::from((bar % 5) as i64 * 10);
            candle(
                bar,
                open,
                open.max(*close) + wick,
                open.min(*close) - wick,
                *close,
                volume,
            )
        })
        .collect()
}

fn window(values: &[Decimal], bar: usize, period: usize) -> &[Decimal] {
    let start = (bar + 1).saturating_sub(period);
    &values[start..=bar]
}

/// Trailing sum at every bar.
pub fn naive_sum(values: &[Decimal], period: usize) -> Vec<Decimal> {
    (0..values.len())
        .map(|bar| window(values, bar, period).iter().copied().sum())
        .collect()
}

/// Trailing mean at every bar, over the bars available so far.
pub fn naive_sma(values: &[Decimal], period: usize) -> Vec<Decimal> {
    (0..values.len())
        .map(|bar| {
            let window = window(values, bar, period);
            window.iter().copied().sum::<Decimal>() / Decimal::from(window.len() as u64)
        })
        .collect()
}

/// Trailing maximum at every bar.
pub fn naive_max(values: &[Decimal], period: usize) -> Vec<Decimal> {
    (0..values.len())
        .map(|bar| {
            window(values, bar, period)
                .iter()
                .copied()
                .fold(Decimal::MIN, Decimal::max)
        })
        .collect()
}

/// Trailing minimum at every bar.
pub fn naive_min(values: &[Decimal], period: usize) -> Vec<Decimal> {
    (0..values.len())
        .map(|bar| {
            window(values, bar, period)
                .iter()
                .copied()
                .fold(Decimal::MAX, Decimal::min)
        })
        .collect()
}

/// Linearly weighted mean at every bar; the newest value weighs the most.
pub fn naive_wma(values: &[Decimal], period: usize) -> Vec<Decimal> {
    (0..values.len())
        .map(|bar| {
            let window = window(values, bar, period);
            let mut weighted = Decimal::ZERO;
            let mut total = Decimal::ZERO;
            for (i, value) in window.iter().enumerate() {
                let weight = Decimal::from(i as u64 + 1);
                weighted += weight * *value;
                total += weight;
            }
            weighted / total
        })
        .collect()
}

/// EMA seeded with the first value, `alpha = 2 / (period + 1)`.
pub fn naive_ema(values: &[Decimal], period: usize) -> Vec<Decimal> {
    let alpha = Decimal::TWO / Decimal::from(period as u64 + 1);
    let mut out: Vec<Decimal> = Vec::with_capacity(values.len());
    for value in values {
        let next = match out.last() {
            Some(prev) => (*value - *prev) * alpha + *prev,
            None => *value,
        };
        out.push(next);
    }
    out
}
