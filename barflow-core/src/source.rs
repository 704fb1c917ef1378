use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Candle;

/// Failures raised by [`CandleSeries`] when the host feeds candles out of order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("cannot revise the last candle of an empty series")]
    Empty,
    #[error("candle at {got} is older than the current bar at {current}")]
    OutOfOrder { current: String, got: String },
}

/// Read-only view of the host's bar history.
///
/// Calculators never mutate the source; they only read candles by bar index
/// and ask whether a bar opens a new trading session.
pub trait CandleSource {
    /// Candle at `bar`, if the host has delivered it.
    fn candle(&self, bar: usize) -> Option<&Candle>;

    /// Index of the most recent (possibly still open) bar.
    fn current_bar(&self) -> Option<usize>;

    /// Whether `bar` is the first bar of a session.
    fn is_new_session(&self, bar: usize) -> bool;

    /// Number of bars delivered so far.
    fn len(&self) -> usize {
        self.current_bar().map_or(0, |bar| bar + 1)
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How session boundaries are derived from candle timestamps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SessionRule {
    /// Only bar 0 opens a session.
    #[default]
    Continuous,
    /// A session opens whenever the UTC trading day changes. `start` shifts
    /// the day boundary (e.g. 22:00 for FX).
    Daily { start: NaiveTime },
}

impl SessionRule {
    /// Daily sessions starting at midnight UTC.
    #[must_use]
    pub fn daily() -> Self {
        SessionRule::Daily {
            start: NaiveTime::MIN,
        }
    }

    fn splits(&self, previous: &Candle, current: &Candle) -> bool {
        match self {
            SessionRule::Continuous => false,
            SessionRule::Daily { start } => {
                let offset = *start - NaiveTime::MIN;
                let day = |c: &Candle| (c.timestamp - offset).date_naive();
                day(previous) != day(current)
            }
        }
    }
}

/// In-memory host history. Appends closed bars and revises the open one.
#[derive(Clone, Debug, Default)]
pub struct CandleSeries {
    candles: Vec<Candle>,
    sessions: SessionRule,
}

impl CandleSeries {
    pub fn new(sessions: SessionRule) -> Self {
        Self {
            candles: Vec::new(),
            sessions,
        }
    }

    /// Build a series from already-closed candles.
    pub fn from_candles(candles: Vec<Candle>, sessions: SessionRule) -> Self {
        Self { candles, sessions }
    }

    pub fn sessions(&self) -> SessionRule {
        self.sessions
    }

    /// Append a new bar and return its index.
    pub fn push(&mut self, candle: Candle) -> usize {
        self.candles.push(candle);
        self.candles.len() - 1
    }

    /// Overwrite the still-open last bar.
    pub fn revise_last(&mut self, candle: Candle) -> Result<usize, HostError> {
        let last = self.candles.last_mut().ok_or(HostError::Empty)?;
        *last = candle;
        Ok(self.candles.len() - 1)
    }

    /// Revise the last bar when the timestamp matches, append when it is newer.
    pub fn upsert(&mut self, candle: Candle) -> Result<usize, HostError> {
        match self.candles.last() {
            Some(last) if last.timestamp == candle.timestamp => self.revise_last(candle),
            Some(last) if last.timestamp > candle.timestamp => Err(HostError::OutOfOrder {
                current: last.timestamp.to_rfc3339(),
                got: candle.timestamp.to_rfc3339(),
            }),
            _ => Ok(self.push(candle)),
        }
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }
}

impl CandleSource for CandleSeries {
    fn candle(&self, bar: usize) -> Option<&Candle> {
        self.candles.get(bar)
    }

    fn current_bar(&self) -> Option<usize> {
        self.candles.len().checked_sub(1)
    }

    fn is_new_session(&self, bar: usize) -> bool {
        if bar == 0 {
            return !self.candles.is_empty();
        }
        match (self.candles.get(bar - 1), self.candles.get(bar)) {
            (Some(previous), Some(current)) => self.sessions.splits(previous, current),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;

    fn candle(hour: u32, close: Decimal) -> Candle {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hour as i64);
        Candle::flat(ts, close, dec!(1))
    }

    #[test]
    fn upsert_revises_matching_timestamp() {
        let mut series = CandleSeries::default();
        assert_eq!(series.upsert(candle(0, dec!(1))).unwrap(), 0);
        assert_eq!(series.upsert(candle(0, dec!(2))).unwrap(), 0);
        assert_eq!(series.upsert(candle(1, dec!(3))).unwrap(), 1);
        assert_eq!(series.len(), 2);
        assert_eq!(series.candle(0).unwrap().close, dec!(2));
        assert_eq!(series.current_bar(), Some(1));
    }

    #[test]
    fn upsert_rejects_older_candles() {
        let mut series = CandleSeries::default();
        series.push(candle(5, dec!(1)));
        assert!(matches!(
            series.upsert(candle(4, dec!(1))),
            Err(HostError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn revise_on_empty_fails() {
        let mut series = CandleSeries::default();
        assert_eq!(series.revise_last(candle(0, dec!(1))), Err(HostError::Empty));
    }

    #[test]
    fn daily_sessions_split_on_day_change() {
        let mut series = CandleSeries::new(SessionRule::daily());
        for hour in [20, 22, 24, 26] {
            series.push(candle(hour, dec!(1)));
        }
        assert!(series.is_new_session(0));
        assert!(!series.is_new_session(1));
        assert!(series.is_new_session(2));
        assert!(!series.is_new_session(3));
    }

    #[test]
    fn shifted_daily_sessions() {
        let start = NaiveTime::from_hms_opt(22, 0, 0).unwrap();
        let mut series = CandleSeries::new(SessionRule::Daily { start });
        for hour in [20, 22, 23] {
            series.push(candle(hour, dec!(1)));
        }
        assert!(series.is_new_session(0));
        assert!(series.is_new_session(1));
        assert!(!series.is_new_session(2));
    }

    #[test]
    fn continuous_sessions_only_open_at_first_bar() {
        let mut series = CandleSeries::default();
        for hour in [0, 24, 48] {
            series.push(candle(hour, dec!(1)));
        }
        assert!(series.is_new_session(0));
        assert!(!series.is_new_session(1));
        assert!(!series.is_new_session(2));
    }
}
