//! Candle CSV input.
//!
//! Expected header: `timestamp,open,high,low,close[,volume]`. Timestamps are
//! RFC 3339 strings or unix epoch milliseconds. A missing volume column
//! reads as zero.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use barflow_core::Candle;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: String,
    high: String,
    low: String,
    close: String,
    #[serde(default)]
    volume: Option<String>,
}

impl CandleRow {
    fn into_candle(self) -> Result<Candle> {
        Ok(Candle {
            timestamp: parse_timestamp(&self.timestamp)?,
            open: parse_decimal("open", &self.open)?,
            high: parse_decimal("high", &self.high)?,
            low: parse_decimal("low", &self.low)?,
            close: parse_decimal("close", &self.close)?,
            volume: match self.volume.as_deref().map(str::trim) {
                None | Some("") => Decimal::ZERO,
                Some(raw) => parse_decimal("volume", raw)?,
            },
        })
    }
}

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .with_context(|| format!("invalid {column} value `{raw}`"))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let millis: i64 = raw
        .parse()
        .with_context(|| format!("invalid timestamp `{raw}`"))?;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .with_context(|| format!("timestamp `{raw}` is out of range"))
}

/// Read candles from a CSV file.
pub fn read_candles(path: &Path) -> Result<Vec<Candle>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open candle file {}", path.display()))?;
    read_candles_from(file).with_context(|| format!("failed to read {}", path.display()))
}

/// Read candles from any CSV reader. Timestamps must strictly increase.
pub fn read_candles_from<R: Read>(reader: R) -> Result<Vec<Candle>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut candles: Vec<Candle> = Vec::new();
    for (index, row) in csv.deserialize::<CandleRow>().enumerate() {
        let line = index + 2;
        let candle = row
            .with_context(|| format!("line {line}: malformed row"))?
            .into_candle()
            .with_context(|| format!("line {line}"))?;
        if let Some(previous) = candles.last() {
            if candle.timestamp <= previous.timestamp {
                bail!(
                    "line {line}: timestamp {} does not follow {}",
                    candle.timestamp,
                    previous.timestamp
                );
            }
        }
        if candle.high < candle.low {
            warn!(line, high = %candle.high, low = %candle.low, "candle high is below its low");
        }
        candles.push(candle);
    }
    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn reads_rfc3339_and_epoch_rows() {
        let input = "\
timestamp,open,high,low,close,volume
2024-01-02T00:00:00Z,10,12,9,11,100
1704153660000,11,11.5,10.25,10.5,
";
        let candles = read_candles_from(input.as_bytes()).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].high, dec!(12));
        assert_eq!(candles[1].low, dec!(10.25));
        assert_eq!(candles[1].volume, Decimal::ZERO);
        assert!(candles[1].timestamp > candles[0].timestamp);
    }

    #[test]
    fn volume_column_is_optional() {
        let input = "timestamp,open,high,low,close\n2024-01-02T00:00:00Z,1,1,1,1\n";
        let candles = read_candles_from(input.as_bytes()).unwrap();
        assert_eq!(candles[0].volume, Decimal::ZERO);
    }

    #[test]
    fn rejects_unordered_timestamps() {
        let input = "\
timestamp,open,high,low,close,volume
2024-01-02T00:01:00Z,1,1,1,1,1
2024-01-02T00:00:00Z,1,1,1,1,1
";
        let err = read_candles_from(input.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"), "{err:#}");
    }

    #[test]
    fn reports_bad_numbers() {
        let input = "timestamp,open,high,low,close,volume\n2024-01-02T00:00:00Z,1,x,1,1,1\n";
        let err = read_candles_from(input.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("invalid high value"), "{err:#}");
    }
}
