//! Foundational traits, parameter values and the shared error type.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use barflow_core::Candle;
use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type IndicatorResult<T> = Result<T, IndicatorError>;

/// Failures surfaced by calculators, series and graphs.
///
/// Domain edge cases (zero ranges, zero volume) never show up here; they are
/// resolved inside each formula. Only configuration mistakes and structural
/// contract violations are reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    /// A lookback period of zero was requested.
    #[error("{name} period must be greater than zero (got {period})")]
    InvalidPeriod {
        /// Calculator name.
        name: &'static str,
        /// Rejected period.
        period: usize,
    },
    /// A parameter value is outside its accepted domain.
    #[error("{name} parameter `{parameter}` rejected value {value}")]
    InvalidParameter {
        /// Calculator name.
        name: &'static str,
        /// Parameter name.
        parameter: &'static str,
        /// Rendered rejected value.
        value: String,
    },
    /// The calculator does not expose a parameter with this name.
    #[error("{name} has no parameter named `{parameter}`")]
    UnknownParameter {
        /// Calculator name.
        name: &'static str,
        /// Requested parameter name.
        parameter: String,
    },
    /// A bar that was never written was read.
    #[error("bar {bar} has not been written (series length {len})")]
    OutOfRange {
        /// Requested bar.
        bar: usize,
        /// Number of bars written so far.
        len: usize,
    },
    /// A write skipped ahead or rewound without an intervening clear.
    #[error("non-sequential write at bar {got}; next bar is {expected}")]
    NonSequentialWrite {
        /// Next bar that may be appended.
        expected: usize,
        /// Bar that was actually written.
        got: usize,
    },
    /// The calculator graph contains a cycle through this node.
    #[error("cyclic dependency detected at node `{node}`")]
    CyclicDependency {
        /// Node that closes the cycle.
        node: String,
    },
    /// A node id was referenced that is not part of the graph.
    #[error("unknown node `{0}`")]
    UnknownNode(String),
    /// A node id was registered twice.
    #[error("node `{0}` is already registered")]
    DuplicateNode(String),
    /// A node read a dependency slot it was never wired to.
    #[error("node `{node}` has no dependency at position {index}")]
    MissingDependency {
        /// Reading node.
        node: String,
        /// Requested dependency position.
        index: usize,
    },
    /// The node catalogue does not know this calculator kind.
    #[error("unknown calculator kind `{0}`")]
    UnknownKind(String),
    /// Parameters for a catalogue entry could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IndicatorError {
    /// Shorthand for [`IndicatorError::InvalidPeriod`].
    pub fn invalid_period(name: &'static str, period: usize) -> Self {
        Self::InvalidPeriod { name, period }
    }

    /// Shorthand for [`IndicatorError::InvalidParameter`].
    pub fn invalid_parameter(
        name: &'static str,
        parameter: &'static str,
        value: impl fmt::Display,
    ) -> Self {
        Self::InvalidParameter {
            name,
            parameter,
            value: value.to_string(),
        }
    }

    /// Shorthand for [`IndicatorError::UnknownParameter`].
    pub fn unknown_parameter(name: &'static str, parameter: &str) -> Self {
        Self::UnknownParameter {
            name,
            parameter: parameter.to_string(),
        }
    }
}

/// Values a calculator can be fed with.
pub trait Input {
    /// Scalar value used by single-input calculators.
    fn value(&self) -> Decimal;
}

impl Input for Decimal {
    fn value(&self) -> Decimal {
        *self
    }
}

impl Input for f64 {
    /// Non-finite floats map to zero.
    fn value(&self) -> Decimal {
        Decimal::from_f64(*self).unwrap_or(Decimal::ZERO)
    }
}

impl Input for Candle {
    fn value(&self) -> Decimal {
        self.close
    }
}

/// A candle together with the host's session-boundary flag for its bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCandle {
    /// The bar's OHLCV data.
    pub candle: Candle,
    /// Whether this bar opens a new trading session.
    pub new_session: bool,
}

impl SessionCandle {
    /// Pair a candle with its session flag.
    pub fn new(candle: Candle, new_session: bool) -> Self {
        Self {
            candle,
            new_session,
        }
    }
}

impl Input for SessionCandle {
    fn value(&self) -> Decimal {
        self.candle.close
    }
}

impl<T: Input> Input for &T {
    fn value(&self) -> Decimal {
        (**self).value()
    }
}

/// Incremental, bar-indexed calculation.
///
/// `step` is called once per delivered `(bar, input)` pair with bars in
/// non-decreasing order. Calling it again for the same bar revises the
/// still-open bar; the result must equal a run that only ever saw the last
/// input for that bar.
pub trait Calculable {
    /// Value consumed per bar.
    type Input;
    /// Value produced per bar.
    type Output;

    /// Compute the value for `bar`, revising it when `bar` repeats.
    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output>;

    /// Discard all rolling state so the next step must be bar 0.
    fn reset(&mut self);
}

/// A named parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean switch.
    Flag(bool),
    /// Lookback length or other count.
    Period(usize),
    /// Multiplier, threshold or other scalar.
    Number(Decimal),
    /// Mode selector.
    Text(String),
}

impl ParamValue {
    /// Interpret as a count.
    pub fn as_period(&self) -> Option<usize> {
        match self {
            ParamValue::Period(value) => Some(*value),
            ParamValue::Number(value) if value.fract().is_zero() => value.to_usize(),
            _ => None,
        }
    }

    /// Interpret as a scalar.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            ParamValue::Number(value) => Some(*value),
            ParamValue::Period(value) => Some(Decimal::from(*value)),
            _ => None,
        }
    }

    /// Interpret as a switch.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ParamValue::Flag(value) => Some(*value),
            _ => None,
        }
    }

    /// Interpret as a mode name.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Flag(value) => write!(f, "{value}"),
            ParamValue::Period(value) => write!(f, "{value}"),
            ParamValue::Number(value) => write!(f, "{value}"),
            ParamValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        ParamValue::Period(value)
    }
}

impl From<Decimal> for ParamValue {
    fn from(value: Decimal) -> Self {
        ParamValue::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Flag(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// Reads command-line style values: `true`/`false`, then whole numbers,
/// then decimals, falling back to text.
impl FromStr for ParamValue {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if let Ok(flag) = raw.parse::<bool>() {
            return Ok(ParamValue::Flag(flag));
        }
        if let Ok(period) = raw.parse::<usize>() {
            return Ok(ParamValue::Period(period));
        }
        if let Ok(number) = Decimal::from_str(raw) {
            return Ok(ParamValue::Number(number));
        }
        Ok(ParamValue::Text(raw.to_string()))
    }
}

/// Name/value pair reported by [`Parameterized::parameters`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name.
    pub name: &'static str,
    /// Current value.
    pub value: ParamValue,
}

impl Parameter {
    /// Create a parameter listing entry.
    pub fn new(name: &'static str, value: impl Into<ParamValue>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Calculators whose behaviour is controlled by named parameters.
///
/// A successful `set_parameter` may discard rolling state; callers are
/// expected to replay history afterwards (see [`crate::recompute`]). A failed
/// write leaves the calculator untouched.
pub trait Parameterized {
    /// Name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Current parameter values.
    fn parameters(&self) -> Vec<Parameter>;

    /// Change one parameter.
    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()>;
}

/// Converts a `usize` into a `Decimal`.
pub(crate) fn decimal_from_usize(value: usize) -> Decimal {
    Decimal::from(value)
}

/// Validate a period parameter value.
pub(crate) fn period_param(
    name: &'static str,
    parameter: &'static str,
    value: &ParamValue,
) -> IndicatorResult<usize> {
    match value.as_period() {
        Some(period) if period > 0 => Ok(period),
        _ => Err(IndicatorError::invalid_parameter(name, parameter, value)),
    }
}

/// Validate a scalar parameter value.
pub(crate) fn decimal_param(
    name: &'static str,
    parameter: &'static str,
    value: &ParamValue,
) -> IndicatorResult<Decimal> {
    value
        .as_decimal()
        .ok_or_else(|| IndicatorError::invalid_parameter(name, parameter, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn param_values_parse_from_text() {
        assert_eq!("true".parse::<ParamValue>(), Ok(ParamValue::Flag(true)));
        assert_eq!(" 13 ".parse::<ParamValue>(), Ok(ParamValue::Period(13)));
        assert_eq!("2.5".parse::<ParamValue>(), Ok(ParamValue::Number(dec("2.5"))));
        assert_eq!("-3".parse::<ParamValue>(), Ok(ParamValue::Number(dec("-3"))));
        assert_eq!("high".parse::<ParamValue>(), Ok(ParamValue::from("high")));
    }

    #[test]
    fn float_input_maps_non_finite_to_zero() {
        assert_eq!(f64::NAN.value(), Decimal::ZERO);
        assert_eq!(2.5f64.value(), dec("2.5"));
    }

    #[test]
    fn param_value_coercions() {
        assert_eq!(ParamValue::Number(dec("14")).as_period(), Some(14));
        assert_eq!(ParamValue::Number(dec("14.00")).as_period(), Some(14));
        assert_eq!(ParamValue::Number(dec("1.5")).as_period(), None);
        assert_eq!(ParamValue::Number(dec("-2")).as_period(), None);
        assert_eq!(ParamValue::Period(3).as_decimal(), Some(dec("3")));
        assert_eq!(ParamValue::from("wilder").as_text(), Some("wilder"));
        assert_eq!(ParamValue::Flag(true).as_period(), None);
    }

    #[test]
    fn param_values_deserialize_untagged() {
        #[derive(Deserialize)]
        struct Wrapper {
            values: Vec<ParamValue>,
        }
        let parsed: Wrapper = toml::from_str(r#"values = [true, 12, 2.5, "ema"]"#).unwrap();
        assert_eq!(
            parsed.values,
            vec![
                ParamValue::Flag(true),
                ParamValue::Period(12),
                ParamValue::Number(dec("2.5")),
                ParamValue::Text("ema".into()),
            ]
        );
    }

    #[test]
    fn period_param_rejects_zero() {
        let err = period_param("SMA", "period", &ParamValue::Period(0)).unwrap_err();
        assert!(matches!(err, IndicatorError::InvalidParameter { .. }));
        assert_eq!(
            period_param("SMA", "period", &ParamValue::Period(4)).unwrap(),
            4
        );
    }
}
