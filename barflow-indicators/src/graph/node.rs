//! Adapters that turn calculators into graph nodes.

use std::fmt;
use std::str::FromStr;

use barflow_core::{Candle, PriceField};
use rust_decimal::Decimal;

use crate::core::{
    Calculable, IndicatorError, IndicatorResult, ParamValue, Parameter, Parameterized,
    SessionCandle,
};
use crate::graph::{GraphNode, NodeInputs};
use crate::indicators::{BollingerBandsOutput, MacdOutput, StochasticOutput};
use crate::rolling::Recurrence;

/// Where a scalar node reads its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// A component of the host candle.
    Price(PriceField),
    /// Output of the dependency at this position.
    Dependency(usize),
}

impl Feed {
    fn read(&self, inputs: &NodeInputs<'_>) -> IndicatorResult<Decimal> {
        match *self {
            Feed::Price(field) => Ok(inputs.candle().value(field)),
            Feed::Dependency(index) => inputs.dependency(index),
        }
    }
}

/// Graph node around a calculator over scalar values.
#[derive(Debug, Clone)]
pub struct CalcNode<C> {
    calculator: C,
    feed: Feed,
}

impl<C> CalcNode<C>
where
    C: Calculable<Input = Decimal, Output = Decimal> + Parameterized,
{
    /// Feed `calculator` from `feed`.
    pub fn new(calculator: C, feed: Feed) -> Self {
        Self { calculator, feed }
    }

    /// The wrapped calculator.
    pub fn calculator(&self) -> &C {
        &self.calculator
    }

    /// Current input source.
    pub fn feed(&self) -> Feed {
        self.feed
    }
}

impl<C> Parameterized for CalcNode<C>
where
    C: Calculable<Input = Decimal, Output = Decimal> + Parameterized,
{
    fn name(&self) -> &'static str {
        self.calculator.name()
    }

    fn parameters(&self) -> Vec<Parameter> {
        let mut parameters = self.calculator.parameters();
        if let Feed::Price(field) = self.feed {
            parameters.push(Parameter::new("source", field.as_str()));
        }
        parameters
    }

    /// `source` switches the candle component a price-fed node reads.
    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        match (name, self.feed) {
            ("source", Feed::Price(_)) => {
                let field = value
                    .as_text()
                    .and_then(|text| PriceField::from_str(text).ok())
                    .ok_or_else(|| {
                        IndicatorError::invalid_parameter(self.name(), "source", &value)
                    })?;
                self.feed = Feed::Price(field);
                Ok(())
            }
            _ => self.calculator.set_parameter(name, value),
        }
    }
}

impl<C> GraphNode for CalcNode<C>
where
    C: Calculable<Input = Decimal, Output = Decimal> + Parameterized + Send,
{
    fn step(&mut self, bar: usize, inputs: &NodeInputs<'_>) -> IndicatorResult<Decimal> {
        let value = self.feed.read(inputs)?;
        self.calculator.step(bar, value)
    }

    fn reset(&mut self) {
        self.calculator.reset();
    }
}

/// Inputs that can be assembled from the host candle alone.
pub trait FromCandle {
    /// Build the input for one bar.
    fn from_candle(candle: &Candle, new_session: bool) -> Self;
}

impl FromCandle for Candle {
    fn from_candle(candle: &Candle, _new_session: bool) -> Self {
        candle.clone()
    }
}

impl FromCandle for SessionCandle {
    fn from_candle(candle: &Candle, new_session: bool) -> Self {
        SessionCandle::new(candle.clone(), new_session)
    }
}

/// Graph node around a calculator that consumes whole candles.
#[derive(Debug, Clone)]
pub struct CandleNode<C> {
    calculator: C,
}

impl<C> CandleNode<C>
where
    C: Calculable<Output = Decimal> + Parameterized,
    C::Input: FromCandle,
{
    /// Feed `calculator` with the host candle of every bar.
    pub fn new(calculator: C) -> Self {
        Self { calculator }
    }
}

impl<C> Parameterized for CandleNode<C>
where
    C: Calculable<Output = Decimal> + Parameterized,
    C::Input: FromCandle,
{
    fn name(&self) -> &'static str {
        self.calculator.name()
    }

    fn parameters(&self) -> Vec<Parameter> {
        self.calculator.parameters()
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        self.calculator.set_parameter(name, value)
    }
}

impl<C> GraphNode for CandleNode<C>
where
    C: Calculable<Output = Decimal> + Parameterized + Send,
    C::Input: FromCandle,
{
    fn step(&mut self, bar: usize, inputs: &NodeInputs<'_>) -> IndicatorResult<Decimal> {
        let input = <C::Input as FromCandle>::from_candle(inputs.candle(), inputs.is_new_session());
        self.calculator.step(bar, input)
    }

    fn reset(&mut self) {
        self.calculator.reset();
    }
}

/// Calculator outputs made of several named lines.
pub trait MultiOutput {
    /// Line names, in the order accepted by [`MultiOutput::component`].
    const COMPONENTS: &'static [&'static str];

    /// Value of the line at `index` in [`MultiOutput::COMPONENTS`].
    fn component(&self, index: usize) -> Decimal;
}

impl MultiOutput for MacdOutput {
    const COMPONENTS: &'static [&'static str] = &["macd", "signal", "histogram"];

    fn component(&self, index: usize) -> Decimal {
        match index {
            0 => self.macd,
            1 => self.signal,
            _ => self.histogram,
        }
    }
}

impl MultiOutput for BollingerBandsOutput {
    const COMPONENTS: &'static [&'static str] = &["upper", "middle", "lower"];

    fn component(&self, index: usize) -> Decimal {
        match index {
            0 => self.upper,
            1 => self.middle,
            _ => self.lower,
        }
    }
}

impl MultiOutput for StochasticOutput {
    const COMPONENTS: &'static [&'static str] = &["k", "d"];

    fn component(&self, index: usize) -> Decimal {
        match index {
            0 => self.k,
            _ => self.d,
        }
    }
}

/// Projects one line out of a multi-line calculator.
#[derive(Debug, Clone)]
pub struct Selected<C> {
    calculator: C,
    component: usize,
}

impl<C> Selected<C>
where
    C: Calculable + Parameterized,
    C::Output: MultiOutput,
{
    /// Select the line named `component`.
    pub fn new(calculator: C, component: &str) -> IndicatorResult<Self> {
        let component = Self::position(calculator.name(), component)?;
        Ok(Self {
            calculator,
            component,
        })
    }

    /// Name of the selected line.
    pub fn component(&self) -> &'static str {
        <C::Output as MultiOutput>::COMPONENTS[self.component]
    }

    fn position(name: &'static str, component: &str) -> IndicatorResult<usize> {
        <C::Output as MultiOutput>::COMPONENTS
            .iter()
            .position(|candidate| *candidate == component)
            .ok_or_else(|| IndicatorError::invalid_parameter(name, "output", component))
    }
}

impl<C> Calculable for Selected<C>
where
    C: Calculable + Parameterized,
    C::Output: MultiOutput,
{
    type Input = C::Input;
    type Output = Decimal;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        let output = self.calculator.step(bar, input)?;
        Ok(output.component(self.component))
    }

    fn reset(&mut self) {
        self.calculator.reset();
    }
}

impl<C> Parameterized for Selected<C>
where
    C: Calculable + Parameterized,
    C::Output: MultiOutput,
{
    fn name(&self) -> &'static str {
        self.calculator.name()
    }

    fn parameters(&self) -> Vec<Parameter> {
        let mut parameters = self.calculator.parameters();
        parameters.push(Parameter::new("output", self.component()));
        parameters
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        if name != "output" {
            return self.calculator.set_parameter(name, value);
        }
        let text = value
            .as_text()
            .ok_or_else(|| IndicatorError::invalid_parameter(self.name(), "output", &value))?;
        self.component = Self::position(self.name(), text)?;
        Ok(())
    }
}

/// Arithmetic over dependency outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineOp {
    /// `dep[0] - dep[1]`
    Difference,
    /// Sum of every dependency.
    Sum,
    /// `dep[0] / dep[1]`; a zero denominator repeats the previous value.
    Ratio,
}

impl CombineOp {
    /// Lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            CombineOp::Difference => "difference",
            CombineOp::Sum => "sum",
            CombineOp::Ratio => "ratio",
        }
    }
}

impl fmt::Display for CombineOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CombineOp {
    type Err = IndicatorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "difference" => Ok(CombineOp::Difference),
            "sum" => Ok(CombineOp::Sum),
            "ratio" => Ok(CombineOp::Ratio),
            other => Err(IndicatorError::UnknownKind(other.to_string())),
        }
    }
}

/// Node combining the outputs of other nodes.
#[derive(Debug, Clone)]
pub struct Combine {
    op: CombineOp,
    previous: Recurrence,
}

impl Combine {
    /// Combine dependencies with `op`.
    pub fn new(op: CombineOp) -> Self {
        Self {
            op,
            previous: Recurrence::new(),
        }
    }

    /// Configured operation.
    pub fn op(&self) -> CombineOp {
        self.op
    }
}

impl Parameterized for Combine {
    fn name(&self) -> &'static str {
        "Combine"
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![Parameter::new("op", self.op.as_str())]
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        match name {
            "op" => {
                let op = value
                    .as_text()
                    .and_then(|text| CombineOp::from_str(text).ok())
                    .ok_or_else(|| IndicatorError::invalid_parameter("Combine", "op", &value))?;
                self.op = op;
                Ok(())
            }
            other => Err(IndicatorError::unknown_parameter("Combine", other)),
        }
    }
}

impl GraphNode for Combine {
    fn step(&mut self, bar: usize, inputs: &NodeInputs<'_>) -> IndicatorResult<Decimal> {
        match self.op {
            CombineOp::Difference => {
                let value = inputs.dependency(0)?.saturating_sub(inputs.dependency(1)?);
                self.previous.step(bar, |_| value)
            }
            CombineOp::Sum => {
                let mut total = Decimal::ZERO;
                for index in 0..inputs.dependency_count() {
                    total = total.saturating_add(inputs.dependency(index)?);
                }
                self.previous.step(bar, |_| total)
            }
            CombineOp::Ratio => {
                let numerator = inputs.dependency(0)?;
                let denominator = inputs.dependency(1)?;
                self.previous.step(bar, |prev| {
                    numerator
                        .checked_div(denominator)
                        .unwrap_or_else(|| prev.unwrap_or(Decimal::ZERO))
                })
            }
        }
    }

    fn reset(&mut self) {
        self.previous.reset();
    }
}

#[cfg(test)]
mod tests {
    use barflow_test_utils::candle;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::indicators::{Macd, Sma};
    use crate::series::Series;

    #[test]
    fn price_feed_reads_candle_component() {
        let mut node = CalcNode::new(Sma::<Decimal>::new(2).unwrap(), Feed::Price(PriceField::High));
        let bar = candle(0, dec!(1), dec!(4), dec!(0), dec!(2), dec!(1));
        let inputs = NodeInputs::new("sma", 0, &bar, true, &[]);
        assert_eq!(node.step(0, &inputs).unwrap(), dec!(4));
        node.set_parameter("source", ParamValue::from("low")).unwrap();
        assert_eq!(node.feed(), Feed::Price(PriceField::Low));
        assert!(node.set_parameter("source", ParamValue::from("vwap")).is_err());
    }

    #[test]
    fn missing_dependency_is_reported() {
        let mut node = CalcNode::new(Sma::<Decimal>::new(2).unwrap(), Feed::Dependency(0));
        let bar = candle(0, dec!(1), dec!(1), dec!(1), dec!(1), dec!(1));
        let inputs = NodeInputs::new("orphan", 0, &bar, true, &[]);
        assert_eq!(
            node.step(0, &inputs),
            Err(IndicatorError::MissingDependency {
                node: "orphan".into(),
                index: 0
            })
        );
    }

    #[test]
    fn ratio_by_zero_repeats_previous_value() {
        let mut numerator = Series::new();
        let mut denominator = Series::new();
        numerator.set(0, dec!(6)).unwrap();
        denominator.set(0, dec!(3)).unwrap();
        numerator.set(1, dec!(5)).unwrap();
        denominator.set(1, dec!(0)).unwrap();

        let mut ratio = Combine::new(CombineOp::Ratio);
        let bar = candle(0, dec!(1), dec!(1), dec!(1), dec!(1), dec!(1));
        let deps = [&numerator, &denominator];
        let first = NodeInputs::new("ratio", 0, &bar, true, &deps);
        assert_eq!(ratio.step(0, &first).unwrap(), dec!(2));
        let second = NodeInputs::new("ratio", 1, &bar, false, &deps);
        assert_eq!(ratio.step(1, &second).unwrap(), dec!(2));
    }

    #[test]
    fn selected_projects_named_line() {
        let mut node = Selected::new(Macd::<Decimal>::new(2, 4, 2).unwrap(), "histogram").unwrap();
        assert_eq!(node.component(), "histogram");
        assert_eq!(node.step(0, dec!(10)).unwrap(), Decimal::ZERO);
        node.set_parameter("output", ParamValue::from("signal")).unwrap();
        assert_eq!(node.component(), "signal");
        assert!(node.set_parameter("output", ParamValue::from("upper")).is_err());
        assert!(Selected::new(Macd::<Decimal>::new(2, 4, 2).unwrap(), "k").is_err());
    }
}
