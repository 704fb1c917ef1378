//! Bollinger Bands indicator built on top of SMA and standard deviation.

use std::marker::PhantomData;

use rust_decimal::Decimal;

use crate::core::{
    decimal_param, period_param, Calculable, IndicatorError, IndicatorResult, Input, ParamValue,
    Parameter, Parameterized,
};
use crate::indicators::sma::Sma;
use crate::rolling::{std_dev, RollingVariance};

/// Output value of the Bollinger Bands indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BollingerBandsOutput {
    /// Upper band (mean + k * std dev).
    pub upper: Decimal,
    /// Middle band (rolling mean).
    pub middle: Decimal,
    /// Lower band (mean - k * std dev).
    pub lower: Decimal,
}

/// Produces Bollinger Bands from a rolling window.
#[derive(Debug, Clone)]
pub struct BollingerBands<I = Decimal> {
    mean: Sma,
    variance: RollingVariance,
    std_multiplier: Decimal,
    marker: PhantomData<I>,
}

impl<I> BollingerBands<I>
where
    I: Input,
{
    /// Creates a new Bollinger Bands indicator.
    pub fn new(period: usize, std_multiplier: Decimal) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::invalid_period("BollingerBands", period));
        }
        if std_multiplier.is_sign_negative() {
            return Err(IndicatorError::invalid_parameter(
                "BollingerBands",
                "std_multiplier",
                std_multiplier,
            ));
        }

        Ok(Self {
            mean: Sma::new(period)?,
            variance: RollingVariance::new(period)?,
            std_multiplier,
            marker: PhantomData,
        })
    }

    /// Returns the configured lookback period.
    pub fn period(&self) -> usize {
        self.mean.period()
    }

    /// Width of the bands in standard deviations.
    pub fn std_multiplier(&self) -> Decimal {
        self.std_multiplier
    }
}

impl<I> Calculable for BollingerBands<I>
where
    I: Input,
{
    type Input = I;
    type Output = BollingerBandsOutput;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        let value = input.value();
        let middle = self.mean.step(bar, value)?;
        let variance = self.variance.step(bar, value)?;
        let offset = self.std_multiplier.saturating_mul(std_dev(variance));
        Ok(BollingerBandsOutput {
            upper: middle.saturating_add(offset),
            middle,
            lower: middle.saturating_sub(offset),
        })
    }

    fn reset(&mut self) {
        self.mean.reset();
        self.variance.reset();
    }
}

impl<I> Parameterized for BollingerBands<I>
where
    I: Input,
{
    fn name(&self) -> &'static str {
        "BollingerBands"
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::new("period", self.period()),
            Parameter::new("std_multiplier", self.std_multiplier),
        ]
    }

    fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        let rebuilt = match name {
            "period" => Self::new(
                period_param("BollingerBands", "period", &value)?,
                self.std_multiplier,
            )?,
            "std_multiplier" => Self::new(
                self.period(),
                decimal_param("BollingerBands", "std_multiplier", &value)?,
            )?,
            other => return Err(IndicatorError::unknown_parameter("BollingerBands", other)),
        };
        *self = rebuilt;
        Ok(())
    }
}
