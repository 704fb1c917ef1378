//! Combinators that allow calculators to be chained together.

use crate::core::{Calculable, IndicatorResult};

/// Chains two calculators, feeding the output of the first into the second.
///
/// Both stages see the same bar index, so a revision of the open bar flows
/// through the whole chain and each stage applies its own revision rules.
#[derive(Debug, Clone)]
pub struct Piped<First, Second> {
    first: First,
    second: Second,
}

impl<First, Second> Piped<First, Second> {
    /// Creates a new piped calculator.
    pub fn new(first: First, second: Second) -> Self {
        Self { first, second }
    }

    /// The upstream stage.
    pub fn first(&self) -> &First {
        &self.first
    }

    /// Mutable access to the upstream stage, e.g. to change its parameters.
    pub fn first_mut(&mut self) -> &mut First {
        &mut self.first
    }

    /// The downstream stage.
    pub fn second(&self) -> &Second {
        &self.second
    }

    /// Mutable access to the downstream stage.
    pub fn second_mut(&mut self) -> &mut Second {
        &mut self.second
    }
}

impl<First, Second> Calculable for Piped<First, Second>
where
    First: Calculable,
    Second: Calculable<Input = First::Output>,
{
    type Input = First::Input;
    type Output = Second::Output;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        let intermediate = self.first.step(bar, input)?;
        self.second.step(bar, intermediate)
    }

    fn reset(&mut self) {
        self.first.reset();
        self.second.reset();
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::indicators::{Ema, Sma};

    #[test]
    fn smoothing_an_average() {
        let mut piped: Piped<Sma, Ema> = Piped::new(Sma::new(2).unwrap(), Ema::new(3).unwrap());
        // sma: 2, 3, 5
        assert_eq!(piped.step(0, dec!(2)).unwrap(), dec!(2));
        assert_eq!(piped.step(1, dec!(4)).unwrap(), dec!(2.5));
        assert_eq!(piped.step(2, dec!(6)).unwrap(), dec!(3.75));
    }

    #[test]
    fn revisions_flow_through_both_stages() {
        let mut revised: Piped<Sma, Ema> = Piped::new(Sma::new(2).unwrap(), Ema::new(3).unwrap());
        let mut clean: Piped<Sma, Ema> = Piped::new(Sma::new(2).unwrap(), Ema::new(3).unwrap());
        for piped in [&mut revised, &mut clean] {
            piped.step(0, dec!(1)).unwrap();
        }
        revised.step(1, dec!(99)).unwrap();
        revised.step(1, dec!(3)).unwrap();
        clean.step(1, dec!(3)).unwrap();
        assert_eq!(
            revised.step(2, dec!(5)).unwrap(),
            clean.step(2, dec!(5)).unwrap()
        );
    }
}
