//! Session-anchored volume weighted average price.

use rust_decimal::Decimal;

use crate::core::{
    Calculable, IndicatorError, IndicatorResult, ParamValue, Parameter, Parameterized,
    SessionCandle,
};
use crate::rolling::{BarTransition, RollingState};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SessionTotals {
    price_volume: Decimal,
    volume: Decimal,
    last_vwap: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BarContribution {
    price_volume: Decimal,
    volume: Decimal,
    new_session: bool,
    vwap: Decimal,
}

/// VWAP of the typical price, restarted whenever the host flags a new session.
///
/// A bar that leaves the session without volume repeats the previous VWAP;
/// the first bar of a session without volume reads its own typical price.
#[derive(Debug, Clone)]
pub struct SessionVwap {
    state: RollingState<SessionTotals, BarContribution>,
}

impl Default for SessionVwap {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionVwap {
    /// Create an empty VWAP.
    pub fn new() -> Self {
        Self {
            state: RollingState::new(SessionTotals::default()),
        }
    }
}

impl Calculable for SessionVwap {
    type Input = SessionCandle;
    type Output = Decimal;

    fn step(&mut self, bar: usize, input: Self::Input) -> IndicatorResult<Self::Output> {
        if let BarTransition::Advance {
            closed: Some(closed),
        } = self.state.begin(bar)?
        {
            let totals = self.state.committed_mut();
            if closed.new_session {
                totals.price_volume = closed.price_volume;
                totals.volume = closed.volume;
            } else {
                totals.price_volume += closed.price_volume;
                totals.volume += closed.volume;
            }
            totals.last_vwap = Some(closed.vwap);
        }

        let SessionCandle {
            candle,
            new_session,
        } = input;
        let typical = candle.typical_price();
        let price_volume = typical * candle.volume;
        let totals = self.state.committed();
        let (total_pv, total_volume, fallback) = if new_session {
            (price_volume, candle.volume, typical)
        } else {
            (
                totals.price_volume + price_volume,
                totals.volume + candle.volume,
                totals.last_vwap.unwrap_or(typical),
            )
        };
        let vwap = if total_volume.is_zero() {
            fallback
        } else {
            total_pv / total_volume
        };

        self.state.stage(BarContribution {
            price_volume,
            volume: candle.volume,
            new_session,
            vwap,
        });
        Ok(vwap)
    }

    fn reset(&mut self) {
        self.state.reset();
    }
}

impl Parameterized for SessionVwap {
    fn name(&self) -> &'static str {
        "SessionVWAP"
    }

    fn parameters(&self) -> Vec<Parameter> {
        Vec::new()
    }

    fn set_parameter(&mut self, name: &str, _value: ParamValue) -> IndicatorResult<()> {
        Err(IndicatorError::unknown_parameter("SessionVWAP", name))
    }
}
