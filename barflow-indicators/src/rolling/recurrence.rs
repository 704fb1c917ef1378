//! Values derived from the previous bar's final value.

use rust_decimal::Decimal;

use crate::core::IndicatorResult;
use crate::rolling::state::{BarTransition, RollingState};

/// A value computed from the previous bar's *final* value.
///
/// Recursive smoothers must never feed a revision of the current bar back
/// into itself; `Recurrence` hands the closure the committed value of bar
/// `b - 1` on every visit of bar `b`, however many times `b` is revised.
#[derive(Debug, Clone)]
pub struct Recurrence {
    state: RollingState<Option<Decimal>, Decimal>,
}

impl Default for Recurrence {
    fn default() -> Self {
        Self::new()
    }
}

impl Recurrence {
    /// Fresh recurrence with no previous value.
    pub fn new() -> Self {
        Self {
            state: RollingState::new(None),
        }
    }

    /// Compute and stage the value for `bar` from the previous bar's final value.
    pub fn step(
        &mut self,
        bar: usize,
        compute: impl FnOnce(Option<Decimal>) -> Decimal,
    ) -> IndicatorResult<Decimal> {
        if let BarTransition::Advance {
            closed: Some(closed),
        } = self.state.begin(bar)?
        {
            *self.state.committed_mut() = Some(closed);
        }
        let value = compute(*self.state.committed());
        self.state.stage(value);
        Ok(value)
    }

    /// Final value of the previous bar, as seen by the last step.
    pub fn previous(&self) -> Option<Decimal> {
        *self.state.committed()
    }

    /// Value staged for the current bar.
    pub fn current(&self) -> Option<Decimal> {
        self.state.staged().copied()
    }

    /// Forget every bar.
    pub fn reset(&mut self) {
        self.state.reset();
    }
}
