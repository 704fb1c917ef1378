//! Dirty tracking and history replay for a single calculator.
//!
//! A [`Recompute`] owns a calculator together with every input it has been
//! fed. Changing a parameter marks it dirty; the next `step` (or an explicit
//! [`Recompute::recalculate`]) rewinds the calculator and replays the stored
//! inputs so the outputs match a calculator constructed with the new
//! parameters from the start.

use std::any::type_name;

use tracing::{debug, trace};

use crate::core::{Calculable, IndicatorResult, ParamValue, Parameter, Parameterized};
use crate::series::Series;

/// Where a controller is in its recompute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecomputeState {
    /// Outputs agree with the current parameters.
    Clean,
    /// A parameter changed; stored outputs are stale.
    Dirty,
    /// History is being replayed. A failed replay falls back to `Dirty`.
    Replaying,
}

/// Calculator wrapper that replays its own input history after parameter changes.
///
/// Replays run under `&mut self`, so a replay can never be re-entered or
/// observed half-way by another caller. Writes arriving through a
/// [`crate::SharedCalculator`] during a replay wait for the lock and then
/// mark the controller dirty again.
#[derive(Debug, Clone)]
pub struct Recompute<C>
where
    C: Calculable,
{
    calculator: C,
    inputs: Series<C::Input>,
    outputs: Series<C::Output>,
    state: RecomputeState,
}

impl<C> Recompute<C>
where
    C: Calculable,
    C::Input: Clone,
    C::Output: Clone,
{
    /// Wrap a freshly constructed calculator.
    pub fn new(calculator: C) -> Self {
        Self {
            calculator,
            inputs: Series::new(),
            outputs: Series::new(),
            state: RecomputeState::Clean,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RecomputeState {
        self.state
    }

    /// Whether outputs are stale.
    pub fn is_dirty(&self) -> bool {
        self.state != RecomputeState::Clean
    }

    /// The wrapped calculator.
    pub fn calculator(&self) -> &C {
        &self.calculator
    }

    /// Every input fed so far, one per bar.
    pub fn inputs(&self) -> &Series<C::Input> {
        &self.inputs
    }

    /// Every output produced so far, one per bar.
    pub fn outputs(&self) -> &Series<C::Output> {
        &self.outputs
    }

    /// Output at `bar`.
    pub fn output(&self, bar: usize) -> IndicatorResult<C::Output> {
        self.outputs.get(bar)
    }

    /// Feed `input` for `bar` and return the calculator's value.
    ///
    /// A dirty controller first replays bars `0..bar` from history. Bar 0
    /// arriving after later bars starts a fresh pass and drops all history.
    pub fn step(&mut self, bar: usize, input: C::Input) -> IndicatorResult<C::Output> {
        if bar == 0 && self.inputs.len() > 1 {
            trace!(
                calculator = type_name::<C>(),
                bars = self.inputs.len(),
                "bar 0 delivered again, starting a fresh pass"
            );
            self.restart();
        }
        self.inputs.set(bar, input.clone())?;
        if self.state != RecomputeState::Clean {
            self.replay(bar)?;
        }
        let output = self.calculator.step(bar, input)?;
        self.outputs.set(bar, output.clone())?;
        Ok(output)
    }

    /// Mark outputs stale without touching the calculator.
    pub fn mark_dirty(&mut self) {
        self.state = RecomputeState::Dirty;
    }

    /// Apply `change` to the calculator and mark the controller dirty on success.
    pub fn configure<R>(
        &mut self,
        change: impl FnOnce(&mut C) -> IndicatorResult<R>,
    ) -> IndicatorResult<R> {
        let result = change(&mut self.calculator)?;
        self.mark_dirty();
        Ok(result)
    }

    /// Replay the whole history now, including the current bar.
    ///
    /// Runs even when the controller is clean.
    pub fn recalculate(&mut self) -> IndicatorResult<()> {
        self.replay(self.inputs.len())
    }

    /// Drop all history and rewind the calculator.
    pub fn restart(&mut self) {
        self.calculator.reset();
        self.inputs.clear();
        self.outputs.clear();
        self.state = RecomputeState::Clean;
    }

    /// Rewind and recompute bars `0..end` from stored inputs.
    fn replay(&mut self, end: usize) -> IndicatorResult<()> {
        self.state = RecomputeState::Replaying;
        debug!(
            calculator = type_name::<C>(),
            bars = end,
            "replaying calculator history"
        );
        self.calculator.reset();
        self.outputs.clear();
        for bar in 0..end {
            let replayed = self
                .inputs
                .get(bar)
                .and_then(|input| self.calculator.step(bar, input))
                .and_then(|output| self.outputs.set(bar, output));
            if let Err(err) = replayed {
                self.state = RecomputeState::Dirty;
                return Err(err);
            }
        }
        self.state = RecomputeState::Clean;
        debug!(calculator = type_name::<C>(), bars = end, "replay finished");
        Ok(())
    }
}

impl<C> Recompute<C>
where
    C: Calculable + Parameterized,
    C::Input: Clone,
    C::Output: Clone,
{
    /// Current parameters of the wrapped calculator.
    pub fn parameters(&self) -> Vec<Parameter> {
        self.calculator.parameters()
    }

    /// Change a parameter; history is replayed on the next step.
    pub fn set_parameter(&mut self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        self.configure(|calculator| calculator.set_parameter(name, value))
    }
}
