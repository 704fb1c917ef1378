//! Thread-safe handle around a [`Recompute`] controller.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{Calculable, IndicatorResult, ParamValue, Parameterized};
use crate::recompute::{Recompute, RecomputeState};

/// Cloneable handle that lets a settings thread and a calculation thread
/// share one calculator.
///
/// Every operation takes the lock for its full duration, so a parameter
/// write never interleaves with a step or a replay.
pub struct SharedCalculator<C>
where
    C: Calculable,
{
    inner: Arc<Mutex<Recompute<C>>>,
}

impl<C> Clone for SharedCalculator<C>
where
    C: Calculable,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> SharedCalculator<C>
where
    C: Calculable,
    C::Input: Clone,
    C::Output: Clone,
{
    /// Wrap a calculator in a shared recompute controller.
    pub fn new(calculator: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recompute::new(calculator))),
        }
    }

    /// See [`Recompute::step`].
    pub fn step(&self, bar: usize, input: C::Input) -> IndicatorResult<C::Output> {
        self.inner.lock().step(bar, input)
    }

    /// See [`Recompute::recalculate`].
    pub fn recalculate(&self) -> IndicatorResult<()> {
        self.inner.lock().recalculate()
    }

    /// Output at `bar`.
    pub fn output(&self, bar: usize) -> IndicatorResult<C::Output> {
        self.inner.lock().output(bar)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RecomputeState {
        self.inner.lock().state()
    }

    /// Run `f` with exclusive access to the controller.
    pub fn with<R>(&self, f: impl FnOnce(&mut Recompute<C>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<C> SharedCalculator<C>
where
    C: Calculable + Parameterized,
    C::Input: Clone,
    C::Output: Clone,
{
    /// See [`Recompute::set_parameter`].
    pub fn set_parameter(&self, name: &str, value: ParamValue) -> IndicatorResult<()> {
        self.inner.lock().set_parameter(name, value)
    }
}
