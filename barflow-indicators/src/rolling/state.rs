//! Committed/staged bookkeeping shared by every rolling aggregate.

use crate::core::{IndicatorError, IndicatorResult};

/// What a call to [`RollingState::begin`] observed about the bar index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarTransition<S> {
    /// Bar 0 of a fresh pass.
    First,
    /// The same bar again; committed state is untouched.
    Revision,
    /// A new bar. `closed` is the last value staged for the previous bar.
    Advance {
        /// Final staged value of the bar that just closed, if any was staged.
        closed: Option<S>,
    },
}

/// Committed/tentative split shared by every rolling aggregate.
///
/// `committed` reflects all bars strictly before `last_bar` and is only
/// touched when the bar advances. `staged` is the latest value recorded for
/// `last_bar`; revisions overwrite it, and it is handed back exactly once,
/// when the next bar begins, so the owner can fold it into `committed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingState<C, S = C> {
    initial: C,
    committed: C,
    staged: Option<S>,
    last_bar: Option<usize>,
}

impl<C: Clone, S> RollingState<C, S> {
    /// New state whose committed accumulator starts at `initial`.
    pub fn new(initial: C) -> Self {
        Self {
            committed: initial.clone(),
            initial,
            staged: None,
            last_bar: None,
        }
    }

    /// Register a call for `bar`.
    ///
    /// Bars must start at 0 and then either repeat or advance by one.
    pub fn begin(&mut self, bar: usize) -> IndicatorResult<BarTransition<S>> {
        match self.last_bar {
            None if bar == 0 => {
                self.last_bar = Some(0);
                Ok(BarTransition::First)
            }
            None => Err(IndicatorError::NonSequentialWrite {
                expected: 0,
                got: bar,
            }),
            Some(last) if last == bar => Ok(BarTransition::Revision),
            Some(last) if last + 1 == bar => {
                self.last_bar = Some(bar);
                Ok(BarTransition::Advance {
                    closed: self.staged.take(),
                })
            }
            Some(last) => Err(IndicatorError::NonSequentialWrite {
                expected: last + 1,
                got: bar,
            }),
        }
    }

    /// Record the tentative value for the current bar.
    pub fn stage(&mut self, value: S) {
        self.staged = Some(value);
    }

    /// Latest staged value for the current bar.
    pub fn staged(&self) -> Option<&S> {
        self.staged.as_ref()
    }

    /// Accumulator covering bars strictly before the current one.
    pub fn committed(&self) -> &C {
        &self.committed
    }

    /// Mutable access to the committed accumulator. Only fold closed bars in.
    pub fn committed_mut(&mut self) -> &mut C {
        &mut self.committed
    }

    /// Bar for which `committed` is valid.
    pub fn last_bar(&self) -> Option<usize> {
        self.last_bar
    }

    /// Forget everything; the next call must be bar 0.
    pub fn reset(&mut self) {
        self.committed = self.initial.clone();
        self.staged = None;
        self.last_bar = None;
    }
}
