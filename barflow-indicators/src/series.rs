//! Bar-indexed output container with revision of the current bar.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{IndicatorError, IndicatorResult};

/// Opaque per-bar colour or marker, stored as ARGB.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag(pub u32);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08x}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Slot<V> {
    value: V,
    tag: Option<Tag>,
}

/// One value (and optional tag) per bar, `0..=current_bar`.
///
/// Bars below the current one are immutable. The current bar may be
/// overwritten any number of times until the next bar is appended. Any
/// other write is a [`IndicatorError::NonSequentialWrite`].
#[derive(Clone, Debug, PartialEq)]
pub struct Series<V = Decimal> {
    slots: Vec<Slot<V>>,
}

impl<V> Default for Series<V> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<V: Clone> Series<V> {
    /// Create an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty series with room for `capacity` bars.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Number of bars written.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing has been written since the last clear.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Index of the bar currently open for revision.
    pub fn current_bar(&self) -> Option<usize> {
        self.slots.len().checked_sub(1)
    }

    /// Value at `bar`.
    pub fn get(&self, bar: usize) -> IndicatorResult<V> {
        self.slots
            .get(bar)
            .map(|slot| slot.value.clone())
            .ok_or(IndicatorError::OutOfRange {
                bar,
                len: self.slots.len(),
            })
    }

    /// Value at `bar`, or `fallback` when the bar has not been written.
    pub fn get_or(&self, bar: usize, fallback: V) -> V {
        self.get(bar).unwrap_or(fallback)
    }

    /// Tag at `bar`, if one was set.
    pub fn tag(&self, bar: usize) -> Option<Tag> {
        self.slots.get(bar).and_then(|slot| slot.tag)
    }

    /// Most recent value.
    pub fn last(&self) -> Option<V> {
        self.slots.last().map(|slot| slot.value.clone())
    }

    /// Write `value` at `bar`, keeping any tag already on a revised bar.
    pub fn set(&mut self, bar: usize, value: V) -> IndicatorResult<()> {
        let tag = if self.current_bar() == Some(bar) {
            self.tag(bar)
        } else {
            None
        };
        self.write(bar, Slot { value, tag })
    }

    /// Write `value` and `tag` at `bar`.
    pub fn set_tagged(&mut self, bar: usize, value: V, tag: Option<Tag>) -> IndicatorResult<()> {
        self.write(bar, Slot { value, tag })
    }

    fn write(&mut self, bar: usize, slot: Slot<V>) -> IndicatorResult<()> {
        let len = self.slots.len();
        if bar == len {
            self.slots.push(slot);
            Ok(())
        } else if bar + 1 == len {
            self.slots[bar] = slot;
            Ok(())
        } else {
            Err(IndicatorError::NonSequentialWrite {
                expected: len,
                got: bar,
            })
        }
    }

    /// Truncate to empty.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Iterate values from bar 0.
    pub fn iter(&self) -> impl Iterator<Item = &V> + '_ {
        self.slots.iter().map(|slot| &slot.value)
    }

    /// Copy all values out.
    pub fn values(&self) -> Vec<V> {
        self.iter().cloned().collect()
    }
}
