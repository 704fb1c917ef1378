#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

//! Revision-safe, incremental technical indicators built on decimal arithmetic.

/// Calculator composition helpers such as `Piped`.
pub mod combinators;
/// Foundational traits and shared abstractions.
pub mod core;
/// Dependency graph of calculators with dirty tracking and replay.
pub mod graph;
/// Built-in indicator implementations.
pub mod indicators;
/// Per-calculator recompute controller.
pub mod recompute;
/// Rolling aggregates with committed/tentative state.
pub mod rolling;
/// Bar-indexed output storage.
pub mod series;
/// Lock-protected calculator handle.
pub mod shared;

/// Re-export of the piped calculator combinator for convenience.
pub use crate::combinators::Piped;
/// Re-export of the core traits and error type to make the crate easy to consume.
pub use crate::core::{
    Calculable, IndicatorError, IndicatorResult, Input, ParamValue, Parameter, Parameterized,
    SessionCandle,
};
/// Re-export of the graph entry points.
pub use crate::graph::{CalculatorGraph, GraphBuilder, GraphNode, NodeInputs, NodeSpec};
/// Re-export of the recompute controller.
pub use crate::recompute::{Recompute, RecomputeState};
/// Re-export of the output series.
pub use crate::series::{Series, Tag};
/// Re-export of the shared calculator handle.
pub use crate::shared::SharedCalculator;
