//! Bar-indexed market data types shared between the calculation core and its hosts.
//!
//! The core treats everything in this crate as a read-only collaborator: the
//! host owns the candle history, and calculators only look bars up by index.

mod candle;
mod source;

pub use candle::{Candle, PriceField};
pub use source::{CandleSeries, CandleSource, HostError, SessionRule};
