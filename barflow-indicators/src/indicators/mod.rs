//! Built-in indicator implementations provided by the crate.

pub mod atr;
pub mod bollinger;
pub mod dema;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod smma;
pub mod stochastic;
pub mod vwap;
pub mod wma;

pub use atr::Atr;
pub use bollinger::{BollingerBands, BollingerBandsOutput};
pub use dema::{Dema, Tema};
pub use ema::Ema;
pub use macd::{Macd, MacdOutput};
pub use rsi::Rsi;
pub use sma::Sma;
pub use smma::Smma;
pub use stochastic::{Stochastic, StochasticOutput};
pub use vwap::SessionVwap;
pub use wma::Wma;
