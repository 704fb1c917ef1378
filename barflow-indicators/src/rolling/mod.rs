//! Revision-safe rolling aggregates.
//!
//! Every aggregate separates *committed* state (all bars strictly before the
//! current one) from the *tentative* contribution of the bar being revised.
//! Committed state changes exactly once per bar, when the next bar arrives,
//! so visiting the open bar any number of times yields the same result as
//! visiting it once with the final value.

pub mod extrema;
pub mod recurrence;
pub mod state;
pub mod sum;
pub mod variance;
pub mod weighted;

pub use extrema::{Extremum, Highest, Lowest, Max, Min, RollingExtremum};
pub use recurrence::Recurrence;
pub use state::{BarTransition, RollingState};
pub use sum::RollingSum;
pub use variance::{std_dev, RollingVariance};
pub use weighted::RollingWeightedSum;
