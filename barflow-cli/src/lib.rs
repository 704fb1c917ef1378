pub mod app;
pub mod candles;
pub mod replay;
pub mod telemetry;

pub use app::run as run_app;
