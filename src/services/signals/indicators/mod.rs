//! Technical indicator implementations.

pub mod rsi;
pub mod smoothed_ma;

pub use rsi::Rsi;
pub use smoothed_ma::SmoothedMa;
