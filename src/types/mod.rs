pub mod candle;
pub mod signal_log;
pub mod signals;
pub mod user;

pub use candle::*;
pub use signal_log::*;
pub use signals::*;
pub use user::*;
