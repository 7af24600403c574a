//! # 通用工具

pub mod clock;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
