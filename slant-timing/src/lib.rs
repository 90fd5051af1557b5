pub mod timer;
pub mod wheel;

pub use timer::{FrameStats, HighPrecisionTimer, ManualTimer, Timer, Timestamp};
pub use wheel::TimerWheel;
