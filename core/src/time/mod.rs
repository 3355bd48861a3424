pub mod clock;
pub mod signature;
pub mod tempo;

pub use self::clock::{Clock, ClockRef, FrameClock, ManualClock, SystemClock};
pub use self::signature::Signature;
pub use self::tempo::Tempo;

pub type SampleRate = u32;

/// Seconds relative to the start of a track.
pub type Seconds = f64;
