use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Source of host time in seconds. It only has to be monotonic, not to agree with wall time.
pub trait Clock: Send + Sync {
  fn now(&self) -> f64;
}

pub type ClockRef = Arc<dyn Clock>;

pub struct SystemClock {
  origin: Instant,
}

impl SystemClock {
  pub fn new() -> SystemClock {
    SystemClock {
      origin: Instant::now(),
    }
  }
}

impl Default for SystemClock {
  fn default() -> Self {
    SystemClock::new()
  }
}

impl Clock for SystemClock {
  fn now(&self) -> f64 {
    self.origin.elapsed().as_secs_f64()
  }
}

/// Clock moved by hand, for deterministic tests and offline simulation.
pub struct ManualClock {
  now: Mutex<f64>,
}

impl ManualClock {
  pub fn new(now: f64) -> ManualClock {
    ManualClock {
      now: Mutex::new(now),
    }
  }

  pub fn set(&self, now: f64) {
    *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
  }

  pub fn advance(&self, seconds: f64) {
    *self.now.lock().unwrap_or_else(|e| e.into_inner()) += seconds;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> f64 {
    *self.now.lock().unwrap_or_else(|e| e.into_inner())
  }
}

/// Host time derived from the frames consumed by an audio device.
#[derive(Clone)]
pub struct FrameClock {
  frames: Arc<AtomicU64>,
  sample_rate: u32,
}

impl FrameClock {
  pub fn new(frames: Arc<AtomicU64>, sample_rate: u32) -> FrameClock {
    FrameClock {
      frames,
      sample_rate,
    }
  }

  pub fn get_frames(&self) -> u64 {
    self.frames.load(Ordering::Acquire)
  }
}

impl Clock for FrameClock {
  fn now(&self) -> f64 {
    self.get_frames() as f64 / f64::from(self.sample_rate)
  }
}

#[cfg(test)]
mod test {
  use std::sync::atomic::{AtomicU64, Ordering};
  use std::sync::Arc;

  use super::{Clock, FrameClock, ManualClock, SystemClock};

  #[test]
  pub fn manual_clock_advances() {
    let clock = ManualClock::new(1.0);
    clock.advance(0.5);
    assert_eq!(clock.now(), 1.5);
    clock.set(10.0);
    assert_eq!(clock.now(), 10.0);
  }

  #[test]
  pub fn system_clock_is_monotonic() {
    let clock = SystemClock::new();
    let t1 = clock.now();
    let t2 = clock.now();
    assert!(t2 >= t1);
  }

  #[test]
  pub fn frame_clock_follows_frames() {
    let frames = Arc::new(AtomicU64::new(0));
    let clock = FrameClock::new(frames.clone(), 100);
    assert_eq!(clock.now(), 0.0);
    frames.store(250, Ordering::Release);
    assert_eq!(clock.now(), 2.5);
  }
}
