use std::sync::Arc;

use crate::song::Sample;
use crate::time::Seconds;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
  pub start_time: Seconds,
  pub frequency: f64,
  pub duration: Seconds,
}

impl Note {
  pub fn new(start_time: Seconds, frequency: f64, duration: Seconds) -> Note {
    Note {
      start_time,
      frequency,
      duration,
    }
  }

  pub fn get_wave_count(&self) -> f64 {
    self.frequency * self.duration
  }
}

#[derive(Debug, Clone)]
pub struct InstrumentTrack {
  pub notes: Vec<Note>,
  pub sample: Option<Arc<Sample>>,
}

impl InstrumentTrack {
  pub fn new(notes: Vec<Note>) -> InstrumentTrack {
    InstrumentTrack {
      notes,
      sample: None,
    }
  }
}
