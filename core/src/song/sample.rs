use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::audio::{detect_frequency, AudioBuffer, Clip};
use crate::error::ComputationError;
use crate::pool::{submit, ExecutionPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleId(Uuid);

impl SampleId {
  pub fn new_v4() -> SampleId {
    SampleId(Uuid::new_v4())
  }
}

impl fmt::Display for SampleId {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A region of recorded audio with a known pitch, used to play the notes of a track.
#[derive(Debug, Clone)]
pub struct Sample {
  id: SampleId,
  name: String,
  buffer: Arc<AudioBuffer>,
  frequency: f64,
}

impl Sample {
  pub fn new<T: Into<String>>(name: T, buffer: Arc<AudioBuffer>, frequency: f64) -> Sample {
    Sample {
      id: SampleId::new_v4(),
      name: name.into(),
      buffer,
      frequency,
    }
  }

  /// Clips the region out of `source` and detects its frequency on the pool.
  pub fn from_clip<T: Into<String>>(
    name: T,
    source: &AudioBuffer,
    clip: &Clip,
    pool: &dyn ExecutionPool,
  ) -> Result<Sample, ComputationError> {
    let buffer = Arc::new(source.clip_region(clip));
    let detect_buffer = buffer.clone();
    let frequency = submit(pool, move || detect_frequency(&detect_buffer)).wait()??;
    Ok(Sample::new(name, buffer, frequency))
  }

  pub fn get_id(&self) -> SampleId {
    self.id
  }

  pub fn get_name(&self) -> &str {
    &self.name
  }

  pub fn get_buffer(&self) -> &Arc<AudioBuffer> {
    &self.buffer
  }

  pub fn get_frequency(&self) -> f64 {
    self.frequency
  }

  pub fn get_duration(&self) -> f64 {
    self.buffer.get_duration()
  }

  pub fn get_wave_count(&self) -> f64 {
    self.frequency * self.get_duration()
  }
}

#[cfg(test)]
mod test {
  use std::sync::Arc;

  use super::Sample;
  use crate::audio::{AudioBuffer, Clip};
  use crate::error::ComputationError;
  use crate::pool::InlinePool;

  #[test]
  pub fn wave_count() {
    let sample = Sample::new("a", Arc::new(AudioBuffer::silent(100, 1, 50)), 220.0);
    assert_eq!(sample.get_duration(), 0.5);
    assert_eq!(sample.get_wave_count(), 110.0);
  }

  #[test]
  pub fn from_clip_detects_frequency() {
    let sample_rate = 44100;
    let mut data = vec![0.0f32; 1000];
    data.extend((0..4096).map(|i| {
      let t = i as f64 / f64::from(sample_rate);
      0.7 * (2.0 * std::f64::consts::PI * 330.0 * t).sin() as f32
    }));
    let source = AudioBuffer::new(sample_rate, vec![data]);
    let sample = Sample::from_clip("e", &source, &Clip::new(1000, 4096), &InlinePool).unwrap();
    assert_eq!(sample.get_buffer().get_length(), 4096);
    assert!((sample.get_frequency() - 330.0).abs() < 3.3);
  }

  #[test]
  pub fn from_silent_clip() {
    let source = AudioBuffer::silent(44100, 1, 100);
    let err = Sample::from_clip("s", &source, &Clip::new(0, 100), &InlinePool).err();
    assert_eq!(err, Some(ComputationError::NotEnoughSignal));
  }
}
