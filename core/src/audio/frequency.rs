use log::debug;

use super::AudioBuffer;
use crate::error::ComputationError;
use crate::pool::{submit, ExecutionPool, Task};
use crate::time::SampleRate;

const MINIMUM_RMS: f64 = 0.001;
const TRIM_THRESHOLD: f32 = 0.2;

fn root_mean_square(data: &[f32]) -> f64 {
  if data.is_empty() {
    return 0.0;
  }
  let sum: f64 = data.iter().map(|x| f64::from(*x) * f64::from(*x)).sum();
  (sum / data.len() as f64).sqrt()
}

/// Window between the first and last crossing of the trim threshold.
///
/// Each end is searched over the first half of the data, the middle sample of
/// an odd length included. Without a crossing at the end the last sample is left out.
fn trim(data: &[f32]) -> &[f32] {
  let len = data.len();
  let half = (len + 1) / 2;

  let start = (0..half)
    .find(|&i| data[i].abs() < TRIM_THRESHOLD)
    .unwrap_or(0);

  let end = (1..half)
    .find(|&i| data[len - i].abs() < TRIM_THRESHOLD)
    .map_or(len.saturating_sub(1), |i| len - i);

  if start < end {
    &data[start..end]
  } else {
    data
  }
}

fn autocorrelation(data: &[f32]) -> Vec<f64> {
  let len = data.len();
  (0..len)
    .map(|lag| {
      data[..len - lag]
        .iter()
        .zip(&data[lag..])
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum()
    })
    .collect()
}

/// Estimates the fundamental frequency of a mono signal by autocorrelation.
///
/// Returns `NotEnoughSignal` for quiet or degenerate input.
pub fn detect_channel_frequency(
  data: &[f32],
  sample_rate: SampleRate,
) -> Result<f64, ComputationError> {
  if root_mean_square(data) < MINIMUM_RMS {
    return Err(ComputationError::NotEnoughSignal);
  }

  let trimmed = trim(data);
  let c = autocorrelation(trimmed);
  let len = c.len();
  if len < 3 {
    return Err(ComputationError::NotEnoughSignal);
  }

  // skip the falloff of the zero lag peak
  let mut d = 0;
  while d + 1 < len && c[d] > c[d + 1] {
    d += 1;
  }

  let mut max_value = std::f64::NEG_INFINITY;
  let mut max_position = 0;
  for (i, value) in c.iter().enumerate().skip(d) {
    if *value > max_value {
      max_value = *value;
      max_position = i;
    }
  }

  if max_position == 0 {
    return Err(ComputationError::NotEnoughSignal);
  }

  let period = if max_position + 1 < len {
    let x1 = c[max_position - 1];
    let x2 = c[max_position];
    let x3 = c[max_position + 1];
    let a = (x1 + x3 - 2.0 * x2) / 2.0;
    let b = (x3 - x1) / 2.0;
    if a != 0.0 {
      max_position as f64 - b / (2.0 * a)
    } else {
      max_position as f64
    }
  } else {
    max_position as f64
  };

  if period > 0.0 && period.is_finite() {
    Ok(f64::from(sample_rate) / period)
  } else {
    Err(ComputationError::NotEnoughSignal)
  }
}

/// Tries every channel in order and keeps the first estimate.
pub fn detect_frequency(buffer: &AudioBuffer) -> Result<f64, ComputationError> {
  for (channel, data) in buffer.channels().iter().enumerate() {
    match detect_channel_frequency(data, buffer.get_sample_rate()) {
      Ok(frequency) => return Ok(frequency),
      Err(err) => debug!("No frequency found in channel {}: {}", channel, err),
    }
  }
  Err(ComputationError::NotEnoughSignal)
}

pub fn detect_frequency_async(
  pool: &dyn ExecutionPool,
  buffer: std::sync::Arc<AudioBuffer>,
) -> Task<Result<f64, ComputationError>> {
  submit(pool, move || detect_frequency(&buffer))
}

#[cfg(test)]
mod test {
  use std::sync::Arc;

  use super::{detect_channel_frequency, detect_frequency, detect_frequency_async, trim};
  use crate::audio::AudioBuffer;
  use crate::error::ComputationError;
  use crate::pool::InlinePool;

  fn sine(frequency: f64, sample_rate: u32, length: usize, amplitude: f32) -> Vec<f32> {
    (0..length)
      .map(|i| {
        let t = i as f64 / f64::from(sample_rate);
        amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
      })
      .collect()
  }

  #[test]
  pub fn trim_searches_half_of_odd_lengths() {
    assert_eq!(trim(&[0.9, 0.9, 0.1, 0.9, 0.9]), &[0.1f32, 0.9][..]);
    assert_eq!(trim(&[0.9, 0.9, 0.9, 0.9]), &[0.9f32, 0.9, 0.9][..]);
    assert_eq!(trim(&[0.9, 0.1, 0.9, 0.1, 0.9]), &[0.1f32, 0.9][..]);
  }

  #[test]
  pub fn sine_440() {
    let data = sine(440.0, 44100, 4096, 0.8);
    let frequency = detect_channel_frequency(&data, 44100).unwrap();
    assert!((frequency - 440.0).abs() < 4.4, "frequency was {}", frequency);
  }

  #[test]
  pub fn sine_110_with_harmonic() {
    let sample_rate = 22050;
    let data: Vec<f32> = sine(110.0, sample_rate, 4096, 0.6)
      .iter()
      .zip(sine(220.0, sample_rate, 4096, 0.3))
      .map(|(a, b)| a + b)
      .collect();
    let frequency = detect_channel_frequency(&data, sample_rate).unwrap();
    assert!((frequency - 110.0).abs() < 1.1, "frequency was {}", frequency);
  }

  #[test]
  pub fn silence_has_not_enough_signal() {
    let data = vec![0.0001; 2048];
    assert_eq!(
      detect_channel_frequency(&data, 44100),
      Err(ComputationError::NotEnoughSignal)
    );
    assert_eq!(
      detect_channel_frequency(&[], 44100),
      Err(ComputationError::NotEnoughSignal)
    );
  }

  #[test]
  pub fn falls_back_to_next_channel() {
    let buffer = AudioBuffer::new(44100, vec![vec![0.0; 4096], sine(440.0, 44100, 4096, 0.8)]);
    let frequency = detect_frequency(&buffer).unwrap();
    assert!((frequency - 440.0).abs() < 4.4);
  }

  #[test]
  pub fn all_channels_silent() {
    let buffer = AudioBuffer::silent(44100, 2, 1024);
    assert_eq!(
      detect_frequency(&buffer),
      Err(ComputationError::NotEnoughSignal)
    );
  }

  #[test]
  pub fn detect_on_pool() {
    let pool = InlinePool;
    let buffer = Arc::new(AudioBuffer::new(44100, vec![sine(440.0, 44100, 4096, 0.5)]));
    let frequency = detect_frequency_async(&pool, buffer).wait().unwrap().unwrap();
    assert!((frequency - 440.0).abs() < 4.4);
  }
}
