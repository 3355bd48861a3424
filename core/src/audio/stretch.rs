//! Pitch preserving time stretch by waveform-similarity overlap-add.
//!
//! Input is cut in overlapping sequences. Every new sequence is aligned with
//! the tail of the previous one by searching, inside a small seek window, for
//! the offset where both correlate best, then the overlap is cross-faded.
//! Sequences are taken from the input at a pace of `1 / factor` of the pace
//! they are written to the output, so the duration scales by `factor` while
//! the waveform (and so the pitch) stays the same.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};

use crate::config::Stretch as StretchConfig;
use crate::error::ComputationError;
use crate::time::SampleRate;

use super::AudioBuffer;

const MIN_SEQUENCE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchParameters {
  pub sequence: usize,
  pub overlap: usize,
  pub seek_window: usize,
  pub block_size: usize,
}

impl StretchParameters {
  pub fn new(sample_rate: SampleRate, config: &StretchConfig) -> StretchParameters {
    let frames = |ms: f64| (ms * f64::from(sample_rate) / 1000.0).round() as usize;
    let sequence = frames(config.sequence_ms).max(MIN_SEQUENCE);
    let overlap = frames(config.overlap_ms).min(sequence / 4).max(1);
    let seek_window = frames(config.seek_window_ms).max(1);
    StretchParameters {
      sequence,
      overlap,
      seek_window,
      block_size: config.block_size.max(1),
    }
  }
}

/// Streaming stretcher for a single channel.
pub struct TimeStretch {
  params: StretchParameters,
  nominal_skip: f64,
  skip_fract: f64,
  samples_required: usize,
  input: Vec<f32>,
  output: VecDeque<f32>,
  overlap_tail: Vec<f32>,
}

impl TimeStretch {
  pub fn new(params: StretchParameters, factor: f64) -> Result<TimeStretch, ComputationError> {
    if !(factor.is_finite() && factor > 0.0) {
      return Err(ComputationError::StretchFailed {
        cause: format!("invalid stretch factor {}", factor),
      });
    }

    let nominal_skip = (params.sequence - params.overlap) as f64 / factor;
    let samples_required =
      (params.seek_window + params.sequence).max(nominal_skip.ceil() as usize + params.overlap);

    Ok(TimeStretch {
      params,
      nominal_skip,
      skip_fract: 0.0,
      samples_required,
      input: Vec::new(),
      output: VecDeque::new(),
      overlap_tail: Vec::new(),
    })
  }

  pub fn put_samples(&mut self, samples: &[f32]) {
    self.input.extend_from_slice(samples);
    self.process();
  }

  /// Moves up to `max` processed samples into `out`, returns how many were moved.
  pub fn receive_samples(&mut self, out: &mut Vec<f32>, max: usize) -> usize {
    let count = max.min(self.output.len());
    out.extend(self.output.drain(..count));
    count
  }

  pub fn available(&self) -> usize {
    self.output.len()
  }

  /// Pushes silence through so the samples held back for alignment come out.
  pub fn flush(&mut self) {
    let padding = vec![0.0; self.samples_required];
    self.put_samples(&padding);
  }

  fn process(&mut self) {
    let StretchParameters {
      sequence, overlap, ..
    } = self.params;

    while self.input.len() >= self.samples_required {
      if self.overlap_tail.is_empty() {
        self
          .output
          .extend(&self.input[..sequence - overlap]);
        self.overlap_tail = self.input[sequence - overlap..sequence].to_vec();
      } else {
        let offset = self.seek_best_overlap();
        let start = &self.input[offset..offset + overlap];
        for (i, (tail, next)) in self.overlap_tail.iter().zip(start).enumerate() {
          let weight = i as f32 / overlap as f32;
          self.output.push_back(tail * (1.0 - weight) + next * weight);
        }
        self
          .output
          .extend(&self.input[offset + overlap..offset + sequence - overlap]);
        self.overlap_tail = self.input[offset + sequence - overlap..offset + sequence].to_vec();
      }

      self.skip_fract += self.nominal_skip;
      let skip = self.skip_fract.floor();
      self.skip_fract -= skip;
      let skip = (skip as usize).min(self.input.len());
      self.input.drain(..skip);
    }
  }

  fn seek_best_overlap(&self) -> usize {
    let overlap = self.params.overlap;
    let mut best_offset = 0;
    let mut best_correlation = std::f64::NEG_INFINITY;

    for offset in 0..self.params.seek_window {
      let candidate = &self.input[offset..offset + overlap];
      let (correlation, energy) = self.overlap_tail.iter().zip(candidate).fold(
        (0.0f64, 0.0f64),
        |(correlation, energy), (tail, next)| {
          (
            correlation + f64::from(*tail) * f64::from(*next),
            energy + f64::from(*next) * f64::from(*next),
          )
        },
      );
      let normalized = correlation / (energy + 1e-9).sqrt();
      if normalized > best_correlation {
        best_correlation = normalized;
        best_offset = offset;
      }
    }

    best_offset
  }
}

/// Stretches one channel by `factor`, streaming it block by block.
pub fn stretch_channel(
  data: &[f32],
  factor: f64,
  params: StretchParameters,
) -> Result<Vec<f32>, ComputationError> {
  let mut stretch = TimeStretch::new(params, factor)?;
  let target = (data.len() as f64 * factor).round() as usize;
  let mut out = Vec::with_capacity(target);

  for block in data.chunks(params.block_size) {
    stretch.put_samples(block);
    let missing = target - out.len();
    stretch.receive_samples(&mut out, missing);
  }

  while out.len() < target {
    stretch.flush();
    let missing = target - out.len();
    if stretch.receive_samples(&mut out, missing) == 0 {
      break;
    }
  }

  out.resize(target, 0.0);
  Ok(out)
}

/// Same as [`stretch_channel`] but a panic inside the computation becomes an error.
pub fn try_stretch_channel(
  data: &[f32],
  factor: f64,
  params: StretchParameters,
) -> Result<Vec<f32>, ComputationError> {
  panic::catch_unwind(AssertUnwindSafe(|| stretch_channel(data, factor, params))).unwrap_or_else(
    |_| {
      Err(ComputationError::StretchFailed {
        cause: "stretch computation panicked".to_string(),
      })
    },
  )
}

pub fn stretch_buffer(
  buffer: &AudioBuffer,
  factor: f64,
  params: StretchParameters,
) -> Result<AudioBuffer, ComputationError> {
  let channels = buffer
    .channels()
    .iter()
    .map(|data| stretch_channel(data, factor, params))
    .collect::<Result<Vec<_>, _>>()?;
  Ok(AudioBuffer::new(buffer.get_sample_rate(), channels))
}

#[cfg(test)]
mod test {
  use super::{stretch_buffer, stretch_channel, StretchParameters, TimeStretch};
  use crate::audio::frequency::detect_channel_frequency;
  use crate::audio::AudioBuffer;
  use crate::config::Stretch as StretchConfig;
  use crate::error::ComputationError;

  const SAMPLE_RATE: u32 = 8000;

  fn params() -> StretchParameters {
    StretchParameters::new(SAMPLE_RATE, &StretchConfig::default())
  }

  fn sine(frequency: f64, length: usize) -> Vec<f32> {
    (0..length)
      .map(|i| {
        let t = i as f64 / f64::from(SAMPLE_RATE);
        0.5 * (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
      })
      .collect()
  }

  #[test]
  pub fn parameters_from_config() {
    let params = params();
    assert_eq!(params.sequence, 320);
    assert_eq!(params.overlap, 64);
    assert_eq!(params.seek_window, 120);
    assert_eq!(params.block_size, 4096);

    let tiny = StretchParameters::new(1, &StretchConfig::default());
    assert!(tiny.sequence > 2 * tiny.overlap);
    assert!(tiny.seek_window >= 1);
  }

  #[test]
  pub fn output_length_follows_factor() {
    let data = sine(220.0, 8000);
    assert_eq!(stretch_channel(&data, 2.0, params()).unwrap().len(), 16000);
    assert_eq!(stretch_channel(&data, 0.5, params()).unwrap().len(), 4000);
    assert_eq!(stretch_channel(&data, 1.25, params()).unwrap().len(), 10000);
  }

  #[test]
  pub fn short_input_is_padded() {
    let data = sine(220.0, 100);
    assert_eq!(stretch_channel(&data, 3.0, params()).unwrap().len(), 300);
    assert!(stretch_channel(&[], 2.0, params()).unwrap().is_empty());
  }

  #[test]
  pub fn pitch_is_preserved() {
    let data = sine(200.0, 8000);
    let stretched = stretch_channel(&data, 1.5, params()).unwrap();
    let window = &stretched[2000..6096];
    let frequency = detect_channel_frequency(window, SAMPLE_RATE).unwrap();
    assert!((frequency - 200.0).abs() < 4.0, "frequency was {}", frequency);
  }

  #[test]
  pub fn streaming_output_is_incremental() {
    let mut stretch = TimeStretch::new(params(), 1.0).unwrap();
    stretch.put_samples(&sine(100.0, 200));
    assert_eq!(stretch.available(), 0);
    stretch.put_samples(&sine(100.0, 2000));
    assert!(stretch.available() > 0);
    let mut out = Vec::new();
    let received = stretch.receive_samples(&mut out, 10);
    assert_eq!(received, 10);
    assert_eq!(out.len(), 10);
  }

  #[test]
  pub fn invalid_factor() {
    let err = TimeStretch::new(params(), 0.0).err();
    match err {
      Some(ComputationError::StretchFailed { .. }) => {}
      _ => panic!("expected a stretch failure"),
    }
    assert!(stretch_channel(&[0.0; 10], std::f64::NAN, params()).is_err());
  }

  #[test]
  pub fn stretch_all_channels() {
    let buffer = AudioBuffer::new(SAMPLE_RATE, vec![sine(300.0, 1000), sine(400.0, 1000)]);
    let stretched = stretch_buffer(&buffer, 2.0, params()).unwrap();
    assert_eq!(stretched.get_number_of_channels(), 2);
    assert_eq!(stretched.get_length(), 2000);
    assert_eq!(stretched.get_sample_rate(), SAMPLE_RATE);
  }
}
