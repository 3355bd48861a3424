use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use super::AudioBuffer;
use crate::time::{FrameClock, SampleRate};

/// One-shot playback of a buffer, `start_time` is in the destination's time.
#[derive(Debug, Clone)]
pub struct BufferSource {
  pub buffer: Arc<AudioBuffer>,
  pub playback_rate: f64,
  pub start_time: f64,
}

impl BufferSource {
  pub fn new(buffer: Arc<AudioBuffer>, playback_rate: f64, start_time: f64) -> BufferSource {
    BufferSource {
      buffer,
      playback_rate,
      start_time,
    }
  }

  /// Seconds it will sound when played at its rate.
  pub fn get_duration(&self) -> f64 {
    self.buffer.get_duration() / self.playback_rate
  }
}

/// Anything that accepts sources to be played at a given time.
pub trait AudioDestination {
  fn start(&mut self, source: BufferSource);
}

/// Sums active sources into stereo blocks.
pub struct Mixer {
  sample_rate: SampleRate,
  sources: Vec<BufferSource>,
}

impl Mixer {
  pub fn new(sample_rate: SampleRate) -> Mixer {
    Mixer {
      sample_rate,
      sources: Vec::new(),
    }
  }

  pub fn get_sample_rate(&self) -> SampleRate {
    self.sample_rate
  }

  pub fn add(&mut self, source: BufferSource) {
    self.sources.push(source);
  }

  pub fn active_sources(&self) -> usize {
    self.sources.len()
  }

  /// Adds the sources sounding in `[first_frame, first_frame + left.len())` into the outputs.
  pub fn render(&mut self, first_frame: u64, left: &mut [f32], right: &mut [f32]) {
    let output_rate = f64::from(self.sample_rate);
    let frames = left.len().min(right.len());

    for source in &self.sources {
      let buffer = &source.buffer;
      let length = buffer.get_length();
      if length == 0 {
        continue;
      }
      let step = source.playback_rate * f64::from(buffer.get_sample_rate()) / output_rate;
      let start_frame = source.start_time * output_rate;
      let (left_data, right_data) = match buffer.get_number_of_channels() {
        0 => continue,
        1 => (&buffer.channels()[0], &buffer.channels()[0]),
        _ => (&buffer.channels()[0], &buffer.channels()[1]),
      };

      for i in 0..frames {
        let position = ((first_frame + i as u64) as f64 - start_frame) * step;
        if position < 0.0 {
          continue;
        }
        let index = position.floor() as usize;
        if index >= length {
          break;
        }
        let fraction = (position - index as f64) as f32;
        left[i] += interpolate(left_data, index, fraction);
        right[i] += interpolate(right_data, index, fraction);
      }
    }

    let end_frame = (first_frame + frames as u64) as f64;
    self.sources.retain(|source| {
      let step = source.playback_rate * f64::from(source.buffer.get_sample_rate()) / output_rate;
      let played = (end_frame - source.start_time * output_rate) * step;
      played < source.buffer.get_length() as f64
    });
  }
}

fn interpolate(data: &[f32], index: usize, fraction: f32) -> f32 {
  let a = data.get(index).copied().unwrap_or(0.0);
  let b = data.get(index + 1).copied().unwrap_or(0.0);
  a + (b - a) * fraction
}

/// Non-realtime context that renders everything it was given in one go.
pub struct OfflineContext {
  mixer: Mixer,
  length: usize,
}

impl OfflineContext {
  pub fn new(sample_rate: SampleRate, duration: f64) -> OfflineContext {
    let length = (duration.max(0.0) * f64::from(sample_rate)).ceil() as usize;
    OfflineContext {
      mixer: Mixer::new(sample_rate),
      length,
    }
  }

  pub fn get_length(&self) -> usize {
    self.length
  }

  pub fn render(mut self, block_frames: usize) -> AudioBuffer {
    let block_frames = block_frames.max(1);
    let mut left = vec![0.0; self.length];
    let mut right = vec![0.0; self.length];

    let mut start = 0;
    while start < self.length {
      let end = (start + block_frames).min(self.length);
      self
        .mixer
        .render(start as u64, &mut left[start..end], &mut right[start..end]);
      start = end;
    }

    AudioBuffer::new(self.mixer.get_sample_rate(), vec![left, right])
  }
}

impl AudioDestination for OfflineContext {
  fn start(&mut self, source: BufferSource) {
    self.mixer.add(source);
  }
}

pub fn realtime_mixer(sample_rate: SampleRate) -> (MixerSender, RealtimeMixer) {
  let (source_tx, source_rx) = crossbeam_channel::unbounded();
  let frames = Arc::new(AtomicU64::new(0));
  let sender = MixerSender { source_tx };
  let mixer = RealtimeMixer {
    source_rx,
    mixer: Mixer::new(sample_rate),
    frames,
  };
  (sender, mixer)
}

/// Control side of a [`RealtimeMixer`].
#[derive(Clone)]
pub struct MixerSender {
  source_tx: Sender<BufferSource>,
}

impl AudioDestination for MixerSender {
  fn start(&mut self, source: BufferSource) {
    drop(self.source_tx.send(source));
  }
}

/// Audio side, called by the device for every block.
pub struct RealtimeMixer {
  source_rx: Receiver<BufferSource>,
  mixer: Mixer,
  frames: Arc<AtomicU64>,
}

impl RealtimeMixer {
  pub fn get_clock(&self) -> FrameClock {
    FrameClock::new(self.frames.clone(), self.mixer.get_sample_rate())
  }

  pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
    let first_frame = self.frames.load(Ordering::Acquire);
    let now = first_frame as f64 / f64::from(self.mixer.get_sample_rate());

    for mut source in self.source_rx.try_iter() {
      // late sources start right away instead of half way through
      if source.start_time < now {
        source.start_time = now;
      }
      self.mixer.add(source);
    }

    fill_with_zero(left);
    fill_with_zero(right);
    self.mixer.render(first_frame, left, right);

    let frames = left.len().min(right.len()) as u64;
    self.frames.store(first_frame + frames, Ordering::Release);
  }
}

fn fill_with_zero(buffer: &mut [f32]) {
  for sample in buffer.iter_mut() {
    *sample = 0.0;
  }
}

#[cfg(test)]
mod test {
  use std::sync::Arc;

  use super::{realtime_mixer, AudioDestination, BufferSource, Mixer, OfflineContext};
  use crate::audio::AudioBuffer;
  use crate::time::Clock;

  fn ones(sample_rate: u32, length: usize) -> Arc<AudioBuffer> {
    Arc::new(AudioBuffer::new(sample_rate, vec![vec![1.0; length]]))
  }

  #[test]
  pub fn offline_places_sources_in_time() {
    let mut context = OfflineContext::new(10, 1.0);
    context.start(BufferSource::new(ones(10, 2), 1.0, 0.5));
    let rendered = context.render(3);
    assert_eq!(rendered.get_length(), 10);
    let left = rendered.get_channel_data(0).unwrap();
    assert_eq!(left, &[0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0][..]);
    assert_eq!(rendered.get_channel_data(1).unwrap(), left);
  }

  #[test]
  pub fn overlapping_sources_are_summed() {
    let mut context = OfflineContext::new(4, 1.0);
    context.start(BufferSource::new(ones(4, 4), 1.0, 0.0));
    context.start(BufferSource::new(ones(4, 2), 1.0, 0.25));
    let rendered = context.render(512);
    assert_eq!(
      rendered.get_channel_data(0).unwrap(),
      &[1.0, 2.0, 2.0, 1.0][..]
    );
  }

  #[test]
  pub fn playback_rate_changes_speed() {
    let buffer = Arc::new(AudioBuffer::new(4, vec![vec![0.0, 1.0, 2.0, 3.0]]));
    let source = BufferSource::new(buffer, 2.0, 0.0);
    assert_eq!(source.get_duration(), 0.5);

    let mut mixer = Mixer::new(4);
    mixer.add(source);
    let mut left = [0.0; 4];
    let mut right = [0.0; 4];
    mixer.render(0, &mut left, &mut right);
    assert_eq!(left, [0.0, 2.0, 0.0, 0.0]);
    assert_eq!(mixer.active_sources(), 0);
  }

  #[test]
  pub fn interpolates_between_frames() {
    let buffer = Arc::new(AudioBuffer::new(2, vec![vec![0.0, 1.0], vec![1.0, 0.0]]));
    let mut mixer = Mixer::new(4);
    mixer.add(BufferSource::new(buffer, 1.0, 0.0));
    let mut left = [0.0; 4];
    let mut right = [0.0; 4];
    mixer.render(0, &mut left, &mut right);
    assert_eq!(left, [0.0, 0.5, 1.0, 0.5]);
    assert_eq!(right, [1.0, 0.5, 0.0, 0.0]);
  }

  #[test]
  pub fn realtime_mixer_advances_clock() {
    let (mut sender, mut mixer) = realtime_mixer(8);
    let clock = mixer.get_clock();
    assert_eq!(clock.now(), 0.0);

    sender.start(BufferSource::new(ones(8, 2), 1.0, 0.5));
    let mut left = [9.0; 4];
    let mut right = [9.0; 4];
    mixer.process(&mut left, &mut right);
    assert_eq!(left, [0.0; 4]);
    assert_eq!(clock.now(), 0.5);

    mixer.process(&mut left, &mut right);
    assert_eq!(left, [1.0, 1.0, 0.0, 0.0]);
    assert_eq!(clock.now(), 1.0);
  }

  #[test]
  pub fn realtime_late_sources_start_now() {
    let (mut sender, mut mixer) = realtime_mixer(4);
    let mut left = [0.0; 4];
    let mut right = [0.0; 4];
    mixer.process(&mut left, &mut right);

    sender.start(BufferSource::new(ones(4, 1), 1.0, 0.0));
    mixer.process(&mut left, &mut right);
    assert_eq!(left, [1.0, 0.0, 0.0, 0.0]);
  }
}
