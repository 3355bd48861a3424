use super::clips::Clip;
use crate::time::SampleRate;

pub type ChannelData = Vec<f32>;

/// Decoded, non-interleaved audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
  sample_rate: SampleRate,
  channels: Vec<ChannelData>,
}

impl AudioBuffer {
  pub fn new(sample_rate: SampleRate, channels: Vec<ChannelData>) -> AudioBuffer {
    AudioBuffer {
      sample_rate,
      channels,
    }
  }

  pub fn silent(sample_rate: SampleRate, number_of_channels: usize, length: usize) -> AudioBuffer {
    AudioBuffer::new(sample_rate, vec![vec![0.0; length]; number_of_channels])
  }

  pub fn get_sample_rate(&self) -> SampleRate {
    self.sample_rate
  }

  pub fn get_number_of_channels(&self) -> usize {
    self.channels.len()
  }

  /// Frames in the longest channel.
  pub fn get_length(&self) -> usize {
    self.channels.iter().map(Vec::len).max().unwrap_or(0)
  }

  pub fn get_duration(&self) -> f64 {
    self.get_length() as f64 / f64::from(self.sample_rate)
  }

  pub fn get_channel_data(&self, channel: usize) -> Option<&[f32]> {
    self.channels.get(channel).map(Vec::as_slice)
  }

  pub fn channels(&self) -> &[ChannelData] {
    &self.channels
  }

  pub fn into_channels(self) -> Vec<ChannelData> {
    self.channels
  }

  pub fn clip(&self, start: usize, length: usize) -> AudioBuffer {
    let channels = self
      .channels
      .iter()
      .map(|data| {
        let begin = start.min(data.len());
        let end = start.saturating_add(length).min(data.len());
        data[begin..end].to_vec()
      })
      .collect();
    AudioBuffer::new(self.sample_rate, channels)
  }

  pub fn clip_region(&self, clip: &Clip) -> AudioBuffer {
    self.clip(clip.start, clip.length)
  }

  pub fn clip_seconds(&self, start_time: f64, end_time: f64) -> AudioBuffer {
    let rate = f64::from(self.sample_rate);
    let start = (start_time.max(0.0) * rate).round() as usize;
    let end = (end_time.max(0.0) * rate).round() as usize;
    self.clip(start, end.saturating_sub(start))
  }
}
