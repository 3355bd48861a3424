use crate::time::SampleRate;

pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.001;

/// Region of sound in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clip {
  pub start: usize,
  pub length: usize,
}

impl Clip {
  pub fn new(start: usize, length: usize) -> Clip {
    Clip { start, length }
  }

  pub fn get_end(&self) -> usize {
    self.start + self.length
  }
}

#[derive(Debug, Clone, Copy)]
pub struct ClipOptions {
  pub minimum_silence_duration: f64,
  pub minimum_clip_duration: f64,
  pub maximum_clip_duration: Option<f64>,
  pub silence_threshold: f32,
}

impl ClipOptions {
  pub fn new(minimum_silence_duration: f64, minimum_clip_duration: f64) -> ClipOptions {
    ClipOptions {
      minimum_silence_duration,
      minimum_clip_duration,
      maximum_clip_duration: None,
      silence_threshold: DEFAULT_SILENCE_THRESHOLD,
    }
  }

  pub fn with_maximum_clip_duration(mut self, maximum_clip_duration: f64) -> ClipOptions {
    self.maximum_clip_duration = Some(maximum_clip_duration);
    self
  }

  pub fn with_silence_threshold(mut self, silence_threshold: f32) -> ClipOptions {
    self.silence_threshold = silence_threshold;
    self
  }
}

fn to_frames(seconds: f64, sample_rate: SampleRate) -> usize {
  (seconds.max(0.0) * f64::from(sample_rate)).round() as usize
}

struct Limits {
  minimum_silence: usize,
  minimum_clip: usize,
  maximum_clip: Option<usize>,
}

impl Limits {
  fn accepts(&self, length: usize) -> bool {
    length >= self.minimum_clip && self.maximum_clip.map_or(true, |max| length <= max)
  }
}

/// Finds the regions of sound separated by at least the minimum silence.
///
/// A frame is silent when every channel is below the threshold there, channels
/// that already ended count as silent. Clips longer than the maximum are dropped
/// whole, they usually mean two sounds were not split apart.
pub fn get_clips<C: AsRef<[f32]>>(
  channels: &[C],
  sample_rate: SampleRate,
  options: &ClipOptions,
) -> Vec<Clip> {
  let limits = Limits {
    minimum_silence: to_frames(options.minimum_silence_duration, sample_rate).max(1),
    minimum_clip: to_frames(options.minimum_clip_duration, sample_rate),
    maximum_clip: options
      .maximum_clip_duration
      .map(|duration| to_frames(duration, sample_rate)),
  };

  let threshold = options.silence_threshold;
  let length = channels
    .iter()
    .map(|channel| channel.as_ref().len())
    .max()
    .unwrap_or(0);

  let is_silent = |index: usize| {
    channels.iter().all(|channel| {
      channel
        .as_ref()
        .get(index)
        .map_or(true, |value| value.abs() < threshold)
    })
  };

  let mut clips = Vec::new();
  let mut clip_start: Option<usize> = None;
  let mut silent_run = 0;

  for index in 0..length {
    let silent = is_silent(index);
    match clip_start {
      Some(start) if silent => {
        silent_run += 1;
        if silent_run >= limits.minimum_silence {
          let clip_length = index + 1 - start - silent_run;
          if limits.accepts(clip_length) {
            clips.push(Clip::new(start, clip_length));
          }
          clip_start = None;
          silent_run = 0;
        }
      }
      Some(_) => silent_run = 0,
      None if !silent => {
        clip_start = Some(index);
        silent_run = 0;
      }
      None => {}
    }
  }

  if let Some(start) = clip_start {
    let clip_length = length - start - silent_run;
    if limits.accepts(clip_length) {
      clips.push(Clip::new(start, clip_length));
    }
  }

  clips
}
