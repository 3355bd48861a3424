use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};

use crate::audio::stretch::{try_stretch_channel, StretchParameters};
use crate::audio::{AudioBuffer, AudioDestination, BufferSource};
use crate::config::Stretch as StretchConfig;
use crate::error::ComputationError;
use crate::logger::{LoggerRef, Severity};
use crate::pool::PoolRef;
use crate::song::{Note, Sample, SampleId};

/// Stretch factors are compared exactly, the same computation always yields the same bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FactorKey(u64);

impl From<f64> for FactorKey {
  fn from(factor: f64) -> FactorKey {
    FactorKey(factor.to_bits())
  }
}

enum StretchSlot {
  Reserved,
  Ready(Arc<AudioBuffer>),
}

struct StretchedSample {
  original_frequency: f64,
  original_wave_count: f64,
  buffers: HashMap<FactorKey, StretchSlot>,
}

impl StretchedSample {
  fn stretch_factor(&self, frequency: f64, duration: f64) -> f64 {
    (frequency * duration) / self.original_wave_count
  }
}

type StretchCache = Arc<Mutex<HashMap<SampleId, StretchedSample>>>;

type StretchFn = fn(&[f32], f64, StretchParameters) -> Result<Vec<f32>, ComputationError>;

/// Completion of the factors submitted by one [`PitchTimeStretcher::prepare`] call.
pub struct Preparation {
  done_rx: Receiver<()>,
  pending: usize,
}

impl Preparation {
  pub fn get_pending(&self) -> usize {
    self.pending
  }

  /// Blocks until every submitted factor succeeded or failed.
  pub fn wait(mut self) {
    while self.pending > 0 {
      if self.done_rx.recv().is_err() {
        break;
      }
      self.pending -= 1;
    }
  }

  pub fn is_settled(&mut self) -> bool {
    while self.pending > 0 && self.done_rx.try_recv().is_ok() {
      self.pending -= 1;
    }
    self.pending == 0
  }
}

/// Channels of one factor being stretched on the pool.
struct StretchJob {
  sample_id: SampleId,
  sample_name: String,
  factor: f64,
  sample_rate: u32,
  channels: Mutex<Vec<Option<Result<Vec<f32>, ComputationError>>>>,
  remaining: AtomicUsize,
  cache: StretchCache,
  logger: LoggerRef,
  done_tx: Sender<()>,
}

impl StretchJob {
  fn channel_done(&self, channel: usize, result: Result<Vec<f32>, ComputationError>) {
    {
      let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
      channels[channel] = Some(result);
    }
    if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
      self.complete();
    }
  }

  fn complete(&self) {
    let results = {
      let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
      channels.drain(..).collect::<Vec<_>>()
    };

    let stretched = results
      .into_iter()
      .map(|result| result.unwrap_or(Err(ComputationError::TaskDropped)))
      .collect::<Result<Vec<_>, _>>()
      .map(|channels| AudioBuffer::new(self.sample_rate, channels));

    let key = FactorKey::from(self.factor);
    let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
    match stretched {
      Ok(buffer) => {
        if let Some(entry) = cache.get_mut(&self.sample_id) {
          entry
            .buffers
            .insert(key, StretchSlot::Ready(Arc::new(buffer)));
        }
      }
      Err(err) => {
        if let Some(entry) = cache.get_mut(&self.sample_id) {
          if let Some(StretchSlot::Reserved) = entry.buffers.get(&key) {
            entry.buffers.remove(&key);
          }
        }
        self.logger.log(
          Severity::Error,
          &format!(
            "Error occurred stretching sample \"{}\", factor: {}. {}",
            self.sample_name, self.factor, err
          ),
        );
      }
    }
    drop(cache);
    drop(self.done_tx.send(()));
  }
}

/// Prepares and plays samples transposed to the frequency and duration of notes.
///
/// Every distinct stretch factor of a sample is computed once, on the pool, and
/// cached. While a factor is being computed its slot is reserved so concurrent
/// callers do not submit it again.
pub struct PitchTimeStretcher {
  cache: StretchCache,
  pool: PoolRef,
  logger: LoggerRef,
  config: StretchConfig,
  stretch: StretchFn,
}

impl PitchTimeStretcher {
  pub fn new(pool: PoolRef, logger: LoggerRef, config: StretchConfig) -> PitchTimeStretcher {
    PitchTimeStretcher {
      cache: Arc::new(Mutex::new(HashMap::new())),
      pool,
      logger,
      config,
      stretch: try_stretch_channel,
    }
  }

  #[cfg(test)]
  fn with_stretch(mut self, stretch: StretchFn) -> PitchTimeStretcher {
    self.stretch = stretch;
    self
  }

  /// Reserves the factors nobody computed yet, in one step under the cache lock.
  fn reserve(&self, sample: &Sample, notes: &[Note]) -> Vec<f64> {
    let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
    let entry = cache
      .entry(sample.get_id())
      .or_insert_with(|| StretchedSample {
        original_frequency: sample.get_frequency(),
        original_wave_count: sample.get_wave_count(),
        buffers: HashMap::new(),
      });

    let mut reserved = Vec::new();
    for note in notes {
      let factor = entry.stretch_factor(note.frequency, note.duration);
      let key = FactorKey::from(factor);
      if entry.buffers.contains_key(&key) {
        continue;
      }
      if !(factor.is_finite() && factor > 0.0) {
        self.logger.log(
          Severity::Error,
          &format!(
            "Error occurred stretching sample \"{}\", factor: {}. Invalid stretch factor.",
            sample.get_name(),
            factor
          ),
        );
        continue;
      }
      if factor == 1.0 {
        entry
          .buffers
          .insert(key, StretchSlot::Ready(sample.get_buffer().clone()));
        continue;
      }
      entry.buffers.insert(key, StretchSlot::Reserved);
      reserved.push(factor);
    }
    reserved
  }

  /// Submits the stretches needed to play `notes` with `sample`.
  pub fn prepare(&self, sample: &Sample, notes: &[Note]) -> Preparation {
    let factors = self.reserve(sample, notes);
    let (done_tx, done_rx) = crossbeam_channel::unbounded();
    let preparation = Preparation {
      done_rx,
      pending: factors.len(),
    };

    let buffer = sample.get_buffer();
    let params = StretchParameters::new(buffer.get_sample_rate(), &self.config);
    let number_of_channels = buffer.get_number_of_channels();
    let stretch = self.stretch;

    for factor in factors {
      let job = Arc::new(StretchJob {
        sample_id: sample.get_id(),
        sample_name: sample.get_name().to_string(),
        factor,
        sample_rate: buffer.get_sample_rate(),
        channels: Mutex::new((0..number_of_channels).map(|_| None).collect()),
        remaining: AtomicUsize::new(number_of_channels),
        cache: self.cache.clone(),
        logger: self.logger.clone(),
        done_tx: done_tx.clone(),
      });

      if number_of_channels == 0 {
        job.complete();
        continue;
      }

      for channel in 0..number_of_channels {
        let job = job.clone();
        let buffer = buffer.clone();
        self.pool.execute(Box::new(move || {
          let data = buffer.get_channel_data(channel).unwrap_or(&[]);
          let result = stretch(data, job.factor, params);
          job.channel_done(channel, result);
        }));
      }
    }

    preparation
  }

  pub fn is_ready(&self, sample_id: SampleId, frequency: f64, duration: f64) -> bool {
    self.get_buffer(sample_id, frequency, duration).is_ok()
  }

  fn get_buffer(
    &self,
    sample_id: SampleId,
    frequency: f64,
    duration: f64,
  ) -> Result<(Arc<AudioBuffer>, f64), String> {
    let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
    let entry = cache
      .get(&sample_id)
      .ok_or_else(|| format!("Sample id \"{}\" not yet loaded.", sample_id))?;

    let factor = entry.stretch_factor(frequency, duration);
    match entry.buffers.get(&FactorKey::from(factor)) {
      Some(StretchSlot::Ready(buffer)) => {
        Ok((buffer.clone(), frequency / entry.original_frequency))
      }
      _ => Err(format!(
        "Sample id \"{}\" not yet stretched for factor \"{}\".",
        sample_id, factor
      )),
    }
  }

  /// Schedules a note, or logs a warning when its stretch is not ready.
  pub fn play(
    &self,
    destination: &mut dyn AudioDestination,
    sample_id: SampleId,
    frequency: f64,
    duration: f64,
    start_time: f64,
  ) -> bool {
    match self.get_buffer(sample_id, frequency, duration) {
      Ok((buffer, playback_rate)) => {
        destination.start(BufferSource::new(buffer, playback_rate, start_time));
        true
      }
      Err(message) => {
        self.logger.log(Severity::Warning, &message);
        false
      }
    }
  }
}
