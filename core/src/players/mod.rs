pub mod drums;
pub mod kits;
pub mod sampler;

pub use self::drums::{DrumKitLibrary, FileKitSource, KitSource};
pub use self::kits::{default_drum_kits, DrumKitDefinition, DrumKitId};
pub use self::sampler::{PitchTimeStretcher, Preparation};

use std::sync::Arc;

use crate::audio::AudioDestination;
use crate::pool::Task;
use crate::song::{Track, TrackMedia};
use crate::time::Seconds;

/// Background work started to make a track playable.
#[derive(Default)]
pub struct TrackLoading {
  kits: Vec<Task<()>>,
  preparations: Vec<Preparation>,
}

impl TrackLoading {
  pub fn merge(&mut self, other: TrackLoading) {
    self.kits.extend(other.kits);
    self.preparations.extend(other.preparations);
  }

  pub fn is_empty(&self) -> bool {
    self.kits.is_empty() && self.preparations.iter().all(|p| p.get_pending() == 0)
  }

  /// Blocks until everything settled, failures were already logged by the players.
  pub fn wait(self) {
    for kit in self.kits {
      drop(kit.wait());
    }
    for preparation in self.preparations {
      preparation.wait();
    }
  }
}

/// The drum kits and the sample stretcher shared by realtime and offline playback.
#[derive(Clone)]
pub struct Players {
  drums: Arc<DrumKitLibrary>,
  sampler: Arc<PitchTimeStretcher>,
}

impl Players {
  pub fn new(drums: Arc<DrumKitLibrary>, sampler: Arc<PitchTimeStretcher>) -> Players {
    Players { drums, sampler }
  }

  pub fn get_drums(&self) -> &DrumKitLibrary {
    &self.drums
  }

  pub fn get_sampler(&self) -> &PitchTimeStretcher {
    &self.sampler
  }

  /// Starts loading the kit or stretching the sample selected for the track.
  pub fn load(&self, track: &Track) -> TrackLoading {
    let mut loading = TrackLoading::default();
    match track.media() {
      TrackMedia::Drum(drums) => {
        if let Some(kit) = drums.drum_kit_id.and_then(|kit_id| self.drums.ensure_loaded(kit_id)) {
          loading.kits.push(kit);
        }
      }
      TrackMedia::Instrument(instrument) => {
        if let Some(sample) = &instrument.sample {
          loading
            .preparations
            .push(self.sampler.prepare(sample, &instrument.notes));
        }
      }
    }
    loading
  }

  /// Starts the events of the track beginning within `[from, to)`.
  ///
  /// Events are placed at `time_offset + start_time` in the destination time.
  /// Returns how many events were started, the ones not ready are skipped.
  pub fn play_events(
    &self,
    track: &Track,
    from: Seconds,
    to: Seconds,
    time_offset: f64,
    destination: &mut dyn AudioDestination,
  ) -> usize {
    let in_window = |start_time: Seconds| start_time >= from && start_time < to;
    let mut played = 0;
    match track.media() {
      TrackMedia::Drum(drums) => {
        if let Some(kit_id) = drums.drum_kit_id {
          for beat in drums.drum_beats.iter() {
            if in_window(beat.start_time)
              && self
                .drums
                .play(destination, kit_id, beat.drum, time_offset + beat.start_time)
            {
              played += 1;
            }
          }
        }
      }
      TrackMedia::Instrument(instrument) => {
        if let Some(sample) = &instrument.sample {
          for note in instrument.notes.iter() {
            if in_window(note.start_time)
              && self.sampler.play(
                destination,
                sample.get_id(),
                note.frequency,
                note.duration,
                time_offset + note.start_time,
              )
            {
              played += 1;
            }
          }
        }
      }
    }
    played
  }
}
