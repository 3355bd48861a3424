pub mod drums;
pub mod instrument;

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::players::kits::DrumKitId;
use crate::song::Sample;
use crate::time::Seconds;

pub use self::drums::{DrumBeat, DrumTrack, DrumType};
pub use self::instrument::{InstrumentTrack, Note};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(Uuid);

impl TrackId {
  pub fn new_v4() -> TrackId {
    TrackId(Uuid::new_v4())
  }
}

impl fmt::Display for TrackId {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone)]
pub enum TrackMedia {
  Drum(DrumTrack),
  Instrument(InstrumentTrack),
}

#[derive(Debug, Clone)]
pub struct Track {
  id: TrackId,
  name: String,
  instrument: String,
  mute: bool,
  media: TrackMedia,
}

impl Track {
  pub fn new<T, I>(name: T, instrument: I, media: TrackMedia) -> Track
  where
    T: Into<String>,
    I: Into<String>,
  {
    Track {
      id: TrackId::new_v4(),
      name: name.into(),
      instrument: instrument.into(),
      mute: false,
      media,
    }
  }

  pub fn drums<T: Into<String>>(instrument: T, drum_beats: Vec<DrumBeat>) -> Track {
    let instrument = instrument.into();
    Track::new(
      instrument.clone(),
      instrument,
      TrackMedia::Drum(DrumTrack::new(drum_beats)),
    )
  }

  pub fn instrument<T: Into<String>>(instrument: T, notes: Vec<Note>) -> Track {
    let instrument = instrument.into();
    Track::new(
      instrument.clone(),
      instrument,
      TrackMedia::Instrument(InstrumentTrack::new(notes)),
    )
  }

  pub fn get_id(&self) -> TrackId {
    self.id
  }

  pub fn get_name(&self) -> &str {
    &self.name
  }

  pub fn set_name<T: Into<String>>(&mut self, name: T) {
    self.name = name.into();
  }

  pub fn get_instrument(&self) -> &str {
    &self.instrument
  }

  pub fn is_muted(&self) -> bool {
    self.mute
  }

  pub fn set_mute(&mut self, mute: bool) {
    self.mute = mute;
  }

  pub fn media(&self) -> &TrackMedia {
    &self.media
  }

  pub fn media_mut(&mut self) -> &mut TrackMedia {
    &mut self.media
  }

  /// Selects the kit of a drum track, ignored for other tracks.
  pub fn with_drum_kit(mut self, kit_id: DrumKitId) -> Track {
    if let TrackMedia::Drum(drums) = &mut self.media {
      drums.drum_kit_id = Some(kit_id);
    }
    self
  }

  /// Selects the sample of an instrument track, ignored for other tracks.
  pub fn with_sample(mut self, sample: Arc<Sample>) -> Track {
    if let TrackMedia::Instrument(instrument) = &mut self.media {
      instrument.sample = Some(sample);
    }
    self
  }

  /// A track can only be played once a kit or a sample has been chosen for it.
  pub fn is_playable(&self) -> bool {
    match &self.media {
      TrackMedia::Drum(drums) => drums.drum_kit_id.is_some(),
      TrackMedia::Instrument(instrument) => instrument.sample.is_some(),
    }
  }

  /// When the last event stops sounding, drum hits are assumed to last `drum_hit_duration`.
  pub fn get_end_time(&self, drum_hit_duration: Seconds) -> Seconds {
    match &self.media {
      TrackMedia::Drum(drums) => drums
        .drum_beats
        .last()
        .map_or(0.0, |beat| beat.start_time + drum_hit_duration),
      TrackMedia::Instrument(instrument) => instrument
        .notes
        .iter()
        .map(|note| note.start_time + note.duration)
        .fold(0.0, f64::max),
    }
  }
}
