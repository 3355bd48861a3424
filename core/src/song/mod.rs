pub mod sample;
pub mod track;

pub use self::sample::{Sample, SampleId};
pub use self::track::{
  DrumBeat, DrumTrack, DrumType, InstrumentTrack, Note, Track, TrackId, TrackMedia,
};
