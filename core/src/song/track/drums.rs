use crate::players::kits::DrumKitId;
use crate::time::Seconds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DrumType {
  Bass1, // kick
  Bass2,
  FloorTom1,
  FloorTom2,
  Tom1,
  Tom2,
  Tom3,
  Snare,
  OpenHiHat,
  ClosedHiHat,
  FootHiHat,
  LooseHiHat,
  Crash,
}

impl DrumType {
  /// General MIDI percussion key (also used by tablature drum frets) to drum.
  pub fn from_note(note: i32) -> Option<DrumType> {
    match note {
      33 | 38 | 40 => Some(DrumType::Snare),
      35 => Some(DrumType::Bass2),
      36 => Some(DrumType::Bass1),
      41 | 45 => Some(DrumType::FloorTom1),
      42 => Some(DrumType::ClosedHiHat),
      43 => Some(DrumType::FloorTom2),
      44 => Some(DrumType::FootHiHat),
      46 => Some(DrumType::OpenHiHat),
      47 => Some(DrumType::Tom3),
      48 => Some(DrumType::Tom2),
      49 | 55 | 57 => Some(DrumType::Crash),
      50 => Some(DrumType::Tom1),
      92 => Some(DrumType::LooseHiHat),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrumBeat {
  pub start_time: Seconds,
  pub drum: DrumType,
}

impl DrumBeat {
  pub fn new(start_time: Seconds, drum: DrumType) -> DrumBeat {
    DrumBeat { start_time, drum }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrumTrack {
  pub drum_beats: Vec<DrumBeat>,
  pub drum_kit_id: Option<DrumKitId>,
}

impl DrumTrack {
  pub fn new(drum_beats: Vec<DrumBeat>) -> DrumTrack {
    DrumTrack {
      drum_beats,
      drum_kit_id: None,
    }
  }
}
