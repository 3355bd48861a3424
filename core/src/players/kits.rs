use std::fmt;

use crate::song::DrumType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrumKitId(pub u32);

impl fmt::Display for DrumKitId {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A kit recorded as a single audio file, one hit after the other.
///
/// Hits are cut out of the file in order, the n-th hit is used for all the drums of the n-th slice.
#[derive(Debug, Clone, PartialEq)]
pub struct DrumKitDefinition {
  pub id: DrumKitId,
  pub name: String,
  pub location: String,
  pub slices: Vec<Vec<DrumType>>,
}

impl DrumKitDefinition {
  pub fn new<N, L>(id: u32, name: N, location: L, slices: Vec<Vec<DrumType>>) -> DrumKitDefinition
  where
    N: Into<String>,
    L: Into<String>,
  {
    DrumKitDefinition {
      id: DrumKitId(id),
      name: name.into(),
      location: location.into(),
      slices,
    }
  }
}

fn standard_slices() -> Vec<Vec<DrumType>> {
  use DrumType::*;
  vec![
    vec![Bass1, Bass2],
    vec![Tom1],
    vec![Tom2],
    vec![Tom3],
    vec![Snare],
    vec![OpenHiHat, ClosedHiHat, FootHiHat, LooseHiHat],
  ]
}

pub fn default_drum_kits() -> Vec<DrumKitDefinition> {
  vec![
    DrumKitDefinition::new(
      1,
      "Roland R-8",
      "sounds/drum-kits/roland-r8.wav",
      standard_slices(),
    ),
    DrumKitDefinition::new(
      2,
      "Acoustic kit",
      "sounds/drum-kits/acoustic-kit.wav",
      standard_slices(),
    ),
    DrumKitDefinition::new(3, "Stark", "sounds/drum-kits/stark.wav", standard_slices()),
  ]
}
