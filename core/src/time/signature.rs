#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signature {
  beats_per_measure: u32, // numerator
  beat_type: u32,         // denominator
}

impl Signature {
  pub fn new(beats_per_measure: u32, beat_type: u32) -> Signature {
    Signature {
      beats_per_measure,
      beat_type,
    }
  }

  pub fn get_beats_per_measure(&self) -> u32 {
    self.beats_per_measure
  }

  pub fn get_beat_type(&self) -> u32 {
    self.beat_type
  }

  /// Length of a measure expressed in whole notes, `3/4` is `0.75`.
  pub fn get_whole_beats_per_measure(&self) -> f64 {
    f64::from(self.beats_per_measure) / f64::from(self.beat_type)
  }
}

#[cfg(test)]
mod test {

  use super::Signature;

  #[test]
  pub fn signature_new() {
    let signature = Signature::new(3, 4);
    assert_eq!(signature.get_beats_per_measure(), 3);
    assert_eq!(signature.get_beat_type(), 4);
  }

  #[test]
  pub fn whole_beats_per_measure() {
    assert_eq!(Signature::new(3, 4).get_whole_beats_per_measure(), 0.75);
    assert_eq!(Signature::new(6, 8).get_whole_beats_per_measure(), 0.75);
    assert!(Signature::new(4, 0)
      .get_whole_beats_per_measure()
      .is_infinite());
  }
}
