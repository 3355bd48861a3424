const SECONDS_PER_MINUTE: f64 = 60.0;

/// Beats per minute counted in `beat_type` notes, a quarter note at 120 is `Tempo::new(4, 120.0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
  beat_type: u32,
  bpm: f64,
}

impl Tempo {
  pub fn new(beat_type: u32, bpm: f64) -> Tempo {
    Tempo { beat_type, bpm }
  }

  pub fn get_beat_type(&self) -> u32 {
    self.beat_type
  }

  pub fn get_bpm(&self) -> f64 {
    self.bpm
  }

  /// Seconds taken by a whole note.
  pub fn get_whole_beat_duration(&self) -> f64 {
    SECONDS_PER_MINUTE * f64::from(self.beat_type) / self.bpm
  }
}

#[cfg(test)]
mod test {

  use super::Tempo;

  #[test]
  pub fn tempo_new() {
    let tempo = Tempo::new(4, 120.0);
    assert_eq!(tempo.get_beat_type(), 4);
    assert_eq!(tempo.get_bpm(), 120.0);
  }

  #[test]
  pub fn whole_beat_duration() {
    assert_eq!(Tempo::new(4, 120.0).get_whole_beat_duration(), 2.0);
    assert_eq!(Tempo::new(8, 120.0).get_whole_beat_duration(), 4.0);
    assert!(Tempo::new(4, 0.0).get_whole_beat_duration().is_infinite());
  }
}
