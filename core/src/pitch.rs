//! Conversions between MIDI note numbers, frequencies and pitch names.

const A4_FREQUENCY: f64 = 440.0;
const A4_MIDI_NOTE: i32 = 69;

const PITCH_NAMES: [&str; 12] = [
  "C", "C♯", "D", "E♭", "E", "F", "F♯", "G", "G♯", "A", "B♭", "B",
];

pub fn frequency_from_midi_note(note: i32) -> f64 {
  A4_FREQUENCY * 2f64.powf(f64::from(note - A4_MIDI_NOTE) / 12.0)
}

pub fn midi_note_from_frequency(frequency: f64) -> i32 {
  (12.0 * (frequency / A4_FREQUENCY).log2()).round() as i32 + A4_MIDI_NOTE
}

/// Scientific pitch name such as `A4`, notes below `C0` have no name.
pub fn pitch_name(note: i32) -> Option<String> {
  if note < 12 {
    return None;
  }
  let octave = note / 12 - 1;
  Some(format!("{}{}", PITCH_NAMES[(note % 12) as usize], octave))
}

pub fn describe_frequency(frequency: Option<f64>) -> String {
  match frequency {
    Some(frequency) if frequency.is_finite() && frequency > 0.0 => {
      let note = midi_note_from_frequency(frequency);
      match pitch_name(note) {
        Some(name) => format!("{:.1} Hz ({})", frequency, name),
        None => format!("{:.1} Hz", frequency),
      }
    }
    _ => "undetectable".to_string(),
  }
}

#[cfg(test)]
mod test {
  use super::{describe_frequency, frequency_from_midi_note, midi_note_from_frequency, pitch_name};

  #[test]
  pub fn frequency_of_a4() {
    assert_eq!(frequency_from_midi_note(69), 440.0);
    assert!((frequency_from_midi_note(60) - 261.6256).abs() < 1e-3);
    assert_eq!(frequency_from_midi_note(81), 880.0);
  }

  #[test]
  pub fn midi_note_of_frequency() {
    assert_eq!(midi_note_from_frequency(440.0), 69);
    assert_eq!(midi_note_from_frequency(261.63), 60);
    assert_eq!(midi_note_from_frequency(450.0), 69);
    assert_eq!(midi_note_from_frequency(82.41), 40);
  }

  #[test]
  pub fn pitch_names() {
    assert_eq!(pitch_name(69), Some("A4".to_string()));
    assert_eq!(pitch_name(61), Some("C♯4".to_string()));
    assert_eq!(pitch_name(12), Some("C0".to_string()));
    assert_eq!(pitch_name(11), None);
  }

  #[test]
  pub fn describe() {
    assert_eq!(describe_frequency(Some(440.0)), "440.0 Hz (A4)");
    assert_eq!(describe_frequency(None), "undetectable");
    assert_eq!(describe_frequency(Some(std::f64::NAN)), "undetectable");
  }
}
