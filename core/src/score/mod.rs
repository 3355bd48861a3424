pub mod midi;
pub mod smf;
pub mod tablature;
pub mod timeline;

pub use self::midi::{convert_midi_data_to_tracks, MidiData, MidiEvent, MidiHeader, MidiMessage};
pub use self::smf::read_midi_file;
pub use self::tablature::{import_tablature_json, is_valid_tablature, TablatureTrack};
pub use self::timeline::{flatten_measures, Beat, Measure, ScoreNote, TimedNote, Voice};

use crate::error::ValidationError;
use crate::logger::LoggerRef;
use crate::song::Track;

/// Imports either a Standard MIDI File or a tablature JSON document.
pub fn import_score(data: &[u8], logger: &LoggerRef) -> Result<Vec<Track>, ValidationError> {
  if data.starts_with(b"MThd") {
    convert_midi_data_to_tracks(&read_midi_file(data)?, logger)
  } else {
    let json = std::str::from_utf8(data).map_err(|err| ValidationError::UnrecognizedShape {
      cause: err.to_string(),
    })?;
    import_tablature_json(json, logger).map(|track| vec![track])
  }
}
