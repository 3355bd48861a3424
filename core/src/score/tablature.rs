//! Tablature documents: a JSON track with measures of beats played on strings and frets.

use std::collections::BTreeMap;

use serde_derive::Deserialize;
use serde_json::Value;

use super::midi::{map_drums, report_unknown};
use super::timeline::{flatten_measures, Measure, TimedNote};
use crate::error::ValidationError;
use crate::logger::LoggerRef;
use crate::pitch::frequency_from_midi_note;
use crate::song::{DrumBeat, Note, Track};

/// Instrument id of percussion tracks, frets are drum indices for them.
pub const DRUMS_INSTRUMENT_ID: u32 = 1024;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TablatureTrack {
  pub name: Option<String>,
  pub instrument: Option<String>,
  #[serde(default)]
  pub instrument_id: u32,
  pub tuning: Option<Vec<i32>>,
  pub voices: usize,
  pub measures: Vec<Measure>,
}

impl TablatureTrack {
  pub fn is_drums(&self) -> bool {
    self.instrument_id == DRUMS_INSTRUMENT_ID
  }

  fn notes(&self) -> Result<Vec<TimedNote>, ValidationError> {
    flatten_measures(&self.measures, self.voices)
  }

  pub fn to_drum_beats(&self, logger: &LoggerRef) -> Result<Vec<DrumBeat>, ValidationError> {
    let mut unknown = BTreeMap::new();
    let hits = self
      .notes()?
      .into_iter()
      .map(|note| (note.start_time, note.fret));
    let beats = map_drums(hits, &mut unknown);
    report_unknown(logger, "frets", &unknown);
    Ok(beats)
  }

  pub fn to_notes(&self) -> Result<Vec<Note>, ValidationError> {
    let tuning = self
      .tuning
      .as_ref()
      .ok_or(ValidationError::TuningRequired)?;

    self
      .notes()?
      .into_iter()
      .map(|note| {
        let open_string = tuning
          .get(note.string)
          .ok_or(ValidationError::TuningStringOutOfRange {
            string: note.string,
          })?;
        Ok(Note::new(
          note.start_time,
          frequency_from_midi_note(open_string + note.fret),
          note.duration,
        ))
      })
      .collect()
  }

  pub fn into_track(self, logger: &LoggerRef) -> Result<Track, ValidationError> {
    let instrument = self
      .instrument
      .clone()
      .or_else(|| self.name.clone())
      .unwrap_or_default();
    let name = self.name.clone().unwrap_or_else(|| instrument.clone());

    let mut track = if self.is_drums() {
      Track::drums(instrument, self.to_drum_beats(logger)?)
    } else {
      Track::instrument(instrument, self.to_notes()?)
    };
    track.set_name(name);
    Ok(track)
  }
}

/// Only the outer shape is checked, anything deeper fails while flattening.
pub fn is_valid_tablature(json: &Value) -> bool {
  json.get("voices").map_or(false, Value::is_number)
    && json.get("measures").map_or(false, Value::is_array)
}

pub fn parse_tablature_json(json: &str) -> Result<TablatureTrack, ValidationError> {
  let value: Value = serde_json::from_str(json).map_err(|err| ValidationError::UnrecognizedShape {
    cause: err.to_string(),
  })?;

  if !is_valid_tablature(&value) {
    return Err(ValidationError::UnrecognizedShape {
      cause: "expected numeric `voices` and an array of `measures`".to_string(),
    });
  }

  serde_json::from_value(value).map_err(|err| ValidationError::UnrecognizedShape {
    cause: err.to_string(),
  })
}

pub fn import_tablature_json(json: &str, logger: &LoggerRef) -> Result<Track, ValidationError> {
  parse_tablature_json(json)?.into_track(logger)
}
