//! Conversion of MIDI event streams into tracks.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde_derive::Deserialize;

use crate::error::ValidationError;
use crate::logger::{LoggerRef, Severity};
use crate::pitch::frequency_from_midi_note;
use crate::song::{DrumBeat, DrumType, Note, Track};
use crate::time::Seconds;

/// 120 bpm when there are no tempo events.
pub const DEFAULT_MICROSECONDS_PER_BEAT: u32 = 500_000;

pub const DRUM_CHANNEL: u8 = 9;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MidiHeader {
  pub format: u16,
  pub ticks_per_beat: Option<u16>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MidiMessage {
  SetTempo {
    #[serde(rename = "microsecondsPerBeat")]
    microseconds_per_beat: u32,
  },
  NoteOn {
    channel: u8,
    #[serde(rename = "noteNumber")]
    note_number: u8,
    velocity: u8,
  },
  NoteOff {
    channel: u8,
    #[serde(rename = "noteNumber")]
    note_number: u8,
    #[serde(default)]
    velocity: u8,
  },
  TrackName {
    text: String,
  },
  #[serde(other)]
  Other,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MidiEvent {
  pub delta_time: u32,
  #[serde(flatten)]
  pub message: MidiMessage,
}

impl MidiEvent {
  pub fn new(delta_time: u32, message: MidiMessage) -> MidiEvent {
    MidiEvent {
      delta_time,
      message,
    }
  }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct MidiData {
  pub header: MidiHeader,
  pub tracks: Vec<Vec<MidiEvent>>,
}

impl MidiData {
  pub fn from_json(json: &str) -> Result<MidiData, ValidationError> {
    serde_json::from_str(json).map_err(|err| ValidationError::UnrecognizedShape {
      cause: err.to_string(),
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TempoChange {
  ticks: u64,
  microseconds_per_beat: u32,
}

fn tempo_changes<'a, I>(events: I) -> Vec<TempoChange>
where
  I: IntoIterator<Item = &'a MidiEvent>,
{
  let mut ticks = 0u64;
  let mut changes = Vec::new();
  for event in events {
    ticks += u64::from(event.delta_time);
    if let MidiMessage::SetTempo {
      microseconds_per_beat,
    } = event.message
    {
      changes.push(TempoChange {
        ticks,
        microseconds_per_beat,
      });
    }
  }
  changes
}

/// Converts absolute ticks into seconds integrating every tempo change on the way.
struct TempoMap {
  changes: Vec<TempoChange>,
  ticks_per_beat: f64,
}

impl TempoMap {
  fn new(mut changes: Vec<TempoChange>, ticks_per_beat: u16) -> TempoMap {
    changes.sort_by_key(|change| change.ticks);
    TempoMap {
      changes,
      ticks_per_beat: f64::from(ticks_per_beat),
    }
  }

  fn tick_duration(&self, microseconds_per_beat: u32) -> Seconds {
    f64::from(microseconds_per_beat) / 1_000_000.0 / self.ticks_per_beat
  }

  fn seconds_at(&self, ticks: u64) -> Seconds {
    let mut seconds = 0.0;
    let mut last_ticks = 0u64;
    let mut microseconds_per_beat = DEFAULT_MICROSECONDS_PER_BEAT;
    for change in self.changes.iter().take_while(|change| change.ticks <= ticks) {
      seconds += (change.ticks - last_ticks) as f64 * self.tick_duration(microseconds_per_beat);
      last_ticks = change.ticks;
      microseconds_per_beat = change.microseconds_per_beat;
    }
    seconds + (ticks - last_ticks) as f64 * self.tick_duration(microseconds_per_beat)
  }
}

#[derive(Debug, Clone, Copy)]
struct RunningNote {
  start_time: Seconds,
  note_number: u8,
}

#[derive(Debug, Clone, Copy)]
struct EndedNote {
  start_time: Seconds,
  note_number: u8,
  duration: Seconds,
}

fn describe_running(notes: &[RunningNote]) -> String {
  notes
    .iter()
    .map(|note| format!("{} at {:.3}s", note.note_number, note.start_time))
    .collect::<Vec<_>>()
    .join(", ")
}

fn count_unknown(unknown: &BTreeMap<i32, usize>) -> String {
  let mut counts = String::new();
  for (index, (value, count)) in unknown.iter().enumerate() {
    if index > 0 {
      counts.push_str(", ");
    }
    let _ = write!(counts, "{} (x{})", value, count);
  }
  counts
}

/// Maps drum indices, collecting the ones without a drum so they can be reported once.
pub(crate) fn map_drums<I>(hits: I, unknown: &mut BTreeMap<i32, usize>) -> Vec<DrumBeat>
where
  I: IntoIterator<Item = (Seconds, i32)>,
{
  hits
    .into_iter()
    .filter_map(|(start_time, index)| match DrumType::from_note(index) {
      Some(drum) => Some(DrumBeat::new(start_time, drum)),
      None => {
        *unknown.entry(index).or_insert(0) += 1;
        None
      }
    })
    .collect()
}

pub(crate) fn report_unknown(
  logger: &LoggerRef,
  what: &str,
  unknown: &BTreeMap<i32, usize>,
) {
  if !unknown.is_empty() {
    let message = format!("Unknown drum {}: {}.", what, count_unknown(unknown));
    logger.log(Severity::Warning, &message);
  }
}

fn convert_events(
  events: &[MidiEvent],
  tempo_map: &TempoMap,
  unknown_drums: &mut BTreeMap<i32, usize>,
  logger: &LoggerRef,
) -> Vec<Track> {
  let mut notes_by_channel: BTreeMap<u8, Vec<EndedNote>> = BTreeMap::new();
  let mut running_by_channel: BTreeMap<u8, Vec<RunningNote>> = BTreeMap::new();

  let mut ticks = 0u64;
  for event in events.iter() {
    ticks += u64::from(event.delta_time);
    let current_time = tempo_map.seconds_at(ticks);

    let (channel, note_number, started) = match event.message {
      MidiMessage::NoteOn {
        channel,
        note_number,
        velocity,
      } => (channel, note_number, velocity > 0),
      MidiMessage::NoteOff {
        channel,
        note_number,
        ..
      } => (channel, note_number, false),
      _ => continue,
    };

    let running = running_by_channel.entry(channel).or_insert_with(Vec::new);
    if started {
      running.push(RunningNote {
        start_time: current_time,
        note_number,
      });
      continue;
    }

    match running
      .iter()
      .position(|note| note.note_number == note_number)
    {
      Some(position) => {
        let note = running.remove(position);
        notes_by_channel
          .entry(channel)
          .or_insert_with(Vec::new)
          .push(EndedNote {
            start_time: note.start_time,
            note_number,
            duration: current_time - note.start_time,
          });
      }
      None => {
        let message = format!(
          "Note ended but not started: channel {}, note {} at {:.3}s.",
          channel, note_number, current_time
        );
        logger.log(Severity::Warning, &message);
      }
    }
  }

  for (channel, running) in running_by_channel.iter() {
    if !running.is_empty() {
      let message = format!(
        "Notes started but not ended. Channel: {} (index: {}), notes: {}.",
        *channel as u32 + 1,
        channel,
        describe_running(running)
      );
      logger.log(Severity::Warning, &message);
    }
  }

  let track_name = events
    .iter()
    .find_map(|event| match &event.message {
      MidiMessage::TrackName { text } => Some(text.as_str()),
      _ => None,
    })
    .unwrap_or("");
  let multiple_channels = notes_by_channel.len() > 1;

  notes_by_channel
    .into_iter()
    .map(|(channel, mut notes)| {
      notes.sort_by(|a, b| {
        a.start_time
          .partial_cmp(&b.start_time)
          .unwrap_or(std::cmp::Ordering::Equal)
      });

      let instrument = if multiple_channels {
        format!("{} channel {}", track_name, channel as u32 + 1)
      } else {
        track_name.to_string()
      };

      if channel == DRUM_CHANNEL {
        let hits = notes
          .iter()
          .map(|note| (note.start_time, i32::from(note.note_number)));
        Track::drums(instrument, map_drums(hits, unknown_drums))
      } else {
        let notes = notes
          .iter()
          .map(|note| {
            Note::new(
              note.start_time,
              frequency_from_midi_note(i32::from(note.note_number)),
              note.duration,
            )
          })
          .collect();
        Track::instrument(instrument, notes)
      }
    })
    .collect()
}

/// One track per used channel of every MIDI track, in channel order.
///
/// Files with format above 0 carry the tempo changes in their first track,
/// which produces no tracks. Format 0 files change the tempo inline.
pub fn convert_midi_data_to_tracks(
  data: &MidiData,
  logger: &LoggerRef,
) -> Result<Vec<Track>, ValidationError> {
  let ticks_per_beat = data
    .header
    .ticks_per_beat
    .filter(|ticks| *ticks > 0)
    .ok_or(ValidationError::TicksPerBeatRequired)?;

  let (tempo_track, tracks): (&[Vec<MidiEvent>], &[Vec<MidiEvent>]) =
    if data.header.format > 0 && !data.tracks.is_empty() {
      data.tracks.split_at(1)
    } else {
      (&[][..], &data.tracks[..])
    };
  let global_changes = tempo_changes(tempo_track.iter().flatten());

  let mut unknown_drums = BTreeMap::new();
  let mut result = Vec::new();
  for events in tracks.iter() {
    let mut changes = global_changes.clone();
    changes.extend(tempo_changes(events.iter()));
    let tempo_map = TempoMap::new(changes, ticks_per_beat);
    result.extend(convert_events(events, &tempo_map, &mut unknown_drums, logger));
  }

  report_unknown(logger, "midi notes", &unknown_drums);

  Ok(result)
}
