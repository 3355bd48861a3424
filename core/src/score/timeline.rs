//! Flattening of measures, voices and beats into notes with absolute times.
//!
//! Repeats are expanded first into the sequence of measures as they are played,
//! then that sequence is walked accumulating time. Signature and tempo changes
//! stay in effect until the next change, also across repeats.

use std::cmp::Ordering;

use serde_derive::Deserialize;

use crate::error::ValidationError;
use crate::time::{Seconds, Signature, Tempo};

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TempoChange {
  #[serde(rename = "type")]
  pub beat_type: u32,
  pub bpm: f64,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ScoreNote {
  pub string: Option<usize>,
  pub fret: Option<i32>,
  #[serde(default)]
  pub tie: bool,
  #[serde(default)]
  pub rest: bool,
}

impl ScoreNote {
  pub fn new(string: usize, fret: i32) -> ScoreNote {
    ScoreNote {
      string: Some(string),
      fret: Some(fret),
      ..ScoreNote::default()
    }
  }

  pub fn tied(string: usize, fret: i32) -> ScoreNote {
    ScoreNote {
      tie: true,
      ..ScoreNote::new(string, fret)
    }
  }

  pub fn rest() -> ScoreNote {
    ScoreNote {
      rest: true,
      ..ScoreNote::default()
    }
  }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Beat {
  /// Fraction of a whole note.
  pub duration: [u32; 2],
  pub tempo: Option<TempoChange>,
  #[serde(default)]
  pub rest: bool,
  #[serde(default)]
  pub notes: Vec<ScoreNote>,
}

impl Beat {
  pub fn new(duration: [u32; 2], notes: Vec<ScoreNote>) -> Beat {
    Beat {
      duration,
      tempo: None,
      rest: false,
      notes,
    }
  }

  pub fn with_tempo(mut self, beat_type: u32, bpm: f64) -> Beat {
    self.tempo = Some(TempoChange { beat_type, bpm });
    self
  }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Voice {
  #[serde(default)]
  pub beats: Vec<Beat>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
  pub signature: Option<[u32; 2]>,
  #[serde(default)]
  pub voices: Vec<Voice>,
  #[serde(default)]
  pub repeat_start: bool,
  pub repeat: Option<u32>,
  #[serde(default)]
  pub alternate_ending: Vec<u32>,
}

impl Measure {
  /// Measure with a single voice.
  pub fn new(beats: Vec<Beat>) -> Measure {
    Measure {
      voices: vec![Voice { beats }],
      ..Measure::default()
    }
  }

  pub fn with_signature(mut self, beats_per_measure: u32, beat_type: u32) -> Measure {
    self.signature = Some([beats_per_measure, beat_type]);
    self
  }

  pub fn with_repeat_start(mut self) -> Measure {
    self.repeat_start = true;
    self
  }

  pub fn with_repeat(mut self, repeat: u32) -> Measure {
    self.repeat = Some(repeat);
    self
  }

  pub fn with_alternate_ending(mut self, endings: Vec<u32>) -> Measure {
    self.alternate_ending = endings;
    self
  }
}

/// A played note, `string` and `fret` are the raw indices of the score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedNote {
  pub string: usize,
  pub fret: i32,
  pub start_time: Seconds,
  pub duration: Seconds,
}

struct BarNote {
  string: usize,
  fret: i32,
  tie: bool,
}

struct BarBeat {
  fraction: f64,
  tempo: Option<Tempo>,
  notes: Vec<BarNote>,
}

struct Bar {
  signature: Option<Signature>,
  beats: Vec<BarBeat>,
}

/// Indices of the measures in the order they are played.
pub fn expand_repeats(measures: &[Measure]) -> Vec<usize> {
  let mut bars: Vec<usize> = Vec::with_capacity(measures.len());
  let mut repeat_start: Option<usize> = None;
  let mut repeat_end: Option<usize> = None;

  for (index, measure) in measures.iter().enumerate() {
    if measure.repeat_start {
      repeat_start = Some(bars.len());
      repeat_end = None;
    }

    let repeats = measure.repeat.map_or(false, |repeat| repeat > 1);
    let has_endings = !measure.alternate_ending.is_empty();

    match repeat_start {
      Some(start) if has_endings => {
        let end = *repeat_end.get_or_insert(bars.len());
        let section = bars.get(start..end).unwrap_or(&[]).to_vec();
        for ending in measure.alternate_ending.iter() {
          bars.push(index);
          if Some(*ending) != measure.repeat {
            bars.extend_from_slice(&section);
          }
        }
        if measure.repeat.is_some() {
          repeat_start = None;
          repeat_end = None;
        }
      }
      Some(start) if repeats => {
        bars.push(index);
        let section = bars[start..].to_vec();
        for _ in 1..measure.repeat.unwrap_or(1) {
          bars.extend_from_slice(&section);
        }
        repeat_start = None;
        repeat_end = None;
      }
      _ => bars.push(index),
    }
  }

  bars
}

fn build_bar(measure: &Measure, measure_index: usize, voice: usize) -> Result<Bar, ValidationError> {
  let beats = measure
    .voices
    .get(voice)
    .ok_or(ValidationError::MissingVoice {
      voice,
      measure: measure_index,
    })?
    .beats
    .iter()
    .map(|beat| {
      let notes = beat
        .notes
        .iter()
        .filter(|note| !note.rest)
        .map(|note| {
          Ok(BarNote {
            string: note.string.ok_or(ValidationError::MissingString)?,
            fret: note.fret.ok_or(ValidationError::MissingFret)?,
            tie: note.tie,
          })
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;

      Ok(BarBeat {
        fraction: f64::from(beat.duration[0]) / f64::from(beat.duration[1]),
        tempo: beat
          .tempo
          .as_ref()
          .map(|tempo| Tempo::new(tempo.beat_type, tempo.bpm)),
        notes,
      })
    })
    .collect::<Result<Vec<_>, ValidationError>>()?;

  Ok(Bar {
    signature: measure
      .signature
      .map(|[beats_per_measure, beat_type]| Signature::new(beats_per_measure, beat_type)),
    beats,
  })
}

fn is_set(value: f64) -> bool {
  value.is_finite() && value > 0.0
}

fn flatten_bars(bars: &[Bar], sequence: &[usize]) -> Result<Vec<TimedNote>, ValidationError> {
  let mut notes: Vec<TimedNote> = Vec::new();

  let mut whole_beats_per_measure = 0.0;
  let mut whole_beat_duration = 0.0;
  let mut time_at_start_of_measure = 0.0;

  for bar in sequence.iter().map(|index| &bars[*index]) {
    if let Some(signature) = bar.signature {
      whole_beats_per_measure = signature.get_whole_beats_per_measure();
    }

    let mut time_at_start_of_beat = 0.0;
    for beat in bar.beats.iter() {
      if let Some(tempo) = beat.tempo {
        whole_beat_duration = tempo.get_whole_beat_duration();
      }

      if !is_set(whole_beats_per_measure) {
        return Err(ValidationError::SignatureNotSet);
      }
      if !is_set(whole_beat_duration) {
        return Err(ValidationError::TempoNotSet);
      }

      let duration = whole_beat_duration * beat.fraction;

      for note in beat.notes.iter() {
        if note.tie {
          let previous = notes
            .last_mut()
            .ok_or(ValidationError::TieWithoutPrecedingNote)?;
          previous.duration += duration;
        } else {
          notes.push(TimedNote {
            string: note.string,
            fret: note.fret,
            start_time: time_at_start_of_measure + time_at_start_of_beat,
            duration,
          });
        }
      }

      time_at_start_of_beat += duration;
    }

    time_at_start_of_measure += whole_beats_per_measure * whole_beat_duration;
  }

  Ok(notes)
}

/// Notes of a single voice, in playing order.
pub fn flatten_voice(measures: &[Measure], voice: usize) -> Result<Vec<TimedNote>, ValidationError> {
  let bars = measures
    .iter()
    .enumerate()
    .map(|(index, measure)| build_bar(measure, index, voice))
    .collect::<Result<Vec<_>, _>>()?;
  flatten_bars(&bars, &expand_repeats(measures))
}

/// Notes of all voices merged and sorted by start time.
pub fn flatten_measures(measures: &[Measure], voices: usize) -> Result<Vec<TimedNote>, ValidationError> {
  let mut notes = Vec::new();
  for voice in 0..voices {
    notes.extend(flatten_voice(measures, voice)?);
  }
  notes.sort_by(|a, b| {
    a.start_time
      .partial_cmp(&b.start_time)
      .unwrap_or(Ordering::Equal)
  });
  Ok(notes)
}

#[cfg(test)]
mod test {
  use super::{expand_repeats, flatten_measures, flatten_voice, Beat, Measure, ScoreNote, Voice};
  use crate::error::ValidationError;

  fn note_beat(fret: i32) -> Beat {
    Beat::new([1, 4], vec![ScoreNote::new(0, fret)])
  }

  fn frets_and_times(measures: &[Measure]) -> Vec<(i32, f64)> {
    flatten_measures(measures, 1)
      .unwrap()
      .iter()
      .map(|note| (note.fret, note.start_time))
      .collect()
  }

  #[test]
  pub fn simple_measures() {
    let measures = vec![
      Measure::new(vec![
        Beat::new([1, 4], vec![ScoreNote::rest()]).with_tempo(4, 120.0),
        Beat::new([1, 16], vec![ScoreNote::new(0, 36)]),
        Beat::new([3, 16], vec![ScoreNote::rest()]),
        Beat::new([1, 16], vec![ScoreNote::new(5, 35)]),
        Beat::new([3, 16], vec![ScoreNote::rest()]),
      ])
      .with_signature(4, 4),
      Measure::new(vec![Beat::new([1, 16], vec![ScoreNote::new(0, 41)])]),
    ];

    let notes = flatten_measures(&measures, 1).unwrap();
    assert_eq!(notes.len(), 3);
    assert_eq!((notes[0].fret, notes[0].start_time, notes[0].duration), (36, 0.5, 0.125));
    assert_eq!((notes[1].string, notes[1].start_time), (5, 1.0));
    assert_eq!(notes[2].start_time, 2.0);
  }

  #[test]
  pub fn measure_length_comes_from_signature() {
    // the beats only fill half of the measure
    let measures = vec![
      Measure::new(vec![note_beat(1).with_tempo(4, 60.0)]).with_signature(2, 4),
      Measure::new(vec![note_beat(2)]),
    ];
    assert_eq!(frets_and_times(&measures), vec![(1, 0.0), (2, 2.0)]);
  }

  #[test]
  pub fn ties_extend_the_previous_note() {
    let measures = vec![
      Measure::new(vec![
        Beat::new([1, 4], vec![ScoreNote::rest()]).with_tempo(4, 120.0),
        Beat::new([1, 4], vec![ScoreNote::new(0, 1)]),
        Beat::new([1, 2], vec![ScoreNote::new(0, 2)]),
      ])
      .with_signature(4, 4),
      Measure::new(vec![
        Beat::new([1, 8], vec![ScoreNote::tied(0, 2)]),
        Beat::new([1, 8], vec![ScoreNote::new(0, 3)]),
      ]),
    ];

    let notes = flatten_measures(&measures, 1).unwrap();
    assert_eq!(notes.len(), 3);
    assert_eq!((notes[0].start_time, notes[0].duration), (0.5, 0.5));
    assert_eq!((notes[1].start_time, notes[1].duration), (1.0, 1.25));
    assert_eq!((notes[2].start_time, notes[2].duration), (2.25, 0.25));
  }

  #[test]
  pub fn tie_first_is_invalid() {
    let measures = vec![Measure::new(vec![
      Beat::new([1, 4], vec![ScoreNote::tied(0, 1)]).with_tempo(4, 120.0)
    ])
    .with_signature(4, 4)];
    assert_eq!(
      flatten_measures(&measures, 1),
      Err(ValidationError::TieWithoutPrecedingNote)
    );
  }

  #[test]
  pub fn signature_and_tempo_required() {
    let no_signature = vec![Measure::new(vec![note_beat(1).with_tempo(4, 120.0)])];
    assert_eq!(
      flatten_measures(&no_signature, 1),
      Err(ValidationError::SignatureNotSet)
    );

    let no_tempo = vec![Measure::new(vec![note_beat(1)]).with_signature(4, 4)];
    assert_eq!(
      flatten_measures(&no_tempo, 1),
      Err(ValidationError::TempoNotSet)
    );

    let zero_bpm = vec![Measure::new(vec![note_beat(1).with_tempo(4, 0.0)]).with_signature(4, 4)];
    assert_eq!(
      flatten_measures(&zero_bpm, 1),
      Err(ValidationError::TempoNotSet)
    );
  }

  #[test]
  pub fn missing_indices() {
    let no_fret = vec![Measure::new(vec![Beat::new(
      [1, 4],
      vec![ScoreNote {
        string: Some(1),
        ..ScoreNote::default()
      }],
    )
    .with_tempo(4, 120.0)])
    .with_signature(4, 4)];
    assert_eq!(
      flatten_measures(&no_fret, 1),
      Err(ValidationError::MissingFret)
    );

    let no_string = vec![Measure::new(vec![Beat::new(
      [1, 4],
      vec![ScoreNote {
        fret: Some(1),
        ..ScoreNote::default()
      }],
    )])];
    assert_eq!(
      flatten_measures(&no_string, 1),
      Err(ValidationError::MissingString)
    );
  }

  #[test]
  pub fn repeats() {
    let measures = vec![
      Measure::new(vec![note_beat(1).with_tempo(4, 60.0)]).with_signature(1, 4),
      Measure::new(vec![note_beat(2)]).with_repeat_start(),
      Measure::new(vec![note_beat(3)]).with_repeat(3),
      Measure::new(vec![note_beat(4)]),
    ];

    assert_eq!(expand_repeats(&measures), vec![0, 1, 2, 1, 2, 1, 2, 3]);
    assert_eq!(
      frets_and_times(&measures),
      vec![
        (1, 0.0),
        (2, 1.0),
        (3, 2.0),
        (2, 3.0),
        (3, 4.0),
        (2, 5.0),
        (3, 6.0),
        (4, 7.0)
      ]
    );
  }

  #[test]
  pub fn repeat_without_start_plays_once() {
    let measures = vec![
      Measure::new(vec![note_beat(1)]),
      Measure::new(vec![note_beat(2)]).with_repeat(2),
    ];
    assert_eq!(expand_repeats(&measures), vec![0, 1]);
  }

  #[test]
  pub fn repeat_clears_the_end_of_the_previous_section() {
    let measures = vec![
      Measure::new(vec![note_beat(1)]).with_repeat_start(),
      Measure::new(vec![note_beat(2)]).with_alternate_ending(vec![1]),
      Measure::new(vec![note_beat(3)]).with_repeat(2),
      Measure::new(vec![note_beat(4)]).with_repeat_start(),
      Measure::new(vec![note_beat(5)])
        .with_repeat(2)
        .with_alternate_ending(vec![1, 2]),
    ];

    assert_eq!(
      expand_repeats(&measures),
      vec![0, 1, 0, 2, 0, 1, 0, 2, 3, 4, 3, 4]
    );
  }

  #[test]
  pub fn alternate_endings() {
    let measures = vec![
      Measure::new(vec![note_beat(1).with_tempo(4, 60.0)]).with_signature(1, 4),
      Measure::new(vec![note_beat(2)]).with_repeat_start(),
      Measure::new(vec![note_beat(3)]).with_alternate_ending(vec![1, 2]),
      Measure::new(vec![note_beat(4)]).with_alternate_ending(vec![3, 4]),
      Measure::new(vec![note_beat(5)])
        .with_repeat(5)
        .with_alternate_ending(vec![5]),
      Measure::new(vec![note_beat(6)]),
    ];

    let frets: Vec<i32> = frets_and_times(&measures).iter().map(|(fret, _)| *fret).collect();
    assert_eq!(frets, vec![1, 2, 3, 2, 3, 2, 4, 2, 4, 2, 5, 6]);

    let times: Vec<f64> = frets_and_times(&measures).iter().map(|(_, t)| *t).collect();
    assert_eq!(times, (0..12).map(f64::from).collect::<Vec<_>>());
  }

  #[test]
  pub fn signature_and_tempo_changes() {
    let measures = vec![
      Measure::new(vec![
        Beat::new([6, 8], vec![ScoreNote::new(4, 0)]).with_tempo(4, 120.0)
      ])
      .with_signature(6, 8),
      Measure::new(vec![
        Beat::new([6, 8], vec![ScoreNote::new(4, 0)]).with_tempo(4, 60.0)
      ]),
      Measure::new(vec![Beat::new([1, 1], vec![ScoreNote::new(4, 0)])]).with_signature(4, 4),
    ];

    let notes = flatten_measures(&measures, 1).unwrap();
    let timing: Vec<(f64, f64)> = notes.iter().map(|n| (n.start_time, n.duration)).collect();
    assert_eq!(timing, vec![(0.0, 1.5), (1.5, 3.0), (4.5, 4.0)]);
  }

  #[test]
  pub fn voices_are_merged_sorted() {
    let measures = vec![Measure {
      signature: Some([4, 4]),
      voices: vec![
        Voice {
          beats: vec![
            Beat::new([1, 2], vec![ScoreNote::new(0, 1)]).with_tempo(4, 120.0),
            Beat::new([1, 2], vec![ScoreNote::new(0, 2)]),
          ],
        },
        Voice {
          beats: vec![
            Beat::new([1, 4], vec![ScoreNote::new(1, 10)]).with_tempo(4, 120.0),
            Beat::new([1, 4], vec![ScoreNote::new(1, 11)]),
            Beat::new([1, 4], vec![ScoreNote::new(1, 12)]),
          ],
        },
      ],
      ..Measure::default()
    }];

    let frets: Vec<(i32, f64)> = flatten_measures(&measures, 2)
      .unwrap()
      .iter()
      .map(|n| (n.fret, n.start_time))
      .collect();
    assert_eq!(
      frets,
      vec![(1, 0.0), (10, 0.0), (11, 0.5), (2, 1.0), (12, 1.0)]
    );
  }

  #[test]
  pub fn missing_voice() {
    let measures = vec![Measure::new(vec![note_beat(1)])];
    assert_eq!(
      flatten_voice(&measures, 1),
      Err(ValidationError::MissingVoice {
        voice: 1,
        measure: 0
      })
    );
  }

  #[test]
  pub fn output_is_sorted() {
    let measures = vec![
      Measure::new(vec![note_beat(1).with_tempo(4, 90.0), note_beat(2)]).with_signature(2, 4),
      Measure::new(vec![note_beat(3)]).with_repeat_start(),
      Measure::new(vec![note_beat(4), note_beat(5)])
        .with_signature(3, 4)
        .with_repeat(4),
    ];
    let notes = flatten_measures(&measures, 1).unwrap();
    assert!(notes
      .windows(2)
      .all(|pair| pair[0].start_time <= pair[1].start_time));
    assert_eq!(notes.len(), 2 + 4 * 3);
  }
}
