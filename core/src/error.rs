use failure::Fail;

/// Malformed score input. Fatal to the import that raised it.
#[derive(Debug, Fail, Clone, PartialEq)]
pub enum ValidationError {
  #[fail(display = "Signature is not set.")]
  SignatureNotSet,

  #[fail(display = "Tempo is not set.")]
  TempoNotSet,

  #[fail(display = "Note string is not set.")]
  MissingString,

  #[fail(display = "Note fret is not set.")]
  MissingFret,

  #[fail(display = "A tie can not be the first note.")]
  TieWithoutPrecedingNote,

  #[fail(display = "Voice {} is missing in measure {}.", voice, measure)]
  MissingVoice { voice: usize, measure: usize },

  #[fail(display = "Tuning data is required.")]
  TuningRequired,

  #[fail(display = "String {} is out of the tuning range.", string)]
  TuningStringOutOfRange { string: usize },

  #[fail(display = "Unrecognized score format: {}", cause)]
  UnrecognizedShape { cause: String },

  #[fail(display = "Header value `ticksPerBeat` is required.")]
  TicksPerBeatRequired,

  #[fail(display = "Invalid MIDI file: {}", cause)]
  InvalidMidiFile { cause: String },
}

/// Operations requested on an empty or unplayable working set.
#[derive(Debug, Fail, Clone, PartialEq)]
pub enum ResourceError {
  #[fail(display = "No tracks can be played.")]
  NoTracks,

  #[fail(display = "No unmuted tracks to render.")]
  NoRenderableTracks,
}

#[derive(Debug, Fail, Clone, PartialEq)]
pub enum ComputationError {
  #[fail(display = "Not enough signal.")]
  NotEnoughSignal,

  #[fail(display = "Stretching failed: {}", cause)]
  StretchFailed { cause: String },

  #[fail(display = "The task was dropped before completing.")]
  TaskDropped,
}

#[derive(Debug, Fail)]
pub enum AudioError {
  #[fail(display = "Failed to decode audio: {}", cause)]
  Decode { cause: String },

  #[fail(display = "Unsupported sample format: {} bits", bits)]
  UnsupportedFormat { bits: u16 },

  #[fail(display = "Exporting requires 2 data channels.")]
  TwoChannelsRequired,

  #[fail(display = "Channel lengths differ: {} and {}.", left, right)]
  ChannelLengthMismatch { left: usize, right: usize },

  #[fail(display = "Encoder failed: {}", cause)]
  Encoder { cause: String },

  #[fail(display = "I/O error: {}", cause)]
  Io { cause: String },
}

impl From<hound::Error> for AudioError {
  fn from(err: hound::Error) -> Self {
    AudioError::Decode {
      cause: err.to_string(),
    }
  }
}

impl From<std::io::Error> for AudioError {
  fn from(err: std::io::Error) -> Self {
    AudioError::Io {
      cause: err.to_string(),
    }
  }
}
