//! Standard MIDI File reader.

use super::midi::{MidiData, MidiEvent, MidiHeader, MidiMessage};
use crate::error::ValidationError;

const HEADER_CHUNK: &[u8; 4] = b"MThd";
const TRACK_CHUNK: &[u8; 4] = b"MTrk";

const META: u8 = 0xff;
const META_TRACK_NAME: u8 = 0x03;
const META_SET_TEMPO: u8 = 0x51;
const SYSEX_START: u8 = 0xf0;
const SYSEX_ESCAPE: u8 = 0xf7;

fn invalid<T: Into<String>>(cause: T) -> ValidationError {
  ValidationError::InvalidMidiFile {
    cause: cause.into(),
  }
}

struct Reader<'a> {
  pos: usize,
  data: &'a [u8],
}

impl<'a> Reader<'a> {
  fn new(data: &'a [u8]) -> Reader<'a> {
    Reader { pos: 0, data }
  }

  fn is_empty(&self) -> bool {
    self.pos >= self.data.len()
  }

  fn bytes(&mut self, length: usize) -> Result<&'a [u8], ValidationError> {
    let end = self
      .pos
      .checked_add(length)
      .filter(|end| *end <= self.data.len())
      .ok_or_else(|| invalid(format!("unexpected end of data at byte {}", self.pos)))?;
    let bytes = &self.data[self.pos..end];
    self.pos = end;
    Ok(bytes)
  }

  fn u8(&mut self) -> Result<u8, ValidationError> {
    self.bytes(1).map(|bytes| bytes[0])
  }

  fn u16(&mut self) -> Result<u16, ValidationError> {
    self
      .bytes(2)
      .map(|bytes| u16::from_be_bytes([bytes[0], bytes[1]]))
  }

  fn u32(&mut self) -> Result<u32, ValidationError> {
    self
      .bytes(4)
      .map(|bytes| u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
  }

  fn peek(&self) -> Result<u8, ValidationError> {
    self
      .data
      .get(self.pos)
      .cloned()
      .ok_or_else(|| invalid("unexpected end of track"))
  }

  /// Variable length quantity, at most 4 bytes.
  fn variable(&mut self) -> Result<u32, ValidationError> {
    let mut value = 0u32;
    for _ in 0..4 {
      let byte = self.u8()?;
      value = (value << 7) | u32::from(byte & 0x7f);
      if byte & 0x80 == 0 {
        return Ok(value);
      }
    }
    Err(invalid("variable length value is too long"))
  }

  fn chunk(&mut self) -> Result<([u8; 4], Reader<'a>), ValidationError> {
    let id = self.bytes(4)?;
    let length = self.u32()? as usize;
    let body = self.bytes(length)?;
    Ok(([id[0], id[1], id[2], id[3]], Reader::new(body)))
  }
}

fn read_header(reader: &mut Reader) -> Result<(MidiHeader, u16), ValidationError> {
  let (id, mut chunk) = reader.chunk()?;
  if &id != HEADER_CHUNK {
    return Err(invalid("missing MThd header"));
  }
  let format = chunk.u16()?;
  let tracks = chunk.u16()?;
  let division = chunk.u16()?;
  // SMPTE time divisions have the highest bit set and are not supported
  let ticks_per_beat = if division & 0x8000 == 0 {
    Some(division)
  } else {
    None
  };
  Ok((
    MidiHeader {
      format,
      ticks_per_beat,
    },
    tracks,
  ))
}

fn read_meta(reader: &mut Reader) -> Result<MidiMessage, ValidationError> {
  let meta_type = reader.u8()?;
  let length = reader.variable()? as usize;
  let data = reader.bytes(length)?;
  Ok(match meta_type {
    META_TRACK_NAME => MidiMessage::TrackName {
      text: String::from_utf8_lossy(data).into_owned(),
    },
    META_SET_TEMPO if length == 3 => MidiMessage::SetTempo {
      microseconds_per_beat: (u32::from(data[0]) << 16) | (u32::from(data[1]) << 8) | u32::from(data[2]),
    },
    _ => MidiMessage::Other,
  })
}

fn read_channel_message(
  reader: &mut Reader,
  status: u8,
) -> Result<MidiMessage, ValidationError> {
  let channel = status & 0x0f;
  Ok(match status >> 4 {
    0x8 => MidiMessage::NoteOff {
      channel,
      note_number: reader.u8()? & 0x7f,
      velocity: reader.u8()? & 0x7f,
    },
    0x9 => MidiMessage::NoteOn {
      channel,
      note_number: reader.u8()? & 0x7f,
      velocity: reader.u8()? & 0x7f,
    },
    0xa | 0xb | 0xe => {
      reader.bytes(2)?;
      MidiMessage::Other
    }
    0xc | 0xd => {
      reader.bytes(1)?;
      MidiMessage::Other
    }
    _ => return Err(invalid(format!("unexpected status byte {:#04x}", status))),
  })
}

fn read_track(mut reader: Reader) -> Result<Vec<MidiEvent>, ValidationError> {
  let mut events = Vec::new();
  let mut running_status: Option<u8> = None;

  while !reader.is_empty() {
    let delta_time = reader.variable()?;
    let message = match reader.peek()? {
      META => {
        reader.u8()?;
        running_status = None;
        read_meta(&mut reader)?
      }
      SYSEX_START | SYSEX_ESCAPE => {
        reader.u8()?;
        running_status = None;
        let length = reader.variable()? as usize;
        reader.bytes(length)?;
        MidiMessage::Other
      }
      status if status & 0x80 != 0 => {
        reader.u8()?;
        running_status = Some(status);
        read_channel_message(&mut reader, status)?
      }
      _ => {
        let status = running_status.ok_or_else(|| invalid("data byte without running status"))?;
        read_channel_message(&mut reader, status)?
      }
    };
    events.push(MidiEvent::new(delta_time, message));
  }

  Ok(events)
}

/// Reads the header and every `MTrk` chunk, other chunks are skipped.
pub fn read_midi_file(data: &[u8]) -> Result<MidiData, ValidationError> {
  let mut reader = Reader::new(data);
  let (header, expected_tracks) = read_header(&mut reader)?;

  let mut tracks = Vec::with_capacity(expected_tracks as usize);
  while !reader.is_empty() {
    let (id, chunk) = reader.chunk()?;
    if &id == TRACK_CHUNK {
      tracks.push(read_track(chunk)?);
    }
  }

  Ok(MidiData { header, tracks })
}
