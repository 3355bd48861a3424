use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::AudioBuffer;
use crate::error::AudioError;
use crate::time::SampleRate;

const NUM_CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;

fn to_i16(sample: f32) -> i16 {
  let s = sample.max(-1.0).min(1.0);
  if s < 0.0 {
    (s * 32768.0) as i16
  } else {
    (s * 32767.0) as i16
  }
}

fn encoder_error(err: hound::Error) -> AudioError {
  AudioError::Encoder {
    cause: err.to_string(),
  }
}

/// Encodes two equally long channels as a 16 bit stereo PCM WAV file.
pub fn encode_wav<C: AsRef<[f32]>>(
  channels: &[C],
  sample_rate: SampleRate,
) -> Result<Vec<u8>, AudioError> {
  let (left, right) = match channels {
    [left, right] => (left.as_ref(), right.as_ref()),
    _ => return Err(AudioError::TwoChannelsRequired),
  };

  if left.len() != right.len() {
    return Err(AudioError::ChannelLengthMismatch {
      left: left.len(),
      right: right.len(),
    });
  }

  let spec = WavSpec {
    channels: NUM_CHANNELS,
    sample_rate,
    bits_per_sample: BITS_PER_SAMPLE,
    sample_format: SampleFormat::Int,
  };

  let mut cursor = Cursor::new(Vec::with_capacity(44 + left.len() * 4));
  {
    let mut writer = WavWriter::new(&mut cursor, spec).map_err(encoder_error)?;
    for (l, r) in left.iter().zip(right) {
      writer.write_sample(to_i16(*l)).map_err(encoder_error)?;
      writer.write_sample(to_i16(*r)).map_err(encoder_error)?;
    }
    writer.finalize().map_err(encoder_error)?;
  }

  Ok(cursor.into_inner())
}

pub fn encode_buffer_to_wav(buffer: &AudioBuffer) -> Result<Vec<u8>, AudioError> {
  encode_wav(buffer.channels(), buffer.get_sample_rate())
}

/// Decodes a WAV file of any channel count into non-interleaved floats.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer, AudioError> {
  let mut reader = WavReader::new(Cursor::new(bytes))?;
  let spec = reader.spec();

  let samples: Vec<f32> = match spec.sample_format {
    SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
    SampleFormat::Int => {
      if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
        return Err(AudioError::UnsupportedFormat {
          bits: spec.bits_per_sample,
        });
      }
      let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
      reader
        .samples::<i32>()
        .map(|s| s.map(|x| x as f32 / max))
        .collect::<Result<Vec<_>, _>>()?
    }
  };

  let number_of_channels = usize::from(spec.channels.max(1));
  let mut channels = vec![Vec::with_capacity(samples.len() / number_of_channels); number_of_channels];
  for frame in samples.chunks(number_of_channels) {
    for (channel, sample) in channels.iter_mut().zip(frame) {
      channel.push(*sample);
    }
  }

  Ok(AudioBuffer::new(spec.sample_rate, channels))
}

#[cfg(test)]
mod test {
  use super::{decode_wav, encode_wav};
  use crate::error::AudioError;

  #[test]
  pub fn header_layout() {
    let bytes = encode_wav(&[vec![0.0f32; 3], vec![0.0f32; 3]], 44100).unwrap();
    assert_eq!(bytes.len(), 44 + 12);
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[4..8], &(36u32 + 12).to_le_bytes());
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(&bytes[12..16], b"fmt ");
    assert_eq!(&bytes[16..20], &16u32.to_le_bytes());
    assert_eq!(&bytes[20..22], &1u16.to_le_bytes());
    assert_eq!(&bytes[22..24], &2u16.to_le_bytes());
    assert_eq!(&bytes[24..28], &44100u32.to_le_bytes());
    assert_eq!(&bytes[28..32], &(44100u32 * 4).to_le_bytes());
    assert_eq!(&bytes[32..34], &4u16.to_le_bytes());
    assert_eq!(&bytes[34..36], &16u16.to_le_bytes());
    assert_eq!(&bytes[36..40], b"data");
    assert_eq!(&bytes[40..44], &12u32.to_le_bytes());
  }

  #[test]
  pub fn samples_are_interleaved_and_clamped() {
    let bytes = encode_wav(&[vec![1.0f32, -1.0], vec![2.0f32, -0.5]], 8000).unwrap();
    let samples: Vec<i16> = bytes[44..]
      .chunks(2)
      .map(|b| i16::from_le_bytes([b[0], b[1]]))
      .collect();
    assert_eq!(samples, vec![32767, 32767, -32768, -16384]);
  }

  #[test]
  pub fn requires_two_equal_channels() {
    match encode_wav(&[vec![0.0f32; 3]], 8000) {
      Err(AudioError::TwoChannelsRequired) => {}
      _ => panic!("expected TwoChannelsRequired"),
    }
    match encode_wav(&[vec![0.0f32; 3], vec![0.0f32; 2]], 8000) {
      Err(AudioError::ChannelLengthMismatch { left: 3, right: 2 }) => {}
      _ => panic!("expected ChannelLengthMismatch"),
    }
  }

  #[test]
  pub fn decodes_what_it_encodes() {
    let bytes = encode_wav(&[vec![0.5f32, 0.0, -0.5], vec![0.25f32, 0.0, -0.25]], 22050).unwrap();
    let buffer = decode_wav(&bytes).unwrap();
    assert_eq!(buffer.get_sample_rate(), 22050);
    assert_eq!(buffer.get_number_of_channels(), 2);
    assert_eq!(buffer.get_length(), 3);
    let left = buffer.get_channel_data(0).unwrap();
    assert!((left[0] - 0.5).abs() < 1e-3);
    assert!((left[2] + 0.5).abs() < 1e-3);
  }

  #[test]
  pub fn garbage_does_not_decode() {
    assert!(decode_wav(b"not a wav file").is_err());
  }
}
