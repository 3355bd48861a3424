use super::AudioBuffer;
use crate::error::AudioError;
use crate::time::SampleRate;

pub const SAMPLE_BLOCK_SIZE: usize = 1152;
const MAX_INT16_VALUE: f32 = 32768.0;

/// External MP3 encoder, created for two channels at a sample rate and bit rate.
pub trait Mp3Encoder {
  fn encode_block(&mut self, left: &[i16], right: &[i16]) -> Result<Vec<u8>, AudioError>;
  fn flush(&mut self) -> Result<Vec<u8>, AudioError>;
}

pub trait Mp3EncoderFactory {
  type Encoder: Mp3Encoder;

  fn create(
    &self,
    channels: u16,
    sample_rate: SampleRate,
    bit_rate: u32,
  ) -> Result<Self::Encoder, AudioError>;
}

fn scale(data: &[f32]) -> Vec<i16> {
  data
    .iter()
    .map(|value| (value * MAX_INT16_VALUE).max(-32768.0).min(32767.0) as i16)
    .collect()
}

/// Feeds the channels to the encoder in blocks of [`SAMPLE_BLOCK_SIZE`] frames.
pub fn encode_mp3<F: Mp3EncoderFactory>(
  factory: &F,
  buffer: &AudioBuffer,
  bit_rate: u32,
) -> Result<Vec<u8>, AudioError> {
  let (left, right) = match buffer.channels() {
    [left, right, ..] => (scale(left), scale(right)),
    _ => return Err(AudioError::TwoChannelsRequired),
  };

  let mut encoder = factory.create(2, buffer.get_sample_rate(), bit_rate)?;
  let mut mp3 = Vec::new();

  for (left_block, right_block) in left
    .chunks(SAMPLE_BLOCK_SIZE)
    .zip(right.chunks(SAMPLE_BLOCK_SIZE))
  {
    mp3.extend(encoder.encode_block(left_block, right_block)?);
  }
  mp3.extend(encoder.flush()?);

  Ok(mp3)
}

#[cfg(test)]
mod test {
  use std::cell::RefCell;
  use std::rc::Rc;

  use super::{encode_mp3, Mp3Encoder, Mp3EncoderFactory, SAMPLE_BLOCK_SIZE};
  use crate::audio::AudioBuffer;
  use crate::error::AudioError;

  struct CountingEncoder {
    blocks: Rc<RefCell<Vec<usize>>>,
  }

  impl Mp3Encoder for CountingEncoder {
    fn encode_block(&mut self, left: &[i16], _right: &[i16]) -> Result<Vec<u8>, AudioError> {
      self.blocks.borrow_mut().push(left.len());
      Ok(vec![left.first().map_or(0, |v| (*v / 256) as u8)])
    }

    fn flush(&mut self) -> Result<Vec<u8>, AudioError> {
      Ok(vec![0xff])
    }
  }

  struct Factory {
    blocks: Rc<RefCell<Vec<usize>>>,
  }

  impl Mp3EncoderFactory for Factory {
    type Encoder = CountingEncoder;

    fn create(&self, channels: u16, sample_rate: u32, bit_rate: u32) -> Result<CountingEncoder, AudioError> {
      assert_eq!(channels, 2);
      assert_eq!(sample_rate, 44100);
      assert_eq!(bit_rate, 128);
      Ok(CountingEncoder {
        blocks: self.blocks.clone(),
      })
    }
  }

  #[test]
  pub fn encodes_in_blocks() {
    let blocks = Rc::new(RefCell::new(Vec::new()));
    let factory = Factory {
      blocks: blocks.clone(),
    };
    let length = SAMPLE_BLOCK_SIZE * 2 + 10;
    let buffer = AudioBuffer::new(44100, vec![vec![0.5; length], vec![0.5; length]]);
    let mp3 = encode_mp3(&factory, &buffer, 128).unwrap();
    assert_eq!(*blocks.borrow(), vec![SAMPLE_BLOCK_SIZE, SAMPLE_BLOCK_SIZE, 10]);
    assert_eq!(mp3, vec![64, 64, 64, 0xff]);
  }

  #[test]
  pub fn requires_two_channels() {
    let factory = Factory {
      blocks: Rc::new(RefCell::new(Vec::new())),
    };
    let buffer = AudioBuffer::new(44100, vec![vec![0.5; 10]]);
    match encode_mp3(&factory, &buffer, 128) {
      Err(AudioError::TwoChannelsRequired) => {}
      _ => panic!("expected TwoChannelsRequired"),
    }
  }
}
