//! A simulated output device.
//!
//! There is no sound card behind it: a thread pulls blocks from the realtime
//! mixer at the pace of the sample rate, which makes the mixer frame counter
//! the host clock of the scheduler, and optionally keeps what was played.

use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use failure::Fail;
use log::{debug, info};

use tab_sampler_core::audio::{AudioBuffer, RealtimeMixer};
use tab_sampler_core::time::SampleRate;

use crate::config::Device as DeviceConfig;

#[derive(Debug, Fail)]
pub enum AudioDeviceError {
  #[fail(display = "Failed to create the audio device thread: {}", cause)]
  Start { cause: String },

  #[fail(display = "Failed to join the audio device thread")]
  Stop,
}

pub enum Protocol {
  Stop,
}

struct DeviceThread {
  mixer: RealtimeMixer,
  sample_rate: SampleRate,
  block_frames: usize,
  capture: Option<[Vec<f32>; 2]>,
}

impl DeviceThread {
  fn run(mut self, protocol_rx: Receiver<Protocol>) -> Option<AudioBuffer> {
    let block_duration =
      Duration::from_secs_f64(self.block_frames as f64 / f64::from(self.sample_rate));
    let mut left = vec![0.0; self.block_frames];
    let mut right = vec![0.0; self.block_frames];
    let started = Instant::now();
    let mut blocks = 0u32;

    loop {
      match protocol_rx.try_recv() {
        Ok(Protocol::Stop) => break,
        Err(err) if err.is_disconnected() => break,
        Err(_) => {}
      }

      left.iter_mut().for_each(|sample| *sample = 0.0);
      right.iter_mut().for_each(|sample| *sample = 0.0);
      self.mixer.process(&mut left, &mut right);

      if let Some([captured_left, captured_right]) = self.capture.as_mut() {
        captured_left.extend_from_slice(&left);
        captured_right.extend_from_slice(&right);
      }

      blocks += 1;
      let next_block = block_duration * blocks;
      if let Some(wait) = next_block.checked_sub(started.elapsed()) {
        thread::sleep(wait);
      }
    }

    debug!("Audio device processed {} blocks", blocks);

    let sample_rate = self.sample_rate;
    self
      .capture
      .map(|[left, right]| AudioBuffer::new(sample_rate, vec![left, right]))
  }
}

pub struct AudioDevice {
  handler: JoinHandle<Option<AudioBuffer>>,
  protocol_tx: Sender<Protocol>,
}

impl AudioDevice {
  pub fn start(
    mixer: RealtimeMixer,
    sample_rate: SampleRate,
    config: &DeviceConfig,
    capture: bool,
  ) -> Result<AudioDevice, AudioDeviceError> {
    info!("Starting the audio device ...");

    let device = DeviceThread {
      mixer,
      sample_rate,
      block_frames: config.block_frames.max(1),
      capture: if capture {
        Some([Vec::new(), Vec::new()])
      } else {
        None
      },
    };

    let (protocol_tx, protocol_rx) = crossbeam_channel::bounded(1);

    thread::Builder::new()
      .name("audio-device".into())
      .spawn(move || device.run(protocol_rx))
      .map_err(|err| AudioDeviceError::Start {
        cause: err.to_string(),
      })
      .map(|handler| AudioDevice {
        handler,
        protocol_tx,
      })
  }

  /// Returns what was played when capturing.
  pub fn stop(self) -> Result<Option<AudioBuffer>, AudioDeviceError> {
    info!("Stopping the audio device ...");

    drop(self.protocol_tx.send(Protocol::Stop));
    self.handler.join().map_err(|_| AudioDeviceError::Stop)
  }
}
