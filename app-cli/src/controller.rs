use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use failure::Fail;
use log::{debug, info, warn};

use tab_sampler_core::error::ResourceError;
use tab_sampler_core::song::{Track, TrackId};
use tab_sampler_core::transport::PlaybackScheduler;

#[derive(Debug, Fail)]
pub enum ControllerError {
  #[fail(display = "Failed to create the Controller thread: {}", cause)]
  Start { cause: String },

  #[fail(display = "Failed to join the Controller thread")]
  Stop,

  #[fail(display = "The Controller thread is not running")]
  Closed,
}

pub enum Protocol {
  SetTracks(Vec<Track>),
  Play(Sender<Result<(), ResourceError>>),
  Pause,
  Stop,
  SetMute(TrackId, bool),
  Close,
}

struct ControllerThread {
  scheduler: PlaybackScheduler,
}

impl ControllerThread {
  fn new(scheduler: PlaybackScheduler) -> ControllerThread {
    ControllerThread { scheduler }
  }

  /// Waits for messages until the next scheduling pass is due.
  pub fn handle_messages(&mut self, protocol_rx: Receiver<Protocol>) {
    loop {
      let msg = match self.scheduler.poll() {
        Some(delay) => match protocol_rx.recv_timeout(Duration::from_secs_f64(delay)) {
          Ok(msg) => msg,
          Err(RecvTimeoutError::Timeout) => continue,
          Err(RecvTimeoutError::Disconnected) => break,
        },
        None => match protocol_rx.recv() {
          Ok(msg) => msg,
          Err(_) => break,
        },
      };

      match msg {
        Protocol::SetTracks(tracks) => {
          debug!("Setting {} tracks", tracks.len());
          // loading goes on in the background, events not ready yet are skipped
          drop(self.scheduler.set_tracks(tracks));
        }

        Protocol::Play(reply_tx) => {
          let result = self.scheduler.play();
          if let Err(err) = &result {
            warn!("Can not play: {}", err);
          }
          drop(reply_tx.send(result));
        }

        Protocol::Pause => self.scheduler.pause(),

        Protocol::Stop => self.scheduler.stop(),

        Protocol::SetMute(track_id, mute) => {
          if !self.scheduler.set_mute(track_id, mute) {
            warn!("Unknown track {}", track_id);
          }
        }

        Protocol::Close => {
          self.scheduler.stop();
          break;
        }
      }
    }
  }
}

pub struct Controller {
  handler: JoinHandle<()>,
  protocol_tx: Sender<Protocol>,
}

impl Controller {
  pub const CHANNEL_CAPACITY: usize = 1024;

  pub fn new(scheduler: PlaybackScheduler) -> Result<Controller, ControllerError> {
    info!("Starting Controller ...");

    let (protocol_tx, protocol_rx) = crossbeam_channel::bounded::<Protocol>(Self::CHANNEL_CAPACITY);

    thread::Builder::new()
      .name("controller".into())
      .spawn(move || ControllerThread::new(scheduler).handle_messages(protocol_rx))
      .map_err(|err| ControllerError::Start {
        cause: err.to_string(),
      })
      .map(|handler| Controller {
        handler,
        protocol_tx,
      })
  }

  pub fn send(&self, msg: Protocol) -> Result<(), ControllerError> {
    self
      .protocol_tx
      .send(msg)
      .map_err(|_| ControllerError::Closed)
  }

  pub fn play(&self) -> Result<Result<(), ResourceError>, ControllerError> {
    let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
    self.send(Protocol::Play(reply_tx))?;
    reply_rx.recv().map_err(|_| ControllerError::Closed)
  }

  pub fn stop(self) -> Result<(), ControllerError> {
    info!("Stopping Controller ...");

    self
      .protocol_tx
      .send(Protocol::Close)
      .map_err(|_| ControllerError::Stop)
      .and_then(|()| self.handler.join().map_err(|_| ControllerError::Stop))
  }
}
