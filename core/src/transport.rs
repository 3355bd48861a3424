//! Lookahead playback of the working set of tracks.
//!
//! The scheduler never renders audio itself: every pass it hands the events
//! starting in the next window of track time to the players, which start
//! buffers in the destination at `host time of playback start + event time`.
//! Passes are driven by [`PlaybackScheduler::poll`], which the owner calls
//! when the delay it returned has elapsed.

use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::audio::AudioDestination;
use crate::error::ResourceError;
use crate::logger::{LoggerRef, Severity};
use crate::players::{Players, TrackLoading};
use crate::song::{Track, TrackId};
use crate::time::{ClockRef, Seconds};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
  NoTracksLoaded,
  Stopped,
  Playing,
  Paused,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
  ModeChanged(PlayMode),
  TrackTimeChanged(Seconds),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PlaybackState {
  mode: PlayMode,
  playback_start_host_time: f64,
  track_time: Seconds,
  schedule_cursor: Seconds,
  worst_scheduling_cost: f64,
}

impl Default for PlaybackState {
  fn default() -> Self {
    PlaybackState {
      mode: PlayMode::NoTracksLoaded,
      playback_start_host_time: 0.0,
      track_time: 0.0,
      schedule_cursor: 0.0,
      worst_scheduling_cost: 0.0,
    }
  }
}

pub struct PlaybackScheduler {
  players: Players,
  clock: ClockRef,
  destination: Box<dyn AudioDestination + Send>,
  logger: LoggerRef,
  lookahead: Seconds,

  tracks: Vec<Track>,
  state: PlaybackState,
  next_pass: Option<f64>,
  observers: Vec<Sender<PlaybackEvent>>,
}

impl PlaybackScheduler {
  pub fn new(
    players: Players,
    clock: ClockRef,
    destination: Box<dyn AudioDestination + Send>,
    logger: LoggerRef,
    lookahead: Seconds,
  ) -> PlaybackScheduler {
    PlaybackScheduler {
      players,
      clock,
      destination,
      logger,
      lookahead,
      tracks: Vec::new(),
      state: PlaybackState::default(),
      next_pass: None,
      observers: Vec::new(),
    }
  }

  pub fn subscribe(&mut self) -> Receiver<PlaybackEvent> {
    let (tx, rx) = crossbeam_channel::unbounded();
    self.observers.push(tx);
    rx
  }

  fn notify(&mut self, event: PlaybackEvent) {
    self.observers.retain(|observer| observer.send(event).is_ok());
  }

  fn set_mode(&mut self, mode: PlayMode) {
    if self.state.mode != mode {
      self.state.mode = mode;
      self.notify(PlaybackEvent::ModeChanged(mode));
    }
  }

  fn set_track_time(&mut self, track_time: Seconds) {
    self.state.track_time = track_time;
    self.notify(PlaybackEvent::TrackTimeChanged(track_time));
  }

  pub fn get_mode(&self) -> PlayMode {
    self.state.mode
  }

  pub fn get_track_time(&self) -> Seconds {
    self.state.track_time
  }

  pub fn get_schedule_cursor(&self) -> Seconds {
    self.state.schedule_cursor
  }

  pub fn get_worst_scheduling_cost(&self) -> f64 {
    self.state.worst_scheduling_cost
  }

  pub fn get_tracks(&self) -> &[Track] {
    &self.tracks
  }

  pub fn get_players(&self) -> &Players {
    &self.players
  }

  /// Host time of the pending pass, if any.
  pub fn get_next_pass(&self) -> Option<f64> {
    self.next_pass
  }

  fn tracks_loaded(&mut self) {
    if !self.tracks.is_empty() && self.state.mode == PlayMode::NoTracksLoaded {
      self.set_mode(PlayMode::Stopped);
    }
  }

  /// Replaces the working set with the playable ones among `tracks`.
  pub fn set_tracks(&mut self, tracks: Vec<Track>) -> TrackLoading {
    self.tracks = tracks.into_iter().filter(Track::is_playable).collect();

    let mut loading = TrackLoading::default();
    for track in self.tracks.iter() {
      loading.merge(self.players.load(track));
    }
    self.tracks_loaded();
    loading
  }

  /// Inserts or replaces a track by id, a track that is not playable is removed.
  pub fn set_track(&mut self, track: Track) -> TrackLoading {
    let position = self
      .tracks
      .iter()
      .position(|current| current.get_id() == track.get_id());

    if !track.is_playable() {
      if let Some(position) = position {
        self.tracks.remove(position);
      }
      return TrackLoading::default();
    }

    let loading = self.players.load(&track);
    match position {
      Some(position) => self.tracks[position] = track,
      None => self.tracks.push(track),
    }
    self.tracks_loaded();
    loading
  }

  /// Returns whether the track is in the working set.
  pub fn set_mute(&mut self, track_id: TrackId, mute: bool) -> bool {
    match self
      .tracks
      .iter_mut()
      .find(|track| track.get_id() == track_id)
    {
      Some(track) => {
        track.set_mute(mute);
        true
      }
      None => false,
    }
  }

  pub fn play(&mut self) -> Result<(), ResourceError> {
    if self.tracks.is_empty() {
      return Err(ResourceError::NoTracks);
    }
    if self.state.mode == PlayMode::Playing {
      return Ok(());
    }

    self.state.playback_start_host_time = self.clock.now() - self.state.track_time;
    self.set_mode(PlayMode::Playing);
    self.schedule_next();
    Ok(())
  }

  pub fn pause(&mut self) {
    if self.state.mode == PlayMode::Playing {
      self.next_pass = None;
      let track_time = self.clock.now() - self.state.playback_start_host_time;
      self.set_track_time(track_time);
      self.set_mode(PlayMode::Paused);
    }
  }

  pub fn stop(&mut self) {
    match self.state.mode {
      PlayMode::Playing | PlayMode::Paused => {
        self.next_pass = None;
        self.state.schedule_cursor = 0.0;
        self.set_track_time(0.0);
        self.set_mode(PlayMode::Stopped);
      }
      PlayMode::Stopped | PlayMode::NoTracksLoaded => {}
    }
  }

  /// Runs the pending pass when it is due.
  ///
  /// Returns the seconds until the next pass, or `None` when nothing is pending.
  pub fn poll(&mut self) -> Option<f64> {
    let deadline = self.next_pass?;
    let now = self.clock.now();
    if now >= deadline {
      self.schedule_next();
    }
    self
      .next_pass
      .map(|deadline| (deadline - self.clock.now()).max(0.0))
  }

  fn schedule_next(&mut self) {
    if self.state.mode != PlayMode::Playing {
      self.next_pass = None;
      return;
    }

    let started_at = Instant::now();

    let track_time = self.clock.now() - self.state.playback_start_host_time;
    self.set_track_time(track_time);

    let window_start = self.state.schedule_cursor;
    let window_end = window_start + self.lookahead;
    let time_offset = self.state.playback_start_host_time;

    for track in self.tracks.iter().filter(|track| !track.is_muted()) {
      self.players.play_events(
        track,
        window_start,
        window_end,
        time_offset,
        self.destination.as_mut(),
      );
    }

    let cost = started_at.elapsed().as_secs_f64();
    if cost > self.state.worst_scheduling_cost {
      self.state.worst_scheduling_cost = cost;
      self.logger.log(
        Severity::Info,
        &format!("ScheduleNext lead time increased: {}", cost),
      );
    }

    self.state.schedule_cursor = window_end;

    let delay = (self.state.schedule_cursor
      - self.state.track_time
      - self.state.worst_scheduling_cost)
      .max(0.0);
    self.next_pass = Some(self.clock.now() + delay);
  }
}
