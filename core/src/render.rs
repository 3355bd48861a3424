//! Non-interactive mixdown of a set of tracks.

use crate::audio::{AudioBuffer, OfflineContext};
use crate::config::Render as RenderConfig;
use crate::error::ResourceError;
use crate::players::Players;
use crate::song::Track;

pub struct OfflineRenderer {
  players: Players,
  config: RenderConfig,
}

impl OfflineRenderer {
  pub fn new(players: Players, config: RenderConfig) -> OfflineRenderer {
    OfflineRenderer { players, config }
  }

  fn renderable<'a>(tracks: &'a [Track]) -> impl Iterator<Item = &'a Track> {
    tracks
      .iter()
      .filter(|track| track.is_playable() && !track.is_muted())
  }

  /// Seconds needed to hold every event, drum hits are given a fixed length.
  pub fn get_length(&self, tracks: &[Track]) -> f64 {
    Self::renderable(tracks)
      .map(|track| track.get_end_time(self.config.drum_hit_duration))
      .fold(0.0, f64::max)
  }

  /// Renders all the events of the unmuted playable tracks at once.
  ///
  /// Events whose kit or stretch is not ready are skipped with a warning, the
  /// same as in realtime playback.
  pub fn render(&self, tracks: &[Track]) -> Result<AudioBuffer, ResourceError> {
    if Self::renderable(tracks).next().is_none() {
      return Err(ResourceError::NoRenderableTracks);
    }

    let mut context = OfflineContext::new(self.config.sample_rate, self.get_length(tracks));
    for track in Self::renderable(tracks) {
      self
        .players
        .play_events(track, 0.0, std::f64::INFINITY, 0.0, &mut context);
    }
    Ok(context.render(self.config.block_frames))
  }
}

#[cfg(test)]
mod test {
  use std::sync::Arc;

  use failure::Error;

  use super::OfflineRenderer;
  use crate::audio::wav::encode_wav;
  use crate::audio::AudioBuffer;
  use crate::config::{DrumKits as DrumKitsConfig, Render as RenderConfig, Stretch as StretchConfig};
  use crate::error::ResourceError;
  use crate::logger::testing::RecordingLogger;
  use crate::logger::LoggerRef;
  use crate::players::{
    DrumKitDefinition, DrumKitId, DrumKitLibrary, KitSource, PitchTimeStretcher, Players,
  };
  use crate::pool::InlinePool;
  use crate::song::{DrumBeat, DrumType, Note, Sample, Track};

  const RATE: u32 = 100;

  struct OneHitKit;

  impl KitSource for OneHitKit {
    fn fetch(&self, _location: &str) -> Result<Vec<u8>, Error> {
      // a single hit of 10 frames at full scale followed by silence
      let mut data = vec![0.5f32; 10];
      data.extend(vec![0.0f32; 10]);
      Ok(encode_wav(&[data.clone(), data], RATE)?)
    }
  }

  fn players(logger: &LoggerRef) -> Players {
    let pool = InlinePool::new_ref();
    let config = DrumKitsConfig {
      minimum_silence_duration: 0.05,
      minimum_clip_duration: 0.05,
      ..DrumKitsConfig::default()
    };
    let drums = DrumKitLibrary::new(
      vec![DrumKitDefinition::new(1, "Test", "kit.wav", vec![vec![DrumType::Snare]])],
      Arc::new(OneHitKit),
      pool.clone(),
      logger.clone(),
      &config,
    );
    let sampler = PitchTimeStretcher::new(pool, logger.clone(), StretchConfig::default());
    Players::new(Arc::new(drums), Arc::new(sampler))
  }

  fn config() -> RenderConfig {
    RenderConfig {
      sample_rate: RATE,
      drum_hit_duration: 0.5,
      block_frames: 16,
    }
  }

  fn constant_sample(value: f32) -> Arc<Sample> {
    Arc::new(Sample::new(
      "constant",
      Arc::new(AudioBuffer::new(RATE, vec![vec![value; 100]])),
      10.0,
    ))
  }

  #[test]
  pub fn nothing_to_render() {
    let logger: LoggerRef = RecordingLogger::new();
    let renderer = OfflineRenderer::new(players(&logger), config());

    assert_eq!(
      renderer.render(&[]).unwrap_err(),
      ResourceError::NoRenderableTracks
    );

    let unselected = Track::drums("Drums", vec![DrumBeat::new(0.0, DrumType::Snare)]);
    let mut muted = Track::instrument("Guitar", vec![Note::new(0.0, 10.0, 1.0)])
      .with_sample(constant_sample(0.1));
    muted.set_mute(true);
    assert_eq!(
      renderer.render(&[unselected, muted]).unwrap_err(),
      ResourceError::NoRenderableTracks
    );
  }

  #[test]
  pub fn renders_every_event() {
    let logger: LoggerRef = RecordingLogger::new();
    let players = players(&logger);

    let sample = constant_sample(0.25);
    let guitar = Track::instrument(
      "Guitar",
      vec![Note::new(0.0, 10.0, 1.0), Note::new(1.5, 10.0, 1.0)],
    )
    .with_sample(sample.clone());
    let drums = Track::drums("Drums", vec![DrumBeat::new(0.5, DrumType::Snare)])
      .with_drum_kit(DrumKitId(1));
    let mut muted = Track::instrument("Muted", vec![Note::new(0.0, 10.0, 5.0)])
      .with_sample(constant_sample(0.9));
    muted.set_mute(true);

    players.load(&guitar).wait();
    players.load(&drums).wait();

    let renderer = OfflineRenderer::new(players, config());
    let tracks = vec![guitar, drums, muted];
    assert_eq!(renderer.get_length(&tracks), 2.5);

    let output = renderer.render(&tracks).unwrap();
    assert_eq!(output.get_number_of_channels(), 2);
    assert_eq!(output.get_length(), 250);

    let left = output.get_channel_data(0).unwrap();
    assert_eq!(left[10], 0.25);
    // drum hit on top of the first note
    assert!((left[55] - 0.75).abs() < 1e-3);
    assert_eq!(left[65], 0.25);
    assert_eq!(left[120], 0.0);
    assert_eq!(left[160], 0.25);
    assert_eq!(left[249], 0.25);
  }
}
