use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use log::{debug, info, LevelFilter};

use failure::{Error, Fail};

use crossbeam_channel::RecvTimeoutError;

use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;

use tab_sampler_core::audio::wav::{decode_wav, encode_buffer_to_wav};
use tab_sampler_core::audio::{
  detect_frequency, get_clips, realtime_mixer, AudioBuffer, Clip, ClipOptions,
};
use tab_sampler_core::logger::{LogFacade, LoggerRef};
use tab_sampler_core::pitch::describe_frequency;
use tab_sampler_core::players::{DrumKitId, DrumKitLibrary, PitchTimeStretcher, Players, TrackLoading};
use tab_sampler_core::pool::{PoolRef, ThreadPool};
use tab_sampler_core::render::OfflineRenderer;
use tab_sampler_core::score::import_score;
use tab_sampler_core::song::{Sample, Track, TrackMedia};
use tab_sampler_core::transport::{PlaybackEvent, PlaybackScheduler};

mod audio;
use crate::audio::AudioDevice;

mod config;
use crate::config::Config;

mod controller;
use crate::controller::{Controller, Protocol};

const TAB_SAMPLER_CONFIG: &str = "TAB_SAMPLER_CONFIG";
const DEFAULT_TAB_SAMPLER_CONFIG: &str = "tab-sampler.toml";

const TAB_SAMPLER_LOG_CONFIG: &str = "TAB_SAMPLER_LOG_CONFIG";
const DEFAULT_TAB_SAMPLER_LOG_CONFIG: &str = "log4rs.yaml";

#[derive(Debug, Fail)]
enum MainError {
  #[fail(display = "Failed to init logging: {}", cause)]
  LoggingInit { cause: String },

  #[fail(display = "Failed to read {}: {}", path, cause)]
  ReadFile { path: String, cause: String },

  #[fail(display = "Nothing to play, select a sample or a drum kit for the tracks")]
  NothingToPlay,
}

#[derive(Parser)]
#[command(name = "tab-sampler")]
#[command(about = "Plays tablature and MIDI songs with sampled instruments", long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Render a song into a WAV file
  Render {
    /// Tablature JSON or MIDI file
    score: PathBuf,

    /// WAV file with the sound used for the instrument tracks
    #[arg(short, long)]
    sample: Option<PathBuf>,

    /// Drum kit used for the drum tracks
    #[arg(short, long, default_value = "1")]
    kit: u32,

    #[arg(short, long, default_value = "out.wav")]
    output: PathBuf,
  },

  /// Play a song in real time
  Play {
    score: PathBuf,

    #[arg(short, long)]
    sample: Option<PathBuf>,

    #[arg(short, long, default_value = "1")]
    kit: u32,

    /// Keep what was played into a WAV file
    #[arg(short, long)]
    capture: Option<PathBuf>,
  },

  /// Detect the frequency of a sound
  Detect { wav: PathBuf },

  /// List the sounds of a WAV file separated by silence
  Clips {
    wav: PathBuf,

    #[arg(long, default_value = "0.1")]
    min_silence: f64,

    #[arg(long, default_value = "0.05")]
    min_clip: f64,

    #[arg(long)]
    max_clip: Option<f64>,
  },
}

fn main() -> Result<(), Error> {
  let cli = Cli::parse();

  init_logging()?;

  let config = init_config()?;

  match cli.command {
    Commands::Render {
      score,
      sample,
      kit,
      output,
    } => render(&config, &score, sample.as_deref(), DrumKitId(kit), &output),

    Commands::Play {
      score,
      sample,
      kit,
      capture,
    } => play(&config, &score, sample.as_deref(), DrumKitId(kit), capture.as_deref()),

    Commands::Detect { wav } => detect(&wav),

    Commands::Clips {
      wav,
      min_silence,
      min_clip,
      max_clip,
    } => {
      let mut options = ClipOptions::new(min_silence, min_clip)
        .with_silence_threshold(config.engine.clips.silence_threshold);
      if let Some(max_clip) = max_clip {
        options = options.with_maximum_clip_duration(max_clip);
      }
      clips(&wav, &options)
    }
  }
}

fn init_logging() -> Result<(), Error> {
  let log_config_path = std::env::var(TAB_SAMPLER_LOG_CONFIG)
    .unwrap_or_else(|_| DEFAULT_TAB_SAMPLER_LOG_CONFIG.to_string());

  if Path::new(&log_config_path).exists() {
    log4rs::init_file(log_config_path.as_str(), Default::default()).map_err(|err| {
      MainError::LoggingInit {
        cause: err.to_string(),
      }
    })?;
  } else {
    let stderr = ConsoleAppender::builder()
      .target(Target::Stderr)
      .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S%.3f)} {h({l:5})} {t} - {m}{n}")))
      .build();

    let log_config = LogConfig::builder()
      .appender(Appender::builder().build("stderr", Box::new(stderr)))
      .build(Root::builder().appender("stderr").build(LevelFilter::Info))
      .map_err(|err| MainError::LoggingInit {
        cause: err.to_string(),
      })?;

    log4rs::init_config(log_config).map_err(|err| MainError::LoggingInit {
      cause: err.to_string(),
    })?;
  }

  Ok(())
}

fn init_config() -> Result<Config, Error> {
  let config_path = std::env::var(TAB_SAMPLER_CONFIG)
    .unwrap_or_else(|_| DEFAULT_TAB_SAMPLER_CONFIG.to_string());

  let config = if Path::new(&config_path).exists() {
    info!("Loading configuration from {} ...", config_path);
    Config::from_file(config_path.as_str())?
  } else {
    info!("No configuration at {}, using defaults", config_path);
    Config::default()
  };
  debug!("{:#?}", config);

  Ok(config)
}

fn read_file(path: &Path) -> Result<Vec<u8>, MainError> {
  fs::read(path).map_err(|err| MainError::ReadFile {
    path: path.display().to_string(),
    cause: err.to_string(),
  })
}

fn read_wav(path: &Path) -> Result<AudioBuffer, Error> {
  Ok(decode_wav(&read_file(path)?)?)
}

struct Engine {
  pool: PoolRef,
  logger: LoggerRef,
  players: Players,
}

impl Engine {
  fn new(config: &Config) -> Engine {
    info!("Initialising the engine ...");

    let pool: PoolRef = Arc::new(ThreadPool::new(config.engine.pool.workers));
    let logger = LogFacade::new_ref();
    let drums = DrumKitLibrary::from_config(pool.clone(), logger.clone(), &config.engine.drum_kits);
    let sampler = PitchTimeStretcher::new(pool.clone(), logger.clone(), config.engine.stretch.clone());
    let players = Players::new(Arc::new(drums), Arc::new(sampler));

    Engine {
      pool,
      logger,
      players,
    }
  }

  /// The whole file is used as the sample.
  fn load_sample(&self, path: &Path) -> Result<Arc<Sample>, Error> {
    let buffer = read_wav(path)?;
    let name = path
      .file_stem()
      .map(|stem| stem.to_string_lossy().into_owned())
      .unwrap_or_default();
    let clip = Clip::new(0, buffer.get_length());
    let sample = Sample::from_clip(name, &buffer, &clip, &*self.pool)?;
    info!(
      "Sample \"{}\": {}",
      sample.get_name(),
      describe_frequency(Some(sample.get_frequency()))
    );
    Ok(Arc::new(sample))
  }

  /// Imports the score and selects the sample and kit for its tracks.
  fn load_tracks(
    &self,
    score: &Path,
    sample: Option<&Path>,
    kit_id: DrumKitId,
  ) -> Result<Vec<Track>, Error> {
    let tracks = import_score(&read_file(score)?, &self.logger)?;
    let sample = sample.map(|path| self.load_sample(path)).transpose()?;

    let tracks: Vec<Track> = tracks
      .into_iter()
      .map(|track| {
        let is_drums = matches!(track.media(), TrackMedia::Drum(_));
        let selected = match &sample {
          _ if is_drums => track.with_drum_kit(kit_id),
          Some(sample) => track.with_sample(sample.clone()),
          None => track,
        };
        info!(
          "Track \"{}\" ({}) {}",
          selected.get_name(),
          selected.get_instrument(),
          if selected.is_playable() {
            "selected"
          } else {
            "skipped, no sample"
          }
        );
        selected
      })
      .filter(Track::is_playable)
      .collect();

    if tracks.is_empty() {
      return Err(MainError::NothingToPlay.into());
    }

    info!("Preparing {} tracks ...", tracks.len());
    let mut loading = TrackLoading::default();
    for track in tracks.iter() {
      loading.merge(self.players.load(track));
    }
    loading.wait();

    Ok(tracks)
  }
}

fn render(
  config: &Config,
  score: &Path,
  sample: Option<&Path>,
  kit_id: DrumKitId,
  output: &Path,
) -> Result<(), Error> {
  let engine = Engine::new(config);
  let tracks = engine.load_tracks(score, sample, kit_id)?;

  let renderer = OfflineRenderer::new(engine.players.clone(), config.engine.render.clone());
  info!("Rendering {:.2} seconds ...", renderer.get_length(&tracks));
  let started = Instant::now();
  let buffer = renderer.render(&tracks)?;
  info!("Rendered in {:.2} seconds", started.elapsed().as_secs_f64());

  fs::write(output, encode_buffer_to_wav(&buffer)?)?;
  info!("Written {}", output.display());

  Ok(())
}

fn play(
  config: &Config,
  score: &Path,
  sample: Option<&Path>,
  kit_id: DrumKitId,
  capture: Option<&Path>,
) -> Result<(), Error> {
  let engine = Engine::new(config);
  let tracks = engine.load_tracks(score, sample, kit_id)?;

  let length = OfflineRenderer::new(engine.players.clone(), config.engine.render.clone())
    .get_length(&tracks);

  let sample_rate = config.device.sample_rate;
  let (sender, mixer) = realtime_mixer(sample_rate);
  let clock = Arc::new(mixer.get_clock());
  let device = AudioDevice::start(mixer, sample_rate, &config.device, capture.is_some())?;

  let mut scheduler = PlaybackScheduler::new(
    engine.players.clone(),
    clock,
    Box::new(sender),
    engine.logger.clone(),
    config.engine.scheduler.lookahead,
  );
  let events = scheduler.subscribe();

  let controller = Controller::new(scheduler)?;
  controller.send(Protocol::SetTracks(tracks))?;
  controller.play()??;

  info!("Playing {:.2} seconds ...", length);
  let deadline = Instant::now() + Duration::from_secs_f64(length);
  loop {
    match events.recv_deadline(deadline) {
      Ok(PlaybackEvent::ModeChanged(mode)) => info!("{:?}", mode),
      Ok(PlaybackEvent::TrackTimeChanged(time)) => debug!("Track time {:.3}", time),
      Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
    }
  }

  controller.stop()?;
  let captured = device.stop()?;

  if let (Some(path), Some(buffer)) = (capture, captured) {
    fs::write(path, encode_buffer_to_wav(&buffer)?)?;
    info!("Captured output written to {}", path.display());
  }

  Ok(())
}

fn detect(wav: &Path) -> Result<(), Error> {
  let buffer = read_wav(wav)?;
  let frequency = detect_frequency(&buffer).ok();
  println!("{}", describe_frequency(frequency));
  Ok(())
}

fn clips(wav: &Path, options: &ClipOptions) -> Result<(), Error> {
  let buffer = read_wav(wav)?;
  let sample_rate = f64::from(buffer.get_sample_rate());
  for (index, clip) in get_clips(buffer.channels(), buffer.get_sample_rate(), options)
    .iter()
    .enumerate()
  {
    println!(
      "{:3}: frames {}..{} ({:.3}s - {:.3}s)",
      index + 1,
      clip.start,
      clip.get_end(),
      clip.start as f64 / sample_rate,
      clip.get_end() as f64 / sample_rate
    );
  }
  Ok(())
}
