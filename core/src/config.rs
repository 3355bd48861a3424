use failure::Error;

use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Scheduler {
  /// Seconds of track time scheduled on every pass.
  pub lookahead: f64,
}

impl Default for Scheduler {
  fn default() -> Scheduler {
    Scheduler { lookahead: 0.2 }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Clips {
  pub silence_threshold: f32,
}

impl Default for Clips {
  fn default() -> Clips {
    Clips {
      silence_threshold: 0.001,
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DrumKits {
  pub directory: String,
  pub minimum_silence_duration: f64,
  pub minimum_clip_duration: f64,
}

impl Default for DrumKits {
  fn default() -> DrumKits {
    DrumKits {
      directory: ".".to_string(),
      minimum_silence_duration: 0.005,
      minimum_clip_duration: 0.05,
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Stretch {
  pub block_size: usize,
  pub sequence_ms: f64,
  pub overlap_ms: f64,
  pub seek_window_ms: f64,
}

impl Default for Stretch {
  fn default() -> Stretch {
    Stretch {
      block_size: 4096,
      sequence_ms: 40.0,
      overlap_ms: 8.0,
      seek_window_ms: 15.0,
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Render {
  pub sample_rate: u32,
  /// Conservative length of a drum hit, the real one is unknown until the kit is loaded.
  pub drum_hit_duration: f64,
  pub block_frames: usize,
}

impl Default for Render {
  fn default() -> Render {
    Render {
      sample_rate: 44100,
      drum_hit_duration: 2.0,
      block_frames: 512,
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Pool {
  pub workers: usize,
}

impl Default for Pool {
  fn default() -> Pool {
    Pool { workers: 4 }
  }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
  pub scheduler: Scheduler,
  pub clips: Clips,
  pub drum_kits: DrumKits,
  pub stretch: Stretch,
  pub render: Render,
  pub pool: Pool,
}

impl Config {
  pub fn from_file<'a, T>(path: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let mut content = String::new();
    let path_str = path.into();
    let mut file = File::open(path_str)?;
    file.read_to_string(&mut content)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
  }

  #[allow(clippy::should_implement_trait)]
  pub fn from_str<'a, T>(content: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let config: Config = toml::from_str(content.into())?;
    Ok(config)
  }
}
