use failure::Error;

use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;

use tab_sampler_core::config::Config as EngineConfig;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
  #[serde(flatten)]
  pub engine: EngineConfig,
  pub device: Device,
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

  #[allow(dead_code, clippy::should_implement_trait)]
  pub fn from_str<'a, T>(content: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let config: Config = toml::from_str(content.into())?;
    Ok(config)
  }
}

/// The simulated output device used by `play`.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Device {
  pub sample_rate: u32,
  pub block_frames: usize,
}

impl Default for Device {
  fn default() -> Device {
    Device {
      sample_rate: 44100,
      block_frames: 1024,
    }
  }
}
