use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use failure::Error;

use super::kits::{default_drum_kits, DrumKitDefinition, DrumKitId};
use crate::audio::wav::decode_wav;
use crate::audio::{get_clips, AudioBuffer, AudioDestination, BufferSource, Clip, ClipOptions};
use crate::config::DrumKits as DrumKitsConfig;
use crate::logger::{LoggerRef, Severity};
use crate::pool::{submit, ExecutionPool, PoolRef, Task};
use crate::song::DrumType;

/// Where the audio file of a kit comes from.
pub trait KitSource: Send + Sync {
  fn fetch(&self, location: &str) -> Result<Vec<u8>, Error>;
}

pub struct FileKitSource {
  directory: PathBuf,
}

impl FileKitSource {
  pub fn new<P: Into<PathBuf>>(directory: P) -> FileKitSource {
    FileKitSource {
      directory: directory.into(),
    }
  }
}

impl KitSource for FileKitSource {
  fn fetch(&self, location: &str) -> Result<Vec<u8>, Error> {
    Ok(fs::read(self.directory.join(location))?)
  }
}

pub type DrumBuffers = HashMap<DrumType, Arc<AudioBuffer>>;

enum KitState {
  Loading,
  Loaded(Arc<DrumBuffers>),
}

type KitStates = Arc<Mutex<HashMap<DrumKitId, KitState>>>;

/// Assigns the clips to the kit slices in order.
pub fn map_clips(
  definition: &DrumKitDefinition,
  buffer: &AudioBuffer,
  clips: &[Clip],
  logger: &LoggerRef,
) -> DrumBuffers {
  if clips.len() != definition.slices.len() {
    logger.log(
      Severity::Warning,
      &format!(
        "Drum kit \"{}\": expected {} samples, found {} clips.",
        definition.name,
        definition.slices.len(),
        clips.len()
      ),
    );
  }

  let mut buffers = DrumBuffers::new();
  for (drums, clip) in definition.slices.iter().zip(clips) {
    let clip_buffer = Arc::new(buffer.clip_region(clip));
    for drum in drums {
      buffers.insert(*drum, clip_buffer.clone());
    }
  }
  buffers
}

pub struct DrumKitLibrary {
  definitions: Vec<DrumKitDefinition>,
  kits: KitStates,
  source: Arc<dyn KitSource>,
  pool: PoolRef,
  logger: LoggerRef,
  clip_options: ClipOptions,
}

impl DrumKitLibrary {
  pub fn new(
    definitions: Vec<DrumKitDefinition>,
    source: Arc<dyn KitSource>,
    pool: PoolRef,
    logger: LoggerRef,
    config: &DrumKitsConfig,
  ) -> DrumKitLibrary {
    DrumKitLibrary {
      definitions,
      kits: Arc::new(Mutex::new(HashMap::new())),
      source,
      pool,
      logger,
      clip_options: ClipOptions::new(config.minimum_silence_duration, config.minimum_clip_duration),
    }
  }

  pub fn from_config(pool: PoolRef, logger: LoggerRef, config: &DrumKitsConfig) -> DrumKitLibrary {
    let source = Arc::new(FileKitSource::new(config.directory.clone()));
    DrumKitLibrary::new(default_drum_kits(), source, pool, logger, config)
  }

  pub fn definitions(&self) -> &[DrumKitDefinition] {
    &self.definitions
  }

  pub fn find_definition(&self, kit_id: DrumKitId) -> Option<&DrumKitDefinition> {
    self.definitions.iter().find(|kit| kit.id == kit_id)
  }

  /// Starts loading the kit unless it is loading or loaded already.
  ///
  /// Failures are logged and leave the kit unmapped so a later call tries again.
  pub fn ensure_loaded(&self, kit_id: DrumKitId) -> Option<Task<()>> {
    let definition = match self.find_definition(kit_id) {
      Some(definition) => definition.clone(),
      None => {
        self
          .logger
          .log(Severity::Warning, &format!("Unknown drum kit id {}.", kit_id));
        return None;
      }
    };

    {
      let mut kits = self.kits.lock().unwrap_or_else(|e| e.into_inner());
      if kits.contains_key(&kit_id) {
        return None;
      }
      kits.insert(kit_id, KitState::Loading);
    }

    let kits = self.kits.clone();
    let source = self.source.clone();
    let logger = self.logger.clone();
    let clip_options = self.clip_options;

    let task = submit(&*self.pool, move || {
      let loaded = source
        .fetch(&definition.location)
        .and_then(|bytes| decode_wav(&bytes).map_err(Error::from))
        .map(|buffer| {
          let clips = get_clips(buffer.channels(), buffer.get_sample_rate(), &clip_options);
          map_clips(&definition, &buffer, &clips, &logger)
        });

      match loaded {
        Ok(buffers) => {
          let drums = buffers.len();
          kits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kit_id, KitState::Loaded(Arc::new(buffers)));
          logger.log(
            Severity::Info,
            &format!("Drum kit \"{}\" loaded with {} drums.", definition.name, drums),
          );
        }
        Err(err) => {
          kits.lock().unwrap_or_else(|e| e.into_inner()).remove(&kit_id);
          logger.log(
            Severity::Error,
            &format!("Failed to load drum kit \"{}\": {}", definition.name, err),
          );
        }
      }
    });

    Some(task)
  }

  pub fn is_loaded(&self, kit_id: DrumKitId) -> bool {
    self.get_buffers(kit_id).is_some()
  }

  fn get_buffers(&self, kit_id: DrumKitId) -> Option<Arc<DrumBuffers>> {
    let kits = self.kits.lock().unwrap_or_else(|e| e.into_inner());
    match kits.get(&kit_id) {
      Some(KitState::Loaded(buffers)) => Some(buffers.clone()),
      _ => None,
    }
  }

  pub fn get_buffer(&self, kit_id: DrumKitId, drum: DrumType) -> Option<Arc<AudioBuffer>> {
    self
      .get_buffers(kit_id)
      .and_then(|buffers| buffers.get(&drum).cloned())
  }

  /// Schedules the hit at `start_time`, returns whether there was something to play.
  pub fn play(
    &self,
    destination: &mut dyn AudioDestination,
    kit_id: DrumKitId,
    drum: DrumType,
    start_time: f64,
  ) -> bool {
    match self.get_buffer(kit_id, drum) {
      Some(buffer) => {
        destination.start(BufferSource::new(buffer, 1.0, start_time));
        true
      }
      None => {
        self.logger.log(
          Severity::Warning,
          &format!("Missing sample for drum {:?} in kit {}.", drum, kit_id),
        );
        false
      }
    }
  }
}
