pub mod buffer;
pub mod clips;
pub mod frequency;
pub mod mixer;
pub mod mp3;
pub mod stretch;
pub mod wav;

pub use self::buffer::{AudioBuffer, ChannelData};
pub use self::clips::{get_clips, Clip, ClipOptions};
pub use self::frequency::{detect_frequency, detect_frequency_async};
pub use self::mixer::{
  realtime_mixer, AudioDestination, BufferSource, Mixer, MixerSender, OfflineContext,
  RealtimeMixer,
};
