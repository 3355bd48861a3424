pub mod audio;
pub mod config;
pub mod error;
pub mod logger;
pub mod pitch;
pub mod players;
pub mod pool;
pub mod render;
pub mod score;
pub mod song;
pub mod time;
pub mod transport;
