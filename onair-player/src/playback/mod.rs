//! Playback: the engine actor and the policies it consults

pub mod buffer_health;
pub mod engine;
pub mod reconnect;
pub mod status;
pub mod timers;

pub use buffer_health::BufferHealthMonitor;
pub use engine::{EngineBuilder, EngineCommand, EngineDiagnostics, EngineHandle, PlaybackEngine};
pub use reconnect::ReconnectionScheduler;
pub use status::EngineStatus;
