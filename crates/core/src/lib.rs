//! Core library for the hitsync player.
//!
//! The crate turns pre-computed onset timestamps (kick, snare and vocal hits
//! reported by an external analysis service) into fire notifications that
//! line up with a live playback clock. Each module owns one piece of that
//! pipeline: validated event tracks, per-track cursors, the engine that
//! polls the clock once per rendered frame, and the dispatchers that turn
//! fires into visual effects.

pub mod analysis;
pub mod clock;
pub mod config;
pub mod cursor;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod track;

pub use analysis::{AnalysisCompletion, AnalysisResponse, AnalysisSummary};
pub use clock::{PlaybackClock, TransportClock};
pub use config::{AppConfig, ReplayConfig, SeekPolicy, SyncConfig};
pub use cursor::SyncCursor;
pub use dispatch::{EffectDispatcher, Fire, FireLog, FlashConfig, FlashLevels, FlashOverlay};
pub use engine::{EngineState, Generation, LoadOutcome, SyncEngine, TickReport};
pub use error::{HitSyncError, Result};
pub use track::{Category, EventTrack, TrackSet};
