use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{
    config::DEFAULT_DISCONTINUITY_EPSILON, AnalysisCompletion, Category, EffectDispatcher,
    HitSyncError, PlaybackClock, Result, SeekPolicy, SyncConfig, SyncCursor, TrackSet,
};

/// Identifier of the audio source the engine is currently serving.
///
/// Every call to [`SyncEngine::begin_source`] hands out a larger token.
/// Results tagged with an older token belong to a superseded file.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// No tracks for the current source.
    Idle,
    /// Tracks loaded, clock not polled since.
    Armed,
    /// Following the clock.
    Synced,
}

/// Result of offering tracks to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// The tracks belonged to a superseded source and were dropped.
    Stale {
        current: Generation,
        received: Generation,
    },
}

impl LoadOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, LoadOutcome::Applied)
    }
}

/// What a single [`SyncEngine::tick`] observed and fired.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub position: f64,
    pub playing: bool,
    /// The clock jumped backward and the cursors were rewound.
    pub discontinuity: bool,
    pub kicks: Vec<f64>,
    pub snares: Vec<f64>,
    pub vocals: Vec<f64>,
}

impl TickReport {
    pub fn fired(&self, category: Category) -> &[f64] {
        match category {
            Category::Kick => &self.kicks,
            Category::Snare => &self.snares,
            Category::Vocal => &self.vocals,
        }
    }

    pub fn total_fired(&self) -> usize {
        self.kicks.len() + self.snares.len() + self.vocals.len()
    }

    fn set_fired(&mut self, category: Category, fired: Vec<f64>) {
        match category {
            Category::Kick => self.kicks = fired,
            Category::Snare => self.snares = fired,
            Category::Vocal => self.vocals = fired,
        }
    }
}

/// Drives one cursor per category from a polled [`PlaybackClock`].
///
/// All state is owned by the instance, so independent engines (a preview
/// and a main player, say) can run side by side. The engine expects to be
/// driven from a single control flow: the render loop calls
/// [`SyncEngine::tick`] once per frame and asynchronous analysis results are
/// handed over through [`SyncEngine::complete`].
#[derive(Debug)]
pub struct SyncEngine {
    config: SyncConfig,
    state: EngineState,
    generation: Generation,
    cursors: [SyncCursor; 3],
    last_seen_position: f64,
    tempo_bpm: Option<f32>,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

impl SyncEngine {
    /// Creates an idle engine. An invalid epsilon falls back to the default.
    pub fn new(mut config: SyncConfig) -> Self {
        if let Err(err) = config.validate() {
            warn!(
                epsilon = config.discontinuity_epsilon,
                error = %err,
                "using default discontinuity epsilon"
            );
            config.discontinuity_epsilon = DEFAULT_DISCONTINUITY_EPSILON;
        }

        Self {
            config,
            state: EngineState::Idle,
            generation: Generation::default(),
            cursors: Default::default(),
            last_seen_position: 0.0,
            tempo_bpm: None,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn last_seen_position(&self) -> f64 {
        self.last_seen_position
    }

    /// Tempo reported alongside the current tracks, if any.
    pub fn tempo_bpm(&self) -> Option<f32> {
        self.tempo_bpm
    }

    pub fn cursor(&self, category: Category) -> &SyncCursor {
        &self.cursors[category.index()]
    }

    /// Starts serving a new audio source.
    ///
    /// Drops the current tracks and returns the token that results for the
    /// new source must carry.
    pub fn begin_source(&mut self) -> Generation {
        self.generation = self.generation.next();
        self.cursors = Default::default();
        self.tempo_bpm = None;
        self.last_seen_position = 0.0;
        self.transition(EngineState::Idle);
        debug!(generation = %self.generation, "began new audio source");
        self.generation
    }

    /// Replaces all three tracks if `generation` is still current.
    ///
    /// The clock's present position becomes the reference for backward-jump
    /// detection.
    pub fn load_tracks<C>(
        &mut self,
        generation: Generation,
        tracks: TrackSet,
        clock: &C,
    ) -> LoadOutcome
    where
        C: PlaybackClock + ?Sized,
    {
        if generation != self.generation {
            debug!(
                current = %self.generation,
                received = %generation,
                "discarding tracks for superseded source"
            );
            return LoadOutcome::Stale {
                current: self.generation,
                received: generation,
            };
        }

        let position = sanitize(clock.position());
        let TrackSet { kick, snare, vocal } = tracks;
        self.cursors = [
            SyncCursor::new(kick),
            SyncCursor::new(snare),
            SyncCursor::new(vocal),
        ];
        if self.config.seek_policy == SeekPolicy::Skip {
            self.cursors
                .iter_mut()
                .for_each(|cursor| cursor.skip_to(position));
        }
        self.last_seen_position = position;
        debug!(
            generation = %generation,
            position,
            kicks = self.cursors[0].track().len(),
            snares = self.cursors[1].track().len(),
            vocals = self.cursors[2].track().len(),
            "loaded event tracks"
        );
        self.transition(EngineState::Armed);
        LoadOutcome::Applied
    }

    /// Applies the outcome of an analysis request.
    ///
    /// Results for superseded sources are dropped whatever they contain. A
    /// failure for the current source clears the tracks and is handed back.
    pub fn complete<C>(&mut self, completion: AnalysisCompletion, clock: &C) -> Result<LoadOutcome>
    where
        C: PlaybackClock + ?Sized,
    {
        let AnalysisCompletion { generation, result } = completion;
        if generation != self.generation {
            debug!(
                current = %self.generation,
                received = %generation,
                ok = result.is_ok(),
                "discarding analysis for superseded source"
            );
            return Ok(LoadOutcome::Stale {
                current: self.generation,
                received: generation,
            });
        }

        match result {
            Ok(response) => {
                let tempo = response.tempo;
                let outcome = self.load_tracks(generation, response.into_tracks(), clock);
                self.tempo_bpm = tempo;
                Ok(outcome)
            }
            Err(err) => {
                warn!(generation = %generation, error = %err, "analysis failed; clearing tracks");
                self.cursors = Default::default();
                self.tempo_bpm = None;
                self.transition(EngineState::Idle);
                Err(err)
            }
        }
    }

    /// Polls `clock` and fires every event crossed since the previous tick.
    ///
    /// Paused clocks fire nothing, but their position still becomes the new
    /// reference so resuming in place is not mistaken for a seek. A backward
    /// jump larger than the configured epsilon rewinds every cursor before
    /// advancing, whether or not the clock is playing.
    pub fn tick<C, D>(&mut self, clock: &C, dispatcher: &mut D) -> Result<TickReport>
    where
        C: PlaybackClock + ?Sized,
        D: EffectDispatcher + ?Sized,
    {
        if self.state == EngineState::Idle {
            return Err(HitSyncError::NoTracksLoaded);
        }

        let position = clock.position();
        if !position.is_finite() {
            return Err(HitSyncError::InvalidInput(
                "playback clock reported a non-finite position",
            ));
        }
        let playing = clock.is_playing();

        let discontinuity =
            position < self.last_seen_position - self.config.discontinuity_epsilon;
        if discontinuity {
            debug!(
                from = self.last_seen_position,
                to = position,
                "clock jumped backward; rewinding cursors"
            );
            self.rewind(position);
        }

        let mut report = TickReport {
            position,
            playing,
            discontinuity,
            ..Default::default()
        };

        if playing {
            for category in Category::ALL {
                let fired = self.cursors[category.index()].advance(position);
                for timestamp in &fired {
                    trace!(%category, timestamp, position, "fire");
                    dispatcher.fire(category, *timestamp);
                }
                report.set_fired(category, fired);
            }
        }

        self.last_seen_position = position;
        if self.state == EngineState::Armed {
            self.transition(EngineState::Synced);
        }
        Ok(report)
    }

    fn rewind(&mut self, position: f64) {
        for cursor in &mut self.cursors {
            cursor.reset();
            if self.config.seek_policy == SeekPolicy::Skip {
                cursor.skip_to(position);
            }
        }
    }

    fn transition(&mut self, next: EngineState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "sync engine state change");
            self.state = next;
        }
    }
}

fn sanitize(position: f64) -> f64 {
    if position.is_finite() {
        position.max(0.0)
    } else {
        0.0
    }
}
