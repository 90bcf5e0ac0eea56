/// Read-only view of the transport driving playback.
///
/// Implemented by whatever audio primitive is in use. The engine only ever
/// polls it; nothing is pushed back.
pub trait PlaybackClock {
    /// Current playback time in seconds.
    fn position(&self) -> f64;

    fn is_playing(&self) -> bool;

    /// Total length in seconds, `0.0` when unknown or nothing is loaded.
    fn duration(&self) -> f64;
}

impl<C: PlaybackClock + ?Sized> PlaybackClock for &C {
    fn position(&self) -> f64 {
        (**self).position()
    }

    fn is_playing(&self) -> bool {
        (**self).is_playing()
    }

    fn duration(&self) -> f64 {
        (**self).duration()
    }
}

/// Manually driven clock used by the replay driver and by tests.
#[derive(Debug, Default, Clone)]
pub struct TransportClock {
    position: f64,
    duration: f64,
    playing: bool,
}

impl TransportClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(duration: f64) -> Self {
        let mut clock = Self::new();
        clock.set_duration(duration);
        clock
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = if duration.is_finite() {
            duration.max(0.0)
        } else {
            0.0
        };
        self.position = self.clamp(self.position);
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Pauses and rewinds to the start.
    pub fn stop(&mut self) {
        self.playing = false;
        self.position = 0.0;
    }

    /// Jumps to `position`, clamped to the known duration.
    pub fn seek(&mut self, position: f64) {
        if position.is_finite() {
            self.position = self.clamp(position);
        }
    }

    /// Moves forward by `delta` seconds while playing. Reaching the end of a
    /// source with a known duration stops playback there.
    pub fn advance(&mut self, delta: f64) {
        if !self.playing || !delta.is_finite() || delta <= 0.0 {
            return;
        }

        self.position = self.clamp(self.position + delta);
        if self.duration > 0.0 && self.position >= self.duration {
            self.playing = false;
        }
    }

    fn clamp(&self, position: f64) -> f64 {
        let position = position.max(0.0);
        if self.duration > 0.0 {
            position.min(self.duration)
        } else {
            position
        }
    }
}

impl PlaybackClock for TransportClock {
    fn position(&self) -> f64 {
        self.position
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn duration(&self) -> f64 {
        self.duration
    }
}
