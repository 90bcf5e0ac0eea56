use crate::EventTrack;

/// Forward-only pointer into an [`EventTrack`].
///
/// `next_index` names the first timestamp that has not fired yet. It only
/// moves forward through [`SyncCursor::advance`]; going back is always an
/// explicit [`SyncCursor::reset`].
#[derive(Debug, Clone, Default)]
pub struct SyncCursor {
    track: EventTrack,
    next_index: usize,
}

impl SyncCursor {
    pub fn new(track: EventTrack) -> Self {
        Self {
            track,
            next_index: 0,
        }
    }

    pub fn track(&self) -> &EventTrack {
        &self.track
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Timestamps still waiting to fire.
    pub fn pending(&self) -> usize {
        self.track.len() - self.next_index
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_index >= self.track.len()
    }

    /// Fires every pending timestamp at or before `position`, in order.
    ///
    /// A coarse tick that skipped over several events returns all of them at
    /// once. Positions at or behind the last one seen return nothing.
    pub fn advance(&mut self, position: f64) -> Vec<f64> {
        let pending = &self.track.as_slice()[self.next_index..];
        let crossed = pending.iter().take_while(|t| **t <= position).count();
        let fired = pending[..crossed].to_vec();
        self.next_index += crossed;
        fired
    }

    pub fn reset(&mut self) {
        self.next_index = 0;
    }

    /// Marks everything at or before `position` as already fired.
    pub fn skip_to(&mut self, position: f64) {
        self.next_index = self.track.count_until(position);
    }
}
