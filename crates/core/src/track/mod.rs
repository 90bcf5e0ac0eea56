use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// Detected audio feature an [`EventTrack`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Kick,
    Snare,
    Vocal,
}

impl Category {
    /// Every category in dispatch order.
    pub const ALL: [Category; 3] = [Category::Kick, Category::Snare, Category::Vocal];

    pub fn name(self) -> &'static str {
        match self {
            Category::Kick => "kick",
            Category::Snare => "snare",
            Category::Vocal => "vocal",
        }
    }

    /// Field carrying this category in an analysis response body.
    pub fn field(self) -> &'static str {
        match self {
            Category::Kick => "kicks",
            Category::Snare => "snares",
            Category::Vocal => "vocals",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Category::Kick => 0,
            Category::Snare => 1,
            Category::Vocal => 2,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable, ascending list of event timestamps in seconds.
///
/// Cloning is cheap: the timestamps live behind an [`Arc`] so cursors share
/// the same storage. A track cannot be mutated once built; a new analysis
/// result means a new track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTrack {
    timestamps: Arc<[f64]>,
}

impl EventTrack {
    /// Track that never fires.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of timestamps, duplicates included.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.timestamps.get(index).copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn last(&self) -> Option<f64> {
        self.timestamps.last().copied()
    }

    /// Number of timestamps at or before `position`.
    pub fn count_until(&self, position: f64) -> usize {
        self.timestamps.partition_point(|t| *t <= position)
    }

    /// Builds a track from unordered raw timestamps. Non-finite and negative
    /// values are dropped rather than rejected.
    pub fn from_raw<I>(raw: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut timestamps: Vec<f64> = raw
            .into_iter()
            .filter(|t| t.is_finite() && *t >= 0.0)
            .collect();
        timestamps.sort_by(f64::total_cmp);
        Self {
            timestamps: timestamps.into(),
        }
    }
}

impl From<Vec<f64>> for EventTrack {
    fn from(raw: Vec<f64>) -> Self {
        Self::from_raw(raw)
    }
}

impl From<&[f64]> for EventTrack {
    fn from(raw: &[f64]) -> Self {
        Self::from_raw(raw.iter().copied())
    }
}

/// One track per [`Category`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSet {
    pub kick: EventTrack,
    pub snare: EventTrack,
    pub vocal: EventTrack,
}

impl TrackSet {
    pub fn new(kick: EventTrack, snare: EventTrack, vocal: EventTrack) -> Self {
        Self { kick, snare, vocal }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, category: Category) -> &EventTrack {
        match category {
            Category::Kick => &self.kick,
            Category::Snare => &self.snare,
            Category::Vocal => &self.vocal,
        }
    }

    /// Total number of events across every category.
    pub fn total_events(&self) -> usize {
        Category::ALL.iter().map(|c| self.get(*c).len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_unordered_input() {
        let track = EventTrack::from(vec![3.5, 1.0, 2.0, 2.0]);
        assert_eq!(track.as_slice(), &[1.0, 2.0, 2.0, 3.5]);
    }

    #[test]
    fn drops_non_finite_and_negative_values() {
        let track = EventTrack::from(vec![f64::NAN, -0.5, 1.0, f64::INFINITY, 0.0]);
        assert_eq!(track.as_slice(), &[0.0, 1.0]);
    }

    #[test]
    fn empty_input_yields_empty_track() {
        let track = EventTrack::from(Vec::<f64>::new());
        assert!(track.is_empty());
        assert_eq!(track.last(), None);
    }

    #[test]
    fn counts_timestamps_up_to_position() {
        let track = EventTrack::from(vec![1.0, 2.0, 2.0, 3.5]);
        assert_eq!(track.count_until(0.5), 0);
        assert_eq!(track.count_until(2.0), 3);
        assert_eq!(track.count_until(10.0), 4);
    }

    #[test]
    fn clones_share_storage() {
        let track = EventTrack::from(vec![1.0]);
        let copy = track.clone();
        assert!(std::ptr::eq(track.as_slice(), copy.as_slice()));
    }

    #[test]
    fn category_names_match_response_fields() {
        let fields: Vec<_> = Category::ALL.iter().map(|c| c.field()).collect();
        assert_eq!(fields, ["kicks", "snares", "vocals"]);
        assert_eq!(Category::Snare.to_string(), "snare");
    }
}
