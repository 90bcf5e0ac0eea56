use serde::{Deserialize, Serialize};

use crate::Category;

/// Receiver of fire notifications. One method per category; each gets the
/// timestamp that was crossed.
pub trait EffectDispatcher {
    fn kick(&mut self, timestamp: f64);

    fn snare(&mut self, timestamp: f64);

    fn vocal(&mut self, timestamp: f64);

    /// Routes a fire to the matching category method.
    fn fire(&mut self, category: Category, timestamp: f64) {
        match category {
            Category::Kick => self.kick(timestamp),
            Category::Snare => self.snare(timestamp),
            Category::Vocal => self.vocal(timestamp),
        }
    }
}

impl<D: EffectDispatcher + ?Sized> EffectDispatcher for &mut D {
    fn kick(&mut self, timestamp: f64) {
        (**self).kick(timestamp);
    }

    fn snare(&mut self, timestamp: f64) {
        (**self).snare(timestamp);
    }

    fn vocal(&mut self, timestamp: f64) {
        (**self).vocal(timestamp);
    }
}

impl<A: EffectDispatcher, B: EffectDispatcher> EffectDispatcher for (A, B) {
    fn kick(&mut self, timestamp: f64) {
        self.0.kick(timestamp);
        self.1.kick(timestamp);
    }

    fn snare(&mut self, timestamp: f64) {
        self.0.snare(timestamp);
        self.1.snare(timestamp);
    }

    fn vocal(&mut self, timestamp: f64) {
        self.0.vocal(timestamp);
        self.1.vocal(timestamp);
    }
}

/// Single recorded fire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fire {
    pub category: Category,
    pub timestamp: f64,
}

/// Dispatcher that records every fire in arrival order.
#[derive(Debug, Default, Clone)]
pub struct FireLog {
    fires: Vec<Fire>,
}

impl FireLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fires(&self) -> &[Fire] {
        &self.fires
    }

    /// Timestamps fired for one category, in order.
    pub fn timestamps(&self, category: Category) -> Vec<f64> {
        self.fires
            .iter()
            .filter(|fire| fire.category == category)
            .map(|fire| fire.timestamp)
            .collect()
    }

    pub fn count(&self, category: Category) -> usize {
        self.fires
            .iter()
            .filter(|fire| fire.category == category)
            .count()
    }

    pub fn clear(&mut self) {
        self.fires.clear();
    }

    fn record(&mut self, category: Category, timestamp: f64) {
        self.fires.push(Fire {
            category,
            timestamp,
        });
    }
}

impl EffectDispatcher for FireLog {
    fn kick(&mut self, timestamp: f64) {
        self.record(Category::Kick, timestamp);
    }

    fn snare(&mut self, timestamp: f64) {
        self.record(Category::Snare, timestamp);
    }

    fn vocal(&mut self, timestamp: f64) {
        self.record(Category::Vocal, timestamp);
    }
}

/// How long each category's flash takes to fade out, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashConfig {
    pub kick_decay_seconds: f64,
    pub snare_decay_seconds: f64,
    pub vocal_decay_seconds: f64,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            kick_decay_seconds: 0.15,
            snare_decay_seconds: 0.1,
            vocal_decay_seconds: 0.3,
        }
    }
}

impl FlashConfig {
    pub fn decay_seconds(&self, category: Category) -> f64 {
        match category {
            Category::Kick => self.kick_decay_seconds,
            Category::Snare => self.snare_decay_seconds,
            Category::Vocal => self.vocal_decay_seconds,
        }
    }
}

/// Snapshot of the overlay intensities, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlashLevels {
    pub kick: f32,
    pub snare: f32,
    pub vocal: f32,
}

impl FlashLevels {
    pub fn get(&self, category: Category) -> f32 {
        match category {
            Category::Kick => self.kick,
            Category::Snare => self.snare,
            Category::Vocal => self.vocal,
        }
    }
}

/// Screen-flash state a renderer can sample once per frame.
///
/// A fire pushes its category to full intensity; [`FlashOverlay::decay`]
/// fades it back out linearly.
#[derive(Debug, Clone, Default)]
pub struct FlashOverlay {
    config: FlashConfig,
    levels: [f32; 3],
    flashes: usize,
}

impl FlashOverlay {
    pub fn new(config: FlashConfig) -> Self {
        Self {
            config,
            levels: [0.0; 3],
            flashes: 0,
        }
    }

    pub fn levels(&self) -> FlashLevels {
        FlashLevels {
            kick: self.levels[Category::Kick.index()],
            snare: self.levels[Category::Snare.index()],
            vocal: self.levels[Category::Vocal.index()],
        }
    }

    /// Number of flashes triggered since construction.
    pub fn flashes(&self) -> usize {
        self.flashes
    }

    /// Fades every category by `delta` seconds worth of decay.
    pub fn decay(&mut self, delta: f64) {
        if !delta.is_finite() || delta <= 0.0 {
            return;
        }

        for category in Category::ALL {
            let span = self.config.decay_seconds(category);
            let level = &mut self.levels[category.index()];
            if span <= 0.0 {
                *level = 0.0;
            } else {
                *level = (*level - (delta / span) as f32).max(0.0);
            }
        }
    }

    fn flash(&mut self, category: Category) {
        self.levels[category.index()] = 1.0;
        self.flashes += 1;
    }
}

impl EffectDispatcher for FlashOverlay {
    fn kick(&mut self, _timestamp: f64) {
        self.flash(Category::Kick);
    }

    fn snare(&mut self, _timestamp: f64) {
        self.flash(Category::Snare);
    }

    fn vocal(&mut self, _timestamp: f64) {
        self.flash(Category::Vocal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_routes_to_category_method() {
        let mut log = FireLog::new();
        log.fire(Category::Vocal, 1.5);
        log.fire(Category::Kick, 2.0);

        assert_eq!(
            log.fires(),
            &[
                Fire {
                    category: Category::Vocal,
                    timestamp: 1.5
                },
                Fire {
                    category: Category::Kick,
                    timestamp: 2.0
                },
            ]
        );
        assert_eq!(log.timestamps(Category::Kick), vec![2.0]);
        assert_eq!(log.count(Category::Snare), 0);
    }

    #[test]
    fn flash_decays_linearly_to_zero() {
        let mut overlay = FlashOverlay::new(FlashConfig {
            kick_decay_seconds: 0.2,
            ..Default::default()
        });

        overlay.kick(0.0);
        assert_eq!(overlay.levels().kick, 1.0);

        overlay.decay(0.1);
        assert!((overlay.levels().kick - 0.5).abs() < 1e-6);

        overlay.decay(1.0);
        assert_eq!(overlay.levels().kick, 0.0);
        assert_eq!(overlay.flashes(), 1);
    }

    #[test]
    fn zero_decay_span_clears_immediately() {
        let mut overlay = FlashOverlay::new(FlashConfig {
            snare_decay_seconds: 0.0,
            ..Default::default()
        });
        overlay.snare(1.0);
        overlay.decay(0.001);
        assert_eq!(overlay.levels().get(Category::Snare), 0.0);
    }

    #[test]
    fn pair_fans_out_to_both() {
        let mut pair = (FlashOverlay::default(), FireLog::new());
        pair.fire(Category::Snare, 3.0);

        assert_eq!(pair.0.levels().snare, 1.0);
        assert_eq!(pair.1.timestamps(Category::Snare), vec![3.0]);
    }
}
