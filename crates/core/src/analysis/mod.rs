use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Category, EventTrack, Generation, HitSyncError, Result, TrackSet};

/// Decoded body of the onset-analysis service.
///
/// The service answers with `tempo`, `kicks`, `snares` and `vocals`; each
/// event field is an array of second offsets. Parsing is lenient: a missing
/// or malformed event field is an empty list rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisResponse {
    pub tempo: Option<f32>,
    pub kicks: Vec<f64>,
    pub snares: Vec<f64>,
    pub vocals: Vec<f64>,
}

impl AnalysisResponse {
    /// Parses a response body.
    ///
    /// Fails only when the body is not a JSON object or is the service's
    /// `{"error": ...}` rejection.
    pub fn from_json(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| HitSyncError::msg("analysis response is not a JSON object"))?;

        if let Some(error) = object.get("error") {
            let reason = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(HitSyncError::AnalysisRejected(reason));
        }

        Ok(Self {
            tempo: object
                .get("tempo")
                .and_then(Value::as_f64)
                .filter(|bpm| bpm.is_finite())
                .map(|bpm| bpm as f32),
            kicks: numeric_array(object, Category::Kick),
            snares: numeric_array(object, Category::Snare),
            vocals: numeric_array(object, Category::Vocal),
        })
    }

    pub fn events(&self, category: Category) -> &[f64] {
        match category {
            Category::Kick => &self.kicks,
            Category::Snare => &self.snares,
            Category::Vocal => &self.vocals,
        }
    }

    /// Builds one validated [`EventTrack`] per category.
    pub fn to_tracks(&self) -> TrackSet {
        self.clone().into_tracks()
    }

    pub fn into_tracks(self) -> TrackSet {
        TrackSet::new(
            EventTrack::from(self.kicks),
            EventTrack::from(self.snares),
            EventTrack::from(self.vocals),
        )
    }

    /// Counts and extent of the usable events.
    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary::from_tracks(self.tempo, &self.to_tracks())
    }
}

fn numeric_array(object: &Map<String, Value>, category: Category) -> Vec<f64> {
    match object.get(category.field()) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_f64).collect(),
        _ => Vec::new(),
    }
}

/// Summary of an analysis result after validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub tempo_bpm: Option<f32>,
    pub kicks: usize,
    pub snares: usize,
    pub vocals: usize,
    /// Latest timestamp over every track.
    pub last_event_seconds: Option<f64>,
}

impl AnalysisSummary {
    pub fn from_tracks(tempo_bpm: Option<f32>, tracks: &TrackSet) -> Self {
        let last_event_seconds = Category::ALL
            .iter()
            .filter_map(|category| tracks.get(*category).last())
            .reduce(f64::max);

        Self {
            tempo_bpm,
            kicks: tracks.kick.len(),
            snares: tracks.snare.len(),
            vocals: tracks.vocal.len(),
            last_event_seconds,
        }
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Kick => self.kicks,
            Category::Snare => self.snares,
            Category::Vocal => self.vocals,
        }
    }
}

/// Outcome of an analysis request, tagged with the source it was issued for.
#[derive(Debug)]
pub struct AnalysisCompletion {
    pub generation: Generation,
    pub result: Result<AnalysisResponse>,
}

impl AnalysisCompletion {
    pub fn new(generation: Generation, result: Result<AnalysisResponse>) -> Self {
        Self { generation, result }
    }

    /// Completion carrying a raw response body.
    pub fn from_body(generation: Generation, body: &str) -> Self {
        Self::new(generation, AnalysisResponse::from_json(body))
    }
}
