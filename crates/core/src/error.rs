/// Result alias that carries the custom [`HitSyncError`] type.
pub type Result<T> = std::result::Result<T, HitSyncError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum HitSyncError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The analysis body was not valid JSON.
    #[error("malformed analysis response: {0}")]
    Json(#[from] serde_json::Error),
    /// The analysis service answered with an explicit error body.
    #[error("analysis service rejected the request: {0}")]
    AnalysisRejected(String),
    /// `tick` was called before any tracks were loaded for the active source.
    #[error("sync engine has no tracks loaded; call load_tracks before tick")]
    NoTracksLoaded,
    /// A caller handed the engine a value it cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

impl HitSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for HitSyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for HitSyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
