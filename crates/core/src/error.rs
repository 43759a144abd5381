use crate::source::TrackSource;

/// Result alias that carries the custom [`XsrcError`] type.
pub type Result<T> = std::result::Result<T, XsrcError>;

/// Common error type for the core crate.
///
/// The beat engine and the timing helpers never produce these; they degrade
/// to documented defaults instead. Errors come from the boundaries: analysis
/// validation, source adapters, configuration and clip editing.
#[derive(Debug, thiserror::Error)]
pub enum XsrcError {
    /// Free-form message, mostly used for lock poisoning and adapter
    /// transport failures.
    #[error("{0}")]
    Message(String),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// An analysis failed validation before being loaded into the engine.
    #[error("invalid analysis: {field}[{index}] {reason}")]
    InvalidAnalysis {
        field: &'static str,
        index: usize,
        reason: &'static str,
    },
    /// Credentials for a source are missing or were rejected.
    #[error("{kind} authentication failed: {reason}")]
    Authentication { kind: TrackSource, reason: String },
    #[error("{kind} track `{id}` not found")]
    NotFound { kind: TrackSource, id: String },
    /// The caller invoked an operation the source does not advertise.
    #[error("{kind} source does not support {operation}")]
    Unsupported {
        kind: TrackSource,
        operation: &'static str,
    },
    #[error("unrecognised track url `{0}`")]
    UnrecognisedUrl(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("wav: {0}")]
    Wav(#[from] hound::Error),
    #[error("fft: {0}")]
    Fft(#[from] realfft::FftError),
}

impl XsrcError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for XsrcError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for XsrcError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
