//! Recognition engine error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine initialization failed: {0}")]
    InitializationFailed(String),

    #[error("language pack unavailable: {0}")]
    LanguagePackUnavailable(String),

    #[error("text recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("recognition cancelled")]
    Cancelled,

    #[error("unexpected engine fault: {0}")]
    Unknown(String),
}

impl EngineError {
    /// Classify a free-form engine diagnostic (stderr, library message).
    ///
    /// Language-data problems and connectivity problems get their own kinds so
    /// the caller can tell "check your connection" apart from "retake the photo".
    pub fn from_engine_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("network") || lower.contains("fetch") || lower.contains("connection") {
            EngineError::NetworkUnavailable(message.trim().to_string())
        } else if lower.contains("language")
            || lower.contains("traineddata")
            || lower.contains("tessdata")
            || lower.contains("loading")
        {
            EngineError::LanguagePackUnavailable(message.trim().to_string())
        } else if lower.contains("recogni") {
            EngineError::RecognitionFailed(message.trim().to_string())
        } else {
            EngineError::Unknown(message.trim().to_string())
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Unknown(format!("io error: {}", err))
    }
}
