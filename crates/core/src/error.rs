//! Pipeline errors and the categories shown to users

use kimlik_ocr::{EngineError, QualityReport};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("image quality too low (score {:.2}: {})", .0.score, .0.issue_summary())]
    QualityRejected(QualityReport),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("pipeline is not idle (state: {0}); reset it first")]
    NotIdle(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// What the user is told, one message per category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Quality,
    Connectivity,
    Engine,
    Recognition,
}

impl ErrorCategory {
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::Quality => {
                "Image quality is too low. Retake the photo in better light and hold the document steady."
            }
            ErrorCategory::Connectivity => {
                "Language data could not be loaded. Check your internet connection and try again."
            }
            ErrorCategory::Engine => "The text recognition engine could not run. Try again or report the problem.",
            ErrorCategory::Recognition => "The document could not be read. Show it more clearly and try again.",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Quality => "quality",
            ErrorCategory::Connectivity => "connectivity",
            ErrorCategory::Engine => "engine",
            ErrorCategory::Recognition => "recognition",
        };
        f.write_str(name)
    }
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::QualityRejected(_) => ErrorCategory::Quality,
            PipelineError::Engine(e) => engine_category(e),
            PipelineError::NotIdle(_) | PipelineError::InvalidConfig(_) => ErrorCategory::Engine,
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.category().user_message()
    }

    /// Whether re-capturing or simply trying again can help
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::QualityRejected(_) => true,
            PipelineError::Engine(EngineError::Unknown(_)) => false,
            PipelineError::Engine(_) => true,
            PipelineError::NotIdle(_) | PipelineError::InvalidConfig(_) => false,
        }
    }
}

pub fn engine_category(err: &EngineError) -> ErrorCategory {
    match err {
        EngineError::NetworkUnavailable(_) | EngineError::LanguagePackUnavailable(_) => ErrorCategory::Connectivity,
        EngineError::RecognitionFailed(_) => ErrorCategory::Recognition,
        EngineError::InitializationFailed(_) | EngineError::Unknown(_) | EngineError::Cancelled => {
            ErrorCategory::Engine
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            PipelineError::QualityRejected(QualityReport::decode_failed()).category(),
            ErrorCategory::Quality
        );
        assert_eq!(
            PipelineError::from(EngineError::NetworkUnavailable("x".into())).category(),
            ErrorCategory::Connectivity
        );
        assert_eq!(
            PipelineError::from(EngineError::LanguagePackUnavailable("x".into())).category(),
            ErrorCategory::Connectivity
        );
        assert_eq!(
            PipelineError::from(EngineError::RecognitionFailed("x".into())).category(),
            ErrorCategory::Recognition
        );
        assert_eq!(PipelineError::from(EngineError::Cancelled).category(), ErrorCategory::Engine);
        assert_eq!(PipelineError::NotIdle("done".into()).category(), ErrorCategory::Engine);
    }

    #[test]
    fn test_retryable() {
        assert!(PipelineError::QualityRejected(QualityReport::decode_failed()).is_retryable());
        assert!(PipelineError::from(EngineError::InitializationFailed("x".into())).is_retryable());
        assert!(!PipelineError::from(EngineError::Unknown("x".into())).is_retryable());
        assert!(!PipelineError::NotIdle("done".into()).is_retryable());
    }

    #[test]
    fn test_display_mentions_issues() {
        let msg = PipelineError::QualityRejected(QualityReport::decode_failed()).to_string();
        assert!(msg.contains("decode failed"), "{}", msg);
        assert_eq!(
            PipelineError::from(EngineError::Cancelled).to_string(),
            EngineError::Cancelled.to_string()
        );
    }
}
