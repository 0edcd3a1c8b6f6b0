//! Document image quality scoring and recognition engine lifecycle
//!
//! - [`quality`]: brightness / contrast / resolution gate run before any engine work
//! - [`RecognitionAdapter`]: fallback creation, configuration, recognition and
//!   guaranteed termination of an engine handle
//! - [`tesseract`]: the Tesseract CLI engine, with language packs from [`install`]

mod engine;
mod error;
pub mod install;
pub mod mock;
pub mod quality;
mod raster;
mod session;
pub mod tesseract;

pub use engine::{
    CancelFlag, EngineMode, EngineParams, LanguageSet, PageSegMode, RecognitionEngine, RecognitionResult,
    DEFAULT_LANGUAGES, DOCUMENT_CHAR_WHITELIST,
};
pub use error::EngineError;
pub use quality::{ImageQualityAnalyzer, QualityGate, QualityIssue, QualityReport, QualityVerdict};
pub use raster::RasterImage;
pub use session::{CreationStrategy, EngineSession, RecognitionAdapter};
pub use tesseract::{TesseractConfig, TesseractEngine};
