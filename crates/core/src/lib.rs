//! Identity document extraction pipeline
//!
//! Ties the quality gate and recognition engine from `kimlik-ocr` to the field
//! rules in `kimlik-rules`, and turns the result into a scored [`Extraction`].

pub mod config;
pub mod error;
pub mod outcome;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{ErrorCategory, PipelineError, Result};
pub use outcome::{ConfidenceTier, Extraction, ExtractionOutcome, HIGH_CONFIDENCE, MEDIUM_CONFIDENCE};
pub use pipeline::{ExtractionPipeline, PipelineState, RunStatus};

pub use kimlik_ocr::{QualityGate, QualityReport, RasterImage};
pub use kimlik_rules::{DocumentIdentifier, DocumentType, ExtractedFields};
