//! Capture-to-fields pipeline
//!
//! `Idle -> QualityChecking -> (Rejected | Recognizing) -> Parsing -> Scored -> Done`
//!
//! One run owns one engine handle, created after the quality gate and released
//! before the run returns. Terminal states need an explicit [`ExtractionPipeline::reset`].

use std::fmt;
use std::time::Instant;

use kimlik_ocr::{
    CancelFlag, ImageQualityAnalyzer, QualityVerdict, RasterImage, RecognitionAdapter, RecognitionEngine,
};
use kimlik_rules::{DocumentFieldParser, DocumentType};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::{engine_category, ErrorCategory, PipelineError, Result};
use crate::outcome::{ConfidenceTier, Extraction, ExtractionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "category", rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed(ErrorCategory),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    QualityChecking,
    Rejected,
    Recognizing { quality_warning: bool },
    Parsing,
    Scored(ConfidenceTier),
    Done(RunStatus),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Rejected | PipelineState::Done(_))
    }

    pub fn can_transition_to(&self, next: &PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Idle, QualityChecking) => true,
            (QualityChecking, Rejected) | (QualityChecking, Recognizing { .. }) => true,
            (Recognizing { .. }, Parsing) => true,
            (Recognizing { .. }, Done(RunStatus::Failed(_))) => true,
            (Parsing, Scored(_)) => true,
            (Scored(_), Done(RunStatus::Succeeded)) => true,
            (Rejected, Idle) | (Done(_), Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::QualityChecking => write!(f, "quality checking"),
            PipelineState::Rejected => write!(f, "rejected"),
            PipelineState::Recognizing { quality_warning } => {
                write!(f, "recognizing (quality warning: {})", quality_warning)
            }
            PipelineState::Parsing => write!(f, "parsing"),
            PipelineState::Scored(tier) => write!(f, "scored ({})", tier),
            PipelineState::Done(RunStatus::Succeeded) => write!(f, "done"),
            PipelineState::Done(RunStatus::Failed(category)) => write!(f, "failed ({})", category),
        }
    }
}

pub struct ExtractionPipeline<E: RecognitionEngine> {
    adapter: RecognitionAdapter<E>,
    config: PipelineConfig,
    state: PipelineState,
    cancel: CancelFlag,
}

impl<E: RecognitionEngine> ExtractionPipeline<E> {
    pub fn new(engine: E, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let adapter = RecognitionAdapter::new(engine).with_params(config.engine_params.clone());
        Ok(Self {
            adapter,
            config,
            state: PipelineState::Idle,
            cancel: CancelFlag::new(),
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        self.adapter.engine()
    }

    /// Share an existing flag, e.g. one owned by a UI
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag another thread can set to abandon the current run
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Back to `Idle` after a run; clears any pending cancellation
    pub fn reset(&mut self) {
        if !self.state.is_terminal() && self.state != PipelineState::Idle {
            log::warn!("[Pipeline] reset from non-terminal state {}", self.state);
        }
        log::debug!("[Pipeline] {} -> {}", self.state, PipelineState::Idle);
        self.state = PipelineState::Idle;
        self.cancel.clear();
    }

    /// Decode an encoded image and run it. Undecodable bytes are scored as
    /// "decode failed" and rejected by the quality gate.
    pub fn extract_encoded(&mut self, bytes: &[u8], document_type: DocumentType) -> Result<Extraction> {
        self.ensure_idle()?;
        let image = match RasterImage::decode(bytes) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("[Pipeline] image decode failed: {}", e);
                RasterImage::from_rgba(0, 0, Vec::new())
            }
        };
        self.run(&image, document_type)
    }

    /// Quality gate, recognition, parsing and scoring for one image
    pub fn run(&mut self, image: &RasterImage, document_type: DocumentType) -> Result<Extraction> {
        self.ensure_idle()?;
        let start = Instant::now();

        self.transition(PipelineState::QualityChecking);
        let quality = ImageQualityAnalyzer::analyze(image);
        let quality_warning = match self.config.quality.verdict(&quality) {
            QualityVerdict::Reject => {
                log::info!(
                    "[Pipeline] rejected: score {:.2} [{}]",
                    quality.score,
                    quality.issue_summary()
                );
                self.transition(PipelineState::Rejected);
                return Err(PipelineError::QualityRejected(quality));
            }
            QualityVerdict::Warn => true,
            QualityVerdict::Pass => false,
        };

        self.transition(PipelineState::Recognizing { quality_warning });
        let recognized =
            match self
                .adapter
                .recognize_cancellable(image, &self.config.languages, &self.cancel)
            {
                Ok(result) => result,
                Err(e) => {
                    log::warn!("[Pipeline] recognition failed: {}", e);
                    self.transition(PipelineState::Done(RunStatus::Failed(engine_category(&e))));
                    return Err(PipelineError::Engine(e));
                }
            };

        self.transition(PipelineState::Parsing);
        let fields = DocumentFieldParser::parse(&recognized.raw_text, document_type);

        let tier = ConfidenceTier::from_confidence(recognized.engine_confidence);
        self.transition(PipelineState::Scored(tier));

        let has_data = fields.has_data();
        let extraction = Extraction {
            outcome: ExtractionOutcome {
                fields,
                confidence: recognized.engine_confidence,
                raw_text: recognized.raw_text,
                document_type,
            },
            confidence_tier: tier,
            has_data,
            quality,
            quality_warning,
        };
        self.transition(PipelineState::Done(RunStatus::Succeeded));

        log::info!(
            "[Pipeline] {} done in {} ms: confidence {:.2} ({}), has_data={}, quality {:.2}{}",
            document_type,
            start.elapsed().as_millis(),
            extraction.outcome.confidence,
            tier,
            has_data,
            extraction.quality.score,
            if quality_warning { " (warning)" } else { "" }
        );
        Ok(extraction)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.state == PipelineState::Idle {
            Ok(())
        } else {
            Err(PipelineError::NotIdle(self.state.to_string()))
        }
    }

    fn transition(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        log::debug!("[Pipeline] {} -> {}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use kimlik_ocr::mock::{Fault, ScriptedEngine, Step};
    use kimlik_ocr::{EngineError, QualityGate, QualityIssue};
    use kimlik_rules::DocumentIdentifier;

    use super::*;

    /// Alternating columns of two grey levels
    fn striped(width: u32, height: u32, a: u8, b: u8) -> RasterImage {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..height {
            for x in 0..width {
                let v = if x % 2 == 0 { a } else { b };
                pixels.extend_from_slice(&[v, v, v, 255]);
            }
        }
        RasterImage::from_rgba(width, height, pixels)
    }

    /// Scores 1.0
    fn good_image() -> RasterImage {
        striped(1000, 700, 100, 160)
    }

    /// Scores 0.8 (low resolution only)
    fn small_image() -> RasterImage {
        striped(640, 480, 100, 160)
    }

    fn pipeline(engine: &ScriptedEngine) -> ExtractionPipeline<&ScriptedEngine> {
        ExtractionPipeline::new(engine, PipelineConfig::default()).unwrap()
    }

    #[test]
    fn test_scenario_successful_national_id() {
        let engine = ScriptedEngine::reading("AHMET YILMAZ\n12345678901\n15.03.1990", 0.82);
        let mut pipeline = pipeline(&engine);

        let extraction = pipeline.run(&small_image(), DocumentType::NationalId).unwrap();

        assert!((extraction.quality.score - 0.8).abs() < 1e-6);
        assert!(!extraction.quality_warning);
        let fields = &extraction.outcome.fields;
        assert_eq!(fields.name, "AHMET");
        assert_eq!(fields.surname, "YILMAZ");
        assert_eq!(fields.identifier, DocumentIdentifier::IdNumber("12345678901".into()));
        assert_eq!(fields.birth_date, "15.03.1990");
        assert!(extraction.has_data);
        assert_eq!(extraction.confidence_tier, ConfidenceTier::High);
        assert_eq!(pipeline.state(), PipelineState::Done(RunStatus::Succeeded));
        assert_eq!(engine.created(), 1);
        assert_eq!(engine.terminated(), 1);
    }

    #[test]
    fn test_scenario_rejected_never_touches_engine() {
        let engine = ScriptedEngine::reading("AHMET YILMAZ", 0.9);
        let config = PipelineConfig {
            quality: QualityGate {
                reject_below: 0.5,
                warn_below: 0.6,
            },
            ..Default::default()
        };
        let mut pipeline = ExtractionPipeline::new(&engine, config).unwrap();

        // too bright + low contrast + low resolution: 0.4
        let err = pipeline
            .run(&RasterImage::filled(640, 480, [250, 250, 250, 255]), DocumentType::NationalId)
            .unwrap_err();

        match err {
            PipelineError::QualityRejected(report) => {
                assert!((report.score - 0.4).abs() < 1e-6);
                assert!(report.has_issue(QualityIssue::TooBright));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(pipeline.state(), PipelineState::Rejected);
        assert_eq!(engine.created(), 0);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_scenario_nothing_recognizable() {
        let engine = ScriptedEngine::reading("~~ ## 42", 0.15);
        let mut pipeline = pipeline(&engine);

        let extraction = pipeline.run(&good_image(), DocumentType::NationalId).unwrap();

        assert!(!extraction.has_data);
        assert_eq!(extraction.outcome.fields.name, "");
        assert_eq!(extraction.outcome.fields.identifier.value(), "");
        assert_eq!(extraction.confidence_tier, ConfidenceTier::Low);
        assert_eq!(pipeline.state(), PipelineState::Done(RunStatus::Succeeded));
    }

    #[test]
    fn test_warning_band_proceeds_with_flag() {
        let engine = ScriptedEngine::reading("", 0.5);
        let mut pipeline = pipeline(&engine);

        // too dark + low contrast + low resolution: exactly 0.3
        let image = RasterImage::filled(640, 480, [10, 10, 10, 255]);
        let extraction = pipeline.run(&image, DocumentType::Passport).unwrap();

        assert!((extraction.quality.score - 0.3).abs() < 1e-6);
        assert!(extraction.quality_warning);
        assert_eq!(extraction.confidence_tier, ConfidenceTier::Medium);
        assert_eq!(engine.terminated(), 1);
    }

    #[test]
    fn test_undecodable_bytes_are_rejected() {
        let engine = ScriptedEngine::reading("AHMET YILMAZ", 0.9);
        let mut pipeline = pipeline(&engine);

        let err = pipeline
            .extract_encoded(b"definitely not an image", DocumentType::NationalId)
            .unwrap_err();

        assert_eq!(err, PipelineError::QualityRejected(kimlik_ocr::QualityReport::decode_failed()));
        assert_eq!(engine.created(), 0);
    }

    #[test]
    fn test_extract_encoded_png() {
        let image = good_image().to_rgba_image().unwrap();
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let engine = ScriptedEngine::reading("PASAPORT U12345678", 0.7);
        let mut pipeline = pipeline(&engine);
        let extraction = pipeline.extract_encoded(&png, DocumentType::Passport).unwrap();

        assert_eq!(
            extraction.outcome.fields.identifier,
            DocumentIdentifier::DocumentNumber("U12345678".into())
        );
        assert_eq!(extraction.quality.score, 1.0);
    }

    #[test]
    fn test_engine_failure_terminates_and_fails() {
        let engine = ScriptedEngine::reading("X", 0.5).failing(Step::Recognize, EngineError::RecognitionFailed("blur".into()));
        let mut pipeline = pipeline(&engine);

        let err = pipeline.run(&good_image(), DocumentType::NationalId).unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Recognition);
        assert_eq!(
            pipeline.state(),
            PipelineState::Done(RunStatus::Failed(ErrorCategory::Recognition))
        );
        assert_eq!(engine.terminated(), 1);
    }

    #[test]
    fn test_fallback_path_terminates_once() {
        let engine = ScriptedEngine::reading("AHMET YILMAZ", 0.9)
            .failing(Step::CreateBundled, EngineError::LanguagePackUnavailable("tur".into()));
        let mut pipeline = pipeline(&engine);

        assert!(pipeline.run(&good_image(), DocumentType::NationalId).is_ok());
        assert_eq!(engine.created(), 1);
        assert_eq!(engine.terminated(), 1);
    }

    #[test]
    fn test_configuration_failure_terminates() {
        let engine = ScriptedEngine::reading("X", 0.5).failing(Step::Configure, EngineError::Unknown("bad param".into()));
        let mut pipeline = pipeline(&engine);

        let err = pipeline.run(&good_image(), DocumentType::NationalId).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Engine);
        assert!(!err.is_retryable());
        assert_eq!(engine.terminated(), 1);
    }

    #[test]
    fn test_panic_in_configure_terminates() {
        let engine = ScriptedEngine::reading("X", 0.5).panicking(Step::Configure);
        let mut pipeline = pipeline(&engine);

        let outcome = catch_unwind(AssertUnwindSafe(|| pipeline.run(&good_image(), DocumentType::NationalId)));
        assert!(outcome.is_err());
        assert_eq!(engine.created(), 1);
        assert_eq!(engine.terminated(), 1);

        pipeline.reset();
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[test]
    fn test_cancellation() {
        let engine = ScriptedEngine::reading("AHMET YILMAZ", 0.9);
        let mut pipeline = pipeline(&engine);
        let cancel = pipeline.cancel_flag();
        cancel.cancel();

        let err = pipeline.run(&good_image(), DocumentType::NationalId).unwrap_err();
        assert_eq!(err, PipelineError::Engine(EngineError::Cancelled));
        assert_eq!(pipeline.state(), PipelineState::Done(RunStatus::Failed(ErrorCategory::Engine)));
        assert_eq!(engine.created(), 0);

        pipeline.reset();
        assert!(!cancel.is_cancelled());
        assert!(pipeline.run(&good_image(), DocumentType::NationalId).is_ok());
    }

    #[test]
    fn test_cancellation_mid_run_terminates_handle() {
        let cancel = CancelFlag::new();
        let engine = ScriptedEngine::reading("AHMET YILMAZ", 0.9).with_fault(Step::Configure, Fault::Cancel(cancel.clone()));
        let mut pipeline = ExtractionPipeline::new(&engine, PipelineConfig::default())
            .unwrap()
            .with_cancel_flag(cancel);

        let err = pipeline.run(&good_image(), DocumentType::NationalId).unwrap_err();

        assert_eq!(err, PipelineError::Engine(EngineError::Cancelled));
        assert_eq!(engine.recognized(), 0);
        assert_eq!(engine.created(), 1);
        assert!(engine.all_released());
    }

    #[test]
    fn test_run_requires_reset() {
        let engine = ScriptedEngine::reading("AHMET YILMAZ", 0.9);
        let mut pipeline = pipeline(&engine);

        assert!(pipeline.run(&good_image(), DocumentType::NationalId).is_ok());
        let err = pipeline.run(&good_image(), DocumentType::NationalId).unwrap_err();
        assert!(matches!(err, PipelineError::NotIdle(_)));
        assert_eq!(engine.created(), 1);

        pipeline.reset();
        assert!(pipeline.run(&good_image(), DocumentType::NationalId).is_ok());
        assert_eq!(engine.created(), 2);
        assert_eq!(engine.terminated(), 2);
    }

    #[test]
    fn test_invalid_config_is_refused() {
        let engine = ScriptedEngine::reading("", 0.0);
        let config = PipelineConfig {
            quality: QualityGate {
                reject_below: 0.8,
                warn_below: 0.6,
            },
            ..Default::default()
        };
        assert!(matches!(
            ExtractionPipeline::new(&engine, config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_transition_table() {
        use PipelineState::*;
        assert!(Idle.can_transition_to(&QualityChecking));
        assert!(!Idle.can_transition_to(&Recognizing { quality_warning: false }));
        assert!(!Rejected.can_transition_to(&QualityChecking));
        assert!(Recognizing { quality_warning: true }.can_transition_to(&Done(RunStatus::Failed(ErrorCategory::Engine))));
        assert!(!Parsing.can_transition_to(&Done(RunStatus::Failed(ErrorCategory::Engine))));
        assert!(Done(RunStatus::Succeeded).can_transition_to(&Idle));
    }
}
