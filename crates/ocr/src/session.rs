//! Engine lifecycle: fallback creation, configuration, recognition and
//! guaranteed termination

use std::fmt;
use std::time::Instant;

use crate::engine::{CancelFlag, EngineParams, LanguageSet, RecognitionEngine, RecognitionResult};
use crate::error::EngineError;
use crate::raster::RasterImage;

/// Ways of bringing up an engine handle, tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationStrategy {
    /// `create(languages)` with bundled language data in one call
    Bundled,
    /// `create(empty)`, then `load_languages`, then `initialize`
    Staged,
}

impl CreationStrategy {
    pub const DEFAULT_ORDER: [CreationStrategy; 2] = [CreationStrategy::Bundled, CreationStrategy::Staged];
}

impl fmt::Display for CreationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreationStrategy::Bundled => write!(f, "bundled"),
            CreationStrategy::Staged => write!(f, "staged"),
        }
    }
}

/// A live handle that is terminated exactly once, when released or dropped
pub struct EngineSession<'e, E: RecognitionEngine> {
    engine: &'e E,
    handle: Option<E::Handle>,
}

impl<'e, E: RecognitionEngine> EngineSession<'e, E> {
    /// Bring up a handle with one strategy. A handle created on the staged
    /// path is released again if loading or initialization fails.
    pub fn open(engine: &'e E, strategy: CreationStrategy, languages: &LanguageSet) -> Result<Self, EngineError> {
        match strategy {
            CreationStrategy::Bundled => {
                let handle = engine.create(languages)?;
                Ok(Self::adopt(engine, handle))
            }
            CreationStrategy::Staged => {
                let mut session = Self::adopt(engine, engine.create(&LanguageSet::empty())?);
                let handle = session.handle_mut()?;
                engine.load_languages(handle, languages)?;
                engine.initialize(handle, languages)?;
                Ok(session)
            }
        }
    }

    pub fn adopt(engine: &'e E, handle: E::Handle) -> Self {
        Self {
            engine,
            handle: Some(handle),
        }
    }

    pub fn handle_mut(&mut self) -> Result<&mut E::Handle, EngineError> {
        self.handle
            .as_mut()
            .ok_or_else(|| EngineError::Unknown("engine session already released".to_string()))
    }

    /// Terminate now instead of at end of scope
    pub fn release(mut self) {
        self.terminate();
    }

    fn terminate(&mut self) {
        if let Some(handle) = self.handle.take() {
            match self.engine.terminate(handle) {
                Ok(()) => log::debug!("[OCR] {} handle terminated", self.engine.name()),
                Err(e) => log::warn!("[OCR] {} handle termination failed: {}", self.engine.name(), e),
            }
        }
    }
}

impl<E: RecognitionEngine> Drop for EngineSession<'_, E> {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Runs one recognition per call on a fresh engine handle
pub struct RecognitionAdapter<E: RecognitionEngine> {
    engine: E,
    params: EngineParams,
    strategies: Vec<CreationStrategy>,
}

impl<E: RecognitionEngine> RecognitionAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            params: EngineParams::document_defaults(),
            strategies: CreationStrategy::DEFAULT_ORDER.to_vec(),
        }
    }

    pub fn with_params(mut self, params: EngineParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<CreationStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn recognize(&self, image: &RasterImage, languages: &LanguageSet) -> Result<RecognitionResult, EngineError> {
        self.recognize_cancellable(image, languages, &CancelFlag::new())
    }

    /// Recognize, checking `cancel` before acquisition, between acquisition,
    /// configuration and recognition, and once more before returning. The
    /// handle is released on every path.
    pub fn recognize_cancellable(
        &self,
        image: &RasterImage,
        languages: &LanguageSet,
        cancel: &CancelFlag,
    ) -> Result<RecognitionResult, EngineError> {
        let start = Instant::now();
        cancel.check()?;

        let mut session = self.acquire(languages)?;
        cancel.check()?;

        self.engine.configure(session.handle_mut()?, &self.params)?;
        cancel.check()?;

        let result = self.engine.recognize(session.handle_mut()?, image)?;
        cancel.check()?;
        session.release();

        let result = validate(result)?;
        log::info!(
            "[OCR] {} recognized {} chars in {} ms (confidence {:.2})",
            self.engine.name(),
            result.raw_text.len(),
            start.elapsed().as_millis(),
            result.engine_confidence
        );
        Ok(result)
    }

    /// Try each creation strategy in order; the first success wins.
    ///
    /// When every strategy fails the errors are aggregated. A connectivity
    /// failure on the last strategy keeps its kind, anything else becomes
    /// `InitializationFailed`.
    fn acquire(&self, languages: &LanguageSet) -> Result<EngineSession<'_, E>, EngineError> {
        let mut failures: Vec<String> = Vec::new();
        let mut last: Option<EngineError> = None;

        for strategy in &self.strategies {
            match EngineSession::open(&self.engine, *strategy, languages) {
                Ok(session) => {
                    if !failures.is_empty() {
                        log::info!("[OCR] engine created via {} path after: {}", strategy, failures.join("; "));
                    }
                    return Ok(session);
                }
                Err(e) => {
                    log::warn!("[OCR] {} creation failed: {}", strategy, e);
                    failures.push(format!("{}: {}", strategy, e));
                    last = Some(e);
                }
            }
        }

        let summary = if failures.is_empty() {
            "no creation strategy configured".to_string()
        } else {
            failures.join("; ")
        };
        Err(match last {
            Some(EngineError::NetworkUnavailable(_)) => EngineError::NetworkUnavailable(summary),
            Some(EngineError::LanguagePackUnavailable(_)) => EngineError::LanguagePackUnavailable(summary),
            _ => EngineError::InitializationFailed(summary),
        })
    }
}

fn validate(result: RecognitionResult) -> Result<RecognitionResult, EngineError> {
    if !result.engine_confidence.is_finite() {
        return Err(EngineError::RecognitionFailed(format!(
            "engine reported non-finite confidence {}",
            result.engine_confidence
        )));
    }
    Ok(RecognitionResult {
        engine_confidence: result.engine_confidence.clamp(0.0, 1.0),
        ..result
    })
}
