//! Scripted engine for tests
//!
//! Deterministic `RecognitionEngine` with per-step failure / panic injection
//! and call counters, so lifecycle guarantees can be checked without a real
//! engine installed.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::engine::{CancelFlag, EngineParams, LanguageSet, RecognitionEngine, RecognitionResult};
use crate::error::EngineError;
use crate::raster::RasterImage;

/// Engine operation a fault can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// `create` with a non-empty language set
    CreateBundled,
    /// `create` with an empty language set
    CreateBare,
    LoadLanguages,
    Initialize,
    Configure,
    Recognize,
    Terminate,
}

#[derive(Debug, Clone)]
pub enum Fault {
    Fail(EngineError),
    Panic,
    /// Trip the flag, then carry on normally
    Cancel(CancelFlag),
}

#[derive(Debug)]
pub struct ScriptedHandle {
    pub id: u32,
    pub languages: LanguageSet,
    pub configured: Option<EngineParams>,
}

#[derive(Debug, Default)]
pub struct ScriptedEngine {
    text: String,
    confidence: f32,
    faults: HashMap<Step, Fault>,
    next_id: Cell<u32>,
    created: Cell<usize>,
    recognized: Cell<usize>,
    terminated: RefCell<Vec<u32>>,
    calls: RefCell<Vec<Step>>,
}

impl ScriptedEngine {
    /// Engine that always reads `text` with `confidence`
    pub fn reading(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            ..Default::default()
        }
    }

    pub fn with_fault(mut self, step: Step, fault: Fault) -> Self {
        self.faults.insert(step, fault);
        self
    }

    pub fn failing(self, step: Step, err: EngineError) -> Self {
        self.with_fault(step, Fault::Fail(err))
    }

    pub fn panicking(self, step: Step) -> Self {
        self.with_fault(step, Fault::Panic)
    }

    /// Handles created so far
    pub fn created(&self) -> usize {
        self.created.get()
    }

    /// Termination calls so far, including failed ones
    pub fn terminated(&self) -> usize {
        self.terminated.borrow().len()
    }

    pub fn recognized(&self) -> usize {
        self.recognized.get()
    }

    /// Every created handle was terminated exactly once
    pub fn all_released(&self) -> bool {
        let terminated = self.terminated.borrow();
        let mut ids = terminated.clone();
        ids.sort_unstable();
        ids.dedup();
        ids.len() == terminated.len() && terminated.len() == self.created.get()
    }

    /// Operations in call order
    pub fn calls(&self) -> Vec<Step> {
        self.calls.borrow().clone()
    }

    fn enter(&self, step: Step) -> Result<(), EngineError> {
        self.calls.borrow_mut().push(step);
        match self.faults.get(&step) {
            None => Ok(()),
            Some(Fault::Fail(err)) => Err(err.clone()),
            Some(Fault::Panic) => panic!("scripted panic in {:?}", step),
            Some(Fault::Cancel(flag)) => {
                flag.cancel();
                Ok(())
            }
        }
    }
}

impl RecognitionEngine for ScriptedEngine {
    type Handle = ScriptedHandle;

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn create(&self, languages: &LanguageSet) -> Result<ScriptedHandle, EngineError> {
        let step = if languages.is_empty() {
            Step::CreateBare
        } else {
            Step::CreateBundled
        };
        self.enter(step)?;
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.created.set(self.created.get() + 1);
        Ok(ScriptedHandle {
            id,
            languages: languages.clone(),
            configured: None,
        })
    }

    fn load_languages(&self, _handle: &mut ScriptedHandle, _languages: &LanguageSet) -> Result<(), EngineError> {
        self.enter(Step::LoadLanguages)
    }

    fn initialize(&self, handle: &mut ScriptedHandle, languages: &LanguageSet) -> Result<(), EngineError> {
        self.enter(Step::Initialize)?;
        handle.languages = languages.clone();
        Ok(())
    }

    fn configure(&self, handle: &mut ScriptedHandle, params: &EngineParams) -> Result<(), EngineError> {
        self.enter(Step::Configure)?;
        handle.configured = Some(params.clone());
        Ok(())
    }

    fn recognize(&self, handle: &mut ScriptedHandle, _image: &RasterImage) -> Result<RecognitionResult, EngineError> {
        self.enter(Step::Recognize)?;
        if handle.languages.is_empty() {
            return Err(EngineError::InitializationFailed("no languages initialized".to_string()));
        }
        self.recognized.set(self.recognized.get() + 1);
        Ok(RecognitionResult {
            raw_text: self.text.clone(),
            engine_confidence: self.confidence,
        })
    }

    fn terminate(&self, handle: ScriptedHandle) -> Result<(), EngineError> {
        self.terminated.borrow_mut().push(handle.id);
        self.enter(Step::Terminate)
    }
}
