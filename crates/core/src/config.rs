//! Pipeline settings

use kimlik_ocr::{EngineParams, LanguageSet, QualityGate};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    pub quality: QualityGate,
    pub languages: LanguageSet,
    pub engine_params: EngineParams,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        let QualityGate {
            reject_below,
            warn_below,
        } = self.quality;
        if !(0.0..=1.0).contains(&reject_below) || !(0.0..=1.0).contains(&warn_below) {
            return Err(PipelineError::InvalidConfig("quality thresholds must be within 0.0 - 1.0"));
        }
        if reject_below > warn_below {
            return Err(PipelineError::InvalidConfig("reject threshold is above warn threshold"));
        }
        if self.languages.is_empty() {
            return Err(PipelineError::InvalidConfig("at least one recognition language is required"));
        }
        Ok(())
    }
}
