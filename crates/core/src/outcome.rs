//! Extraction results and confidence tiers

use kimlik_ocr::QualityReport;
use kimlik_rules::{DocumentType, ExtractedFields};
use serde::{Deserialize, Serialize};

/// Engine confidence below this is low
pub const MEDIUM_CONFIDENCE: f32 = 0.30;
/// Engine confidence at or above this is high
pub const HIGH_CONFIDENCE: f32 = 0.60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence < MEDIUM_CONFIDENCE {
            ConfidenceTier::Low
        } else if confidence < HIGH_CONFIDENCE {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::High
        }
    }

    /// Feedback line for the user, e.g. "Medium confidence (45%). Review the results."
    pub fn feedback(&self, confidence: f32) -> String {
        let percent = (confidence * 100.0).round() as u32;
        match self {
            ConfidenceTier::Low => format!("Low confidence ({}%). Check the results.", percent),
            ConfidenceTier::Medium => format!("Medium confidence ({}%). Review the results.", percent),
            ConfidenceTier::High => format!("High confidence ({}%). Document scanned successfully.", percent),
        }
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceTier::Low => write!(f, "low"),
            ConfidenceTier::Medium => write!(f, "medium"),
            ConfidenceTier::High => write!(f, "high"),
        }
    }
}

/// What one successful run read off the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutcome {
    pub fields: ExtractedFields,
    /// Engine confidence, 0.0 - 1.0
    pub confidence: f32,
    pub raw_text: String,
    pub document_type: DocumentType,
}

/// Result of a successful pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub outcome: ExtractionOutcome,
    pub confidence_tier: ConfidenceTier,
    pub has_data: bool,
    pub quality: QualityReport,
    /// The image passed the gate but scored below the warning threshold
    pub quality_warning: bool,
}

impl Extraction {
    pub fn feedback(&self) -> String {
        self.confidence_tier.feedback(self.outcome.confidence)
    }
}
