//! Image quality scoring
//!
//! Cheap brightness / contrast / resolution checks that run before the
//! recognition engine is touched.

use serde::{Deserialize, Serialize};

use crate::raster::{RasterImage, CHANNELS};

/// Mean luminance below this is too dark
pub const MIN_BRIGHTNESS: f64 = 50.0;
/// Mean luminance above this is too bright
pub const MAX_BRIGHTNESS: f64 = 200.0;
/// Luminance standard deviation below this is low contrast
pub const MIN_CONTRAST: f64 = 20.0;
/// Resolution floor
pub const MIN_WIDTH: u32 = 800;
pub const MIN_HEIGHT: u32 = 600;

/// Gate thresholds
pub const DEFAULT_REJECT_BELOW: f32 = 0.3;
pub const DEFAULT_WARN_BELOW: f32 = 0.6;

/// Diagnostic tag attached to a quality report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityIssue {
    #[serde(rename = "too dark")]
    TooDark,
    #[serde(rename = "too bright")]
    TooBright,
    #[serde(rename = "low contrast")]
    LowContrast,
    #[serde(rename = "low resolution")]
    LowResolution,
    #[serde(rename = "decode failed")]
    DecodeFailed,
}

impl QualityIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityIssue::TooDark => "too dark",
            QualityIssue::TooBright => "too bright",
            QualityIssue::LowContrast => "low contrast",
            QualityIssue::LowResolution => "low resolution",
            QualityIssue::DecodeFailed => "decode failed",
        }
    }

    /// Score deduction in hundredths
    fn penalty(&self) -> u32 {
        match self {
            QualityIssue::TooDark => 30,
            QualityIssue::TooBright => 20,
            QualityIssue::LowContrast => 20,
            QualityIssue::LowResolution => 20,
            QualityIssue::DecodeFailed => 100,
        }
    }
}

impl std::fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one quality analysis. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    /// 0.0 - 1.0
    pub score: f32,
    /// In detection order; every issue is reported, not just the first
    pub issues: Vec<QualityIssue>,
    /// Mean luminance (0 - 255)
    pub brightness: f64,
    /// Luminance standard deviation
    pub contrast: f64,
}

impl QualityReport {
    pub fn decode_failed() -> Self {
        Self {
            score: 0.0,
            issues: vec![QualityIssue::DecodeFailed],
            brightness: 0.0,
            contrast: 0.0,
        }
    }

    pub fn has_issue(&self, issue: QualityIssue) -> bool {
        self.issues.contains(&issue)
    }

    /// Issue tags joined for display, e.g. "too dark, low resolution"
    pub fn issue_summary(&self) -> String {
        self.issues
            .iter()
            .map(|i| i.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// What the pipeline should do with an image of a given score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityVerdict {
    /// Do not run recognition
    Reject,
    /// Proceed, but tell the caller results may suffer
    Warn,
    Pass,
}

/// Score thresholds for the quality gate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QualityGate {
    pub reject_below: f32,
    pub warn_below: f32,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            reject_below: DEFAULT_REJECT_BELOW,
            warn_below: DEFAULT_WARN_BELOW,
        }
    }
}

impl QualityGate {
    pub fn verdict(&self, report: &QualityReport) -> QualityVerdict {
        if report.score < self.reject_below {
            QualityVerdict::Reject
        } else if report.score < self.warn_below {
            QualityVerdict::Warn
        } else {
            QualityVerdict::Pass
        }
    }
}

/// Brightness, contrast and resolution analyzer
pub struct ImageQualityAnalyzer;

impl ImageQualityAnalyzer {
    /// Score an image. Pure; never fails.
    pub fn analyze(image: &RasterImage) -> QualityReport {
        if !image.is_well_formed() {
            log::warn!(
                "[Quality] buffer does not match {}x{} RGBA, treating as undecodable",
                image.width(),
                image.height()
            );
            return QualityReport::decode_failed();
        }

        let (brightness, contrast) = luminance_stats(image.pixels());

        let mut issues = Vec::new();
        if brightness < MIN_BRIGHTNESS {
            issues.push(QualityIssue::TooDark);
        } else if brightness > MAX_BRIGHTNESS {
            issues.push(QualityIssue::TooBright);
        }
        if contrast < MIN_CONTRAST {
            issues.push(QualityIssue::LowContrast);
        }
        if image.width() < MIN_WIDTH || image.height() < MIN_HEIGHT {
            issues.push(QualityIssue::LowResolution);
        }

        let penalty: u32 = issues.iter().map(|i| i.penalty()).sum();
        let score = 100u32.saturating_sub(penalty) as f32 / 100.0;

        log::info!(
            "[Quality] {}x{} brightness={:.1} contrast={:.1} score={:.2} issues=[{}]",
            image.width(),
            image.height(),
            brightness,
            contrast,
            score,
            issues.iter().map(|i| i.as_str()).collect::<Vec<_>>().join(", ")
        );

        QualityReport {
            score,
            issues,
            brightness,
            contrast,
        }
    }

    /// Decode then score. Undecodable input yields the "decode failed" report.
    pub fn analyze_encoded(bytes: &[u8]) -> QualityReport {
        match RasterImage::decode(bytes) {
            Ok(image) => Self::analyze(&image),
            Err(e) => {
                log::warn!("[Quality] decode failed: {}", e);
                QualityReport::decode_failed()
            }
        }
    }
}

/// Mean luminance and its standard deviation; luminance = (r + g + b) / 3
fn luminance_stats(pixels: &[u8]) -> (f64, f64) {
    let count = pixels.len() / CHANNELS;
    if count == 0 {
        return (0.0, 0.0);
    }

    let luminance = |px: &[u8]| (px[0] as f64 + px[1] as f64 + px[2] as f64) / 3.0;

    let sum: f64 = pixels.chunks_exact(CHANNELS).map(luminance).sum();
    let mean = sum / count as f64;

    let variance: f64 = pixels
        .chunks_exact(CHANNELS)
        .map(|px| {
            let d = luminance(px) - mean;
            d * d
        })
        .sum::<f64>()
        / count as f64;

    (mean, variance.sqrt())
}
