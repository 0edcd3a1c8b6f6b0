//! Command-line front end: upload checks, config file, one pipeline run

pub mod acquisition;
pub mod config;

use std::path::PathBuf;

use clap::Parser;
use kimlik_core::{ErrorCategory, Extraction, ExtractionPipeline, PipelineError};
use kimlik_ocr::{LanguageSet, TesseractEngine};
use kimlik_rules::DocumentType;

use acquisition::AcquisitionError;
use config::{AppConfig, ConfigError};

#[derive(Parser, Debug)]
#[command(name = "kimlik-scan")]
#[command(about = "Read the personal fields off a Turkish ID card or passport photo")]
pub struct Args {
    /// Photo or scan of the document
    pub image: PathBuf,

    /// id or passport
    #[arg(short = 't', long, default_value = "id")]
    pub document_type: DocumentType,

    /// Config file; defaults to <config dir>/kimlik-scan/config.json
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Recognition languages, e.g. tur+eng
    #[arg(short, long)]
    pub languages: Option<LanguageSet>,

    /// Bundled tessdata directory
    #[arg(long)]
    pub tessdata: Option<PathBuf>,

    /// Write the effective settings back to the config file
    #[arg(long)]
    pub save_config: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("upload rejected: {0}")]
    Acquisition(#[from] AcquisitionError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ScanError {
    /// 2 quality, 3 connectivity, 4 engine, 5 recognition, 1 anything else
    pub fn exit_code(&self) -> u8 {
        match self {
            ScanError::Pipeline(e) => match e.category() {
                ErrorCategory::Quality => 2,
                ErrorCategory::Connectivity => 3,
                ErrorCategory::Engine => 4,
                ErrorCategory::Recognition => 5,
            },
            ScanError::Config(_) | ScanError::Acquisition(_) => 1,
        }
    }

    /// What to tell the user
    pub fn user_message(&self) -> String {
        match self {
            ScanError::Pipeline(e) => e.user_message().to_string(),
            other => other.to_string(),
        }
    }
}

/// Config file plus command-line overrides
pub fn effective_config(args: &Args) -> Result<AppConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    if let Some(languages) = &args.languages {
        config.languages = languages.clone();
    }
    if let Some(tessdata) = &args.tessdata {
        config.tesseract.tessdata_path = Some(tessdata.to_string_lossy().into_owned());
    }
    Ok(config)
}

pub fn scan(args: &Args) -> Result<Extraction, ScanError> {
    let config = effective_config(args)?;
    if args.save_config {
        match &args.config {
            Some(path) => config::save_config_to(path, &config)?,
            None => config::save_config(&config)?,
        }
    }

    let bytes = acquisition::read_upload(&args.image)?;
    log::info!(
        "[Scan] {} ({} bytes) as {}, languages {}",
        args.image.display(),
        bytes.len(),
        args.document_type,
        config.languages
    );

    let engine = TesseractEngine::new(config.tesseract_config());
    let mut pipeline = ExtractionPipeline::new(engine, config.pipeline_config())?;
    let extraction = pipeline.extract_encoded(&bytes, args.document_type)?;

    if extraction.quality_warning {
        log::warn!(
            "[Scan] low image quality ({:.2}: {}), results may be incomplete",
            extraction.quality.score,
            extraction.quality.issue_summary()
        );
    }
    log::info!("[Scan] {}", extraction.feedback());
    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use kimlik_ocr::{EngineError, QualityReport};

    use super::*;

    fn args(list: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("kimlik-scan").chain(list.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_defaults() {
        let args = args(&["card.jpg"]);
        assert_eq!(args.image, PathBuf::from("card.jpg"));
        assert_eq!(args.document_type, DocumentType::NationalId);
        assert!(args.languages.is_none());
        assert!(!args.pretty);
    }

    #[test]
    fn test_cli_options() {
        let args = args(&["-t", "passport", "--languages", "tur", "--tessdata", "/opt/td", "--pretty", "-v", "p.png"]);
        assert_eq!(args.document_type, DocumentType::Passport);
        assert_eq!(args.languages.unwrap().to_string(), "tur");
        assert_eq!(args.tessdata, Some(PathBuf::from("/opt/td")));
        assert!(args.pretty && args.verbose);
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Args::try_parse_from(["kimlik-scan", "-t", "visa", "x.png"]).is_err());
        assert!(Args::try_parse_from(["kimlik-scan", "--languages", "tur+e/ng", "x.png"]).is_err());
        assert!(Args::try_parse_from(["kimlik-scan"]).is_err());
    }

    #[test]
    fn test_overrides_apply_on_top_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "languages": "eng", "tesseract": { "binaryPath": "/usr/local/bin/tesseract" } }"#)
            .unwrap();

        let config_arg = path.to_string_lossy().into_owned();
        let config = effective_config(&args(&["--config", &config_arg, "--tessdata", "/td", "x.png"])).unwrap();
        assert_eq!(config.languages.to_string(), "eng");
        assert_eq!(config.tesseract.binary(), "/usr/local/bin/tesseract");
        assert_eq!(config.tesseract.tessdata_path.as_deref(), Some("/td"));

        let config = effective_config(&args(&["--config", &config_arg, "-l", "tur+deu", "x.png"])).unwrap();
        assert_eq!(config.languages.to_string(), "tur+deu");
    }

    #[test]
    fn test_save_config_writes_effective_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("config.json");
        let config_arg = path.to_string_lossy().into_owned();

        // the image is missing, but the config is written first
        let err = scan(&args(&["--config", &config_arg, "-l", "tur", "--save-config", "missing.png"])).unwrap_err();
        assert!(matches!(err, ScanError::Acquisition(AcquisitionError::Io(_))));
        assert_eq!(config::load_config_from(&path).unwrap().languages.to_string(), "tur");
    }

    #[test]
    fn test_non_image_upload_never_reaches_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("note.png");
        fs::write(&image, "just text").unwrap();
        let config_arg = dir.path().join("config.json").to_string_lossy().into_owned();
        let image_arg = image.to_string_lossy().into_owned();

        let err = scan(&args(&["--config", &config_arg, &image_arg])).unwrap_err();
        assert!(matches!(err, ScanError::Acquisition(AcquisitionError::NotAnImage)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_codes_follow_categories() {
        let quality = ScanError::from(PipelineError::QualityRejected(QualityReport::decode_failed()));
        assert_eq!(quality.exit_code(), 2);
        assert!(quality.user_message().contains("Retake"));

        let offline = ScanError::from(PipelineError::from(EngineError::NetworkUnavailable("dns".into())));
        assert_eq!(offline.exit_code(), 3);
        assert_eq!(ScanError::from(PipelineError::from(EngineError::Cancelled)).exit_code(), 4);
        assert_eq!(
            ScanError::from(PipelineError::from(EngineError::RecognitionFailed("blur".into()))).exit_code(),
            5
        );
        assert_eq!(ScanError::from(ConfigError::NoConfigDir).exit_code(), 1);
    }
}
