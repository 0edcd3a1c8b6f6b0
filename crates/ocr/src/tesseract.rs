//! Tesseract engine (CLI wrapper)

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::engine::{EngineParams, LanguageSet, RecognitionEngine, RecognitionResult};
use crate::error::EngineError;
use crate::install::{ensure_language_pack, pack_file_name, LanguagePackSource};
use crate::raster::RasterImage;

/// Tesseract settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct TesseractConfig {
    /// Executable path; `tesseract` from PATH when unset
    pub binary_path: Option<String>,
    /// Bundled tessdata directory; discovered when unset
    pub tessdata_path: Option<String>,
    /// Where downloaded language packs are kept
    pub cache_dir: Option<String>,
    pub language_packs: LanguagePackSource,
}

impl TesseractConfig {
    pub fn binary(&self) -> &str {
        self.binary_path.as_deref().unwrap_or("tesseract")
    }

    pub fn cache_dir_or_default(&self) -> PathBuf {
        self.cache_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("kimlik-scan").join("tessdata"))
    }
}

pub struct TesseractEngine {
    config: TesseractConfig,
}

/// One engine session: a private scratch directory plus the settings applied
/// to it so far.
#[derive(Debug)]
pub struct TesseractHandle {
    scratch: tempfile::TempDir,
    version: String,
    tessdata: Option<PathBuf>,
    languages: LanguageSet,
    page_seg_mode: u8,
    engine_mode: u8,
    variables: Vec<(&'static str, String)>,
    pages: u32,
}

impl TesseractHandle {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn languages(&self) -> &LanguageSet {
        &self.languages
    }
}

impl TesseractEngine {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }

    fn bundled_tessdata(&self) -> Option<PathBuf> {
        self.config
            .tessdata_path
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| find_tessdata_path(self.config.binary()))
    }
}

impl RecognitionEngine for TesseractEngine {
    type Handle = TesseractHandle;

    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn create(&self, languages: &LanguageSet) -> Result<TesseractHandle, EngineError> {
        let version = get_tesseract_version(self.config.binary())?;

        let tessdata = if languages.is_empty() {
            None
        } else {
            let dir = self.bundled_tessdata().ok_or_else(|| {
                EngineError::LanguagePackUnavailable("no tessdata directory found".to_string())
            })?;
            let missing: Vec<&str> = languages
                .iter()
                .filter(|lang| !dir.join(pack_file_name(lang)).is_file())
                .collect();
            if !missing.is_empty() {
                return Err(EngineError::LanguagePackUnavailable(format!(
                    "{} not found in {:?}",
                    missing.join(", "),
                    dir
                )));
            }
            Some(dir)
        };

        let scratch = tempfile::Builder::new().prefix("kimlik-tesseract-").tempdir()?;
        log::info!(
            "[Tesseract] session created: version {}, languages '{}', scratch {:?}",
            version,
            languages,
            scratch.path()
        );

        Ok(TesseractHandle {
            scratch,
            version,
            tessdata,
            languages: languages.clone(),
            page_seg_mode: EngineParams::document_defaults().page_seg_mode.code(),
            engine_mode: EngineParams::document_defaults().engine_mode.code(),
            variables: Vec::new(),
            pages: 0,
        })
    }

    fn load_languages(&self, handle: &mut TesseractHandle, languages: &LanguageSet) -> Result<(), EngineError> {
        let cache_dir = self.config.cache_dir_or_default();
        for lang in languages.iter() {
            ensure_language_pack(&self.config.language_packs, &cache_dir, lang)?;
        }
        handle.tessdata = Some(cache_dir);
        Ok(())
    }

    fn initialize(&self, handle: &mut TesseractHandle, languages: &LanguageSet) -> Result<(), EngineError> {
        let tessdata = handle.tessdata.as_deref();
        let available = get_tesseract_langs(self.config.binary(), tessdata)?;
        let missing: Vec<&str> = languages
            .iter()
            .filter(|lang| !available.iter().any(|a| a == lang))
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::LanguagePackUnavailable(format!(
                "engine cannot see: {}",
                missing.join(", ")
            )));
        }
        handle.languages = languages.clone();
        log::info!("[Tesseract] languages initialized: {}", languages);
        Ok(())
    }

    fn configure(&self, handle: &mut TesseractHandle, params: &EngineParams) -> Result<(), EngineError> {
        handle.page_seg_mode = params.page_seg_mode.code();
        handle.engine_mode = params.engine_mode.code();
        // psm / oem go on the command line, not through -c
        handle.variables = params
            .variables()
            .into_iter()
            .filter(|(name, _)| *name != "tessedit_pageseg_mode" && *name != "tessedit_ocr_engine_mode")
            .collect();
        Ok(())
    }

    fn recognize(&self, handle: &mut TesseractHandle, image: &RasterImage) -> Result<RecognitionResult, EngineError> {
        if handle.languages.is_empty() {
            return Err(EngineError::InitializationFailed("no languages initialized".to_string()));
        }
        let start = Instant::now();

        let rgba = image
            .to_rgba_image()
            .ok_or_else(|| EngineError::RecognitionFailed("malformed raster".to_string()))?;
        handle.pages += 1;
        let input = handle.scratch.path().join(format!("page-{}.png", handle.pages));
        rgba.save(&input)
            .map_err(|e| EngineError::RecognitionFailed(format!("failed to write input image: {}", e)))?;

        let mut cmd = Command::new(self.config.binary());
        cmd.arg(&input)
            .arg("stdout")
            .arg("-l")
            .arg(handle.languages.to_string())
            .arg("--psm")
            .arg(handle.page_seg_mode.to_string())
            .arg("--oem")
            .arg(handle.engine_mode.to_string());
        for (name, value) in &handle.variables {
            cmd.arg("-c").arg(format!("{}={}", name, value));
        }
        cmd.arg("tsv");

        if let Some(tessdata) = &handle.tessdata {
            cmd.env("TESSDATA_PREFIX", tessdata);
        }

        log::info!(
            "[Tesseract] running: {} {:?} -l {} --psm {} --oem {} tsv",
            self.config.binary(),
            input,
            handle.languages,
            handle.page_seg_mode,
            handle.engine_mode
        );

        let output = cmd
            .output()
            .map_err(|e| EngineError::InitializationFailed(format!("failed to run tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_stderr(&stderr));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let result = parse_tesseract_tsv(&tsv);

        log::info!(
            "[Tesseract] recognition finished in {} ms, {} chars, confidence {:.2}",
            start.elapsed().as_millis(),
            result.raw_text.len(),
            result.engine_confidence
        );

        let _ = std::fs::remove_file(&input);
        Ok(result)
    }

    fn terminate(&self, handle: TesseractHandle) -> Result<(), EngineError> {
        let path = handle.scratch.path().to_path_buf();
        handle.scratch.close()?;
        log::debug!("[Tesseract] session closed: {:?}", path);
        Ok(())
    }
}

/// A failed recognition run with an unclassified diagnostic is a recognition failure
fn classify_stderr(stderr: &str) -> EngineError {
    match EngineError::from_engine_message(stderr) {
        EngineError::Unknown(message) => EngineError::RecognitionFailed(message),
        other => other,
    }
}

/// Rebuild text from Tesseract TSV output.
///
/// TSV columns:
/// level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
///
/// Word rows (level 5) are joined per line; confidence is the mean word
/// confidence scaled from 0-100 to 0-1. No words gives empty text and 0.0.
fn parse_tesseract_tsv(tsv: &str) -> RecognitionResult {
    let mut lines: Vec<((u32, u32, u32, u32), Vec<String>)> = Vec::new();
    let mut conf_sum = 0.0f64;
    let mut words = 0usize;

    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }

        let level: i32 = cols[0].parse().unwrap_or(-1);
        let conf: f64 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (
            cols[1].parse().unwrap_or(0),
            cols[2].parse().unwrap_or(0),
            cols[3].parse().unwrap_or(0),
            cols[4].parse().unwrap_or(0),
        );
        match lines.last_mut() {
            Some((last, words_in_line)) if *last == key => words_in_line.push(text.to_string()),
            _ => lines.push((key, vec![text.to_string()])),
        }
        conf_sum += conf;
        words += 1;
    }

    let raw_text = lines
        .iter()
        .map(|(_, w)| w.join(" "))
        .collect::<Vec<_>>()
        .join("\n");
    let engine_confidence = if words == 0 {
        0.0
    } else {
        (conf_sum / words as f64 / 100.0) as f32
    };

    RecognitionResult {
        raw_text,
        engine_confidence,
    }
}

/// Tesseract version string, e.g. "5.3.0"
pub fn get_tesseract_version(binary_path: &str) -> Result<String, EngineError> {
    let output = Command::new(binary_path)
        .arg("--version")
        .output()
        .map_err(|e| EngineError::InitializationFailed(format!("cannot run {}: {}", binary_path, e)))?;

    if !output.status.success() {
        return Err(EngineError::InitializationFailed(format!("{} --version failed", binary_path)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{}{}", stdout, stderr);
    Ok(parse_version(&combined))
}

fn parse_version(output: &str) -> String {
    // "tesseract 5.3.0" or "tesseract v5.3.0"
    for line in output.lines() {
        if line.contains("tesseract") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                return parts[1].trim_start_matches('v').to_string();
            }
        }
    }
    "unknown".to_string()
}

/// Languages the engine can load from `tessdata_path` (or its default)
pub fn get_tesseract_langs(binary_path: &str, tessdata_path: Option<&Path>) -> Result<Vec<String>, EngineError> {
    let mut cmd = Command::new(binary_path);
    cmd.arg("--list-langs");

    if let Some(path) = tessdata_path {
        cmd.env("TESSDATA_PREFIX", path);
    }

    let output = cmd
        .output()
        .map_err(|e| EngineError::InitializationFailed(format!("cannot run {}: {}", binary_path, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(parse_lang_list(&format!("{}{}", stdout, stderr)))
}

fn parse_lang_list(output: &str) -> Vec<String> {
    let mut langs = Vec::new();
    let mut found_list = false;

    for line in output.lines() {
        let line = line.trim();
        if line.contains("List of available languages") {
            found_list = true;
            continue;
        }
        if found_list && !line.is_empty() && !line.contains(':') {
            langs.push(line.to_string());
        }
    }
    langs
}

/// Locate a tessdata directory: TESSDATA_PREFIX, then what the binary reports
/// through `--print-parameters`, then common install paths
pub fn find_tessdata_path(binary_path: &str) -> Option<PathBuf> {
    if let Ok(path) = std::env::var("TESSDATA_PREFIX") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    if let Ok(output) = Command::new(binary_path).arg("--print-parameters").output() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(path) = tessdata_from_parameters(&stdout).find(|p| p.exists()) {
            return Some(path);
        };
    }

    #[cfg(target_os = "windows")]
    let common_paths: Vec<PathBuf> = {
        let mut paths = Vec::new();
        if let Ok(program_files) = std::env::var("ProgramFiles") {
            paths.push(Path::new(&program_files).join("Tesseract-OCR").join("tessdata"));
        }
        paths.push(PathBuf::from("C:\\Program Files\\Tesseract-OCR\\tessdata"));
        paths
    };

    #[cfg(not(target_os = "windows"))]
    let common_paths: Vec<PathBuf> = vec![
        PathBuf::from("/usr/share/tesseract-ocr/5/tessdata"),
        PathBuf::from("/usr/share/tesseract-ocr/4.00/tessdata"),
        PathBuf::from("/usr/share/tessdata"),
        PathBuf::from("/usr/local/share/tessdata"),
        PathBuf::from("/opt/homebrew/share/tessdata"),
    ];

    let found = common_paths.into_iter().find(|p| p.exists());
    if found.is_none() {
        log::debug!("[Tesseract] no tessdata directory found for {}", binary_path);
    }
    found
}

/// Candidate paths from `--print-parameters` lines mentioning tessdata
fn tessdata_from_parameters(output: &str) -> impl Iterator<Item = PathBuf> + '_ {
    output
        .lines()
        .filter(|line| line.contains("tessdata"))
        .filter_map(|line| line.split_whitespace().last())
        .map(|value| PathBuf::from(value.trim_matches('"')))
}
