//! Recognition engine trait and shared engine types

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::raster::RasterImage;

/// Characters the engine may emit for Turkish documents: the Turkish alphabet
/// in both cases, digits and the punctuation found on ID cards and passports.
pub const DOCUMENT_CHAR_WHITELIST: &str =
    "ABCÇDEFGĞHIİJKLMNOÖPRSŞTUÜVYZabcçdefgğhıijklmnoöprsştuüvyz0123456789./-: ()";

/// Language codes used when none are configured
pub const DEFAULT_LANGUAGES: [&str; 2] = ["tur", "eng"];

/// Ordered set of engine language codes, written `tur+eng`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageSet(Vec<String>);

impl LanguageSet {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for code in codes {
            let code = code.into().trim().to_string();
            if !code.is_empty() && !out.contains(&code) {
                out.push(code);
            }
        }
        Self(out)
    }

    /// No languages; a handle created with this needs explicit loading
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for LanguageSet {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGES)
    }
}

impl std::fmt::Display for LanguageSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("+"))
    }
}

impl std::str::FromStr for LanguageSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let set = Self::new(s.split('+'));
        if let Some(bad) = set.iter().find(|c| !c.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')) {
            return Err(format!("invalid language code: {}", bad));
        }
        Ok(set)
    }
}

impl TryFrom<String> for LanguageSet {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LanguageSet> for String {
    fn from(value: LanguageSet) -> Self {
        value.to_string()
    }
}

/// Page segmentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    /// Automatic page segmentation with orientation and script detection
    AutoOsd,
    /// Assume a single uniform block of text
    SingleBlock,
}

impl PageSegMode {
    pub fn code(&self) -> u8 {
        match self {
            PageSegMode::AutoOsd => 1,
            PageSegMode::SingleBlock => 6,
        }
    }
}

/// Recognizer engine mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Neural net text-line recognizer (most accurate)
    Lstm,
    /// Engine default
    Default,
}

impl EngineMode {
    pub fn code(&self) -> u8 {
        match self {
            EngineMode::Lstm => 1,
            EngineMode::Default => 3,
        }
    }
}

/// Parameters applied to a handle before recognition.
///
/// Declarative; see [`EngineParams::document_defaults`] for the table used on
/// identity documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineParams {
    pub page_seg_mode: PageSegMode,
    pub char_whitelist: String,
    pub preserve_interword_spaces: bool,
    pub engine_mode: EngineMode,
}

impl EngineParams {
    /// | parameter                   | value                        |
    /// |-----------------------------|------------------------------|
    /// | `tessedit_pageseg_mode`     | 1 (auto + OSD)               |
    /// | `tessedit_char_whitelist`   | [`DOCUMENT_CHAR_WHITELIST`]  |
    /// | `preserve_interword_spaces` | 1                            |
    /// | `tessedit_ocr_engine_mode`  | 1 (LSTM)                     |
    pub fn document_defaults() -> Self {
        Self {
            page_seg_mode: PageSegMode::AutoOsd,
            char_whitelist: DOCUMENT_CHAR_WHITELIST.to_string(),
            preserve_interword_spaces: true,
            engine_mode: EngineMode::Lstm,
        }
    }

    /// The table as engine variable name / value pairs
    pub fn variables(&self) -> Vec<(&'static str, String)> {
        vec![
            ("tessedit_pageseg_mode", self.page_seg_mode.code().to_string()),
            ("tessedit_char_whitelist", self.char_whitelist.clone()),
            (
                "preserve_interword_spaces",
                if self.preserve_interword_spaces { "1" } else { "0" }.to_string(),
            ),
            ("tessedit_ocr_engine_mode", self.engine_mode.code().to_string()),
        ]
    }
}

impl Default for EngineParams {
    fn default() -> Self {
        Self::document_defaults()
    }
}

/// Text and confidence from one successful engine invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub raw_text: String,
    /// 0.0 - 1.0
    pub engine_confidence: f32,
}

/// Shared flag a caller flips to abandon an in-flight recognition
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub(crate) fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// External text-recognition engine.
///
/// The core contract is `create` / `configure` / `recognize` / `terminate`.
/// `load_languages` and `initialize` are only used by the staged creation
/// path, after `create` was called with an empty language set.
pub trait RecognitionEngine {
    /// A live engine session
    type Handle;

    /// Short name for logs
    fn name(&self) -> &'static str;

    fn create(&self, languages: &LanguageSet) -> Result<Self::Handle, EngineError>;

    fn load_languages(&self, handle: &mut Self::Handle, languages: &LanguageSet) -> Result<(), EngineError>;

    fn initialize(&self, handle: &mut Self::Handle, languages: &LanguageSet) -> Result<(), EngineError>;

    fn configure(&self, handle: &mut Self::Handle, params: &EngineParams) -> Result<(), EngineError>;

    fn recognize(&self, handle: &mut Self::Handle, image: &RasterImage) -> Result<RecognitionResult, EngineError>;

    /// Release the session. Consumes the handle.
    fn terminate(&self, handle: Self::Handle) -> Result<(), EngineError>;
}

impl<E: RecognitionEngine + ?Sized> RecognitionEngine for &E {
    type Handle = E::Handle;

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn create(&self, languages: &LanguageSet) -> Result<Self::Handle, EngineError> {
        (**self).create(languages)
    }

    fn load_languages(&self, handle: &mut Self::Handle, languages: &LanguageSet) -> Result<(), EngineError> {
        (**self).load_languages(handle, languages)
    }

    fn initialize(&self, handle: &mut Self::Handle, languages: &LanguageSet) -> Result<(), EngineError> {
        (**self).initialize(handle, languages)
    }

    fn configure(&self, handle: &mut Self::Handle, params: &EngineParams) -> Result<(), EngineError> {
        (**self).configure(handle, params)
    }

    fn recognize(&self, handle: &mut Self::Handle, image: &RasterImage) -> Result<RecognitionResult, EngineError> {
        (**self).recognize(handle, image)
    }

    fn terminate(&self, handle: Self::Handle) -> Result<(), EngineError> {
        (**self).terminate(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_set_parse_and_display() {
        let set: LanguageSet = "tur+eng".parse().unwrap();
        assert_eq!(set.codes(), &["tur".to_string(), "eng".to_string()]);
        assert_eq!(set.to_string(), "tur+eng");
        assert_eq!(set, LanguageSet::default());
    }

    #[test]
    fn test_language_set_dedups_and_trims() {
        let set: LanguageSet = " tur + eng+tur+".parse().unwrap();
        assert_eq!(set.to_string(), "tur+eng");
        assert!("".parse::<LanguageSet>().unwrap().is_empty());
        assert!("tur+../x".parse::<LanguageSet>().is_err());
    }

    #[test]
    fn test_language_set_serde_as_string() {
        let json = serde_json::to_string(&LanguageSet::default()).unwrap();
        assert_eq!(json, "\"tur+eng\"");
        let back: LanguageSet = serde_json::from_str("\"eng\"").unwrap();
        assert_eq!(back.to_string(), "eng");
    }

    #[test]
    fn test_document_defaults_table() {
        let vars = EngineParams::document_defaults().variables();
        assert_eq!(vars[0], ("tessedit_pageseg_mode", "1".to_string()));
        assert_eq!(vars[1].0, "tessedit_char_whitelist");
        assert!(vars[1].1.contains('Ğ') && vars[1].1.contains('ı') && vars[1].1.contains('/'));
        assert_eq!(vars[2], ("preserve_interword_spaces", "1".to_string()));
        assert_eq!(vars[3], ("tessedit_ocr_engine_mode", "1".to_string()));
    }

    #[test]
    fn test_cancel_flag_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(flag.check().is_ok());
        other.cancel();
        assert_eq!(flag.check(), Err(EngineError::Cancelled));
        flag.clear();
        assert!(!other.is_cancelled());
    }
}
