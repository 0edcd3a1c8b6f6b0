//! Language-pack download into a local cache directory

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::EngineError;

pub const DEFAULT_LANGUAGE_PACK_URL: &str = "https://github.com/tesseract-ocr/tessdata_fast/raw/main";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Where language packs come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LanguagePackSource {
    pub base_url: String,
    /// Optional pinned SHA-256 (hex) per language code
    pub sha256: BTreeMap<String, String>,
    pub timeout_secs: u64,
}

impl Default for LanguagePackSource {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LANGUAGE_PACK_URL.to_string(),
            sha256: BTreeMap::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LanguagePackSource {
    pub fn pack_url(&self, lang: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), pack_file_name(lang))
    }

    fn pinned_digest(&self, lang: &str) -> Option<String> {
        self.sha256.get(lang).map(|d| d.trim().to_lowercase())
    }
}

pub fn pack_file_name(lang: &str) -> String {
    format!("{}.traineddata", lang)
}

/// Make sure `<cache_dir>/<lang>.traineddata` exists, downloading it when missing
/// or when a cached copy does not match its pinned digest.
pub fn ensure_language_pack(source: &LanguagePackSource, cache_dir: &Path, lang: &str) -> Result<PathBuf, EngineError> {
    let dest = cache_dir.join(pack_file_name(lang));

    if dest.is_file() {
        match source.pinned_digest(lang) {
            None => return Ok(dest),
            Some(expected) => {
                let actual = file_sha256(&dest)?;
                if actual == expected {
                    return Ok(dest);
                }
                log::warn!("[OCR] cached language pack digest mismatch, refetching: {} ({} != {})", lang, actual, expected);
            }
        }
    }

    fs::create_dir_all(cache_dir)?;
    download_language_pack(source, lang, &dest)?;
    Ok(dest)
}

/// Fetch one language pack to `dest` via a temp file in the same directory.
///
/// Returns the number of bytes written.
pub fn download_language_pack(source: &LanguagePackSource, lang: &str, dest: &Path) -> Result<u64, EngineError> {
    let url = source.pack_url(lang);
    log::info!("[OCR] downloading language pack: {} -> {:?}", url, dest);

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(source.timeout_secs.max(1)))
        .build()
        .map_err(|err| EngineError::Unknown(format!("failed to build HTTP client: {}", err)))?;

    let response = client.get(&url).send().map_err(|err| classify_request_error(&url, err))?;
    if !response.status().is_success() {
        return Err(EngineError::LanguagePackUnavailable(format!(
            "{}: download failed with status {}",
            lang,
            response.status()
        )));
    }

    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    let mut reader = response;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 65536];
    let mut downloaded: u64 = 0;

    loop {
        let count = reader
            .read(&mut buffer)
            .map_err(|err| EngineError::NetworkUnavailable(format!("download interrupted: {}", err)))?;
        if count == 0 {
            break;
        }
        tmp.write_all(&buffer[..count])?;
        hasher.update(&buffer[..count]);
        downloaded += count as u64;
    }

    let digest = hex::encode(hasher.finalize());
    if let Some(expected) = source.pinned_digest(lang) {
        if digest != expected {
            // tmp is removed on drop
            return Err(EngineError::LanguagePackUnavailable(format!(
                "{}: digest mismatch, expected {}, got {}",
                lang, expected, digest
            )));
        }
    }

    tmp.persist(dest).map_err(|err| EngineError::from(err.error))?;
    log::info!("[OCR] language pack ready: {} ({} bytes, sha256 {})", lang, downloaded, digest);
    Ok(downloaded)
}

fn classify_request_error(url: &str, err: reqwest::Error) -> EngineError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        EngineError::NetworkUnavailable(format!("{}: {}", url, err))
    } else {
        EngineError::Unknown(format!("{}: {}", url, err))
    }
}

pub fn file_sha256(path: &Path) -> Result<String, EngineError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 65536];
    loop {
        let count = file.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    fn unreachable_source() -> LanguagePackSource {
        LanguagePackSource {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_pack_url() {
        let source = LanguagePackSource {
            base_url: "https://example.org/tessdata/".to_string(),
            ..Default::default()
        };
        assert_eq!(source.pack_url("tur"), "https://example.org/tessdata/tur.traineddata");
    }

    #[test]
    fn test_file_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(file_sha256(&path).unwrap(), ABC_SHA256);
    }

    #[test]
    fn test_cached_pack_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tur.traineddata"), b"abc").unwrap();

        let mut source = unreachable_source();
        let path = ensure_language_pack(&source, dir.path(), "tur").unwrap();
        assert_eq!(path, dir.path().join("tur.traineddata"));

        source.sha256.insert("tur".to_string(), ABC_SHA256.to_uppercase());
        assert!(ensure_language_pack(&source, dir.path(), "tur").is_ok());
    }

    #[test]
    fn test_mismatched_cache_refetches_and_reports_network() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tur.traineddata"), b"tampered").unwrap();

        let mut source = unreachable_source();
        source.sha256.insert("tur".to_string(), ABC_SHA256.to_string());
        let err = ensure_language_pack(&source, dir.path(), "tur").unwrap_err();
        assert!(matches!(err, EngineError::NetworkUnavailable(_)), "{:?}", err);
    }
}
