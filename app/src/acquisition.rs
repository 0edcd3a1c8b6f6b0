//! Upload checks run before anything is decoded

use std::fs;
use std::path::Path;

use image::ImageFormat;

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("file is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("file is not a supported image")]
    NotAnImage,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sniff the image format from content, not from the file name
pub fn validate_upload(bytes: &[u8]) -> Result<ImageFormat, AcquisitionError> {
    if bytes.len() as u64 > MAX_UPLOAD_BYTES {
        return Err(AcquisitionError::TooLarge {
            size: bytes.len() as u64,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    let format = image::guess_format(bytes).map_err(|_| AcquisitionError::NotAnImage)?;
    log::debug!("[Upload] {} bytes, {}", bytes.len(), format.to_mime_type());
    Ok(format)
}

/// Read and validate an uploaded file. The size limit is checked before
/// reading.
pub fn read_upload(path: &Path) -> Result<Vec<u8>, AcquisitionError> {
    let size = fs::metadata(path)?.len();
    if size > MAX_UPLOAD_BYTES {
        return Err(AcquisitionError::TooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    let bytes = fs::read(path)?;
    validate_upload(&bytes)?;
    Ok(bytes)
}
