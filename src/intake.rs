use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::UploadedFile;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Please upload an image file")]
    InvalidFileType(String),
    #[error("The selected file is empty")]
    EmptyFile,
    #[error("Malformed data URL: {0}")]
    MalformedDataUrl(&'static str),
}

/// A file as handed over by the picker or a drop, before validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: Option<String>,
    pub media_type: String,
    pub bytes: Bytes,
}

/// Accepts any `image/*` media type, case-insensitively.
pub fn check_media_type(media_type: &str) -> Result<(), IntakeError> {
    let media_type = media_type.trim();
    if media_type.to_ascii_lowercase().starts_with("image/") {
        Ok(())
    } else {
        Err(IntakeError::InvalidFileType(media_type.to_string()))
    }
}

/// Validates that the declared type is an image and produces the transport
/// payload, the preview data URI and the media type from a single read.
pub fn ingest(file: IncomingFile) -> Result<UploadedFile, IntakeError> {
    let media_type = file.media_type.trim().to_string();
    check_media_type(&media_type)?;
    if file.bytes.is_empty() {
        return Err(IntakeError::EmptyFile);
    }

    // The declared type stays authoritative; a mismatch is only worth a log line.
    if let Ok(detected) = image::guess_format(&file.bytes) {
        if !detected.to_mime_type().eq_ignore_ascii_case(&media_type) {
            warn!(declared = %media_type, detected = ?detected, "Declared media type does not match file contents");
        }
    }

    let base64 = STANDARD.encode(&file.bytes);
    let preview_url = format!("data:{};base64,{}", media_type, base64);
    info!("📎 Ingested {} ({} bytes, {})", file.file_name.as_deref().unwrap_or("unnamed file"), file.bytes.len(), media_type);

    Ok(UploadedFile {
        base64,
        preview_url,
        mime_type: media_type,
        file_name: file.file_name,
        byte_len: file.bytes.len(),
    })
}

/// Drag-and-drop path: the browser already read the file as a data URL.
pub fn ingest_data_url(data_url: &str, file_name: Option<String>) -> Result<UploadedFile, IntakeError> {
    let (media_type, bytes) = decode_data_url(data_url)?;
    ingest(IncomingFile { file_name, media_type, bytes: Bytes::from(bytes) })
}

/// Splits `data:<type>[;params];base64,<payload>` into its media type and decoded bytes.
pub fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>), IntakeError> {
    let rest = data_url.strip_prefix("data:").ok_or(IntakeError::MalformedDataUrl("missing data: scheme"))?;
    let (header, payload) = rest.split_once(',').ok_or(IntakeError::MalformedDataUrl("missing payload"))?;
    let header = header.strip_suffix(";base64").ok_or(IntakeError::MalformedDataUrl("payload is not base64"))?;
    let media_type = header.split(';').next().unwrap_or_default().to_string();
    let bytes = STANDARD.decode(payload.trim()).map_err(|_| IntakeError::MalformedDataUrl("invalid base64"))?;
    Ok((media_type, bytes))
}

/// Monotonic marker for one file selection in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SelectionToken(u64);

/// Tracks the newest selection per slot so a slow read for an earlier
/// selection cannot overwrite a newer one.
#[derive(Debug, Default, Clone)]
pub struct SelectionTracker {
    latest: u64,
}

impl SelectionTracker {
    pub fn begin(&mut self) -> SelectionToken {
        self.latest += 1;
        SelectionToken(self.latest)
    }

    pub fn is_current(&self, token: SelectionToken) -> bool {
        token.0 == self.latest
    }
}
