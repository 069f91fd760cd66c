//! Image loading: file bytes → [`ImageDocument`] with a base64 payload.
//!
//! Vision APIs accept images as base64 data-URIs inside the JSON request
//! body. The scan is forwarded exactly as stored; re-encoding a JPEG would
//! only add artefacts to small print such as the licence number.

use crate::error::FileError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One scanned image, owned by the batch run that loaded it.
#[derive(Debug)]
pub struct ImageDocument {
    path: PathBuf,
    file_name: String,
    bytes: Vec<u8>,
    media_type: &'static str,
    payload: OnceCell<String>,
}

impl ImageDocument {
    /// Wrap raw bytes, sniffing the media type from the magic bytes.
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self, FileError> {
        let path = path.into();
        let file_name = file_name_of(&path);
        let media_type = sniff_media_type(&bytes).map_err(|detail| FileError::NotAnImage {
            file: file_name.clone(),
            detail,
        })?;

        Ok(Self {
            path,
            file_name,
            bytes,
            media_type,
            payload: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `image/png` or `image/jpeg`.
    pub fn media_type(&self) -> &'static str {
        self.media_type
    }

    /// Base64 payload, computed on first access.
    pub fn payload(&self) -> &str {
        self.payload.get_or_init(|| {
            let b64 = encode_bytes(&self.bytes);
            debug!("Encoded {} → {} bytes base64", self.file_name, b64.len());
            b64
        })
    }
}

/// Read an image file from disk.
pub async fn load_document(path: &Path) -> Result<ImageDocument, FileError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| FileError::Io {
        file: file_name_of(path),
        detail: e.to_string(),
    })?;
    ImageDocument::from_bytes(path, bytes)
}

/// Standard base64 with padding; identical bytes always give an identical payload.
pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Final path component as a display string.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn sniff_media_type(bytes: &[u8]) -> Result<&'static str, String> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => Ok("image/png"),
        Ok(ImageFormat::Jpeg) => Ok("image/jpeg"),
        Ok(other) => Err(format!("{other:?} images are not accepted")),
        Err(_) if bytes.is_empty() => Err("file is empty".to_string()),
        Err(_) => Err("unrecognised image signature".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0];

    fn png_bytes(tail: &[u8]) -> Vec<u8> {
        [PNG_MAGIC, tail].concat()
    }

    #[test]
    fn payload_is_valid_base64_of_the_bytes() {
        let bytes = png_bytes(b"licence");
        let doc = ImageDocument::from_bytes("scan.png", bytes.clone()).expect("png accepted");
        assert_eq!(doc.media_type(), "image/png");
        let decoded = STANDARD.decode(doc.payload()).expect("valid base64");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn payload_is_deterministic() {
        let a = ImageDocument::from_bytes("a.png", png_bytes(b"same")).unwrap();
        let b = ImageDocument::from_bytes("b.png", png_bytes(b"same")).unwrap();
        assert_eq!(a.payload(), b.payload());
        assert_eq!(a.payload(), a.payload());
    }

    #[test]
    fn jpeg_is_detected_regardless_of_extension() {
        let doc = ImageDocument::from_bytes("scan.PNG", [JPEG_MAGIC, b"x"].concat()).unwrap();
        assert_eq!(doc.media_type(), "image/jpeg");
        assert_eq!(doc.file_name(), "scan.PNG");
    }

    #[test]
    fn non_image_bytes_are_rejected() {
        let err = ImageDocument::from_bytes("notes.jpg", b"plain text".to_vec()).unwrap_err();
        assert!(matches!(err, FileError::NotAnImage { ref file, .. } if file == "notes.jpg"));

        let err = ImageDocument::from_bytes("empty.png", Vec::new()).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_document(&dir.path().join("gone.png")).await.unwrap_err();
        assert!(matches!(err, FileError::Io { ref file, .. } if file == "gone.png"));
    }

    #[tokio::test]
    async fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, png_bytes(b"abc")).unwrap();
        let doc = load_document(&path).await.unwrap();
        assert_eq!(doc.path(), path.as_path());
        assert_eq!(doc.bytes(), png_bytes(b"abc").as_slice());
    }
}
