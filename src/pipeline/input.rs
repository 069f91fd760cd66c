//! Input enumeration: list the licence images in a directory.
//!
//! Only directory-level problems are fatal here. Individual entries that turn
//! out to be unreadable are still listed; they fail later, per file, when
//! [`crate::pipeline::encode::load_document`] reads them.
//!
//! The listing is sorted by file name so that the enumeration order, and
//! with it the row order of the result table, is the same on every platform
//! and every run.

use crate::error::ExtractError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Accepted file extensions, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Whether the path carries one of [`IMAGE_EXTENSIONS`].
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// List the image files directly inside `dir`, sorted by file name.
///
/// Subdirectories are not descended into, and entries that are not regular
/// files (directories named `x.png`, dangling links) are skipped.
pub async fn enumerate_images(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let meta = tokio::fs::metadata(dir)
        .await
        .map_err(|e| directory_error(dir, e))?;
    if !meta.is_dir() {
        return Err(ExtractError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| directory_error(dir, e))?;

    let mut images = Vec::new();
    let mut skipped = 0usize;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| directory_error(dir, e))?
    {
        let path = entry.path();
        if !is_supported_image(&path) {
            skipped += 1;
            continue;
        }
        // `metadata` follows symlinks, so a link to an image counts as one.
        match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => images.push(path),
            _ => skipped += 1,
        }
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!(
        "Found {} images in {} ({} other entries skipped)",
        images.len(),
        dir.display(),
        skipped
    );
    Ok(images)
}

fn directory_error(dir: &Path, e: std::io::Error) -> ExtractError {
    let path = dir.to_path_buf();
    match e.kind() {
        ErrorKind::NotFound => ExtractError::DirectoryNotFound { path },
        ErrorKind::PermissionDenied => ExtractError::PermissionDenied { path },
        _ => ExtractError::DirectoryUnreadable { path, source: e },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter() {
        assert!(is_supported_image(Path::new("a.png")));
        assert!(is_supported_image(Path::new("a.JPG")));
        assert!(is_supported_image(Path::new("dir/a.Jpeg")));
        assert!(!is_supported_image(Path::new("a.gif")));
        assert!(!is_supported_image(Path::new("a.png.txt")));
        assert!(!is_supported_image(Path::new("png")));
        assert!(!is_supported_image(Path::new(".jpg")));
    }

    #[tokio::test]
    async fn lists_only_images_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jpg", "a.PNG", "notes.txt", "c.jpeg", "data.csv"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("folder.png")).unwrap();

        let found = enumerate_images(dir.path()).await.unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.PNG", "b.jpg", "c.jpeg"]);
    }

    #[tokio::test]
    async fn empty_directory_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(enumerate_images(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = enumerate_images(&dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, ExtractError::DirectoryNotFound { .. }));
    }

    #[tokio::test]
    async fn file_instead_of_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, b"x").unwrap();
        let err = enumerate_images(&file).await.unwrap_err();
        assert!(matches!(err, ExtractError::NotADirectory { .. }));
    }
}
