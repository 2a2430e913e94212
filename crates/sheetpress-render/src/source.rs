// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Where card artwork comes from.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use sheetpress_core::error::{Result, SheetpressError};
use sheetpress_core::types::ImageRef;
use tracing::debug;

/// Resolves an image reference to encoded bytes.
pub trait ImageSource: Send + Sync {
    fn fetch(&self, image: &ImageRef) -> Result<Vec<u8>>;
}

/// Images stored as files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryImageSource {
    root: PathBuf,
}

impl DirectoryImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a reference to a path under the root. References may not escape it.
    fn resolve(&self, image: &ImageRef) -> Result<PathBuf> {
        let relative = Path::new(image.as_str());
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || image.as_str().is_empty() {
            return Err(SheetpressError::Fetch(format!(
                "image reference outside the image directory: {image}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl ImageSource for DirectoryImageSource {
    fn fetch(&self, image: &ImageRef) -> Result<Vec<u8>> {
        let path = self.resolve(image)?;
        let bytes = std::fs::read(&path)
            .map_err(|e| SheetpressError::Fetch(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), size = bytes.len(), "image read");
        Ok(bytes)
    }
}

/// Images held in memory, keyed by reference.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    images: HashMap<String, Vec<u8>>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image: impl Into<String>, bytes: Vec<u8>) {
        self.images.insert(image.into(), bytes);
    }

    pub fn with(mut self, image: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(image, bytes);
        self
    }
}

impl ImageSource for MemoryImageSource {
    fn fetch(&self, image: &ImageRef) -> Result<Vec<u8>> {
        self.images
            .get(image.as_str())
            .cloned()
            .ok_or_else(|| SheetpressError::Fetch(format!("no image named {image}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_source_reads_relative_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("set")).expect("mkdir");
        std::fs::write(dir.path().join("set/a.png"), b"png").expect("write");

        let source = DirectoryImageSource::new(dir.path());
        let bytes = source.fetch(&ImageRef::new("set/a.png")).expect("fetch");
        assert_eq!(bytes, b"png");
    }

    #[test]
    fn directory_source_rejects_escapes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = DirectoryImageSource::new(dir.path());
        for bad in ["../secret.png", "/etc/passwd", ""] {
            assert!(matches!(
                source.fetch(&ImageRef::new(bad)),
                Err(SheetpressError::Fetch(_))
            ));
        }
    }

    #[test]
    fn missing_file_is_a_fetch_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = DirectoryImageSource::new(dir.path());
        assert!(matches!(
            source.fetch(&ImageRef::new("nope.png")),
            Err(SheetpressError::Fetch(_))
        ));
    }

    #[test]
    fn memory_source_round_trip() {
        let source = MemoryImageSource::new().with("a.png", vec![1, 2, 3]);
        assert_eq!(source.fetch(&ImageRef::new("a.png")).expect("a"), vec![1, 2, 3]);
        assert!(source.fetch(&ImageRef::new("b.png")).is_err());
    }
}
