//! Saving and loading vector index snapshots.
//!
//! Supports both JSON (human-readable) and bincode (compact binary) formats,
//! chosen by file extension.

use crate::error::{RagError, Result};
use crate::vector_index::{IndexSnapshot, VectorIndex};
use std::fs;
use std::path::{Path, PathBuf};

/// Save format for index snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    Json,
    Bincode,
}

impl SaveFormat {
    /// Every supported format, in load preference order.
    pub const ALL: [SaveFormat; 2] = [SaveFormat::Bincode, SaveFormat::Json];

    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            _ => SaveFormat::Json,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            SaveFormat::Json => "json",
            SaveFormat::Bincode => "bin",
        }
    }
}

/// File inside a store directory holding one pipeline's index.
pub fn index_path(dir: &Path, pipeline_id: &str, format: SaveFormat) -> PathBuf {
    dir.join(format!("pipeline_{}.{}", pipeline_id, format.extension()))
}

/// Save an index, picking the format from the extension.
pub fn save_index(index: &VectorIndex, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| RagError::io(parent, e))?;
        }
    }

    let snapshot = index.snapshot();
    let data = match SaveFormat::from_path(path) {
        SaveFormat::Json => serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| RagError::Serialization(e.to_string()))?,
        SaveFormat::Bincode => bincode::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(|e| RagError::Serialization(e.to_string()))?,
    };

    fs::write(path, &data).map_err(|e| RagError::io(path, e))
}

/// Delete a saved index if present.
pub fn remove_index(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RagError::io(path, e)),
    }
}

/// Load an index saved by [`save_index`].
pub fn load_index(path: &Path) -> Result<VectorIndex> {
    if !path.is_file() {
        return Err(RagError::IndexNotFound(path.to_path_buf()));
    }

    let data = fs::read(path).map_err(|e| RagError::io(path, e))?;
    let snapshot: IndexSnapshot = match SaveFormat::from_path(path) {
        SaveFormat::Json => serde_json::from_slice(&data)
            .map_err(|e| RagError::Serialization(e.to_string()))?,
        SaveFormat::Bincode => {
            let (snapshot, _) = bincode::decode_from_slice(&data, bincode::config::standard())
                .map_err(|e| RagError::Serialization(e.to_string()))?;
            snapshot
        }
    };

    VectorIndex::restore(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk;
    use tempfile::TempDir;

    fn sample_index() -> VectorIndex {
        let chunks = chunk("alpha beta gamma delta", 8, 2).unwrap();
        let embeddings = (0..chunks.len())
            .map(|i| vec![i as f32, 1.0, 0.5])
            .collect();
        let mut index = VectorIndex::new("B");
        index.index_all(&chunks, embeddings).unwrap();
        index
    }

    #[test]
    fn test_save_and_load_both_formats() {
        let dir = TempDir::new().unwrap();
        let original = sample_index();

        for format in [SaveFormat::Json, SaveFormat::Bincode] {
            let path = index_path(dir.path(), "B", format);
            save_index(&original, &path).unwrap();
            let loaded = load_index(&path).unwrap();

            assert_eq!(loaded.pipeline_id(), "B");
            assert_eq!(loaded.len(), original.len());
            assert_eq!(loaded.entries()[1].id, original.entries()[1].id);
            assert_eq!(loaded.entries()[1].embedding, original.entries()[1].embedding);
        }
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(SaveFormat::from_path(Path::new("x.json")), SaveFormat::Json);
        assert_eq!(SaveFormat::from_path(Path::new("x.bin")), SaveFormat::Bincode);
        assert_eq!(SaveFormat::from_path(Path::new("x.bincode")), SaveFormat::Bincode);
        assert_eq!(SaveFormat::from_path(Path::new("x")), SaveFormat::Json);
    }

    #[test]
    fn test_load_missing() {
        let result = load_index(Path::new("/nonexistent/pipeline_A.json"));
        assert!(matches!(result, Err(RagError::IndexNotFound(_))));
    }

    #[test]
    fn test_remove_index_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = index_path(dir.path(), "B", SaveFormat::Bincode);
        remove_index(&path).unwrap();

        save_index(&sample_index(), &path).unwrap();
        remove_index(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/store/pipeline_B.json");
        save_index(&sample_index(), &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"pipeline_id\": \"B\""));
    }
}
