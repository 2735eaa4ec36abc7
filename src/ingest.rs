//! Turning uploaded files into plain text.
//!
//! PDF and other binary formats are handled by external extractors
//! implementing [`TextExtractor`]; the built-in extractor only decodes text.

use crate::error::{RagError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Separator placed between merged documents.
pub const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Converts raw file bytes to text.
pub trait TextExtractor {
    fn extract(&self, bytes: &[u8], filename: &str) -> Result<String>;
}

/// Lossy UTF-8 decoder for plain text files.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8], filename: &str) -> Result<String> {
        if filename.to_lowercase().ends_with(".pdf") {
            return Err(RagError::UnsupportedDocument(format!(
                "{} (PDF extraction requires an external extractor)",
                filename
            )));
        }
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Join several document texts into one with blank-line separators.
pub fn merge_texts(texts: &[String]) -> String {
    texts.join(DOCUMENT_SEPARATOR)
}

/// Expand files and directories into a sorted list of files.
pub fn collect_document_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_file() {
            paths.push(input.clone());
        } else if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    let path = e.path().unwrap_or(input.as_path()).to_path_buf();
                    RagError::io(path, std::io::Error::other(e.to_string()))
                })?;
                if entry.file_type().is_file() {
                    paths.push(entry.into_path());
                }
            }
        } else {
            return Err(RagError::io(
                input,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
            ));
        }
    }
    Ok(paths)
}

/// Read and extract every file, returning the merged corpus text.
pub fn load_corpus(paths: &[PathBuf], extractor: &dyn TextExtractor) -> Result<String> {
    let mut texts = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = std::fs::read(path).map_err(|e| RagError::io(path, e))?;
        texts.push(extractor.extract(&bytes, &file_name(path))?);
    }
    Ok(merge_texts(&texts))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}
