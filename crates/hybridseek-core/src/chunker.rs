use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ChunkingSettings;
use crate::types::{ChunkIndex, TextChunk};

/// Splits documents into overlapping, whitespace-aligned character windows.
///
/// Chunk indexes are assigned consecutively across every document passed to
/// one `Chunker`, so they stay unique when a directory is ingested.
pub struct Chunker {
    settings: ChunkingSettings,
    next_index: ChunkIndex,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkingSettings::default())
    }
}

impl Chunker {
    pub fn new(settings: ChunkingSettings) -> Self {
        Self { settings, next_index: 0 }
    }

    /// Continue numbering after chunks that already exist.
    pub fn starting_at(mut self, index: ChunkIndex) -> Self {
        self.next_index = index;
        self
    }

    pub fn chunk_text(&mut self, text: &str) -> Vec<TextChunk> {
        split_windows(text, self.settings.chunk_size, self.settings.overlap)
            .into_iter()
            .map(|text| {
                let chunk = TextChunk { index: self.next_index, text };
                self.next_index += 1;
                chunk
            })
            .collect()
    }

    /// Chunk a single `.txt` file, or every `.txt` file under a directory in
    /// path order.
    pub fn chunk_path(&mut self, path: &Path) -> Result<Vec<TextChunk>> {
        let files = if path.is_dir() { list_txt_files(path) } else { vec![path.to_path_buf()] };
        if files.is_empty() {
            tracing::warn!(path = %path.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::info!(file = %file_path.display(), "chunking file {}/{}", file_index + 1, files.len());
            let content = read_file_content(file_path)?;
            all_chunks.extend(self.chunk_text(&content));
        }
        tracing::info!(files = files.len(), chunks = all_chunks.len(), "chunking complete");
        Ok(all_chunks)
    }
}

fn split_windows(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut windows = Vec::new();
    let mut index = 0usize;
    while index < chars.len() {
        // back up `overlap` chars, then to the whitespace before that point
        let start = match index.checked_sub(overlap) {
            Some(left) if index > 0 => (0..=left).rev().find(|&i| chars[i].is_whitespace()).unwrap_or(0),
            _ => 0,
        };
        let end = (index + chunk_size..chars.len())
            .find(|&i| chars[i].is_whitespace())
            .unwrap_or(chars.len());
        let window: String = chars[start..end].iter().collect();
        let window = window.trim();
        if !window.is_empty() {
            windows.push(window.to_string());
        }
        index = end + 1;
    }
    windows
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("txt") {
            txt_files.push(path.to_path_buf());
        }
    }
    txt_files.sort();
    txt_files
}
