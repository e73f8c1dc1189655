use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One child of a listed directory. Identity is `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
}

/// A hit from the global index; may live far outside the active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
    pub parent_folder: String,
}

impl IndexEntry {
    pub fn from_file_entry(entry: &FileEntry, parent_folder: &str) -> Self {
        Self {
            name: entry.name.clone(),
            path: entry.path.clone(),
            is_directory: entry.is_directory,
            parent_folder: parent_folder.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexProgress {
    pub total_folders: usize,
    pub indexed_folders: usize,
    pub total_files: usize,
    pub current_folder: String,
    pub is_complete: bool,
}

impl IndexProgress {
    pub fn fraction(&self) -> f32 {
        if self.is_complete {
            return 1.0;
        }
        if self.total_folders == 0 {
            return 0.0;
        }
        (self.indexed_folders as f32 / self.total_folders as f32).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: f32,
    pub height: f32,
}

impl WindowSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Window managers round sizes; treat sub-pixel differences as equal.
    pub fn approx_eq(&self, other: &WindowSize) -> bool {
        (self.width - other.width).abs() < 1.0 && (self.height - other.height).abs() < 1.0
    }
}

/// Name shown for a path: its last segment, or the path itself at a root.
pub fn folder_label(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| {
            let raw = path.to_string_lossy().to_string();
            if raw.is_empty() {
                ROOT_LABEL.to_string()
            } else {
                raw
            }
        })
}

pub const ROOT_LABEL: &str = "/";
