use crate::model::{folder_label, FileEntry, IndexEntry, IndexProgress};
use crate::service::IndexService;
use anyhow::{bail, Context, Result};
use jwalk::WalkDir;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;

/// Folders that are listed but never descended into while indexing.
pub const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    ".git",
    "dist",
    "build",
    ".next",
    "vendor",
    "__pycache__",
    ".venv",
    "venv",
    ".cargo",
    "Library",
    ".Trash",
    "Applications",
];

const SEARCH_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct IndexerOptions {
    pub root: PathBuf,
    pub skip_hidden: bool,
    /// Where the finished index is written; `None` keeps it in memory only.
    pub index_file: Option<PathBuf>,
}

#[derive(Default)]
struct IndexState {
    entries: RwLock<Arc<Vec<IndexEntry>>>,
    progress: Mutex<IndexProgress>,
    building: AtomicBool,
}

/// Filesystem-backed Index Service.
#[derive(Clone)]
pub struct LocalIndexService {
    options: IndexerOptions,
    state: Arc<IndexState>,
}

impl LocalIndexService {
    pub fn new(options: IndexerOptions) -> Self {
        Self {
            options,
            state: Arc::new(IndexState::default()),
        }
    }

    pub fn options(&self) -> &IndexerOptions {
        &self.options
    }

    fn snapshot(&self) -> Arc<Vec<IndexEntry>> {
        match self.state.entries.read() {
            Ok(entries) => Arc::clone(&*entries),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    fn install(&self, entries: Vec<IndexEntry>) {
        let entries = Arc::new(entries);
        match self.state.entries.write() {
            Ok(mut slot) => *slot = entries,
            Err(poisoned) => *poisoned.into_inner() = entries,
        }
    }

    fn update_progress(&self, f: impl FnOnce(&mut IndexProgress)) {
        match self.state.progress.lock() {
            Ok(mut progress) => f(&mut progress),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

pub fn read_directory(path: &Path) -> Result<Vec<FileEntry>> {
    if !path.exists() {
        bail!("Path does not exist: {}", path.display());
    }
    if !path.is_dir() {
        bail!("Path is not a directory: {}", path.display());
    }

    let mut entries: Vec<FileEntry> = fs::read_dir(path)
        .with_context(|| format!("failed to read directory {}", path.display()))?
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                return None;
            }
            let path = entry.path();
            Some(FileEntry {
                is_directory: path.is_dir(),
                name,
                path,
            })
        })
        .collect();

    entries.sort_by(|a, b| match (a.is_directory, b.is_directory) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });
    Ok(entries)
}

fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Walks `root` and returns every entry below it, reporting folders to
/// `progress` as they are discovered and finished.
pub fn walk_index(
    root: &Path,
    skip_hidden: bool,
    progress: impl Fn(ProgressEvent<'_>),
) -> Vec<IndexEntry> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .skip_hidden(false)
        .process_read_dir(move |_depth, _path, _state, children| {
            children.retain(|child| {
                child
                    .as_ref()
                    .map(|e| !(skip_hidden && is_hidden_name(&e.file_name.to_string_lossy())))
                    .unwrap_or(false)
            });
            for child in children.iter_mut().flatten() {
                let skipped = child.file_type().is_dir()
                    && SKIPPED_DIRS.contains(&&*child.file_name.to_string_lossy());
                if skipped {
                    child.read_children_path = None;
                }
            }
        });

    for entry in walker.into_iter().flatten() {
        if entry.depth == 0 {
            progress(ProgressEvent::FolderStarted(root));
            continue;
        }
        let path = entry.path();
        let is_directory = entry.file_type().is_dir();
        let name = entry.file_name.to_string_lossy().to_string();
        let parent_folder = path
            .parent()
            .map(folder_label)
            .unwrap_or_else(|| "~".to_string());
        if is_directory && entry.read_children_path.is_some() {
            progress(ProgressEvent::FolderDiscovered);
        }
        entries.push(IndexEntry {
            name,
            path: path.clone(),
            is_directory,
            parent_folder,
        });
        if is_directory && entry.read_children_path.is_some() {
            progress(ProgressEvent::FolderStarted(&path));
        }
        progress(ProgressEvent::Entries(entries.len()));
    }
    entries
}

pub enum ProgressEvent<'a> {
    FolderDiscovered,
    FolderStarted(&'a Path),
    Entries(usize),
}

pub fn score_entry(entry: &IndexEntry, name_lower: &str, query_lower: &str) -> Option<i32> {
    if !name_lower.contains(query_lower) {
        return None;
    }
    let mut score = 0;
    if name_lower == query_lower {
        score += 1000;
    } else if name_lower.starts_with(query_lower) {
        score += 500;
    } else if name_lower.contains(&format!("-{query_lower}"))
        || name_lower.contains(&format!("_{query_lower}"))
    {
        score += 300;
    }
    if entry.is_directory {
        score += 200;
    }
    score += 50 - (entry.name.chars().count() as i32).min(50);
    if entry.path.to_string_lossy().contains("/projects/") {
        score += 100;
    }
    Some(score)
}

pub fn search_entries(entries: &[IndexEntry], query: &str, limit: usize) -> Vec<IndexEntry> {
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }
    let query_lower = query.to_lowercase();
    let mut scored: Vec<(i32, usize)> = entries
        .par_iter()
        .enumerate()
        .filter_map(|(idx, entry)| {
            score_entry(entry, &entry.name.to_lowercase(), &query_lower).map(|s| (s, idx))
        })
        .collect();
    // Index order breaks ties so results are deterministic.
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, idx)| entries[idx].clone())
        .collect()
}

pub fn save_index(path: &Path, entries: &[IndexEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let text = serde_json::to_string(entries).context("failed to serialize index")?;
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

pub fn load_index(path: &Path) -> Result<Vec<IndexEntry>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

impl IndexService for LocalIndexService {
    fn list_directory(&self, path: &Path) -> Result<Vec<FileEntry>> {
        read_directory(path)
    }

    fn parent_of(&self, path: &Path) -> Result<Option<PathBuf>> {
        Ok(path.parent().map(Path::to_path_buf))
    }

    fn search_index(&self, query: &str) -> Result<Vec<IndexEntry>> {
        Ok(search_entries(&self.snapshot(), query, SEARCH_LIMIT))
    }

    fn start_index_build(&self) -> Result<()> {
        if self
            .state
            .building
            .compare_exchange(false, true, AtomicOrdering::SeqCst, AtomicOrdering::SeqCst)
            .is_err()
        {
            tracing::debug!("index build already running");
            return Ok(());
        }
        if !self.options.root.is_dir() {
            self.state.building.store(false, AtomicOrdering::SeqCst);
            bail!("index root is not a directory: {}", self.options.root.display());
        }

        self.update_progress(|p| {
            *p = IndexProgress {
                total_folders: 1,
                ..IndexProgress::default()
            }
        });

        let service = self.clone();
        thread::spawn(move || {
            let root = service.options.root.clone();
            tracing::info!(root = %root.display(), "index build started");
            let entries = walk_index(&root, service.options.skip_hidden, |event| {
                service.update_progress(|p| match event {
                    ProgressEvent::FolderDiscovered => p.total_folders += 1,
                    ProgressEvent::FolderStarted(path) => {
                        p.indexed_folders += 1;
                        p.current_folder = path.to_string_lossy().to_string();
                    }
                    ProgressEvent::Entries(n) if n % 100 == 0 => p.total_files = n,
                    ProgressEvent::Entries(_) => {}
                });
            });
            let total = entries.len();
            if let Some(index_file) = &service.options.index_file {
                if let Err(err) = save_index(index_file, &entries) {
                    tracing::warn!(error = %format!("{err:#}"), "failed to persist index");
                }
            }
            service.install(entries);
            service.update_progress(|p| {
                p.total_files = total;
                p.indexed_folders = p.total_folders;
                p.is_complete = true;
            });
            service.state.building.store(false, AtomicOrdering::SeqCst);
            tracing::info!(files = total, "index build finished");
        });
        Ok(())
    }

    fn index_progress(&self) -> Result<IndexProgress> {
        match self.state.progress.lock() {
            Ok(progress) => Ok(progress.clone()),
            Err(poisoned) => Ok(poisoned.into_inner().clone()),
        }
    }

    fn indexed_file_count(&self) -> Result<usize> {
        Ok(self.snapshot().len())
    }

    fn load_persisted_index(&self) -> Result<bool> {
        let Some(index_file) = &self.options.index_file else {
            return Ok(false);
        };
        if !index_file.exists() {
            return Ok(false);
        }
        let entries = match load_index(index_file) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "ignoring unreadable index");
                return Ok(false);
            }
        };
        let count = entries.len();
        self.install(entries);
        self.update_progress(|p| {
            p.total_files = count;
            p.is_complete = true;
        });
        Ok(true)
    }
}
