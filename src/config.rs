use crate::model::WindowSize;
use crate::session::{PersistedSessions, Session, SessionId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

pub const CONFIG_FILE: &str = "config.json";
pub const INDEX_FILE: &str = "index.json";
pub const CONFIG_DIR_ENV: &str = "PATHDECK_CONFIG_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub root_folder: Option<PathBuf>,
    pub tabs: Vec<Session>,
    pub active_tab_id: Option<SessionId>,
    pub window_geometry: BTreeMap<String, WindowSize>,
    pub reset_to_pinned_on_collapse: bool,
    pub index_root: Option<PathBuf>,
    pub skip_hidden: bool,
    /// System-wide shortcut that shows or hides the window.
    pub global_hotkey: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            tabs: Vec::new(),
            active_tab_id: None,
            window_geometry: BTreeMap::new(),
            reset_to_pinned_on_collapse: false,
            index_root: None,
            skip_hidden: true,
            global_hotkey: None,
        }
    }
}

impl AppConfig {
    /// Folder a fresh install opens on: the configured root, else home.
    pub fn effective_root(&self) -> PathBuf {
        self.root_folder
            .clone()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from(crate::model::ROOT_LABEL))
    }

    pub fn effective_index_root(&self) -> PathBuf {
        self.index_root
            .clone()
            .unwrap_or_else(|| self.effective_root())
    }
}

/// Durable storage for [`AppConfig`]. Only does IO; [`ConfigSync`] owns the
/// cached copy and the mutation rules.
pub trait ConfigStore: Send {
    fn load(&self) -> Result<Option<AppConfig>>;
    fn save(&mut self, config: &AppConfig) -> Result<()>;
}

pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn open(dir: &Path) -> Self {
        Self {
            path: dir.join(CONFIG_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `$PATHDECK_CONFIG_DIR`, else the platform config dir.
    pub fn default_dir() -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(dir));
        }
        dirs::config_dir().map(|dir| dir.join("pathdeck"))
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Result<Option<AppConfig>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(Some(config))
    }

    fn save(&mut self, config: &AppConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config).context("failed to serialize config")?;
        write_atomic(&self.path, json.as_bytes())
    }
}

/// Writes through a sibling temp file and renames it over `path`, so readers
/// never observe a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let mut file =
            File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        if let Err(err) = file.sync_all() {
            tracing::warn!(error = %err, path = %tmp.display(), "failed to sync config to disk");
        }
    }
    fs::rename(&tmp, path).with_context(|| {
        let _ = fs::remove_file(&tmp);
        format!("failed to replace {}", path.display())
    })
}

/// Keeps everything in memory. Used by the headless CLI and tests.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    pub(crate) saved: Option<AppConfig>,
    pub fail_writes: bool,
}

impl MemoryConfigStore {
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            saved: Some(config),
            ..Self::default()
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Option<AppConfig>> {
        Ok(self.saved.clone())
    }

    fn save(&mut self, config: &AppConfig) -> Result<()> {
        if self.fail_writes {
            anyhow::bail!("config store is read-only");
        }
        self.saved = Some(config.clone());
        Ok(())
    }
}

/// Saves configs on a background thread. Only the newest queued config is
/// written; older ones it supersedes are skipped.
struct ConfigWriter {
    tx: Option<Sender<AppConfig>>,
    worker: Option<JoinHandle<()>>,
}

impl ConfigWriter {
    fn spawn(mut store: Box<dyn ConfigStore>) -> Self {
        let (tx, rx) = mpsc::channel::<AppConfig>();
        let worker = thread::spawn(move || {
            while let Ok(mut config) = rx.recv() {
                while let Ok(newer) = rx.try_recv() {
                    config = newer;
                }
                if let Err(err) = store.save(&config) {
                    tracing::warn!(error = %format!("{err:#}"), "failed to persist config");
                }
            }
        });
        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    fn submit(&self, config: AppConfig) {
        let sent = self.tx.as_ref().is_some_and(|tx| tx.send(config).is_ok());
        if !sent {
            tracing::warn!("config writer is gone; change not persisted");
        }
    }
}

impl Drop for ConfigWriter {
    /// Waits for queued writes so the last change reaches disk on exit.
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("config writer panicked");
            }
        }
    }
}

/// Best-effort persistence. Writes never fail or block the operation that
/// triggered them; failures are logged and the in-memory copy stays
/// authoritative.
pub struct ConfigSync {
    config: AppConfig,
    writer: ConfigWriter,
}

impl ConfigSync {
    pub fn load(store: Box<dyn ConfigStore>) -> Self {
        let config = match store.load() {
            Ok(Some(config)) => config,
            Ok(None) => AppConfig::default(),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "config unreadable; using defaults");
                AppConfig::default()
            }
        };
        Self {
            config,
            writer: ConfigWriter::spawn(store),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn flush(&mut self) {
        self.writer.submit(self.config.clone());
    }

    pub fn persist_sessions(&mut self, sessions: &PersistedSessions) {
        self.config.tabs = sessions.sessions.clone();
        self.config.active_tab_id = sessions.active_id.clone();
        self.flush();
    }

    pub fn load_persisted_sessions(&self) -> Option<PersistedSessions> {
        if self.config.tabs.is_empty() {
            return None;
        }
        Some(PersistedSessions {
            sessions: self.config.tabs.clone(),
            active_id: self.config.active_tab_id.clone(),
        })
    }

    pub fn persisted_geometry(&self, mode_key: &str, default: WindowSize) -> WindowSize {
        self.config
            .window_geometry
            .get(mode_key)
            .copied()
            .filter(|size| size.width > 0.0 && size.height > 0.0)
            .unwrap_or(default)
    }

    pub fn set_persisted_geometry(&mut self, mode_key: &str, size: WindowSize) {
        let previous = self.config.window_geometry.insert(mode_key.to_string(), size);
        if previous != Some(size) {
            self.flush();
        }
    }
}
