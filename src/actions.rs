use crate::timer::TimerSlot;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

pub const COPIED_INDICATOR: Duration = Duration::from_millis(1500);

pub trait Clipboard {
    fn copy_text(&mut self, text: &str) -> Result<()>;
}

/// What activating a listing row or search hit does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryAction {
    Navigate(PathBuf),
    Open(PathBuf),
}

pub fn choose_action(path: &Path, is_directory: bool) -> EntryAction {
    if is_directory {
        EntryAction::Navigate(path.to_path_buf())
    } else {
        EntryAction::Open(path.to_path_buf())
    }
}

/// Hands `path` to the desktop's default handler.
pub fn open_with_default(path: &Path) -> Result<()> {
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", &path.to_string_lossy()]);
        command
    };
    #[cfg(target_os = "macos")]
    let mut command = {
        let mut command = Command::new("open");
        command.arg(path);
        command
    };
    #[cfg(all(unix, not(target_os = "macos")))]
    let mut command = {
        let mut command = Command::new("xdg-open");
        command.arg(path);
        command
    };
    command
        .spawn()
        .map(|_| ())
        .with_context(|| format!("failed to open {}", path.display()))
}

/// Transient "copied" marker. Copying again restarts the countdown and
/// moves the marker to the newest path.
#[derive(Debug, Default)]
pub struct CopyIndicator {
    copied: Option<PathBuf>,
    reset: TimerSlot,
}

impl CopyIndicator {
    pub fn show(&mut self, path: &Path, now: Instant) {
        self.copied = Some(path.to_path_buf());
        self.reset.schedule(now, COPIED_INDICATOR);
    }

    pub fn copied(&self) -> Option<&Path> {
        self.copied.as_deref()
    }

    pub fn is_showing(&self, path: &Path) -> bool {
        self.copied.as_deref() == Some(path)
    }

    pub fn tick(&mut self, now: Instant) {
        if self.reset.fire_if_due(now) {
            self.copied = None;
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.reset.deadline()
    }

    pub fn cancel_timers(&mut self) {
        self.reset.cancel();
        self.copied = None;
    }
}
