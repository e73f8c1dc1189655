//! System-wide shortcut that shows or hides the window.

use anyhow::{Context, Result};
use eframe::egui;
use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use std::sync::mpsc::{self, Receiver};

/// Parses shortcuts such as `"ctrl+shift+KeyP"` or `"alt+Space"`.
pub fn parse_hotkey(text: &str) -> Result<HotKey> {
    text.trim()
        .parse::<HotKey>()
        .with_context(|| format!("invalid hotkey {text:?}"))
}

pub struct VisibilityHotkey {
    // Dropping the manager unregisters the shortcut.
    _manager: GlobalHotKeyManager,
    presses: Receiver<()>,
}

impl VisibilityHotkey {
    /// Registers `spec` with the OS. Presses wake `ctx` so they are seen even
    /// while the window is hidden.
    pub fn install(spec: &str, ctx: egui::Context) -> Result<Self> {
        let hotkey = parse_hotkey(spec)?;
        let manager =
            GlobalHotKeyManager::new().context("failed to start global hotkey manager")?;
        manager
            .register(hotkey)
            .with_context(|| format!("failed to register hotkey {spec:?}"))?;

        let id = hotkey.id();
        let (tx, rx) = mpsc::channel();
        GlobalHotKeyEvent::set_event_handler(Some(move |event: GlobalHotKeyEvent| {
            if event.id == id && event.state == HotKeyState::Pressed && tx.send(()).is_ok() {
                ctx.request_repaint();
            }
        }));
        tracing::info!(hotkey = spec, "registered visibility hotkey");
        Ok(Self {
            _manager: manager,
            presses: rx,
        })
    }

    /// Presses seen since the last call.
    pub fn take_presses(&self) -> usize {
        self.presses.try_iter().count()
    }
}
