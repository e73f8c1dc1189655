//! The coordination core: one owner for every component, one thread, and a
//! single `pump` that applies service responses and fires due timers.
//!
//! Hosts (the egui shell, the headless CLI, tests) call the user-facing
//! operations below and call [`AppCore::pump`] whenever they wake up.

use crate::actions::{choose_action, open_with_default, Clipboard, CopyIndicator, EntryAction};
use crate::config::ConfigSync;
use crate::geometry::{ExpandOutcome, WindowGeometryStateMachine, WindowHost, WindowLayoutMode};
use crate::index_monitor::IndexLifecycleMonitor;
use crate::model::WindowSize;
use crate::navigation::{breadcrumb_segments, BreadcrumbSegment, DirectoryListing, NavigationController};
use crate::pointer::{DropTarget, PointerOutcome, PointerPos, PointerTracker};
use crate::search::SearchCoordinator;
use crate::service::{ServiceHandle, ServiceResponse};
use crate::session::{Session, SessionId, TabColor, TabSessionStore};
use crate::timer::earliest;
use crate::ui_model::{normalize_path_for_display, relative_display_path};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

pub struct AppCore {
    sessions: TabSessionStore,
    navigation: NavigationController,
    search: SearchCoordinator,
    index: IndexLifecycleMonitor,
    geometry: WindowGeometryStateMachine,
    pointer: PointerTracker,
    copied: CopyIndicator,
    config: ConfigSync,
    service: ServiceHandle,
    reset_to_pinned_on_collapse: bool,
    default_root: PathBuf,
    window_visible: bool,
}

impl AppCore {
    pub fn new(service: ServiceHandle, config: ConfigSync) -> Self {
        let sessions = config
            .load_persisted_sessions()
            .map(TabSessionStore::from_persisted)
            .unwrap_or_default();
        let geometry = WindowGeometryStateMachine::new(&config);
        let settings = config.config();
        let reset_to_pinned_on_collapse = settings.reset_to_pinned_on_collapse;
        let default_root = settings.effective_root();
        Self {
            sessions,
            navigation: NavigationController::new(),
            search: SearchCoordinator::new(),
            index: IndexLifecycleMonitor::new(),
            geometry,
            pointer: PointerTracker::new(),
            copied: CopyIndicator::default(),
            config,
            service,
            reset_to_pinned_on_collapse,
            default_root,
            window_visible: true,
        }
    }

    /// Guarantees one session, loads the active one and starts the index
    /// lifecycle.
    pub fn start(&mut self) {
        if self.sessions.is_empty() {
            let root = self.default_root.clone();
            tracing::info!(root = %root.display(), "no saved tabs; opening default root");
            self.sessions.open(root, None);
            self.persist_sessions();
        }
        self.load_active();
        self.index.start(&self.service);
    }

    pub fn sessions(&self) -> &[Session] {
        self.sessions.sessions()
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.sessions.active()
    }

    pub fn listing(&self) -> Arc<DirectoryListing> {
        self.navigation.listing()
    }

    pub fn breadcrumbs(&self) -> Vec<BreadcrumbSegment> {
        self.navigation
            .listing()
            .path
            .as_deref()
            .map(breadcrumb_segments)
            .unwrap_or_default()
    }

    pub fn search(&self) -> &SearchCoordinator {
        &self.search
    }

    pub fn index(&self) -> &IndexLifecycleMonitor {
        &self.index
    }

    pub fn layout_mode(&self) -> WindowLayoutMode {
        self.geometry.mode()
    }

    pub fn pointer(&self) -> &PointerTracker {
        &self.pointer
    }

    pub fn copied_path(&self) -> Option<&Path> {
        self.copied.copied()
    }

    /// Some service response is still outstanding.
    pub fn is_busy(&self) -> bool {
        self.navigation.has_pending() || self.search.is_searching() || self.index.is_waiting()
    }

    pub fn config(&self) -> &ConfigSync {
        &self.config
    }

    fn persist_sessions(&mut self) {
        self.config.persist_sessions(&self.sessions.snapshot());
    }

    fn load_directory(&mut self, path: &Path) {
        self.search.clear();
        self.navigation.load_directory(path, &self.service);
    }

    fn load_active(&mut self) {
        if let Some(path) = self.sessions.active().map(|s| s.path.clone()) {
            self.load_directory(&path);
        }
    }

    // Tabs

    pub fn open_tab(&mut self, path: PathBuf, color: Option<TabColor>) -> SessionId {
        let color = color.unwrap_or_else(|| TabColor::cycle(self.sessions.len()));
        let session = self.sessions.open(path, Some(color));
        self.persist_sessions();
        self.load_directory(&session.path);
        session.id
    }

    pub fn close_tab(&mut self, id: &SessionId) -> bool {
        let was_active = self.sessions.active_id() == Some(id);
        if !self.sessions.close(id) {
            return false;
        }
        self.persist_sessions();
        if was_active {
            self.load_active();
        }
        true
    }

    pub fn switch_tab(&mut self, id: &SessionId) -> bool {
        if !self.sessions.switch_to(id) {
            return false;
        }
        self.persist_sessions();
        self.load_active();
        true
    }

    pub fn recolor_tab(&mut self, id: &SessionId, color: TabColor) -> bool {
        let changed = self.sessions.recolor(id, color);
        if changed {
            self.persist_sessions();
        }
        changed
    }

    pub fn reorder_tab(&mut self, from: &SessionId, to: &SessionId) -> bool {
        let changed = self.sessions.reorder(from, to);
        if changed {
            self.persist_sessions();
        }
        changed
    }

    pub fn move_tab_to_end(&mut self, id: &SessionId) -> bool {
        let changed = self.sessions.move_to_end(id);
        if changed {
            self.persist_sessions();
        }
        changed
    }

    // Navigation

    pub fn navigate_to(&mut self, path: &Path) -> bool {
        let Some(id) = self.sessions.active_id().cloned() else {
            return false;
        };
        if !self.sessions.set_path(&id, path.to_path_buf()) {
            return false;
        }
        self.persist_sessions();
        self.load_directory(path);
        true
    }

    pub fn navigate_to_breadcrumb(&mut self, segment: &BreadcrumbSegment) -> bool {
        self.navigate_to(&segment.path)
    }

    pub fn navigate_back(&mut self) {
        if let Some(path) = self.sessions.active().map(|s| s.path.clone()) {
            self.navigation.request_parent(&path, &self.service);
        }
    }

    /// Directories are entered, files go to the platform's default handler.
    pub fn activate_entry(&mut self, path: &Path, is_directory: bool) -> Result<()> {
        match choose_action(path, is_directory) {
            EntryAction::Navigate(dir) => {
                self.navigate_to(&dir);
                Ok(())
            }
            EntryAction::Open(file) => open_with_default(&file),
        }
    }

    // Search

    pub fn set_query(&mut self, text: &str, now: Instant) {
        let listing = self.navigation.listing();
        self.search.set_query(text, now, &listing);
    }

    pub fn clear_search(&mut self) {
        self.search.clear();
    }

    pub fn toggle_search_mode(&mut self, now: Instant) {
        let listing = self.navigation.listing();
        self.search.toggle_mode(now, &listing);
    }

    pub fn reindex(&mut self, now: Instant) -> bool {
        let started = self.index.reindex(now, &self.service);
        self.sync_index_ready(now);
        started
    }

    fn sync_index_ready(&mut self, now: Instant) {
        let listing = self.navigation.listing();
        self.search
            .set_index_ready(self.index.is_ready(), now, &listing);
    }

    // Clipboard

    pub fn copy_path(&mut self, path: &Path, clipboard: &mut dyn Clipboard, now: Instant) -> bool {
        let text = normalize_path_for_display(path);
        self.copy_text(path, &text, clipboard, now)
    }

    /// Copies `path` relative to the active tab's pinned folder.
    pub fn copy_relative_path(
        &mut self,
        path: &Path,
        clipboard: &mut dyn Clipboard,
        now: Instant,
    ) -> bool {
        let text = match self.sessions.active() {
            Some(session) => relative_display_path(path, session.pinned_path()),
            None => normalize_path_for_display(path),
        };
        self.copy_text(path, &text, clipboard, now)
    }

    fn copy_text(
        &mut self,
        path: &Path,
        text: &str,
        clipboard: &mut dyn Clipboard,
        now: Instant,
    ) -> bool {
        match clipboard.copy_text(text) {
            Ok(()) => {
                self.copied.show(path, now);
                true
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "failed to copy path");
                false
            }
        }
    }

    // Window layout

    pub fn toggle_focus_mode(&mut self, host: &mut dyn WindowHost) {
        self.geometry.toggle_focus_mode(host, &mut self.config);
    }

    pub fn enter_focus_mode(&mut self, host: &mut dyn WindowHost) -> bool {
        self.geometry.enter_focus_mode(host, &mut self.config)
    }

    pub fn exit_focus_mode(&mut self, host: &mut dyn WindowHost) -> bool {
        self.geometry.exit_focus_mode(host, &mut self.config)
    }

    pub fn expand_card(&mut self, id: &SessionId, host: &mut dyn WindowHost) -> ExpandOutcome {
        if self.sessions.get(id).is_none() {
            return ExpandOutcome::Rejected;
        }
        let outcome = self.geometry.expand(host, &mut self.config);
        match outcome {
            ExpandOutcome::Rejected => {}
            ExpandOutcome::Resized => {
                self.switch_tab(id);
            }
            ExpandOutcome::SwitchedWithoutResize => {
                if self.sessions.active_id() != Some(id) {
                    self.switch_tab(id);
                }
            }
        }
        outcome
    }

    pub fn collapse_card(&mut self, host: &mut dyn WindowHost) -> bool {
        if self.geometry.mode() != WindowLayoutMode::FocusExpanded {
            return false;
        }
        if self.reset_to_pinned_on_collapse {
            if let Some(id) = self.sessions.active_id().cloned() {
                if self.sessions.reset_to_pinned(&id) {
                    self.persist_sessions();
                }
            }
        }
        self.geometry.collapse(host, &mut self.config)
    }

    pub fn is_window_visible(&self) -> bool {
        self.window_visible
    }

    /// Hides a shown window, or shows a hidden one and focuses it. Returns
    /// the new visibility.
    pub fn toggle_window_visibility(&mut self, host: &mut dyn WindowHost) -> bool {
        let visible = !self.window_visible;
        if let Err(err) = host.set_visible(visible) {
            tracing::warn!(error = %format!("{err:#}"), visible, "failed to change window visibility");
            return self.window_visible;
        }
        self.window_visible = visible;
        if visible {
            if let Err(err) = host.focus() {
                tracing::warn!(error = %format!("{err:#}"), "failed to focus window");
            }
        }
        visible
    }

    pub fn window_resized(&mut self, size: WindowSize, now: Instant) {
        self.geometry.window_resized(size, now);
    }

    /// Pointer left the window or the window lost focus.
    pub fn pointer_left(&mut self, now: Instant) {
        self.geometry.pointer_left(now);
    }

    pub fn pointer_entered(&mut self) {
        self.geometry.pointer_entered();
    }

    // Tab pointer interaction

    pub fn tab_pressed(&mut self, id: SessionId, at: PointerPos) {
        self.pointer.press(id, at);
    }

    pub fn tab_pointer_moved(&mut self, at: PointerPos) -> bool {
        self.pointer.moved(at)
    }

    pub fn tab_released(
        &mut self,
        target: Option<DropTarget>,
        host: &mut dyn WindowHost,
    ) -> PointerOutcome {
        let outcome = self.pointer.release(target);
        match &outcome {
            PointerOutcome::None => {}
            PointerOutcome::Clicked(id) => {
                if self.geometry.mode().is_focus() {
                    self.expand_card(id, host);
                } else {
                    self.switch_tab(id);
                }
            }
            PointerOutcome::Reorder { from, to } => {
                self.reorder_tab(from, to);
            }
            PointerOutcome::MoveToEnd(id) => {
                self.move_tab_to_end(id);
            }
        }
        outcome
    }

    // Event loop

    /// Applies every queued service response, then fires due timers. Returns
    /// true if anything happened that the host may want to redraw.
    pub fn pump(&mut self, now: Instant, host: &mut dyn WindowHost) -> bool {
        let mut changed = false;
        while let Some(response) = self.service.try_recv() {
            changed = true;
            self.apply_response(response, now);
        }

        changed |= self.search.tick(now, &self.service);
        changed |= self.index.tick(now, &self.service);
        if self.geometry.tick(now, &mut self.config) {
            changed |= self.collapse_card(host);
        }
        let copied_before = self.copied.copied().is_some();
        self.copied.tick(now);
        changed |= copied_before != self.copied.copied().is_some();
        changed
    }

    fn apply_response(&mut self, response: ServiceResponse, now: Instant) {
        match response {
            ServiceResponse::Directory { request_id, result } => {
                if self.navigation.finish_listing(request_id, result) {
                    let listing = self.navigation.listing();
                    self.search.refresh_local(&listing);
                }
            }
            ServiceResponse::Parent { request_id, result } => {
                if let Some(parent) = self.navigation.finish_parent(request_id, result) {
                    self.navigate_to(&parent);
                }
            }
            ServiceResponse::SearchResults { generation, result } => {
                self.search.finish(generation, result);
            }
            ServiceResponse::BuildStarted { result } => {
                self.index.finish_build_started(result);
                self.sync_index_ready(now);
            }
            ServiceResponse::Progress { result } => {
                if self.index.finish_progress(result, &self.service) {
                    self.sync_index_ready(now);
                }
            }
            ServiceResponse::FileCount { result } => {
                self.index.finish_file_count(result);
            }
            ServiceResponse::PersistedIndex { result } => {
                self.index.finish_persisted(result, now, &self.service);
                self.sync_index_ready(now);
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.search.next_deadline(),
            self.index.next_deadline(),
            self.geometry.next_deadline(),
            self.copied.next_deadline(),
        ])
    }

    /// Cancels every pending timer. In-flight responses are still drained by
    /// a later `pump` but start nothing new.
    pub fn shutdown(&mut self) {
        self.search.cancel_timers();
        self.index.cancel_timers();
        self.geometry.cancel_timers();
        self.copied.cancel_timers();
        self.pointer.cancel();
    }
}
