//! Window layout modes and the per-mode size memory.
//!
//! Every transition follows the same order: commit any settled resize, capture
//! the current size if the mode being left remembers one, switch mode, then
//! resize. Capturing after the resize would record the new mode's size under
//! the old mode's key.

use crate::config::ConfigSync;
use crate::model::WindowSize;
use crate::timer::{earliest, TimerSlot};
use anyhow::Result;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(500);
pub const AUTO_COLLAPSE_DELAY: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowLayoutMode {
    #[default]
    Normal,
    FocusCollapsed,
    FocusExpanded,
}

impl WindowLayoutMode {
    pub const ALL: [WindowLayoutMode; 3] = [
        WindowLayoutMode::Normal,
        WindowLayoutMode::FocusCollapsed,
        WindowLayoutMode::FocusExpanded,
    ];

    /// Key under which the mode's size is persisted.
    pub fn key(self) -> &'static str {
        match self {
            WindowLayoutMode::Normal => "normal",
            WindowLayoutMode::FocusCollapsed => "focusCollapsed",
            WindowLayoutMode::FocusExpanded => "focusExpanded",
        }
    }

    pub fn default_size(self) -> WindowSize {
        match self {
            WindowLayoutMode::Normal => WindowSize::new(1000.0, 700.0),
            WindowLayoutMode::FocusCollapsed => WindowSize::new(340.0, 460.0),
            WindowLayoutMode::FocusExpanded => WindowSize::new(760.0, 560.0),
        }
    }

    pub fn is_focus(self) -> bool {
        self != WindowLayoutMode::Normal
    }
}

/// The window primitives the state machine drives.
pub trait WindowHost {
    fn window_size(&self) -> Result<WindowSize>;
    fn set_window_size(&mut self, size: WindowSize) -> Result<()>;
    fn set_visible(&mut self, visible: bool) -> Result<()>;
    /// Raises the window and gives it keyboard focus.
    fn focus(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandOutcome {
    /// First expansion out of the collapsed card list; the window grew.
    Resized,
    /// Already expanded; only the content changes.
    SwitchedWithoutResize,
    /// Not in focus mode.
    Rejected,
}

#[derive(Debug)]
pub struct WindowGeometryStateMachine {
    mode: WindowLayoutMode,
    memory: HashMap<WindowLayoutMode, WindowSize>,
    last_requested: Option<WindowSize>,
    pending_resize: Option<(WindowLayoutMode, WindowSize)>,
    resize_timer: TimerSlot,
    collapse_timer: TimerSlot,
}

impl WindowGeometryStateMachine {
    /// Seeds the memory from persisted geometry, falling back to each mode's
    /// default.
    pub fn new(config: &ConfigSync) -> Self {
        let memory = WindowLayoutMode::ALL
            .into_iter()
            .map(|mode| (mode, config.persisted_geometry(mode.key(), mode.default_size())))
            .collect();
        Self {
            mode: WindowLayoutMode::Normal,
            memory,
            last_requested: None,
            pending_resize: None,
            resize_timer: TimerSlot::default(),
            collapse_timer: TimerSlot::default(),
        }
    }

    pub fn mode(&self) -> WindowLayoutMode {
        self.mode
    }

    pub fn remembered(&self, mode: WindowLayoutMode) -> WindowSize {
        self.memory
            .get(&mode)
            .copied()
            .unwrap_or_else(|| mode.default_size())
    }

    pub fn is_collapse_pending(&self) -> bool {
        self.collapse_timer.is_pending()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([self.resize_timer.deadline(), self.collapse_timer.deadline()])
    }

    pub fn enter_focus_mode(&mut self, host: &mut dyn WindowHost, config: &mut ConfigSync) -> bool {
        if self.mode != WindowLayoutMode::Normal {
            return false;
        }
        self.flush_resize(config);
        self.capture(host, config);
        self.switch_to(WindowLayoutMode::FocusCollapsed, host);
        true
    }

    pub fn exit_focus_mode(&mut self, host: &mut dyn WindowHost, config: &mut ConfigSync) -> bool {
        if !self.mode.is_focus() {
            return false;
        }
        self.collapse_timer.cancel();
        self.flush_resize(config);
        self.capture(host, config);
        self.switch_to(WindowLayoutMode::Normal, host);
        true
    }

    pub fn toggle_focus_mode(&mut self, host: &mut dyn WindowHost, config: &mut ConfigSync) {
        if self.mode.is_focus() {
            self.exit_focus_mode(host, config);
        } else {
            self.enter_focus_mode(host, config);
        }
    }

    /// The caller makes the chosen session active and loads it for any
    /// outcome other than `Rejected`.
    pub fn expand(&mut self, host: &mut dyn WindowHost, config: &mut ConfigSync) -> ExpandOutcome {
        match self.mode {
            WindowLayoutMode::Normal => ExpandOutcome::Rejected,
            WindowLayoutMode::FocusExpanded => {
                self.collapse_timer.cancel();
                ExpandOutcome::SwitchedWithoutResize
            }
            WindowLayoutMode::FocusCollapsed => {
                self.flush_resize(config);
                self.capture(host, config);
                self.switch_to(WindowLayoutMode::FocusExpanded, host);
                ExpandOutcome::Resized
            }
        }
    }

    pub fn collapse(&mut self, host: &mut dyn WindowHost, config: &mut ConfigSync) -> bool {
        if self.mode != WindowLayoutMode::FocusExpanded {
            return false;
        }
        self.collapse_timer.cancel();
        self.flush_resize(config);
        self.capture(host, config);
        self.switch_to(WindowLayoutMode::FocusCollapsed, host);
        true
    }

    /// A size change reported by the host. The first echo of our own resize
    /// request is ignored; anything else is remembered for the current mode
    /// once it settles.
    pub fn window_resized(&mut self, size: WindowSize, now: Instant) {
        if self
            .last_requested
            .is_some_and(|requested| requested.approx_eq(&size))
        {
            self.last_requested = None;
            return;
        }
        self.pending_resize = Some((self.mode, size));
        self.resize_timer.schedule(now, RESIZE_DEBOUNCE);
    }

    pub fn pointer_left(&mut self, now: Instant) {
        if self.mode == WindowLayoutMode::FocusExpanded {
            self.collapse_timer.schedule(now, AUTO_COLLAPSE_DELAY);
        }
    }

    pub fn pointer_entered(&mut self) {
        self.collapse_timer.cancel();
    }

    /// Fires due timers. Returns true when the expanded card should collapse;
    /// the caller decides what else happens alongside the collapse.
    pub fn tick(&mut self, now: Instant, config: &mut ConfigSync) -> bool {
        if self.resize_timer.fire_if_due(now) {
            self.commit_resize(config);
        }
        self.collapse_timer.fire_if_due(now) && self.mode == WindowLayoutMode::FocusExpanded
    }

    pub fn cancel_timers(&mut self) {
        self.resize_timer.cancel();
        self.collapse_timer.cancel();
        self.pending_resize = None;
    }

    fn flush_resize(&mut self, config: &mut ConfigSync) {
        self.resize_timer.cancel();
        self.commit_resize(config);
    }

    fn commit_resize(&mut self, config: &mut ConfigSync) {
        let Some((mode, size)) = self.pending_resize.take() else {
            return;
        };
        if mode != self.mode {
            tracing::debug!(?mode, current = ?self.mode, "dropping resize from a previous mode");
            return;
        }
        self.remember(mode, size, config);
    }

    fn capture(&mut self, host: &mut dyn WindowHost, config: &mut ConfigSync) {
        match host.window_size() {
            Ok(size) => self.remember(self.mode, size, config),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), mode = ?self.mode, "could not read window size")
            }
        }
    }

    fn remember(&mut self, mode: WindowLayoutMode, size: WindowSize, config: &mut ConfigSync) {
        self.memory.insert(mode, size);
        config.set_persisted_geometry(mode.key(), size);
    }

    fn switch_to(&mut self, mode: WindowLayoutMode, host: &mut dyn WindowHost) {
        tracing::debug!(from = ?self.mode, to = ?mode, "window layout transition");
        self.mode = mode;
        let size = self.remembered(mode);
        self.last_requested = Some(size);
        if let Err(err) = host.set_window_size(size) {
            tracing::warn!(error = %format!("{err:#}"), "failed to resize window");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;

    #[derive(Debug)]
    pub(crate) struct FakeWindow {
        pub size: WindowSize,
        pub resizes: Vec<WindowSize>,
        pub visible: bool,
        pub focus_requests: usize,
    }

    impl FakeWindow {
        pub(crate) fn new(width: f32, height: f32) -> Self {
            Self {
                size: WindowSize::new(width, height),
                resizes: Vec::new(),
                visible: true,
                focus_requests: 0,
            }
        }
    }

    impl WindowHost for FakeWindow {
        fn window_size(&self) -> Result<WindowSize> {
            Ok(self.size)
        }

        fn set_window_size(&mut self, size: WindowSize) -> Result<()> {
            self.size = size;
            self.resizes.push(size);
            Ok(())
        }

        fn set_visible(&mut self, visible: bool) -> Result<()> {
            self.visible = visible;
            Ok(())
        }

        fn focus(&mut self) -> Result<()> {
            self.focus_requests += 1;
            Ok(())
        }
    }

    fn config() -> ConfigSync {
        ConfigSync::load(Box::new(MemoryConfigStore::default()))
    }

    #[test]
    fn first_focus_entry_uses_collapsed_default() {
        let mut config = config();
        let mut window = FakeWindow::new(1200.0, 900.0);
        let mut geometry = WindowGeometryStateMachine::new(&config);
        assert!(geometry.enter_focus_mode(&mut window, &mut config));
        assert_eq!(geometry.mode(), WindowLayoutMode::FocusCollapsed);
        assert_eq!(window.size, WindowLayoutMode::FocusCollapsed.default_size());
    }

    #[test]
    fn exit_restores_size_captured_on_entry() {
        let mut config = config();
        let mut window = FakeWindow::new(1234.0, 777.0);
        let mut geometry = WindowGeometryStateMachine::new(&config);
        geometry.enter_focus_mode(&mut window, &mut config);
        geometry.exit_focus_mode(&mut window, &mut config);
        assert_eq!(geometry.mode(), WindowLayoutMode::Normal);
        assert_eq!(window.size, WindowSize::new(1234.0, 777.0));
        assert_eq!(
            config.persisted_geometry("normal", WindowSize::new(0.0, 0.0)),
            WindowSize::new(1234.0, 777.0)
        );
    }

    #[test]
    fn expand_resizes_once_then_switches_in_place() {
        let mut config = config();
        let mut window = FakeWindow::new(1000.0, 700.0);
        let mut geometry = WindowGeometryStateMachine::new(&config);
        assert_eq!(
            geometry.expand(&mut window, &mut config),
            ExpandOutcome::Rejected
        );
        geometry.enter_focus_mode(&mut window, &mut config);
        assert_eq!(
            geometry.expand(&mut window, &mut config),
            ExpandOutcome::Resized
        );
        let resizes = window.resizes.len();
        assert_eq!(
            geometry.expand(&mut window, &mut config),
            ExpandOutcome::SwitchedWithoutResize
        );
        assert_eq!(window.resizes.len(), resizes);
        assert_eq!(window.size, WindowLayoutMode::FocusExpanded.default_size());
    }

    #[test]
    fn collapse_captures_expanded_size_before_resizing() {
        let mut config = config();
        let mut window = FakeWindow::new(1000.0, 700.0);
        let mut geometry = WindowGeometryStateMachine::new(&config);
        geometry.enter_focus_mode(&mut window, &mut config);
        geometry.expand(&mut window, &mut config);
        window.size = WindowSize::new(820.0, 640.0);
        assert!(geometry.collapse(&mut window, &mut config));
        assert_eq!(
            geometry.remembered(WindowLayoutMode::FocusExpanded),
            WindowSize::new(820.0, 640.0)
        );
        assert_eq!(window.size, WindowLayoutMode::FocusCollapsed.default_size());

        geometry.expand(&mut window, &mut config);
        assert_eq!(window.size, WindowSize::new(820.0, 640.0));
    }

    #[test]
    fn resize_is_remembered_for_its_own_mode_after_debounce() {
        let mut config = config();
        let mut window = FakeWindow::new(1000.0, 700.0);
        let mut geometry = WindowGeometryStateMachine::new(&config);
        let start = Instant::now();
        geometry.enter_focus_mode(&mut window, &mut config);
        geometry.expand(&mut window, &mut config);

        geometry.window_resized(WindowSize::new(900.0, 650.0), start);
        geometry.tick(start + Duration::from_millis(100), &mut config);
        assert_eq!(
            geometry.remembered(WindowLayoutMode::FocusExpanded),
            WindowLayoutMode::FocusExpanded.default_size()
        );
        geometry.tick(start + RESIZE_DEBOUNCE, &mut config);
        assert_eq!(
            geometry.remembered(WindowLayoutMode::FocusExpanded),
            WindowSize::new(900.0, 650.0)
        );
        assert_eq!(
            geometry.remembered(WindowLayoutMode::Normal),
            WindowSize::new(1000.0, 700.0)
        );
        assert_eq!(
            geometry.remembered(WindowLayoutMode::FocusCollapsed),
            WindowLayoutMode::FocusCollapsed.default_size()
        );
    }

    #[test]
    fn echo_of_requested_size_is_ignored() {
        let mut config = config();
        let mut window = FakeWindow::new(1000.0, 700.0);
        let mut geometry = WindowGeometryStateMachine::new(&config);
        let start = Instant::now();
        geometry.enter_focus_mode(&mut window, &mut config);
        geometry.window_resized(WindowSize::new(340.4, 459.8), start);
        assert_eq!(geometry.next_deadline(), None);
    }

    #[test]
    fn manual_resize_matching_an_old_request_is_remembered() {
        let mut config = config();
        let mut window = FakeWindow::new(1000.0, 700.0);
        let mut geometry = WindowGeometryStateMachine::new(&config);
        let start = Instant::now();
        let collapsed = WindowLayoutMode::FocusCollapsed.default_size();
        geometry.enter_focus_mode(&mut window, &mut config);
        geometry.window_resized(collapsed, start);
        geometry.window_resized(WindowSize::new(500.0, 500.0), start);
        geometry.window_resized(collapsed, start + Duration::from_millis(50));
        geometry.tick(start + Duration::from_millis(50) + RESIZE_DEBOUNCE, &mut config);
        assert_eq!(
            config.persisted_geometry("focusCollapsed", WindowSize::new(0.0, 0.0)),
            collapsed
        );
    }

    #[test]
    fn every_transition_captures_the_size_being_left() {
        let mut config = config();
        let mut window = FakeWindow::new(1000.0, 700.0);
        let mut geometry = WindowGeometryStateMachine::new(&config);
        geometry.enter_focus_mode(&mut window, &mut config);
        window.size = WindowSize::new(360.0, 480.0);
        geometry.expand(&mut window, &mut config);
        assert_eq!(
            geometry.remembered(WindowLayoutMode::FocusCollapsed),
            WindowSize::new(360.0, 480.0)
        );

        window.size = WindowSize::new(780.0, 590.0);
        geometry.exit_focus_mode(&mut window, &mut config);
        assert_eq!(
            geometry.remembered(WindowLayoutMode::FocusExpanded),
            WindowSize::new(780.0, 590.0)
        );
        assert_eq!(window.size, WindowSize::new(1000.0, 700.0));
        assert_eq!(
            config.persisted_geometry("focusExpanded", WindowSize::new(0.0, 0.0)),
            WindowSize::new(780.0, 590.0)
        );
    }

    #[test]
    fn resize_pending_across_a_transition_stays_with_its_mode() {
        let mut config = config();
        let mut window = FakeWindow::new(1000.0, 700.0);
        let mut geometry = WindowGeometryStateMachine::new(&config);
        let start = Instant::now();
        geometry.enter_focus_mode(&mut window, &mut config);
        window.size = WindowSize::new(300.0, 500.0);
        geometry.window_resized(window.size, start);
        geometry.expand(&mut window, &mut config);
        geometry.tick(start + RESIZE_DEBOUNCE, &mut config);
        assert_eq!(
            geometry.remembered(WindowLayoutMode::FocusCollapsed),
            WindowSize::new(300.0, 500.0)
        );
        assert_eq!(
            geometry.remembered(WindowLayoutMode::FocusExpanded),
            WindowLayoutMode::FocusExpanded.default_size()
        );
    }

    #[test]
    fn pointer_leave_collapses_after_delay_unless_pointer_returns() {
        let mut config = config();
        let mut window = FakeWindow::new(1000.0, 700.0);
        let mut geometry = WindowGeometryStateMachine::new(&config);
        let start = Instant::now();
        geometry.pointer_left(start);
        assert!(!geometry.is_collapse_pending());

        geometry.enter_focus_mode(&mut window, &mut config);
        geometry.expand(&mut window, &mut config);
        geometry.pointer_left(start);
        geometry.pointer_entered();
        assert!(!geometry.tick(start + AUTO_COLLAPSE_DELAY, &mut config));

        geometry.pointer_left(start);
        assert!(!geometry.tick(start + Duration::from_millis(399), &mut config));
        assert!(geometry.tick(start + AUTO_COLLAPSE_DELAY, &mut config));
        assert!(!geometry.tick(start + AUTO_COLLAPSE_DELAY * 2, &mut config));
    }

    #[test]
    fn remembered_sizes_survive_restart() {
        let mut config = config();
        let mut window = FakeWindow::new(1400.0, 950.0);
        let mut geometry = WindowGeometryStateMachine::new(&config);
        geometry.enter_focus_mode(&mut window, &mut config);
        let restarted = WindowGeometryStateMachine::new(&config);
        assert_eq!(
            restarted.remembered(WindowLayoutMode::Normal),
            WindowSize::new(1400.0, 950.0)
        );
    }
}
