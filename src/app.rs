use crate::actions::Clipboard;
use crate::coordinator::AppCore;
use crate::geometry::{WindowHost, WindowLayoutMode};
use crate::hotkey::VisibilityHotkey;
use crate::index_monitor::IndexLifecycle;
use crate::model::WindowSize;
use crate::pointer::{DropTarget, PointerPos};
use crate::search::SearchMode;
use crate::session::{SessionId, TabColor};
use crate::ui_model::{highlight_runs, index_status_text, normalize_path_for_display, truncate_chars};
use anyhow::{anyhow, Result};
use eframe::egui;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const BUSY_REPAINT: Duration = Duration::from_millis(16);

/// Window primitives backed by the egui viewport.
struct ViewportHost<'a> {
    ctx: &'a egui::Context,
}

impl WindowHost for ViewportHost<'_> {
    fn window_size(&self) -> Result<WindowSize> {
        self.ctx
            .input(|i| i.viewport().inner_rect)
            .map(|rect| WindowSize::new(rect.width(), rect.height()))
            .ok_or_else(|| anyhow!("window size is not known yet"))
    }

    fn set_window_size(&mut self, size: WindowSize) -> Result<()> {
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::InnerSize(egui::vec2(
                size.width,
                size.height,
            )));
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) -> Result<()> {
        self.ctx
            .send_viewport_cmd(egui::ViewportCommand::Visible(visible));
        Ok(())
    }

    fn focus(&mut self) -> Result<()> {
        self.ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
        Ok(())
    }
}

struct EguiClipboard<'a> {
    ctx: &'a egui::Context,
}

impl Clipboard for EguiClipboard<'_> {
    fn copy_text(&mut self, text: &str) -> Result<()> {
        let text = text.to_string();
        self.ctx.output_mut(|o| o.copied_text = text);
        Ok(())
    }
}

/// Everything the UI can ask for. Collected while drawing and applied once
/// the frame's borrows are released.
#[derive(Debug, Clone)]
enum UiCommand {
    OpenTabDialog,
    CloseTab(SessionId),
    Recolor(SessionId, TabColor),
    NavigateTo(PathBuf),
    NavigateBack,
    Activate(PathBuf, bool),
    CopyPath(PathBuf),
    CopyRelativePath(PathBuf),
    ToggleSearchMode,
    ClearSearch,
    ToggleFocus,
    Collapse,
    Reindex,
}

struct ListRow {
    name: String,
    path: PathBuf,
    is_directory: bool,
    detail: Option<String>,
}

pub struct PathDeckApp {
    core: AppCore,
    query: String,
    current_row: Option<usize>,
    focus_query_requested: bool,
    observed_size: Option<WindowSize>,
    pointer_inside: bool,
    notice: Option<String>,
    commands: Vec<UiCommand>,
    tab_rects: Vec<(SessionId, egui::Rect)>,
    tab_strip_rect: Option<egui::Rect>,
    hotkey: Option<VisibilityHotkey>,
}

impl PathDeckApp {
    /// Takes a core that has already been started.
    pub fn new(core: AppCore, initial_query: String, hotkey: Option<VisibilityHotkey>) -> Self {
        let mut app = Self {
            core,
            query: String::new(),
            current_row: None,
            focus_query_requested: true,
            observed_size: None,
            pointer_inside: true,
            notice: None,
            commands: Vec::new(),
            tab_rects: Vec::new(),
            tab_strip_rect: None,
            hotkey,
        };
        if !initial_query.trim().is_empty() {
            app.query = initial_query.trim().to_string();
            app.core.set_query(&app.query, Instant::now());
        }
        app
    }

    fn rows(&self) -> Vec<ListRow> {
        let search = self.core.search();
        if search.is_active() {
            return search
                .results()
                .iter()
                .map(|hit| ListRow {
                    name: hit.name.clone(),
                    path: hit.path.clone(),
                    is_directory: hit.is_directory,
                    detail: (search.mode() == SearchMode::Indexed)
                        .then(|| hit.parent_folder.clone()),
                })
                .collect();
        }
        self.core
            .listing()
            .entries
            .iter()
            .map(|entry| ListRow {
                name: entry.name.clone(),
                path: entry.path.clone(),
                is_directory: entry.is_directory,
                detail: None,
            })
            .collect()
    }

    fn apply_commands(&mut self, ctx: &egui::Context, now: Instant) {
        for command in std::mem::take(&mut self.commands) {
            let mut host = ViewportHost { ctx };
            match command {
                UiCommand::OpenTabDialog => self.open_tab_dialog(),
                UiCommand::CloseTab(id) => {
                    self.core.close_tab(&id);
                }
                UiCommand::Recolor(id, color) => {
                    self.core.recolor_tab(&id, color);
                }
                UiCommand::NavigateTo(path) => {
                    self.core.navigate_to(&path);
                    self.current_row = None;
                }
                UiCommand::NavigateBack => self.core.navigate_back(),
                UiCommand::Activate(path, is_directory) => {
                    if let Err(err) = self.core.activate_entry(&path, is_directory) {
                        tracing::warn!(error = %format!("{err:#}"), "failed to open entry");
                        self.notice = Some(format!("Open failed: {err}"));
                    }
                    self.current_row = None;
                }
                UiCommand::CopyPath(path) => {
                    self.core
                        .copy_path(&path, &mut EguiClipboard { ctx }, now);
                }
                UiCommand::CopyRelativePath(path) => {
                    self.core
                        .copy_relative_path(&path, &mut EguiClipboard { ctx }, now);
                }
                UiCommand::ToggleSearchMode => self.core.toggle_search_mode(now),
                UiCommand::ClearSearch => self.core.clear_search(),
                UiCommand::ToggleFocus => self.core.toggle_focus_mode(&mut host),
                UiCommand::Collapse => {
                    self.core.collapse_card(&mut host);
                }
                UiCommand::Reindex => {
                    if !self.core.reindex(now) {
                        self.notice = Some("Index build already running".to_string());
                    }
                }
            }
        }
    }

    fn open_tab_dialog(&mut self) {
        let start = self
            .core
            .active_session()
            .map(|s| s.path.clone())
            .unwrap_or_default();
        match native_dialog::FileDialog::new()
            .set_location(&start)
            .show_open_single_dir()
        {
            Ok(Some(dir)) => {
                self.core.open_tab(dir, None);
            }
            Ok(None) => {}
            Err(err) => self.notice = Some(format!("Browse failed: {err}")),
        }
    }

    fn observe_window(&mut self, ctx: &egui::Context, now: Instant) {
        let (rect, focused, hovering, closing) = ctx.input(|i| {
            (
                i.viewport().inner_rect,
                i.viewport().focused,
                i.pointer.hover_pos().is_some(),
                i.viewport().close_requested(),
            )
        });
        if closing {
            self.core.shutdown();
            return;
        }
        if let Some(rect) = rect {
            let size = WindowSize::new(rect.width(), rect.height());
            if self
                .observed_size
                .map_or(true, |seen| !seen.approx_eq(&size))
            {
                self.observed_size = Some(size);
                self.core.window_resized(size, now);
            }
        }
        let inside = hovering && focused != Some(false);
        if inside != self.pointer_inside {
            self.pointer_inside = inside;
            if inside {
                self.core.pointer_entered();
            } else {
                self.core.pointer_left(now);
            }
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let ctrl = egui::Modifiers {
            ctrl: true,
            ..Default::default()
        };
        let ctrl_shift = egui::Modifiers {
            ctrl: true,
            shift: true,
            ..Default::default()
        };
        let row_count = self.rows().len();
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowDown)) && row_count > 0 {
            self.current_row = Some(self.current_row.map_or(0, |r| (r + 1).min(row_count - 1)));
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowUp)) && row_count > 0 {
            self.current_row = Some(self.current_row.map_or(0, |r| r.saturating_sub(1)));
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Enter)) {
            if let Some(row) = self.current_row.and_then(|r| self.rows().into_iter().nth(r)) {
                self.commands
                    .push(UiCommand::Activate(row.path, row.is_directory));
            }
        }
        if ctx.input_mut(|i| i.consume_key(ctrl_shift, egui::Key::C)) {
            if let Some(row) = self.current_row.and_then(|r| self.rows().into_iter().nth(r)) {
                self.commands.push(UiCommand::CopyPath(row.path));
            }
        }
        if ctx.input_mut(|i| i.consume_key(ctrl_shift, egui::Key::F)) {
            self.commands.push(UiCommand::ToggleFocus);
        }
        if ctx.input_mut(|i| i.consume_key(ctrl, egui::Key::T)) {
            self.commands.push(UiCommand::OpenTabDialog);
        }
        if ctx.input_mut(|i| i.consume_key(ctrl, egui::Key::W)) {
            if let Some(id) = self.core.active_session().map(|s| s.id.clone()) {
                self.commands.push(UiCommand::CloseTab(id));
            }
        }
        if ctx.input_mut(|i| i.consume_key(ctrl, egui::Key::I)) {
            self.commands.push(UiCommand::ToggleSearchMode);
        }
        if ctx.input_mut(|i| i.consume_key(ctrl, egui::Key::L)) {
            self.focus_query_requested = true;
        }
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::ALT, egui::Key::ArrowUp)) {
            self.commands.push(UiCommand::NavigateBack);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            if self.core.search().is_active() {
                self.commands.push(UiCommand::ClearSearch);
            } else if self.core.layout_mode() == WindowLayoutMode::FocusExpanded {
                self.commands.push(UiCommand::Collapse);
            }
        }
    }

    /// Feeds raw pointer input over the tab strip into the core's
    /// click-versus-drag tracker.
    fn handle_tab_pointer(&mut self, ctx: &egui::Context) {
        let (pressed, released, pos) = ctx.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        let Some(pos) = pos else {
            return;
        };
        let hit = self
            .tab_rects
            .iter()
            .find(|(_, rect)| rect.contains(pos))
            .map(|(id, _)| id.clone());
        let at = PointerPos::new(pos.x, pos.y);
        if pressed {
            if let Some(id) = hit {
                self.core.tab_pressed(id, at);
            }
        } else if released {
            let target = match hit {
                Some(id) => Some(DropTarget::Session(id)),
                None if self.tab_strip_rect.is_some_and(|r| r.contains(pos)) => {
                    Some(DropTarget::Background)
                }
                None => None,
            };
            let mut host = ViewportHost { ctx };
            self.core.tab_released(target, &mut host);
        } else {
            self.core.tab_pointer_moved(at);
        }
    }

    fn tab_chip(&mut self, ui: &mut egui::Ui, id: &SessionId, label: &str, color: TabColor, active: bool) {
        let [r, g, b] = color.rgb();
        let fill = if active {
            egui::Color32::from_rgb(r, g, b)
        } else {
            egui::Color32::from_rgba_unmultiplied(r, g, b, 90)
        };
        let dragging = self.core.pointer().dragged_session() == Some(id);
        let stroke = if dragging {
            egui::Stroke::new(2.0, egui::Color32::WHITE)
        } else {
            egui::Stroke::NONE
        };
        let frame = egui::Frame::none()
            .fill(fill)
            .stroke(stroke)
            .rounding(4.0)
            .inner_margin(egui::Margin::symmetric(8.0, 4.0))
            .show(ui, |ui| {
                ui.add(
                    egui::Label::new(egui::RichText::new(label).color(egui::Color32::WHITE))
                        .selectable(false),
                );
            });
        let rect = frame.response.rect;
        self.tab_rects.push((id.clone(), rect));

        let response = ui.interact(rect, ui.make_persistent_id(("tab", id.as_str())), egui::Sense::click());
        response.context_menu(|ui| {
            for choice in TabColor::PALETTE {
                let [r, g, b] = choice.rgb();
                let text = egui::RichText::new(format!("{choice:?}"))
                    .color(egui::Color32::from_rgb(r, g, b));
                if ui.button(text).clicked() {
                    self.commands.push(UiCommand::Recolor(id.clone(), choice));
                    ui.close_menu();
                }
            }
            ui.separator();
            if ui.button("Close tab").clicked() {
                self.commands.push(UiCommand::CloseTab(id.clone()));
                ui.close_menu();
            }
        });
    }

    fn tab_strip(&mut self, ui: &mut egui::Ui) {
        let tabs: Vec<(SessionId, String, TabColor)> = self
            .core
            .sessions()
            .iter()
            .map(|s| (s.id.clone(), s.display_name.clone(), s.color))
            .collect();
        let active = self.core.active_session().map(|s| s.id.clone());
        let strip = ui.horizontal_wrapped(|ui| {
            for (id, name, color) in &tabs {
                let is_active = active.as_ref() == Some(id);
                self.tab_chip(ui, id, &truncate_chars(name, 24), *color, is_active);
                if tabs.len() > 1 && ui.small_button("×").clicked() {
                    self.commands.push(UiCommand::CloseTab(id.clone()));
                }
            }
            if ui.button("+").on_hover_text("Open folder in new tab").clicked() {
                self.commands.push(UiCommand::OpenTabDialog);
            }
            ui.allocate_space(egui::vec2(ui.available_width(), 0.0));
        });
        self.tab_strip_rect = Some(strip.response.rect);
    }

    fn focus_cards(&mut self, ui: &mut egui::Ui) {
        let cards: Vec<(SessionId, String, String, TabColor)> = self
            .core
            .sessions()
            .iter()
            .map(|s| {
                (
                    s.id.clone(),
                    s.display_name.clone(),
                    normalize_path_for_display(&s.path),
                    s.color,
                )
            })
            .collect();
        let active = self.core.active_session().map(|s| s.id.clone());
        let column = ui.vertical(|ui| {
            ui.horizontal(|ui| {
                if ui.button("Exit focus").clicked() {
                    self.commands.push(UiCommand::ToggleFocus);
                }
                if self.core.layout_mode() == WindowLayoutMode::FocusExpanded
                    && ui.button("Collapse").clicked()
                {
                    self.commands.push(UiCommand::Collapse);
                }
            });
            ui.separator();
            for (id, name, path, color) in &cards {
                let is_active = active.as_ref() == Some(id);
                self.tab_chip(ui, id, name, *color, is_active);
                ui.add(
                    egui::Label::new(
                        egui::RichText::new(truncate_chars(path, 48))
                            .small()
                            .color(egui::Color32::GRAY),
                    )
                    .selectable(false),
                );
                ui.add_space(6.0);
            }
            ui.allocate_space(egui::vec2(ui.available_width(), ui.available_height()));
        });
        self.tab_strip_rect = Some(column.response.rect);
    }

    fn location_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("⬅ Back").clicked() {
                self.commands.push(UiCommand::NavigateBack);
            }
            for segment in self.core.breadcrumbs() {
                ui.label("/");
                if ui.link(segment.name.clone()).clicked() {
                    self.commands.push(UiCommand::NavigateTo(segment.path.clone()));
                }
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Focus mode").clicked() {
                    self.commands.push(UiCommand::ToggleFocus);
                }
                let reindex_enabled = self.core.index().state() != IndexLifecycle::Building;
                if ui
                    .add_enabled(reindex_enabled, egui::Button::new("Re-index"))
                    .clicked()
                {
                    self.commands.push(UiCommand::Reindex);
                }
            });
        });
    }

    fn query_bar(&mut self, ui: &mut egui::Ui, now: Instant) {
        if self.query != self.core.search().query() {
            self.query = self.core.search().query().to_string();
        }
        ui.horizontal(|ui| {
            let mode_label = match self.core.search().mode() {
                SearchMode::Local => "Folder",
                SearchMode::Indexed => "Index",
            };
            if ui
                .button(mode_label)
                .on_hover_text("Toggle between this folder and the global index (Ctrl+I)")
                .clicked()
            {
                self.commands.push(UiCommand::ToggleSearchMode);
            }
            let hint = match self.core.search().mode() {
                SearchMode::Local => "Filter this folder...",
                SearchMode::Indexed => "Search every indexed file...",
            };
            let output = egui::TextEdit::singleline(&mut self.query)
                .id(ui.make_persistent_id("query-input"))
                .desired_width(f32::INFINITY)
                .hint_text(hint)
                .show(ui);
            if self.focus_query_requested {
                output.response.request_focus();
                self.focus_query_requested = false;
            }
            if output.response.changed() {
                self.core.set_query(&self.query, now);
                self.current_row = None;
            }
        });
    }

    fn entry_list(&mut self, ui: &mut egui::Ui) {
        let listing = self.core.listing();
        if listing.is_loading {
            ui.spinner();
            return;
        }
        if let Some(error) = &listing.error_message {
            ui.colored_label(egui::Color32::from_rgb(248, 113, 113), error);
            return;
        }
        let rows = self.rows();
        if rows.is_empty() {
            let text = if self.core.search().is_searching() {
                "Searching..."
            } else if self.core.search().is_active() {
                "No matches"
            } else {
                "Empty folder"
            };
            ui.label(egui::RichText::new(text).color(egui::Color32::GRAY));
            return;
        }
        let query = self.core.search().query().to_string();
        let copied = self.core.copied_path().map(|p| p.to_path_buf());
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for (i, row) in rows.iter().enumerate() {
                    let is_current = self.current_row == Some(i);
                    let mut job = egui::text::LayoutJob::default();
                    let kind = if row.is_directory { "DIR  " } else { "FILE " };
                    job.append(
                        kind,
                        0.0,
                        egui::TextFormat {
                            color: if row.is_directory {
                                egui::Color32::from_rgb(52, 211, 153)
                            } else {
                                egui::Color32::from_rgb(96, 165, 250)
                            },
                            ..Default::default()
                        },
                    );
                    for (hit, segment) in highlight_runs(&row.name, &query) {
                        let color = if hit {
                            egui::Color32::from_rgb(245, 158, 11)
                        } else if is_current {
                            egui::Color32::WHITE
                        } else {
                            egui::Color32::from_rgb(229, 231, 235)
                        };
                        job.append(
                            &segment,
                            0.0,
                            egui::TextFormat {
                                color,
                                ..Default::default()
                            },
                        );
                    }
                    if let Some(detail) = &row.detail {
                        job.append(
                            &format!("  {detail}"),
                            0.0,
                            egui::TextFormat {
                                color: egui::Color32::GRAY,
                                ..Default::default()
                            },
                        );
                    }
                    if copied.as_deref() == Some(row.path.as_path()) {
                        job.append(
                            "  Copied",
                            0.0,
                            egui::TextFormat {
                                color: egui::Color32::from_rgb(52, 211, 153),
                                ..Default::default()
                            },
                        );
                    }

                    let response = ui.add(
                        egui::Label::new(job)
                            .selectable(false)
                            .sense(egui::Sense::click()),
                    );
                    if response.clicked() {
                        self.current_row = Some(i);
                    }
                    if response.double_clicked() {
                        self.commands
                            .push(UiCommand::Activate(row.path.clone(), row.is_directory));
                    }
                    response.context_menu(|ui| {
                        if ui.button("Copy path").clicked() {
                            self.commands.push(UiCommand::CopyPath(row.path.clone()));
                            ui.close_menu();
                        }
                        if ui.button("Copy relative path").clicked() {
                            self.commands
                                .push(UiCommand::CopyRelativePath(row.path.clone()));
                            ui.close_menu();
                        }
                        let open = if row.is_directory { "Open folder" } else { "Open" };
                        if ui.button(open).clicked() {
                            self.commands
                                .push(UiCommand::Activate(row.path.clone(), row.is_directory));
                            ui.close_menu();
                        }
                    });
                }
            });
    }

    fn status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let index = self.core.index();
            if index.state() == IndexLifecycle::Building {
                ui.add(
                    egui::ProgressBar::new(index.progress().fraction())
                        .desired_width(120.0)
                        .show_percentage(),
                );
            }
            ui.label(index_status_text(index));
            if let Some(path) = self.core.copied_path() {
                ui.separator();
                ui.label(format!("Copied {}", normalize_path_for_display(path)));
            } else if let Some(notice) = &self.notice {
                ui.separator();
                ui.label(notice);
            }
        });
    }
}

impl eframe::App for PathDeckApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.observe_window(ctx, now);
        {
            let mut host = ViewportHost { ctx };
            self.core.pump(now, &mut host);
            let presses = self.hotkey.as_ref().map_or(0, VisibilityHotkey::take_presses);
            for _ in 0..presses {
                if self.core.toggle_window_visibility(&mut host) {
                    self.focus_query_requested = true;
                }
            }
        }
        self.handle_shortcuts(ctx);
        self.tab_rects.clear();
        self.tab_strip_rect = None;

        match self.core.layout_mode() {
            WindowLayoutMode::Normal => {
                egui::TopBottomPanel::top("tabs").show(ctx, |ui| {
                    self.tab_strip(ui);
                    self.location_bar(ui);
                    self.query_bar(ui, now);
                });
                egui::TopBottomPanel::bottom("status")
                    .resizable(false)
                    .exact_height(24.0)
                    .show(ctx, |ui| self.status_bar(ui));
                egui::CentralPanel::default().show(ctx, |ui| self.entry_list(ui));
            }
            WindowLayoutMode::FocusCollapsed => {
                egui::CentralPanel::default().show(ctx, |ui| self.focus_cards(ui));
            }
            WindowLayoutMode::FocusExpanded => {
                egui::SidePanel::left("cards")
                    .resizable(false)
                    .exact_width(220.0)
                    .show(ctx, |ui| self.focus_cards(ui));
                egui::TopBottomPanel::top("location").show(ctx, |ui| {
                    self.location_bar(ui);
                    self.query_bar(ui, now);
                });
                egui::CentralPanel::default().show(ctx, |ui| self.entry_list(ui));
            }
        }

        self.handle_tab_pointer(ctx);
        self.apply_commands(ctx, now);

        if self.core.is_busy() {
            ctx.request_repaint_after(BUSY_REPAINT);
        } else if let Some(deadline) = self.core.next_deadline() {
            ctx.request_repaint_after(deadline.saturating_duration_since(Instant::now()));
        }
    }
}
