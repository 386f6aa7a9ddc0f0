//! Main application state and UI coordination

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use eframe::egui;

use crate::core::config::AppConfig;
use crate::core::{Command, DocumentStore, Session, SessionHandle, SessionView};
use crate::ui::dialogs::{Dialog, DialogOutcome};
use crate::ui::{editor::EditorPanel, file_tree::FileTreePanel};

/// Text being edited, tied to the leaf it was loaded from
#[derive(Debug, Default)]
pub struct EditorBuffer {
    pub id: Option<String>,
    pub text: String,
}

/// Main application state
pub struct NotexApp {
    /// Runtime hosting the session task and all storage I/O
    runtime: tokio::runtime::Runtime,
    /// Running session for the current notes root
    pub session: Option<SessionHandle>,
    /// Application configuration
    pub config: AppConfig,
    /// Whether sidebar is visible
    pub sidebar_visible: bool,
    /// Sidebar search term
    pub search: String,
    /// Note text buffer
    pub editor: EditorBuffer,
    /// Open modal dialog
    pub dialog: Option<Dialog>,
    /// Error opening the notes root
    pub open_error: Option<String>,
}

impl NotexApp {
    /// Create a new application instance
    pub fn new(cc: &eframe::CreationContext<'_>, config: AppConfig) -> Result<Self> {
        let visuals = if config.ui.theme == "light" {
            egui::Visuals::light()
        } else {
            egui::Visuals::dark()
        };
        cc.egui_ctx.set_visuals(visuals);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;

        let mut app = Self {
            runtime,
            session: None,
            config,
            sidebar_visible: true,
            search: String::new(),
            editor: EditorBuffer::default(),
            dialog: None,
            open_error: None,
        };
        let root = app.config.notes_root();
        app.open_root(&cc.egui_ctx, root);
        Ok(app)
    }

    /// Open a notes root, flushing and stopping the previous session
    pub fn open_root(&mut self, ctx: &egui::Context, root: PathBuf) {
        self.close_session();

        let store = DocumentStore::new(root.clone());
        let policy = self.config.autosave_policy();
        match self.runtime.block_on(Session::open(store, policy)) {
            Ok(session) => {
                let repaint = ctx.clone();
                let notify = Arc::new(move || repaint.request_repaint());
                self.session = Some(SessionHandle::spawn(self.runtime.handle(), session, notify));
                self.open_error = None;
            }
            Err(e) => {
                tracing::error!("Failed to open notes root {}: {}", root.display(), e);
                self.open_error = Some(e.to_string());
            }
        }
        self.editor = EditorBuffer::default();
    }

    fn close_session(&mut self) {
        if let Some(handle) = self.session.take() {
            if let Err(e) = self.runtime.block_on(handle.call(Command::Shutdown)) {
                tracing::error!("Failed to flush session: {}", e);
            }
        }
    }

    /// Pick a different notes root and remember it
    pub fn choose_root(&mut self, ctx: &egui::Context) {
        if let Some(path) = rfd::FileDialog::new().pick_folder() {
            self.config.set_notes_root(path.clone());
            if let Err(e) = self.config.save() {
                tracing::error!("Failed to save config: {}", e);
            }
            self.open_root(ctx, path);
        }
    }

    /// Show the notes root in the system file manager
    pub fn reveal_root(&self) {
        let root = self.config.notes_root();
        if let Err(e) = open::that(&root) {
            tracing::error!("Failed to open {}: {}", root.display(), e);
        }
    }

    /// Queue a command for the session
    pub fn send(&self, command: Command) {
        if let Some(ref session) = self.session {
            session.send(command);
        }
    }

    pub fn view(&self) -> SessionView {
        self.session
            .as_ref()
            .map(SessionHandle::view)
            .unwrap_or_default()
    }

    /// Reload the note buffer when the selection changed
    fn sync_editor(&mut self, view: &SessionView) {
        let selected = view.selected.as_ref().map(|n| n.id.clone());
        if selected != self.editor.id {
            self.editor.text = view
                .content
                .as_ref()
                .and_then(|c| c.as_text())
                .unwrap_or_default()
                .to_string();
            self.editor.id = selected;
        }
    }

    /// Render the top menu bar
    fn render_menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Choose Notes Folder...").clicked() {
                        self.choose_root(ctx);
                        ui.close();
                    }
                    if ui.button("Reveal Notes Folder").clicked() {
                        self.reveal_root();
                        ui.close();
                    }
                    if ui.button("Save").clicked() {
                        self.send(Command::Save);
                        ui.close();
                    }
                    ui.separator();
                    if ui.button("Exit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("View", |ui| {
                    if ui.button("Toggle Sidebar").clicked() {
                        self.sidebar_visible = !self.sidebar_visible;
                        ui.close();
                    }
                    if ui.button("Refresh").clicked() {
                        self.send(Command::Refresh);
                        ui.close();
                    }
                });
            });
        });
    }

    /// Render the status line with save state and errors
    fn render_status_bar(&self, ctx: &egui::Context, view: &SessionView) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(ref error) = self.open_error {
                    ui.colored_label(egui::Color32::LIGHT_RED, error);
                    return;
                }
                ui.label(format!("{:?}", view.state));
                if let Some(ref updated_at) = view.updated_at {
                    ui.label(format!("Saved {updated_at}"));
                }
                if !view.issues.is_empty() {
                    let details = view
                        .issues
                        .iter()
                        .map(|i| format!("{}: {}", i.path.display(), i.reason))
                        .collect::<Vec<_>>()
                        .join("\n");
                    ui.label(format!("{} unreadable", view.issues.len()))
                        .on_hover_text(details);
                }
                if let Some(ref error) = view.last_error {
                    ui.colored_label(egui::Color32::LIGHT_RED, error);
                }
            });
        });
    }

    fn render_dialog(&mut self, ctx: &egui::Context) {
        let Some(ref mut dialog) = self.dialog else {
            return;
        };
        match dialog.show(ctx) {
            DialogOutcome::Pending => {}
            DialogOutcome::Cancel => self.dialog = None,
            DialogOutcome::Submit(command) => {
                self.send(command);
                self.dialog = None;
            }
        }
    }
}

impl eframe::App for NotexApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Handle keyboard shortcuts
        ctx.input(|i| {
            if i.modifiers.ctrl && i.key_pressed(egui::Key::S) {
                self.send(Command::Save);
            }
            if i.modifiers.ctrl && i.key_pressed(egui::Key::B) {
                self.sidebar_visible = !self.sidebar_visible;
            }
        });

        let view = self.view();
        self.sync_editor(&view);

        self.render_menu_bar(ctx);
        self.render_status_bar(ctx, &view);

        if self.sidebar_visible {
            egui::SidePanel::left("sidebar")
                .resizable(true)
                .default_width(self.config.ui.sidebar_width)
                .min_width(150.0)
                .show(ctx, |ui| {
                    FileTreePanel::show(ui, self, &view);
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            EditorPanel::show(ui, self, &view);
        });

        self.render_dialog(ctx);
    }
}

impl Drop for NotexApp {
    fn drop(&mut self) {
        self.close_session();
    }
}
