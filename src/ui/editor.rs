//! Content panel for the selected note or canvas

use eframe::egui;

use crate::app::NotexApp;
use crate::core::{Command, Content, Node, NodeKind, SessionView};
use crate::ui::dialogs::Dialog;

/// Content panel
pub struct EditorPanel;

impl EditorPanel {
    /// Show the editor panel
    pub fn show(ui: &mut egui::Ui, app: &mut NotexApp, view: &SessionView) {
        let Some(node) = view.selected.clone() else {
            Self::show_welcome(ui);
            return;
        };

        ui.vertical(|ui| {
            Self::show_header(ui, app, &node, view);
            ui.separator();

            egui::ScrollArea::vertical()
                .id_salt("editor_scroll")
                .show(ui, |ui| match node.kind {
                    NodeKind::Note => Self::show_note(ui, app),
                    NodeKind::Canvas => Self::show_canvas(ui, view.content.as_ref()),
                    NodeKind::Folder => {}
                });
        });
    }

    fn show_header(ui: &mut egui::Ui, app: &mut NotexApp, node: &Node, view: &SessionView) {
        ui.horizontal(|ui| {
            ui.heading(&node.title);
            ui.label(egui::RichText::new(node.kind.to_string()).weak());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Delete").clicked() {
                    app.dialog = Some(Dialog::ConfirmDelete {
                        id: node.id.clone(),
                        title: node.title.clone(),
                        kind: node.kind,
                    });
                }
                if ui.button("Save").clicked() {
                    app.send(Command::Save);
                }
                if let Some(ref updated_at) = view.updated_at {
                    ui.label(egui::RichText::new(updated_at).small().weak());
                }
            });
        });
    }

    fn show_note(ui: &mut egui::Ui, app: &mut NotexApp) {
        let response = egui::TextEdit::multiline(&mut app.editor.text)
            .font(egui::TextStyle::Monospace)
            .desired_width(f32::INFINITY)
            .desired_rows(30)
            .show(ui);

        if response.response.changed() {
            if let Some(id) = app.editor.id.clone() {
                app.send(Command::Edit {
                    id,
                    content: Content::PlainText(app.editor.text.clone()),
                });
            }
        }
    }

    /// Canvases are drawn elsewhere; show the stored scene
    fn show_canvas(ui: &mut egui::Ui, content: Option<&Content>) {
        let Some(scene) = content.and_then(Content::as_structured) else {
            ui.spinner();
            return;
        };
        let pretty = serde_json::to_string_pretty(scene).unwrap_or_default();
        ui.add(
            egui::Label::new(egui::RichText::new(pretty).monospace())
                .selectable(true)
                .wrap(),
        );
    }

    /// Show welcome screen when nothing is selected
    fn show_welcome(ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(100.0);

            ui.heading("Welcome to Notex");
            ui.add_space(20.0);

            ui.label("Pick a note in the sidebar or create a new one to get started.");
            ui.add_space(10.0);

            ui.label("Keyboard shortcuts:");
            ui.label("  Ctrl+S - Save");
            ui.label("  Ctrl+B - Toggle sidebar");
        });
    }
}
