//! Document tree panel for navigation and structural actions

use std::path::PathBuf;

use eframe::egui;

use crate::app::NotexApp;
use crate::core::node::filter_tree;
use crate::core::{Command, Node, NodeKind, SessionView};
use crate::ui::dialogs::Dialog;

/// Document tree panel
pub struct FileTreePanel;

impl FileTreePanel {
    /// Show the tree panel
    pub fn show(ui: &mut egui::Ui, app: &mut NotexApp, view: &SessionView) {
        ui.vertical(|ui| {
            // Header
            ui.horizontal(|ui| {
                ui.heading("Notes");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("\u{21BB}").on_hover_text("Rescan").clicked() {
                        app.send(Command::Refresh);
                    }
                });
            });

            ui.horizontal(|ui| {
                if ui.button("+ Note").clicked() {
                    app.dialog = Some(Self::new_leaf(PathBuf::new(), NodeKind::Note));
                }
                if ui.button("+ Folder").clicked() {
                    app.dialog = Some(Dialog::NewFolder {
                        parent: PathBuf::new(),
                        name: String::new(),
                    });
                }
                if ui.button("+ Canvas").clicked() {
                    app.dialog = Some(Self::new_leaf(PathBuf::new(), NodeKind::Canvas));
                }
            });

            ui.add(egui::TextEdit::singleline(&mut app.search).hint_text("Search notes..."));

            ui.separator();

            let selected = view.selected.as_ref().map(|n| n.id.clone());
            let nodes = filter_tree(&view.tree, &app.search);

            egui::ScrollArea::vertical()
                .id_salt("file_tree_scroll")
                .show(ui, |ui| {
                    if nodes.is_empty() {
                        ui.label(if app.search.trim().is_empty() {
                            "No notes yet"
                        } else {
                            "Nothing matches"
                        });
                    }
                    for node in &nodes {
                        Self::show_node(ui, node, app, selected.as_deref());
                    }
                });
        });
    }

    fn new_leaf(parent: PathBuf, kind: NodeKind) -> Dialog {
        Dialog::NewLeaf {
            parent,
            kind,
            name: String::new(),
        }
    }

    /// Recursively show a tree node
    fn show_node(ui: &mut egui::Ui, node: &Node, app: &mut NotexApp, selected: Option<&str>) {
        if node.is_folder() {
            Self::show_folder(ui, node, app, selected);
        } else {
            Self::show_leaf(ui, node, app, selected);
        }
    }

    /// Show a folder node
    fn show_folder(ui: &mut egui::Ui, node: &Node, app: &mut NotexApp, selected: Option<&str>) {
        let id = ui.make_persistent_id(&node.id);

        egui::collapsing_header::CollapsingState::load_with_default_open(ui.ctx(), id, true)
            .show_header(ui, |ui| {
                let response = ui.selectable_label(false, format!("\u{1F4C1} {}", node.title));
                response.context_menu(|ui| {
                    if ui.button("New Note").clicked() {
                        app.dialog = Some(Self::new_leaf(node.path.clone(), NodeKind::Note));
                        ui.close();
                    }
                    if ui.button("New Canvas").clicked() {
                        app.dialog = Some(Self::new_leaf(node.path.clone(), NodeKind::Canvas));
                        ui.close();
                    }
                    if ui.button("New Folder").clicked() {
                        app.dialog = Some(Dialog::NewFolder {
                            parent: node.path.clone(),
                            name: String::new(),
                        });
                        ui.close();
                    }
                    ui.separator();
                    Self::common_actions(ui, node, app);
                });
            })
            .body(|ui| {
                for child in &node.children {
                    Self::show_node(ui, child, app, selected);
                }
            });
    }

    /// Show a note or canvas node
    fn show_leaf(ui: &mut egui::Ui, node: &Node, app: &mut NotexApp, selected: Option<&str>) {
        let icon = match node.kind {
            NodeKind::Canvas => "\u{270F}",
            _ => "\u{1F4DD}",
        };
        let is_active = selected == Some(node.id.as_str());

        ui.horizontal(|ui| {
            ui.add_space(16.0); // Indent for leaves
            let response = ui.selectable_label(is_active, format!("{} {}", icon, node.title));
            if response.clicked() && !is_active {
                app.send(Command::Select(Some(node.id.clone())));
            }
            response.context_menu(|ui| Self::common_actions(ui, node, app));
        });
    }

    fn common_actions(ui: &mut egui::Ui, node: &Node, app: &mut NotexApp) {
        if ui.button("Rename").clicked() {
            app.dialog = Some(Dialog::Rename {
                id: node.id.clone(),
                name: node.title.clone(),
            });
            ui.close();
        }
        if ui.button("Delete").clicked() {
            app.dialog = Some(Dialog::ConfirmDelete {
                id: node.id.clone(),
                title: node.title.clone(),
                kind: node.kind,
            });
            ui.close();
        }
    }
}
