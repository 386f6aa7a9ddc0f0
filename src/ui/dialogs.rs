//! Modal dialogs for naming, renaming and deleting nodes

use std::path::PathBuf;

use eframe::egui;

use crate::core::{Command, NodeKind};

/// What a dialog asks for
#[derive(Debug, Clone)]
pub enum Dialog {
    NewLeaf {
        parent: PathBuf,
        kind: NodeKind,
        name: String,
    },
    NewFolder {
        parent: PathBuf,
        name: String,
    },
    Rename {
        id: String,
        name: String,
    },
    ConfirmDelete {
        id: String,
        title: String,
        kind: NodeKind,
    },
}

/// Result of showing a dialog for one frame
pub enum DialogOutcome {
    Pending,
    Cancel,
    Submit(Command),
}

impl Dialog {
    fn heading(&self) -> String {
        match self {
            Dialog::NewLeaf { kind, .. } => format!("New {kind}"),
            Dialog::NewFolder { .. } => "New Folder".to_string(),
            Dialog::Rename { .. } => "Rename".to_string(),
            Dialog::ConfirmDelete { .. } => "Delete".to_string(),
        }
    }

    /// Consume the dialog input into the command it stands for
    fn command(&self) -> Command {
        match self {
            Dialog::NewLeaf { parent, kind, name } => Command::CreateLeaf {
                parent: parent.clone(),
                name: name.clone(),
                kind: *kind,
            },
            Dialog::NewFolder { parent, name } => Command::CreateFolder {
                parent: parent.clone(),
                name: name.clone(),
            },
            Dialog::Rename { id, name } => Command::Rename {
                id: id.clone(),
                title: name.clone(),
            },
            Dialog::ConfirmDelete { id, .. } => Command::Delete { id: id.clone() },
        }
    }

    /// Show the dialog window
    pub fn show(&mut self, ctx: &egui::Context) -> DialogOutcome {
        let mut outcome = DialogOutcome::Pending;
        let heading = self.heading();

        egui::Window::new(heading)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                let mut submit = false;

                match self {
                    Dialog::NewLeaf { name, .. }
                    | Dialog::NewFolder { name, .. }
                    | Dialog::Rename { name, .. } => {
                        ui.horizontal(|ui| {
                            ui.label("Name:");
                            let response = ui.text_edit_singleline(name);
                            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                                submit = true;
                            }
                        });
                    }
                    Dialog::ConfirmDelete { title, kind, .. } => {
                        if *kind == NodeKind::Folder {
                            ui.label(format!(
                                "Delete the folder \"{title}\" and everything in it?"
                            ));
                        } else {
                            ui.label(format!("Delete \"{title}\"?"));
                        }
                    }
                }

                ui.horizontal(|ui| {
                    if ui.button("Cancel").clicked() || ui.input(|i| i.key_pressed(egui::Key::Escape)) {
                        outcome = DialogOutcome::Cancel;
                    }
                    let label = match self {
                        Dialog::ConfirmDelete { .. } => "Delete",
                        Dialog::Rename { .. } => "Rename",
                        _ => "Create",
                    };
                    if ui.button(label).clicked() {
                        submit = true;
                    }
                });

                if submit {
                    outcome = DialogOutcome::Submit(self.command());
                }
            });

        outcome
    }
}
