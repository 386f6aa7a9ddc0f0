//! UI components for Notex

pub mod dialogs;
pub mod editor;
pub mod file_tree;
