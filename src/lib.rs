//! Notex - nested notes and canvases kept in sync with a document tree
//!
//! The engine lives in [`core`]; [`app`] and [`ui`] are a thin desktop shell
//! that drives it.

pub mod app;
pub mod core;
pub mod ui;
