//! Document tree engine: scanning, records, storage operations and the session

pub mod config;
pub mod driver;
pub mod error;
pub mod node;
pub mod record;
pub mod sanitize;
pub mod scanner;
pub mod session;
pub mod store;

pub use driver::{Command, Reply, SessionHandle, SessionView};
pub use error::{Result, StoreError};
pub use node::{Node, NodeKind};
pub use record::Content;
pub use session::{AutosavePolicy, ContentState, Session};
pub use store::DocumentStore;
