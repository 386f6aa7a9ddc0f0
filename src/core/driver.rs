//! Background task that owns a [`Session`] and serves UI commands
//!
//! Commands are handled one at a time, in order, so saves of a leaf are never
//! reordered and a structural change never overlaps a save. Between commands
//! the task sleeps until the earliest autosave deadline.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use super::error::{Result, StoreError};
use super::node::{Node, NodeKind};
use super::record::Content;
use super::scanner::ScanIssue;
use super::session::{ContentState, Session};

/// Request to the session task
#[derive(Debug, Clone)]
pub enum Command {
    Refresh,
    Select(Option<String>),
    /// New content for the leaf `id`; rejected unless `id` is still selected
    Edit {
        id: String,
        content: Content,
    },
    Save,
    CreateLeaf {
        parent: PathBuf,
        name: String,
        kind: NodeKind,
    },
    CreateFolder {
        parent: PathBuf,
        name: String,
    },
    Rename {
        id: String,
        title: String,
    },
    Delete {
        id: String,
    },
    DeleteMany {
        ids: Vec<String>,
    },
    /// Flush pending edits and stop the task
    Shutdown,
}

/// Successful outcome of a [`Command`]
#[derive(Debug)]
pub enum Reply {
    Done,
    Saved(Option<String>),
    Created(Node),
    FolderCreated(PathBuf),
    Renamed(PathBuf),
    Deleted(Vec<(String, Result<()>)>),
}

/// What the UI renders, republished after every command and timer
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    pub root: PathBuf,
    pub tree: Arc<Vec<Node>>,
    pub issues: Arc<Vec<ScanIssue>>,
    pub selected: Option<Node>,
    pub content: Option<Content>,
    pub state: ContentState,
    pub updated_at: Option<String>,
    pub last_error: Option<String>,
}

struct Request {
    command: Command,
    reply: Option<oneshot::Sender<Result<Reply>>>,
}

/// Callback run after each published view, e.g. to request a repaint
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

/// Cheap handle to a running session task
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Request>,
    view: watch::Receiver<SessionView>,
}

impl SessionHandle {
    /// Spawn the task for `session` on `runtime`
    pub fn spawn(runtime: &Handle, session: Session, notify: Notifier) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (view_tx, view) = watch::channel(view_of(&session, None, None));
        runtime.spawn(run(session, rx, view_tx, notify));
        Self { tx, view }
    }

    /// Queue a command without waiting; failures show up in the view
    pub fn send(&self, command: Command) {
        let request = Request {
            command,
            reply: None,
        };
        if self.tx.send(request).is_err() {
            tracing::warn!("Session task has stopped; command dropped");
        }
    }

    /// Run a command and wait for its outcome
    pub async fn call(&self, command: Command) -> Result<Reply> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request {
                command,
                reply: Some(reply),
            })
            .map_err(|_| StoreError::Worker)?;
        rx.await.map_err(|_| StoreError::Worker)?
    }

    /// Latest published view
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver for observing view changes
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }
}

fn view_of(session: &Session, tree: Option<&SessionView>, error: Option<String>) -> SessionView {
    let (tree, issues) = match tree {
        Some(previous) => (previous.tree.clone(), previous.issues.clone()),
        None => (
            Arc::new(session.tree().to_vec()),
            Arc::new(session.issues().to_vec()),
        ),
    };
    SessionView {
        root: session.store().root().to_path_buf(),
        tree,
        issues,
        selected: session.selected().cloned(),
        content: session.content().cloned(),
        state: session.state(),
        updated_at: session.updated_at().map(str::to_string),
        last_error: error,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn apply(session: &mut Session, command: Command) -> Result<Reply> {
    match command {
        Command::Refresh => session.refresh().await.map(|_| Reply::Done),
        Command::Select(id) => session.select(id.as_deref()).await.map(|_| Reply::Done),
        Command::Edit { id, content } => session.edit(&id, content).map(|_| Reply::Done),
        Command::Save => session.save().await.map(Reply::Saved),
        Command::CreateLeaf { parent, name, kind } => session
            .create_leaf(&parent, &name, kind)
            .await
            .map(Reply::Created),
        Command::CreateFolder { parent, name } => session
            .create_folder(&parent, &name)
            .await
            .map(Reply::FolderCreated),
        Command::Rename { id, title } => session.rename(&id, &title).await.map(Reply::Renamed),
        Command::Delete { id } => session.delete(&id).await.map(|_| Reply::Done),
        Command::DeleteMany { ids } => session.delete_many(&ids).await.map(Reply::Deleted),
        Command::Shutdown => session.flush().await.map(|_| Reply::Done),
    }
}

/// Commands that can change the tree
fn is_structural(command: &Command) -> bool {
    !matches!(
        command,
        Command::Select(_) | Command::Edit { .. } | Command::Save | Command::Shutdown
    )
}

async fn run(
    mut session: Session,
    mut rx: mpsc::UnboundedReceiver<Request>,
    view_tx: watch::Sender<SessionView>,
    notify: Notifier,
) {
    loop {
        let deadline = session.next_deadline();
        let (structural, error, stop, reply) = tokio::select! {
            request = rx.recv() => {
                let Some(Request { command, reply }) = request else {
                    break;
                };
                let stop = matches!(command, Command::Shutdown);
                let structural = is_structural(&command);
                let result = apply(&mut session, command).await;
                let error = result.as_ref().err().map(|e| {
                    tracing::error!("Session command failed: {}", e);
                    e.to_string()
                });
                (structural, error, stop, reply.map(|tx| (tx, result)))
            }
            _ = sleep_until(deadline) => {
                let error = session.fire_due_timers().await.err().map(|e| {
                    tracing::error!("Autosave failed: {}", e);
                    e.to_string()
                });
                (false, error, false, None)
            }
        };

        // The view is published before the reply is sent.
        let view = {
            let previous = view_tx.borrow();
            view_of(&session, (!structural).then_some(&*previous), error)
        };
        view_tx.send_replace(view);
        notify();
        if let Some((tx, result)) = reply {
            let _ = tx.send(result);
        }

        if stop {
            tracing::info!("Session task stopped");
            return;
        }
    }

    // Every handle was dropped without an explicit shutdown.
    if let Err(e) = session.flush().await {
        tracing::error!("Final flush failed: {}", e);
    }
}
