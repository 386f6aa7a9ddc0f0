//! Selection, content cache and autosave for the document tree
//!
//! The session is the single owner of the current tree, the selected leaf and
//! its pending edits. Every mutation goes through a method here, and every
//! structural mutation ends with a full rescan.
//!
//! Per selected leaf the content moves through
//! `Idle -> Loading -> Ready -> Dirty -> Saving -> Ready`, back to `Idle` when
//! the leaf is deselected. Two deadline timers drive autosave: a short
//! throttle that propagates the newest edit into the session (and the canvas
//! cache), and a longer idle debounce that persists it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;

use super::error::{Result, StoreError};
use super::node::{filter_tree, find_by_id, leaves, Node, NodeKind};
use super::record::Content;
use super::scanner::ScanIssue;
use super::store::DocumentStore;

/// Autosave intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosavePolicy {
    /// At most one propagation of edits per interval
    pub throttle: Duration,
    /// Quiet period after the last edit before content is persisted
    pub idle_save: Duration,
}

impl Default for AutosavePolicy {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(500),
            idle_save: Duration::from_secs(10),
        }
    }
}

/// Content state of the selected leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentState {
    #[default]
    Idle,
    Loading,
    Ready,
    Dirty,
    Saving,
}

/// A one-shot deadline
#[derive(Debug, Clone, Copy, Default)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    /// Arm unless already armed; used for throttling
    pub fn arm_if_idle(&mut self, now: Instant, period: Duration) {
        if self.deadline.is_none() {
            self.deadline = Some(now + period);
        }
    }

    /// Arm, pushing back any earlier deadline; used for debouncing
    pub fn rearm(&mut self, now: Instant, period: Duration) {
        self.deadline = Some(now + period);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm and return true if the deadline has passed
    pub fn take_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// The selected leaf and its edit state
#[derive(Debug)]
struct Selection {
    node: Node,
    state: ContentState,
    /// Last propagated content
    content: Content,
    /// Newest edit not yet propagated by the throttle
    draft: Option<Content>,
    updated_at: Option<String>,
    throttle: Timer,
    idle: Timer,
}

impl Selection {
    fn cancel_timers(&mut self) {
        self.throttle.cancel();
        self.idle.cancel();
    }

    fn live_content(&self) -> &Content {
        self.draft.as_ref().unwrap_or(&self.content)
    }
}

/// Session state for one notes root
#[derive(Debug)]
pub struct Session {
    store: DocumentStore,
    autosave: AutosavePolicy,
    tree: Vec<Node>,
    issues: Vec<ScanIssue>,
    selection: Option<Selection>,
    /// Canvas content by leaf id, for the lifetime of the session only
    canvas_cache: HashMap<String, Content>,
}

fn shape_matches(kind: NodeKind, content: &Content) -> bool {
    matches!(
        (kind, content),
        (NodeKind::Note, Content::PlainText(_)) | (NodeKind::Canvas, Content::Structured(_))
    )
}

impl Session {
    /// Ensure the root exists and load the initial tree
    pub async fn open(store: DocumentStore, autosave: AutosavePolicy) -> Result<Self> {
        let snapshot = store.list_tree().await?;
        tracing::info!("Opened notes root {}", store.root().display());
        Ok(Self {
            store,
            autosave,
            tree: snapshot.nodes,
            issues: snapshot.issues,
            selection: None,
            canvas_cache: HashMap::new(),
        })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn tree(&self) -> &[Node] {
        &self.tree
    }

    /// Entries the last scan had to leave out
    pub fn issues(&self) -> &[ScanIssue] {
        &self.issues
    }

    pub fn selected(&self) -> Option<&Node> {
        self.selection.as_ref().map(|s| &s.node)
    }

    /// Content as the editor should show it, including unpropagated edits
    pub fn content(&self) -> Option<&Content> {
        self.selection.as_ref().map(Selection::live_content)
    }

    pub fn state(&self) -> ContentState {
        self.selection
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(ContentState::Idle)
    }

    pub fn updated_at(&self) -> Option<&str> {
        self.selection.as_ref()?.updated_at.as_deref()
    }

    /// Canvas content held in the session cache
    pub fn cached_content(&self, id: &str) -> Option<&Content> {
        self.canvas_cache.get(id)
    }

    /// Tree filtered by title
    pub fn search(&self, term: &str) -> Vec<Node> {
        filter_tree(&self.tree, term)
    }

    /// Earliest armed autosave deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        let selection = self.selection.as_ref()?;
        match (selection.throttle.deadline(), selection.idle.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Rescan and re-resolve the selection by id.
    ///
    /// Paths may have moved under a folder rename, so only the id is trusted.
    /// If the selected id is gone the selection is dropped without saving.
    pub async fn refresh(&mut self) -> Result<()> {
        let snapshot = self.store.list_tree().await?;
        self.tree = snapshot.nodes;
        self.issues = snapshot.issues;

        if let Some(selection) = self.selection.as_mut() {
            match find_by_id(&self.tree, &selection.node.id) {
                Some(node) if node.is_leaf() => {
                    if node.path != selection.node.path {
                        tracing::debug!(
                            "Selection {} moved from {} to {}",
                            node.id,
                            selection.node.path.display(),
                            node.path.display()
                        );
                    }
                    selection.node = node.clone();
                }
                _ => {
                    tracing::info!("Selected node {} no longer exists", selection.node.id);
                    selection.cancel_timers();
                    self.selection = None;
                }
            }
        }

        let live: HashSet<&str> = leaves(&self.tree).into_iter().map(|n| n.id.as_str()).collect();
        self.canvas_cache.retain(|id, _| live.contains(id.as_str()));
        Ok(())
    }

    /// Change the selection.
    ///
    /// Pending edits of the leaf being left are persisted before the new leaf
    /// starts loading. If that save fails the selection does not change.
    pub async fn select(&mut self, id: Option<&str>) -> Result<()> {
        if self.selected().map(|n| n.id.as_str()) == id {
            return Ok(());
        }

        let target = match id {
            Some(id) => {
                let node = find_by_id(&self.tree, id).ok_or_else(|| StoreError::UnknownNode {
                    id: id.to_string(),
                })?;
                if !node.is_leaf() {
                    return Err(StoreError::NotALeaf { id: id.to_string() });
                }
                Some(node.clone())
            }
            None => None,
        };

        self.flush().await?;
        self.deselect();

        let Some(node) = target else {
            return Ok(());
        };
        self.load(node).await
    }

    async fn load(&mut self, node: Node) -> Result<()> {
        tracing::debug!("Loading {} {}", node.kind, node.id);
        self.selection = Some(Selection {
            node: node.clone(),
            state: ContentState::Loading,
            content: Content::empty(node.kind),
            draft: None,
            updated_at: node.updated_at.clone(),
            throttle: Timer::default(),
            idle: Timer::default(),
        });

        let content = match self.canvas_cache.get(&node.id) {
            Some(cached) => {
                tracing::debug!("Canvas {} served from cache", node.id);
                cached.clone()
            }
            None => match self
                .store
                .read_content(&node.path, node.created_at.as_deref())
                .await
            {
                Ok(loaded) => {
                    if node.kind == NodeKind::Canvas {
                        self.canvas_cache
                            .insert(node.id.clone(), loaded.content.clone());
                    }
                    if let Some(selection) = self.selection.as_mut() {
                        selection.updated_at = loaded.updated_at;
                        selection.node.created_at = loaded.created_at;
                    }
                    loaded.content
                }
                Err(e) => {
                    tracing::error!("Failed to load {}: {}", node.path.display(), e);
                    self.selection = None;
                    return Err(e);
                }
            },
        };

        if let Some(selection) = self.selection.as_mut() {
            selection.content = content;
            selection.state = ContentState::Ready;
        }
        Ok(())
    }

    fn deselect(&mut self) {
        if let Some(mut selection) = self.selection.take() {
            selection.cancel_timers();
            tracing::debug!("Deselected {}", selection.node.id);
        }
    }

    /// Record an edit of the selected leaf `id` and arm both autosave timers.
    ///
    /// An edit made against a leaf that is no longer selected is rejected.
    pub fn edit(&mut self, id: &str, content: Content) -> Result<()> {
        let autosave = self.autosave;
        let selection = self.selection.as_mut().ok_or(StoreError::NoSelection)?;
        if selection.node.id != id {
            return Err(StoreError::NotSelected { id: id.to_string() });
        }
        if !shape_matches(selection.node.kind, &content) {
            return Err(StoreError::ContentMismatch {
                kind: selection.node.kind,
            });
        }
        if matches!(selection.state, ContentState::Idle | ContentState::Loading) {
            return Err(StoreError::NoSelection);
        }

        let now = Instant::now();
        selection.draft = Some(content);
        selection.state = ContentState::Dirty;
        selection.throttle.arm_if_idle(now, autosave.throttle);
        selection.idle.rearm(now, autosave.idle_save);
        Ok(())
    }

    /// Move the newest edit into the session content and the canvas cache
    fn propagate(&mut self) {
        let Some(selection) = self.selection.as_mut() else {
            return;
        };
        if let Some(draft) = selection.draft.take() {
            if selection.node.kind == NodeKind::Canvas {
                self.canvas_cache
                    .insert(selection.node.id.clone(), draft.clone());
            }
            selection.content = draft;
        }
    }

    /// Run whichever autosave timers have expired
    pub async fn fire_due_timers(&mut self) -> Result<()> {
        let now = Instant::now();
        let Some(selection) = self.selection.as_mut() else {
            return Ok(());
        };
        let throttle_due = selection.throttle.take_if_due(now);
        let idle_due = selection.idle.take_if_due(now);

        if throttle_due {
            tracing::debug!("Throttle fired for {}", selection.node.id);
            self.propagate();
        }
        if idle_due {
            tracing::debug!("Idle save fired");
            self.save().await?;
        }
        Ok(())
    }

    /// Persist the selected leaf if it has unsaved edits.
    ///
    /// Returns the new `updatedAt`, or `None` when there was nothing to save.
    /// On failure the edits stay in the session and the state stays `Dirty`.
    pub async fn save(&mut self) -> Result<Option<String>> {
        if let Some(selection) = self.selection.as_mut() {
            selection.cancel_timers();
        }
        self.propagate();

        let Some(selection) = self.selection.as_mut() else {
            return Ok(None);
        };
        if selection.state != ContentState::Dirty {
            return Ok(None);
        }

        selection.state = ContentState::Saving;
        let path = selection.node.path.clone();
        match self.store.write_content(&path, selection.content.clone()).await {
            Ok(updated_at) => {
                selection.state = ContentState::Ready;
                selection.updated_at = Some(updated_at.clone());
                selection.node.updated_at = Some(updated_at.clone());
                tracing::info!("Saved {}", selection.node.id);
                Ok(Some(updated_at))
            }
            Err(e) => {
                selection.state = ContentState::Dirty;
                tracing::error!("Failed to save {}: {}", path.display(), e);
                Err(e)
            }
        }
    }

    /// Persist pending edits, if any
    pub async fn flush(&mut self) -> Result<()> {
        self.save().await.map(|_| ())
    }

    fn node(&self, id: &str) -> Result<Node> {
        find_by_id(&self.tree, id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownNode { id: id.to_string() })
    }

    /// Whether a structural change to `node` would remove or move the selection
    fn affects_selection(&self, node: &Node) -> bool {
        self.selected()
            .map(|selected| selected.id == node.id || selected.path.starts_with(&node.path))
            .unwrap_or(false)
    }

    /// Create a leaf, rescan and select it.
    ///
    /// Pending edits are saved before anything is created. Once the record is
    /// on disk the new node is returned even if selecting it fails.
    pub async fn create_leaf(&mut self, parent: &Path, name: &str, kind: NodeKind) -> Result<Node> {
        self.flush().await?;
        let created = self.store.create_leaf(parent, name, kind).await?;

        let selected = match self.refresh().await {
            Ok(()) => self.select(Some(&created.id)).await,
            Err(e) => Err(e),
        };
        if let Err(e) = selected {
            tracing::error!("Created {} but could not select it: {}", created.id, e);
        }
        Ok(self.node(&created.id).unwrap_or(created))
    }

    /// Create a folder and rescan
    pub async fn create_folder(&mut self, parent: &Path, name: &str) -> Result<PathBuf> {
        let path = self.store.create_folder(parent, name).await?;
        self.refresh().await?;
        Ok(path)
    }

    /// Rename a node and rescan.
    ///
    /// Pending edits are saved at the old location first, so a folder move
    /// never races a save of a leaf inside it.
    pub async fn rename(&mut self, id: &str, new_title: &str) -> Result<PathBuf> {
        let node = self.node(id)?;
        self.flush().await?;
        let path = self.store.rename(&node, new_title).await?;
        self.refresh().await?;
        Ok(path)
    }

    /// Delete a node and rescan.
    ///
    /// A selection inside what is deleted is dropped without saving once the
    /// delete succeeds. If it fails the selection and its edits are kept.
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        let node = self.node(id)?;
        let affected = self.affects_selection(&node);
        if !affected {
            self.flush().await?;
        }

        let deleted = self.store.delete(&node.path, node.kind).await;
        if affected && deleted.is_ok() {
            self.deselect();
        }
        self.refresh().await?;
        deleted
    }

    /// Delete several nodes independently and rescan.
    ///
    /// Each id gets its own result; failures do not undo the others. The
    /// selection is dropped only if a delete covering it succeeded.
    pub async fn delete_many(&mut self, ids: &[String]) -> Result<Vec<(String, Result<()>)>> {
        let mut results: Vec<(String, Option<Result<()>>)> = Vec::with_capacity(ids.len());
        let mut targets = Vec::new();
        let mut covers_selection = Vec::new();

        for id in ids {
            match self.node(id) {
                Ok(node) => {
                    covers_selection.push(self.affects_selection(&node));
                    targets.push(node.path);
                    results.push((id.clone(), None));
                }
                Err(e) => results.push((id.clone(), Some(Err(e)))),
            }
        }

        if !covers_selection.contains(&true) {
            self.flush().await?;
        }
        let outcomes = self.store.delete_many(&targets).await;
        let selection_gone = outcomes
            .iter()
            .zip(&covers_selection)
            .any(|(outcome, covers)| *covers && outcome.result.is_ok());
        if selection_gone {
            self.deselect();
        }
        self.refresh().await?;

        let mut outcomes = outcomes.into_iter();
        Ok(results
            .into_iter()
            .map(|(id, result)| {
                let result = result.unwrap_or_else(|| {
                    outcomes
                        .next()
                        .map(|outcome| outcome.result)
                        .unwrap_or(Err(StoreError::UnknownNode { id: id.clone() }))
                });
                (id, result)
            })
            .collect())
    }
}
