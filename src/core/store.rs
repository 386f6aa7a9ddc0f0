//! Structural and content operations against the notes root

use std::path::{Component, Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use super::error::{Result, StoreError};
use super::node::{path_id, Node, NodeKind};
use super::record::{decode, encode, Content, Record};
use super::sanitize::{sanitize_name, validate_segment, NEW_FOLDER, UNTITLED};
use super::scanner::{self, Snapshot};

/// Content of a leaf as seen by the session
#[derive(Debug, Clone, PartialEq)]
pub struct LeafContent {
    pub id: String,
    pub title: String,
    pub kind: NodeKind,
    pub content: Content,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Per-item result of [`DocumentStore::delete_many`]
#[derive(Debug)]
pub struct DeleteOutcome {
    pub path: PathBuf,
    pub result: Result<()>,
}

/// Document store rooted at a directory on disk.
///
/// Every path taken or returned is relative to the root. The store keeps no
/// state besides the root, so clones can run operations on disjoint paths
/// concurrently.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

/// Current time as stored in records
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Normalize a caller supplied relative path.
///
/// `.` and the empty path both name the root. Absolute paths and `..`
/// components are rejected.
pub fn normalize(rel: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => {
                return Err(StoreError::InvalidPath {
                    path: rel.to_path_buf(),
                })
            }
        }
    }
    Ok(out)
}

fn leaf_kind(rel: &Path) -> Result<NodeKind> {
    rel.file_name()
        .and_then(|name| name.to_str())
        .and_then(NodeKind::classify_file)
        .map(|(kind, _)| kind)
        .ok_or_else(|| StoreError::NotALeaf { id: path_id(rel) })
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a relative path, after normalization
    pub fn resolve(&self, rel: &Path) -> Result<PathBuf> {
        Ok(self.root.join(normalize(rel)?))
    }

    /// Create the root directory if it does not exist yet
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::Io {
                path: self.root.clone(),
                source: e,
            })
    }

    /// Full scan of the root
    pub async fn list_tree(&self) -> Result<Snapshot> {
        self.ensure_root().await?;
        scanner::scan(&self.root).await
    }

    /// Create a note or canvas under `parent` with a fresh id and empty content
    pub async fn create_leaf(&self, parent: &Path, name: &str, kind: NodeKind) -> Result<Node> {
        if !kind.is_leaf() {
            return Err(StoreError::NotALeaf {
                id: name.to_string(),
            });
        }
        let title = sanitize_name(name, UNTITLED);
        validate_segment(&title)?;

        let parent = normalize(parent)?;
        let dir = self.root.join(&parent);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&parent, e))?;

        let id = Uuid::new_v4().to_string();
        let file_name = kind
            .file_name(&id)
            .ok_or_else(|| StoreError::NotALeaf { id: id.clone() })?;
        let rel = parent.join(file_name);

        let record = Record::new(id, title, kind, timestamp())?;
        self.write_record(&rel, &record).await?;
        tracing::info!("Created {} {} at {}", kind, record.id, rel.display());

        Ok(Node {
            id: record.id,
            title: record.title,
            kind,
            path: rel,
            children: Vec::new(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Create a folder (and any missing parents) under `parent`.
    ///
    /// Creating a folder that already exists succeeds.
    pub async fn create_folder(&self, parent: &Path, name: &str) -> Result<PathBuf> {
        let name = sanitize_name(name, NEW_FOLDER);
        validate_segment(&name)?;

        let rel = normalize(parent)?.join(&name);
        tokio::fs::create_dir_all(self.root.join(&rel))
            .await
            .map_err(|e| StoreError::io(&rel, e))?;
        tracing::info!("Created folder {}", rel.display());
        Ok(rel)
    }

    /// Rename a node and return its path afterwards.
    ///
    /// A folder is moved on disk, which changes the path of every descendant;
    /// callers must rescan to see them. A leaf only has the title in its
    /// record rewritten and keeps its path.
    pub async fn rename(&self, node: &Node, new_title: &str) -> Result<PathBuf> {
        let src = normalize(&node.path)?;

        if node.is_leaf() {
            let title = sanitize_name(new_title, UNTITLED);
            validate_segment(&title)?;
            let mut record = self.load_record(&src).await?;
            if record.title == title {
                return Ok(src);
            }
            record.title = title;
            self.write_record(&src, &record).await?;
            tracing::info!("Renamed {} {} to {:?}", node.kind, record.id, record.title);
            return Ok(src);
        }

        let name = sanitize_name(new_title, NEW_FOLDER);
        validate_segment(&name)?;
        if src.as_os_str().is_empty() {
            return Err(StoreError::InvalidPath { path: src });
        }

        let dest = src.with_file_name(&name);
        if dest == src {
            return Ok(src);
        }

        let from = self.root.join(&src);
        let to = self.root.join(&dest);
        let exists = tokio::fs::try_exists(&to)
            .await
            .map_err(|e| StoreError::io(&dest, e))?;
        // `to` is the source itself on a case-insensitive file system.
        let case_only = path_id(&dest).to_lowercase() == path_id(&src).to_lowercase();
        if exists && (!case_only || self.has_entry_named(&dest).await?) {
            return Err(StoreError::AlreadyExists { path: dest });
        }

        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| StoreError::io(&src, e))?;
        tracing::info!("Moved folder {} to {}", src.display(), dest.display());
        Ok(dest)
    }

    /// Delete a folder with its whole subtree, or a single leaf record
    pub async fn delete(&self, path: &Path, kind: NodeKind) -> Result<()> {
        let rel = normalize(path)?;
        if rel.as_os_str().is_empty() {
            return Err(StoreError::InvalidPath { path: rel });
        }
        let full = self.root.join(&rel);

        let removed = match kind {
            NodeKind::Folder => tokio::fs::remove_dir_all(&full).await,
            _ => tokio::fs::remove_file(&full).await,
        };
        removed.map_err(|e| StoreError::io(&rel, e))?;
        tracing::info!("Deleted {} {}", kind, rel.display());
        Ok(())
    }

    /// Delete each path independently.
    ///
    /// There is no rollback: items that failed stay on disk while the others
    /// are gone. The kind of each entry is taken from the file system.
    pub async fn delete_many(&self, paths: &[PathBuf]) -> Vec<DeleteOutcome> {
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            let result = match self.kind_on_disk(path).await {
                Ok(kind) => self.delete(path, kind).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                tracing::error!("Failed to delete {}: {}", path.display(), e);
            }
            outcomes.push(DeleteOutcome {
                path: path.clone(),
                result,
            });
        }
        outcomes
    }

    /// Whether the parent of `rel` lists an entry with exactly its name
    async fn has_entry_named(&self, rel: &Path) -> Result<bool> {
        let (Some(parent), Some(name)) = (rel.parent(), rel.file_name()) else {
            return Ok(false);
        };
        let mut entries = tokio::fs::read_dir(self.root.join(parent))
            .await
            .map_err(|e| StoreError::io(parent, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(parent, e))?
        {
            if entry.file_name() == name {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn kind_on_disk(&self, path: &Path) -> Result<NodeKind> {
        let rel = normalize(path)?;
        let meta = tokio::fs::symlink_metadata(self.root.join(&rel))
            .await
            .map_err(|e| StoreError::io(&rel, e))?;
        if meta.is_dir() {
            Ok(NodeKind::Folder)
        } else {
            leaf_kind(&rel)
        }
    }

    /// Load and decode a leaf.
    ///
    /// `createdAt` comes from the record, then from a value embedded in a
    /// structured snapshot, then from `known_created_at`.
    pub async fn read_content(
        &self,
        path: &Path,
        known_created_at: Option<&str>,
    ) -> Result<LeafContent> {
        let rel = normalize(path)?;
        let kind = leaf_kind(&rel)?;
        let record = self.load_record(&rel).await?;
        let content = decode(&record.content, kind);

        let created_at = record
            .created_at
            .clone()
            .or_else(|| content.embedded_created_at())
            .or_else(|| known_created_at.map(str::to_string));

        Ok(LeafContent {
            id: record.id,
            title: record.title,
            kind,
            content,
            created_at,
            updated_at: record.updated_at,
        })
    }

    /// Replace the content of a leaf and return the new `updatedAt`.
    ///
    /// Everything else in the record is kept as it was on disk.
    pub async fn write_content(&self, path: &Path, content: Content) -> Result<String> {
        let rel = normalize(path)?;
        let kind = leaf_kind(&rel)?;
        let mut record = self.load_record(&rel).await?;

        record.content = encode(content, kind)?;
        record.kind = Some(kind);
        let updated_at = timestamp();
        record.updated_at = Some(updated_at.clone());

        self.write_record(&rel, &record).await?;
        tracing::debug!("Saved content of {} ({})", record.id, rel.display());
        Ok(updated_at)
    }

    async fn load_record(&self, rel: &Path) -> Result<Record> {
        let bytes = tokio::fs::read(self.root.join(rel))
            .await
            .map_err(|e| StoreError::io(rel, e))?;
        Record::parse(rel, &bytes)
    }

    /// Write through a hidden sibling and rename it over the record
    async fn write_record(&self, rel: &Path, record: &Record) -> Result<()> {
        let bytes = record.to_bytes(rel)?;
        let full = self.root.join(rel);
        let file_name = full
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| StoreError::InvalidPath {
                path: rel.to_path_buf(),
            })?;
        let tmp = full.with_file_name(format!(".{file_name}.tmp"));

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::io(rel, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &full).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::io(rel, e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, DocumentStore) {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::new(tmp.path().join("Notes"));
        (tmp, store)
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new(".")).unwrap(), PathBuf::new());
        assert_eq!(normalize(Path::new("./a/b")).unwrap(), PathBuf::from("a/b"));
        assert!(normalize(Path::new("../x")).is_err());
        assert!(normalize(Path::new("/etc")).is_err());
    }

    #[tokio::test]
    async fn test_ensure_root_is_idempotent() {
        let (_tmp, store) = store();
        store.ensure_root().await.unwrap();
        store.ensure_root().await.unwrap();
        assert!(store.root().is_dir());
    }

    #[tokio::test]
    async fn test_create_leaf_writes_empty_record() {
        let (_tmp, store) = store();
        let note = store
            .create_leaf(Path::new("Inbox"), "Todo/../x", NodeKind::Note)
            .await
            .unwrap();
        assert_eq!(note.title, "Todo..x");
        assert_eq!(note.path, Path::new("Inbox").join(format!("{}.json", note.id)));

        let loaded = store.read_content(&note.path, None).await.unwrap();
        assert_eq!(loaded.id, note.id);
        assert_eq!(loaded.content, Content::PlainText(String::new()));
        assert!(loaded.created_at.is_some());

        let canvas = store
            .create_leaf(Path::new("."), "", NodeKind::Canvas)
            .await
            .unwrap();
        assert_eq!(canvas.title, UNTITLED);
        let loaded = store.read_content(&canvas.path, None).await.unwrap();
        assert_eq!(loaded.content, Content::Structured(json!({})));
    }

    #[tokio::test]
    async fn test_create_leaf_rejects_folder_kind() {
        let (_tmp, store) = store();
        let err = store
            .create_leaf(Path::new(""), "x", NodeKind::Folder)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotALeaf { .. }));
    }

    #[tokio::test]
    async fn test_create_folder_is_idempotent() {
        let (_tmp, store) = store();
        let first = store.create_folder(Path::new("a/b"), "Work").await.unwrap();
        let second = store.create_folder(Path::new("a/b"), "Work").await.unwrap();
        assert_eq!(first, second);
        assert!(store.root().join("a/b/Work").is_dir());
    }

    #[tokio::test]
    async fn test_write_then_read_structured_has_no_extra_encoding() {
        let (_tmp, store) = store();
        let canvas = store
            .create_leaf(Path::new(""), "Sketch", NodeKind::Canvas)
            .await
            .unwrap();
        let snapshot = json!({"store": {"shape:1": {"text": "quote \" inside"}}});

        for _ in 0..3 {
            let read = store.read_content(&canvas.path, None).await.unwrap();
            let value = if read.content == Content::Structured(json!({})) {
                snapshot.clone()
            } else {
                read.content.as_structured().cloned().unwrap()
            };
            store
                .write_content(&canvas.path, Content::Structured(value))
                .await
                .unwrap();
        }

        let read = store.read_content(&canvas.path, None).await.unwrap();
        assert_eq!(read.content, Content::Structured(snapshot));

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.root().join(&canvas.path)).unwrap())
                .unwrap();
        assert!(raw["content"].is_object());
    }

    #[tokio::test]
    async fn test_write_content_preserves_metadata() {
        let (_tmp, store) = store();
        let note = store
            .create_leaf(Path::new(""), "Keep", NodeKind::Note)
            .await
            .unwrap();
        let updated_at = store
            .write_content(&note.path, Content::PlainText("body".into()))
            .await
            .unwrap();

        let read = store.read_content(&note.path, None).await.unwrap();
        assert_eq!(read.title, "Keep");
        assert_eq!(read.id, note.id);
        assert_eq!(read.created_at, note.created_at);
        assert_eq!(read.updated_at.as_deref(), Some(updated_at.as_str()));
    }

    #[tokio::test]
    async fn test_write_content_errors_are_values() {
        let (_tmp, store) = store();
        store.ensure_root().await.unwrap();
        let err = store
            .write_content(Path::new("ghost.json"), Content::PlainText("x".into()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let note = store
            .create_leaf(Path::new(""), "n", NodeKind::Note)
            .await
            .unwrap();
        let err = store
            .write_content(&note.path, Content::Structured(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ContentMismatch { .. }));
    }

    #[tokio::test]
    async fn test_read_content_created_at_fallbacks() {
        let (_tmp, store) = store();
        store.ensure_root().await.unwrap();
        let body = json!({"id": "c1", "title": "Old", "content": {"createdAt": "2020-01-01T00:00:00Z"}});
        std::fs::write(store.root().join("c1.canvas.json"), body.to_string()).unwrap();
        let read = store
            .read_content(Path::new("c1.canvas.json"), Some("1999"))
            .await
            .unwrap();
        assert_eq!(read.created_at.as_deref(), Some("2020-01-01T00:00:00Z"));

        let body = json!({"id": "n1", "title": "Old", "content": "x"});
        std::fs::write(store.root().join("n1.json"), body.to_string()).unwrap();
        let read = store
            .read_content(Path::new("n1.json"), Some("1999"))
            .await
            .unwrap();
        assert_eq!(read.created_at.as_deref(), Some("1999"));
    }

    #[tokio::test]
    async fn test_read_content_reports_malformed_record() {
        let (_tmp, store) = store();
        store.ensure_root().await.unwrap();
        std::fs::write(store.root().join("bad.json"), "{").unwrap();
        let err = store
            .read_content(Path::new("bad.json"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MalformedRecord { .. }));
    }

    #[tokio::test]
    async fn test_rename_leaf_updates_title_in_place() {
        let (_tmp, store) = store();
        let note = store
            .create_leaf(Path::new(""), "Old", NodeKind::Note)
            .await
            .unwrap();
        store
            .write_content(&note.path, Content::PlainText("kept".into()))
            .await
            .unwrap();

        let path = store.rename(&note, "New: name").await.unwrap();
        assert_eq!(path, note.path);
        let read = store.read_content(&path, None).await.unwrap();
        assert_eq!(read.title, "New name");
        assert_eq!(read.content, Content::PlainText("kept".into()));
    }

    #[tokio::test]
    async fn test_rename_folder_moves_directory() {
        let (_tmp, store) = store();
        let work = store.create_folder(Path::new(""), "Work").await.unwrap();
        store
            .create_leaf(&work, "Todo", NodeKind::Note)
            .await
            .unwrap();
        let folder = Node::folder(work.clone(), Vec::new());

        let dest = store.rename(&folder, "Projects").await.unwrap();
        assert_eq!(dest, PathBuf::from("Projects"));
        assert!(!store.root().join("Work").exists());
        assert!(store.root().join("Projects").is_dir());

        let same = store.rename(&Node::folder(dest.clone(), Vec::new()), "Projects").await.unwrap();
        assert_eq!(same, dest);
    }

    #[tokio::test]
    async fn test_rename_folder_refuses_to_clobber() {
        let (_tmp, store) = store();
        let a = store.create_folder(Path::new(""), "A").await.unwrap();
        store.create_folder(Path::new(""), "B").await.unwrap();
        let err = store
            .rename(&Node::folder(a, Vec::new()), "B")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_case_only_rename_keeps_distinct_sibling() {
        let (_tmp, store) = store();
        let work = store.create_folder(Path::new(""), "Work").await.unwrap();
        // Only a case-sensitive file system can hold both.
        if std::fs::create_dir(store.root().join("work")).is_err() {
            return;
        }

        let err = store
            .rename(&Node::folder(work, Vec::new()), "work")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert!(store.root().join("Work").is_dir());
        assert!(store.root().join("work").is_dir());
    }

    #[tokio::test]
    async fn test_case_only_rename_without_sibling() {
        let (_tmp, store) = store();
        let work = store.create_folder(Path::new(""), "Work").await.unwrap();

        let dest = store
            .rename(&Node::folder(work, Vec::new()), "work")
            .await
            .unwrap();
        assert_eq!(dest, PathBuf::from("work"));
        assert!(store.has_entry_named(&dest).await.unwrap());
        assert!(!store.has_entry_named(Path::new("Work")).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_reports_missing_targets() {
        let (_tmp, store) = store();
        store.ensure_root().await.unwrap();
        let err = store
            .delete(Path::new("nope.json"), NodeKind::Note)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.delete(Path::new(""), NodeKind::Folder).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_many_reports_partial_failure() {
        let (_tmp, store) = store();
        let folder = store.create_folder(Path::new(""), "F").await.unwrap();
        let inner = store.create_leaf(&folder, "i", NodeKind::Note).await.unwrap();
        let note = store.create_leaf(Path::new(""), "n", NodeKind::Note).await.unwrap();

        let outcomes = store
            .delete_many(&[folder.clone(), PathBuf::from("missing.json"), note.path.clone()])
            .await;
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_err());
        assert!(outcomes[2].result.is_ok());
        assert!(!store.root().join(&inner.path).exists());
        assert!(!store.root().join(&note.path).exists());
    }
}
