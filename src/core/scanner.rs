//! Full rebuild of the document tree from the notes root

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::error::{Result, StoreError};
use super::node::{path_id, sort_nodes, Node, NodeKind};
use super::record::Record;
use super::sanitize::UNTITLED;

/// An entry left out of a scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanIssue {
    /// Path relative to the notes root
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a full scan
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub issues: Vec<ScanIssue>,
}

/// Scan `root` on the blocking pool and return the ordered tree
pub async fn scan(root: &Path) -> Result<Snapshot> {
    let owned = root.to_path_buf();
    tokio::task::spawn_blocking(move || scan_blocking(&owned))
        .await
        .map_err(|e| StoreError::Io {
            path: root.to_path_buf(),
            source: std::io::Error::other(e),
        })?
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// Folder being filled while the walk is inside it
struct Frame {
    path: PathBuf,
    children: Vec<Node>,
}

/// Walk `root` and build the tree.
///
/// A record that cannot be read or parsed is reported as an issue and left
/// out; its siblings are still scanned. Entries are visited in file name
/// order, so of two records sharing an id the same one is kept every time.
/// A record whose id is taken by a folder path is left out too.
pub fn scan_blocking(root: &Path) -> Result<Snapshot> {
    if !root.is_dir() {
        return Err(StoreError::NotFound {
            path: root.to_path_buf(),
        });
    }

    let mut frames = vec![Frame {
        path: PathBuf::new(),
        children: Vec::new(),
    }];
    let mut issues = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut folder_ids = HashSet::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| relative(root, p))
                    .unwrap_or_default();
                tracing::warn!("Skipping unreadable entry {}: {}", path.display(), e);
                issues.push(ScanIssue {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        // Walk order is depth first, so leaving a folder shows up as a shallower entry.
        while frames.len() > entry.depth() {
            close_frame(&mut frames);
        }

        let rel = relative(root, entry.path());
        if entry.file_type().is_dir() {
            folder_ids.insert(path_id(&rel));
            frames.push(Frame {
                path: rel,
                children: Vec::new(),
            });
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        let Some((kind, stem)) = NodeKind::classify_file(&name) else {
            tracing::debug!("Ignoring non-record file {}", rel.display());
            continue;
        };

        match read_leaf(entry.path(), &rel, kind, stem) {
            Ok(node) => {
                if !seen_ids.insert(node.id.clone()) {
                    tracing::warn!("Duplicate record id {} at {}", node.id, rel.display());
                    issues.push(ScanIssue {
                        path: rel,
                        reason: format!("duplicate id {}", node.id),
                    });
                    continue;
                }
                if let Some(frame) = frames.last_mut() {
                    frame.children.push(node);
                }
            }
            Err(e) => {
                tracing::warn!("Skipping record {}: {}", rel.display(), e);
                issues.push(ScanIssue {
                    path: rel,
                    reason: e.to_string(),
                });
            }
        }
    }

    while frames.len() > 1 {
        close_frame(&mut frames);
    }
    let mut nodes = frames.pop().map(|f| f.children).unwrap_or_default();
    if !seen_ids.is_disjoint(&folder_ids) {
        drop_leaves_named_like_folders(&mut nodes, &folder_ids, &mut issues);
    }
    sort_nodes(&mut nodes);

    tracing::debug!(
        "Scanned {}: {} top-level nodes, {} issues",
        root.display(),
        nodes.len(),
        issues.len()
    );
    Ok(Snapshot { nodes, issues })
}

fn drop_leaves_named_like_folders(
    nodes: &mut Vec<Node>,
    folder_ids: &HashSet<String>,
    issues: &mut Vec<ScanIssue>,
) {
    nodes.retain(|node| {
        let clash = node.is_leaf() && folder_ids.contains(&node.id);
        if clash {
            tracing::warn!("Record id {} at {} names a folder", node.id, node.path.display());
            issues.push(ScanIssue {
                path: node.path.clone(),
                reason: format!("id {} is used by a folder", node.id),
            });
        }
        !clash
    });
    for node in nodes.iter_mut() {
        drop_leaves_named_like_folders(&mut node.children, folder_ids, issues);
    }
}

fn close_frame(frames: &mut Vec<Frame>) {
    if frames.len() < 2 {
        return;
    }
    if let Some(frame) = frames.pop() {
        let folder = Node::folder(frame.path, frame.children);
        if let Some(parent) = frames.last_mut() {
            parent.children.push(folder);
        }
    }
}

fn relative(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

fn read_leaf(full: &Path, rel: &Path, kind: NodeKind, stem: &str) -> Result<Node> {
    let bytes = std::fs::read(full).map_err(|e| StoreError::io(rel, e))?;
    let record = Record::parse(rel, &bytes)?;

    if record.id != stem {
        tracing::warn!(
            "Record id {} does not match file name {}; using the record id",
            record.id,
            rel.display()
        );
    }
    if let Some(declared) = record.kind {
        if declared != kind {
            tracing::warn!(
                "Record {} declares type {} but is stored as {}",
                rel.display(),
                declared,
                kind
            );
        }
    }

    let title = if record.title.trim().is_empty() {
        UNTITLED.to_string()
    } else {
        record.title
    };

    Ok(Node {
        id: record.id,
        title,
        kind,
        path: rel.to_path_buf(),
        children: Vec::new(),
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_record(dir: &Path, id: &str, title: &str, kind: NodeKind) {
        let body = serde_json::json!({"id": id, "title": title, "type": kind, "content": ""});
        let name = kind.file_name(id).unwrap();
        fs::write(dir.join(name), body.to_string()).unwrap();
    }

    #[test]
    fn test_orders_folders_before_leaves_at_every_level() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_record(root, "b", "NoteB", NodeKind::Note);
        fs::create_dir(root.join("FolderB")).unwrap();
        write_record(root, "a", "NoteA", NodeKind::Note);
        fs::create_dir(root.join("FolderA")).unwrap();
        write_record(&root.join("FolderA"), "z", "zeta", NodeKind::Canvas);
        fs::create_dir(root.join("FolderA").join("Inner")).unwrap();

        let snapshot = scan_blocking(root).unwrap();
        let titles: Vec<_> = snapshot.nodes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["FolderA", "FolderB", "NoteA", "NoteB"]);

        let folder_a = &snapshot.nodes[0];
        assert_eq!(folder_a.id, "FolderA");
        let inner: Vec<_> = folder_a.children.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(inner, ["Inner", "zeta"]);
        assert_eq!(folder_a.children[1].kind, NodeKind::Canvas);
        assert_eq!(folder_a.children[1].path, Path::new("FolderA").join("z.canvas.json"));
        assert_eq!(folder_a.children[0].id, "FolderA/Inner");
    }

    #[test]
    fn test_corrupt_record_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_record(root, "good", "Good", NodeKind::Note);
        fs::write(root.join("bad.json"), "{ nope").unwrap();

        let snapshot = scan_blocking(root).unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.nodes[0].id, "good");
        assert_eq!(snapshot.issues.len(), 1);
        assert_eq!(snapshot.issues[0].path, PathBuf::from("bad.json"));
    }

    #[test]
    fn test_hidden_and_foreign_entries_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join(".trash")).unwrap();
        write_record(&root.join(".trash"), "t", "Trash", NodeKind::Note);
        fs::write(root.join(".x.json.tmp"), "partial").unwrap();
        fs::write(root.join("readme.md"), "# hi").unwrap();

        let snapshot = scan_blocking(root).unwrap();
        assert!(snapshot.nodes.is_empty());
        assert!(snapshot.issues.is_empty());
    }

    #[test]
    fn test_mismatched_id_uses_record_id() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let body = serde_json::json!({"id": "inner", "title": "T", "content": ""});
        fs::write(root.join("outer.json"), body.to_string()).unwrap();

        let snapshot = scan_blocking(root).unwrap();
        assert_eq!(snapshot.nodes[0].id, "inner");
    }

    #[test]
    fn test_duplicate_ids_are_reported() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join("A")).unwrap();
        fs::create_dir(root.join("B")).unwrap();
        write_record(&root.join("A"), "same", "One", NodeKind::Note);
        write_record(&root.join("B"), "same", "Two", NodeKind::Note);

        let snapshot = scan_blocking(root).unwrap();
        let total: usize = snapshot.nodes.iter().map(|n| n.children.len()).sum();
        assert_eq!(total, 1);
        assert_eq!(snapshot.nodes[0].children[0].title, "One");
        assert_eq!(snapshot.issues.len(), 1);
        assert_eq!(snapshot.issues[0].path, Path::new("B").join("same.json"));

        for _ in 0..3 {
            let again = scan_blocking(root).unwrap();
            assert_eq!(again.nodes, snapshot.nodes);
        }
    }

    #[test]
    fn test_record_with_folder_id_is_reported() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join("Work")).unwrap();
        write_record(&root.join("Work"), "inside", "Inside", NodeKind::Note);
        let body = serde_json::json!({"id": "Work", "title": "Impostor", "content": ""});
        fs::write(root.join("a.json"), body.to_string()).unwrap();

        let snapshot = scan_blocking(root).unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert!(snapshot.nodes[0].is_folder());
        assert_eq!(snapshot.nodes[0].children[0].id, "inside");
        assert_eq!(snapshot.issues.len(), 1);
        assert_eq!(snapshot.issues[0].path, PathBuf::from("a.json"));
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = scan_blocking(&tmp.path().join("nope")).unwrap_err();
        assert!(err.is_not_found());
    }
}
