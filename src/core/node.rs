//! In-memory document tree

use std::cmp::Ordering;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Suffix of canvas record files
pub const CANVAS_SUFFIX: &str = ".canvas.json";
/// Catch-all suffix of note record files
pub const NOTE_SUFFIX: &str = ".json";

/// Kind of a tree element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    Note,
    Canvas,
}

impl NodeKind {
    pub fn is_leaf(self) -> bool {
        !matches!(self, NodeKind::Folder)
    }

    /// File name suffix of a leaf record, `None` for folders
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            NodeKind::Folder => None,
            NodeKind::Note => Some(NOTE_SUFFIX),
            NodeKind::Canvas => Some(CANVAS_SUFFIX),
        }
    }

    /// Record file name for a leaf with the given id
    pub fn file_name(self, id: &str) -> Option<String> {
        self.suffix().map(|suffix| format!("{id}{suffix}"))
    }

    /// Classify a record file name, returning its kind and the id stem.
    ///
    /// The canvas suffix is tested first since the note suffix also matches it.
    pub fn classify_file(name: &str) -> Option<(NodeKind, &str)> {
        if let Some(stem) = name.strip_suffix(CANVAS_SUFFIX) {
            Some((NodeKind::Canvas, stem))
        } else {
            name.strip_suffix(NOTE_SUFFIX)
                .map(|stem| (NodeKind::Note, stem))
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeKind::Folder => "folder",
            NodeKind::Note => "note",
            NodeKind::Canvas => "canvas",
        })
    }
}

/// A folder or leaf in the document tree.
///
/// `path` is relative to the notes root. Folders use their path as id and own
/// their children; leaves never have children.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub title: String,
    pub kind: NodeKind,
    pub path: PathBuf,
    pub children: Vec<Node>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Node {
    /// Create a folder node; its id is derived from the path
    pub fn folder(path: PathBuf, children: Vec<Node>) -> Self {
        let title = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            id: path_id(&path),
            title,
            kind: NodeKind::Folder,
            path,
            children,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }

    /// Relative path of the directory containing this node
    pub fn parent_path(&self) -> PathBuf {
        self.path.parent().map(Path::to_path_buf).unwrap_or_default()
    }

    /// Number of nodes below this one
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }
}

/// Stable id of a relative path, `/`-joined regardless of platform
pub fn path_id(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn compare_nodes(a: &Node, b: &Node) -> Ordering {
    match (a.is_folder(), b.is_folder()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a
            .title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.id.cmp(&b.id)),
    }
}

/// Sort every level: folders first, then case-insensitive by title
pub fn sort_nodes(nodes: &mut [Node]) {
    nodes.sort_by(compare_nodes);
    for node in nodes.iter_mut() {
        sort_nodes(&mut node.children);
    }
}

/// Find a node anywhere in the tree by id
pub fn find_by_id<'a>(nodes: &'a [Node], id: &str) -> Option<&'a Node> {
    for node in nodes {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_by_id(&node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Find a node anywhere in the tree by relative path
pub fn find_by_path<'a>(nodes: &'a [Node], path: &Path) -> Option<&'a Node> {
    for node in nodes {
        if node.path == path {
            return Some(node);
        }
        if path.starts_with(&node.path) {
            if let Some(found) = find_by_path(&node.children, path) {
                return Some(found);
            }
        }
    }
    None
}

/// All leaves in tree order
pub fn leaves(nodes: &[Node]) -> Vec<&Node> {
    let mut out = Vec::new();
    collect_leaves(nodes, &mut out);
    out
}

fn collect_leaves<'a>(nodes: &'a [Node], out: &mut Vec<&'a Node>) {
    for node in nodes {
        if node.is_leaf() {
            out.push(node);
        } else {
            collect_leaves(&node.children, out);
        }
    }
}

/// Filter the tree by a case-insensitive title substring.
///
/// A matching folder keeps all of its children; a folder that does not match
/// is kept only if some descendant matches, and then only with those.
pub fn filter_tree(nodes: &[Node], term: &str) -> Vec<Node> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return nodes.to_vec();
    }
    filter_level(nodes, &term)
}

fn filter_level(nodes: &[Node], term: &str) -> Vec<Node> {
    let mut out = Vec::new();
    for node in nodes {
        let matches = node.title.to_lowercase().contains(term);
        if node.is_folder() {
            if matches {
                out.push(node.clone());
            } else {
                let children = filter_level(&node.children, term);
                if !children.is_empty() {
                    out.push(Node {
                        children,
                        ..node.clone()
                    });
                }
            }
        } else if matches {
            out.push(node.clone());
        }
    }
    out
}
