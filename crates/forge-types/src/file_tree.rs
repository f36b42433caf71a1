//! Flat and hierarchical views of a generated project's files

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Flat mapping from a slash-delimited relative path to UTF-8 file content.
///
/// Paths are case-sensitive, unique and never start with `/`. Iteration is in
/// lexicographic path order, which keeps everything derived from a tree
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FileTree(BTreeMap<String, String>);

impl FileTree {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Normalize a path into the tree's canonical form.
    ///
    /// Backslashes become slashes, leading `./` and `/` are stripped and empty
    /// segments are dropped. Returns `None` for paths that end up empty and
    /// for paths with a `..` segment, which could leave the project root.
    pub fn normalize_path(path: &str) -> Option<String> {
        let path = path.replace('\\', "/");
        let segments: Vec<&str> = path
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        if segments.is_empty() || segments.contains(&"..") {
            None
        } else {
            Some(segments.join("/"))
        }
    }

    /// Insert a file, replacing any previous content at the same path.
    ///
    /// Returns the previous content. Paths rejected by
    /// [`FileTree::normalize_path`] are ignored.
    pub fn insert(&mut self, path: impl AsRef<str>, content: impl Into<String>) -> Option<String> {
        let path = Self::normalize_path(path.as_ref())?;
        self.0.insert(path, content.into())
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(|s| s.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.0.remove(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Paths in lexicographic order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Total size of all file contents in bytes
    pub fn total_bytes(&self) -> usize {
        self.0.values().map(|v| v.len()).sum()
    }

    /// Paths that exist as a file while also being used as a directory by
    /// another path (`src` next to `src/main.ts`).
    pub fn conflicts(&self) -> Vec<String> {
        let mut conflicts = Vec::new();
        for path in self.0.keys() {
            let mut prefix_end = 0;
            while let Some(offset) = path[prefix_end..].find('/') {
                let prefix = &path[..prefix_end + offset];
                if self.0.contains_key(prefix) && !conflicts.iter().any(|c| c == prefix) {
                    conflicts.push(prefix.to_string());
                }
                prefix_end += offset + 1;
            }
        }
        conflicts
    }
}

impl FromIterator<(String, String)> for FileTree {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut tree = FileTree::new();
        for (path, content) in iter {
            tree.insert(path, content);
        }
        tree
    }
}

// Keys from the wire go through the same normalization as `insert`
impl<'de> Deserialize<'de> for FileTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let files = BTreeMap::<String, String>::deserialize(deserializer)?;
        Ok(files.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a FileTree {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for FileTree {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Node kind in the hierarchical view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// Hierarchical view of a [`FileTree`] for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    /// Full path from the project root
    pub path: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl TreeNode {
    pub fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Directory,
            children: Vec::new(),
            content: None,
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::File,
            children: Vec::new(),
            content: Some(content.into()),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Number of files at or below this node
    pub fn file_count(&self) -> usize {
        match self.kind {
            NodeKind::File => 1,
            NodeKind::Directory => self.children.iter().map(|c| c.file_count()).sum(),
        }
    }
}

/// Nested directory representation handed to a sandbox runtime's mount
/// primitive. Serializes as `{"file": {"contents": ...}}` or
/// `{"directory": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountNode {
    File { contents: String },
    Directory(MountTree),
}

/// One directory level of a mount tree
pub type MountTree = BTreeMap<String, MountNode>;
