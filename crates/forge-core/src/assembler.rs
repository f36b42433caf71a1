//! File-tree assembly
//!
//! Merges scaffold output with generator output, builds the hierarchical view
//! shown to users and the nested form a sandbox runtime mounts. Also moves
//! trees to and from disk.

use crate::error::{ForgeError, Result};
use async_trait::async_trait;
use forge_types::{FileTree, MountNode, MountTree, TreeNode};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Directories never loaded from disk
pub const IGNORED_DIRS: &[&str] = &["node_modules", ".git", "dist", ".next"];

/// Merge generator output over scaffold output.
///
/// Generator content wins on every path present in both.
pub fn merge(scaffold: &FileTree, generated: &FileTree) -> FileTree {
    let mut merged = scaffold.clone();
    for (path, content) in generated {
        if merged.insert(path, content.clone()).is_some() {
            debug!("Generated file overrides scaffold: {}", path);
        }
    }
    merged
}

/// Build the hierarchical view of a tree
pub fn build_tree(tree: &FileTree) -> TreeNode {
    build_tree_from(tree.iter().map(|(p, c)| (p.to_string(), c.to_string())))
}

/// Build the hierarchical view from paths in any order.
///
/// Paths are sorted before insertion so every parent directory exists
/// before its children are attached. Children are listed directories first,
/// then by name.
pub fn build_tree_from<I>(files: I) -> TreeNode
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut files: Vec<(String, String)> = files
        .into_iter()
        .filter_map(|(path, content)| FileTree::normalize_path(&path).map(|p| (p, content)))
        .collect();
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut root = TreeNode::directory("", "");
    for (path, content) in files {
        let segments: Vec<&str> = path.split('/').collect();
        let mut node = &mut root;
        for (depth, segment) in segments.iter().enumerate() {
            let node_path = segments[..=depth].join("/");
            if depth + 1 == segments.len() {
                node.children.push(TreeNode::file(*segment, node_path, content.clone()));
                break;
            }
            let index = match node
                .children
                .iter()
                .position(|c| c.is_dir() && c.name == *segment)
            {
                Some(index) => index,
                None => {
                    node.children.push(TreeNode::directory(*segment, node_path));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[index];
        }
    }

    sort_children(&mut root);
    root
}

fn sort_children(node: &mut TreeNode) {
    node.children
        .sort_by(|a, b| b.is_dir().cmp(&a.is_dir()).then_with(|| a.name.cmp(&b.name)));
    for child in &mut node.children {
        sort_children(child);
    }
}

/// Convert a flat tree into the nested form used by sandbox mounts
pub fn to_mount_tree(tree: &FileTree) -> Result<MountTree> {
    let conflicts = tree.conflicts();
    if !conflicts.is_empty() {
        return Err(ForgeError::InvalidFileTree(format!(
            "paths used as both file and directory: {}",
            conflicts.join(", ")
        )));
    }

    let mut root = MountTree::new();
    for (path, content) in tree.iter() {
        let segments: Vec<&str> = path.split('/').collect();
        let (file_name, dirs) = match segments.split_last() {
            Some(split) => split,
            None => continue,
        };

        let mut level = &mut root;
        for dir in dirs {
            let entry = level
                .entry(dir.to_string())
                .or_insert_with(|| MountNode::Directory(MountTree::new()));
            level = match entry {
                MountNode::Directory(children) => children,
                MountNode::File { .. } => {
                    return Err(ForgeError::InvalidFileTree(format!(
                        "{} is a file but {} needs it as a directory",
                        dir, path
                    )))
                }
            };
        }
        level.insert(
            file_name.to_string(),
            MountNode::File {
                contents: content.to_string(),
            },
        );
    }

    Ok(root)
}

/// Resolve a tree path under `root`, refusing anything that escapes it
fn resolve_under(root: &Path, path: &str) -> Result<PathBuf> {
    let relative = Path::new(path);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(ForgeError::InvalidFileTree(format!(
            "path escapes project root: {}",
            path
        )));
    }
    Ok(root.join(relative))
}

/// Disk import and export for file trees
#[async_trait]
pub trait FileTreeExt: Sized {
    /// Write every file under `dir`, creating directories as needed.
    /// Returns the number of files written.
    async fn write_to(&self, dir: &Path) -> Result<usize>;

    /// Load a project directory, skipping dependency and build folders
    async fn read_from(dir: &Path) -> Result<Self>;
}

#[async_trait]
impl FileTreeExt for FileTree {
    async fn write_to(&self, dir: &Path) -> Result<usize> {
        let conflicts = self.conflicts();
        if !conflicts.is_empty() {
            return Err(ForgeError::InvalidFileTree(format!(
                "paths used as both file and directory: {}",
                conflicts.join(", ")
            )));
        }

        let mut written = 0;
        for (path, content) in self.iter() {
            let target = resolve_under(dir, path)?;
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, content).await?;
            written += 1;
        }

        debug!("Wrote {} files to {}", written, dir.display());
        Ok(written)
    }

    async fn read_from(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(ForgeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a directory: {}", dir.display()),
            )));
        }

        let mut tree = FileTree::new();
        let mut pending = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                let name = entry.file_name().to_string_lossy().to_string();

                if file_type.is_dir() {
                    if !IGNORED_DIRS.contains(&name.as_str()) {
                        pending.push(path);
                    }
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }

                let relative = match path.strip_prefix(dir) {
                    Ok(relative) => relative.to_string_lossy().to_string(),
                    Err(_) => continue,
                };

                match tokio::fs::read_to_string(&path).await {
                    Ok(content) => {
                        tree.insert(relative, content);
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                        warn!("Skipping non-UTF-8 file {}", path.display());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Ok(tree)
    }
}
