//! Lazily expanded view of the run's scratch directory.
//!
//! Directories are listed only when the operator expands them or when a
//! reported artifact path shows that an expanded directory is out of date.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum RevealError {
    #[error("{} is outside the scratch directory", .0.display())]
    OutsideRoot(PathBuf),
    #[error("failed to list directory: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub expanded: bool,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn new(path: PathBuf, is_dir: bool) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            path,
            is_dir,
            expanded: false,
            children: Vec::new(),
        }
    }

    fn child(&self, name: &OsStr) -> Option<&TreeNode> {
        self.children
            .iter()
            .find(|c| c.path.file_name() == Some(name))
    }
}

/// A row of the flattened, currently visible tree.
#[derive(Debug, Clone, Copy)]
pub struct VisibleRow<'a> {
    pub depth: usize,
    pub node: &'a TreeNode,
}

/// What the cursor landed on when the operator pressed select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    File(PathBuf),
    Directory { path: PathBuf, expanded: bool },
}

#[derive(Debug)]
pub struct FileTree {
    root: TreeNode,
    cursor: usize,
}

impl FileTree {
    /// Build a tree with the root expanded but not yet listed.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let mut node = TreeNode::new(root.into(), true);
        node.expanded = true;
        Self {
            root: node,
            cursor: 0,
        }
    }

    /// Build a tree with the root expanded and listed.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let mut tree = Self::new(root);
        refresh_children(&mut tree.root)?;
        Ok(tree)
    }

    pub fn root(&self) -> &Path {
        &self.root.path
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Rows in display order, root first.
    pub fn visible(&self) -> Vec<VisibleRow<'_>> {
        let mut rows = Vec::new();
        push_visible(&self.root, 0, &mut rows);
        rows
    }

    pub fn cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_down(&mut self) {
        let last = self.visible().len().saturating_sub(1);
        self.cursor = (self.cursor + 1).min(last);
    }

    /// Activate the row under the cursor.
    ///
    /// Directories toggle; a directory that ends up expanded is re-listed so
    /// it reflects whatever the test run has written since.
    pub fn select(&mut self) -> io::Result<Option<Selection>> {
        let Some(path) = self
            .visible()
            .get(self.cursor)
            .map(|row| row.node.path.clone())
        else {
            return Ok(None);
        };
        let Some(node) = self.node_mut(&path) else {
            return Ok(None);
        };
        if !node.is_dir {
            return Ok(Some(Selection::File(path)));
        }

        node.expanded = !node.expanded;
        let expanded = node.expanded;
        if expanded {
            refresh_children(node)?;
        }
        self.clamp_cursor();
        Ok(Some(Selection::Directory { path, expanded }))
    }

    /// Re-list one loaded directory. Returns false if it is not in the tree.
    pub fn reload(&mut self, dir: &Path) -> io::Result<bool> {
        let Some(node) = self.node_mut(dir) else {
            return Ok(false);
        };
        if !node.is_dir {
            return Ok(false);
        }
        refresh_children(node)?;
        self.clamp_cursor();
        Ok(true)
    }

    /// Make a reported artifact path visible if its directory is on screen.
    ///
    /// Walks from the root through expanded directories only and reloads the
    /// first one whose expected child has not been listed yet. Returns the
    /// reloaded directory, or `None` when the tree is already current or the
    /// walk reached a collapsed directory.
    pub fn reveal(&mut self, path: &Path) -> Result<Option<PathBuf>, RevealError> {
        let parts = self.relative_parts(path)?;
        let target = reload_target(&self.root, &parts);
        if let Some(dir) = &target {
            self.reload(dir)?;
        }
        Ok(target)
    }

    pub fn is_expanded(&self, dir: &Path) -> bool {
        self.node(dir).map(|n| n.expanded).unwrap_or(false)
    }

    /// Whether `path` has been listed into the tree.
    pub fn contains(&self, path: &Path) -> bool {
        self.node(path).is_some()
    }

    fn relative_parts<'p>(&self, path: &'p Path) -> Result<Vec<&'p OsStr>, RevealError> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root.path)
                .map_err(|_| RevealError::OutsideRoot(path.to_path_buf()))?
        } else {
            path
        };

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => parts.push(name),
                Component::CurDir => {}
                _ => return Err(RevealError::OutsideRoot(path.to_path_buf())),
            }
        }
        Ok(parts)
    }

    fn node(&self, path: &Path) -> Option<&TreeNode> {
        let relative = path.strip_prefix(&self.root.path).ok()?;
        let mut node = &self.root;
        for component in relative.components() {
            let Component::Normal(name) = component else {
                return None;
            };
            node = node.child(name)?;
        }
        Some(node)
    }

    fn node_mut(&mut self, path: &Path) -> Option<&mut TreeNode> {
        let relative = path.strip_prefix(&self.root.path).ok()?;
        let mut node = &mut self.root;
        for component in relative.components() {
            let Component::Normal(name) = component else {
                return None;
            };
            node = node
                .children
                .iter_mut()
                .find(|c| c.path.file_name() == Some(name))?;
        }
        Some(node)
    }

    fn clamp_cursor(&mut self) {
        let last = self.visible().len().saturating_sub(1);
        self.cursor = self.cursor.min(last);
    }
}

fn reload_target(node: &TreeNode, parts: &[&OsStr]) -> Option<PathBuf> {
    let (first, rest) = parts.split_first()?;
    if !node.expanded {
        return None;
    }
    match node.child(first) {
        Some(child) => reload_target(child, rest),
        None => Some(node.path.clone()),
    }
}

fn push_visible<'a>(node: &'a TreeNode, depth: usize, rows: &mut Vec<VisibleRow<'a>>) {
    rows.push(VisibleRow { depth, node });
    if node.expanded {
        for child in &node.children {
            push_visible(child, depth + 1, rows);
        }
    }
}

/// Replace a directory's children, keeping the subtrees of children that
/// are still present so their expansion state survives.
fn refresh_children(node: &mut TreeNode) -> io::Result<()> {
    let fresh = match list_dir(&node.path) {
        Ok(fresh) => fresh,
        Err(err) => {
            node.children.clear();
            return Err(err);
        }
    };
    let mut previous = std::mem::take(&mut node.children);
    node.children = fresh
        .into_iter()
        .map(|child| {
            match previous
                .iter()
                .position(|old| old.path == child.path && old.is_dir == child.is_dir)
            {
                Some(index) => previous.swap_remove(index),
                None => child,
            }
        })
        .collect();
    Ok(())
}

/// Directories first, then files, each sorted by name.
fn list_dir(dir: &Path) -> io::Result<Vec<TreeNode>> {
    let mut nodes: Vec<TreeNode> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let path = entry.path();
            let is_dir = path.is_dir();
            TreeNode::new(path, is_dir)
        })
        .collect();
    nodes.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    Ok(nodes)
}
