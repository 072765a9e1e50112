use crate::models::{EntryKind, FileTreeNode, NodeKind, ProposedChange, RepoEntry};
use log::{debug, warn};

/// Top-level path segments never imported: dependency caches, VCS metadata,
/// build output, coverage artifacts.
pub const IGNORED_PATHS: &[&str] = &[
    "node_modules",
    ".git",
    ".next",
    "dist",
    "build",
    ".cache",
    "coverage",
    ".nyc_output",
];

/// Blobs larger than this are never fetched or displayed.
pub const MAX_FILE_SIZE: u64 = 100_000;

/// What the mutator does when a new file's parent folder does not exist in
/// the tree. The flat fallback mirrors the historical behavior; folder
/// synthesis is available for callers that want a fully nested result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingParentPolicy {
    #[default]
    FlatInsert,
    SynthesizeFolders,
}

pub fn is_ignored(path: &str) -> bool {
    IGNORED_PATHS
        .iter()
        .any(|ignored| path == *ignored || path.starts_with(&format!("{}/", ignored)))
}

/// Builds a forest of nodes from an unordered flat listing. Sorting by full
/// path guarantees every directory entry is materialized before any of its
/// descendants, so the single pass below can attach children directly.
pub fn build_tree(entries: &[RepoEntry]) -> Vec<FileTreeNode> {
    let mut kept: Vec<&RepoEntry> = entries
        .iter()
        .filter(|e| {
            if e.kind == EntryKind::Other || is_ignored(&e.path) {
                return false;
            }
            if e.kind == EntryKind::Blob && e.size.unwrap_or(0) > MAX_FILE_SIZE {
                debug!("Skipping oversized blob: {} ({:?} bytes)", e.path, e.size);
                return false;
            }
            true
        })
        .collect();
    kept.sort_by(|a, b| a.path.cmp(&b.path));

    let mut root: Vec<FileTreeNode> = Vec::new();

    for entry in kept {
        let segments: Vec<&str> = entry.path.split('/').collect();
        let name = segments.last().copied().unwrap_or(entry.path.as_str());
        let node = match entry.kind {
            EntryKind::Tree => FileTreeNode::folder(name, entry.path.clone()),
            _ => FileTreeNode::file(name, entry.path.clone(), None),
        };

        let parent_path = if segments.len() > 1 {
            Some(segments[..segments.len() - 1].join("/"))
        } else {
            None
        };

        let parent_is_folder = parent_path
            .as_deref()
            .map(|p| matches!(find_node(&root, p), Some(n) if n.kind == NodeKind::Folder))
            .unwrap_or(false);

        if parent_is_folder {
            let parent = parent_path.as_deref().unwrap_or_default();
            if let Some(children) = folder_children_mut(&mut root, parent) {
                children.push(node);
            }
        } else {
            // Parent missing or not a folder: attach at the forest root.
            root.push(node);
        }
    }

    root
}

fn folder_children_mut<'a>(
    nodes: &'a mut [FileTreeNode],
    path: &str,
) -> Option<&'a mut Vec<FileTreeNode>> {
    for node in nodes {
        if node.path == path {
            return match node.kind {
                NodeKind::Folder => node.children.as_mut(),
                NodeKind::File => None,
            };
        }
        let is_ancestor =
            node.kind == NodeKind::Folder && path.starts_with(&format!("{}/", node.path));
        if is_ancestor {
            return folder_children_mut(node.children.as_mut()?, path);
        }
    }
    None
}

/// Finds the node carrying `path`, files and folders alike.
pub fn find_node<'a>(forest: &'a [FileTreeNode], path: &str) -> Option<&'a FileTreeNode> {
    for node in forest {
        if node.path == path {
            return Some(node);
        }
        if let Some(children) = &node.children {
            if let Some(found) = find_node(children, path) {
                return Some(found);
            }
        }
    }
    None
}

/// Flattens a forest into `(path, content)` pairs for every File node that
/// has content, in traversal order.
pub fn collect_files(forest: &[FileTreeNode]) -> Vec<(String, String)> {
    let mut files = Vec::new();
    fn walk(nodes: &[FileTreeNode], out: &mut Vec<(String, String)>) {
        for node in nodes {
            if node.kind == NodeKind::File {
                if let Some(content) = &node.content {
                    out.push((node.path.clone(), content.clone()));
                }
            }
            if let Some(children) = &node.children {
                walk(children, out);
            }
        }
    }
    walk(forest, &mut files);
    files
}

/// Applies one accepted change, returning a new forest. Existing File nodes
/// get their content replaced in place; an unknown path becomes a new file.
/// The action tag is informational only; the existence check decides what
/// actually happens, so applying the same change twice is a no-op the second
/// time around.
pub fn apply_change(
    forest: &[FileTreeNode],
    change: &ProposedChange,
    policy: MissingParentPolicy,
) -> Vec<FileTreeNode> {
    match find_node(forest, &change.file_path) {
        Some(node) if node.kind == NodeKind::File => {
            replace_content(forest, &change.file_path, &change.new_content)
        }
        Some(_) => {
            warn!(
                "Change targets '{}' which is a folder; leaving tree untouched",
                change.file_path
            );
            forest.to_vec()
        }
        None => match policy {
            MissingParentPolicy::FlatInsert => {
                let name = change
                    .file_path
                    .rsplit('/')
                    .next()
                    .unwrap_or(change.file_path.as_str());
                let mut updated = forest.to_vec();
                updated.push(FileTreeNode::file(
                    name,
                    change.file_path.clone(),
                    Some(change.new_content.clone()),
                ));
                updated
            }
            MissingParentPolicy::SynthesizeFolders => {
                let mut updated = forest.to_vec();
                insert_nested(&mut updated, &change.file_path, &change.new_content, "");
                updated
            }
        },
    }
}

fn replace_content(forest: &[FileTreeNode], path: &str, content: &str) -> Vec<FileTreeNode> {
    forest
        .iter()
        .map(|node| {
            if node.path == path && node.kind == NodeKind::File {
                let mut updated = node.clone();
                updated.content = Some(content.to_string());
                updated
            } else if let Some(children) = &node.children {
                let mut updated = node.clone();
                updated.children = Some(replace_content(children, path, content));
                updated
            } else {
                node.clone()
            }
        })
        .collect()
}

fn insert_nested(siblings: &mut Vec<FileTreeNode>, full_path: &str, content: &str, prefix: &str) {
    let remainder = &full_path[prefix.len()..];
    match remainder.split_once('/') {
        None => {
            siblings.push(FileTreeNode::file(
                remainder,
                full_path.to_string(),
                Some(content.to_string()),
            ));
        }
        Some((segment, _)) => {
            let folder_path = format!("{}{}", prefix, segment);
            let next_prefix = format!("{}/", folder_path);
            if let Some(folder) = siblings
                .iter_mut()
                .find(|n| n.path == folder_path && n.kind == NodeKind::Folder)
            {
                if let Some(children) = folder.children.as_mut() {
                    insert_nested(children, full_path, content, &next_prefix);
                }
            } else {
                let mut folder = FileTreeNode::folder(segment, folder_path);
                if let Some(children) = folder.children.as_mut() {
                    insert_nested(children, full_path, content, &next_prefix);
                }
                siblings.push(folder);
            }
        }
    }
}
