use crate::error::ApiError;
use crate::models::{FileTreeNode, NodeKind};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, warn};
use std::collections::HashMap;

/// How many content fetches may be in flight at once. Large repositories
/// would otherwise open one connection per file.
pub const MAX_CONCURRENT_FETCHES: usize = 8;

/// Content-fetch capability keyed by repository path.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<String, ApiError>;
}

/// Populates `content` on every File node of the forest, returning new node
/// values. A failed fetch installs an error comment on that node only; the
/// tree stays structurally complete and siblings are unaffected.
pub async fn enrich_forest<F: ContentFetcher + ?Sized>(
    forest: &[FileTreeNode],
    fetcher: &F,
) -> Vec<FileTreeNode> {
    let paths = file_paths(forest);
    debug!(
        "Enriching {} file(s), at most {} fetches in flight",
        paths.len(),
        MAX_CONCURRENT_FETCHES
    );

    let contents: HashMap<String, String> = stream::iter(paths)
        .map(|path| async move {
            let content = match fetcher.fetch(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Failed to fetch content for '{}': {}", path, e);
                    format!("// Error loading file: {}", e)
                }
            };
            (path, content)
        })
        .buffer_unordered(MAX_CONCURRENT_FETCHES)
        .collect()
        .await;

    attach_contents(forest, &contents)
}

fn file_paths(forest: &[FileTreeNode]) -> Vec<String> {
    let mut paths = Vec::new();
    fn walk(nodes: &[FileTreeNode], out: &mut Vec<String>) {
        for node in nodes {
            if node.kind == NodeKind::File {
                out.push(node.path.clone());
            }
            if let Some(children) = &node.children {
                walk(children, out);
            }
        }
    }
    walk(forest, &mut paths);
    paths
}

fn attach_contents(
    forest: &[FileTreeNode],
    contents: &HashMap<String, String>,
) -> Vec<FileTreeNode> {
    forest
        .iter()
        .map(|node| {
            let mut updated = node.clone();
            if node.kind == NodeKind::File {
                if let Some(content) = contents.get(&node.path) {
                    updated.content = Some(content.clone());
                }
            }
            if let Some(children) = &node.children {
                updated.children = Some(attach_contents(children, contents));
            }
            updated
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryKind, RepoEntry};
    use crate::tree::build_tree;
    use pretty_assertions::assert_eq;

    struct MapFetcher(HashMap<String, String>);

    #[async_trait]
    impl ContentFetcher for MapFetcher {
        async fn fetch(&self, path: &str) -> Result<String, ApiError> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| ApiError::LocalIo(format!("no such file: {}", path)))
        }
    }

    fn entries() -> Vec<RepoEntry> {
        vec![
            RepoEntry {
                path: "src".into(),
                kind: EntryKind::Tree,
                size: None,
            },
            RepoEntry {
                path: "src/main.rs".into(),
                kind: EntryKind::Blob,
                size: Some(10),
            },
            RepoEntry {
                path: "src/lib.rs".into(),
                kind: EntryKind::Blob,
                size: Some(10),
            },
            RepoEntry {
                path: "README.md".into(),
                kind: EntryKind::Blob,
                size: Some(10),
            },
        ]
    }

    fn all_paths(forest: &[FileTreeNode]) -> Vec<String> {
        let mut out = Vec::new();
        fn walk(nodes: &[FileTreeNode], out: &mut Vec<String>) {
            for n in nodes {
                out.push(n.path.clone());
                if let Some(c) = &n.children {
                    walk(c, out);
                }
            }
        }
        walk(forest, &mut out);
        out
    }

    #[tokio::test]
    async fn enrichment_preserves_tree_shape() {
        let tree = build_tree(&entries());
        let fetcher = MapFetcher(
            [
                ("src/main.rs".to_string(), "fn main() {}".to_string()),
                ("src/lib.rs".to_string(), "pub mod x;".to_string()),
                ("README.md".to_string(), "# hi".to_string()),
            ]
            .into(),
        );

        let enriched = enrich_forest(&tree, &fetcher).await;

        assert_eq!(all_paths(&enriched), all_paths(&tree));
        let main = crate::tree::find_node(&enriched, "src/main.rs").unwrap();
        assert_eq!(main.content.as_deref(), Some("fn main() {}"));
    }

    #[tokio::test]
    async fn fetch_failure_is_isolated_to_one_node() {
        let tree = build_tree(&entries());
        // lib.rs is missing from the fetcher.
        let fetcher = MapFetcher(
            [
                ("src/main.rs".to_string(), "fn main() {}".to_string()),
                ("README.md".to_string(), "# hi".to_string()),
            ]
            .into(),
        );

        let enriched = enrich_forest(&tree, &fetcher).await;

        let broken = crate::tree::find_node(&enriched, "src/lib.rs").unwrap();
        assert!(broken
            .content
            .as_deref()
            .unwrap()
            .starts_with("// Error loading file:"));
        let sibling = crate::tree::find_node(&enriched, "src/main.rs").unwrap();
        assert_eq!(sibling.content.as_deref(), Some("fn main() {}"));
    }

    #[tokio::test]
    async fn folders_never_gain_content() {
        let tree = build_tree(&entries());
        let fetcher = MapFetcher(HashMap::new());
        let enriched = enrich_forest(&tree, &fetcher).await;
        let folder = crate::tree::find_node(&enriched, "src").unwrap();
        assert!(folder.content.is_none());
    }
}
