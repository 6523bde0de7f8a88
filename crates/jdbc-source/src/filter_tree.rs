//! Filter hierarchy.
//!
//! FEWS delivers filters as a flat `(id, name, parentid)` list. The tree is
//! kept as an arena of nodes indexed by id; parents are lookup keys and child
//! lists are computed on first access per node. The flat list itself is only
//! fetched when the tree is first traversed.
//!
//! A [`FilterTree`] is a cheap handle: [`FilterTree::root_view`] returns a
//! handle on the same arena whose traversal starts below another node.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::debug;

use fews_common::model::normalize_parent;
use fews_common::{FewsError, FewsResult, FilterNode};

use crate::executor::{cell, QueryDescriptor, QueryExecutor};

/// Nested filter, as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterTreeItem {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FilterTreeItem>,
}

impl FilterTreeItem {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

struct ArenaEntry {
    node: FilterNode,
    children: OnceLock<Vec<usize>>,
}

/// Flat filter list with lazily built child indices.
pub struct FilterArena {
    entries: Vec<ArenaEntry>,
    index: HashMap<String, usize>,
}

impl FilterArena {
    /// Build the arena, dropping exact duplicate rows.
    pub fn new(nodes: Vec<FilterNode>) -> Self {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(nodes.len());
        let mut index = HashMap::new();

        for node in nodes {
            let node = FilterNode {
                parent_id: normalize_parent(node.parent_id.as_deref()),
                ..node
            };
            if !seen.insert(node.clone()) {
                continue;
            }
            index.entry(node.id.clone()).or_insert(entries.len());
            entries.push(ArenaEntry {
                node,
                children: OnceLock::new(),
            });
        }

        Self { entries, index }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&FilterNode> {
        self.index.get(id).map(|&i| &self.entries[i].node)
    }

    fn roots(&self) -> Vec<usize> {
        (0..self.entries.len())
            .filter(|&i| self.entries[i].node.parent_id.is_none())
            .collect()
    }

    /// Indices of the children of `id`, in source order.
    fn children(&self, id: &str) -> &[usize] {
        let Some(&idx) = self.index.get(id) else {
            return &[];
        };
        self.entries[idx].children.get_or_init(|| {
            (0..self.entries.len())
                .filter(|&i| self.entries[i].node.parent_id.as_deref() == Some(id))
                .collect()
        })
    }

    fn nodes(&self, indices: &[usize]) -> Vec<FilterNode> {
        indices.iter().map(|&i| self.entries[i].node.clone()).collect()
    }

    fn build(
        &self,
        idx: usize,
        visited: &mut HashSet<String>,
    ) -> FewsResult<FilterTreeItem> {
        let node = &self.entries[idx].node;
        if !visited.insert(node.id.clone()) {
            return Err(FewsError::MalformedTopology(node.id.clone()));
        }

        let children = self
            .children(&node.id)
            .iter()
            .map(|&child| self.build(child, visited))
            .collect::<FewsResult<Vec<_>>>()?;

        Ok(FilterTreeItem {
            id: node.id.clone(),
            name: node.name.clone(),
            children,
        })
    }
}

enum Topology {
    Executor(Arc<dyn QueryExecutor>),
    Nodes(Vec<FilterNode>),
}

struct LazyArena {
    topology: Topology,
    arena: OnceCell<FilterArena>,
}

impl LazyArena {
    async fn get(&self) -> FewsResult<&FilterArena> {
        self.arena
            .get_or_try_init(|| async {
                let nodes = match &self.topology {
                    Topology::Nodes(nodes) => nodes.clone(),
                    Topology::Executor(executor) => {
                        let rows = executor.execute(&QueryDescriptor::Filters).await?;
                        rows.iter()
                            .filter_map(|row| {
                                let id = cell(row, 0).to_text()?;
                                let name = cell(row, 1).to_text().unwrap_or_else(|| id.clone());
                                let parent = cell(row, 2).to_text();
                                Some(FilterNode::new(id, name, parent.as_deref()))
                            })
                            .collect()
                    }
                };
                let arena = FilterArena::new(nodes);
                debug!(filters = arena.len(), "Loaded filter topology");
                Ok::<_, FewsError>(arena)
            })
            .await
    }
}

/// Handle on a filter hierarchy, optionally rooted below a given node.
#[derive(Clone)]
pub struct FilterTree {
    arena: Arc<LazyArena>,
    root: Option<String>,
}

impl FilterTree {
    /// Tree backed by the executor's `filters` view.
    pub fn from_executor(executor: Arc<dyn QueryExecutor>) -> Self {
        Self::with_topology(Topology::Executor(executor))
    }

    /// Tree backed by a fixed node list.
    pub fn from_nodes(nodes: Vec<FilterNode>) -> Self {
        Self::with_topology(Topology::Nodes(nodes))
    }

    fn with_topology(topology: Topology) -> Self {
        Self {
            arena: Arc::new(LazyArena {
                topology,
                arena: OnceCell::new(),
            }),
            root: None,
        }
    }

    /// A view on the same hierarchy whose traversal starts at `node_id`: its
    /// top level is the children of that node. An unknown id gives an empty
    /// view.
    pub fn root_view(&self, node_id: &str) -> FilterTree {
        FilterTree {
            arena: Arc::clone(&self.arena),
            root: Some(node_id.to_string()),
        }
    }

    pub fn root_id(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Top-level nodes of this view.
    pub async fn roots(&self) -> FewsResult<Vec<FilterNode>> {
        let arena = self.arena.get().await?;
        Ok(match &self.root {
            Some(root) => arena.nodes(arena.children(root)),
            None => arena.nodes(&arena.roots()),
        })
    }

    /// Direct children of `node_id`, in source order.
    pub async fn children_of(&self, node_id: &str) -> FewsResult<Vec<FilterNode>> {
        let arena = self.arena.get().await?;
        Ok(arena.nodes(arena.children(node_id)))
    }

    pub async fn node(&self, node_id: &str) -> FewsResult<Option<FilterNode>> {
        let arena = self.arena.get().await?;
        Ok(arena.get(node_id).cloned())
    }

    /// The full nested hierarchy under this view's top level.
    ///
    /// Fails with `MalformedTopology` when a node is reached twice, which
    /// covers both cycles and nodes listed under several parents.
    pub async fn walk(&self) -> FewsResult<Vec<FilterTreeItem>> {
        let arena = self.arena.get().await?;
        let mut visited = HashSet::new();

        let top = match &self.root {
            Some(root) => {
                if arena.get(root).is_none() {
                    return Ok(Vec::new());
                }
                visited.insert(root.clone());
                arena.children(root).to_vec()
            }
            None => arena.roots(),
        };

        top.into_iter()
            .map(|idx| arena.build(idx, &mut visited))
            .collect()
    }
}
