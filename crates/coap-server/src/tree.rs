//! Arena-backed resource tree.
//!
//! Nodes live in a map keyed by [`NodeId`]. Branches own a `name -> id`
//! map of their children, and every node records its parent id, which is
//! only followed when pruning after a removal. The root is a nameless
//! branch that is never detached.

use std::collections::HashMap;
use std::sync::Arc;

use crate::resource::LeafResource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

pub enum NodeKind {
    /// Routing only.
    Branch { children: HashMap<String, NodeId> },
    /// Terminates a request path and owns the event listener.
    Leaf(Arc<LeafResource>),
}

pub struct ResourceNode {
    name: String,
    parent: Option<NodeId>,
    kind: NodeKind,
}

impl ResourceNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    pub fn leaf(&self) -> Option<&Arc<LeafResource>> {
        match &self.kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Branch { .. } => None,
        }
    }

    fn children(&self) -> Option<&HashMap<String, NodeId>> {
        match &self.kind {
            NodeKind::Branch { children } => Some(children),
            NodeKind::Leaf(_) => None,
        }
    }
}

pub struct ResourceTree {
    nodes: HashMap<NodeId, ResourceNode>,
    root: NodeId,
    next_id: u64,
}

impl Default for ResourceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTree {
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            ResourceNode {
                name: String::new(),
                parent: None,
                kind: NodeKind::Branch {
                    children: HashMap::new(),
                },
            },
        );
        Self {
            nodes,
            root,
            next_id: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&ResourceNode> {
        self.nodes.get(&id)
    }

    /// Child of a branch by exact name. `None` for leaves, unknown names
    /// and ids no longer in the arena.
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let id = *self.node(parent)?.children()?.get(name)?;
        self.nodes.contains_key(&id).then_some(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(ResourceNode::is_leaf)
    }

    pub fn is_empty_branch(&self, id: NodeId) -> bool {
        self.node(id)
            .and_then(ResourceNode::children)
            .is_some_and(HashMap::is_empty)
    }

    /// Follow `segments` from the root as far as they match. Returns the
    /// deepest matched node and how many segments it consumed.
    pub fn walk<S: AsRef<str>>(&self, segments: &[S]) -> (NodeId, usize) {
        let mut current = self.root;
        let mut depth = 0;
        for segment in segments {
            match self.child(current, segment.as_ref()) {
                Some(next) => {
                    current = next;
                    depth += 1;
                }
                None => break,
            }
        }
        (current, depth)
    }

    /// Resolve `segments` to a node only if every segment matches.
    pub fn find<S: AsRef<str>>(&self, segments: &[S]) -> Option<NodeId> {
        let (id, depth) = self.walk(segments);
        (depth == segments.len()).then_some(id)
    }

    pub fn attach_branch(&mut self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.attach(
            parent,
            name,
            NodeKind::Branch {
                children: HashMap::new(),
            },
        )
    }

    pub fn attach_leaf(&mut self, parent: NodeId, name: &str, leaf: Arc<LeafResource>) -> Option<NodeId> {
        self.attach(parent, name, NodeKind::Leaf(leaf))
    }

    /// Attach a new node under a branch. Fails if `parent` is missing, is a
    /// leaf, or already has a child called `name`.
    fn attach(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> Option<NodeId> {
        let id = NodeId(self.next_id);
        match &mut self.nodes.get_mut(&parent)?.kind {
            NodeKind::Branch { children } if !children.contains_key(name) => {
                children.insert(name.to_string(), id);
            }
            _ => return None,
        }
        self.next_id += 1;
        self.nodes.insert(
            id,
            ResourceNode {
                name: name.to_string(),
                parent: Some(parent),
                kind,
            },
        );
        Some(id)
    }

    /// Remove a leaf or an empty branch and unlink it from its parent.
    /// The root and non-empty branches are never removed.
    pub fn detach(&mut self, id: NodeId) -> Option<ResourceNode> {
        if id == self.root || !(self.is_leaf(id) || self.is_empty_branch(id)) {
            return None;
        }
        let node = self.nodes.remove(&id)?;
        if let Some(parent) = node.parent {
            if let Some(NodeKind::Branch { children }) = self.nodes.get_mut(&parent).map(|p| &mut p.kind) {
                children.remove(&node.name);
            }
        }
        Some(node)
    }

    /// Slash-joined path from the root to `id`.
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = id;
        while current != self.root {
            let node = self.node(current)?;
            names.push(node.name.as_str());
            current = node.parent?;
        }
        names.reverse();
        Some(names.join("/"))
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_leaf()).count()
    }

    /// Sorted list of every non-root node path, leaves suffixed with `*`.
    /// Two trees with the same shape produce the same list.
    pub fn shape(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .nodes
            .iter()
            .filter(|(id, _)| **id != self.root)
            .filter_map(|(id, node)| {
                let path = self.path_of(*id)?;
                Some(if node.is_leaf() { format!("{path}*") } else { path })
            })
            .collect();
        paths.sort();
        paths
    }
}
