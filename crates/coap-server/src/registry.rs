//! Registration and removal of adapter endpoints in the shared tree.
//!
//! Every structural change takes the tree-wide write lock for the whole
//! walk-and-mutate, so concurrent adapters never observe or create a
//! half-built path. Request routing only takes the read lock.

use std::sync::Arc;

use coap_protocol::Tenant;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::path::PathResolver;
use crate::resource::LeafResource;
use crate::tree::{NodeKind, ResourceTree};

/// Result of a successful [`EndpointRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    /// A leaf already existed at the path and was kept.
    AlreadyRegistered,
}

/// What a request path resolves to.
#[derive(Debug, Clone)]
pub enum Target {
    Branch(String),
    Leaf(Arc<LeafResource>),
}

#[derive(Default)]
pub struct EndpointRegistry {
    tree: RwLock<ResourceTree>,
    resolver: PathResolver,
}

impl EndpointRegistry {
    pub fn new(resolver: PathResolver) -> Self {
        Self {
            tree: RwLock::new(ResourceTree::new()),
            resolver,
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Add a leaf for `(tenant, adapter_name)`, creating any missing branches.
    pub fn register(
        &self,
        tenant: &Tenant,
        adapter_name: &str,
        leaf: LeafResource,
    ) -> Result<RegisterOutcome, RegistryError> {
        let segments = self.resolver.resolve_for(tenant, adapter_name);
        let path = segments.join("/");
        let mut tree = self.tree.write();

        let (matched, depth) = tree.walk(&segments);
        if depth == segments.len() {
            return if tree.is_leaf(matched) {
                debug!("Endpoint {path} already registered");
                Ok(RegisterOutcome::AlreadyRegistered)
            } else {
                Err(RegistryError::PathConflict {
                    path,
                    reason: "a branch already exists at this path".into(),
                })
            };
        }
        if tree.is_leaf(matched) {
            let at = tree.path_of(matched).unwrap_or_default();
            return Err(RegistryError::PathConflict {
                path,
                reason: format!("endpoint {at} is in the way"),
            });
        }

        let Some((last, middle)) = segments[depth..].split_last() else {
            return Err(RegistryError::PathConflict {
                path,
                reason: "empty path".into(),
            });
        };
        let mut parent = matched;
        for name in middle {
            parent = tree.attach_branch(parent, name).ok_or_else(|| conflict(&path, name))?;
        }
        tree.attach_leaf(parent, last, Arc::new(leaf))
            .ok_or_else(|| conflict(&path, last))?;

        info!("Registered endpoint {path} ({} new nodes)", segments.len() - depth);
        Ok(RegisterOutcome::Created)
    }

    /// Remove the leaf for `(tenant, adapter_name)` and every branch left
    /// empty above it. The root is never removed.
    pub fn unregister(&self, tenant: &Tenant, adapter_name: &str) -> Result<(), RegistryError> {
        self.remove(tenant, adapter_name, None)
    }

    /// Like [`unregister`](Self::unregister), but only removes a leaf that
    /// was registered with [`LeafResource::with_owner`] by `owner`. A leaf
    /// owned by someone else is left in place.
    pub fn unregister_owned(&self, tenant: &Tenant, adapter_name: &str, owner: &str) -> Result<(), RegistryError> {
        self.remove(tenant, adapter_name, Some(owner))
    }

    fn remove(&self, tenant: &Tenant, adapter_name: &str, owner: Option<&str>) -> Result<(), RegistryError> {
        let segments = self.resolver.resolve_for(tenant, adapter_name);
        let path = segments.join("/");
        let mut tree = self.tree.write();

        let leaf = match tree.find(&segments) {
            Some(id) if tree.is_leaf(id) => id,
            _ => {
                warn!("Cannot unregister {path}: resource not found");
                return Err(RegistryError::ResourceNotFound { path });
            }
        };

        if let Some(owner) = owner {
            let held_by = tree.node(leaf).and_then(|n| n.leaf()).and_then(|l| l.owner());
            if held_by != Some(owner) {
                debug!("Not unregistering {path}: owned by {:?}, not {owner}", held_by);
                return Err(RegistryError::NotOwner { path });
            }
        }

        let mut parent = tree.parent(leaf);
        if tree.detach(leaf).is_none() {
            warn!("Cannot unregister {path}: resource not found");
            return Err(RegistryError::ResourceNotFound { path });
        }

        let mut pruned = 0;
        while let Some(id) = parent {
            if id == tree.root() || !tree.is_empty_branch(id) {
                break;
            }
            parent = tree.parent(id);
            if tree.detach(id).is_none() {
                break;
            }
            pruned += 1;
        }

        info!("Unregistered endpoint {path} (pruned {pruned} empty branches)");
        Ok(())
    }

    /// Look up the node at a request path. Clones the leaf handle so the
    /// caller can drop the lock before handling the request.
    pub fn lookup(&self, path: &str) -> Option<Target> {
        let segments = PathResolver::split(path.trim_matches('/'));
        let tree = self.tree.read();
        let id = tree.find(&segments)?;
        let node = tree.node(id)?;
        Some(match node.kind() {
            NodeKind::Leaf(leaf) => Target::Leaf(leaf.clone()),
            NodeKind::Branch { .. } => Target::Branch(node.name().to_string()),
        })
    }

    pub fn contains(&self, tenant: &Tenant, adapter_name: &str) -> bool {
        let segments = self.resolver.resolve_for(tenant, adapter_name);
        let tree = self.tree.read();
        tree.find(&segments).is_some_and(|id| tree.is_leaf(id))
    }

    pub fn leaf_count(&self) -> usize {
        self.tree.read().leaf_count()
    }

    pub fn node_count(&self) -> usize {
        self.tree.read().len()
    }

    /// See [`ResourceTree::shape`].
    pub fn shape(&self) -> Vec<String> {
        self.tree.read().shape()
    }
}

fn conflict(path: &str, segment: &str) -> RegistryError {
    RegistryError::PathConflict {
        path: path.to_string(),
        reason: format!("could not attach segment '{segment}'"),
    }
}
