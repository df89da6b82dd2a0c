// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory node tree and navigator.
//!
//! The tree is an arena of node records addressed by stable [`NodeKey`]s,
//! rooted at the Objects folder. Children are populated lazily by an
//! explicit, idempotent [`expand`] operation: a node's children are filled
//! at most once, and re-expansion returns the existing child keys without a
//! network round trip.
//!
//! [`resolve_and_expand`] restores a previously viewed node from its
//! serialized identity: depth-first over Object-class entries, expanding
//! unexpanded ancestors one browse call at a time, in server order.

use tracing::{debug, warn};

use crate::browse::{self, NodeDescriptor};
use crate::error::BrowseError;
use crate::transport::UaTransport;
use crate::types::{NodeClass, NodeId};

/// Stable key of one tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey(usize);

/// One arena record.
#[derive(Debug, Clone)]
struct TreeEntry {
    descriptor: NodeDescriptor,
    expanded: bool,
    children: Vec<NodeKey>,
}

/// Lazily filled tree over the server's hierarchical address space.
#[derive(Debug)]
pub struct NodeTree {
    entries: Vec<TreeEntry>,
}

impl NodeTree {
    /// Creates a tree holding only the Objects-folder root.
    pub fn new() -> Self {
        let root = TreeEntry {
            descriptor: NodeDescriptor {
                display_name: "Objects".to_string(),
                node_id: NodeId::objects_folder(),
                node_class: NodeClass::Object,
                data_type: None,
            },
            expanded: false,
            children: Vec::new(),
        };
        Self { entries: vec![root] }
    }

    /// The root key.
    pub fn root(&self) -> NodeKey {
        NodeKey(0)
    }

    /// Descriptor of an entry.
    pub fn descriptor(&self, key: NodeKey) -> Option<&NodeDescriptor> {
        self.entries.get(key.0).map(|e| &e.descriptor)
    }

    /// Child keys of an entry; empty until expanded.
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.entries
            .get(key.0)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    /// Returns `true` once an entry's children have been populated.
    pub fn is_expanded(&self, key: NodeKey) -> bool {
        self.entries.get(key.0).is_some_and(|e| e.expanded)
    }

    /// Number of entries in the arena.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree holds only the root.
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 1
    }

    /// Records an expansion: inserts the children and marks the entry
    /// expanded. Idempotent: an already-expanded entry keeps its existing
    /// children and the new descriptors are ignored.
    pub fn populate(&mut self, key: NodeKey, descriptors: Vec<NodeDescriptor>) -> Vec<NodeKey> {
        if self.entries.get(key.0).is_none() {
            return Vec::new();
        }
        if self.entries[key.0].expanded {
            return self.entries[key.0].children.clone();
        }

        let mut keys = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let child = NodeKey(self.entries.len());
            self.entries.push(TreeEntry { descriptor, expanded: false, children: Vec::new() });
            keys.push(child);
        }
        self.entries[key.0].children = keys.clone();
        self.entries[key.0].expanded = true;
        keys
    }
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Expands one entry through the browser.
///
/// Already-expanded entries return their existing children without a
/// browse call.
pub async fn expand<T: UaTransport + ?Sized>(
    tree: &mut NodeTree,
    transport: &T,
    key: NodeKey,
) -> Result<Vec<NodeKey>, BrowseError> {
    if tree.is_expanded(key) {
        return Ok(tree.children(key).to_vec());
    }
    let Some(descriptor) = tree.descriptor(key) else {
        return Ok(Vec::new());
    };
    let node_id = descriptor.node_id.clone();
    let children = browse::browse_children(transport, &node_id).await?;
    debug!(node = %node_id, children = children.len(), "expanded tree entry");
    Ok(tree.populate(key, children))
}

/// Locates `target` in the tree, expanding unexpanded Object ancestors on
/// demand.
///
/// The root's own identity answers immediately with zero browse calls.
/// Otherwise traversal is depth-first in server order: expand, scan the
/// children for an exact identity match, then descend into Object-class
/// children. Variables are never descended into. Returns `None` when the
/// reachable tree is exhausted or a browse call fails.
pub async fn resolve_and_expand<T: UaTransport + ?Sized>(
    tree: &mut NodeTree,
    transport: &T,
    target: &NodeId,
) -> Option<NodeKey> {
    let root = tree.root();
    if tree.descriptor(root)?.node_id == *target {
        return Some(root);
    }

    let mut stack = vec![root];
    while let Some(key) = stack.pop() {
        let children = match expand(tree, transport, key).await {
            Ok(children) => children,
            Err(e) => {
                warn!(target = %target, error = %e, "navigation browse failed");
                return None;
            }
        };

        for &child in &children {
            if tree.descriptor(child)?.node_id == *target {
                return Some(child);
            }
        }
        // Depth-first in server order: reversed push so the first child is
        // visited first.
        for &child in children.iter().rev() {
            if tree.descriptor(child)?.node_class == NodeClass::Object {
                stack.push(child);
            }
        }
    }

    None
}
