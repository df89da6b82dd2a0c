// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node browser: one-level traversal of hierarchical references.
//!
//! Browsing is scoped to forward hierarchical references and the Object
//! and Variable node classes, one level per call, preserving server
//! ordering. For Variable children the declared data type is resolved to a
//! display name; that resolution is best-effort per child and leaves the
//! field unset on failure rather than aborting the browse.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::BrowseError;
use crate::transport::UaTransport;
use crate::types::{NodeClass, NodeId, UaDataType};

/// Immutable snapshot of one browsed node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Human-readable display name.
    pub display_name: String,
    /// Node identity.
    pub node_id: NodeId,
    /// Node class.
    pub node_class: NodeClass,
    /// Resolved data-type display name; Variables only, and only when
    /// resolution succeeded.
    pub data_type: Option<String>,
}

impl NodeDescriptor {
    /// Returns `true` if the node is a container that can be expanded.
    pub fn is_expandable(&self) -> bool {
        self.node_class == NodeClass::Object
    }

    /// Returns `true` if the node holds a readable value.
    pub fn has_value(&self) -> bool {
        self.node_class == NodeClass::Variable
    }
}

/// Browses one level of children below `node`.
///
/// Returns descriptors in server order. Fails only when the browse call
/// itself fails; per-child data-type resolution failures degrade to an
/// unset `data_type`.
pub async fn browse_children<T: UaTransport + ?Sized>(
    transport: &T,
    node: &NodeId,
) -> Result<Vec<NodeDescriptor>, BrowseError> {
    let references = transport
        .browse(node, NodeClass::BROWSE_MASK)
        .await
        .map_err(|e| BrowseError::server_failure(node.to_opc_string(), e.to_string()))?;

    debug!(node = %node, children = references.len(), "browsed");

    let mut descriptors = Vec::with_capacity(references.len());
    for reference in references {
        let data_type = if reference.node_class == NodeClass::Variable {
            resolve_data_type_name(transport, &reference.node_id).await
        } else {
            None
        };
        descriptors.push(NodeDescriptor {
            display_name: reference.display_name,
            node_id: reference.node_id,
            node_class: reference.node_class,
            data_type,
        });
    }
    Ok(descriptors)
}

/// Resolves a Variable's declared data type to a display name.
///
/// Reads the DataType attribute, then the type node's DisplayName; a
/// namespace-0 built-in id answers without the second round trip when the
/// display-name read fails.
async fn resolve_data_type_name<T: UaTransport + ?Sized>(
    transport: &T,
    node: &NodeId,
) -> Option<String> {
    let type_node = match transport.read_data_type(node).await {
        Ok(id) => id,
        Err(e) => {
            trace!(node = %node, error = %e, "data type read failed");
            return None;
        }
    };

    match transport.read_display_name(&type_node).await {
        Ok(name) => Some(name),
        Err(_) => builtin_data_type(&type_node).map(|dt| dt.name().to_string()),
    }
}

/// Maps a namespace-0 numeric data-type node to the built-in type.
pub fn builtin_data_type(type_node: &NodeId) -> Option<UaDataType> {
    match (&type_node.identifier, type_node.namespace) {
        (crate::types::NodeIdentifier::Numeric(id), 0) => UaDataType::from_type_id(*id),
        _ => None,
    }
}
