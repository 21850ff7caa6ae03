use thiserror::Error;

use crate::model::document::node::NodeId;

/// A notification describing a mutation that was just applied to a document.
///
/// Child notifications are delivered to the observers of the parent, the rest to
/// the observers of the node that changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// `child` was linked under `parent`, immediately after `after` (or first).
    ChildAdded {
        parent: NodeId,
        child: NodeId,
        after: Option<NodeId>,
    },

    /// `child` was unlinked from `parent`. `after` is the sibling it used to follow.
    ChildRemoved {
        parent: NodeId,
        child: NodeId,
        after: Option<NodeId>,
    },

    /// `child` moved among its siblings without changing parent.
    ChildReordered {
        parent: NodeId,
        child: NodeId,
        old_after: Option<NodeId>,
        new_after: Option<NodeId>,
    },

    AttributeChanged {
        node: NodeId,
        key: String,
        old: Option<String>,
        new: Option<String>,
    },

    ContentChanged {
        node: NodeId,
        old: String,
        new: String,
    },

    NameChanged {
        node: NodeId,
        old: String,
        new: String,
    },
}

impl Change {
    /// The node whose observers receive this notification.
    pub fn target(&self) -> NodeId {
        match self {
            Change::ChildAdded { parent, .. } => *parent,
            Change::ChildRemoved { parent, .. } => *parent,
            Change::ChildReordered { parent, .. } => *parent,
            Change::AttributeChanged { node, .. } => *node,
            Change::ContentChanged { node, .. } => *node,
            Change::NameChanged { node, .. } => *node,
        }
    }

    /// Whether this change can alter the shape of the tree (as opposed to only
    /// the contents of a single node).
    pub fn is_structural(&self) -> bool {
        match self {
            Change::ChildAdded { .. } | Change::ChildRemoved { .. } | Change::ChildReordered { .. } => true,
            Change::AttributeChanged { .. } | Change::ContentChanged { .. } | Change::NameChanged { .. } => false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("node {0:?} does not exist")]
    NodeNotFound(NodeId),

    #[error("node {0:?} is already attached to a parent")]
    AlreadyAttached(NodeId),

    #[error("node {0:?} is still attached to a parent")]
    StillAttached(NodeId),

    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("node {0:?} cannot have children")]
    CannotHaveChildren(NodeId),

    #[error("adding {child:?} under {parent:?} would make it its own ancestor")]
    WouldCreateCycle { parent: NodeId, child: NodeId },

    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),

    #[error("node {0:?} has no textual content")]
    NoContent(NodeId),

    #[error("the document root cannot be moved or discarded")]
    DocumentRoot,
}

#[cfg(test)]
mod tests {
    use super::*;

    use slotmap::SlotMap;

    fn ids() -> (NodeId, NodeId) {
        let mut map: SlotMap<NodeId, ()> = SlotMap::with_key();
        (map.insert(()), map.insert(()))
    }

    #[test]
    fn test_child_changes_target_parent() {
        let (parent, child) = ids();

        assert_eq!(Change::ChildAdded { parent, child, after: None }.target(), parent);
        assert_eq!(Change::ChildRemoved { parent, child, after: None }.target(), parent);
        assert_eq!(Change::ChildReordered { parent, child, old_after: None, new_after: None }.target(), parent);
    }

    #[test]
    fn test_content_changes_target_node() {
        let (node, _) = ids();

        assert_eq!(Change::AttributeChanged { node, key: "id".to_string(), old: None, new: Some("a".to_string()) }.target(), node);
        assert_eq!(Change::ContentChanged { node, old: String::new(), new: "x".to_string() }.target(), node);
        assert_eq!(Change::NameChanged { node, old: "svg:g".to_string(), new: "svg:rect".to_string() }.target(), node);
    }

    /* This exists to produce errors if another Change variant gets added without being classified. */
    fn structural_exhaustiveness(change: Change) -> bool {
        match change {
            Change::ChildAdded { .. } => true,
            Change::ChildRemoved { .. } => true,
            Change::ChildReordered { .. } => true,
            Change::AttributeChanged { .. } => false,
            Change::ContentChanged { .. } => false,
            Change::NameChanged { .. } => false,
        }
    }

    #[test]
    fn test_is_structural() {
        let (parent, child) = ids();

        for change in [
            Change::ChildAdded { parent, child, after: None },
            Change::ChildRemoved { parent, child, after: None },
            Change::ChildReordered { parent, child, old_after: None, new_after: Some(parent) },
            Change::NameChanged { node: child, old: String::new(), new: "svg:g".to_string() },
        ] {
            assert_eq!(change.is_structural(), structural_exhaustiveness(change.clone()));
        }
    }
}
