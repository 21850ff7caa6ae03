use indexmap::IndexMap;

slotmap::new_key_type! {
    /// Identity of a node within its [super::Document]. Keys are generational, so a
    /// discarded node's id never aliases a node created later.
    pub struct NodeId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    ProcessingInstruction,
    Document,
}

impl NodeKind {
    /// Only elements and the document root can have children.
    pub fn can_have_children(self) -> bool {
        matches!(self, NodeKind::Element | NodeKind::Document)
    }

    pub fn has_content(self) -> bool {
        matches!(self, NodeKind::Text | NodeKind::Comment | NodeKind::ProcessingInstruction)
    }
}

pub type Attributes = IndexMap<String, String>;

#[derive(Debug, Clone)]
pub struct Node {
    pub(super) kind: NodeKind,

    /* elements only */
    pub(super) name: String,
    pub(super) attributes: Attributes,

    /* text, comments, processing instructions */
    pub(super) content: String,

    pub(super) parent: Option<NodeId>,
    pub(super) first_child: Option<NodeId>,
    pub(super) next: Option<NodeId>,
}

impl Node {
    pub(super) fn new(kind: NodeKind) -> Node {
        Node {
            kind,
            name: String::new(),
            attributes: Attributes::new(),
            content: String::new(),
            parent: None,
            first_child: None,
            next: None,
        }
    }

    pub(super) fn element(name: &str) -> Node {
        let mut node = Node::new(NodeKind::Element);
        node.name = name.to_string();
        node
    }

    pub(super) fn with_content(kind: NodeKind, content: &str) -> Node {
        let mut node = Node::new(kind);
        node.content = content.to_string();
        node
    }
}

/// Splits a qualified name like `svg:rect` into its prefix and local part.
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Borrowed view of the parts of a node that determine how it is labelled.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    pub kind: NodeKind,
    pub name: &'a str,
    pub attributes: &'a Attributes,
    pub content: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("svg:rect"), (Some("svg"), "rect"));
        assert_eq!(split_qname("rect"), (None, "rect"));
        assert_eq!(split_qname("inkscape:label"), (Some("inkscape"), "label"));
    }

    #[test]
    fn test_kind_capabilities() {
        assert!(NodeKind::Element.can_have_children());
        assert!(NodeKind::Document.can_have_children());
        assert!(!NodeKind::Text.can_have_children());
        assert!(!NodeKind::Comment.can_have_children());
        assert!(NodeKind::ProcessingInstruction.has_content());
        assert!(!NodeKind::Element.has_content());
    }
}
