//! Terse construction of documents, mostly for tests and demos.
//!
//! ```
//! # use treesync::model::document::Document;
//! let document = Document::builder()
//!     .element("svg:svg", |svg| {
//!         svg.attr("id", "root")
//!             .element("svg:g", |g| { g.id("layer1"); })
//!             .comment("a note");
//!     })
//!     .build();
//!
//! assert!(document.find_by_id("layer1").is_some());
//! ```

use crate::model::document::node::Node;
use crate::model::document::node::NodeKind;
use crate::model::document::Document;
use crate::model::document::NodeId;

pub struct Builder {
    document: Document,
}

pub struct ElementBuilder<'a> {
    document: &'a mut Document,
    node: NodeId,
}

/* Nothing observes a document under construction, so nodes are linked directly
 * without going through the notifying mutators. */
fn append(document: &mut Document, parent: NodeId, node: Node) -> NodeId {
    let child = document.nodes.insert(node);
    let after = document.last_child(parent);
    document.link(parent, child, after);
    child
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            document: Document::new(),
        }
    }

    pub fn element(mut self, name: &str, f: impl FnOnce(&mut ElementBuilder)) -> Builder {
        let root = self.document.root;
        let node = append(&mut self.document, root, Node::element(name));
        f(&mut ElementBuilder { document: &mut self.document, node });
        self
    }

    pub fn comment(mut self, content: &str) -> Builder {
        let root = self.document.root;
        append(&mut self.document, root, Node::with_content(NodeKind::Comment, content));
        self
    }

    pub fn processing_instruction(mut self, content: &str) -> Builder {
        let root = self.document.root;
        append(&mut self.document, root, Node::with_content(NodeKind::ProcessingInstruction, content));
        self
    }

    pub fn build(self) -> Document {
        self.document
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ElementBuilder<'a> {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn attr(&mut self, key: &str, value: &str) -> &mut Self {
        self.document.nodes[self.node].attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn id(&mut self, value: &str) -> &mut Self {
        self.attr("id", value)
    }

    pub fn label(&mut self, value: &str) -> &mut Self {
        self.attr("inkscape:label", value)
    }

    pub fn element(&mut self, name: &str, f: impl FnOnce(&mut ElementBuilder)) -> &mut Self {
        let node = append(self.document, self.node, Node::element(name));
        f(&mut ElementBuilder { document: self.document, node });
        self
    }

    pub fn text(&mut self, content: &str) -> &mut Self {
        append(self.document, self.node, Node::with_content(NodeKind::Text, content));
        self
    }

    pub fn comment(&mut self, content: &str) -> &mut Self {
        append(self.document, self.node, Node::with_content(NodeKind::Comment, content));
        self
    }
}
