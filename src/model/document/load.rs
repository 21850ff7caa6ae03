use std::path;

use thiserror::Error;
use tracing::instrument;

use crate::model::document::node::Node;
use crate::model::document::node::NodeKind;
use crate::model::document::Document;
use crate::model::document::NodeId;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

/// Namespace URIs we know the conventional prefix for. Names in the document are
/// stored qualified with these prefixes (`svg:rect`, `inkscape:label`).
const PREFIXES: &[(&str, &str)] = &[
    ("http://www.w3.org/2000/svg", "svg"),
    ("http://www.inkscape.org/namespaces/inkscape", "inkscape"),
    ("http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd", "sodipodi"),
    ("http://www.w3.org/1999/xlink", "xlink"),
    ("http://www.w3.org/1999/02/22-rdf-syntax-ns#", "rdf"),
    ("http://creativecommons.org/ns#", "cc"),
    ("http://purl.org/dc/elements/1.1/", "dc"),
    ("http://www.w3.org/XML/1998/namespace", "xml"),
];

fn qualify(source: roxmltree::Node, namespace: Option<&str>, local: &str) -> String {
    let Some(uri) = namespace else {
        return local.to_string();
    };

    let prefix = PREFIXES.iter()
        .find(|(known, _)| *known == uri)
        .map(|(_, prefix)| *prefix)
        .or_else(|| source.lookup_prefix(uri));

    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, local),
        _ => local.to_string(),
    }
}

impl Document {
    #[instrument(skip(xml), fields(len = xml.len()))]
    pub fn load_from_str(xml: &str) -> Result<Document, LoadError> {
        let source = roxmltree::Document::parse(xml)?;
        let mut document = Document::new();
        let root = document.root;

        for child in source.root().children() {
            document.load_node(root, child);
        }

        Ok(document)
    }

    pub fn load_from_path(path: impl AsRef<path::Path>) -> Result<Document, LoadError> {
        let xml = std::fs::read_to_string(path)?;
        Self::load_from_str(&xml)
    }

    fn load_node(&mut self, parent: NodeId, source: roxmltree::Node) {
        let node = match source.node_type() {
            roxmltree::NodeType::Element => {
                let tag = source.tag_name();
                let mut node = Node::element(&qualify(source, tag.namespace(), tag.name()));
                for attribute in source.attributes() {
                    node.attributes.insert(qualify(source, attribute.namespace(), attribute.name()), attribute.value().to_string());
                }
                node
            },
            roxmltree::NodeType::Text => {
                let text = source.text().unwrap_or_default();
                if text.trim().is_empty() {
                    /* indentation between elements */
                    return;
                }
                Node::with_content(NodeKind::Text, text)
            },
            roxmltree::NodeType::Comment => Node::with_content(NodeKind::Comment, source.text().unwrap_or_default()),
            roxmltree::NodeType::PI => {
                let content = match source.pi() {
                    Some(roxmltree::PI { target, value: Some(value) }) => format!("{} {}", target, value),
                    Some(roxmltree::PI { target, value: None }) => target.to_string(),
                    None => String::new(),
                };
                Node::with_content(NodeKind::ProcessingInstruction, &content)
            },
            roxmltree::NodeType::Root => return,
        };

        let id = self.nodes.insert(node);
        let after = self.last_child(parent);
        self.link(parent, id, after);

        for child in source.children() {
            self.load_node(id, child);
        }
    }
}
