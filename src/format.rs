//! Turning nodes into row labels.

use std::fmt::Write;

use serde_derive::Deserialize;

use crate::model::document::node::split_qname;
use crate::model::document::NodeKind;
use crate::model::document::NodeView;

/// The two renditions of a row's label: plain text for searching and editing,
/// and Pango-style markup for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Label {
    pub text: String,
    pub markup: String,
}

pub trait Formatter {
    fn format(&self, node: &NodeView) -> Label;

    /// Whether changing the given attribute can change a label. Attribute
    /// notifications for anything else are ignored.
    fn affects_label(&self, key: &str) -> bool;
}

/// Attributes shown inside element labels, in display order.
const LABEL_ATTRIBUTES: &[&str] = &["id", "inkscape:label"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Style {
    pub tag: String,
    pub attribute_name: String,
    pub attribute_value: String,
    pub content: String,
    pub comment: String,
}

impl Default for Style {
    fn default() -> Self {
        Style {
            tag: "#4f6cbf".to_string(),
            attribute_name: "#8c5a14".to_string(),
            attribute_value: "#1f7a3a".to_string(),
            content: "#333333".to_string(),
            comment: "#7a7a7a".to_string(),
        }
    }
}

/// Labels nodes the way they look in XML source: `<rect id="rect1">`, `"text"`,
/// `<!--comment-->`, `<?pi?>`.
#[derive(Debug, Clone, Default)]
pub struct XmlFormatter {
    style: Style,
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn span(markup: &mut String, color: &str, text: &str) {
    let _ = write!(markup, "<span foreground=\"{}\">{}</span>", escape(color), escape(text));
}

impl XmlFormatter {
    pub fn new(style: Style) -> XmlFormatter {
        XmlFormatter { style }
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    fn format_element(&self, node: &NodeView) -> Label {
        /* the svg: prefix is just visual noise */
        let name = match split_qname(node.name) {
            (Some("svg"), local) => local,
            _ => node.name,
        };

        let mut text = format!("<{}", name);
        let mut markup = String::new();
        span(&mut markup, &self.style.tag, &text);

        for key in LABEL_ATTRIBUTES {
            if let Some(value) = node.attributes.get(*key) {
                let _ = write!(text, " {}=\"{}\"", key, value);

                markup.push(' ');
                span(&mut markup, &self.style.attribute_name, key);
                markup.push('=');
                span(&mut markup, &self.style.attribute_value, &format!("\"{}\"", value));
            }
        }

        text.push('>');
        span(&mut markup, &self.style.tag, ">");

        Label { text, markup }
    }

    fn format_content(&self, start: &str, content: &str, end: &str, color: &str) -> Label {
        let text = format!("{}{}{}", start, content, end);
        let mut markup = String::new();
        span(&mut markup, color, &text);
        Label { text, markup }
    }
}

impl Formatter for XmlFormatter {
    fn format(&self, node: &NodeView) -> Label {
        match node.kind {
            NodeKind::Element => self.format_element(node),
            NodeKind::Text => self.format_content("\"", node.content, "\"", &self.style.content),
            NodeKind::Comment => self.format_content("<!--", node.content, "-->", &self.style.comment),
            NodeKind::ProcessingInstruction => self.format_content("<?", node.content, "?>", &self.style.comment),
            NodeKind::Document => Label::default(),
        }
    }

    fn affects_label(&self, key: &str) -> bool {
        LABEL_ATTRIBUTES.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::model::document::Attributes;

    fn view<'a>(kind: NodeKind, name: &'a str, attributes: &'a Attributes, content: &'a str) -> NodeView<'a> {
        NodeView { kind, name, attributes, content }
    }

    #[test]
    fn test_element_text() {
        let formatter = XmlFormatter::default();
        let mut attributes = Attributes::new();

        assert_eq!(formatter.format(&view(NodeKind::Element, "svg:rect", &attributes, "")).text, "<rect>");

        attributes.insert("inkscape:label".to_string(), "Layer 1".to_string());
        attributes.insert("style".to_string(), "fill:red".to_string());
        attributes.insert("id".to_string(), "layer1".to_string());

        assert_eq!(
            formatter.format(&view(NodeKind::Element, "svg:g", &attributes, "")).text,
            "<g id=\"layer1\" inkscape:label=\"Layer 1\">");
        assert_eq!(
            formatter.format(&view(NodeKind::Element, "sodipodi:namedview", &attributes, "")).text,
            "<sodipodi:namedview id=\"layer1\" inkscape:label=\"Layer 1\">");
    }

    #[test]
    fn test_content_text() {
        let formatter = XmlFormatter::default();
        let attributes = Attributes::new();

        assert_eq!(formatter.format(&view(NodeKind::Text, "", &attributes, "hi")).text, "\"hi\"");
        assert_eq!(formatter.format(&view(NodeKind::Comment, "", &attributes, " note ")).text, "<!-- note -->");
        assert_eq!(formatter.format(&view(NodeKind::ProcessingInstruction, "", &attributes, "xml-stylesheet")).text, "<?xml-stylesheet?>");
        assert_eq!(formatter.format(&view(NodeKind::Document, "", &attributes, "")), Label::default());
    }

    #[test]
    fn test_markup_is_escaped() {
        let formatter = XmlFormatter::new(Style {
            tag: "#000001".to_string(),
            ..Style::default()
        });

        let mut attributes = Attributes::new();
        attributes.insert("id".to_string(), "a<b".to_string());

        let label = formatter.format(&view(NodeKind::Element, "svg:g", &attributes, ""));
        assert!(label.markup.starts_with("<span foreground=\"#000001\">&lt;g</span>"));
        assert!(label.markup.contains("&quot;a&lt;b&quot;"));
        assert!(label.markup.ends_with("<span foreground=\"#000001\">&gt;</span>"));
        assert!(!label.markup.contains("<b"));
    }

    #[test]
    fn test_affects_label() {
        let formatter = XmlFormatter::default();

        assert!(formatter.affects_label("id"));
        assert!(formatter.affects_label("inkscape:label"));
        assert!(!formatter.affects_label("style"));
        assert!(!formatter.affects_label("inkscape::label"));
    }
}
