//! Inline renaming of elements, and creating new elements by typing their name
//! into a placeholder row.

use std::cell;
use std::mem;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{event, Level};

use crate::mirror::TreeMirror;
use crate::model::display::DisplayError;
use crate::model::display::RowRef;
use crate::model::document::ApplyError;
use crate::model::document::Document;
use crate::model::document::NodeId;
use crate::model::document::NodeKind;
use crate::selection::SelectionBridge;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameState {
    Idle,
    Editing {
        row: RowRef,
        node: NodeId,

        /// The node is a nameless stand-in that only exists until the edit ends.
        placeholder: bool,
    },
}

#[derive(Error, Debug)]
pub enum RenameError {
    #[error("not renaming anything")]
    NotEditing,

    #[error("already renaming a node")]
    AlreadyEditing,

    #[error("nothing is selected")]
    NoSelection,

    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),

    #[error("{0:?} is not a valid element name")]
    InvalidName(String),

    #[error("node {0:?} is not in the tree")]
    Untracked(NodeId),

    #[error(transparent)]
    Document(#[from] ApplyError),

    #[error(transparent)]
    Display(#[from] DisplayError),
}

/* accepts a bit of leftover markup, so "<rect x=..." still gives "rect" */
static TAG_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<?\s*(\w[\w:\-\d]*)").unwrap());

/// Pulls an element name out of what the user typed.
pub fn parse_tag_name(text: &str) -> Result<&str, RenameError> {
    TAG_NAME.captures(text.trim())
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str())
        .ok_or_else(|| RenameError::InvalidName(text.to_string()))
}

impl SelectionBridge {
    pub(super) fn enter_editing(&mut self, mirror: &mut TreeMirror, row: RowRef, node: NodeId, placeholder: bool) -> Result<(), RenameError> {
        if self.rename != RenameState::Idle {
            return Err(RenameError::AlreadyEditing);
        }

        mirror.model_mut().set_editing(Some(row))?;
        self.rename = RenameState::Editing { row, node, placeholder };
        Ok(())
    }

    /// Appends a placeholder element to the selected element and starts editing
    /// its name. Returns the placeholder.
    pub fn begin_new_element(&mut self, document: &mut Document, mirror: &cell::RefCell<TreeMirror>) -> Result<NodeId, RenameError> {
        if self.rename != RenameState::Idle {
            return Err(RenameError::AlreadyEditing);
        }

        let parent = self.selected_node(&mirror.borrow()).ok_or(RenameError::NoSelection)?;
        if document.kind(parent) != Some(NodeKind::Element) {
            return Err(RenameError::NotAnElement(parent));
        }

        let placeholder = document.create_element("");
        if let Err(error) = document.append_child(parent, placeholder) {
            document.discard(placeholder)?;
            return Err(error.into());
        }

        let mut mirror = mirror.borrow_mut();
        let row = self.select_node(document, &mut mirror, Some(placeholder), false)
            .ok_or(RenameError::Untracked(placeholder))?;
        self.enter_editing(&mut mirror, row, placeholder, true)?;

        Ok(placeholder)
    }

    /// Ends the edit with the given text. A placeholder is swapped for a new
    /// element with the parsed name at the same position; an existing element
    /// is renamed. The edit is over even if this fails.
    pub fn commit(&mut self, document: &mut Document, mirror: &cell::RefCell<TreeMirror>, text: &str) -> Result<NodeId, RenameError> {
        let RenameState::Editing { node, placeholder, .. } = mem::replace(&mut self.rename, RenameState::Idle) else {
            return Err(RenameError::NotEditing);
        };

        mirror.borrow_mut().model_mut().set_editing(None)?;
        let name = parse_tag_name(text).map(|name| self.config.qualify(name));

        let renamed = if placeholder {
            let parent = document.parent(node);
            let after = document.prev(node);
            Self::remove_placeholder(document, node)?;

            let parent = parent.ok_or(RenameError::Untracked(node))?;
            let element = document.create_element(&name?);
            if let Err(error) = document.add_child(parent, element, after) {
                document.discard(element)?;
                return Err(error.into());
            }
            element
        } else {
            document.set_name(node, &name?)?;
            node
        };

        event!(Level::DEBUG, ?renamed, "committed element name");
        self.select_node(document, &mut mirror.borrow_mut(), Some(renamed), false);
        Ok(renamed)
    }

    /// Abandons the edit. A placeholder is removed again and its parent selected.
    pub fn cancel(&mut self, document: &mut Document, mirror: &cell::RefCell<TreeMirror>) -> Result<(), RenameError> {
        let RenameState::Editing { node, placeholder, .. } = mem::replace(&mut self.rename, RenameState::Idle) else {
            return Ok(());
        };

        mirror.borrow_mut().model_mut().set_editing(None)?;

        if placeholder {
            let parent = document.parent(node);
            Self::remove_placeholder(document, node)?;
            self.select_node(document, &mut mirror.borrow_mut(), parent, false);
        }

        Ok(())
    }

    fn remove_placeholder(document: &mut Document, node: NodeId) -> Result<(), ApplyError> {
        if !document.contains(node) {
            return Ok(());
        }

        if let Some(parent) = document.parent(node) {
            document.remove_child(parent, node)?;
        }

        document.discard(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::rc;

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use crate::config::Config;
    use crate::format::XmlFormatter;
    use crate::mirror::invariants::assert_mirrors;

    #[test]
    fn test_parse_tag_name() {
        assert_eq!(parse_tag_name("rect").unwrap(), "rect");
        assert_eq!(parse_tag_name("  <svg:circle r=\"4\"/>").unwrap(), "svg:circle");
        assert_eq!(parse_tag_name("<inkscape:path-effect").unwrap(), "inkscape:path-effect");
        assert_eq!(parse_tag_name("h2o").unwrap(), "h2o");
        assert_matches!(parse_tag_name(""), Err(RenameError::InvalidName(_)));
        assert_matches!(parse_tag_name("   "), Err(RenameError::InvalidName(_)));
        assert_matches!(parse_tag_name("-foo"), Err(RenameError::InvalidName(_)));
    }

    struct Fixture {
        doc: Document,
        mirror: rc::Rc<cell::RefCell<TreeMirror>>,
        bridge: SelectionBridge,
        layer: NodeId,
    }

    fn setup() -> Fixture {
        let doc = Document::builder()
            .element("svg:svg", |svg| {
                svg.id("svg1").element("svg:g", |g| {
                    g.id("layer1").element("svg:rect", |r| { r.id("A"); }).element("svg:rect", |r| { r.id("B"); });
                });
            })
            .build();

        let mirror = TreeMirror::build(&doc, doc.root_element(), Box::new(XmlFormatter::default()));
        let mut bridge = SelectionBridge::new(rc::Rc::new(Config::default()));
        let layer = doc.find_by_id("layer1").unwrap();
        bridge.select_node(&doc, &mut mirror.borrow_mut(), Some(layer), false);

        Fixture { doc, mirror, bridge, layer }
    }

    fn names(doc: &Document, parent: NodeId) -> Vec<String> {
        doc.children(parent).map(|n| doc.name(n).unwrap().to_string()).collect()
    }

    #[test]
    fn test_new_element_commit() {
        let mut f = setup();

        let placeholder = f.bridge.begin_new_element(&mut f.doc, &f.mirror).unwrap();
        assert_eq!(names(&f.doc, f.layer), vec!["svg:rect", "svg:rect", ""]);
        assert_matches!(f.bridge.rename_state(), RenameState::Editing { placeholder: true, .. });
        assert_eq!(f.bridge.selected_node(&f.mirror.borrow()), Some(placeholder));
        assert_mirrors(&f.doc, &f.mirror.borrow());

        let element = f.bridge.commit(&mut f.doc, &f.mirror, " circle ").unwrap();
        assert_eq!(names(&f.doc, f.layer), vec!["svg:rect", "svg:rect", "svg:circle"]);
        assert_eq!(f.doc.last_child(f.layer), Some(element));
        assert!(!f.doc.contains(placeholder));
        assert_eq!(*f.bridge.rename_state(), RenameState::Idle);
        assert_eq!(f.bridge.selected_node(&f.mirror.borrow()), Some(element));
        assert_eq!(f.mirror.borrow().model().editing(), None);
        assert_mirrors(&f.doc, &f.mirror.borrow());
    }

    #[test]
    fn test_new_element_keeps_given_prefix() {
        let mut f = setup();

        f.bridge.begin_new_element(&mut f.doc, &f.mirror).unwrap();
        let element = f.bridge.commit(&mut f.doc, &f.mirror, "<sodipodi:guide").unwrap();
        assert_eq!(f.doc.name(element), Some("sodipodi:guide"));
    }

    #[test]
    fn test_new_element_cancel() {
        let mut f = setup();
        let before = names(&f.doc, f.layer);

        let placeholder = f.bridge.begin_new_element(&mut f.doc, &f.mirror).unwrap();
        assert_matches!(f.bridge.begin_new_element(&mut f.doc, &f.mirror), Err(RenameError::AlreadyEditing));

        f.bridge.cancel(&mut f.doc, &f.mirror).unwrap();
        assert_eq!(names(&f.doc, f.layer), before);
        assert!(!f.doc.contains(placeholder));
        assert_eq!(f.bridge.selected_node(&f.mirror.borrow()), Some(f.layer));
        assert_mirrors(&f.doc, &f.mirror.borrow());

        /* cancelling twice is harmless */
        f.bridge.cancel(&mut f.doc, &f.mirror).unwrap();
    }

    #[test]
    fn test_new_element_invalid_name_removes_placeholder() {
        let mut f = setup();

        f.bridge.begin_new_element(&mut f.doc, &f.mirror).unwrap();
        assert_matches!(f.bridge.commit(&mut f.doc, &f.mirror, "  "), Err(RenameError::InvalidName(_)));
        assert_eq!(names(&f.doc, f.layer), vec!["svg:rect", "svg:rect"]);
        assert_eq!(*f.bridge.rename_state(), RenameState::Idle);
        assert_mirrors(&f.doc, &f.mirror.borrow());
    }

    #[test]
    fn test_rename_existing() {
        let mut f = setup();
        let a = f.doc.find_by_id("A").unwrap();

        f.bridge.select_node(&f.doc, &mut f.mirror.borrow_mut(), Some(a), true).unwrap();
        let renamed = f.bridge.commit(&mut f.doc, &f.mirror, "ellipse").unwrap();

        assert_eq!(renamed, a);
        assert_eq!(f.doc.name(a), Some("svg:ellipse"));
        let row = f.mirror.borrow().row_for(&f.doc, a).unwrap();
        assert_eq!(f.mirror.borrow().model().get(row).unwrap().text(), "<ellipse id=\"A\">");
        assert_mirrors(&f.doc, &f.mirror.borrow());
    }

    #[test]
    fn test_commit_without_edit() {
        let mut f = setup();
        assert_matches!(f.bridge.commit(&mut f.doc, &f.mirror, "rect"), Err(RenameError::NotEditing));
    }

    #[test]
    fn test_new_element_needs_element_selection() {
        let mut f = setup();

        f.bridge.select_node(&f.doc, &mut f.mirror.borrow_mut(), None, false);
        assert_matches!(f.bridge.begin_new_element(&mut f.doc, &f.mirror), Err(RenameError::NoSelection));
        assert_eq!(names(&f.doc, f.layer), vec!["svg:rect", "svg:rect"]);
    }
}
