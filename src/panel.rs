//! Everything a host needs to show and edit a document as a tree: the document,
//! its mirror, drag-and-drop, selection, and the usual node commands.

use std::cell;
use std::rc;

use thiserror::Error;
use tracing::{event, instrument, Level};

use crate::config::Config;
use crate::drag;
use crate::drag::DragAction;
use crate::drag::DragController;
use crate::drag::DragPayload;
use crate::drag::DragRefusal;
use crate::drag::MovePlan;
use crate::drag::StructuralViolation;
use crate::format::XmlFormatter;
use crate::mirror::TreeMirror;
use crate::model::display::layout::Hit;
use crate::model::display::layout::Point;
use crate::model::display::layout::Position;
use crate::model::display::RowRef;
use crate::model::document::ApplyError;
use crate::model::document::Document;
use crate::model::document::NodeId;
use crate::model::document::NodeKind;
use crate::selection::RenameError;
use crate::selection::RenameState;
use crate::selection::SelectionBridge;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("nothing is selected")]
    NoSelection,

    #[error("finish renaming first")]
    Renaming,

    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),

    #[error("the mirrored root and its ancestors can't be changed this way")]
    MirroredRoot,

    #[error("{0} must stay where it is")]
    Protected(String),

    #[error("node has no previous sibling")]
    NoPreviousSibling,

    #[error("node has no next sibling")]
    NoNextSibling,

    #[error("node is already at the top level")]
    AtTopLevel,

    #[error(transparent)]
    Rename(#[from] RenameError),

    #[error(transparent)]
    Document(#[from] ApplyError),
}

pub struct Panel {
    document: Document,
    mirror: rc::Rc<cell::RefCell<TreeMirror>>,
    drag: DragController,
    selection: SelectionBridge,
    config: rc::Rc<Config>,
}

impl Panel {
    /// Mirrors the document's root element and selects it.
    pub fn new(document: Document, config: Config) -> Panel {
        let config = rc::Rc::new(config);
        let formatter = Box::new(XmlFormatter::new(config.style.clone()));
        let mirror = TreeMirror::build(&document, document.root_element(), formatter);

        let mut panel = Panel {
            drag: DragController::new(config.clone()),
            selection: SelectionBridge::new(config.clone()),
            document,
            mirror,
            config,
        };

        panel.show_root();
        panel
    }

    /// Selects the mirrored root and shows its children.
    fn show_root(&mut self) {
        let root = self.mirror.borrow().root_node();
        if let Some(row) = self.select_node(root, false) {
            if let Err(error) = self.mirror.borrow_mut().model_mut().set_expanded(row, true) {
                event!(Level::WARN, %error, "failed to expand mirrored root");
            }
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Edits made through this are picked up by the mirror like any other.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn mirror(&self) -> cell::Ref<'_, TreeMirror> {
        self.mirror.borrow()
    }

    pub fn mirror_mut(&self) -> cell::RefMut<'_, TreeMirror> {
        self.mirror.borrow_mut()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn drag_mut(&mut self) -> &mut DragController {
        &mut self.drag
    }

    pub fn rename_state(&self) -> &RenameState {
        self.selection.rename_state()
    }

    #[instrument(skip_all)]
    pub fn rebuild(&mut self) {
        self.drag.cancel();
        if let Err(error) = self.selection.cancel(&mut self.document, &self.mirror) {
            event!(Level::WARN, %error, "failed to cancel rename before rebuild");
        }

        let root = self.document.root_element();
        self.mirror.borrow_mut().rebuild(&self.document, root);
        self.show_root();
    }

    /* Selection */

    pub fn select_node(&mut self, node: Option<NodeId>, edit: bool) -> Option<RowRef> {
        self.selection.select_node(&self.document, &mut self.mirror.borrow_mut(), node, edit)
    }

    pub fn selected_node(&self) -> Option<NodeId> {
        self.selection.selected_node(&self.mirror.borrow())
    }

    /* Pointer */

    pub fn hit(&self, point: Point) -> Hit {
        self.drag.layout().hit(self.mirror.borrow().model(), point)
    }

    /// A pointer position over `node`'s row, if the row is visible.
    pub fn point_for(&self, node: NodeId, position: Position) -> Option<Point> {
        let mirror = self.mirror.borrow();
        let row = mirror.row_for(&self.document, node)?;
        self.drag.layout().point_in(mirror.model(), row, position)
    }

    pub fn point_below(&self) -> Point {
        self.drag.layout().point_below(self.mirror.borrow().model())
    }

    pub fn begin_drag(&mut self, point: Point) -> Result<DragPayload, DragRefusal> {
        self.drag.begin(&self.document, &self.mirror.borrow(), point)
    }

    pub fn update_drag(&mut self, point: Point) -> DragAction {
        self.drag.update(&self.document, &self.mirror.borrow(), point)
    }

    /// Drops the dragged node and selects it where it landed.
    pub fn drop(&mut self, point: Point) -> Result<MovePlan, StructuralViolation> {
        let plan = self.drag.drop(&mut self.document, &self.mirror, point)?;

        let moved = match plan {
            MovePlan::Unchanged => None,
            MovePlan::Reorder { child, .. } => Some(child),
            MovePlan::Reparent { child, .. } => Some(child),
        };

        if moved.is_some() {
            self.select_node(moved, false);
        }

        Ok(plan)
    }

    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
    }

    /* Commands */

    fn selected(&self) -> Result<NodeId, CommandError> {
        if *self.selection.rename_state() != RenameState::Idle {
            return Err(CommandError::Renaming);
        }

        self.selected_node().ok_or(CommandError::NoSelection)
    }

    /// The selected node, as long as it's strictly inside the mirrored tree.
    fn selected_below_root(&self) -> Result<(NodeId, NodeId), CommandError> {
        let node = self.selected()?;
        let root = self.mirror.borrow().root_node().ok_or(CommandError::NoSelection)?;

        if self.document.is_ancestor_or_self(node, root) {
            return Err(CommandError::MirroredRoot);
        }

        let parent = self.document.parent(node).ok_or(CommandError::NoSelection)?;
        Ok((node, parent))
    }

    /// Like `selected_below_root`, but also refuses protected top-level nodes,
    /// which the rest of the document keeps pointing at.
    fn selected_mutable(&self) -> Result<(NodeId, NodeId), CommandError> {
        let (node, parent) = self.selected_below_root()?;

        if Some(parent) == self.mirror.borrow().root_node() {
            if let Some(name) = self.document.name(node).filter(|name| self.config.is_protected(name)) {
                event!(Level::DEBUG, ?node, protected = name, "refusing to change protected node");
                return Err(CommandError::Protected(name.to_string()));
            }
        }

        Ok((node, parent))
    }

    fn finish(&mut self, node: NodeId) -> NodeId {
        self.select_node(Some(node), false);
        node
    }

    /// Appends a placeholder to the selected element and starts naming it.
    pub fn new_element_node(&mut self) -> Result<NodeId, CommandError> {
        Ok(self.selection.begin_new_element(&mut self.document, &self.mirror)?)
    }

    pub fn commit_rename(&mut self, text: &str) -> Result<NodeId, CommandError> {
        Ok(self.selection.commit(&mut self.document, &self.mirror, text)?)
    }

    pub fn cancel_rename(&mut self) -> Result<(), CommandError> {
        Ok(self.selection.cancel(&mut self.document, &self.mirror)?)
    }

    /// Appends an empty text node to the selected element.
    pub fn new_text_node(&mut self) -> Result<NodeId, CommandError> {
        let parent = self.selected()?;
        if self.document.kind(parent) != Some(NodeKind::Element) {
            return Err(CommandError::NotAnElement(parent));
        }

        let text = self.document.create_text("");
        if let Err(error) = self.document.append_child(parent, text) {
            self.document.discard(text)?;
            return Err(error.into());
        }

        Ok(self.finish(text))
    }

    /// Inserts a deep copy of the selected node right after it.
    pub fn duplicate_node(&mut self) -> Result<NodeId, CommandError> {
        let (node, parent) = self.selected_mutable()?;

        let copy = self.document.duplicate(node)?;
        if let Err(error) = self.document.add_child(parent, copy, Some(node)) {
            self.document.discard(copy)?;
            return Err(error.into());
        }

        Ok(self.finish(copy))
    }

    /// Deletes the selected node and selects its parent.
    pub fn delete_node(&mut self) -> Result<NodeId, CommandError> {
        let (node, parent) = self.selected_mutable()?;

        self.document.remove_child(parent, node)?;
        self.document.discard(node)?;

        Ok(self.finish(parent))
    }

    /// Swaps the selected node with its previous sibling.
    pub fn raise_node(&mut self) -> Result<NodeId, CommandError> {
        let (node, parent) = self.selected_below_root()?;
        let prev = self.document.prev(node).ok_or(CommandError::NoPreviousSibling)?;

        let after = self.document.prev(prev);
        self.document.change_order(parent, node, after)?;

        Ok(self.finish(node))
    }

    /// Swaps the selected node with its next sibling.
    pub fn lower_node(&mut self) -> Result<NodeId, CommandError> {
        let (node, parent) = self.selected_below_root()?;
        let next = self.document.next(node).ok_or(CommandError::NoNextSibling)?;

        self.document.change_order(parent, node, Some(next))?;

        Ok(self.finish(node))
    }

    /// Moves the selected node to the end of its previous sibling's children.
    pub fn indent_node(&mut self) -> Result<NodeId, CommandError> {
        let (node, parent) = self.selected_mutable()?;
        let prev = self.document.prev(node).ok_or(CommandError::NoPreviousSibling)?;
        if self.document.kind(prev) != Some(NodeKind::Element) {
            return Err(CommandError::NotAnElement(prev));
        }

        let plan = MovePlan::Reparent {
            child: node,
            old_parent: parent,
            old_after: Some(prev),
            new_parent: prev,
            after: self.document.last_child(prev),
        };
        drag::apply_plan(&mut self.document, plan)?;

        Ok(self.finish(node))
    }

    /// Moves the selected node out of its parent, to just after it.
    pub fn unindent_node(&mut self) -> Result<NodeId, CommandError> {
        let (node, parent) = self.selected_below_root()?;
        if Some(parent) == self.mirror.borrow().root_node() {
            return Err(CommandError::AtTopLevel);
        }

        let grandparent = self.document.parent(parent).ok_or(CommandError::AtTopLevel)?;

        let plan = MovePlan::Reparent {
            child: node,
            old_parent: parent,
            old_after: self.document.prev(node),
            new_parent: grandparent,
            after: Some(parent),
        };
        drag::apply_plan(&mut self.document, plan)?;

        Ok(self.finish(node))
    }
}

impl std::fmt::Debug for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Panel")
            .field("document", &self.document)
            .field("selected", &self.selected_node())
            .finish_non_exhaustive()
    }
}
