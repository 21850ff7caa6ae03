//! Connects the display model's selection to document nodes.

pub mod rename;

use std::rc;

use tracing::{event, Level};

use crate::config::Config;
use crate::mirror::TreeMirror;
use crate::model::display::DisplayError;
use crate::model::display::RowRef;
use crate::model::document::Document;
use crate::model::document::NodeId;
use crate::model::document::NodeKind;

pub use rename::RenameError;
pub use rename::RenameState;

pub struct SelectionBridge {
    rename: RenameState,
    config: rc::Rc<Config>,
}

impl SelectionBridge {
    pub fn new(config: rc::Rc<Config>) -> SelectionBridge {
        SelectionBridge {
            rename: RenameState::Idle,
            config,
        }
    }

    pub fn rename_state(&self) -> &RenameState {
        &self.rename
    }

    /// Selects the row for `node`, expanding its ancestors and scrolling to it.
    /// With `edit`, also starts renaming it in place (elements only). `None`
    /// clears the selection. Returns the selected row.
    pub fn select_node(&mut self, document: &Document, mirror: &mut TreeMirror, node: Option<NodeId>, edit: bool) -> Option<RowRef> {
        let Some(node) = node else {
            if let Err(error) = mirror.model_mut().select(None) {
                event!(Level::WARN, %error, "failed to clear selection");
            }
            return None;
        };

        let Some(row) = mirror.row_for(document, node) else {
            event!(Level::DEBUG, ?node, "not selecting node that isn't in the tree");
            return None;
        };

        if let Err(error) = Self::reveal(mirror, row) {
            event!(Level::WARN, %error, ?node, "failed to select row");
            return None;
        }

        if edit {
            if document.kind(node) != Some(NodeKind::Element) {
                event!(Level::DEBUG, ?node, "only elements can be renamed");
            } else if let Err(error) = self.enter_editing(mirror, row, node, false) {
                event!(Level::DEBUG, %error, ?node, "not renaming");
            }
        }

        Some(row)
    }

    fn reveal(mirror: &mut TreeMirror, row: RowRef) -> Result<(), DisplayError> {
        let model = mirror.model_mut();
        model.expand_to(row)?;
        model.scroll_to(row)?;
        model.select(Some(row))
    }

    pub fn selected_node(&self, mirror: &TreeMirror) -> Option<NodeId> {
        mirror.model().selected().and_then(|row| mirror.node_for(row))
    }
}
