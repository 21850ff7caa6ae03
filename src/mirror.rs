//! Keeps a [DisplayModel] mirroring a subtree of a [Document], live.
//!
//! The mirror registers itself as an observer of every node it mirrors and
//! turns each [Change] into the corresponding display-model edit before the
//! document mutation returns. Nothing is batched; after any mutation call
//! completes, the rows match the nodes again.

pub mod watcher;

#[cfg(test)]
pub(crate) mod invariants;

use std::cell;
use std::collections::HashMap;
use std::rc;

use thiserror::Error;
use tracing::{event, instrument, Level};

use crate::format::Formatter;
use crate::format::Label;
use crate::model::display::DisplayError;
use crate::model::display::DisplayModel;
use crate::model::display::MoveParent;
use crate::model::display::RowRef;
use crate::model::document::ApplyError;
use crate::model::document::Change;
use crate::model::document::Document;
use crate::model::document::NodeId;
use crate::model::document::Observer;

use watcher::Watcher;
use watcher::WatcherKey;
use watcher::Watchers;

/// The mirror and the document disagree about something. These are logged and
/// otherwise swallowed; they never propagate back into the document mutation that
/// triggered them.
#[derive(Error, Debug)]
pub enum ConsistencyFault {
    #[error("no watcher for node {0:?}")]
    Untracked(NodeId),

    #[error("node {0:?} is already watched")]
    AlreadyWatched(NodeId),

    #[error("display model rejected an update: {0}")]
    Display(#[from] DisplayError),

    #[error("document rejected an update: {0}")]
    Document(#[from] ApplyError),
}

pub struct TreeMirror {
    this: rc::Weak<cell::RefCell<TreeMirror>>,
    model: DisplayModel,
    formatter: Box<dyn Formatter>,
    watchers: Watchers,
}

impl TreeMirror {
    /// Mirrors the subtree rooted at `root` (or nothing, for `None`). The
    /// mirrored root gets a top-level row; descendants follow in document order.
    #[instrument(skip_all)]
    pub fn build(document: &Document, root: Option<NodeId>, formatter: Box<dyn Formatter>) -> rc::Rc<cell::RefCell<TreeMirror>> {
        let mirror = rc::Rc::new_cyclic(|this| cell::RefCell::new(TreeMirror {
            this: this.clone(),
            model: DisplayModel::new(),
            formatter,
            watchers: Watchers::default(),
        }));

        if let Some(root) = root {
            mirror.borrow_mut().attach(document, root);
        }

        mirror
    }

    /// Throws away every watcher and row, then mirrors `root` from scratch.
    #[instrument(skip_all)]
    pub fn rebuild(&mut self, document: &Document, root: Option<NodeId>) {
        self.detach(document);
        if let Some(root) = root {
            self.attach(document, root);
        }
    }

    /// Stops mirroring. Leaves an empty display model.
    pub fn detach(&mut self, document: &Document) {
        if let Some(root) = self.watchers.root() {
            if let Err(fault) = self.destroy(document, root) {
                event!(Level::WARN, %fault, "failed to tear down tree mirror");
            }
        }
    }

    fn attach(&mut self, document: &Document, root: NodeId) {
        match self.watch(document, root, None, None) {
            Ok(key) => {
                self.watchers.set_root(Some(key));
                event!(Level::DEBUG, rows = self.model.len(), "built tree mirror");
            },
            Err(fault) => event!(Level::WARN, %fault, ?root, "failed to build tree mirror"),
        }
    }

    pub fn model(&self) -> &DisplayModel {
        &self.model
    }

    /// For presentation state (expansion, selection). Structural edits made
    /// through this will be undone by nothing and break the mirror.
    pub fn model_mut(&mut self) -> &mut DisplayModel {
        &mut self.model
    }

    pub fn formatter(&self) -> &dyn Formatter {
        self.formatter.as_ref()
    }

    pub fn root_node(&self) -> Option<NodeId> {
        self.watchers.root().and_then(|key| self.watchers.get(key)).map(|w| w.node)
    }

    pub fn root_row(&self) -> Option<RowRef> {
        self.watchers.root().and_then(|key| self.watchers.get(key)).map(|w| w.row)
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    pub fn row_for(&self, document: &Document, node: NodeId) -> Option<RowRef> {
        let key = self.watchers.locate(document, node)?;
        self.watchers.get(key).map(|w| w.row)
    }

    pub fn node_for(&self, row: RowRef) -> Option<NodeId> {
        self.model.node(row)
    }

    fn label(&self, document: &Document, node: NodeId) -> Label {
        document.view(node).map(|view| self.formatter.format(&view)).unwrap_or_default()
    }

    /// Creates a watcher (and row) for `node` and, recursively, its descendants.
    fn watch(&mut self, document: &Document, node: NodeId, parent: Option<WatcherKey>, after: Option<RowRef>) -> Result<WatcherKey, ConsistencyFault> {
        let parent_row = match parent {
            Some(parent) => Some(self.watchers.get(parent).ok_or(ConsistencyFault::Untracked(node))?.row),
            None => None,
        };

        let label = self.label(document, node);
        let row = self.model.insert(parent_row, after, node, label)?;
        let observer = match document.add_observer(node, self.this.clone()) {
            Ok(observer) => observer,
            Err(e) => {
                self.model.erase(row)?;
                return Err(e.into());
            },
        };

        let key = self.watchers.insert(Watcher {
            node,
            row,
            observer,
            children: HashMap::new(),
        });

        if let Some(watcher) = parent.and_then(|parent| self.watchers.get_mut(parent)) {
            watcher.children.insert(node, key);
        }

        let mut after = None;
        for child in document.children(node) {
            let child_key = self.watch(document, child, Some(key), after)?;
            after = self.watchers.get(child_key).map(|w| w.row);
        }

        Ok(key)
    }

    /// Destroys a watcher and everything beneath it, unregistering observers and
    /// erasing rows.
    fn destroy(&mut self, document: &Document, key: WatcherKey) -> Result<(), ConsistencyFault> {
        let Some(watcher) = self.watchers.remove(key) else {
            return Ok(());
        };

        for child in watcher.children.into_values() {
            self.destroy(document, child)?;
        }

        document.remove_observer(watcher.observer);
        self.model.erase(watcher.row)?;
        Ok(())
    }

    fn locate(&self, document: &Document, node: NodeId) -> Result<WatcherKey, ConsistencyFault> {
        self.watchers.locate(document, node).ok_or(ConsistencyFault::Untracked(node))
    }

    fn child(&self, parent: WatcherKey, child: NodeId) -> Result<WatcherKey, ConsistencyFault> {
        self.watchers.child(parent, child).ok_or(ConsistencyFault::Untracked(child))
    }

    fn sibling_row(&self, parent: WatcherKey, sibling: Option<NodeId>) -> Result<Option<RowRef>, ConsistencyFault> {
        match sibling {
            Some(sibling) => {
                let key = self.child(parent, sibling)?;
                Ok(self.watchers.get(key).map(|w| w.row))
            },
            None => Ok(None),
        }
    }

    fn child_added(&mut self, document: &Document, parent: NodeId, child: NodeId, after: Option<NodeId>) -> Result<(), ConsistencyFault> {
        let parent_key = self.locate(document, parent)?;
        if self.watchers.child(parent_key, child).is_some() {
            return Err(ConsistencyFault::AlreadyWatched(child));
        }

        let after_row = self.sibling_row(parent_key, after)?;
        self.watch(document, child, Some(parent_key), after_row)?;
        Ok(())
    }

    fn child_removed(&mut self, document: &Document, parent: NodeId, child: NodeId) -> Result<(), ConsistencyFault> {
        let parent_key = self.locate(document, parent)?;
        let key = self.watchers.get_mut(parent_key)
            .and_then(|w| w.children.remove(&child))
            .ok_or(ConsistencyFault::Untracked(child))?;

        self.destroy(document, key)
    }

    fn child_reordered(&mut self, document: &Document, parent: NodeId, child: NodeId, after: Option<NodeId>) -> Result<(), ConsistencyFault> {
        let parent_key = self.locate(document, parent)?;
        let key = self.child(parent_key, child)?;
        let row = self.watchers.get(key).ok_or(ConsistencyFault::Untracked(child))?.row;
        let after_row = self.sibling_row(parent_key, after)?;

        self.model.move_row(row, MoveParent::Same, after_row)?;
        Ok(())
    }

    fn refresh(&mut self, document: &Document, node: NodeId) -> Result<(), ConsistencyFault> {
        let key = self.locate(document, node)?;
        let row = self.watchers.get(key).ok_or(ConsistencyFault::Untracked(node))?.row;
        let label = self.label(document, node);

        self.model.set_label(row, label)?;
        Ok(())
    }
}

impl Observer for TreeMirror {
    fn notify(&mut self, document: &Document, change: &Change) {
        let result = match change {
            Change::ChildAdded { parent, child, after } => self.child_added(document, *parent, *child, *after),
            Change::ChildRemoved { parent, child, .. } => self.child_removed(document, *parent, *child),
            Change::ChildReordered { parent, child, new_after, .. } => self.child_reordered(document, *parent, *child, *new_after),
            Change::AttributeChanged { node, key, .. } => {
                if self.formatter.affects_label(key) {
                    self.refresh(document, *node)
                } else {
                    Ok(())
                }
            },
            Change::ContentChanged { node, .. } => self.refresh(document, *node),
            Change::NameChanged { node, .. } => self.refresh(document, *node),
        };

        if let Err(fault) = result {
            event!(Level::WARN, %fault, ?change, "tree mirror is out of sync");
        }
    }
}

impl std::fmt::Debug for TreeMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeMirror")
            .field("model", &self.model)
            .field("watchers", &self.watchers)
            .finish_non_exhaustive()
    }
}
