use std::collections::HashMap;

use slotmap::SlotMap;

use crate::model::display::RowRef;
use crate::model::document::Document;
use crate::model::document::NodeId;
use crate::model::document::ObserverId;

slotmap::new_key_type! {
    pub struct WatcherKey;
}

/// Keeps one row in sync with one node. Owns the watchers of the node's children.
#[derive(Debug)]
pub struct Watcher {
    pub node: NodeId,
    pub row: RowRef,
    pub observer: ObserverId,
    pub children: HashMap<NodeId, WatcherKey>,
}

/// The watcher ownership tree. Watchers don't point back at their parents;
/// a node's watcher is found by following the document's own parent links up to
/// the mirrored root and descending from there.
#[derive(Debug, Default)]
pub struct Watchers {
    arena: SlotMap<WatcherKey, Watcher>,
    root: Option<WatcherKey>,
}

impl Watchers {
    pub fn root(&self) -> Option<WatcherKey> {
        self.root
    }

    pub fn set_root(&mut self, root: Option<WatcherKey>) {
        self.root = root;
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn get(&self, key: WatcherKey) -> Option<&Watcher> {
        self.arena.get(key)
    }

    pub fn get_mut(&mut self, key: WatcherKey) -> Option<&mut Watcher> {
        self.arena.get_mut(key)
    }

    pub fn insert(&mut self, watcher: Watcher) -> WatcherKey {
        self.arena.insert(watcher)
    }

    pub fn remove(&mut self, key: WatcherKey) -> Option<Watcher> {
        if self.root == Some(key) {
            self.root = None;
        }
        self.arena.remove(key)
    }

    /// The watcher of `parent`'s child `child`.
    pub fn child(&self, parent: WatcherKey, child: NodeId) -> Option<WatcherKey> {
        self.arena.get(parent)?.children.get(&child).copied()
    }

    /// Finds the watcher for an attached node. O(depth).
    pub fn locate(&self, document: &Document, node: NodeId) -> Option<WatcherKey> {
        let root = self.root?;
        let root_node = self.arena.get(root)?.node;

        let mut chain = Vec::new();
        let mut current = node;
        while current != root_node {
            chain.push(current);
            current = document.parent(current)?;
        }

        chain.iter().rev().try_fold(root, |key, node| self.child(key, *node))
    }
}
