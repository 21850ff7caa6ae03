pub mod builder;
pub mod change;
pub mod load;
pub mod node;

use std::cell;
use std::rc;

use slotmap::SecondaryMap;
use slotmap::SlotMap;
use tracing::{event, Level};

pub use change::ApplyError;
pub use change::Change;
pub use node::Attributes;
pub use node::NodeId;
pub use node::NodeKind;
pub use node::NodeView;

use node::Node;

/// Receives [Change] notifications for the nodes it was registered on. Called
/// synchronously from inside the mutation that caused the change, after the
/// document has been updated, so the observer sees the new state.
pub trait Observer {
    fn notify(&mut self, document: &Document, change: &Change);
}

slotmap::new_key_type! {
    pub struct ObserverId;
}

struct Registration {
    id: ObserverId,
    observer: rc::Weak<cell::RefCell<dyn Observer>>,
}

#[derive(Default)]
struct Observers {
    ids: SlotMap<ObserverId, NodeId>,
    by_node: SecondaryMap<NodeId, Vec<Registration>>,
}

pub struct Document {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,

    /* registration has to work from inside a notification, where we only have a shared reference */
    observers: cell::RefCell<Observers>,
    generation: u64,
}

pub struct Children<'a> {
    document: &'a Document,
    next: Option<NodeId>,
}

impl<'a> Iterator for Children<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.document.next(current);
        Some(current)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates a document containing nothing but its document-root node.
    pub fn new() -> Document {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new(NodeKind::Document));

        Document {
            nodes,
            root,
            observers: cell::RefCell::new(Observers::default()),
            generation: 0,
        }
    }

    pub fn builder() -> builder::Builder {
        builder::Builder::new()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The document-root node. It has no parent and can never be moved.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The first element child of the document root (`<svg:svg>` for an SVG document).
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root).find(|child| self.kind(*child) == Some(NodeKind::Element))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /* Node creation. New nodes are detached until added somewhere. */

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.nodes.insert(Node::element(name))
    }

    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.nodes.insert(Node::with_content(NodeKind::Text, content))
    }

    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.nodes.insert(Node::with_content(NodeKind::Comment, content))
    }

    pub fn create_processing_instruction(&mut self, content: &str) -> NodeId {
        self.nodes.insert(Node::with_content(NodeKind::ProcessingInstruction, content))
    }

    /* Queries */

    fn node(&self, id: NodeId) -> Result<&Node, ApplyError> {
        self.nodes.get(id).ok_or(ApplyError::NodeNotFound(id))
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(id).map(|n| n.kind)
    }

    /// Qualified name of an element. Empty for every other kind of node.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id).map(|n| n.name.as_str())
    }

    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        self.nodes.get(id).and_then(|n| n.attributes.get(key)).map(String::as_str)
    }

    pub fn attributes(&self, id: NodeId) -> Option<&Attributes> {
        self.nodes.get(id).map(|n| &n.attributes)
    }

    pub fn content(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id).map(|n| n.content.as_str())
    }

    pub fn view(&self, id: NodeId) -> Option<NodeView<'_>> {
        self.nodes.get(id).map(|n| NodeView {
            kind: n.kind,
            name: &n.name,
            attributes: &n.attributes,
            content: &n.content,
        })
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.first_child)
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.next)
    }

    /// Previous sibling. Linear in the number of siblings.
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let mut prev = None;
        for sibling in self.children(parent) {
            if sibling == id {
                return prev;
            }
            prev = Some(sibling);
        }
        None
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last()
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            document: self,
            next: self.first_child(id),
        }
    }

    /// Pre-order walk of the subtree rooted at `id`, including `id` itself.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![id];
        std::iter::from_fn(move || {
            let current = stack.pop()?;
            let first = stack.len();
            stack.extend(self.children(current));
            stack[first..].reverse();
            Some(current)
        })
    }

    /// Finds the attached element whose `id` attribute is `value`.
    pub fn find_by_id(&self, value: &str) -> Option<NodeId> {
        self.descendants(self.root).find(|node| self.attribute(*node, "id") == Some(value))
    }

    /// Whether `ancestor` lies strictly above `node`.
    pub fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.parent(node).is_some_and(|parent| self.is_ancestor_or_self(ancestor, parent))
    }

    /// Whether `ancestor` is `node` or lies on its parent chain.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /* Structural mutation */

    /// Links a detached `child` under `parent`, immediately after `after`, or as
    /// the first child if `after` is `None`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId, after: Option<NodeId>) -> Result<(), ApplyError> {
        let parent_node = self.node(parent)?;
        if !parent_node.kind.can_have_children() {
            return Err(ApplyError::CannotHaveChildren(parent));
        }

        if child == self.root {
            return Err(ApplyError::DocumentRoot);
        }

        if self.node(child)?.parent.is_some() {
            return Err(ApplyError::AlreadyAttached(child));
        }

        if let Some(after) = after {
            if self.node(after)?.parent != Some(parent) {
                return Err(ApplyError::NotAChild { parent, child: after });
            }
        }

        if self.is_ancestor_or_self(child, parent) {
            return Err(ApplyError::WouldCreateCycle { parent, child });
        }

        /* Preconditions passed; do the deed. */
        self.link(parent, child, after);
        self.generation+= 1;

        self.notify(Change::ChildAdded { parent, child, after });
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), ApplyError> {
        let after = self.last_child(parent);
        self.add_child(parent, child, after)
    }

    /// Unlinks `child` from `parent`. The child (and its subtree) stays in the
    /// document, detached, so it can be added back elsewhere.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), ApplyError> {
        self.node(parent)?;
        if self.node(child)?.parent != Some(parent) {
            return Err(ApplyError::NotAChild { parent, child });
        }

        let after = self.unlink(parent, child);
        self.generation+= 1;

        self.notify(Change::ChildRemoved { parent, child, after });
        Ok(())
    }

    /// Moves `child` to sit right after `after` (or first) among its current siblings.
    pub fn change_order(&mut self, parent: NodeId, child: NodeId, after: Option<NodeId>) -> Result<(), ApplyError> {
        self.node(parent)?;
        if self.node(child)?.parent != Some(parent) {
            return Err(ApplyError::NotAChild { parent, child });
        }

        if let Some(after) = after {
            if self.node(after)?.parent != Some(parent) {
                return Err(ApplyError::NotAChild { parent, child: after });
            }
        }

        let old_after = self.prev(child);
        if after == Some(child) || after == old_after {
            /* already there */
            return Ok(());
        }

        self.unlink(parent, child);
        self.link(parent, child, after);
        self.generation+= 1;

        self.notify(Change::ChildReordered { parent, child, old_after, new_after: after });
        Ok(())
    }

    fn link(&mut self, parent: NodeId, child: NodeId, after: Option<NodeId>) {
        let next = match after {
            Some(after) => self.nodes[after].next.replace(child),
            None => self.nodes[parent].first_child.replace(child),
        };

        let child_node = &mut self.nodes[child];
        child_node.parent = Some(parent);
        child_node.next = next;
    }

    /// Returns the sibling the child used to follow.
    fn unlink(&mut self, parent: NodeId, child: NodeId) -> Option<NodeId> {
        let prev = self.prev(child);
        let next = self.nodes[child].next.take();

        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.nodes[parent].first_child = next,
        }

        self.nodes[child].parent = None;
        prev
    }

    /* Content mutation */

    /// Sets (`Some`) or removes (`None`) an attribute on an element.
    pub fn set_attribute(&mut self, id: NodeId, key: &str, value: Option<&str>) -> Result<(), ApplyError> {
        let node = self.nodes.get_mut(id).ok_or(ApplyError::NodeNotFound(id))?;
        if node.kind != NodeKind::Element {
            return Err(ApplyError::NotAnElement(id));
        }

        let old = node.attributes.get(key).cloned();
        if old.as_deref() == value {
            return Ok(());
        }

        match value {
            Some(value) => { node.attributes.insert(key.to_string(), value.to_string()); },
            None => { node.attributes.shift_remove(key); },
        }
        self.generation+= 1;

        self.notify(Change::AttributeChanged {
            node: id,
            key: key.to_string(),
            old,
            new: value.map(str::to_string),
        });
        Ok(())
    }

    pub fn set_content(&mut self, id: NodeId, content: &str) -> Result<(), ApplyError> {
        let node = self.nodes.get_mut(id).ok_or(ApplyError::NodeNotFound(id))?;
        if !node.kind.has_content() {
            return Err(ApplyError::NoContent(id));
        }

        if node.content == content {
            return Ok(());
        }

        let old = std::mem::replace(&mut node.content, content.to_string());
        self.generation+= 1;

        self.notify(Change::ContentChanged { node: id, old, new: content.to_string() });
        Ok(())
    }

    pub fn set_name(&mut self, id: NodeId, name: &str) -> Result<(), ApplyError> {
        let node = self.nodes.get_mut(id).ok_or(ApplyError::NodeNotFound(id))?;
        if node.kind != NodeKind::Element {
            return Err(ApplyError::NotAnElement(id));
        }

        if node.name == name {
            return Ok(());
        }

        let old = std::mem::replace(&mut node.name, name.to_string());
        self.generation+= 1;

        self.notify(Change::NameChanged { node: id, old, new: name.to_string() });
        Ok(())
    }

    /* Whole-subtree operations */

    /// Deep-copies a subtree. The copy is detached.
    pub fn duplicate(&mut self, id: NodeId) -> Result<NodeId, ApplyError> {
        let node = self.node(id)?;
        if node.kind == NodeKind::Document {
            return Err(ApplyError::DocumentRoot);
        }

        let mut copy = node.clone();
        copy.parent = None;
        copy.first_child = None;
        copy.next = None;

        let children: Vec<NodeId> = self.children(id).collect();
        let copy = self.nodes.insert(copy);

        let mut after = None;
        for child in children {
            let child_copy = self.duplicate(child)?;
            /* the copy isn't observed by anyone yet, so link it quietly */
            self.link(copy, child_copy, after);
            after = Some(child_copy);
        }

        Ok(copy)
    }

    /// Frees a detached subtree. Its ids become invalid.
    pub fn discard(&mut self, id: NodeId) -> Result<(), ApplyError> {
        if id == self.root {
            return Err(ApplyError::DocumentRoot);
        }

        if self.node(id)?.parent.is_some() {
            return Err(ApplyError::StillAttached(id));
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            stack.extend(self.children(current));
            self.nodes.remove(current);

            let mut observers = self.observers.borrow_mut();
            if let Some(registrations) = observers.by_node.remove(current) {
                for registration in registrations {
                    observers.ids.remove(registration.id);
                }
            }
        }

        Ok(())
    }

    /* Observers */

    pub fn add_observer(&self, id: NodeId, observer: rc::Weak<cell::RefCell<dyn Observer>>) -> Result<ObserverId, ApplyError> {
        self.node(id)?;

        let mut observers = self.observers.borrow_mut();
        let observers = &mut *observers;

        let Some(entry) = observers.by_node.entry(id) else {
            return Err(ApplyError::NodeNotFound(id));
        };

        let observer_id = observers.ids.insert(id);
        entry.or_default().push(Registration { id: observer_id, observer });

        Ok(observer_id)
    }

    /// Returns whether the registration existed.
    pub fn remove_observer(&self, observer_id: ObserverId) -> bool {
        let mut observers = self.observers.borrow_mut();
        let Some(node) = observers.ids.remove(observer_id) else {
            return false;
        };

        if let Some(registrations) = observers.by_node.get_mut(node) {
            registrations.retain(|r| r.id != observer_id);
        }

        true
    }

    pub fn observer_count(&self, id: NodeId) -> usize {
        self.observers.borrow().by_node.get(id).map_or(0, Vec::len)
    }

    fn notify(&self, change: Change) {
        let targets: Vec<rc::Rc<cell::RefCell<dyn Observer>>> = {
            let mut observers = self.observers.borrow_mut();
            let observers = &mut *observers;

            match observers.by_node.get_mut(change.target()) {
                Some(registrations) => {
                    /* prune observers that went away without unregistering */
                    registrations.retain(|r| {
                        let alive = r.observer.strong_count() > 0;
                        if !alive {
                            observers.ids.remove(r.id);
                        }
                        alive
                    });

                    registrations.iter().filter_map(|r| r.observer.upgrade()).collect()
                },
                None => Vec::new(),
            }
        };

        for observer in targets {
            match observer.try_borrow_mut() {
                Ok(mut observer) => observer.notify(self, &change),
                Err(_) => event!(Level::WARN, ?change, "observer is already borrowed; dropping notification"),
            }
        }
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
