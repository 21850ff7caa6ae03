//! Drag-and-drop of rows, turned into structural edits of the document.
//!
//! The controller only ever mutates the document. The rows follow through the
//! mirror like they would for any other edit. All validation happens before the
//! first mutation, so a rejected drop leaves both trees untouched.

use std::cell;
use std::rc;

use thiserror::Error;
use tracing::{event, instrument, Level};

use crate::config::Config;
use crate::mirror::TreeMirror;
use crate::model::display::layout::Hit;
use crate::model::display::layout::Layout;
use crate::model::display::layout::Point;
use crate::model::display::layout::Position;
use crate::model::document::ApplyError;
use crate::model::document::Document;
use crate::model::document::NodeId;
use crate::model::document::NodeKind;

/// What's being dragged. Only the node's identity travels with the drag; it is
/// looked up again when the drop happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragPayload {
    pub node: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragAction {
    Move,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Armed(DragPayload),
    Dragging {
        payload: DragPayload,
        action: DragAction,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DragRefusal {
    #[error("no row under the pointer")]
    NoRow,

    #[error("the mirrored root can't be dragged")]
    MirroredRoot,

    #[error("{0} can't be moved")]
    Protected(String),

    #[error("a drag is already in progress")]
    AlreadyActive,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralViolation {
    #[error("no drag in progress")]
    NotDragging,

    #[error("nothing to drop onto")]
    NoTarget,

    #[error("cannot drop a node onto itself")]
    SelfDrop,

    #[error("node {0:?} cannot contain other nodes")]
    NotContainer(NodeId),

    #[error("moving {node:?} under {parent:?} would make it its own ancestor")]
    Cycle { node: NodeId, parent: NodeId },

    #[error("drop target is outside the mirrored tree")]
    OutsideMirror,

    #[error("dragged node {0:?} no longer exists in the mirrored tree")]
    SourceGone(NodeId),

    #[error("document rejected the move: {0}")]
    Document(#[from] ApplyError),
}

/// Where a drop lands, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Node { node: NodeId, position: Position },

    /// Below the last row: append to the mirrored root.
    Blank,
}

/// A validated move, expressed in document primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePlan {
    /// The node is already where it would be dropped.
    Unchanged,

    Reorder {
        parent: NodeId,
        child: NodeId,
        after: Option<NodeId>,
    },

    Reparent {
        child: NodeId,
        old_parent: NodeId,
        old_after: Option<NodeId>,
        new_parent: NodeId,
        after: Option<NodeId>,
    },
}

fn is_container(document: &Document, config: &Config, node: NodeId) -> bool {
    document.kind(node) == Some(NodeKind::Element)
        && document.name(node).is_some_and(|name| config.is_container(name))
}

/// Validates dropping `source` onto `target` within the subtree mirrored at
/// `root`, and works out which document operations would do it.
pub fn plan_drop(document: &Document, config: &Config, root: NodeId, source: NodeId, target: DropTarget) -> Result<MovePlan, StructuralViolation> {
    let old_parent = document.parent(source).ok_or(StructuralViolation::SourceGone(source))?;
    if !document.is_ancestor_of(root, source) {
        return Err(StructuralViolation::SourceGone(source));
    }

    let (target, position) = match target {
        DropTarget::Node { node, position } => (node, position),
        DropTarget::Blank => match document.last_child(root) {
            Some(last) if last == source => return Ok(MovePlan::Unchanged),
            Some(last) => (last, Position::After),
            None => (root, Position::Into),
        },
    };

    if !document.contains(target) || !document.is_ancestor_or_self(root, target) {
        return Err(StructuralViolation::OutsideMirror);
    }

    if target == source {
        return Err(StructuralViolation::SelfDrop);
    }

    let (new_parent, after) = match position {
        Position::Into => {
            if !is_container(document, config, target) {
                return Err(StructuralViolation::NotContainer(target));
            }
            (target, document.last_child(target))
        },
        Position::Before | Position::After => {
            if target == root {
                return Err(StructuralViolation::OutsideMirror);
            }

            let parent = document.parent(target).ok_or(StructuralViolation::OutsideMirror)?;
            let after = match position {
                Position::Before => document.prev(target),
                _ => Some(target),
            };
            (parent, after)
        },
    };

    if document.is_ancestor_or_self(source, new_parent) {
        return Err(StructuralViolation::Cycle { node: source, parent: new_parent });
    }

    let old_after = document.prev(source);
    if new_parent == old_parent && (after == Some(source) || after == old_after) {
        return Ok(MovePlan::Unchanged);
    }

    Ok(match position {
        Position::Before | Position::After if new_parent == old_parent => MovePlan::Reorder {
            parent: new_parent,
            child: source,
            after,
        },
        _ => MovePlan::Reparent {
            child: source,
            old_parent,
            old_after,
            new_parent,
            after,
        },
    })
}

/// Carries out a plan. If re-adding fails after the node was already removed,
/// the node is put back where it was.
pub fn apply_plan(document: &mut Document, plan: MovePlan) -> Result<(), ApplyError> {
    match plan {
        MovePlan::Unchanged => Ok(()),
        MovePlan::Reorder { parent, child, after } => document.change_order(parent, child, after),
        MovePlan::Reparent { child, old_parent, old_after, new_parent, after } => {
            document.remove_child(old_parent, child)?;
            document.add_child(new_parent, child, after).inspect_err(|_| {
                if let Err(error) = document.add_child(old_parent, child, old_after) {
                    event!(Level::WARN, %error, ?child, "failed to restore node after rejected move");
                }
            })
        },
    }
}

pub struct DragController {
    state: DragState,
    layout: Layout,
    config: rc::Rc<Config>,
}

impl DragController {
    pub fn new(config: rc::Rc<Config>) -> DragController {
        DragController {
            state: DragState::Idle,
            layout: Layout::new(config.row_height, config.drop_zones),
            config,
        }
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut Layout {
        &mut self.layout
    }

    fn payload(&self) -> Option<DragPayload> {
        match self.state {
            DragState::Idle => None,
            DragState::Armed(payload) => Some(payload),
            DragState::Dragging { payload, .. } => Some(payload),
        }
    }

    /// Picks up the row under the pointer.
    pub fn begin(&mut self, document: &Document, mirror: &TreeMirror, point: Point) -> Result<DragPayload, DragRefusal> {
        let result = self.arm(document, mirror, point);
        if let Err(refusal) = &result {
            event!(Level::DEBUG, %refusal, "refused to start drag");
        }
        result
    }

    fn arm(&mut self, document: &Document, mirror: &TreeMirror, point: Point) -> Result<DragPayload, DragRefusal> {
        if self.state != DragState::Idle {
            return Err(DragRefusal::AlreadyActive);
        }

        let Hit::Row { row, .. } = self.layout.hit(mirror.model(), point) else {
            return Err(DragRefusal::NoRow);
        };

        let node = mirror.node_for(row).ok_or(DragRefusal::NoRow)?;
        if Some(row) == mirror.root_row() {
            return Err(DragRefusal::MirroredRoot);
        }

        if let Some(name) = document.name(node).filter(|name| self.config.is_protected(name)) {
            return Err(DragRefusal::Protected(name.to_string()));
        }

        let payload = DragPayload { node };
        self.state = DragState::Armed(payload);
        Ok(payload)
    }

    fn resolve(&self, mirror: &TreeMirror, point: Point) -> Option<DropTarget> {
        match self.layout.hit(mirror.model(), point) {
            Hit::Row { row, position } => mirror.node_for(row).map(|node| DropTarget::Node { node, position }),
            Hit::Blank => Some(DropTarget::Blank),
            Hit::Outside => None,
        }
    }

    fn plan(&self, document: &Document, mirror: &TreeMirror, source: NodeId, point: Point) -> Result<MovePlan, StructuralViolation> {
        let target = self.resolve(mirror, point).ok_or(StructuralViolation::NoTarget)?;
        let root = mirror.root_node().ok_or(StructuralViolation::OutsideMirror)?;
        plan_drop(document, &self.config, root, source, target)
    }

    /// Reports what dropping at `point` would do.
    pub fn update(&mut self, document: &Document, mirror: &TreeMirror, point: Point) -> DragAction {
        let Some(payload) = self.payload() else {
            return DragAction::None;
        };

        let action = match self.plan(document, mirror, payload.node, point) {
            Ok(_) => DragAction::Move,
            Err(_) => DragAction::None,
        };

        self.state = DragState::Dragging { payload, action };
        action
    }

    /// Finishes the drag. `Ok` means the move was committed (or was a no-op);
    /// on `Err` neither tree was touched. Either way the controller goes back to
    /// idle.
    ///
    /// The mirror is only borrowed while the drop is being resolved; it has to
    /// be free again by the time the document changes so that it can observe
    /// the move.
    #[instrument(skip_all)]
    pub fn drop(&mut self, document: &mut Document, mirror: &cell::RefCell<TreeMirror>, point: Point) -> Result<MovePlan, StructuralViolation> {
        let payload = self.payload();
        self.state = DragState::Idle;

        let result = payload
            .ok_or(StructuralViolation::NotDragging)
            .and_then(|payload| self.plan(document, &mirror.borrow(), payload.node, point))
            .and_then(|plan| {
                apply_plan(document, plan)?;
                Ok(plan)
            });

        match &result {
            Ok(plan) => event!(Level::DEBUG, ?plan, "committed drop"),
            Err(violation) => event!(Level::DEBUG, %violation, "rejected drop"),
        }

        result
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use crate::format::XmlFormatter;
    use crate::mirror::invariants::assert_mirrors;

    struct Fixture {
        doc: Document,
        mirror: rc::Rc<cell::RefCell<TreeMirror>>,
        drag: DragController,
    }

    impl Fixture {
        fn new() -> Fixture {
            let doc = Document::builder()
                .element("svg:svg", |svg| {
                    svg.id("svg1")
                        .element("sodipodi:namedview", |n| { n.id("namedview1"); })
                        .element("svg:defs", |d| { d.id("defs1"); })
                        .element("svg:g", |g| {
                            g.id("layer1")
                                .element("svg:rect", |r| { r.id("A"); })
                                .element("svg:g", |g| { g.id("G").element("svg:circle", |c| { c.id("G1"); }); })
                                .element("svg:rect", |r| { r.id("B"); })
                                .element("svg:text", |t| { t.id("C").text("hello"); });
                        });
                })
                .build();

            let mirror = TreeMirror::build(&doc, doc.root_element(), Box::new(XmlFormatter::default()));
            {
                let mut mirror = mirror.borrow_mut();
                let rows: Vec<_> = mirror.model().walk().into_iter().map(|(_, row)| row).collect();
                for row in rows {
                    mirror.model_mut().set_expanded(row, true).unwrap();
                }
            }

            Fixture {
                doc,
                mirror,
                drag: DragController::new(rc::Rc::new(Config::default())),
            }
        }

        fn id(&self, value: &str) -> NodeId {
            self.doc.find_by_id(value).unwrap()
        }

        fn text(&self) -> NodeId {
            self.doc.first_child(self.id("C")).unwrap()
        }

        fn point(&self, node: NodeId, position: Position) -> Point {
            let mirror = self.mirror.borrow();
            let row = mirror.row_for(&self.doc, node).unwrap();
            self.drag.layout().point_in(mirror.model(), row, position).unwrap()
        }

        fn begin(&mut self, node: NodeId) -> Result<DragPayload, DragRefusal> {
            let point = self.point(node, Position::Into);
            self.drag.begin(&self.doc, &self.mirror.borrow(), point)
        }

        fn update(&mut self, point: Point) -> DragAction {
            self.drag.update(&self.doc, &self.mirror.borrow(), point)
        }

        fn drag(&mut self, source: &str, target: NodeId, position: Position) -> Result<MovePlan, StructuralViolation> {
            let source = self.id(source);
            self.begin(source).unwrap();
            let point = self.point(target, position);
            self.update(point);
            self.drag.drop(&mut self.doc, &self.mirror, point)
        }

        fn ids(&self, parent: &str) -> Vec<String> {
            let parent = self.id(parent);
            self.doc.children(parent).map(|n| self.doc.attribute(n, "id").unwrap_or("").to_string()).collect()
        }

        fn check(&self) {
            assert_mirrors(&self.doc, &self.mirror.borrow());
        }
    }

    #[test]
    fn test_begin_refusals() {
        let mut f = Fixture::new();

        let below = f.drag.layout().point_below(f.mirror.borrow().model());
        assert_eq!(f.drag.begin(&f.doc, &f.mirror.borrow(), below), Err(DragRefusal::NoRow));
        assert_eq!(f.drag.begin(&f.doc, &f.mirror.borrow(), Point::new(-1.0, -1.0)), Err(DragRefusal::NoRow));

        assert_eq!(f.begin(f.id("svg1")), Err(DragRefusal::MirroredRoot));
        assert_eq!(f.begin(f.id("namedview1")), Err(DragRefusal::Protected("sodipodi:namedview".to_string())));
        assert_eq!(f.begin(f.id("defs1")), Err(DragRefusal::Protected("svg:defs".to_string())));
        assert_eq!(f.drag.state(), DragState::Idle);

        let a = f.id("A");
        assert_eq!(f.begin(a), Ok(DragPayload { node: a }));
        assert_eq!(f.drag.state(), DragState::Armed(DragPayload { node: a }));
        assert_eq!(f.begin(f.id("B")), Err(DragRefusal::AlreadyActive));
    }

    #[test]
    fn test_drop_before_first() {
        let mut f = Fixture::new();
        let a = f.id("A");

        let plan = f.drag("C", a, Position::Before).unwrap();
        assert_matches!(plan, MovePlan::Reorder { after: None, .. });
        assert_eq!(f.ids("layer1"), vec!["C", "A", "G", "B"]);
        assert_eq!(f.drag.state(), DragState::Idle);
        f.check();
    }

    #[test]
    fn test_drop_into_text_rejected() {
        let mut f = Fixture::new();
        let text = f.text();

        f.begin(f.id("A")).unwrap();
        let point = f.point(text, Position::Into);
        assert_eq!(f.update(point), DragAction::None);
        assert_eq!(f.drag.drop(&mut f.doc, &f.mirror, point), Err(StructuralViolation::NotContainer(text)));

        /* a rect isn't a container either */
        let b = f.id("B");
        assert_eq!(f.drag("A", b, Position::Into), Err(StructuralViolation::NotContainer(b)));

        assert_eq!(f.ids("layer1"), vec!["A", "G", "B", "C"]);
        f.check();
    }

    #[test]
    fn test_cycles_rejected() {
        let mut f = Fixture::new();
        let layer = f.id("layer1");
        let generation = f.doc.generation();

        let g = f.id("G");
        assert_eq!(f.drag("layer1", g, Position::Into), Err(StructuralViolation::Cycle { node: layer, parent: g }));

        let g1 = f.id("G1");
        assert_eq!(f.drag("layer1", g1, Position::Before), Err(StructuralViolation::Cycle { node: layer, parent: g }));

        assert_eq!(f.drag("G", g, Position::Into), Err(StructuralViolation::SelfDrop));

        assert_eq!(f.doc.generation(), generation);
        f.check();
    }

    #[test]
    fn test_into_then_back_round_trips() {
        let mut f = Fixture::new();
        let g = f.id("G");

        f.drag("A", g, Position::Into).unwrap();
        assert_eq!(f.ids("layer1"), vec!["G", "B", "C"]);
        assert_eq!(f.ids("G"), vec!["G1", "A"]);
        f.check();

        f.drag("A", g, Position::Before).unwrap();
        assert_eq!(f.ids("layer1"), vec!["A", "G", "B", "C"]);
        assert_eq!(f.ids("G"), vec!["G1"]);
        f.check();
    }

    #[test]
    fn test_drop_after_across_parents() {
        let mut f = Fixture::new();
        let g1 = f.id("G1");

        let plan = f.drag("B", g1, Position::After).unwrap();
        assert_matches!(plan, MovePlan::Reparent { after: Some(_), .. });
        assert_eq!(f.ids("G"), vec!["G1", "B"]);
        assert_eq!(f.ids("layer1"), vec!["A", "G", "C"]);
        f.check();
    }

    #[test]
    fn test_drop_onto_blank_appends_to_root() {
        let mut f = Fixture::new();

        f.begin(f.id("A")).unwrap();
        let below = f.drag.layout().point_below(f.mirror.borrow().model());
        assert_eq!(f.update(below), DragAction::Move);
        f.drag.drop(&mut f.doc, &f.mirror, below).unwrap();

        assert_eq!(f.ids("svg1"), vec!["namedview1", "defs1", "layer1", "A"]);
        f.check();

        /* already last: nothing to do */
        f.begin(f.id("A")).unwrap();
        let below = f.drag.layout().point_below(f.mirror.borrow().model());
        assert_eq!(f.drag.drop(&mut f.doc, &f.mirror, below), Ok(MovePlan::Unchanged));
    }

    #[test]
    fn test_noop_drops() {
        let mut f = Fixture::new();
        let generation = f.doc.generation();

        let g = f.id("G");
        let a = f.id("A");
        assert_eq!(f.drag("A", g, Position::Before), Ok(MovePlan::Unchanged));
        assert_eq!(f.drag("G", a, Position::After), Ok(MovePlan::Unchanged));
        assert_eq!(f.doc.generation(), generation);
    }

    #[test]
    fn test_drop_outside_mirror() {
        let mut f = Fixture::new();
        let svg = f.id("svg1");

        assert_eq!(f.drag("A", svg, Position::Before), Err(StructuralViolation::OutsideMirror));

        f.begin(f.id("A")).unwrap();
        assert_eq!(f.drag.drop(&mut f.doc, &f.mirror, Point::new(-5.0, 0.0)), Err(StructuralViolation::NoTarget));
        assert_eq!(f.drag.drop(&mut f.doc, &f.mirror, Point::new(1.0, 1.0)), Err(StructuralViolation::NotDragging));
    }

    #[test]
    fn test_source_vanished() {
        let mut f = Fixture::new();
        let a = f.id("A");
        let layer = f.id("layer1");
        let b = f.id("B");

        f.begin(a).unwrap();
        let point = f.point(b, Position::After);
        f.doc.remove_child(layer, a).unwrap();

        assert_eq!(f.drag.drop(&mut f.doc, &f.mirror, point), Err(StructuralViolation::SourceGone(a)));
        assert_eq!(f.ids("layer1"), vec!["G", "B", "C"]);
        f.check();
    }

    #[test]
    fn test_cancel() {
        let mut f = Fixture::new();
        let generation = f.doc.generation();

        f.begin(f.id("A")).unwrap();
        let point = f.point(f.id("G"), Position::Into);
        assert_eq!(f.update(point), DragAction::Move);
        assert_matches!(f.drag.state(), DragState::Dragging { action: DragAction::Move, .. });

        f.drag.cancel();
        assert_eq!(f.drag.state(), DragState::Idle);
        assert_eq!(f.doc.generation(), generation);
        assert_eq!(f.ids("layer1"), vec!["A", "G", "B", "C"]);
        f.check();
    }
}
