//! Checks that a mirror's rows match its document exactly.

use pretty_assertions::assert_eq;

use crate::mirror::TreeMirror;
use crate::model::document::Document;
use crate::model::document::NodeId;

/// Asserts that there is exactly one watcher and one row per mirrored node,
/// that rows are ordered and nested like the nodes, and that labels are fresh.
pub fn assert_mirrors(document: &Document, mirror: &TreeMirror) {
    let model = mirror.model();

    let Some(root) = mirror.root_node() else {
        assert!(model.is_empty(), "unrooted mirror still has rows");
        assert_eq!(mirror.watcher_count(), 0);
        return;
    };

    let mut expected: Vec<(usize, NodeId)> = Vec::new();
    let mut stack = vec![(0, root)];
    while let Some((depth, node)) = stack.pop() {
        expected.push((depth, node));
        let children: Vec<NodeId> = document.children(node).collect();
        stack.extend(children.into_iter().rev().map(|child| (depth + 1, child)));
    }

    let actual: Vec<(usize, NodeId)> = model.walk()
        .into_iter()
        .map(|(depth, row)| (depth, model.node(row).unwrap()))
        .collect();

    assert_eq!(actual, expected);
    assert_eq!(model.len(), expected.len());
    assert_eq!(mirror.watcher_count(), expected.len());

    for (_, node) in expected {
        let row = mirror.row_for(document, node).unwrap();
        assert_eq!(model.node(row), Some(node));

        let label = mirror.formatter().format(&document.view(node).unwrap());
        assert_eq!(model.get(row).unwrap().label(), &label);

        assert_eq!(document.observer_count(node), 1, "node {:?} should have exactly one observer", node);
    }
}
