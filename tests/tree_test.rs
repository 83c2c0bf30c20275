//! Tests for ErrorTree structure, intake and suppression propagation

use std::cell::RefCell;
use std::rc::Rc;

use rstest::{fixture, rstest};

use scopetree::domain::{
    DomainError, ErrorNode, ErrorTree, Failure, NodeId, NodeOptions, PresentationBehavior,
};
use scopetree::util::testing;

fn tagged(tag: &str) -> NodeOptions {
    NodeOptions::new().tag(tag)
}

fn assert_show_error_invariant(tree: &ErrorTree) {
    for &root in tree.roots() {
        for (id, node) in tree.iter(root) {
            assert_eq!(
                node.show_error(),
                node.has_error() && !node.is_presentation_suppressed(),
                "show_error invariant broken at {} ({})",
                id,
                node.tag()
            );
        }
    }
}

/// root
/// ├── a
/// └── b
struct Pair {
    tree: ErrorTree,
    root: NodeId,
    a: NodeId,
    b: NodeId,
}

#[fixture]
fn pair() -> Pair {
    testing::init_test_setup();
    let mut tree = ErrorTree::new();
    let root = tree.root(tagged("root"));
    let a = tree.child(root, tagged("a")).unwrap();
    let b = tree.child(root, tagged("b")).unwrap();
    Pair { tree, root, a, b }
}

// ============================================================
// Tree structure
// ============================================================

#[rstest]
fn given_child_when_detached_twice_then_removed_once(pair: Pair) {
    let Pair {
        mut tree, root, a, b, ..
    } = pair;

    assert!(tree.detach(a).unwrap());
    assert!(!tree.detach(a).unwrap());

    assert_eq!(tree.children(root).unwrap(), &[b]);
    assert_eq!(tree.parent(a).unwrap(), None);
    assert_eq!(tree.roots(), &[root, a]);
}

#[rstest]
fn given_removed_node_when_queried_then_reports_not_found(pair: Pair) {
    let Pair { mut tree, a, .. } = pair;
    tree.remove(a).unwrap();
    assert_eq!(tree.has_error(a), Err(DomainError::NodeNotFound(a)));
    assert_eq!(
        tree.receive(a, Failure::plain("x")),
        Err(DomainError::NodeNotFound(a))
    );
}

#[rstest]
fn given_detached_subtree_when_child_fails_then_former_parent_unaffected(pair: Pair) {
    let Pair {
        mut tree, root, a, b, ..
    } = pair;
    let a1 = tree.child(a, tagged("a1")).unwrap();
    tree.detach(a).unwrap();

    tree.receive(b, Failure::plain("b down")).unwrap();
    tree.receive(a1, Failure::plain("a1 down")).unwrap();

    // root's only remaining child failed: aggregate there
    assert!(tree.node(root).unwrap().has_aggregate_error());
    // a's only child failed: a aggregates as a root of its own
    assert!(tree.node(a).unwrap().has_aggregate_error());
    assert!(tree.show_error(a).unwrap());
    assert!(!tree.show_error(a1).unwrap());
}

#[rstest]
fn given_nested_nodes_then_traversal_follows_creation_order(pair: Pair) {
    let Pair {
        mut tree, root, a, b, ..
    } = pair;
    let a1 = tree.child(a, tagged("a1")).unwrap();
    let a2 = tree.child(a, tagged("a2")).unwrap();

    assert_eq!(tree.descendants(root).unwrap(), vec![a, a1, a2, b]);
    assert_eq!(tree.top_most(a2).unwrap(), root);
    assert_eq!(tree.find_by_tag("a2"), Some(a2));
    assert_eq!(tree.depth(root), 3);
}

// ============================================================
// Error intake
// ============================================================

#[rstest]
fn given_error_when_removed_by_description_then_has_error_restored(pair: Pair) {
    let Pair { mut tree, a, .. } = pair;
    tree.receive(a, Failure::plain("disk full")).unwrap();
    assert!(tree.has_error(a).unwrap());

    let removed = tree.remove_error(a, &"disk full").unwrap();

    assert_eq!(removed.len(), 1);
    assert!(!tree.has_error(a).unwrap());
}

#[rstest]
fn given_distinct_errors_with_same_text_when_removed_then_both_go(pair: Pair) {
    let Pair { mut tree, a, .. } = pair;
    tree.receive(a, Failure::plain("offline")).unwrap();
    tree.receive(a, Failure::retryable("offline", || {})).unwrap();
    tree.receive(a, Failure::plain("other")).unwrap();

    let removed = tree.remove_error(a, &Failure::plain("offline")).unwrap();

    assert_eq!(removed.len(), 2);
    let left: Vec<String> = tree.failures(a).unwrap().iter().map(|f| f.to_string()).collect();
    assert_eq!(left, vec!["other"]);
}

#[rstest]
fn given_suppressed_node_when_errors_cleared_then_suppression_kept(pair: Pair) {
    let Pair {
        mut tree, a, b, ..
    } = pair;
    tree.receive(a, Failure::plain("x")).unwrap();
    tree.receive(b, Failure::plain("y")).unwrap();
    assert!(tree.is_presentation_suppressed(a).unwrap());

    tree.remove_all_errors(a).unwrap();

    assert!(!tree.has_error(a).unwrap());
    assert!(tree.is_presentation_suppressed(a).unwrap());
}

#[rstest]
fn given_mixed_errors_then_derived_flags_follow(pair: Pair) {
    let Pair { mut tree, a, .. } = pair;
    tree.receive(a, Failure::plain("plain")).unwrap();
    assert!(tree.has_single_error(a).unwrap());
    assert!(!tree.has_retryable_error(a).unwrap());

    tree.receive(a, Failure::retryable("again", || {})).unwrap();
    assert!(!tree.has_single_error(a).unwrap());
    assert!(tree.has_retryable_error(a).unwrap());
}

// ============================================================
// Suppression propagation
// ============================================================

#[rstest]
fn given_two_children_when_both_fail_then_parent_aggregates(pair: Pair) {
    let Pair {
        mut tree, root, a, b, ..
    } = pair;

    tree.receive(a, Failure::plain("e1")).unwrap();
    assert!(!tree.has_error(root).unwrap());
    assert!(tree.show_error(a).unwrap());

    tree.receive(b, Failure::plain("e2")).unwrap();
    assert!(tree.has_error(root).unwrap());
    assert!(tree.has_retryable_error(root).unwrap());
    assert!(tree.is_presentation_suppressed(a).unwrap());
    assert!(tree.is_presentation_suppressed(b).unwrap());
    assert!(tree.show_error(root).unwrap());
    assert_show_error_invariant(&tree);
}

#[rstest]
#[case(1, false)]
#[case(2, true)]
#[case(3, true)]
fn given_three_children_when_some_fail_then_aggregates_from_two(
    #[case] failing: usize,
    #[case] aggregated: bool,
) {
    testing::init_test_setup();
    let mut tree = ErrorTree::new();
    let root = tree.root(tagged("root"));
    let children: Vec<NodeId> = (0..3)
        .map(|i| tree.child(root, tagged(&format!("c{}", i))).unwrap())
        .collect();

    for &child in children.iter().take(failing) {
        tree.receive(child, Failure::plain("down")).unwrap();
    }

    assert_eq!(tree.node(root).unwrap().has_aggregate_error(), aggregated);
    assert_show_error_invariant(&tree);
}

#[rstest]
fn given_single_failing_child_then_only_its_descendants_are_suppressed() {
    testing::init_test_setup();
    let mut tree = ErrorTree::new();
    let root = tree.root(tagged("root"));
    let a = tree.child(root, tagged("a")).unwrap();
    let a1 = tree.child(a, tagged("a1")).unwrap();
    let b = tree.child(root, tagged("b")).unwrap();
    let b1 = tree.child(b, tagged("b1")).unwrap();

    tree.receive(a, Failure::plain("a down")).unwrap();

    assert!(tree.show_error(a).unwrap());
    assert!(!tree.is_presentation_suppressed(a).unwrap());
    assert!(tree.is_presentation_suppressed(a1).unwrap());
    assert!(!tree.is_presentation_suppressed(b).unwrap());
    assert!(!tree.is_presentation_suppressed(b1).unwrap());
    assert!(!tree.has_error(root).unwrap());
}

#[rstest]
fn given_prefers_display_sibling_when_all_fail_then_no_aggregate() {
    testing::init_test_setup();
    let mut tree = ErrorTree::new();
    let root = tree.root(tagged("root"));
    let loud = tree
        .child(
            root,
            tagged("loud").presentation(PresentationBehavior::PrefersDisplay),
        )
        .unwrap();
    let b = tree.child(root, tagged("b")).unwrap();
    let c = tree.child(root, tagged("c")).unwrap();

    for id in [loud, b, c] {
        tree.receive(id, Failure::plain("down")).unwrap();
    }

    assert!(!tree.has_error(root).unwrap());
    for id in [loud, b, c] {
        assert!(tree.show_error(id).unwrap());
    }
}

#[rstest]
fn given_prefers_display_sibling_that_is_healthy_then_still_vetoes(pair: Pair) {
    let Pair { mut tree, root, .. } = pair;
    let loud = tree
        .child(
            root,
            tagged("loud").presentation(PresentationBehavior::PrefersDisplay),
        )
        .unwrap();
    let children = tree.children(root).unwrap().to_vec();

    for &id in children.iter().filter(|&&id| id != loud) {
        tree.receive(id, Failure::plain("down")).unwrap();
    }

    assert!(!tree.has_error(root).unwrap());
}

#[rstest]
fn given_nested_aggregation_then_cascade_reaches_top() {
    testing::init_test_setup();
    // top
    // └── mid
    //     ├── a
    //     └── b
    let mut tree = ErrorTree::new();
    let top = tree.root(tagged("top"));
    let mid = tree.child(top, tagged("mid")).unwrap();
    let a = tree.child(mid, tagged("a")).unwrap();
    let b = tree.child(mid, tagged("b")).unwrap();

    tree.receive(a, Failure::plain("a")).unwrap();
    tree.receive(b, Failure::plain("b")).unwrap();

    // mid aggregates; being top's only child, top aggregates as well
    assert!(tree.node(mid).unwrap().has_aggregate_error());
    assert!(tree.node(top).unwrap().has_aggregate_error());
    assert!(tree.show_error(top).unwrap());
    for id in [mid, a, b] {
        assert!(tree.is_presentation_suppressed(id).unwrap());
    }
    assert_show_error_invariant(&tree);
}

#[rstest]
fn given_aggregating_parent_with_healthy_uncle_then_parent_shows() {
    testing::init_test_setup();
    // top
    // ├── mid
    // │   ├── a
    // │   └── b
    // └── other
    let mut tree = ErrorTree::new();
    let top = tree.root(tagged("top"));
    let mid = tree.child(top, tagged("mid")).unwrap();
    let a = tree.child(mid, tagged("a")).unwrap();
    let b = tree.child(mid, tagged("b")).unwrap();
    let other = tree.child(top, tagged("other")).unwrap();

    tree.receive(a, Failure::plain("a")).unwrap();
    tree.receive(b, Failure::plain("b")).unwrap();

    assert!(!tree.has_error(top).unwrap());
    assert!(tree.show_error(mid).unwrap());
    assert!(tree.is_presentation_suppressed(a).unwrap());
    assert!(tree.is_presentation_suppressed(b).unwrap());
    assert!(!tree.is_presentation_suppressed(other).unwrap());
}

#[rstest]
fn given_root_failure_then_all_descendants_suppressed(pair: Pair) {
    let Pair {
        mut tree, root, a, b, ..
    } = pair;
    let a1 = tree.child(a, tagged("a1")).unwrap();

    tree.receive(root, Failure::plain("whole screen failed")).unwrap();

    for id in [a, b, a1] {
        assert!(tree.is_presentation_suppressed(id).unwrap());
        assert!(!tree.show_error(id).unwrap());
    }
    assert!(tree.show_error(root).unwrap());
}

// ============================================================
// Change notification
// ============================================================

#[rstest]
fn given_listener_when_siblings_fail_then_notified_per_change(pair: Pair) {
    let Pair {
        mut tree, root, a, b, ..
    } = pair;
    let seen: Rc<RefCell<Vec<(NodeId, bool, bool)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    tree.subscribe(move |id: NodeId, node: &ErrorNode| {
        sink.borrow_mut()
            .push((id, node.has_error(), node.is_presentation_suppressed()));
    });

    tree.receive(a, Failure::plain("e1")).unwrap();
    tree.receive(b, Failure::plain("e2")).unwrap();

    assert_eq!(
        seen.borrow().as_slice(),
        &[
            (a, true, false),
            (b, true, false),
            (root, true, false),
            (a, true, true),
            (b, true, true),
        ]
    );
}
