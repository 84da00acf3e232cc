use super::*;

#[test]
fn never_scope_ignores_cancel() {
    let never = CancellationScope::never();
    never.cancel();
    assert!(!never.is_cancelled());
    assert!(!never.can_be_cancelled());
    never.checkpoint().unwrap();
}

#[test]
fn cancelling_a_parent_cancels_descendants_only() {
    let root = CancellationScope::new();
    let child = root.child();
    let grandchild = child.child();
    let sibling = root.child();

    child.cancel();
    assert!(child.is_cancelled());
    assert!(grandchild.is_cancelled());
    assert!(!root.is_cancelled());
    assert!(!sibling.is_cancelled());

    root.cancel();
    assert!(sibling.is_cancelled());
    assert!(matches!(sibling.checkpoint(), Err(VitrineError::Cancelled)));
}

#[test]
fn merge_returns_the_only_cancellable_input() {
    let root = CancellationScope::new();
    let never = CancellationScope::never();

    let merged = CancellationScope::merge(&root, &never);
    root.cancel();
    assert!(merged.is_cancelled());

    let fresh = CancellationScope::new();
    let merged = CancellationScope::merge(&never, &fresh);
    fresh.cancel();
    assert!(merged.is_cancelled());

    assert!(!CancellationScope::merge(&never, &never).can_be_cancelled());
}

#[test]
fn merged_scope_observes_either_side() {
    let root = CancellationScope::new();
    let caller = CancellationScope::new();
    let merged = CancellationScope::merge(&root, &caller);
    assert!(!merged.is_cancelled());

    caller.cancel();
    assert!(merged.is_cancelled());
    assert!(!root.is_cancelled());

    let root = CancellationScope::new();
    let caller = CancellationScope::new();
    let merged = CancellationScope::merge(&root, &caller);
    root.cancel();
    assert!(merged.is_cancelled());
    assert!(!caller.is_cancelled());

    let merged_child = merged.child();
    assert!(merged_child.is_cancelled());
}
