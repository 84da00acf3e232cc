use super::*;

fn graph_with_tree() -> (SceneGraph, NodeId, NodeId, NodeId, NodeId) {
    let mut g = SceneGraph::default();
    let page = g.insert(
        "page",
        NodeKind::Page,
        NodeOrigin::Plain,
        HostObject(1),
        None,
        &CancellationScope::never(),
    );
    let button = g.insert(
        "button",
        NodeKind::Button,
        NodeOrigin::Tracked,
        HostObject(2),
        Some(page),
        &CancellationScope::never(),
    );
    let icon = g.insert(
        "icon",
        NodeKind::Image,
        NodeOrigin::Tracked,
        HostObject(3),
        Some(button),
        &CancellationScope::never(),
    );
    let text = g.insert(
        "text",
        NodeKind::Text,
        NodeOrigin::Tracked,
        HostObject(4),
        Some(page),
        &CancellationScope::never(),
    );
    (g, page, button, icon, text)
}

#[test]
fn insert_links_children_and_starts_building() {
    let (g, page, button, icon, text) = graph_with_tree();
    let page_node = g.get(page).unwrap();
    assert_eq!(page_node.children(), &[button, text]);
    assert_eq!(page_node.state(), NodeState::Building);
    assert!(page_node.teardown.is_some());
    assert!(g.get(button).unwrap().teardown.is_none());
    assert_eq!(g.get(icon).unwrap().parent(), Some(button));
    assert_eq!(g.len(), 4);
}

#[test]
fn post_order_visits_children_before_parents() {
    let (g, page, button, icon, text) = graph_with_tree();
    let order = g.subtree_post_order(page);
    let pos = |id| order.iter().position(|&n| n == id).unwrap();
    assert_eq!(order.len(), 4);
    assert!(pos(icon) < pos(button));
    assert!(pos(button) < pos(page));
    assert!(pos(text) < pos(page));
    assert_eq!(*order.last().unwrap(), page);
}

#[test]
fn removed_ids_report_disposed_and_unknown_ids_report_none() {
    let (mut g, page, button, icon, _text) = graph_with_tree();
    g.remove(icon).unwrap();
    assert!(g.get(button).unwrap().children().is_empty());
    assert_eq!(g.state(icon), Some(NodeState::Disposed));
    assert!(!g.is_live(icon));
    assert_eq!(g.state(NodeId(999)), None);

    g.set_state(page, NodeState::Active);
    assert_eq!(g.state(page), Some(NodeState::Active));
}

#[test]
fn surfaces_lists_owned_surfaces() {
    let (mut g, _page, button, _icon, _text) = graph_with_tree();
    g.get_mut(button).unwrap().surface = Some(SurfaceId(7));
    assert_eq!(g.surfaces(), vec![(button, SurfaceId(7))]);
}

#[test]
fn node_scope_follows_the_build_scope() {
    let mut g = SceneGraph::default();
    let build = CancellationScope::new();
    let a = g.insert("a", NodeKind::Text, NodeOrigin::Tracked, HostObject(1), None, &build);
    let b = g.insert("b", NodeKind::Text, NodeOrigin::Tracked, HostObject(2), None, &build);

    g.get(a).unwrap().scope.cancel();
    assert!(g.get(a).unwrap().scope.is_cancelled());
    assert!(!g.get(b).unwrap().scope.is_cancelled());
    assert!(!build.is_cancelled());

    build.cancel();
    assert!(g.get(b).unwrap().scope.is_cancelled());
}
