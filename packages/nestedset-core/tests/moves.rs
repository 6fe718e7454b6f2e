use nestedset_core::{
    Error, MemoryNodeStore, MoveDecision, MoveOutcome, MoveRequest, NestedSet, NestedSetConfig,
    NodeId, NodeStore, Position, RetryPolicy, Scope,
};

const TOP: NodeId = NodeId(1);
const CHILD_1: NodeId = NodeId(2);
const CHILD_2: NodeId = NodeId(3);
const CHILD_2_1: NodeId = NodeId(4);
const CHILD_3: NodeId = NodeId(5);
const TOP_2: NodeId = NodeId(6);

/// top[1,10] { child_1[2,3], child_2[4,7] { child_2_1[5,6] }, child_3[8,9] }, top_2[11,12]
fn categories() -> NestedSet<MemoryNodeStore> {
    let config = NestedSetConfig {
        retry: RetryPolicy::immediate(10),
        ..NestedSetConfig::default()
    };
    let mut set = NestedSet::with_config(MemoryNodeStore::new(), config);
    let scope = Scope::unscoped();
    set.create(TOP, scope.clone(), None).unwrap();
    set.create(CHILD_1, scope.clone(), Some(TOP)).unwrap();
    set.create(CHILD_2, scope.clone(), Some(TOP)).unwrap();
    set.create(CHILD_2_1, scope.clone(), Some(CHILD_2)).unwrap();
    set.create(CHILD_3, scope.clone(), Some(TOP)).unwrap();
    set.create(TOP_2, scope, None).unwrap();
    set
}

fn bounds(set: &NestedSet<MemoryNodeStore>, id: NodeId) -> (i64, i64) {
    let row = set.get(id).unwrap().unwrap();
    (row.left.unwrap(), row.right.unwrap())
}

fn assert_consistent(set: &NestedSet<MemoryNodeStore>) {
    assert!(set.is_valid(&Scope::unscoped()).unwrap());
    let rows = set
        .store()
        .read(&Scope::unscoped(), &Default::default(), Default::default())
        .unwrap();
    for row in rows {
        assert_eq!(row.depth as usize, set.level(row.id).unwrap(), "depth of {}", row.id);
    }
}

#[test]
fn fixture_layout() {
    let set = categories();
    assert_eq!(bounds(&set, TOP), (1, 10));
    assert_eq!(bounds(&set, CHILD_1), (2, 3));
    assert_eq!(bounds(&set, CHILD_2), (4, 7));
    assert_eq!(bounds(&set, CHILD_2_1), (5, 6));
    assert_eq!(bounds(&set, CHILD_3), (8, 9));
    assert_eq!(bounds(&set, TOP_2), (11, 12));
    assert_consistent(&set);
}

#[test]
fn move_to_root_appends_last() {
    let mut set = categories();
    assert_eq!(set.move_to_root(CHILD_2).unwrap(), MoveOutcome::Moved);

    assert_eq!(bounds(&set, TOP), (1, 6));
    assert_eq!(bounds(&set, CHILD_3), (4, 5));
    assert_eq!(bounds(&set, TOP_2), (7, 8));
    assert_eq!(bounds(&set, CHILD_2), (9, 12));
    assert_eq!(bounds(&set, CHILD_2_1), (10, 11));

    let moved = set.get(CHILD_2).unwrap().unwrap();
    assert_eq!((moved.parent, moved.depth), (None, 0));
    assert_eq!(set.get(CHILD_2_1).unwrap().unwrap().depth, 1);
    assert_consistent(&set);
}

#[test]
fn move_left_swaps_with_previous_sibling() {
    let mut set = categories();
    set.move_left(CHILD_2).unwrap();

    assert_eq!(bounds(&set, CHILD_2), (2, 5));
    assert_eq!(bounds(&set, CHILD_2_1), (3, 4));
    assert_eq!(bounds(&set, CHILD_1), (6, 7));
    assert_eq!(bounds(&set, CHILD_3), (8, 9));
    assert_eq!(bounds(&set, TOP), (1, 10));
    assert_consistent(&set);

    // first child has nothing to swap with
    assert_eq!(set.move_left(CHILD_2).unwrap(), MoveOutcome::Unchanged);
}

#[test]
fn move_right_swaps_with_next_sibling() {
    let mut set = categories();
    set.move_right(CHILD_2).unwrap();

    assert_eq!(bounds(&set, CHILD_1), (2, 3));
    assert_eq!(bounds(&set, CHILD_3), (4, 5));
    assert_eq!(bounds(&set, CHILD_2), (6, 9));
    assert_eq!(bounds(&set, CHILD_2_1), (7, 8));
    assert_consistent(&set);
}

#[test]
fn move_to_child_of_other_tree() {
    let mut set = categories();
    set.move_to_child_of(TOP_2, CHILD_2_1).unwrap();

    assert_eq!(bounds(&set, TOP), (1, 12));
    assert_eq!(bounds(&set, CHILD_2), (4, 9));
    assert_eq!(bounds(&set, CHILD_2_1), (5, 8));
    assert_eq!(bounds(&set, TOP_2), (6, 7));
    assert_eq!(bounds(&set, CHILD_3), (10, 11));

    let moved = set.get(TOP_2).unwrap().unwrap();
    assert_eq!((moved.parent, moved.depth), (Some(CHILD_2_1), 3));
    assert_consistent(&set);
}

#[test]
fn child_with_index_semantics() {
    let mut set = categories();
    set.move_to_child_with_index(CHILD_3, TOP, 0).unwrap();
    let order: Vec<_> = set.children(TOP).unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(order, vec![CHILD_3, CHILD_1, CHILD_2]);

    // moving forward lands right of the indexed child
    let mut set = categories();
    set.move_to_child_with_index(CHILD_1, TOP, 1).unwrap();
    let order: Vec<_> = set.children(TOP).unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(order, vec![CHILD_2, CHILD_1, CHILD_3]);

    let mut set = categories();
    set.move_to_child_with_index(CHILD_1, TOP, 3).unwrap();
    let order: Vec<_> = set.children(TOP).unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(order, vec![CHILD_2, CHILD_3, CHILD_1]);

    let batches = set.store().batch_count();
    assert_eq!(
        set.move_to_child_with_index(CHILD_1, TOP, 2).unwrap(),
        MoveOutcome::Unchanged
    );
    assert_eq!(set.store().batch_count(), batches);

    assert!(matches!(
        set.move_to_child_with_index(CHILD_1, TOP, 7),
        Err(Error::InvalidOperation(_))
    ));

    // empty parent: becomes its only child
    set.move_to_child_with_index(CHILD_1, TOP_2, 0).unwrap();
    assert_eq!(set.get(CHILD_1).unwrap().unwrap().parent, Some(TOP_2));
    assert_consistent(&set);
}

#[test]
fn set_parent_moves_accordingly() {
    let mut set = categories();
    assert_eq!(
        set.set_parent(CHILD_2_1, Some(CHILD_2)).unwrap(),
        MoveOutcome::Unchanged
    );

    set.set_parent(CHILD_2_1, None).unwrap();
    assert_eq!(set.get(CHILD_2_1).unwrap().unwrap().parent, None);
    assert_eq!(bounds(&set, CHILD_2_1), (11, 12));

    set.set_parent(CHILD_2_1, Some(CHILD_1)).unwrap();
    assert_eq!(set.parent(CHILD_2_1).unwrap().map(|r| r.id), Some(CHILD_1));
    assert_consistent(&set);
}

#[test]
fn noop_moves_write_nothing() {
    let mut set = categories();
    let batches = set.store().batch_count();

    assert_eq!(
        set.move_to_left_of(CHILD_2, CHILD_3).unwrap(),
        MoveOutcome::Unchanged
    );
    assert_eq!(
        set.move_to_right_of(CHILD_2, CHILD_1).unwrap(),
        MoveOutcome::Unchanged
    );
    assert_eq!(set.move_to_child_of(CHILD_3, TOP).unwrap(), MoveOutcome::Unchanged);
    assert_eq!(set.move_to_root(TOP_2).unwrap(), MoveOutcome::Unchanged);
    assert_eq!(set.store().batch_count(), batches);
}

#[test]
fn impossible_moves_are_rejected() {
    let mut set = categories();
    for (node, target, position) in [
        (TOP, CHILD_2_1, Position::Child),
        (CHILD_2, CHILD_2, Position::Left),
        (CHILD_2, CHILD_2_1, Position::Right),
    ] {
        assert!(matches!(
            set.move_node(node, target, position),
            Err(Error::ImpossibleMove(_))
        ));
    }
    assert!(matches!(
        set.move_node(CHILD_1, NodeId(99), Position::Child),
        Err(Error::NodeNotFound(id)) if id == NodeId(99)
    ));
    assert_consistent(&set);
}

#[test]
fn guard_vetoes_before_writing() {
    let mut set = categories();
    let batches = set.store().batch_count();
    fn no_reparenting(req: &MoveRequest<'_>) -> MoveDecision {
        if req.position == Position::Child && req.node.parent != Some(req.target.id) {
            MoveDecision::Deny
        } else {
            MoveDecision::Allow
        }
    }

    assert_eq!(
        set.move_node_with(CHILD_1, CHILD_2, Position::Child, &no_reparenting)
            .unwrap(),
        MoveOutcome::Vetoed
    );
    assert_eq!(set.store().batch_count(), batches);
    assert_eq!(
        set.move_node_with(CHILD_1, CHILD_3, Position::Right, &no_reparenting)
            .unwrap(),
        MoveOutcome::Moved
    );
}

#[test]
fn scopes_are_independent() {
    let mut set = NestedSet::new(MemoryNodeStore::new());
    set.create(NodeId(1), Scope::from(1), None).unwrap();
    set.create(NodeId(2), Scope::from(1), Some(NodeId(1))).unwrap();
    set.create(NodeId(3), Scope::from(2), None).unwrap();
    set.create(NodeId(4), Scope::from(2), None).unwrap();

    assert_eq!(bounds(&set, NodeId(3)), (1, 2));
    set.move_to_child_of(NodeId(4), NodeId(3)).unwrap();
    assert_eq!(bounds(&set, NodeId(1)), (1, 4));
    assert_eq!(bounds(&set, NodeId(3)), (1, 4));

    assert!(matches!(
        set.move_to_child_of(NodeId(2), NodeId(3)),
        Err(Error::ImpossibleMove(_))
    ));
    assert!(!set.same_scope(NodeId(1), NodeId(3)).unwrap());
    assert!(set.is_valid_all().unwrap());
}

#[test]
fn positions_parse_from_strings() {
    assert_eq!("left".parse::<Position>().unwrap(), Position::Left);
    assert_eq!(Position::Right.to_string(), "right");
    assert!(matches!(
        "sideways".parse::<Position>(),
        Err(Error::InvalidPosition(_))
    ));
}
