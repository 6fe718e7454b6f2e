use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use postgres::{Client, NoTls};
use uuid::Uuid;

use nestedset_core::{
    move_node, AllowAllMoves, Columns, Error, MoveOutcome, NestedSet, NodeId, NodeRow, NodeStore,
    Position, Scope,
};
use nestedset_postgres::{drop_table_for_tests, ensure_schema, PgNodeStore};
use nestedset_test_support::{categories, conformance, test_config, CATEGORIES_OUTLINE};

fn connect() -> Option<Rc<RefCell<Client>>> {
    let url = std::env::var("NESTEDSET_POSTGRES_URL").ok()?;
    let client = Client::connect(&url, NoTls).ok()?;
    Some(Rc::new(RefCell::new(client)))
}

fn fresh_columns() -> Columns {
    Columns::default().with_table(format!("nested_set_{}", Uuid::new_v4().simple()))
}

#[test]
fn postgres_store_conformance() {
    let Some(client) = connect() else {
        return;
    };
    let mut tables = Vec::new();
    conformance::run_all(|| {
        let columns = fresh_columns();
        tables.push(columns.clone());
        PgNodeStore::new(client.clone(), columns).unwrap()
    });
    for columns in tables {
        drop_table_for_tests(&mut client.borrow_mut(), &columns).unwrap();
    }
}

#[test]
fn postgres_rows_are_shared_across_stores() {
    let Some(client) = connect() else {
        return;
    };
    let columns = fresh_columns();
    let set = categories(PgNodeStore::new(client.clone(), columns.clone()).unwrap());
    drop(set);

    let other = NestedSet::new(PgNodeStore::new(client.clone(), columns.clone()).unwrap());
    assert_eq!(other.outline(&Scope::unscoped()).unwrap(), CATEGORIES_OUTLINE);
    assert_eq!(other.store().max_right(&Scope::unscoped()).unwrap(), Some(12));

    drop_table_for_tests(&mut client.borrow_mut(), &columns).unwrap();
}

#[test]
fn postgres_duplicate_ids_are_rejected() {
    let Some(client) = connect() else {
        return;
    };
    let columns = fresh_columns();
    let mut store = PgNodeStore::new(client.clone(), columns.clone()).unwrap();
    store
        .insert(NodeRow::new(NodeId(1), Scope::unscoped()))
        .unwrap();
    assert!(matches!(
        store.insert(NodeRow::new(NodeId(1), Scope::from("other"))),
        Err(Error::InvalidOperation(_))
    ));

    drop_table_for_tests(&mut client.borrow_mut(), &columns).unwrap();
}

#[test]
fn postgres_concurrent_moves_stay_consistent() {
    let Some(client) = connect() else {
        return;
    };
    let Ok(url) = std::env::var("NESTEDSET_POSTGRES_URL") else {
        return;
    };
    let columns = fresh_columns();
    drop(categories(PgNodeStore::new(client.clone(), columns.clone()).unwrap()));

    let (ready_tx, ready_rx) = mpsc::channel();
    let holder_columns = columns.clone();
    let holder = thread::spawn(move || {
        let client = Rc::new(RefCell::new(Client::connect(&url, NoTls).unwrap()));
        let mut store = PgNodeStore::from_client(client, holder_columns);
        let config = test_config();
        store
            .transaction(|s| {
                let moved = move_node(
                    s,
                    &config,
                    NodeId(3),
                    NodeId(3),
                    Position::Root,
                    &AllowAllMoves,
                )?;
                ready_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(500));
                Ok(moved)
            })
            .unwrap()
    });
    ready_rx.recv().unwrap();

    // the table exists, so attaching must not wait on the open transaction
    let mut contender = NestedSet::with_config(
        PgNodeStore::from_client(client.clone(), columns.clone()),
        test_config(),
    );
    assert_eq!(
        contender.move_to_left_of(NodeId(5), NodeId(2)).unwrap(),
        MoveOutcome::Moved
    );
    assert_eq!(holder.join().unwrap(), MoveOutcome::Moved);

    assert_eq!(
        contender.outline(&Scope::unscoped()).unwrap(),
        "* 1 (, 1, 6)\n** 5 (1, 2, 3)\n** 2 (1, 4, 5)\n* 6 (, 7, 8)\n* 3 (, 9, 12)\n** 4 (3, 10, 11)"
    );
    assert!(contender.is_valid_all().unwrap());

    drop_table_for_tests(&mut client.borrow_mut(), &columns).unwrap();
}

#[test]
fn postgres_store_attaches_to_existing_table() {
    let Some(client) = connect() else {
        return;
    };
    let columns = fresh_columns();
    ensure_schema(&mut client.borrow_mut(), &columns).unwrap();

    let mut store = PgNodeStore::from_client(client.clone(), columns.clone());
    store
        .insert(NodeRow::new(NodeId(1), Scope::unscoped()))
        .unwrap();
    assert_eq!(store.scopes().unwrap(), vec![Scope::unscoped()]);

    drop_table_for_tests(&mut client.borrow_mut(), &columns).unwrap();
}
