//! Scenario tests for keyset pagination: page boundaries, filters, and the
//! cursor-independent count.

use std::thread::sleep;
use std::time::Duration;

use arbor_store::{
    CreateItem, Item, ItemPatch, ItemStore, ListQuery, ParentFilter, SqliteItemStore, SortField,
    SortOrder, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use uuid::Uuid;

fn store() -> SqliteItemStore {
    SqliteItemStore::open_in_memory().unwrap()
}

/// Create `n` items in sequence with strictly increasing timestamps.
fn create_sequence(store: &SqliteItemStore, owner: Uuid, n: usize) -> Vec<Item> {
    (0..n)
        .map(|i| {
            if i > 0 {
                sleep(Duration::from_millis(2));
            }
            store
                .create_item(CreateItem {
                    content: Some(format!("item {}", i)),
                    ..CreateItem::new(owner)
                })
                .unwrap()
        })
        .collect()
}

fn ids(items: &[Item]) -> Vec<Uuid> {
    items.iter().map(|i| i.id).collect()
}

#[test]
fn twenty_items_paginate_without_overlap() {
    let store = store();
    let owner = Uuid::new_v4();
    let created = create_sequence(&store, owner, 20);

    let mut query = ListQuery {
        owner: Some(owner),
        limit: Some(13),
        sort_field: SortField::CreatedAt,
        order: SortOrder::Asc,
        ..Default::default()
    };

    let page1 = store.list_items(&query).unwrap();
    assert_eq!(page1.items.len(), 13);
    assert_eq!(page1.count, 20);
    assert_eq!(ids(&page1.items), ids(&created[..13]));

    query.cursor = page1.items.last().map(|i| i.created_at);
    let page2 = store.list_items(&query).unwrap();
    assert_eq!(page2.items.len(), 7);
    // Count still covers the whole filtered set, cursor ignored.
    assert_eq!(page2.count, 20);
    assert_eq!(ids(&page2.items), ids(&created[13..]));

    let mut all = ids(&page1.items);
    all.extend(ids(&page2.items));
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 20);
}

#[test]
fn descending_pagination_walks_newest_first() {
    let store = store();
    let owner = Uuid::new_v4();
    let created = create_sequence(&store, owner, 6);

    let mut query = ListQuery {
        owner: Some(owner),
        limit: Some(4),
        order: SortOrder::Desc,
        ..Default::default()
    };

    let page1 = store.list_items(&query).unwrap();
    let mut expected: Vec<Uuid> = ids(&created);
    expected.reverse();
    assert_eq!(ids(&page1.items), expected[..4]);

    query.cursor = page1.items.last().map(|i| i.created_at);
    let page2 = store.list_items(&query).unwrap();
    assert_eq!(ids(&page2.items), expected[4..]);
}

#[test]
fn empty_result_is_not_an_error() {
    let store = store();
    let page = store
        .list_items(&ListQuery {
            owner: Some(Uuid::new_v4()),
            ..Default::default()
        })
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.count, 0);
}

#[test]
fn missing_limit_falls_back_to_default() {
    let store = store();
    let owner = Uuid::new_v4();
    for _ in 0..15 {
        store.create_item(CreateItem::new(owner)).unwrap();
    }

    let page = store.list_items(&ListQuery::default()).unwrap();
    assert_eq!(page.items.len(), DEFAULT_PAGE_SIZE as usize);
    assert_eq!(page.count, 15);
}

#[test]
fn oversized_limit_is_truncated_not_rejected() {
    let store = store();
    let owner = Uuid::new_v4();
    for _ in 0..(MAX_PAGE_SIZE + 20) {
        store.create_item(CreateItem::new(owner)).unwrap();
    }

    let page = store
        .list_items(&ListQuery {
            limit: Some(100_000),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.items.len(), MAX_PAGE_SIZE as usize);
    assert_eq!(page.count, u64::from(MAX_PAGE_SIZE) + 20);
}

#[test]
fn roots_filter_skips_children() {
    let store = store();
    let owner = Uuid::new_v4();
    let root_a = store.create_item(CreateItem::new(owner)).unwrap();
    let root_b = store.create_item(CreateItem::new(owner)).unwrap();
    store
        .create_item(CreateItem {
            parent_id: Some(root_a.id.to_string()),
            ..CreateItem::new(owner)
        })
        .unwrap();

    let page = store
        .list_items(&ListQuery {
            parent: ParentFilter::Roots,
            order: SortOrder::Asc,
            ..Default::default()
        })
        .unwrap();
    let mut got = ids(&page.items);
    got.sort();
    let mut expected = vec![root_a.id, root_b.id];
    expected.sort();
    assert_eq!(got, expected);
}

#[test]
fn subtree_filter_respects_depth_bounds() {
    let store = store();
    let owner = Uuid::new_v4();
    let root = store.create_item(CreateItem::new(owner)).unwrap();
    let child = store
        .create_item(CreateItem {
            parent_id: Some(root.id.to_string()),
            ..CreateItem::new(owner)
        })
        .unwrap();
    let grand = store
        .create_item(CreateItem {
            parent_id: Some(child.id.to_string()),
            ..CreateItem::new(owner)
        })
        .unwrap();

    let list = |depth: Option<u32>| {
        let page = store
            .list_items(&ListQuery {
                parent: ParentFilter::Under {
                    parent: root.id,
                    depth,
                },
                order: SortOrder::Asc,
                ..Default::default()
            })
            .unwrap();
        let mut got = ids(&page.items);
        got.sort();
        got
    };

    // Whole subtree, parent excluded.
    let mut expected = vec![child.id, grand.id];
    expected.sort();
    assert_eq!(list(None), expected);

    // Bounded to direct children.
    assert_eq!(list(Some(1)), vec![child.id]);

    // Depth zero is the explicit "give me the parent row" form.
    assert_eq!(list(Some(0)), vec![root.id]);
}

#[test]
fn deleted_flag_selects_one_partition() {
    let store = store();
    let owner = Uuid::new_v4();
    let items = create_sequence(&store, owner, 3);
    store
        .delete_item(owner, &items[1].id.to_string(), false)
        .unwrap();

    let live = store
        .list_items(&ListQuery {
            owner: Some(owner),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(live.count, 2);
    assert!(live.items.iter().all(|i| !i.deleted));

    let deleted = store
        .list_items(&ListQuery {
            owner: Some(owner),
            show_deleted: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(deleted.count, 1);
    assert_eq!(deleted.items[0].id, items[1].id);
}

#[test]
fn owner_filter_separates_owners() {
    let store = store();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    create_sequence(&store, alice, 2);
    create_sequence(&store, bob, 3);

    let page = store
        .list_items(&ListQuery {
            owner: Some(alice),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.count, 2);
    assert!(page.items.iter().all(|i| i.owner_id == Some(alice)));
}

#[test]
fn updated_at_sort_tracks_mutations() {
    let store = store();
    let owner = Uuid::new_v4();
    let items = create_sequence(&store, owner, 3);

    // Touch the oldest item; it becomes the most recently updated.
    sleep(Duration::from_millis(2));
    store
        .update_item(
            owner,
            &items[0].id.to_string(),
            ItemPatch {
                content: Some("touched".into()),
                ..Default::default()
            },
        )
        .unwrap();

    let page = store
        .list_items(&ListQuery {
            owner: Some(owner),
            sort_field: SortField::UpdatedAt,
            order: SortOrder::Desc,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.items[0].id, items[0].id);
}
