//! Set-based maintenance of the `item_closure` table.
//!
//! Every operation here is a single declarative statement so the caller can
//! run it inside its transaction without per-row round trips. Call sites
//! validate ids before calling in; these functions assume existing items.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::StoreError;
use crate::item::ItemId;

/// Insert the self-referencing row `(item, item, 0)`. Every item gets exactly
/// one at creation.
pub(crate) fn seed_self(conn: &Connection, item: ItemId) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO item_closure (ancestor_id, descendant_id, depth) VALUES (?1, ?1, 0)",
        params![item.to_string()],
    )
    .map_err(|e| StoreError::Storage(format!("seed self edge: {}", e)))?;
    Ok(())
}

/// Link a freshly created `child` to every ancestor of `parent` (the parent
/// included), depth shifted by one. Only valid for a child with no
/// descendants yet; moves go through detach + reattach.
pub(crate) fn graft_subtree(
    conn: &Connection,
    child: ItemId,
    parent: ItemId,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO item_closure (ancestor_id, descendant_id, depth)
         SELECT ancestor_id, ?1, depth + 1
           FROM item_closure
          WHERE descendant_id = ?2",
        params![child.to_string(), parent.to_string()],
    )
    .map_err(|e| StoreError::Storage(format!("graft subtree: {}", e)))?;
    Ok(())
}

/// Cut the subtree rooted at `item` loose from everything above it: delete
/// every row whose descendant lies inside the subtree and whose ancestor lies
/// outside it. Rows internal to the subtree (self rows included) survive, so
/// the subtree keeps its own shape while detached.
pub(crate) fn detach_subtree(conn: &Connection, item: ItemId) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM item_closure
          WHERE descendant_id IN (SELECT descendant_id FROM item_closure WHERE ancestor_id = ?1)
            AND ancestor_id NOT IN (SELECT descendant_id FROM item_closure WHERE ancestor_id = ?1)",
        params![item.to_string()],
    )
    .map_err(|e| StoreError::Storage(format!("detach subtree: {}", e)))?;
    Ok(())
}

/// Cross-join the ancestors of `new_parent` (itself included) with the
/// subtree rooted at `item` (itself included), summing depths across the new
/// edge. Together with [`detach_subtree`] this re-parents the whole subtree,
/// descendants' ancestor links included.
pub(crate) fn reattach_subtree(
    conn: &Connection,
    item: ItemId,
    new_parent: ItemId,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO item_closure (ancestor_id, descendant_id, depth)
         SELECT sup.ancestor_id, sub.descendant_id, sup.depth + sub.depth + 1
           FROM item_closure AS sup, item_closure AS sub
          WHERE sup.descendant_id = ?2
            AND sub.ancestor_id = ?1",
        params![item.to_string(), new_parent.to_string()],
    )
    .map_err(|e| StoreError::Storage(format!("reattach subtree: {}", e)))?;
    Ok(())
}

/// All `(descendant, depth)` pairs under `item`, the self row included,
/// optionally bounded by `max_depth`. Ordered by depth then id so output is
/// deterministic.
pub(crate) fn descendants_of(
    conn: &Connection,
    item: ItemId,
    max_depth: Option<u32>,
) -> Result<Vec<(ItemId, u32)>, StoreError> {
    let sql = match max_depth {
        Some(_) => {
            "SELECT descendant_id, depth FROM item_closure
              WHERE ancestor_id = ?1 AND depth <= ?2
              ORDER BY depth, descendant_id"
        }
        None => {
            "SELECT descendant_id, depth FROM item_closure
              WHERE ancestor_id = ?1
              ORDER BY depth, descendant_id"
        }
    };
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| StoreError::Storage(format!("prepare descendants: {}", e)))?;
    let rows = match max_depth {
        Some(d) => stmt.query_map(params![item.to_string(), d], edge_from_row),
        None => stmt.query_map(params![item.to_string()], edge_from_row),
    }
    .map_err(|e| StoreError::Storage(format!("query descendants: {}", e)))?;
    collect_edges(rows)
}

/// All `(ancestor, depth)` pairs above `item`, the self row included.
pub(crate) fn ancestors_of(
    conn: &Connection,
    item: ItemId,
) -> Result<Vec<(ItemId, u32)>, StoreError> {
    let mut stmt = conn
        .prepare(
            "SELECT ancestor_id, depth FROM item_closure
              WHERE descendant_id = ?1
              ORDER BY depth, ancestor_id",
        )
        .map_err(|e| StoreError::Storage(format!("prepare ancestors: {}", e)))?;
    let rows = stmt
        .query_map(params![item.to_string()], edge_from_row)
        .map_err(|e| StoreError::Storage(format!("query ancestors: {}", e)))?;
    collect_edges(rows)
}

fn edge_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, u32)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn collect_edges(
    rows: impl Iterator<Item = rusqlite::Result<(String, u32)>>,
) -> Result<Vec<(ItemId, u32)>, StoreError> {
    let mut edges = Vec::new();
    for row in rows {
        let (id_str, depth) =
            row.map_err(|e| StoreError::Storage(format!("closure row: {}", e)))?;
        let id = Uuid::parse_str(&id_str)
            .map_err(|e| StoreError::Storage(format!("closure row id: {}", e)))?;
        edges.push((id, depth));
    }
    Ok(edges)
}
