//! Row-level persistence for `items`. No business rules and no closure-table
//! access; callers own validation and transaction scope.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::StoreError;
use crate::item::{Item, ItemId, ItemPatch};

pub(crate) const ITEM_COLUMNS: &str =
    "id, content, content_type, enc_item_key, deleted, owner_id, parent_id, created_at, updated_at";

/// Current time truncated to what the timestamp columns hold, so an `Item`
/// handed back from a mutation compares equal to its reloaded row.
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    timestamp_from_micros(now.timestamp_micros())
}

pub(crate) fn insert_row(conn: &Connection, item: &Item) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO items (id, content, content_type, enc_item_key, deleted, owner_id, parent_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            item.id.to_string(),
            item.content,
            item.content_type,
            item.enc_item_key,
            item.deleted as i32,
            item.owner_id.map(|o| o.to_string()),
            item.parent_id.map(|p| p.to_string()),
            item.created_at.timestamp_micros(),
            item.updated_at.timestamp_micros(),
        ],
    )
    .map_err(|e| StoreError::Storage(format!("insert item: {}", e)))?;
    Ok(())
}

pub(crate) fn get_row(conn: &Connection, id: ItemId) -> Result<Option<Item>, StoreError> {
    let sql = format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS);
    conn.query_row(&sql, params![id.to_string()], item_from_row)
        .optional()
        .map_err(|e| StoreError::Storage(format!("get item: {}", e)))
}

/// Partial update of the mutable columns; always refreshes `updated_at`.
/// `parent` is the already-validated parent id when the patch moves the item.
pub(crate) fn apply_fields(
    conn: &Connection,
    id: ItemId,
    patch: &ItemPatch,
    parent: Option<ItemId>,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let mut sets = vec!["updated_at = ?"];
    let mut values = vec![SqlValue::Integer(now.timestamp_micros())];

    if let Some(content) = &patch.content {
        sets.push("content = ?");
        values.push(SqlValue::Text(content.clone()));
    }
    if let Some(content_type) = &patch.content_type {
        sets.push("content_type = ?");
        values.push(SqlValue::Text(content_type.clone()));
    }
    if let Some(key) = &patch.enc_item_key {
        sets.push("enc_item_key = ?");
        values.push(SqlValue::Text(key.clone()));
    }
    if let Some(parent) = parent {
        sets.push("parent_id = ?");
        values.push(SqlValue::Text(parent.to_string()));
    }
    values.push(SqlValue::Text(id.to_string()));

    let sql = format!("UPDATE items SET {} WHERE id = ?", sets.join(", "));
    conn.execute(&sql, rusqlite::params_from_iter(values))
        .map_err(|e| StoreError::Storage(format!("apply fields: {}", e)))?;
    Ok(())
}

/// Flag one row deleted and scrub its content columns. The row itself is
/// never removed.
pub(crate) fn soft_delete(conn: &Connection, id: ItemId, now: DateTime<Utc>) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE items
            SET deleted = 1, content = NULL, content_type = NULL, enc_item_key = NULL, updated_at = ?1
          WHERE id = ?2",
        params![now.timestamp_micros(), id.to_string()],
    )
    .map_err(|e| StoreError::Storage(format!("soft delete: {}", e)))?;
    Ok(())
}

/// Map a row selected with [`ITEM_COLUMNS`] back to an `Item`.
pub(crate) fn item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    let id: String = row.get(0)?;
    let owner_id: Option<String> = row.get(5)?;
    let parent_id: Option<String> = row.get(6)?;
    let created_us: i64 = row.get(7)?;
    let updated_us: i64 = row.get(8)?;

    Ok(Item {
        id: parse_uuid_column(&id, 0)?,
        content: row.get(1)?,
        content_type: row.get(2)?,
        enc_item_key: row.get(3)?,
        deleted: row.get(4)?,
        owner_id: owner_id.as_deref().map(|s| parse_uuid_column(s, 5)).transpose()?,
        parent_id: parent_id.as_deref().map(|s| parse_uuid_column(s, 6)).transpose()?,
        created_at: timestamp_from_micros(created_us),
        updated_at: timestamp_from_micros(updated_us),
    })
}

fn parse_uuid_column(value: &str, index: usize) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn timestamp_from_micros(us: i64) -> DateTime<Utc> {
    Utc.timestamp_micros(us).single().unwrap_or_else(Utc::now)
}
