use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::closure;
use crate::error::{StoreError, Violation, ViolationKind};
use crate::item::{CreateItem, Item, ItemId, ItemPage, ItemPatch, OwnerId};
use crate::query::ListQuery;
use crate::records;
use crate::sql_query::{compile_count_query, compile_list_query};
use crate::store::ItemStore;

/// SQLite-backed implementation of the ItemStore trait.
///
/// One connection guarded by a mutex; every mutation runs inside a single
/// transaction so the item row and the closure index can never drift apart.
/// Two stores moving overlapping subtrees concurrently each stay internally
/// consistent, but the final tree shape depends on commit order; that is the
/// datastore isolation's job, not ours.
pub struct SqliteItemStore {
    conn: Mutex<Connection>,
}

impl SqliteItemStore {
    /// Open (or create) a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn =
            Connection::open(path).map_err(|e| StoreError::Storage(format!("open: {}", e)))?;
        Self::init_with_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Storage(format!("open_in_memory: {}", e)))?;
        Self::init_with_connection(conn)
    }

    fn init_with_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                content TEXT,
                content_type TEXT,
                enc_item_key TEXT,
                deleted INTEGER NOT NULL DEFAULT 0,
                owner_id TEXT,
                parent_id TEXT REFERENCES items(id) ON DELETE SET NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS item_closure (
                ancestor_id TEXT NOT NULL REFERENCES items(id),
                descendant_id TEXT NOT NULL REFERENCES items(id),
                depth INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (ancestor_id, descendant_id)
            );

            CREATE INDEX IF NOT EXISTS idx_items_owner ON items(owner_id);
            CREATE INDEX IF NOT EXISTS idx_items_parent ON items(parent_id);
            CREATE INDEX IF NOT EXISTS idx_items_created ON items(created_at);
            CREATE INDEX IF NOT EXISTS idx_items_updated ON items(updated_at);
            CREATE INDEX IF NOT EXISTS idx_closure_descendant ON item_closure(descendant_id);
            ",
        )
        .map_err(|e| StoreError::Storage(format!("init_schema: {}", e)))?;
        Ok(())
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    /// Closure-index view: every descendant of `item` (self included) with
    /// its depth. This is the read the pagination engine folds into its
    /// subtree filter; exposed for callers auditing tree structure.
    pub fn descendants_of(
        &self,
        item: ItemId,
        max_depth: Option<u32>,
    ) -> Result<Vec<(ItemId, u32)>, StoreError> {
        let conn = self.lock_conn()?;
        closure::descendants_of(&conn, item, max_depth)
    }

    /// Closure-index view: every ancestor of `item` (self included) with its
    /// depth.
    pub fn ancestors_of(&self, item: ItemId) -> Result<Vec<(ItemId, u32)>, StoreError> {
        let conn = self.lock_conn()?;
        closure::ancestors_of(&conn, item)
    }

    /// Resolve and authorize the target item of a mutation. Pushes a
    /// violation per failed check and returns the row when one exists.
    fn validate_item(
        conn: &Connection,
        owner_id: OwnerId,
        raw_id: &str,
        violations: &mut Vec<Violation>,
    ) -> Result<Option<Item>, StoreError> {
        let id = match Uuid::parse_str(raw_id) {
            Ok(id) => id,
            Err(_) => {
                violations.push(Violation::new(
                    ViolationKind::InvalidItemId,
                    "itemId",
                    format!("'{}' is not a valid item id", raw_id),
                ));
                return Ok(None);
            }
        };
        match records::get_row(conn, id)? {
            None => {
                violations.push(Violation::new(
                    ViolationKind::ItemNotFound,
                    "itemId",
                    format!("item {} does not exist", id),
                ));
                Ok(None)
            }
            Some(item) => {
                if item.owner_id != Some(owner_id) {
                    violations.push(Violation::new(
                        ViolationKind::ItemOwnershipMismatch,
                        "itemId",
                        "item belongs to a different owner",
                    ));
                }
                Ok(Some(item))
            }
        }
    }

    /// Resolve and authorize a requested parent. The closure structure must
    /// never span owners, so a parent under another owner is rejected here.
    fn validate_parent(
        conn: &Connection,
        owner_id: OwnerId,
        raw_id: &str,
        violations: &mut Vec<Violation>,
    ) -> Result<Option<Item>, StoreError> {
        let id = match Uuid::parse_str(raw_id) {
            Ok(id) => id,
            Err(_) => {
                violations.push(Violation::new(
                    ViolationKind::InvalidParentId,
                    "parentId",
                    format!("'{}' is not a valid item id", raw_id),
                ));
                return Ok(None);
            }
        };
        match records::get_row(conn, id)? {
            None => {
                violations.push(Violation::new(
                    ViolationKind::ParentNotFound,
                    "parentId",
                    format!("item {} does not exist", id),
                ));
                Ok(None)
            }
            Some(parent) => {
                if parent.owner_id != Some(owner_id) {
                    violations.push(Violation::new(
                        ViolationKind::ParentOwnershipMismatch,
                        "parentId",
                        "parent belongs to a different owner",
                    ));
                }
                Ok(Some(parent))
            }
        }
    }
}

impl ItemStore for SqliteItemStore {
    fn create_item(&self, input: CreateItem) -> Result<Item, StoreError> {
        let conn = self.lock_conn()?;

        let mut violations = Vec::new();
        let parent = match &input.parent_id {
            Some(raw) => Self::validate_parent(&conn, input.owner_id, raw, &mut violations)?,
            None => None,
        };
        if !violations.is_empty() {
            return Err(StoreError::from_violations(violations));
        }

        let now = records::now();
        let item = Item {
            id: Uuid::new_v4(),
            content: input.content,
            content_type: input.content_type,
            enc_item_key: input.enc_item_key,
            owner_id: Some(input.owner_id),
            parent_id: parent.as_ref().map(|p| p.id),
            deleted: false,
            created_at: now,
            updated_at: now,
        };

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StoreError::Storage(format!("begin tx: {}", e)))?;
        records::insert_row(&tx, &item)?;
        closure::seed_self(&tx, item.id)?;
        if let Some(parent) = &parent {
            closure::graft_subtree(&tx, item.id, parent.id)?;
        }
        tx.commit()
            .map_err(|e| StoreError::Storage(format!("commit: {}", e)))?;

        Ok(item)
    }

    fn update_item(
        &self,
        owner_id: OwnerId,
        item_id: &str,
        patch: ItemPatch,
    ) -> Result<Item, StoreError> {
        let conn = self.lock_conn()?;

        let mut violations = Vec::new();
        if patch.is_empty() {
            violations.push(Violation::new(
                ViolationKind::NoChanges,
                "patch",
                "no mutable field set",
            ));
        }

        let item = Self::validate_item(&conn, owner_id, item_id, &mut violations)?;
        if let Some(item) = &item {
            if item.owner_id == Some(owner_id) && item.deleted {
                violations.push(Violation::new(
                    ViolationKind::ItemDeleted,
                    "itemId",
                    "deleted items cannot be updated",
                ));
            }
        }

        let mut new_parent = None;
        if let Some(raw) = &patch.parent_id {
            new_parent = Self::validate_parent(&conn, owner_id, raw, &mut violations)?;
            if let (Some(item), Some(parent)) = (&item, &new_parent) {
                // Re-parenting under the item's own subtree (itself included)
                // would cut the subtree out of the tree and corrupt the index.
                let descendants = closure::descendants_of(&conn, item.id, None)?;
                if descendants.iter().any(|(d, _)| *d == parent.id) {
                    violations.push(Violation::new(
                        ViolationKind::CyclicParent,
                        "parentId",
                        "new parent is inside the item's own subtree",
                    ));
                }
            }
        }

        if !violations.is_empty() {
            return Err(StoreError::from_violations(violations));
        }
        let Some(item) = item else {
            return Err(StoreError::Storage("item lookup failed after validation".into()));
        };

        let now = records::now();
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StoreError::Storage(format!("begin tx: {}", e)))?;
        records::apply_fields(&tx, item.id, &patch, new_parent.as_ref().map(|p| p.id), now)?;
        if let Some(parent) = &new_parent {
            closure::detach_subtree(&tx, item.id)?;
            closure::reattach_subtree(&tx, item.id, parent.id)?;
        }
        tx.commit()
            .map_err(|e| StoreError::Storage(format!("commit: {}", e)))?;

        records::get_row(&conn, item.id)?
            .ok_or_else(|| StoreError::Storage("updated item vanished".into()))
    }

    fn delete_item(
        &self,
        owner_id: OwnerId,
        item_id: &str,
        cascade: bool,
    ) -> Result<Item, StoreError> {
        let conn = self.lock_conn()?;

        let mut violations = Vec::new();
        // Re-deleting an already deleted item is allowed; no deleted check.
        let item = Self::validate_item(&conn, owner_id, item_id, &mut violations)?;
        if !violations.is_empty() {
            return Err(StoreError::from_violations(violations));
        }
        let Some(item) = item else {
            return Err(StoreError::Storage("item lookup failed after validation".into()));
        };

        let now = records::now();
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StoreError::Storage(format!("begin tx: {}", e)))?;
        if cascade {
            // One set-based statement covers the whole subtree, self row
            // included. Closure rows stay: deleted items keep their position.
            tx.execute(
                "UPDATE items
                    SET deleted = 1, content = NULL, content_type = NULL,
                        enc_item_key = NULL, updated_at = ?1
                  WHERE id IN (SELECT descendant_id FROM item_closure WHERE ancestor_id = ?2)",
                params![now.timestamp_micros(), item.id.to_string()],
            )
            .map_err(|e| StoreError::Storage(format!("cascade delete: {}", e)))?;
        } else {
            records::soft_delete(&tx, item.id, now)?;
        }
        tx.commit()
            .map_err(|e| StoreError::Storage(format!("commit: {}", e)))?;

        records::get_row(&conn, item.id)?
            .ok_or_else(|| StoreError::Storage("deleted item vanished".into()))
    }

    fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let conn = self.lock_conn()?;
        records::get_row(&conn, id)
    }

    fn get_parent_of(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let conn = self.lock_conn()?;
        let Some(item) = records::get_row(&conn, id)? else {
            return Ok(None);
        };
        match item.parent_id {
            Some(parent_id) => records::get_row(&conn, parent_id),
            None => Ok(None),
        }
    }

    fn list_items(&self, query: &ListQuery) -> Result<ItemPage, StoreError> {
        let conn = self.lock_conn()?;

        let compiled = compile_list_query(query);
        let sql = format!(
            "SELECT {} FROM items {} {} {}",
            records::ITEM_COLUMNS,
            compiled.where_clause,
            compiled.order_clause,
            compiled.limit_clause
        );
        let params_ref: Vec<&dyn rusqlite::types::ToSql> = compiled
            .params
            .iter()
            .map(|p| p as &dyn rusqlite::types::ToSql)
            .collect();

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Storage(format!("prepare list: {} (sql: {})", e, sql)))?;
        let rows = stmt
            .query_map(params_ref.as_slice(), records::item_from_row)
            .map_err(|e| StoreError::Storage(format!("query list: {}", e)))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row.map_err(|e| StoreError::Storage(format!("list row: {}", e)))?);
        }

        let count_compiled = compile_count_query(query);
        let count_sql = format!("SELECT COUNT(*) FROM items {}", count_compiled.where_clause);
        let count_params: Vec<&dyn rusqlite::types::ToSql> = count_compiled
            .params
            .iter()
            .map(|p| p as &dyn rusqlite::types::ToSql)
            .collect();
        let count: i64 = conn
            .query_row(&count_sql, count_params.as_slice(), |row| row.get(0))
            .map_err(|e| StoreError::Storage(format!("count: {}", e)))?;

        Ok(ItemPage {
            items,
            count: count as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_on_disk_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.db");

        let owner = Uuid::new_v4();
        let created = {
            let store = SqliteItemStore::open(&path).unwrap();
            store
                .create_item(CreateItem {
                    content: Some("hello".into()),
                    ..CreateItem::new(owner)
                })
                .unwrap()
        };

        let store = SqliteItemStore::open(&path).unwrap();
        let loaded = store.get_item(created.id).unwrap().unwrap();
        assert_eq!(loaded, created);
    }

    #[test]
    fn create_assigns_id_and_timestamps() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let item = store.create_item(CreateItem::new(owner)).unwrap();
        assert_eq!(item.owner_id, Some(owner));
        assert!(item.parent_id.is_none());
        assert!(!item.deleted);
        assert_eq!(item.created_at, item.updated_at);
    }

    #[test]
    fn validation_failure_writes_nothing() {
        let store = SqliteItemStore::open_in_memory().unwrap();
        let owner = Uuid::new_v4();

        let err = store
            .create_item(CreateItem {
                parent_id: Some("definitely-not-a-uuid".into()),
                ..CreateItem::new(owner)
            })
            .unwrap_err();
        assert!(err.has_violation(ViolationKind::InvalidParentId));

        let page = store.list_items(&ListQuery::default()).unwrap();
        assert_eq!(page.count, 0);
    }
}
