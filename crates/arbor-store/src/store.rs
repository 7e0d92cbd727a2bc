use crate::error::StoreError;
use crate::item::{CreateItem, Item, ItemId, ItemPage, ItemPatch, OwnerId};
use crate::query::ListQuery;

/// The full surface of the item store. Callers get a handle to an
/// implementation and pass it around; there is no process-wide singleton.
///
/// Mutations validate first (collecting every independent field violation),
/// then run as a single atomic transaction against both the item rows and the
/// closure index. Reads never take locks beyond the datastore's own.
pub trait ItemStore: Send + Sync {
    /// Create an item, optionally under a parent owned by the same owner.
    /// Seeds the closure self row and, when a parent is given, grafts the new
    /// item under the parent's ancestor chain.
    fn create_item(&self, input: CreateItem) -> Result<Item, StoreError>;

    /// Patch content fields and/or move the item (with its whole subtree)
    /// under a new parent. Deleted items are immutable; an empty patch is
    /// rejected as `NoChanges`.
    fn update_item(
        &self,
        owner_id: OwnerId,
        item_id: &str,
        patch: ItemPatch,
    ) -> Result<Item, StoreError>;

    /// Soft-delete an item; with `cascade` every descendant goes with it in
    /// the same transaction. Closure rows are left untouched either way.
    /// Re-deleting a deleted item is idempotent.
    fn delete_item(
        &self,
        owner_id: OwnerId,
        item_id: &str,
        cascade: bool,
    ) -> Result<Item, StoreError>;

    /// Point lookup, no ownership check; the caller decides what it may see.
    fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    /// The item's parent, or `None` for roots and unknown ids.
    fn get_parent_of(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    /// Keyset-paginated listing plus a cursor-independent total count.
    fn list_items(&self, query: &ListQuery) -> Result<ItemPage, StoreError>;
}
