use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique item identifier (UUID v4), generated at insert.
pub type ItemId = Uuid;

/// Identifier of the owning user. Authentication happens upstream; the store
/// only ever compares owner ids for equality.
pub type OwnerId = Uuid;

/// The persisted entity.
///
/// `content`, `content_type` and `enc_item_key` are opaque to the store
/// (clients may or may not encrypt; we never look inside). An item whose
/// owner was removed keeps a `None` owner and stays readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub content: Option<String>,
    pub content_type: Option<String>,
    pub enc_item_key: Option<String>,
    pub owner_id: Option<OwnerId>,
    pub parent_id: Option<ItemId>,
    /// Soft-delete flag. Deleted items keep their row and their closure
    /// position; their content fields are nulled.
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// True when this is a root of the tree.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Input to `create_item`.
///
/// `parent_id` arrives as the raw string the resolver layer received, so a
/// malformed value can be rejected as `InvalidParentId` before any lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateItem {
    pub owner_id: OwnerId,
    pub content: Option<String>,
    pub content_type: Option<String>,
    pub enc_item_key: Option<String>,
    pub parent_id: Option<String>,
}

impl CreateItem {
    pub fn new(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            content: None,
            content_type: None,
            enc_item_key: None,
            parent_id: None,
        }
    }
}

/// Partial update for `update_item`. `None` means "leave unchanged"; a patch
/// with every field `None` is rejected rather than silently succeeding.
///
/// Setting `parent_id` moves the item (and its whole subtree) under the new
/// parent; clearing a parent is not part of the surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub content: Option<String>,
    pub content_type: Option<String>,
    pub enc_item_key: Option<String>,
    pub parent_id: Option<String>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.content_type.is_none()
            && self.enc_item_key.is_none()
            && self.parent_id.is_none()
    }
}

/// One page of list results.
///
/// `count` is the total number of rows matching the filters with the keyset
/// cursor ignored, for "n of m" display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_serde_round_trip() {
        let item = Item {
            id: Uuid::new_v4(),
            content: Some("002|aGVsbG8=".into()),
            content_type: Some("Note".into()),
            enc_item_key: Some("002|a2V5".into()),
            owner_id: Some(Uuid::new_v4()),
            parent_id: None,
            deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&item).unwrap();
        let back: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(item, back);
    }

    #[test]
    fn empty_patch_detected() {
        assert!(ItemPatch::default().is_empty());

        let patch = ItemPatch {
            content: Some("x".into()),
            ..Default::default()
        };
        assert!(!patch.is_empty());

        let patch = ItemPatch {
            parent_id: Some(Uuid::new_v4().to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn root_detection() {
        let mut item = Item {
            id: Uuid::new_v4(),
            content: None,
            content_type: None,
            enc_item_key: None,
            owner_id: None,
            parent_id: None,
            deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(item.is_root());
        item.parent_id = Some(Uuid::new_v4());
        assert!(!item.is_root());
    }
}
