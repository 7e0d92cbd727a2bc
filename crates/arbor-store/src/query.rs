use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::{ItemId, OwnerId};

/// Page size when the caller passes no usable limit.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Hard cap on page size. Larger requests are truncated, never rejected.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Restriction on an item's position in the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ParentFilter {
    /// No restriction.
    #[default]
    Any,
    /// Only items without a parent.
    Roots,
    /// Items inside the subtree rooted at `parent`, resolved through the
    /// closure table. `depth: None` means the whole subtree, `Some(0)` the
    /// parent row itself, `Some(n)` descendants down to distance `n`.
    Under {
        parent: ItemId,
        depth: Option<u32>,
    },
}

/// Timestamp column driving the sort and the keyset cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub(crate) fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

impl SortOrder {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            SortOrder::Desc => "DESC",
            SortOrder::Asc => "ASC",
        }
    }

    /// Comparison the keyset cursor applies to the sort column: rows strictly
    /// past the cursor in scan direction.
    pub(crate) fn cursor_op(self) -> &'static str {
        match self {
            SortOrder::Desc => "<",
            SortOrder::Asc => ">",
        }
    }
}

/// A paginated listing request.
///
/// `show_deleted` selects one partition: `false` lists live items, `true`
/// lists soft-deleted ones. It never means "both".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    pub owner: Option<OwnerId>,
    pub parent: ParentFilter,
    pub show_deleted: bool,
    pub limit: Option<u32>,
    /// Keyset cursor: the sort-field value of the last row of the previous
    /// page. Absent means first page.
    pub cursor: Option<DateTime<Utc>>,
    pub sort_field: SortField,
    pub order: SortOrder,
}

impl ListQuery {
    /// Effective page size: missing or zero falls back to the default,
    /// anything above the cap is truncated.
    pub(crate) fn page_size(&self) -> u32 {
        match self.limit {
            None | Some(0) => DEFAULT_PAGE_SIZE,
            Some(n) => n.min(MAX_PAGE_SIZE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn default_query_lists_live_items_newest_first() {
        let q = ListQuery::default();
        assert_eq!(q.parent, ParentFilter::Any);
        assert!(!q.show_deleted);
        assert_eq!(q.sort_field, SortField::CreatedAt);
        assert_eq!(q.order, SortOrder::Desc);
        assert!(q.cursor.is_none());
    }

    #[test]
    fn page_size_clamping() {
        let mut q = ListQuery::default();
        assert_eq!(q.page_size(), DEFAULT_PAGE_SIZE);

        q.limit = Some(0);
        assert_eq!(q.page_size(), DEFAULT_PAGE_SIZE);

        q.limit = Some(13);
        assert_eq!(q.page_size(), 13);

        q.limit = Some(100_000);
        assert_eq!(q.page_size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn cursor_operator_matches_scan_direction() {
        assert_eq!(SortOrder::Asc.cursor_op(), ">");
        assert_eq!(SortOrder::Desc.cursor_op(), "<");
    }

    #[test]
    fn query_serde_round_trip() {
        let q = ListQuery {
            owner: Some(Uuid::new_v4()),
            parent: ParentFilter::Under {
                parent: Uuid::new_v4(),
                depth: Some(2),
            },
            show_deleted: true,
            limit: Some(25),
            cursor: Some(Utc::now()),
            sort_field: SortField::UpdatedAt,
            order: SortOrder::Asc,
        };
        let json = serde_json::to_string(&q).unwrap();
        let back: ListQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(q, back);
    }
}
