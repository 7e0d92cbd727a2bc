use rusqlite::types::Value as SqlValue;

use crate::query::{ListQuery, ParentFilter};

/// Compiled SQL fragments with bound parameters.
pub(crate) struct CompiledQuery {
    pub where_clause: String,
    pub params: Vec<SqlValue>,
    pub order_clause: String,
    pub limit_clause: String,
}

/// Translate a listing request into the page-fetch query: all filters, the
/// keyset cursor, deterministic ordering, clamped limit.
pub(crate) fn compile_list_query(q: &ListQuery) -> CompiledQuery {
    let (conditions, params) = compile_filters(q, true);

    let dir = q.order.keyword();
    CompiledQuery {
        where_clause: where_clause(conditions),
        params,
        // Secondary sort on id keeps pages stable when the timestamp column
        // is coarser than insertion order.
        order_clause: format!("ORDER BY {} {}, id {}", q.sort_field.column(), dir, dir),
        limit_clause: format!("LIMIT {}", q.page_size()),
    }
}

/// Same filters with the cursor and limit dropped, for the total count shown
/// alongside a page.
pub(crate) fn compile_count_query(q: &ListQuery) -> CompiledQuery {
    let (conditions, params) = compile_filters(q, false);
    CompiledQuery {
        where_clause: where_clause(conditions),
        params,
        order_clause: String::new(),
        limit_clause: String::new(),
    }
}

fn where_clause(conditions: Vec<String>) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

fn compile_filters(q: &ListQuery, with_cursor: bool) -> (Vec<String>, Vec<SqlValue>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(owner) = q.owner {
        conditions.push("owner_id = ?".to_string());
        params.push(SqlValue::Text(owner.to_string()));
    }

    // One partition or the other, never both.
    conditions.push(format!("deleted = {}", if q.show_deleted { 1 } else { 0 }));

    match &q.parent {
        ParentFilter::Any => {}
        ParentFilter::Roots => {
            conditions.push("parent_id IS NULL".to_string());
        }
        ParentFilter::Under { parent, depth } => {
            params.push(SqlValue::Text(parent.to_string()));
            let range = match depth {
                // Whole subtree, parent excluded.
                None => "depth >= 1".to_string(),
                // Explicit zero selects the parent row itself.
                Some(0) => "depth = 0".to_string(),
                Some(d) => {
                    params.push(SqlValue::Integer(i64::from(*d)));
                    "depth BETWEEN 1 AND ?".to_string()
                }
            };
            conditions.push(format!(
                "id IN (SELECT descendant_id FROM item_closure WHERE ancestor_id = ? AND {})",
                range
            ));
        }
    }

    if with_cursor {
        if let Some(cursor) = q.cursor {
            conditions.push(format!(
                "{} {} ?",
                q.sort_field.column(),
                q.order.cursor_op()
            ));
            params.push(SqlValue::Integer(cursor.timestamp_micros()));
        }
    }

    (conditions, params)
}
