//! Table listing.
//!
//! ```bash
//! curl http://localhost:6969/api/tables
//! ```

use axum::{Json, extract::State};
use serde::Serialize;
use tablechat::TableId;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct TableListItem {
    pub id: TableId,
    pub name: String,
}

/// List all live tables ordered by id.
///
/// # Response
///
/// ```json
/// [{ "id": 1, "name": "Friday night" }]
/// ```
pub async fn list_tables(State(state): State<AppState>) -> Json<Vec<TableListItem>> {
    let items = state
        .registry
        .list()
        .await
        .into_iter()
        .map(|(id, name)| TableListItem { id, name })
        .collect();
    Json(items)
}
