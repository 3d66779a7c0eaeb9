//! Room labels.
//!
//! A room is either the lobby or a table room, `table` followed by the
//! table's id (e.g. `table15103`).

use crate::table::TableId;

pub const LOBBY_ROOM: &str = "lobby";
pub const TABLE_ROOM_PREFIX: &str = "table";

/// Whether a label names the lobby or has the table prefix
pub fn is_valid_room(room: &str) -> bool {
    room == LOBBY_ROOM || room.starts_with(TABLE_ROOM_PREFIX)
}

/// Parse the table id out of a table room; the whole suffix must be digits
pub fn parse_table_room(room: &str) -> Option<TableId> {
    let digits = room.strip_prefix(TABLE_ROOM_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Room label of a table
pub fn table_room(table_id: TableId) -> String {
    format!("{TABLE_ROOM_PREFIX}{table_id}")
}
