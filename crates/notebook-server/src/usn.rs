//! Per-user update sequence numbers
//!
//! Every mutation takes the next USN from `users.max_usn` inside the same
//! transaction that writes the row. Writers open their transaction with
//! `BEGIN IMMEDIATE`, so allocation for a user is serialized and the USN
//! order is the commit order.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{ServiceError, ServiceResult};

/// Allocate the next USN for `user_id`
pub fn increment(conn: &Connection, user_id: i64) -> ServiceResult<i64> {
    conn.query_row(
        "UPDATE users SET max_usn = max_usn + 1 WHERE id = ? RETURNING max_usn",
        params![user_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| ServiceError::NotFound("user".to_string()))
}

/// Highest USN allocated for `user_id`
pub fn current(conn: &Connection, user_id: i64) -> ServiceResult<i64> {
    conn.query_row(
        "SELECT max_usn FROM users WHERE id = ?",
        params![user_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| ServiceError::NotFound("user".to_string()))
}
