//! Wire types for the sync API
//!
//! JSON bodies exchanged between the client and the server. Timestamps
//! are unix seconds for `current_time`, `full_sync_before` and
//! `expires_at`, and unix nanoseconds for `added_on` and `edited_on`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the client version on every request
pub const CLI_VERSION_HEADER: &str = "CLI-Version";

/// Response of `GET /v1/sync/state`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStateResponse {
    /// Clients whose last sync happened before this epoch second must full sync
    pub full_sync_before: i64,
    /// Highest USN assigned to the user
    pub max_usn: i64,
    /// Server wall clock, unix seconds
    pub current_time: i64,
}

/// Query string of `GET /v1/sync/fragment`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FragmentParams {
    pub after_usn: i64,
}

/// Response of `GET /v1/sync/fragment`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncFragment {
    /// Highest USN among the rows of this fragment
    pub frag_max_usn: i64,
    /// Highest USN assigned to the user when the fragment was read
    pub user_max_usn: i64,
    pub current_time: i64,
    #[serde(default)]
    pub notes: Vec<NoteRecord>,
    #[serde(default)]
    pub books: Vec<BookRecord>,
    #[serde(default)]
    pub expunged_notes: Vec<Uuid>,
    #[serde(default)]
    pub expunged_books: Vec<Uuid>,
}

/// Server copy of a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub uuid: Uuid,
    /// Empty when `deleted` is true
    pub name: String,
    pub usn: i64,
    pub deleted: bool,
    pub added_on: i64,
}

/// Server copy of a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub uuid: Uuid,
    pub book_uuid: Uuid,
    /// Empty when `deleted` is true
    pub body: String,
    pub public: bool,
    pub added_on: i64,
    pub edited_on: i64,
    pub usn: i64,
    pub deleted: bool,
}

/// Body of `POST /v1/books`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBookRequest {
    pub name: String,
}

/// Body of `PATCH /v1/books/{uuid}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBookRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Body of `POST /v1/notes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNoteRequest {
    pub book_uuid: Uuid,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_on: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_on: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

/// Body of `PATCH /v1/notes/{uuid}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNoteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

/// Body of `POST /v1/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response of `POST /v1/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Opaque bearer credential
    pub key: String,
    /// Unix seconds
    pub expires_at: i64,
}

/// Error body returned with every non-2xx status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    #[serde(default)]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_note_omits_unset_fields() {
        let req = UpdateNoteRequest {
            content: Some("hello".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({"content": "hello"}));
    }

    #[test]
    fn test_fragment_accepts_missing_lists() {
        let json = r#"{"frag_max_usn": 3, "user_max_usn": 5, "current_time": 10}"#;
        let frag: SyncFragment = serde_json::from_str(json).unwrap();
        assert_eq!(frag.frag_max_usn, 3);
        assert!(frag.books.is_empty());
        assert!(frag.expunged_notes.is_empty());
    }

    #[test]
    fn test_create_note_wire_names() {
        let book_uuid = Uuid::new_v4();
        let req = CreateNoteRequest {
            book_uuid,
            content: "body".to_string(),
            added_on: Some(7),
            edited_on: None,
            public: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["book_uuid"], book_uuid.to_string());
        assert_eq!(json["content"], "body");
        assert_eq!(json["added_on"], 7);
        assert!(json.get("edited_on").is_none());
    }
}
