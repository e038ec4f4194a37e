//! Accounts and login sessions
//!
//! Passwords are stored as Argon2id PHC strings, which carry their own
//! salt and parameters. A session key is 32 random bytes, URL-safe base64,
//! valid until `expires_at` (unix seconds).

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use notebook_core::api::LoginResponse;
use notebook_core::Clock;
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::uuid_column;
use crate::error::{ServiceError, ServiceResult};

const SALT_LEN: usize = 16;
const SESSION_KEY_LEN: usize = 32;

/// An account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub uuid: Uuid,
    pub email: String,
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::encode_b64(&random_bytes::<SALT_LEN>())
        .map_err(|e| ServiceError::Internal(format!("invalid salt: {}", e)))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ServiceError::Internal(format!("failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// A stored hash that does not parse never matches
fn verify_password(hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Create an account
pub fn create_user(
    conn: &Connection,
    clock: &dyn Clock,
    email: &str,
    password: &str,
) -> ServiceResult<User> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ServiceError::Validation(format!("invalid email: {}", email)));
    }
    if password.is_empty() {
        return Err(ServiceError::Validation(
            "password must not be empty".to_string(),
        ));
    }

    let exists: Option<i64> = conn
        .query_row(
            "SELECT id FROM users WHERE email = ?",
            params![email],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_some() {
        return Err(ServiceError::Conflict(format!(
            "an account for {} already exists",
            email
        )));
    }

    let uuid = Uuid::new_v4();
    conn.execute(
        "INSERT INTO users (uuid, email, password_hash, max_usn, created_at) \
         VALUES (?, ?, ?, 0, ?)",
        params![
            uuid.to_string(),
            email,
            hash_password(password)?,
            clock.now_secs(),
        ],
    )?;
    info!("Created user {}", email);

    Ok(User {
        id: conn.last_insert_rowid(),
        uuid,
        email,
    })
}

/// Check credentials and open a session
pub fn login(
    conn: &Connection,
    clock: &dyn Clock,
    ttl_secs: i64,
    email: &str,
    password: &str,
) -> ServiceResult<LoginResponse> {
    let email = email.trim().to_lowercase();
    let account: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE email = ?",
            params![email],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((user_id, hash)) = account else {
        debug!("Login for unknown email {}", email);
        return Err(ServiceError::InvalidCredentials);
    };
    if !verify_password(&hash, password) {
        debug!("Wrong password for {}", email);
        return Err(ServiceError::InvalidCredentials);
    }

    let now = clock.now_secs();
    let purged = conn.execute("DELETE FROM sessions WHERE expires_at <= ?", params![now])?;
    if purged > 0 {
        debug!("Purged {} expired sessions", purged);
    }

    let key = URL_SAFE_NO_PAD.encode(random_bytes::<SESSION_KEY_LEN>());
    let expires_at = now + ttl_secs;
    conn.execute(
        "INSERT INTO sessions (key, user_id, expires_at, last_used_at) VALUES (?, ?, ?, ?)",
        params![key, user_id, expires_at, now],
    )?;
    info!("User {} logged in", email);

    Ok(LoginResponse { key, expires_at })
}

/// Resolve a session key to its user
///
/// Returns `None` for unknown and expired keys; expired sessions are removed.
pub fn authenticate(
    conn: &Connection,
    clock: &dyn Clock,
    key: &str,
) -> ServiceResult<Option<User>> {
    let row: Option<(User, i64)> = conn
        .query_row(
            "SELECT u.id, u.uuid, u.email, s.expires_at \
             FROM sessions s JOIN users u ON u.id = s.user_id WHERE s.key = ?",
            params![key],
            |row| {
                Ok((
                    User {
                        id: row.get(0)?,
                        uuid: uuid_column(row, 1)?,
                        email: row.get(2)?,
                    },
                    row.get(3)?,
                ))
            },
        )
        .optional()?;

    let Some((user, expires_at)) = row else {
        return Ok(None);
    };

    let now = clock.now_secs();
    if expires_at <= now {
        conn.execute("DELETE FROM sessions WHERE key = ?", params![key])?;
        debug!("Session for {} expired", user.email);
        return Ok(None);
    }

    conn.execute(
        "UPDATE sessions SET last_used_at = ? WHERE key = ?",
        params![now, key],
    )?;
    Ok(Some(user))
}

/// Invalidate a session key
pub fn logout(conn: &Connection, key: &str) -> ServiceResult<()> {
    conn.execute("DELETE FROM sessions WHERE key = ?", params![key])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_conn;
    use notebook_core::FixedClock;

    const TTL: i64 = 60;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("hunter2").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&hash, "hunter2"));
        assert!(!verify_password(&hash, "hunter3"));
        assert!(!verify_password("%%%", "hunter2"));
    }

    #[test]
    fn test_same_password_gets_distinct_hashes() {
        assert_ne!(hash_password("pw").unwrap(), hash_password("pw").unwrap());
    }

    #[test]
    fn test_create_user_rejects_duplicates() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(100);
        create_user(&conn, &clock, "Alice@Example.com", "pw").unwrap();

        assert!(matches!(
            create_user(&conn, &clock, "alice@example.com", "pw"),
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            create_user(&conn, &clock, "nobody", "pw"),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn test_login_and_authenticate() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(100);
        let user = create_user(&conn, &clock, "alice@example.com", "pw").unwrap();

        let session = login(&conn, &clock, TTL, "alice@example.com", "pw").unwrap();
        assert_eq!(session.expires_at, 160);
        assert_eq!(session.key.len(), 43);

        assert_eq!(authenticate(&conn, &clock, &session.key).unwrap(), Some(user));
    }

    #[test]
    fn test_login_with_wrong_password() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(100);
        create_user(&conn, &clock, "alice@example.com", "pw").unwrap();

        for (email, password) in [("alice@example.com", "nope"), ("bob@example.com", "pw")] {
            assert!(matches!(
                login(&conn, &clock, TTL, email, password),
                Err(ServiceError::InvalidCredentials)
            ));
        }
    }

    #[test]
    fn test_expired_session_is_unauthorized() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(100);
        create_user(&conn, &clock, "alice@example.com", "pw").unwrap();
        let session = login(&conn, &clock, TTL, "alice@example.com", "pw").unwrap();

        clock.advance_secs(TTL);
        assert!(authenticate(&conn, &clock, &session.key).unwrap().is_none());
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_login_purges_abandoned_sessions() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(100);
        create_user(&conn, &clock, "alice@example.com", "pw").unwrap();
        create_user(&conn, &clock, "bob@example.com", "pw").unwrap();
        let abandoned = login(&conn, &clock, TTL, "alice@example.com", "pw").unwrap();
        login(&conn, &clock, TTL, "alice@example.com", "pw").unwrap();

        clock.advance_secs(TTL);
        let fresh = login(&conn, &clock, TTL, "bob@example.com", "pw").unwrap();

        let keys: Vec<String> = conn
            .prepare("SELECT key FROM sessions")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(keys, vec![fresh.key]);
        assert!(!keys.contains(&abandoned.key));
    }

    #[test]
    fn test_logout_invalidates_key() {
        let conn = test_conn();
        let clock = FixedClock::at_secs(100);
        create_user(&conn, &clock, "alice@example.com", "pw").unwrap();
        let session = login(&conn, &clock, TTL, "alice@example.com", "pw").unwrap();

        logout(&conn, &session.key).unwrap();
        assert!(authenticate(&conn, &clock, &session.key).unwrap().is_none());
        assert!(authenticate(&conn, &clock, "bogus").unwrap().is_none());
    }
}
