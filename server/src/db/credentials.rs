//! Credential-store collaborator: the account table the chat core consults
//! for login lookups, registration, and nickname renames.
//!
//! The chat protocol itself never sees passwords — sessions arrive with a
//! nickname already authenticated by the login layer. This module is what
//! that layer calls.

use rusqlite::{params, OptionalExtension};

use super::DbPool;

/// Nickname rules: 5 to 12 characters, alphanumeric at both ends, interior
/// characters alphanumeric or a single `.` / `_` / `-` separator (no two
/// separators in a row).
pub fn is_valid_nickname(nickname: &str) -> bool {
    let chars: Vec<char> = nickname.chars().collect();
    if chars.len() < 5 || chars.len() > 12 {
        return false;
    }
    if !chars[0].is_ascii_alphanumeric() || !chars[chars.len() - 1].is_ascii_alphanumeric() {
        return false;
    }
    let mut previous_was_separator = false;
    for &c in &chars[1..chars.len() - 1] {
        if c.is_ascii_alphanumeric() {
            previous_was_separator = false;
        } else if matches!(c, '.' | '_' | '-') {
            if previous_was_separator {
                return false;
            }
            previous_was_separator = true;
        } else {
            return false;
        }
    }
    true
}

/// Look up the display nickname for a login/password pair.
/// Returns None when no account matches.
pub async fn lookup_nickname(db: &DbPool, login: &str, password: &str) -> Option<String> {
    let db = db.clone();
    let login = login.to_string();
    let password = password.to_string();

    tokio::task::spawn_blocking(move || {
        let conn = db.lock().expect("db lock poisoned");
        conn.query_row(
            "SELECT nickname FROM users WHERE nickname = ?1 AND password = ?2",
            params![login, password],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .ok()
        .flatten()
    })
    .await
    .ok()
    .flatten()
}

/// Create an account. Returns false when the nickname is invalid or taken.
pub async fn register(db: &DbPool, nickname: &str, password: &str) -> bool {
    if !is_valid_nickname(nickname) {
        return false;
    }
    let db = db.clone();
    let nickname = nickname.to_string();
    let password = password.to_string();

    tokio::task::spawn_blocking(move || {
        let conn = db.lock().expect("db lock poisoned");
        conn.execute(
            "INSERT INTO users (nickname, password) VALUES (?1, ?2)",
            params![nickname, password],
        )
        .is_ok()
    })
    .await
    .unwrap_or(false)
}

/// Move an account to a new nickname. Returns false when the new name is
/// invalid or already taken (PRIMARY KEY conflict).
pub async fn rename(db: &DbPool, old: &str, new: &str) -> bool {
    if !is_valid_nickname(new) {
        return false;
    }
    let db = db.clone();
    let old = old.to_string();
    let new = new.to_string();

    tokio::task::spawn_blocking(move || {
        let conn = db.lock().expect("db lock poisoned");
        conn.execute(
            "UPDATE users SET nickname = ?1 WHERE nickname = ?2",
            params![new, old],
        )
        .is_ok()
    })
    .await
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    #[test]
    fn nickname_rules_accept_and_reject_the_right_shapes() {
        for good in ["abcde", "m.poppins", "mary-poppins", "a_b_c", "user1"] {
            assert!(is_valid_nickname(good), "expected `{good}` to be valid");
        }
        for bad in [
            "",
            "abcd",              // too short
            "abcdefghijklm",     // too long
            ".leading",
            "trailing.",
            "two..dots",
            "no spaces",
            "emoji😀name",
        ] {
            assert!(!is_valid_nickname(bad), "expected `{bad}` to be invalid");
        }
    }

    #[tokio::test]
    async fn register_lookup_and_rename() {
        let tmp = tempfile::tempdir().unwrap();
        let db = init_db(tmp.path().to_str().unwrap()).unwrap();

        assert!(register(&db, "m.poppins", "umbrella").await);
        // Duplicate registration hits the primary key.
        assert!(!register(&db, "m.poppins", "other").await);
        // Invalid names never reach the database.
        assert!(!register(&db, "abc", "short").await);

        assert_eq!(
            lookup_nickname(&db, "m.poppins", "umbrella").await,
            Some("m.poppins".to_string())
        );
        assert_eq!(lookup_nickname(&db, "m.poppins", "wrong").await, None);
        assert_eq!(lookup_nickname(&db, "nobody1", "umbrella").await, None);

        assert!(rename(&db, "m.poppins", "mary-poppins").await);
        assert_eq!(
            lookup_nickname(&db, "mary-poppins", "umbrella").await,
            Some("mary-poppins".to_string())
        );
        assert_eq!(lookup_nickname(&db, "m.poppins", "umbrella").await, None);
    }

    #[tokio::test]
    async fn rename_refuses_a_taken_name() {
        let tmp = tempfile::tempdir().unwrap();
        let db = init_db(tmp.path().to_str().unwrap()).unwrap();

        assert!(register(&db, "alice1", "pw").await);
        assert!(register(&db, "bobby1", "pw").await);
        assert!(!rename(&db, "alice1", "bobby1").await);
        // Both accounts still resolve under their original names.
        assert_eq!(
            lookup_nickname(&db, "alice1", "pw").await,
            Some("alice1".to_string())
        );
    }
}
