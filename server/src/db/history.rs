//! Message-log collaborator: append-only chat history.
//!
//! Appends are best-effort — a history failure is logged and must never take
//! a live session down with it.

use rusqlite::params;

use super::DbPool;

/// Append one entry to the persisted message log.
pub async fn append_entry(db: &DbPool, entry: String) {
    let db = db.clone();
    let result = tokio::task::spawn_blocking(move || {
        let conn = db.lock().expect("db lock poisoned");
        conn.execute("INSERT INTO message_log (entry) VALUES (?1)", params![entry])
            .map(|_| ())
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "failed to append message log entry"),
        Err(e) => tracing::warn!(error = %e, "message log task failed"),
    }
}

/// The most recent `limit` log entries, newest first.
pub async fn recent_entries(db: &DbPool, limit: u32) -> Vec<String> {
    let db = db.clone();
    tokio::task::spawn_blocking(move || {
        let conn = db.lock().expect("db lock poisoned");
        let mut stmt = conn
            .prepare("SELECT entry FROM message_log ORDER BY id DESC LIMIT ?1")
            .ok()?;
        let rows = stmt
            .query_map(params![limit], |row| row.get::<_, String>(0))
            .ok()?;
        Some(rows.filter_map(|r| r.ok()).collect::<Vec<_>>())
    })
    .await
    .ok()
    .flatten()
    .unwrap_or_default()
}
