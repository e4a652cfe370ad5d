//! Auto-increment counter repair after bulk loads with explicit keys

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::models::EntityKind;

/// Reconciliation outcome for one table
#[derive(Debug, Clone, Serialize)]
pub struct SequenceReport {
    pub table: &'static str,
    /// Key the store will generate next, when reconciliation succeeded
    pub next_id: Option<i64>,
    pub error: Option<String>,
}

/// Raise each explicitly-keyed table's counter to at least its largest stored
/// key. Counters are never lowered, so keys of deleted rows are not reused.
///
/// Tables are handled independently; a failure is logged and reported for
/// that table only.
pub fn reconcile_sequences(conn: &Connection) -> Vec<SequenceReport> {
    EntityKind::ALL
        .iter()
        .filter(|kind| kind.has_explicit_keys())
        .map(|&kind| match reconcile_table(conn, kind) {
            Ok(seq) => {
                tracing::debug!("Sequence for {} set to {}", kind.table(), seq);
                SequenceReport {
                    table: kind.table(),
                    next_id: Some(seq + 1),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("Failed to reconcile sequence for {}: {}", kind.table(), e);
                SequenceReport {
                    table: kind.table(),
                    next_id: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect()
}

fn reconcile_table(conn: &Connection, kind: EntityKind) -> rusqlite::Result<i64> {
    let sql = format!(
        "SELECT COALESCE(MAX({}), 0) FROM {}",
        kind.key_column(),
        kind.table()
    );
    let max_key: i64 = conn.query_row(&sql, [], |row| row.get(0))?;

    let updated = conn.execute(
        "UPDATE sqlite_sequence SET seq = MAX(seq, ?1) WHERE name = ?2",
        params![max_key, kind.table()],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO sqlite_sequence (name, seq) VALUES (?1, ?2)",
            params![kind.table(), max_key],
        )?;
    }

    conn.query_row(
        "SELECT seq FROM sqlite_sequence WHERE name = ?1",
        [kind.table()],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::create_tables;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    #[test]
    fn test_reconcile_covers_explicit_key_tables() {
        let conn = test_conn();
        let reports = reconcile_sequences(&conn);

        assert_eq!(reports.len(), 9);
        assert!(reports.iter().all(|r| r.error.is_none()));
        assert!(reports.iter().all(|r| r.next_id == Some(1)));
        assert!(!reports.iter().any(|r| r.table == "lap_times"));
    }

    #[test]
    fn test_next_generated_key_exceeds_max() {
        let conn = test_conn();
        conn.execute_batch(
            r#"
            INSERT INTO status (status_id, status) VALUES (141, 'Damage');
            -- Simulate a counter left behind by an older import
            UPDATE sqlite_sequence SET seq = 3 WHERE name = 'status';
            "#,
        )
        .unwrap();

        let reports = reconcile_sequences(&conn);
        let status = reports.iter().find(|r| r.table == "status").unwrap();
        assert_eq!(status.next_id, Some(142));

        conn.execute("INSERT INTO status (status) VALUES ('Retired')", [])
            .unwrap();
        let generated: i64 = conn
            .query_row(
                "SELECT status_id FROM status WHERE status = 'Retired'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(generated, 142);
    }

    #[test]
    fn test_counter_never_lowered() {
        let conn = test_conn();
        conn.execute_batch(
            r#"
            INSERT INTO status (status_id, status) VALUES (5, 'Disqualified'), (141, 'Damage');
            DELETE FROM status WHERE status_id = 141;
            "#,
        )
        .unwrap();

        let reports = reconcile_sequences(&conn);
        let status = reports.iter().find(|r| r.table == "status").unwrap();
        assert_eq!(status.next_id, Some(142));

        conn.execute("INSERT INTO status (status) VALUES ('Retired')", [])
            .unwrap();
        let generated: i64 = conn
            .query_row(
                "SELECT status_id FROM status WHERE status = 'Retired'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(generated, 142);
    }

    #[test]
    fn test_table_failure_does_not_stop_others() {
        let conn = test_conn();
        conn.execute_batch("DROP TABLE qualifying").unwrap();

        let reports = reconcile_sequences(&conn);
        let qualifying = reports.iter().find(|r| r.table == "qualifying").unwrap();
        assert!(qualifying.error.is_some());
        assert_eq!(qualifying.next_id, None);

        let races = reports.iter().find(|r| r.table == "races").unwrap();
        assert_eq!(races.next_id, Some(1));
    }
}
