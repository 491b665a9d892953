//! Row access for the `document_processing_history` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw history row. JSON columns are kept as text here.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub id: String,
    pub user_id: String,
    pub file_name: String,
    pub document_type: String,
    pub status: String,
    pub processed_at: String,
    pub extracted_fields: Option<String>,
    pub non_sensitive_metadata: String,
}

impl HistoryRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            file_name: row.get("file_name")?,
            document_type: row.get("document_type")?,
            status: row.get("status")?,
            processed_at: row.get("processed_at")?,
            extracted_fields: row.get("extracted_fields")?,
            non_sensitive_metadata: row.get("non_sensitive_metadata")?,
        })
    }
}

pub fn insert(db: &Database, row: &HistoryRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO document_processing_history
             (id, user_id, file_name, document_type, status, processed_at,
              extracted_fields, non_sensitive_metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.id,
                row.user_id,
                row.file_name,
                row.document_type,
                row.status,
                row.processed_at,
                row.extracted_fields,
                row.non_sensitive_metadata,
            ],
        )?;
        Ok(())
    })
}

/// All rows for a user, newest first. Ties keep reverse insertion order.
pub fn query_by_user(db: &Database, user_id: &str) -> Result<Vec<HistoryRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM document_processing_history
             WHERE user_id = ?1
             ORDER BY processed_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map(params![user_id], HistoryRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, user_id: &str, processed_at: &str) -> HistoryRow {
        HistoryRow {
            id: id.to_string(),
            user_id: user_id.to_string(),
            file_name: String::new(),
            document_type: "Medical Bill".to_string(),
            status: "completed".to_string(),
            processed_at: processed_at.to_string(),
            extracted_fields: None,
            non_sensitive_metadata: r#"{"validation_status":"valid","anomaly":false}"#
                .to_string(),
        }
    }

    #[test]
    fn test_insert_and_query() {
        let db = Database::open_in_memory().unwrap();
        let r = row("r1", "u1", "2026-03-01T10:00:00.000000Z");
        insert(&db, &r).unwrap();

        let rows = query_by_user(&db, "u1").unwrap();
        assert_eq!(rows, vec![r]);
    }

    #[test]
    fn test_query_orders_newest_first() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &row("old", "u1", "2026-03-01T10:00:00.000000Z")).unwrap();
        insert(&db, &row("new", "u1", "2026-03-03T10:00:00.000000Z")).unwrap();
        insert(&db, &row("mid", "u1", "2026-03-02T10:00:00.000000Z")).unwrap();

        let ids: Vec<String> = query_by_user(&db, "u1")
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_query_filters_by_user() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &row("a", "u1", "2026-03-01T10:00:00.000000Z")).unwrap();
        insert(&db, &row("b", "u2", "2026-03-01T10:00:00.000000Z")).unwrap();

        assert_eq!(query_by_user(&db, "u2").unwrap().len(), 1);
        assert_eq!(query_by_user(&db, "u1").unwrap().len(), 1);
        assert!(query_by_user(&db, "nobody").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &row("r1", "u1", "2026-03-01T10:00:00.000000Z")).unwrap();
        assert!(insert(&db, &row("r1", "u1", "2026-03-01T10:00:00.000000Z")).is_err());
    }
}
