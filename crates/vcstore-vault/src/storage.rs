use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};
use vcstore_core::{DocumentBackend, DocumentId, RawDocument, Selector, StoreError, StoreResult};

/// SQLite document backend.
///
/// Bodies are stored as JSON text. Selectors are evaluated in process over
/// the scanned rows; `ensure_index` still creates `json_extract` expression
/// indexes so ad-hoc SQL against the file stays fast.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Backend(format!("failed to open database: {}", e)))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT DEFAULT (datetime('now'))
            );",
        )
        .map_err(|e| StoreError::Backend(format!("failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        Self::open(":memory:")
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {}", e)))
    }
}

/// Index name and JSON path for a dotted field, or `None` if the field
/// contains characters that cannot be spliced into DDL.
fn index_target(field: &str) -> Option<(String, String)> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if !valid {
        return None;
    }
    Some((
        format!("idx_documents_{}", field.replace('.', "_")),
        format!("$.{}", field),
    ))
}

#[async_trait]
impl DocumentBackend for SqliteBackend {
    async fn ensure_index(&self, fields: &[&str]) -> StoreResult<()> {
        let conn = self.conn()?;
        for field in fields {
            let (name, path) = index_target(field).ok_or_else(|| {
                StoreError::InvalidArgument(format!("cannot index field {:?}", field))
            })?;
            conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON documents (json_extract(body, '{}'));",
                name, path
            ))
            .map_err(|e| StoreError::Backend(format!("failed to create index: {}", e)))?;
        }
        Ok(())
    }

    async fn insert(&self, body: Value) -> StoreResult<DocumentId> {
        let id = DocumentId::generate();
        let text = serde_json::to_string(&body)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO documents (id, body) VALUES (?1, ?2)",
            params![id.as_str(), text],
        )
        .map_err(|e| StoreError::Backend(format!("insert failed: {}", e)))?;
        Ok(id)
    }

    async fn find(&self, selector: &Selector) -> StoreResult<Vec<RawDocument>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, body FROM documents ORDER BY seq")
            .map_err(|e| StoreError::Backend(format!("query failed: {}", e)))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| StoreError::Backend(format!("query failed: {}", e)))?;

        let mut found = Vec::new();
        for row in rows {
            let (id, text) = row.map_err(|e| StoreError::Backend(format!("row read failed: {}", e)))?;
            let body: Value = serde_json::from_str(&text)?;
            if selector.matches(&body) {
                found.push(RawDocument {
                    id: DocumentId::new(id),
                    body,
                });
            }
        }
        Ok(found)
    }

    async fn remove(&self, id: &DocumentId) -> StoreResult<()> {
        let conn = self.conn()?;
        let rows = conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id.as_str()])
            .map_err(|e| StoreError::Backend(format!("delete failed: {}", e)))?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("document {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_sqlite_insert_find_remove() {
        let backend = SqliteBackend::in_memory().unwrap();
        let id = backend
            .insert(json!({"content": {"id": "urn:1", "type": ["A", "B"]}}))
            .await
            .unwrap();
        backend
            .insert(json!({"content": {"id": "urn:2", "type": "C"}}))
            .await
            .unwrap();

        let found = backend
            .find(&Selector::field("content.type", "B"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);

        backend.remove(&id).await.unwrap();
        let err = backend.remove(&id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_sqlite_ensure_index_idempotent() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend
            .ensure_index(&["content.id", "meta.profileId"])
            .await
            .unwrap();
        backend
            .ensure_index(&["content.id", "meta.profileId"])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_rejects_unsafe_index_field() {
        let backend = SqliteBackend::in_memory().unwrap();
        let err = backend
            .ensure_index(&["content.id'); DROP TABLE documents; --"])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_index_target() {
        assert_eq!(
            index_target("meta.profileId"),
            Some((
                "idx_documents_meta_profileId".to_string(),
                "$.meta.profileId".to_string()
            ))
        );
        assert!(index_target("").is_none());
        assert!(index_target("a b").is_none());
    }

    #[tokio::test]
    async fn test_sqlite_persists_across_reopen() {
        let dir = std::env::temp_dir().join(format!("vcstore-sqlite-{}", DocumentId::generate()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("docs.db");
        let path_str = path.to_str().unwrap();

        {
            let backend = SqliteBackend::open(path_str).unwrap();
            backend.insert(json!({"k": "v"})).await.unwrap();
        }
        {
            let backend = SqliteBackend::open(path_str).unwrap();
            let found = backend.find(&Selector::field("k", "v")).await.unwrap();
            assert_eq!(found.len(), 1);
        }

        let _ = std::fs::remove_dir_all(&dir);
    }
}
