use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde_json::Value;

/// Document collections backed by a single SQLite table. Each row holds one
/// JSON document tagged with its collection name.
pub struct DocumentStore {
    conn: Connection,
}

/// What a caller hands to [`DocumentStore::save`]: one document or a batch.
pub enum Documents {
    One(Value),
    Many(Vec<Value>),
}

impl From<Value> for Documents {
    fn from(doc: Value) -> Self {
        Documents::One(doc)
    }
}

impl From<Vec<Value>> for Documents {
    fn from(docs: Vec<Value>) -> Self {
        Documents::Many(docs)
    }
}

impl DocumentStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {:?}", dir))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                id          INTEGER PRIMARY KEY,
                collection  TEXT NOT NULL,
                body        TEXT NOT NULL,
                inserted_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
            ",
        )?;
        Ok(Self { conn })
    }

    /// Insert-one for a single document, insert-many (one transaction) for a
    /// batch. Returns the number of documents written.
    pub fn save(&self, collection: &str, docs: impl Into<Documents>) -> Result<usize> {
        match docs.into() {
            Documents::One(doc) => self.insert_one(collection, &doc),
            Documents::Many(docs) => self.insert_many(collection, &docs),
        }
    }

    fn insert_one(&self, collection: &str, doc: &Value) -> Result<usize> {
        let n = self.conn.execute(
            "INSERT INTO documents (collection, body) VALUES (?1, ?2)",
            rusqlite::params![collection, serde_json::to_string(doc)?],
        )?;
        Ok(n)
    }

    fn insert_many(&self, collection: &str, docs: &[Value]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt =
                tx.prepare("INSERT INTO documents (collection, body) VALUES (?1, ?2)")?;
            for doc in docs {
                count += stmt.execute(rusqlite::params![collection, serde_json::to_string(doc)?])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    #[cfg(test)]
    pub fn count(&self, collection: &str) -> Result<usize> {
        let n: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            [collection],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    /// Documents of one collection in insertion order.
    #[cfg(test)]
    pub fn find_all(&self, collection: &str) -> Result<Vec<Value>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY id")?;
        let bodies = stmt
            .query_map([collection], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        bodies
            .iter()
            .map(|b| serde_json::from_str(b).context("Corrupt document body"))
            .collect()
    }

    // ── Stats ──

    pub fn collection_counts(&self) -> Result<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare(
            "SELECT collection, COUNT(*) FROM documents GROUP BY collection ORDER BY collection",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_and_batch_inserts() {
        let store = DocumentStore::open_in_memory().unwrap();
        assert_eq!(store.save("extracted_emails", json!({ "email": "a@b.com" })).unwrap(), 1);
        let batch = vec![json!({ "title": "T1" }), json!({ "title": "T2" })];
        assert_eq!(store.save("google_data", batch).unwrap(), 2);

        assert_eq!(store.count("extracted_emails").unwrap(), 1);
        assert_eq!(store.count("google_data").unwrap(), 2);
        assert_eq!(store.count("crunchbase_data").unwrap(), 0);

        let docs = store.find_all("google_data").unwrap();
        assert_eq!(docs[0]["title"], "T1");
        assert_eq!(docs[1]["title"], "T2");
    }

    #[test]
    fn empty_batch_writes_nothing() {
        let store = DocumentStore::open_in_memory().unwrap();
        assert_eq!(store.save("google_data", Vec::<Value>::new()).unwrap(), 0);
        assert!(store.collection_counts().unwrap().is_empty());
    }

    #[test]
    fn counts_grouped_by_collection() {
        let store = DocumentStore::open_in_memory().unwrap();
        store.save("b", vec![json!({}), json!({})]).unwrap();
        store.save("a", json!({})).unwrap();
        assert_eq!(
            store.collection_counts().unwrap(),
            vec![("a".to_string(), 1), ("b".to_string(), 2)]
        );
    }

    #[test]
    fn open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/leads.sqlite");
        let store = DocumentStore::open(&path).unwrap();
        store.save("x", json!({ "k": 1 })).unwrap();
        assert!(path.exists());
    }
}
