//! Cache store and entry operations on the SQLite backend.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::storage::CacheStorage;
use crate::Error;
use crate::exchange::{CacheRequest, ResponseSnapshot, ResponseType};

/// A named store with its entry count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheSummary {
    pub name: String,
    pub created_at: String,
    pub entries: u64,
}

/// Row values for one entry, owned so they can cross into the connection thread.
struct EntryRow {
    key: String,
    method: String,
    url: String,
    response_url: String,
    status: u16,
    response_type: &'static str,
    headers_json: String,
    body: Vec<u8>,
    fetched_at: String,
}

impl EntryRow {
    fn new(request: &CacheRequest, response: &ResponseSnapshot) -> Result<Self, Error> {
        if !request.is_get() {
            return Err(Error::InvalidInput(format!("only GET requests can be cached, got {}", request.method)));
        }

        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::InvalidInput(format!("failed to serialize headers: {e}")))?;

        Ok(Self {
            key: request.key(),
            method: request.method.clone(),
            url: request.url.clone(),
            response_url: response.url.clone(),
            status: response.status,
            response_type: response.response_type.as_str(),
            headers_json,
            body: response.body.to_vec(),
            fetched_at: response.fetched_at.clone(),
        })
    }
}

fn ensure_cache(conn: &rusqlite::Connection, name: &str, now: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
        params![name, now],
    )?;
    Ok(())
}

fn upsert_entry(conn: &rusqlite::Connection, name: &str, row: &EntryRow, now: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO entries (
            cache_name, request_key, method, url, response_url, status,
            response_type, headers_json, body, fetched_at, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(cache_name, request_key) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            response_url = excluded.response_url,
            status = excluded.status,
            response_type = excluded.response_type,
            headers_json = excluded.headers_json,
            body = excluded.body,
            fetched_at = excluded.fetched_at,
            stored_at = excluded.stored_at",
        params![
            name,
            &row.key,
            &row.method,
            &row.url,
            &row.response_url,
            row.status,
            row.response_type,
            &row.headers_json,
            &row.body,
            &row.fetched_at,
            now,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Number of entries held by a store.
    pub async fn entry_count(&self, name: &str) -> Result<u64, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE cache_name = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Every store with its entry count, oldest first.
    pub async fn summaries(&self) -> Result<Vec<CacheSummary>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<CacheSummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT c.name, c.created_at, COUNT(e.request_key)
                     FROM caches c LEFT JOIN entries e ON e.cache_name = c.name
                     GROUP BY c.name, c.created_at
                     ORDER BY c.created_at, c.name",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(CacheSummary { name: row.get(0)?, created_at: row.get(1)?, entries: row.get::<_, i64>(2)? as u64 })
                })?;
                rows.collect::<Result<Vec<_>, _>>().map_err(Error::from)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_cache(conn, &name, &now)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY created_at, name")?;
                let names = stmt.query_map([], |row| row.get(0))?;
                names.collect::<Result<Vec<String>, _>>().map_err(Error::from)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn match_request(&self, name: &str, request: &CacheRequest) -> Result<Option<ResponseSnapshot>, Error> {
        let name = name.to_string();
        let key = request.key();
        self.conn
            .call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT response_url, status, response_type, headers_json, body, fetched_at
                     FROM entries WHERE cache_name = ?1 AND request_key = ?2",
                )?;

                let result = stmt.query_row(params![name, key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                });

                let (url, status, response_type, headers_json, body, fetched_at) = match result {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let response_type = response_type.parse::<ResponseType>().map_err(Error::CorruptEntry)?;
                let headers: Vec<(String, String)> =
                    serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;

                Ok(Some(ResponseSnapshot { url, status, response_type, headers, body: Bytes::from(body), fetched_at }))
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, name: &str, request: &CacheRequest, response: &ResponseSnapshot) -> Result<(), Error> {
        let name = name.to_string();
        let row = EntryRow::new(request, response)?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_cache(&tx, &name, &now)?;
                upsert_entry(&tx, &name, &row, &now)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, name: &str, entries: &[(CacheRequest, ResponseSnapshot)]) -> Result<(), Error> {
        let name = name.to_string();
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::new(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_cache(&tx, &name, &now)?;
                for row in &rows {
                    upsert_entry(&tx, &name, row, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &'static [u8]) -> ResponseSnapshot {
        ResponseSnapshot {
            url: "http://127.0.0.1:5000/".to_string(),
            status: 200,
            response_type: ResponseType::Basic,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: Bytes::from_static(body),
            fetched_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = CacheRequest::get("http://127.0.0.1:5000/");

        db.put("task-reminder-v1", &request, &page(b"hello")).await.unwrap();

        let stored = db.match_request("task-reminder-v1", &request).await.unwrap().unwrap();
        assert_eq!(stored.status, 200);
        assert_eq!(stored.body, Bytes::from_static(b"hello"));
        assert_eq!(stored.header("Content-Type"), Some("text/html"));
        assert_eq!(stored.response_type, ResponseType::Basic);
    }

    #[tokio::test]
    async fn test_match_is_scoped_to_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = CacheRequest::get("http://127.0.0.1:5000/");
        db.put("task-reminder-v0", &request, &page(b"old")).await.unwrap();

        let result = db.match_request("task-reminder-v1", &request).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = CacheRequest::get("http://127.0.0.1:5000/");
        db.put("v1", &request, &page(b"first")).await.unwrap();
        db.put("v1", &request, &page(b"second")).await.unwrap();

        let stored = db.match_request("v1", &request).await.unwrap().unwrap();
        assert_eq!(stored.body, Bytes::from_static(b"second"));
        assert_eq!(db.entry_count("v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_put_rejects_non_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = CacheRequest::new("POST", "http://127.0.0.1:5000/api/tasks");
        let result = db.put("v1", &request, &page(b"{}")).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_put_all_is_atomic() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entries = vec![
            (CacheRequest::get("http://127.0.0.1:5000/"), page(b"root")),
            (CacheRequest::new("POST", "http://127.0.0.1:5000/api/tasks"), page(b"{}")),
        ];

        assert!(db.put_all("v1", &entries).await.is_err());
        assert_eq!(db.entry_count("v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_keys_and_delete_cascade() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = CacheRequest::get("http://127.0.0.1:5000/");
        db.put("task-reminder-v0", &request, &page(b"old")).await.unwrap();
        db.open("task-reminder-v1").await.unwrap();
        db.open("task-reminder-v1").await.unwrap();

        let mut names = db.keys().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["task-reminder-v0".to_string(), "task-reminder-v1".to_string()]);

        assert!(db.delete("task-reminder-v0").await.unwrap());
        assert!(!db.delete("task-reminder-v0").await.unwrap());
        assert_eq!(db.keys().await.unwrap(), vec!["task-reminder-v1".to_string()]);
        assert_eq!(db.entry_count("task-reminder-v0").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_summaries_count_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("v1", &CacheRequest::get("http://127.0.0.1:5000/"), &page(b"a")).await.unwrap();
        db.put("v1", &CacheRequest::get("http://127.0.0.1:5000/static/styles.css"), &page(b"b"))
            .await
            .unwrap();
        db.open("v2").await.unwrap();

        let summaries = db.summaries().await.unwrap();
        let v1 = summaries.iter().find(|s| s.name == "v1").unwrap();
        let v2 = summaries.iter().find(|s| s.name == "v2").unwrap();
        assert_eq!(v1.entries, 2);
        assert_eq!(v2.entries, 0);
    }
}
