//! Stored response entries.
//!
//! Entries are written only as part of committing a generation (see
//! [`CacheDb::commit_generation`]); this module provides the row mapping and
//! the read side.

use super::connection::CacheDb;
use super::key::RequestKey;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// An immutable snapshot of a network response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StoredResponse {
    pub key_hash: String,
    pub method: String,
    pub url: String,
    pub final_url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl StoredResponse {
    /// First header value with the given (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

const SELECT_COLUMNS: &str = "key_hash, method, url, final_url, status_code, content_type, headers_json, body, stored_at";

type EntryRow = (String, String, String, String, u16, Option<String>, String, Vec<u8>, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn decode_row(row: EntryRow) -> Result<StoredResponse, Error> {
    let (key_hash, method, url, final_url, status_code, content_type, headers_json, body, stored_at) = row;
    let headers = serde_json::from_str(&headers_json)?;
    Ok(StoredResponse { key_hash, method, url, final_url, status_code, content_type, headers, body, stored_at })
}

/// Insert one entry inside an open transaction.
pub(crate) fn insert_entry(tx: &rusqlite::Transaction<'_>, version: &str, entry: &StoredResponse) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&entry.headers)?;
    tx.execute(
        "INSERT INTO entries (
            version, key_hash, method, url, final_url, status_code,
            content_type, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(version, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            final_url = excluded.final_url,
            status_code = excluded.status_code,
            content_type = excluded.content_type,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            version,
            &entry.key_hash,
            &entry.method,
            &entry.url,
            &entry.final_url,
            entry.status_code,
            &entry.content_type,
            headers_json,
            &entry.body,
            &entry.stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Find the stored response for `key` in generation `version`.
    ///
    /// Returns None if the generation or the entry doesn't exist.
    pub async fn match_entry(&self, version: &str, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let version = version.to_string();
        let key_hash = key.hash();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let sql = format!("SELECT {SELECT_COLUMNS} FROM entries WHERE version = ?1 AND key_hash = ?2");
                let mut stmt = conn.prepare(&sql)?;

                match stmt.query_row(params![version, key_hash], read_row) {
                    Ok(row) => decode_row(row).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries stored under a generation.
    pub async fn count_entries(&self, version: &str) -> Result<u64, Error> {
        let version = version.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE version = ?1", params![version], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
