//! Generation lifecycle persistence.
//!
//! A generation row is created in the `installing` state, becomes `ready`
//! when its entries are committed, and is stamped with `activated_at` the
//! first time it is activated. Deleting the row cascades to its entries.

use super::connection::CacheDb;
use super::entries::{StoredResponse, insert_entry};
use crate::Error;
use chrono::{SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Persisted lifecycle state of a generation.
///
/// Deleted generations have no row at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    /// Created, population in progress or failed mid-way. Never serves.
    Installing,
    /// Fully populated. Eligible to answer intercepted requests.
    Ready,
}

impl GenerationState {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationState::Installing => "installing",
            GenerationState::Ready => "ready",
        }
    }

    fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "installing" => Ok(GenerationState::Installing),
            "ready" => Ok(GenerationState::Ready),
            other => Err(Error::InvalidInput(format!("unknown generation state: {other}"))),
        }
    }
}

/// A stored cache generation and its entry count.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Generation {
    pub version: String,
    pub state: GenerationState,
    pub created_at: String,
    pub ready_at: Option<String>,
    pub activated_at: Option<String>,
    pub entry_count: u64,
}

impl Generation {
    pub fn is_ready(&self) -> bool {
        self.state == GenerationState::Ready
    }
}

/// Fixed-width timestamps so stored values sort lexicographically.
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

const SELECT_GENERATION: &str = "SELECT g.version, g.state, g.created_at, g.ready_at, g.activated_at,
        (SELECT COUNT(*) FROM entries e WHERE e.version = g.version)
     FROM generations g";

type GenerationRow = (String, String, String, Option<String>, Option<String>, i64);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GenerationRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

fn decode_row(row: GenerationRow) -> Result<Generation, Error> {
    let (version, state, created_at, ready_at, activated_at, entry_count) = row;
    Ok(Generation {
        version,
        state: GenerationState::parse(&state)?,
        created_at,
        ready_at,
        activated_at,
        entry_count: entry_count as u64,
    })
}

impl CacheDb {
    /// Create a generation in the `installing` state.
    ///
    /// Returns false (and changes nothing) if the version already exists.
    pub async fn begin_generation(&self, version: &str) -> Result<bool, Error> {
        let version = version.to_string();
        let created_at = now();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO generations (version, state, created_at) VALUES (?1, ?2, ?3)",
                    params![version, GenerationState::Installing.as_str(), created_at],
                )?;
                Ok(inserted == 1)
            })
            .await
            .map_err(Error::from)
    }

    /// Replace a generation's entries and mark it ready, atomically.
    ///
    /// Either every entry is written and the state flips to `ready`, or
    /// nothing changes. Returns the number of entries written.
    pub async fn commit_generation(&self, version: &str, entries: &[StoredResponse]) -> Result<u64, Error> {
        let version = version.to_string();
        let entries = entries.to_vec();
        let ready_at = now();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;

                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE version = ?1)",
                    params![version],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(Error::InvalidInput(format!("unknown generation: {version}")));
                }

                tx.execute("DELETE FROM entries WHERE version = ?1", params![version])?;
                for entry in &entries {
                    insert_entry(&tx, &version, entry)?;
                }
                tx.execute(
                    "UPDATE generations SET state = ?2, ready_at = ?3 WHERE version = ?1",
                    params![version, GenerationState::Ready.as_str(), ready_at],
                )?;

                tx.commit()?;
                Ok(entries.len() as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Get a generation by version.
    pub async fn get_generation(&self, version: &str) -> Result<Option<Generation>, Error> {
        let version = version.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Generation>, Error> {
                let sql = format!("{SELECT_GENERATION} WHERE g.version = ?1");
                let mut stmt = conn.prepare(&sql)?;

                match stmt.query_row(params![version], read_row) {
                    Ok(row) => decode_row(row).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// All stored generations, oldest first.
    pub async fn list_generations(&self) -> Result<Vec<Generation>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<Generation>, Error> {
                let sql = format!("{SELECT_GENERATION} ORDER BY g.created_at, g.version");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], read_row)?;

                let mut generations = Vec::new();
                for row in rows {
                    generations.push(decode_row(row?)?);
                }
                Ok(generations)
            })
            .await
            .map_err(Error::from)
    }

    /// Identifiers of every stored generation, whatever its state.
    pub async fn generation_versions(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT version FROM generations ORDER BY created_at, version")?;
                let versions = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(versions)
            })
            .await
            .map_err(Error::from)
    }

    /// Stamp a ready generation as activated.
    ///
    /// Only the first activation is recorded; returns whether the stamp was set.
    pub async fn mark_activated(&self, version: &str) -> Result<bool, Error> {
        let version = version.to_string();
        let activated_at = now();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let updated = conn.execute(
                    "UPDATE generations SET activated_at = ?2
                     WHERE version = ?1 AND state = ?3 AND activated_at IS NULL",
                    params![version, activated_at, GenerationState::Ready.as_str()],
                )?;
                Ok(updated == 1)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and all its entries.
    ///
    /// Returns false if the generation did not exist.
    pub async fn delete_generation(&self, version: &str) -> Result<bool, Error> {
        let version = version.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM generations WHERE version = ?1", params![version])?;
                Ok(deleted == 1)
            })
            .await
            .map_err(Error::from)
    }

    /// The generation that answers requests for the configured `current` version.
    ///
    /// Only ready generations that have been activated serve: `current` if it
    /// has been, otherwise the most recently activated one still stored. An
    /// installed but never activated generation does not serve.
    pub async fn serving_generation(&self, current: &str) -> Result<Option<String>, Error> {
        let current = current.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT version FROM generations
                     WHERE state = ?2 AND activated_at IS NOT NULL
                     ORDER BY (version = ?1) DESC, activated_at DESC
                     LIMIT 1",
                    params![current, GenerationState::Ready.as_str()],
                    |row| row.get(0),
                );

                match result {
                    Ok(version) => Ok(Some(version)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::RequestKey;

    fn make_entry(url: &str) -> StoredResponse {
        let key = RequestKey::get(url);
        StoredResponse {
            key_hash: key.hash(),
            method: key.method,
            url: key.url,
            final_url: url.to_string(),
            status_code: 200,
            content_type: None,
            headers: Vec::new(),
            body: b"ok".to_vec(),
            stored_at: now(),
        }
    }

    #[tokio::test]
    async fn test_begin_generation_once() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.begin_generation("v1").await.unwrap());
        assert!(!db.begin_generation("v1").await.unwrap());

        let generation = db.get_generation("v1").await.unwrap().unwrap();
        assert_eq!(generation.state, GenerationState::Installing);
        assert!(generation.ready_at.is_none());
        assert_eq!(generation.entry_count, 0);
    }

    #[tokio::test]
    async fn test_commit_marks_ready() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.begin_generation("v1").await.unwrap();
        let written = db
            .commit_generation("v1", &[make_entry("https://example.com/"), make_entry("https://example.com/a.css")])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let generation = db.get_generation("v1").await.unwrap().unwrap();
        assert!(generation.is_ready());
        assert!(generation.ready_at.is_some());
        assert_eq!(generation.entry_count, 2);
    }

    #[tokio::test]
    async fn test_commit_replaces_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.begin_generation("v1").await.unwrap();
        db.commit_generation("v1", &[make_entry("https://example.com/old.css")])
            .await
            .unwrap();
        db.commit_generation("v1", &[make_entry("https://example.com/new.css")])
            .await
            .unwrap();

        assert_eq!(db.count_entries("v1").await.unwrap(), 1);
        let old = db
            .match_entry("v1", &RequestKey::get("https://example.com/old.css"))
            .await
            .unwrap();
        assert!(old.is_none());
    }

    #[tokio::test]
    async fn test_commit_unknown_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.commit_generation("missing", &[make_entry("https://example.com/")]).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(db.count_entries("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_cascades_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.begin_generation("v1").await.unwrap();
        db.commit_generation("v1", &[make_entry("https://example.com/")])
            .await
            .unwrap();

        assert!(db.delete_generation("v1").await.unwrap());
        assert!(!db.delete_generation("v1").await.unwrap());
        assert!(db.get_generation("v1").await.unwrap().is_none());
        assert_eq!(db.count_entries("v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_activated_first_time_only() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.begin_generation("v1").await.unwrap();
        assert!(!db.mark_activated("v1").await.unwrap());

        db.commit_generation("v1", &[]).await.unwrap();
        assert!(db.mark_activated("v1").await.unwrap());
        let first = db.get_generation("v1").await.unwrap().unwrap().activated_at;

        assert!(!db.mark_activated("v1").await.unwrap());
        let second = db.get_generation("v1").await.unwrap().unwrap().activated_at;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_serving_generation_requires_activation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert_eq!(db.serving_generation("v1").await.unwrap(), None);

        db.begin_generation("v1").await.unwrap();
        assert_eq!(db.serving_generation("v1").await.unwrap(), None);

        // Ready but not activated yet.
        db.commit_generation("v1", &[]).await.unwrap();
        assert_eq!(db.serving_generation("v1").await.unwrap(), None);

        db.mark_activated("v1").await.unwrap();
        assert_eq!(db.serving_generation("v1").await.unwrap().as_deref(), Some("v1"));

        // v2 installing, then installed: the activated v1 keeps serving.
        db.begin_generation("v2").await.unwrap();
        assert_eq!(db.serving_generation("v2").await.unwrap().as_deref(), Some("v1"));

        db.commit_generation("v2", &[]).await.unwrap();
        assert_eq!(db.serving_generation("v2").await.unwrap().as_deref(), Some("v1"));

        db.mark_activated("v2").await.unwrap();
        assert_eq!(db.serving_generation("v2").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_serving_generation_prefers_activated_current() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for version in ["v1", "v2"] {
            db.begin_generation(version).await.unwrap();
            db.commit_generation(version, &[]).await.unwrap();
            db.mark_activated(version).await.unwrap();
        }

        assert_eq!(db.serving_generation("v2").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(db.serving_generation("v1").await.unwrap().as_deref(), Some("v1"));
        assert_eq!(db.serving_generation("v3").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_serving_generation_ignores_unactivated_others() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.begin_generation("v3").await.unwrap();
        db.commit_generation("v3", &[]).await.unwrap();

        assert_eq!(db.serving_generation("v2").await.unwrap(), None);
        assert_eq!(db.serving_generation("v3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_generation_versions_and_states() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.begin_generation("v1").await.unwrap();
        db.commit_generation("v1", &[]).await.unwrap();
        db.begin_generation("v2").await.unwrap();

        let mut versions = db.generation_versions().await.unwrap();
        versions.sort();
        assert_eq!(versions, vec!["v1", "v2"]);

        let generations = db.list_generations().await.unwrap();
        let v1 = generations.iter().find(|g| g.version == "v1").unwrap();
        let v2 = generations.iter().find(|g| g.version == "v2").unwrap();
        assert!(v1.is_ready());
        assert_eq!(v2.state, GenerationState::Installing);
    }
}
