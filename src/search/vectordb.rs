//! Vector store using SQLite
//!
//! Stores passage embeddings as BLOBs and ranks them by cosine similarity in
//! Rust. A linear scan is plenty for a single knowledge file.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::embedding::cosine_similarity;

pub const META_FINGERPRINT: &str = "fingerprint";
pub const META_EMBEDDING_MODEL: &str = "embedding_model";
pub const META_BUILT_AT: &str = "built_at";

pub struct VectorDB {
    conn: Connection,
}

/// A stored passage
#[derive(Debug, Clone, PartialEq)]
pub struct PassageRecord {
    pub id: i64,
    pub source: String,
    pub chunk_index: usize,
    pub content: String,
}

/// Passage to insert, paired with its embedding
pub struct NewPassage<'a> {
    pub source: &'a str,
    pub chunk_index: usize,
    pub content: &'a str,
    pub embedding: &'a [f32],
}

impl VectorDB {
    /// Open or create database at path
    pub fn open(db_path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(db_path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS passages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                UNIQUE (source, chunk_index)
            );

            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );
            "#,
        )
    }

    /// Drop every passage and metadata entry, then insert `passages` and
    /// `meta` in a single transaction.
    pub fn replace_all(
        &mut self,
        passages: &[NewPassage<'_>],
        meta: &[(&str, &str)],
    ) -> rusqlite::Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM passages", [])?;
        tx.execute("DELETE FROM index_meta", [])?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO passages (source, chunk_index, content, embedding) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for p in passages {
                insert.execute(params![
                    p.source,
                    p.chunk_index as i64,
                    p.content,
                    embedding_to_blob(p.embedding)
                ])?;
            }

            let mut set_meta = tx.prepare(
                "INSERT INTO index_meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            for (key, value) in meta {
                set_meta.execute(params![key, value])?;
            }
        }

        tx.commit()
    }

    /// At most `limit` passages by descending cosine similarity.
    /// Equal scores keep insertion order.
    pub fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> rusqlite::Result<Vec<(PassageRecord, f32)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, source, chunk_index, content, embedding FROM passages ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            let chunk_index: i64 = row.get(2)?;
            let blob: Vec<u8> = row.get(4)?;
            Ok((
                PassageRecord {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    chunk_index: chunk_index as usize,
                    content: row.get(3)?,
                },
                blob,
            ))
        })?;

        let mut results: Vec<(PassageRecord, f32)> = Vec::new();
        for row in rows {
            let (record, blob) = row?;
            let score = cosine_similarity(query_embedding, &blob_to_embedding(&blob));
            results.push((record, score));
        }

        // Stable sort keeps ascending id among ties
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);

        Ok(results)
    }

    pub fn passage_count(&self) -> rusqlite::Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM passages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn get_meta(&self, key: &str) -> rusqlite::Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map(Option::flatten)
    }
}

/// Convert f32 embedding to BLOB
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Convert BLOB to f32 embedding
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
