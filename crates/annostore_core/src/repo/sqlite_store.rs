//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist JSON documents in `documents` and their flattened scalar
//!   fields in `document_fields` for search-by-field.
//!
//! # Invariants
//! - A document and its field rows are written in one transaction.
//! - `is_deleted` mirrors the tombstone marker of the stored body.
//! - SQLite reads are immediately consistent, so `refresh()` has nothing
//!   to flush.

use crate::db::migrations::ensure_migrated;
use crate::model::kind::DocumentKind;
use crate::model::record::is_tombstone;
use crate::repo::document_store::{
    indexed_fields, DocumentListQuery, DocumentPage, DocumentStore, StoreError, StoreResult,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;

/// Document store over a migrated SQLite connection.
pub struct SqliteDocumentStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentStore<'conn> {
    /// Wraps a connection opened through `open_db`/`open_db_in_memory`.
    ///
    /// # Errors
    /// - `Db(UninitializedConnection)` when migrations were not applied.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self { conn })
    }
}

impl DocumentStore for SqliteDocumentStore<'_> {
    fn exists(&self, kind: DocumentKind, id: &str) -> StoreResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE kind = ?1 AND id = ?2);",
            params![kind.as_str(), id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn get(&self, kind: DocumentKind, id: &str) -> StoreResult<Value> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE kind = ?1 AND id = ?2;",
                params![kind.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(body) => decode_body(&body),
            None => Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            }),
        }
    }

    fn put(&self, kind: DocumentKind, id: &str, document: &Value) -> StoreResult<()> {
        let body = serde_json::to_string(document)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO documents (kind, id, body, is_deleted)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (kind, id) DO UPDATE SET
                body = excluded.body,
                is_deleted = excluded.is_deleted,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![kind.as_str(), id, body, i64::from(is_tombstone(document))],
        )?;
        tx.execute(
            "DELETE FROM document_fields WHERE kind = ?1 AND id = ?2;",
            params![kind.as_str(), id],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO document_fields (kind, id, path, value) VALUES (?1, ?2, ?3, ?4);",
            )?;
            for (path, value) in indexed_fields(document) {
                insert.execute(params![kind.as_str(), id, path, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, kind: DocumentKind, id: &str) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM document_fields WHERE kind = ?1 AND id = ?2;",
            params![kind.as_str(), id],
        )?;
        let changed = tx.execute(
            "DELETE FROM documents WHERE kind = ?1 AND id = ?2;",
            params![kind.as_str(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            });
        }
        tx.commit()?;
        Ok(())
    }

    fn search_by_field(
        &self,
        kind: DocumentKind,
        field_path: &str,
        value: &str,
    ) -> StoreResult<Vec<Value>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.body
             FROM documents d
             WHERE d.kind = ?1
               AND EXISTS (
                   SELECT 1
                   FROM document_fields f
                   WHERE f.kind = d.kind
                     AND f.id = d.id
                     AND f.path = ?2
                     AND f.value = ?3
               )
             ORDER BY d.id ASC;",
        )?;
        let mut rows = stmt.query(params![kind.as_str(), field_path, value])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            documents.push(decode_body(&body)?);
        }
        Ok(documents)
    }

    fn refresh(&self) -> StoreResult<()> {
        Ok(())
    }

    fn list(&self, query: &DocumentListQuery) -> StoreResult<DocumentPage> {
        let mut filter = String::from(" WHERE kind = ?");
        let mut bind_values = vec![SqlValue::Text(query.kind.as_str().to_string())];
        if !query.include_deleted {
            filter.push_str(" AND is_deleted = 0");
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM documents{filter};"),
            params_from_iter(bind_values.iter()),
            |row| row.get(0),
        )?;

        let mut sql = format!("SELECT body FROM documents{filter} ORDER BY id ASC");
        match query.limit {
            Some(limit) => {
                sql.push_str(" LIMIT ?");
                bind_values.push(SqlValue::Integer(i64::from(limit)));
            }
            None => sql.push_str(" LIMIT -1"),
        }
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(SqlValue::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            documents.push(decode_body(&body)?);
        }

        Ok(DocumentPage {
            total: u64::try_from(total).map_err(|_| {
                StoreError::InvalidData(format!("negative document count {total}"))
            })?,
            documents,
        })
    }
}

fn decode_body(body: &str) -> StoreResult<Value> {
    serde_json::from_str(body)
        .map_err(|err| StoreError::InvalidData(format!("stored body is not JSON: {err}")))
}
