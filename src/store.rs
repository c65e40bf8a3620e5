//! SQLite-backed annotation store.
//!
//! The store is prepared by an outer tool; this module only reads from and
//! writes rows into tables that already exist:
//!
//! - `samples (uid, transcriptome, ...)`
//! - `transcripts (uid, sample_uid, length, ...)`
//! - `cds (transcript_uid, gene_symbol, ...)`
//! - `ncrna (uid, accession_number, gene_symbol, core_ncrna, cd_hit_pass, ...)`
//! - `nc_accession_numbers (accession_number, gene_symbol)`
//!
//! Sequence ids are integers in the store and strings everywhere else; see
//! [`id_from_value`] and [`id_to_value`].

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;
use std::time::Duration;

use crate::config::AnnotationColumns;
use crate::dictionary::{AccessionGeneMap, DictionarySource};
use crate::metadata::AnnotationRecord;

/// Table receiving ncRNA annotations.
pub const NCRNA_TABLE: &str = "ncrna";

const BUSY_TIMEOUT: Duration = Duration::from_secs(600);

/// Renders a store id as a sequence id. `NULL` and blobs have none.
pub fn id_from_value(value: Value) -> Option<String> {
    match value {
        Value::Integer(i) => Some(i.to_string()),
        Value::Text(s) => Some(s),
        Value::Real(f) => Some(f.to_string()),
        Value::Null | Value::Blob(_) => None,
    }
}

/// Binds a sequence id, as an integer whenever it parses as one.
pub fn id_to_value(id: &str) -> Value {
    match id.parse::<i64>() {
        Ok(i) => Value::Integer(i),
        Err(_) => Value::Text(id.to_string()),
    }
}

/// Connection to a pre-existing pipeline database.
pub struct SqliteStore {
    conn: Connection,
    source: String,
}

impl SqliteStore {
    /// Opens an existing database for reading and writing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self::from_connection(conn, path.display().to_string()))
    }

    pub fn from_connection(conn: Connection, source: impl Into<String>) -> Self {
        Self { conn, source: source.into() }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn query_ids(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<FxHashSet<String>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("Failed to prepare query on {}", self.source))?;
        let rows = stmt.query_map(params, |row| row.get::<_, Value>(0))?;

        let mut ids = FxHashSet::default();
        for value in rows {
            if let Some(id) = id_from_value(value?) {
                ids.insert(id);
            }
        }
        Ok(ids)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Accession → gene dictionary from `nc_accession_numbers`.
    pub fn accession_gene_map(&self) -> Result<AccessionGeneMap> {
        let mut stmt = self
            .conn
            .prepare("SELECT accession_number, gene_symbol FROM nc_accession_numbers")
            .with_context(|| format!("Failed to query accession numbers in {}", self.source))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<String>>(1)?))
        })?;

        let mut map = AccessionGeneMap::new();
        for row in rows {
            if let (Some(accession), Some(gene)) = row? {
                map.insert(accession, gene);
            }
        }
        Ok(map)
    }

    /// ncRNA ids whose transcript belongs to `transcriptome`.
    pub fn transcriptome_ncrna_ids(&self, transcriptome: &str) -> Result<FxHashSet<String>> {
        log::info!("Extracting ncRNA ids that belong to transcriptome: {}", transcriptome);
        self.query_ids(
            "SELECT n.uid FROM ncrna n \
             LEFT OUTER JOIN transcripts t ON n.uid = t.uid \
             LEFT OUTER JOIN samples s ON t.sample_uid = s.uid \
             WHERE s.transcriptome = ?1",
            &[&transcriptome],
        )
    }

    /// Core ncRNA ids of `transcriptome`.
    pub fn core_ncrna_ids(&self, transcriptome: &str) -> Result<FxHashSet<String>> {
        log::info!("Extracting core ncRNA ids of transcriptome: {}", transcriptome);
        self.query_ids(
            "SELECT n.uid FROM ncrna n \
             LEFT OUTER JOIN transcripts t ON n.uid = t.uid \
             LEFT OUTER JOIN samples s ON t.sample_uid = s.uid \
             WHERE s.transcriptome = ?1 AND n.core_ncrna = 1",
            &[&transcriptome],
        )
    }

    /// ncRNA ids that passed clustering.
    pub fn cd_hit_pass_ids(&self) -> Result<FxHashSet<String>> {
        self.query_ids("SELECT uid FROM ncrna WHERE cd_hit_pass = 1", &[])
    }

    /// Transcripts of `transcriptome` shorter than `max_length` that carry
    /// no annotated CDS: the ncRNA candidates.
    pub fn ncrna_candidate_ids(&self, transcriptome: &str, max_length: u64) -> Result<FxHashSet<String>> {
        log::info!("Extracting ncRNA candidate transcript ids");
        let max_length = i64::try_from(max_length).unwrap_or(i64::MAX);
        self.query_ids(
            "SELECT t.uid FROM transcripts t \
             LEFT OUTER JOIN cds c ON t.uid = c.transcript_uid \
             LEFT OUTER JOIN samples s ON t.sample_uid = s.uid \
             WHERE t.length < ?1 AND c.gene_symbol IS NULL AND s.transcriptome = ?2",
            &[&max_length, &transcriptome],
        )
    }

    /// ncRNA id → gene symbol for every annotated ncRNA.
    pub fn ncrna_gene_map(&self) -> Result<FxHashMap<String, String>> {
        let mut stmt = self.conn.prepare("SELECT uid, gene_symbol FROM ncrna")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, Value>(0)?, row.get::<_, Option<String>>(1)?))
        })?;

        let mut genes = FxHashMap::default();
        for row in rows {
            let (uid, gene) = row?;
            if let (Some(id), Some(gene)) = (id_from_value(uid), gene) {
                genes.insert(id, gene);
            }
        }
        Ok(genes)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Inserts new ncRNA rows in one transaction.
    pub fn insert_ncrna_ids(&mut self, ids: &[String]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT INTO ncrna (uid) VALUES (?1)")?;
            for id in ids {
                stmt.execute([id_to_value(id)])
                    .with_context(|| format!("Failed to insert ncRNA id {}", id))?;
            }
        }
        tx.commit()?;
        log::info!("Inserted {} ncRNA ids", ids.len());
        Ok(ids.len())
    }

    /// Writes accession, gene symbol and core flag of each record.
    ///
    /// Rows are matched on the key column; ids with no row are silently
    /// unaffected. Unassigned records write `NULL` gene and core values.
    pub fn update_annotations(
        &mut self,
        table: &str,
        columns: &AnnotationColumns,
        records: &[AnnotationRecord],
    ) -> Result<usize> {
        let sql = format!(
            "UPDATE {} SET {} = ?1, {} = ?2, {} = ?3 WHERE {} = ?4",
            table, columns.accession, columns.gene, columns.core, columns.key
        );

        let tx = self.conn.transaction()?;
        let mut changed = 0usize;
        {
            let mut stmt = tx
                .prepare(&sql)
                .with_context(|| format!("Failed to prepare update of table {}", table))?;
            for record in records {
                changed += stmt.execute(params![
                    record.accession,
                    record.gene_symbol,
                    record.core,
                    id_to_value(&record.id),
                ])?;
            }
        }
        tx.commit()?;

        log::info!("Updated {} rows of table {}", changed, table);
        Ok(changed)
    }
}

impl DictionarySource for SqliteStore {
    fn load_dictionary(&self) -> Result<AccessionGeneMap> {
        let map = self.accession_gene_map()?;
        log::info!("Accession number count: {}", map.len());
        Ok(map)
    }
}
