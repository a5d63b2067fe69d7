//! Tamper-evident, hash-chained, append-only operation journal (SQLite).
//!
//! The journal is the durable, totally ordered history of admitted
//! operations.  Registry state is never stored; it is re-derived by replaying
//! the journal from genesis.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension as _, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{CertchainError, OptionExt as _, Result, ResultExt as _};
use crate::operation::Operation;
use crate::roles::AuthorityPolicy;
use crate::types::{CallContext, Principal, Timestamp};
use crate::util;

pub const JOURNAL_SCHEMA_VERSION: i64 = 1;

const BACKUP_FORMAT: &str = "certchain-journal-backup-v1";

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalMeta {
    pub journal_id: Uuid,
    pub created_at_utc: String,
    pub schema_version: i64,
    /// Genesis admin; later admin changes are journaled operations.
    pub admin: Principal,
    pub policy: AuthorityPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: i64,
    pub ts_unix: Timestamp,
    pub ts_utc: String,
    pub caller: Principal,
    pub operation_json: String,
    pub payload_hash_hex: String,
    pub prev_hash_hex: String,
    pub entry_hash_hex: String,
}

impl JournalEntry {
    pub fn context(&self) -> CallContext {
        CallContext {
            caller: self.caller.clone(),
            now: self.ts_unix,
        }
    }

    pub fn operation(&self) -> Result<Operation> {
        serde_json::from_str(&self.operation_json).map_err(|e| {
            CertchainError::Journal(format!("decode operation at seq {}: {e}", self.seq))
        })
    }
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

pub struct Journal {
    conn: Connection,
    meta: JournalMeta,
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl Journal {
    pub fn create_new(db_path: &Path, admin: Principal, policy: AuthorityPolicy) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CertchainError::Journal(format!("create db parent dir {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(db_path)
            .map_err(|e| CertchainError::Journal(format!("open db {}: {e}", db_path.display())))?;
        Self::initialise(conn, new_meta(admin, policy)?, true)
    }

    /// A throwaway journal for tests and benches.
    pub fn open_in_memory(admin: Principal, policy: AuthorityPolicy) -> Result<Self> {
        let conn = Connection::open_in_memory().ctx_journal("open in-memory db")?;
        Self::initialise(conn, new_meta(admin, policy)?, false)
    }

    fn initialise(conn: Connection, meta: JournalMeta, durable: bool) -> Result<Self> {
        init_schema(&conn, durable)?;
        write_meta(&conn, &meta)?;
        info!(journal_id = %meta.journal_id, admin = %meta.admin, "journal created");
        Ok(Self { conn, meta })
    }

    pub fn open_existing(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(CertchainError::Journal(format!(
                "no journal at {} (run `certchain init` first)",
                db_path.display()
            )));
        }
        let conn = Connection::open(db_path)
            .map_err(|e| CertchainError::Journal(format!("open db {}: {e}", db_path.display())))?;

        let journal_id: String = read_meta_value(&conn, "journal_id")?;
        let created_at_utc: String = read_meta_value(&conn, "created_at_utc")?;
        let schema_version: i64 = read_meta_value(&conn, "schema_version")?
            .parse()
            .ctx_journal("parse schema_version")?;

        if schema_version != JOURNAL_SCHEMA_VERSION {
            return Err(CertchainError::Journal(format!(
                "unsupported schema_version {schema_version} (expected {JOURNAL_SCHEMA_VERSION})"
            )));
        }

        let admin = Principal::new(read_meta_value(&conn, "admin")?);
        let policy: AuthorityPolicy = serde_json::from_str(&read_meta_value(&conn, "policy")?)
            .ctx_journal("parse authority policy")?;

        let meta = JournalMeta {
            journal_id: Uuid::parse_str(&journal_id).ctx_journal("parse journal_id uuid")?,
            created_at_utc,
            schema_version,
            admin,
            policy,
        };
        Ok(Self { conn, meta })
    }

    pub fn meta(&self) -> &JournalMeta {
        &self.meta
    }

    pub fn append(&mut self, ctx: &CallContext, operation: &Operation) -> Result<JournalEntry> {
        let operation_json =
            serde_json::to_string(operation).ctx_journal("serialize operation")?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .ctx_journal("begin tx")?;

        let (last_seq, last_hash): (i64, Vec<u8>) = tx
            .query_row(
                "SELECT seq, entry_hash FROM entries ORDER BY seq DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .unwrap_or((0, vec![0u8; 32]));

        let next_seq = last_seq + 1;
        let prev_hash = last_hash;
        let payload_hash = payload_hash(&ctx.caller, ctx.now, &operation_json);
        let entry_hash = entry_hash(&prev_hash, &payload_hash);
        let ts_utc = util::unix_to_rfc3339(ctx.now);
        let ts_unix = i64::try_from(ctx.now).ctx_journal("timestamp out of range")?;

        tx.execute(
            r#"
            INSERT INTO entries(
              seq, ts_unix, ts_utc, caller, operation_json, payload_hash, prev_hash, entry_hash
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
            "#,
            params![
                next_seq,
                ts_unix,
                ts_utc,
                ctx.caller.as_str(),
                operation_json,
                payload_hash.to_vec(),
                prev_hash,
                entry_hash.to_vec(),
            ],
        )
        .ctx_journal("insert journal entry")?;

        tx.commit().ctx_journal("commit tx")?;

        Ok(JournalEntry {
            seq: next_seq,
            ts_unix: ctx.now,
            ts_utc,
            caller: ctx.caller.clone(),
            operation_json,
            payload_hash_hex: hex::encode(payload_hash),
            prev_hash_hex: hex::encode(&prev_hash),
            entry_hash_hex: hex::encode(entry_hash),
        })
    }

    pub fn latest_seq(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COALESCE(MAX(seq),0) FROM entries", [], |row| row.get(0))
            .ctx_journal("latest seq")
    }

    pub fn iter_entries(&self) -> Result<Vec<JournalEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT seq, ts_unix, ts_utc, caller, operation_json,
                       payload_hash, prev_hash, entry_hash
                FROM entries
                ORDER BY seq ASC
                "#,
            )
            .ctx_journal("prepare select entries")?;

        let mut rows = stmt.query([]).ctx_journal("query entries")?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().ctx_journal("next row")? {
            let seq: i64 = row.get(0)?;
            let ts_unix: i64 = row.get(1)?;
            let payload_hash: Vec<u8> = row.get(5)?;
            let prev_hash: Vec<u8> = row.get(6)?;
            let entry_hash: Vec<u8> = row.get(7)?;
            out.push(JournalEntry {
                seq,
                ts_unix: u64::try_from(ts_unix).map_err(|_| {
                    CertchainError::Journal(format!("negative timestamp at seq {seq}"))
                })?,
                ts_utc: row.get(2)?,
                caller: Principal::new(row.get::<_, String>(3)?),
                operation_json: row.get(4)?,
                payload_hash_hex: hex::encode(payload_hash),
                prev_hash_hex: hex::encode(prev_hash),
                entry_hash_hex: hex::encode(entry_hash),
            });
        }
        Ok(out)
    }

    /// Recompute the hash chain and report the first entry that disagrees.
    /// Every entry's operation must also decode.
    pub fn verify_integrity(&self) -> Result<usize> {
        let entries = self.iter_entries()?;
        verify_chain(&entries)?;
        Ok(entries.len())
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

fn payload_hash(caller: &Principal, ts: Timestamp, operation_json: &str) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(caller.as_str().len() + 9 + operation_json.len());
    preimage.extend_from_slice(caller.as_str().as_bytes());
    preimage.push(0);
    preimage.extend_from_slice(&ts.to_be_bytes());
    preimage.extend_from_slice(operation_json.as_bytes());
    util::sha256(&preimage)
}

fn entry_hash(prev_hash: &[u8], payload_hash: &[u8; 32]) -> [u8; 32] {
    let mut preimage = Vec::with_capacity(64);
    preimage.extend_from_slice(prev_hash);
    preimage.extend_from_slice(payload_hash);
    util::sha256(&preimage)
}

fn verify_chain(entries: &[JournalEntry]) -> Result<()> {
    let mut prev_hash = vec![0u8; 32];
    let mut expected_seq = 1;
    for e in entries {
        if e.seq != expected_seq {
            return Err(CertchainError::Journal(format!(
                "sequence gap: expected seq {expected_seq}, found {}",
                e.seq
            )));
        }
        let payload = payload_hash(&e.caller, e.ts_unix, &e.operation_json);
        let entry = entry_hash(&prev_hash, &payload);

        if hex::encode(payload) != e.payload_hash_hex {
            return Err(CertchainError::Journal(format!(
                "payload_hash mismatch at seq {}",
                e.seq
            )));
        }
        if hex::encode(&prev_hash) != e.prev_hash_hex {
            return Err(CertchainError::Journal(format!(
                "prev_hash mismatch at seq {}",
                e.seq
            )));
        }
        if hex::encode(entry) != e.entry_hash_hex {
            return Err(CertchainError::Journal(format!(
                "entry_hash mismatch at seq {}",
                e.seq
            )));
        }
        e.operation()?;

        prev_hash = entry.to_vec();
        expected_seq += 1;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Backup / restore
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct JournalExport {
    format: String,
    exported_at_utc: String,
    meta: JournalMeta,
    entries: Vec<JournalEntry>,
}

/// Export the full journal (meta + entries) to a JSON file for backup.
pub fn export_journal_json(journal: &Journal, out_path: &Path) -> Result<()> {
    let export = JournalExport {
        format: BACKUP_FORMAT.to_string(),
        exported_at_utc: util::now_utc_rfc3339(),
        meta: journal.meta().clone(),
        entries: journal.iter_entries()?,
    };
    let json = serde_json::to_vec_pretty(&export).ctx_journal("serialize journal export")?;
    std::fs::write(out_path, json)
        .map_err(|e| CertchainError::Journal(format!("write export {}: {e}", out_path.display())))?;
    info!(path = %out_path.display(), entries = export.entries.len(), "journal exported");
    Ok(())
}

/// Import a journal from a JSON backup into a new database.
///
/// Entries keep their original hashes; the chain is verified before anything
/// is written.
pub fn import_journal_json(json_path: &Path, db_path: &Path) -> Result<Journal> {
    let json_bytes = std::fs::read(json_path)
        .map_err(|e| CertchainError::Journal(format!("read import {}: {e}", json_path.display())))?;
    let export: JournalExport =
        serde_json::from_slice(&json_bytes).ctx_journal("parse journal backup")?;
    if export.format != BACKUP_FORMAT {
        return Err(CertchainError::Journal(format!(
            "unsupported backup format '{}'",
            export.format
        )));
    }
    verify_chain(&export.entries)?;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CertchainError::Journal(format!("create dir {}: {e}", parent.display())))?;
    }
    let mut conn = Connection::open(db_path)
        .map_err(|e| CertchainError::Journal(format!("open db {}: {e}", db_path.display())))?;
    init_schema(&conn, true)?;
    write_meta(&conn, &export.meta)?;

    let tx = conn.transaction().ctx_journal("begin import tx")?;
    for e in &export.entries {
        let ts_unix = i64::try_from(e.ts_unix).ctx_journal("timestamp out of range")?;
        tx.execute(
            r#"
            INSERT INTO entries(
              seq, ts_unix, ts_utc, caller, operation_json, payload_hash, prev_hash, entry_hash
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
            "#,
            params![
                e.seq,
                ts_unix,
                e.ts_utc,
                e.caller.as_str(),
                e.operation_json,
                hex::decode(&e.payload_hash_hex).ctx_journal("decode payload_hash")?,
                hex::decode(&e.prev_hash_hex).ctx_journal("decode prev_hash")?,
                hex::decode(&e.entry_hash_hex).ctx_journal("decode entry_hash")?,
            ],
        )
        .ctx_journal("insert imported entry")?;
    }
    tx.commit().ctx_journal("commit import")?;

    let journal = Journal {
        conn,
        meta: export.meta,
    };
    journal.verify_integrity()?;
    info!(entries = export.entries.len(), "journal imported and verified");
    Ok(journal)
}

// ---------------------------------------------------------------------------
// Schema helpers
// ---------------------------------------------------------------------------

fn new_meta(admin: Principal, policy: AuthorityPolicy) -> Result<JournalMeta> {
    admin.ensure_not_null("admin")?;
    Ok(JournalMeta {
        journal_id: Uuid::new_v4(),
        created_at_utc: util::now_utc_rfc3339(),
        schema_version: JOURNAL_SCHEMA_VERSION,
        admin,
        policy,
    })
}

fn init_schema(conn: &Connection, durable: bool) -> Result<()> {
    if durable {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=FULL;
            "#,
        )
        .ctx_journal("set pragmas")?;
    }
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS meta(
          k TEXT PRIMARY KEY,
          v TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS entries(
          seq INTEGER PRIMARY KEY,
          ts_unix INTEGER NOT NULL,
          ts_utc TEXT NOT NULL,
          caller TEXT NOT NULL,
          operation_json TEXT NOT NULL,
          payload_hash BLOB NOT NULL,
          prev_hash BLOB NOT NULL,
          entry_hash BLOB NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_entries_caller ON entries(caller);
        "#,
    )
    .ctx_journal("create tables")
}

fn write_meta(conn: &Connection, meta: &JournalMeta) -> Result<()> {
    let policy_json = serde_json::to_string(&meta.policy).ctx_journal("serialize policy")?;
    let pairs = [
        ("journal_id", meta.journal_id.to_string()),
        ("created_at_utc", meta.created_at_utc.clone()),
        ("schema_version", meta.schema_version.to_string()),
        ("admin", meta.admin.to_string()),
        ("policy", policy_json),
    ];
    for (k, v) in pairs {
        conn.execute("INSERT OR REPLACE INTO meta(k,v) VALUES (?1,?2)", params![k, v])?;
    }
    Ok(())
}

fn read_meta_value(conn: &Connection, key: &str) -> Result<String> {
    conn.query_row("SELECT v FROM meta WHERE k=?1", params![key], |row| row.get(0))
        .optional()
        .ctx_journal(&format!("read {key}"))?
        .required_journal(&format!("journal meta is missing '{key}'"))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
