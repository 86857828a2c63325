use super::{Ledger, RecordOutcome};
use crate::error::LedgerError;
use crate::output::{PaymentRecord, UserId};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS payments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT UNIQUE NOT NULL,
        paid_at TEXT NOT NULL
    );
";

/// SQLite-backed [`Ledger`].
///
/// Uniqueness is enforced by the database, not by this process: several
/// `SqliteLedger`s (or processes) on the same file still produce one row per
/// user. The mutex only serialises use of the single connection.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open (creating if needed) a ledger database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| LedgerError::Open {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |r| r.get(0))?;
        debug!("Ledger journal mode: {}", mode);
        info!("Opened ledger at {}", path.display());
        Self::with_connection(conn)
    }

    /// A private, non-durable database. Useful in tests.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, LedgerError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of recorded payments.
    pub fn count(&self) -> Result<u64, LedgerError> {
        let conn = self.conn.lock().map_err(|_| LedgerError::Poisoned)?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM payments", [], |r| r.get(0))?;
        Ok(n as u64)
    }
}

impl Ledger for SqliteLedger {
    fn try_record(&self, user: &UserId) -> Result<RecordOutcome, LedgerError> {
        let paid_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let conn = self.conn.lock().map_err(|_| LedgerError::Poisoned)?;
        let inserted = conn.execute(
            "INSERT INTO payments (user_id, paid_at) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO NOTHING",
            params![user.as_str(), paid_at],
        )?;
        Ok(if inserted == 1 {
            RecordOutcome::Inserted
        } else {
            RecordOutcome::AlreadyExists
        })
    }

    fn has_record(&self, user: &UserId) -> Result<bool, LedgerError> {
        let conn = self.conn.lock().map_err(|_| LedgerError::Poisoned)?;
        let found = conn
            .query_row(
                "SELECT 1 FROM payments WHERE user_id = ?1",
                params![user.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn get(&self, user: &UserId) -> Result<Option<PaymentRecord>, LedgerError> {
        let conn = self.conn.lock().map_err(|_| LedgerError::Poisoned)?;
        let paid_at: Option<String> = conn
            .query_row(
                "SELECT paid_at FROM payments WHERE user_id = ?1",
                params![user.as_str()],
                |r| r.get(0),
            )
            .optional()?;

        paid_at
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|ts| PaymentRecord {
                        user: user.clone(),
                        paid_at: ts.with_timezone(&Utc),
                    })
                    .map_err(|e| LedgerError::CorruptRow {
                        user: user.to_string(),
                        detail: format!("paid_at '{}': {}", raw, e),
                    })
            })
            .transpose()
    }
}
