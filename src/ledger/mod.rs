//! The payment ledger: at most one accepted payment per user.
//!
//! [`Ledger::try_record`] is the only write and must be a single atomic
//! step. Two concurrent calls for the same user yield exactly one
//! [`RecordOutcome::Inserted`]; every other caller sees
//! [`RecordOutcome::AlreadyExists`]. Records are never updated or deleted.
//!
//! Implementations:
//! - [`SqliteLedger`]: durable, `UNIQUE(user_id)` + `ON CONFLICT DO NOTHING`
//! - [`InMemoryLedger`]: process-local, for tests and embedding

mod memory;
mod sqlite;

pub use memory::InMemoryLedger;
pub use sqlite::SqliteLedger;

use crate::error::LedgerError;
use crate::output::{PaymentRecord, UserId};
use serde::{Deserialize, Serialize};

/// Result of an idempotent ledger write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// This call created the user's record.
    Inserted,
    /// A record already existed; nothing was written.
    AlreadyExists,
}

/// Durable store of accepted payments keyed by user.
///
/// Calls are blocking; async callers go through `spawn_blocking`.
pub trait Ledger: Send + Sync {
    /// Atomically insert a record for `user` unless one exists.
    fn try_record(&self, user: &UserId) -> Result<RecordOutcome, LedgerError>;

    /// Whether `user` has a record. Safe to call concurrently with writes.
    fn has_record(&self, user: &UserId) -> Result<bool, LedgerError>;

    /// The user's record, if any.
    fn get(&self, user: &UserId) -> Result<Option<PaymentRecord>, LedgerError>;
}
