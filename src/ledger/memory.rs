use super::{Ledger, RecordOutcome};
use crate::error::LedgerError;
use crate::output::{PaymentRecord, UserId};
use chrono::Utc;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory implementation of [`Ledger`] using a `HashMap`.
///
/// The write lock makes check-and-insert one step.
pub struct InMemoryLedger {
    records: RwLock<HashMap<UserId, PaymentRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for InMemoryLedger {
    fn try_record(&self, user: &UserId) -> Result<RecordOutcome, LedgerError> {
        let mut records = self.records.write().map_err(|_| LedgerError::Poisoned)?;
        match records.entry(user.clone()) {
            Entry::Occupied(_) => Ok(RecordOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(PaymentRecord {
                    user: user.clone(),
                    paid_at: Utc::now(),
                });
                Ok(RecordOutcome::Inserted)
            }
        }
    }

    fn has_record(&self, user: &UserId) -> Result<bool, LedgerError> {
        let records = self.records.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(records.contains_key(user))
    }

    fn get(&self, user: &UserId) -> Result<Option<PaymentRecord>, LedgerError> {
        let records = self.records.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(records.get(user).cloned())
    }
}
