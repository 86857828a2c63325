//! Per-user submission lifecycle.
//!
//! ```text
//!            start                 accepted + recorded
//!  Unpaid ─────────▶ AwaitingDocument ─────────────────▶ Resolved
//!                      │   ▲
//!                      └───┘ wrong file type / unreadable / rejected
//! ```
//!
//! A ledger record overrides everything: whenever the ledger says the user
//! has paid, the state is `Resolved` no matter what happened before. A
//! rejection is never stored; it loops back to `AwaitingDocument`.

use crate::ledger::RecordOutcome;
use crate::output::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Where a user is in the payment flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    /// Never asked to pay.
    #[default]
    Unpaid,
    /// Asked for a receipt; may submit (again).
    AwaitingDocument,
    /// Accepted and recorded. Terminal; coincides with a ledger record.
    Resolved,
}

impl SubmissionState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, SubmissionState::Resolved)
    }
}

/// Something that happened to a user's submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionEvent {
    /// User opened the flow (e.g. `/start`).
    Start,
    /// Sent something that is not a readable receipt file.
    WrongFileType,
    /// File could not be parsed, rendered or recognised.
    ExtractionFailed,
    /// Rule engine rejected the document.
    Rejected,
    /// Rule engine accepted and the ledger write completed, either way.
    Recorded(RecordOutcome),
}

/// Pure transition function.
pub fn transition(
    state: SubmissionState,
    event: &SubmissionEvent,
    ledger_has_record: bool,
) -> SubmissionState {
    if ledger_has_record {
        return SubmissionState::Resolved;
    }
    match (state, event) {
        (SubmissionState::Resolved, _) => SubmissionState::Resolved,
        (_, SubmissionEvent::Recorded(_)) => SubmissionState::Resolved,
        // A submission without a prior Start still means the user is
        // trying to pay; treat it as awaiting.
        (_, SubmissionEvent::Start)
        | (_, SubmissionEvent::WrongFileType)
        | (_, SubmissionEvent::ExtractionFailed)
        | (_, SubmissionEvent::Rejected) => SubmissionState::AwaitingDocument,
    }
}

#[derive(Debug, Default)]
struct UserEntry {
    state: SubmissionState,
    last_rejection: Option<Instant>,
}

/// Current state for every user seen by this process.
///
/// Entries are created on first use and never removed. After a user is
/// resolved the ledger alone decides, so a lost tracker (restart) only
/// forgets unpaid users' progress.
#[derive(Debug)]
pub struct SubmissionTracker {
    users: Mutex<HashMap<UserId, UserEntry>>,
    cooldown: Option<Duration>,
}

impl SubmissionTracker {
    pub fn new(cooldown: Option<Duration>) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            cooldown,
        }
    }

    /// A panic elsewhere never leaves an entry half-written, so a poisoned
    /// map is still consistent.
    fn users(&self) -> MutexGuard<'_, HashMap<UserId, UserEntry>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// State of `user`, `Unpaid` if never seen.
    pub fn state(&self, user: &UserId) -> SubmissionState {
        self.users().get(user).map(|e| e.state).unwrap_or_default()
    }

    /// Apply `event` and return the new state.
    pub fn apply(
        &self,
        user: &UserId,
        event: &SubmissionEvent,
        ledger_has_record: bool,
    ) -> SubmissionState {
        let mut users = self.users();
        let entry = users.entry(user.clone()).or_default();
        entry.state = transition(entry.state, event, ledger_has_record);
        if *event == SubmissionEvent::Rejected && !entry.state.is_resolved() {
            entry.last_rejection = Some(Instant::now());
        }
        entry.state
    }

    /// Time left before `user` may resubmit after a rejection, if throttled.
    pub fn cooldown_remaining(&self, user: &UserId) -> Option<Duration> {
        let cooldown = self.cooldown?;
        let users = self.users();
        let rejected_at = users.get(user)?.last_rejection?;
        cooldown.checked_sub(rejected_at.elapsed()).filter(|d| !d.is_zero())
    }
}

impl Default for SubmissionTracker {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use SubmissionEvent as E;
    use SubmissionState as S;

    #[test]
    fn start_moves_unpaid_to_awaiting() {
        assert_eq!(transition(S::Unpaid, &E::Start, false), S::AwaitingDocument);
    }

    #[test]
    fn ledger_record_short_circuits_every_state() {
        for state in [S::Unpaid, S::AwaitingDocument, S::Resolved] {
            for event in [E::Start, E::WrongFileType, E::ExtractionFailed, E::Rejected] {
                assert_eq!(transition(state, &event, true), S::Resolved);
            }
        }
    }

    #[test]
    fn failures_and_rejections_keep_awaiting() {
        for event in [E::WrongFileType, E::ExtractionFailed, E::Rejected] {
            assert_eq!(
                transition(S::AwaitingDocument, &event, false),
                S::AwaitingDocument
            );
        }
    }

    #[test]
    fn both_ledger_outcomes_resolve() {
        for outcome in [RecordOutcome::Inserted, RecordOutcome::AlreadyExists] {
            assert_eq!(
                transition(S::AwaitingDocument, &E::Recorded(outcome), false),
                S::Resolved
            );
        }
    }

    #[test]
    fn resolved_is_terminal() {
        assert_eq!(transition(S::Resolved, &E::Rejected, false), S::Resolved);
        assert_eq!(transition(S::Resolved, &E::Start, false), S::Resolved);
    }

    #[test]
    fn tracker_defaults_to_unpaid_and_follows_events() {
        let tracker = SubmissionTracker::default();
        let user = UserId::from(1i64);
        assert_eq!(tracker.state(&user), S::Unpaid);
        assert_eq!(tracker.apply(&user, &E::Start, false), S::AwaitingDocument);
        assert_eq!(tracker.apply(&user, &E::Rejected, false), S::AwaitingDocument);
        assert_eq!(
            tracker.apply(&user, &E::Recorded(RecordOutcome::Inserted), false),
            S::Resolved
        );
        assert_eq!(tracker.state(&user), S::Resolved);
    }

    #[test]
    fn cooldown_only_after_rejection() {
        let tracker = SubmissionTracker::new(Some(Duration::from_secs(60)));
        let user = UserId::from("u");
        tracker.apply(&user, &E::Start, false);
        assert!(tracker.cooldown_remaining(&user).is_none());

        tracker.apply(&user, &E::ExtractionFailed, false);
        assert!(tracker.cooldown_remaining(&user).is_none());

        tracker.apply(&user, &E::Rejected, false);
        let left = tracker.cooldown_remaining(&user).expect("throttled");
        assert!(left <= Duration::from_secs(60));
    }

    #[test]
    fn no_cooldown_configured_never_throttles() {
        let tracker = SubmissionTracker::default();
        let user = UserId::from("u");
        tracker.apply(&user, &E::Rejected, false);
        assert!(tracker.cooldown_remaining(&user).is_none());
    }

    #[test]
    fn poisoned_tracker_keeps_answering() {
        let tracker = std::sync::Arc::new(SubmissionTracker::new(Some(Duration::from_secs(60))));
        let user = UserId::from("u");
        tracker.apply(&user, &E::Rejected, false);

        let poisoner = std::sync::Arc::clone(&tracker);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.users.lock().unwrap();
            panic!("poison the tracker");
        })
        .join();
        assert!(tracker.users.is_poisoned());

        assert_eq!(tracker.state(&user), S::AwaitingDocument);
        assert!(tracker.cooldown_remaining(&user).is_some());
        assert_eq!(
            tracker.apply(&user, &E::Recorded(RecordOutcome::Inserted), false),
            S::Resolved
        );
        assert_eq!(tracker.state(&user), S::Resolved);
    }
}
