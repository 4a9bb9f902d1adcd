use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use super::types::{AuthenticatorError, CeremonyKind, ErrorKind};
use crate::events::{Event, Events};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyState {
    Idle,
    AwaitingConsent,
    Signing,
    Completed,
    Failed,
    Cancelled,
}

impl CeremonyState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn terminal_for(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::UserDeclined | ErrorKind::Timeout | ErrorKind::Cancelled => Self::Cancelled,
            _ => Self::Failed,
        }
    }
}

struct Slot {
    state: CeremonyState,
    /// Set by `begin`, cleared when the owning guard drops.
    claimed: bool,
    cancel: Option<Arc<Notify>>,
}

/// The single ceremony slot of an authenticator instance.
pub(crate) struct CeremonySlot {
    inner: Mutex<Slot>,
}

impl Default for CeremonySlot {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Slot {
                state: CeremonyState::Idle,
                claimed: false,
                cancel: None,
            }),
        }
    }
}

impl CeremonySlot {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn state(&self) -> CeremonyState {
        self.lock().state
    }

    /// Claim the slot, failing fast if a ceremony is already in flight.
    pub(crate) fn begin<'a>(
        &'a self,
        kind: CeremonyKind,
        events: &'a Events,
    ) -> Result<CeremonyGuard<'a>, AuthenticatorError> {
        let mut slot = self.lock();
        if slot.claimed {
            tracing::warn!(?kind, busy_in = ?slot.state, "Rejecting concurrent ceremony");
            return Err(AuthenticatorError::Busy);
        }
        slot.claimed = true;
        let cancel = Arc::new(Notify::new());
        slot.cancel = Some(cancel.clone());
        Ok(CeremonyGuard {
            slot: self,
            kind,
            events,
            cancel,
            finished: false,
        })
    }

    /// Wake the in-flight ceremony's suspension point. Returns false when
    /// nothing is running.
    pub(crate) fn cancel(&self) -> bool {
        let slot = self.lock();
        match &slot.cancel {
            Some(notify) => {
                notify.notify_one();
                true
            }
            None => false,
        }
    }
}

/// Ownership of the slot for one ceremony. Releasing it (by `finish` or by
/// dropping an abandoned ceremony) always returns the slot to `Idle`.
pub(crate) struct CeremonyGuard<'a> {
    slot: &'a CeremonySlot,
    kind: CeremonyKind,
    events: &'a Events,
    cancel: Arc<Notify>,
    finished: bool,
}

impl CeremonyGuard<'_> {
    pub(crate) fn advance(&self, to: CeremonyState) {
        let from = {
            let mut slot = self.slot.lock();
            std::mem::replace(&mut slot.state, to)
        };
        self.events.emit(Event::StateChanged {
            ceremony: self.kind,
            from,
            to,
        });
    }

    pub(crate) async fn cancelled(&self) {
        self.cancel.notified().await;
    }

    pub(crate) fn finish<T>(
        mut self,
        result: Result<T, AuthenticatorError>,
    ) -> Result<T, AuthenticatorError> {
        match &result {
            Ok(_) => self.advance(CeremonyState::Completed),
            Err(e) => {
                self.advance(CeremonyState::terminal_for(e.kind()));
                self.events.emit(Event::CeremonyFailed {
                    ceremony: self.kind,
                    kind: e.kind(),
                });
            }
        }
        self.finished = true;
        result
    }
}

impl Drop for CeremonyGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.advance(CeremonyState::Cancelled);
        }
        let mut slot = self.slot.lock();
        slot.state = CeremonyState::Idle;
        slot.claimed = false;
        slot.cancel = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_begin_is_busy() {
        let slot = CeremonySlot::default();
        let events = Events::none();
        let guard = slot.begin(CeremonyKind::Registration, &events).unwrap();
        guard.advance(CeremonyState::AwaitingConsent);
        assert!(matches!(
            slot.begin(CeremonyKind::Authentication, &events),
            Err(AuthenticatorError::Busy)
        ));
        drop(guard);
        assert_eq!(slot.state(), CeremonyState::Idle);
        assert!(slot.begin(CeremonyKind::Authentication, &events).is_ok());
    }

    #[test]
    fn test_begin_claims_slot_before_any_transition() {
        let slot = CeremonySlot::default();
        let events = Events::none();
        let first = slot.begin(CeremonyKind::Registration, &events).unwrap();
        assert!(matches!(
            slot.begin(CeremonyKind::Authentication, &events),
            Err(AuthenticatorError::Busy)
        ));
        // The rejected attempt must leave the first ceremony's cancel handle in place.
        assert!(slot.cancel());
        first.advance(CeremonyState::AwaitingConsent);
        assert_eq!(slot.state(), CeremonyState::AwaitingConsent);
        drop(first);
        assert_eq!(slot.state(), CeremonyState::Idle);
        assert!(slot.begin(CeremonyKind::Authentication, &events).is_ok());
    }

    #[test]
    fn test_finish_releases_slot() {
        let slot = CeremonySlot::default();
        let events = Events::none();
        let guard = slot.begin(CeremonyKind::Registration, &events).unwrap();
        let result: Result<(), _> = guard.finish(Err(AuthenticatorError::Timeout));
        assert!(matches!(result, Err(AuthenticatorError::Timeout)));
        assert_eq!(slot.state(), CeremonyState::Idle);
    }

    #[test]
    fn test_cancel_without_ceremony() {
        assert!(!CeremonySlot::default().cancel());
    }

    #[test]
    fn test_terminal_states() {
        assert!(CeremonyState::Completed.is_terminal());
        assert!(CeremonyState::Cancelled.is_terminal());
        assert!(!CeremonyState::Signing.is_terminal());
        assert_eq!(
            CeremonyState::terminal_for(ErrorKind::Timeout),
            CeremonyState::Cancelled
        );
        assert_eq!(
            CeremonyState::terminal_for(ErrorKind::KeyStoreFailure),
            CeremonyState::Failed
        );
    }
}
