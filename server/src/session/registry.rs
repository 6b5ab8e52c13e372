//! Live map of handshake-completed sessions, keyed by nickname.
//!
//! Every operation — lookup, insert, remove, rename, and the iteration a
//! broadcast performs — runs under one lock, so a fan-out can never observe
//! a half-applied join or rename and two sessions can never race the same
//! nickname past the uniqueness check. Deliveries are unbounded-channel
//! pushes and never block while the lock is held.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use parley_proto::Envelope;

use super::SessionSender;

#[derive(Default)]
pub struct Registry {
    sessions: Mutex<HashMap<String, SessionSender>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted snapshot of the online nicknames.
    pub fn roster(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Atomically admit a new session: reject empty or taken names,
    /// otherwise insert, answer the joiner with the roster snapshot, and
    /// announce the join to every session — the joiner included.
    pub fn join(&self, nickname: &str, sender: SessionSender) -> bool {
        let mut sessions = self.lock();
        if nickname.is_empty() || sessions.contains_key(nickname) {
            return false;
        }
        sessions.insert(nickname.to_string(), sender.clone());

        let mut roster: Vec<String> = sessions.keys().cloned().collect();
        roster.sort();
        let _ = sender.send(Envelope::nickname_accepted(roster));

        let announce = Envelope::user_added(nickname);
        for peer in sessions.values() {
            let _ = peer.send(announce.clone());
        }
        true
    }

    /// Deliver one envelope to every registered session.
    pub fn broadcast(&self, envelope: Envelope) {
        for peer in self.lock().values() {
            let _ = peer.send(envelope.clone());
        }
    }

    /// Deliver one envelope to the session registered under `nickname`.
    /// Returns false, delivering nothing, when the target is not online.
    pub fn send_to(&self, nickname: &str, envelope: Envelope) -> bool {
        match self.lock().get(nickname) {
            Some(peer) => {
                let _ = peer.send(envelope);
                true
            }
            None => false,
        }
    }

    /// Atomically announce and apply a nickname change, keeping the
    /// session's queue. Fails when the new name is empty, unchanged, or
    /// taken, or when `old` is not registered.
    pub fn rename(&self, old: &str, new: &str) -> bool {
        let mut sessions = self.lock();
        if new.is_empty() || new == old || sessions.contains_key(new) {
            return false;
        }
        let Some(sender) = sessions.remove(old) else {
            return false;
        };

        let notice = Envelope::nickname_changed(format!("{old} changed nickname to {new}"));
        sessions.insert(new.to_string(), sender);
        for peer in sessions.values() {
            let _ = peer.send(notice.clone());
        }
        true
    }

    /// Announce a departure to every session — the leaver included — and
    /// drop the entry. A second call for the same nickname is a no-op, which
    /// makes disconnect cleanup safe on every exit path.
    pub fn leave(&self, nickname: &str) -> bool {
        let mut sessions = self.lock();
        if !sessions.contains_key(nickname) {
            return false;
        }
        let notice = Envelope::removed_user(nickname);
        for peer in sessions.values() {
            let _ = peer.send(notice.clone());
        }
        sessions.remove(nickname);
        true
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionSender>> {
        self.sessions.lock().expect("registry lock poisoned")
    }
}
