//! Mirror of the server's online-user set, rebuilt incrementally from
//! protocol events. Purely a cache — the server is the source of truth.

use std::collections::BTreeSet;

#[derive(Debug, Default, Clone)]
pub struct Roster {
    users: BTreeSet<String>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set from an acceptance snapshot.
    pub fn seed(&mut self, users: impl IntoIterator<Item = String>) {
        self.users = users.into_iter().collect();
    }

    pub fn add(&mut self, nickname: &str) {
        self.users.insert(nickname.to_string());
    }

    pub fn remove(&mut self, nickname: &str) {
        self.users.remove(nickname);
    }

    /// Apply a rename notice of the form `<old> changed nickname to <new>`:
    /// the first whitespace token leaves the set and the last one joins it.
    pub fn apply_rename_notice(&mut self, notice: &str) {
        let mut tokens = notice.split_whitespace();
        let Some(old) = tokens.next() else { return };
        let Some(new) = tokens.next_back() else { return };
        self.users.remove(old);
        self.users.insert(new.to_string());
    }

    pub fn contains(&self, nickname: &str) -> bool {
        self.users.contains(nickname)
    }

    /// Sorted snapshot of the mirrored names.
    pub fn names(&self) -> Vec<String> {
        self.users.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
