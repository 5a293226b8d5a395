use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Process-unique identity of a session, channel or capture stream handle.
///
/// Events carry the id of the handle that emitted them, which is how stale
/// notifications from superseded handles are told apart from live ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

impl HandleId {
    pub fn next() -> HandleId {
        static ID_COUNTER: AtomicU64 = AtomicU64::new(1);
        HandleId(ID_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Deref for HandleId {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier assigned by the signaling service to a session participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> PeerId {
        PeerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a data or media channel handle.
///
/// `Closed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Opening,
    Open,
    Closed,
    Failed,
}

impl LinkState {
    /// Returns the next state, or `None` when the transition is not allowed.
    pub fn advance(self, next: LinkState) -> Option<LinkState> {
        match (self, next) {
            (LinkState::Opening, LinkState::Open)
            | (LinkState::Opening | LinkState::Open, LinkState::Closed)
            | (LinkState::Opening | LinkState::Open, LinkState::Failed) => Some(next),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_ids_are_unique() {
        let a = HandleId::next();
        let b = HandleId::next();
        assert_ne!(a, b);
        assert!(*b > *a);
    }

    #[test]
    fn terminal_states_do_not_advance() {
        assert_eq!(LinkState::Opening.advance(LinkState::Open), Some(LinkState::Open));
        assert_eq!(LinkState::Open.advance(LinkState::Failed), Some(LinkState::Failed));
        assert_eq!(LinkState::Open.advance(LinkState::Open), None);
        assert_eq!(LinkState::Closed.advance(LinkState::Open), None);
        assert_eq!(LinkState::Failed.advance(LinkState::Closed), None);
    }
}
