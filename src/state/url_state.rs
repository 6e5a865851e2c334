/// Per-URL state definitions for tracking crawl progress
///
/// A URL moves Discovered -> Enqueued -> Visited and ends in exactly one of
/// Skipped, Error or Success.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of a URL in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlState {
    // ===== Active States =====
    /// Seen in a sitemap, a link, or as the seed
    Discovered,

    /// Waiting in the frontier
    Enqueued,

    /// Dequeued and handed to the dispatcher
    Visited,

    // ===== Terminal States =====
    /// The server answered but the page is not crawlable (non-200 status, non-HTML)
    Skipped,

    /// The page could not be fetched or processed (timeout, network failure)
    Error,

    /// The page was fetched and processed
    Success,
}

impl UrlState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::Error | Self::Success)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the state machine allows moving from `self` to `next`
    ///
    /// Only the forward path is legal; terminal states accept nothing.
    pub fn can_transition_to(&self, next: UrlState) -> bool {
        matches!(
            (self, next),
            (Self::Discovered, Self::Enqueued)
                | (Self::Enqueued, Self::Visited)
                | (Self::Visited, Self::Skipped)
                | (Self::Visited, Self::Error)
                | (Self::Visited, Self::Success)
        )
    }

    /// Converts the state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Enqueued => "enqueued",
            Self::Visited => "visited",
            Self::Skipped => "skipped",
            Self::Error => "error",
            Self::Success => "success",
        }
    }

    /// Parses a state from its database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(Self::Discovered),
            "enqueued" => Some(Self::Enqueued),
            "visited" => Some(Self::Visited),
            "skipped" => Some(Self::Skipped),
            "error" => Some(Self::Error),
            "success" => Some(Self::Success),
            _ => None,
        }
    }

    /// Returns all possible states
    pub fn all_states() -> [Self; 6] {
        [
            Self::Discovered,
            Self::Enqueued,
            Self::Visited,
            Self::Skipped,
            Self::Error,
            Self::Success,
        ]
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!UrlState::Discovered.is_terminal());
        assert!(!UrlState::Enqueued.is_terminal());
        assert!(!UrlState::Visited.is_terminal());
        assert!(UrlState::Skipped.is_terminal());
        assert!(UrlState::Error.is_terminal());
        assert!(UrlState::Success.is_terminal());
    }

    #[test]
    fn test_forward_transitions() {
        assert!(UrlState::Discovered.can_transition_to(UrlState::Enqueued));
        assert!(UrlState::Enqueued.can_transition_to(UrlState::Visited));
        assert!(UrlState::Visited.can_transition_to(UrlState::Success));
        assert!(UrlState::Visited.can_transition_to(UrlState::Skipped));
        assert!(UrlState::Visited.can_transition_to(UrlState::Error));
    }

    #[test]
    fn test_no_skipping_or_backtracking() {
        assert!(!UrlState::Discovered.can_transition_to(UrlState::Visited));
        assert!(!UrlState::Enqueued.can_transition_to(UrlState::Success));
        assert!(!UrlState::Visited.can_transition_to(UrlState::Enqueued));
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for terminal in [UrlState::Skipped, UrlState::Error, UrlState::Success] {
            for next in UrlState::all_states() {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_db_string_roundtrip() {
        for state in UrlState::all_states() {
            assert_eq!(UrlState::from_db_string(state.to_db_string()), Some(state));
        }
        assert_eq!(UrlState::from_db_string("processed"), None);
    }
}
