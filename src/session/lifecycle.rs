// SPDX-License-Identifier: GPL-3.0-only

//! Session lifecycle state machine
//!
//! ```text
//! NotInitialized → Initializing → Running ⇄ Paused
//!        └──────────────┴────────────┴───────┴──→ Disposed
//! ```

/// Phase of a camera session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionPhase {
    #[default]
    NotInitialized,
    Initializing,
    Running,
    Paused,
    /// Terminal: every write fails from here on
    Disposed,
}

impl SessionPhase {
    /// Check if moving from `self` to `next` is allowed
    pub fn can_transition_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (NotInitialized, Initializing)
                | (Initializing, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (NotInitialized | Initializing | Running | Paused, Disposed)
        )
    }

    pub fn is_running(self) -> bool {
        self == SessionPhase::Running
    }

    pub fn is_terminal(self) -> bool {
        self == SessionPhase::Disposed
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::NotInitialized => write!(f, "not initialized"),
            SessionPhase::Initializing => write!(f, "initializing"),
            SessionPhase::Running => write!(f, "running"),
            SessionPhase::Paused => write!(f, "paused"),
            SessionPhase::Disposed => write!(f, "disposed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use SessionPhase::*;
        assert!(NotInitialized.can_transition_to(Initializing));
        assert!(Initializing.can_transition_to(Running));
        assert!(Running.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Running));
        assert!(Paused.can_transition_to(Disposed));
    }

    #[test]
    fn test_disposed_is_terminal() {
        use SessionPhase::*;
        for next in [NotInitialized, Initializing, Running, Paused, Disposed] {
            assert!(!Disposed.can_transition_to(next));
        }
        assert!(Disposed.is_terminal());
    }

    #[test]
    fn test_cannot_skip_initialization() {
        use SessionPhase::*;
        assert!(!NotInitialized.can_transition_to(Running));
        assert!(!Initializing.can_transition_to(Paused));
    }
}
