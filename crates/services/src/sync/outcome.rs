use std::fmt;

/// Why an operation fell short of a full local + remote commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncIssue {
    /// The document store could not be reached or rejected the request.
    RemoteUnavailable(String),
    /// The acting user changed while the operation was in flight; its result was dropped.
    StaleSession,
    /// The local mirror could not be read or written.
    LocalStore(String),
    /// Progress has not finished loading for the current session.
    NotReady,
}

impl fmt::Display for SyncIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncIssue::RemoteUnavailable(reason) => write!(f, "remote store unavailable: {reason}"),
            SyncIssue::StaleSession => f.write_str("session changed before the operation finished"),
            SyncIssue::LocalStore(reason) => write!(f, "local store failed: {reason}"),
            SyncIssue::NotReady => f.write_str("progress is still loading"),
        }
    }
}

/// Outcome of every coordinator operation.
///
/// `Degraded` means the user-visible state is committed but something lags
/// (usually the remote copy). `Failed` means the operation had no effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    Success,
    Degraded(SyncIssue),
    Failed(SyncIssue),
}

impl SyncResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, SyncResult::Success)
    }

    #[must_use]
    pub fn issue(&self) -> Option<&SyncIssue> {
        match self {
            SyncResult::Success => None,
            SyncResult::Degraded(issue) | SyncResult::Failed(issue) => Some(issue),
        }
    }
}

/// Coordinator lifecycle. Re-enters `Loading` on every identity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Uninitialized,
    Loading,
    Ready,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_is_exposed_for_non_success() {
        assert!(SyncResult::Success.issue().is_none());
        let degraded = SyncResult::Degraded(SyncIssue::RemoteUnavailable("offline".into()));
        assert_eq!(
            degraded.issue().map(ToString::to_string).as_deref(),
            Some("remote store unavailable: offline")
        );
        assert!(!SyncResult::Failed(SyncIssue::StaleSession).is_success());
    }
}
