use bon::bon;
use std::os::raw::c_int;
use std::time::Duration;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
    #[default]
    Create,
}

impl AccessMode {
    pub(crate) fn open_flags(self) -> c_int {
        match self {
            AccessMode::ReadOnly => libsqlite3_sys::SQLITE_OPEN_READONLY,
            AccessMode::ReadWrite => libsqlite3_sys::SQLITE_OPEN_READWRITE,
            AccessMode::Create => libsqlite3_sys::SQLITE_OPEN_READWRITE | libsqlite3_sys::SQLITE_OPEN_CREATE,
        }
    }
}

/// How often a `COMMIT` that hits a busy database is retried.
///
/// `max_attempts` counts every `COMMIT` issued, including the first one.
/// `None` keeps retrying until the engine reports something other than busy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CommitRetry {
    pub max_attempts: Option<u32>,
    pub delay: Duration,
}

impl CommitRetry {
    pub const fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            delay,
        }
    }

    pub const fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    /// The attempt following `attempt`, `None` once the policy gives up.
    /// An unbounded policy keeps retrying, its count saturates at `u32::MAX`.
    pub(crate) fn next_attempt(&self, attempt: u32) -> Option<u32> {
        match self.max_attempts {
            None => Some(attempt.saturating_add(1)),
            Some(max) => attempt.checked_add(1).filter(|next| *next <= max),
        }
    }
}

impl Default for CommitRetry {
    fn default() -> Self {
        CommitRetry::bounded(10_000, Duration::from_micros(100))
    }
}

/// Settings applied when a connection is opened.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionConfig {
    pub mode: AccessMode,
    pub commit_retry: CommitRetry,
    /// Engine side busy handler, waits up to this long for locks before reporting busy
    pub busy_timeout: Option<Duration>,
}

#[bon]
impl ConnectionConfig {
    #[builder]
    pub fn new(mode: Option<AccessMode>, commit_retry: Option<CommitRetry>, busy_timeout: Option<Duration>) -> Self {
        Self {
            mode: mode.unwrap_or_default(),
            commit_retry: commit_retry.unwrap_or_default(),
            busy_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_retry_counts_first_attempt() {
        let retry = CommitRetry::bounded(3, Duration::ZERO);
        assert_eq!(retry.next_attempt(1), Some(2));
        assert_eq!(retry.next_attempt(2), Some(3));
        assert_eq!(retry.next_attempt(3), None);
        assert_eq!(CommitRetry::bounded(1, Duration::ZERO).next_attempt(1), None);
    }

    #[test]
    fn bounded_retry_stops_at_the_largest_limit() {
        let retry = CommitRetry::bounded(u32::MAX, Duration::ZERO);
        assert_eq!(retry.next_attempt(u32::MAX - 1), Some(u32::MAX));
        assert_eq!(retry.next_attempt(u32::MAX), None);
    }

    #[test]
    fn unbounded_retry_never_gives_up() {
        let retry = CommitRetry::unbounded(Duration::ZERO);
        assert_eq!(retry.next_attempt(1), Some(2));
        assert_eq!(retry.next_attempt(u32::MAX), Some(u32::MAX));
    }

    #[test]
    fn builder_fills_in_defaults() {
        let config = ConnectionConfig::builder().mode(AccessMode::ReadOnly).build();
        assert_eq!(config.mode, AccessMode::ReadOnly);
        assert_eq!(config.commit_retry, CommitRetry::default());
        assert_eq!(config.busy_timeout, None);

        let config = ConnectionConfig::builder()
            .commit_retry(CommitRetry::unbounded(Duration::from_millis(1)))
            .busy_timeout(Duration::from_secs(2))
            .build();
        assert_eq!(config.mode, AccessMode::Create);
        assert_eq!(config.commit_retry.max_attempts, None);
        assert_eq!(config.busy_timeout, Some(Duration::from_secs(2)));
    }
}
