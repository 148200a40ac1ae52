//! Execution Timeout Management
//!
//! A timeout is an explicit "wait up to this long" bound. The executor uses it to
//! decide when to kill a child process; the MCP adapter uses [`ExecutionTimeout::run`]
//! as an outer guard around a whole gateway call.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time;

/// Returned by [`ExecutionTimeout::run`] when the guarded future overran
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("execution timed out after {0} seconds")]
pub struct Elapsed(pub ExecutionTimeout);

/// Execution timeout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    duration: Duration,
}

impl ExecutionTimeout {
    /// Create a new execution timeout
    ///
    /// ```
    /// use std::time::Duration;
    /// use shell_gateway::tools::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(30));
    /// assert_eq!(timeout.to_string(), "30");
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Same bound extended by `grace`
    pub fn with_grace(&self, grace: Duration) -> Self {
        Self::new(self.duration.saturating_add(grace))
    }

    /// Run a future, giving up once the timeout elapses
    ///
    /// The future is dropped on expiry, so anything it owns is released.
    pub async fn run<F, T>(&self, future: F) -> Result<T, Elapsed>
    where
        F: Future<Output = T>,
    {
        time::timeout(self.duration, future)
            .await
            .map_err(|_| Elapsed(*self))
    }
}

/// Seconds, without a trailing `.0` for whole values
impl fmt::Display for ExecutionTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.duration.as_secs_f64())
    }
}
