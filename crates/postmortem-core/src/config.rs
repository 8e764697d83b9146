//! Capture budget configuration.

use std::env;
use std::time::Duration;

use tracing::warn;

/// Default number of BFS levels expanded from the roots.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Default wall-clock budget for one capture.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How far a capture may walk.
///
/// Both limits are checked between BFS levels only: a level that has started
/// always completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig
{
    /// Levels to expand when the caller does not pass a depth.
    pub max_depth: usize,
    /// Stop expanding new levels once this much time has passed.
    pub timeout: Duration,
}

impl Default for CaptureConfig
{
    fn default() -> Self
    {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CaptureConfig
{
    /// Defaults overridden by `POSTMORTEM_MAX_DEPTH` and
    /// `POSTMORTEM_TIMEOUT_MS` when set. Unparsable values are ignored with a
    /// warning.
    #[must_use]
    pub fn from_env() -> Self
    {
        let mut config = Self::default();
        if let Some(depth) = env_number("POSTMORTEM_MAX_DEPTH") {
            config.max_depth = usize::try_from(depth).unwrap_or(usize::MAX);
        }
        if let Some(millis) = env_number("POSTMORTEM_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(millis);
        }
        config
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self
    {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self
    {
        self.timeout = timeout;
        self
    }
}

fn env_number(name: &str) -> Option<u64>
{
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(variable = name, value = %raw, error = %err, "ignoring invalid number");
            None
        }
    }
}
