//! # Redaction Policy
//!
//! Capture-time scrubbing of sensitive strings.
//!
//! Two independent checks run inside the `str` encoder, before the value is
//! written into a record:
//!
//! - **Secret patterns**: a string that matches any pattern starting at its
//!   first character is replaced by [`REDACTED`].
//! - **Environment values**: a string exactly equal to one of the process
//!   environment values snapshotted for the current capture is replaced by
//!   [`REDACTED`].
//!
//! The environment snapshot only exists while an [`EnvironScope`] is alive.
//! Decoding never consults the policy.
//!
//! ## Environment Variables
//!
//! - `POSTMORTEM_HIDE_SECRET`: `0`/`false`/`off` disables pattern redaction
//! - `POSTMORTEM_HIDE_ENVIRON`: `0`/`false`/`off` disables environment redaction

use std::borrow::Cow;
use std::collections::HashSet;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use regex::Regex;
use tracing::{debug, warn};

use crate::error::Result;

/// Replacement written in place of a redacted string.
pub const REDACTED: &str = "***redacted***";

/// Pattern enabled by default: long alphanumeric runs such as API tokens.
pub const DEFAULT_SECRET_PATTERN: &str = "[A-Za-z0-9]{32,1024}";

/// Environment values at or below this length are never redacted.
pub const DEFAULT_ENVIRON_MIN_LEN: usize = 8;

type EnvironFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;
type EnvironSource = Arc<dyn Fn() -> Vec<String> + Send + Sync>;

#[derive(Default)]
struct EnvironSnapshot
{
    scopes: usize,
    values: HashSet<String>,
}

/// Redaction settings shared by every capture that uses one registry.
///
/// All settings can be changed at runtime through `&self`; a change applies to
/// the next string encoded.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use postmortem_core::redaction::{RedactionPolicy, REDACTED};
///
/// let policy = Arc::new(RedactionPolicy::new());
/// let token = "a".repeat(40);
/// assert_eq!(policy.redact(&token), REDACTED);
///
/// policy.set_hide_secret(false);
/// assert_eq!(policy.redact(&token), token);
/// ```
pub struct RedactionPolicy
{
    hide_secret: AtomicBool,
    hide_environ: AtomicBool,
    patterns: RwLock<Vec<Regex>>,
    environ_filter: RwLock<EnvironFilter>,
    environ_source: RwLock<EnvironSource>,
    environ: Mutex<EnvironSnapshot>,
}

impl RedactionPolicy
{
    /// Both checks enabled with the default pattern and filter.
    #[must_use]
    pub fn new() -> Self
    {
        let patterns: Vec<Regex> = [DEFAULT_SECRET_PATTERN]
            .into_iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        let filter: EnvironFilter = Arc::new(|value: &str| value.len() > DEFAULT_ENVIRON_MIN_LEN);
        let source: EnvironSource = Arc::new(|| env::vars_os().filter_map(|(_, v)| v.into_string().ok()).collect());
        Self {
            hide_secret: AtomicBool::new(true),
            hide_environ: AtomicBool::new(true),
            patterns: RwLock::new(patterns),
            environ_filter: RwLock::new(filter),
            environ_source: RwLock::new(source),
            environ: Mutex::new(EnvironSnapshot::default()),
        }
    }

    /// Policy that never redacts.
    #[must_use]
    pub fn disabled() -> Self
    {
        let policy = Self::new();
        policy.set_hide_secret(false);
        policy.set_hide_environ(false);
        policy
    }

    /// Defaults, with toggles overridden from `POSTMORTEM_HIDE_SECRET` and
    /// `POSTMORTEM_HIDE_ENVIRON`.
    #[must_use]
    pub fn from_env() -> Self
    {
        let policy = Self::new();
        if let Some(enabled) = env_flag("POSTMORTEM_HIDE_SECRET") {
            policy.set_hide_secret(enabled);
        }
        if let Some(enabled) = env_flag("POSTMORTEM_HIDE_ENVIRON") {
            policy.set_hide_environ(enabled);
        }
        policy
    }

    #[must_use]
    pub fn hide_secret(&self) -> bool
    {
        self.hide_secret.load(Ordering::Relaxed)
    }

    pub fn set_hide_secret(&self, enabled: bool)
    {
        self.hide_secret.store(enabled, Ordering::Relaxed);
    }

    #[must_use]
    pub fn hide_environ(&self) -> bool
    {
        self.hide_environ.load(Ordering::Relaxed)
    }

    pub fn set_hide_environ(&self, enabled: bool)
    {
        self.hide_environ.store(enabled, Ordering::Relaxed);
    }

    /// Replace the secret patterns.
    ///
    /// ## Errors
    ///
    /// Returns [`PostmortemError::InvalidPattern`](crate::PostmortemError::InvalidPattern)
    /// if any pattern fails to compile; the current patterns are then kept.
    pub fn set_patterns<I, S>(&self, patterns: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        *self.patterns.write() = compiled;
        Ok(())
    }

    /// Append one secret pattern.
    ///
    /// ## Errors
    ///
    /// Returns [`PostmortemError::InvalidPattern`](crate::PostmortemError::InvalidPattern)
    /// if the pattern fails to compile.
    pub fn add_pattern(&self, pattern: &str) -> Result<()>
    {
        let compiled = Regex::new(pattern)?;
        self.patterns.write().push(compiled);
        Ok(())
    }

    #[must_use]
    pub fn patterns(&self) -> Vec<String>
    {
        self.patterns.read().iter().map(|p| p.as_str().to_string()).collect()
    }

    /// Predicate deciding which environment values are worth redacting.
    pub fn set_environ_filter(&self, filter: impl Fn(&str) -> bool + Send + Sync + 'static)
    {
        *self.environ_filter.write() = Arc::new(filter);
    }

    /// Where environment values come from. Defaults to the process environment.
    pub fn set_environ_source(&self, source: impl Fn() -> Vec<String> + Send + Sync + 'static)
    {
        *self.environ_source.write() = Arc::new(source);
    }

    /// Snapshot the environment for the duration of the returned scope.
    ///
    /// Scopes nest: the snapshot is taken by the first and cleared when the
    /// last one is dropped.
    #[must_use]
    pub fn enter_environ(self: &Arc<Self>) -> EnvironScope
    {
        let mut environ = self.environ.lock();
        if environ.scopes == 0 {
            let source = self.environ_source.read().clone();
            let filter = self.environ_filter.read().clone();
            environ.values = source().into_iter().filter(|value| filter(value.as_str())).collect();
            debug!(values = environ.values.len(), "environment snapshot taken");
        }
        environ.scopes += 1;
        EnvironScope {
            policy: Arc::clone(self),
        }
    }

    /// Number of environment values currently held.
    #[must_use]
    pub fn environ_len(&self) -> usize
    {
        self.environ.lock().values.len()
    }

    /// `true` if `value` would be redacted right now.
    #[must_use]
    pub fn should_redact(&self, value: &str) -> bool
    {
        if self.hide_environ() && self.environ.lock().values.contains(value) {
            return true;
        }
        self.hide_secret()
            && self
                .patterns
                .read()
                .iter()
                .any(|pattern| pattern.find(value).is_some_and(|m| m.start() == 0))
    }

    /// `value`, or [`REDACTED`] if the policy says so.
    #[must_use]
    pub fn redact<'a>(&self, value: &'a str) -> Cow<'a, str>
    {
        if self.should_redact(value) {
            Cow::Borrowed(REDACTED)
        } else {
            Cow::Borrowed(value)
        }
    }
}

impl Default for RedactionPolicy
{
    fn default() -> Self
    {
        Self::new()
    }
}

fn env_flag(name: &str) -> Option<bool>
{
    let raw = env::var(name).ok()?;
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(variable = name, value = %raw, "ignoring unrecognized boolean");
            None
        }
    }
}

/// Keeps the environment snapshot of a [`RedactionPolicy`] alive.
#[must_use = "the environment snapshot is released when the scope is dropped"]
pub struct EnvironScope
{
    policy: Arc<RedactionPolicy>,
}

impl Drop for EnvironScope
{
    fn drop(&mut self)
    {
        let mut environ = self.policy.environ.lock();
        environ.scopes = environ.scopes.saturating_sub(1);
        if environ.scopes == 0 {
            environ.values.clear();
        }
    }
}
