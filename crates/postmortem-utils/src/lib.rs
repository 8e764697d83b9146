//! # Postmortem Utilities
//!
//! Shared helpers for the postmortem workspace.
//!
//! Currently this is the logging setup used by the command-line tool.

pub mod logging;

// Re-export commonly used logging items for convenience
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
