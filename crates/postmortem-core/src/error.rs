//! # Error Types
//!
//! General error handling for capture and reconstruction.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! Two failure modes never show up here on purpose:
//! - A type support declining an object is reported with
//!   [`NotImplemented`](crate::support::NotImplemented) and recovered inside the
//!   registry by the generic strategy.
//! - A dangling object reference is not an error at all; it reconstructs as
//!   [`Value::Unknown`](crate::value::Value::Unknown).

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for postmortem operations
///
/// ## Error Categories
///
/// 1. **Proxy errors**: AttributeNotFound, GraphNotLinked
/// 2. **Snapshot errors**: MalformedSnapshot
/// 3. **Configuration errors**: InvalidPattern, InvalidArgument
/// 4. **I/O errors**: Io (for snapshot files)
#[derive(Error, Debug)]
pub enum PostmortemError
{
    /// The requested attribute was never recorded on a proxy
    ///
    /// This is expected and normal when probing reconstructed objects
    /// interactively: the capture only records public, non-callable
    /// attributes.
    #[error("'{type_name}' object has no attribute '{attr}'")]
    AttributeNotFound
    {
        /// Type tag of the proxy that was queried
        type_name: String,
        /// Name of the missing attribute
        attr: String,
    },

    /// A proxy was dereferenced before (or after) its owning graph existed
    ///
    /// This indicates a sequencing bug in the embedding front end: proxies are
    /// only usable while the container that reconstructed them is alive.
    #[error("Proxy '{0}' is not linked to an object graph")]
    GraphNotLinked(String),

    /// The snapshot document is not valid structured data
    ///
    /// Fatal for that one file. Tools that open several files should report
    /// it and move on to the next one.
    #[error("Malformed snapshot: {source}")]
    MalformedSnapshot
    {
        /// File the snapshot was read from, if any
        path: Option<PathBuf>,
        /// Underlying decode failure
        source: serde_json::Error,
    },

    /// A secret pattern failed to compile
    #[error("Invalid secret pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Invalid argument passed to a postmortem function
    ///
    /// Examples:
    /// - Both an explicit dump path and a dump directory were given
    /// - A frame root that is not a frame object
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error (for snapshot files, source captures, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PostmortemError
{
    fn from(source: serde_json::Error) -> Self
    {
        Self::MalformedSnapshot { path: None, source }
    }
}

/// Convenience type alias for `Result<T, PostmortemError>`
///
/// ```rust
/// use postmortem_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, PostmortemError>;
