//! Engine error types.

/// A template engine error.
///
/// Per §7 of the contract, almost every error class the pipeline can produce
/// is reported through the diagnostics sink and absorbed in place rather than
/// surfaced here; this type exists for the handful of hard failures a caller
/// cannot sensibly recover from inline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `render(name, _)` was called against a `name` that was never `parse`d.
    #[error("no such template: {0}")]
    NoSuchTemplate(String),

    /// The tag-delimiter pair passed to `set_tags` was not a two-element pair.
    #[error("tags must be a two-element [open, close] pair")]
    InvalidTags,

    /// A formatting call into the output buffer failed.
    #[error("fmt error: {0}")]
    Fmt(#[from] core::fmt::Error),
}

/// The standard result type used by fallible engine operations.
pub type Result<T = (), E = Error> = core::result::Result<T, E>;
