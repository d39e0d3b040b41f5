//! Error types for compiling, accelerating and running patterns

use thiserror::Error;

/// Result type for regex operations
pub type Result<T> = std::result::Result<T, Error>;

/// A pattern failed to compile
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compilation failed at offset {offset}: {message}")]
pub struct CompileError {
    /// The pattern as given
    pub pattern: String,
    /// Engine diagnostic text
    pub message: String,
    /// Byte offset in the pattern where the problem was detected
    pub offset: usize,
    /// Engine error code
    pub code: i32,
}

/// The acceleration step failed; the compiled pattern is still usable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("JIT compilation failed: {message}")]
pub struct JitError {
    /// Engine error code
    pub code: i32,
    /// Engine diagnostic text
    pub message: String,
}

/// A match attempt stopped with a genuine error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("matching failed: {message}")]
pub struct MatchError {
    /// Negative engine status
    pub code: i32,
    /// Engine diagnostic text
    pub message: String,
}

/// Every error the crate reports
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Jit(#[from] JitError),
    #[error(transparent)]
    Match(#[from] MatchError),
    /// No group carries the requested name
    #[error("no capture group named {0:?}")]
    UnknownGroupName(String),
}
