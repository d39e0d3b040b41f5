//! The boundary between the matching core and a pattern engine
//!
//! The core never parses patterns or walks automata. Everything it needs
//! from an engine goes through [`PatternEngine`]: compile, accelerate,
//! pattern info, execute, diagnostics and name lookup. Status codes follow
//! the PCRE2 numbering so that callers used to it can read raw statuses.

use std::borrow::Cow;

use crate::flags::{CompileFlags, JitFlags, MatchFlags};

/// Ovector value of a group that did not participate in the match
pub const UNSET: usize = usize::MAX;

/// No match was found
pub const ERROR_NOMATCH: i32 = -1;
/// The subject ended while a match was still possible
pub const ERROR_PARTIAL: i32 = -2;
/// The subject is not valid UTF-8
pub const ERROR_BADUTF8: i32 = -3;
/// The start offset lies beyond the subject
pub const ERROR_BADOFFSET: i32 = -33;
/// The start offset is not on a character boundary
pub const ERROR_BADUTFOFFSET: i32 = -36;
/// The compiled form is inconsistent
pub const ERROR_INTERNAL: i32 = -44;
/// Unsupported JIT option set
pub const ERROR_JIT_BADOPTION: i32 = -45;
/// The tick limit was exceeded
pub const ERROR_MATCHLIMIT: i32 = -47;
/// No group with the requested name
pub const ERROR_NOSUBSTRING: i32 = -49;
/// The backtracking depth limit was exceeded
pub const ERROR_DEPTHLIMIT: i32 = -53;

/// Failure reported by [`PatternEngine::compile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineError {
    /// Engine error code, resolvable through [`PatternEngine::error_message`]
    pub code: i32,
    /// Byte offset in the pattern where the problem was detected
    pub offset: usize,
}

/// A regex implementation the core can drive
///
/// `Code` is the compiled form. It is owned by the core and dropped exactly
/// once, when the last handle to the pattern goes away. `Jit` is the
/// optional accelerated form built from it.
pub trait PatternEngine: Send + Sync {
    /// Compiled form of a pattern
    type Code: Send + Sync;
    /// Accelerated form of a pattern
    type Jit: Send + Sync;

    /// Compile `pattern`; the pattern never contains a NUL byte.
    fn compile(
        &self,
        pattern: &str,
        flags: CompileFlags,
    ) -> std::result::Result<Self::Code, EngineError>;

    /// Build the accelerated form, or return an error code.
    fn jit_compile(
        &self,
        code: &Self::Code,
        flags: JitFlags,
    ) -> std::result::Result<Self::Jit, i32>;

    /// Number of capture groups, not counting the whole match
    fn capture_count(&self, code: &Self::Code) -> usize;

    /// Named groups in ascending group order
    fn name_table(&self, code: &Self::Code) -> Vec<(String, usize)>;

    /// Size of the compiled form in bytes
    fn compiled_size(&self, code: &Self::Code) -> usize;

    /// Run one match attempt.
    ///
    /// `ovector` holds `2 * (capture_count + 1)` slots. On a match the
    /// engine fills every pair, using [`UNSET`] for groups that did not
    /// participate, and returns the number of leading pairs that are set.
    /// Negative returns are `ERROR_*` codes.
    fn execute(
        &self,
        code: &Self::Code,
        jit: Option<&Self::Jit>,
        subject: &[u8],
        start_offset: usize,
        flags: MatchFlags,
        ovector: &mut [usize],
    ) -> i32;

    /// Human readable text for a compile, JIT or match code
    fn error_message(&self, code: i32) -> Cow<'static, str>;

    /// Group number for `name`, or `ERROR_NOSUBSTRING`
    fn substring_number_from_name(&self, code: &Self::Code, name: &str) -> i32;
}

/// Whether a raw status counts as a match
///
/// Partial matches count: they are an expected outcome, not an error.
pub fn matched(status: i32) -> bool {
    status >= 0 || status == ERROR_PARTIAL
}

/// Whether a raw status is a genuine error rather than an expected outcome
pub fn is_error(status: i32) -> bool {
    status < 0 && status != ERROR_NOMATCH && status != ERROR_PARTIAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matched(0));
        assert!(matched(3));
        assert!(matched(ERROR_PARTIAL));
        assert!(!matched(ERROR_NOMATCH));
        assert!(!matched(ERROR_MATCHLIMIT));

        assert!(!is_error(1));
        assert!(!is_error(ERROR_NOMATCH));
        assert!(!is_error(ERROR_PARTIAL));
        assert!(is_error(ERROR_MATCHLIMIT));
        assert!(is_error(ERROR_BADUTF8));
    }
}
