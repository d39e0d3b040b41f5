//! Compile-once/match-many regular expressions
//!
//! A pattern is compiled into a [`Regex`], which is immutable and cheap to
//! share. A [`Matcher`] binds a pattern to reusable scratch space and runs
//! it against any number of subjects; [`CaptureView`] reads the groups of
//! the last result, and [`Regex::find_index`] / [`Regex::replace_all`] are
//! built on top of single match attempts.
//!
//! Patterns are compiled and executed by a [`PatternEngine`]. The bundled
//! [`Backtrack`] engine is a port of the classic regexpr.c engine used in
//! LambdaMOO, originally written by Tatu Ylonen, extended with named groups,
//! partial matching and execution limits. All reported offsets are byte
//! offsets into the subject.
//!
//! ```
//! use rematch::{CompileFlags, MatchFlags, Regex};
//!
//! let re = Regex::compile("(?<key>\\w+)=(\\d+)", CompileFlags::default()).unwrap();
//! let m = re.matcher_str("size=42", MatchFlags::empty());
//! assert_eq!(m.named_str("key").unwrap().as_deref(), Some("size"));
//! assert_eq!(m.group_str(2).as_deref(), Some("42"));
//! ```

pub mod backtrack;
pub mod captures;
pub mod compiler;
pub mod engine;
pub mod error;
mod exec;
pub mod flags;
pub mod match_data;
pub mod matcher;
pub mod opcodes;
mod ops;
pub mod regex;

pub use backtrack::{Backtrack, ExecLimits, Jit};
pub use captures::CaptureView;
pub use engine::{EngineError, PatternEngine, UNSET};
pub use error::{CompileError, Error, JitError, MatchError, Result};
pub use flags::{CompileFlags, JitFlags, MatchFlags};
pub use match_data::MatchData;
pub use matcher::{Matcher, MatcherState};
pub use regex::Regex;

/// Maximum number of capture registers, including the whole match
pub const RE_NREGS: usize = 100;
