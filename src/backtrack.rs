//! The bundled pattern engine
//!
//! [`Backtrack`] drives the regexpr.c style compiler and virtual machine
//! through the [`PatternEngine`] interface, with tick and depth limits on
//! every match.

use std::{borrow::Cow, collections::HashMap};

use once_cell::sync::Lazy;

use crate::{
    compiler::{self, Program, SyntaxError},
    engine::{
        EngineError, PatternEngine, ERROR_BADOFFSET, ERROR_BADUTF8,
        ERROR_BADUTFOFFSET, ERROR_DEPTHLIMIT, ERROR_INTERNAL, ERROR_JIT_BADOPTION,
        ERROR_MATCHLIMIT, ERROR_NOMATCH, ERROR_NOSUBSTRING, ERROR_PARTIAL,
    },
    exec::{self, ExecRequest},
    flags::{CompileFlags, JitFlags, MatchFlags},
    opcodes::CompiledOp,
};

/// Configuration for regex execution limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecLimits {
    /// Maximum number of execution steps before timeout
    pub max_ticks: Option<usize>,
    /// Maximum failure stack depth
    pub max_failures: usize,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            max_ticks: None,
            max_failures: 100_000,
        }
    }
}

/// Texts for every status and compile code the engine produces
static MESSAGES: Lazy<HashMap<i32, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (ERROR_NOMATCH, "no match"),
        (ERROR_PARTIAL, "partial match"),
        (ERROR_BADUTF8, "UTF-8 error: invalid byte sequence in subject"),
        (ERROR_BADOFFSET, "bad offset value"),
        (ERROR_BADUTFOFFSET, "offset in UTF-8 string not at end of character"),
        (ERROR_INTERNAL, "internal error: compiled program is inconsistent"),
        (ERROR_JIT_BADOPTION, "bad JIT option"),
        (ERROR_MATCHLIMIT, "match limit exceeded"),
        (ERROR_NOSUBSTRING, "unknown substring"),
        (ERROR_DEPTHLIMIT, "backtracking depth limit exceeded"),
        (SyntaxError::EndBackslash.code(), "\\ at end of pattern"),
        (
            SyntaxError::MissingSquareBracket.code(),
            "missing terminating ] for character class",
        ),
        (
            SyntaxError::ClassRangeOrder.code(),
            "range out of order in character class",
        ),
        (
            SyntaxError::QuantifierInvalid.code(),
            "quantifier does not follow a repeatable item",
        ),
        (
            SyntaxError::InvalidAfterParensQuery.code(),
            "unrecognized character after (? or (?-",
        ),
        (SyntaxError::MissingClosingParenthesis.code(), "missing closing parenthesis"),
        (
            SyntaxError::BadSubpatternReference.code(),
            "reference to non-existent subpattern",
        ),
        (SyntaxError::TooComplex.code(), "parentheses are too deeply nested"),
        (SyntaxError::PatternTooLarge.code(), "regular expression is too large"),
        (
            SyntaxError::UnmatchedClosingParenthesis.code(),
            "unmatched closing parenthesis",
        ),
        (
            SyntaxError::MissingNameTerminator.code(),
            "syntax error in subpattern name (missing terminator?)",
        ),
        (
            SyntaxError::DuplicateSubpatternName.code(),
            "two named subpatterns have the same name (DUPNAMES not set)",
        ),
        (SyntaxError::SubpatternNameExpected.code(), "subpattern name expected"),
        (SyntaxError::BadHexEscape.code(), "bad hexadecimal escape sequence"),
        (SyntaxError::PrematureEnd.code(), "regular expression ends prematurely"),
        (
            SyntaxError::TooManyGroups.code(),
            "too many capturing groups (maximum 99)",
        ),
    ])
});

/// Accelerated form of a [`Program`]
///
/// Holds the JIT modes it was built for and, when every match must start
/// with one known unit, that unit for skipping hopeless start positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jit {
    modes: JitFlags,
    first_unit: Option<char>,
}

impl Jit {
    /// Modes this form was built for
    pub fn modes(&self) -> JitFlags {
        self.modes
    }

    /// Unit every match begins with, if known
    pub fn first_unit(&self) -> Option<char> {
        self.first_unit
    }
}

/// The bundled backtracking engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Backtrack {
    limits: ExecLimits,
}

impl Backtrack {
    /// Engine with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with custom execution limits
    pub fn with_limits(limits: ExecLimits) -> Self {
        Self { limits }
    }

    /// Limits applied to every match
    pub fn limits(&self) -> ExecLimits {
        self.limits
    }
}

/// Leading literal of a program, skipping zero-width opcodes
fn first_unit(program: &Program) -> Option<char> {
    let buffer = &program.buffer;
    let mut pos = 0;

    loop {
        let op = CompiledOp::from_byte(*buffer.get(pos)?)?;
        if op == CompiledOp::Exact {
            let len = usize::from(*buffer.get(pos + 1)?);
            let bytes = buffer.get(pos + 2..pos + 2 + len)?;
            return std::str::from_utf8(bytes).ok()?.chars().next();
        }
        // Anything that branches or consumes a class gives no single first unit
        if !op.is_zero_width() {
            return None;
        }
        pos += 1 + op.arg_count();
    }
}

impl PatternEngine for Backtrack {
    type Code = Program;
    type Jit = Jit;

    fn compile(&self, pattern: &str, flags: CompileFlags) -> Result<Program, EngineError> {
        compiler::compile(pattern, flags)
    }

    fn jit_compile(&self, code: &Program, flags: JitFlags) -> Result<Jit, i32> {
        if flags.is_empty() {
            return Err(ERROR_JIT_BADOPTION);
        }
        Ok(Jit {
            modes: flags,
            first_unit: first_unit(code),
        })
    }

    fn capture_count(&self, code: &Program) -> usize {
        code.groups
    }

    fn name_table(&self, code: &Program) -> Vec<(String, usize)> {
        code.names.clone()
    }

    fn compiled_size(&self, code: &Program) -> usize {
        code.buffer.len()
    }

    fn execute(
        &self,
        code: &Program,
        jit: Option<&Jit>,
        subject: &[u8],
        start_offset: usize,
        flags: MatchFlags,
        ovector: &mut [usize],
    ) -> i32 {
        let jit = jit.filter(|jit| {
            !flags.contains(MatchFlags::NO_JIT) && jit.modes.contains(flags.jit_mode())
        });
        let request = ExecRequest {
            start_offset,
            flags,
            limits: self.limits,
            first_unit: jit.and_then(|jit| jit.first_unit),
        };
        exec::execute(code, subject, request, ovector)
    }

    fn error_message(&self, code: i32) -> Cow<'static, str> {
        match MESSAGES.get(&code) {
            Some(message) => Cow::Borrowed(*message),
            None => Cow::Owned(format!("unknown error code {code}")),
        }
    }

    fn substring_number_from_name(&self, code: &Program, name: &str) -> i32 {
        code.names
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map_or(ERROR_NOSUBSTRING, |&(_, group)| group as i32)
    }
}
