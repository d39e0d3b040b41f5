//! Option bit-sets passed to compile, match and JIT calls
//!
//! The core hands these to the pattern engine without looking at them; only
//! the engine gives individual bits a meaning.

use bitflags::bitflags;

bitflags! {
    /// Flags that control pattern compilation
    ///
    /// The low bits are the classic regexpr.h syntax bits (RE_*); the rest
    /// are compile options understood by the bundled engine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CompileFlags: u32 {
        /// No quoting needed for parentheses - ( and ) are special
        const NO_BK_PARENS = 1;
        /// No quoting needed for vertical bar - | is special
        const NO_BK_VBAR = 2;
        /// Quoting needed for + and ? - \+ and \? are special
        const BK_PLUS_QM = 4;
        /// | binds tighter than ^ and $
        const TIGHT_VBAR = 8;
        /// Treat newline as alternation operator
        const NEWLINE_OR = 16;
        /// ^$?*+ are special in all contexts
        const CONTEXT_INDEP_OPS = 32;
        /// Enable ANSI sequences (\n, \t, etc) and \xhh
        const ANSI_HEX = 64;
        /// Disable GNU extensions
        const NO_GNU_EXTENSIONS = 128;
        /// Case insensitive matching
        const CASE_INSENSITIVE = 256;
        /// Pattern and subject are UTF-8; otherwise every byte is one unit
        const UTF = 512;
        /// Allow several groups to share a name
        const DUPNAMES = 1024;
        /// Plain groups do not capture; only named groups do
        const NO_AUTO_CAPTURE = 2048;
        /// `.` also matches newline
        const DOTALL = 4096;
    }
}

impl Default for CompileFlags {
    fn default() -> Self {
        CompileFlags::EXTENDED
    }
}

impl CompileFlags {
    /// AWK-style regex syntax
    pub const AWK: Self = Self::from_bits_truncate(
        Self::NO_BK_PARENS.bits() | Self::NO_BK_VBAR.bits() | Self::CONTEXT_INDEP_OPS.bits(),
    );

    /// EGREP-style regex syntax
    pub const EGREP: Self = Self::from_bits_truncate(Self::AWK.bits() | Self::NEWLINE_OR.bits());

    /// GREP-style regex syntax
    pub const GREP: Self =
        Self::from_bits_truncate(Self::BK_PLUS_QM.bits() | Self::NEWLINE_OR.bits());

    /// EMACS-style regex syntax
    pub const EMACS: Self = Self::empty();

    /// LambdaMOO-style regex syntax (context independent operations)
    pub const MOO: Self = Self::CONTEXT_INDEP_OPS;

    /// Extended syntax with ANSI escapes, the default
    pub const EXTENDED: Self = Self::from_bits_truncate(Self::AWK.bits() | Self::ANSI_HEX.bits());

    /// Check if parentheses need backslash quoting
    pub fn needs_backslash_parens(self) -> bool {
        !self.contains(Self::NO_BK_PARENS)
    }

    /// Check if vertical bar needs backslash quoting
    pub fn needs_backslash_vbar(self) -> bool {
        !self.contains(Self::NO_BK_VBAR)
    }

    /// Check if plus and question mark need backslash quoting
    pub fn needs_backslash_plus_qm(self) -> bool {
        self.contains(Self::BK_PLUS_QM)
    }

    /// Check if vertical bar binds tighter than ^ and $
    pub fn tight_vbar(self) -> bool {
        self.contains(Self::TIGHT_VBAR)
    }

    /// Check if newline should be treated as alternation
    pub fn newline_or(self) -> bool {
        self.contains(Self::NEWLINE_OR)
    }

    /// Check if operators are context independent
    pub fn context_indep_ops(self) -> bool {
        self.contains(Self::CONTEXT_INDEP_OPS)
    }

    /// Check if ANSI escape sequences are enabled
    pub fn ansi_sequences(self) -> bool {
        self.contains(Self::ANSI_HEX)
    }

    /// Check if GNU extensions are disabled
    pub fn no_gnu_extensions(self) -> bool {
        self.contains(Self::NO_GNU_EXTENSIONS)
    }

    /// Check if case insensitive matching is enabled
    pub fn case_insensitive(self) -> bool {
        self.contains(Self::CASE_INSENSITIVE)
    }

    /// Check if pattern and subjects are decoded as UTF-8
    pub fn utf(self) -> bool {
        self.contains(Self::UTF)
    }
}

bitflags! {
    /// Flags for a single match attempt
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MatchFlags: u32 {
        /// Only try a match at the start offset
        const ANCHORED = 1;
        /// The subject start is not the beginning of a line
        const NOTBOL = 2;
        /// The subject end is not the end of a line
        const NOTEOL = 4;
        /// An empty string is not a valid match
        const NOTEMPTY = 8;
        /// An empty string at the start offset is not a valid match
        const NOTEMPTY_ATSTART = 16;
        /// Report a partial match only if no complete match exists
        const PARTIAL_SOFT = 32;
        /// Report a partial match as soon as one is found
        const PARTIAL_HARD = 64;
        /// Do not use the accelerated form even if one exists
        const NO_JIT = 128;
    }
}

impl MatchFlags {
    /// The JIT mode a match with these flags would need
    pub fn jit_mode(self) -> JitFlags {
        if self.contains(Self::PARTIAL_HARD) {
            JitFlags::PARTIAL_HARD
        } else if self.contains(Self::PARTIAL_SOFT) {
            JitFlags::PARTIAL_SOFT
        } else {
            JitFlags::COMPLETE
        }
    }
}

bitflags! {
    /// Flags for the acceleration step
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct JitFlags: u32 {
        /// Accelerate complete matching
        const COMPLETE = 1;
        /// Accelerate soft partial matching
        const PARTIAL_SOFT = 2;
        /// Accelerate hard partial matching
        const PARTIAL_HARD = 4;
    }
}
