//! Bytecode opcodes for the compiled regex virtual machine

/// Compiled regex opcodes (from regexpr.c:41-66)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompiledOp {
    /// End of pattern reached
    End = 0,
    /// Beginning of line
    Bol = 1,
    /// End of line
    Eol = 2,
    /// Character set (complement flag, two-byte range count, ranges)
    Set = 3,
    /// Exact character match (followed by length-prefixed UTF-8 char)
    Exact = 4,
    /// Matches any character except newline
    AnyChar = 5,
    /// Set register start address (followed by register number)
    StartMemory = 6,
    /// Set register end address (followed by register number)
    EndMemory = 7,
    /// Match duplicate of register contents (register number follows)
    MatchMemory = 8,
    /// Jump (followed by two bytes: lsb, msb of displacement)
    Jump = 9,
    /// Loop back-edge of a star or plus
    StarJump = 10,
    /// Jump to address on failure
    FailureJump = 11,
    /// Push dummy failure point and jump
    DummyFailureJump = 13,
    /// Match at beginning of buffer
    BegBuf = 14,
    /// Match at end of buffer
    EndBuf = 15,
    /// Match at beginning of word
    WordBeg = 16,
    /// Match at end of word
    WordEnd = 17,
    /// Match if at word boundary
    WordBound = 18,
    /// Match if not at word boundary
    NotWordBound = 19,
    /// Matches syntax code (1 byte follows)
    SyntaxSpec = 20,
    /// Matches if syntax code does not match (1 byte follows)
    NotSyntaxSpec = 21,
}

impl CompiledOp {
    /// Decode an opcode byte; gaps in the numbering decode to `None`
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(CompiledOp::End),
            1 => Some(CompiledOp::Bol),
            2 => Some(CompiledOp::Eol),
            3 => Some(CompiledOp::Set),
            4 => Some(CompiledOp::Exact),
            5 => Some(CompiledOp::AnyChar),
            6 => Some(CompiledOp::StartMemory),
            7 => Some(CompiledOp::EndMemory),
            8 => Some(CompiledOp::MatchMemory),
            9 => Some(CompiledOp::Jump),
            10 => Some(CompiledOp::StarJump),
            11 => Some(CompiledOp::FailureJump),
            13 => Some(CompiledOp::DummyFailureJump),
            14 => Some(CompiledOp::BegBuf),
            15 => Some(CompiledOp::EndBuf),
            16 => Some(CompiledOp::WordBeg),
            17 => Some(CompiledOp::WordEnd),
            18 => Some(CompiledOp::WordBound),
            19 => Some(CompiledOp::NotWordBound),
            20 => Some(CompiledOp::SyntaxSpec),
            21 => Some(CompiledOp::NotSyntaxSpec),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Fixed operand bytes after the opcode. `Exact` and `Set` carry their
    /// own length and report 0.
    pub fn arg_count(self) -> usize {
        match self {
            CompiledOp::End
            | CompiledOp::Bol
            | CompiledOp::Eol
            | CompiledOp::AnyChar
            | CompiledOp::BegBuf
            | CompiledOp::EndBuf
            | CompiledOp::WordBeg
            | CompiledOp::WordEnd
            | CompiledOp::WordBound
            | CompiledOp::NotWordBound => 0,

            CompiledOp::StartMemory
            | CompiledOp::EndMemory
            | CompiledOp::MatchMemory
            | CompiledOp::SyntaxSpec
            | CompiledOp::NotSyntaxSpec => 1,

            CompiledOp::Jump
            | CompiledOp::StarJump
            | CompiledOp::FailureJump
            | CompiledOp::DummyFailureJump => 2,

            CompiledOp::Exact | CompiledOp::Set => 0,
        }
    }

    /// True for opcodes that never consume a subject unit
    pub fn is_zero_width(self) -> bool {
        matches!(
            self,
            CompiledOp::StartMemory
                | CompiledOp::EndMemory
                | CompiledOp::Bol
                | CompiledOp::Eol
                | CompiledOp::BegBuf
                | CompiledOp::EndBuf
                | CompiledOp::WordBeg
                | CompiledOp::WordEnd
                | CompiledOp::WordBound
                | CompiledOp::NotWordBound
        )
    }
}

/// Lexical tokens the compiler recognises, before precedence is applied.
///
/// Which pattern characters map to which token depends on the
/// [`CompileFlags`](crate::flags::CompileFlags) in force; the discriminant
/// doubles as the index into the precedence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SyntaxOp {
    End = 0,
    Normal = 1,
    AnyChar = 2,
    Quote = 3,
    Bol = 4,
    Eol = 5,
    Optional = 6,
    Star = 7,
    Plus = 8,
    Or = 9,
    OpenPar = 10,
    ClosePar = 11,
    /// `\1` to `\9`
    Memory = 12,
    /// `\v10` to `\v99`
    ExtendedMemory = 13,
    OpenSet = 14,
    BegBuf = 15,
    EndBuf = 16,
    WordChar = 17,
    NotWordChar = 18,
    WordBeg = 19,
    WordEnd = 20,
    WordBound = 21,
    NotWordBound = 22,
    DigitChar = 23,
    NotDigitChar = 24,
    SpaceChar = 25,
    NotSpaceChar = 26,
}

/// Syntax classes tested by `SyntaxSpec` and `NotSyntaxSpec`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SyntaxType {
    /// Anything that is not a word character
    Normal = 0,
    /// ASCII letters, digits and `_`
    Word = 1,
    Digit = 2,
    /// ASCII whitespace plus vertical tab
    Space = 3,
}

impl SyntaxType {
    /// Convert an opcode argument back to a class
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(SyntaxType::Normal),
            1 => Some(SyntaxType::Word),
            2 => Some(SyntaxType::Digit),
            3 => Some(SyntaxType::Space),
            _ => None,
        }
    }

    /// Whether `ch` belongs to this class
    pub fn contains(self, ch: char) -> bool {
        match self {
            SyntaxType::Normal => !is_word_char(ch),
            SyntaxType::Word => is_word_char(ch),
            SyntaxType::Digit => ch.is_ascii_digit(),
            SyntaxType::Space => ch.is_ascii_whitespace() || ch == '\x0B',
        }
    }
}

/// Word characters for `\w`, `\b`, `\<` and `\>`
pub fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
