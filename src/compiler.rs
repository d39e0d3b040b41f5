//! Regex pattern compiler for the bundled engine
//!
//! This module ports the core compilation logic from re_compile_pattern
//! in regexpr.c:254-721, extended with named and non-capturing groups,
//! `\d`/`\s` classes, case folding and byte-offset error reporting.

use std::collections::HashMap;

use crate::{
    engine::EngineError,
    flags::CompileFlags,
    opcodes::{CompiledOp, SyntaxOp, SyntaxType},
    RE_NREGS,
};

/// Maximum nesting level of operators
const MAX_NESTING: usize = 100;
/// Number of precedence levels
const NUM_LEVELS: usize = 5;
/// Largest bytecode buffer addressable by 16-bit displacements
const MAX_PROGRAM: usize = i16::MAX as usize;

type Result<T> = std::result::Result<T, EngineError>;

/// Compile failure reasons, with their engine error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxError {
    /// `\` at the very end of the pattern
    EndBackslash,
    /// `[` without a closing `]`
    MissingSquareBracket,
    /// `z-a` style range in a set
    ClassRangeOrder,
    /// `?`, `*` or `+` with nothing to repeat
    QuantifierInvalid,
    /// Unknown construct after `(?`
    InvalidAfterParensQuery,
    /// `(` without a closing `)`
    MissingClosingParenthesis,
    /// Back-reference to a group that does not exist
    BadSubpatternReference,
    /// Operators nested too deeply
    TooComplex,
    /// Compiled program exceeds the jump range
    PatternTooLarge,
    /// `)` without an opening `(`
    UnmatchedClosingParenthesis,
    /// Group name not terminated by `>`
    MissingNameTerminator,
    /// Two groups with the same name without DUPNAMES
    DuplicateSubpatternName,
    /// Group name missing or not starting with a letter
    SubpatternNameExpected,
    /// Bad hexadecimal escape
    BadHexEscape,
    /// Pattern ends in the middle of a construct
    PrematureEnd,
    /// More capture groups than registers
    TooManyGroups,
}

impl SyntaxError {
    /// Engine error code for this failure
    pub fn code(self) -> i32 {
        match self {
            SyntaxError::EndBackslash => 101,
            SyntaxError::MissingSquareBracket => 106,
            SyntaxError::ClassRangeOrder => 108,
            SyntaxError::QuantifierInvalid => 109,
            SyntaxError::InvalidAfterParensQuery => 111,
            SyntaxError::MissingClosingParenthesis => 114,
            SyntaxError::BadSubpatternReference => 115,
            SyntaxError::TooComplex => 119,
            SyntaxError::PatternTooLarge => 120,
            SyntaxError::UnmatchedClosingParenthesis => 122,
            SyntaxError::MissingNameTerminator => 142,
            SyntaxError::DuplicateSubpatternName => 143,
            SyntaxError::SubpatternNameExpected => 162,
            SyntaxError::BadHexEscape => 167,
            SyntaxError::PrematureEnd => 189,
            SyntaxError::TooManyGroups => 197,
        }
    }
}

/// Output of the compiler: bytecode plus static metadata
#[derive(Debug, Clone)]
pub struct Program {
    /// Compiled bytecode buffer
    pub(crate) buffer: Vec<u8>,
    /// Number of capture groups
    pub(crate) groups: usize,
    /// Named groups in group order
    pub(crate) names: Vec<(String, usize)>,
    /// Flags used during compilation
    pub(crate) flags: CompileFlags,
}

impl Program {
    /// Bytecode bytes
    pub fn bytecode(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of capture groups, not counting group 0
    pub fn groups(&self) -> usize {
        self.groups
    }

    /// Named groups in group order
    pub fn names(&self) -> &[(String, usize)] {
        &self.names
    }

    /// Flags the program was compiled with
    pub fn flags(&self) -> CompileFlags {
        self.flags
    }
}

/// Fold a unit for case-insensitive comparison. Byte units fold ASCII
/// letters only; a byte above 0x7F is not a Latin-1 character.
pub(crate) fn fold_unit(ch: char, utf: bool) -> char {
    if !utf {
        return ch.to_ascii_lowercase();
    }
    let mut lower = ch.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(single), None) => single,
        _ => ch,
    }
}

/// Compiler state for translating regex patterns to bytecode
struct Compiler {
    /// Input pattern as units (chars in UTF mode, bytes otherwise)
    pattern: Vec<char>,
    /// Byte offset of every unit, plus the pattern length
    offsets: Vec<usize>,
    /// Current position in pattern
    pos: usize,
    /// Output bytecode buffer
    buffer: Vec<u8>,
    /// Syntax configuration
    syntax: CompileFlags,
    /// Operator tables
    plain_ops: HashMap<char, SyntaxOp>,
    quoted_ops: HashMap<char, SyntaxOp>,
    precedences: [u8; 256],
    /// Parsing state
    starts: [usize; NUM_LEVELS * MAX_NESTING],
    starts_base: usize,
    future_jumps: [usize; MAX_NESTING],
    num_jumps: usize,
    current_level: usize,
    /// Register tracking; one entry per open parenthesis
    next_register: u8,
    open_groups: Vec<Option<u8>>,
    names: Vec<(String, usize)>,
    /// Highest back-reference seen, with the offset to blame
    max_backref: Option<(u8, usize)>,
    /// Context state
    beginning_context: bool,
}

impl Compiler {
    /// Create new compiler with given syntax
    fn new(pattern: &str, syntax: CompileFlags) -> Self {
        let (units, mut offsets): (Vec<char>, Vec<usize>) = if syntax.utf() {
            pattern.char_indices().map(|(i, ch)| (ch, i)).unzip()
        } else {
            pattern.bytes().enumerate().map(|(i, b)| (char::from(b), i)).unzip()
        };
        offsets.push(pattern.len());

        let mut compiler = Compiler {
            pattern: units,
            offsets,
            pos: 0,
            buffer: Vec::new(),
            syntax,
            plain_ops: HashMap::new(),
            quoted_ops: HashMap::new(),
            precedences: [0; 256],
            starts: [0; NUM_LEVELS * MAX_NESTING],
            starts_base: 0,
            future_jumps: [0; MAX_NESTING],
            num_jumps: 0,
            current_level: 0,
            next_register: 1,
            open_groups: Vec::new(),
            names: Vec::new(),
            max_backref: None,
            beginning_context: true,
        };

        compiler.initialize_tables();
        compiler
    }

    /// Initialize operator and precedence tables based on syntax flags
    fn initialize_tables(&mut self) {
        for ch in '0'..='9' {
            self.quoted_ops.insert(ch, SyntaxOp::Memory);
        }

        self.plain_ops.insert('\\', SyntaxOp::Quote);

        if self.syntax.needs_backslash_parens() {
            self.quoted_ops.insert('(', SyntaxOp::OpenPar);
            self.quoted_ops.insert(')', SyntaxOp::ClosePar);
        } else {
            self.plain_ops.insert('(', SyntaxOp::OpenPar);
            self.plain_ops.insert(')', SyntaxOp::ClosePar);
        }

        if self.syntax.needs_backslash_vbar() {
            self.quoted_ops.insert('|', SyntaxOp::Or);
        } else {
            self.plain_ops.insert('|', SyntaxOp::Or);
        }

        self.plain_ops.insert('*', SyntaxOp::Star);

        if self.syntax.needs_backslash_plus_qm() {
            self.quoted_ops.insert('+', SyntaxOp::Plus);
            self.quoted_ops.insert('?', SyntaxOp::Optional);
        } else {
            self.plain_ops.insert('+', SyntaxOp::Plus);
            self.plain_ops.insert('?', SyntaxOp::Optional);
        }

        if self.syntax.newline_or() {
            self.plain_ops.insert('\n', SyntaxOp::Or);
        }

        self.plain_ops.insert('[', SyntaxOp::OpenSet);
        self.plain_ops.insert('^', SyntaxOp::Bol);
        self.plain_ops.insert('$', SyntaxOp::Eol);
        self.plain_ops.insert('.', SyntaxOp::AnyChar);

        if !self.syntax.no_gnu_extensions() {
            self.quoted_ops.insert('w', SyntaxOp::WordChar);
            self.quoted_ops.insert('W', SyntaxOp::NotWordChar);
            self.quoted_ops.insert('d', SyntaxOp::DigitChar);
            self.quoted_ops.insert('D', SyntaxOp::NotDigitChar);
            self.quoted_ops.insert('s', SyntaxOp::SpaceChar);
            self.quoted_ops.insert('S', SyntaxOp::NotSpaceChar);
            self.quoted_ops.insert('<', SyntaxOp::WordBeg);
            self.quoted_ops.insert('>', SyntaxOp::WordEnd);
            self.quoted_ops.insert('b', SyntaxOp::WordBound);
            self.quoted_ops.insert('B', SyntaxOp::NotWordBound);
            self.quoted_ops.insert('`', SyntaxOp::BegBuf);
            self.quoted_ops.insert('\'', SyntaxOp::EndBuf);
        }

        if self.syntax.ansi_sequences() {
            self.quoted_ops.insert('v', SyntaxOp::ExtendedMemory);
        }

        self.precedences.fill(4);

        if self.syntax.tight_vbar() {
            self.precedences[SyntaxOp::Or as usize] = 3;
            self.precedences[SyntaxOp::Bol as usize] = 2;
            self.precedences[SyntaxOp::Eol as usize] = 2;
        } else {
            self.precedences[SyntaxOp::Or as usize] = 2;
            self.precedences[SyntaxOp::Bol as usize] = 3;
            self.precedences[SyntaxOp::Eol as usize] = 3;
        }

        self.precedences[SyntaxOp::ClosePar as usize] = 1;
        self.precedences[SyntaxOp::End as usize] = 0;
    }

    /// Build an error located at the current position
    fn error(&self, kind: SyntaxError) -> EngineError {
        self.error_at(kind, self.pos)
    }

    /// Build an error located at unit `pos`
    fn error_at(&self, kind: SyntaxError, pos: usize) -> EngineError {
        let offset = self.offsets[pos.min(self.pattern.len())];
        EngineError {
            code: kind.code(),
            offset,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.pattern.len()
    }

    fn peek(&self) -> Option<char> {
        self.pattern.get(self.pos).copied()
    }

    /// Get next character from pattern
    fn next_char(&mut self) -> Result<char> {
        match self.peek() {
            Some(ch) => {
                self.pos += 1;
                Ok(ch)
            }
            None => Err(self.error(SyntaxError::PrematureEnd)),
        }
    }

    fn fold(&self, ch: char) -> char {
        if self.syntax.case_insensitive() {
            fold_unit(ch, self.syntax.utf())
        } else {
            ch
        }
    }

    /// Store a byte in the output buffer
    fn store(&mut self, byte: u8) {
        self.buffer.push(byte);
    }

    /// Store an opcode
    fn store_opcode(&mut self, opcode: CompiledOp) {
        self.store(opcode.to_byte());
    }

    /// Store opcode with one byte argument
    fn store_opcode_and_arg(&mut self, opcode: CompiledOp, arg: u8) {
        self.store_opcode(opcode);
        self.store(arg);
    }

    /// Store opcode with one character argument (encoded as UTF-8)
    fn store_opcode_and_char(&mut self, opcode: CompiledOp, ch: char) {
        self.store_opcode(opcode);
        self.store_char(ch);
    }

    /// Store a character as length-prefixed UTF-8 bytes
    fn store_char(&mut self, ch: char) {
        let mut bytes = [0; 4];
        let utf8_bytes = ch.encode_utf8(&mut bytes);
        self.store(utf8_bytes.len() as u8);
        self.buffer.extend_from_slice(utf8_bytes.as_bytes());
    }

    /// Get current buffer position for level start tracking
    fn current_level_start(&self) -> usize {
        self.starts[self.starts_base + self.current_level]
    }

    /// Set level start to current position
    fn set_level_start(&mut self) {
        self.starts[self.starts_base + self.current_level] = self.buffer.len();
    }

    /// Push new level starts
    fn push_level_starts(&mut self) -> Result<()> {
        if self.starts_base < (MAX_NESTING - 1) * NUM_LEVELS {
            self.starts_base += NUM_LEVELS;
            Ok(())
        } else {
            Err(self.error(SyntaxError::TooComplex))
        }
    }

    /// Pop level starts
    fn pop_level_starts(&mut self) {
        self.starts_base -= NUM_LEVELS;
    }

    /// Store a 16-bit displacement at given offset
    fn put_addr(&mut self, offset: usize, addr: usize) {
        let disp = (addr as i32) - (offset as i32) - 2;
        self.buffer[offset] = (disp & 0xff) as u8;
        self.buffer[offset + 1] = ((disp >> 8) & 0xff) as u8;
    }

    /// Insert a jump instruction at given position
    fn insert_jump(&mut self, pos: usize, opcode: CompiledOp, addr: usize) {
        // Displacement is relative to the end of the inserted instruction
        let disp = (addr as i32) - (pos as i32) - 3;

        self.buffer.insert(pos, ((disp >> 8) & 0xff) as u8);
        self.buffer.insert(pos, (disp & 0xff) as u8);
        self.buffer.insert(pos, opcode.to_byte());

        for i in 0..self.num_jumps {
            if self.future_jumps[i] >= pos {
                self.future_jumps[i] += 3;
            }
        }
    }

    /// Parse hexadecimal escape sequence
    fn get_hex(&mut self) -> Result<char> {
        let ch1 = self.next_char()?;
        let val1 = hex_char_to_decimal(ch1).ok_or_else(|| self.error(SyntaxError::BadHexEscape))?;

        let ch2 = self.next_char()?;
        let val2 = hex_char_to_decimal(ch2).ok_or_else(|| self.error(SyntaxError::BadHexEscape))?;

        Ok(char::from(val1 * 16 + val2))
    }

    /// Translate ANSI escape sequences
    fn ansi_translate(&mut self, ch: char) -> Result<char> {
        let result = match ch {
            'a' | 'A' => '\x07',
            'b' | 'B' => '\x08',
            'f' | 'F' => '\x0C',
            'n' | 'N' => '\n',
            'r' | 'R' => '\r',
            't' | 'T' => '\t',
            'v' | 'V' => '\x0B',
            'x' | 'X' => return self.get_hex(),
            _ => ch,
        };
        Ok(result)
    }

    /// Main compilation loop
    fn compile(mut self) -> Result<Program> {
        self.set_level_start();
        let mut op = SyntaxOp::Normal;

        while op != SyntaxOp::End {
            let ch = if self.at_end() {
                op = SyntaxOp::End;
                '\0'
            } else {
                let mut ch = self.next_char()?;
                op = self.plain_ops.get(&ch).copied().unwrap_or(SyntaxOp::Normal);

                if op == SyntaxOp::Quote {
                    if self.at_end() {
                        return Err(self.error(SyntaxError::EndBackslash));
                    }
                    ch = self.next_char()?;
                    op = self
                        .quoted_ops
                        .get(&ch)
                        .copied()
                        .unwrap_or(SyntaxOp::Normal);

                    if op == SyntaxOp::Normal && self.syntax.ansi_sequences() {
                        ch = self.ansi_translate(ch)?;
                    }
                }
                ch
            };

            let level = self.precedences[op as usize];
            self.handle_precedence(level);
            self.process_operation(op, ch)?;

            self.beginning_context = matches!(op, SyntaxOp::OpenPar | SyntaxOp::Or);
        }

        if !self.open_groups.is_empty() {
            return Err(self.error_at(SyntaxError::MissingClosingParenthesis, self.pattern.len()));
        }

        let groups = usize::from(self.next_register - 1);
        if let Some((reg, pos)) = self.max_backref {
            if usize::from(reg) > groups {
                return Err(self.error_at(SyntaxError::BadSubpatternReference, pos));
            }
        }

        self.store_opcode(CompiledOp::End);

        if self.buffer.len() > MAX_PROGRAM {
            return Err(self.error_at(SyntaxError::PatternTooLarge, self.pattern.len()));
        }

        Ok(Program {
            buffer: self.buffer,
            groups,
            names: self.names,
            flags: self.syntax,
        })
    }

    /// Handle operator precedence and level management
    fn handle_precedence(&mut self, level: u8) {
        if level > self.current_level as u8 {
            while (self.current_level as u8) < level {
                self.current_level += 1;
                self.set_level_start();
            }
        } else if (level as usize) < self.current_level {
            self.current_level = level as usize;

            while self.num_jumps > 0
                && self.future_jumps[self.num_jumps - 1] >= self.current_level_start()
            {
                self.num_jumps -= 1;
                self.put_addr(self.future_jumps[self.num_jumps], self.buffer.len());
            }
        }
    }

    /// Literal character or an error, for operators in a bad position
    fn misplaced(&mut self, ch: char, kind: SyntaxError) -> Result<()> {
        if self.syntax.context_indep_ops() {
            return Err(self.error(kind));
        }
        self.store_literal(ch);
        Ok(())
    }

    fn store_literal(&mut self, ch: char) {
        self.set_level_start();
        let ch = self.fold(ch);
        self.store_opcode_and_char(CompiledOp::Exact, ch);
    }

    /// Process individual syntax operations
    fn process_operation(&mut self, op: SyntaxOp, ch: char) -> Result<()> {
        match op {
            SyntaxOp::End => {}

            SyntaxOp::Normal => self.store_literal(ch),

            SyntaxOp::AnyChar => {
                self.set_level_start();
                self.store_opcode(CompiledOp::AnyChar);
            }

            // Anchors are special everywhere in context-independent syntax
            SyntaxOp::Bol => {
                if self.beginning_context || self.syntax.context_indep_ops() {
                    self.store_assertion(CompiledOp::Bol);
                } else {
                    self.store_literal('^');
                }
            }

            SyntaxOp::Eol => {
                if self.is_eol_context() || self.syntax.context_indep_ops() {
                    self.store_assertion(CompiledOp::Eol);
                } else {
                    self.store_literal('$');
                }
            }

            SyntaxOp::Optional => {
                if self.beginning_context {
                    return self.misplaced('?', SyntaxError::QuantifierInvalid);
                }
                if self.current_level_start() == self.buffer.len() {
                    return Ok(());
                }
                self.insert_jump(
                    self.current_level_start(),
                    CompiledOp::FailureJump,
                    self.buffer.len() + 3,
                );
            }

            SyntaxOp::Star | SyntaxOp::Plus => {
                if self.beginning_context {
                    let literal = if op == SyntaxOp::Star { '*' } else { '+' };
                    return self.misplaced(literal, SyntaxError::QuantifierInvalid);
                }
                if self.current_level_start() == self.buffer.len() {
                    return Ok(());
                }

                // failure_jump at start, star_jump back-edge at end
                self.insert_jump(
                    self.current_level_start(),
                    CompiledOp::FailureJump,
                    self.buffer.len() + 6,
                );
                self.insert_jump(
                    self.buffer.len(),
                    CompiledOp::StarJump,
                    self.current_level_start(),
                );

                if op == SyntaxOp::Plus {
                    // Skip the first failure_jump so the body runs at least once
                    self.insert_jump(
                        self.current_level_start(),
                        CompiledOp::DummyFailureJump,
                        self.current_level_start() + 6,
                    );
                }
            }

            SyntaxOp::Or => {
                self.insert_jump(
                    self.current_level_start(),
                    CompiledOp::FailureJump,
                    self.buffer.len() + 6,
                );

                if self.num_jumps >= MAX_NESTING {
                    return Err(self.error(SyntaxError::TooComplex));
                }

                self.store_opcode(CompiledOp::Jump);
                self.future_jumps[self.num_jumps] = self.buffer.len();
                self.num_jumps += 1;
                self.store(0);
                self.store(0);
                self.set_level_start();
            }

            SyntaxOp::OpenPar => {
                let register = self.parse_group_prefix()?;
                self.set_level_start();

                if let Some(reg) = register {
                    self.store_opcode_and_arg(CompiledOp::StartMemory, reg);
                }
                self.open_groups.push(register);

                self.push_level_starts()?;
                self.current_level = 0;
                self.set_level_start();
            }

            SyntaxOp::ClosePar => match self.open_groups.pop() {
                Some(register) => {
                    self.pop_level_starts();
                    self.current_level = self.precedences[SyntaxOp::OpenPar as usize] as usize;
                    if let Some(reg) = register {
                        self.store_opcode_and_arg(CompiledOp::EndMemory, reg);
                    }
                }
                None => {
                    return self.misplaced(')', SyntaxError::UnmatchedClosingParenthesis);
                }
            },

            SyntaxOp::Memory => {
                if ch == '0' {
                    return Err(self.error(SyntaxError::BadSubpatternReference));
                }
                let reg_num = (ch as u8) - b'0';
                self.note_backref(reg_num);
                self.set_level_start();
                self.store_opcode_and_arg(CompiledOp::MatchMemory, reg_num);
            }

            SyntaxOp::ExtendedMemory => {
                // \vNN for registers 10-99
                let ch1 = self.next_char()?;
                let ch2 = self.next_char()?;

                if !ch1.is_ascii_digit() || !ch2.is_ascii_digit() {
                    return Err(self.error(SyntaxError::BadSubpatternReference));
                }

                let reg_num = ((ch1 as u8) - b'0') * 10 + ((ch2 as u8) - b'0');
                if reg_num == 0 || reg_num as usize >= RE_NREGS {
                    return Err(self.error(SyntaxError::BadSubpatternReference));
                }

                self.note_backref(reg_num);
                self.set_level_start();
                self.store_opcode_and_arg(CompiledOp::MatchMemory, reg_num);
            }

            SyntaxOp::OpenSet => self.compile_character_set()?,

            SyntaxOp::WordChar => self.store_class(CompiledOp::SyntaxSpec, SyntaxType::Word),
            SyntaxOp::NotWordChar => self.store_class(CompiledOp::NotSyntaxSpec, SyntaxType::Word),
            SyntaxOp::DigitChar => self.store_class(CompiledOp::SyntaxSpec, SyntaxType::Digit),
            SyntaxOp::NotDigitChar => {
                self.store_class(CompiledOp::NotSyntaxSpec, SyntaxType::Digit)
            }
            SyntaxOp::SpaceChar => self.store_class(CompiledOp::SyntaxSpec, SyntaxType::Space),
            SyntaxOp::NotSpaceChar => {
                self.store_class(CompiledOp::NotSyntaxSpec, SyntaxType::Space)
            }

            SyntaxOp::WordBound => self.store_assertion(CompiledOp::WordBound),
            SyntaxOp::NotWordBound => self.store_assertion(CompiledOp::NotWordBound),
            SyntaxOp::WordBeg => self.store_assertion(CompiledOp::WordBeg),
            SyntaxOp::WordEnd => self.store_assertion(CompiledOp::WordEnd),
            SyntaxOp::BegBuf => self.store_assertion(CompiledOp::BegBuf),
            SyntaxOp::EndBuf => self.store_assertion(CompiledOp::EndBuf),

            SyntaxOp::Quote => unreachable!("quote is resolved before dispatch"),
        }

        Ok(())
    }

    fn store_class(&mut self, opcode: CompiledOp, class: SyntaxType) {
        self.set_level_start();
        self.store_opcode_and_arg(opcode, class as u8);
    }

    fn store_assertion(&mut self, opcode: CompiledOp) {
        self.set_level_start();
        self.store_opcode(opcode);
    }

    fn note_backref(&mut self, reg: u8) {
        let at = self.pos.saturating_sub(1);
        match self.max_backref {
            Some((max, _)) if max >= reg => {}
            _ => self.max_backref = Some((reg, at)),
        }
    }

    /// Decide what kind of group an opening parenthesis starts.
    ///
    /// Returns the register to capture into, or `None` for a group that
    /// only groups.
    fn parse_group_prefix(&mut self) -> Result<Option<u8>> {
        let mut name = None;

        if self.peek() == Some('?') {
            self.pos += 1;
            match self.peek() {
                Some(':') => {
                    self.pos += 1;
                    return Ok(None);
                }
                Some('P') if self.pattern.get(self.pos + 1) == Some(&'<') => {
                    self.pos += 2;
                    name = Some(self.parse_group_name()?);
                }
                Some('<') => {
                    self.pos += 1;
                    name = Some(self.parse_group_name()?);
                }
                _ => return Err(self.error(SyntaxError::InvalidAfterParensQuery)),
            }
        } else if self.syntax.contains(CompileFlags::NO_AUTO_CAPTURE) {
            return Ok(None);
        }

        if usize::from(self.next_register) >= RE_NREGS {
            return Err(self.error(SyntaxError::TooManyGroups));
        }
        let reg = self.next_register;
        self.next_register += 1;

        if let Some(name) = name {
            self.names.push((name, usize::from(reg)));
        }
        Ok(Some(reg))
    }

    /// Read `name>` after `(?<` or `(?P<`
    fn parse_group_name(&mut self) -> Result<String> {
        let start = self.pos;
        let mut name = String::new();

        while let Some(ch) = self.peek() {
            if ch == '>' {
                break;
            }
            let valid = if name.is_empty() {
                ch.is_ascii_alphabetic() || ch == '_'
            } else {
                ch.is_ascii_alphanumeric() || ch == '_'
            };
            if !valid {
                return Err(self.error(SyntaxError::MissingNameTerminator));
            }
            name.push(ch);
            self.pos += 1;
        }

        if self.at_end() {
            return Err(self.error(SyntaxError::MissingNameTerminator));
        }
        if name.is_empty() {
            return Err(self.error(SyntaxError::SubpatternNameExpected));
        }
        // Consume '>'
        self.pos += 1;

        let duplicate = self.names.iter().any(|(existing, _)| *existing == name);
        if duplicate && !self.syntax.contains(CompileFlags::DUPNAMES) {
            return Err(self.error_at(SyntaxError::DuplicateSubpatternName, start));
        }
        Ok(name)
    }

    /// Check if we're in a context where $ can appear
    fn is_eol_context(&self) -> bool {
        let Some(ch) = self.peek() else {
            return true;
        };
        let closes = |op: Option<&SyntaxOp>| matches!(op, Some(SyntaxOp::Or | SyntaxOp::ClosePar));

        if closes(self.plain_ops.get(&ch)) {
            return true;
        }
        if ch == '\\' {
            if let Some(next) = self.pattern.get(self.pos + 1) {
                return closes(self.quoted_ops.get(next));
            }
        }
        false
    }

    /// Compile character set [abc] or [^abc] or [a-z]
    fn compile_character_set(&mut self) -> Result<()> {
        let open_pos = self.pos.saturating_sub(1);
        self.set_level_start();
        self.store_opcode(CompiledOp::Set);

        // Format: [complement][count lo][count hi][start][end]...
        let mut complement = false;
        if self.peek() == Some('^') {
            complement = true;
            self.pos += 1;
        }
        self.store(u8::from(complement));

        let mut ranges: Vec<(char, char)> = Vec::new();
        let mut prev_char: Option<char> = None;
        let mut in_range = false;
        let mut first_char = true;
        let mut found_closing = false;

        while let Some(ch) = self.peek() {
            self.pos += 1;

            if ch == ']' && !first_char {
                found_closing = true;
                break;
            }
            first_char = false;

            let mut actual_char = ch;
            if ch == '\\' && self.syntax.ansi_sequences() && !self.at_end() {
                let escaped = self.next_char()?;
                actual_char = self.ansi_translate(escaped)?;
            }

            if in_range {
                if let Some(start_char) = prev_char {
                    if start_char > actual_char {
                        return Err(self.error(SyntaxError::ClassRangeOrder));
                    }
                    // The start was pushed as a single char; widen it
                    ranges.pop();
                    ranges.push((start_char, actual_char));
                }
                in_range = false;
                prev_char = None;
            } else if ch == '-'
                && prev_char.is_some()
                && !self.at_end()
                && self.peek() != Some(']')
            {
                in_range = true;
            } else {
                ranges.push((actual_char, actual_char));
                prev_char = Some(actual_char);
            }
        }

        if !found_closing {
            return Err(self.error_at(SyntaxError::MissingSquareBracket, open_pos));
        }

        let count = u16::try_from(ranges.len())
            .map_err(|_| self.error(SyntaxError::PatternTooLarge))?;
        self.buffer.extend_from_slice(&count.to_le_bytes());

        // Ranges stay as written; caseless sets are resolved at match time
        for (start, end) in ranges {
            self.store_char(start);
            self.store_char(end);
        }

        Ok(())
    }
}

/// Convert hexadecimal character to decimal
fn hex_char_to_decimal(ch: char) -> Option<u8> {
    ch.to_digit(16).map(|digit| digit as u8)
}

/// Main compilation entry point
pub fn compile(pattern: &str, syntax: CompileFlags) -> std::result::Result<Program, EngineError> {
    Compiler::new(pattern, syntax).compile()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_of(pattern: &str, flags: CompileFlags) -> i32 {
        compile(pattern, flags).unwrap_err().code
    }

    #[test]
    fn counts_groups() {
        let program = compile("a(b)(c)?", CompileFlags::default()).unwrap();
        assert_eq!(program.groups(), 2);
        assert!(program.names().is_empty());

        let program = compile("\\(a\\)\\(b\\)", CompileFlags::EMACS).unwrap();
        assert_eq!(program.groups(), 2);
    }

    #[test]
    fn non_capturing_and_named_groups() {
        let pattern = "(?:x)(?P<year>\\d+)-(?<month>\\d+)";
        let program = compile(pattern, CompileFlags::default()).unwrap();
        assert_eq!(program.groups(), 2);
        assert_eq!(
            program.names(),
            &[("year".to_string(), 1), ("month".to_string(), 2)]
        );
    }

    #[test]
    fn no_auto_capture_keeps_named_groups() {
        let flags = CompileFlags::default() | CompileFlags::NO_AUTO_CAPTURE;
        let program = compile("(a)(?<b>b)", flags).unwrap();
        assert_eq!(program.groups(), 1);
        assert_eq!(program.names(), &[("b".to_string(), 1)]);
    }

    #[test]
    fn duplicate_names_need_dupnames() {
        let pattern = "(?<x>a)|(?<x>b)";
        let err = compile(pattern, CompileFlags::default()).unwrap_err();
        assert_eq!(err.code, SyntaxError::DuplicateSubpatternName.code());

        let program = compile(pattern, CompileFlags::default() | CompileFlags::DUPNAMES).unwrap();
        assert_eq!(program.names().len(), 2);
    }

    #[test]
    fn unclosed_group_reports_end_of_pattern() {
        let err = compile("a(", CompileFlags::default()).unwrap_err();
        assert_eq!(err.code, SyntaxError::MissingClosingParenthesis.code());
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn unmatched_close_depends_on_syntax() {
        assert_eq!(
            code_of("a)", CompileFlags::default()),
            SyntaxError::UnmatchedClosingParenthesis.code()
        );
        assert!(compile("a\\)", CompileFlags::EMACS).is_ok());
    }

    #[test]
    fn set_errors() {
        let err = compile("ab[cd", CompileFlags::default()).unwrap_err();
        assert_eq!(err.code, SyntaxError::MissingSquareBracket.code());
        assert_eq!(err.offset, 2);

        assert_eq!(code_of("[z-a]", CompileFlags::default()), SyntaxError::ClassRangeOrder.code());
    }

    #[test]
    fn trailing_backslash() {
        let err = compile("ab\\", CompileFlags::default()).unwrap_err();
        assert_eq!(err.code, SyntaxError::EndBackslash.code());
    }

    #[test]
    fn backref_to_missing_group() {
        let err = compile("(a)\\2", CompileFlags::default()).unwrap_err();
        assert_eq!(err.code, SyntaxError::BadSubpatternReference.code());
        assert_eq!(err.offset, 4);
        assert!(compile("(a)\\1", CompileFlags::default()).is_ok());
    }

    #[test]
    fn misplaced_quantifier_in_context_independent_syntax() {
        assert_eq!(code_of("*a", CompileFlags::default()), SyntaxError::QuantifierInvalid.code());
        assert!(compile("*a", CompileFlags::EMACS).is_ok());
    }

    #[test]
    fn bad_group_prefix() {
        let flags = CompileFlags::default();
        assert_eq!(code_of("(?x)", flags), SyntaxError::InvalidAfterParensQuery.code());
        assert_eq!(code_of("(?<1a>x)", flags), SyntaxError::MissingNameTerminator.code());
        assert_eq!(code_of("(?<>x)", flags), SyntaxError::SubpatternNameExpected.code());
    }

    #[test]
    fn error_offsets_are_bytes_in_utf_mode() {
        let flags = CompileFlags::default() | CompileFlags::UTF;
        let err = compile("éé(", flags).unwrap_err();
        assert_eq!(err.offset, 5);
    }

    #[test]
    fn too_many_groups() {
        let pattern = "(a)".repeat(RE_NREGS);
        assert_eq!(code_of(&pattern, CompileFlags::default()), SyntaxError::TooManyGroups.code());
    }

    #[test]
    fn case_folding_applies_to_literals_only() {
        let flags = CompileFlags::default() | CompileFlags::CASE_INSENSITIVE;
        let folded = compile("AB", flags).unwrap();
        let plain = compile("ab", CompileFlags::default()).unwrap();
        assert_eq!(folded.bytecode(), plain.bytecode());

        let folded = compile("[Z-a]", flags).unwrap();
        let plain = compile("[Z-a]", CompileFlags::default()).unwrap();
        assert_eq!(folded.bytecode(), plain.bytecode());
    }

    #[test]
    fn byte_units_fold_ascii_only() {
        assert_eq!(fold_unit('A', false), 'a');
        assert_eq!(fold_unit('\u{C9}', false), '\u{C9}');
        assert_eq!(fold_unit('\u{C9}', true), '\u{E9}');
    }
}
