//! Backtracking virtual machine for compiled programs
//!
//! This module ports the matching logic from re_match_2 and re_search_2
//! in regexpr.c:880-1464. Text positions are byte offsets into the subject;
//! a unit is one UTF-8 character in UTF mode and one byte otherwise.

use crate::{
    backtrack::ExecLimits,
    compiler::{fold_unit, Program},
    engine::{
        ERROR_BADOFFSET, ERROR_BADUTF8, ERROR_BADUTFOFFSET, ERROR_DEPTHLIMIT, ERROR_INTERNAL,
        ERROR_MATCHLIMIT, ERROR_NOMATCH, ERROR_PARTIAL, UNSET,
    },
    flags::{CompileFlags, MatchFlags},
    opcodes::{is_word_char, CompiledOp, SyntaxType},
};

/// Initial size of failure stack
const INITIAL_FAILURES: usize = 128;

/// Register slots kept per group: tentative start, start, end
const SLOTS: usize = 3;

/// Why a match attempt stopped without reaching `End`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    /// Every alternative failed
    Exhausted,
    /// The attempt must abort with this status
    Error(i32),
}

type Step<T> = std::result::Result<T, Stop>;

/// The subject seen as a sequence of units
#[derive(Debug, Clone, Copy)]
enum Subject<'s> {
    Bytes(&'s [u8]),
    Text(&'s str),
}

impl<'s> Subject<'s> {
    fn len(&self) -> usize {
        match self {
            Subject::Bytes(bytes) => bytes.len(),
            Subject::Text(text) => text.len(),
        }
    }

    /// Unit at `pos` and its width in bytes
    fn unit_at(&self, pos: usize) -> Option<(char, usize)> {
        match self {
            Subject::Bytes(bytes) => bytes.get(pos).map(|&b| (char::from(b), 1)),
            Subject::Text(text) => text
                .get(pos..)
                .and_then(|rest| rest.chars().next())
                .map(|ch| (ch, ch.len_utf8())),
        }
    }

    /// Unit ending at `pos`
    fn unit_before(&self, pos: usize) -> Option<char> {
        match self {
            Subject::Bytes(bytes) => pos.checked_sub(1).map(|p| char::from(bytes[p])),
            Subject::Text(text) => text.get(..pos).and_then(|head| head.chars().next_back()),
        }
    }

    fn is_boundary(&self, pos: usize) -> bool {
        match self {
            Subject::Bytes(bytes) => pos <= bytes.len(),
            Subject::Text(text) => text.is_char_boundary(pos),
        }
    }
}

/// A failure point for backtracking
#[derive(Debug, Clone, Copy)]
struct FailurePoint {
    /// Position in text when failure occurred
    text_pos: usize,
    /// Position in bytecode to resume from
    code_pos: usize,
    /// Length of the register trail when the point was pushed
    trail_len: usize,
}

/// One overwritten register slot: its index and previous value
#[derive(Debug, Clone, Copy)]
struct TrailEntry {
    slot: usize,
    old: usize,
}

/// Parameters of one `execute` call that do not change between attempts
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExecRequest {
    pub start_offset: usize,
    pub flags: MatchFlags,
    pub limits: ExecLimits,
    /// First unit every match must begin with, when known
    pub first_unit: Option<char>,
}

/// Execution state for the regex virtual machine
struct MatchState<'a> {
    /// The compiled program
    program: &'a Program,
    /// Subject being searched
    subject: Subject<'a>,
    /// Current position in text (byte offset)
    text_pos: usize,
    /// Position in bytecode
    code_pos: usize,
    /// Start of the current attempt
    attempt_start: usize,
    /// Failure stack for backtracking
    failure_stack: Vec<FailurePoint>,
    /// `SLOTS` entries per group
    regs: Vec<usize>,
    /// Register writes made while a failure point was live, undone on backtrack
    trail: Vec<TrailEntry>,
    /// Request parameters
    request: ExecRequest,
    /// Current tick count, shared by all attempts
    ticks: usize,
    /// The current attempt ran into the end of the subject
    hit_end: bool,
}

impl<'a> MatchState<'a> {
    /// Create new match state
    fn new(program: &'a Program, subject: Subject<'a>, request: ExecRequest) -> Self {
        Self {
            program,
            subject,
            text_pos: 0,
            code_pos: 0,
            attempt_start: 0,
            failure_stack: Vec::with_capacity(INITIAL_FAILURES),
            regs: vec![UNSET; (program.groups + 1) * SLOTS],
            trail: Vec::new(),
            request,
            ticks: 0,
            hit_end: false,
        }
    }

    fn flag(&self, flag: MatchFlags) -> bool {
        self.request.flags.contains(flag)
    }

    fn case_insensitive(&self) -> bool {
        self.program.flags.case_insensitive()
    }

    /// Unit as compared against literals and back-references
    fn fold(&self, ch: char) -> char {
        if self.case_insensitive() {
            fold_unit(ch, self.program.flags.utf())
        } else {
            ch
        }
    }

    /// Whether `ch`, or a case variant of it when matching caselessly, lies
    /// in `lo..=hi`
    fn in_range(&self, ch: char, lo: char, hi: char) -> bool {
        if (lo..=hi).contains(&ch) {
            return true;
        }
        if !self.case_insensitive() {
            return false;
        }
        let (lower, upper) = if self.program.flags.utf() {
            (single(ch.to_lowercase()), single(ch.to_uppercase()))
        } else {
            (Some(ch.to_ascii_lowercase()), Some(ch.to_ascii_uppercase()))
        };
        [lower, upper]
            .into_iter()
            .flatten()
            .any(|variant| (lo..=hi).contains(&variant))
    }

    /// Check if we've exceeded execution limits
    fn check_limits(&mut self) -> Step<()> {
        self.ticks += 1;

        if let Some(max_ticks) = self.request.limits.max_ticks {
            if self.ticks >= max_ticks {
                return Err(Stop::Error(ERROR_MATCHLIMIT));
            }
        }

        Ok(())
    }

    /// Get current unit and advance
    fn next_char(&mut self) -> Option<char> {
        match self.subject.unit_at(self.text_pos) {
            Some((ch, width)) => {
                self.text_pos += width;
                Some(ch)
            }
            None => {
                self.note_end();
                None
            }
        }
    }

    /// Unit at the current position without advancing
    fn current_char(&self) -> Option<char> {
        self.subject.unit_at(self.text_pos).map(|(ch, _)| ch)
    }

    fn prev_char(&self) -> Option<char> {
        self.subject.unit_before(self.text_pos)
    }

    /// Check if we're at end of text
    fn at_end(&self) -> bool {
        self.text_pos >= self.subject.len()
    }

    /// Record that more subject could have changed the outcome
    fn note_end(&mut self) {
        if self.text_pos > self.attempt_start {
            self.hit_end = true;
        }
    }

    /// Push failure point onto stack
    fn push_failure(&mut self, code_pos: usize) -> Step<()> {
        if self.failure_stack.len() >= self.request.limits.max_failures {
            return Err(Stop::Error(ERROR_DEPTHLIMIT));
        }

        self.failure_stack.push(FailurePoint {
            text_pos: self.text_pos,
            code_pos,
            trail_len: self.trail.len(),
        });
        Ok(())
    }

    /// Backtrack on failure
    fn backtrack(&mut self) -> Step<()> {
        if self.partial_hard() {
            return Err(Stop::Error(ERROR_PARTIAL));
        }
        match self.failure_stack.pop() {
            Some(failure) => {
                self.text_pos = failure.text_pos;
                self.code_pos = failure.code_pos;
                while self.trail.len() > failure.trail_len {
                    if let Some(entry) = self.trail.pop() {
                        self.regs[entry.slot] = entry.old;
                    }
                }
                Ok(())
            }
            None => Err(Stop::Exhausted),
        }
    }

    fn partial_hard(&self) -> bool {
        self.hit_end && self.flag(MatchFlags::PARTIAL_HARD)
    }

    fn byte_at(&self, pos: usize) -> Step<u8> {
        self.program
            .buffer
            .get(pos)
            .copied()
            .ok_or(Stop::Error(ERROR_INTERNAL))
    }

    fn read_byte(&mut self) -> Step<u8> {
        let byte = self.byte_at(self.code_pos)?;
        self.code_pos += 1;
        Ok(byte)
    }

    /// Read 16-bit displacement from bytecode
    fn read_displacement(&mut self) -> Step<i16> {
        let low = self.read_byte()?;
        let high = self.read_byte()?;
        Ok(i16::from_le_bytes([low, high]))
    }

    fn jump_target(&self, disp: i16) -> usize {
        (self.code_pos as isize + disp as isize) as usize
    }

    /// Read a length-prefixed UTF-8 character from bytecode
    fn read_char(&mut self) -> Step<char> {
        let len = usize::from(self.read_byte()?);
        let bytes = self
            .program
            .buffer
            .get(self.code_pos..self.code_pos + len)
            .ok_or(Stop::Error(ERROR_INTERNAL))?;
        let ch = std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.chars().next())
            .ok_or(Stop::Error(ERROR_INTERNAL))?;
        self.code_pos += len;
        Ok(ch)
    }

    fn reg(&self, reg: usize, slot: usize) -> usize {
        self.regs[reg * SLOTS + slot]
    }

    fn set_reg(&mut self, reg: usize, slot: usize, value: usize) {
        let slot = reg * SLOTS + slot;
        let Some(entry) = self.regs.get_mut(slot) else {
            return;
        };
        let old = std::mem::replace(entry, value);
        // Nothing can backtrack past a write made with no failure point live
        if !self.failure_stack.is_empty() && old != value {
            self.trail.push(TrailEntry { slot, old });
        }
    }

    /// Run one attempt at `start`; returns the end of the match
    fn attempt(&mut self, start: usize) -> Step<usize> {
        self.text_pos = start;
        self.attempt_start = start;
        self.code_pos = 0;
        self.failure_stack.clear();
        self.trail.clear();
        self.regs.fill(UNSET);
        self.hit_end = false;

        loop {
            self.check_limits()?;

            let opcode =
                CompiledOp::from_byte(self.read_byte()?).ok_or(Stop::Error(ERROR_INTERNAL))?;

            match opcode {
                CompiledOp::End => {
                    let empty = self.text_pos == start;
                    let refuse_empty = empty
                        && (self.flag(MatchFlags::NOTEMPTY)
                            || (self.flag(MatchFlags::NOTEMPTY_ATSTART)
                                && start == self.request.start_offset));
                    if refuse_empty {
                        self.backtrack()?;
                        continue;
                    }
                    return Ok(self.text_pos);
                }

                CompiledOp::Bol => {
                    let at_start = self.text_pos == 0 && !self.flag(MatchFlags::NOTBOL);
                    if !at_start && self.prev_char() != Some('\n') {
                        self.backtrack()?;
                    }
                }

                CompiledOp::Eol => {
                    if self.at_end() {
                        self.note_end();
                        if self.flag(MatchFlags::NOTEOL) {
                            self.backtrack()?;
                        }
                    } else if self.current_char() != Some('\n') {
                        self.backtrack()?;
                    }
                }

                CompiledOp::BegBuf => {
                    if self.text_pos != 0 {
                        self.backtrack()?;
                    }
                }

                CompiledOp::EndBuf => {
                    if !self.at_end() {
                        self.backtrack()?;
                    } else {
                        self.note_end();
                    }
                }

                CompiledOp::Set => {
                    let complement = self.read_byte()? != 0;
                    let count = u16::from_le_bytes([self.read_byte()?, self.read_byte()?]);

                    // Ranges must be consumed even when the subject is exhausted
                    let mut matched = false;
                    let ch = self.next_char();
                    for _ in 0..count {
                        let start_char = self.read_char()?;
                        let end_char = self.read_char()?;
                        if let Some(ch) = ch {
                            matched |= self.in_range(ch, start_char, end_char);
                        }
                    }

                    if ch.is_none() || matched == complement {
                        self.backtrack()?;
                    }
                }

                CompiledOp::Exact => {
                    let expected = self.read_char()?;
                    let actual = self.next_char().map(|ch| self.fold(ch));
                    if actual != Some(expected) {
                        self.backtrack()?;
                    }
                }

                CompiledOp::AnyChar => {
                    let dotall = self.program.flags.contains(CompileFlags::DOTALL);
                    match self.next_char() {
                        Some('\n') if !dotall => self.backtrack()?,
                        Some(_) => {}
                        None => self.backtrack()?,
                    }
                }

                CompiledOp::StartMemory => {
                    let reg = usize::from(self.read_byte()?);
                    self.set_reg(reg, 0, self.text_pos);
                }

                CompiledOp::EndMemory => {
                    let reg = usize::from(self.read_byte()?);
                    if reg > self.program.groups {
                        return Err(Stop::Error(ERROR_INTERNAL));
                    }
                    self.set_reg(reg, 1, self.reg(reg, 0));
                    self.set_reg(reg, 2, self.text_pos);
                }

                CompiledOp::MatchMemory => {
                    let reg = usize::from(self.read_byte()?);
                    if !self.match_memory(reg)? {
                        self.backtrack()?;
                    }
                }

                CompiledOp::Jump => {
                    let disp = self.read_displacement()?;
                    self.code_pos = self.jump_target(disp);
                }

                CompiledOp::DummyFailureJump => {
                    // Enter a plus loop body without the loop's exit point
                    let disp = self.read_displacement()?;
                    self.code_pos = self.jump_target(disp);
                }

                CompiledOp::FailureJump => {
                    let disp = self.read_displacement()?;
                    let target = self.jump_target(disp);
                    self.push_failure(target)?;
                }

                CompiledOp::StarJump => {
                    let disp = self.read_displacement()?;
                    let target = self.jump_target(disp);
                    if !self.loop_made_no_progress(target)? {
                        self.code_pos = target;
                    }
                }

                CompiledOp::WordBeg => {
                    let next_is_word = self.current_char().is_some_and(is_word_char);
                    let prev_is_word = self.prev_char().is_some_and(is_word_char);
                    if !next_is_word || prev_is_word {
                        self.backtrack()?;
                    }
                }

                CompiledOp::WordEnd => {
                    let prev_is_word = self.prev_char().is_some_and(is_word_char);
                    let next_is_word = self.current_char().is_some_and(is_word_char);
                    if self.at_end() {
                        self.note_end();
                    }
                    if !prev_is_word || next_is_word {
                        self.backtrack()?;
                    }
                }

                CompiledOp::WordBound | CompiledOp::NotWordBound => {
                    let prev_is_word = self.prev_char().is_some_and(is_word_char);
                    let next_is_word = self.current_char().is_some_and(is_word_char);
                    if self.at_end() {
                        self.note_end();
                    }
                    let boundary = prev_is_word != next_is_word;
                    if boundary != (opcode == CompiledOp::WordBound) {
                        self.backtrack()?;
                    }
                }

                CompiledOp::SyntaxSpec | CompiledOp::NotSyntaxSpec => {
                    let class = SyntaxType::from_byte(self.read_byte()?)
                        .ok_or(Stop::Error(ERROR_INTERNAL))?;
                    let wanted = opcode == CompiledOp::SyntaxSpec;
                    match self.next_char() {
                        Some(ch) if class.contains(ch) == wanted => {}
                        _ => self.backtrack()?,
                    }
                }
            }
        }
    }

    /// Zero-progress guard for a loop back-edge to the `FailureJump` at
    /// `target`: true when the body consumed nothing since the loop's exit
    /// point was pushed, in which case execution falls through to the exit.
    fn loop_made_no_progress(&self, target: usize) -> Step<bool> {
        if CompiledOp::from_byte(self.byte_at(target)?) != Some(CompiledOp::FailureJump) {
            return Ok(false);
        }
        let disp = i16::from_le_bytes([self.byte_at(target + 1)?, self.byte_at(target + 2)?]);
        let exit = (target as isize + 3 + disp as isize) as usize;

        let point = self
            .failure_stack
            .iter()
            .rev()
            .find(|point| point.code_pos == exit);
        Ok(matches!(point, Some(point) if point.text_pos == self.text_pos))
    }

    /// Match a copy of group `reg` at the current position
    fn match_memory(&mut self, reg: usize) -> Step<bool> {
        if reg > self.program.groups {
            return Err(Stop::Error(ERROR_INTERNAL));
        }
        let (start, end) = (self.reg(reg, 1), self.reg(reg, 2));
        if start == UNSET || end == UNSET {
            return Ok(false);
        }

        let mut pos = start;
        while pos < end {
            let Some((expected, width)) = self.subject.unit_at(pos) else {
                return Err(Stop::Error(ERROR_INTERNAL));
            };
            pos += width;
            let actual = self.next_char().map(|ch| self.fold(ch));
            if actual != Some(self.fold(expected)) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fill the ovector from the registers; returns the match status
    fn fill_ovector(&self, start: usize, end: usize, ovector: &mut [usize]) -> i32 {
        ovector.fill(UNSET);
        let mut highest = 0;

        for (group, pair) in ovector.chunks_exact_mut(2).enumerate() {
            let bounds = if group == 0 {
                Some((start, end))
            } else if group <= self.program.groups {
                let (s, e) = (self.reg(group, 1), self.reg(group, 2));
                (s != UNSET && e != UNSET).then_some((s, e))
            } else {
                None
            };

            if let Some((s, e)) = bounds {
                pair[0] = s;
                pair[1] = e;
                highest = group;
            }
        }

        (highest + 1) as i32
    }
}

/// Search `subject` for the program and fill `ovector`.
///
/// Returns the number of leading set pairs on a match, `ERROR_PARTIAL`
/// with pair 0 covering the partial match, or another negative status.
pub(crate) fn execute(
    program: &Program,
    subject: &[u8],
    request: ExecRequest,
    ovector: &mut [usize],
) -> i32 {
    if request.start_offset > subject.len() {
        return ERROR_BADOFFSET;
    }

    let subject = if program.flags.utf() {
        match std::str::from_utf8(subject) {
            Ok(text) => Subject::Text(text),
            Err(_) => return ERROR_BADUTF8,
        }
    } else {
        Subject::Bytes(subject)
    };
    if !subject.is_boundary(request.start_offset) {
        return ERROR_BADUTFOFFSET;
    }

    let caseless = program.flags.case_insensitive();
    let fold = |ch: char| {
        if caseless {
            fold_unit(ch, program.flags.utf())
        } else {
            ch
        }
    };
    let folded_first = request.first_unit.map(fold);
    let partial_soft = request.flags.contains(MatchFlags::PARTIAL_SOFT)
        && !request.flags.contains(MatchFlags::PARTIAL_HARD);

    let mut state = MatchState::new(program, subject, request);
    let mut first_partial = None;
    let mut start = request.start_offset;

    loop {
        let candidate = match (folded_first, subject.unit_at(start)) {
            (None, _) => true,
            (Some(first), Some((ch, _))) => fold(ch) == first,
            (Some(_), None) => false,
        };

        if candidate {
            match state.attempt(start) {
                Ok(end) => return state.fill_ovector(start, end, ovector),
                Err(Stop::Error(ERROR_PARTIAL)) => {
                    log::trace!("partial match at {start}");
                    return partial(start, subject.len(), ovector);
                }
                Err(Stop::Error(code)) => return code,
                Err(Stop::Exhausted) => {
                    if partial_soft && state.hit_end && first_partial.is_none() {
                        first_partial = Some(start);
                    }
                }
            }
        }

        if request.flags.contains(MatchFlags::ANCHORED) {
            break;
        }
        match subject.unit_at(start) {
            Some((_, width)) => start += width,
            None => break,
        }
    }

    match first_partial {
        Some(start) => partial(start, subject.len(), ovector),
        None => ERROR_NOMATCH,
    }
}

/// The sole char of a case mapping; `None` when it expands to several
fn single(mut mapped: impl Iterator<Item = char>) -> Option<char> {
    match (mapped.next(), mapped.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}

fn partial(start: usize, end: usize, ovector: &mut [usize]) -> i32 {
    ovector.fill(UNSET);
    if let [first, second, ..] = ovector {
        *first = start;
        *second = end;
    }
    ERROR_PARTIAL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;

    fn run(pattern: &str, subject: &str, flags: MatchFlags) -> (i32, Vec<usize>) {
        run_with(pattern, CompileFlags::default(), subject, 0, flags)
    }

    fn run_with(
        pattern: &str,
        compile_flags: CompileFlags,
        subject: &str,
        start_offset: usize,
        flags: MatchFlags,
    ) -> (i32, Vec<usize>) {
        let program = compile(pattern, compile_flags).unwrap();
        let mut ovector = vec![UNSET; 2 * (program.groups + 1)];
        let request = ExecRequest {
            start_offset,
            flags,
            limits: ExecLimits::default(),
            first_unit: None,
        };
        let rc = execute(&program, subject.as_bytes(), request, &mut ovector);
        (rc, ovector)
    }

    #[test]
    fn finds_leftmost_match_with_groups() {
        let (rc, ov) = run("(\\d+)-(\\d+)", "ab 12-345", MatchFlags::empty());
        assert_eq!(rc, 3);
        assert_eq!(ov, vec![3, 9, 3, 5, 6, 9]);
    }

    #[test]
    fn unset_groups_and_rc() {
        let (rc, ov) = run("(a)|(b)", "b", MatchFlags::empty());
        assert_eq!(rc, 3);
        assert_eq!(&ov[2..4], &[UNSET, UNSET]);
        assert_eq!(&ov[4..6], &[0, 1]);

        let (rc, ov) = run("(a)|(b)", "a", MatchFlags::empty());
        assert_eq!(rc, 2);
        assert_eq!(&ov[4..6], &[UNSET, UNSET]);
    }

    #[test]
    fn registers_restore_on_backtrack() {
        // The first alternative sets group 1 before failing
        let (rc, ov) = run("(?:(a)x|ab)", "ab", MatchFlags::empty());
        assert_eq!(rc, 1);
        assert_eq!(&ov[0..4], &[0, 2, UNSET, UNSET]);
    }

    #[test]
    fn register_trail_does_not_grow_with_failure_points() {
        let pattern = format!("{}a*{}", "(".repeat(90), ")".repeat(90));
        let program = compile(&pattern, CompileFlags::default()).unwrap();
        let subject = "a".repeat(10_000);
        let request = ExecRequest {
            start_offset: 0,
            flags: MatchFlags::empty(),
            limits: ExecLimits::default(),
            first_unit: None,
        };

        let mut state = MatchState::new(&program, Subject::Text(&subject), request);
        assert_eq!(state.attempt(0), Ok(10_000));
        assert!(state.failure_stack.len() >= 10_000);
        assert!(state.trail.len() <= SLOTS * (program.groups + 1));
        assert_eq!((state.reg(90, 1), state.reg(90, 2)), (0, 10_000));
    }

    #[test]
    fn caseless_sets_test_case_variants() {
        let caseless = CompileFlags::default() | CompileFlags::CASE_INSENSITIVE;
        assert_eq!(run_with("[Z-a]", caseless, "_", 0, MatchFlags::empty()).0, 1);
        assert_eq!(run_with("[x-z]+", caseless, "aXyZ", 0, MatchFlags::empty()).1, vec![1, 4]);
        assert_eq!(run_with("[^x]", caseless, "X", 0, MatchFlags::empty()).0, ERROR_NOMATCH);
    }

    #[test]
    fn star_and_plus() {
        assert_eq!(run("ab*c", "xac", MatchFlags::empty()).1[..2], [1, 3]);
        assert_eq!(run("ab+c", "xabbbc", MatchFlags::empty()).1[..2], [1, 6]);
        assert_eq!(run("ab+c", "xac", MatchFlags::empty()).0, ERROR_NOMATCH);
        assert_eq!(run("a?b", "b", MatchFlags::empty()).1[..2], [0, 1]);
    }

    #[test]
    fn empty_loop_body_terminates() {
        let (rc, ov) = run("(a*)*b", "aab", MatchFlags::empty());
        assert_eq!(rc, 2);
        assert_eq!(&ov[..2], &[0, 3]);

        let (rc, _) = run("(a*)+$", "aaac", MatchFlags::empty());
        assert!(rc > 0);
    }

    #[test]
    fn back_references() {
        let (rc, ov) = run("(\\w+) \\1", "say hello hello", MatchFlags::empty());
        assert_eq!(rc, 2);
        assert_eq!(&ov[..4], &[4, 15, 4, 9]);
        assert_eq!(run("(a)\\1", "ab", MatchFlags::empty()).0, ERROR_NOMATCH);

        let caseless = CompileFlags::default() | CompileFlags::CASE_INSENSITIVE;
        let (rc, _) = run_with("(ab)\\1", caseless, "abAB", 0, MatchFlags::empty());
        assert_eq!(rc, 2);
    }

    #[test]
    fn anchors_and_flags() {
        assert_eq!(run("^b", "ab", MatchFlags::empty()).0, ERROR_NOMATCH);
        assert_eq!(run("^a", "a", MatchFlags::NOTBOL).0, ERROR_NOMATCH);
        assert_eq!(run("a$", "a", MatchFlags::NOTEOL).0, ERROR_NOMATCH);
        assert_eq!(run("b", "ab", MatchFlags::ANCHORED).0, ERROR_NOMATCH);
        assert_eq!(run("a*", "b", MatchFlags::NOTEMPTY).0, ERROR_NOMATCH);
        assert_eq!(run("^$", "", MatchFlags::empty()).1, vec![0, 0]);
    }

    #[test]
    fn word_boundaries_see_context_before_start_offset() {
        let (rc, ov) = run_with("\\bb", CompileFlags::default(), "ab b", 1, MatchFlags::empty());
        assert_eq!(rc, 1);
        assert_eq!(ov, vec![3, 4]);
    }

    #[test]
    fn utf_units_and_offsets() {
        let utf = CompileFlags::default() | CompileFlags::UTF;
        let (rc, ov) = run_with("é.", utf, "xééy", 0, MatchFlags::empty());
        assert_eq!(rc, 1);
        assert_eq!(ov, vec![1, 5]);

        let (rc, _) = run_with("é", utf, "é", 1, MatchFlags::empty());
        assert_eq!(rc, ERROR_BADUTFOFFSET);

        let program = compile("a", utf).unwrap();
        let mut ov = vec![UNSET; 2];
        let request = ExecRequest {
            start_offset: 0,
            flags: MatchFlags::empty(),
            limits: ExecLimits::default(),
            first_unit: None,
        };
        assert_eq!(execute(&program, b"\xffa", request, &mut ov), ERROR_BADUTF8);
    }

    #[test]
    fn bad_offset() {
        let flags = CompileFlags::default();
        assert_eq!(run_with("a", flags, "abc", 4, MatchFlags::empty()).0, ERROR_BADOFFSET);
        assert_eq!(run_with("$", flags, "abc", 3, MatchFlags::empty()).0, 1);
    }

    #[test]
    fn partial_matching() {
        let (rc, ov) = run("abc", "xxab", MatchFlags::PARTIAL_HARD);
        assert_eq!(rc, ERROR_PARTIAL);
        assert_eq!(ov, vec![2, 4]);

        // Soft partial prefers a complete match elsewhere
        let (rc, ov) = run("ab|b$", "xxab", MatchFlags::PARTIAL_SOFT);
        assert_eq!(rc, 1);
        assert_eq!(ov, vec![2, 4]);

        let (rc, ov) = run("abc", "xxab", MatchFlags::PARTIAL_SOFT);
        assert_eq!(rc, ERROR_PARTIAL);
        assert_eq!(ov, vec![2, 4]);

        assert_eq!(run("abc", "xxab", MatchFlags::empty()).0, ERROR_NOMATCH);
    }

    #[test]
    fn limits_abort_the_search() {
        let program = compile("(a|b)*c", CompileFlags::default()).unwrap();
        let mut ov = vec![UNSET; 4];
        let request = ExecRequest {
            start_offset: 0,
            flags: MatchFlags::empty(),
            limits: ExecLimits {
                max_ticks: Some(50),
                max_failures: 100_000,
            },
            first_unit: None,
        };
        let subject = "ab".repeat(100);
        assert_eq!(execute(&program, subject.as_bytes(), request, &mut ov), ERROR_MATCHLIMIT);

        let request = ExecRequest {
            limits: ExecLimits {
                max_ticks: None,
                max_failures: 10,
            },
            ..request
        };
        assert_eq!(execute(&program, subject.as_bytes(), request, &mut ov), ERROR_DEPTHLIMIT);
    }

    #[test]
    fn first_unit_prefilter_keeps_results() {
        let program = compile("b+", CompileFlags::default()).unwrap();
        let mut ov = vec![UNSET; 2];
        let request = ExecRequest {
            start_offset: 0,
            flags: MatchFlags::empty(),
            limits: ExecLimits::default(),
            first_unit: Some('b'),
        };
        assert_eq!(execute(&program, b"aabba", request, &mut ov), 1);
        assert_eq!(ov, vec![2, 4]);
    }
}
