//! Reusable match state
//!
//! A [`Matcher`] binds one [`Regex`] and one [`MatchData`] and runs the
//! pattern against any number of subjects. Rebinding to a pattern with the
//! same group count keeps the scratch allocation.

use std::borrow::Cow;

use crate::{
    backtrack::Backtrack,
    captures::CaptureView,
    engine::{self, PatternEngine, ERROR_NOMATCH, ERROR_PARTIAL},
    error::{MatchError, Result},
    flags::MatchFlags,
    match_data::MatchData,
    regex::Regex,
};

/// Where a matcher is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherState {
    /// No pattern bound
    Unbound,
    /// Bound, nothing executed since binding
    Ready,
    /// Last execution matched completely
    Matched,
    /// Last execution matched partially
    Partial,
    /// Last execution found no match
    NoMatch,
    /// Last execution stopped with an error
    Failed,
    /// Scratch released by [`Matcher::free`]
    Released,
}

/// Reusable matching state for one pattern at a time
pub struct Matcher<E: PatternEngine = Backtrack> {
    regex: Option<Regex<E>>,
    scratch: Option<MatchData>,
    status: Option<i32>,
    matches: bool,
    partial: bool,
    subject: Vec<u8>,
}

impl<E: PatternEngine> Default for Matcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: PatternEngine> std::fmt::Debug for Matcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("regex", &self.regex)
            .field("state", &self.state())
            .field("status", &self.status)
            .finish()
    }
}

impl<E: PatternEngine> Matcher<E> {
    /// A matcher with no pattern bound
    pub fn new() -> Self {
        Self {
            regex: None,
            scratch: None,
            status: None,
            matches: false,
            partial: false,
            subject: Vec::new(),
        }
    }

    /// Bind `regex`, dropping any previous result.
    ///
    /// The scratch is kept when the group count is unchanged and
    /// reallocated otherwise.
    pub fn init(&mut self, regex: &Regex<E>) {
        let groups = regex.groups();
        match &mut self.scratch {
            Some(scratch) if scratch.groups() == groups => {
                log::trace!("reusing match scratch for {:?}", regex.pattern());
                scratch.clear();
            }
            _ => {
                log::trace!("allocating match scratch for {groups} groups");
                self.scratch = Some(MatchData::new(groups));
            }
        }

        self.regex = Some(regex.clone());
        self.status = None;
        self.matches = false;
        self.partial = false;
        self.subject.clear();
    }

    /// Bind `regex` and match `subject`
    pub fn reset(&mut self, regex: &Regex<E>, subject: &[u8], flags: MatchFlags) -> bool {
        self.init(regex);
        self.match_bytes(subject, flags)
    }

    /// Text variant of [`Matcher::reset`]
    pub fn reset_str(&mut self, regex: &Regex<E>, subject: &str, flags: MatchFlags) -> bool {
        self.reset(regex, subject.as_bytes(), flags)
    }

    /// Match `subject` from its start; true on a complete or partial match
    pub fn match_bytes(&mut self, subject: &[u8], flags: MatchFlags) -> bool {
        self.exec_bytes(subject, flags);
        self.matches
    }

    /// Text variant of [`Matcher::match_bytes`]
    pub fn match_str(&mut self, subject: &str, flags: MatchFlags) -> bool {
        self.match_bytes(subject.as_bytes(), flags)
    }

    /// Match `subject` from its start and return the raw engine status
    pub fn exec_bytes(&mut self, subject: &[u8], flags: MatchFlags) -> i32 {
        self.exec_bytes_at(subject, 0, flags)
    }

    /// Text variant of [`Matcher::exec_bytes`]
    pub fn exec_str(&mut self, subject: &str, flags: MatchFlags) -> i32 {
        self.exec_bytes(subject.as_bytes(), flags)
    }

    /// Match `subject` starting at byte `start_offset`.
    ///
    /// The bytes before the offset stay visible to anchors and word
    /// boundaries.
    pub fn exec_bytes_at(&mut self, subject: &[u8], start_offset: usize, flags: MatchFlags) -> i32 {
        self.scratch("exec");
        self.subject.clear();
        self.subject.extend_from_slice(subject);
        self.exec_retained_at(start_offset, flags)
    }

    /// Match the retained subject again from `start_offset`
    pub(crate) fn exec_retained_at(&mut self, start_offset: usize, flags: MatchFlags) -> i32 {
        let Some(regex) = self.regex.as_ref() else {
            panic!("Matcher::exec called on an unbound matcher");
        };
        let Some(scratch) = self.scratch.as_mut() else {
            panic!("Matcher::exec called after free");
        };

        let status = regex.execute(&self.subject, start_offset, flags, scratch.as_mut_slice());
        self.matches = engine::matched(status);
        self.partial = status == ERROR_PARTIAL;
        self.status = Some(status);

        if !self.matches {
            scratch.clear();
        }
        if engine::is_error(status) {
            log::debug!(
                "matching {:?} failed: {}",
                regex.pattern(),
                regex.engine().error_message(status)
            );
        }
        status
    }

    /// Text variant of [`Matcher::exec_bytes_at`]
    pub fn exec_str_at(&mut self, subject: &str, start_offset: usize, flags: MatchFlags) -> i32 {
        self.exec_bytes_at(subject.as_bytes(), start_offset, flags)
    }

    /// Whether the last execution stopped with a genuine error
    pub fn has_error(&self) -> bool {
        self.status.is_some_and(engine::is_error)
    }

    /// The error of the last execution, if it had one
    pub fn error(&self) -> Option<MatchError> {
        let status = self.status.filter(|&status| engine::is_error(status))?;
        let message = self
            .regex
            .as_ref()
            .map_or(Cow::Borrowed("unbound matcher"), |regex| {
                regex.engine().error_message(status)
            });
        Some(MatchError {
            code: status,
            message: message.into_owned(),
        })
    }

    /// Raw status of the last execution
    pub fn status(&self) -> Option<i32> {
        self.status
    }

    /// Whether the last execution matched, completely or partially
    pub fn matches(&self) -> bool {
        self.matches
    }

    /// Whether the last execution matched partially
    pub fn partial(&self) -> bool {
        self.partial
    }

    /// Capture group count of the bound pattern
    pub fn groups(&self) -> usize {
        self.regex.as_ref().map_or(0, |regex| regex.groups())
    }

    pub fn state(&self) -> MatcherState {
        match (&self.regex, &self.scratch, self.status) {
            (None, _, _) => MatcherState::Unbound,
            (Some(_), None, _) => MatcherState::Released,
            (_, _, None) => MatcherState::Ready,
            (_, _, Some(ERROR_PARTIAL)) => MatcherState::Partial,
            (_, _, Some(ERROR_NOMATCH)) => MatcherState::NoMatch,
            (_, _, Some(status)) if status >= 0 => MatcherState::Matched,
            _ => MatcherState::Failed,
        }
    }

    /// Raw offset slots of the last result
    pub fn ovector(&self) -> &[usize] {
        self.scratch("ovector").as_slice()
    }

    /// The bound pattern
    pub fn regex(&self) -> Option<&Regex<E>> {
        self.regex.as_ref()
    }

    /// Copy of the most recent subject
    pub fn subject(&self) -> &[u8] {
        &self.subject
    }

    /// Release the scratch. Calling it again, or on an unbound matcher, does
    /// nothing; executing or querying afterwards panics until the next
    /// [`Matcher::init`].
    pub fn free(&mut self) {
        if self.scratch.take().is_some() {
            log::trace!("released match scratch");
        }
    }

    /// Read-only view of the last result
    pub fn captures(&self) -> CaptureView<'_, E> {
        self.scratch("captures");
        CaptureView::new(self)
    }

    pub(crate) fn scratch(&self, op: &str) -> &MatchData {
        match (&self.regex, &self.scratch) {
            (None, _) => panic!("Matcher::{op} called on an unbound matcher"),
            (Some(_), None) => panic!("Matcher::{op} called after free"),
            (Some(_), Some(scratch)) => scratch,
        }
    }

    pub(crate) fn bound_regex(&self, op: &str) -> &Regex<E> {
        match &self.regex {
            Some(regex) => regex,
            None => panic!("Matcher::{op} called on an unbound matcher"),
        }
    }

    pub fn present(&self, group: usize) -> bool {
        self.captures().present(group)
    }

    pub fn group(&self, group: usize) -> Option<&[u8]> {
        self.captures().group(group)
    }

    pub fn group_str(&self, group: usize) -> Option<Cow<'_, str>> {
        self.captures().group_str(group)
    }

    pub fn group_indices(&self, group: usize) -> Option<(usize, usize)> {
        self.captures().group_indices(group)
    }

    /// Byte range of the whole match
    pub fn index(&self) -> Option<(usize, usize)> {
        self.captures().index()
    }

    pub fn extract(&self) -> Option<Vec<Option<&[u8]>>> {
        self.captures().extract()
    }

    pub fn extract_str(&self) -> Option<Vec<Option<Cow<'_, str>>>> {
        self.captures().extract_str()
    }

    pub fn name_to_index(&self, name: &str) -> Result<usize> {
        self.captures().name_to_index(name)
    }

    pub fn named(&self, name: &str) -> Result<Option<&[u8]>> {
        self.captures().named(name)
    }

    pub fn named_str(&self, name: &str) -> Result<Option<Cow<'_, str>>> {
        self.captures().named_str(name)
    }

    pub fn named_present(&self, name: &str) -> Result<bool> {
        self.captures().named_present(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::UNSET, flags::CompileFlags};

    fn regex(pattern: &str) -> Regex {
        Regex::compile(pattern, CompileFlags::default()).unwrap()
    }

    #[test]
    fn lifecycle_states() {
        let re = regex("a(b)?");
        let mut m = Matcher::new();
        assert_eq!(m.state(), MatcherState::Unbound);

        m.init(&re);
        assert_eq!(m.state(), MatcherState::Ready);
        assert_eq!(m.status(), None);

        assert!(m.match_str("xab", MatchFlags::empty()));
        assert_eq!(m.state(), MatcherState::Matched);

        assert!(!m.match_str("xyz", MatchFlags::empty()));
        assert_eq!(m.state(), MatcherState::NoMatch);

        m.free();
        assert_eq!(m.state(), MatcherState::Released);
        m.free();

        m.init(&re);
        assert_eq!(m.state(), MatcherState::Ready);
    }

    #[test]
    fn non_match_clears_scratch() {
        let re = regex("(a)");
        let mut m = re.matcher_str("a", MatchFlags::empty());
        assert_eq!(m.ovector(), &[0, 1, 0, 1]);

        assert!(!m.match_str("b", MatchFlags::empty()));
        assert!(m.ovector().iter().all(|&slot| slot == UNSET));
        assert!(!m.present(0));
    }

    #[test]
    fn rebinding_keeps_scratch_for_equal_group_counts() {
        let first = regex("(a)(b)");
        let second = regex("(x)|(y)");
        let third = regex("(z)");

        let mut m = first.new_matcher();
        let before = m.ovector().as_ptr();
        m.init(&second);
        assert_eq!(m.ovector().as_ptr(), before);

        m.init(&third);
        assert_eq!(m.ovector().len(), 4);
    }

    #[test]
    fn exec_at_sees_preceding_context() {
        let re = regex("^b");
        let mut m = re.new_matcher();
        assert_eq!(m.exec_str_at("ab", 1, MatchFlags::empty()), ERROR_NOMATCH);
        assert_eq!(m.exec_str_at("a\nb", 2, MatchFlags::empty()), 1);
        assert_eq!(m.index(), Some((2, 3)));
    }

    #[test]
    fn errors_are_reported_separately_from_no_match() {
        let re = regex("a");
        let mut m = re.new_matcher();
        m.exec_bytes_at(b"abc", 9, MatchFlags::empty());
        assert!(m.has_error());
        assert_eq!(m.state(), MatcherState::Failed);
        let err = m.error().unwrap();
        assert_eq!(err.code, engine::ERROR_BADOFFSET);
        assert_eq!(err.message, "bad offset value");

        m.match_str("zzz", MatchFlags::empty());
        assert!(!m.has_error());
        assert_eq!(m.error(), None);
    }

    #[test]
    #[should_panic(expected = "unbound")]
    fn exec_on_unbound_matcher_panics() {
        let mut m: Matcher = Matcher::new();
        m.match_str("a", MatchFlags::empty());
    }

    #[test]
    #[should_panic(expected = "after free")]
    fn query_after_free_panics() {
        let mut m = regex("a").matcher_str("a", MatchFlags::empty());
        m.free();
        m.group(0);
    }
}
