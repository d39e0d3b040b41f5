//! Read-only access to the groups of a matcher's last result

use std::borrow::Cow;

use crate::{
    backtrack::Backtrack,
    engine::PatternEngine,
    error::Result,
    match_data::MatchData,
    matcher::Matcher,
    regex::Regex,
};

/// Capture groups of the last match, as byte ranges of the retained subject
///
/// Out-of-range group numbers are reported absent, like groups that did not
/// participate.
pub struct CaptureView<'m, E: PatternEngine = Backtrack> {
    matcher: &'m Matcher<E>,
}

impl<E: PatternEngine> Clone for CaptureView<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: PatternEngine> Copy for CaptureView<'_, E> {}

impl<'m, E: PatternEngine> CaptureView<'m, E> {
    pub(crate) fn new(matcher: &'m Matcher<E>) -> Self {
        Self { matcher }
    }

    fn data(&self) -> &'m MatchData {
        self.matcher.scratch("captures")
    }

    fn regex(&self) -> &'m Regex<E> {
        self.matcher.bound_regex("captures")
    }

    /// Whether group `group` took part in the match
    pub fn present(&self, group: usize) -> bool {
        self.data().pair(group).is_some()
    }

    /// Bytes of group `group`
    pub fn group(&self, group: usize) -> Option<&'m [u8]> {
        let (start, end) = self.data().pair(group)?;
        self.matcher.subject().get(start..end)
    }

    /// Text of group `group`, lossy only when the range splits a character
    pub fn group_str(&self, group: usize) -> Option<Cow<'m, str>> {
        self.group(group).map(String::from_utf8_lossy)
    }

    /// Byte range of group `group`
    pub fn group_indices(&self, group: usize) -> Option<(usize, usize)> {
        self.data().pair(group)
    }

    /// Byte range of the whole match
    pub fn index(&self) -> Option<(usize, usize)> {
        self.group_indices(0)
    }

    /// Every group in order, starting with the whole match; `None` when the
    /// last execution did not match.
    pub fn extract(&self) -> Option<Vec<Option<&'m [u8]>>> {
        if !self.matcher.matches() {
            return None;
        }
        Some((0..=self.data().groups()).map(|g| self.group(g)).collect())
    }

    /// Text variant of [`CaptureView::extract`]
    pub fn extract_str(&self) -> Option<Vec<Option<Cow<'m, str>>>> {
        if !self.matcher.matches() {
            return None;
        }
        Some((0..=self.data().groups()).map(|g| self.group_str(g)).collect())
    }

    pub fn name_to_index(&self, name: &str) -> Result<usize> {
        self.regex().name_to_index(name)
    }

    /// Group that answers for `name`: the first participating group of that
    /// name, or the first group of that name when none participated.
    fn resolve(&self, name: &str) -> Result<usize> {
        let first = self.name_to_index(name)?;
        let participating = self
            .regex()
            .names()
            .iter()
            .filter(|(candidate, _)| candidate == name)
            .map(|&(_, group)| group)
            .find(|&group| self.present(group));
        Ok(participating.unwrap_or(first))
    }

    pub fn named(&self, name: &str) -> Result<Option<&'m [u8]>> {
        Ok(self.group(self.resolve(name)?))
    }

    pub fn named_str(&self, name: &str) -> Result<Option<Cow<'m, str>>> {
        Ok(self.group_str(self.resolve(name)?))
    }

    pub fn named_present(&self, name: &str) -> Result<bool> {
        Ok(self.present(self.resolve(name)?))
    }
}

#[cfg(test)]
mod tests {
    use crate::{error::Error, CompileFlags, MatchFlags, Regex};

    #[test]
    fn groups_and_absence() {
        let re = Regex::compile("(a)|(b)", CompileFlags::default()).unwrap();
        let m = re.matcher_str("xb", MatchFlags::empty());
        let view = m.captures();

        assert!(view.present(0));
        assert!(!view.present(1));
        assert!(view.present(2));
        assert!(!view.present(17));
        assert_eq!(view.group(2), Some(&b"b"[..]));
        assert_eq!(view.group(1), None);
        assert_eq!(view.group_indices(2), Some((1, 2)));
        assert_eq!(view.index(), Some((1, 2)));
    }

    #[test]
    fn extract_keeps_absent_groups() {
        let re = Regex::compile("(\\d+)(x)?-(\\d+)", CompileFlags::default()).unwrap();
        let m = re.matcher_str("id 12-7", MatchFlags::empty());
        let groups = m.extract_str().unwrap();
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0].as_deref(), Some("12-7"));
        assert_eq!(groups[1].as_deref(), Some("12"));
        assert_eq!(groups[2], None);
        assert_eq!(groups[3].as_deref(), Some("7"));

        let m = re.matcher_str("none", MatchFlags::empty());
        assert_eq!(m.extract(), None);
    }

    #[test]
    fn duplicate_names_prefer_the_participating_group() {
        let flags = CompileFlags::default() | CompileFlags::DUPNAMES;
        let re = Regex::compile("(?<n>a)|(?<n>b)", flags).unwrap();

        let m = re.matcher_str("b", MatchFlags::empty());
        assert_eq!(m.named_str("n").unwrap().as_deref(), Some("b"));
        assert_eq!(m.name_to_index("n").unwrap(), 1);

        let m = re.matcher_str("a", MatchFlags::empty());
        assert_eq!(m.named("n").unwrap(), Some(&b"a"[..]));
    }

    #[test]
    fn unknown_names_are_errors() {
        let re = Regex::compile("(?<year>\\d+)", CompileFlags::default()).unwrap();
        let m = re.matcher_str("1999", MatchFlags::empty());
        assert_eq!(m.named_present("year"), Ok(true));
        assert_eq!(
            m.named_present("month"),
            Err(Error::UnknownGroupName("month".to_string()))
        );
    }

    #[test]
    fn lossy_text_for_split_characters() {
        let re = Regex::compile("(.)", CompileFlags::default()).unwrap();
        let m = re.matcher_str("é", MatchFlags::empty());
        assert_eq!(m.group(1), Some(&[0xC3][..]));
        assert_eq!(m.group_str(1).as_deref(), Some("\u{FFFD}"));
    }
}
