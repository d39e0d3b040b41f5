//! Search and substitution built from single match attempts

use crate::{
    engine::PatternEngine,
    error::MatchError,
    flags::MatchFlags,
    matcher::Matcher,
    regex::Regex,
};

type OpResult<T> = std::result::Result<T, MatchError>;

/// Byte width of the unit starting at `pos`
fn unit_width(subject: &[u8], pos: usize, utf: bool) -> usize {
    match subject.get(pos) {
        Some(&lead) if utf => match lead {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        },
        _ => 1,
    }
}

fn check<E: PatternEngine>(matcher: &Matcher<E>) -> OpResult<()> {
    match matcher.error() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

impl<E: PatternEngine> Regex<E> {
    /// Whether the pattern matches anywhere in `subject`
    pub fn is_match(&self, subject: &[u8], flags: MatchFlags) -> OpResult<bool> {
        let matcher = self.matcher(subject, flags);
        check(&matcher)?;
        Ok(matcher.matches())
    }

    /// Byte range of the first match
    pub fn find_index(
        &self,
        subject: &[u8],
        flags: MatchFlags,
    ) -> OpResult<Option<(usize, usize)>> {
        let matcher = self.matcher(subject, flags);
        check(&matcher)?;
        Ok(if matcher.matches() {
            matcher.index()
        } else {
            None
        })
    }

    /// Text variant of [`Regex::find_index`]
    pub fn find_index_str(
        &self,
        subject: &str,
        flags: MatchFlags,
    ) -> OpResult<Option<(usize, usize)>> {
        self.find_index(subject.as_bytes(), flags)
    }

    /// Replace every match with `replacement`, taken literally.
    ///
    /// After an empty match the search retries at the same position with
    /// `NOTEMPTY_ATSTART | ANCHORED`; when that fails, one unit is kept and
    /// the search moves past it. A partial match ends the search.
    pub fn replace_all(
        &self,
        subject: &[u8],
        replacement: &[u8],
        flags: MatchFlags,
    ) -> OpResult<Vec<u8>> {
        let utf = self.flags().utf();
        let mut matcher = self.new_matcher();
        let mut out = Vec::with_capacity(subject.len());
        let mut copied = 0;
        let mut pos = 0;
        let mut retry = MatchFlags::empty();

        matcher.exec_bytes(subject, flags);
        loop {
            check(&matcher)?;

            if matcher.partial() {
                break;
            }
            let found = if matcher.matches() { matcher.index() } else { None };
            let Some((start, end)) = found else {
                if retry.is_empty() || pos >= subject.len() {
                    break;
                }
                pos += unit_width(subject, pos, utf);
                retry = MatchFlags::empty();
                matcher.exec_retained_at(pos, flags);
                continue;
            };

            out.extend_from_slice(&subject[copied..start]);
            out.extend_from_slice(replacement);
            copied = end;
            pos = end;
            retry = if start == end {
                MatchFlags::NOTEMPTY_ATSTART | MatchFlags::ANCHORED
            } else {
                MatchFlags::empty()
            };
            matcher.exec_retained_at(pos, flags | retry);
        }

        out.extend_from_slice(&subject[copied..]);
        Ok(out)
    }

    /// Text variant of [`Regex::replace_all`].
    ///
    /// Without `UTF` a match may start or end inside a multi-byte
    /// character; the split character then comes back as U+FFFD. Use
    /// [`Regex::replace_all`] to get the exact bytes.
    pub fn replace_all_str(
        &self,
        subject: &str,
        replacement: &str,
        flags: MatchFlags,
    ) -> OpResult<String> {
        let out = self.replace_all(subject.as_bytes(), replacement.as_bytes(), flags)?;
        Ok(String::from_utf8(out)
            .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::CompileFlags;

    fn regex(pattern: &str) -> Regex {
        Regex::compile(pattern, CompileFlags::default()).unwrap()
    }

    fn replace(pattern: &str, subject: &str, replacement: &str) -> String {
        regex(pattern)
            .replace_all_str(subject, replacement, MatchFlags::empty())
            .unwrap()
    }

    #[test]
    fn find_index_reports_the_whole_match() {
        let re = regex("b+");
        assert_eq!(re.find_index_str("abbc", MatchFlags::empty()), Ok(Some((1, 3))));
        assert_eq!(re.find_index_str("ac", MatchFlags::empty()), Ok(None));
        assert_eq!(re.is_match(b"xb", MatchFlags::empty()), Ok(true));
    }

    #[test]
    fn replaces_every_match() {
        assert_eq!(replace("o", "foo boo", "0"), "f00 b00");
        assert_eq!(replace("[0-9]+", "a1b22c333", "#"), "a#b#c#");
        assert_eq!(replace("z", "abc", "#"), "abc");
    }

    #[test]
    fn empty_matches_advance_one_unit() {
        assert_eq!(replace("x*", "abc", "#"), "#a#b#c#");
        assert_eq!(replace("a*", "aaa", "#"), "##");
        assert_eq!(replace("a*", "baaac", "-"), "-b--c-");
        assert_eq!(replace("^$", "", "#"), "#");
    }

    #[test]
    fn anchors_see_the_whole_subject() {
        assert_eq!(replace("^a", "aaa", "b"), "baa");
        assert_eq!(replace("\\bx", "x xx x", "y"), "y yx y");
    }

    #[test]
    fn empty_matches_step_over_whole_characters() {
        let re = Regex::compile("x*", CompileFlags::default() | CompileFlags::UTF).unwrap();
        let out = re.replace_all_str("aé", "-", MatchFlags::empty()).unwrap();
        assert_eq!(out, "-a-é-");
    }

    #[test]
    fn split_characters_are_lossy_only_in_text_results() {
        let re = regex("^.");
        assert_eq!(re.replace_all_str("é", "x", MatchFlags::empty()).unwrap(), "x\u{FFFD}");
        assert_eq!(re.replace_all("é".as_bytes(), b"x", MatchFlags::empty()).unwrap(), b"x\xa9");
    }

    #[test]
    fn errors_surface() {
        let re = Regex::compile("a", CompileFlags::default() | CompileFlags::UTF).unwrap();
        let err = re.replace_all(b"\xff", b"", MatchFlags::empty()).unwrap_err();
        assert_eq!(err.code, crate::engine::ERROR_BADUTF8);
    }
}
