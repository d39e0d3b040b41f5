//! Compiled patterns shared between matchers

use std::{fmt, sync::Arc};

use once_cell::sync::OnceCell;

use crate::{
    backtrack::Backtrack,
    engine::PatternEngine,
    error::{CompileError, Error, JitError, Result},
    flags::{CompileFlags, JitFlags, MatchFlags},
    matcher::Matcher,
};

/// State shared by every handle to one compiled pattern
struct Inner<E: PatternEngine> {
    pattern: String,
    flags: CompileFlags,
    engine: E,
    code: E::Code,
    jit: OnceCell<E::Jit>,
    groups: usize,
    names: Vec<(String, usize)>,
    size: usize,
}

impl<E: PatternEngine> Drop for Inner<E> {
    fn drop(&mut self) {
        log::trace!("releasing compiled pattern {:?}", self.pattern);
    }
}

/// A compiled regular expression
///
/// Compiled once, then matched any number of times. Cloning is cheap: every
/// clone and every [`Matcher`] bound to the pattern share one compiled form,
/// which is released when the last of them goes away.
pub struct Regex<E: PatternEngine = Backtrack> {
    inner: Arc<Inner<E>>,
}

impl<E: PatternEngine> Clone for Regex<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: PatternEngine> fmt::Debug for Regex<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Regex")
            .field("pattern", &self.inner.pattern)
            .field("flags", &self.inner.flags)
            .field("groups", &self.inner.groups)
            .field("jit", &self.is_jit())
            .finish()
    }
}

impl Regex {
    /// Compile a pattern with the bundled engine
    pub fn compile(pattern: &str, flags: CompileFlags) -> std::result::Result<Self, CompileError> {
        Self::compile_with(Backtrack::default(), pattern, flags)
    }

    /// Compile a pattern, then try to accelerate it.
    ///
    /// Acceleration failure does not fail the call: the pattern comes back
    /// together with the [`JitError`] so the caller can decide.
    pub fn compile_jit(
        pattern: &str,
        flags: CompileFlags,
        jit_flags: JitFlags,
    ) -> std::result::Result<(Self, Option<JitError>), CompileError> {
        let regex = Self::compile(pattern, flags)?;
        let jit_error = regex.jit_compile(jit_flags).err();
        Ok((regex, jit_error))
    }

    /// Like [`Regex::compile`] but panics on failure
    pub fn must_compile(pattern: &str, flags: CompileFlags) -> Self {
        Self::compile(pattern, flags)
            .unwrap_or_else(|err| panic!("Regex::must_compile({pattern:?}): {err}"))
    }

    /// Like [`Regex::compile_jit`] but panics if either step fails
    pub fn must_compile_jit(pattern: &str, flags: CompileFlags, jit_flags: JitFlags) -> Self {
        match Self::compile_jit(pattern, flags, jit_flags) {
            Ok((regex, None)) => regex,
            Ok((_, Some(err))) => panic!("Regex::must_compile_jit({pattern:?}): {err}"),
            Err(err) => panic!("Regex::must_compile_jit({pattern:?}): {err}"),
        }
    }
}

impl<E: PatternEngine> Regex<E> {
    /// Compile a pattern with an explicit engine value
    pub fn compile_with(
        engine: E,
        pattern: &str,
        flags: CompileFlags,
    ) -> std::result::Result<Self, CompileError> {
        if let Some(offset) = pattern.find('\0') {
            return Err(CompileError {
                pattern: pattern.to_string(),
                message: "NUL byte in pattern".to_string(),
                offset,
                code: 0,
            });
        }

        let code = engine.compile(pattern, flags).map_err(|err| {
            let message = engine.error_message(err.code).into_owned();
            log::debug!("compiling {pattern:?} failed at offset {}: {message}", err.offset);
            CompileError {
                pattern: pattern.to_string(),
                message,
                offset: err.offset,
                code: err.code,
            }
        })?;

        let groups = engine.capture_count(&code);
        let names = engine.name_table(&code);
        let size = engine.compiled_size(&code);
        log::trace!("compiled {pattern:?}: {groups} groups, {size} bytes");

        Ok(Self {
            inner: Arc::new(Inner {
                pattern: pattern.to_string(),
                flags,
                engine,
                code,
                jit: OnceCell::new(),
                groups,
                names,
                size,
            }),
        })
    }

    /// Build the accelerated form; a no-op once it exists
    pub fn jit_compile(&self, flags: JitFlags) -> std::result::Result<(), JitError> {
        let inner = &*self.inner;
        inner
            .jit
            .get_or_try_init(|| inner.engine.jit_compile(&inner.code, flags))
            .map(|_| ())
            .map_err(|code| {
                let message = inner.engine.error_message(code).into_owned();
                log::debug!("JIT for {:?} failed: {message}", inner.pattern);
                JitError { code, message }
            })
    }

    /// Give up this handle. The compiled form is released once no other
    /// handle or matcher holds it.
    pub fn free(self) {
        drop(self);
    }

    /// The pattern text this was compiled from
    pub fn pattern(&self) -> &str {
        &self.inner.pattern
    }

    pub fn flags(&self) -> CompileFlags {
        self.inner.flags
    }

    /// Number of capture groups, not counting the whole match
    pub fn groups(&self) -> usize {
        self.inner.groups
    }

    /// Named groups in ascending group order
    pub fn names(&self) -> &[(String, usize)] {
        &self.inner.names
    }

    /// Size of the compiled form in bytes
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Whether an accelerated form has been built
    pub fn is_jit(&self) -> bool {
        self.inner.jit.get().is_some()
    }

    pub fn engine(&self) -> &E {
        &self.inner.engine
    }

    /// Group number for `name`
    pub fn name_to_index(&self, name: &str) -> Result<usize> {
        let index = self
            .inner
            .engine
            .substring_number_from_name(&self.inner.code, name);
        usize::try_from(index).map_err(|_| Error::UnknownGroupName(name.to_string()))
    }

    /// A matcher bound to this pattern, with no result yet
    pub fn new_matcher(&self) -> Matcher<E> {
        let mut matcher = Matcher::new();
        matcher.init(self);
        matcher
    }

    /// A matcher bound to this pattern that has already matched `subject`
    pub fn matcher(&self, subject: &[u8], flags: MatchFlags) -> Matcher<E> {
        let mut matcher = self.new_matcher();
        matcher.match_bytes(subject, flags);
        matcher
    }

    /// Text variant of [`Regex::matcher`]
    pub fn matcher_str(&self, subject: &str, flags: MatchFlags) -> Matcher<E> {
        self.matcher(subject.as_bytes(), flags)
    }

    /// Whether two handles share one compiled form
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run the engine once over `subject`
    pub(crate) fn execute(
        &self,
        subject: &[u8],
        start_offset: usize,
        flags: MatchFlags,
        ovector: &mut [usize],
    ) -> i32 {
        let inner = &*self.inner;
        inner.engine.execute(
            &inner.code,
            inner.jit.get(),
            subject,
            start_offset,
            flags,
            ovector,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_caches_metadata() {
        let re = Regex::compile("(?<word>\\w+) (\\d+)", CompileFlags::default()).unwrap();
        assert_eq!(re.pattern(), "(?<word>\\w+) (\\d+)");
        assert_eq!(re.groups(), 2);
        assert_eq!(re.names(), &[("word".to_string(), 1)]);
        assert!(re.size() > 0);
        assert!(!re.is_jit());
    }

    #[test]
    fn nul_byte_is_rejected_before_the_engine() {
        let err = Regex::compile("ab\0c", CompileFlags::default()).unwrap_err();
        assert_eq!(err.offset, 2);
        assert_eq!(err.message, "NUL byte in pattern");
        assert_eq!(err.pattern, "ab\0c");
    }

    #[test]
    fn jit_is_idempotent() {
        let re = Regex::compile("abc", CompileFlags::default()).unwrap();
        re.jit_compile(JitFlags::COMPLETE).unwrap();
        assert!(re.is_jit());
        // Already built, so even a bad option set succeeds
        re.jit_compile(JitFlags::empty()).unwrap();
    }

    #[test]
    fn jit_failure_keeps_pattern_usable() {
        let (re, err) =
            Regex::compile_jit("abc", CompileFlags::default(), JitFlags::empty()).unwrap();
        assert!(err.is_some());
        assert!(!re.is_jit());
        assert!(re.matcher_str("xabc", MatchFlags::empty()).matches());
    }

    #[test]
    fn clones_share_the_compiled_form() {
        let re = Regex::compile("a", CompileFlags::default()).unwrap();
        let other = re.clone();
        assert!(re.ptr_eq(&other));
        re.free();
        assert_eq!(other.groups(), 0);
    }

    #[test]
    fn name_lookup() {
        let re = Regex::compile("(a)(?P<b>b)", CompileFlags::default()).unwrap();
        assert_eq!(re.name_to_index("b").unwrap(), 2);
        assert_eq!(
            re.name_to_index("zzz"),
            Err(Error::UnknownGroupName("zzz".to_string()))
        );
    }

    #[test]
    #[should_panic(expected = "Regex::must_compile")]
    fn must_compile_panics() {
        Regex::must_compile("a(", CompileFlags::default());
    }
}
