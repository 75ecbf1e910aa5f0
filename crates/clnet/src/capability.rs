//! Extension sets and API version parsing for platforms and devices.

use std::collections::HashSet;
use std::fmt;

/// Extension names reported by a platform or device, split once at wrap
/// time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    extensions: HashSet<String>,
}

impl CapabilitySet {
    /// Split a raw extensions string on spaces, dropping empty tokens.
    pub fn parse(raw: &str) -> Self {
        Self {
            extensions: raw.split(' ').filter(|t| !t.is_empty()).map(str::to_owned).collect(),
        }
    }

    /// Exact, case-sensitive membership.
    pub fn has(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }

    /// True when every name is present; true for an empty list.
    pub fn has_all<I, S>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().all(|n| self.has(n.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    /// Extension names in lexical order.
    pub fn sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.iter().collect();
        names.sort_unstable();
        names
    }
}

/// `major.minor` parsed from an `"OpenCL <major>.<minor> <vendor info>"`
/// version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    pub const DEFAULT: Self = Self { major: 1, minor: 0 };

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse a platform or device version string. Anything not shaped like
    /// `OpenCL M.m ...` yields 1.0.
    pub fn parse(version: &str) -> Self {
        Self::try_parse(version).unwrap_or(Self::DEFAULT)
    }

    fn try_parse(version: &str) -> Option<Self> {
        let mut tokens = version.split_whitespace();
        if tokens.next()? != "OpenCL" {
            return None;
        }
        let (major, minor) = tokens.next()?.split_once('.')?;
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(major) || !digits(minor) {
            return None;
        }
        Some(Self { major: major.parse().ok()?, minor: minor.parse().ok()? })
    }

    /// Whether this version is at least `major.minor`.
    pub fn at_least(self, major: u32, minor: u32) -> bool {
        self >= Self::new(major, minor)
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn consecutive_spaces_yield_no_empty_tokens() {
        let caps = CapabilitySet::parse("  cl_khr_fp64   cl_khr_icd ");
        assert_eq!(caps.len(), 2);
        assert!(caps.has("cl_khr_fp64"));
        assert!(!caps.has(""));
    }

    #[test]
    fn membership_is_case_sensitive() {
        let caps = CapabilitySet::parse("cl_khr_fp64");
        assert!(!caps.has("CL_KHR_FP64"));
    }

    #[test]
    fn has_all_of_nothing_is_true() {
        assert!(CapabilitySet::default().has_all(Vec::<&str>::new()));
        let caps = CapabilitySet::parse("a b");
        assert!(caps.has_all(["a", "b"]));
        assert!(!caps.has_all(["a", "c"]));
    }

    #[test]
    fn version_strings() {
        assert_eq!(ApiVersion::parse("OpenCL 2.1 Mesa"), ApiVersion::new(2, 1));
        assert_eq!(ApiVersion::parse("OpenCL 1.2 CUDA 12.4.131"), ApiVersion::new(1, 2));
        assert_eq!(ApiVersion::parse("FooBar 9"), ApiVersion::DEFAULT);
        assert_eq!(ApiVersion::parse("OpenCL 3"), ApiVersion::DEFAULT);
        assert_eq!(ApiVersion::parse("OpenCL x.y"), ApiVersion::DEFAULT);
        assert_eq!(ApiVersion::parse(""), ApiVersion::DEFAULT);
        assert!(ApiVersion::new(2, 0).at_least(1, 2));
        assert_eq!(ApiVersion::new(3, 0).to_string(), "3.0");
    }

    proptest! {
        #[test]
        fn absent_tokens_are_never_members(
            tokens in proptest::collection::vec("[a-z_]{1,12}", 0..8),
            absent in "[A-Z]{1,8}",
        ) {
            let caps = CapabilitySet::parse(&tokens.join("  "));
            prop_assert!(!caps.has(&absent));
            prop_assert!(caps.has_all(&tokens));
            prop_assert!(caps.iter().all(|t| !t.is_empty()));
        }

        #[test]
        fn well_formed_versions_parse(major in 0u32..100, minor in 0u32..100, tail in "[ a-zA-Z0-9.]{0,16}") {
            let v = ApiVersion::parse(&format!("OpenCL {major}.{minor} {tail}"));
            prop_assert_eq!(v, ApiVersion::new(major, minor));
        }
    }
}
