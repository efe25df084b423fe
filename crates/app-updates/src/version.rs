use std::cmp::Ordering;
use std::fmt;

/// `major.minor.patch` with an optional pre-release tag. A pre-release
/// sorts before the release it precedes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AppVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl AppVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
        }
    }

    /// The "unknown" version every failed lookup resolves to.
    pub const fn sentinel() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
    }

    /// Lenient parse of vendor and bundle version strings.
    ///
    /// Accepts a leading `v`, one or two missing components, a trailing
    /// build component (`120.0.6099.109` keeps `120.0.6099`), a build
    /// suffix after a space (`5.16.10 (26186)`), and `alpha`/`beta` glued to
    /// the number (`1.0.0alpha`, `3.0.0.beta`). Anything else yields the
    /// sentinel.
    pub fn normalize(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(Self::sentinel)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let token = raw.split_whitespace().next()?;
        let token = token
            .strip_prefix('v')
            .or_else(|| token.strip_prefix('V'))
            .unwrap_or(token);

        let (numeric, pre) = split_pre_release(token);
        let mut parts = numeric.split('.').filter(|part| !part.is_empty());

        let major = parts.next()?.parse::<u64>().ok()?;
        let minor = match parts.next() {
            Some(part) => part.parse::<u64>().ok()?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(part) => part.parse::<u64>().ok()?,
            None => 0,
        };
        // A fourth numeric component is a build number and does not order.
        if let Some(build) = parts.next() {
            build.parse::<u64>().ok()?;
        }
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            major,
            minor,
            patch,
            pre,
        })
    }
}

fn split_pre_release(token: &str) -> (&str, Option<String>) {
    if let Some((numeric, pre)) = token.split_once('-') {
        let pre = pre.trim_start_matches('.');
        return (numeric, (!pre.is_empty()).then(|| pre.to_string()));
    }
    for marker in ["alpha", "beta", "rc"] {
        if let Some(idx) = token.find(marker) {
            let numeric = token[..idx].trim_end_matches('.');
            return (numeric, Some(token[idx..].to_string()));
        }
    }
    (token, None)
}

impl Ord for AppVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for AppVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}
