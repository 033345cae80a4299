use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cause::Cause;
use crate::error::TargetError;
use crate::notification::Notification;

/// Configuration shape of a single target: the repository URI and the raw
/// comma-separated branch pattern string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub uri: String,
    #[serde(default)]
    pub branches: String,
}

/// Immutable (repository URI, branch pattern) rule.
///
/// The URI is compared verbatim against notifications. The branch pattern is
/// a comma-separated list; each entry is either a literal branch name or a
/// glob where `*` matches any run of characters. A blank pattern matches any
/// notification for the URI, including one that names no branches.
#[derive(Debug, Clone)]
pub struct MatchTarget {
    uri: String,
    branches: String,
    matchers: Vec<BranchMatcher>,
}

impl MatchTarget {
    pub fn new(uri: impl AsRef<str>, branches: impl AsRef<str>) -> Self {
        let uri = uri.as_ref().trim().to_string();
        let branches = branches.as_ref().trim().to_string();
        let matchers = branches
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(BranchMatcher::compile)
            .collect();
        Self {
            uri,
            branches,
            matchers,
        }
    }

    pub fn from_spec(spec: &TargetSpec) -> Self {
        Self::new(&spec.uri, &spec.branches)
    }

    pub fn to_spec(&self) -> TargetSpec {
        TargetSpec {
            uri: self.uri.clone(),
            branches: self.branches.clone(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The branch pattern string as configured (trimmed).
    pub fn branches(&self) -> &str {
        &self.branches
    }

    /// Test a notification against this target.
    ///
    /// Configured patterns are tried in order; for each one, every notified
    /// branch is tried in notification order. The first pair that matches
    /// names the branch in the returned cause.
    pub fn matches(&self, notification: &Notification) -> Option<Cause> {
        if self.uri != notification.uri {
            return None;
        }
        if self.branches.is_empty() {
            return Some(Cause::new(notification.uri.as_str(), ""));
        }
        for matcher in &self.matchers {
            for branch in &notification.branches {
                if matcher.is_match(branch) {
                    return Some(Cause::new(notification.uri.as_str(), branch.as_str()));
                }
            }
        }
        None
    }
}

/// Reject targets the configuration layer must not persist.
pub fn validate_uri(uri: &str) -> Result<(), TargetError> {
    if uri.trim().is_empty() {
        return Err(TargetError::BlankUri);
    }
    Ok(())
}

/// Match a single configured branch pattern against a branch name.
///
/// Without `*` this is exact string equality. With `*`, the literal pieces
/// between wildcards must appear verbatim and the whole branch name must be
/// covered.
pub fn branch_match(pattern: &str, branch: &str) -> bool {
    BranchMatcher::compile(pattern).is_match(branch)
}

#[derive(Debug, Clone)]
enum BranchMatcher {
    Exact(String),
    /// `None` when the pattern could not be compiled; matches nothing.
    Wildcard(Option<Regex>),
}

impl BranchMatcher {
    fn compile(pattern: &str) -> Self {
        if !pattern.contains('*') {
            return Self::Exact(pattern.to_string());
        }
        match wildcard_regex(pattern) {
            Ok(re) => Self::Wildcard(Some(re)),
            Err(e) => {
                tracing::warn!(
                    pattern,
                    error = %e,
                    "Branch pattern could not be compiled and will match nothing"
                );
                Self::Wildcard(None)
            },
        }
    }

    fn is_match(&self, branch: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == branch,
            Self::Wildcard(Some(re)) => re.is_match(branch),
            Self::Wildcard(None) => false,
        }
    }
}

/// Quote every literal segment and join them with an any-sequence operator,
/// anchored at both ends.
fn wildcard_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!(r"\A(?s:{body})\z"))
}
