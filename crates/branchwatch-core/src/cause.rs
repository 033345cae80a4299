use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a watcher's owner was triggered: the repository and branch of the
/// push notification that matched one of its targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cause {
    pub uri: String,
    /// Matched branch. Empty when the target had no branch pattern.
    pub branch: String,
}

impl Cause {
    pub fn new(uri: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            branch: branch.into(),
        }
    }

    /// Branch for human consumption, `(none)` when blank.
    pub fn branch_for_display(&self) -> &str {
        if self.branch.trim().is_empty() {
            "(none)"
        } else {
            &self.branch
        }
    }

    pub fn short_description(&self) -> String {
        format!(
            "Triggered by push notification for {} (branch: {})",
            self.uri,
            self.branch_for_display()
        )
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_description())
    }
}
