//! Rebuild-trigger decision combinator.

use serde::{Deserialize, Serialize};

/// The two verdicts feeding the rebuild decision.
///
/// Both fields are genuine booleans computed once per run. The decision must
/// never be made over stringified flags: a `"false"` string is truthy and
/// would collapse the combinator to "always build".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerInputs {
    /// Whether any build-relevant path changed in the commit range.
    pub sources_changed: bool,

    /// Whether a release tagged with the current reference already exists.
    pub release_exists: bool,
}

impl TriggerInputs {
    /// Whether the costly build must run.
    ///
    /// Rebuild whenever relevant sources changed, or whenever no artifact
    /// exists yet for this reference (first build, or a re-trigger with no
    /// prior release). Pure: same inputs always yield the same verdict.
    pub fn build_required(self) -> bool {
        self.sources_changed || !self.release_exists
    }
}
