//! Line diff in ndiff notation
//!
//! `"  "` marks a shared line, `"- "` a line only in the current text and
//! `"+ "` a line only in the older text. Intraline `"? "` hints are not
//! produced.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffTag {
    Equal,
    /// Only in the current text
    Removed,
    /// Only in the older text
    Added,
}

impl DiffTag {
    #[inline]
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Equal => "  ",
            Self::Removed => "- ",
            Self::Added => "+ ",
        }
    }
}

/// One line of a diff, line ending included
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub tag: DiffTag,
    pub text: String,
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tag.prefix(), self.text)
    }
}

/// Line diff of `current` against `old`
#[must_use]
pub fn line_diff(current: &str, old: &str) -> Vec<DiffLine> {
    TextDiff::from_lines(current, old)
        .iter_all_changes()
        .map(|change| DiffLine {
            tag: match change.tag() {
                ChangeTag::Equal => DiffTag::Equal,
                ChangeTag::Delete => DiffTag::Removed,
                ChangeTag::Insert => DiffTag::Added,
            },
            text: change.value().to_string(),
        })
        .collect()
}

/// Concatenate prefixed lines
#[must_use]
pub fn render_ndiff(lines: &[DiffLine]) -> String {
    lines.iter().map(ToString::to_string).collect()
}
