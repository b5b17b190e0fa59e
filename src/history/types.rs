use crate::backend::ContentSource;
use crate::constant::{CONTEXT_PRESETS, DEFAULT_CONTEXT_LINES};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffLineType {
    Added,
    Removed,
    Unchanged,
}

/// One line of an edit script. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub line_type: DiffLineType,
    pub content: String,
    /// Position in the old text; set for removed and unchanged lines
    pub left_line_number: Option<usize>,
    /// Position in the new text; set for added and unchanged lines
    pub right_line_number: Option<usize>,
}

impl DiffLine {
    pub fn is_change(&self) -> bool {
        self.line_type != DiffLineType::Unchanged
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl DiffSummary {
    pub fn from_lines(lines: &[DiffLine]) -> Self {
        let mut summary = Self::default();
        for line in lines {
            match line.line_type {
                DiffLineType::Added => summary.added += 1,
                DiffLineType::Removed => summary.removed += 1,
                DiffLineType::Unchanged => summary.unchanged += 1,
            }
        }
        summary
    }

    pub fn has_changes(&self) -> bool {
        self.added + self.removed > 0
    }
}

/// Edit script with its derived counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub lines: Vec<DiffLine>,
    pub summary: DiffSummary,
}

impl DiffResult {
    pub fn new(lines: Vec<DiffLine>) -> Self {
        let summary = DiffSummary::from_lines(&lines);
        Self { lines, summary }
    }

    pub fn is_identical(&self) -> bool {
        !self.summary.has_changes()
    }
}

/// Unit of the collapsed display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayUnit {
    Line(DiffLine),
    Collapsed { hidden_count: usize },
}

/// What a diff view should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffView {
    /// Both sides are the same; nothing to collapse
    Identical,
    Units(Vec<DisplayUnit>),
}

/// Side-by-side row: unchanged lines span both columns, change blocks are paired
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitRow {
    Unchanged(DiffLine),
    Pair(Vec<DiffLine>, Vec<DiffLine>),
}

/// Number of unchanged lines kept around each change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextLines(usize);

impl ContextLines {
    pub const fn new(lines: usize) -> Self {
        Self(lines)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    pub fn presets() -> impl Iterator<Item = ContextLines> {
        CONTEXT_PRESETS.into_iter().map(ContextLines)
    }

    /// Next larger preset, wrapping to the smallest
    pub fn next_preset(self) -> Self {
        Self::presets()
            .find(|preset| preset.0 > self.0)
            .unwrap_or(Self(CONTEXT_PRESETS[0]))
    }
}

impl Default for ContextLines {
    fn default() -> Self {
        Self(DEFAULT_CONTEXT_LINES)
    }
}

/// The two sides of a comparison, oldest on the left
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparePair {
    pub left: ContentSource,
    pub right: ContentSource,
}
