use super::types::{DiffLine, DiffLineType, DiffResult, SplitRow};
use similar::{Algorithm, DiffTag, capture_diff_slices_deadline};
use std::time::{Duration, Instant};

/// Split text into lines. A single trailing terminator does not add an empty
/// line, and the empty string has no lines at all.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

/// Compute line-based diff between old and new text
pub fn compute_diff(old: &str, new: &str) -> DiffResult {
    compute_diff_with_deadline(old, new, None)
}

/// Like [`compute_diff`], but gives up on minimality once `timeout` elapses.
/// The script is still complete and valid when the deadline is hit.
pub fn compute_diff_with_deadline(old: &str, new: &str, timeout: Option<Duration>) -> DiffResult {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let deadline = timeout.map(|timeout| Instant::now() + timeout);

    let ops = capture_diff_slices_deadline(Algorithm::Myers, &old_lines, &new_lines, deadline);

    let mut script = ScriptBuilder::new(&old_lines, &new_lines);
    for op in &ops {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => {
                script.flush_changes();
                for (old_index, new_index) in old_range.zip(new_range) {
                    script.push_unchanged(old_index, new_index);
                }
            }
            DiffTag::Delete => script.pending_removed.extend(old_range),
            DiffTag::Insert => script.pending_added.extend(new_range),
            DiffTag::Replace => {
                script.pending_removed.extend(old_range);
                script.pending_added.extend(new_range);
            }
        }
    }
    script.flush_changes();

    DiffResult::new(script.lines)
}

/// Accumulates the edit script. Consecutive non-equal ops are buffered so that
/// every change block is emitted old side first.
struct ScriptBuilder<'a> {
    old_lines: &'a [&'a str],
    new_lines: &'a [&'a str],
    pending_removed: Vec<usize>,
    pending_added: Vec<usize>,
    lines: Vec<DiffLine>,
}

impl<'a> ScriptBuilder<'a> {
    fn new(old_lines: &'a [&'a str], new_lines: &'a [&'a str]) -> Self {
        Self {
            old_lines,
            new_lines,
            pending_removed: Vec::new(),
            pending_added: Vec::new(),
            lines: Vec::with_capacity(old_lines.len().max(new_lines.len())),
        }
    }

    fn push_unchanged(&mut self, old_index: usize, new_index: usize) {
        self.lines.push(DiffLine {
            line_type: DiffLineType::Unchanged,
            content: self.old_lines[old_index].to_string(),
            left_line_number: Some(old_index + 1),
            right_line_number: Some(new_index + 1),
        });
    }

    fn flush_changes(&mut self) {
        for old_index in self.pending_removed.drain(..) {
            self.lines.push(DiffLine {
                line_type: DiffLineType::Removed,
                content: self.old_lines[old_index].to_string(),
                left_line_number: Some(old_index + 1),
                right_line_number: None,
            });
        }
        for new_index in self.pending_added.drain(..) {
            self.lines.push(DiffLine {
                line_type: DiffLineType::Added,
                content: self.new_lines[new_index].to_string(),
                left_line_number: None,
                right_line_number: Some(new_index + 1),
            });
        }
    }
}

/// Group raw diff lines into rows where unchanged identical lines are single rows,
/// and contiguous removed/added blocks become paired rows.
pub fn group_into_rows(diff_lines: &[DiffLine]) -> Vec<SplitRow> {
    let mut rows = Vec::new();
    let mut i = 0usize;

    while i < diff_lines.len() {
        match diff_lines[i].line_type {
            DiffLineType::Unchanged => {
                rows.push(SplitRow::Unchanged(diff_lines[i].clone()));
                i += 1;
            }
            DiffLineType::Removed => {
                let start = i;
                while i < diff_lines.len() && diff_lines[i].line_type == DiffLineType::Removed {
                    i += 1;
                }
                let removed_block = diff_lines[start..i].to_vec();

                // collect following added block (if any)
                let added_start = i;
                while i < diff_lines.len() && diff_lines[i].line_type == DiffLineType::Added {
                    i += 1;
                }
                let added_block = diff_lines[added_start..i].to_vec();

                rows.push(SplitRow::Pair(removed_block, added_block));
            }
            DiffLineType::Added => {
                // added without preceding removal -> right-only
                let start = i;
                while i < diff_lines.len() && diff_lines[i].line_type == DiffLineType::Added {
                    i += 1;
                }
                rows.push(SplitRow::Pair(Vec::new(), diff_lines[start..i].to_vec()));
            }
        }
    }

    rows
}

/// Check if diff lines contain meaningful changes (non-empty added or removed content)
pub fn has_meaningful_changes(diff_lines: &[DiffLine]) -> bool {
    diff_lines
        .iter()
        .any(|line| line.is_change() && !line.content.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(lines: &[DiffLine], excluded: DiffLineType) -> Vec<&str> {
        lines
            .iter()
            .filter(|line| line.line_type != excluded)
            .map(|line| line.content.as_str())
            .collect()
    }

    fn assert_reconstructs(old: &str, new: &str) {
        let diff = compute_diff(old, new);
        assert_eq!(side(&diff.lines, DiffLineType::Added).join("\n"), old);
        assert_eq!(side(&diff.lines, DiffLineType::Removed).join("\n"), new);
    }

    #[test]
    fn replaced_line_is_removed_then_added() {
        let diff = compute_diff("a\nb\nc", "a\nx\nc");
        let expected = vec![
            DiffLine {
                line_type: DiffLineType::Unchanged,
                content: "a".into(),
                left_line_number: Some(1),
                right_line_number: Some(1),
            },
            DiffLine {
                line_type: DiffLineType::Removed,
                content: "b".into(),
                left_line_number: Some(2),
                right_line_number: None,
            },
            DiffLine {
                line_type: DiffLineType::Added,
                content: "x".into(),
                left_line_number: None,
                right_line_number: Some(2),
            },
            DiffLine {
                line_type: DiffLineType::Unchanged,
                content: "c".into(),
                left_line_number: Some(3),
                right_line_number: Some(3),
            },
        ];
        assert_eq!(diff.lines, expected);
        assert_eq!(diff.summary.added, 1);
        assert_eq!(diff.summary.removed, 1);
    }

    #[test]
    fn empty_old_text_has_no_lines() {
        let diff = compute_diff("", "hello");
        assert_eq!(diff.lines.len(), 1);
        assert_eq!(diff.lines[0].line_type, DiffLineType::Added);
        assert_eq!(diff.lines[0].content, "hello");
        assert_eq!(diff.lines[0].right_line_number, Some(1));
        assert_eq!(diff.lines[0].left_line_number, None);
        assert_eq!((diff.summary.added, diff.summary.removed), (1, 0));
    }

    #[test]
    fn both_empty_yields_nothing() {
        let diff = compute_diff("", "");
        assert!(diff.lines.is_empty());
        assert!(diff.is_identical());
    }

    #[test]
    fn identical_text_is_all_unchanged() {
        let text = "server:\n  port: 80\n  host: example.org\n";
        let diff = compute_diff(text, text);
        assert_eq!(diff.lines.len(), 3);
        assert!(diff.lines.iter().all(|l| l.line_type == DiffLineType::Unchanged));
        assert_eq!((diff.summary.added, diff.summary.removed), (0, 0));
        assert!(diff.is_identical());
    }

    #[test]
    fn trailing_terminator_does_not_add_a_line() {
        assert_eq!(split_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\r\nb"), vec!["a", "b"]);
        assert_eq!(split_lines("a\n\n"), vec!["a", ""]);
        assert!(split_lines("").is_empty());

        let diff = compute_diff("a\nb", "a\nb\n");
        assert!(diff.is_identical());
    }

    #[test]
    fn reconstructs_both_sides() {
        assert_reconstructs("a\nb\nc", "a\nx\nc");
        assert_reconstructs("", "one\ntwo");
        assert_reconstructs("one\ntwo", "");
        assert_reconstructs("a\nb\nc\nd\ne", "x\nb\ny\nd\nz\nw");
        assert_reconstructs("keep\ndrop1\ndrop2\nkeep2", "new0\nkeep\nkeep2\nnew3");
    }

    #[test]
    fn line_numbers_are_consecutive() {
        let diff = compute_diff("a\nb\nc\nd\ne\nf", "a\nc\nX\nd\nY\nZ\nf");
        let left: Vec<usize> = diff.lines.iter().filter_map(|l| l.left_line_number).collect();
        let right: Vec<usize> = diff.lines.iter().filter_map(|l| l.right_line_number).collect();
        assert_eq!(left, (1..=6).collect::<Vec<_>>());
        assert_eq!(right, (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn change_blocks_list_removals_first() {
        let diff = compute_diff("a\nold1\nold2\nz", "a\nnew1\nnew2\nnew3\nz");
        let kinds: Vec<DiffLineType> = diff.lines.iter().map(|l| l.line_type).collect();
        assert_eq!(
            kinds,
            vec![
                DiffLineType::Unchanged,
                DiffLineType::Removed,
                DiffLineType::Removed,
                DiffLineType::Added,
                DiffLineType::Added,
                DiffLineType::Added,
                DiffLineType::Unchanged,
            ]
        );
    }

    #[test]
    fn deterministic_for_same_input() {
        let old = "a\nb\na\nb\na";
        let new = "b\na\nb\na\nb";
        assert_eq!(compute_diff(old, new), compute_diff(old, new));
    }

    #[test]
    fn deadline_still_produces_valid_script() {
        let old: String = (0..500).map(|i| format!("line {}\n", i)).collect();
        let new: String = (0..500).map(|i| format!("line {}\n", i * 7 % 500)).collect();
        let diff = compute_diff_with_deadline(&old, &new, Some(Duration::from_millis(0)));
        let old_side = side(&diff.lines, DiffLineType::Added);
        let new_side = side(&diff.lines, DiffLineType::Removed);
        assert_eq!(old_side, split_lines(&old));
        assert_eq!(new_side, split_lines(&new));
    }

    #[test]
    fn grouping_unchanged_lines() {
        let diff = compute_diff("a\nb\n", "a\nb\n");
        let rows = group_into_rows(&diff.lines);
        assert_eq!(rows.len(), 2);
        match &rows[0] {
            SplitRow::Unchanged(line) => assert_eq!(line.content, "a"),
            _ => panic!(),
        }
    }

    #[test]
    fn grouping_removed_added_pair() {
        let diff = compute_diff("a\nold\nc\n", "a\nnew\nc\n");
        let rows = group_into_rows(&diff.lines);
        // rows: a (unchanged), pair(old,new), c (unchanged)
        assert_eq!(rows.len(), 3);
        match &rows[1] {
            SplitRow::Pair(l, r) => {
                assert_eq!(l.len(), 1);
                assert_eq!(r.len(), 1);
            }
            _ => panic!(),
        }
    }

    #[test]
    fn grouping_added_only_block() {
        let diff = compute_diff("a", "a\nb\nc");
        let rows = group_into_rows(&diff.lines);
        assert_eq!(rows.len(), 2);
        match &rows[1] {
            SplitRow::Pair(l, r) => {
                assert!(l.is_empty());
                assert_eq!(r.len(), 2);
            }
            _ => panic!(),
        }
    }

    #[test]
    fn whitespace_only_changes_are_not_meaningful() {
        let diff = compute_diff("a\nb", "a\n   \nb");
        assert!(!diff.is_identical());
        assert!(!has_meaningful_changes(&diff.lines));

        let diff = compute_diff("a\nb", "a\nc");
        assert!(has_meaningful_changes(&diff.lines));
    }
}
