use super::types::{ContextLines, DiffLine, DiffLineType, DiffResult, DiffView, DisplayUnit};
use std::fmt;

/// Replace unchanged runs that lie outside every change's context window with
/// a single collapse marker.
///
/// Callers are expected to handle the no-change case before collapsing (see
/// [`render_view`]). Given a script with no changes this returns an empty
/// display rather than one marker covering the whole file.
pub fn collapse(lines: &[DiffLine], context: ContextLines) -> Vec<DisplayUnit> {
    if !lines.iter().any(DiffLine::is_change) {
        return Vec::new();
    }

    let keep = visible_positions(lines, context.get());
    let mut units = Vec::with_capacity(lines.len());
    let mut hidden = 0usize;

    for (line, visible) in lines.iter().zip(keep) {
        if visible {
            if hidden > 0 {
                units.push(DisplayUnit::Collapsed {
                    hidden_count: hidden,
                });
                hidden = 0;
            }
            units.push(DisplayUnit::Line(line.clone()));
        } else {
            hidden += 1;
        }
    }
    if hidden > 0 {
        units.push(DisplayUnit::Collapsed {
            hidden_count: hidden,
        });
    }

    units
}

/// Marks positions that are changes or within `context` positions of one
fn visible_positions(lines: &[DiffLine], context: usize) -> Vec<bool> {
    let mut keep = vec![false; lines.len()];

    let mut last_change: Option<usize> = None;
    for (i, line) in lines.iter().enumerate() {
        if line.is_change() {
            last_change = Some(i);
        }
        if let Some(change) = last_change
            && i - change <= context
        {
            keep[i] = true;
        }
    }

    let mut next_change: Option<usize> = None;
    for (i, line) in lines.iter().enumerate().rev() {
        if line.is_change() {
            next_change = Some(i);
        }
        if let Some(change) = next_change
            && change - i <= context
        {
            keep[i] = true;
        }
    }

    keep
}

/// Build the view for a computed diff: identical inputs short-circuit to
/// [`DiffView::Identical`], otherwise lines are collapsed when `only_changes`
/// is set and shown in full when it is not.
pub fn render_view(diff: &DiffResult, context: ContextLines, only_changes: bool) -> DiffView {
    if diff.is_identical() {
        return DiffView::Identical;
    }

    if only_changes {
        DiffView::Units(collapse(&diff.lines, context))
    } else {
        DiffView::Units(diff.lines.iter().cloned().map(DisplayUnit::Line).collect())
    }
}

impl fmt::Display for DisplayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayUnit::Line(line) => {
                let marker = match line.line_type {
                    DiffLineType::Added => '+',
                    DiffLineType::Removed => '-',
                    DiffLineType::Unchanged => ' ',
                };
                let number = |n: Option<usize>| n.map(|n| n.to_string()).unwrap_or_default();
                write!(
                    f,
                    "{:>5} {:>5} {}{}",
                    number(line.left_line_number),
                    number(line.right_line_number),
                    marker,
                    line.content
                )
            }
            DisplayUnit::Collapsed { hidden_count } => {
                let noun = if *hidden_count == 1 { "line" } else { "lines" };
                write!(f, "@@ {} unchanged {} hidden @@", hidden_count, noun)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::diff::compute_diff;

    fn markers(units: &[DisplayUnit]) -> Vec<usize> {
        units
            .iter()
            .filter_map(|unit| match unit {
                DisplayUnit::Collapsed { hidden_count } => Some(*hidden_count),
                DisplayUnit::Line(_) => None,
            })
            .collect()
    }

    fn shown_lines(units: &[DisplayUnit]) -> Vec<&DiffLine> {
        units
            .iter()
            .filter_map(|unit| match unit {
                DisplayUnit::Line(line) => Some(line),
                DisplayUnit::Collapsed { .. } => None,
            })
            .collect()
    }

    fn twenty_lines_with_change_at(index: usize) -> DiffResult {
        let old: Vec<String> = (1..=20).map(|i| format!("line {}", i)).collect();
        let mut new = old.clone();
        new[index] = "changed".to_string();
        compute_diff(&old.join("\n"), &new.join("\n"))
    }

    #[test]
    fn collapses_runs_outside_context() {
        // line 10 replaced: unchanged 0..9, removed, added, unchanged 10..19
        let diff = twenty_lines_with_change_at(9);
        let units = collapse(&diff.lines, ContextLines::new(3));

        assert_eq!(markers(&units), vec![6, 7]);
        assert!(matches!(units[0], DisplayUnit::Collapsed { hidden_count: 6 }));
        assert!(matches!(
            units.last(),
            Some(DisplayUnit::Collapsed { hidden_count: 7 })
        ));
        assert_eq!(shown_lines(&units).len(), 3 + 2 + 3);
    }

    #[test]
    fn zero_context_keeps_only_changes() {
        let diff = twenty_lines_with_change_at(4);
        let units = collapse(&diff.lines, ContextLines::new(0));

        assert!(shown_lines(&units).iter().all(|line| line.is_change()));
        assert_eq!(markers(&units), vec![4, 15]);
    }

    #[test]
    fn large_context_is_lossless() {
        let diff = twenty_lines_with_change_at(12);
        let units = collapse(&diff.lines, ContextLines::new(20));

        assert!(markers(&units).is_empty());
        let shown: Vec<DiffLine> = shown_lines(&units).into_iter().cloned().collect();
        assert_eq!(shown, diff.lines);
    }

    #[test]
    fn context_exactly_matching_run_length_is_lossless() {
        let diff = compute_diff("a\nb\nc\nd", "a\nb\nX\nd");
        let units = collapse(&diff.lines, ContextLines::new(2));
        assert!(markers(&units).is_empty());
        assert_eq!(units.len(), diff.lines.len());
    }

    #[test]
    fn nearby_changes_share_context() {
        let old = "1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n11\n12";
        let new = "1\n2\nX\n4\n5\n6\n7\nY\n9\n10\n11\n12";
        let diff = compute_diff(old, new);
        let units = collapse(&diff.lines, ContextLines::new(3));

        // Gap between the two changes (4 lines) is fully inside the windows
        assert_eq!(markers(&units), vec![1]);
    }

    #[test]
    fn changes_are_never_hidden() {
        let diff = compute_diff("a\nb\nc\nd\ne\nf\ng", "a\nB\nc\nd\ne\nF\ng\nh");
        for context in ContextLines::presets() {
            let units = collapse(&diff.lines, context);
            let changes = shown_lines(&units)
                .iter()
                .filter(|line| line.is_change())
                .count();
            assert_eq!(changes, diff.summary.added + diff.summary.removed);
        }
    }

    #[test]
    fn identical_input_collapses_to_nothing() {
        let diff = compute_diff("foo\nbar", "foo\nbar");
        assert_eq!(diff.lines.len(), 2);
        assert!(collapse(&diff.lines, ContextLines::new(0)).is_empty());
        assert_eq!(render_view(&diff, ContextLines::new(0), true), DiffView::Identical);
    }

    #[test]
    fn render_without_collapsing_shows_everything() {
        let diff = twenty_lines_with_change_at(0);
        match render_view(&diff, ContextLines::new(0), false) {
            DiffView::Units(units) => {
                assert_eq!(units.len(), diff.lines.len());
                assert!(markers(&units).is_empty());
            }
            DiffView::Identical => panic!("expected units"),
        }
    }

    #[test]
    fn display_formatting() {
        let diff = compute_diff("a", "b");
        let units = collapse(&diff.lines, ContextLines::default());
        assert_eq!(units[0].to_string(), "    1       -a");
        assert_eq!(units[1].to_string(), "          1 +b");
        assert_eq!(
            DisplayUnit::Collapsed { hidden_count: 1 }.to_string(),
            "@@ 1 unchanged line hidden @@"
        );
    }
}
