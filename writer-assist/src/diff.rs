//! Word-level diff between an original span and a suggested rewrite.
//!
//! Words are whitespace-separated runs. Alignment is the classic
//! longest-common-subsequence table walked back from the end; on ties the
//! revised-side word is consumed first, so within a changed region removed
//! words come out ahead of added ones. Consecutive words of the same kind are
//! merged into one [`DiffPart`] joined by single spaces.

use shared_types::{DiffKind, DiffPart};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DiffError {
    #[error("diff table of {cells} cells exceeds budget of {budget}")]
    TooLarge { cells: usize, budget: usize },
}

/// Diff without a table budget.
pub fn compute_diff(original: &str, revised: &str) -> Vec<DiffPart> {
    diff_or_fallback(original, revised, usize::MAX)
}

/// Diff for rendering. Any failure degrades to the whole revised text shown
/// as a single added block.
pub fn diff_or_fallback(original: &str, revised: &str, max_cells: usize) -> Vec<DiffPart> {
    match try_compute_diff(original, revised, max_cells) {
        Ok(parts) => parts,
        Err(e) => {
            tracing::warn!(error = %e, "Word diff unavailable; rendering revised text as added");
            whole_text_added(revised)
        }
    }
}

pub fn try_compute_diff(
    original: &str,
    revised: &str,
    max_cells: usize,
) -> Result<Vec<DiffPart>, DiffError> {
    if original == revised {
        return Ok(if original.is_empty() {
            Vec::new()
        } else {
            vec![DiffPart::unchanged(original)]
        });
    }
    if original.is_empty() {
        return Ok(whole_text_added(revised));
    }
    if revised.is_empty() {
        return Ok(vec![DiffPart::removed(original)]);
    }

    let a: Vec<&str> = original.split_whitespace().collect();
    let b: Vec<&str> = revised.split_whitespace().collect();
    let (n, m) = (a.len(), b.len());
    let cells = (n + 1).saturating_mul(m + 1);
    if cells > max_cells {
        return Err(DiffError::TooLarge {
            cells,
            budget: max_cells,
        });
    }

    // table[i * width + j] = LCS length of a[..i] and b[..j]
    let width = m + 1;
    let mut table = vec![0u32; cells];
    for i in 1..=n {
        for j in 1..=m {
            table[i * width + j] = if a[i - 1] == b[j - 1] {
                table[(i - 1) * width + (j - 1)] + 1
            } else {
                table[(i - 1) * width + j].max(table[i * width + (j - 1)])
            };
        }
    }

    let mut ops: Vec<(DiffKind, &str)> = Vec::with_capacity(n + m);
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && a[i - 1] == b[j - 1] {
            ops.push((DiffKind::Unchanged, a[i - 1]));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table[i * width + (j - 1)] >= table[(i - 1) * width + j]) {
            ops.push((DiffKind::Added, b[j - 1]));
            j -= 1;
        } else {
            ops.push((DiffKind::Removed, a[i - 1]));
            i -= 1;
        }
    }
    ops.reverse();

    Ok(merge_runs(ops))
}

fn merge_runs(ops: Vec<(DiffKind, &str)>) -> Vec<DiffPart> {
    let mut parts: Vec<DiffPart> = Vec::new();
    for (kind, word) in ops {
        match parts.last_mut() {
            Some(last) if last.kind == kind => {
                last.text.push(' ');
                last.text.push_str(word);
            }
            _ => parts.push(DiffPart {
                text: word.to_string(),
                kind,
            }),
        }
    }
    parts
}

fn whole_text_added(revised: &str) -> Vec<DiffPart> {
    if revised.is_empty() {
        Vec::new()
    } else {
        vec![DiffPart::added(revised)]
    }
}

/// Text before the change: unchanged and removed parts.
pub fn original_side(parts: &[DiffPart]) -> String {
    join_kinds(parts, DiffKind::Removed)
}

/// Text after the change: unchanged and added parts.
pub fn revised_side(parts: &[DiffPart]) -> String {
    join_kinds(parts, DiffKind::Added)
}

fn join_kinds(parts: &[DiffPart], changed: DiffKind) -> String {
    parts
        .iter()
        .filter(|part| part.kind == DiffKind::Unchanged || part.kind == changed)
        .map(|part| part.text.as_str())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_identical_strings_are_one_unchanged_part() {
        let text = "keep  this   spacing";
        assert_eq!(compute_diff(text, text), vec![DiffPart::unchanged(text)]);
    }

    #[test]
    fn test_both_empty_is_empty() {
        assert!(compute_diff("", "").is_empty());
    }

    #[test]
    fn test_empty_original_is_single_added() {
        assert_eq!(
            compute_diff("", "brand new"),
            vec![DiffPart::added("brand new")]
        );
    }

    #[test]
    fn test_empty_revised_is_single_removed() {
        assert_eq!(
            compute_diff("going away", ""),
            vec![DiffPart::removed("going away")]
        );
    }

    #[test]
    fn test_disjoint_strings_remove_then_add() {
        assert_eq!(
            compute_diff("alpha beta", "gamma delta"),
            vec![DiffPart::removed("alpha beta"), DiffPart::added("gamma delta")]
        );
    }

    #[test]
    fn test_partial_rewrite_marks_changed_words() {
        assert_eq!(
            compute_diff("has significantly", "has had a significant impact"),
            vec![
                DiffPart::unchanged("has"),
                DiffPart::removed("significantly"),
                DiffPart::added("had a significant impact"),
            ]
        );
    }

    #[test]
    fn test_insertion_in_the_middle() {
        assert_eq!(
            compute_diff("the fox jumps", "the quick brown fox jumps"),
            vec![
                DiffPart::unchanged("the"),
                DiffPart::added("quick brown"),
                DiffPart::unchanged("fox jumps"),
            ]
        );
    }

    #[test]
    fn test_output_is_deterministic() {
        let a = "one two three two one";
        let b = "two one three one two";
        assert_eq!(compute_diff(a, b), compute_diff(a, b));
    }

    #[test]
    fn test_round_trip_both_sides() {
        let cases = [
            ("The results has significantly changed.", "The results have changed significantly."),
            ("a b c d e", "a c e f"),
            ("  leading and trailing  ", "leading, trailing"),
            ("same words\nnew   lines", "same words new lines here"),
            ("x", "y z x"),
        ];
        for (a, b) in cases {
            let parts = compute_diff(a, b);
            assert_eq!(
                original_side(&parts),
                normalized(a),
                "original side of {a:?}"
            );
            assert_eq!(revised_side(&parts), normalized(b), "revised side of {b:?}");
        }
    }

    #[test]
    fn test_budget_exceeded_is_an_error() {
        let err = try_compute_diff("a b c", "d e f", 4).unwrap_err();
        assert_eq!(
            err,
            DiffError::TooLarge {
                cells: 16,
                budget: 4
            }
        );
    }

    #[test]
    fn test_fallback_renders_revised_as_added() {
        assert_eq!(
            diff_or_fallback("a b c", "d e f", 4),
            vec![DiffPart::added("d e f")]
        );
    }
}
