//! From raw model output to patched LaTeX source.

use pretty_assertions::assert_eq;
use texpatch::diff::{extract_search_replace, extract_unified_diff, EditSet, FormatError, SearchReplaceBlock};
use texpatch::patch::{apply_edit_set, PatchError, PatchOptions};
use texpatch::tex::{find_by_kind, parse, NodeKind};
use texpatch::validate::ValidationError;

const PAPER: &str = r"\documentclass{article}
\usepackage{amsmath}
\begin{document}
\section{Introduction}
We study energy.
\begin{equation}
E = mc^2 \label{eq:energy}
\end{equation}
\section{Results}
The results are good.
\begin{itemize}
\item first
\item second
\end{itemize}
\end{document}
";

#[test]
fn two_fenced_diffs_apply_in_order() {
    let response = "Here are the changes.\n\
```diff\n--- a/paper.tex\n+++ b/paper.tex\n@@ -5,1 +5,1 @@\n-We study energy.\n+We study mass and energy.\n```\n\
And a second one:\n\
```diff\n--- a/paper.tex\n+++ b/paper.tex\n@@ -10,1 +10,1 @@\n-The results are good.\n+The results are excellent.\n```\n";

    let edits = extract_unified_diff(response).unwrap();
    let EditSet::Hunks { hunks } = &edits else {
        panic!("expected hunks, got {edits:?}");
    };
    assert_eq!(hunks.len(), 2);
    assert!(hunks[0].as_str().contains("mass and energy"));

    let report = apply_edit_set(PAPER, &edits, &PatchOptions::default());
    assert!(report.is_clean());
    assert_eq!(report.applied(), 2);
    assert!(report.text.contains("We study mass and energy.\n"));
    assert!(report.text.contains("The results are excellent.\n"));

    // The patched text still parses to the same structure.
    let doc = parse(&report.text);
    assert_eq!(find_by_kind(doc.root(), NodeKind::Section).len(), 2);
    assert_eq!(find_by_kind(doc.root(), NodeKind::Equation).len(), 1);
}

#[test]
fn diff_block_without_new_file_header_is_rejected() {
    let response = "```diff\n--- a/paper.tex\n@@ -5,1 +5,1 @@\n-We study energy.\n+We study mass.\n```";
    assert!(matches!(
        extract_unified_diff(response),
        Err(FormatError::MissingMarker { marker: "+++ ", .. })
    ));
}

#[test]
fn fenced_json_yields_one_block() {
    let response = "```json\n{\"explanation\": \"swap\", \"search_replace_blocks\": [{\"search\": \"a\", \"replace\": \"b\"}]}\n```";
    let edits = extract_search_replace(response).unwrap();
    assert_eq!(
        edits,
        EditSet::Blocks {
            explanation: Some("swap".to_string()),
            blocks: vec![SearchReplaceBlock {
                search: "a".to_string(),
                replace: "b".to_string(),
                explanation: None,
            }],
        }
    );
}

#[test]
fn conflicting_blocks_fail_alone() {
    let edits = EditSet::Blocks {
        explanation: None,
        blocks: vec![
            SearchReplaceBlock {
                search: "\\item".to_string(),
                replace: "\\item[-]".to_string(),
                explanation: None,
            },
            SearchReplaceBlock {
                search: "The results are good.".to_string(),
                replace: "The results hold.".to_string(),
                explanation: None,
            },
            SearchReplaceBlock {
                search: "We studdy energy.".to_string(),
                replace: "We study power.".to_string(),
                explanation: None,
            },
        ],
    };

    let report = apply_edit_set(PAPER, &edits, &PatchOptions::default());

    assert_eq!(report.applied(), 1);
    assert!(report.text.contains("The results hold."));
    assert!(report.text.contains("\\item first"));

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].0, "block 1");
    assert!(matches!(
        failures[0].1,
        PatchError::Search {
            index: 1,
            source: ValidationError::SelectorNotUnique { count: 2, .. },
            ..
        }
    ));
    assert_eq!(failures[1].0, "block 3");
    assert!(failures[1].1.to_string().contains("closest line 5"), "{}", failures[1].1);
}

#[test]
fn reapplying_a_response_fails_on_missing_context() {
    let response = "```diff\n--- a/paper.tex\n+++ b/paper.tex\n@@ -10,1 +10,1 @@\n-The results are good.\n+The results are excellent.\n```";
    let edits = extract_unified_diff(response).unwrap();

    let first = apply_edit_set(PAPER, &edits, &PatchOptions::default());
    assert!(first.is_clean());
    let second = apply_edit_set(&first.text, &edits, &PatchOptions::default());

    assert_eq!(second.text, first.text);
    assert_eq!(second.applied(), 0);
    let failures: Vec<_> = second.failures().collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0].1, PatchError::ContextNotFound { .. }));
}

#[test]
fn invented_search_text_is_a_failure() {
    let edits = EditSet::Blocks {
        explanation: None,
        blocks: vec![SearchReplaceBlock {
            search: "this text is nowhere".to_string(),
            replace: "The results are good.".to_string(),
            explanation: None,
        }],
    };

    let report = apply_edit_set(PAPER, &edits, &PatchOptions::default());

    assert!(!report.is_clean());
    assert_eq!(report.text, PAPER);
    assert_eq!(report.failures().next().map(|(label, _)| label), Some("block 1"));
}

#[test]
fn latex_fence_before_diff_fence() {
    let response = "New text:\n```latex\n\\section{Results}\n```\nPatch:\n\
```diff\n--- a/paper.tex\n+++ b/paper.tex\n@@ -10,1 +10,1 @@\n-The results are good.\n+The results are solid.\n```\nDone.";

    let edits = extract_unified_diff(response).unwrap();
    let report = apply_edit_set(PAPER, &edits, &PatchOptions::default());

    assert!(report.is_clean(), "{:?}", report.results);
    assert!(report.text.contains("The results are solid.\n"));
}

#[test]
fn strict_headers_refuse_miscounted_hunks() {
    let response = "```diff\n--- a/paper.tex\n+++ b/paper.tex\n@@ -10,3 +10,3 @@\n-The results are good.\n+The results are fine.\n```";
    let edits = extract_unified_diff(response).unwrap();

    let lenient = apply_edit_set(PAPER, &edits, &PatchOptions::default());
    assert!(lenient.is_clean());

    let strict = apply_edit_set(
        PAPER,
        &edits,
        &PatchOptions {
            strict_hunk_headers: true,
        },
    );
    assert_eq!(strict.text, PAPER);
    assert!(matches!(
        strict.failures().next(),
        Some((_, PatchError::Validation(ValidationError::HunkHeaderMismatch { .. })))
    ));
}
