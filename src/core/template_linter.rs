/*
 * Structural linter for the directive-based template language. It is not an
 * interpreter: it only checks that block directives are balanced, that
 * interpolations look like references, that comments are terminated, and that
 * interpolation braces balance per line. Every check is independent and adds
 * its own findings.
 *
 * Directive and interpolation checks run on a copy of the source in which
 * comment bodies are blanked out (line breaks kept), so commented-out markup
 * is not reported. The comment check itself reads the raw source.
 */
use crate::core::diagnostics::{Diagnostic, sort_by_location};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

const COMMENT_OPEN: &str = "<#--";
const COMMENT_CLOSE: &str = "-->";
const MARKUP_COMMENT_OPEN: &str = "<!--";
const INTERPOLATION_OPEN: &str = "${";

/*
 * Directives that open a scope and need a matching closing tag.
 * Conditional, loop, macro, function, switch, variable capture, formatting
 * scopes and the error-handling scope.
 */
const BLOCK_DIRECTIVES: &[&str] = &[
    "if",
    "list",
    "items",
    "macro",
    "function",
    "switch",
    "assign",
    "local",
    "global",
    "compress",
    "escape",
    "noescape",
    "autoesc",
    "noautoesc",
    "outputformat",
    "attempt",
];

// `<#assign x = 1>` is complete by itself; only `<#assign x>...</#assign>` opens a scope.
const CAPTURE_DIRECTIVES: &[&str] = &["assign", "local", "global"];

static DIRECTIVE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/?)#([A-Za-z_]+)([^>]*)>").expect("directive tag pattern is valid")
});

static INTERPOLATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}").expect("interpolation pattern is valid"));

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z_][A-Za-z0-9_]*(?:[.?!][A-Za-z_][A-Za-z0-9_]*)*(?:\([^()]*\))?(?:\[[^\[\]]+\])*$",
    )
    .expect("reference pattern is valid")
});

static LEADING_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)").expect("identifier pattern is valid")
});

/*
 * Maps byte offsets of a text to 1-based (line, column) positions, where the
 * column counts characters rather than bytes.
 */
struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(idx, _)| idx + 1));
        LineIndex { text, line_starts }
    }

    fn position(&self, offset: usize) -> (usize, usize) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let start = self.line_starts[line_idx];
        let column = self.text[start..offset].chars().count() + 1;
        (line_idx + 1, column)
    }
}

#[derive(Debug)]
struct OpenDirective {
    name: String,
    line: usize,
    column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentState {
    Outside,
    Template { line: usize, column: usize },
    Markup,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateLinter {
    expected_variables: Vec<String>,
}

impl TemplateLinter {
    pub fn new() -> Self {
        Self::default()
    }

    /*
     * Names that the template is expected to reference. Each one that never
     * appears as the first segment of an interpolation yields an `info`
     * finding; this is a documentation nudge, not a correctness check.
     */
    pub fn with_expected_variables(expected_variables: Vec<String>) -> Self {
        TemplateLinter { expected_variables }
    }

    pub fn expected_variables(&self) -> &[String] {
        &self.expected_variables
    }

    pub fn lint(&self, file: &str, source: &str) -> Vec<Diagnostic> {
        let masked = mask_comments(source);
        let index = LineIndex::new(&masked);

        let mut diagnostics = Vec::new();
        check_directive_balance(file, &masked, &index, &mut diagnostics);
        check_references(file, &masked, &index, &mut diagnostics);
        check_comment_balance(file, source, &mut diagnostics);
        check_interpolation_braces(file, &masked, &mut diagnostics);
        if !self.expected_variables.is_empty() {
            check_expected_variables(file, &masked, &self.expected_variables, &mut diagnostics);
        }
        sort_by_location(&mut diagnostics);
        log::trace!(
            "TemplateLinter: {} finding(s) for {file}",
            diagnostics.len()
        );
        diagnostics
    }
}

/* Convenience wrapper for a one-off lint without expected variables. */
pub fn lint_template(file: &str, source: &str) -> Vec<Diagnostic> {
    TemplateLinter::new().lint(file, source)
}

fn is_block_directive(name: &str) -> bool {
    BLOCK_DIRECTIVES.contains(&name)
}

fn check_directive_balance(
    file: &str,
    text: &str,
    index: &LineIndex,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut stack: Vec<OpenDirective> = Vec::new();

    for caps in DIRECTIVE_TAG.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let name = name.as_str();
        if !is_block_directive(name) {
            continue;
        }
        let closing = caps.get(1).is_some_and(|m| m.as_str() == "/");
        let attributes = caps.get(3).map_or("", |m| m.as_str());
        let (line, column) = index.position(whole.start());

        if closing {
            match stack.pop() {
                None => diagnostics.push(
                    Diagnostic::error(
                        file,
                        format!("no matching opening tag for `</#{name}>`"),
                    )
                    .at(line, column)
                    .with_code("unmatched-closing-tag"),
                ),
                Some(open) if open.name != name => diagnostics.push(
                    Diagnostic::error(
                        file,
                        format!(
                            "directive mismatch: opened `<#{}>` at line {}, closed `</#{name}>`",
                            open.name, open.line
                        ),
                    )
                    .at(line, column)
                    .with_code("directive-mismatch"),
                ),
                Some(_) => {}
            }
        } else {
            if attributes.trim_end().ends_with('/') {
                continue;
            }
            if CAPTURE_DIRECTIVES.contains(&name) && attributes.contains('=') {
                continue;
            }
            stack.push(OpenDirective {
                name: name.to_string(),
                line,
                column,
            });
        }
    }

    for open in stack {
        diagnostics.push(
            Diagnostic::error(file, format!("unclosed directive `<#{}>`", open.name))
                .at(open.line, open.column)
                .with_code("unclosed-directive"),
        );
    }
}

fn check_references(file: &str, text: &str, index: &LineIndex, diagnostics: &mut Vec<Diagnostic>) {
    for caps in INTERPOLATION.captures_iter(text) {
        let (Some(whole), Some(expr)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let (line, column) = index.position(whole.start());
        let expression = expr.as_str().trim();
        if expression.is_empty() {
            diagnostics.push(
                Diagnostic::error(file, "empty variable reference")
                    .at(line, column)
                    .with_code("empty-reference"),
            );
        } else if !REFERENCE.is_match(expression) {
            diagnostics.push(
                Diagnostic::warning(
                    file,
                    format!("possibly invalid reference `${{{expression}}}`"),
                )
                .at(line, column)
                .with_code("invalid-reference"),
            );
        }
    }
}

/*
 * Finds the next comment marker at or after `from` on a line, returning its
 * byte offset and the marker itself.
 */
fn next_comment_marker(line: &str, from: usize) -> Option<(usize, &'static str)> {
    [COMMENT_OPEN, MARKUP_COMMENT_OPEN, COMMENT_CLOSE]
        .into_iter()
        .filter_map(|marker| line[from..].find(marker).map(|idx| (from + idx, marker)))
        .min_by_key(|(idx, _)| *idx)
}

/*
 * Tracks comment state across lines. Markup comments (`<!-- ... -->`) are
 * followed only so that their closing marker is not mistaken for a stray
 * template comment close.
 */
fn check_comment_balance(file: &str, source: &str, diagnostics: &mut Vec<Diagnostic>) {
    let mut state = CommentState::Outside;

    for (line_idx, line) in source.lines().enumerate() {
        let line_no = line_idx + 1;
        let mut cursor = 0;
        while let Some((offset, marker)) = next_comment_marker(line, cursor) {
            let column = line[..offset].chars().count() + 1;
            cursor = offset + marker.len();
            state = match (state, marker) {
                (CommentState::Outside, COMMENT_OPEN) => CommentState::Template {
                    line: line_no,
                    column,
                },
                (CommentState::Outside, MARKUP_COMMENT_OPEN) => CommentState::Markup,
                (CommentState::Outside, _) => {
                    diagnostics.push(
                        Diagnostic::error(
                            file,
                            format!("comment close `{COMMENT_CLOSE}` without an open comment"),
                        )
                        .at(line_no, column)
                        .with_code("unmatched-comment-close"),
                    );
                    CommentState::Outside
                }
                (CommentState::Template { .. }, COMMENT_OPEN) => {
                    diagnostics.push(
                        Diagnostic::warning(
                            file,
                            format!("nested `{COMMENT_OPEN}` inside a comment"),
                        )
                        .at(line_no, column)
                        .with_code("nested-comment"),
                    );
                    state
                }
                (CommentState::Template { .. }, COMMENT_CLOSE) => CommentState::Outside,
                (CommentState::Markup, COMMENT_CLOSE) => CommentState::Outside,
                (current, _) => current,
            };
        }
    }

    if let CommentState::Template { line, column } = state {
        diagnostics.push(
            Diagnostic::error(file, "unterminated comment")
                .at(line, column)
                .with_code("unterminated-comment"),
        );
    }
}

/*
 * Cheap per-line approximation: compares the number of `${` tokens with the
 * number of `}` on each line.
 */
fn check_interpolation_braces(file: &str, text: &str, diagnostics: &mut Vec<Diagnostic>) {
    for (line_idx, line) in text.lines().enumerate() {
        let opens = line.matches(INTERPOLATION_OPEN).count();
        let closes = line.matches('}').count();
        if opens > closes {
            diagnostics.push(
                Diagnostic::error(file, "unterminated interpolation")
                    .at_line(Some(line_idx + 1))
                    .with_code("unterminated-interpolation"),
            );
        } else if closes > opens {
            diagnostics.push(
                Diagnostic::warning(file, "unmatched closing brace")
                    .at_line(Some(line_idx + 1))
                    .with_code("unmatched-brace"),
            );
        }
    }
}

fn check_expected_variables(
    file: &str,
    text: &str,
    expected: &[String],
    diagnostics: &mut Vec<Diagnostic>,
) {
    let referenced: HashSet<&str> = INTERPOLATION
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|expr| LEADING_IDENTIFIER.captures(expr.as_str()))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();

    for name in expected {
        if !referenced.contains(name.as_str()) {
            diagnostics.push(
                Diagnostic::info(file, format!("expected variable `{name}` is never referenced"))
                    .with_code("unused-expected-variable"),
            );
        }
    }
}

/*
 * Blanks out the bodies of template comments, including their markers, with
 * one space per character. Line breaks survive so line and column positions in
 * the masked text match the original.
 */
fn mask_comments(source: &str) -> String {
    let mut masked = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find(COMMENT_OPEN) {
        masked.push_str(&rest[..start]);
        let after_open = &rest[start + COMMENT_OPEN.len()..];
        let comment_len = match after_open.find(COMMENT_CLOSE) {
            Some(end) => COMMENT_OPEN.len() + end + COMMENT_CLOSE.len(),
            None => rest.len() - start,
        };
        let comment = &rest[start..start + comment_len];
        masked.extend(comment.chars().map(|c| if c == '\n' { '\n' } else { ' ' }));
        rest = &rest[start + comment_len..];
    }
    masked.push_str(rest);
    masked
}
