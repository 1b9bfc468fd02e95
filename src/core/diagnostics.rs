/*
 * Linter findings and their per-document aggregation. Diagnostics are never
 * persisted: each lint pass over a document produces a fresh list that
 * replaces whatever that document had before, and documents never share
 * entries, so editing one file cannot invalidate another file's findings.
 */
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(label)
    }
}

/* Line and column are 1-based. */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub code: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, file: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            message: message.into(),
            file: file.to_string(),
            line: None,
            column: None,
            code: None,
        }
    }

    pub fn error(file: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, file, message)
    }

    pub fn warning(file: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, file, message)
    }

    pub fn info(file: &str, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, file, message)
    }

    pub fn at_line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        write!(f, ": {}: {}", self.severity, self.message)?;
        if let Some(code) = &self.code {
            write!(f, " [{code}]")?;
        }
        Ok(())
    }
}

/*
 * Orders findings by location. Document-wide findings (no line) go last; the
 * sort is stable so findings at the same spot keep their discovery order.
 */
pub fn sort_by_location(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| (d.line.is_none(), d.line, d.column));
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticCounts {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl DiagnosticCounts {
    pub fn from_diagnostics<'a>(diagnostics: impl IntoIterator<Item = &'a Diagnostic>) -> Self {
        let mut counts = Self::default();
        for diagnostic in diagnostics {
            counts.total += 1;
            match diagnostic.severity {
                Severity::Error => counts.errors += 1,
                Severity::Warning => counts.warnings += 1,
                Severity::Info => counts.infos += 1,
            }
        }
        counts
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/*
 * The aggregate diagnostic list of an editing session, partitioned by file path.
 */
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSet {
    by_path: BTreeMap<String, Vec<Diagnostic>>,
}

impl DiagnosticSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, path: &str, diagnostics: Vec<Diagnostic>) {
        if diagnostics.is_empty() {
            self.by_path.remove(path);
        } else {
            self.by_path.insert(path.to_string(), diagnostics);
        }
    }

    pub fn remove(&mut self, path: &str) {
        self.by_path.remove(path);
    }

    /* Moves a document's findings to its new path, rewriting their `file`. */
    pub fn rename(&mut self, old_path: &str, new_path: &str) {
        if let Some(mut diagnostics) = self.by_path.remove(old_path) {
            for d in diagnostics.iter_mut() {
                d.file = new_path.to_string();
            }
            self.by_path.insert(new_path.to_string(), diagnostics);
        }
    }

    pub fn for_path(&self, path: &str) -> &[Diagnostic] {
        self.by_path.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.by_path.values().flatten()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.by_path.keys().map(String::as_str)
    }

    pub fn counts(&self) -> DiagnosticCounts {
        DiagnosticCounts::from_diagnostics(self.iter())
    }

    pub fn clear(&mut self) {
        self.by_path.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_location_and_code() {
        let d = Diagnostic::error("/a.ftl", "unclosed directive `<#if>`")
            .at(3, 5)
            .with_code("unclosed-directive");
        assert_eq!(
            d.to_string(),
            "/a.ftl:3:5: error: unclosed directive `<#if>` [unclosed-directive]"
        );
        let doc_wide = Diagnostic::warning("/stencil.yml", "whole document");
        assert_eq!(doc_wide.to_string(), "/stencil.yml: warning: whole document");
    }

    #[test]
    fn test_sort_by_location_puts_unlocated_last() {
        let mut list = vec![
            Diagnostic::info("/a", "none"),
            Diagnostic::error("/a", "late").at(9, 1),
            Diagnostic::error("/a", "early").at(2, 4),
            Diagnostic::error("/a", "earlier column").at(2, 1),
        ];
        sort_by_location(&mut list);
        let messages: Vec<&str> = list.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["earlier column", "early", "late", "none"]);
    }

    #[test]
    fn test_set_replaces_only_the_owning_path() {
        let mut set = DiagnosticSet::new();
        set.replace("/a.ftl", vec![Diagnostic::error("/a.ftl", "a1")]);
        set.replace("/b.ftl", vec![Diagnostic::warning("/b.ftl", "b1")]);

        set.replace(
            "/a.ftl",
            vec![
                Diagnostic::error("/a.ftl", "a2"),
                Diagnostic::info("/a.ftl", "a3"),
            ],
        );

        assert_eq!(set.for_path("/a.ftl").len(), 2);
        assert_eq!(set.for_path("/b.ftl")[0].message, "b1");
        let counts = set.counts();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.errors, 1);
        assert_eq!(counts.warnings, 1);
        assert_eq!(counts.infos, 1);

        set.replace("/a.ftl", Vec::new());
        assert!(set.for_path("/a.ftl").is_empty());
        assert_eq!(set.paths().collect::<Vec<_>>(), vec!["/b.ftl"]);
    }

    #[test]
    fn test_set_rename_moves_entries() {
        let mut set = DiagnosticSet::new();
        set.replace("/old.ftl", vec![Diagnostic::error("/old.ftl", "x")]);
        set.rename("/old.ftl", "/new.ftl");
        assert!(set.for_path("/old.ftl").is_empty());
        assert_eq!(set.for_path("/new.ftl")[0].file, "/new.ftl");
    }
}
