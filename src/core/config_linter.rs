/*
 * Linter for the main configuration document. The document is parsed into a
 * generic YAML value tree; a parse failure becomes exactly one error. When the
 * document parses, each field rule of the schema is checked against the
 * stencil config block and every violated rule becomes one error.
 *
 * Field violations are located in the raw text by resolving the dotted field
 * path one segment at a time, each segment searched as a `key:` line below the
 * line where the previous segment was found. This narrows, but does not
 * eliminate, the chance of pointing at a same-named key elsewhere (for example
 * in a flow mapping or under a sibling with identical keys).
 */
use crate::core::diagnostics::Diagnostic;
use crate::core::models::STENCIL_CONFIG_BLOCK_KEY;
use regex::Regex;
use serde_yaml::Value;
use std::sync::LazyLock;

static PARSER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"line (\d+)").expect("parser line pattern is valid"));

static STENCIL_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_-]*$").expect("stencil id pattern is valid"));

static IDENTIFIER_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier format is valid"));

static SEMVER_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?$")
        .expect("semver format is valid")
});

static EMAIL_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email format is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    Identifier,
    Semver,
    Email,
}

impl FieldFormat {
    fn matches(self, value: &str) -> bool {
        match self {
            FieldFormat::Identifier => IDENTIFIER_FORMAT.is_match(value),
            FieldFormat::Semver => SEMVER_FORMAT.is_match(value),
            FieldFormat::Email => EMAIL_FORMAT.is_match(value),
        }
    }

    fn label(self) -> &'static str {
        match self {
            FieldFormat::Identifier => "identifier",
            FieldFormat::Semver => "semantic version",
            FieldFormat::Email => "email address",
        }
    }
}

/*
 * Shape constraints for one field, addressed by its dotted path from the
 * document root (e.g. `stencil.id`).
 */
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub path: String,
    pub required: bool,
    pub pattern: Option<Regex>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub format: Option<FieldFormat>,
}

impl FieldRule {
    pub fn new(path: &str) -> Self {
        FieldRule {
            path: path.to_string(),
            required: false,
            pattern: None,
            min_len: None,
            max_len: None,
            format: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn length(mut self, min_len: Option<usize>, max_len: Option<usize>) -> Self {
        self.min_len = min_len;
        self.max_len = max_len;
        self
    }

    pub fn format(mut self, format: FieldFormat) -> Self {
        self.format = Some(format);
        self
    }

    /* Returns the rule messages this field violates, in rule order. */
    fn violations(&self, value: Option<&Value>) -> Vec<String> {
        let value = match value {
            None | Some(Value::Null) => {
                return if self.required {
                    vec!["is required".to_string()]
                } else {
                    Vec::new()
                };
            }
            Some(v) => v,
        };
        let Some(text) = scalar_text(value) else {
            return vec!["must be a string".to_string()];
        };

        let mut messages = Vec::new();
        let length = text.chars().count();
        if let Some(min) = self.min_len
            && length < min
        {
            messages.push(format!("must be at least {min} characters"));
        }
        if let Some(max) = self.max_len
            && length > max
        {
            messages.push(format!("must be at most {max} characters"));
        }
        if let Some(pattern) = &self.pattern
            && !pattern.is_match(&text)
        {
            messages.push(format!("must match pattern {}", pattern.as_str()));
        }
        if let Some(format) = self.format
            && !format.matches(&text)
        {
            messages.push(format!("must be a valid {}", format.label()));
        }
        messages
    }
}

#[derive(Debug, Clone)]
pub struct ConfigSchema {
    pub block_key: String,
    pub rules: Vec<FieldRule>,
}

impl ConfigSchema {
    /* The field shapes of the `stencil` block of the main configuration. */
    pub fn stencil_default() -> Self {
        let key = STENCIL_CONFIG_BLOCK_KEY;
        ConfigSchema {
            block_key: key.to_string(),
            rules: vec![
                FieldRule::new(&format!("{key}.id"))
                    .required()
                    .pattern(STENCIL_ID_PATTERN.clone())
                    .length(Some(3), Some(64)),
                FieldRule::new(&format!("{key}.name"))
                    .required()
                    .length(Some(1), Some(100)),
                FieldRule::new(&format!("{key}.description")).length(None, Some(500)),
                FieldRule::new(&format!("{key}.version")).format(FieldFormat::Semver),
                FieldRule::new(&format!("{key}.author")).format(FieldFormat::Email),
            ],
        }
    }
}

impl Default for ConfigSchema {
    fn default() -> Self {
        Self::stencil_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigLinter {
    schema: ConfigSchema,
}

impl ConfigLinter {
    pub fn new(schema: ConfigSchema) -> Self {
        ConfigLinter { schema }
    }

    pub fn schema(&self) -> &ConfigSchema {
        &self.schema
    }

    pub fn lint(&self, file: &str, source: &str) -> Vec<Diagnostic> {
        if source.trim().is_empty() {
            return Vec::new();
        }
        let document: Value = match serde_yaml::from_str(source) {
            Ok(doc) => doc,
            Err(e) => {
                let message = e.to_string();
                let line = line_from_parser_message(&message)
                    .or_else(|| e.location().map(|loc| loc.line()));
                log::debug!("ConfigLinter: {file} does not parse: {message}");
                return vec![
                    Diagnostic::error(file, message)
                        .at_line(line)
                        .with_code("config-parse"),
                ];
            }
        };

        let Some(block) = document.get(self.schema.block_key.as_str()) else {
            log::trace!(
                "ConfigLinter: {file} has no '{}' block, nothing to check",
                self.schema.block_key
            );
            return Vec::new();
        };
        if !block.is_mapping() {
            return vec![
                Diagnostic::error(file, format!("{}: must be a mapping", self.schema.block_key))
                    .at_line(locate_field_line(source, &self.schema.block_key))
                    .with_code("config-schema"),
            ];
        }

        let mut diagnostics = Vec::new();
        for rule in &self.schema.rules {
            let value = lookup_path(&document, &rule.path);
            for message in rule.violations(value) {
                diagnostics.push(
                    Diagnostic::error(file, format!("{}: {message}", rule.path))
                        .at_line(locate_field_line(source, &rule.path))
                        .with_code("config-schema"),
                );
            }
        }
        diagnostics
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lookup_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
}

/* Extracts `N` from a parser message containing `line N`. */
pub fn line_from_parser_message(message: &str) -> Option<usize> {
    PARSER_LINE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/*
 * Returns the 1-based line of the last segment of `path`. Each segment is
 * searched only among the direct keys of the previous segment's block: lines
 * indented like the block's first key, up to the first line indented at or
 * below the parent key. `None` when any segment has no such `key:` line.
 */
pub fn locate_field_line(source: &str, path: &str) -> Option<usize> {
    let lines: Vec<&str> = source.lines().collect();
    let mut block_start = 0;
    let mut parent_indent: Option<usize> = None;
    let mut found = None;
    for segment in path.split('.') {
        let key_line = Regex::new(&format!(r"^{}\s*:", regex::escape(segment))).ok()?;
        let mut key_indent = None;
        let mut matched = None;
        for (idx, line) in lines.iter().enumerate().skip(block_start) {
            let content = line.trim_start();
            if content.is_empty() || content.starts_with('#') {
                continue;
            }
            let indent = line.len() - content.len();
            if parent_indent.is_some_and(|parent| indent <= parent) {
                break;
            }
            if indent == *key_indent.get_or_insert(indent) && key_line.is_match(content) {
                matched = Some((idx, indent));
                break;
            }
        }
        let (idx, indent) = matched?;
        found = Some(idx + 1);
        block_start = idx + 1;
        parent_indent = Some(indent);
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "/stencil.yml";

    fn lint(source: &str) -> Vec<Diagnostic> {
        ConfigLinter::default().lint(FILE, source)
    }

    #[test]
    fn test_valid_document_has_no_findings() {
        let source = "stencil:\n  id: java-service\n  name: Java Service\n  version: 1.0.0\n  author: dev@example.com\n";
        assert!(lint(source).is_empty());
    }

    #[test]
    fn test_parse_failure_yields_one_error_with_line() {
        let source = "stencil:\n  id: ok\n  name: [unclosed\n";
        let diagnostics = lint(source);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_error());
        assert_eq!(diagnostics[0].code.as_deref(), Some("config-parse"));
        assert!(diagnostics[0].line.is_some());
    }

    #[test]
    fn test_missing_block_is_not_checked() {
        assert!(lint("other:\n  key: value\n").is_empty());
        assert!(lint("").is_empty());
    }

    #[test]
    fn test_non_mapping_block() {
        let diagnostics = lint("stencil: just-a-string\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "stencil: must be a mapping");
        assert_eq!(diagnostics[0].line, Some(1));
    }

    #[test]
    fn test_required_fields_and_messages() {
        let diagnostics = lint("stencil:\n  description: hello\n");
        let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["stencil.id: is required", "stencil.name: is required"]
        );
        assert!(diagnostics.iter().all(|d| d.line.is_none()));
    }

    #[test]
    fn test_each_violated_rule_is_one_error_located_at_its_key() {
        let source = "stencil:\n  name: Demo\n  id: X\n  version: one\n";
        let diagnostics = lint(source);
        let id_errors: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|d| d.message.starts_with("stencil.id:"))
            .collect();
        assert_eq!(id_errors.len(), 2);
        assert!(id_errors[0].message.contains("at least 3 characters"));
        assert!(id_errors[1].message.contains("must match pattern"));
        assert!(id_errors.iter().all(|d| d.line == Some(3)));

        let version = diagnostics
            .iter()
            .find(|d| d.message.starts_with("stencil.version:"))
            .expect("version finding");
        assert_eq!(version.message, "stencil.version: must be a valid semantic version");
        assert_eq!(version.line, Some(4));
    }

    #[test]
    fn test_non_scalar_value_must_be_a_string() {
        let diagnostics = lint("stencil:\n  id: [a, b]\n  name: n\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "stencil.id: must be a string");
    }

    #[test]
    fn test_locate_field_line_prefers_key_under_parent() {
        let source = "generator:\n  id: other\nstencil:\n  name: Demo\n  id: BAD\n";
        assert_eq!(locate_field_line(source, "stencil.id"), Some(5));
        assert_eq!(locate_field_line(source, "generator.id"), Some(2));
        assert_eq!(locate_field_line(source, "stencil.author"), None);
    }

    #[test]
    fn test_locate_field_line_stays_inside_parent_block() {
        let source = "stencil:\n  name: Demo\nother:\n  id: elsewhere\n";
        assert_eq!(locate_field_line(source, "stencil.id"), None);
        assert_eq!(locate_field_line(source, "other.id"), Some(4));

        let nested = "stencil:\n  meta:\n    id: deep\n  # comment\n\n  id: top\n";
        assert_eq!(locate_field_line(nested, "stencil.id"), Some(6));
        assert_eq!(locate_field_line(nested, "stencil.meta.id"), Some(3));

        let diagnostics = lint(source);
        let id = diagnostics
            .iter()
            .find(|d| d.message == "stencil.id: is required")
            .expect("id finding");
        assert_eq!(id.line, None);
    }

    #[test]
    fn test_line_from_parser_message() {
        assert_eq!(
            line_from_parser_message("did not find expected ',' at line 3 column 9"),
            Some(3)
        );
        assert_eq!(line_from_parser_message("invalid type"), None);
    }

    #[test]
    fn test_custom_schema() {
        let schema = ConfigSchema {
            block_key: "generator".to_string(),
            rules: vec![FieldRule::new("generator.entry").required().format(FieldFormat::Identifier)],
        };
        let linter = ConfigLinter::new(schema);
        let diagnostics = linter.lint("/gen.yml", "generator:\n  entry: 9lives\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "generator.entry: must be a valid identifier");
        assert_eq!(diagnostics[0].file, "/gen.yml");
    }
}
