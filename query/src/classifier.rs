//! Error classifier (C10, §4.10). A pure function mapping raw engine/
//! transport error text into the closed `ErrorKind` taxonomy. Ad-hoc text
//! matching is intentional: the engine is treated as a black box and the
//! patterns are centralized here, falling back to `Internal` on no match.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidQuery,
    UnknownColumn,
    UnknownTable,
    SyntaxError,
    AccessDenied,
    NotFound,
    Transient,
    Internal,
}

/// Caller-facing error: classified kind, actionable suggestions, and the
/// raw engine text preserved only as a diagnostic (§7: never the primary message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub kind: ErrorKind,
    pub message: String,
    pub suggestions: Vec<String>,
    pub original: String,
}

fn unknown_column_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)column\s+['"]?(\w+)['"]?\s+not\s+found(?:.*?candidates?:\s*([\w,\s]+))?"#).unwrap()
    })
}

fn unknown_table_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)table\s+['"]?(\w+)['"]?\s+not\s+found"#).unwrap())
}

fn transient_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)(timed?\s*out|connection\s+reset|temporarily\s+unavailable|throttl|retry)"#).unwrap())
}

fn access_denied_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)(access\s+denied|forbidden|unauthorized|permission\s+denied)"#).unwrap())
}

fn not_found_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)(no\s+such\s+(file|key|object)|does\s+not\s+exist|partition.*not\s+found)"#).unwrap())
}

fn syntax_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)(sql\s+parser\s+error|syntax\s+error|parse\s+error)"#).unwrap())
}

/// Classifies `raw` — the verbatim engine/transport error text — into the
/// closed taxonomy. Deterministic: identical input always yields identical output.
pub fn classify(raw: &str) -> QueryError {
    if let Some(captures) = unknown_column_pattern().captures(raw) {
        let column = captures.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let suggestions: Vec<String> = captures
            .get(2)
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        return QueryError {
            kind: ErrorKind::UnknownColumn,
            message: format!("column {column} not found"),
            suggestions,
            original: raw.to_string(),
        };
    }

    if let Some(captures) = unknown_table_pattern().captures(raw) {
        let table = captures.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        return QueryError {
            kind: ErrorKind::UnknownTable,
            message: format!("table {table} not found"),
            suggestions: Vec::new(),
            original: raw.to_string(),
        };
    }

    if syntax_pattern().is_match(raw) {
        return QueryError {
            kind: ErrorKind::SyntaxError,
            message: "the query could not be parsed".to_string(),
            suggestions: Vec::new(),
            original: raw.to_string(),
        };
    }

    if access_denied_pattern().is_match(raw) {
        return QueryError {
            kind: ErrorKind::AccessDenied,
            message: "access was denied".to_string(),
            suggestions: vec![
                "check the credential resolution order (static keys, session, profile, role, ambient)".to_string(),
            ],
            original: raw.to_string(),
        };
    }

    if not_found_pattern().is_match(raw) {
        return QueryError {
            kind: ErrorKind::NotFound,
            message: "the requested partition or file was not found".to_string(),
            suggestions: Vec::new(),
            original: raw.to_string(),
        };
    }

    if transient_pattern().is_match(raw) {
        return QueryError {
            kind: ErrorKind::Transient,
            message: "a transient error occurred, retry may succeed".to_string(),
            suggestions: Vec::new(),
            original: raw.to_string(),
        };
    }

    QueryError {
        kind: ErrorKind::Internal,
        message: "an internal error occurred".to_string(),
        suggestions: Vec::new(),
        original: raw.to_string(),
    }
}

/// Builds the `InvalidQuery` variant directly from a C11 validation failure,
/// bypassing text classification since the rule is already known.
pub fn invalid_query(rule: &str, detail: &str) -> QueryError {
    QueryError {
        kind: ErrorKind::InvalidQuery,
        message: format!("{rule}: {detail}"),
        suggestions: Vec::new(),
        original: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_column_with_candidates() {
        let result = classify("column colx not found, candidates: col_x, col_y");
        assert_eq!(result.kind, ErrorKind::UnknownColumn);
        assert_eq!(result.suggestions, vec!["col_x", "col_y"]);
        assert_eq!(result.original, "column colx not found, candidates: col_x, col_y");
    }

    #[test]
    fn access_denied_gives_credential_suggestion() {
        let result = classify("Access Denied: no permission for s3::GetObject");
        assert_eq!(result.kind, ErrorKind::AccessDenied);
        assert!(!result.suggestions.is_empty());
    }

    #[test]
    fn unmatched_text_falls_back_to_internal() {
        assert_eq!(classify("something inexplicable happened").kind, ErrorKind::Internal);
    }

    #[test]
    fn classification_is_deterministic() {
        let raw = "connection reset by peer";
        assert_eq!(classify(raw), classify(raw));
    }
}
