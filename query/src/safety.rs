//! Safety validator (C11, §4.11). A query is admissible iff it is exactly
//! one read-only statement, within the configured length and row-limit caps.

use curlake_core::Error;
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

pub fn validate(sql: &str, max_query_len: usize, row_limit: u64, max_rows: u64) -> Result<(), Error> {
    if sql.len() > max_query_len {
        return Err(Error::validation(
            "max_query_len",
            format!("query length {} exceeds the configured cap {max_query_len}", sql.len()),
        ));
    }
    if row_limit == 0 || row_limit > max_rows {
        return Err(Error::validation(
            "row_limit",
            format!("row_limit {row_limit} must be within [1, {max_rows}]"),
        ));
    }

    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| Error::validation("syntax", e.to_string()))?;

    if statements.len() != 1 {
        return Err(Error::validation(
            "single_statement",
            format!("expected exactly one statement, found {}", statements.len()),
        ));
    }

    match &statements[0] {
        Statement::Query(_) => Ok(()),
        other => Err(Error::validation(
            "read_only",
            format!("only read statements are admitted, found {}", statement_kind(other)),
        )),
    }
}

fn statement_kind(statement: &Statement) -> &'static str {
    match statement {
        Statement::Insert { .. } => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete { .. } => "DELETE",
        Statement::CreateTable { .. } => "CREATE TABLE",
        Statement::Drop { .. } => "DROP",
        Statement::AlterTable { .. } => "ALTER TABLE",
        Statement::Grant { .. } => "GRANT",
        Statement::Revoke { .. } => "REVOKE",
        Statement::Truncate { .. } => "TRUNCATE",
        Statement::SetVariable { .. } => "SET",
        _ => "non-query",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_plain_select() {
        assert!(validate("SELECT * FROM base", 1024, 100, 1_000_000).is_ok());
    }

    #[test]
    fn rejects_delete() {
        let err = validate("DELETE FROM base", 1024, 100, 1_000_000).unwrap_err();
        assert!(matches!(err, Error::Validation { rule, .. } if rule == "read_only"));
    }

    #[test]
    fn rejects_multiple_statements() {
        let err = validate("SELECT 1; SELECT 2", 1024, 100, 1_000_000).unwrap_err();
        assert!(matches!(err, Error::Validation { rule, .. } if rule == "single_statement"));
    }

    #[test]
    fn rejects_oversized_query() {
        let err = validate("SELECT 1", 4, 100, 1_000_000).unwrap_err();
        assert!(matches!(err, Error::Validation { rule, .. } if rule == "max_query_len"));
    }

    #[test]
    fn rejects_row_limit_above_cap() {
        let err = validate("SELECT 1", 1024, 2_000_000, 1_000_000).unwrap_err();
        assert!(matches!(err, Error::Validation { rule, .. } if rule == "row_limit"));
    }
}
