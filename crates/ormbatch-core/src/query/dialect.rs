//! SQL dialects.
//!
//! A dialect owns every provider-specific piece of syntax: identifier
//! quoting, parameter placeholders, operator spelling, row limiting, hint
//! placement and how several statements travel in one batch.

use std::fmt::Debug;

use ormbatch_proto::ComparisonOp;

/// Where a dialect puts a descriptor's hint text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintPlacement {
    /// Right after the table reference (`FROM t WITH (NOLOCK)`).
    AfterTable,
    /// As an optimizer comment before `SELECT` (`/*+ ... */ SELECT`).
    LeadingComment,
}

/// How a batch of statements is sent to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// One command text with all statements; placeholders are numbered
    /// across the whole batch.
    MultiStatement,
    /// One command per statement in the same round of calls; placeholders
    /// are numbered per statement.
    Sequential,
}

/// Row limit rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimitClause {
    /// Rendered right after `SELECT`.
    Prefix(String),
    /// Rendered at the end of the statement.
    Suffix(String),
}

/// Provider-specific SQL syntax.
pub trait Dialect: Debug + Send + Sync {
    /// Short dialect name.
    fn name(&self) -> &'static str;

    /// Quote a single identifier part.
    fn quote_part(&self, part: &str) -> String;

    /// Placeholder for the parameter at 1-based `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Batch transport.
    fn batch_mode(&self) -> BatchMode;

    /// Hint placement.
    fn hint_placement(&self) -> HintPlacement {
        HintPlacement::AfterTable
    }

    /// Quote a possibly qualified identifier (`schema.table`).
    fn quote_identifier(&self, ident: &str) -> String {
        if ident == "*" {
            return ident.to_string();
        }
        ident
            .split('.')
            .map(|part| self.quote_part(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// SQL spelling of a comparison operator, or `None` if the dialect
    /// cannot express it.
    fn operator(&self, op: ComparisonOp) -> Option<&'static str> {
        standard_operator(op)
    }

    /// Suffix after LIKE patterns that declares the backslash escape, for
    /// dialects without it as default.
    fn like_escape(&self) -> Option<&'static str> {
        None
    }

    /// Row limit clause.
    fn limit(&self, limit: u64) -> LimitClause {
        LimitClause::Suffix(format!("LIMIT {limit}"))
    }

    /// Cast expression for a typed projection.
    fn cast(&self, expr: &str, sql_type: &str, size: Option<u32>) -> String {
        match size {
            Some(size) => format!("CAST({expr} AS {sql_type}({size}))"),
            None => format!("CAST({expr} AS {sql_type})"),
        }
    }

    /// Text placed between statements of a multi-statement batch.
    fn statement_separator(&self) -> &'static str {
        ";\n"
    }
}

fn standard_operator(op: ComparisonOp) -> Option<&'static str> {
    Some(match op {
        ComparisonOp::Eq => "=",
        ComparisonOp::Ne => "<>",
        ComparisonOp::Lt => "<",
        ComparisonOp::Le => "<=",
        ComparisonOp::Gt => ">",
        ComparisonOp::Ge => ">=",
        ComparisonOp::Like => "LIKE",
        ComparisonOp::NotLike => "NOT LIKE",
        ComparisonOp::In => "IN",
        ComparisonOp::NotIn => "NOT IN",
        ComparisonOp::Between => "BETWEEN",
        ComparisonOp::NotBetween => "NOT BETWEEN",
        ComparisonOp::IsNull => "IS NULL",
        ComparisonOp::IsNotNull => "IS NOT NULL",
        ComparisonOp::ILike | ComparisonOp::NotILike => return None,
    })
}

fn quote_with(part: &str, open: char, close: char) -> String {
    let mut quoted = String::with_capacity(part.len() + 2);
    quoted.push(open);
    for c in part.chars() {
        if c == close {
            quoted.push(close);
        }
        quoted.push(c);
    }
    quoted.push(close);
    quoted
}

/// PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_part(&self, part: &str) -> String {
        quote_with(part, '"', '"')
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn batch_mode(&self) -> BatchMode {
        BatchMode::Sequential
    }

    fn hint_placement(&self) -> HintPlacement {
        HintPlacement::LeadingComment
    }

    fn operator(&self, op: ComparisonOp) -> Option<&'static str> {
        match op {
            ComparisonOp::ILike => Some("ILIKE"),
            ComparisonOp::NotILike => Some("NOT ILIKE"),
            other => standard_operator(other),
        }
    }
}

/// MySQL / MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_part(&self, part: &str) -> String {
        quote_with(part, '`', '`')
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn batch_mode(&self) -> BatchMode {
        BatchMode::MultiStatement
    }
}

/// SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_part(&self, part: &str) -> String {
        quote_with(part, '"', '"')
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{index}")
    }

    fn batch_mode(&self) -> BatchMode {
        BatchMode::Sequential
    }

    fn like_escape(&self) -> Option<&'static str> {
        Some("ESCAPE '\\'")
    }
}

/// Microsoft SQL Server.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl Dialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn quote_part(&self, part: &str) -> String {
        quote_with(part, '[', ']')
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@p{index}")
    }

    fn batch_mode(&self) -> BatchMode {
        BatchMode::MultiStatement
    }

    fn like_escape(&self) -> Option<&'static str> {
        Some("ESCAPE '\\'")
    }

    fn limit(&self, limit: u64) -> LimitClause {
        LimitClause::Prefix(format!("TOP ({limit})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(PostgresDialect.quote_identifier("users"), "\"users\"");
        assert_eq!(
            PostgresDialect.quote_identifier("public.users"),
            "\"public\".\"users\""
        );
        assert_eq!(PostgresDialect.quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(MySqlDialect.quote_identifier("users"), "`users`");
        assert_eq!(SqlServerDialect.quote_identifier("dbo.users"), "[dbo].[users]");
        assert_eq!(SqlServerDialect.quote_identifier("a]b"), "[a]]b]");
        assert_eq!(SqliteDialect.quote_identifier("*"), "*");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(PostgresDialect.placeholder(3), "$3");
        assert_eq!(SqlServerDialect.placeholder(1), "@p1");
        assert_eq!(MySqlDialect.placeholder(9), "?");
        assert_eq!(SqliteDialect.placeholder(2), "?2");
    }

    #[test]
    fn test_ilike_only_on_postgres() {
        assert_eq!(PostgresDialect.operator(ComparisonOp::ILike), Some("ILIKE"));
        assert_eq!(MySqlDialect.operator(ComparisonOp::ILike), None);
        assert_eq!(SqliteDialect.operator(ComparisonOp::NotILike), None);
        assert_eq!(SqlServerDialect.operator(ComparisonOp::Ne), Some("<>"));
    }

    #[test]
    fn test_limit_and_cast() {
        assert_eq!(
            SqlServerDialect.limit(5),
            LimitClause::Prefix("TOP (5)".into())
        );
        assert_eq!(PostgresDialect.limit(5), LimitClause::Suffix("LIMIT 5".into()));
        assert_eq!(
            MySqlDialect.cast("`name`", "CHAR", Some(50)),
            "CAST(`name` AS CHAR(50))"
        );
    }
}
