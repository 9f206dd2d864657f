//! ormbatch predicate language
//!
//! A small expression language for writing row predicates as text. It
//! produces the same [`Expr`](ormbatch_proto::Expr) tree as the builder in
//! `ormbatch-proto`, so both forms flow through one normalizer.
//!
//! # Syntax
//!
//! ```text
//! status == "active"
//! age > 30 && age < 50
//! (role == 'admin' || role == 'owner') and not deleted
//! email is not null
//! status in ["new", "open"]
//! name like "A%"
//! age between 18 and 65
//! name.starts_with("Al")
//! ```
//!
//! Method calls are parsed for any method name; whether a call has a filter
//! equivalent is decided later, during normalization.
//!
//! # Usage
//!
//! ```rust
//! use ormbatch_lang::parse;
//! use ormbatch_proto::col;
//!
//! let expr = parse("age > 30 && age < 50").unwrap();
//! assert_eq!(expr, col("age").gt(30).and(col("age").lt(50)));
//! ```

pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;

pub use error::ParseError;
pub use span::Span;

use ormbatch_proto::Expr;

/// Parse a predicate expression into an [`Expr`].
///
/// # Example
///
/// ```rust
/// use ormbatch_lang::parse;
///
/// let expr = parse(r#"status == "active""#).unwrap();
/// ```
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    parser::parse(source)
}

/// Tokenize a source string (for debugging/testing).
pub fn tokenize(source: &str) -> Result<Vec<lexer::SpannedToken>, ParseError> {
    lexer::tokenize(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormbatch_proto::col;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_realistic_predicate() {
        let source = r#"
            (role == "admin" || role == "owner")
                && deleted_at is null
                && age >= 21
        "#;
        let expr = parse(source).unwrap();
        assert_eq!(
            expr,
            col("role")
                .eq("admin")
                .or(col("role").eq("owner"))
                .and(col("deleted_at").is_null())
                .and(col("age").ge(21))
        );
    }

    #[test]
    fn test_error_with_source_context() {
        let source = r#"status = "active""#;
        let err = parse(source).unwrap_err();
        let formatted = err.format_with_source(source);
        assert!(formatted.contains("line 1"));
        assert!(formatted.contains("hint"));
    }
}
