//! Lexer for predicate expressions using logos.

use crate::error::ParseError;
use crate::span::Span;
use logos::Logos;

/// Token types for predicate expressions.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // Comparison operators
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // Logical operators
    #[token("&&")]
    #[token("and")]
    And,
    #[token("||")]
    #[token("or")]
    Or,
    #[token("!")]
    Bang,
    #[token("not")]
    Not,

    // Keyword operators
    #[token("in")]
    In,
    #[token("like")]
    Like,
    #[token("is")]
    Is,
    #[token("between")]
    Between,

    // Literals
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // Identifier
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // String literal (double-quoted)
    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len()-1])
    })]
    String(String),

    // String literal (single-quoted)
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len()-1])
    })]
    StringSingle(String),

    // Integer literal
    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    // Float literal
    #[regex(r"-?[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    // Punctuation
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
}

/// Unescape a string literal, handling common escape sequences.
fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// A token with its span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenize a source string.
///
/// Unlike a best-effort highlighter, the predicate front end must not
/// guess: the first unrecognized character is an error.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span: Span = lexer.span().into();
        match result {
            Ok(token) => tokens.push(SpannedToken { token, span }),
            Err(()) => return Err(invalid_token(lexer.slice(), span)),
        }
    }

    Ok(tokens)
}

fn invalid_token(slice: &str, span: Span) -> ParseError {
    let err = ParseError::new(format!("unexpected input '{}'", slice), span);
    match slice {
        "=" => err.with_hint("use '==' for equality comparison"),
        "&" => err.with_hint("use '&&' for conjunction"),
        "|" => err.with_hint("use '||' for disjunction"),
        _ => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("a == b && c != d || e < f");
        assert!(tokens.contains(&Token::Eq));
        assert!(tokens.contains(&Token::And));
        assert!(tokens.contains(&Token::Ne));
        assert!(tokens.contains(&Token::Or));
        assert!(tokens.contains(&Token::Lt));
    }

    #[test]
    fn test_word_operators() {
        let tokens = kinds("a and not b or c");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::And,
                Token::Not,
                Token::Ident("b".into()),
                Token::Or,
                Token::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn test_keywords_do_not_swallow_identifiers() {
        let tokens = kinds("notes island");
        assert_eq!(
            tokens,
            vec![Token::Ident("notes".into()), Token::Ident("island".into())]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("123 -456 3.14 -2.5");
        assert_eq!(tokens[0], Token::Int(123));
        assert_eq!(tokens[1], Token::Int(-456));
        assert_eq!(tokens[2], Token::Float(3.14));
        assert_eq!(tokens[3], Token::Float(-2.5));
    }

    #[test]
    fn test_string_escapes() {
        let tokens = kinds(r#""hello\nworld" 'tab\there'"#);
        assert_eq!(tokens[0], Token::String("hello\nworld".to_string()));
        assert_eq!(tokens[1], Token::StringSingle("tab\there".to_string()));
    }

    #[test]
    fn test_method_call_tokens() {
        let tokens = kinds(r#"name.starts_with("A")"#);
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[1], Token::Dot);
        assert_eq!(tokens[2], Token::Ident("starts_with".into()));
    }

    #[test]
    fn test_single_equals_is_error_with_hint() {
        let err = tokenize(r#"status = "active""#).unwrap_err();
        assert_eq!(err.span, Span::new(7, 8));
        assert_eq!(err.hint.as_deref(), Some("use '==' for equality comparison"));
    }
}
