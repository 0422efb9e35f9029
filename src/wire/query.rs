//! Query grammar parser (spec.md §4.3):
//!
//! ```text
//! query    := [class] or_expr
//! or_expr  := and_expr ( OR and_expr )*
//! and_expr := term     ( AND term    )*
//! term     := VALUE | '"'VALUE'"' | attr op VALUE
//! op       := '=' | '!='
//! ```

use crate::model::is_identifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
}

/// One leaf of the query: either a bare value matched against any indexed
/// attribute, or an `attr op value` restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub attr: Option<String>,
    pub op: Op,
    pub value: String,
}

/// A chain of terms joined by implicit or explicit `AND`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndExpr {
    pub terms: Vec<Term>,
}

/// A chain of `AndExpr` branches joined by `OR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrExpr {
    pub branches: Vec<AndExpr>,
}

/// A full parsed query, with an optional leading class restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub class: Option<String>,
    pub expr: OrExpr,
}

/// Errors produced while parsing or validating a query, mapping 1:1 to the
/// wire error taxonomy (spec.md §4.3, §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Empty query, or a term in a position the grammar forbids.
    Syntax,
    /// A `*` appeared but `query-allow-wildcard` is disabled.
    WildcardDisallowed,
    /// A leading `*` appeared but `query-allow-substring` is disabled.
    SubstringDisallowed,
    /// The query exceeded the configured term-count fanout bound.
    TooComplex,
}

/// Policy knobs from the main config that gate which queries are
/// syntactically acceptable (spec.md §4.1, §4.3).
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    pub allow_wildcard: bool,
    pub allow_substring: bool,
    pub max_terms: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions { allow_wildcard: false, allow_substring: false, max_terms: 32 }
    }
}

/// Parses `line` (a non-directive line already stripped of control
/// characters) into a [`Query`].
pub fn parse(line: &str, options: &ParseOptions) -> Result<Query, QueryError> {
    let tokens = tokenize(line);
    if tokens.is_empty() {
        return Err(QueryError::Syntax);
    }

    let (class, rest) = if tokens.len() > 1 && is_bare_class_candidate(&tokens[0]) {
        (Some(tokens[0].clone()), &tokens[1..])
    } else {
        (None, &tokens[..])
    };

    let expr = parse_or_expr(rest, options)?;
    if expr.branches.iter().map(|b| b.terms.len()).sum::<usize>() > options.max_terms {
        return Err(QueryError::TooComplex);
    }

    Ok(Query { class, expr })
}

fn is_bare_class_candidate(token: &str) -> bool {
    is_identifier(token) && !token.eq_ignore_ascii_case("and") && !token.eq_ignore_ascii_case("or")
}

fn parse_or_expr(tokens: &[String], options: &ParseOptions) -> Result<OrExpr, QueryError> {
    let mut branches = Vec::new();
    let mut current = Vec::new();
    for token in tokens {
        if token.eq_ignore_ascii_case("or") {
            branches.push(parse_and_expr(&current, options)?);
            current = Vec::new();
        } else {
            current.push(token.clone());
        }
    }
    branches.push(parse_and_expr(&current, options)?);
    if branches.is_empty() {
        return Err(QueryError::Syntax);
    }
    Ok(OrExpr { branches })
}

fn parse_and_expr(tokens: &[String], options: &ParseOptions) -> Result<AndExpr, QueryError> {
    let mut terms = Vec::new();
    for token in tokens {
        if token.eq_ignore_ascii_case("and") {
            continue;
        }
        terms.push(parse_term(token, options)?);
    }
    if terms.is_empty() {
        return Err(QueryError::Syntax);
    }
    Ok(AndExpr { terms })
}

fn parse_term(token: &str, options: &ParseOptions) -> Result<Term, QueryError> {
    let (attr, op, value) = if let Some((attr, value)) = token.split_once("!=") {
        (Some(attr), Op::Ne, value)
    } else if let Some((attr, value)) = token.split_once('=') {
        (Some(attr), Op::Eq, value)
    } else {
        (None, Op::Eq, token)
    };

    if let Some(attr) = attr {
        if attr.is_empty() || !is_identifier(attr) {
            return Err(QueryError::Syntax);
        }
    }
    if value.is_empty() {
        return Err(QueryError::Syntax);
    }

    check_wildcard(value, options)?;

    Ok(Term { attr: attr.map(str::to_string), op, value: value.to_string() })
}

fn check_wildcard(value: &str, options: &ParseOptions) -> Result<(), QueryError> {
    if value.starts_with('*') && !options.allow_substring {
        return Err(QueryError::SubstringDisallowed);
    }
    if value.contains('*') && !options.allow_wildcard {
        return Err(QueryError::WildcardDisallowed);
    }
    Ok(())
}

/// Splits a query line into whitespace-separated tokens, honoring
/// `"..."` quoting exactly like [`crate::wire::directive`].
fn tokenize(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = s.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }
        let mut token = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                token.push(c);
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ParseOptions {
        ParseOptions { allow_wildcard: true, allow_substring: true, max_terms: 32 }
    }

    #[test]
    fn parses_bare_attr_value_term() {
        let q = parse("Domain-Name=example.com", &opts()).unwrap();
        assert_eq!(q.class, None);
        assert_eq!(q.expr.branches.len(), 1);
        assert_eq!(q.expr.branches[0].terms[0].attr.as_deref(), Some("Domain-Name"));
        assert_eq!(q.expr.branches[0].terms[0].value, "example.com");
    }

    #[test]
    fn parses_leading_class_restriction() {
        let q = parse("domain Domain-Name=example.com", &opts()).unwrap();
        assert_eq!(q.class.as_deref(), Some("domain"));
    }

    #[test]
    fn implicit_and_between_terms() {
        let q = parse("Domain-Name=example.com ID=X.42", &opts()).unwrap();
        assert_eq!(q.expr.branches[0].terms.len(), 2);
    }

    #[test]
    fn or_splits_branches() {
        let q = parse("Domain-Name=example.com OR Domain-Name=other.com", &opts()).unwrap();
        assert_eq!(q.expr.branches.len(), 2);
    }

    #[test]
    fn wildcard_rejected_when_disallowed() {
        let strict = ParseOptions { allow_wildcard: false, allow_substring: false, max_terms: 32 };
        let err = parse("Domain-Name=foo*", &strict).unwrap_err();
        assert_eq!(err, QueryError::WildcardDisallowed);
    }

    #[test]
    fn leading_wildcard_requires_substring_flag() {
        let partial = ParseOptions { allow_wildcard: true, allow_substring: false, max_terms: 32 };
        let err = parse("*foo", &partial).unwrap_err();
        assert_eq!(err, QueryError::SubstringDisallowed);
    }

    #[test]
    fn too_many_terms_is_rejected() {
        let tight = ParseOptions { allow_wildcard: false, allow_substring: false, max_terms: 1 };
        let err = parse("Domain-Name=a ID=b", &tight).unwrap_err();
        assert_eq!(err, QueryError::TooComplex);
    }

    #[test]
    fn not_equal_operator() {
        let q = parse("Domain-Name!=example.com", &opts()).unwrap();
        assert_eq!(q.expr.branches[0].terms[0].op, Op::Ne);
    }
}
