//! Attribute value-format validation.
//!
//! spec.md explicitly places "the regular-expression library used by
//! syntax checks" out of scope as an external collaborator "replaceable by
//! trivial equivalents" — so rather than pull in a full regex engine (the
//! teacher crate pulls in none either), attribute formats are compiled into
//! a small glob-style matcher supporting the subset the on-disk
//! `attribute_defs` templates actually use: literal text, `.` (any
//! character), `*` and `+` (zero-or-more / one-or-more of the preceding
//! atom), and `[...]`/`[^...]` character classes. Patterns are declared
//! with the `re: ` prefix per spec.md §3; the prefix is stripped before
//! compiling. A whole pattern must match the whole value.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repeat {
    One,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug, Clone)]
enum Match {
    Literal(char),
    AnyChar,
    Class { chars: Vec<char>, negated: bool },
}

#[derive(Debug, Clone)]
struct Token {
    atom: Match,
    repeat: Repeat,
}

impl Match {
    fn accepts(&self, c: char) -> bool {
        match self {
            Match::Literal(l) => *l == c,
            Match::AnyChar => true,
            Match::Class { chars, negated } => chars.contains(&c) != *negated,
        }
    }
}

/// A compiled value-format validator.
#[derive(Debug, Clone)]
pub struct Format {
    tokens: Vec<Token>,
}

impl Format {
    /// Compiles `pattern`, stripping a leading `re: ` tag if present.
    pub fn compile(pattern: &str) -> Format {
        let pattern = pattern.strip_prefix("re:").map(str::trim).unwrap_or(pattern);
        Format { tokens: parse(pattern) }
    }

    /// Whole-string match.
    pub fn matches(&self, value: &str) -> bool {
        let chars: Vec<char> = value.chars().collect();
        match_tokens(&self.tokens, &chars, 0)
    }
}

fn parse(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (atom, consumed) = match chars[i] {
            '.' => (Match::AnyChar, 1),
            '[' => parse_class(&chars[i..]),
            '\\' if i + 1 < chars.len() => (Match::Literal(chars[i + 1]), 2),
            c => (Match::Literal(c), 1),
        };
        i += consumed;

        let repeat = match chars.get(i) {
            Some('*') => {
                i += 1;
                Repeat::ZeroOrMore
            }
            Some('+') => {
                i += 1;
                Repeat::OneOrMore
            }
            _ => Repeat::One,
        };

        tokens.push(Token { atom, repeat });
    }
    tokens
}

/// Parses a `[abc]` or `[^abc]` class starting at `rest[0] == '['`. Returns
/// the atom and the number of source characters consumed, including both
/// brackets.
fn parse_class(rest: &[char]) -> (Match, usize) {
    let mut i = 1;
    let negated = rest.get(i) == Some(&'^');
    if negated {
        i += 1;
    }
    let mut chars = Vec::new();
    while i < rest.len() && rest[i] != ']' {
        chars.push(rest[i]);
        i += 1;
    }
    // consume the closing ']' if present
    let consumed = if i < rest.len() { i + 1 } else { i };
    (Match::Class { chars, negated }, consumed)
}

fn match_tokens(tokens: &[Token], chars: &[char], pos: usize) -> bool {
    match tokens.first() {
        None => pos == chars.len(),
        Some(token) => match token.repeat {
            Repeat::One => {
                pos < chars.len()
                    && token.atom.accepts(chars[pos])
                    && match_tokens(&tokens[1..], chars, pos + 1)
            }
            Repeat::ZeroOrMore | Repeat::OneOrMore => {
                let min = if token.repeat == Repeat::OneOrMore { 1 } else { 0 };
                let mut count = 0;
                let mut end = pos;
                while end < chars.len() && token.atom.accepts(chars[end]) {
                    end += 1;
                    count += 1;
                }
                // greedy with backtracking: try consuming as much as
                // possible first, then back off until the rest matches.
                while count >= min {
                    if match_tokens(&tokens[1..], chars, pos + count) {
                        return true;
                    }
                    if count == 0 {
                        break;
                    }
                    count -= 1;
                }
                false
            }
        },
    }
}

/// Checks `value` against `pattern` (an `re: `-tagged or bare format
/// string). Compiles on every call; callers validating many values against
/// the same attribute should cache a [`Format`] instead.
pub fn matches(pattern: &str, value: &str) -> bool {
    Format::compile(pattern).matches(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_must_match_exactly() {
        assert!(matches("abc", "abc"));
        assert!(!matches("abc", "abcd"));
    }

    #[test]
    fn dot_matches_any_single_char() {
        assert!(matches("a.c", "abc"));
        assert!(!matches("a.c", "ac"));
    }

    #[test]
    fn star_matches_zero_or_more() {
        assert!(matches("ab*c", "ac"));
        assert!(matches("ab*c", "abbbc"));
    }

    #[test]
    fn plus_requires_at_least_one() {
        assert!(!matches("ab+c", "ac"));
        assert!(matches("ab+c", "abc"));
    }

    #[test]
    fn character_class_and_negation() {
        assert!(matches("[0-9]*", "0-9"));
        assert!(matches("[^0-9]*", "abc"));
        assert!(!matches("[^0-9]*", "a1"));
    }

    #[test]
    fn strips_re_tag_prefix() {
        assert!(matches("re: [a-z]+", "hello"));
    }
}
