use std::fmt::Display;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
#[error("Invalid character: {token}")]
#[diagnostic(help(
    "statements may only contain numbers, variable names, `=`, `+ - * / %` and parentheses"
))]
pub struct LexError {
    #[label("this character")]
    bad_bit: SourceSpan,

    pub token: char,
}

impl LexError {
    /// Byte offset of the offending character in the statement.
    pub fn offset(&self) -> usize {
        self.bad_bit.offset()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    pub literal: &'de str,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    Ident,
    /// `+` or `-`
    AdditiveOp,
    /// `*`, `/` or `%`
    MultiplicativeOp,
    Paren,
    Assign,
    End,
}

impl<'de> Token<'de> {
    pub fn end(offset: usize) -> Self {
        Token {
            kind: TokenKind::End,
            literal: "",
            offset,
        }
    }

    /// The literal carried by the token. `=` and the end sentinel carry none.
    pub fn payload(&self) -> Option<&'de str> {
        match self.kind {
            TokenKind::Assign | TokenKind::End => None,
            _ => Some(self.literal),
        }
    }

    pub fn span(&self) -> SourceSpan {
        SourceSpan::from(self.offset..self.offset + self.literal.len())
    }

    pub fn is_paren(&self, paren: &str) -> bool {
        self.kind == TokenKind::Paren && self.literal == paren
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Number => write!(f, "NUMBER"),
            TokenKind::Ident => write!(f, "IDENTIFIER"),
            TokenKind::AdditiveOp => write!(f, "ADDITIVE_OP"),
            TokenKind::MultiplicativeOp => write!(f, "MULTIPLICATIVE_OP"),
            TokenKind::Paren => write!(f, "PAREN"),
            TokenKind::Assign => write!(f, "ASSIGN"),
            TokenKind::End => write!(f, "END"),
        }
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.payload() {
            Some(lit) => write!(f, "{} {lit}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Pull-based scanner over one statement. Yields exactly one `End` token once
/// the input is exhausted, then stops.
pub struct Lexer<'de> {
    whole: &'de str,
    rest: &'de str,
    byte: usize,
    finished: bool,
}

impl<'de> Lexer<'de> {
    pub fn new(input: &'de str) -> Self {
        Lexer {
            whole: input,
            rest: input,
            byte: 0,
            finished: false,
        }
    }
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Result<Token<'de>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let mut chars = self.rest.chars();
            let Some(c) = chars.next() else {
                self.finished = true;
                return Some(Ok(Token::end(self.whole.len())));
            };
            let offset = self.byte;
            let literal = &self.rest[..c.len_utf8()];
            let cur = self.rest;
            self.rest = chars.as_str();
            self.byte += c.len_utf8();

            enum Started {
                Ident,
                Number,
            }

            let process = |kind: TokenKind| {
                Some(Ok(Token {
                    kind,
                    literal,
                    offset,
                }))
            };

            let started = match c {
                '(' | ')' => return process(TokenKind::Paren),
                '+' | '-' => return process(TokenKind::AdditiveOp),
                '*' | '/' | '%' => return process(TokenKind::MultiplicativeOp),
                '=' => return process(TokenKind::Assign),
                'a'..='z' | 'A'..='Z' => Started::Ident,
                '0'..='9' => Started::Number,
                c if c.is_whitespace() => continue,
                c => {
                    return Some(Err(LexError {
                        bad_bit: SourceSpan::from(offset..self.byte),
                        token: c,
                    }));
                }
            };

            let (kind, len) = match started {
                Started::Ident => {
                    let first_non_ident = cur
                        .find(|c: char| !c.is_ascii_alphanumeric())
                        .unwrap_or(cur.len());
                    (TokenKind::Ident, first_non_ident)
                }
                Started::Number => {
                    let digits =
                        |s: &str| s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
                    let integral = digits(cur);
                    // a trailing `.` with no fraction digits still belongs to the numeral
                    let len = match cur[integral..].strip_prefix('.') {
                        Some(fraction) => integral + 1 + digits(fraction),
                        None => integral,
                    };
                    (TokenKind::Number, len)
                }
            };

            let extra_bytes = len - c.len_utf8();
            self.byte += extra_bytes;
            self.rest = &self.rest[extra_bytes..];

            return Some(Ok(Token {
                kind,
                literal: &cur[..len],
                offset,
            }));
        }
    }
}

/// Lex a whole statement into an `End`-terminated token sequence, stopping at
/// the first unrecognized character.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, LexError> {
    Lexer::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(source: &str) -> Vec<(TokenKind, Option<&str>)> {
        tokenize(source)
            .unwrap()
            .iter()
            .map(|token| (token.kind, token.payload()))
            .collect()
    }

    #[test]
    fn addition() {
        assert_eq!(
            shape("1 + 2"),
            vec![
                (TokenKind::Number, Some("1")),
                (TokenKind::AdditiveOp, Some("+")),
                (TokenKind::Number, Some("2")),
                (TokenKind::End, None),
            ]
        );
    }

    #[test]
    fn assignment_has_no_payload() {
        assert_eq!(
            shape("total = 3"),
            vec![
                (TokenKind::Ident, Some("total")),
                (TokenKind::Assign, None),
                (TokenKind::Number, Some("3")),
                (TokenKind::End, None),
            ]
        );
    }

    #[test]
    fn parens_and_tiers() {
        assert_eq!(
            shape("3 * (4 - 5) % 2 / x"),
            vec![
                (TokenKind::Number, Some("3")),
                (TokenKind::MultiplicativeOp, Some("*")),
                (TokenKind::Paren, Some("(")),
                (TokenKind::Number, Some("4")),
                (TokenKind::AdditiveOp, Some("-")),
                (TokenKind::Number, Some("5")),
                (TokenKind::Paren, Some(")")),
                (TokenKind::MultiplicativeOp, Some("%")),
                (TokenKind::Number, Some("2")),
                (TokenKind::MultiplicativeOp, Some("/")),
                (TokenKind::Ident, Some("x")),
                (TokenKind::End, None),
            ]
        );
    }

    #[test]
    fn numerals() {
        assert_eq!(
            shape("2.75 10 5."),
            vec![
                (TokenKind::Number, Some("2.75")),
                (TokenKind::Number, Some("10")),
                (TokenKind::Number, Some("5.")),
                (TokenKind::End, None),
            ]
        );
    }

    #[test]
    fn identifiers_take_trailing_digits() {
        assert_eq!(
            shape("x2=2x"),
            vec![
                (TokenKind::Ident, Some("x2")),
                (TokenKind::Assign, None),
                (TokenKind::Number, Some("2")),
                (TokenKind::Ident, Some("x")),
                (TokenKind::End, None),
            ]
        );
    }

    #[test]
    fn empty_and_blank_input() {
        assert_eq!(shape(""), vec![(TokenKind::End, None)]);
        assert_eq!(shape(" \t  "), vec![(TokenKind::End, None)]);
    }

    #[test]
    fn offsets_point_into_source() {
        let tokens = tokenize("ab =  12").unwrap();
        let offsets: Vec<usize> = tokens.iter().map(|token| token.offset).collect();
        assert_eq!(offsets, vec![0, 3, 6, 8]);
        assert_eq!(tokens[2].span(), SourceSpan::from(6..8));
    }

    #[test]
    fn invalid_character() {
        let err = tokenize("a = 1 ? 2").unwrap_err();
        assert_eq!(err.token, '?');
        assert_eq!(err.offset(), 6);
        assert_eq!(err.to_string(), "Invalid character: ?");
    }

    #[test]
    fn underscore_is_not_an_identifier_character() {
        let err = tokenize("var_name").unwrap_err();
        assert_eq!(err.token, '_');
        assert_eq!(err.offset(), 3);
    }

    #[test]
    fn lexer_stops_after_end() {
        let mut lexer = Lexer::new("x");
        assert!(matches!(lexer.next(), Some(Ok(Token { kind: TokenKind::Ident, .. }))));
        assert!(matches!(lexer.next(), Some(Ok(Token { kind: TokenKind::End, .. }))));
        assert!(lexer.next().is_none());
    }

    #[test]
    fn display() {
        let rendered: Vec<String> = tokenize("n = (4)")
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            rendered,
            vec!["IDENTIFIER n", "ASSIGN", "PAREN (", "NUMBER 4", "PAREN )", "END"]
        );
    }
}
