//! Error taxonomy for the statement pipeline.
//!
//! Each stage has its own diagnostic type carrying spans into the statement
//! text. [`Error`] wraps them so callers can report a failure together with
//! its [`ErrorKind`].

use std::fmt::Display;

use miette::{Diagnostic, Report};
use serde::Serialize;
use thiserror::Error;

use crate::{
    eval::{ArithmeticError, NameError},
    lex::LexError,
    parse::ParseError,
};

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Arithmetic(#[from] ArithmeticError),

    /// A postfix sequence broke its own framing. Compiled sequences never do.
    #[error("malformed postfix sequence: {0}")]
    #[diagnostic(help("this is a bug in the postfix compiler"))]
    Malformed(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Lex,
    Parse,
    Name,
    Arithmetic,
    Internal,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Lex => write!(f, "Lex Error"),
            ErrorKind::Parse => write!(f, "Parse Error"),
            ErrorKind::Name => write!(f, "Name Error"),
            ErrorKind::Arithmetic => write!(f, "Arithmetic Error"),
            ErrorKind::Internal => write!(f, "Internal Error"),
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Lex(_) => ErrorKind::Lex,
            Error::Parse(_) => ErrorKind::Parse,
            Error::Name(_) => ErrorKind::Name,
            Error::Arithmetic(_) => ErrorKind::Arithmetic,
            Error::Malformed(_) => ErrorKind::Internal,
        }
    }

    /// `Line <n>: <kind>: <message>`
    pub fn line_message(&self, line: usize) -> String {
        format!("Line {line}: {}: {self}", self.kind())
    }

    /// Attach the statement text so labels render against it.
    pub fn with_source(self, source: &str) -> Report {
        Report::new(self).with_source_code(source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Environment, evaluate_statement};

    fn fail(source: &str) -> Error {
        evaluate_statement(source, &mut Environment::new()).unwrap_err()
    }

    #[test]
    fn kinds_are_preserved() {
        assert_eq!(fail("a = 1 ? 2").kind(), ErrorKind::Lex);
        assert_eq!(fail("a = 1 +").kind(), ErrorKind::Parse);
        assert_eq!(fail("a = b").kind(), ErrorKind::Name);
        assert_eq!(fail("a = 1 / 0").kind(), ErrorKind::Arithmetic);
    }

    #[test]
    fn line_messages() {
        assert_eq!(
            fail("y = x + 1").line_message(2),
            "Line 2: Name Error: Variable `x` is not defined."
        );
        assert_eq!(
            fail("c = 4 % 0").line_message(7),
            "Line 7: Arithmetic Error: modulo by zero"
        );
        assert_eq!(
            fail("$ = 1").line_message(1),
            "Line 1: Lex Error: Invalid character: $"
        );
    }

    #[test]
    fn diagnostics_keep_their_labels() {
        let err = fail("total = price * qty");
        let labels: Vec<_> = err.labels().into_iter().flatten().collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].offset(), 8);
        assert_eq!(labels[0].len(), 5);
        assert!(err.help().is_some());
    }

    #[test]
    fn report_renders_with_source() {
        let report = fail("x = (1 + 2").with_source("x = (1 + 2");
        assert!(report.source_code().is_some());
        assert_eq!(
            report.to_string(),
            "expected closing parenthesis ')', got END"
        );
    }
}
