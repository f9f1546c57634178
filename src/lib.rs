//! Evaluates `name = expression` statements.
//!
//! A statement goes through four stages: [`lex`] turns text into tokens,
//! [`parse`] builds the assignment tree, [`compile`] linearizes it into
//! postfix form and [`evaluate`] runs that form on a value stack against the
//! session's [`Environment`]. [`evaluate_statement`] chains them and
//! [`evaluate_batch`] runs many lines against one session.

use std::fmt::Display;

use serde::Serialize;
use tracing::{debug, trace};

pub mod batch;
pub mod compile;
pub mod error;
pub mod eval;
pub mod lex;
pub mod parse;

pub use batch::{BatchReport, LineError, LineResult, evaluate_batch, evaluate_source};
pub use compile::{Postfix, compile};
pub use error::{Error, ErrorKind};
pub use eval::{Environment, Number, evaluate};
pub use lex::{Lexer, Token, TokenKind};
pub use parse::{Expr, Parser, Statement};

/// A statement that ran to completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub name: String,
    pub value: Number,
    /// Space-joined postfix trace, e.g. `a 5 u- =`.
    pub postfix: String,
}

impl Display for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

pub fn lex(text: &str) -> Result<Vec<Token<'_>>, Error> {
    let tokens = lex::tokenize(text)?;
    trace!(count = tokens.len(), "lexed statement");
    Ok(tokens)
}

/// `Ok(None)` means the line held no statement at all.
pub fn parse(tokens: Vec<Token<'_>>) -> Result<Option<Statement<'_>>, Error> {
    Ok(Parser::new(tokens).parse()?)
}

pub fn run(
    statement: &Statement<'_>,
    environment: &mut Environment,
) -> Result<(String, Number), Error> {
    evaluate(&compile(statement), environment)
}

/// Lex, parse, compile and evaluate one line. Blank lines yield `Ok(None)`
/// and leave the environment untouched.
pub fn evaluate_statement(
    text: &str,
    environment: &mut Environment,
) -> Result<Option<Evaluation>, Error> {
    let Some(statement) = parse(lex(text)?)? else {
        return Ok(None);
    };

    let postfix = compile(&statement);
    trace!(%postfix, "compiled statement");

    let (name, value) = evaluate(&postfix, environment)?;
    debug!(%name, %value, %postfix, "evaluated statement");

    Ok(Some(Evaluation {
        name,
        value,
        postfix: postfix.to_string(),
    }))
}
