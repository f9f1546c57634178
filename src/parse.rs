use std::{fmt::Display, iter::Peekable, mem, vec};

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::{
    eval::Number,
    lex::{Token, TokenKind},
};

/// Groups and unary signs deeper than this are rejected rather than risking
/// the native stack.
const MAX_DEPTH: usize = 256;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected variable name, got {found}")]
    #[diagnostic(help("every statement has the form `name = expression`"))]
    ExpectedVariableName {
        found: String,
        #[label("expected a variable name here")]
        span: SourceSpan,
    },

    #[error("expected '=' after variable name, got {found}")]
    #[diagnostic(help("every statement has the form `name = expression`"))]
    ExpectedAssign {
        found: String,
        #[label("expected `=` here")]
        span: SourceSpan,
    },

    #[error("expected closing parenthesis ')', got {found}")]
    #[diagnostic(help("add a `)` to close the group"))]
    UnclosedParen {
        found: String,
        #[label("this parenthesis is never closed")]
        open: SourceSpan,
        #[label("expected `)` here")]
        span: SourceSpan,
    },

    #[error("expected an expression, got {found}")]
    #[diagnostic(help("an operand is a number, a variable, a signed operand or a `( ... )` group"))]
    ExpectedExpression {
        found: String,
        #[label("expected an operand here")]
        span: SourceSpan,
    },

    #[error("unexpected token after statement: {found}")]
    #[diagnostic(help("write one statement per line"))]
    TrailingToken {
        found: String,
        #[label("the statement already ended")]
        span: SourceSpan,
    },

    #[error("invalid numeric literal `{literal}`: {reason}")]
    #[diagnostic(help("integer literals must fit in 64 bits; add a `.` for floating point"))]
    InvalidNumber {
        literal: String,
        reason: String,
        #[label("this numeric literal")]
        span: SourceSpan,
    },

    #[error("unknown operator `{symbol}`")]
    UnknownOperator {
        symbol: String,
        #[label("not an operator")]
        span: SourceSpan,
    },

    #[error("expression is nested too deeply")]
    #[diagnostic(help("split the expression over several statements"))]
    TooDeep {
        #[label("nesting limit reached here")]
        span: SourceSpan,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

impl BinaryOp {
    pub fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
            BinaryOp::Rem => '%',
        }
    }

    fn from_token(token: &Token<'_>) -> Result<Self, ParseError> {
        Ok(match token.literal {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            _ => return Err(unknown_operator(token)),
        })
    }
}

impl UnaryOp {
    pub fn symbol(self) -> char {
        match self {
            UnaryOp::Plus => '+',
            UnaryOp::Minus => '-',
        }
    }

    fn from_token(token: &Token<'_>) -> Result<Self, ParseError> {
        Ok(match token.literal {
            "+" => UnaryOp::Plus,
            "-" => UnaryOp::Minus,
            _ => return Err(unknown_operator(token)),
        })
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

fn unknown_operator(token: &Token<'_>) -> ParseError {
    ParseError::UnknownOperator {
        symbol: token.literal.to_string(),
        span: token.span(),
    }
}

/// The root of every parsed line: `target = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement<'de> {
    pub target: &'de str,
    pub value: Expr<'de>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'de> {
    Binary {
        op: BinaryOp,
        left: Box<Expr<'de>>,
        right: Box<Expr<'de>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr<'de>>,
    },
    Number(Number),
    /// `offset` is the byte position of the name in the statement text.
    Variable { name: &'de str, offset: usize },
}

impl<'de> Expr<'de> {
    pub fn binary(op: BinaryOp, left: Expr<'de>, right: Expr<'de>) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr<'de>) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }
}

/// Operator chains nest one level per operator, so a long line builds a tree
/// far deeper than the parenthesis limit. Children are detached onto a heap
/// stack before they drop, keeping the native stack flat.
impl Drop for Expr<'_> {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_children(self, &mut pending);
        while let Some(mut expr) = pending.pop() {
            detach_children(&mut expr, &mut pending);
        }
    }
}

fn detach_children<'de>(expr: &mut Expr<'de>, out: &mut Vec<Expr<'de>>) {
    let mut take = |child: &mut Box<Expr<'de>>| {
        out.push(mem::replace(&mut **child, Expr::Number(Number::Int(0))));
    };
    match expr {
        Expr::Binary { left, right, .. } => {
            take(left);
            take(right);
        }
        Expr::Unary { operand, .. } => take(operand),
        Expr::Number(_) | Expr::Variable { .. } => {}
    }
}

enum Piece<'a, 'de> {
    Expr(&'a Expr<'de>),
    Op(BinaryOp),
    Close,
}

/// Fully parenthesized infix rendering, handy for checking how a statement
/// was grouped.
impl Display for Expr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut pieces = vec![Piece::Expr(self)];
        while let Some(piece) = pieces.pop() {
            match piece {
                Piece::Expr(Expr::Binary { op, left, right }) => {
                    f.write_str("(")?;
                    pieces.extend([
                        Piece::Close,
                        Piece::Expr(right),
                        Piece::Op(*op),
                        Piece::Expr(left),
                    ]);
                }
                Piece::Expr(Expr::Unary { op, operand }) => {
                    write!(f, "({op}")?;
                    pieces.extend([Piece::Close, Piece::Expr(operand)]);
                }
                Piece::Expr(Expr::Number(n)) => write!(f, "{n}")?,
                Piece::Expr(Expr::Variable { name, .. }) => f.write_str(name)?,
                Piece::Op(op) => write!(f, " {op} ")?,
                Piece::Close => f.write_str(")")?,
            }
        }
        Ok(())
    }
}

impl Display for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.target, self.value)
    }
}

/// Recursive-descent parser for a single statement:
///
/// ```text
/// statement  := IDENTIFIER ASSIGN expression
/// expression := term (ADDITIVE_OP term)*
/// term       := factor (MULTIPLICATIVE_OP factor)*
/// factor     := ADDITIVE_OP factor | NUMBER | IDENTIFIER | '(' expression ')'
/// ```
pub struct Parser<'de> {
    tokens: Peekable<vec::IntoIter<Token<'de>>>,
    end: Token<'de>,
    depth: usize,
}

impl<'de> Parser<'de> {
    pub fn new(tokens: Vec<Token<'de>>) -> Self {
        // a sequence missing its sentinel behaves as if one followed the last token
        let end = match tokens.last() {
            Some(last) if last.kind == TokenKind::End => *last,
            Some(last) => Token::end(last.offset + last.literal.len()),
            None => Token::end(0),
        };
        Parser {
            tokens: tokens.into_iter().peekable(),
            end,
            depth: 0,
        }
    }

    /// Parse one statement. An input holding nothing but `End` yields `None`.
    pub fn parse(mut self) -> Result<Option<Statement<'de>>, ParseError> {
        if self.peek().kind == TokenKind::End {
            return Ok(None);
        }

        let statement = self.parse_statement()?;

        let next = self.peek();
        if next.kind != TokenKind::End {
            return Err(ParseError::TrailingToken {
                found: next.to_string(),
                span: next.span(),
            });
        }

        Ok(Some(statement))
    }

    fn peek(&mut self) -> Token<'de> {
        self.tokens.peek().copied().unwrap_or(self.end)
    }

    fn advance(&mut self) -> Token<'de> {
        self.tokens.next().unwrap_or(self.end)
    }

    fn expect(
        &mut self,
        expected: TokenKind,
        error: impl FnOnce(&Token<'de>) -> ParseError,
    ) -> Result<Token<'de>, ParseError> {
        let token = self.peek();
        if token.kind == expected {
            Ok(self.advance())
        } else {
            Err(error(&token))
        }
    }

    fn parse_statement(&mut self) -> Result<Statement<'de>, ParseError> {
        let target = self.expect(TokenKind::Ident, |token| {
            ParseError::ExpectedVariableName {
                found: token.to_string(),
                span: token.span(),
            }
        })?;

        self.expect(TokenKind::Assign, |token| ParseError::ExpectedAssign {
            found: token.to_string(),
            span: token.span(),
        })?;

        let value = self.parse_expression()?;

        Ok(Statement {
            target: target.literal,
            value,
        })
    }

    fn parse_expression(&mut self) -> Result<Expr<'de>, ParseError> {
        let mut lhs = self.parse_term()?;

        while self.peek().kind == TokenKind::AdditiveOp {
            let op = BinaryOp::from_token(&self.advance())?;
            let rhs = self.parse_term()?;
            lhs = Expr::binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr<'de>, ParseError> {
        let mut lhs = self.parse_factor()?;

        while self.peek().kind == TokenKind::MultiplicativeOp {
            let op = BinaryOp::from_token(&self.advance())?;
            let rhs = self.parse_factor()?;
            lhs = Expr::binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr<'de>, ParseError> {
        let token = self.peek();

        match token.kind {
            TokenKind::AdditiveOp => {
                self.advance();
                let op = UnaryOp::from_token(&token)?;
                let operand = self.nested(&token, Self::parse_factor)?;
                Ok(Expr::unary(op, operand))
            }
            TokenKind::Number => {
                self.advance();
                Ok(Expr::Number(number(&token)?))
            }
            TokenKind::Ident => {
                self.advance();
                Ok(Expr::Variable {
                    name: token.literal,
                    offset: token.offset,
                })
            }
            TokenKind::Paren if token.is_paren("(") => {
                self.advance();
                let inner = self.nested(&token, Self::parse_expression)?;

                let close = self.peek();
                if !close.is_paren(")") {
                    return Err(ParseError::UnclosedParen {
                        found: close.to_string(),
                        open: token.span(),
                        span: close.span(),
                    });
                }
                self.advance();

                Ok(inner)
            }
            _ => Err(ParseError::ExpectedExpression {
                found: token.to_string(),
                span: token.span(),
            }),
        }
    }

    fn nested(
        &mut self,
        opener: &Token<'de>,
        parse: impl FnOnce(&mut Self) -> Result<Expr<'de>, ParseError>,
    ) -> Result<Expr<'de>, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::TooDeep {
                span: opener.span(),
            });
        }
        self.depth += 1;
        let expr = parse(self);
        self.depth -= 1;
        expr
    }
}

fn number(token: &Token<'_>) -> Result<Number, ParseError> {
    let invalid = |reason: String| ParseError::InvalidNumber {
        literal: token.literal.to_string(),
        reason,
        span: token.span(),
    };

    if token.literal.contains('.') {
        token
            .literal
            .parse()
            .map(Number::Float)
            .map_err(|e: std::num::ParseFloatError| invalid(e.to_string()))
    } else {
        token
            .literal
            .parse()
            .map(Number::Int)
            .map_err(|e: std::num::ParseIntError| invalid(e.to_string()))
    }
}
