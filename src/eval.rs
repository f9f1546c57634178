use std::{collections::BTreeMap, fmt::Display};

use miette::{Diagnostic, SourceSpan};
use serde::Serialize;
use thiserror::Error;
use tracing::trace;

use crate::{
    Error,
    compile::{Item, Postfix},
    parse::{BinaryOp, UnaryOp},
};

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
#[error("Variable `{name}` is not defined.")]
#[diagnostic(help("assign `{name}` in an earlier statement of this session"))]
pub struct NameError {
    pub name: String,

    #[label("not defined in this session")]
    span: SourceSpan,
}

impl NameError {
    pub fn new(name: &str, offset: usize) -> Self {
        NameError {
            name: name.to_string(),
            span: SourceSpan::from(offset..offset + name.len()),
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum ArithmeticError {
    #[error("division by zero")]
    #[diagnostic(help("the right-hand side of `/` evaluated to zero"))]
    DivisionByZero,

    #[error("modulo by zero")]
    #[diagnostic(help("the right-hand side of `%` evaluated to zero"))]
    ModuloByZero,

    #[error("integer overflow in `{op}`")]
    #[diagnostic(help("integers are 64-bit; write a literal with a `.` to use floating point"))]
    Overflow { op: char },
}

/// A numeric value. Integer arithmetic stays integral except for `/`, which
/// always divides as floating point; any float operand promotes the other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Int(n) => n == 0,
            Number::Float(n) => n == 0.0,
        }
    }

    pub fn negate(self) -> Result<Number, ArithmeticError> {
        match self {
            Number::Int(n) => n
                .checked_neg()
                .map(Number::Int)
                .ok_or(ArithmeticError::Overflow { op: '-' }),
            Number::Float(n) => Ok(Number::Float(-n)),
        }
    }

    pub fn apply_unary(self, op: UnaryOp) -> Result<Number, ArithmeticError> {
        match op {
            UnaryOp::Minus => self.negate(),
            UnaryOp::Plus => Ok(self),
        }
    }

    /// `self <op> rhs`.
    pub fn apply(self, op: BinaryOp, rhs: Number) -> Result<Number, ArithmeticError> {
        if rhs.is_zero() {
            match op {
                BinaryOp::Div => return Err(ArithmeticError::DivisionByZero),
                BinaryOp::Rem => return Err(ArithmeticError::ModuloByZero),
                _ => {}
            }
        }

        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => int_arith(op, a, b),
            (a, b) => Ok(Number::Float(float_arith(op, a.as_f64(), b.as_f64()))),
        }
    }
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<Number, ArithmeticError> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => return Ok(Number::Float(a as f64 / b as f64)),
        // wrapping only matters for i64::MIN % -1, whose remainder is 0
        BinaryOp::Rem => {
            let r = a.wrapping_rem(b);
            Some(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }
    };
    result
        .map(Number::Int)
        .ok_or(ArithmeticError::Overflow { op: op.symbol() })
}

fn float_arith(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        // floored: the result takes the sign of the divisor
        BinaryOp::Rem => {
            let r = a % b;
            if r == 0.0 {
                0.0_f64.copysign(b)
            } else if (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{n}"),
            Number::Float(n) if n.is_nan() => f.write_str("nan"),
            // exponents carry a sign and at least two digits: 1e+16, 2.5e-07
            Number::Float(n) => {
                let repr = format!("{n:?}");
                match repr.split_once('e') {
                    Some((mantissa, exponent)) => match exponent.strip_prefix('-') {
                        Some(digits) => write!(f, "{mantissa}e-{digits:0>2}"),
                        None => write!(f, "{mantissa}e+{exponent:0>2}"),
                    },
                    None => f.write_str(&repr),
                }
            }
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::Int(n)
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        Number::Float(n)
    }
}

/// The variable table of one session. Each session owns its own; nothing is
/// shared between environments.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Environment {
    variables: BTreeMap<String, Number>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Number> {
        self.variables.get(name).copied()
    }

    pub fn define(&mut self, name: impl Into<String>, value: Number) {
        self.variables.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Number)> {
        self.variables
            .iter()
            .map(|(name, value)| (name.as_str(), *value))
    }
}

impl<S: Into<String>> FromIterator<(S, Number)> for Environment {
    fn from_iter<T: IntoIterator<Item = (S, Number)>>(iter: T) -> Self {
        Environment {
            variables: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

/// Run a postfix sequence on a value stack and commit the result under the
/// sequence's target. The environment is only written when every step
/// succeeds.
pub fn evaluate(
    postfix: &Postfix<'_>,
    environment: &mut Environment,
) -> Result<(String, Number), Error> {
    let mut stack: Vec<Number> = Vec::with_capacity(postfix.body().len());

    for item in postfix.body() {
        match *item {
            Item::Number(n) => stack.push(n),
            Item::Variable { name, offset } => {
                let value = environment
                    .get(name)
                    .ok_or_else(|| NameError::new(name, offset))?;
                stack.push(value);
            }
            Item::Unary(op) => {
                let operand = pop(&mut stack)?;
                stack.push(operand.apply_unary(op)?);
            }
            Item::Binary(op) => {
                let b = pop(&mut stack)?;
                let a = pop(&mut stack)?;
                stack.push(a.apply(op, b)?);
            }
            Item::Target(_) | Item::Assign => {
                return Err(Error::Malformed("statement marker inside the body"));
            }
        }
        trace!(?item, depth = stack.len(), "stepped");
    }

    let value = pop(&mut stack)?;
    if !stack.is_empty() {
        return Err(Error::Malformed("more than one value left on the stack"));
    }

    let target = postfix.target();
    environment.define(target, value);
    Ok((target.to_string(), value))
}

fn pop(stack: &mut Vec<Number>) -> Result<Number, Error> {
    stack.pop().ok_or(Error::Malformed("operand stack underflow"))
}
