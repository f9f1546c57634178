use std::{fmt::Display, iter};

use crate::{
    eval::Number,
    parse::{BinaryOp, Expr, Statement, UnaryOp},
};

/// One element of a postfix sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'de> {
    /// The variable being assigned; always first.
    Target(&'de str),
    Number(Number),
    Variable { name: &'de str, offset: usize },
    Binary(BinaryOp),
    /// Tagged separately from [`Item::Binary`] so `-` keeps its arity.
    Unary(UnaryOp),
    /// The assignment marker; always last.
    Assign,
}

impl Display for Item<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Item::Target(name) | Item::Variable { name, .. } => write!(f, "{name}"),
            Item::Number(n) => write!(f, "{n}"),
            Item::Binary(op) => write!(f, "{op}"),
            Item::Unary(op) => write!(f, "u{op}"),
            Item::Assign => write!(f, "="),
        }
    }
}

/// Reverse-Polish form of a statement. Only [`compile`] builds one, so the
/// sequence always opens with the target and closes with the marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Postfix<'de> {
    target: &'de str,
    body: Vec<Item<'de>>,
}

impl<'de> Postfix<'de> {
    pub fn target(&self) -> &'de str {
        self.target
    }

    /// The operands and operators between the target and the marker.
    pub fn body(&self) -> &[Item<'de>] {
        &self.body
    }

    /// The whole sequence, target and marker included.
    pub fn items(&self) -> impl Iterator<Item = Item<'de>> + '_ {
        iter::once(Item::Target(self.target))
            .chain(self.body.iter().copied())
            .chain(iter::once(Item::Assign))
    }
}

impl Display for Postfix<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, item) in self.items().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

pub fn compile<'de>(statement: &Statement<'de>) -> Postfix<'de> {
    let mut body = Vec::new();
    emit(&statement.value, &mut body);
    Postfix {
        target: statement.target,
        body,
    }
}

enum Step<'a, 'de> {
    Visit(&'a Expr<'de>),
    Emit(Item<'de>),
}

/// Post-order walk over an explicit work list; operator chains can be far
/// deeper than the native stack allows.
fn emit<'de>(expr: &Expr<'de>, out: &mut Vec<Item<'de>>) {
    let mut work = vec![Step::Visit(expr)];
    while let Some(step) = work.pop() {
        match step {
            Step::Emit(item) => out.push(item),
            Step::Visit(Expr::Binary { op, left, right }) => {
                work.push(Step::Emit(Item::Binary(*op)));
                work.push(Step::Visit(right));
                work.push(Step::Visit(left));
            }
            Step::Visit(Expr::Unary { op, operand }) => {
                work.push(Step::Emit(Item::Unary(*op)));
                work.push(Step::Visit(operand));
            }
            Step::Visit(Expr::Number(n)) => out.push(Item::Number(*n)),
            Step::Visit(Expr::Variable { name, offset }) => out.push(Item::Variable {
                name: *name,
                offset: *offset,
            }),
        }
    }
}
