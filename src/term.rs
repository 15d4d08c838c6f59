//! Expression IR: the `Term` AST used by computed, conditional and
//! variable-length field bodies.
//!
//! A `Term` is built by the spec parser, gets its variables type-bound by the
//! resolver, and is then rendered (emitters) or evaluated (interpreter) in
//! one of two directions. `^` is exponentiation, not bitwise xor.

use crate::ast::TypeReference;

/// Rendering/evaluation direction for an expression.
///
/// Parse-direction resolves bare variables against values already read from
/// the wire; serialize-direction resolves them against the populated value
/// being written. Virtual-field expressions only ever run in parse direction;
/// implicit-field serialize expressions only in serialize direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Parse,
    Serialize,
}

/// A node of the embedded expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Literal(Literal),
    Unary { op: UnaryOp, a: Box<Term> },
    Binary { op: BinaryOp, a: Box<Term>, b: Box<Term> },
    Ternary { cond: Box<Term>, then: Box<Term>, otherwise: Box<Term> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Variable(Variable),
}

impl Literal {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(i) => Some(*i),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Boolean negation.
    Not,
    /// Arithmetic negation.
    Neg,
    /// Grouping only; no semantic effect.
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    BitOr,
    BitAnd,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// Exponentiation.
    Pow,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitAnd => "&",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
        }
    }
}

/// A (possibly dotted/indexed/call-like) variable reference: `a.b[2].c`.
///
/// `type_ref` is bound by the resolver; intrinsics and reserved context names
/// stay unbound.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub args: Option<Vec<Term>>,
    pub index: Option<u32>,
    pub child: Option<Box<Variable>>,
    pub type_ref: Option<TypeReference>,
}

impl Variable {
    pub fn named(name: impl Into<String>) -> Self {
        Variable {
            name: name.into(),
            args: None,
            index: None,
            child: None,
            type_ref: None,
        }
    }

    /// All-uppercase bare names are intrinsics, not fields.
    pub fn is_intrinsic(&self) -> bool {
        !self.name.is_empty()
            && self.name == self.name.to_uppercase()
            && self.name.chars().any(|c| c.is_ascii_alphabetic())
    }
}

impl Term {
    pub fn variable(v: Variable) -> Self {
        Term::Literal(Literal::Variable(v))
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Term::Literal(Literal::Variable(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_string_literal(&self) -> Option<&str> {
        match self {
            Term::Literal(Literal::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Whether any variable head in this term matches `name`.
    pub fn references(&self, name: &str) -> bool {
        let mut found = false;
        self.for_each_variable(&mut |v| {
            if v.name == name {
                found = true;
            }
        });
        found
    }

    /// Visit every variable head in the term, including call arguments.
    pub fn for_each_variable(&self, f: &mut impl FnMut(&Variable)) {
        match self {
            Term::Literal(Literal::Variable(v)) => {
                f(v);
                if let Some(args) = &v.args {
                    for arg in args {
                        arg.for_each_variable(f);
                    }
                }
            }
            Term::Literal(_) => {}
            Term::Unary { a, .. } => a.for_each_variable(f),
            Term::Binary { a, b, .. } => {
                a.for_each_variable(f);
                b.for_each_variable(f);
            }
            Term::Ternary {
                cond,
                then,
                otherwise,
            } => {
                cond.for_each_variable(f);
                then.for_each_variable(f);
                otherwise.for_each_variable(f);
            }
        }
    }
}
