//! Target code emission.
//!
//! A `Target` maps the resolved model onto one output language: native type
//! names per width tier, buffer-runtime calls, and rendered expressions. The
//! expression tree-walk is shared; what differs between parse-direction and
//! serialize-direction output is only how a bare variable resolves, so both
//! directions are the same walk parameterized by a variable strategy.

pub mod java;

pub use java::JavaTarget;

use crate::ast::{ComplexType, SimpleTypeReference, TypeDefinition, TypeReference};
use crate::error::Error;
use crate::resolver::TypeRegistry;
use crate::term::{Direction, Literal, Term, UnaryOp, Variable};

/// Everything a variable strategy may need while rendering one expression.
pub struct ExprCtx<'a> {
    pub registry: &'a TypeRegistry,
    /// Type whose field expressions are being rendered.
    pub owner: &'a ComplexType,
    /// Simple type of the field being processed, for `_type` descriptors.
    pub field_type: Option<&'a SimpleTypeReference>,
}

pub trait Target {
    /// Narrowest-fitting native representation for a type and width;
    /// `allow_primitive=false` forces the nullable/boxed form.
    fn native_type(&self, type_ref: &TypeReference, allow_primitive: bool)
        -> Result<String, Error>;

    /// Zero/empty value matching `native_type` with primitives allowed.
    fn default_value(&self, type_ref: &TypeReference) -> Result<String, Error>;

    /// Buffer-runtime read call for a simple type.
    fn read_call(
        &self,
        field_name: &str,
        simple: &SimpleTypeReference,
        ctx: &ExprCtx,
    ) -> Result<String, Error>;

    /// Buffer-runtime write call for a simple type and a rendered value.
    fn write_call(
        &self,
        field_name: &str,
        simple: &SimpleTypeReference,
        value: &str,
        ctx: &ExprCtx,
    ) -> Result<String, Error>;

    /// Render an expression in one direction.
    fn render_expression(
        &self,
        term: &Term,
        direction: Direction,
        ctx: &ExprCtx,
    ) -> Result<String, Error>;

    /// Emit complete source for one type definition.
    fn emit_type(&self, def: &TypeDefinition, registry: &TypeRegistry) -> Result<String, Error>;
}

/// How a bare (non-intrinsic) variable renders.
pub type VariableStrategy<'a> = dyn Fn(&Variable) -> Result<String, Error> + 'a;

/// The shared tree-walk. Surface syntax is C-family (infix operators, `?:`
/// ternary); exponentiation goes through the `pow` hook since no C-family
/// target has an operator for it.
pub fn to_expression(
    term: &Term,
    variable: &VariableStrategy,
    pow: &dyn Fn(&str, &str) -> String,
) -> Result<String, Error> {
    match term {
        Term::Literal(Literal::Null) => Ok("null".to_string()),
        Term::Literal(Literal::Bool(b)) => Ok(b.to_string()),
        Term::Literal(Literal::Int(i)) => Ok(i.to_string()),
        Term::Literal(Literal::Float(f)) => Ok(format!("{:?}", f)),
        Term::Literal(Literal::Str(s)) => Ok(format!("\"{}\"", s)),
        Term::Literal(Literal::Variable(v)) => variable(v),
        Term::Unary { op, a } => {
            let a = to_expression(a, variable, pow)?;
            Ok(match op {
                UnaryOp::Not => format!("!({})", a),
                UnaryOp::Neg => format!("-({})", a),
                UnaryOp::Group => format!("({})", a),
            })
        }
        Term::Binary { op, a, b } => {
            let a = to_expression(a, variable, pow)?;
            let b = to_expression(b, variable, pow)?;
            if *op == crate::term::BinaryOp::Pow {
                Ok(pow(&a, &b))
            } else {
                Ok(format!("({}) {} ({})", a, op.symbol(), b))
            }
        }
        Term::Ternary {
            cond,
            then,
            otherwise,
        } => {
            let cond = to_expression(cond, variable, pow)?;
            let then = to_expression(then, variable, pow)?;
            let otherwise = to_expression(otherwise, variable, pow)?;
            Ok(format!("(({}) ? ({}) : ({}))", cond, then, otherwise))
        }
    }
}
