//! Model interpreter: decode and encode wire messages directly from a
//! resolved registry, without going through a code emitter.
//!
//! The interpreter exists for spec authoring and tests. It covers the same
//! field semantics the emitters describe, with one deliberate gap: a
//! `STATIC_CALL` whose arguments need buffer access (the reserved context
//! names) has no meaning here and reports `CodecError::Unsupported`.

use std::collections::HashMap;

use crate::ast::*;
use crate::buffer::{BufferError, ByteOrder, ReadBuffer, WriteBuffer};
use crate::resolver::{TypeRegistry, CONTEXT_NAMES};
use crate::term::{BinaryOp, Literal, Term, UnaryOp, Variable};
use crate::value::Value;

/// A registered implementation for `STATIC_CALL` functions that take plain
/// values (no buffer context).
pub type Helper = Box<dyn Fn(&[Value]) -> Result<Value, CodecError>>;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("missing field: {0}")]
    MissingField(String),
    #[error("constant field {field}: expected {expected}, found {found}")]
    ConstMismatch {
        field: String,
        expected: String,
        found: String,
    },
    #[error("{type_name}: no case matches discriminator value {value}")]
    NoMatchingCase { type_name: String, value: String },
    #[error("expression: {0}")]
    Eval(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub struct Codec<'a> {
    registry: &'a TypeRegistry,
    order: ByteOrder,
    helpers: HashMap<String, Helper>,
}

/// Evaluation scope for one type's parse or serialize pass.
struct EvalCtx<'a> {
    vars: &'a HashMap<String, Value>,
    /// Bits consumed since the enclosing type's start, for `curPos`.
    cur_pos: Option<u64>,
}

impl<'a> Codec<'a> {
    pub fn new(registry: &'a TypeRegistry, order: ByteOrder) -> Self {
        Codec {
            registry,
            order,
            helpers: HashMap::new(),
        }
    }

    pub fn register_helper(&mut self, name: impl Into<String>, helper: Helper) {
        self.helpers.insert(name.into(), helper);
    }

    /// Decode a message of the named type from `bytes`. The returned struct
    /// carries the concrete (most derived) type name.
    pub fn parse(&self, type_name: &str, bytes: &[u8]) -> Result<Value, CodecError> {
        let mut rb = ReadBuffer::new(bytes, self.order);
        self.parse_with(type_name, &mut rb, &HashMap::new())
    }

    /// Decode from an existing buffer position with explicit parser-argument
    /// values.
    pub fn parse_with(
        &self,
        type_name: &str,
        rb: &mut ReadBuffer,
        args: &HashMap<String, Value>,
    ) -> Result<Value, CodecError> {
        let complex = self
            .registry
            .get_complex(type_name)
            .ok_or_else(|| CodecError::UnknownType(type_name.to_string()))?;
        let start = rb.position();
        let mut scope = args.clone();
        let mut members = HashMap::new();
        self.parse_fields(complex, rb, start, &mut scope, &mut members)?;

        if let Some(switch) = &complex.switch {
            let disc = scope
                .get(&switch.discriminator)
                .cloned()
                .ok_or_else(|| CodecError::MissingField(switch.discriminator.clone()))?;
            let case = self.matching_case(complex, switch, &disc)?;
            log::debug!("{}: dispatching to case {}", complex.name, case.name);
            self.parse_fields(case, rb, start, &mut scope, &mut members)?;
            return Ok(Value::Struct {
                type_name: case.name.clone(),
                fields: members,
            });
        }
        Ok(Value::Struct {
            type_name: complex.name.clone(),
            fields: members,
        })
    }

    fn matching_case(
        &self,
        parent: &ComplexType,
        switch: &TypeSwitch,
        disc: &Value,
    ) -> Result<&ComplexType, CodecError> {
        for case in &switch.cases {
            let child = self
                .registry
                .get_complex(case)
                .ok_or_else(|| CodecError::UnknownType(case.clone()))?;
            let matches = match (&child.discriminator_value, disc) {
                (Some(Literal::Int(expected)), v) => v.as_i64() == Some(*expected),
                (Some(Literal::Str(expected)), Value::Str(s)) => expected == s,
                (Some(Literal::Str(expected)), Value::Enum { member, .. }) => expected == member,
                (Some(Literal::Bool(expected)), Value::Bool(b)) => expected == b,
                _ => false,
            };
            if matches {
                return Ok(child);
            }
        }
        Err(CodecError::NoMatchingCase {
            type_name: parent.name.clone(),
            value: format!("{:?}", disc),
        })
    }

    fn parse_fields(
        &self,
        complex: &ComplexType,
        rb: &mut ReadBuffer,
        start: u64,
        scope: &mut HashMap<String, Value>,
        members: &mut HashMap<String, Value>,
    ) -> Result<(), CodecError> {
        for field in &complex.fields {
            match field {
                Field::Simple { name, type_ref } => {
                    let value = self.read_ref(rb, name, type_ref, start, scope)?;
                    scope.insert(name.clone(), value.clone());
                    members.insert(name.clone(), value);
                }
                Field::Array {
                    name,
                    element_type,
                    loop_kind,
                    loop_expr,
                } => {
                    let value =
                        self.read_array(rb, name, element_type, *loop_kind, loop_expr, start, scope)?;
                    scope.insert(name.clone(), value.clone());
                    members.insert(name.clone(), value);
                }
                Field::Const {
                    name,
                    type_ref,
                    expected,
                } => {
                    let value = self.read_simple(rb, name, type_ref, start, scope)?;
                    if !literal_matches(expected, &value) {
                        return Err(CodecError::ConstMismatch {
                            field: name.clone(),
                            expected: format!("{:?}", expected),
                            found: format!("{:?}", value),
                        });
                    }
                    scope.insert(name.clone(), value.clone());
                    members.insert(name.clone(), value);
                }
                Field::Reserved { type_ref, expected } => {
                    let value = self.read_simple(rb, "reserved", type_ref, start, scope)?;
                    if !literal_matches(expected, &value) {
                        log::warn!(
                            "{}: reserved field holds {:?}, expected {:?}",
                            complex.name,
                            value,
                            expected
                        );
                    }
                }
                Field::Optional {
                    name,
                    type_ref,
                    cond_expr,
                } => {
                    let ctx = EvalCtx {
                        vars: scope,
                        cur_pos: Some(rb.position() - start),
                    };
                    let present = self
                        .eval(cond_expr, &ctx)?
                        .as_bool()
                        .ok_or_else(|| {
                            CodecError::Eval(format!("{}: condition is not a bool", name))
                        })?;
                    if present {
                        let value = self.read_ref(rb, name, type_ref, start, scope)?;
                        scope.insert(name.clone(), value.clone());
                        members.insert(name.clone(), value);
                    }
                }
                Field::Discriminator { name, type_ref } => {
                    let value = self.read_simple(rb, name, type_ref, start, scope)?;
                    scope.insert(name.clone(), value.clone());
                    members.insert(name.clone(), value);
                }
                Field::Virtual {
                    name, value_expr, ..
                } => {
                    let ctx = EvalCtx {
                        vars: scope,
                        cur_pos: Some(rb.position() - start),
                    };
                    let value = self.eval(value_expr, &ctx)?;
                    scope.insert(name.clone(), value.clone());
                    members.insert(name.clone(), value);
                }
                Field::Implicit { name, type_ref, .. } => {
                    // Read from the wire, visible to later expressions, but
                    // not part of the decoded struct.
                    let value = self.read_simple(rb, name, type_ref, start, scope)?;
                    scope.insert(name.clone(), value);
                }
                Field::Manual { name, parse_expr, .. } => {
                    let ctx = EvalCtx {
                        vars: scope,
                        cur_pos: Some(rb.position() - start),
                    };
                    let value = self.eval(parse_expr, &ctx)?;
                    scope.insert(name.clone(), value.clone());
                    members.insert(name.clone(), value);
                }
            }
        }
        Ok(())
    }

    fn read_ref(
        &self,
        rb: &mut ReadBuffer,
        name: &str,
        type_ref: &TypeReference,
        start: u64,
        scope: &HashMap<String, Value>,
    ) -> Result<Value, CodecError> {
        match type_ref {
            TypeReference::Simple(simple) => self.read_simple(rb, name, simple, start, scope),
            TypeReference::Complex { name: type_name, ctor_args } => {
                let callee = self
                    .registry
                    .get_complex(type_name)
                    .ok_or_else(|| CodecError::UnknownType(type_name.clone()))?;
                let ctx = EvalCtx {
                    vars: scope,
                    cur_pos: Some(rb.position() - start),
                };
                let mut args = HashMap::new();
                for (arg, param) in ctor_args.iter().zip(&callee.parser_args) {
                    args.insert(param.name.clone(), self.eval(arg, &ctx)?);
                }
                self.parse_with(type_name, rb, &args)
            }
            TypeReference::Enum { name: type_name, .. } => {
                let def = self
                    .registry
                    .get_enum(type_name)
                    .ok_or_else(|| CodecError::UnknownType(type_name.clone()))?;
                let raw = self.read_simple(rb, name, &def.backing_type, start, scope)?;
                let raw = raw
                    .as_i64()
                    .ok_or_else(|| CodecError::Eval(format!("{}: non-numeric enum value", name)))?;
                let member = def.member_for_value(raw).ok_or_else(|| {
                    CodecError::Eval(format!("{}: no {} member for value {}", name, type_name, raw))
                })?;
                Ok(Value::Enum {
                    type_name: type_name.clone(),
                    member: member.to_string(),
                })
            }
        }
    }

    fn read_array(
        &self,
        rb: &mut ReadBuffer,
        name: &str,
        element_type: &TypeReference,
        loop_kind: LoopKind,
        loop_expr: &Term,
        start: u64,
        scope: &mut HashMap<String, Value>,
    ) -> Result<Value, CodecError> {
        let mut items = Vec::new();
        match loop_kind {
            LoopKind::Count => {
                let ctx = EvalCtx {
                    vars: scope,
                    cur_pos: Some(rb.position() - start),
                };
                let count = self
                    .eval(loop_expr, &ctx)?
                    .as_u64()
                    .ok_or_else(|| CodecError::Eval(format!("{}: count is not numeric", name)))?;
                for _ in 0..count {
                    items.push(self.read_ref(rb, name, element_type, start, scope)?);
                }
            }
            LoopKind::Length => {
                let ctx = EvalCtx {
                    vars: scope,
                    cur_pos: Some(rb.position() - start),
                };
                let length_bytes = self
                    .eval(loop_expr, &ctx)?
                    .as_u64()
                    .ok_or_else(|| CodecError::Eval(format!("{}: length is not numeric", name)))?;
                let end = rb.position() + length_bytes * 8;
                while rb.position() < end {
                    items.push(self.read_ref(rb, name, element_type, start, scope)?);
                }
            }
            LoopKind::Terminated => {
                loop {
                    let mut vars = scope.clone();
                    if let Some(last) = items.last() {
                        vars.insert("lastItem".to_string(), last.clone());
                    }
                    let ctx = EvalCtx {
                        vars: &vars,
                        cur_pos: Some(rb.position() - start),
                    };
                    if self.eval(loop_expr, &ctx)?.as_bool().unwrap_or(false) {
                        break;
                    }
                    if !rb.has_more(1) {
                        break;
                    }
                    items.push(self.read_ref(rb, name, element_type, start, scope)?);
                }
            }
        }
        Ok(Value::List(items))
    }

    fn read_simple(
        &self,
        rb: &mut ReadBuffer,
        name: &str,
        simple: &SimpleTypeReference,
        start: u64,
        scope: &HashMap<String, Value>,
    ) -> Result<Value, CodecError> {
        let bits = simple.size_bits;
        Ok(match simple.base {
            SimpleBaseType::Bit => Value::Bool(rb.read_bit(name)?),
            SimpleBaseType::Byte => Value::U8(rb.read_byte(name)?),
            SimpleBaseType::Uint => match bits {
                1..=8 => Value::U8(rb.read_u8(name, bits)?),
                9..=16 => Value::U16(rb.read_u16(name, bits)?),
                17..=32 => Value::U32(rb.read_u32(name, bits)?),
                _ => Value::U64(rb.read_u64(name, bits)?),
            },
            SimpleBaseType::Int => match bits {
                1..=8 => Value::I8(rb.read_i8(name, bits)?),
                9..=16 => Value::I16(rb.read_i16(name, bits)?),
                17..=32 => Value::I32(rb.read_i32(name, bits)?),
                _ => Value::I64(rb.read_i64(name, bits)?),
            },
            SimpleBaseType::Float => match bits {
                32 => Value::F32(rb.read_f32(name)?),
                64 => Value::F64(rb.read_f64(name)?),
                _ => {
                    return Err(CodecError::Unsupported(format!(
                        "{}: float {} is not interpretable",
                        name, bits
                    )))
                }
            },
            SimpleBaseType::String => Value::Str(rb.read_string(name, bits, &simple.encoding)?),
            SimpleBaseType::Vstring => {
                let expr = simple.length_expr.as_deref().ok_or_else(|| {
                    CodecError::Eval(format!("{}: vstring without length", name))
                })?;
                let ctx = EvalCtx {
                    vars: scope,
                    cur_pos: Some(rb.position() - start),
                };
                let length_bits = self
                    .eval(expr, &ctx)?
                    .as_u64()
                    .ok_or_else(|| CodecError::Eval(format!("{}: length is not numeric", name)))?;
                Value::Str(rb.read_string(name, length_bits as u32, &simple.encoding)?)
            }
            SimpleBaseType::Ufloat
            | SimpleBaseType::Time
            | SimpleBaseType::Date
            | SimpleBaseType::DateTime => {
                return Err(CodecError::Unsupported(format!(
                    "{}: {:?} is not interpretable",
                    name, simple.base
                )))
            }
        })
    }

    /// Encode a decoded (or hand-built) struct back to bytes. Dispatch uses
    /// the struct's own concrete type name.
    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let mut wb = WriteBuffer::new(self.order);
        self.serialize_into(value, &mut wb)?;
        Ok(wb.into_bytes())
    }

    pub fn serialize_into(&self, value: &Value, wb: &mut WriteBuffer) -> Result<(), CodecError> {
        let (type_name, fields) = match value {
            Value::Struct { type_name, fields } => (type_name, fields),
            _ => return Err(CodecError::Eval("serialize expects a struct".into())),
        };
        // Root-first chain: parent fields precede child fields on the wire.
        let mut chain = Vec::new();
        let mut cursor = Some(type_name.as_str());
        while let Some(name) = cursor {
            let complex = self
                .registry
                .get_complex(name)
                .ok_or_else(|| CodecError::UnknownType(name.to_string()))?;
            chain.push(complex);
            cursor = complex.parent_type.as_deref();
        }
        chain.reverse();

        let start = wb.position();
        for (depth, complex) in chain.iter().enumerate() {
            let derived = chain.get(depth + 1).copied();
            self.serialize_fields(complex, derived, fields, wb, start)?;
        }
        Ok(())
    }

    fn serialize_fields(
        &self,
        complex: &ComplexType,
        derived: Option<&ComplexType>,
        fields: &HashMap<String, Value>,
        wb: &mut WriteBuffer,
        start: u64,
    ) -> Result<(), CodecError> {
        for field in &complex.fields {
            match field {
                Field::Simple { name, type_ref } => {
                    let value = fields
                        .get(name)
                        .ok_or_else(|| CodecError::MissingField(name.clone()))?;
                    self.write_ref(wb, name, type_ref, value, start, fields)?;
                }
                Field::Array {
                    name, element_type, ..
                } => {
                    let value = fields
                        .get(name)
                        .ok_or_else(|| CodecError::MissingField(name.clone()))?;
                    let items = value
                        .as_list()
                        .ok_or_else(|| CodecError::Eval(format!("{}: not a list", name)))?;
                    for item in items {
                        self.write_ref(wb, name, element_type, item, start, fields)?;
                    }
                }
                Field::Const {
                    name,
                    type_ref,
                    expected,
                } => {
                    self.write_literal(wb, name, type_ref, expected)?;
                }
                Field::Reserved { type_ref, expected } => {
                    self.write_literal(wb, "reserved", type_ref, expected)?;
                }
                Field::Optional { name, type_ref, .. } => {
                    // Presence of the member drives the wire, not the
                    // condition; round trips stay exact either way.
                    if let Some(value) = fields.get(name) {
                        self.write_ref(wb, name, type_ref, value, start, fields)?;
                    }
                }
                Field::Discriminator { name, type_ref } => {
                    let value = derived
                        .and_then(|d| d.discriminator_value.clone())
                        .map(|lit| literal_value(&lit))
                        .or_else(|| fields.get(name).cloned())
                        .ok_or_else(|| CodecError::MissingField(name.clone()))?;
                    self.write_simple(wb, name, type_ref, &value)?;
                }
                Field::Virtual { .. } => {}
                Field::Implicit {
                    name,
                    type_ref,
                    serialize_expr,
                } => {
                    let ctx = EvalCtx {
                        vars: fields,
                        cur_pos: Some(wb.position() - start),
                    };
                    let value = self.eval(serialize_expr, &ctx)?;
                    self.write_simple(wb, name, type_ref, &value)?;
                }
                Field::Manual { name, .. } => {
                    return Err(CodecError::Unsupported(format!(
                        "{}: manual fields need emitted code",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    fn write_ref(
        &self,
        wb: &mut WriteBuffer,
        name: &str,
        type_ref: &TypeReference,
        value: &Value,
        _start: u64,
        _fields: &HashMap<String, Value>,
    ) -> Result<(), CodecError> {
        match type_ref {
            TypeReference::Simple(simple) => self.write_simple(wb, name, simple, value),
            TypeReference::Complex { .. } => self.serialize_into(value, wb),
            TypeReference::Enum { name: type_name, .. } => {
                let def = self
                    .registry
                    .get_enum(type_name)
                    .ok_or_else(|| CodecError::UnknownType(type_name.clone()))?;
                let member = match value {
                    Value::Enum { member, .. } => member.clone(),
                    Value::Str(s) => s.clone(),
                    _ => {
                        return Err(CodecError::Eval(format!(
                            "{}: expected a {} member",
                            name, type_name
                        )))
                    }
                };
                let raw = def.value_of(&member).ok_or_else(|| {
                    CodecError::Eval(format!("{}: {} has no member {}", name, type_name, member))
                })?;
                self.write_simple(wb, name, &def.backing_type, &Value::I64(raw))
            }
        }
    }

    fn write_literal(
        &self,
        wb: &mut WriteBuffer,
        name: &str,
        simple: &SimpleTypeReference,
        literal: &Literal,
    ) -> Result<(), CodecError> {
        self.write_simple(wb, name, simple, &literal_value(literal))
    }

    fn write_simple(
        &self,
        wb: &mut WriteBuffer,
        name: &str,
        simple: &SimpleTypeReference,
        value: &Value,
    ) -> Result<(), CodecError> {
        let bits = simple.size_bits;
        let numeric = |v: &Value| {
            v.as_i64()
                .ok_or_else(|| CodecError::Eval(format!("{}: expected a number", name)))
        };
        match simple.base {
            SimpleBaseType::Bit => {
                let b = value
                    .as_bool()
                    .or_else(|| value.as_i64().map(|i| i != 0))
                    .ok_or_else(|| CodecError::Eval(format!("{}: expected a bit", name)))?;
                wb.write_bit(name, b)?;
            }
            SimpleBaseType::Byte => wb.write_byte(name, numeric(value)? as u8)?,
            SimpleBaseType::Uint => match bits {
                1..=8 => wb.write_u8(name, bits, numeric(value)? as u8)?,
                9..=16 => wb.write_u16(name, bits, numeric(value)? as u16)?,
                17..=32 => wb.write_u32(name, bits, numeric(value)? as u32)?,
                _ => wb.write_u64(name, bits, numeric(value)? as u64)?,
            },
            SimpleBaseType::Int => match bits {
                1..=8 => wb.write_i8(name, bits, numeric(value)? as i8)?,
                9..=16 => wb.write_i16(name, bits, numeric(value)? as i16)?,
                17..=32 => wb.write_i32(name, bits, numeric(value)? as i32)?,
                _ => wb.write_i64(name, bits, numeric(value)?)?,
            },
            SimpleBaseType::Float => match bits {
                32 => {
                    let f = value
                        .as_f64()
                        .ok_or_else(|| CodecError::Eval(format!("{}: expected a float", name)))?;
                    wb.write_f32(name, f as f32)?;
                }
                64 => {
                    let f = value
                        .as_f64()
                        .ok_or_else(|| CodecError::Eval(format!("{}: expected a float", name)))?;
                    wb.write_f64(name, f)?;
                }
                _ => {
                    return Err(CodecError::Unsupported(format!(
                        "{}: float {} is not interpretable",
                        name, bits
                    )))
                }
            },
            SimpleBaseType::String => {
                let s = value
                    .as_str()
                    .ok_or_else(|| CodecError::Eval(format!("{}: expected a string", name)))?;
                wb.write_string(name, bits, &simple.encoding, s)?;
            }
            SimpleBaseType::Vstring => {
                let s = value
                    .as_str()
                    .ok_or_else(|| CodecError::Eval(format!("{}: expected a string", name)))?;
                // Width follows the value; the length expression must agree
                // with it for a faithful round trip.
                wb.write_string(name, (s.len() * 8) as u32, &simple.encoding, s)?;
            }
            SimpleBaseType::Ufloat
            | SimpleBaseType::Time
            | SimpleBaseType::Date
            | SimpleBaseType::DateTime => {
                return Err(CodecError::Unsupported(format!(
                    "{}: {:?} is not interpretable",
                    name, simple.base
                )))
            }
        }
        Ok(())
    }

    // ==================== Expression evaluation ====================

    fn eval(&self, term: &Term, ctx: &EvalCtx) -> Result<Value, CodecError> {
        match term {
            Term::Literal(Literal::Variable(v)) => self.eval_variable(v, ctx),
            Term::Literal(lit) => match lit {
                Literal::Null => Err(CodecError::Unsupported(
                    "null is not interpretable as a value".into(),
                )),
                _ => Ok(literal_value(lit)),
            },
            Term::Unary { op, a } => {
                let a = self.eval(a, ctx)?;
                match op {
                    UnaryOp::Group => Ok(a),
                    UnaryOp::Not => a
                        .as_bool()
                        .map(|b| Value::Bool(!b))
                        .ok_or_else(|| CodecError::Eval("! expects a bool".into())),
                    UnaryOp::Neg => match a {
                        Value::F32(f) => Ok(Value::F64(-f64::from(f))),
                        Value::F64(f) => Ok(Value::F64(-f)),
                        other => other
                            .as_i64()
                            .and_then(i64::checked_neg)
                            .map(Value::I64)
                            .ok_or_else(|| CodecError::Eval("- expects a number".into())),
                    },
                }
            }
            Term::Binary { op, a, b } => {
                let a = self.eval(a, ctx)?;
                let b = self.eval(b, ctx)?;
                self.eval_binary(*op, &a, &b)
            }
            Term::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let cond = self
                    .eval(cond, ctx)?
                    .as_bool()
                    .ok_or_else(|| CodecError::Eval("if condition is not a bool".into()))?;
                if cond {
                    self.eval(then, ctx)
                } else {
                    self.eval(otherwise, ctx)
                }
            }
        }
    }

    fn eval_binary(&self, op: BinaryOp, a: &Value, b: &Value) -> Result<Value, CodecError> {
        use BinaryOp::*;

        // Non-numeric equality first: strings and enum members compare by
        // content.
        if matches!(op, Eq | Neq) && !(a.is_numeric() && b.is_numeric()) {
            let equal = match (a, b) {
                (Value::Str(x), Value::Str(y)) => x == y,
                (Value::Enum { member: x, .. }, Value::Enum { member: y, .. }) => x == y,
                (Value::Enum { member, .. }, Value::Str(s))
                | (Value::Str(s), Value::Enum { member, .. }) => member == s,
                (Value::Bool(x), Value::Bool(y)) => x == y,
                _ => a == b,
            };
            return Ok(Value::Bool(if op == Eq { equal } else { !equal }));
        }

        match op {
            Or | And => {
                let (x, y) = match (a.as_bool(), b.as_bool()) {
                    (Some(x), Some(y)) => (x, y),
                    _ => return Err(CodecError::Eval(format!("{:?} expects bools", op))),
                };
                Ok(Value::Bool(if op == Or { x || y } else { x && y }))
            }
            _ if is_float(a) || is_float(b) => {
                let (x, y) = match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => (x, y),
                    _ => return Err(CodecError::Eval(format!("{:?} expects numbers", op))),
                };
                Ok(match op {
                    Add => Value::F64(x + y),
                    Sub => Value::F64(x - y),
                    Mul => Value::F64(x * y),
                    Div => Value::F64(x / y),
                    Mod => Value::F64(x % y),
                    Pow => Value::F64(x.powf(y)),
                    Eq => Value::Bool(x == y),
                    Neq => Value::Bool(x != y),
                    Lt => Value::Bool(x < y),
                    Le => Value::Bool(x <= y),
                    Gt => Value::Bool(x > y),
                    Ge => Value::Bool(x >= y),
                    _ => {
                        return Err(CodecError::Eval(format!(
                            "{:?} is not defined for floats",
                            op
                        )))
                    }
                })
            }
            _ => {
                let (x, y) = match (a.as_i64(), b.as_i64()) {
                    (Some(x), Some(y)) => (x, y),
                    _ => return Err(CodecError::Eval(format!("{:?} expects numbers", op))),
                };
                let overflow = || CodecError::Eval(format!("{:?}: arithmetic overflow", op));
                Ok(match op {
                    BitOr => Value::I64(x | y),
                    BitAnd => Value::I64(x & y),
                    Shl | Shr => {
                        let shift = u32::try_from(y)
                            .map_err(|_| CodecError::Eval("negative shift count".into()))?;
                        let shifted = if op == Shl {
                            x.checked_shl(shift)
                        } else {
                            x.checked_shr(shift)
                        };
                        Value::I64(shifted.ok_or_else(|| {
                            CodecError::Eval(format!("shift count {} out of range", shift))
                        })?)
                    }
                    Add => Value::I64(x.checked_add(y).ok_or_else(overflow)?),
                    Sub => Value::I64(x.checked_sub(y).ok_or_else(overflow)?),
                    Mul => Value::I64(x.checked_mul(y).ok_or_else(overflow)?),
                    Div => {
                        if y == 0 {
                            return Err(CodecError::Eval("division by zero".into()));
                        }
                        Value::I64(x / y)
                    }
                    Mod => {
                        if y == 0 {
                            return Err(CodecError::Eval("division by zero".into()));
                        }
                        Value::I64(x % y)
                    }
                    Pow => {
                        let exp = u32::try_from(y)
                            .map_err(|_| CodecError::Eval("negative exponent".into()))?;
                        Value::I64(x.checked_pow(exp).ok_or_else(|| {
                            CodecError::Eval("exponentiation overflow".into())
                        })?)
                    }
                    Eq => Value::Bool(x == y),
                    Neq => Value::Bool(x != y),
                    Lt => Value::Bool(x < y),
                    Le => Value::Bool(x <= y),
                    Gt => Value::Bool(x > y),
                    Ge => Value::Bool(x >= y),
                    Or | And => return Err(CodecError::Eval(format!("{:?} expects bools", op))),
                })
            }
        }
    }

    fn eval_variable(&self, variable: &Variable, ctx: &EvalCtx) -> Result<Value, CodecError> {
        if variable.is_intrinsic() {
            return self.eval_intrinsic(variable, ctx);
        }
        if variable.name == "curPos" {
            let pos = ctx.cur_pos.ok_or_else(|| {
                CodecError::Eval("curPos is not available in this context".into())
            })?;
            return Ok(Value::U32(pos as u32));
        }
        // Enum member reference bound by the resolver: Color.GREEN.
        if let Some(TypeReference::Enum {
            name,
            member_path: Some(member),
        }) = &variable.type_ref
        {
            return Ok(Value::Enum {
                type_name: name.clone(),
                member: member.clone(),
            });
        }
        if CONTEXT_NAMES.contains(&variable.name.as_str()) && !ctx.vars.contains_key(&variable.name)
        {
            return Err(CodecError::Unsupported(format!(
                "{}: context name has no interpreted value",
                variable.name
            )));
        }

        let mut value = ctx
            .vars
            .get(&variable.name)
            .cloned()
            .ok_or_else(|| CodecError::Eval(format!("unknown name: {}", variable.name)))?;
        value = index_into(value, variable.index, &variable.name)?;

        let mut cursor = &variable.child;
        while let Some(child) = cursor {
            value = self.project(value, child)?;
            cursor = &child.child;
        }
        Ok(value)
    }

    /// One step of dotted access: struct member, enum accessor, or list
    /// element.
    fn project(&self, value: Value, child: &Variable) -> Result<Value, CodecError> {
        let projected = match &value {
            Value::Struct { fields, .. } => fields
                .get(&child.name)
                .cloned()
                .ok_or_else(|| CodecError::Eval(format!("no field {}", child.name)))?,
            Value::Enum { type_name, member } => match child.name.as_str() {
                "value" => {
                    let def = self
                        .registry
                        .get_enum(type_name)
                        .ok_or_else(|| CodecError::UnknownType(type_name.clone()))?;
                    let raw = def.value_of(member).ok_or_else(|| {
                        CodecError::Eval(format!("{} has no member {}", type_name, member))
                    })?;
                    Value::I64(raw)
                }
                "name" => Value::Str(member.clone()),
                other => {
                    return Err(CodecError::Eval(format!(
                        "enum {} has no accessor {}",
                        type_name, other
                    )))
                }
            },
            _ => {
                return Err(CodecError::Eval(format!(
                    "cannot access {} on a scalar",
                    child.name
                )))
            }
        };
        index_into(projected, child.index, &child.name)
    }

    fn eval_intrinsic(&self, variable: &Variable, ctx: &EvalCtx) -> Result<Value, CodecError> {
        let args = variable.args.as_deref().unwrap_or(&[]);
        match variable.name.as_str() {
            "COUNT" => {
                let arg = args
                    .first()
                    .ok_or_else(|| CodecError::Eval("COUNT requires an argument".into()))?;
                let value = self.eval(arg, ctx)?;
                let list = value
                    .as_list()
                    .ok_or_else(|| CodecError::Eval("COUNT expects a list".into()))?;
                Ok(Value::U32(list.len() as u32))
            }
            // Runtime values already carry their concrete width; a cast only
            // matters to emitted code.
            "CAST" => {
                let arg = args
                    .first()
                    .ok_or_else(|| CodecError::Eval("CAST requires arguments".into()))?;
                self.eval(arg, ctx)
            }
            "STATIC_CALL" => {
                let fn_name = args
                    .first()
                    .and_then(|a| a.as_string_literal())
                    .ok_or_else(|| CodecError::Eval("STATIC_CALL: missing name".into()))?;
                let helper = self.helpers.get(fn_name).ok_or_else(|| {
                    CodecError::Unsupported(format!("no helper registered for {}", fn_name))
                })?;
                let mut values = Vec::new();
                for arg in &args[1..] {
                    values.push(self.eval(arg, ctx)?);
                }
                helper(&values)
            }
            other => Err(CodecError::Unsupported(format!(
                "intrinsic {} is not interpretable",
                other
            ))),
        }
    }
}

fn is_float(value: &Value) -> bool {
    matches!(value, Value::F32(_) | Value::F64(_))
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::I64(*i),
        Literal::Float(f) => Value::F64(*f),
        Literal::Str(s) => Value::Str(s.clone()),
        Literal::Null | Literal::Variable(_) => Value::Bool(false),
    }
}

fn literal_matches(expected: &Literal, actual: &Value) -> bool {
    match expected {
        Literal::Int(i) => actual.as_i64() == Some(*i),
        Literal::Float(f) => actual.as_f64() == Some(*f),
        Literal::Bool(b) => actual.as_bool() == Some(*b),
        Literal::Str(s) => actual.as_str() == Some(s),
        Literal::Null | Literal::Variable(_) => false,
    }
}

fn index_into(value: Value, index: Option<u32>, name: &str) -> Result<Value, CodecError> {
    match index {
        None => Ok(value),
        Some(i) => value
            .as_list()
            .and_then(|items| items.get(i as usize).cloned())
            .ok_or_else(|| CodecError::Eval(format!("{}[{}]: no such element", name, i))),
    }
}
