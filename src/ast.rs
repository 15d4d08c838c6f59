//! Typed model of a message-format specification.
//!
//! Everything here is built once per compilation (parse-all, then
//! resolve-all) and read-only afterwards. Field order is wire order.

use std::collections::HashMap;

use crate::term::{Literal, Term};

/// A named type: a composite binary structure or an enum.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    Complex(ComplexType),
    Enum(EnumType),
}

impl TypeDefinition {
    pub fn name(&self) -> &str {
        match self {
            TypeDefinition::Complex(c) => &c.name,
            TypeDefinition::Enum(e) => &e.name,
        }
    }

    pub fn as_complex(&self) -> Option<&ComplexType> {
        match self {
            TypeDefinition::Complex(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumType> {
        match self {
            TypeDefinition::Enum(e) => Some(e),
            _ => None,
        }
    }
}

/// A composite, field-sequenced binary structure.
///
/// Discriminated children carry `parent_type` and `discriminator_value`;
/// discriminated roots carry a `switch` naming their discriminator field and
/// the child types in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexType {
    pub name: String,
    pub parser_args: Vec<Argument>,
    pub fields: Vec<Field>,
    pub parent_type: Option<String>,
    pub discriminator_value: Option<Literal>,
    pub switch: Option<TypeSwitch>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSwitch {
    /// Name of a prior discriminator field of the enclosing type.
    pub discriminator: String,
    /// Child type names, declaration order.
    pub cases: Vec<String>,
}

impl ComplexType {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == Some(name))
    }

    /// Type of the named field, including virtual/implicit/discriminator
    /// fields (all of which are readable from expressions).
    pub fn field_type(&self, name: &str) -> Option<TypeReference> {
        self.field(name).and_then(|f| f.value_type())
    }

    pub fn arg_type(&self, name: &str) -> Option<&TypeReference> {
        self.parser_args
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.type_ref)
    }

    pub fn is_discriminated_root(&self) -> bool {
        self.switch.is_some()
    }
}

/// An enum with a simple backing type and ordered (name, value) members.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub backing_type: SimpleTypeReference,
    pub members: Vec<(String, Literal)>,
}

impl EnumType {
    /// Wire value to member name.
    pub fn member_for_value(&self, value: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, lit)| lit.as_int() == Some(value))
            .map(|(name, _)| name.as_str())
    }

    /// Member name to wire value.
    pub fn value_of(&self, member: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .and_then(|(_, lit)| lit.as_int())
    }

    pub fn has_member(&self, member: &str) -> bool {
        self.members.iter().any(|(name, _)| name == member)
    }
}

/// A wire field. Declaration order is wire order; `Virtual` never reaches the
/// wire, `Implicit` does but is not a stored member.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Simple {
        name: String,
        type_ref: TypeReference,
    },
    Array {
        name: String,
        element_type: TypeReference,
        loop_kind: LoopKind,
        loop_expr: Term,
    },
    Const {
        name: String,
        type_ref: SimpleTypeReference,
        expected: Literal,
    },
    Reserved {
        type_ref: SimpleTypeReference,
        expected: Literal,
    },
    Optional {
        name: String,
        type_ref: TypeReference,
        cond_expr: Term,
    },
    Discriminator {
        name: String,
        type_ref: SimpleTypeReference,
    },
    /// Computed at parse time, exposed like a stored field, never on the wire.
    Virtual {
        name: String,
        type_ref: TypeReference,
        value_expr: Term,
    },
    /// On the wire; recomputed from other fields at serialize time, bound to
    /// a parse-time local rather than a stored member.
    Implicit {
        name: String,
        type_ref: SimpleTypeReference,
        serialize_expr: Term,
    },
    Manual {
        name: String,
        type_ref: TypeReference,
        parse_expr: Term,
        serialize_expr: Term,
        length_expr: Term,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// Loop expression yields the element count.
    Count,
    /// Loop expression yields the byte length of the array region.
    Length,
    /// Loop until the expression evaluates true.
    Terminated,
}

impl Field {
    pub fn name(&self) -> Option<&str> {
        match self {
            Field::Simple { name, .. }
            | Field::Array { name, .. }
            | Field::Const { name, .. }
            | Field::Optional { name, .. }
            | Field::Discriminator { name, .. }
            | Field::Virtual { name, .. }
            | Field::Implicit { name, .. }
            | Field::Manual { name, .. } => Some(name),
            Field::Reserved { .. } => None,
        }
    }

    /// The value type an expression reading this field sees.
    pub fn value_type(&self) -> Option<TypeReference> {
        match self {
            Field::Simple { type_ref, .. }
            | Field::Optional { type_ref, .. }
            | Field::Virtual { type_ref, .. }
            | Field::Manual { type_ref, .. } => Some(type_ref.clone()),
            Field::Array { element_type, .. } => Some(element_type.clone()),
            Field::Const { type_ref, .. }
            | Field::Discriminator { type_ref, .. }
            | Field::Implicit { type_ref, .. } => Some(TypeReference::Simple(type_ref.clone())),
            Field::Reserved { .. } => None,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Field::Virtual { .. })
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self, Field::Implicit { .. })
    }
}

/// Reference to a type from a field or argument position.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeReference {
    Simple(SimpleTypeReference),
    /// Named composite type, with constructor-parameter expressions where the
    /// callee declares parser arguments.
    Complex { name: String, ctor_args: Vec<Term> },
    /// Named enum type; `member_path` is set when the reference names a
    /// specific member (e.g. `Color.GREEN` inside an expression).
    Enum {
        name: String,
        member_path: Option<String>,
    },
}

impl TypeReference {
    pub fn as_simple(&self) -> Option<&SimpleTypeReference> {
        match self {
            TypeReference::Simple(s) => Some(s),
            _ => None,
        }
    }

    pub fn referenced_name(&self) -> Option<&str> {
        match self {
            TypeReference::Complex { name, .. } | TypeReference::Enum { name, .. } => Some(name),
            TypeReference::Simple(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleBaseType {
    Bit,
    Byte,
    Uint,
    Int,
    Float,
    Ufloat,
    String,
    Vstring,
    Time,
    Date,
    DateTime,
}

/// A simple (non-composite) type with an explicit bit width.
///
/// `Vstring` carries a runtime length expression instead of a static width;
/// `String`/`Vstring` carry an encoding name (default `UTF-8`).
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleTypeReference {
    pub base: SimpleBaseType,
    pub size_bits: u32,
    pub length_expr: Option<Box<Term>>,
    pub encoding: String,
}

pub const DEFAULT_ENCODING: &str = "UTF-8";

impl SimpleTypeReference {
    pub fn sized(base: SimpleBaseType, size_bits: u32) -> Self {
        SimpleTypeReference {
            base,
            size_bits,
            length_expr: None,
            encoding: String::new(),
        }
    }

    pub fn bit() -> Self {
        Self::sized(SimpleBaseType::Bit, 1)
    }

    pub fn byte() -> Self {
        Self::sized(SimpleBaseType::Byte, 8)
    }

    pub fn uint(size_bits: u32) -> Self {
        Self::sized(SimpleBaseType::Uint, size_bits)
    }

    pub fn int(size_bits: u32) -> Self {
        Self::sized(SimpleBaseType::Int, size_bits)
    }

    pub fn string(size_bits: u32, encoding: impl Into<String>) -> Self {
        SimpleTypeReference {
            base: SimpleBaseType::String,
            size_bits,
            length_expr: None,
            encoding: encoding.into(),
        }
    }

    pub fn vstring(length_expr: Term, encoding: impl Into<String>) -> Self {
        SimpleTypeReference {
            base: SimpleBaseType::Vstring,
            size_bits: 0,
            length_expr: Some(Box::new(length_expr)),
            encoding: encoding.into(),
        }
    }

    /// Static bit width, where one exists. `vstring` and the temporal types
    /// have none.
    pub fn size_in_bits(&self) -> Option<u32> {
        match self.base {
            SimpleBaseType::Bit => Some(1),
            SimpleBaseType::Byte => Some(8),
            SimpleBaseType::Uint
            | SimpleBaseType::Int
            | SimpleBaseType::Float
            | SimpleBaseType::Ufloat
            | SimpleBaseType::String => Some(self.size_bits),
            SimpleBaseType::Vstring
            | SimpleBaseType::Time
            | SimpleBaseType::Date
            | SimpleBaseType::DateTime => None,
        }
    }
}

/// A parser/serializer constructor parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub type_ref: TypeReference,
}

/// Per-unit parse result: the types a unit defines, plus the names it
/// references without defining (resolved later against the merged registry).
#[derive(Debug, Clone, Default)]
pub struct TypeContext {
    pub types: HashMap<String, TypeDefinition>,
    pub unresolved_refs: Vec<String>,
}
