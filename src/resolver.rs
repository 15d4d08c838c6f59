//! Cross-reference resolution: merges parsed units into one registry, binds
//! every named type reference, and type-binds the variables inside field
//! expressions.
//!
//! Resolution is a pure rebuild: the parsed contexts go in, a fully bound
//! `TypeRegistry` comes out, and nothing is mutated in place afterwards.

use std::collections::{BTreeMap, HashSet};

use crate::ast::*;
use crate::error::Error;
use crate::term::{Term, Variable};

/// Names that expressions may use without a field or argument behind them.
/// They are bound by the consuming side (emitted code or the interpreter),
/// never by the resolver.
pub const CONTEXT_NAMES: &[&str] = &[
    "readBuffer",
    "writeBuffer",
    "_value",
    "_type",
    "element",
    "size",
    "checksumRawData",
    "lastItem",
];

/// Merged, fully resolved set of type definitions. Iteration order is stable
/// (name order) so emitted output is deterministic.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    pub types: BTreeMap<String, TypeDefinition>,
}

impl TypeRegistry {
    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn get_complex(&self, name: &str) -> Option<&ComplexType> {
        self.types.get(name).and_then(TypeDefinition::as_complex)
    }

    pub fn get_enum(&self, name: &str) -> Option<&EnumType> {
        self.types.get(name).and_then(TypeDefinition::as_enum)
    }

    /// Static wire size of a type in bits, or `None` when any field's size is
    /// only known at runtime. Virtual fields contribute nothing; implicit
    /// fields count.
    pub fn static_wire_bits(&self, name: &str) -> Option<u64> {
        let mut visiting = HashSet::new();
        self.wire_bits_inner(name, &mut visiting)
    }

    fn wire_bits_inner(&self, name: &str, visiting: &mut HashSet<String>) -> Option<u64> {
        if !visiting.insert(name.to_string()) {
            return None;
        }
        let complex = self.get_complex(name)?;
        if complex.switch.is_some() {
            return None;
        }
        let mut total = 0u64;
        for field in &complex.fields {
            total += match field {
                Field::Virtual { .. } => 0,
                Field::Const { type_ref, .. }
                | Field::Reserved { type_ref, .. }
                | Field::Discriminator { type_ref, .. }
                | Field::Implicit { type_ref, .. } => u64::from(type_ref.size_in_bits()?),
                Field::Simple { type_ref, .. } => self.ref_bits(type_ref, visiting)?,
                Field::Array { .. } | Field::Optional { .. } | Field::Manual { .. } => return None,
            };
        }
        visiting.remove(name);
        Some(total)
    }

    fn ref_bits(&self, type_ref: &TypeReference, visiting: &mut HashSet<String>) -> Option<u64> {
        match type_ref {
            TypeReference::Simple(s) => s.size_in_bits().map(u64::from),
            TypeReference::Complex { name, .. } => self.wire_bits_inner(name, visiting),
            TypeReference::Enum { name, .. } => self
                .get_enum(name)
                .and_then(|e| e.backing_type.size_in_bits())
                .map(u64::from),
        }
    }
}

/// Merge parsed units and resolve every reference. Fails on duplicate type
/// names, dangling references, switch/discriminator mismatches and cycles
/// among virtual fields.
pub fn resolve(contexts: Vec<TypeContext>) -> Result<TypeRegistry, Error> {
    let mut merged: BTreeMap<String, TypeDefinition> = BTreeMap::new();
    for context in contexts {
        for (name, def) in context.types {
            if merged.insert(name.clone(), def).is_some() {
                return Err(Error::Resolution(format!("duplicate type name: {}", name)));
            }
        }
    }
    log::debug!("resolving {} type definitions", merged.len());

    let draft = TypeRegistry { types: merged };

    // Pass 1: reclassify named references and check they resolve.
    let mut reclassified = BTreeMap::new();
    for (name, def) in &draft.types {
        let def = match def {
            TypeDefinition::Complex(c) => {
                TypeDefinition::Complex(reclassify_complex(c, &draft)?)
            }
            TypeDefinition::Enum(e) => TypeDefinition::Enum(e.clone()),
        };
        reclassified.insert(name.clone(), def);
    }
    let draft = TypeRegistry {
        types: reclassified,
    };

    // Pass 2: structural checks that need the whole registry.
    for def in draft.types.values() {
        if let TypeDefinition::Complex(c) = def {
            check_switch(c, &draft)?;
            check_virtual_cycles(c)?;
        }
    }

    // Pass 3: bind variables inside every expression.
    let mut bound = BTreeMap::new();
    for (name, def) in &draft.types {
        let def = match def {
            TypeDefinition::Complex(c) => TypeDefinition::Complex(bind_complex(c, &draft)?),
            TypeDefinition::Enum(e) => TypeDefinition::Enum(e.clone()),
        };
        bound.insert(name.clone(), def);
    }
    Ok(TypeRegistry { types: bound })
}

/// Rewrites `Complex` references whose target is an enum into `Enum`
/// references, and rejects references to undefined names.
fn reclassify_complex(complex: &ComplexType, registry: &TypeRegistry) -> Result<ComplexType, Error> {
    let mut out = complex.clone();
    for arg in &mut out.parser_args {
        arg.type_ref = reclassify_ref(&arg.type_ref, &complex.name, registry)?;
    }
    for field in &mut out.fields {
        match field {
            Field::Simple { type_ref, .. }
            | Field::Optional { type_ref, .. }
            | Field::Virtual { type_ref, .. }
            | Field::Manual { type_ref, .. } => {
                *type_ref = reclassify_ref(type_ref, &complex.name, registry)?;
            }
            Field::Array { element_type, .. } => {
                *element_type = reclassify_ref(element_type, &complex.name, registry)?;
            }
            Field::Const { .. }
            | Field::Reserved { .. }
            | Field::Discriminator { .. }
            | Field::Implicit { .. } => {}
        }
    }
    Ok(out)
}

fn reclassify_ref(
    type_ref: &TypeReference,
    owner: &str,
    registry: &TypeRegistry,
) -> Result<TypeReference, Error> {
    match type_ref {
        TypeReference::Simple(_) => Ok(type_ref.clone()),
        TypeReference::Complex { name, ctor_args } => match registry.get(name) {
            Some(TypeDefinition::Complex(_)) => Ok(type_ref.clone()),
            Some(TypeDefinition::Enum(_)) => {
                if !ctor_args.is_empty() {
                    return Err(Error::Resolution(format!(
                        "{}: enum type {} takes no constructor arguments",
                        owner, name
                    )));
                }
                Ok(TypeReference::Enum {
                    name: name.clone(),
                    member_path: None,
                })
            }
            None => Err(Error::Resolution(format!(
                "{}: reference to undefined type {}",
                owner, name
            ))),
        },
        TypeReference::Enum { name, member_path } => match registry.get(name) {
            Some(TypeDefinition::Enum(e)) => {
                if let Some(member) = member_path {
                    if !e.has_member(member) {
                        return Err(Error::Resolution(format!(
                            "{}: enum {} has no member {}",
                            owner, name, member
                        )));
                    }
                }
                Ok(type_ref.clone())
            }
            Some(TypeDefinition::Complex(_)) => Err(Error::Resolution(format!(
                "{}: {} is not an enum type",
                owner, name
            ))),
            None => Err(Error::Resolution(format!(
                "{}: reference to undefined enum {}",
                owner, name
            ))),
        },
    }
}

/// A switch header must name a prior discriminator field (or parser
/// argument), every case must exist, and case values must be distinct.
fn check_switch(complex: &ComplexType, registry: &TypeRegistry) -> Result<(), Error> {
    let switch = match &complex.switch {
        Some(s) => s,
        None => return Ok(()),
    };
    let is_discriminator = complex
        .fields
        .iter()
        .any(|f| matches!(f, Field::Discriminator { name, .. } if name == &switch.discriminator));
    let is_arg = complex.arg_type(&switch.discriminator).is_some();
    if !is_discriminator && !is_arg {
        return Err(Error::Resolution(format!(
            "{}: typeSwitch discriminator {} is not a discriminator field or argument",
            complex.name, switch.discriminator
        )));
    }

    let mut seen = Vec::new();
    for case in &switch.cases {
        let child = registry.get_complex(case).ok_or_else(|| {
            Error::Resolution(format!("{}: missing case type {}", complex.name, case))
        })?;
        let value = child.discriminator_value.as_ref().ok_or_else(|| {
            Error::Resolution(format!("{}: case {} has no discriminator value", complex.name, case))
        })?;
        if seen.contains(&value) {
            return Err(Error::Resolution(format!(
                "{}: duplicate discriminator value in case {}",
                complex.name, case
            )));
        }
        seen.push(value);
    }
    Ok(())
}

/// Virtual fields may read each other, but not in a cycle.
fn check_virtual_cycles(complex: &ComplexType) -> Result<(), Error> {
    let virtuals: Vec<(&str, &Term)> = complex
        .fields
        .iter()
        .filter_map(|f| match f {
            Field::Virtual {
                name, value_expr, ..
            } => Some((name.as_str(), value_expr)),
            _ => None,
        })
        .collect();

    fn visit(
        name: &str,
        virtuals: &[(&str, &Term)],
        stack: &mut Vec<String>,
        done: &mut HashSet<String>,
        owner: &str,
    ) -> Result<(), Error> {
        if done.contains(name) {
            return Ok(());
        }
        if stack.iter().any(|n| n == name) {
            return Err(Error::Resolution(format!(
                "{}: cycle among virtual fields involving {}",
                owner, name
            )));
        }
        stack.push(name.to_string());
        if let Some((_, expr)) = virtuals.iter().find(|(n, _)| *n == name) {
            let mut referenced = Vec::new();
            expr.for_each_variable(&mut |v| referenced.push(v.name.clone()));
            for target in referenced {
                if virtuals.iter().any(|(n, _)| *n == target) {
                    visit(&target, virtuals, stack, done, owner)?;
                }
            }
        }
        stack.pop();
        done.insert(name.to_string());
        Ok(())
    }

    let mut done = HashSet::new();
    for (name, _) in &virtuals {
        visit(name, &virtuals, &mut Vec::new(), &mut done, &complex.name)?;
    }
    Ok(())
}

/// Binds `Variable::type_ref` across every expression of a complex type.
fn bind_complex(complex: &ComplexType, registry: &TypeRegistry) -> Result<ComplexType, Error> {
    let mut out = complex.clone();
    let scope = Scope {
        complex,
        registry,
    };
    for field in &mut out.fields {
        match field {
            Field::Array { loop_expr, .. } => scope.bind_term(loop_expr)?,
            Field::Optional { cond_expr, .. } => scope.bind_term(cond_expr)?,
            Field::Virtual { value_expr, .. } => scope.bind_term(value_expr)?,
            Field::Implicit { serialize_expr, .. } => scope.bind_term(serialize_expr)?,
            Field::Manual {
                parse_expr,
                serialize_expr,
                length_expr,
                ..
            } => {
                scope.bind_term(parse_expr)?;
                scope.bind_term(serialize_expr)?;
                scope.bind_term(length_expr)?;
            }
            Field::Simple { type_ref, .. } => bind_ctor_args(type_ref, &scope)?,
            Field::Const { .. } | Field::Reserved { .. } | Field::Discriminator { .. } => {}
        }
        if let Field::Array { element_type, .. } | Field::Optional { type_ref: element_type, .. } =
            field
        {
            bind_ctor_args(element_type, &scope)?;
        }
    }
    Ok(out)
}

fn bind_ctor_args(type_ref: &mut TypeReference, scope: &Scope) -> Result<(), Error> {
    match type_ref {
        TypeReference::Complex { ctor_args, .. } => {
            for arg in ctor_args {
                scope.bind_term(arg)?;
            }
            Ok(())
        }
        TypeReference::Simple(simple) => {
            if let Some(expr) = &mut simple.length_expr {
                scope.bind_term(expr)?;
            }
            Ok(())
        }
        TypeReference::Enum { .. } => Ok(()),
    }
}

struct Scope<'a> {
    complex: &'a ComplexType,
    registry: &'a TypeRegistry,
}

impl Scope<'_> {
    fn bind_term(&self, term: &mut Term) -> Result<(), Error> {
        match term {
            Term::Literal(crate::term::Literal::Variable(v)) => self.bind_variable(v),
            Term::Literal(_) => Ok(()),
            Term::Unary { a, .. } => self.bind_term(a),
            Term::Binary { a, b, .. } => {
                self.bind_term(a)?;
                self.bind_term(b)
            }
            Term::Ternary {
                cond,
                then,
                otherwise,
            } => {
                self.bind_term(cond)?;
                self.bind_term(then)?;
                self.bind_term(otherwise)
            }
        }
    }

    fn bind_variable(&self, variable: &mut Variable) -> Result<(), Error> {
        if let Some(args) = &mut variable.args {
            for arg in args {
                self.bind_term(arg)?;
            }
        }
        // Intrinsics and reserved context names stay unbound; the consuming
        // side gives them meaning.
        if variable.is_intrinsic() || CONTEXT_NAMES.contains(&variable.name.as_str()) {
            return Ok(());
        }
        if variable.name == "curPos" {
            variable.type_ref = Some(TypeReference::Simple(SimpleTypeReference::uint(32)));
            return Ok(());
        }

        // Enum member access: Color.GREEN.
        if let Some(TypeDefinition::Enum(e)) = self.registry.get(&variable.name) {
            let member_path = match &variable.child {
                Some(child) => {
                    if !e.has_member(&child.name) {
                        return Err(Error::Resolution(format!(
                            "{}: enum {} has no member {}",
                            self.complex.name, e.name, child.name
                        )));
                    }
                    Some(child.name.clone())
                }
                None => None,
            };
            variable.type_ref = Some(TypeReference::Enum {
                name: e.name.clone(),
                member_path,
            });
            return Ok(());
        }

        let type_ref = self
            .lookup(&variable.name)
            .ok_or_else(|| {
                Error::Resolution(format!(
                    "{}: unknown name {} in expression",
                    self.complex.name, variable.name
                ))
            })?;
        log::debug!(
            "{}: bound {} to {:?}",
            self.complex.name,
            variable.name,
            type_ref
        );
        if let Some(child) = &mut variable.child {
            self.bind_child(child, &type_ref)?;
        }
        variable.type_ref = Some(type_ref);
        Ok(())
    }

    /// Field or parser-argument lookup, walking the parent chain so that case
    /// types can read fields their enclosing type parsed earlier.
    fn lookup(&self, name: &str) -> Option<TypeReference> {
        let mut current = Some(self.complex);
        while let Some(complex) = current {
            if let Some(t) = complex.field_type(name) {
                return Some(t);
            }
            if let Some(t) = complex.arg_type(name) {
                return Some(t.clone());
            }
            current = complex
                .parent_type
                .as_deref()
                .and_then(|p| self.registry.get_complex(p));
        }
        None
    }

    /// Dotted access through a complex-typed field: `header.length`.
    fn bind_child(&self, child: &mut Variable, parent_ref: &TypeReference) -> Result<(), Error> {
        if let Some(args) = &mut child.args {
            for arg in args {
                self.bind_term(arg)?;
            }
        }
        let parent = match parent_ref {
            TypeReference::Complex { name, .. } => match self.registry.get_complex(name) {
                Some(c) => c,
                None => return Ok(()),
            },
            // Enum accessors (`.value`) and simple types have no fields to
            // resolve into.
            _ => return Ok(()),
        };
        let type_ref = match parent.field_type(&child.name).or_else(|| {
            parent.arg_type(&child.name).cloned()
        }) {
            Some(t) => t,
            None => {
                return Err(Error::Resolution(format!(
                    "{}: type {} has no field {}",
                    self.complex.name, parent.name, child.name
                )))
            }
        };
        if let Some(grandchild) = &mut child.child {
            self.bind_child(grandchild, &type_ref)?;
        }
        child.type_ref = Some(type_ref);
        Ok(())
    }
}
