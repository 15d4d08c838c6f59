//! Parse spec source into the typed model using PEST.
//!
//! Parsing is per-unit and deliberately shallow on cross-references: a field
//! typed with a name this unit does not define is recorded in
//! `TypeContext::unresolved_refs` and left as a named reference for the
//! resolver to bind against the merged registry.

use std::collections::HashMap;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

use crate::ast::*;
use crate::error::Error;
use crate::term::{BinaryOp, Literal, Term, UnaryOp, Variable};

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SpecParser;

/// Parse one spec unit into a `TypeContext`.
///
/// Case statements of a `typeSwitch` become full type definitions of their
/// own, carrying the enclosing type's name and parser arguments.
pub fn parse(source: &str) -> Result<TypeContext, Error> {
    let pairs = SpecParser::parse(Rule::file, source)
        .map_err(|e| Error::Syntax(format!("{}", e)))?;
    let file = pairs
        .into_iter()
        .next()
        .ok_or_else(|| Error::Syntax("empty parse".into()))?;

    let mut types: Vec<TypeDefinition> = Vec::new();
    for block in file.into_inner() {
        if block.as_rule() != Rule::type_block {
            continue;
        }
        let inner = block
            .into_inner()
            .next()
            .ok_or_else(|| Error::Syntax("empty type block".into()))?;
        match inner.as_rule() {
            Rule::complex_type => build_complex_type(inner, &mut types)?,
            Rule::enum_type => types.push(TypeDefinition::Enum(build_enum_type(inner)?)),
            r => return Err(Error::Syntax(format!("unexpected block: {:?}", r))),
        }
    }

    let mut by_name = HashMap::new();
    for def in &types {
        if by_name
            .insert(def.name().to_string(), def.clone())
            .is_some()
        {
            return Err(Error::Syntax(format!(
                "duplicate type name: {}",
                def.name()
            )));
        }
    }

    let unresolved_refs = collect_unresolved(&types, &by_name);
    Ok(TypeContext {
        types: by_name,
        unresolved_refs,
    })
}

/// Named references (complex or enum) with no definition in this unit.
fn collect_unresolved(
    types: &[TypeDefinition],
    defined: &HashMap<String, TypeDefinition>,
) -> Vec<String> {
    let mut refs = Vec::new();
    let mut note = |name: &str| {
        if !defined.contains_key(name) && !refs.iter().any(|r| r == name) {
            refs.push(name.to_string());
        }
    };
    for def in types {
        let complex = match def {
            TypeDefinition::Complex(c) => c,
            TypeDefinition::Enum(_) => continue,
        };
        for arg in &complex.parser_args {
            if let Some(name) = arg.type_ref.referenced_name() {
                note(name);
            }
        }
        for field in &complex.fields {
            if let Some(TypeReference::Complex { name, .. } | TypeReference::Enum { name, .. }) =
                field.value_type().as_ref()
            {
                note(name);
            }
        }
    }
    refs
}

fn build_complex_type(pair: Pair<Rule>, out: &mut Vec<TypeDefinition>) -> Result<(), Error> {
    let mut name = String::new();
    let mut parser_args = Vec::new();
    let mut fields = Vec::new();
    let mut switch_pair = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::arg_list => parser_args = build_arg_list(inner)?,
            Rule::field_def => fields.push(build_field(inner)?),
            Rule::type_switch => switch_pair = Some(inner),
            _ => {}
        }
    }
    if name.is_empty() {
        return Err(Error::Syntax("type block: missing name".into()));
    }

    let switch = match switch_pair {
        Some(sw) => Some(build_type_switch(sw, &name, &parser_args, out)?),
        None => None,
    };

    out.push(TypeDefinition::Complex(ComplexType {
        name,
        parser_args,
        fields,
        parent_type: None,
        discriminator_value: None,
        switch,
    }));
    Ok(())
}

/// Builds the switch header and appends one child `ComplexType` per case.
/// Children inherit the enclosing type's parser arguments.
fn build_type_switch(
    pair: Pair<Rule>,
    parent_name: &str,
    parent_args: &[Argument],
    out: &mut Vec<TypeDefinition>,
) -> Result<TypeSwitch, Error> {
    let mut discriminator = String::new();
    let mut cases = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => discriminator = inner.as_str().to_string(),
            Rule::switch_case => {
                let mut case_value = None;
                let mut case_name = String::new();
                let mut case_fields = Vec::new();
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::quoted_expr => {
                            case_value = Some(literal_of_expr(build_quoted_expr(part)?)?)
                        }
                        Rule::ident => case_name = part.as_str().to_string(),
                        Rule::arg_list => {
                            // The dispatcher has nothing to pass for them;
                            // cases only see the enclosing type's parameters.
                            return Err(Error::Syntax(format!(
                                "switch case {}: cases cannot declare their own parameters",
                                case_name
                            )));
                        }
                        Rule::field_def => case_fields.push(build_field(part)?),
                        _ => {}
                    }
                }
                let case_value = case_value
                    .ok_or_else(|| Error::Syntax("switch case: missing value".into()))?;
                if case_name.is_empty() {
                    return Err(Error::Syntax("switch case: missing type name".into()));
                }
                cases.push(case_name.clone());
                out.push(TypeDefinition::Complex(ComplexType {
                    name: case_name,
                    parser_args: parent_args.to_vec(),
                    fields: case_fields,
                    parent_type: Some(parent_name.to_string()),
                    discriminator_value: Some(case_value),
                    switch: None,
                }));
            }
            _ => {}
        }
    }
    if discriminator.is_empty() {
        return Err(Error::Syntax("typeSwitch: missing discriminator".into()));
    }
    Ok(TypeSwitch {
        discriminator,
        cases,
    })
}

fn build_enum_type(pair: Pair<Rule>) -> Result<EnumType, Error> {
    let mut backing_type = None;
    let mut name = String::new();
    let mut members: Vec<(String, Literal)> = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::data_type => backing_type = Some(build_data_type(inner)?),
            Rule::ident => name = inner.as_str().to_string(),
            Rule::enum_member => {
                let mut value = None;
                let mut member_name = String::new();
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::quoted_expr => {
                            value = Some(literal_of_expr(build_quoted_expr(part)?)?)
                        }
                        Rule::ident => member_name = part.as_str().to_string(),
                        _ => {}
                    }
                }
                // Value-less members count up from the previous value; a
                // value-less first member starts at 0.
                let value = match value {
                    Some(v) => v,
                    None => {
                        let prev = members
                            .last()
                            .and_then(|(_, lit)| lit.as_int())
                            .unwrap_or(-1);
                        Literal::Int(prev + 1)
                    }
                };
                members.push((member_name, value));
            }
            _ => {}
        }
    }
    if name.is_empty() {
        return Err(Error::Syntax("enum block: missing name".into()));
    }
    Ok(EnumType {
        name,
        backing_type: backing_type.unwrap_or_else(|| SimpleTypeReference::uint(32)),
        members,
    })
}

fn build_arg_list(pair: Pair<Rule>) -> Result<Vec<Argument>, Error> {
    let mut args = Vec::new();
    for arg in pair.into_inner() {
        if arg.as_rule() != Rule::argument {
            continue;
        }
        let mut it = arg.into_inner();
        let type_pair = it
            .next()
            .ok_or_else(|| Error::Syntax("argument: missing type".into()))?;
        let name_pair = it
            .next()
            .ok_or_else(|| Error::Syntax("argument: missing name".into()))?;
        args.push(Argument {
            name: name_pair.as_str().to_string(),
            type_ref: build_type_ref(type_pair)?,
        });
    }
    Ok(args)
}

fn build_field(pair: Pair<Rule>) -> Result<Field, Error> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| Error::Syntax("empty field".into()))?;
    let rule = inner.as_rule();
    let mut type_ref = None;
    let mut data_type = None;
    let mut idents: Vec<String> = Vec::new();
    let mut exprs: Vec<Term> = Vec::new();
    let mut literal = None;
    let mut loop_kind = None;

    for part in inner.into_inner() {
        match part.as_rule() {
            Rule::type_ref => type_ref = Some(build_type_ref(part)?),
            Rule::data_type => data_type = Some(build_data_type(part)?),
            Rule::ident => idents.push(part.as_str().to_string()),
            Rule::quoted_expr => exprs.push(build_quoted_expr(part)?),
            Rule::literal_value => literal = Some(build_literal_value(part)?),
            Rule::loop_kind => {
                loop_kind = Some(match part.as_str() {
                    "count" => LoopKind::Count,
                    "length" => LoopKind::Length,
                    _ => LoopKind::Terminated,
                })
            }
            _ => {}
        }
    }

    let name = |idents: &[String]| -> Result<String, Error> {
        idents
            .first()
            .cloned()
            .ok_or_else(|| Error::Syntax("field: missing name".into()))
    };
    let one_expr = |exprs: &mut Vec<Term>| -> Result<Term, Error> {
        if exprs.len() == 1 {
            Ok(exprs.remove(0))
        } else {
            Err(Error::Syntax("field: missing expression".into()))
        }
    };

    let mut exprs = exprs;
    match rule {
        Rule::simple_field => Ok(Field::Simple {
            name: name(&idents)?,
            type_ref: required(type_ref)?,
        }),
        Rule::enum_field => {
            // [enum Color color]: first ident is the enum type name.
            if idents.len() != 2 {
                return Err(Error::Syntax("enum field: expected type and name".into()));
            }
            Ok(Field::Simple {
                name: idents[1].clone(),
                type_ref: TypeReference::Enum {
                    name: idents[0].clone(),
                    member_path: None,
                },
            })
        }
        Rule::array_field => Ok(Field::Array {
            name: name(&idents)?,
            element_type: required(type_ref)?,
            loop_kind: loop_kind
                .ok_or_else(|| Error::Syntax("array field: missing loop kind".into()))?,
            loop_expr: one_expr(&mut exprs)?,
        }),
        Rule::const_field => Ok(Field::Const {
            name: name(&idents)?,
            type_ref: required(data_type)?,
            expected: literal.ok_or_else(|| Error::Syntax("const field: missing value".into()))?,
        }),
        Rule::reserved_field => Ok(Field::Reserved {
            type_ref: required(data_type)?,
            expected: literal
                .ok_or_else(|| Error::Syntax("reserved field: missing value".into()))?,
        }),
        Rule::optional_field => Ok(Field::Optional {
            name: name(&idents)?,
            type_ref: required(type_ref)?,
            cond_expr: one_expr(&mut exprs)?,
        }),
        Rule::discriminator_field => Ok(Field::Discriminator {
            name: name(&idents)?,
            type_ref: required(data_type)?,
        }),
        Rule::virtual_field => Ok(Field::Virtual {
            name: name(&idents)?,
            type_ref: required(type_ref)?,
            value_expr: one_expr(&mut exprs)?,
        }),
        Rule::implicit_field => Ok(Field::Implicit {
            name: name(&idents)?,
            type_ref: required(data_type)?,
            serialize_expr: one_expr(&mut exprs)?,
        }),
        Rule::manual_field => {
            if exprs.len() != 3 {
                return Err(Error::Syntax(
                    "manual field: expected parse, serialize and length expressions".into(),
                ));
            }
            let length_expr = exprs.pop().unwrap_or(Term::Literal(Literal::Null));
            let serialize_expr = exprs.pop().unwrap_or(Term::Literal(Literal::Null));
            let parse_expr = exprs.pop().unwrap_or(Term::Literal(Literal::Null));
            Ok(Field::Manual {
                name: name(&idents)?,
                type_ref: required(type_ref)?,
                parse_expr,
                serialize_expr,
                length_expr,
            })
        }
        r => Err(Error::Syntax(format!("unexpected field rule: {:?}", r))),
    }
}

fn required<T>(opt: Option<T>) -> Result<T, Error> {
    opt.ok_or_else(|| Error::Syntax("field: missing type".into()))
}

fn build_type_ref(pair: Pair<Rule>) -> Result<TypeReference, Error> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| Error::Syntax("empty type reference".into()))?;
    match inner.as_rule() {
        Rule::data_type => Ok(TypeReference::Simple(build_data_type(inner)?)),
        Rule::complex_ref => {
            let mut name = String::new();
            let mut ctor_args = Vec::new();
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::ident => name = part.as_str().to_string(),
                    Rule::ctor_args => {
                        for arg in part.into_inner() {
                            if arg.as_rule() == Rule::quoted_expr {
                                ctor_args.push(build_quoted_expr(arg)?);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(TypeReference::Complex { name, ctor_args })
        }
        r => Err(Error::Syntax(format!("unexpected type ref: {:?}", r))),
    }
}

fn build_data_type(pair: Pair<Rule>) -> Result<SimpleTypeReference, Error> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| Error::Syntax("empty data type".into()))?;
    match inner.as_rule() {
        Rule::plain_type => Ok(match inner.as_str() {
            "bit" => SimpleTypeReference::bit(),
            "byte" => SimpleTypeReference::byte(),
            "time" => SimpleTypeReference::sized(SimpleBaseType::Time, 0),
            "date" => SimpleTypeReference::sized(SimpleBaseType::Date, 0),
            _ => SimpleTypeReference::sized(SimpleBaseType::DateTime, 0),
        }),
        Rule::sized_type => {
            let mut it = inner.into_inner();
            let base = it
                .next()
                .ok_or_else(|| Error::Syntax("sized type: missing base".into()))?;
            let bits = it
                .next()
                .ok_or_else(|| Error::Syntax("sized type: missing width".into()))?;
            let size_bits: u32 = bits
                .as_str()
                .parse()
                .map_err(|_| Error::Syntax(format!("bad bit width: {}", bits.as_str())))?;
            if size_bits == 0 {
                return Err(Error::Syntax("bit width must be positive".into()));
            }
            let base = match base.as_str() {
                "uint" => SimpleBaseType::Uint,
                "int" => SimpleBaseType::Int,
                "float" => SimpleBaseType::Float,
                _ => SimpleBaseType::Ufloat,
            };
            Ok(SimpleTypeReference::sized(base, size_bits))
        }
        Rule::string_type => {
            let mut size_bits = 0;
            let mut encoding = DEFAULT_ENCODING.to_string();
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::int_lit => {
                        size_bits = part
                            .as_str()
                            .parse()
                            .map_err(|_| Error::Syntax("bad string width".into()))?
                    }
                    Rule::encoding_attr => encoding = encoding_of(part)?,
                    _ => {}
                }
            }
            Ok(SimpleTypeReference::string(size_bits, encoding))
        }
        Rule::vstring_type => {
            let mut length_expr = None;
            let mut encoding = DEFAULT_ENCODING.to_string();
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::quoted_expr => length_expr = Some(build_quoted_expr(part)?),
                    Rule::encoding_attr => encoding = encoding_of(part)?,
                    _ => {}
                }
            }
            let length_expr = length_expr
                .ok_or_else(|| Error::Syntax("vstring: missing length expression".into()))?;
            Ok(SimpleTypeReference::vstring(length_expr, encoding))
        }
        r => Err(Error::Syntax(format!("unexpected data type: {:?}", r))),
    }
}

fn encoding_of(pair: Pair<Rule>) -> Result<String, Error> {
    for part in pair.into_inner() {
        if part.as_rule() == Rule::string_lit {
            return Ok(unquote(part.as_str()));
        }
    }
    Err(Error::Syntax("encoding attribute: missing value".into()))
}

fn build_literal_value(pair: Pair<Rule>) -> Result<Literal, Error> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| Error::Syntax("empty literal".into()))?;
    build_literal(inner)
}

fn build_literal(pair: Pair<Rule>) -> Result<Literal, Error> {
    match pair.as_rule() {
        Rule::kw_null => Ok(Literal::Null),
        Rule::bool_lit => Ok(Literal::Bool(pair.as_str() == "true")),
        Rule::hex_lit => {
            let digits = &pair.as_str()[2..];
            i64::from_str_radix(digits, 16)
                .map(Literal::Int)
                .map_err(|_| Error::Syntax(format!("bad hex literal: {}", pair.as_str())))
        }
        Rule::number_lit => {
            let text = pair.as_str();
            if text.contains('.') {
                text.parse()
                    .map(Literal::Float)
                    .map_err(|_| Error::Syntax(format!("bad number: {}", text)))
            } else {
                text.parse()
                    .map(Literal::Int)
                    .map_err(|_| Error::Syntax(format!("bad number: {}", text)))
            }
        }
        Rule::string_lit => Ok(Literal::Str(unquote(pair.as_str()))),
        r => Err(Error::Syntax(format!("unexpected literal: {:?}", r))),
    }
}

fn unquote(text: &str) -> String {
    text.trim_matches('"').to_string()
}

/// A switch-case/enum value must fold to a plain literal.
fn literal_of_expr(term: Term) -> Result<Literal, Error> {
    match term {
        Term::Literal(Literal::Variable(v)) => Err(Error::Syntax(format!(
            "expected a literal value, found variable: {}",
            v.name
        ))),
        Term::Literal(lit) => Ok(lit),
        _ => Err(Error::Syntax("expected a literal value".into())),
    }
}

// ==================== Expressions ====================

fn build_quoted_expr(pair: Pair<Rule>) -> Result<Term, Error> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| Error::Syntax("empty quoted expression".into()))?;
    build_expression(inner)
}

fn build_expression(pair: Pair<Rule>) -> Result<Term, Error> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| Error::Syntax("empty expression".into()))?;
    match inner.as_rule() {
        Rule::if_expr => {
            let mut parts = Vec::new();
            for part in inner.into_inner() {
                if part.as_rule() == Rule::expression {
                    parts.push(build_expression(part)?);
                }
            }
            if parts.len() != 3 {
                return Err(Error::Expression("if: expected three branches".into()));
            }
            let otherwise = Box::new(parts.pop().unwrap_or(Term::Literal(Literal::Null)));
            let then = Box::new(parts.pop().unwrap_or(Term::Literal(Literal::Null)));
            let cond = Box::new(parts.pop().unwrap_or(Term::Literal(Literal::Null)));
            Ok(Term::Ternary {
                cond,
                then,
                otherwise,
            })
        }
        Rule::or_expr => build_binary_chain(inner),
        r => Err(Error::Expression(format!("unexpected expression: {:?}", r))),
    }
}

/// Folds an operand-operator chain. All chains are left-associative except
/// exponentiation, which folds from the right.
fn build_binary_chain(pair: Pair<Rule>) -> Result<Term, Error> {
    let rule = pair.as_rule();
    let mut operands: Vec<Term> = Vec::new();
    let mut ops: Vec<BinaryOp> = Vec::new();

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::op_or => ops.push(BinaryOp::Or),
            Rule::op_and => ops.push(BinaryOp::And),
            Rule::op_bitor => ops.push(BinaryOp::BitOr),
            Rule::op_bitand => ops.push(BinaryOp::BitAnd),
            Rule::op_eq => ops.push(if part.as_str() == "==" {
                BinaryOp::Eq
            } else {
                BinaryOp::Neq
            }),
            Rule::op_rel => ops.push(match part.as_str() {
                "<=" => BinaryOp::Le,
                ">=" => BinaryOp::Ge,
                "<" => BinaryOp::Lt,
                _ => BinaryOp::Gt,
            }),
            Rule::op_shift => ops.push(if part.as_str() == "<<" {
                BinaryOp::Shl
            } else {
                BinaryOp::Shr
            }),
            Rule::op_add => ops.push(if part.as_str() == "+" {
                BinaryOp::Add
            } else {
                BinaryOp::Sub
            }),
            Rule::op_mul => ops.push(match part.as_str() {
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                _ => BinaryOp::Mod,
            }),
            Rule::op_pow => ops.push(BinaryOp::Pow),
            Rule::unary_expr => operands.push(build_unary(part)?),
            _ => operands.push(build_binary_chain(part)?),
        }
    }

    if operands.is_empty() {
        return Err(Error::Expression("empty operand chain".into()));
    }
    if rule == Rule::pow_expr {
        // Right-associative.
        let mut term = operands
            .pop()
            .unwrap_or(Term::Literal(Literal::Null));
        while let Some(a) = operands.pop() {
            term = Term::Binary {
                op: BinaryOp::Pow,
                a: Box::new(a),
                b: Box::new(term),
            };
        }
        return Ok(term);
    }

    let mut it = operands.into_iter();
    let mut term = it
        .next()
        .unwrap_or(Term::Literal(Literal::Null));
    for (op, b) in ops.into_iter().zip(it) {
        term = Term::Binary {
            op,
            a: Box::new(term),
            b: Box::new(b),
        };
    }
    Ok(term)
}

fn build_unary(pair: Pair<Rule>) -> Result<Term, Error> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| Error::Syntax("empty unary expression".into()))?;
    let operand = |pair: Pair<Rule>| -> Result<Term, Error> {
        let unary = pair
            .into_inner()
            .next()
            .ok_or_else(|| Error::Syntax("unary: missing operand".into()))?;
        build_unary(unary)
    };
    match inner.as_rule() {
        Rule::not_expr => Ok(Term::Unary {
            op: UnaryOp::Not,
            a: Box::new(operand(inner)?),
        }),
        Rule::neg_expr => Ok(Term::Unary {
            op: UnaryOp::Neg,
            a: Box::new(operand(inner)?),
        }),
        Rule::group_expr => {
            let expr = inner
                .into_inner()
                .next()
                .ok_or_else(|| Error::Syntax("empty group".into()))?;
            Ok(Term::Unary {
                op: UnaryOp::Group,
                a: Box::new(build_expression(expr)?),
            })
        }
        Rule::atom => build_atom(inner),
        r => Err(Error::Expression(format!("unexpected unary: {:?}", r))),
    }
}

fn build_atom(pair: Pair<Rule>) -> Result<Term, Error> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| Error::Syntax("empty atom".into()))?;
    match inner.as_rule() {
        Rule::literal_atom => {
            let lit = inner
                .into_inner()
                .next()
                .ok_or_else(|| Error::Syntax("empty literal atom".into()))?;
            Ok(Term::Literal(build_literal(lit)?))
        }
        Rule::variable_path => {
            let variable = build_variable_path(inner)?;
            check_intrinsic_call(&variable)?;
            Ok(Term::variable(variable))
        }
        r => Err(Error::Expression(format!("unexpected atom: {:?}", r))),
    }
}

fn build_variable_path(pair: Pair<Rule>) -> Result<Variable, Error> {
    let mut segments: Vec<Variable> = Vec::new();
    for seg in pair.into_inner() {
        if seg.as_rule() != Rule::var_segment {
            continue;
        }
        let mut variable = Variable::named("");
        for part in seg.into_inner() {
            match part.as_rule() {
                Rule::ident => variable.name = part.as_str().to_string(),
                Rule::call_args => {
                    let mut args = Vec::new();
                    for arg in part.into_inner() {
                        if arg.as_rule() == Rule::expression {
                            args.push(build_expression(arg)?);
                        }
                    }
                    variable.args = Some(args);
                }
                Rule::index_suffix => {
                    let index = part
                        .into_inner()
                        .next()
                        .ok_or_else(|| Error::Syntax("index: missing value".into()))?;
                    variable.index = Some(
                        index
                            .as_str()
                            .parse()
                            .map_err(|_| Error::Syntax("bad array index".into()))?,
                    );
                }
                _ => {}
            }
        }
        segments.push(variable);
    }

    let mut it = segments.into_iter().rev();
    let mut head = it
        .next()
        .ok_or_else(|| Error::Syntax("empty variable path".into()))?;
    for mut parent in it {
        parent.child = Some(Box::new(head));
        head = parent;
    }
    Ok(head)
}

/// Arity rules for the two call-shaped intrinsics, enforced at parse time so
/// every downstream consumer can rely on them.
fn check_intrinsic_call(variable: &Variable) -> Result<(), Error> {
    match (variable.name.as_str(), &variable.args) {
        ("CAST", Some(args)) if args.len() != 2 => Err(Error::Expression(
            "CAST takes exactly two arguments: a value and a type name".into(),
        )),
        ("CAST", None) => Err(Error::Expression("CAST requires arguments".into())),
        ("STATIC_CALL", Some(args)) => {
            if args.is_empty() {
                return Err(Error::Expression(
                    "STATIC_CALL requires at least a function name".into(),
                ));
            }
            if args[0].as_string_literal().is_none() {
                return Err(Error::Expression(
                    "STATIC_CALL: first argument must be a string literal".into(),
                ));
            }
            Ok(())
        }
        ("STATIC_CALL", None) => Err(Error::Expression(
            "STATIC_CALL requires arguments".into(),
        )),
        _ => Ok(()),
    }
}
