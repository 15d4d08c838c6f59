//! Java backend: width-tier type mapping, buffer-call mapping, and full
//! class/enum emission for resolved types.
//!
//! Generated parse code binds every field to a local inside `staticParse`;
//! generated serialize code is a static method receiving the populated value
//! as `_value`. Both carry a `startPos` marker recorded at the message start
//! so `curPos` renders as position-minus-marker; case types receive the
//! marker from the dispatcher.

use crate::ast::*;
use crate::error::Error;
use crate::resolver::{TypeRegistry, CONTEXT_NAMES};
use crate::term::{Direction, Literal, Term, Variable};

use super::{to_expression, ExprCtx, Target};

#[derive(Debug, Default)]
pub struct JavaTarget;

impl JavaTarget {
    pub fn new() -> Self {
        JavaTarget
    }
}

fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn getter(name: &str) -> String {
    format!("get{}()", upper_first(name))
}

fn pow(a: &str, b: &str) -> String {
    format!("Math.pow({}, {})", a, b)
}

fn buffer_name(direction: Direction) -> &'static str {
    match direction {
        Direction::Parse => "readBuffer",
        Direction::Serialize => "writeBuffer",
    }
}

fn render_literal(literal: &Literal) -> String {
    match literal {
        Literal::Null => "null".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Int(i) => i.to_string(),
        Literal::Float(f) => format!("{:?}", f),
        Literal::Str(s) => format!("\"{}\"", s),
        Literal::Variable(v) => v.name.clone(),
    }
}

impl JavaTarget {
    fn simple_native(
        &self,
        simple: &SimpleTypeReference,
        allow_primitive: bool,
    ) -> Result<String, Error> {
        let bits = simple.size_bits;
        let primitive = match simple.base {
            SimpleBaseType::Bit => "boolean",
            SimpleBaseType::Byte => "byte",
            SimpleBaseType::Uint => match bits {
                1..=4 => "byte",
                5..=8 => "short",
                9..=16 => "int",
                17..=32 => "long",
                _ => "BigInteger",
            },
            SimpleBaseType::Int => match bits {
                1..=8 => "byte",
                9..=16 => "short",
                17..=32 => "int",
                33..=64 => "long",
                _ => "BigInteger",
            },
            SimpleBaseType::Float => match bits {
                1..=32 => "float",
                33..=64 => "double",
                _ => "BigDecimal",
            },
            SimpleBaseType::Ufloat => {
                return Err(Error::Emission(
                    "no Java representation for ufloat".to_string(),
                ))
            }
            SimpleBaseType::String | SimpleBaseType::Vstring => "String",
            SimpleBaseType::Time => "LocalTime",
            SimpleBaseType::Date => "LocalDate",
            SimpleBaseType::DateTime => "LocalDateTime",
        };
        if allow_primitive {
            return Ok(primitive.to_string());
        }
        Ok(match primitive {
            "boolean" => "Boolean".to_string(),
            "byte" => "Byte".to_string(),
            "short" => "Short".to_string(),
            "int" => "Integer".to_string(),
            "long" => "Long".to_string(),
            "float" => "Float".to_string(),
            "double" => "Double".to_string(),
            other => other.to_string(),
        })
    }

    fn render_variable(
        &self,
        variable: &Variable,
        direction: Direction,
        ctx: &ExprCtx,
    ) -> Result<String, Error> {
        if variable.name == "curPos" {
            return Ok(format!("({}.getPos() - startPos)", buffer_name(direction)));
        }
        if variable.is_intrinsic() {
            return self.render_intrinsic(variable, direction, ctx);
        }
        if let Some(TypeReference::Enum {
            name,
            member_path: Some(member),
        }) = &variable.type_ref
        {
            return Ok(format!("{}.{}", name, member));
        }

        let is_context = CONTEXT_NAMES.contains(&variable.name.as_str());
        let head = match direction {
            Direction::Parse => variable.name.clone(),
            Direction::Serialize => {
                if is_context {
                    variable.name.clone()
                } else if let Some(Field::Implicit { serialize_expr, .. }) =
                    ctx.owner.field(&variable.name)
                {
                    // Implicit wire values are never stored; recompute.
                    let inner = self.render_term(serialize_expr, direction, ctx)?;
                    format!("({})", inner)
                } else {
                    format!("_value.{}", getter(&variable.name))
                }
            }
        };
        let mut out = head;
        if let Some(index) = variable.index {
            out = format!("{}.get({})", out, index);
        }
        let mut cursor = &variable.child;
        while let Some(child) = cursor {
            out = format!("{}.{}", out, getter(&child.name));
            if let Some(index) = child.index {
                out = format!("{}.get({})", out, index);
            }
            cursor = &child.child;
        }
        Ok(out)
    }

    fn render_intrinsic(
        &self,
        variable: &Variable,
        direction: Direction,
        ctx: &ExprCtx,
    ) -> Result<String, Error> {
        let args = variable.args.as_deref().unwrap_or(&[]);
        match variable.name.as_str() {
            "CAST" => {
                let value = args.first().ok_or_else(|| {
                    Error::Expression("CAST requires arguments".to_string())
                })?;
                let type_name = args
                    .get(1)
                    .and_then(Term::as_variable)
                    .map(|v| v.name.clone())
                    .ok_or_else(|| {
                        Error::Expression("CAST: second argument must be a type name".to_string())
                    })?;
                let value = self.render_term(value, direction, ctx)?;
                Ok(format!("(({}) ({}))", type_name, value))
            }
            "STATIC_CALL" => {
                let fn_name = args
                    .first()
                    .and_then(Term::as_string_literal)
                    .ok_or_else(|| {
                        Error::Expression(
                            "STATIC_CALL: first argument must be a string literal".to_string(),
                        )
                    })?;
                let mut rendered = Vec::new();
                for arg in &args[1..] {
                    rendered.push(self.render_static_call_arg(arg, direction, ctx)?);
                }
                Ok(format!("StaticHelper.{}({})", fn_name, rendered.join(", ")))
            }
            "COUNT" => {
                let arg = args.first().ok_or_else(|| {
                    Error::Expression("COUNT requires an argument".to_string())
                })?;
                Ok(format!("({}).size()", self.render_term(arg, direction, ctx)?))
            }
            other => {
                let mut rendered = Vec::new();
                for arg in args {
                    rendered.push(self.render_term(arg, direction, ctx)?);
                }
                Ok(format!("{}({})", other, rendered.join(", ")))
            }
        }
    }

    /// STATIC_CALL arguments are classified one by one: reserved context
    /// names and the owner's parameter names pass through verbatim, the
    /// `_type` descriptor is resolved at emission time, anything else is an
    /// ordinary sub-expression.
    fn render_static_call_arg(
        &self,
        arg: &Term,
        direction: Direction,
        ctx: &ExprCtx,
    ) -> Result<String, Error> {
        let variable = match arg.as_variable() {
            Some(v) => v,
            None => return self.render_term(arg, direction, ctx),
        };
        if variable.name == "_type" {
            return match variable.child.as_deref().map(|c| c.name.as_str()) {
                Some("name") => Ok(format!("\"{}\"", ctx.owner.name)),
                Some("length") => {
                    let simple = ctx.field_type.ok_or_else(|| {
                        Error::Emission(format!(
                            "{}: _type.length used outside a sized field",
                            ctx.owner.name
                        ))
                    })?;
                    Ok(simple.size_bits.to_string())
                }
                Some("encoding") => {
                    let simple = ctx.field_type.ok_or_else(|| {
                        Error::Emission(format!(
                            "{}: _type.encoding used outside a string field",
                            ctx.owner.name
                        ))
                    })?;
                    Ok(format!("\"{}\"", simple.encoding))
                }
                _ => Err(Error::Emission(format!(
                    "{}: unsupported _type accessor",
                    ctx.owner.name
                ))),
            };
        }
        let pass_through = variable.child.is_none()
            && variable.args.is_none()
            && (CONTEXT_NAMES.contains(&variable.name.as_str())
                || ctx.owner.arg_type(&variable.name).is_some());
        if pass_through {
            return Ok(variable.name.clone());
        }
        self.render_term(arg, direction, ctx)
    }

    fn render_term(
        &self,
        term: &Term,
        direction: Direction,
        ctx: &ExprCtx,
    ) -> Result<String, Error> {
        to_expression(
            term,
            &|v: &Variable| self.render_variable(v, direction, ctx),
            &pow,
        )
    }

    fn field_decl_type(&self, field: &Field) -> Result<Option<String>, Error> {
        Ok(match field {
            Field::Simple { type_ref, .. }
            | Field::Optional { type_ref, .. }
            | Field::Virtual { type_ref, .. }
            | Field::Manual { type_ref, .. } => {
                let boxed = matches!(field, Field::Optional { .. });
                Some(self.native_type(type_ref, !boxed)?)
            }
            Field::Array { element_type, .. } => Some(format!(
                "List<{}>",
                self.native_type(element_type, false)?
            )),
            Field::Discriminator { type_ref, .. } => {
                Some(self.simple_native(type_ref, true)?)
            }
            Field::Const { .. } | Field::Reserved { .. } | Field::Implicit { .. } => None,
        })
    }

    /// Stored members of a type, in wire order: (name, java type).
    fn members(&self, complex: &ComplexType) -> Result<Vec<(String, String)>, Error> {
        let mut out = Vec::new();
        for field in &complex.fields {
            if matches!(field, Field::Const { .. }) {
                continue;
            }
            if let (Some(name), Some(ty)) = (field.name(), self.field_decl_type(field)?) {
                out.push((name.to_string(), ty));
            }
        }
        Ok(out)
    }

    /// Members of the whole parent chain, root first.
    fn chain_members(
        &self,
        complex: &ComplexType,
        registry: &TypeRegistry,
    ) -> Result<Vec<(String, String)>, Error> {
        let mut chain = Vec::new();
        let mut cursor = Some(complex);
        while let Some(c) = cursor {
            chain.push(c);
            cursor = c
                .parent_type
                .as_deref()
                .and_then(|p| registry.get_complex(p));
        }
        chain.reverse();
        let mut out = Vec::new();
        for c in chain {
            out.extend(self.members(c)?);
        }
        Ok(out)
    }

    fn emit_enum(&self, def: &EnumType) -> Result<String, Error> {
        let native = self.simple_native(&def.backing_type, true)?;
        let mut out = String::new();
        out.push_str(&format!("public enum {} {{\n", def.name));
        let constants: Vec<String> = def
            .members
            .iter()
            .map(|(name, value)| {
                format!("    {}(({}) {})", name, native, render_literal(value))
            })
            .collect();
        out.push_str(&constants.join(",\n"));
        out.push_str(";\n\n");
        out.push_str(&format!("    private final {} value;\n\n", native));
        out.push_str(&format!("    {}({} value) {{\n", def.name, native));
        out.push_str("        this.value = value;\n    }\n\n");
        out.push_str(&format!("    public {} getValue() {{\n", native));
        out.push_str("        return value;\n    }\n\n");
        out.push_str(&format!(
            "    public static {} enumForValue({} value) {{\n",
            def.name, native
        ));
        out.push_str(&format!("        for ({} e : values()) {{\n", def.name));
        out.push_str("            if (e.getValue() == value) {\n");
        out.push_str("                return e;\n            }\n        }\n");
        out.push_str("        return null;\n    }\n");
        out.push_str("}\n");
        Ok(out)
    }

    fn parse_statement(
        &self,
        field: &Field,
        ctx: &ExprCtx,
        registry: &TypeRegistry,
    ) -> Result<String, Error> {
        let dir = Direction::Parse;
        match field {
            Field::Simple { name, type_ref } => {
                self.read_assignment(name, type_ref, ctx, registry)
            }
            Field::Array {
                name,
                element_type,
                loop_kind,
                loop_expr,
            } => {
                let elem = self.native_type(element_type, false)?;
                let read = self.read_value(name, element_type, ctx, registry)?;
                let expr = self.render_term(loop_expr, dir, ctx)?;
                let mut out = format!("    List<{}> {} = new ArrayList<>();\n", elem, name);
                match loop_kind {
                    LoopKind::Count => {
                        out.push_str(&format!(
                            "    for (int {n}Index = 0; {n}Index < (int) ({expr}); {n}Index++) {{\n",
                            n = name,
                            expr = expr
                        ));
                        out.push_str(&format!("        {}.add({});\n    }}\n", name, read));
                    }
                    LoopKind::Length => {
                        out.push_str(&format!(
                            "    int {n}EndPos = readBuffer.getPos() + ((int) ({expr})) * 8;\n",
                            n = name,
                            expr = expr
                        ));
                        out.push_str(&format!(
                            "    while (readBuffer.getPos() < {}EndPos) {{\n",
                            name
                        ));
                        out.push_str(&format!("        {}.add({});\n    }}\n", name, read));
                    }
                    LoopKind::Terminated => {
                        out.push_str(&format!("    while (!({})) {{\n", expr));
                        out.push_str(&format!("        {}.add({});\n    }}\n", name, read));
                    }
                }
                Ok(out)
            }
            Field::Const {
                name,
                type_ref,
                expected,
            } => {
                let native = self.simple_native(type_ref, true)?;
                let read = self.read_call(name, type_ref, ctx)?;
                let mismatch = match expected {
                    Literal::Str(s) => format!("!\"{}\".equals({})", s, name),
                    other => format!("{} != {}", name, render_literal(other)),
                };
                Ok(format!(
                    "    {native} {name} = {read};\n    if ({mismatch}) {{\n        throw new ParseException(\"{name}: expected constant \" + {expected} + \" but got \" + {name});\n    }}\n",
                    native = native,
                    name = name,
                    read = read,
                    mismatch = mismatch,
                    expected = render_literal(expected)
                ))
            }
            Field::Reserved { type_ref, expected } => {
                let native = self.simple_native(type_ref, true)?;
                let read = self.read_call("reserved", type_ref, ctx)?;
                Ok(format!(
                    "    {{\n        {native} reserved = {read};\n        if (reserved != {expected}) {{\n            LOGGER.info(\"reserved field holds {{}} instead of {{}}\", reserved, {expected});\n        }}\n    }}\n",
                    native = native,
                    read = read,
                    expected = render_literal(expected)
                ))
            }
            Field::Optional {
                name,
                type_ref,
                cond_expr,
            } => {
                let native = self.native_type(type_ref, false)?;
                let cond = self.render_term(cond_expr, dir, ctx)?;
                let read = self.read_value(name, type_ref, ctx, registry)?;
                Ok(format!(
                    "    {native} {name} = null;\n    if ({cond}) {{\n        {name} = {read};\n    }}\n",
                    native = native,
                    name = name,
                    cond = cond,
                    read = read
                ))
            }
            Field::Discriminator { name, type_ref } => {
                let native = self.simple_native(type_ref, true)?;
                let read = self.read_call(name, type_ref, ctx)?;
                Ok(format!("    {} {} = {};\n", native, name, read))
            }
            Field::Virtual {
                name,
                type_ref,
                value_expr,
            } => {
                let native = self.native_type(type_ref, true)?;
                let expr = self.render_term(value_expr, dir, ctx)?;
                Ok(format!("    {} {} = {};\n", native, name, expr))
            }
            Field::Implicit { name, type_ref, .. } => {
                let native = self.simple_native(type_ref, true)?;
                let read = self.read_call(name, type_ref, ctx)?;
                Ok(format!("    {} {} = {};\n", native, name, read))
            }
            Field::Manual {
                name,
                type_ref,
                parse_expr,
                ..
            } => {
                let native = self.native_type(type_ref, true)?;
                let expr = self.render_term(parse_expr, dir, ctx)?;
                Ok(format!("    {} {} = {};\n", native, name, expr))
            }
        }
    }

    fn read_assignment(
        &self,
        name: &str,
        type_ref: &TypeReference,
        ctx: &ExprCtx,
        registry: &TypeRegistry,
    ) -> Result<String, Error> {
        let native = self.native_type(type_ref, true)?;
        let read = self.read_value(name, type_ref, ctx, registry)?;
        Ok(format!("    {} {} = {};\n", native, name, read))
    }

    /// Reading expression for one value of `type_ref`.
    fn read_value(
        &self,
        name: &str,
        type_ref: &TypeReference,
        ctx: &ExprCtx,
        registry: &TypeRegistry,
    ) -> Result<String, Error> {
        match type_ref {
            TypeReference::Simple(simple) => {
                let field_ctx = ExprCtx {
                    registry: ctx.registry,
                    owner: ctx.owner,
                    field_type: Some(simple),
                };
                self.read_call(name, simple, &field_ctx)
            }
            TypeReference::Complex {
                name: type_name,
                ctor_args,
            } => {
                let mut args = vec!["readBuffer".to_string()];
                for arg in ctor_args {
                    args.push(self.render_term(arg, Direction::Parse, ctx)?);
                }
                Ok(format!("{}.staticParse({})", type_name, args.join(", ")))
            }
            TypeReference::Enum { name: type_name, .. } => {
                let backing = registry
                    .get_enum(type_name)
                    .map(|e| e.backing_type.clone())
                    .ok_or_else(|| {
                        Error::Emission(format!("unresolved enum type: {}", type_name))
                    })?;
                let read = self.read_call(name, &backing, ctx)?;
                Ok(format!("{}.enumForValue({})", type_name, read))
            }
        }
    }

    fn serialize_statement(
        &self,
        field: &Field,
        ctx: &ExprCtx,
        registry: &TypeRegistry,
    ) -> Result<String, Error> {
        let dir = Direction::Serialize;
        match field {
            Field::Simple { name, type_ref } => {
                let value = format!("_value.{}", getter(name));
                self.write_value(name, type_ref, &value, ctx, registry)
            }
            Field::Array {
                name, element_type, ..
            } => {
                let elem = self.native_type(element_type, false)?;
                let write = self.write_value(name, element_type, "element", ctx, registry)?;
                Ok(format!(
                    "    for ({} element : _value.{}) {{\n    {}    }}\n",
                    elem,
                    getter(name),
                    write
                ))
            }
            Field::Const {
                name,
                type_ref,
                expected,
            } => {
                let write = self.write_call(name, type_ref, &render_literal(expected), ctx)?;
                Ok(format!("    {};\n", write))
            }
            Field::Reserved { type_ref, expected } => {
                let write =
                    self.write_call("reserved", type_ref, &render_literal(expected), ctx)?;
                Ok(format!("    {};\n", write))
            }
            Field::Optional { name, type_ref, .. } => {
                let value = format!("_value.{}", getter(name));
                let write = self.write_value(name, type_ref, &value, ctx, registry)?;
                Ok(format!(
                    "    if (_value.{} != null) {{\n    {}    }}\n",
                    getter(name),
                    write
                ))
            }
            Field::Discriminator { name, type_ref } => {
                let value = format!("_value.{}", getter(name));
                let write = self.write_call(name, type_ref, &value, ctx)?;
                Ok(format!("    {};\n", write))
            }
            Field::Virtual { .. } => Ok(String::new()),
            Field::Implicit {
                name,
                type_ref,
                serialize_expr,
            } => {
                let native = self.simple_native(type_ref, true)?;
                let expr = self.render_term(serialize_expr, dir, ctx)?;
                let write = self.write_call(name, type_ref, &format!("({}) ({})", native, expr), ctx)?;
                Ok(format!("    {};\n", write))
            }
            Field::Manual {
                name,
                serialize_expr,
                ..
            } => {
                let _ = name;
                let expr = self.render_term(serialize_expr, dir, ctx)?;
                Ok(format!("    {};\n", expr))
            }
        }
    }

    fn write_value(
        &self,
        name: &str,
        type_ref: &TypeReference,
        value: &str,
        ctx: &ExprCtx,
        registry: &TypeRegistry,
    ) -> Result<String, Error> {
        match type_ref {
            TypeReference::Simple(simple) => {
                let field_ctx = ExprCtx {
                    registry: ctx.registry,
                    owner: ctx.owner,
                    field_type: Some(simple),
                };
                let call = self.write_call(name, simple, value, &field_ctx)?;
                Ok(format!("    {};\n", call))
            }
            TypeReference::Complex { .. } => {
                Ok(format!("    {}.serialize(writeBuffer);\n", value))
            }
            TypeReference::Enum { name: type_name, .. } => {
                let backing = registry
                    .get_enum(type_name)
                    .map(|e| e.backing_type.clone())
                    .ok_or_else(|| {
                        Error::Emission(format!("unresolved enum type: {}", type_name))
                    })?;
                let call =
                    self.write_call(name, &backing, &format!("{}.getValue()", value), ctx)?;
                Ok(format!("    {};\n", call))
            }
        }
    }

    fn discriminator_equals(disc: &str, value: &Literal) -> String {
        match value {
            Literal::Str(s) => format!("\"{}\".equals({})", s, disc),
            other => format!("{} == {}", disc, render_literal(other)),
        }
    }

    fn emit_complex(
        &self,
        complex: &ComplexType,
        registry: &TypeRegistry,
    ) -> Result<String, Error> {
        let ctx = ExprCtx {
            registry,
            owner: complex,
            field_type: None,
        };
        let members = self.members(complex)?;
        let chain = self.chain_members(complex, registry)?;
        let parent = complex
            .parent_type
            .as_deref()
            .and_then(|p| registry.get_complex(p));

        let mut out = String::new();
        let modifier = if complex.is_discriminated_root() {
            "public abstract class"
        } else {
            "public class"
        };
        let extends = match &complex.parent_type {
            Some(p) => format!(" extends {}", p),
            None => String::new(),
        };
        out.push_str(&format!("{} {}{} {{\n", modifier, complex.name, extends));

        // Constants and members.
        for field in &complex.fields {
            if let Field::Const {
                name,
                type_ref,
                expected,
            } = field
            {
                out.push_str(&format!(
                    "    public static final {} {} = {};\n",
                    self.simple_native(type_ref, true)?,
                    name.to_uppercase(),
                    render_literal(expected)
                ));
            }
        }
        for (name, ty) in &members {
            out.push_str(&format!("    private final {} {};\n", ty, name));
        }
        out.push('\n');

        // Constructor takes the full chain, passes the inherited slice up.
        let params: Vec<String> = chain
            .iter()
            .map(|(name, ty)| format!("{} {}", ty, name))
            .collect();
        out.push_str(&format!(
            "    public {}({}) {{\n",
            complex.name,
            params.join(", ")
        ));
        if parent.is_some() {
            let inherited = chain.len() - members.len();
            let super_args: Vec<&str> = chain[..inherited]
                .iter()
                .map(|(name, _)| name.as_str())
                .collect();
            out.push_str(&format!("        super({});\n", super_args.join(", ")));
        }
        for (name, _) in &members {
            out.push_str(&format!("        this.{} = {};\n", name, name));
        }
        out.push_str("    }\n\n");

        for (name, ty) in &members {
            out.push_str(&format!(
                "    public {} {} {{\n        return {};\n    }}\n\n",
                ty,
                getter(name),
                name
            ));
        }

        out.push_str(&self.emit_static_parse(complex, registry, &ctx)?);
        out.push_str(&self.emit_static_serialize(complex, registry, &ctx)?);
        out.push_str("}\n");
        Ok(out)
    }

    fn parse_params(&self, complex: &ComplexType) -> Result<Vec<String>, Error> {
        let mut params = vec!["ReadBuffer readBuffer".to_string()];
        for arg in &complex.parser_args {
            params.push(format!(
                "{} {}",
                self.native_type(&arg.type_ref, false)?,
                arg.name
            ));
        }
        Ok(params)
    }

    fn emit_static_parse(
        &self,
        complex: &ComplexType,
        registry: &TypeRegistry,
        ctx: &ExprCtx,
    ) -> Result<String, Error> {
        let mut params = self.parse_params(complex)?;
        let inherited: Vec<(String, String)> = match complex.parent_type.as_deref() {
            Some(p) => {
                let parent = registry.get_complex(p).ok_or_else(|| {
                    Error::Emission(format!("unresolved parent type: {}", p))
                })?;
                self.chain_members(parent, registry)?
            }
            None => Vec::new(),
        };
        for (name, ty) in &inherited {
            params.push(format!("{} {}", ty, name));
        }
        // Case types receive the message-start marker from the dispatcher so
        // curPos keeps counting from the start of the whole message.
        if complex.parent_type.is_some() {
            params.push("int startPos".to_string());
        }

        let return_type = complex.name.clone();
        let mut out = format!(
            "    public static {} staticParse({}) throws ParseException {{\n",
            return_type,
            params.join(", ")
        );
        if complex.parent_type.is_none() {
            out.push_str("        int startPos = readBuffer.getPos();\n");
        }

        let mut body = String::new();
        for field in &complex.fields {
            body.push_str(&self.parse_statement(field, ctx, registry)?);
        }
        // Reindent field statements into the method body.
        for line in body.lines() {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }

        if let Some(switch) = &complex.switch {
            for case in &switch.cases {
                let child = registry.get_complex(case).ok_or_else(|| {
                    Error::Emission(format!("unresolved case type: {}", case))
                })?;
                let value = child.discriminator_value.as_ref().ok_or_else(|| {
                    Error::Emission(format!("{}: case without discriminator value", case))
                })?;
                let mut args = vec!["readBuffer".to_string()];
                for arg in &child.parser_args {
                    args.push(arg.name.clone());
                }
                for (name, _) in self.chain_members(complex, registry)? {
                    args.push(name);
                }
                args.push("startPos".to_string());
                out.push_str(&format!(
                    "        if ({}) {{\n            return {}.staticParse({});\n        }}\n",
                    Self::discriminator_equals(&switch.discriminator, value),
                    case,
                    args.join(", ")
                ));
            }
            out.push_str(&format!(
                "        throw new ParseException(\"{}: no case matches \" + {});\n",
                complex.name, switch.discriminator
            ));
        } else {
            let mut ctor_args: Vec<String> =
                inherited.iter().map(|(name, _)| name.clone()).collect();
            for (name, _) in self.members(complex)? {
                ctor_args.push(name);
            }
            out.push_str(&format!(
                "        return new {}({});\n",
                complex.name,
                ctor_args.join(", ")
            ));
        }
        out.push_str("    }\n\n");
        Ok(out)
    }

    fn emit_static_serialize(
        &self,
        complex: &ComplexType,
        registry: &TypeRegistry,
        ctx: &ExprCtx,
    ) -> Result<String, Error> {
        let mut out = format!(
            "    public static void staticSerialize(WriteBuffer writeBuffer, {} _value) throws SerializationException {{\n",
            complex.name
        );
        out.push_str("        int startPos = writeBuffer.getPos();\n");
        if let Some(p) = &complex.parent_type {
            out.push_str(&format!(
                "        {}.staticSerialize(writeBuffer, _value);\n",
                p
            ));
        }
        let mut body = String::new();
        for field in &complex.fields {
            body.push_str(&self.serialize_statement(field, ctx, registry)?);
        }
        for line in body.lines() {
            if line.is_empty() {
                continue;
            }
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("    }\n");

        if !complex.is_discriminated_root() {
            out.push_str(
                "\n    public void serialize(WriteBuffer writeBuffer) throws SerializationException {\n",
            );
            out.push_str(&format!(
                "        {}.staticSerialize(writeBuffer, this);\n    }}\n",
                complex.name
            ));
        }
        Ok(out)
    }
}

impl Target for JavaTarget {
    fn native_type(
        &self,
        type_ref: &TypeReference,
        allow_primitive: bool,
    ) -> Result<String, Error> {
        match type_ref {
            TypeReference::Simple(simple) => self.simple_native(simple, allow_primitive),
            TypeReference::Complex { name, .. } | TypeReference::Enum { name, .. } => {
                Ok(name.clone())
            }
        }
    }

    fn default_value(&self, type_ref: &TypeReference) -> Result<String, Error> {
        let native = self.native_type(type_ref, true)?;
        Ok(match native.as_str() {
            "boolean" => "false".to_string(),
            "byte" | "short" | "int" => "0".to_string(),
            "long" => "0L".to_string(),
            "float" => "0.0f".to_string(),
            "double" => "0.0".to_string(),
            _ => "null".to_string(),
        })
    }

    fn read_call(
        &self,
        field_name: &str,
        simple: &SimpleTypeReference,
        ctx: &ExprCtx,
    ) -> Result<String, Error> {
        let bits = simple.size_bits;
        Ok(match simple.base {
            SimpleBaseType::Bit => format!("readBuffer.readBit(\"{}\")", field_name),
            SimpleBaseType::Byte => format!("readBuffer.readByte(\"{}\")", field_name),
            SimpleBaseType::Uint => {
                let method = match bits {
                    1..=4 => "readUnsignedByte",
                    5..=8 => "readUnsignedShort",
                    9..=16 => "readUnsignedInt",
                    17..=32 => "readUnsignedLong",
                    _ => "readUnsignedBigInteger",
                };
                format!("readBuffer.{}(\"{}\", {})", method, field_name, bits)
            }
            SimpleBaseType::Int => {
                let method = match bits {
                    1..=8 => "readSignedByte",
                    9..=16 => "readShort",
                    17..=32 => "readInt",
                    33..=64 => "readLong",
                    _ => "readBigInteger",
                };
                format!("readBuffer.{}(\"{}\", {})", method, field_name, bits)
            }
            SimpleBaseType::Float => {
                let method = match bits {
                    1..=32 => "readFloat",
                    33..=64 => "readDouble",
                    _ => "readBigDecimal",
                };
                format!("readBuffer.{}(\"{}\", {})", method, field_name, bits)
            }
            SimpleBaseType::Ufloat => {
                return Err(Error::Emission(format!(
                    "{}: no Java read call for ufloat",
                    field_name
                )))
            }
            SimpleBaseType::String => format!(
                "readBuffer.readString(\"{}\", {}, \"{}\")",
                field_name, bits, simple.encoding
            ),
            SimpleBaseType::Vstring => {
                let expr = simple.length_expr.as_deref().ok_or_else(|| {
                    Error::Emission(format!("{}: vstring without length", field_name))
                })?;
                let length = self.render_term(expr, Direction::Parse, ctx)?;
                format!(
                    "readBuffer.readString(\"{}\", (int) ({}), \"{}\")",
                    field_name, length, simple.encoding
                )
            }
            SimpleBaseType::Time => format!("readBuffer.readTime(\"{}\")", field_name),
            SimpleBaseType::Date => format!("readBuffer.readDate(\"{}\")", field_name),
            SimpleBaseType::DateTime => {
                format!("readBuffer.readDateTime(\"{}\")", field_name)
            }
        })
    }

    fn write_call(
        &self,
        field_name: &str,
        simple: &SimpleTypeReference,
        value: &str,
        ctx: &ExprCtx,
    ) -> Result<String, Error> {
        let bits = simple.size_bits;
        Ok(match simple.base {
            SimpleBaseType::Bit => {
                format!("writeBuffer.writeBit(\"{}\", {})", field_name, value)
            }
            SimpleBaseType::Byte => {
                format!("writeBuffer.writeByte(\"{}\", {})", field_name, value)
            }
            SimpleBaseType::Uint => {
                let method = match bits {
                    1..=4 => "writeUnsignedByte",
                    5..=8 => "writeUnsignedShort",
                    9..=16 => "writeUnsignedInt",
                    17..=32 => "writeUnsignedLong",
                    _ => "writeUnsignedBigInteger",
                };
                format!(
                    "writeBuffer.{}(\"{}\", {}, {})",
                    method, field_name, bits, value
                )
            }
            SimpleBaseType::Int => {
                let method = match bits {
                    1..=8 => "writeSignedByte",
                    9..=16 => "writeShort",
                    17..=32 => "writeInt",
                    33..=64 => "writeLong",
                    _ => "writeBigInteger",
                };
                format!(
                    "writeBuffer.{}(\"{}\", {}, {})",
                    method, field_name, bits, value
                )
            }
            SimpleBaseType::Float => {
                let method = match bits {
                    1..=32 => "writeFloat",
                    33..=64 => "writeDouble",
                    _ => "writeBigDecimal",
                };
                format!(
                    "writeBuffer.{}(\"{}\", {}, {})",
                    method, field_name, bits, value
                )
            }
            SimpleBaseType::Ufloat => {
                return Err(Error::Emission(format!(
                    "{}: no Java write call for ufloat",
                    field_name
                )))
            }
            SimpleBaseType::String => format!(
                "writeBuffer.writeString(\"{}\", {}, \"{}\", {})",
                field_name, bits, simple.encoding, value
            ),
            SimpleBaseType::Vstring => {
                let expr = simple.length_expr.as_deref().ok_or_else(|| {
                    Error::Emission(format!("{}: vstring without length", field_name))
                })?;
                let length = self.render_term(expr, Direction::Serialize, ctx)?;
                format!(
                    "writeBuffer.writeString(\"{}\", (int) ({}), \"{}\", {})",
                    field_name, length, simple.encoding, value
                )
            }
            SimpleBaseType::Time => {
                format!("writeBuffer.writeTime(\"{}\", {})", field_name, value)
            }
            SimpleBaseType::Date => {
                format!("writeBuffer.writeDate(\"{}\", {})", field_name, value)
            }
            SimpleBaseType::DateTime => {
                format!("writeBuffer.writeDateTime(\"{}\", {})", field_name, value)
            }
        })
    }

    fn render_expression(
        &self,
        term: &Term,
        direction: Direction,
        ctx: &ExprCtx,
    ) -> Result<String, Error> {
        self.render_term(term, direction, ctx)
    }

    fn emit_type(&self, def: &TypeDefinition, registry: &TypeRegistry) -> Result<String, Error> {
        match def {
            TypeDefinition::Enum(e) => self.emit_enum(e),
            TypeDefinition::Complex(c) => self.emit_complex(c, registry),
        }
    }
}
