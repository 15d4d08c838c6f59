//! Spec-language tests: syntax (parse success/failure), expression shapes,
//! and resolution semantics.

use binspec::ast::{Field, LoopKind, SimpleBaseType, TypeReference};
use binspec::term::{BinaryOp, Literal, Term};
use binspec::{compile, parse, resolve, Error};

// ==================== Syntax: valid specs ====================

#[test]
fn parse_empty_unit() {
    let ctx = parse("").expect("empty unit can parse");
    assert!(ctx.types.is_empty());
    assert!(ctx.unresolved_refs.is_empty());
}

#[test]
fn parse_minimal_type() {
    let ctx = parse("[type Point [simple int 16 x] [simple int 16 y]]").expect("parse");
    let def = ctx.types.get("Point").expect("Point defined");
    let complex = def.as_complex().expect("complex");
    assert_eq!(complex.fields.len(), 2);
    assert_eq!(complex.fields[0].name(), Some("x"));
}

#[test]
fn parse_all_base_types() {
    let src = r#"
[type AllBase
    [simple bit      a]
    [simple byte     b]
    [simple uint 3   c]
    [simple int 64   d]
    [simple float 32 e]
    [simple string 16 f]
    [simple vstring 'c * 8' g]
    [simple time     h]
    [simple date     i]
    [simple dateTime j]]
"#;
    let ctx = parse(src).expect("parse");
    let complex = ctx.types["AllBase"].as_complex().expect("complex");
    assert_eq!(complex.fields.len(), 10);
    let simple = complex.fields[2].value_type().expect("typed");
    let simple = simple.as_simple().cloned().expect("simple");
    assert_eq!(simple.base, SimpleBaseType::Uint);
    assert_eq!(simple.size_bits, 3);
}

#[test]
fn parse_with_comments() {
    let src = r#"
// line comment
[type WithComments
    [simple uint 8 id] /* block */
    [simple uint 16 len]]
"#;
    let ctx = parse(src).expect("parse");
    assert_eq!(
        ctx.types["WithComments"].as_complex().expect("complex").fields.len(),
        2
    );
}

#[test]
fn parse_string_encoding_attribute() {
    let ctx = parse(r#"[type S [simple string 64 encoding="ASCII" tag]]"#).expect("parse");
    let complex = ctx.types["S"].as_complex().expect("complex");
    let tag = complex.field_type("tag").expect("tag");
    let simple = tag.as_simple().expect("simple");
    assert_eq!(simple.encoding, "ASCII");
    assert_eq!(simple.size_bits, 64);
}

#[test]
fn parse_all_field_kinds() {
    let src = r#"
[type Everything (uint 8 someArg)
    [const         uint 8  magicByte 0x42]
    [reserved      uint 4  0x0]
    [implicit      uint 8  count 'COUNT(items)']
    [array         uint 16 items count 'count']
    [optional      uint 8  extra 'someArg > 0']
    [virtual       uint 32 total 'count * 2']
    [manual        uint 16 crc 'STATIC_CALL("crc16", readBuffer)'
                           'STATIC_CALL("crc16", writeBuffer)' '16']]
"#;
    let ctx = parse(src).expect("parse");
    let complex = ctx.types["Everything"].as_complex().expect("complex");
    assert_eq!(complex.parser_args.len(), 1);
    assert_eq!(complex.parser_args[0].name, "someArg");
    assert!(matches!(
        complex.field("items"),
        Some(Field::Array {
            loop_kind: LoopKind::Count,
            ..
        })
    ));
    assert!(matches!(complex.field("total"), Some(Field::Virtual { .. })));
    assert!(matches!(complex.field("crc"), Some(Field::Manual { .. })));
    assert!(complex
        .fields
        .iter()
        .any(|f| matches!(f, Field::Reserved { expected: Literal::Int(0), .. })));
}

#[test]
fn parse_type_switch_creates_child_types() {
    let src = r#"
[type Frame
    [discriminator uint 8 messageType]
    [typeSwitch messageType
        ['1' FrameA
            [simple int 16 payload]]
        ['2' FrameB
            [simple uint 16 payload]]]]
"#;
    let ctx = parse(src).expect("parse");
    assert_eq!(ctx.types.len(), 3);
    let root = ctx.types["Frame"].as_complex().expect("complex");
    let switch = root.switch.as_ref().expect("switch");
    assert_eq!(switch.discriminator, "messageType");
    assert_eq!(switch.cases, vec!["FrameA", "FrameB"]);

    let a = ctx.types["FrameA"].as_complex().expect("complex");
    assert_eq!(a.parent_type.as_deref(), Some("Frame"));
    assert_eq!(a.discriminator_value, Some(Literal::Int(1)));
}

#[test]
fn switch_cases_inherit_parent_parser_args() {
    let src = r#"
[type Frame (uint 16 totalLength)
    [discriminator uint 8 messageType]
    [typeSwitch messageType
        ['1' FrameA
            [simple int 16 payload]]]]
"#;
    let ctx = parse(src).expect("parse");
    let a = ctx.types["FrameA"].as_complex().expect("complex");
    assert_eq!(a.parser_args.len(), 1);
    assert_eq!(a.parser_args[0].name, "totalLength");
}

#[test]
fn enum_values_count_up_when_omitted() {
    let ctx = parse("[enum uint 8 Color [RED] [GREEN] ['7' BLUE] [VIOLET]]").expect("parse");
    let def = ctx.types["Color"].as_enum().expect("enum");
    assert_eq!(
        def.members,
        vec![
            ("RED".to_string(), Literal::Int(0)),
            ("GREEN".to_string(), Literal::Int(1)),
            ("BLUE".to_string(), Literal::Int(7)),
            ("VIOLET".to_string(), Literal::Int(8)),
        ]
    );
}

#[test]
fn enum_backing_type_defaults_to_uint_32() {
    let ctx = parse("[enum Flavor [PLAIN]]").expect("parse");
    let def = ctx.types["Flavor"].as_enum().expect("enum");
    assert_eq!(def.backing_type.base, SimpleBaseType::Uint);
    assert_eq!(def.backing_type.size_bits, 32);
}

#[test]
fn unresolved_refs_are_recorded() {
    let ctx = parse("[type Packet [simple Header header] [simple uint 8 kind]]").expect("parse");
    assert_eq!(ctx.unresolved_refs, vec!["Header"]);
}

// ==================== Expressions ====================

fn expr_of(src: &str) -> Term {
    let unit = format!("[type T [simple uint 8 a] [virtual uint 32 v '{}']]", src);
    let ctx = parse(&unit).expect("parse");
    match ctx.types["T"].as_complex().expect("complex").field("v") {
        Some(Field::Virtual { value_expr, .. }) => value_expr.clone(),
        other => panic!("expected virtual field, found {:?}", other),
    }
}

#[test]
fn precedence_mul_binds_tighter_than_add() {
    let term = expr_of("1 + 2 * 3");
    match term {
        Term::Binary { op: BinaryOp::Add, a, b } => {
            assert_eq!(*a, Term::Literal(Literal::Int(1)));
            assert!(matches!(*b, Term::Binary { op: BinaryOp::Mul, .. }));
        }
        other => panic!("unexpected shape: {:?}", other),
    }
}

#[test]
fn caret_parses_as_exponentiation_and_associates_right() {
    let term = expr_of("2 ^ 3 ^ 2");
    match term {
        Term::Binary { op: BinaryOp::Pow, a, b } => {
            assert_eq!(*a, Term::Literal(Literal::Int(2)));
            assert!(matches!(*b, Term::Binary { op: BinaryOp::Pow, .. }));
        }
        other => panic!("unexpected shape: {:?}", other),
    }
}

#[test]
fn ternary_and_dotted_indexed_paths() {
    let term = expr_of("if a > 0 then items[2].kind else 0");
    match term {
        Term::Ternary { then, .. } => {
            let variable = then.as_variable().expect("variable").clone();
            assert_eq!(variable.name, "items");
            assert_eq!(variable.index, Some(2));
            assert_eq!(variable.child.expect("child").name, "kind");
        }
        other => panic!("unexpected shape: {:?}", other),
    }
}

#[test]
fn cast_requires_exactly_two_arguments() {
    let unit = "[type T [simple uint 8 a] [virtual uint 32 v 'CAST(a)']]";
    match parse(unit) {
        Err(Error::Expression(msg)) => assert!(msg.contains("CAST")),
        other => panic!("expected expression error, got {:?}", other),
    }
}

#[test]
fn static_call_requires_string_literal_name() {
    let unit = "[type T [simple uint 8 a] [virtual uint 32 v 'STATIC_CALL(a, 1)']]";
    match parse(unit) {
        Err(Error::Expression(msg)) => assert!(msg.contains("STATIC_CALL")),
        other => panic!("expected expression error, got {:?}", other),
    }
}

#[test]
fn static_call_requires_a_function_name() {
    let unit = "[type T [simple uint 8 a] [virtual uint 32 v 'STATIC_CALL()']]";
    match parse(unit) {
        Err(Error::Expression(msg)) => assert!(msg.contains("STATIC_CALL")),
        other => panic!("expected expression error, got {:?}", other),
    }
}

#[test]
fn switch_case_parameters_are_rejected() {
    let src = r#"
[type Frame
    [discriminator uint 8 messageType]
    [typeSwitch messageType
        ['1' FrameA (uint 8 extra)
            [simple uint 8 payload]]]]
"#;
    match parse(src) {
        Err(Error::Syntax(msg)) => assert!(msg.contains("FrameA")),
        other => panic!("expected syntax error, got {:?}", other),
    }
}

#[test]
fn malformed_block_is_a_syntax_error() {
    assert!(matches!(parse("[type"), Err(Error::Syntax(_))));
    assert!(matches!(parse("[type T [bogus uint 8 x]]"), Err(Error::Syntax(_))));
}

// ==================== Resolution ====================

#[test]
fn resolve_binds_cross_unit_references() {
    let header = "[type Header [simple uint 16 length]]";
    let packet = "[type Packet [simple Header header] [virtual uint 16 len 'header.length']]";
    let registry = compile(&[packet, header]).expect("compile");
    assert!(registry.get_complex("Packet").is_some());

    let complex = registry.get_complex("Packet").expect("Packet");
    match complex.field("len") {
        Some(Field::Virtual { value_expr, .. }) => {
            let variable = value_expr.as_variable().expect("variable");
            assert!(matches!(
                variable.type_ref,
                Some(TypeReference::Complex { ref name, .. }) if name == "Header"
            ));
            let child = variable.child.as_ref().expect("child");
            assert!(child.type_ref.is_some());
        }
        other => panic!("expected virtual field, found {:?}", other),
    }
}

#[test]
fn resolve_reclassifies_enum_references() {
    let registry = compile(&[
        "[enum uint 8 Color ['1' RED]]",
        "[type Pixel [simple Color color]]",
    ])
    .expect("compile");
    let pixel = registry.get_complex("Pixel").expect("Pixel");
    assert!(matches!(
        pixel.field_type("color"),
        Some(TypeReference::Enum { ref name, .. }) if name == "Color"
    ));
}

#[test]
fn dangling_reference_fails() {
    match compile(&["[type Packet [simple Header header]]"]) {
        Err(Error::Resolution(msg)) => assert!(msg.contains("Header")),
        other => panic!("expected resolution error, got {:?}", other),
    }
}

#[test]
fn duplicate_type_names_across_units_fail() {
    let result = compile(&["[type A [simple uint 8 x]]", "[type A [simple uint 8 y]]"]);
    assert!(matches!(result, Err(Error::Resolution(_))));
}

#[test]
fn duplicate_discriminator_values_fail() {
    let src = r#"
[type Frame
    [discriminator uint 8 kind]
    [typeSwitch kind
        ['1' A [simple uint 8 x]]
        ['1' B [simple uint 8 y]]]]
"#;
    assert!(matches!(compile(&[src]), Err(Error::Resolution(_))));
}

#[test]
fn virtual_cycle_fails() {
    let src = r#"
[type T
    [simple uint 8 a]
    [virtual uint 8 x 'y + 1']
    [virtual uint 8 y 'x + 1']]
"#;
    match compile(&[src]) {
        Err(Error::Resolution(msg)) => assert!(msg.contains("cycle")),
        other => panic!("expected resolution error, got {:?}", other),
    }
}

#[test]
fn virtual_chain_without_cycle_resolves() {
    let src = r#"
[type T
    [simple uint 8 a]
    [virtual uint 8 x 'a + 1']
    [virtual uint 8 y 'x + 1']]
"#;
    compile(&[src]).expect("compile");
}

#[test]
fn unknown_expression_name_fails() {
    let src = "[type T [simple uint 8 a] [virtual uint 8 v 'nope + 1']]";
    match compile(&[src]) {
        Err(Error::Resolution(msg)) => assert!(msg.contains("nope")),
        other => panic!("expected resolution error, got {:?}", other),
    }
}

#[test]
fn resolution_is_order_independent_and_idempotent() {
    let a = "[type Packet [simple Header header]]";
    let b = "[type Header [simple uint 16 length]]";
    let first = compile(&[a, b]).expect("compile");
    let second = compile(&[b, a]).expect("compile");
    assert_eq!(first.types, second.types);

    let again = resolve(vec![parse(a).expect("parse"), parse(b).expect("parse")])
        .expect("resolve");
    assert_eq!(first.types, again.types);
}

#[test]
fn static_wire_bits_counts_implicit_not_virtual() {
    let src = r#"
[type T
    [const    uint 8  magic 0x42]
    [implicit uint 16 len '2']
    [virtual  uint 32 doubled 'len * 2']
    [simple   int 16  payload]]
"#;
    let registry = compile(&[src]).expect("compile");
    assert_eq!(registry.static_wire_bits("T"), Some(40));
}

#[test]
fn static_wire_bits_dynamic_is_none() {
    let src = r#"
[type T
    [implicit uint 8 count 'COUNT(items)']
    [array uint 8 items count 'count']]
"#;
    let registry = compile(&[src]).expect("compile");
    assert_eq!(registry.static_wire_bits("T"), None);
}

#[test]
fn switch_discriminator_must_exist() {
    let src = r#"
[type Frame
    [simple uint 8 kind]
    [typeSwitch missing
        ['1' A [simple uint 8 x]]]]
"#;
    assert!(matches!(compile(&[src]), Err(Error::Resolution(_))));
}
