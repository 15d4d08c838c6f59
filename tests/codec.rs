//! Interpreter round trips: discriminated dispatch, enum mapping, computed
//! lengths, arrays and optionals, all without emitting any code.

use std::collections::HashMap;

use binspec::codec::CodecError;
use binspec::value::Value;
use binspec::{compile, ByteOrder, Codec};

fn fields(value: &Value) -> &HashMap<String, Value> {
    value.as_struct().expect("struct value")
}

// ==================== Discriminated dispatch ====================

const FRAME: &str = r#"
[type Frame
    [discriminator uint 8 messageType]
    [typeSwitch messageType
        ['1' FrameA
            [simple int 16 payload]]
        ['2' FrameB
            [simple int 16 payload]]]]
"#;

#[test]
fn dispatch_selects_case_by_discriminator() {
    let registry = compile(&[FRAME]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);

    let a = codec.parse("Frame", &[0x01, 0x00, 0x2A]).expect("parse");
    match &a {
        Value::Struct { type_name, .. } => assert_eq!(type_name, "FrameA"),
        other => panic!("expected struct, got {:?}", other),
    }
    assert_eq!(fields(&a).get("payload"), Some(&Value::I16(42)));

    let b = codec.parse("Frame", &[0x02, 0xFF, 0xFF]).expect("parse");
    match &b {
        Value::Struct { type_name, .. } => assert_eq!(type_name, "FrameB"),
        other => panic!("expected struct, got {:?}", other),
    }
    assert_eq!(fields(&b).get("payload"), Some(&Value::I16(-1)));
}

#[test]
fn dispatch_round_trips_through_serialize() {
    let registry = compile(&[FRAME]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);

    for bytes in [&[0x01u8, 0x00, 0x2A][..], &[0x02, 0xFF, 0xFF][..]] {
        let value = codec.parse("Frame", bytes).expect("parse");
        let encoded = codec.serialize(&value).expect("serialize");
        assert_eq!(encoded, bytes);
    }
}

#[test]
fn unmatched_discriminator_is_an_error() {
    let registry = compile(&[FRAME]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);
    assert!(matches!(
        codec.parse("Frame", &[0x09, 0x00, 0x00]),
        Err(CodecError::NoMatchingCase { .. })
    ));
}

// ==================== Enums ====================

const PIXEL: &str = r#"
[enum uint 8 Color
    ['1' RED]
    ['2' GREEN]]
[type Pixel
    [simple Color color]]
"#;

#[test]
fn enum_value_maps_to_member_and_back() {
    let registry = compile(&[PIXEL]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);

    let pixel = codec.parse("Pixel", &[0x02]).expect("parse");
    assert_eq!(
        fields(&pixel).get("color"),
        Some(&Value::Enum {
            type_name: "Color".to_string(),
            member: "GREEN".to_string(),
        })
    );
    assert_eq!(codec.serialize(&pixel).expect("serialize"), vec![0x02]);
}

#[test]
fn unknown_enum_value_is_an_error() {
    let registry = compile(&[PIXEL]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);
    assert!(codec.parse("Pixel", &[0x09]).is_err());
}

// ==================== Strings and computed lengths ====================

#[test]
fn vstring_length_comes_from_prior_field() {
    let src = r#"
[type Name
    [simple uint 8 nameLen]
    [simple vstring 'nameLen * 8' name]]
"#;
    let registry = compile(&[src]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);

    let bytes = [&[5u8][..], b"hello"].concat();
    let value = codec.parse("Name", &bytes).expect("parse");
    assert_eq!(
        fields(&value).get("name"),
        Some(&Value::Str("hello".to_string()))
    );
    assert_eq!(codec.serialize(&value).expect("serialize"), bytes);
}

#[test]
fn const_mismatch_fails_reserved_does_not() {
    let src = r#"
[type Framed
    [const    uint 8 magicByte 0x42]
    [reserved uint 8 0x00]
    [simple   uint 8 payload]]
"#;
    let registry = compile(&[src]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);

    let ok = codec.parse("Framed", &[0x42, 0x00, 0x07]).expect("parse");
    assert_eq!(fields(&ok).get("payload"), Some(&Value::U8(7)));

    // Wrong reserved contents only warn.
    let sloppy = codec.parse("Framed", &[0x42, 0xFF, 0x07]).expect("parse");
    assert_eq!(fields(&sloppy).get("payload"), Some(&Value::U8(7)));
    // Serialization restores the expected reserved value.
    assert_eq!(
        codec.serialize(&sloppy).expect("serialize"),
        vec![0x42, 0x00, 0x07]
    );

    assert!(matches!(
        codec.parse("Framed", &[0x41, 0x00, 0x07]),
        Err(CodecError::ConstMismatch { .. })
    ));
}

// ==================== Arrays, implicit and virtual fields ====================

#[test]
fn count_array_with_implicit_count_round_trips() {
    let src = r#"
[type Bag
    [implicit uint 8  count 'COUNT(items)']
    [array    uint 16 items count 'count']
    [virtual  uint 8  doubled 'count * 2']]
"#;
    let registry = compile(&[src]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);

    let bytes = [0x02, 0x00, 0x0A, 0x00, 0x14];
    let value = codec.parse("Bag", &bytes).expect("parse");
    let members = fields(&value);
    assert_eq!(
        members.get("items"),
        Some(&Value::List(vec![Value::U16(10), Value::U16(20)]))
    );
    // Implicit stays a local; virtual becomes a member.
    assert!(members.get("count").is_none());
    assert_eq!(members.get("doubled"), Some(&Value::I64(4)));

    // The count is recomputed from the list on the way out.
    assert_eq!(codec.serialize(&value).expect("serialize"), bytes);
}

#[test]
fn computed_lengths_accept_expression_results() {
    // Arithmetic results are signed; sizing positions still take them.
    let src = r#"
[type Chunk
    [simple uint 8 len]
    [array  uint 8 body length 'len - 1']]
"#;
    let registry = compile(&[src]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);

    let value = codec.parse("Chunk", &[0x03, 0xAA, 0xBB]).expect("parse");
    assert_eq!(
        fields(&value).get("body"),
        Some(&Value::List(vec![Value::U8(0xAA), Value::U8(0xBB)]))
    );
}

#[test]
fn length_array_consumes_exactly_its_region() {
    let src = r#"
[type Chunked
    [simple uint 8 len]
    [array  uint 8 body length 'len']
    [simple uint 8 trailer]]
"#;
    let registry = compile(&[src]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);

    let value = codec
        .parse("Chunked", &[0x03, 0xAA, 0xBB, 0xCC, 0x99])
        .expect("parse");
    let members = fields(&value);
    assert_eq!(
        members.get("body"),
        Some(&Value::List(vec![
            Value::U8(0xAA),
            Value::U8(0xBB),
            Value::U8(0xCC)
        ]))
    );
    assert_eq!(members.get("trailer"), Some(&Value::U8(0x99)));
}

#[test]
fn optional_field_follows_its_condition() {
    let src = r#"
[type Maybe
    [simple   uint 8 flags]
    [optional uint 16 extra 'flags == 1']]
"#;
    let registry = compile(&[src]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);

    let with = codec.parse("Maybe", &[0x01, 0x12, 0x34]).expect("parse");
    assert_eq!(fields(&with).get("extra"), Some(&Value::U16(0x1234)));
    assert_eq!(
        codec.serialize(&with).expect("serialize"),
        vec![0x01, 0x12, 0x34]
    );

    let without = codec.parse("Maybe", &[0x00]).expect("parse");
    assert!(fields(&without).get("extra").is_none());
    assert_eq!(codec.serialize(&without).expect("serialize"), vec![0x00]);
}

// ==================== Nested types and parser arguments ====================

#[test]
fn ctor_args_thread_into_nested_parse() {
    let src = r#"
[type Body (uint 8 size)
    [array uint 8 data count 'size']]
[type Packet
    [simple uint 8 bodySize]
    [simple Body ('bodySize') body]]
"#;
    let registry = compile(&[src]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);

    let value = codec.parse("Packet", &[0x02, 0xDE, 0xAD]).expect("parse");
    let body = fields(&value).get("body").expect("body");
    assert_eq!(
        fields(body).get("data"),
        Some(&Value::List(vec![Value::U8(0xDE), Value::U8(0xAD)]))
    );
}

#[test]
fn cur_pos_tracks_bits_within_the_type() {
    let src = r#"
[type Sized
    [simple  uint 16 header]
    [virtual uint 32 offset 'curPos']]
"#;
    let registry = compile(&[src]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);

    let value = codec.parse("Sized", &[0x00, 0x01]).expect("parse");
    assert_eq!(fields(&value).get("offset"), Some(&Value::U32(16)));
}

// ==================== Helpers and unsupported paths ====================

#[test]
fn static_call_uses_registered_helper() {
    let src = r#"
[type Checked
    [simple  uint 8 a]
    [virtual uint 8 twice 'STATIC_CALL("double", a)']]
"#;
    let registry = compile(&[src]).expect("compile");
    let mut codec = Codec::new(&registry, ByteOrder::BigEndian);
    codec.register_helper(
        "double",
        Box::new(|args| {
            let a = args[0].as_i64().expect("numeric argument");
            Ok(Value::I64(a * 2))
        }),
    );

    let value = codec.parse("Checked", &[0x15]).expect("parse");
    assert_eq!(fields(&value).get("twice"), Some(&Value::I64(42)));
}

#[test]
fn static_call_without_helper_is_unsupported() {
    let src = r#"
[type Checked
    [simple  uint 8 a]
    [virtual uint 8 twice 'STATIC_CALL("double", a)']]
"#;
    let registry = compile(&[src]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);
    assert!(matches!(
        codec.parse("Checked", &[0x15]),
        Err(CodecError::Unsupported(_))
    ));
}

#[test]
fn overflowing_arithmetic_is_an_eval_error() {
    for expr in [
        "9223372036854775807 + 1",
        "-9223372036854775807 - 2",
        "9223372036854775807 * 2",
        "1 << 64",
        "1 << -1",
    ] {
        let src = format!(
            "[type T [simple uint 8 a] [virtual uint 8 v '{}']]",
            expr
        );
        let registry = compile(&[&src]).expect("compile");
        let codec = Codec::new(&registry, ByteOrder::BigEndian);
        assert!(
            matches!(codec.parse("T", &[0x00]), Err(CodecError::Eval(_))),
            "{} should fail evaluation",
            expr
        );
    }
}

#[test]
fn manual_serialize_reports_the_missing_codegen() {
    let src = r#"
[type Tagged
    [simple uint 8 x]
    [manual uint 8 crc '42' 'STATIC_CALL("crc", writeBuffer)' '8']]
"#;
    let registry = compile(&[src]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);

    let value = codec.parse("Tagged", &[0x07]).expect("parse");
    match codec.serialize(&value) {
        Err(CodecError::Unsupported(msg)) => assert!(msg.contains("manual")),
        other => panic!("expected unsupported, got {:?}", other),
    }
}

#[test]
fn little_endian_order_applies_to_multibyte_fields() {
    let src = "[type V [simple uint 16 v]]";
    let registry = compile(&[src]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::LittleEndian);

    let value = codec.parse("V", &[0x34, 0x12]).expect("parse");
    assert_eq!(fields(&value).get("v"), Some(&Value::U16(0x1234)));
    assert_eq!(codec.serialize(&value).expect("serialize"), vec![0x34, 0x12]);
}

#[test]
fn truncated_input_is_a_buffer_error() {
    let registry = compile(&[FRAME]).expect("compile");
    let codec = Codec::new(&registry, ByteOrder::BigEndian);
    assert!(matches!(
        codec.parse("Frame", &[0x01, 0x00]),
        Err(CodecError::Buffer(_))
    ));
}
