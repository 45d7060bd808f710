use std::fmt::Write as _;
use std::time::{Duration, Instant};

use rstest::rstest;

use super::*;
use crate::value::{ARRAY_LENGTH_KEY, ARRAY_MARKER_KEY, Object, Value};

fn escaped(input: &[u8]) -> String {
    let mut out = String::new();
    escape_str_bytes(input, &mut out).expect("escape");
    out
}

#[rstest]
#[case(b"a\"b\nc", "\"a\\\"b\\nc\"")]
#[case(b"back\\slash", "\"back\\\\slash\"")]
#[case(b"\r\t\x0c\x08", "\"\\r\\t\\f\\b\"")]
#[case(b"\x01\x1f", "\"\\u0001\\u001f\"")]
#[case(b"del\x7f", "\"del\x7f\"")]
#[case("caf\u{e9}".as_bytes(), "\"caf\\u00e9\"")]
#[case("\u{20ac}".as_bytes(), "\"\\u20ac\"")]
#[case("a\u{1f600}b".as_bytes(), "\"ab\"")]
fn escapes_strings(#[case] input: &[u8], #[case] expected: &str) {
    assert_eq!(escaped(input), expected);
}

#[test]
fn invalid_utf8_fails_without_partial_output() {
    let mut out = String::from("prefix");
    let error = escape_str_bytes(b"ok\xc3\x28", &mut out).expect_err("invalid");
    assert_eq!(error, EncodeError::InvalidUtf8 { valid_up_to: 2 });
    assert_eq!(out, "prefix");
}

#[rstest]
#[case(Value::Null, "null")]
#[case(Value::Flag, "true")]
#[case(Value::Bool(false), "false")]
#[case(Value::Int8(-8), "-8")]
#[case(Value::UInt16(65535), "65535")]
#[case(Value::Int64(i64::MIN), "-9223372036854775808")]
#[case(Value::UInt64(u64::MAX), "18446744073709551615")]
#[case(Value::HrTime(123_456_789), "123456789")]
#[case(Value::Double(1.5), "1.500000")]
#[case(Value::Double(-0.25), "-0.250000")]
#[case(Value::BoolArray(vec![true, false]), "[true,false]")]
#[case(Value::Int32Array(vec![1, -2, 3]), "[1,-2,3]")]
#[case(Value::StringArray(vec!["a".to_owned(), "\"".to_owned()]), "[\"a\",\"\\\"\"]")]
#[case(Value::UInt8Array(Vec::new()), "[]")]
#[case(Value::Array(vec![Value::Null, Value::from("x"), Value::from(2)]), "[null,\"x\",2]")]
fn encodes_scalars_and_arrays(#[case] value: Value, #[case] expected: &str) {
    assert_eq!(encode(&value).expect("encode"), expected);
}

#[rstest]
#[case(f64::NAN)]
#[case(f64::INFINITY)]
#[case(f64::NEG_INFINITY)]
fn non_finite_doubles_are_rejected(#[case] number: f64) {
    assert_eq!(
        encode(&Value::Double(number)),
        Err(EncodeError::NonFiniteDouble)
    );
}

#[test]
fn encodes_objects_in_insertion_order() {
    let mut inner = Object::new();
    inner.insert("deep", true);
    let mut object = Object::new();
    object.insert("z", 1);
    object.insert("a", inner.clone());
    object.insert("list", Value::ObjectArray(vec![inner, Object::new()]));

    assert_eq!(
        encode_object(&object).expect("encode"),
        r#"{"z":1,"a":{"deep":true},"list":[{"deep":true},{}]}"#
    );
}

#[test]
fn marker_array_encodes_as_json_array() {
    let object = Object::marker_array([Value::from("x"), Value::from(5)]);
    assert_eq!(encode_object(&object).expect("encode"), r#"["x",5]"#);
}

#[test]
fn marker_array_without_length_fails() {
    let mut object = Object::new();
    object.insert(ARRAY_MARKER_KEY, true);
    object.insert("0", "x");
    assert_eq!(
        encode_object(&object),
        Err(EncodeError::MissingArrayLength)
    );
}

#[test]
fn marker_array_with_gap_fails() {
    let mut object = Object::new();
    object.insert(ARRAY_MARKER_KEY, true);
    object.insert(ARRAY_LENGTH_KEY, 2_u32);
    object.insert("0", "x");
    assert_eq!(
        encode_object(&object),
        Err(EncodeError::MissingArrayElement { index: 1 })
    );
}

#[test]
fn nested_failure_discards_everything() {
    let mut object = Object::new();
    object.insert("fine", "yes");
    object.insert("bad", Value::Array(vec![Value::Double(f64::NAN)]));
    assert!(encode_object(&object).is_err());
}

#[test]
fn decode_preserves_field_order_and_types() {
    let object = decode_object(
        br#"{"b":1,"a":"two","c":[true,null],"d":2.5}"#,
        DecodeOptions::default(),
    )
    .expect("decode");

    let keys: Vec<_> = object.iter().map(|(key, _)| key).collect();
    assert_eq!(keys, ["b", "a", "c", "d"]);
    assert_eq!(object.get("b"), Some(&Value::Int64(1)));
    assert_eq!(
        object.get("c"),
        Some(&Value::Array(vec![Value::Bool(true), Value::Null]))
    );
    assert_eq!(object.get("d"), Some(&Value::Double(2.5)));
}

/// A line just under the default 1 MiB limit must not stall the reactor.
const WIDE_LINE_BUDGET: Duration = Duration::from_secs(5);

fn wide_object_line(keys: usize) -> String {
    let mut line = String::from("{");
    for index in 0..keys {
        if index > 0 {
            line.push(',');
        }
        write!(line, "\"k{index}\":0").expect("format key");
    }
    line.push('}');
    line
}

#[test]
fn wide_objects_decode_in_linear_time() {
    let line = wide_object_line(90_000);
    assert!(line.len() < 1024 * 1024, "line is {} bytes", line.len());

    let started = Instant::now();
    let object = decode_object(line.as_bytes(), DecodeOptions::integers_only()).expect("decode");
    let elapsed = started.elapsed();

    assert_eq!(object.len(), 90_000);
    assert_eq!(object.get("k89999"), Some(&Value::Int64(0)));
    assert!(elapsed < WIDE_LINE_BUDGET, "decode took {elapsed:?}");
}

#[test]
fn wide_marker_arrays_round_trip_in_linear_time() {
    let elements = (0..90_000_i32).map(Value::from);
    let line = format!(
        "[{}]",
        (0..90_000).map(|n: i32| n.to_string()).collect::<Vec<_>>().join(",")
    );
    let options = DecodeOptions {
        arrays: ArrayForm::Marker,
        ..DecodeOptions::default()
    };

    let started = Instant::now();
    let built = Value::Object(Object::marker_array(elements));
    let decoded = decode(line.as_bytes(), options).expect("decode");
    let encoded = encode(&built).expect("encode");
    let elapsed = started.elapsed();

    assert_eq!(encoded, line);
    let Value::Object(object) = &decoded else {
        panic!("expected a marker object, got {decoded:?}");
    };
    assert_eq!(object.array_length(), Some(90_000));
    assert!(elapsed < WIDE_LINE_BUDGET, "marker arrays took {elapsed:?}");
}

#[test]
fn decode_maps_large_unsigned_integers() {
    let value = decode(b"18446744073709551615", DecodeOptions::default()).expect("decode");
    assert_eq!(value, Value::UInt64(u64::MAX));
}

#[rstest]
#[case(b"{\"x\":1.5}".as_slice())]
#[case(b"{\"x\":1e3}".as_slice())]
fn force_integer_rejects_fractions(#[case] input: &[u8]) {
    let error = decode(input, DecodeOptions::integers_only()).expect_err("fraction");
    assert!(matches!(error, DecodeError::NonInteger { .. }), "{error:?}");
}

#[test]
fn decode_reports_syntax_errors() {
    let error = decode(b"{\"open\":", DecodeOptions::default()).expect_err("truncated");
    assert!(matches!(error, DecodeError::Syntax { .. }));
}

#[test]
fn decode_object_rejects_other_top_level_values() {
    let error = decode_object(b"[1,2]", DecodeOptions::default()).expect_err("array");
    assert!(matches!(error, DecodeError::NotAnObject { found: "array" }));
}

#[test]
fn marker_form_decodes_arrays_as_marker_objects() {
    let options = DecodeOptions {
        arrays: ArrayForm::Marker,
        ..DecodeOptions::default()
    };
    let value = decode(br#"["x",5]"#, options).expect("decode");
    let Value::Object(object) = &value else {
        panic!("expected a marker object, got {value:?}");
    };
    assert!(object.is_marker_array());
    assert_eq!(object.array_length(), Some(2));
    assert_eq!(encode(&value).expect("encode"), r#"["x",5]"#);
}

#[rstest]
#[case(ArrayForm::Native)]
#[case(ArrayForm::Marker)]
fn re_encoding_is_stable(#[case] arrays: ArrayForm) {
    let mut object = Object::new();
    object.insert("type", "heartbeat");
    object.insert("hrtime", Value::HrTime(42));
    object.insert("ratio", 0.5);
    object.insert("flags", Value::BoolArray(vec![true]));
    object.insert("mixed", Value::Array(vec![Value::from("x"), Value::from(5)]));
    object.insert("text", "caf\u{e9} \"quoted\"\n");
    let options = DecodeOptions {
        force_integer: false,
        arrays,
    };

    let first = encode_object(&object).expect("first encode");
    let decoded = decode_object(first.as_bytes(), options).expect("decode");
    let second = encode_object(&decoded).expect("second encode");
    assert_eq!(first, second);
}
