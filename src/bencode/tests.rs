use std::collections::BTreeMap;

use bytes::Bytes;

use super::*;

#[test]
fn decodes_integers() {
    assert_eq!(decode(b"i42e").unwrap(), Value::Integer(42));
    assert_eq!(decode(b"i-17e").unwrap(), Value::Integer(-17));
    assert_eq!(decode(b"i0e").unwrap(), Value::Integer(0));
}

#[test]
fn rejects_malformed_integers() {
    assert_eq!(decode(b"i-0e"), Err(BencodeError::InvalidInteger));
    assert_eq!(decode(b"i007e"), Err(BencodeError::InvalidInteger));
    assert_eq!(decode(b"ie"), Err(BencodeError::InvalidInteger));
    assert_eq!(decode(b"i12"), Err(BencodeError::UnexpectedEof));
}

#[test]
fn decodes_byte_strings() {
    assert_eq!(
        decode(b"4:spam").unwrap(),
        Value::Bytes(Bytes::from_static(b"spam"))
    );
    assert_eq!(decode(b"0:").unwrap(), Value::Bytes(Bytes::new()));
    assert_eq!(decode(b"5:ab"), Err(BencodeError::UnexpectedEof));
}

#[test]
fn decodes_lists_and_dicts() {
    let list = decode(b"l4:spami42ee").unwrap();
    assert_eq!(
        list.as_list().unwrap(),
        &[Value::string("spam"), Value::Integer(42)]
    );

    let dict = decode(b"d3:cow3:moo4:spam4:eggse").unwrap();
    assert_eq!(dict.get(b"cow").and_then(Value::as_str), Some("moo"));
    assert_eq!(dict.get(b"spam").and_then(Value::as_str), Some("eggs"));
}

#[test]
fn trailing_bytes_are_a_partial_decode() {
    assert_eq!(decode(b"i42eextra"), Err(BencodeError::PartialDecode));
    assert_eq!(decode(b"4:spam4:eggs"), Err(BencodeError::PartialDecode));
}

#[test]
fn decode_prefix_reports_consumed_length() {
    let (value, used) = decode_prefix(b"d1:ai1ee4:tail").unwrap();
    assert_eq!(used, 8);
    assert_eq!(value.get(b"a").and_then(Value::as_integer), Some(1));
}

#[test]
fn roundtrips_the_encoder_subset() {
    let inputs: &[&[u8]] = &[
        b"i42e",
        b"4:spam",
        b"l4:spami42ee",
        b"d8:announce15:http://test.com4:infod4:name4:test12:piece lengthi16384eee",
        b"d4:listl4:spami42eee",
    ];
    for input in inputs {
        let value = decode(input).unwrap();
        assert_eq!(encode(&value), *input);
    }
}

#[test]
fn encode_sorts_dictionary_keys() {
    let mut dict = BTreeMap::new();
    dict.insert(Bytes::from_static(b"zz"), Value::Integer(1));
    dict.insert(Bytes::from_static(b"aa"), Value::Integer(2));
    assert_eq!(encode(&Value::Dict(dict)), b"d2:aai2e2:zzi1ee");
}

#[test]
fn deep_nesting_is_bounded() {
    let mut input = vec![b'l'; 80];
    input.extend(vec![b'e'; 80]);
    assert_eq!(decode(&input), Err(BencodeError::NestingTooDeep));
}
