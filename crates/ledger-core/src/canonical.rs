//! Deterministic JSON encoding used as hash input.
//!
//! Object keys are emitted in sorted order, items are separated by `", "`,
//! keys by `": "`, and everything outside printable ASCII is written as a
//! lowercase `\uXXXX` escape (surrogate pairs above the BMP). Two structurally
//! equal values therefore always encode to the same bytes, whatever order
//! their keys were inserted in.

use serde::Serialize;
use serde_json::{ser::Formatter, Map, Serializer, Value};
use std::io;

struct SortedKeyFormatter;

impl Formatter for SortedKeyFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let bytes = fragment.as_bytes();
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            writer.write_all(&bytes[start..i])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(&bytes[start..])
    }
}

/// Rebuild `value` with every object's keys in ascending order, regardless of
/// how the map type orders its entries.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::new();
            for (key, item) in entries {
                out.insert(key.clone(), sorted(item));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Encode `value` in canonical form. The output is always ASCII.
pub fn to_canonical_json(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut ser = Serializer::with_formatter(&mut out, SortedKeyFormatter);
        sorted(value)
            .serialize(&mut ser)
            .expect("encoding a JSON value into memory cannot fail");
    }
    out
}
