//! Byte-level encoding of a single `Object` value's body. Shared by
//! the full serializer, the incremental serializer, and
//! `Content::encode` (content-stream operands are PDF objects too).

use crate::object::{Object, StringFormat};

fn is_regular_printable(b: u8) -> bool {
    !matches!(b, b'\0' | b'\t' | b'\n' | 0x0c | b'\r' | b' ' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
        && (0x21..=0x7e).contains(&b)
}

fn write_name(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'/');
    for &b in bytes {
        if is_regular_printable(b) {
            out.push(b);
        } else {
            out.push(b'#');
            out.extend_from_slice(format!("{b:02X}").as_bytes());
        }
    }
}

fn write_literal_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
    out.push(b')');
}

fn write_hex_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'<');
    for &b in bytes {
        out.extend_from_slice(format!("{b:02X}").as_bytes());
    }
    out.push(b'>');
}

/// Fixed-point real formatting: round to 4 decimal places, then trim
/// trailing zeros and a trailing `.`.
fn write_real(out: &mut Vec<u8>, value: f64) {
    let mut s = format!("{value:.4}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s.is_empty() || s == "-0" {
        s = "0".to_string();
    }
    out.extend_from_slice(s.as_bytes());
}

pub(crate) fn write_value(out: &mut Vec<u8>, obj: &Object) {
    match obj {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(true) => out.extend_from_slice(b"true"),
        Object::Boolean(false) => out.extend_from_slice(b"false"),
        Object::Integer(i) => {
            let mut buf = itoa::Buffer::new();
            out.extend_from_slice(buf.format(*i).as_bytes());
        }
        Object::Real(r) => write_real(out, *r),
        Object::Name(bytes) => write_name(out, bytes),
        Object::String(bytes, format) => {
            let has_control_byte = bytes.iter().any(|&b| b < 0x20 && b != b'\n' && b != b'\r' || b == 0x7f);
            match format {
                StringFormat::Hex => write_hex_string(out, bytes),
                StringFormat::Literal if has_control_byte => write_hex_string(out, bytes),
                StringFormat::Literal => write_literal_string(out, bytes),
            }
        }
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_value(out, item);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dict(out, dict),
        Object::Stream(stream) => {
            write_dict(out, &stream.dict);
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(stream.raw_content());
            out.extend_from_slice(b"\nendstream");
        }
        Object::Reference(r) => {
            let mut buf = itoa::Buffer::new();
            out.extend_from_slice(buf.format(r.object_number()).as_bytes());
            out.push(b' ');
            out.extend_from_slice(buf.format(r.generation()).as_bytes());
            out.extend_from_slice(b" R");
        }
    }
}

fn write_dict(out: &mut Vec<u8>, dict: &crate::dictionary::Dictionary) {
    out.extend_from_slice(b"<<");
    for (key, value) in dict.iter() {
        out.push(b' ');
        write_name(out, key);
        out.push(b' ');
        write_value(out, value);
    }
    out.extend_from_slice(b" >>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;

    #[test]
    fn integers_have_no_leading_zeros_and_negatives_keep_sign() {
        let mut out = Vec::new();
        write_value(&mut out, &Object::Integer(-42));
        assert_eq!(out, b"-42");
    }

    #[test]
    fn reals_trim_trailing_zeros_and_dot() {
        let mut out = Vec::new();
        write_value(&mut out, &Object::Real(3.5000));
        assert_eq!(out, b"3.5");

        let mut out = Vec::new();
        write_value(&mut out, &Object::Real(3.0));
        assert_eq!(out, b"3");
    }

    #[test]
    fn names_escape_delimiters() {
        let mut out = Vec::new();
        write_name(&mut out, b"A B");
        assert_eq!(out, b"/A#20B");
    }

    #[test]
    fn literal_string_escapes_parens() {
        let mut out = Vec::new();
        write_value(&mut out, &Object::string_literal(b"a(b)c".to_vec()));
        assert_eq!(out, b"(a\\(b\\)c)");
    }

    #[test]
    fn dict_round_trips_through_indexmap_order() {
        let mut dict = Dictionary::new();
        dict.set(b"Type".to_vec(), Object::name(b"Catalog".to_vec()));
        dict.set(b"Pages".to_vec(), Object::reference((2, 0)));
        let mut out = Vec::new();
        write_value(&mut out, &Object::Dictionary(dict));
        assert_eq!(out, b"<< /Type /Catalog /Pages 2 0 R >>");
    }
}
