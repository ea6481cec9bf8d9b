//! Content-stream operator/operand pairs. This is a data carrier plus
//! a decode/encode round trip, not a text- or font-aware interpreter —
//! locating `Tj`/`TJ` runs and decoding fonts is a collaborator
//! concern. Reuses this crate's own object grammar (`parser::value`)
//! for operands instead of a separate grammar.

use crate::error::{Error, Result};
use crate::object::{Object, StringFormat};
use crate::parser::{self, ParserInput};

/// One operator and the operands that precede it, e.g. `72 720 Td` is
/// `Operation { operator: "Td", operands: [72, 720] }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: String,
    pub operands: Vec<Object>,
}

impl Operation {
    pub fn new(operator: impl Into<String>, operands: Vec<Object>) -> Self {
        Operation { operator: operator.into(), operands }
    }
}

/// A decoded content stream. Generic over the operation container so
/// a future streaming decoder (`impl Iterator<Item = Operation>`)
/// could slot in without changing the type's name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Content<T> {
    pub operations: T,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | 0x0c | b'\r' | b' ')
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn skip_whitespace_and_comments(data: &[u8], mut pos: usize) -> usize {
    loop {
        while pos < data.len() && is_whitespace(data[pos]) {
            pos += 1;
        }
        if pos < data.len() && data[pos] == b'%' {
            while pos < data.len() && data[pos] != b'\n' && data[pos] != b'\r' {
                pos += 1;
            }
            continue;
        }
        break;
    }
    pos
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// `BI ... ID <binary data> EI`: inline images carry arbitrary binary
/// bytes between `ID` and `EI`, so they can't be tokenized by the
/// ordinary value grammar. The blob is round-tripped as an opaque
/// byte string rather than decoded.
fn scan_inline_image(data: &[u8], bi_start: usize) -> Result<(usize, Vec<u8>)> {
    let after_bi = bi_start + 2;
    let id_rel = find_subsequence(&data[after_bi..], b"ID")
        .ok_or_else(|| Error::Syntax("inline image missing ID".to_string()))?;
    let data_start = after_bi + id_rel + 2 + 1; // "ID" plus one separator byte
    let mut search_from = data_start;
    loop {
        let ei_rel = find_subsequence(&data[search_from..], b"EI")
            .ok_or_else(|| Error::Syntax("inline image missing EI".to_string()))?;
        let ei_pos = search_from + ei_rel;
        let followed_by_boundary =
            ei_pos + 2 >= data.len() || is_whitespace(data[ei_pos + 2]) || is_delimiter(data[ei_pos + 2]);
        if followed_by_boundary {
            let blob_end = if ei_pos > data_start && is_whitespace(data[ei_pos - 1]) { ei_pos - 1 } else { ei_pos };
            return Ok((ei_pos + 2, data[data_start..blob_end].to_vec()));
        }
        search_from = ei_pos + 2;
    }
}

impl Content<Vec<Operation>> {
    /// Decode a content stream's already-filter-decoded bytes into
    /// operator/operand pairs.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut pos = 0;
        let mut operations = Vec::new();
        let mut operands: Vec<Object> = Vec::new();

        while pos < data.len() {
            pos = skip_whitespace_and_comments(data, pos);
            if pos >= data.len() {
                break;
            }

            if data[pos..].starts_with(b"BI") && data.get(pos + 2).map_or(true, |&b| is_whitespace(b) || is_delimiter(b))
            {
                let (next_pos, blob) = scan_inline_image(data, pos)?;
                operations.push(Operation::new("BI", vec![Object::String(blob, StringFormat::Hex)]));
                operands.clear();
                pos = next_pos;
                continue;
            }

            let span = parser::input(&data[pos..], "content");
            if let Ok((rest, object)) = parser::value(span) {
                let consumed = rest.location_offset();
                if consumed > 0 {
                    operands.push(object);
                    pos += consumed;
                    continue;
                }
            }

            let start = pos;
            while pos < data.len() && !is_whitespace(data[pos]) && !is_delimiter(data[pos]) {
                pos += 1;
            }
            if pos == start {
                return Err(Error::Syntax(format!("unrecognized content stream token at offset {pos}")));
            }
            let operator = String::from_utf8_lossy(&data[start..pos]).into_owned();
            operations.push(Operation::new(operator, std::mem::take(&mut operands)));
        }

        Ok(Content { operations })
    }

    /// Re-encode into bytes suitable for a `Contents` stream's plain
    /// (pre-filter) payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for operation in &self.operations {
            if operation.operator == "BI" {
                if let Some(Object::String(blob, _)) = operation.operands.first() {
                    out.extend_from_slice(b"BI\nID ");
                    out.extend_from_slice(blob);
                    out.extend_from_slice(b" EI\n");
                }
                continue;
            }
            for operand in &operation.operands {
                crate::writer::encode::write_value(&mut out, operand);
                out.push(b' ');
            }
            out.extend_from_slice(operation.operator.as_bytes());
            out.push(b'\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_operands_then_operator() {
        let content = Content::decode(b"q\n72 720 Td\n(Hello) Tj\nQ").unwrap();
        assert_eq!(content.operations.len(), 4);
        assert_eq!(content.operations[0].operator, "q");
        assert_eq!(content.operations[1].operator, "Td");
        assert_eq!(content.operations[1].operands, vec![Object::Integer(72), Object::Integer(720)]);
        assert_eq!(content.operations[2].operator, "Tj");
        assert_eq!(content.operations[2].operands, vec![Object::string_literal(b"Hello".to_vec())]);
    }

    #[test]
    fn round_trips_through_encode() {
        let original = b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET";
        let content = Content::decode(original).unwrap();
        let encoded = content.encode().unwrap();
        let reparsed = Content::decode(&encoded).unwrap();
        assert_eq!(content.operations, reparsed.operations);
    }

    #[test]
    fn inline_image_blob_round_trips() {
        let mut data = Vec::new();
        data.extend_from_slice(b"q\nBI /W 1 /H 1 /BPC 8 /CS /G\nID ");
        data.extend_from_slice(&[0xFFu8, 0x00, 0xAB]);
        data.extend_from_slice(b" EI\nQ");

        let content = Content::decode(&data).unwrap();
        assert_eq!(content.operations[0].operator, "q");
        assert_eq!(content.operations[1].operator, "BI");
        assert_eq!(content.operations[2].operator, "Q");
    }
}
