//! The object parser and the xref/trailer readers built on top of the
//! lexer. Given a byte offset, `indirect_object` produces an
//! `(ObjectId, Object)` pair; given the bytes found at `startxref`,
//! `xref_and_trailer` produces a classical, stream, or hybrid
//! cross-reference table plus the trailer dictionary that goes with
//! it.

mod lexer;

use std::collections::HashSet;

use nom::branch::alt;
use nom::bytes::complete::{tag, take, take_while, take_while1};
use nom::character::complete::digit1;
use nom::combinator::{map, opt, peek};
use nom::multi::many0;
use nom::sequence::{preceded, terminated};
use nom::{IResult, Parser, Slice};

pub use lexer::Span as ParserInput;
use lexer::{hex_string_body, integer, is_whitespace, literal_string_body, name_body, real, space};

use crate::dictionary::Dictionary;
use crate::error::{Error, ParseError, Result, XrefError};
use crate::object::{Array, Object, StringFormat};
use crate::object_id::ObjectId;
use crate::object_stream::ObjectStream;
use crate::reader::Reader;
use crate::stream::Stream;
use crate::xref::{Xref, XrefEntry, XrefType};

/// Build a `ParserInput` (a `LocatedSpan`) over a byte slice, tagged
/// with a short label used only in debug output.
pub fn input(data: &[u8], label: &'static str) -> ParserInput<'_> {
    ParserInput::new_extra(data, label)
}

/// `%PDF-M.m` header; returns the version string (`"1.7"`, etc).
pub fn header(i: ParserInput) -> Option<String> {
    let (i, _) = tag::<_, _, nom::error::Error<ParserInput>>(b"%PDF-".as_slice()).parse(i).ok()?;
    let (_, digits) = take_while1::<_, _, nom::error::Error<ParserInput>>(|b: u8| b == b'.' || b.is_ascii_digit())
        .parse(i)
        .ok()?;
    Some(String::from_utf8_lossy(digits.fragment()).to_string())
}

/// The binary-marker comment line: four-or-more bytes with the high
/// bit set, used to convince naive transport layers the file is
/// binary. Returns the raw bytes of that line's comment body.
pub fn binary_mark(i: ParserInput) -> Option<Vec<u8>> {
    let (i, _) = tag::<_, _, nom::error::Error<ParserInput>>(b"%".as_slice()).parse(i).ok()?;
    let (_, line) = take_while::<_, _, nom::error::Error<ParserInput>>(|b: u8| b != b'\n' && b != b'\r')
        .parse(i)
        .ok()?;
    Some(line.fragment().to_vec())
}

/// `startxref\n<offset>` — just the offset.
pub fn xref_start(i: ParserInput) -> Option<u64> {
    let (i, _) = tag::<_, _, nom::error::Error<ParserInput>>(b"startxref".as_slice()).parse(i).ok()?;
    let (i, _) = space::<nom::error::Error<ParserInput>>(i).ok()?;
    let (_, digits) = digit1::<_, nom::error::Error<ParserInput>>(i).ok()?;
    std::str::from_utf8(digits.fragment()).ok()?.parse().ok()
}

// ---------------------------------------------------------------
// Generic value grammar
// ---------------------------------------------------------------

fn null(i: ParserInput) -> IResult<ParserInput, Object> {
    map(tag(b"null".as_slice()), |_| Object::Null).parse(i)
}

fn boolean(i: ParserInput) -> IResult<ParserInput, Object> {
    alt((
        map(tag(b"true".as_slice()), |_| Object::Boolean(true)),
        map(tag(b"false".as_slice()), |_| Object::Boolean(false)),
    ))
    .parse(i)
}

/// Two integers followed by `R` is a reference only at value
/// position; plain `integer()`/`real()` are tried first by the
/// caller, so this only needs to disambiguate `N G R` from `N G obj`
/// by requiring the `R` token and rejecting if what follows looks like
/// the start of an object body instead.
fn reference(i: ParserInput) -> IResult<ParserInput, Object> {
    let (i, num) = integer(i)?;
    let (i, _) = take_while1(is_whitespace)(i)?;
    let (i, gen) = integer(i)?;
    let (i, _) = take_while1(is_whitespace)(i)?;
    let (i, _) = tag(b"R".as_slice()).parse(i)?;
    let (i, _) = peek(alt((
        nom::combinator::eof,
        nom::bytes::complete::take_while1(|b: u8| !b.is_ascii_alphanumeric()),
    )))
    .parse(i)?;
    Ok((i, Object::reference((num as u32, gen as u16))))
}

fn number(i: ParserInput) -> IResult<ParserInput, Object> {
    if let Ok((rest, v)) = reference(i) {
        return Ok((rest, v));
    }
    // Distinguish integer from real by whether a `.` follows the
    // optional sign/digits.
    let probe = i.fragment();
    let mut has_dot = false;
    for &b in probe.iter() {
        if b == b'.' {
            has_dot = true;
            break;
        }
        if !(b.is_ascii_digit() || b == b'+' || b == b'-') {
            break;
        }
    }
    if has_dot {
        map(real, Object::Real).parse(i)
    } else {
        map(integer, Object::Integer).parse(i)
    }
}

fn name_obj(i: ParserInput) -> IResult<ParserInput, Object> {
    map(name_body, Object::Name).parse(i)
}

fn literal_string_obj(i: ParserInput) -> IResult<ParserInput, Object> {
    map(literal_string_body, |b| Object::String(b, StringFormat::Literal)).parse(i)
}

fn hex_string_obj(i: ParserInput) -> IResult<ParserInput, Object> {
    map(hex_string_body, |b| Object::String(b, StringFormat::Hex)).parse(i)
}

fn array_obj(i: ParserInput) -> IResult<ParserInput, Object> {
    let (i, _) = tag(b"[".as_slice()).parse(i)?;
    let (i, _) = space(i)?;
    let (i, items) = many0(terminated(value, space)).parse(i)?;
    let (i, _) = tag(b"]".as_slice()).parse(i)?;
    Ok((i, Object::Array(Array::from(items))))
}

fn dict_obj(i: ParserInput) -> IResult<ParserInput, Dictionary> {
    let (i, _) = tag(b"<<".as_slice()).parse(i)?;
    let (i, _) = space(i)?;
    let (i, pairs) = many0(|i| {
        let (i, key) = name_body(i)?;
        let (i, _) = space(i)?;
        let (i, val) = value(i)?;
        let (i, _) = space(i)?;
        Ok((i, (key, val)))
    })
    .parse(i)?;
    let (i, _) = tag(b">>".as_slice()).parse(i)?;
    Ok((i, Dictionary::from_iter(pairs)))
}

/// Any value in value-position: the composite forms recurse through
/// `value`, never producing a bare `Stream` (that only happens at the
/// top level of an indirect object, right after its dictionary).
pub fn value(i: ParserInput) -> IResult<ParserInput, Object> {
    alt((
        null,
        boolean,
        number,
        name_obj,
        literal_string_obj,
        |i| {
            // `<<` is a dict, a lone `<` starts a hex string.
            let (_, is_dict) = peek::<_, _, nom::error::Error<ParserInput>, _>(opt(tag(b"<<".as_slice()))).parse(i)?;
            if is_dict.is_some() {
                map(dict_obj, Object::Dictionary).parse(i)
            } else {
                hex_string_obj(i)
            }
        },
        array_obj,
    ))
    .parse(i)
}

// ---------------------------------------------------------------
// Indirect objects
// ---------------------------------------------------------------

/// `N G obj ... endobj`, optionally with a `stream ... endstream`
/// payload. `offset` is where this call starts reading from the
/// document buffer; `expected_id`, if given, is checked against the
/// parsed `N G` (a mismatch is tolerated — the xref entry, not the
/// object header, is authoritative for identity once brute-force
/// recovery is in play).
pub fn indirect_object(
    full_input: ParserInput, offset: usize, expected_id: Option<ObjectId>, reader: &Reader,
    already_seen: &mut HashSet<ObjectId>,
) -> Result<(ObjectId, Object)> {
    let i = full_input.slice(offset..);
    let (i, num) = integer(i).map_err(|_| ParseError::InvalidObject)?;
    let (i, _) = take_while1(is_whitespace)(i).map_err(|_: nom::Err<nom::error::Error<ParserInput>>| ParseError::InvalidObject)?;
    let (i, gen) = integer(i).map_err(|_| ParseError::InvalidObject)?;
    let (i, _) = space::<nom::error::Error<ParserInput>>(i).map_err(|_| ParseError::InvalidObject)?;
    let (i, _) = tag::<_, _, nom::error::Error<ParserInput>>(b"obj".as_slice())
        .parse(i)
        .map_err(|_| ParseError::InvalidObject)?;
    let (i, _) = space::<nom::error::Error<ParserInput>>(i).map_err(|_| ParseError::InvalidObject)?;

    let id: ObjectId = (num as u32, gen as u16);
    if let Some(expected) = expected_id {
        if expected != id {
            log::warn!(
                "object header {} {} obj does not match expected id {} {}",
                id.0, id.1, expected.0, expected.1
            );
        }
    }

    let (i, val) = value(i).map_err(|_| ParseError::InvalidObject)?;
    let (i, _) = space::<nom::error::Error<ParserInput>>(i).map_err(|_| ParseError::InvalidObject)?;

    let (after_value, is_stream) =
        peek::<_, _, nom::error::Error<ParserInput>, _>(opt(tag(b"stream".as_slice()))).parse(i).map_err(|_| ParseError::InvalidObject)?;

    if is_stream.is_some() {
        let dict = match val {
            Object::Dictionary(d) => d,
            _ => return Err(ParseError::InvalidStream.into()),
        };
        let (i, _) = tag::<_, _, nom::error::Error<ParserInput>>(b"stream".as_slice())
            .parse(after_value)
            .map_err(|_| ParseError::InvalidStream)?;
        // Exactly one EOL follows `stream`; CR-only is accepted
        // leniently even though strict PDF requires LF or CRLF.
        let (i, _) = alt::<_, _, nom::error::Error<ParserInput>, _>((
            tag(b"\r\n".as_slice()),
            tag(b"\n".as_slice()),
            tag(b"\r".as_slice()),
        ))
        .parse(i)
        .map_err(|_| ParseError::InvalidStream)?;

        let payload_start = i.location_offset();
        let mut stream = Stream::new_raw(dict);
        stream.start_position = Some(payload_start);

        let declared_len = stream
            .dict
            .get(b"Length")
            .ok()
            .and_then(|l| match l {
                Object::Integer(n) => Some(*n as usize),
                Object::Reference(r) => {
                    already_seen.insert(id);
                    reader.get_object(r.id(), already_seen).ok().and_then(|o| o.as_i64().ok()).map(|n| n as usize)
                }
                _ => None,
            });

        let buffer = full_input.fragment();
        let end = match declared_len {
            Some(len) if payload_start + len <= buffer.len() && trails_with_endstream(buffer, payload_start + len) => {
                payload_start + len
            }
            _ => find_endstream(buffer, payload_start).ok_or(ParseError::InvalidStream)?,
        };

        stream.set_content(buffer[payload_start..end].to_vec());
        let mut after = full_input.slice(end..);
        let (rest, _) = space::<nom::error::Error<ParserInput>>(after).unwrap_or((after, ()));
        after = rest;
        let (after, _) = opt(tag::<_, _, nom::error::Error<ParserInput>>(b"endstream".as_slice()))
            .parse(after)
            .unwrap_or((after, None));
        let (after, _) = space::<nom::error::Error<ParserInput>>(after).unwrap_or((after, ()));
        let _ = opt(tag::<_, _, nom::error::Error<ParserInput>>(b"endobj".as_slice())).parse(after);

        Ok((id, Object::Stream(stream)))
    } else {
        // `endobj` is optional in recovery mode; don't hard-fail if
        // it's missing or malformed.
        let _ = opt(tag::<_, _, nom::error::Error<ParserInput>>(b"endobj".as_slice())).parse(after_value);
        Ok((id, val))
    }
}

fn trails_with_endstream(buffer: &[u8], at: usize) -> bool {
    let tail = &buffer[at.min(buffer.len())..];
    let trimmed = tail.iter().position(|&b| !is_whitespace(b)).map(|p| &tail[p..]).unwrap_or(tail);
    trimmed.starts_with(b"endstream")
}

fn find_endstream(buffer: &[u8], from: usize) -> Option<usize> {
    let needle = b"endstream";
    let haystack = &buffer[from..];
    let pos = haystack.windows(needle.len()).position(|w| w == needle)?;
    let mut end = from + pos;
    // Trim the single EOL the spec requires before `endstream`.
    if end > from && buffer[end - 1] == b'\n' {
        end -= 1;
        if end > from && buffer[end - 1] == b'\r' {
            end -= 1;
        }
    }
    Some(end)
}

// ---------------------------------------------------------------
// Xref + trailer
// ---------------------------------------------------------------

fn classical_xref_subsection(i: ParserInput) -> IResult<ParserInput, Vec<(u32, XrefEntry)>> {
    let (i, first) = integer(i)?;
    let (i, _) = take_while1(is_whitespace)(i)?;
    let (i, count) = integer(i)?;
    let (i, _) = space(i)?;

    let mut entries = Vec::with_capacity(count.max(0) as usize);
    let mut rest = i;
    for n in 0..count {
        let (next, offset) = digit1(rest)?;
        let (next, _) = take_while1(is_whitespace)(next)?;
        let (next, generation) = digit1(next)?;
        let (next, _) = take_while1(is_whitespace)(next)?;
        let (next, kind) = take(1usize)(next)?;
        let (next, _) = space(next)?;

        let offset: u32 = std::str::from_utf8(offset.fragment()).unwrap().parse().unwrap_or(0);
        let generation: u16 = std::str::from_utf8(generation.fragment()).unwrap().parse().unwrap_or(0);
        let object_number = first as u32 + n as u32;
        match kind.fragment()[0] {
            b'n' => entries.push((object_number, XrefEntry::Normal { offset, generation })),
            b'f' => entries.push((
                object_number,
                if object_number == 0 {
                    XrefEntry::UnusableFree
                } else {
                    XrefEntry::Free { next_free: offset, generation }
                },
            )),
            _ => return Err(nom::Err::Error(nom::error::Error::new(next, nom::error::ErrorKind::OneOf))),
        }
        rest = next;
    }
    Ok((rest, entries))
}

fn classical_xref(i: ParserInput) -> IResult<ParserInput, Xref> {
    let (i, _) = tag(b"xref".as_slice()).parse(i)?;
    let (i, _) = space(i)?;
    let (i, sections) = many0(terminated(classical_xref_subsection, space)).parse(i)?;
    let mut xref = Xref::new(0, XrefType::Table);
    for section in sections {
        for (number, entry) in section {
            xref.insert(number, entry);
        }
    }
    Ok((i, xref))
}

fn trailer_dict(i: ParserInput) -> IResult<ParserInput, Dictionary> {
    let (i, _) = tag(b"trailer".as_slice()).parse(i)?;
    let (i, _) = space(i)?;
    dict_obj(i)
}

/// Decode a cross-reference *stream*'s payload into an `Xref` plus the
/// trailer-shaped dict that remains after stripping the
/// stream-framing keys (`/Length`, `/W`, `/Index`).
pub fn decode_xref_stream(mut stream: Stream) -> Result<(Xref, Dictionary)> {
    let decoded = stream.decompressed_content()?;
    let mut dict = stream.dict.clone();
    let size = dict.get(b"Size").and_then(Object::as_i64).map_err(|_| XrefError::Parse)?;
    let mut xref = Xref::new(size as u32, XrefType::Stream);

    let widths = int_array(&dict, b"W").ok_or(XrefError::Parse)?;
    if widths.len() < 3 {
        return Err(XrefError::Parse.into());
    }
    let (w0, w1, w2) = (widths[0] as usize, widths[1] as usize, widths[2] as usize);
    let row_len = w0 + w1 + w2;
    if row_len == 0 {
        return Err(XrefError::Parse.into());
    }

    let index = int_array(&dict, b"Index").unwrap_or_else(|| vec![0, size]);
    let mut cursor = 0usize;
    for chunk in index.chunks(2) {
        if chunk.len() != 2 {
            break;
        }
        let (start, count) = (chunk[0], chunk[1]);
        for j in 0..count {
            if cursor + row_len > decoded.len() {
                break;
            }
            let row = &decoded[cursor..cursor + row_len];
            cursor += row_len;
            let field = |off: usize, len: usize| -> u32 {
                row[off..off + len].iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
            };
            let kind = if w0 == 0 { 1 } else { field(0, w0) };
            let f2 = field(w0, w1);
            let f3 = if w2 == 0 { 0 } else { field(w0 + w1, w2) };
            let object_number = (start + j) as u32;
            match kind {
                0 => {
                    xref.insert(object_number, XrefEntry::Free { next_free: f2, generation: f3 as u16 });
                }
                1 => {
                    xref.insert(object_number, XrefEntry::Normal { offset: f2, generation: f3 as u16 });
                }
                2 => {
                    xref.insert(object_number, XrefEntry::Compressed { container: f2, index: f3 });
                }
                _ => {}
            }
        }
    }

    dict.remove(b"Length");
    dict.remove(b"W");
    dict.remove(b"Index");
    dict.remove(b"Filter");
    dict.remove(b"DecodeParms");
    Ok((xref, dict))
}

fn int_array(dict: &Dictionary, key: &[u8]) -> Option<Vec<i64>> {
    let arr = dict.get(key).ok()?.as_array().ok()?;
    arr.iter().map(|o| o.as_i64().ok()).collect()
}

/// Read one xref section — classical table or xref stream — plus the
/// trailer dictionary that follows (or, for a stream, the stream's
/// own dict once the framing keys are stripped).
pub fn xref_and_trailer(i: ParserInput, reader: &Reader) -> Result<(Xref, Dictionary)> {
    let trimmed = i.fragment();
    let looks_classical = trimmed.get(..4) == Some(b"xref");

    if looks_classical {
        let (rest, xref) = classical_xref(i).map_err(|_| XrefError::Parse)?;
        let (_, mut trailer) = trailer_dict(rest).map_err(|_| XrefError::Parse)?;
        let mut xref = xref;
        xref.size = trailer.get(b"Size").and_then(Object::as_i64).unwrap_or(xref.max_id() as i64 + 1) as u32;
        if let Ok(Object::Reference(r)) = trailer.get(b"XRefStm").cloned() {
            trailer.set(b"XRefStm".to_vec(), Object::Reference(r));
        }
        Ok((xref, trailer))
    } else {
        let mut already_seen = HashSet::new();
        let (_, (id, obj)) = {
            let full = i;
            let parsed = indirect_object(full, 0, None, reader, &mut already_seen).map_err(|_| XrefError::Parse)?;
            (full, parsed)
        };
        let _ = id;
        let stream = match obj {
            Object::Stream(s) => s,
            _ => return Err(XrefError::Parse.into()),
        };
        decode_xref_stream(stream).map(|(xref, dict)| (xref, dict))
    }
}

/// Resolve a compressed object stream's index and hand back the
/// `(object_number, offset_in_payload)` pairs plus the bytes they
/// index into, as lazily materialized by `get_object`.
pub fn object_stream_index(stream: &mut Stream) -> Result<ObjectStream> {
    ObjectStream::new(stream)
}
