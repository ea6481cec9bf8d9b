//! Byte-level tokenizer. Whitespace/comment skipping, numeric, name
//! (`#XX` decoding), literal and hex strings, and the bare delimiters
//! the object parser assembles into composites.
//!
//! Every combinator here takes and returns a `Span` (a `LocatedSpan`
//! over the document's byte slice) so the object parser can recover
//! the byte offset of any token — the `stream` keyword's offset in
//! particular, since the payload that follows it is located by offset
//! math, not by further parsing.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::digit1;
use nom::combinator::{map, opt, recognize};
use nom::multi::many0;
use nom::sequence::{pair, preceded};
use nom::IResult;
use nom_locate::LocatedSpan;

pub type Span<'a> = LocatedSpan<&'a [u8], &'static str>;

pub fn is_whitespace(b: u8) -> bool {
    matches!(b, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

pub fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

pub fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// Consume whitespace and `%`-comments (but never the leading header
/// comment line, which `header()` handles itself before this is ever
/// called on the rest of the file).
pub fn space(input: Span) -> IResult<Span, ()> {
    let (input, _) = many0(alt((
        take_while1(is_whitespace),
        recognize(pair(tag(b"%".as_slice()), take_while(|b| b != b'\n' && b != b'\r'))),
    )))
    .parse(input)?;
    Ok((input, ()))
}

use nom::Parser;

pub fn integer(input: Span) -> IResult<Span, i64> {
    let (input, sign) = opt(alt((tag(b"+".as_slice()), tag(b"-".as_slice())))).parse(input)?;
    let (input, digits) = digit1(input)?;
    let value: i64 = std::str::from_utf8(digits.fragment())
        .unwrap()
        .parse()
        .unwrap_or(0);
    let value = if sign.map(|s| s.fragment()[0]) == Some(b'-') { -value } else { value };
    Ok((input, value))
}

/// Real numbers: `12.5`, `.5`, `5.`, with an optional sign. Integers
/// are also accepted by this grammar (the object parser tries
/// `integer` first so `90` stays an `Integer`, not a `Real`).
pub fn real(input: Span) -> IResult<Span, f64> {
    let (input, sign) = opt(alt((tag(b"+".as_slice()), tag(b"-".as_slice())))).parse(input)?;
    let (input, whole) = opt(digit1).parse(input)?;
    let (input, frac) = opt(preceded(tag(b".".as_slice()), opt(digit1))).parse(input)?;

    if whole.is_none() && frac.is_none() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    let mut text = String::new();
    if sign.map(|s| s.fragment()[0]) == Some(b'-') {
        text.push('-');
    }
    text.push_str(whole.map(|w| std::str::from_utf8(w.fragment()).unwrap()).unwrap_or("0"));
    if frac.is_some() {
        text.push('.');
        if let Some(Some(digits)) = frac {
            text.push_str(std::str::from_utf8(digits.fragment()).unwrap());
        } else {
            text.push('0');
        }
    }
    let value: f64 = text.parse().unwrap_or(0.0);
    Ok((input, value))
}

/// Decode a `#XX`-escaped name body into raw bytes (leading `/` is
/// stripped by the caller before this runs).
pub fn decode_name_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            if let (Some(hi), Some(lo)) = (hex_value(raw[i + 1]), hex_value(raw[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

pub fn name_body(input: Span) -> IResult<Span, Vec<u8>> {
    let (input, _) = tag(b"/".as_slice()).parse(input)?;
    let (input, raw) = take_while(is_regular).parse(input)?;
    Ok((input, decode_name_escapes(raw.fragment())))
}

/// Literal string `(...)`: balanced parens without escapes counting as
/// nesting, `\` + one of `nrtbf()\`, octal escapes (1-3 digits), and
/// `\` + EOL as a line continuation that is dropped.
pub fn literal_string_body(input: Span) -> IResult<Span, Vec<u8>> {
    let (mut input, _) = tag(b"(".as_slice()).parse(input)?;
    let mut depth = 1i32;
    let mut out = Vec::new();

    loop {
        let bytes = input.fragment();
        if bytes.is_empty() {
            return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof)));
        }
        let b = bytes[0];
        match b {
            b'(' => {
                depth += 1;
                out.push(b);
                input = input.take_from(1);
            }
            b')' => {
                depth -= 1;
                input = input.take_from(1);
                if depth == 0 {
                    break;
                }
                out.push(b);
            }
            b'\\' => {
                input = input.take_from(1);
                let rest = input.fragment();
                if rest.is_empty() {
                    break;
                }
                let esc = rest[0];
                match esc {
                    b'n' => {
                        out.push(b'\n');
                        input = input.take_from(1);
                    }
                    b'r' => {
                        out.push(b'\r');
                        input = input.take_from(1);
                    }
                    b't' => {
                        out.push(b'\t');
                        input = input.take_from(1);
                    }
                    b'b' => {
                        out.push(0x08);
                        input = input.take_from(1);
                    }
                    b'f' => {
                        out.push(0x0c);
                        input = input.take_from(1);
                    }
                    b'(' | b')' | b'\\' => {
                        out.push(esc);
                        input = input.take_from(1);
                    }
                    b'\r' => {
                        input = input.take_from(1);
                        if input.fragment().first() == Some(&b'\n') {
                            input = input.take_from(1);
                        }
                    }
                    b'\n' => {
                        input = input.take_from(1);
                    }
                    b'0'..=b'7' => {
                        let mut value: u32 = 0;
                        let mut count = 0;
                        while count < 3 {
                            match input.fragment().first() {
                                Some(&d) if (b'0'..=b'7').contains(&d) => {
                                    value = value * 8 + (d - b'0') as u32;
                                    input = input.take_from(1);
                                    count += 1;
                                }
                                _ => break,
                            }
                        }
                        out.push((value & 0xff) as u8);
                    }
                    _ => {
                        out.push(esc);
                        input = input.take_from(1);
                    }
                }
            }
            _ => {
                out.push(b);
                input = input.take_from(1);
            }
        }
    }

    Ok((input, out))
}

/// Hex string `<...>`: interior whitespace ignored, odd trailing
/// nibble implicitly followed by `0`.
pub fn hex_string_body(input: Span) -> IResult<Span, Vec<u8>> {
    let (input, _) = tag(b"<".as_slice()).parse(input)?;
    let (input, raw) = take_while(|b| b != b'>').parse(input)?;
    let (input, _) = tag(b">".as_slice()).parse(input)?;

    let mut nibbles = Vec::new();
    for &b in raw.fragment().iter() {
        if is_whitespace(b) {
            continue;
        }
        match hex_value(b) {
            Some(v) => nibbles.push(v),
            None => return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::HexDigit))),
        }
    }
    if nibbles.len() % 2 == 1 {
        nibbles.push(0);
    }
    let bytes = nibbles.chunks_exact(2).map(|pair| (pair[0] << 4) | pair[1]).collect();
    Ok((input, bytes))
}

pub fn keyword<'a>(kw: &'static [u8]) -> impl FnMut(Span<'a>) -> IResult<Span<'a>, Span<'a>> {
    move |input: Span<'a>| tag(kw).parse(input)
}

trait TakeFrom<'a> {
    fn take_from(self, n: usize) -> Self;
}

impl<'a> TakeFrom<'a> for Span<'a> {
    fn take_from(self, n: usize) -> Self {
        self.slice(n..)
    }
}

use nom::Slice;
