//! Compressed objects (`/Type /ObjStm`): a stream whose decompressed
//! body is `/N` header pairs (`object_number offset`, offsets relative
//! to `/First`) followed by the object values themselves, each parsed
//! with the generic value grammar (no `N G obj`/`endobj` framing,
//! since compressed objects can't themselves be streams or have their
//! own generation).

use std::collections::BTreeMap;

use crate::error::{ParseError, Result};
use crate::object::Object;
use crate::object_id::ObjectId;
use crate::parser;
use crate::stream::Stream;

#[derive(Debug, Clone)]
pub struct ObjectStream {
    pub objects: BTreeMap<u32, Object>,
}

impl ObjectStream {
    pub fn new(stream: &mut Stream) -> Result<Self> {
        let n = stream.dict.get(b"N").and_then(Object::as_i64).map_err(|_| ParseError::InvalidObjectStream)? as usize;
        let first = stream.dict.get(b"First").and_then(Object::as_i64).map_err(|_| ParseError::InvalidObjectStream)? as usize;

        let data = stream.decompressed_content()?;
        let header = &data[..first.min(data.len())];

        let mut offsets = Vec::with_capacity(n);
        let mut rest = parser::input(header, "objstm header");
        for _ in 0..n {
            let (next, num) = nom::character::complete::digit1::<_, nom::error::Error<parser::ParserInput>>(rest)
                .map_err(|_| ParseError::InvalidObjectStream)?;
            let (next, _) = nom::bytes::complete::take_while1::<_, _, nom::error::Error<parser::ParserInput>>(|b: u8| {
                matches!(b, 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
            })
            .parse(next)
            .map_err(|_| ParseError::InvalidObjectStream)?;
            let (next, off) = nom::character::complete::digit1::<_, nom::error::Error<parser::ParserInput>>(next)
                .map_err(|_| ParseError::InvalidObjectStream)?;
            let (next, _) = nom::bytes::complete::take_while::<_, _, nom::error::Error<parser::ParserInput>>(|b: u8| {
                matches!(b, 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
            })
            .parse(next)
            .map_err(|_| ParseError::InvalidObjectStream)?;

            let object_number: u32 = std::str::from_utf8(num.fragment()).unwrap().parse().unwrap_or(0);
            let offset: usize = std::str::from_utf8(off.fragment()).unwrap().parse().unwrap_or(0);
            offsets.push((object_number, offset));
            rest = next;
        }

        let mut objects = BTreeMap::new();
        for (i, &(object_number, offset)) in offsets.iter().enumerate() {
            let start = first + offset;
            if start > data.len() {
                continue;
            }
            let end = offsets.get(i + 1).map(|&(_, next_off)| first + next_off).unwrap_or(data.len());
            let body = &data[start..end.min(data.len())];
            let value_input = parser::input(body, "objstm value");
            match parser::value(value_input) {
                Ok((_, obj)) => {
                    objects.insert(object_number, obj);
                }
                Err(_) => {
                    log::warn!("failed to parse compressed object {} in object stream", object_number);
                }
            }
        }

        Ok(ObjectStream { objects })
    }

    pub fn get(&self, object_number: u32) -> Option<&Object> {
        self.objects.get(&object_number)
    }
}

pub(crate) fn compressed_object_id(container: u32) -> ObjectId {
    (container, 0)
}

use nom::Parser;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionary;

    #[test]
    fn decodes_two_objects() {
        let header = b"1 0 2 4\n";
        let payload = b"<< /A 1 >><< /B 2 >>";
        let mut body = header.to_vec();
        body.extend_from_slice(payload);

        let mut dict = Dictionary::new();
        dict.set(b"N".to_vec(), Object::Integer(2));
        dict.set(b"First".to_vec(), Object::Integer(header.len() as i64));
        dict.set(b"Type".to_vec(), Object::name("ObjStm"));
        let mut stream = Stream::new(dict, body);

        let objstm = ObjectStream::new(&mut stream).unwrap();
        assert_eq!(objstm.get(1).unwrap().as_dict().unwrap().get(b"A").unwrap().as_i64().unwrap(), 1);
        assert_eq!(objstm.get(2).unwrap().as_dict().unwrap().get(b"B").unwrap().as_i64().unwrap(), 2);
    }
}
