//! The filter registry and the chained decode/encode entry points used
//! by `Stream`.
//!
//! Each filter implements `decode`/`encode` over a byte slice plus an
//! optional params dictionary. `/Filter` may be a single `Name` or an
//! `Array` of names; `/DecodeParms` follows the same shape in lockstep
//! (a missing parms entry for a given filter means "use defaults").
//! `decode_chain` applies filters first-to-last; `encode_chain`
//! applies them last-to-first, so that encoding the output of a
//! decode reproduces the original bytes.

pub mod ascii85;
pub mod asciihex;
pub mod flate;
pub mod image_filters;
pub mod lzw;
pub mod predictor;
pub mod runlength;

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::dictionary::Dictionary;
use crate::error::{FilterError, Result};
use crate::object::Object;

pub type DecodeFn = fn(&[u8], Option<&Dictionary>) -> Result<Vec<u8>>;
pub type EncodeFn = fn(&[u8], Option<&Dictionary>) -> Result<Vec<u8>>;

#[derive(Clone, Copy)]
pub struct FilterImpl {
    pub name: &'static str,
    pub decode: DecodeFn,
    pub encode: EncodeFn,
}

struct Registry {
    filters: Mutex<HashMap<&'static str, FilterImpl>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let registry = Registry {
            filters: Mutex::new(HashMap::new()),
        };
        for builtin in builtin_filters() {
            registry.filters.lock().expect("filter registry poisoned").insert(builtin.name, builtin);
        }
        registry
    })
}

fn builtin_filters() -> Vec<FilterImpl> {
    vec![
        FilterImpl {
            name: "FlateDecode",
            decode: |data, parms| predictor::undo(parms, flate::decode(data)?),
            encode: |data, parms| flate::encode(&predictor::apply(parms, data)?),
        },
        FilterImpl {
            name: "LZWDecode",
            decode: |data, parms| predictor::undo(parms, lzw::decode(data, parms)?),
            encode: |data, parms| lzw::encode(&predictor::apply(parms, data)?, parms),
        },
        FilterImpl {
            name: "ASCII85Decode",
            decode: |data, _| ascii85::decode(data),
            encode: |data, _| Ok(ascii85::encode(data)),
        },
        FilterImpl {
            name: "ASCIIHexDecode",
            decode: |data, _| asciihex::decode(data),
            encode: |data, _| Ok(asciihex::encode(data)),
        },
        FilterImpl {
            name: "RunLengthDecode",
            decode: |data, _| runlength::decode(data),
            encode: |data, _| Ok(runlength::encode(data)),
        },
        FilterImpl {
            name: "CCITTFaxDecode",
            decode: |data, _| image_filters::passthrough(data),
            encode: |data, _| image_filters::passthrough(data),
        },
        FilterImpl {
            name: "DCTDecode",
            decode: |data, _| image_filters::passthrough(data),
            encode: |data, _| image_filters::passthrough(data),
        },
        FilterImpl {
            name: "JPXDecode",
            decode: |data, _| image_filters::passthrough(data),
            encode: |data, _| image_filters::passthrough(data),
        },
        FilterImpl {
            name: "JBIG2Decode",
            decode: |data, _| image_filters::passthrough(data),
            encode: |data, _| image_filters::passthrough(data),
        },
    ]
}

/// Register (or replace) a filter implementation. The registry is
/// process-wide; built-ins are installed once on first use. Tests
/// that want a clean slate may re-register a name to override it.
pub fn register(filter: FilterImpl) {
    registry().filters.lock().expect("filter registry poisoned").insert(filter.name, filter);
}

fn lookup(name: &[u8]) -> Result<FilterImpl> {
    let name = std::str::from_utf8(name).map_err(|_| FilterError::Malformed)?;
    registry()
        .filters
        .lock()
        .expect("filter registry poisoned")
        .get(name)
        .copied()
        .ok_or_else(|| {
            let mut buf = [0u8; 16];
            let n = name.as_bytes().len().min(16);
            buf[..n].copy_from_slice(&name.as_bytes()[..n]);
            FilterError::UnknownFilter(buf)
        })
}

/// Normalize `/Filter` into a `Vec<Name bytes>`, and `/DecodeParms`
/// into one `Option<&Dictionary>` per filter (array lengths must
/// match; a `Null` entry or a shorter parms array means "no params"
/// for that stage).
fn filter_chain<'a>(dict: &'a Dictionary) -> Vec<(&'a [u8], Option<&'a Dictionary>)> {
    let names: Vec<&[u8]> = match dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![n.as_slice()],
        Ok(Object::Array(arr)) => arr.iter().filter_map(|o| o.as_name().ok()).collect(),
        _ => return Vec::new(),
    };

    let parms: Vec<Option<&Dictionary>> = match dict.get(b"DecodeParms").or_else(|_| dict.get(b"DP")) {
        Ok(Object::Dictionary(d)) => vec![Some(d)],
        Ok(Object::Array(arr)) => arr.iter().map(|o| o.as_dict().ok()).collect(),
        _ => Vec::new(),
    };

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name, parms.get(i).copied().flatten()))
        .collect()
}

/// Decode a stream's raw payload through every filter named in
/// `/Filter`, first filter first.
pub fn decode_chain(dict: &Dictionary, raw: &[u8]) -> Result<Vec<u8>> {
    let mut current = raw.to_vec();
    for (name, parms) in filter_chain(dict) {
        let filter = lookup(name)?;
        current = (filter.decode)(&current, parms)?;
    }
    Ok(current)
}

/// Encode plain bytes through every filter named in `/Filter`, last
/// filter first (the inverse order of decoding).
pub fn encode_chain(dict: &Dictionary, plain: &[u8]) -> Result<Vec<u8>> {
    let mut current = plain.to_vec();
    for (name, parms) in filter_chain(dict).into_iter().rev() {
        let filter = lookup(name)?;
        current = (filter.encode)(&current, parms)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_filter_is_reported() {
        let mut dict = Dictionary::new();
        dict.set(b"Filter".to_vec(), Object::name(b"WeirdDecode".to_vec()));
        let err = decode_chain(&dict, b"data").unwrap_err();
        assert!(matches!(err, crate::error::Error::Filter(FilterError::UnknownFilter(_))));
    }

    #[test]
    fn chain_round_trips_flate_then_ascii85() {
        let mut dict = Dictionary::new();
        dict.set(
            b"Filter".to_vec(),
            Object::Array(crate::object::Array::from(vec![
                Object::name(b"ASCII85Decode".to_vec()),
                Object::name(b"FlateDecode".to_vec()),
            ])),
        );
        let plain = b"the quick brown fox jumps over the lazy dog".to_vec();
        let encoded = encode_chain(&dict, &plain).unwrap();
        let decoded = decode_chain(&dict, &encoded).unwrap();
        assert_eq!(decoded, plain);
    }
}
