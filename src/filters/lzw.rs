//! `LZWDecode`: variable-width (9..12 bit) LZW as used by PDF and
//! TIFF — MSB-first bit packing, code 256 = clear, code 257 = EOD,
//! `/EarlyChange` (default on) switching to the next code width one
//! code early. Delegates the bit-level codec to `weezl`, which has
//! first-class support for this TIFF-flavored variant.

use weezl::{decode::Decoder, encode::Encoder, BitOrder};

use crate::dictionary::Dictionary;
use crate::error::{FilterError, Result};
use crate::object::Object;

const MIN_CODE_SIZE: u8 = 8;

fn early_change(dict: Option<&Dictionary>) -> bool {
    dict.and_then(|d| d.get(b"EarlyChange").ok())
        .and_then(|o| o.as_i64().ok())
        .map(|v| v != 0)
        .unwrap_or(true)
}

pub fn decode(data: &[u8], parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    let mut decoder = Decoder::with_tiff_size_switch(BitOrder::Msb, MIN_CODE_SIZE, early_change(parms));
    let mut out = Vec::new();
    decoder
        .into_stream(&mut out)
        .decode_all(data)
        .status
        .map_err(|_| FilterError::Malformed)?;
    Ok(out)
}

pub fn encode(data: &[u8], parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    let mut encoder = Encoder::with_tiff_size_switch(BitOrder::Msb, MIN_CODE_SIZE, early_change(parms));
    let mut out = Vec::new();
    encoder
        .into_stream(&mut out)
        .encode_all(data)
        .status
        .map_err(|_| FilterError::Malformed)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let plain = b"TOBEORNOTTOBEORTOBEORNOT".to_vec();
        let mut dict = Dictionary::new();
        dict.set(b"EarlyChange".to_vec(), Object::Integer(1));
        let encoded = encode(&plain, Some(&dict)).unwrap();
        let decoded = decode(&encoded, Some(&dict)).unwrap();
        assert_eq!(decoded, plain);
    }
}
