//! `FlateDecode`: zlib (RFC 1950) framing over DEFLATE, via `flate2`.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{FilterError, Result};

pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|_| FilterError::Malformed)?;
    Ok(out)
}

pub fn encode(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(|_| FilterError::Malformed)?;
    encoder.finish().map_err(|_| FilterError::Malformed.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let plain = b"a repeated repeated repeated payload payload payload".to_vec();
        let compressed = encode(&plain).unwrap();
        assert_ne!(compressed, plain);
        let restored = decode(&compressed).unwrap();
        assert_eq!(restored, plain);
    }
}
