//! Image codecs the core only detects and delegates: `CCITTFaxDecode`
//! (Group 3/4 fax), `DCTDecode` (JPEG), `JPXDecode` (JPEG 2000),
//! `JBIG2Decode`. Actually decoding pixels is out of scope; the
//! pipeline must still preserve the raw bytes so a
//! caller who does have a codec (or who only wants to move the stream
//! unchanged, e.g. the object copier) gets exactly what was on disk.

use crate::error::Result;

/// Identity transform: hands the bytes back unchanged. `decode` and
/// `encode` are the same function because there is nothing to invert
/// — the filter chain simply can't compress/decompress these formats
/// itself.
pub fn passthrough(data: &[u8]) -> Result<Vec<u8>> {
    Ok(data.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_is_exact() {
        let data = vec![0xff, 0xd8, 0xff, 0xe0, 1, 2, 3];
        assert_eq!(passthrough(&data).unwrap(), data);
    }
}
