use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::filters;
use crate::object::Object;

/// A stream object: a dictionary (IS-A dict, per invariant I2) plus a
/// raw byte payload. `dict["Length"]` must equal `content.len()` at
/// serialization time; the writer refreshes it rather than trusting
/// whatever value load-time parsing left behind.
#[derive(Debug, Clone)]
pub struct Stream {
    pub dict: Dictionary,
    content: Vec<u8>,
    /// Byte offset of the payload in the *original* file, recorded by
    /// the parser so zero-length-at-parse-time streams (whose
    /// `/Length` was itself an indirect reference) can be filled in
    /// once the whole xref chain is known.
    pub start_position: Option<usize>,
}

impl Stream {
    pub fn new(mut dict: Dictionary, content: Vec<u8>) -> Self {
        dict.set(b"Length".to_vec(), Object::Integer(content.len() as i64));
        Stream {
            dict,
            content,
            start_position: None,
        }
    }

    /// Construct without touching `/Length`, for the parser, which
    /// fills content in later via `set_content`.
    pub(crate) fn new_raw(dict: Dictionary) -> Self {
        Stream {
            dict,
            content: Vec::new(),
            start_position: None,
        }
    }

    pub fn raw_content(&self) -> &[u8] {
        &self.content
    }

    pub fn set_content(&mut self, content: Vec<u8>) {
        self.dict.set(b"Length".to_vec(), Object::Integer(content.len() as i64));
        self.content = content;
    }

    /// Replace the content and apply the filter chain already present
    /// in the dict's `/Filter`, re-encoding `content` rather than
    /// storing it raw. Used when a caller hands over decoded bytes and
    /// wants the existing compression preserved.
    pub fn set_plain_content(&mut self, plain: Vec<u8>) -> Result<()> {
        let encoded = filters::encode_chain(&self.dict, &plain)?;
        self.set_content(encoded);
        Ok(())
    }

    /// Decode the payload through every filter named in `/Filter`, in
    /// array order, applying the matching `/DecodeParms` entry (and
    /// inverting any predictor) to each stage.
    pub fn decompressed_content(&self) -> Result<Vec<u8>> {
        filters::decode_chain(&self.dict, &self.content)
    }

    /// Decode in place: on success, strips `/Filter` and
    /// `/DecodeParms` and stores the plain bytes, matching the
    /// teacher's `Stream::decompress`. A decode failure for an
    /// external-codec filter (DCT/JPX/JBIG2) leaves the stream
    /// untouched — those filters only detect and delegate, never
    /// decode.
    pub fn decompress(&mut self) {
        if let Ok(plain) = self.decompressed_content() {
            self.content = plain;
            self.dict.remove(b"Filter");
            self.dict.remove(b"DecodeParms");
            self.dict.set(b"Length".to_vec(), Object::Integer(self.content.len() as i64));
        }
    }

    /// Compress the current (assumed-plain) content with FlateDecode,
    /// the inverse of `decompress`.
    pub fn compress(&mut self) -> Result<()> {
        let encoded = filters::flate::encode(&self.content)?;
        self.dict.set(b"Filter".to_vec(), Object::name(b"FlateDecode".to_vec()));
        self.dict.remove(b"DecodeParms");
        self.content = encoded;
        self.dict.set(b"Length".to_vec(), Object::Integer(self.content.len() as i64));
        Ok(())
    }

    pub fn is_object_stream(&self) -> bool {
        self.dict.has_type(b"ObjStm")
    }

    pub fn is_xref_stream(&self) -> bool {
        self.dict.has_type(b"XRef")
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.dict == other.dict && self.content == other.content
    }
}

impl Stream {
    pub fn length(&self) -> Result<i64> {
        self.dict.get(b"Length").and_then(Object::as_i64).map_err(|_| Error::Syntax("missing /Length".into()))
    }
}
