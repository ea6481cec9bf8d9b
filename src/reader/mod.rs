//! Whole-document loading: walk the xref/trailer chain from
//! `startxref` back through every `/Prev`, then materialize every
//! object the merged table names.

mod encrypted;
mod load;
mod metadata;
mod object_loader;

#[cfg(test)]
mod tests;

use std::cmp;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use log::{error, warn};

use crate::document::Document;
use crate::encryption::EncryptionState;
use crate::error::{Error, ParseError, Result, XrefError};
use crate::object::Object;
use crate::object_id::ObjectId;
use crate::object_stream::ObjectStream;
use crate::parser::{self, ParserInput};
use crate::xref::XrefEntry;

pub use metadata::PdfMetadata;

/// Hook a caller can install to inspect (or drop, by returning `None`)
/// each object as it is loaded — used by the higher-level redaction
/// and inspection tools this core is a dependency of.
pub type FilterFunc = fn(ObjectId, &mut Object) -> Option<(ObjectId, Object)>;

pub struct Reader<'a> {
    pub buffer: &'a [u8],
    pub document: Document,
    pub encryption_state: Option<EncryptionState>,
    pub password: Option<String>,
    /// Raw, not-yet-parsed object bytes, populated only on the
    /// encrypted-document path so the encryption dictionary (and then
    /// every other object) can be parsed after the key is known,
    /// rather than attempting to decrypt strings/streams mid-parse.
    pub raw_objects: HashMap<ObjectId, Vec<u8>>,
    /// When `false`, an empty/unreadable cross-reference chain is a
    /// hard error instead of triggering the brute-force `N G obj` scan.
    pub lenient: bool,
}

impl Reader<'_> {
    /// Read the whole document: header, xref/trailer chain, then
    /// every object the merged xref names.
    pub fn read(mut self, filter_func: Option<FilterFunc>) -> Result<Document> {
        let full_buffer = self.buffer;
        let offset = self.buffer.windows(5).position(|w| w == b"%PDF-").unwrap_or(0);
        self.buffer = &self.buffer[offset..];

        let version =
            parser::header(ParserInput::new_extra(self.buffer, "header")).ok_or(ParseError::InvalidFileHeader)?;

        if let Some(pos) = self.buffer.iter().position(|&byte| byte == b'\n') {
            if let Some(binary_mark) =
                parser::binary_mark(ParserInput::new_extra(&self.buffer[pos + 1..], "binary_mark"))
            {
                if binary_mark.iter().all(|&byte| byte >= 128) {
                    self.document.binary_mark = binary_mark;
                }
            }
        }

        let xref_start = Self::get_xref_start(self.buffer)?;
        if xref_start > self.buffer.len() {
            return Err(Error::Xref(XrefError::Start));
        }
        self.document.xref_start = xref_start;

        let (mut xref, mut trailer) =
            parser::xref_and_trailer(ParserInput::new_extra(&self.buffer[xref_start..], "xref"), &self)?;

        let mut already_seen = HashSet::new();
        let mut prev_xref_start = trailer.remove(b"Prev");
        while let Some(prev) = prev_xref_start.as_ref().and_then(|offset| offset.as_i64().ok()) {
            if already_seen.contains(&prev) {
                break;
            }
            already_seen.insert(prev);
            if prev < 0 || prev as usize > self.buffer.len() {
                return Err(Error::Xref(XrefError::PrevStart));
            }

            let (prev_xref, mut prev_trailer) =
                parser::xref_and_trailer(ParserInput::new_extra(&self.buffer[prev as usize..], ""), &self)?;
            xref.merge(prev_xref);

            let prev_xref_stream_start = prev_trailer.remove(b"XRefStm");
            if let Some(prev) = prev_xref_stream_start.as_ref().and_then(|offset| offset.as_i64().ok()) {
                if prev < 0 || prev as usize > self.buffer.len() {
                    return Err(Error::Xref(XrefError::StreamStart));
                }
                let (prev_xref, _) =
                    parser::xref_and_trailer(ParserInput::new_extra(&self.buffer[prev as usize..], ""), &self)?;
                xref.merge(prev_xref);
            }

            prev_xref_start = prev_trailer.get(b"Prev").ok().cloned();
        }

        if xref.is_empty() && !self.lenient {
            return Err(Error::Xref(XrefError::Parse));
        }
        if xref.is_empty() {
            warn!("cross-reference table is empty or unreadable; recovering by brute-force scan");
            xref = self.brute_force_recover();
            self.document.recovered = true;
            if trailer.get(b"Root").is_err() {
                trailer = self.recover_trailer(&xref)?;
            }
        }

        let xref_entry_count = xref.max_id().checked_add(1).ok_or(ParseError::InvalidXref)?;
        if xref.size != xref_entry_count {
            warn!("Size entry of trailer dictionary is {}, correct value is {}.", xref.size, xref_entry_count);
            xref.size = xref_entry_count;
        }

        self.document.version = version;
        self.document.max_id = xref.size.saturating_sub(1);
        self.document.trailer = trailer;
        self.document.reference_table = xref;
        self.document.was_linearized = self.detect_linearized();

        let is_encrypted = self.document.trailer.get(b"Encrypt").is_ok();
        self.document.encrypted_at_load = is_encrypted;
        if is_encrypted {
            self.load_encrypted_document(filter_func)?;
        } else {
            self.load_objects_raw(filter_func)?;
        }

        self.document.clear_all_dirty_flags();
        self.document.source_bytes = Some(full_buffer.to_vec());
        Ok(self.document)
    }

    fn load_objects_raw(&mut self, filter_func: Option<FilterFunc>) -> Result<()> {
        let is_encrypted = self.document.trailer.get(b"Encrypt").is_ok();
        let zero_length_streams = Mutex::new(vec![]);
        let object_streams = Mutex::new(vec![]);

        let entries_filter_map = |(_, entry): (&_, &_)| {
            if let XrefEntry::Normal { offset, .. } = *entry {
                let result = self.read_object(offset as usize, None, &mut HashSet::new());
                let (object_id, mut object) = match result {
                    Ok(obj) => obj,
                    Err(e) => {
                        if is_encrypted {
                            warn!("skipping encrypted object at offset {offset}: {e:?}");
                        } else {
                            error!("object load error at offset {offset}: {e:?}");
                        }
                        return None;
                    }
                };
                if let Some(filter_func) = filter_func {
                    filter_func(object_id, &mut object)?;
                }

                if let Ok(stream) = object.as_stream_mut() {
                    if stream.is_object_stream() && !is_encrypted {
                        if let Ok(obj_stream) = ObjectStream::new(stream) {
                            let mut object_streams = object_streams.lock().expect("object_streams mutex poisoned");
                            object_streams.extend(obj_stream.objects.into_iter().map(|(n, o)| ((n, 0), o)));
                        }
                    } else if stream.raw_content().is_empty() {
                        let mut zero_length_streams =
                            zero_length_streams.lock().expect("zero_length_streams mutex poisoned");
                        zero_length_streams.push(object_id);
                    }
                }

                Some((object_id, object))
            } else {
                None
            }
        };

        #[cfg(feature = "rayon")]
        {
            self.document.objects =
                self.document.reference_table.entries.par_iter().filter_map(entries_filter_map).collect();
        }
        #[cfg(not(feature = "rayon"))]
        {
            self.document.objects =
                self.document.reference_table.entries.iter().filter_map(entries_filter_map).collect();
        }

        // First definition wins for a duplicated object id.
        for (id, entry) in object_streams.into_inner().expect("object_streams mutex poisoned") {
            self.document.objects.entry(id).or_insert(entry);
        }

        for object_id in zero_length_streams.into_inner().expect("zero_length_streams mutex poisoned") {
            let _ = self.read_stream_content(object_id);
        }

        Ok(())
    }

    /// No classical/stream xref could be parsed (or it named no
    /// objects): scan the raw bytes for `N G obj` headers directly.
    /// Offsets recovered this way aren't trustworthy enough for an
    /// incremental save (`Document::recovered` records that).
    fn brute_force_recover(&self) -> crate::xref::Xref {
        let mut xref = crate::xref::Xref::new(0, crate::xref::XrefType::Table);
        let mut pos = 0;
        while pos < self.buffer.len() {
            match Self::search_substring(self.buffer, b" obj", pos) {
                Some(obj_pos) => {
                    let header_start = self.buffer[..obj_pos].iter().rposition(|&b| b == b'\n' || b == b'\r').map(|p| p + 1).unwrap_or(0);
                    let header = &self.buffer[header_start..obj_pos];
                    let mut parts = header.rsplit(|&b| b == b' ');
                    let gen = parts.next().and_then(|p| std::str::from_utf8(p).ok()).and_then(|s| s.parse::<u16>().ok());
                    let num = parts.next().and_then(|p| std::str::from_utf8(p).ok()).and_then(|s| s.parse::<u32>().ok());
                    if let (Some(num), Some(gen)) = (num, gen) {
                        xref.insert(num, XrefEntry::Normal { offset: header_start as u32, generation: gen });
                        xref.size = xref.size.max(num + 1);
                    }
                    pos = obj_pos + 4;
                }
                None => break,
            }
        }
        xref
    }

    fn recover_trailer(&self, xref: &crate::xref::Xref) -> Result<crate::dictionary::Dictionary> {
        for (&number, entry) in xref.entries.iter() {
            if let XrefEntry::Normal { offset, generation } = *entry {
                if let Ok((_, Object::Dictionary(dict))) =
                    self.read_object(offset as usize, Some((number, generation)), &mut HashSet::new())
                {
                    if dict.has_type(b"Catalog") {
                        let mut trailer = crate::dictionary::Dictionary::new();
                        trailer.set(b"Root".to_vec(), Object::reference((number, generation)));
                        return Ok(trailer);
                    }
                }
            }
        }
        Err(Error::Xref(XrefError::Parse))
    }

    /// Cheap linearization check: the first object in the file is a
    /// dictionary carrying `/Linearized`.
    fn detect_linearized(&self) -> bool {
        let mut already_seen = HashSet::new();
        matches!(
            self.read_object(0, None, &mut already_seen),
            Ok((_, Object::Dictionary(d))) if d.has(b"Linearized")
        )
    }

    fn get_xref_start(buffer: &[u8]) -> Result<usize> {
        let seek_pos = buffer.len() - cmp::min(buffer.len(), 1024);
        Self::search_substring(buffer, b"%%EOF", seek_pos)
            .and_then(|eof_pos| if eof_pos > 9 { Some(eof_pos) } else { None })
            .and_then(|eof_pos| Self::search_substring(buffer, b"startxref", eof_pos.saturating_sub(40)))
            .ok_or(Error::Xref(XrefError::Start))
            .and_then(|xref_pos| {
                if xref_pos <= buffer.len() {
                    match parser::xref_start(ParserInput::new_extra(&buffer[xref_pos..], "xref")) {
                        Some(startxref) => Ok(startxref as usize),
                        None => Err(Error::Xref(XrefError::Start)),
                    }
                } else {
                    Err(Error::Xref(XrefError::Start))
                }
            })
    }

    pub(crate) fn search_substring(buffer: &[u8], pattern: &[u8], start_pos: usize) -> Option<usize> {
        buffer.get(start_pos..)?.windows(pattern.len()).rposition(|window| window == pattern).map(|pos| start_pos + pos)
    }
}
