use std::collections::{HashMap, HashSet};

use log::warn;

use super::{FilterFunc, Reader};
use crate::encryption::{self, EncryptionState};
use crate::error::{DecryptionError, Error, ParseError, Result};
use crate::object::Object;
use crate::object_id::ObjectId;
use crate::object_stream::ObjectStream;
use crate::parser::{self, ParserInput};
use crate::xref::XrefEntry;

impl Reader<'_> {
    /// Encrypted documents can't be parsed object-by-object the
    /// normal way: a stream's `/Length` or a string's contents may
    /// themselves need the file key before they parse as valid PDF
    /// syntax, so every object's raw bytes are captured first and
    /// only decrypted-and-reparsed once the password has been
    /// authenticated.
    pub(super) fn load_encrypted_document(&mut self, _filter_func: Option<FilterFunc>) -> Result<()> {
        let entries: Vec<_> = self.document.reference_table.entries.iter().map(|(k, v)| (*k, *v)).collect();

        let mut object_streams = Vec::new();
        for (obj_num, entry) in entries {
            match entry {
                XrefEntry::Normal { offset, .. } => {
                    if let Ok((obj_id, raw_bytes)) = self.extract_raw_object(offset as usize) {
                        self.raw_objects.insert(obj_id, raw_bytes);
                    }
                }
                XrefEntry::Compressed { container, index } => {
                    object_streams.push((obj_num, container, index));
                }
                XrefEntry::Free { .. } | XrefEntry::UnusableFree => {}
            }
        }

        self.parse_encryption_dictionary()?;
        if self.authenticate_and_setup_encryption(false)?.is_none() {
            return Ok(());
        }

        let state = self.encryption_state.clone().expect("encryption state set by authenticate step");
        let encrypt_ref = self.document.trailer.get(b"Encrypt").ok().and_then(|o| o.as_reference().ok());

        for (obj_id, raw_bytes) in self.raw_objects.clone() {
            if Some(obj_id) == encrypt_ref {
                continue;
            }
            if let Ok((id, mut obj)) = self.parse_raw_object(&raw_bytes) {
                let _ = encryption::decrypt_object(&state, obj_id, &mut obj);
                self.document.objects.insert(id, obj);
            }
        }

        let mut streams_to_process: HashMap<u32, Vec<(u32, u16)>> = HashMap::new();
        for (obj_num, container_id, index) in object_streams {
            streams_to_process.entry(container_id).or_default().push((obj_num, index));
        }

        for (container_id, objects_in_stream) in streams_to_process {
            if let Some(container_obj) = self.document.objects.get_mut(&(container_id, 0)) {
                if let Ok(stream) = container_obj.as_stream_mut() {
                    if let Ok(object_stream) = ObjectStream::new(stream) {
                        for (obj_num, _index) in objects_in_stream {
                            if let Some(obj) = object_stream.get(obj_num) {
                                self.document.objects.insert((obj_num, 0), obj.clone());
                            }
                        }
                    }
                }
            }
        }

        self.document.encryption_state = Some(state);
        if let Some(enc_ref) = encrypt_ref {
            self.document.objects.remove(&enc_ref);
        }
        self.document.trailer.remove(b"Encrypt");

        Ok(())
    }

    pub(super) fn parse_raw_object(&self, raw_bytes: &[u8]) -> Result<(ObjectId, Object)> {
        parser::indirect_object(ParserInput::new_extra(raw_bytes, "indirect object"), 0, None, self, &mut HashSet::new())
    }

    pub(super) fn parse_encryption_dictionary(&mut self) -> Result<()> {
        if let Ok(encrypt_ref) = self.document.trailer.get(b"Encrypt").and_then(|o| o.as_reference()) {
            if self.raw_objects.is_empty() {
                let offset = self.get_offset(encrypt_ref)?;
                let (_, encrypt_obj) = self.read_object(offset as usize, Some(encrypt_ref), &mut HashSet::new())?;
                self.document.objects.insert(encrypt_ref, encrypt_obj);
            } else if let Some(raw_bytes) = self.raw_objects.get(&encrypt_ref) {
                if let Ok((_, obj)) = self.parse_raw_object(raw_bytes) {
                    self.document.objects.insert(encrypt_ref, obj);
                }
            }
        }
        Ok(())
    }

    pub(super) fn authenticate_and_setup_encryption(&mut self, require_password: bool) -> Result<Option<String>> {
        let password_to_use: Option<String> = if self.document.authenticate_password("").is_ok() {
            Some(String::new())
        } else if let Some(ref pwd) = self.password {
            if self.document.authenticate_password(pwd).is_ok() {
                Some(pwd.clone())
            } else if require_password {
                return Err(Error::Decryption(DecryptionError::InvalidPassword));
            } else {
                warn!("invalid password provided for encrypted PDF");
                return Err(Error::Decryption(DecryptionError::InvalidPassword));
            }
        } else if require_password {
            return Err(Error::Decryption(DecryptionError::Unimplemented(
                "document is encrypted and requires a password".into(),
            )));
        } else {
            warn!("PDF is encrypted and requires a password");
            return Ok(None);
        };

        if let Some(ref password) = password_to_use {
            let state = EncryptionState::decode(&self.document, password).map_err(Error::Decryption)?;
            self.encryption_state = Some(state);
        }

        Ok(password_to_use)
    }

    pub(super) fn setup_encryption_for_metadata(&mut self) -> Result<()> {
        self.parse_encryption_dictionary()?;
        self.authenticate_and_setup_encryption(true)?;
        Ok(())
    }

    /// Locate `N G obj ... endobj` starting at `offset` and return the
    /// raw byte span without attempting to parse its contents.
    pub(super) fn extract_raw_object(&mut self, offset: usize) -> Result<(ObjectId, Vec<u8>)> {
        if offset > self.buffer.len() {
            return Err(Error::InvalidOffset(offset));
        }
        let slice = &self.buffer[offset..];

        let mut pos = 0;
        while pos < slice.len() && slice[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let num_start = pos;
        while pos < slice.len() && slice[pos].is_ascii_digit() {
            pos += 1;
        }
        let obj_num: u32 =
            std::str::from_utf8(&slice[num_start..pos]).ok().and_then(|s| s.parse().ok()).ok_or(ParseError::InvalidXref)?;

        while pos < slice.len() && slice[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let gen_start = pos;
        while pos < slice.len() && slice[pos].is_ascii_digit() {
            pos += 1;
        }
        let obj_gen: u16 =
            std::str::from_utf8(&slice[gen_start..pos]).ok().and_then(|s| s.parse().ok()).ok_or(ParseError::InvalidXref)?;

        while pos < slice.len() && slice[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos + 3 > slice.len() || &slice[pos..pos + 3] != b"obj" {
            return Err(ParseError::InvalidXref.into());
        }
        pos += 3;

        let endobj = b"endobj";
        let mut end_pos = pos;
        while end_pos + endobj.len() <= slice.len() {
            if &slice[end_pos..end_pos + endobj.len()] == endobj {
                end_pos += endobj.len();
                break;
            }
            end_pos += 1;
        }
        if end_pos > slice.len() {
            return Err(ParseError::InvalidXref.into());
        }

        Ok(((obj_num, obj_gen), slice[..end_pos].to_vec()))
    }
}
