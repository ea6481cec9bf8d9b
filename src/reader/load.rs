use std::convert::TryInto;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::{FilterFunc, PdfMetadata, Reader};
use crate::config::LoadOptions;
use crate::document::Document;
use crate::error::{Error, Result};

impl Document {
    /// Load a PDF document from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Document> {
        let file = File::open(path)?;
        let capacity = Some(file.metadata()?.len() as usize);
        Self::load_internal(file, capacity, None, None, true)
    }

    pub fn load_with_password<P: AsRef<Path>>(path: P, password: &str) -> Result<Document> {
        let file = File::open(path)?;
        let capacity = Some(file.metadata()?.len() as usize);
        Self::load_internal(file, capacity, None, Some(password.to_string()), true)
    }

    pub fn load_filtered<P: AsRef<Path>>(path: P, filter_func: FilterFunc) -> Result<Document> {
        let file = File::open(path)?;
        let capacity = Some(file.metadata()?.len() as usize);
        Self::load_internal(file, capacity, Some(filter_func), None, true)
    }

    /// Load from a file path with an explicit `LoadOptions` (password,
    /// lenience toward an unreadable cross-reference chain).
    pub fn load_with_options<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<Document> {
        let file = File::open(path)?;
        let capacity = Some(file.metadata()?.len() as usize);
        Self::load_internal(file, capacity, None, options.password.clone(), options.lenient)
    }

    pub fn load_from<R: Read>(source: R) -> Result<Document> {
        Self::load_internal(source, None, None, None, true)
    }

    pub fn load_from_with_password<R: Read>(source: R, password: &str) -> Result<Document> {
        Self::load_internal(source, None, None, Some(password.to_string()), true)
    }

    pub fn load_from_with_options<R: Read>(source: R, options: &LoadOptions) -> Result<Document> {
        Self::load_internal(source, None, None, options.password.clone(), options.lenient)
    }

    fn load_internal<R: Read>(
        mut source: R, capacity: Option<usize>, filter_func: Option<FilterFunc>, password: Option<String>, lenient: bool,
    ) -> Result<Document> {
        let mut buffer = capacity.map(Vec::with_capacity).unwrap_or_default();
        source.read_to_end(&mut buffer)?;
        Reader {
            buffer: &buffer,
            document: Document::new(),
            encryption_state: None,
            password,
            raw_objects: Default::default(),
            lenient,
        }
        .read(filter_func)
    }

    /// Load a PDF document already held in memory.
    pub fn load_mem(buffer: &[u8]) -> Result<Document> {
        buffer.try_into()
    }

    pub fn load_mem_with_password(buffer: &[u8], password: &str) -> Result<Document> {
        Reader {
            buffer,
            document: Document::new(),
            encryption_state: None,
            password: Some(password.to_string()),
            raw_objects: Default::default(),
            lenient: true,
        }
        .read(None)
    }

    pub fn load_mem_with_options(buffer: &[u8], options: &LoadOptions) -> Result<Document> {
        Reader {
            buffer,
            document: Document::new(),
            encryption_state: None,
            password: options.password.clone(),
            raw_objects: Default::default(),
            lenient: options.lenient,
        }
        .read(None)
    }

    /// Load just the metadata (`/Info`, page count) without
    /// materializing every object — much cheaper for a large document
    /// when only a summary is needed.
    pub fn load_metadata<P: AsRef<Path>>(path: P) -> Result<PdfMetadata> {
        let file = File::open(path)?;
        let capacity = Some(file.metadata()?.len() as usize);
        Self::load_metadata_internal(file, capacity, None)
    }

    pub fn load_metadata_with_password<P: AsRef<Path>>(path: P, password: &str) -> Result<PdfMetadata> {
        let file = File::open(path)?;
        let capacity = Some(file.metadata()?.len() as usize);
        Self::load_metadata_internal(file, capacity, Some(password.to_string()))
    }

    pub fn load_metadata_from<R: Read>(source: R) -> Result<PdfMetadata> {
        Self::load_metadata_internal(source, None, None)
    }

    pub fn load_metadata_mem(buffer: &[u8]) -> Result<PdfMetadata> {
        Reader {
            buffer,
            document: Document::new(),
            encryption_state: None,
            password: None,
            raw_objects: Default::default(),
            lenient: true,
        }
        .read_metadata()
    }

    pub fn load_metadata_mem_with_password(buffer: &[u8], password: &str) -> Result<PdfMetadata> {
        Reader {
            buffer,
            document: Document::new(),
            encryption_state: None,
            password: Some(password.to_string()),
            raw_objects: Default::default(),
            lenient: true,
        }
        .read_metadata()
    }

    fn load_metadata_internal<R: Read>(mut source: R, capacity: Option<usize>, password: Option<String>) -> Result<PdfMetadata> {
        let mut buffer = capacity.map(Vec::with_capacity).unwrap_or_default();
        source.read_to_end(&mut buffer)?;
        Reader {
            buffer: &buffer,
            document: Document::new(),
            encryption_state: None,
            password,
            raw_objects: Default::default(),
            lenient: true,
        }
        .read_metadata()
    }
}

impl TryInto<Document> for &[u8] {
    type Error = Error;

    fn try_into(self) -> Result<Document> {
        Reader {
            buffer: self,
            document: Document::new(),
            encryption_state: None,
            password: None,
            raw_objects: Default::default(),
            lenient: true,
        }
        .read(None)
    }
}
