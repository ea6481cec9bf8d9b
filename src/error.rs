use std::fmt;

use crate::object_id::ObjectId;

pub type Result<T> = std::result::Result<T, Error>;

/// Incremental-save blockers, in the fixed priority order defined by
/// `can_save_incrementally()` (linearized > brute-force-recovery >
/// encryption-added > encryption-removed > encryption-changed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Blocker {
    Linearized,
    BruteForceRecovery,
    EncryptionAdded,
    EncryptionRemoved,
    EncryptionChanged,
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Blocker::Linearized => "document is linearized; incremental save would invalidate hint tables",
            Blocker::BruteForceRecovery => {
                "document was recovered via brute-force scan; offsets are synthetic"
            }
            Blocker::EncryptionAdded => "encryption was added since load",
            Blocker::EncryptionRemoved => "encryption was removed since load",
            Blocker::EncryptionChanged => "encryption parameters changed since load",
        };
        f.write_str(s)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid file header")]
    InvalidFileHeader,
    #[error("invalid object")]
    InvalidObject,
    #[error("invalid stream")]
    InvalidStream,
    #[error("invalid xref table")]
    InvalidXref,
    #[error("invalid dictionary")]
    InvalidDictionary,
    #[error("invalid object stream")]
    InvalidObjectStream,
    #[error("unexpected end of input")]
    UnexpectedEof,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefError {
    #[error("could not locate startxref")]
    Start,
    #[error("invalid /Prev offset")]
    PrevStart,
    #[error("invalid /XRefStm offset")]
    StreamStart,
    #[error("malformed cross-reference stream")]
    Parse,
    #[error("cross-reference chain contains a cycle")]
    Cycle,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("incorrect password")]
    InvalidPassword,
    #[error("unsupported security handler: V={v} R={r}")]
    UnsupportedHandler { v: i64, r: i64 },
    #[error("encryption feature not implemented: {0}")]
    Unimplemented(String),
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown filter: {0:?}")]
    UnknownFilter([u8; 16]),
    #[error("malformed filtered data")]
    Malformed,
    #[error("unsupported predictor configuration")]
    BadPredictor,
    #[error("decoding this filter requires delegating to an external codec")]
    RequiresExternalCodec,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Xref(#[from] XrefError),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("object {0:?} not found")]
    ObjectNotFound(ObjectId),

    #[error("reference cycle detected while resolving {0:?}")]
    ReferenceCycle(ObjectId),

    #[error("object {0:?} is missing a cross-reference entry")]
    MissingXrefEntry(ObjectId),

    #[error("wrong object type: expected {expected}, found {found}")]
    WrongObjectType { expected: &'static str, found: &'static str },

    #[error("invalid offset {0}")]
    InvalidOffset(usize),

    #[error("numeric cast failed: {0}")]
    NumericCast(String),

    #[error("unsupported feature: {0}")]
    Unsupported(&'static str),

    #[error("incremental save is blocked: {0}")]
    IncrementalSaveBlocked(Blocker),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}
