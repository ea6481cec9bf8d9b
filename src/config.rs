//! Options structs passed to `load`/`save`. Plain constructible
//! structs rather than a fluent builder, preferring simple constructor
//! functions over a builder API.

use crate::encryption::CryptMethod;

/// Passed to `Document::load_with_options`. `lenient` enables
/// brute-force recovery when the xref chain can't be trusted;
/// `password` supplies credentials for an encrypted file up front.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub lenient: bool,
    pub password: Option<String>,
}

impl LoadOptions {
    pub fn new() -> Self {
        LoadOptions::default()
    }

    pub fn with_password(password: impl Into<String>) -> Self {
        LoadOptions {
            lenient: false,
            password: Some(password.into()),
        }
    }
}

/// A from-scratch encryption configuration for `SaveOptions::encryption`.
/// Only meaningful on a full (non-incremental) save, since adding
/// encryption is itself an incremental-save blocker (`Blocker::EncryptionAdded`).
#[derive(Debug, Clone)]
pub struct NewEncryptionSpec {
    pub owner_password: String,
    pub user_password: String,
    pub method: CryptMethod,
    pub key_length_bits: u32,
}

/// Passed to `Document::save_with_options`. `incremental` selects the
/// append-only path (`Document::incremental_save_blocker` is checked
/// first); `encryption`, when set, (re)encrypts the document as part
/// of a full save.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    pub incremental: bool,
    pub encryption: Option<NewEncryptionSpec>,
}

impl SaveOptions {
    pub fn new() -> Self {
        SaveOptions::default()
    }

    pub fn incremental() -> Self {
        SaveOptions {
            incremental: true,
            encryption: None,
        }
    }
}
