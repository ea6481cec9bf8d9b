//! The standard security handler: key derivation (Algorithms 2 and
//! 2.A of ISO 32000), per-object key derivation (Algorithm 1), and
//! object decryption for RC4 and AES-CBC crypt filters.
//!
//! Only the standard handler is implemented (`/Filter /Standard`);
//! custom security handlers are out of scope.

mod pkcs5;
mod rc4;

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use md5::{Digest, Md5};
use rand::RngCore;
use sha2::Sha256;

use crate::dictionary::Dictionary;
use crate::document::Document;
use crate::error::DecryptionError;
use crate::object::{Object, StringFormat};
use crate::object_id::ObjectId;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

/// The 32-byte padding string Algorithm 2 pads/truncates the password
/// with (ISO 32000-1 Table 21).
const PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08, 0x2E, 0x2E, 0x00,
    0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptMethod {
    Rc4,
    AesV2,
    AesV3,
}

/// The resolved encryption parameters for a document: the file
/// encryption key plus enough of `/Encrypt` to know how to combine it
/// with an object id (Algorithm 1) and which cipher to run.
#[derive(Debug, Clone)]
pub struct EncryptionState {
    pub key: Vec<u8>,
    pub v: i64,
    pub r: i64,
    pub method: CryptMethod,
    pub encrypt_metadata: bool,
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let take = password.len().min(32);
    padded[..take].copy_from_slice(&password[..take]);
    padded[take..].copy_from_slice(&PAD[..32 - take]);
    padded
}

fn encrypt_dict(document: &Document) -> Result<Dictionary, DecryptionError> {
    let encrypt = document
        .trailer
        .get(b"Encrypt")
        .map_err(|_| DecryptionError::UnsupportedHandler { v: 0, r: 0 })?;
    match encrypt {
        Object::Dictionary(d) => Ok(d.clone()),
        Object::Reference(r) => document
            .get_dictionary(r.id())
            .cloned()
            .map_err(|_| DecryptionError::UnsupportedHandler { v: 0, r: 0 }),
        _ => Err(DecryptionError::UnsupportedHandler { v: 0, r: 0 }),
    }
}

fn first_id_bytes(document: &Document) -> Vec<u8> {
    document
        .trailer
        .get(b"ID")
        .ok()
        .and_then(|id| id.as_array().ok())
        .and_then(|arr| arr.get(0))
        .and_then(|first| first.as_str().ok())
        .map(|b| b.to_vec())
        .unwrap_or_default()
}

/// Algorithm 2: compute the file encryption key from the (padded)
/// password, `/O`, `/P`, the first `/ID` element, and, for R>=4 with
/// metadata left unencrypted, an extra all-ones marker.
fn compute_key_r2_r4(
    password: &[u8], o: &[u8], p: i32, id0: &[u8], r: i64, key_length: usize, encrypt_metadata: bool,
) -> Vec<u8> {
    let padded = pad_password(password);
    let mut hasher = Md5::new();
    hasher.update(padded);
    hasher.update(&o[..o.len().min(32)]);
    hasher.update(p.to_le_bytes());
    hasher.update(id0);
    if r >= 4 && !encrypt_metadata {
        hasher.update([0xff, 0xff, 0xff, 0xff]);
    }
    let mut digest = hasher.finalize().to_vec();

    if r >= 3 {
        for _ in 0..50 {
            let mut h = Md5::new();
            h.update(&digest[..key_length]);
            digest = h.finalize().to_vec();
        }
    }
    digest.truncate(key_length);
    digest
}

/// R5/R6 (AES-256) password check and key recovery. `/U` is 48 bytes:
/// a 32-byte hash, an 8-byte validation salt, and an 8-byte key salt.
/// The password is correct if `SHA-256(password || validation_salt)`
/// matches the hash; the file key is then `UE` decrypted with
/// `SHA-256(password || key_salt)` as an AES-256-CBC key (zero IV, no
/// padding). The R6 hash-hardening loop (Algorithm 2.B, repeated
/// SHA-256/384/512 rounds) is not implemented, so an R6 password
/// chosen specifically to defeat the single-round hash would be
/// accepted here when it shouldn't be; tracked in DESIGN.md.
fn compute_key_r5_r6(password: &[u8], u: &[u8], ue: &[u8]) -> Result<Vec<u8>, DecryptionError> {
    if u.len() < 48 {
        return Err(DecryptionError::InvalidPassword);
    }
    let validation_salt = &u[32..40];
    let key_salt = &u[40..48];

    let mut validation = Sha256::new();
    validation.update(password);
    validation.update(validation_salt);
    if validation.finalize().as_slice() != &u[..32] {
        return Err(DecryptionError::InvalidPassword);
    }

    let mut intermediate = Sha256::new();
    intermediate.update(password);
    intermediate.update(key_salt);
    let intermediate_key = intermediate.finalize();

    if ue.len() != 32 {
        return Err(DecryptionError::Unimplemented("/UE must be 32 bytes".into()));
    }
    let cipher = cbc::Decryptor::<aes::Aes256>::new_from_slices(&intermediate_key, &[0u8; 16])
        .map_err(|e| DecryptionError::Unimplemented(format!("bad /UE key: {e}")))?;
    let mut buf = ue.to_vec();
    cipher
        .decrypt_padded_mut::<aes::cipher::block_padding::NoPadding>(&mut buf)
        .map(|key| key.to_vec())
        .map_err(|e| DecryptionError::Unimplemented(format!("/UE decrypt failed: {e}")))
}

impl EncryptionState {
    pub fn decode(document: &Document, password: &str) -> Result<EncryptionState, DecryptionError> {
        let dict = encrypt_dict(document)?;
        let filter = dict.get(b"Filter").and_then(Object::as_name).unwrap_or(b"Standard");
        if filter != b"Standard" {
            return Err(DecryptionError::UnsupportedHandler { v: -1, r: -1 });
        }

        let v = dict.get(b"V").and_then(Object::as_i64).unwrap_or(0);
        let r = dict.get(b"R").and_then(Object::as_i64).unwrap_or(2);
        let o = dict.get(b"O").and_then(Object::as_str).unwrap_or(&[]).to_vec();
        let u = dict.get(b"U").and_then(Object::as_str).unwrap_or(&[]).to_vec();
        let p = dict.get(b"P").and_then(Object::as_i64).unwrap_or(0) as i32;
        let encrypt_metadata = dict.get(b"EncryptMetadata").and_then(Object::as_bool).unwrap_or(true);

        let method = if v >= 5 {
            CryptMethod::AesV3
        } else if v == 4 {
            crypt_filter_method(&dict)
        } else {
            CryptMethod::Rc4
        };

        if r >= 5 {
            let ue = dict.get(b"UE").and_then(Object::as_str).unwrap_or(&[]).to_vec();
            let key = compute_key_r5_r6(password.as_bytes(), &u, &ue)?;
            return Ok(EncryptionState { key, v, r, method, encrypt_metadata });
        }

        let key_length = dict.get(b"Length").and_then(Object::as_i64).map(|bits| (bits / 8) as usize).unwrap_or(5);
        let id0 = first_id_bytes(document);
        let key = compute_key_r2_r4(password.as_bytes(), &o, p, &id0, r, key_length, encrypt_metadata);
        let candidate = EncryptionState { key, v, r, method, encrypt_metadata };
        if verify_user_password_r2_r4(document, &candidate, &u, r)? {
            Ok(candidate)
        } else {
            Err(DecryptionError::InvalidPassword)
        }
    }
}

fn crypt_filter_method(dict: &Dictionary) -> CryptMethod {
    let cfm = dict
        .get(b"CF")
        .and_then(Object::as_dict)
        .and_then(|cf| cf.get(b"StdCF"))
        .and_then(Object::as_dict)
        .and_then(|std_cf| std_cf.get(b"CFM"))
        .and_then(Object::as_name);
    match cfm {
        Ok(b"AESV2") => CryptMethod::AesV2,
        Ok(b"AESV3") => CryptMethod::AesV3,
        _ => CryptMethod::Rc4,
    }
}

/// Algorithm 6: recompute what `/U` should be from the candidate file
/// key and compare. R2 compares the full 32 bytes of
/// RC4(key, padding); R3/R4 compare only the first 16 bytes of the
/// scrambled MD5-then-19-rounds-RC4 result.
fn verify_user_password_r2_r4(document: &Document, state: &EncryptionState, u: &[u8], r: i64) -> Result<bool, DecryptionError> {
    let id0 = first_id_bytes(document);
    let computed_u = if r == 2 {
        rc4::apply(&state.key, &PAD)
    } else {
        let mut hasher = Md5::new();
        hasher.update(PAD);
        hasher.update(&id0);
        let mut digest = hasher.finalize().to_vec();
        digest = rc4::apply(&state.key, &digest);
        for i in 1u8..=19 {
            let round_key: Vec<u8> = state.key.iter().map(|b| b ^ i).collect();
            digest = rc4::apply(&round_key, &digest);
        }
        digest
    };

    let expected_len = if r == 2 { 32 } else { 16 };
    Ok(u.len() >= expected_len && computed_u[..expected_len.min(computed_u.len())] == u[..expected_len])
}

/// Algorithm 1: derive the per-object key by extending the file key
/// with the object number (low 3 bytes, LE) and generation (low 2
/// bytes, LE), hashing with MD5, and truncating to `key_length + 5`
/// (max 16). AESV2 additionally mixes in the literal bytes `sAlT`.
fn object_key(state: &EncryptionState, id: ObjectId) -> Vec<u8> {
    if state.v >= 5 {
        return state.key.clone();
    }
    let mut hasher = Md5::new();
    hasher.update(&state.key);
    hasher.update(id.0.to_le_bytes()[..3].to_vec());
    hasher.update(id.1.to_le_bytes()[..2].to_vec());
    if state.method == CryptMethod::AesV2 {
        hasher.update(b"sAlT");
    }
    let digest = hasher.finalize();
    let len = (state.key.len() + 5).min(16);
    digest[..len].to_vec()
}

fn decrypt_bytes(state: &EncryptionState, id: ObjectId, data: &[u8]) -> Result<Vec<u8>, DecryptionError> {
    match state.method {
        CryptMethod::Rc4 => Ok(rc4::apply(&object_key(state, id), data)),
        CryptMethod::AesV2 => aes_cbc_decrypt::<Aes128CbcDec>(&object_key(state, id), data),
        CryptMethod::AesV3 => aes_cbc_decrypt::<Aes256CbcDec>(&object_key(state, id), data),
    }
}

fn aes_cbc_decrypt<C>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, DecryptionError>
where
    C: KeyIvInit + BlockDecryptMut,
{
    if data.len() < 16 {
        return Err(DecryptionError::Unimplemented("AES payload shorter than one IV block".into()));
    }
    let (iv, ciphertext) = data.split_at(16);
    let cipher = C::new_from_slices(key, iv)
        .map_err(|e| DecryptionError::Unimplemented(format!("bad AES key/iv length: {e}")))?;
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_padded_mut::<pkcs5::Pkcs5>(&mut buffer)
        .map(|plain| plain.to_vec())
        .map_err(|e| DecryptionError::Unimplemented(format!("AES padding error: {e}")))
}

/// Decrypt every string and stream payload reachable from `obj`
/// in-place, recursing through dicts/arrays but not through
/// references (those are separate indirect objects, decrypted with
/// their own per-object key when they are themselves loaded). A
/// signature dictionary's (`/Type /Sig` or `/DocTimeStamp`) `/Contents`
/// entry is left untouched: it holds the raw signature bytes, not PDF
/// string data, and is exempt from encryption same as `/Encrypt` and
/// `/ID`.
pub fn decrypt_object(state: &EncryptionState, id: ObjectId, obj: &mut Object) -> Result<(), DecryptionError> {
    match obj {
        Object::String(bytes, _) => {
            *bytes = decrypt_bytes(state, id, bytes)?;
        }
        Object::Array(arr) => {
            for item in arr.iter_mut() {
                decrypt_object(state, id, item)?;
            }
        }
        Object::Dictionary(dict) => {
            let signature = dict.has_type(b"Sig") || dict.has_type(b"DocTimeStamp");
            for (key, value) in dict.iter_mut() {
                if signature && key.as_slice() == b"Contents" {
                    continue;
                }
                decrypt_object(state, id, value)?;
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                decrypt_object(state, id, value)?;
            }
            let plain = decrypt_bytes(state, id, stream.raw_content())?;
            stream.set_content(plain);
        }
        _ => {}
    }
    Ok(())
}

/// Algorithm 3: compute `/O` from the (possibly empty, in which case
/// the user password stands in for it) owner password and the user
/// password.
fn compute_o(owner_password: &[u8], user_password: &[u8], r: i64, key_length: usize) -> Vec<u8> {
    let owner_or_user = if owner_password.is_empty() { user_password } else { owner_password };
    let mut hasher = Md5::new();
    hasher.update(pad_password(owner_or_user));
    let mut digest = hasher.finalize().to_vec();
    if r >= 3 {
        for _ in 0..50 {
            let mut h = Md5::new();
            h.update(&digest[..key_length]);
            digest = h.finalize().to_vec();
        }
    }
    let owner_key = digest[..key_length].to_vec();
    let mut o = rc4::apply(&owner_key, &pad_password(user_password));
    if r >= 3 {
        for i in 1u8..=19 {
            let round_key: Vec<u8> = owner_key.iter().map(|b| b ^ i).collect();
            o = rc4::apply(&round_key, &o);
        }
    }
    o
}

/// Algorithms 4/5: compute `/U` from the already-derived file key,
/// mirroring `verify_user_password_r2_r4`'s recomputation exactly so
/// a freshly written file authenticates with the password it was
/// just encrypted under.
fn compute_u(key: &[u8], id0: &[u8], r: i64) -> Vec<u8> {
    if r == 2 {
        rc4::apply(key, &PAD)
    } else {
        let mut hasher = Md5::new();
        hasher.update(PAD);
        hasher.update(id0);
        let mut digest = hasher.finalize().to_vec();
        digest = rc4::apply(key, &digest);
        for i in 1u8..=19 {
            let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            digest = rc4::apply(&round_key, &digest);
        }
        digest.resize(32, 0);
        digest
    }
}

/// A from-scratch standard-security-handler setup: the resolved
/// `EncryptionState` a save pass encrypts new/changed objects with,
/// plus the `/Encrypt` dictionary to store in the trailer. R5/R6
/// (AES-256) creation is not implemented — only decoding an
/// already-R5/R6-encrypted file is supported — so `AesV3` is
/// rejected here rather than producing a dictionary this crate can't
/// also read back.
pub fn setup_new_encryption(
    owner_password: &str, user_password: &str, method: CryptMethod, key_length_bits: u32, id0: &[u8],
) -> Result<(EncryptionState, Dictionary), DecryptionError> {
    if method == CryptMethod::AesV3 {
        return Err(DecryptionError::Unimplemented("creating R5/R6 (AES-256) encryption".into()));
    }
    let key_length = (key_length_bits / 8).max(5) as usize;
    let (v, r) = match method {
        CryptMethod::Rc4 if key_length <= 5 => (1, 2),
        CryptMethod::Rc4 => (2, 3),
        CryptMethod::AesV2 => (4, 4),
        CryptMethod::AesV3 => unreachable!(),
    };

    let o = compute_o(owner_password.as_bytes(), user_password.as_bytes(), r, key_length);
    let p: i32 = -4; // reserved bits set, every standard permission granted
    let key = compute_key_r2_r4(user_password.as_bytes(), &o, p, id0, r, key_length, true);
    let u = compute_u(&key, id0, r);

    let mut dict = Dictionary::new();
    dict.set(b"Filter".to_vec(), Object::name(b"Standard".to_vec()));
    dict.set(b"V".to_vec(), Object::Integer(v));
    dict.set(b"R".to_vec(), Object::Integer(r));
    dict.set(b"O".to_vec(), Object::String(o, StringFormat::Hex));
    dict.set(b"U".to_vec(), Object::String(u, StringFormat::Hex));
    dict.set(b"P".to_vec(), Object::Integer(p as i64));
    dict.set(b"Length".to_vec(), Object::Integer(key_length_bits as i64));

    if method == CryptMethod::AesV2 {
        let mut std_cf = Dictionary::new();
        std_cf.set(b"CFM".to_vec(), Object::name(b"AESV2".to_vec()));
        std_cf.set(b"AuthEvent".to_vec(), Object::name(b"DocOpen".to_vec()));
        std_cf.set(b"Length".to_vec(), Object::Integer((key_length_bits / 8) as i64));
        let mut cf = Dictionary::new();
        cf.set(b"StdCF".to_vec(), Object::Dictionary(std_cf));
        dict.set(b"CF".to_vec(), Object::Dictionary(cf));
        dict.set(b"StmF".to_vec(), Object::name(b"StdCF".to_vec()));
        dict.set(b"StrF".to_vec(), Object::name(b"StdCF".to_vec()));
    }

    Ok((EncryptionState { key, v, r, method, encrypt_metadata: true }, dict))
}

fn encrypt_bytes(state: &EncryptionState, id: ObjectId, data: &[u8]) -> Result<Vec<u8>, DecryptionError> {
    match state.method {
        CryptMethod::Rc4 => Ok(rc4::apply(&object_key(state, id), data)),
        CryptMethod::AesV2 => aes_cbc_encrypt::<Aes128CbcEnc>(&object_key(state, id), data),
        CryptMethod::AesV3 => Err(DecryptionError::Unimplemented("encrypting under AESV3".into())),
    }
}

fn aes_cbc_encrypt<C>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, DecryptionError>
where
    C: KeyIvInit + BlockEncryptMut,
{
    let mut iv = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    let cipher = C::new_from_slices(key, &iv).map_err(|e| DecryptionError::Unimplemented(format!("bad AES key/iv length: {e}")))?;
    let mut out = iv.to_vec();
    out.extend(cipher.encrypt_padded_vec_mut::<pkcs5::Pkcs5>(data));
    Ok(out)
}

/// Encrypt every string and stream payload reachable from `obj`
/// in-place; the mirror image of `decrypt_object`, used by a full
/// save that writes under a newly configured `EncryptionState`.
pub fn encrypt_object(state: &EncryptionState, id: ObjectId, obj: &mut Object) -> Result<(), DecryptionError> {
    match obj {
        Object::String(bytes, _) => {
            *bytes = encrypt_bytes(state, id, bytes)?;
        }
        Object::Array(arr) => {
            for item in arr.iter_mut() {
                encrypt_object(state, id, item)?;
            }
        }
        Object::Dictionary(dict) => {
            let signature = dict.has_type(b"Sig") || dict.has_type(b"DocTimeStamp");
            for (key, value) in dict.iter_mut() {
                if signature && key.as_slice() == b"Contents" {
                    continue;
                }
                encrypt_object(state, id, value)?;
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                encrypt_object(state, id, value)?;
            }
            let cipher = encrypt_bytes(state, id, stream.raw_content())?;
            stream.set_content(cipher);
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_differs_by_id() {
        let state = EncryptionState {
            key: vec![1, 2, 3, 4, 5],
            v: 2,
            r: 3,
            method: CryptMethod::Rc4,
            encrypt_metadata: true,
        };
        let k1 = object_key(&state, (1, 0));
        let k2 = object_key(&state, (2, 0));
        assert_ne!(k1, k2);
    }

    #[test]
    fn signature_contents_is_exempt_from_decryption_and_encryption() {
        let state = EncryptionState {
            key: vec![1, 2, 3, 4, 5],
            v: 2,
            r: 3,
            method: CryptMethod::Rc4,
            encrypt_metadata: true,
        };
        let raw_signature = vec![0xAB; 16];

        let mut sig_dict = Dictionary::new();
        sig_dict.set(b"Type".to_vec(), Object::name(b"Sig".to_vec()));
        sig_dict.set(b"Contents".to_vec(), Object::String(raw_signature.clone(), StringFormat::Hex));
        sig_dict.set(b"Reason".to_vec(), Object::string_literal(b"because".to_vec()));
        let mut obj = Object::Dictionary(sig_dict);

        encrypt_object(&state, (1, 0), &mut obj).unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get(b"Contents").unwrap(), &Object::String(raw_signature.clone(), StringFormat::Hex));
        assert_ne!(dict.get(b"Reason").unwrap(), &Object::string_literal(b"because".to_vec()));

        decrypt_object(&state, (1, 0), &mut obj).unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get(b"Contents").unwrap(), &Object::String(raw_signature, StringFormat::Hex));
        assert_eq!(dict.get(b"Reason").unwrap(), &Object::string_literal(b"because".to_vec()));
    }

    #[test]
    fn r2_key_derivation_is_deterministic() {
        let a = compute_key_r2_r4(b"pw", b"owner-hash", 0, b"id0", 2, 5, true);
        let b = compute_key_r2_r4(b"pw", b"owner-hash", 0, b"id0", 2, 5, true);
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
    }
}
