//! VNC DES challenge-response authentication, plus the xrdp GUID-derived
//! password variant (spec §4.H step 5, supplemented from
//! `x11vnc.c`'s `rfbEncryptBytes`/`rfbHashEncryptBytes`).

use des::cipher::{BlockEncrypt, KeyInit};
use des::Des;
use sha1::{Digest, Sha1};

use crate::error::{RfbError, Result};

/// Derives the 8-byte DES key from a plaintext password: right-padded with
/// zeros to 8 bytes, truncated if longer (spec §4.H step 5 and the worked
/// example in spec §8 Scenario 2, key `"hello\0\0\0"` for password `"hello"`).
///
/// `x11vnc.c`'s `rfbEncryptBytes` additionally mirrors each key byte's bit
/// order via `g_mirror_memcpy` before use; this implementation follows the
/// spec's literal worked example instead (see DESIGN.md Open Questions).
fn password_key(password: &[u8]) -> [u8; 8] {
    let mut key = [0u8; 8];
    let n = password.len().min(8);
    key[..n].copy_from_slice(&password[..n]);
    key
}

fn encrypt_block(key: &[u8; 8], block: &[u8; 8]) -> [u8; 8] {
    use des::cipher::generic_array::GenericArray;
    let cipher = Des::new(GenericArray::from_slice(key));
    let mut buf = *block;
    let ga = GenericArray::from_mut_slice(&mut buf);
    cipher.encrypt_block(ga);
    buf
}

/// Encrypts a 16-byte VNC auth challenge under `key`, two independent 8-byte
/// halves (spec §4.H step 5: "Each 8-byte half of the challenge is
/// encrypted independently with the same key").
pub fn encrypt_challenge(key: &[u8; 8], challenge: &[u8; 16]) -> [u8; 16] {
    let mut out = [0u8; 16];
    let mut half = [0u8; 8];
    half.copy_from_slice(&challenge[..8]);
    out[..8].copy_from_slice(&encrypt_block(key, &half));
    half.copy_from_slice(&challenge[8..]);
    out[8..].copy_from_slice(&encrypt_block(key, &half));
    out
}

/// Builds the DES auth response for a plaintext password.
pub fn response_for_password(password: &str, challenge: &[u8; 16]) -> [u8; 16] {
    let key = password_key(password.as_bytes());
    encrypt_challenge(&key, challenge)
}

/// Builds the DES auth response for the xrdp GUID-derived path: the GUID is
/// rendered as a 32-character lowercase hex string, SHA-1 hashed as
/// `"xrdp_vnc" ∥ hex ∥ hex`, truncated to the first 4 hash bytes, and
/// re-formatted as an 8-character hex string used as the DES password
/// (`x11vnc.c`'s call site hashes `g_bytes_to_hexstr(v->guid, ...)`, not the
/// plaintext password, when a GUID is configured).
pub fn response_for_guid(guid: &[u8; 16], challenge: &[u8; 16]) -> [u8; 16] {
    let mut hex = String::with_capacity(32);
    for b in guid {
        hex.push_str(&format!("{b:02x}"));
    }
    let mut hasher = Sha1::new();
    hasher.update(b"xrdp_vnc");
    hasher.update(hex.as_bytes());
    hasher.update(hex.as_bytes());
    let digest = hasher.finalize();
    let hex_password = format!("{:02x}{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2], digest[3]);
    let key = password_key(hex_password.as_bytes());
    encrypt_challenge(&key, challenge)
}

/// Checks the 4-byte BE auth result the server sends after the challenge
/// response (spec §4.H step 6).
pub fn check_auth_result(result: u32) -> Result<()> {
    if result == 0 {
        Ok(())
    } else {
        Err(RfbError::auth("password failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_challenge_with_short_password_matches_padded_key() {
        let challenge = [0u8; 16];
        let key = password_key(b"hello");
        assert_eq!(key, *b"hello\0\0\0");
        let expected = encrypt_challenge(&key, &challenge);
        assert_eq!(response_for_password("hello", &challenge), expected);
    }

    #[test]
    fn password_longer_than_8_bytes_is_truncated() {
        let key = password_key(b"0123456789");
        assert_eq!(key, *b"01234567");
    }

    #[test]
    fn auth_result_zero_is_ok_nonzero_is_error() {
        assert!(check_auth_result(0).is_ok());
        assert!(check_auth_result(1).is_err());
    }

    #[test]
    fn guid_response_differs_from_plaintext_response() {
        let challenge = [0u8; 16];
        let guid = [0u8; 16];
        assert_ne!(
            response_for_password("hello", &challenge),
            response_for_guid(&guid, &challenge)
        );
    }
}
