//! Identifier and session-code generation.
//!
//! Device ids and file ids are 128-bit random tokens rendered as 36
//! hyphenated ASCII characters, which lets a file id double as the
//! fixed-width prefix of binary data frames. Session codes are short
//! human-typeable strings drawn from an alphabet without look-alike
//! symbols.

use rand::Rng;
use uuid::Uuid;

/// Textual length of device and file ids.
pub const ID_LEN: usize = 36;

/// Alphabet for session codes: 32 symbols, ~30 bits of entropy per code.
/// 0, O, 1, and I are excluded because they are easy to confuse when read
/// off a screen.
pub const SESSION_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a session code.
pub const SESSION_CODE_LEN: usize = 6;

/// Mint a fresh device id.
pub fn new_device_id() -> String {
    Uuid::new_v4().to_string()
}

/// Mint a fresh file id.
///
/// The textual encoding is exactly [`ID_LEN`] bytes so the id can be used
/// verbatim as a data-frame prefix.
pub fn new_file_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a random session code.
///
/// Uniqueness across live sessions is the registry's responsibility; it
/// retries on collision.
pub fn new_session_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SESSION_CODE_LEN)
        .map(|_| SESSION_CODE_ALPHABET[rng.gen_range(0..SESSION_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Normalize a user-supplied session code for lookup.
///
/// Codes are case-insensitive on input; surrounding whitespace is dropped.
pub fn normalize_session_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
