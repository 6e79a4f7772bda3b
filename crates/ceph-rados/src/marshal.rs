//! Buffer and string marshaling helpers shared by the wrappers.

use libc::c_char;
use std::ffi::CString;

/// Result of a marshaling step that may fault before the native call.
pub type MarshalResult<T> = std::result::Result<T, std::ffi::NulError>;

/// Convert a Rust string for hand-off to a native call.
pub fn cstring(s: &str) -> MarshalResult<CString> {
    CString::new(s)
}

/// Decode a native buffer of NUL-separated names, ignoring trailing padding.
pub fn packed_strings(buf: &[u8]) -> Vec<String> {
    buf.split(|b| *b == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// Decode a NUL-terminated native buffer into an owned string.
pub fn buf_to_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Decode a fixed-size `c_char` field out of a native struct.
pub fn fixed_cstr(buf: &[c_char]) -> String {
    // c_char is i8 on most targets; reinterpret as bytes for decoding.
    let bytes = unsafe { std::slice::from_raw_parts(buf.as_ptr().cast::<u8>(), buf.len()) };
    buf_to_string(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_strings_splits_on_nul() {
        let buf = b"alpha\0beta\0gamma\0\0\0";
        assert_eq!(packed_strings(buf), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn packed_strings_handles_empty_buffer() {
        assert!(packed_strings(b"").is_empty());
        assert!(packed_strings(b"\0\0\0").is_empty());
    }

    #[test]
    fn buf_to_string_stops_at_nul() {
        assert_eq!(buf_to_string(b"pool\0garbage"), "pool");
        assert_eq!(buf_to_string(b"unterminated"), "unterminated");
    }

    #[test]
    fn cstring_rejects_interior_nul() {
        assert!(cstring("a\0b").is_err());
    }
}
