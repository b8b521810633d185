//! Entry name rules
//!
//! Names stored in an archive use forward slashes, are relative, and a
//! trailing slash marks a directory. Writers reject names that break these
//! rules ([`validate_entry_name`]). Readers cannot reject what another tool
//! already wrote, so extraction code should go through [`sanitize`], which
//! produces a relative path that cannot escape the extraction root:
//!
//! ```
//! use zipcodec::path::sanitize;
//!
//! assert_eq!(sanitize("dir\\subdir\\file.txt"), "dir/subdir/file.txt");
//! assert_eq!(sanitize("dir//subdir///file.txt"), "dir/subdir/file.txt");
//! assert_eq!(sanitize("dir/../file.txt"), "file.txt");
//! assert_eq!(sanitize("/etc/passwd"), "etc/passwd");
//! assert_eq!(sanitize("../../../etc/passwd"), "etc/passwd");
//! assert_eq!(sanitize("C:\\Windows\\win.ini"), "Windows/win.ini");
//! ```
//!
//! Names are UTF-8 when general purpose bit 11 is set and code page 437
//! otherwise.

use crate::errors::Error;
use std::borrow::Cow;

/// Checks a name handed to the writer and returns it with backslashes
/// converted to forward slashes.
///
/// Empty names, absolute paths, drive letters and `..` segments are rejected
/// with an `InvalidPath` error.
pub fn validate_entry_name(name: &str) -> Result<String, Error> {
    if name.is_empty() {
        return Err(Error::invalid_path(name, "name is empty"));
    }

    // 4.4.17.1 All slashes MUST be forward slashes '/'
    let normalized = name.replace('\\', "/");

    // 4.4.17.1 MUST NOT contain a drive or device letter, or a leading slash
    if normalized.starts_with('/') {
        return Err(Error::invalid_path(name, "absolute path"));
    }

    if let [letter, b':', ..] = normalized.as_bytes() {
        if letter.is_ascii_alphabetic() {
            return Err(Error::invalid_path(name, "drive letter"));
        }
    }

    if normalized.split('/').any(|segment| segment == "..") {
        return Err(Error::invalid_path(name, "parent directory segment"));
    }

    if normalized.contains('\0') {
        return Err(Error::invalid_path(name, "nul byte"));
    }

    Ok(normalized)
}

/// Produces a relative, traversal free path from any stored name.
///
/// Backslashes become slashes, drive prefixes and leading slashes are
/// stripped, and `.`/`..` segments are resolved without climbing above the
/// root. When no rewriting is necessary the input is borrowed.
pub fn sanitize(mut name: &str) -> Cow<'_, str> {
    let mut last = 0;
    for &c in name.as_bytes() {
        if matches!(
            (c, last),
            (b'\\', _) | (b'/', b'/') | (b'.', b'.') | (b'.', b'/') | (b':', _)
        ) {
            return Cow::Owned(sanitize_alloc(name));
        }
        last = c;
    }

    loop {
        name = match name.as_bytes() {
            [b'.', b'.', b'/', ..] => name.trim_start_matches("../"),
            [b'.', b'/', ..] => name.trim_start_matches("./"),
            [b'/', ..] => name.trim_start_matches('/'),
            [b'.'] | [b'.', b'.'] => "",
            _ => return Cow::Borrowed(name),
        }
    }
}

fn sanitize_alloc(s: &str) -> String {
    let s = s.replace('\\', "/");
    let s = s.split(':').next_back().unwrap_or_default();

    let mut result = String::with_capacity(s.len());
    for segment in s.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                let last = result.rfind('/');
                result.truncate(last.unwrap_or(0));
            }
            _ => {
                if !result.is_empty() {
                    result.push('/');
                }
                result.push_str(segment);
            }
        }
    }

    // keep the directory marker
    if s.ends_with('/') && !result.is_empty() {
        result.push('/');
    }

    result
}

/// Reports if a name must be stored as UTF-8 with bit 11 set.
///
/// Only printable ASCII that is identical across common legacy code pages may
/// be stored without the flag. `~` (0x7e) and `\` (0x5c) are excluded since
/// Shift-JIS and EUC-KR map them to other glyphs.
pub fn needs_utf8_encoding(name: &str) -> bool {
    name.chars().any(|ch| {
        let code_point = ch as u32;
        !(0x20..=0x7d).contains(&code_point) || code_point == 0x5c
    })
}

/// Decodes a stored name according to its UTF-8 flag
pub fn decode_name(raw: &[u8], utf8: bool) -> Result<String, Error> {
    if utf8 {
        let name = std::str::from_utf8(raw).map_err(Error::utf8)?;
        Ok(name.to_string())
    } else {
        Ok(decode_cp437(raw).into_owned())
    }
}

/// Decodes IBM code page 437. Pure ASCII input is borrowed.
pub fn decode_cp437(raw: &[u8]) -> Cow<'_, str> {
    if raw.is_ascii() {
        // ASCII is valid UTF-8
        return match std::str::from_utf8(raw) {
            Ok(s) => Cow::Borrowed(s),
            Err(_) => Cow::Owned(raw.iter().map(|&b| cp437_char(b)).collect()),
        };
    }

    Cow::Owned(raw.iter().map(|&b| cp437_char(b)).collect())
}

fn cp437_char(b: u8) -> char {
    if b < 0x80 {
        char::from(b)
    } else {
        CP437_HIGH[usize::from(b - 0x80)]
    }
}

#[rustfmt::skip]
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];
