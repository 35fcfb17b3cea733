// Assertion value escaping (RFC 4515 section 3: `\` followed by two hex digits).

use crate::error::ParseError;

/// Decode `\XX` escapes into raw bytes. Any other use of `\` is an error.
pub fn unescape_value(raw: &str) -> Result<Vec<u8>, ParseError> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        match (hex_digit(bytes.get(i + 1)), hex_digit(bytes.get(i + 2))) {
            (Some(hi), Some(lo)) => out.push((hi << 4) | lo),
            _ => {
                let end = (i + 3).min(bytes.len());
                return Err(ParseError::MalformedEscape {
                    fragment: String::from_utf8_lossy(&bytes[i..end]).into_owned(),
                });
            }
        }
        i += 3;
    }
    Ok(out)
}

pub(crate) fn hex_digit(byte: Option<&u8>) -> Option<u8> {
    match *byte? {
        b @ b'0'..=b'9' => Some(b - b'0'),
        b @ b'a'..=b'f' => Some(b - b'a' + 10),
        b @ b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Render raw value bytes as filter text, escaping the reserved characters, control bytes and
/// bytes that are not valid UTF-8. With `non_ascii` every byte above 0x7f is escaped too.
pub fn escape_value(value: &[u8], non_ascii: bool) -> String {
    let mut out = String::with_capacity(value.len());
    for chunk in value.utf8_chunks() {
        for c in chunk.valid().chars() {
            if needs_escape(c, non_ascii) {
                let mut buf = [0u8; 4];
                for b in c.encode_utf8(&mut buf).bytes() {
                    push_escaped(&mut out, b);
                }
            } else {
                out.push(c);
            }
        }
        for &b in chunk.invalid() {
            push_escaped(&mut out, b);
        }
    }
    out
}

fn needs_escape(c: char, non_ascii: bool) -> bool {
    matches!(c, '(' | ')' | '*' | '\\') || c.is_ascii_control() || (non_ascii && !c.is_ascii())
}

fn push_escaped(out: &mut String, b: u8) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    out.push('\\');
    out.push(HEX[(b >> 4) as usize] as char);
    out.push(HEX[(b & 0x0F) as usize] as char);
}
