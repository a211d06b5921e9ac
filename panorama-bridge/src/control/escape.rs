//! Escaping used by tmux control mode for `%output` data
//!
//! Control mode writes pane output as text: non-printable bytes and the
//! backslash itself arrive as backslash escapes.

/// Decode control-mode escapes in one forward pass.
///
/// Recognized: `\n \r \t \e \\`, `\xHH` and `\NNN` (one to three octal
/// digits). An octal run stops before its value would exceed 255. Unknown or
/// incomplete escapes are kept as written.
pub fn unescape(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        let b = input[i];
        if b != b'\\' || i + 1 >= input.len() {
            out.push(b);
            i += 1;
            continue;
        }

        let next = input[i + 1];
        let named = match next {
            b'n' => Some(b'\n'),
            b'r' => Some(b'\r'),
            b't' => Some(b'\t'),
            b'e' => Some(0x1b),
            b'\\' => Some(b'\\'),
            _ => None,
        };
        if let Some(byte) = named {
            out.push(byte);
            i += 2;
            continue;
        }

        if next == b'x' {
            let hex = input
                .get(i + 2..i + 4)
                .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|s| u8::from_str_radix(s, 16).ok());
            match hex {
                Some(byte) => {
                    out.push(byte);
                    i += 4;
                }
                None => {
                    out.push(b'\\');
                    i += 1;
                }
            }
            continue;
        }

        if is_octal(next) {
            let mut value: u32 = 0;
            let mut j = i + 1;
            while j < input.len() && j < i + 4 && is_octal(input[j]) {
                let candidate = value * 8 + u32::from(input[j] - b'0');
                if candidate > 255 {
                    break;
                }
                value = candidate;
                j += 1;
            }
            out.push(value as u8);
            i = j;
            continue;
        }

        out.push(b'\\');
        i += 1;
    }

    out
}

/// Canonical escaping, the inverse of [`unescape`]
pub fn escape(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    for &b in input {
        match b {
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x1b => out.extend_from_slice(b"\\e"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            0x80..=0xff => out.extend_from_slice(format!("\\x{:02x}", b).as_bytes()),
            0x00..=0x1f | 0x7f => out.extend_from_slice(format!("\\{:03o}", b).as_bytes()),
            _ => out.push(b),
        }
    }
    out
}

fn is_octal(b: u8) -> bool {
    (b'0'..=b'7').contains(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== unescape ====================

    #[test]
    fn test_named_escapes() {
        assert_eq!(unescape(br"a\nb\r\t\e\\"), b"a\nb\r\t\x1b\\");
    }

    #[test]
    fn test_hex_escape() {
        assert_eq!(unescape(br"\x41\xff"), vec![0x41, 0xff]);
    }

    #[test]
    fn test_incomplete_hex_kept_literally() {
        assert_eq!(unescape(br"\x4"), br"\x4".to_vec());
        assert_eq!(unescape(br"\xzz"), br"\xzz".to_vec());
    }

    #[test]
    fn test_octal_escapes() {
        assert_eq!(unescape(br"\033[0m"), b"\x1b[0m");
        assert_eq!(unescape(br"\7"), vec![7]);
        assert_eq!(unescape(br"\377"), vec![255]);
    }

    #[test]
    fn test_octal_stops_before_overflow() {
        // \400 would be 256: take \40 (a space), leave the 0
        assert_eq!(unescape(br"\400"), b" 0");
    }

    #[test]
    fn test_octal_run_is_at_most_three_digits() {
        assert_eq!(unescape(br"\0123"), vec![0o12, b'3']);
    }

    #[test]
    fn test_unknown_and_trailing_backslash_kept() {
        assert_eq!(unescape(br"\q"), br"\q".to_vec());
        assert_eq!(unescape(b"end\\"), b"end\\".to_vec());
    }

    #[test]
    fn test_plain_bytes_pass_through() {
        let text = "héllo wörld".as_bytes();
        assert_eq!(unescape(text), text);
    }

    // ==================== escape ====================

    #[test]
    fn test_escape_canonical_forms() {
        assert_eq!(escape(b"\n\r\t\x1b\\"), br"\n\r\t\e\\".to_vec());
        assert_eq!(escape(&[0x00, 0x07, 0x7f]), br"\000\007\177".to_vec());
        assert_eq!(escape(&[0xc3, 0xa9]), br"\xc3\xa9".to_vec());
        assert_eq!(escape(b"plain text"), b"plain text".to_vec());
    }

    #[test]
    fn test_every_byte_survives_escape_then_unescape() {
        let all: Vec<u8> = (0..=255u8).collect();
        assert_eq!(unescape(&escape(&all)), all);
    }

    #[test]
    fn test_canonical_text_survives_unescape_then_escape() {
        let canonical = br"\e[1;31mred\e[0m\r\n\000tab\there\\\xe2\x94\x80";
        assert_eq!(escape(&unescape(canonical)), canonical.to_vec());
    }
}
