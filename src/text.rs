//! Cleanup for strings pulled out of scraped markup.

use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Markers left behind when UTF-8 text was decoded as Latin-1/Windows-1252
/// somewhere upstream.
fn looks_garbled(s: &str) -> bool {
    s.contains('Ã') || s.contains('â') || s.contains('�')
}

/// Normalize an extracted string: NFKC, NBSP and whitespace collapse, plus
/// up to three re-decoding passes when mojibake markers are present.
pub fn clean(s: &str) -> String {
    if !looks_garbled(s) {
        return collapse(s);
    }

    let mut cur = s.to_string();
    for _ in 0..3 {
        // Reinterpret low-8-bit chars as raw bytes, then decode as UTF-8,
        // falling back to Windows-1252 when the bytes are not valid UTF-8.
        let mut bytes: Vec<u8> = Vec::with_capacity(cur.len());
        for ch in cur.chars() {
            let code = ch as u32;
            if code <= 0xFF {
                bytes.push(code as u8);
            } else {
                bytes.extend_from_slice(ch.to_string().as_bytes());
            }
        }

        let redecoded = match String::from_utf8(bytes) {
            Ok(utf8) => utf8,
            Err(err) => encoding_rs::WINDOWS_1252
                .decode_without_bom_handling(err.as_bytes())
                .0
                .into_owned(),
        };
        if redecoded == cur {
            break;
        }
        cur = redecoded;
        if !looks_garbled(&cur) {
            break;
        }
    }

    collapse(&cur)
}

fn collapse(s: &str) -> String {
    let normalized = s.nfkc().collect::<String>().replace('\u{00A0}', " ");
    RE_WHITESPACE.replace_all(&normalized, " ").trim().to_string()
}

/// Decode HTML entities once and drop control characters that are invalid in
/// XML text nodes (everything below 0x20 except tab, LF, CR).
pub fn sanitize_xml_text(input: &str) -> String {
    let decoded = decode_html_entities(input);
    decoded
        .chars()
        .filter(|&c| {
            let code = c as u32;
            code >= 0x20 || code == 0x09 || code == 0x0A || code == 0x0D
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_nbsp() {
        assert_eq!(clean("  a\u{00A0}\u{00A0}b \n c  "), "a b c");
    }

    #[test]
    fn chinese_text_passes_through() {
        assert_eq!(clean("深夜食堂 第三季"), "深夜食堂 第三季");
    }

    #[test]
    fn repairs_latin1_mojibake() {
        // "é" mis-decoded as Latin-1 shows up as "Ã©".
        assert_eq!(clean("cafÃ©"), "café");
    }

    #[test]
    fn repairs_double_mojibake() {
        // Two rounds of Latin-1 mis-decoding need two repair passes:
        // "é" -> "Ã©" -> "Ã\u{83}Â©".
        assert_eq!(clean("cafÃ\u{0083}Â©"), "café");
    }

    #[test]
    fn sanitize_decodes_entities_and_strips_controls() {
        assert_eq!(sanitize_xml_text("a &amp; b\u{0}\u{1}"), "a & b");
        assert_eq!(sanitize_xml_text("line1\nline2\tend"), "line1\nline2\tend");
    }
}
