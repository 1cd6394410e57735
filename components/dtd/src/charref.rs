//! Character reference (`&#N;` / `&#xH;`) expansion, UTF-8-aware.
//!
//! Used both by the PE processor (PE values have their character
//! references expanded once, at definition time, so `&#37;` can spell a
//! literal `%` without re-triggering PE substitution) and by the DTD
//! parser's entity-value well-formedness check.

use crate::error::{DtdError, DtdErrorKind};

/// Expand every `&#N;` / `&#xH;` reference in `input`, leaving everything
/// else (including `&name;` and `%name;` references) untouched.
pub fn expand_char_refs(input: &str) -> Result<String, DtdError> {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'&' && bytes.get(i + 1) == Some(&b'#') {
            if let Some((codepoint, consumed)) = parse_char_ref(&input[i..]) {
                let ch = char::from_u32(codepoint)
                    .filter(|c| xrs_chars::is_xml_char(*c))
                    .ok_or_else(|| DtdError::new(DtdErrorKind::InvalidCharRef, i))?;
                out.push(ch);
                i += consumed;
                continue;
            }
        }
        let ch = input[i..].chars().next().expect("i within valid UTF-8 boundary");
        out.push(ch);
        i += ch.len_utf8();
    }
    Ok(out)
}

/// Parses a leading `&#...;` reference from `s`. Returns the decoded
/// codepoint and the number of bytes it consumed, or `None` if `s` does
/// not start with a well-formed character reference.
fn parse_char_ref(s: &str) -> Option<(u32, usize)> {
    let rest = s.strip_prefix("&#")?;
    let (digits, hex) = if let Some(hex_rest) = rest.strip_prefix(['x', 'X']) {
        (hex_rest, true)
    } else {
        (rest, false)
    };
    let semi = digits.find(';')?;
    let digit_str = &digits[..semi];
    if digit_str.is_empty() {
        return None;
    }
    let value = if hex {
        u32::from_str_radix(digit_str, 16).ok()?
    } else {
        digit_str.parse::<u32>().ok()?
    };
    let prefix_len = 2 + if hex { 1 } else { 0 };
    Some((value, prefix_len + semi + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_and_hex_refs() {
        assert_eq!(expand_char_refs("&#37;").unwrap(), "%");
        assert_eq!(expand_char_refs("&#x25;").unwrap(), "%");
        assert_eq!(expand_char_refs("&#X25;").unwrap(), "%");
    }

    #[test]
    fn leaves_entity_and_pe_refs_alone() {
        assert_eq!(expand_char_refs("a &amp; %pe; b").unwrap(), "a &amp; %pe; b");
    }

    #[test]
    fn rejects_invalid_codepoint() {
        assert!(expand_char_refs("&#x0;").is_err());
        assert!(expand_char_refs("&#xFFFE;").is_err());
    }

    #[test]
    fn two_stage_percent_trick() {
        // A PE value defined as "&#37;name;" expands at definition time to
        // the literal text "%name;", which is only then eligible for a
        // second-pass PE substitution by the caller.
        assert_eq!(expand_char_refs("&#37;name;").unwrap(), "%name;");
    }
}
