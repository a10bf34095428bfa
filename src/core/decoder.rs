use crate::core::{Category, Payload, Request, Sample};
use crate::utils::error::{BridgeError, Result};

fn syntax_error(message: impl Into<String>) -> BridgeError {
    BridgeError::UnquoteError {
        message: message.into(),
    }
}

/// 去掉外層的字串引號，取得內部的 JSON 文字
///
/// Follows string-literal rules: `"..."` with escapes (`\a \b \f \n \r \t \v
/// \\ \" \xNN \NNN \uNNNN \UNNNNNNNN`), `` `...` `` raw literals (carriage
/// returns dropped) and single-character `'...'` literals.
pub fn unquote(raw: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| syntax_error(format!("payload is not valid UTF-8: {}", e)))?;

    let bytes = text.as_bytes();
    if bytes.len() < 2 || bytes[0] != bytes[bytes.len() - 1] {
        return Err(syntax_error("payload is not a quoted string literal"));
    }
    // both ends are ASCII quote bytes, so these are char boundaries
    let inner = &text[1..text.len() - 1];

    match bytes[0] {
        b'`' => {
            if inner.contains('`') {
                return Err(syntax_error("back-quote inside raw literal"));
            }
            Ok(inner.replace('\r', ""))
        }
        b'"' => unescape(inner, '"'),
        b'\'' => {
            let value = unescape(inner, '\'')?;
            if value.chars().count() != 1 {
                return Err(syntax_error("character literal must hold exactly one character"));
            }
            Ok(value)
        }
        _ => Err(syntax_error("payload is not a quoted string literal")),
    }
}

fn unescape(inner: &str, quote: char) -> Result<String> {
    let mut out: Vec<u8> = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    let mut utf8 = [0u8; 4];

    while let Some(c) = chars.next() {
        if c == quote {
            return Err(syntax_error("unescaped quote inside literal"));
        }
        if c == '\n' {
            return Err(syntax_error("newline inside literal"));
        }
        if c != '\\' {
            out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            continue;
        }

        let escape = chars
            .next()
            .ok_or_else(|| syntax_error("literal ends with a backslash"))?;
        match escape {
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0b),
            '\\' => out.push(b'\\'),
            '\'' | '"' if escape == quote => out.push(escape as u8),
            'x' => out.push(read_digits(&mut chars, 2, 16)? as u8),
            '0'..='7' => {
                let rest = read_digits(&mut chars, 2, 8)?;
                let value = (escape as u32 - '0' as u32) * 64 + rest;
                if value > 0xff {
                    return Err(syntax_error("octal escape out of range"));
                }
                out.push(value as u8);
            }
            'u' | 'U' => {
                let width = if escape == 'u' { 4 } else { 8 };
                let code = read_digits(&mut chars, width, 16)?;
                let decoded = char::from_u32(code)
                    .ok_or_else(|| syntax_error(format!("invalid code point {:#x}", code)))?;
                out.extend_from_slice(decoded.encode_utf8(&mut utf8).as_bytes());
            }
            other => return Err(syntax_error(format!("invalid escape \\{}", other))),
        }
    }

    String::from_utf8(out).map_err(|e| syntax_error(format!("escapes produce invalid UTF-8: {}", e)))
}

fn read_digits(chars: &mut std::str::Chars<'_>, count: usize, radix: u32) -> Result<u32> {
    let mut value = 0u32;
    for _ in 0..count {
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(radix))
            .ok_or_else(|| syntax_error("malformed numeric escape"))?;
        value = value * radix + digit;
    }
    Ok(value)
}

/// 依照分類解碼 payload
pub fn decode(category: Category, raw: &[u8]) -> Result<Payload> {
    let json = unquote(raw)?;

    match category {
        Category::NewRequest => {
            let request: Request = serde_json::from_str(&json)?;
            Ok(Payload::NewRequest(request))
        }
        Category::UpdateRequest => {
            let requests: Vec<Request> = serde_json::from_str(&json)?;
            if requests.is_empty() {
                return Err(BridgeError::EmptyPayload { category });
            }
            Ok(Payload::UpdateRequests(requests))
        }
        Category::UpdateSample => {
            let samples: Vec<Sample> = serde_json::from_str(&json)?;
            if samples.is_empty() {
                return Err(BridgeError::EmptyPayload { category });
            }
            Ok(Payload::UpdateSamples(samples))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unquote_escaped_literal() {
        let raw = br#""{\"IgoRequestID\":\"REQ1\"}""#;
        assert_eq!(unquote(raw).unwrap(), r#"{"IgoRequestID":"REQ1"}"#);
    }

    #[test]
    fn test_unquote_raw_literal() {
        let raw = br#"`{"IgoRequestID":"REQ1"}`"#;
        assert_eq!(unquote(raw).unwrap(), r#"{"IgoRequestID":"REQ1"}"#);
        assert!(unquote(b"`a`b`").is_err());
    }

    #[test]
    fn test_unquote_literal_escapes() {
        let raw = br#""{\"IgoRequestID\":\"R\x41\"}""#;
        assert_eq!(unquote(raw).unwrap(), r#"{"IgoRequestID":"RA"}"#);

        assert_eq!(unquote(br#""R\v""#).unwrap(), "R\u{b}");
        assert_eq!(unquote(br#""\a\b\f\t""#).unwrap(), "\u{7}\u{8}\u{c}\t");
        assert_eq!(unquote(br#""\101\102""#).unwrap(), "AB");
        assert_eq!(unquote("\"é\\U0001F600\"".as_bytes()).unwrap(), "é😀");
        // \xNN is a raw byte, so a valid UTF-8 sequence can be spelled out
        assert_eq!(unquote(br#""\xc3\xa9""#).unwrap(), "é");
    }

    #[test]
    fn test_unquote_rejects_invalid_escapes() {
        assert!(unquote(br#""R\/""#).is_err());
        assert!(unquote(br#""it\'s""#).is_err());
        assert!(unquote(br#""\400""#).is_err());
        assert!(unquote(br#""\x4""#).is_err());
        assert!(unquote(br#""\uD800""#).is_err());
        assert!(unquote(br#""\xff""#).is_err());
        assert!(unquote(b"\"line\nbreak\"").is_err());
        assert!(unquote(br#""a"b""#).is_err());
    }

    #[test]
    fn test_unquote_single_character_literal() {
        assert_eq!(unquote(b"'x'").unwrap(), "x");
        assert_eq!(unquote(br#"'\''"#).unwrap(), "'");
        assert!(unquote(b"'xy'").is_err());
        assert!(unquote(b"''").is_err());
    }

    #[test]
    fn test_unquote_raw_literal_drops_carriage_returns() {
        assert_eq!(unquote(b"`[\r\n]`").unwrap(), "[\n]");
    }

    #[test]
    fn test_decode_escaped_request_id() {
        let raw = br#""{\"IgoRequestID\":\"R\x41\"}""#;
        let Payload::NewRequest(request) = decode(Category::NewRequest, raw).unwrap() else {
            panic!("expected a new request payload");
        };
        assert_eq!(request.igo_request_id, "RA");
    }

    #[test]
    fn test_unquote_rejects_plain_json() {
        let err = unquote(br#"{"IgoRequestID":"REQ1"}"#).unwrap_err();
        assert!(matches!(err, BridgeError::UnquoteError { .. }));
        assert!(unquote(b"\"").is_err());
        assert!(unquote(b"\"unterminated \\\"").is_err());
        assert!(unquote(&[0x22, 0xff, 0x22]).is_err());
    }

    #[test]
    fn test_decode_new_request_keeps_all_members() {
        let raw = br#""{\"IgoRequestID\":\"REQ1\",\"projectId\":\"P-9\",\"samples\":[1,2]}""#;
        let payload = decode(Category::NewRequest, raw).unwrap();

        let Payload::NewRequest(request) = payload else {
            panic!("expected a new request payload");
        };
        assert_eq!(request.igo_request_id, "REQ1");
        assert_eq!(request.fields.get("projectId"), Some(&json!("P-9")));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"IgoRequestID": "REQ1", "projectId": "P-9", "samples": [1, 2]})
        );
    }

    #[test]
    fn test_decode_sample_batch_in_order() {
        let raw = br#""[{\"CmoSampleName\":\"S1\"},{\"CmoSampleName\":\"S2\"}]""#;
        let payload = decode(Category::UpdateSample, raw).unwrap();
        assert_eq!(payload.category(), Category::UpdateSample);

        let Payload::UpdateSamples(samples) = payload else {
            panic!("expected a sample payload");
        };
        let names: Vec<&str> = samples.iter().map(|s| s.cmo_sample_name.as_str()).collect();
        assert_eq!(names, vec!["S1", "S2"]);
    }

    #[test]
    fn test_decode_shape_mismatch() {
        // an object where an array is expected
        let raw = br#""{\"IgoRequestID\":\"REQ1\"}""#;
        let err = decode(Category::UpdateRequest, raw).unwrap_err();
        assert!(matches!(err, BridgeError::SerializationError(_)));

        let err = decode(Category::NewRequest, br#""not json""#).unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_decode_empty_batch() {
        let err = decode(Category::UpdateRequest, br#""[]""#).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::EmptyPayload {
                category: Category::UpdateRequest
            }
        ));
    }
}
