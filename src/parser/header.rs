//! RFC 5322 header parsing: header blocks, media types, encoded-words
//! (RFC 2047) and dates.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{LookoutError, Result};
use crate::model::mail::Headers;

/// Parse a header block (everything before the blank line).
///
/// Continuation lines are joined to the previous value with a single space.
/// A line that is neither `Name: value` nor a continuation is rejected, as is
/// a continuation with nothing to continue.
pub fn parse_header_block(raw: &[u8]) -> Result<Headers> {
    let text = decode_header_bytes(raw);
    let mut headers = Headers::new();

    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            let value = headers.last_value_mut().ok_or_else(|| {
                LookoutError::MalformedMessage(format!(
                    "continuation line before any header: {line:?}"
                ))
            })?;
            let folded = line.trim();
            if !folded.is_empty() {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(folded);
            }
            continue;
        }

        let (name, value) = line.split_once(':').ok_or_else(|| {
            LookoutError::MalformedMessage(format!("malformed header line: {line:?}"))
        })?;
        if name.is_empty() || name.contains(|c: char| c.is_ascii_whitespace()) {
            return Err(LookoutError::MalformedMessage(format!(
                "invalid header name: {name:?}"
            )));
        }
        headers.push(name, value.trim());
    }

    Ok(headers)
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// A parsed `Content-Type` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// Lowercased `type/subtype`.
    pub essence: String,
    /// Parameters in order; names are lowercased.
    pub params: Vec<(String, String)>,
}

impl MediaType {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_multipart(&self) -> bool {
        self.essence.starts_with("multipart/")
    }
}

/// Parse a `Content-Type` header value such as
/// `multipart/alternative; boundary="b1"`.
///
/// An empty value is an error: the caller has nothing to dispatch on.
pub fn parse_media_type(value: &str) -> Result<MediaType> {
    let invalid = |reason: &str| LookoutError::InvalidMediaType {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let (essence, mut rest) = match value.split_once(';') {
        Some((e, r)) => (e.trim(), r),
        None => (value.trim(), ""),
    };
    if essence.is_empty() {
        return Err(invalid("no media type"));
    }
    let (main, sub) = essence
        .split_once('/')
        .ok_or_else(|| invalid("expected type/subtype"))?;
    if !is_token(main) || !is_token(sub) {
        return Err(invalid("expected token after type/subtype"));
    }

    let mut params = Vec::new();
    loop {
        rest = rest.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
        if rest.is_empty() {
            break;
        }
        let (name, after) = rest
            .split_once('=')
            .ok_or_else(|| invalid("parameter without value"))?;
        let name = name.trim();
        if !is_token(name) {
            return Err(invalid("invalid parameter name"));
        }
        let after = after.trim_start();

        let (param_value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            read_quoted(quoted).ok_or_else(|| invalid("unterminated quoted parameter"))?
        } else {
            let end = after.find(';').unwrap_or(after.len());
            let token = after[..end].trim();
            if !is_token(token) {
                return Err(invalid("invalid parameter value"));
            }
            (token.to_string(), &after[end..])
        };

        params.push((name.to_ascii_lowercase(), param_value));
        rest = remaining;
    }

    Ok(MediaType {
        essence: essence.to_ascii_lowercase(),
        params,
    })
}

/// Read a quoted-string body (opening quote already consumed).
/// Returns the unescaped value and the input after the closing quote.
fn read_quoted(input: &str) -> Option<(String, &str)> {
    let mut value = String::new();
    let mut escaped = false;
    for (i, ch) in input.char_indices() {
        if escaped {
            value.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '"' {
            return Some((value, &input[i + 1..]));
        } else {
            value.push(ch);
        }
    }
    None
}

/// RFC 2045 token: printable ASCII minus space and tspecials.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b))
}

/// Expand RFC 2047 `=?charset?B|Q?text?=` words, e.g. in a non-ASCII subject.
///
/// `"=?UTF-8?B?S2xheG9u?= =?UTF-8?B?IGZpcmVzIHR3aWNl?="` → `"Klaxon fires twice"`.
/// Malformed words stay in the output untouched.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two adjacent encoded words is dropped (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        match decode_one_word(&remaining[start + 2..]) {
            Some((text, consumed)) => {
                result.push_str(&text);
                remaining = &remaining[start + 2 + consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = &remaining[start + 2..];
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?encoding?text?=` (the part after `=?`).
/// Returns the text and the number of bytes consumed.
fn decode_one_word(s: &str) -> Option<(String, usize)> {
    let (charset, rest) = s.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let encoded = &rest[..end];
    if charset.contains(char::is_whitespace) || encoded.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => STANDARD.decode(encoded).ok()?,
        "Q" => decode_q_encoding(encoded),
        _ => return None,
    };

    let consumed = charset.len() + 1 + encoding.len() + 1 + end + 2;
    Some((decode_charset(charset, &bytes), consumed))
}

/// `_` is a space and `=XX` a hex-escaped byte; anything else is literal.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                match u8::from_str_radix(hex, 16) {
                    Ok(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    Err(_) => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset, falling back to lossy UTF-8.
pub fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    if charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("utf8") {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    match encoding_rs::Encoding::for_label(charset.trim().as_bytes()) {
        Some(encoding) => {
            let (decoded, _, _) = encoding.decode(bytes);
            decoded.into_owned()
        }
        None => {
            warn!(charset = charset, "Unknown charset, falling back to UTF-8 lossy");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Parse a mail `Date` header.
///
/// Accepts RFC 2822 dates, with or without a trailing `(comment)` and with
/// common named zones; `mail-parser` is tried last.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidates = [
        trimmed.to_string(),
        strip_trailing_comment(trimmed).to_string(),
        replace_named_tz(strip_trailing_comment(trimmed)),
    ];
    for candidate in &candidates {
        if let Ok(dt) = DateTime::parse_from_rfc2822(candidate) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    mail_parser_date(trimmed)
}

/// `"Tue, 1 Jul 2003 10:52:37 +0200 (CEST)"` → `"Tue, 1 Jul 2003 10:52:37 +0200"`
fn strip_trailing_comment(s: &str) -> &str {
    match (s.rfind('('), s.ends_with(')')) {
        (Some(open), true) => s[..open].trim_end(),
        _ => s,
    }
}

/// Replace a trailing timezone abbreviation with its numeric offset.
fn replace_named_tz(s: &str) -> String {
    const ZONES: [(&str, &str); 12] = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
    ];
    for (name, offset) in ZONES {
        if let Some(head) = s.strip_suffix(name) {
            return format!("{head}{offset}");
        }
    }
    s.to_string()
}

/// Last resort: let `mail-parser` read a synthetic one-header message.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    let fake_msg = format!("Date: {input}\n\n");
    let parsed = mail_parser::MessageParser::default().parse(fake_msg.as_bytes())?;
    let rfc3339 = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&rfc3339)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_block_unfolds() {
        let raw = b"Subject: [Maniphest] [Created] T1: A long\n\tsubject line\nX-Phabricator-Stamps: a(1)\n  b(2)\n";
        let headers = parse_header_block(raw).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(
            headers.get("subject"),
            Some("[Maniphest] [Created] T1: A long subject line")
        );
        assert_eq!(headers.get("X-Phabricator-Stamps"), Some("a(1) b(2)"));
    }

    #[test]
    fn test_parse_header_block_crlf() {
        let headers = parse_header_block(b"From: a@b.org\r\nTo: c@d.org\r\n").unwrap();
        assert_eq!(headers.get("to"), Some("c@d.org"));
    }

    #[test]
    fn test_parse_header_block_rejects_garbage_line() {
        let err = parse_header_block(b"Subject: ok\nthis is not a header\n").unwrap_err();
        assert!(matches!(err, LookoutError::MalformedMessage(_)));
    }

    #[test]
    fn test_parse_header_block_rejects_leading_continuation() {
        let err = parse_header_block(b"  dangling\nSubject: ok\n").unwrap_err();
        assert!(matches!(err, LookoutError::MalformedMessage(_)));
    }

    #[test]
    fn test_parse_header_block_windows1252_fallback() {
        let headers = parse_header_block(b"Subject: M\xfcller\n").unwrap();
        assert_eq!(headers.get("Subject"), Some("Müller"));
    }

    #[test]
    fn test_parse_media_type_with_quoted_boundary() {
        let mt = parse_media_type(r#"Multipart/Alternative; boundary="b1_=_x;y""#).unwrap();
        assert_eq!(mt.essence, "multipart/alternative");
        assert!(mt.is_multipart());
        assert_eq!(mt.param("boundary"), Some("b1_=_x;y"));
    }

    #[test]
    fn test_parse_media_type_params() {
        let mt = parse_media_type("text/plain; charset=UTF-8; format=flowed;").unwrap();
        assert_eq!(mt.essence, "text/plain");
        assert_eq!(mt.param("CHARSET"), Some("UTF-8"));
        assert_eq!(mt.param("format"), Some("flowed"));
    }

    #[test]
    fn test_parse_media_type_errors() {
        assert!(parse_media_type("").is_err());
        assert!(parse_media_type("text").is_err());
        assert!(parse_media_type("text/plain; charset").is_err());
        assert!(parse_media_type(r#"multipart/mixed; boundary="open"#).is_err());
    }

    #[test]
    fn test_b_encoded_subject() {
        assert_eq!(
            decode_encoded_words("=?UTF-8?B?VHJpYWdlOiDDnGJlbg==?="),
            "Triage: Üben"
        );
    }

    #[test]
    fn test_decode_adjacent_words_and_plain_text() {
        assert_eq!(
            decode_encoded_words("[Maniphest] =?UTF-8?B?S2xheG9u?= =?UTF-8?B?IGZpcmVzIHR3aWNl?= again"),
            "[Maniphest] Klaxon fires twice again"
        );
    }

    #[test]
    fn test_q_encoded_latin1_subject() {
        assert_eq!(
            decode_encoded_words("=?ISO-8859-1?Q?R=E9sum=E9_du_projet?="),
            "Résumé du projet"
        );
    }

    #[test]
    fn test_decode_invalid_word_is_kept() {
        assert_eq!(decode_encoded_words("=?bogus"), "=?bogus");
    }

    #[test]
    fn test_date_with_numeric_offset_is_utc() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0100").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-04T09:00:00+00:00");
    }

    #[test]
    fn test_parse_date_with_comment() {
        let dt = parse_date("Tue, 1 Jul 2003 10:52:37 +0200 (CEST)").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2003-07-01 08:52");
    }

    #[test]
    fn test_date_with_zone_abbreviation() {
        assert!(parse_date("Thu, 04 Jan 2024 10:00:00 EST").is_some());
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("").is_none());
        assert!(parse_date("not a date").is_none());
    }
}
