//! MIME decoding: split a delivered mail file into headers and the plain-text
//! body used for the notification description.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use mail_parser::{MessageParser, MessagePart};

use crate::error::{LookoutError, Result};
use crate::model::mail::{DecodedMail, Headers};
use crate::parser::header::{decode_charset, parse_header_block, parse_media_type};

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decode a raw mail document.
///
/// For `multipart/*` messages the first `text/plain` part becomes
/// [`DecodedMail::plain_body`]; later parts are not inspected. Single-part
/// messages only contribute their headers.
pub fn decode(raw: &[u8]) -> Result<DecodedMail> {
    let data = raw.strip_prefix(BOM).unwrap_or(raw);
    let (header_bytes, _) = split_message(data)?;
    let headers = parse_header_block(header_bytes)?;

    let media_type = parse_media_type(headers.get("Content-Type").unwrap_or(""))?;

    let mut plain_body = String::new();
    if media_type.is_multipart() {
        let boundary = media_type
            .param("boundary")
            .filter(|b| !b.is_empty())
            .ok_or_else(|| LookoutError::InvalidPart("missing boundary parameter".into()))?;
        if let Some(body) = first_plain_text(data, boundary)? {
            plain_body = body;
        }
    }

    Ok(DecodedMail {
        headers,
        plain_body,
    })
}

/// Walk the top-level parts that `mail-parser` located and decode the first
/// `text/plain` one.
///
/// `mail-parser` recovers from broken framing, so every visited part is
/// checked to end at a boundary delimiter, and a message without a plain part
/// must end with the close delimiter.
fn first_plain_text(data: &[u8], boundary: &str) -> Result<Option<String>> {
    let message = MessageParser::default()
        .parse(data)
        .ok_or_else(|| LookoutError::InvalidPart("no MIME structure found".into()))?;
    let children = message
        .root_part()
        .sub_parts()
        .ok_or_else(|| LookoutError::InvalidPart("no boundary delimiter found".into()))?;

    let mut closed = children.is_empty();
    for &id in children {
        let part = message
            .part(id)
            .ok_or_else(|| LookoutError::InvalidPart(format!("part {id} missing")))?;
        let delimiter = delimiter_after(data, part.raw_end_offset(), boundary).ok_or_else(|| {
            LookoutError::InvalidPart("missing closing boundary".into())
        })?;

        let header_bytes = data
            .get(part.raw_header_offset()..part.raw_body_offset())
            .unwrap_or_default();
        let part_headers = parse_header_block(header_bytes.trim_ascii_start())?;
        let part_type = parse_media_type(part_headers.get("Content-Type").unwrap_or(""))?;
        if part_type.essence == "text/plain" {
            return decode_text_part(data, part, &part_headers, part_type.param("charset"))
                .map(Some);
        }
        closed = delimiter == Delimiter::Close;
    }

    if closed {
        Ok(None)
    } else {
        Err(LookoutError::InvalidPart("missing closing boundary".into()))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Delimiter {
    Next,
    Close,
}

/// The delimiter that follows a part ending at `end`, if any.
///
/// The line break before the delimiter belongs to it.
fn delimiter_after(data: &[u8], end: usize, boundary: &str) -> Option<Delimiter> {
    let rest = data.get(end..)?;
    let rest = rest
        .strip_prefix(b"\r\n")
        .or_else(|| rest.strip_prefix(b"\n"))
        .unwrap_or(rest);
    let rest = rest.strip_prefix(b"--")?.strip_prefix(boundary.as_bytes())?;
    if rest.starts_with(b"--") {
        Some(Delimiter::Close)
    } else {
        Some(Delimiter::Next)
    }
}

/// Split a message at the first blank line into header bytes and body bytes.
fn split_message(data: &[u8]) -> Result<(&[u8], &[u8])> {
    if data.is_empty() {
        return Err(LookoutError::MalformedMessage("empty document".into()));
    }

    // No headers at all: the document starts with the separator.
    if let Some(body) = data.strip_prefix(b"\r\n").or_else(|| data.strip_prefix(b"\n")) {
        return Ok((&[], body));
    }

    match find_header_end(data) {
        Some((end, sep_len)) => Ok((&data[..end], &data[end + sep_len..])),
        None => Err(LookoutError::MalformedMessage(
            "no blank line between headers and body".into(),
        )),
    }
}

/// Offset of the first blank line and the length of the separator there.
fn find_header_end(data: &[u8]) -> Option<(usize, usize)> {
    for i in 0..data.len().saturating_sub(1) {
        if data[i] != b'\n' {
            continue;
        }
        if data[i + 1] == b'\n' {
            return Some((i + 1, 1));
        }
        if data[i + 1] == b'\r' && data.get(i + 2) == Some(&b'\n') {
            return Some((i + 1, 2));
        }
    }
    None
}

/// Transfer-decode a `text/plain` part and turn it into text.
///
/// Only base64 is decoded; any other (or no) transfer encoding is taken verbatim.
/// Decoded from the raw bytes: `mail-parser` keeps broken base64 as plain text.
fn decode_text_part(
    data: &[u8],
    part: &MessagePart<'_>,
    headers: &Headers,
    charset: Option<&str>,
) -> Result<String> {
    let body = data
        .get(part.raw_body_offset()..part.raw_end_offset())
        .unwrap_or_default();
    let is_base64 = headers
        .get("Content-Transfer-Encoding")
        .is_some_and(|cte| cte.trim().eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        let compact: Vec<u8> = body
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(compact)
            .map_err(|e| LookoutError::PartRead(format!("invalid base64: {e}")))?
    } else {
        body.to_vec()
    };

    Ok(match charset {
        Some(charset) => decode_charset(charset, &bytes),
        None => String::from_utf8_lossy(&bytes).into_owned(),
    })
}
