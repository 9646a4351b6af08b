/*
 * This file is a part of glintdb
 * glintdb is an in-memory key-value server speaking a partial
 * implementation of RESP3 over TCP.
 *
 * Copyright (c) glintdb contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! RESP decoding, validation and encoding.
//!
//! Decoding is zero-copy for every scalar kind: a [`DataView`] borrows its
//! payload directly out of the buffer it was decoded from. `Array` is the one
//! kind that allocates, since it must hold a sequence of child views.

pub mod responses;
mod scanner;

use crate::util::compiler::unlikely;
use scanner::BufferedScanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    SimpleString,
    SimpleError,
    Integer,
    Boolean,
    Double,
    Null,
    Array,
    BulkString,
}

/// A decoded, validated element. Holds a view into the buffer it was parsed
/// from; it is only valid as long as that buffer is alive.
#[derive(Debug, Clone)]
pub struct DataView<'a> {
    kind: DataKind,
    payload: &'a [u8],
    children: Vec<DataView<'a>>,
}

impl<'a> DataView<'a> {
    pub fn kind(&self) -> DataKind {
        self.kind
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self.kind {
            DataKind::SimpleString | DataKind::BulkString => Some(self.payload),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if self.kind != DataKind::Boolean {
            return None;
        }
        match self.payload {
            b"t" | b"T" => Some(true),
            b"f" | b"F" => Some(false),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        if self.kind != DataKind::Integer {
            return None;
        }
        std::str::from_utf8(self.payload).ok()?.parse().ok()
    }

    pub fn as_f64(&self) -> Option<f64> {
        if self.kind != DataKind::Double {
            return None;
        }
        let s = std::str::from_utf8(self.payload).ok()?;
        // the wire allows both '.' and ',' as the decimal separator
        let normalized = s.replace(',', ".");
        normalized.parse().ok()
    }

    pub fn as_array(&self) -> Option<&[DataView<'a>]> {
        if self.kind != DataKind::Array {
            return None;
        }
        Some(&self.children)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// truncated input — more bytes might complete a valid element. Distinct
    /// from `Invalid` so a connection loop could choose to wait for more
    /// bytes instead of replying with an error immediately; this build's
    /// connection loop doesn't do that (see §9: fragmentation across reads
    /// is a known non-goal), so today `Incomplete` is handled identically to
    /// `Invalid` at the call site, but the decoder itself keeps the two
    /// apart.
    Incomplete,
    /// decoding failed for a reason that will not be fixed by more bytes
    Invalid(&'static str),
}

impl DecodeError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Incomplete => "truncated input",
            Self::Invalid(m) => m,
        }
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete)
    }
}

type DecodeResult<'a> = Result<DataView<'a>, DecodeError>;

/// Decode a single element starting at the beginning of `buf`.
///
/// On success returns the parsed view and the number of bytes consumed.
/// Never scans past the outermost element.
pub fn decode(buf: &[u8]) -> Result<(DataView<'_>, usize), DecodeError> {
    let mut scanner = BufferedScanner::new(buf);
    let view = decode_one(&mut scanner)?;
    Ok((view, scanner.cursor()))
}

fn decode_one<'a>(scanner: &mut BufferedScanner<'a>) -> DecodeResult<'a> {
    let tag = scanner.try_next_byte().ok_or(DecodeError::Incomplete)?;
    match tag {
        b'*' => decode_array(scanner),
        b'$' => decode_bulk_string(scanner),
        b'+' => decode_scalar_line(scanner, DataKind::SimpleString),
        b'-' => decode_scalar_line(scanner, DataKind::SimpleError),
        b':' => decode_scalar_line(scanner, DataKind::Integer),
        b',' => decode_scalar_line(scanner, DataKind::Double),
        b'#' => decode_scalar_line(scanner, DataKind::Boolean),
        b'_' => decode_scalar_line(scanner, DataKind::Null),
        _ => Err(DecodeError::Invalid("unsupported type byte")),
    }
}

fn decode_scalar_line<'a>(
    scanner: &mut BufferedScanner<'a>,
    kind: DataKind,
) -> DecodeResult<'a> {
    let line = scanner.try_next_line().ok_or(DecodeError::Incomplete)?;
    validate_scalar(kind, line)?;
    Ok(DataView {
        kind,
        payload: line,
        children: Vec::new(),
    })
}

fn validate_scalar(kind: DataKind, payload: &[u8]) -> Result<(), DecodeError> {
    match kind {
        DataKind::SimpleString | DataKind::SimpleError => Ok(()),
        DataKind::Integer => validate_integral(payload),
        DataKind::Double => validate_double(payload),
        DataKind::Boolean => validate_boolean(payload),
        DataKind::Null => validate_null(payload),
        DataKind::Array | DataKind::BulkString => unreachable!(),
    }
}

fn validate_integral(payload: &[u8]) -> Result<(), DecodeError> {
    let digits = match payload.first() {
        Some(b'-') => &payload[1..],
        _ => payload,
    };
    if unlikely(digits.is_empty()) {
        return Err(DecodeError::Invalid("unable to parse string as an integral type"));
    }
    if digits.iter().all(u8::is_ascii_digit) {
        Ok(())
    } else {
        Err(DecodeError::Invalid("unable to parse string as an integral type"))
    }
}

fn validate_double(payload: &[u8]) -> Result<(), DecodeError> {
    let digits = match payload.first() {
        Some(b'-') => &payload[1..],
        _ => payload,
    };
    if unlikely(digits.is_empty()) {
        return Err(DecodeError::Invalid("unable to parse string as a double type"));
    }
    let mut seen_separator = false;
    for &b in digits {
        if b == b'.' || b == b',' {
            if seen_separator {
                return Err(DecodeError::Invalid("unable to parse string as a double type"));
            }
            seen_separator = true;
        } else if !b.is_ascii_digit() {
            return Err(DecodeError::Invalid("unable to parse string as a double type"));
        }
    }
    Ok(())
}

fn validate_boolean(payload: &[u8]) -> Result<(), DecodeError> {
    match payload {
        b"t" | b"T" | b"f" | b"F" => Ok(()),
        _ => Err(DecodeError::Invalid("unable to parse string as a boolean type")),
    }
}

fn validate_null(payload: &[u8]) -> Result<(), DecodeError> {
    if payload.is_empty() {
        Ok(())
    } else {
        Err(DecodeError::Invalid("unable to parse string as a null type"))
    }
}

fn decode_length_prefix(scanner: &mut BufferedScanner<'_>) -> Result<i64, DecodeError> {
    let line = scanner.try_next_line().ok_or(DecodeError::Incomplete)?;
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(DecodeError::Invalid("non-digit length"))
}

fn decode_bulk_string<'a>(scanner: &mut BufferedScanner<'a>) -> DecodeResult<'a> {
    let len = decode_length_prefix(scanner)?;
    if len == -1 {
        return Ok(DataView {
            kind: DataKind::Null,
            payload: &[],
            children: Vec::new(),
        });
    }
    if len < 0 {
        return Err(DecodeError::Invalid("negative bulk string length"));
    }
    let len = len as usize;
    let payload = scanner
        .try_next_block(len)
        .ok_or(DecodeError::Incomplete)?;
    // consume the trailing CRLF: not enough bytes left is incomplete, bytes
    // present but not `\r\n` is a genuine framing error
    match scanner.try_next_block(2) {
        Some(b"\r\n") => {}
        Some(_) => return Err(DecodeError::Invalid("bulk string missing terminator")),
        None => return Err(DecodeError::Incomplete),
    }
    Ok(DataView {
        kind: DataKind::BulkString,
        payload,
        children: Vec::new(),
    })
}

fn decode_array<'a>(scanner: &mut BufferedScanner<'a>) -> DecodeResult<'a> {
    let count = decode_length_prefix(scanner)?;
    if count < 0 {
        return Err(DecodeError::Invalid("negative array length"));
    }
    let start = scanner.cursor();
    let mut children = Vec::with_capacity(count as usize);
    for _ in 0..count {
        children.push(decode_one(scanner)?);
    }
    let end = scanner.cursor();
    let _ = (start, end); // the array's range spans [start, end) in the source buffer
    Ok(DataView {
        kind: DataKind::Array,
        payload: &[],
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_string() {
        let (v, n) = decode(b"+OK\r\n").unwrap();
        assert_eq!(v.kind(), DataKind::SimpleString);
        assert_eq!(v.as_bytes().unwrap(), b"OK");
        assert_eq!(n, 5);
    }

    #[test]
    fn decodes_integer_with_sign() {
        let (v, _) = decode(b":-42\r\n").unwrap();
        assert_eq!(v.as_i64(), Some(-42));
    }

    #[test]
    fn rejects_integer_overflow() {
        let (v, _) = decode(b":999999999999999999999999\r\n").unwrap();
        assert_eq!(v.as_i64(), None);
    }

    #[test]
    fn decodes_double_with_comma_separator() {
        let (v, _) = decode(b",3,14\r\n").unwrap();
        assert_eq!(v.as_f64(), Some(3.14));
    }

    #[test]
    fn rejects_double_with_two_separators() {
        let err = decode(b",3.1.4\r\n").unwrap_err();
        assert_eq!(err, DecodeError::Invalid("unable to parse string as a double type"));
    }

    #[test]
    fn decodes_boolean() {
        let (v, _) = decode(b"#t\r\n").unwrap();
        assert_eq!(v.as_bool(), Some(true));
    }

    #[test]
    fn rejects_illegal_boolean() {
        assert!(decode(b"#x\r\n").is_err());
    }

    #[test]
    fn decodes_null() {
        let (v, _) = decode(b"_\r\n").unwrap();
        assert_eq!(v.kind(), DataKind::Null);
    }

    #[test]
    fn decodes_empty_bulk_string() {
        let (v, n) = decode(b"$0\r\n\r\n").unwrap();
        assert_eq!(v.as_bytes().unwrap(), b"");
        assert_eq!(n, 6);
    }

    #[test]
    fn decodes_negative_one_bulk_string_as_null() {
        let (v, _) = decode(b"$-1\r\n").unwrap();
        assert_eq!(v.kind(), DataKind::Null);
    }

    #[test]
    fn rejects_truncated_bulk_string() {
        let err = decode(b"$5\r\nhi\r\n").unwrap_err();
        assert!(err.is_incomplete());
    }

    #[test]
    fn incomplete_is_distinct_from_invalid() {
        // a declared type byte with nothing after it: more bytes could
        // complete this into a valid element, so it's Incomplete, not Invalid
        assert_eq!(decode(b"$5").unwrap_err(), DecodeError::Incomplete);
        assert_eq!(decode(b"").unwrap_err(), DecodeError::Incomplete);
        // an unsupported type byte can never become valid no matter how many
        // more bytes arrive
        assert_eq!(
            decode(b"@foo\r\n").unwrap_err(),
            DecodeError::Invalid("unsupported type byte")
        );
    }

    #[test]
    fn decodes_array_with_contiguous_children() {
        let (v, n) = decode(b"*2\r\n$4\r\nPING\r\n$4\r\nPONG\r\n").unwrap();
        let children = v.as_array().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].as_bytes().unwrap(), b"PING");
        assert_eq!(children[1].as_bytes().unwrap(), b"PONG");
        assert_eq!(n, b"*2\r\n$4\r\nPING\r\n$4\r\nPONG\r\n".len());
    }

    #[test]
    fn array_child_decode_error_propagates() {
        let err = decode(b"*1\r\n#x\r\n").unwrap_err();
        assert_eq!(err, DecodeError::Invalid("unable to parse string as a boolean type"));
    }

    #[test]
    fn malformed_request_not_an_array() {
        // still decodes fine as a scalar; it's the dispatcher's job to reject
        // non-array requests per the wire contract
        let (v, _) = decode(b"+PING\r\n").unwrap();
        assert_eq!(v.kind(), DataKind::SimpleString);
    }
}
