/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Binary sidecar for message headers.
//!
//! Layout, all integers `u32` little-endian:
//!
//! ```text
//! [count] then per entry: [key length][key utf-8][value length][value utf-8]
//! ```
//!
//! Entries are written in key order so the same map always encodes to the
//! same bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

const LENGTH_PREFIX: usize = std::mem::size_of::<u32>();

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HeaderField {
    Count,
    KeyLength,
    Key,
    ValueLength,
    Value,
}

impl Display for HeaderField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HeaderField::Count => "entry count",
            HeaderField::KeyLength => "key length",
            HeaderField::Key => "key",
            HeaderField::ValueLength => "value length",
            HeaderField::Value => "value",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum HeadersCodecError {
    #[error("{field} of entry {entry} is truncated at offset {offset}: needs {needed} bytes, {available} available")]
    Truncated {
        field: HeaderField,
        entry: usize,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("{field} of entry {entry} at offset {offset} is not valid UTF-8")]
    InvalidUtf8 {
        field: HeaderField,
        entry: usize,
        offset: usize,
    },
    #[error("key '{key}' appears more than once")]
    DuplicateKey { key: String },
    #[error("{count} unexpected bytes after the last entry")]
    TrailingBytes { count: usize },
    #[error("{field} of header '{key}' is {length} bytes, more than the format allows")]
    TooLarge {
        field: HeaderField,
        key: String,
        length: usize,
    },
}

pub fn encode(headers: &HashMap<String, String>) -> Result<Bytes, HeadersCodecError> {
    let mut entries: Vec<(&String, &String)> = headers.iter().collect();
    entries.sort_unstable_by(|left, right| left.0.cmp(right.0));

    let payload_len: usize = entries
        .iter()
        .map(|(key, value)| 2 * LENGTH_PREFIX + key.len() + value.len())
        .sum();
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX + payload_len);

    let count = u32::try_from(entries.len()).map_err(|_| HeadersCodecError::TooLarge {
        field: HeaderField::Count,
        key: String::new(),
        length: entries.len(),
    })?;
    buf.put_u32_le(count);

    for (key, value) in entries {
        put_string(&mut buf, key, key, HeaderField::KeyLength)?;
        put_string(&mut buf, key, value, HeaderField::ValueLength)?;
    }
    Ok(buf.freeze())
}

fn put_string(
    buf: &mut BytesMut,
    key: &str,
    value: &str,
    field: HeaderField,
) -> Result<(), HeadersCodecError> {
    let length = u32::try_from(value.len()).map_err(|_| HeadersCodecError::TooLarge {
        field,
        key: key.to_string(),
        length: value.len(),
    })?;
    buf.put_u32_le(length);
    buf.put_slice(value.as_bytes());
    Ok(())
}

pub fn decode(payload: &[u8]) -> Result<HashMap<String, String>, HeadersCodecError> {
    let mut reader = Reader {
        buf: payload,
        total: payload.len(),
    };

    let count = reader.read_u32(HeaderField::Count, 0)? as usize;
    // Every entry needs at least two prefixes; never trust `count` for allocation.
    let mut headers = HashMap::with_capacity(count.min(reader.buf.remaining() / (2 * LENGTH_PREFIX)));

    for entry in 0..count {
        let key_len = reader.read_u32(HeaderField::KeyLength, entry)? as usize;
        let key = reader.read_string(HeaderField::Key, entry, key_len)?;
        let value_len = reader.read_u32(HeaderField::ValueLength, entry)? as usize;
        let value = reader.read_string(HeaderField::Value, entry, value_len)?;

        if headers.contains_key(&key) {
            return Err(HeadersCodecError::DuplicateKey { key });
        }
        headers.insert(key, value);
    }

    if reader.buf.has_remaining() {
        return Err(HeadersCodecError::TrailingBytes {
            count: reader.buf.remaining(),
        });
    }
    Ok(headers)
}

struct Reader<'a> {
    buf: &'a [u8],
    total: usize,
}

impl Reader<'_> {
    fn offset(&self) -> usize {
        self.total - self.buf.remaining()
    }

    fn ensure(&self, field: HeaderField, entry: usize, needed: usize) -> Result<(), HeadersCodecError> {
        if self.buf.remaining() < needed {
            return Err(HeadersCodecError::Truncated {
                field,
                entry,
                offset: self.offset(),
                needed,
                available: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn read_u32(&mut self, field: HeaderField, entry: usize) -> Result<u32, HeadersCodecError> {
        self.ensure(field, entry, LENGTH_PREFIX)?;
        Ok(self.buf.get_u32_le())
    }

    fn read_string(
        &mut self,
        field: HeaderField,
        entry: usize,
        length: usize,
    ) -> Result<String, HeadersCodecError> {
        self.ensure(field, entry, length)?;
        let offset = self.offset();
        let (raw, rest) = self.buf.split_at(length);
        self.buf = rest;
        String::from_utf8(raw.to_vec())
            .map_err(|_| HeadersCodecError::InvalidUtf8 { field, entry, offset })
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, HeaderField, HeadersCodecError};
    use std::collections::HashMap;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn empty_map_is_a_bare_count() {
        let encoded = encode(&HashMap::new()).unwrap();
        assert_eq!(encoded.as_ref(), &[0, 0, 0, 0]);
        assert!(decode(&encoded).unwrap().is_empty());
    }

    #[test]
    fn layout_is_little_endian_and_sorted() {
        let encoded = encode(&headers(&[("b", ""), ("a", "xy")])).unwrap();
        assert_eq!(
            encoded.as_ref(),
            &[
                2, 0, 0, 0, //
                1, 0, 0, 0, b'a', 2, 0, 0, 0, b'x', b'y', //
                1, 0, 0, 0, b'b', 0, 0, 0, 0,
            ]
        );
    }

    #[test]
    fn round_trips_empty_values_and_large_entries() {
        let long_key = "k".repeat(4 * 1024);
        let long_value = "värde-".repeat(2 * 1024);
        let original = headers(&[
            ("MessageId", "0f5c"),
            ("Empty", ""),
            (&long_key, &long_value),
        ]);

        let encoded = encode(&original).unwrap();
        assert_eq!(decode(&encoded).unwrap(), original);
        assert_eq!(encode(&original).unwrap(), encoded);
    }

    #[test]
    fn truncated_value_names_the_field() {
        let mut encoded = encode(&headers(&[("key", "value")])).unwrap().to_vec();
        encoded.truncate(encoded.len() - 2);

        assert_eq!(
            decode(&encoded),
            Err(HeadersCodecError::Truncated {
                field: HeaderField::Value,
                entry: 0,
                offset: 15,
                needed: 5,
                available: 3,
            })
        );
    }

    #[test]
    fn truncated_count_and_oversized_count_fail() {
        assert!(matches!(
            decode(&[1, 0]),
            Err(HeadersCodecError::Truncated {
                field: HeaderField::Count,
                ..
            })
        ));
        assert!(matches!(
            decode(&[0xff, 0xff, 0xff, 0xff]),
            Err(HeadersCodecError::Truncated {
                field: HeaderField::KeyLength,
                entry: 0,
                ..
            })
        ));
    }

    #[test]
    fn invalid_utf8_and_trailing_bytes_are_rejected() {
        let bad_key = [1, 0, 0, 0, 1, 0, 0, 0, 0xff, 0, 0, 0, 0];
        assert_eq!(
            decode(&bad_key),
            Err(HeadersCodecError::InvalidUtf8 {
                field: HeaderField::Key,
                entry: 0,
                offset: 8,
            })
        );

        let mut trailing = encode(&HashMap::new()).unwrap().to_vec();
        trailing.push(9);
        assert_eq!(
            decode(&trailing),
            Err(HeadersCodecError::TrailingBytes { count: 1 })
        );
    }

    #[test]
    fn duplicate_keys_are_corruption() {
        let duplicated = [
            2, 0, 0, 0, //
            1, 0, 0, 0, b'a', 0, 0, 0, 0, //
            1, 0, 0, 0, b'a', 0, 0, 0, 0,
        ];
        assert_eq!(
            decode(&duplicated),
            Err(HeadersCodecError::DuplicateKey {
                key: "a".to_string()
            })
        );
    }
}
