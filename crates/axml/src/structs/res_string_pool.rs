use bitflags::bitflags;
use log::warn;
use winnow::binary::{le_u8, le_u16, le_u32};
use winnow::combinator::repeat;
use winnow::error::{ErrMode, Needed};
use winnow::prelude::*;
use winnow::token::take;

use crate::structs::ResChunkHeader;

bitflags! {
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct StringPoolFlags: u32 {
        /// String indices are sorted by string value
        const SORTED = 1 << 0;

        /// String data is UTF-8 instead of UTF-16
        const UTF8 = 1 << 8;
    }
}

/// Header of an interned string pool chunk
///
/// See: https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=425
#[derive(Debug, Default)]
pub(crate) struct ResStringPoolHeader {
    pub(crate) header: ResChunkHeader,
    pub(crate) string_count: u32,
    pub(crate) style_count: u32,
    pub(crate) flags: u32,

    /// Offset from the chunk start to the raw string data
    pub(crate) strings_start: u32,

    /// Offset from the chunk start to the style data; styles are not decoded
    pub(crate) styles_start: u32,
}

impl ResStringPoolHeader {
    pub fn parse(input: &mut &[u8]) -> ModalResult<ResStringPoolHeader> {
        let header = ResChunkHeader::parse(input)?;
        let (string_count, style_count, flags, strings_start, styles_start) =
            (le_u32, le_u32, le_u32, le_u32, le_u32).parse_next(input)?;

        Ok(ResStringPoolHeader {
            header,
            string_count,
            style_count,
            flags,
            strings_start,
            styles_start,
        })
    }

    #[inline]
    pub fn is_utf8(&self) -> bool {
        StringPoolFlags::from_bits_truncate(self.flags).contains(StringPoolFlags::UTF8)
    }

    /// Get the size of this structure in bytes
    #[inline(always)]
    pub const fn size_of() -> usize {
        ResChunkHeader::size_of() + 4 * 5
    }
}

/// Interned string pool: every string stored once, referenced by index
///
/// A string that fails to decode occupies its index as the empty string so
/// later indices stay aligned with the offset table.
#[derive(Debug, Default)]
pub struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    /// Parse a full string pool chunk, consuming exactly its declared size
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<StringPool> {
        let chunk_start = *input;
        let header = ResStringPoolHeader::parse(input)?;

        // isolate the whole chunk so parsing never leaks into the next one
        let (chunk, rest) = chunk_start
            .split_at_checked(header.header.size as usize)
            .ok_or_else(|| ErrMode::Incomplete(Needed::Unknown))?;
        *input = rest;

        let mut offsets_in = chunk
            .get(ResStringPoolHeader::size_of()..)
            .unwrap_or_default();
        let string_offsets: Vec<u32> =
            repeat(header.string_count as usize, le_u32).parse_next(&mut offsets_in)?;
        // style offsets are skipped; styles_start is unused

        let data = chunk.get(header.strings_start as usize..).unwrap_or_default();

        let is_utf8 = header.is_utf8();
        let mut strings = Vec::with_capacity(header.string_count as usize);
        for &offset in &string_offsets {
            let decoded = data.get(offset as usize..).and_then(|slice| {
                let mut cursor = slice;
                Self::parse_string(&mut cursor, is_utf8).ok()
            });

            match decoded {
                Some(s) => strings.push(s),
                None => {
                    warn!("string {} failed to decode, keeping empty", strings.len());
                    strings.push(String::new());
                }
            }
        }

        Ok(StringPool { strings })
    }

    fn parse_string(input: &mut &[u8], is_utf8: bool) -> ModalResult<String> {
        let string = if !is_utf8 {
            // utf-16: 16-bit char length, high bit extends to a 31-bit length
            let u16len = le_u16(input)?;

            let real_len = if u16len & 0x8000 != 0 {
                let u16len_fix: u16 = le_u16(input)?;
                ((((u16len & 0x7fff) as u32) << 16) | u16len_fix as u32) as usize
            } else {
                u16len as usize
            };

            let content = take(real_len * 2).parse_next(input)?;

            Self::read_utf16(content, real_len)
        } else {
            // utf-8: varint char length, then varint byte length
            let length1 = le_u8(input)?;
            if length1 & 0x80 != 0 {
                let _ = le_u8(input)?;
            }

            let byte_len1 = le_u8(input)?;
            let byte_len = if byte_len1 & 0x80 != 0 {
                let byte_len2 = le_u8(input)?;
                (((byte_len1 as u16 & !0x80) << 8) | byte_len2 as u16) as u32
            } else {
                byte_len1 as u32
            };

            let content = take(byte_len).parse_next(input)?;

            String::from_utf8_lossy(content).to_string()
        };

        Ok(string)
    }

    fn read_utf16(slice: &[u8], size: usize) -> String {
        std::char::decode_utf16(
            slice
                .chunks_exact(2)
                .take(size)
                .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]])),
        )
        .collect::<Result<String, _>>()
        .unwrap_or_default()
    }

    /// Lookup by pool index; `None` when out of range
    #[inline]
    pub fn get(&self, idx: u32) -> Option<&str> {
        self.strings.get(idx as usize).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_strings(strings: Vec<String>) -> StringPool {
        StringPool { strings }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode a UTF-8 string pool chunk the way aapt2 lays it out
    pub(crate) fn encode_utf8_pool(strings: &[&str]) -> Vec<u8> {
        let mut data = Vec::new();
        let mut offsets = Vec::new();

        for s in strings {
            offsets.push(data.len() as u32);
            // char length and byte length both fit in one byte for test data
            data.push(s.chars().count() as u8);
            data.push(s.len() as u8);
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        }
        while data.len() % 4 != 0 {
            data.push(0);
        }

        let strings_start = ResStringPoolHeader::size_of() as u32 + 4 * strings.len() as u32;
        let size = strings_start + data.len() as u32;

        let mut out = Vec::new();
        out.extend_from_slice(&0x0001u16.to_le_bytes()); // chunk type
        out.extend_from_slice(&28u16.to_le_bytes()); // header size
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&(strings.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // style count
        out.extend_from_slice(&(1u32 << 8).to_le_bytes()); // utf-8 flag
        out.extend_from_slice(&strings_start.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // styles start
        for off in offsets {
            out.extend_from_slice(&off.to_le_bytes());
        }
        out.extend_from_slice(&data);
        out
    }

    fn encode_utf16_pool(strings: &[&str]) -> Vec<u8> {
        let mut data = Vec::new();
        let mut offsets = Vec::new();

        for s in strings {
            offsets.push(data.len() as u32);
            let units: Vec<u16> = s.encode_utf16().collect();
            data.extend_from_slice(&(units.len() as u16).to_le_bytes());
            for unit in &units {
                data.extend_from_slice(&unit.to_le_bytes());
            }
            data.extend_from_slice(&0u16.to_le_bytes());
        }

        let strings_start = ResStringPoolHeader::size_of() as u32 + 4 * strings.len() as u32;
        let size = strings_start + data.len() as u32;

        let mut out = Vec::new();
        out.extend_from_slice(&0x0001u16.to_le_bytes());
        out.extend_from_slice(&28u16.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&(strings.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // utf-16
        out.extend_from_slice(&strings_start.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        for off in offsets {
            out.extend_from_slice(&off.to_le_bytes());
        }
        out.extend_from_slice(&data);
        out
    }

    #[test]
    fn utf8_pool_round() {
        let bytes = encode_utf8_pool(&["manifest", "package", "com.example.app"]);
        let pool = StringPool::parse(&mut &bytes[..]).unwrap();

        assert_eq!(pool.len(), 3);
        assert_eq!(pool.get(0), Some("manifest"));
        assert_eq!(pool.get(2), Some("com.example.app"));
        assert_eq!(pool.get(3), None);
    }

    #[test]
    fn utf16_pool_round() {
        let bytes = encode_utf16_pool(&["activity", "ラベル"]);
        let pool = StringPool::parse(&mut &bytes[..]).unwrap();

        assert_eq!(pool.get(0), Some("activity"));
        assert_eq!(pool.get(1), Some("ラベル"));
    }

    #[test]
    fn bad_offset_decodes_to_empty_string() {
        let mut bytes = encode_utf8_pool(&["ok", "broken"]);
        // corrupt the second string offset to point past the data region
        let off_pos = ResStringPoolHeader::size_of() + 4;
        bytes[off_pos..off_pos + 4].copy_from_slice(&0xffff_0000u32.to_le_bytes());

        let pool = StringPool::parse(&mut &bytes[..]).unwrap();
        assert_eq!(pool.get(0), Some("ok"));
        assert_eq!(pool.get(1), Some(""));
    }

    #[test]
    fn pool_consumes_exactly_declared_size() {
        let mut bytes = encode_utf8_pool(&["a"]);
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        let mut input = &bytes[..];
        let _ = StringPool::parse(&mut input).unwrap();
        assert_eq!(input, &[0xde, 0xad, 0xbe, 0xef]);
    }
}
