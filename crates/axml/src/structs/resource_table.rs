use std::fmt;

use log::warn;
use winnow::binary::{le_u16, le_u32, u8};
use winnow::combinator::repeat;
use winnow::error::{ErrMode, Needed};
use winnow::prelude::*;
use winnow::token::take;

use crate::structs::{ResChunkHeader, ResTableConfig, ResourceType, ResourceValue, StringPool};

/// Offset value marking an entry as absent for a configuration
pub(crate) const NO_ENTRY: u32 = u32::MAX;

/// Header for a resource table
///
/// See: https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=906
#[derive(Debug)]
pub(crate) struct ResTableHeader {
    pub(crate) header: ResChunkHeader,

    /// The number of [ResTablePackage] structures
    pub(crate) package_count: u32,
}

impl ResTableHeader {
    #[inline(always)]
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTableHeader> {
        (ResChunkHeader::parse, le_u32)
            .map(|(header, package_count)| ResTableHeader {
                header,
                package_count,
            })
            .parse_next(input)
    }
}

/// A collection of resource data types within a package
///
/// Followed by one or more type and type-spec chunks containing the entry
/// values for each resource type.
///
/// See: https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=919
pub(crate) struct ResTablePackageHeader {
    pub(crate) header: ResChunkHeader,

    /// Package IDs start at 1 (matching the package bits of a resource id);
    /// 0 means this is not a base package
    pub(crate) id: u32,

    /// Actual name of this package, \0-terminated UTF-16, 128 code units
    pub(crate) name: [u8; 256],

    /// Offset to the string pool defining the resource type symbol table
    pub(crate) type_strings: u32,

    /// Last index into `type_strings` that is for public use by others
    pub(crate) last_public_type: u32,

    /// Offset to the string pool defining the resource key symbol table
    pub(crate) key_strings: u32,

    /// Last index into `key_strings` that is for public use by others
    pub(crate) last_public_key: u32,

    /// Absent in old table versions; detected through the header size
    pub(crate) type_id_offset: u32,
}

impl ResTablePackageHeader {
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTablePackageHeader> {
        let (header, id, name, type_strings, last_public_type, key_strings, last_public_key) = (
            ResChunkHeader::parse,
            le_u32,
            take(256usize),
            le_u32,
            le_u32,
            le_u32,
            le_u32,
        )
            .parse_next(input)?;

        let name: [u8; 256] = name.try_into().unwrap_or([0; 256]);
        let header_size = header.header_size;
        let expected_size = Self::size_of() as u16;

        let mut type_id_offset = 0;

        match header_size {
            s if s == expected_size => {
                // new structure, with type_id_offset
                type_id_offset = le_u32.parse_next(input)?;
            }
            s if s == expected_size - 4 => {
                // old structure, without type_id_offset
            }
            _ => {
                // malformed structure
                type_id_offset = le_u32.parse_next(input)?;

                let skipped = header_size.saturating_sub(expected_size);
                let _ = take(skipped as usize).parse_next(input)?;
                warn!(
                    "malformed resource table package, skipped {} bytes",
                    skipped
                );
            }
        }

        Ok(ResTablePackageHeader {
            header,
            id,
            name,
            type_strings,
            last_public_type,
            key_strings,
            last_public_key,
            type_id_offset,
        })
    }

    /// Get the real package name from the fixed-width `name` field
    pub(crate) fn name(&self) -> String {
        let utf16_str: Vec<u16> = self
            .name
            .chunks_exact(2)
            .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
            .take_while(|&c| c != 0)
            .collect();

        String::from_utf16(&utf16_str).unwrap_or_default()
    }

    /// Get size in bytes of this structure
    #[inline(always)]
    pub(crate) const fn size_of() -> usize {
        // header - ResChunkHeader
        // 4 bytes - id
        // 256 bytes - name
        // 4 bytes - type_strings
        // 4 bytes - last_public_type
        // 4 bytes - key_strings
        // 4 bytes - last_public_key
        // 4 bytes - type_id_offset
        ResChunkHeader::size_of() + 4 + 256 + 4 + 4 + 4 + 4 + 4
    }
}

impl fmt::Debug for ResTablePackageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResTablePackageHeader")
            .field("header", &self.header)
            .field("id", &self.id)
            .field("name", &self.name())
            .field("type_strings", &self.type_strings)
            .field("key_strings", &self.key_strings)
            .finish()
    }
}

/// A specification of the resources defined by a particular type
///
/// Retained for completeness; the configuration matcher does not consult the
/// per-entry flag words.
#[derive(Debug)]
pub(crate) struct ResTableTypeSpec {
    pub(crate) id: u8,
    pub(crate) res0: u8,
    pub(crate) types_count: u16,
    pub(crate) entry_count: u32,
    pub(crate) type_spec_flags: Vec<u32>,
}

impl ResTableTypeSpec {
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTableTypeSpec> {
        let (id, res0, types_count, entry_count) = (u8, u8, le_u16, le_u32).parse_next(input)?;
        let type_spec_flags = repeat(entry_count as usize, le_u32).parse_next(input)?;

        Ok(ResTableTypeSpec {
            id,
            res0,
            types_count,
            entry_count,
            type_spec_flags,
        })
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct ResTableEntryFlags: u16 {
        /// If set, this is a complex entry, holding a set of name/value mappings
        const FLAG_COMPLEX = 0x0001;

        /// If set, this resource has been declared public
        const FLAG_PUBLIC = 0x0002;

        /// If set, this is a weak resource and may be overridden
        const FLAG_WEAK = 0x0004;

        /// If set, this is a compact entry with type and value encoded inline
        const FLAG_COMPACT = 0x0008;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct ResTableTypeFlags: u8 {
        /// Entries are (id, offset) pairs sorted for binary search
        const SPARSE   = 0x01;

        /// Entry offsets are 16-bit, real_offset = offset * 4, 0xffff = absent
        const OFFSET16 = 0x02;
    }
}

/// One decoded entry: key-name index plus its value
#[derive(Debug)]
pub(crate) struct ResTableEntry {
    /// Reference into the package key-name pool
    pub(crate) key_index: u32,

    pub(crate) value: ResTableEntryValue,
}

#[derive(Debug)]
pub(crate) enum ResTableEntryValue {
    /// Simple typed value
    Value(ResourceValue),

    /// Name/value mappings inheriting from `parent` (0 if none)
    Complex {
        parent: u32,
        values: Vec<(u32, ResourceValue)>,
    },
}

impl ResTableEntry {
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTableEntry> {
        let (size_or_key, flags, index_or_data) = (le_u16, le_u16, le_u32).parse_next(input)?;
        let flag_bits = ResTableEntryFlags::from_bits_truncate(flags);

        if flag_bits.contains(ResTableEntryFlags::FLAG_COMPACT) {
            // compact layout reuses the size field as the key index and the
            // index field as the data, with the type tag in the flag high byte
            return Ok(ResTableEntry {
                key_index: size_or_key as u32,
                value: ResTableEntryValue::Value(ResourceValue {
                    size: 8,
                    res0: 0,
                    data_type: (flags >> 8) as u8,
                    data: index_or_data,
                }),
            });
        }

        if flag_bits.contains(ResTableEntryFlags::FLAG_COMPLEX) {
            let (parent, count) = (le_u32, le_u32).parse_next(input)?;
            let values = repeat(count as usize, (le_u32, ResourceValue::parse)).parse_next(input)?;

            return Ok(ResTableEntry {
                key_index: index_or_data,
                value: ResTableEntryValue::Complex { parent, values },
            });
        }

        Ok(ResTableEntry {
            key_index: index_or_data,
            value: ResTableEntryValue::Value(ResourceValue::parse(input)?),
        })
    }
}

/// A collection of resource entries for a specific resource data type under
/// one configuration. Multiple chunks with the same type id carry the
/// variants of the same resources.
///
/// See: https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=1500
#[derive(Debug)]
pub(crate) struct ResTableType {
    /// Type IDs start at 1 (matching the type bits of a resource id)
    pub(crate) id: u8,

    pub(crate) flags: u8,

    /// Configuration this collection of entries is designed for
    pub(crate) config: ResTableConfig,

    /// Entries indexed by entry id; `None` where absent for this config
    pub(crate) entries: Vec<Option<ResTableEntry>>,
}

impl ResTableType {
    /// `chunk` covers the whole type chunk from its header start
    pub(crate) fn parse(header: ResChunkHeader, chunk: &[u8]) -> ModalResult<ResTableType> {
        let mut input = chunk
            .get(ResChunkHeader::size_of()..)
            .unwrap_or_default();

        let (id, flags, _reserved, entry_count, entries_start) =
            (u8, u8, le_u16, le_u32, le_u32).parse_next(&mut input)?;

        let config = ResTableConfig::parse(&mut input)?;

        if Self::is_sparse(flags) {
            warn!("sparse type chunk for type {} is not decoded", id);
            return Ok(ResTableType {
                id,
                flags,
                config,
                entries: (0..entry_count).map(|_| None).collect(),
            });
        }

        // entry offsets follow the declared header size
        let mut offsets_in = chunk
            .get(header.header_size as usize..)
            .ok_or_else(|| ErrMode::Incomplete(Needed::Unknown))?;

        let entry_offsets: Vec<u32> = if Self::is_offset16(flags) {
            repeat(entry_count as usize, le_u16.map(|x| x as u32)).parse_next(&mut offsets_in)?
        } else {
            repeat(entry_count as usize, le_u32).parse_next(&mut offsets_in)?
        };

        let entries_slice = chunk
            .get(entries_start as usize..)
            .ok_or_else(|| ErrMode::Incomplete(Needed::Unknown))?;

        let entries = entry_offsets
            .iter()
            .map(|&offset| {
                let offset = if Self::is_offset16(flags) {
                    if offset as u16 == u16::MAX {
                        NO_ENTRY
                    } else {
                        offset * 4
                    }
                } else {
                    offset
                };

                if offset == NO_ENTRY {
                    return Ok(None);
                }

                let mut slice = entries_slice
                    .get(offset as usize..)
                    .ok_or_else(|| ErrMode::Incomplete(Needed::Unknown))?;

                ResTableEntry::parse(&mut slice).map(Some)
            })
            .collect::<ModalResult<_>>()?;

        Ok(ResTableType {
            id,
            flags,
            config,
            entries,
        })
    }

    #[inline(always)]
    pub(crate) fn is_sparse(flags: u8) -> bool {
        ResTableTypeFlags::from_bits_truncate(flags).contains(ResTableTypeFlags::SPARSE)
    }

    #[inline(always)]
    pub(crate) fn is_offset16(flags: u8) -> bool {
        ResTableTypeFlags::from_bits_truncate(flags).contains(ResTableTypeFlags::OFFSET16)
    }
}

/// One package chunk: symbol pools plus the ordered sequence of type chunks
#[derive(Debug)]
pub(crate) struct ResTablePackage {
    pub(crate) header: ResTablePackageHeader,
    pub(crate) type_strings: StringPool,
    pub(crate) key_strings: StringPool,

    /// Type chunks in declaration order; the same type id repeats once per
    /// configuration variant
    pub(crate) types: Vec<ResTableType>,
}

impl ResTablePackage {
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<ResTablePackage> {
        let chunk_start = *input;
        let package_header = ResTablePackageHeader::parse(input)?;

        // isolate the package chunk; children cannot leak past it
        let (chunk, rest) = chunk_start
            .split_at_checked(package_header.header.size as usize)
            .ok_or_else(|| ErrMode::Incomplete(Needed::Unknown))?;
        *input = rest;

        let mut children = chunk
            .get(package_header.header.header_size as usize..)
            .unwrap_or_default();

        let mut type_strings = None;
        let mut key_strings = None;
        let mut types = Vec::new();

        while children.len() >= ResChunkHeader::size_of() {
            let child_start = children;
            let header = ResChunkHeader::parse(&mut children)?;

            if (header.size as usize) < ResChunkHeader::size_of() {
                return Err(ErrMode::Incomplete(Needed::Unknown));
            }

            let (child, rest) = child_start
                .split_at_checked(header.size as usize)
                .ok_or_else(|| ErrMode::Incomplete(Needed::Unknown))?;
            children = rest;

            let mut body = child
                .get(ResChunkHeader::size_of()..)
                .unwrap_or_default();

            match header.type_ {
                ResourceType::StringPool => {
                    // first pool holds type names, second holds key names
                    let mut pool_input = child;
                    let pool = StringPool::parse(&mut pool_input)?;
                    if type_strings.is_none() {
                        type_strings = Some(pool);
                    } else if key_strings.is_none() {
                        key_strings = Some(pool);
                    } else {
                        warn!("extra string pool in package chunk, ignored");
                    }
                }
                ResourceType::TableTypeSpec => {
                    let _ = ResTableTypeSpec::parse(&mut body)?;
                }
                ResourceType::TableType => {
                    types.push(ResTableType::parse(header, child)?);
                }
                _ => warn!("skipping chunk {:?} inside package", header.type_),
            }
        }

        Ok(ResTablePackage {
            header: package_header,
            type_strings: type_strings.unwrap_or_default(),
            key_strings: key_strings.unwrap_or_default(),
            types,
        })
    }
}
