use std::fmt;

use winnow::binary::{le_u8, le_u16, le_u32};
use winnow::prelude::*;

use crate::structs::StringPool;

/// Chunk type identifiers shared by the binary XML and resource table formats
///
/// See: https://cs.android.com/android/platform/superproject/main/+/main:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=237
#[derive(Debug, PartialEq, Default, Eq, PartialOrd, Ord, Clone, Copy)]
#[repr(u16)]
pub(crate) enum ResourceType {
    #[default]
    Null = 0x0000,
    StringPool = 0x0001,
    Table = 0x0002,
    Xml = 0x0003,

    XmlStartNamespace = 0x0100,
    XmlEndNamespace = 0x0101,
    XmlStartElement = 0x0102,
    XmlEndElement = 0x0103,
    XmlCdata = 0x0104,
    XmlLastChunk = 0x017f,
    XmlResourceMap = 0x0180,

    TablePackage = 0x0200,
    TableType = 0x0201,
    TableTypeSpec = 0x0202,
    TableLibrary = 0x0203,
    TableOverlayable = 0x0204,
    TableOverlayablePolicy = 0x0205,
    TableStagedAlias = 0x0206,

    Unknown(u16),
}

impl From<u16> for ResourceType {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => ResourceType::Null,
            0x0001 => ResourceType::StringPool,
            0x0002 => ResourceType::Table,
            0x0003 => ResourceType::Xml,
            0x0100 => ResourceType::XmlStartNamespace,
            0x0101 => ResourceType::XmlEndNamespace,
            0x0102 => ResourceType::XmlStartElement,
            0x0103 => ResourceType::XmlEndElement,
            0x0104 => ResourceType::XmlCdata,
            0x017f => ResourceType::XmlLastChunk,
            0x0180 => ResourceType::XmlResourceMap,
            0x0200 => ResourceType::TablePackage,
            0x0201 => ResourceType::TableType,
            0x0202 => ResourceType::TableTypeSpec,
            0x0203 => ResourceType::TableLibrary,
            0x0204 => ResourceType::TableOverlayable,
            0x0205 => ResourceType::TableOverlayablePolicy,
            0x0206 => ResourceType::TableStagedAlias,
            other => ResourceType::Unknown(other),
        }
    }
}

/// Header that appears at the front of every data chunk
///
/// See: https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=220
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ResChunkHeader {
    /// Type identifier for this chunk. The meaning of this value depends on the containing chunk.
    pub(crate) type_: ResourceType,

    /// Size of the chunk header (in bytes). Adding this value to
    /// the address of the chunk allows you to find its associated data
    /// (if any).
    pub(crate) header_size: u16,

    /// Total size of this chunk (in bytes), including any child chunks.
    /// Adding this value to the chunk start allows you to completely skip
    /// its contents.
    pub(crate) size: u32,
}

impl ResChunkHeader {
    #[inline]
    pub fn parse(input: &mut &[u8]) -> ModalResult<ResChunkHeader> {
        (le_u16, le_u16, le_u32)
            .map(|(type_, header_size, size)| ResChunkHeader {
                type_: ResourceType::from(type_),
                header_size,
                size,
            })
            .parse_next(input)
    }

    /// Get the size of the data without taking into account the size of the structure itself
    #[inline(always)]
    pub fn content_size(&self) -> u32 {
        // u16 (type_) + u16 (header_size) + u32 (size)
        self.size.saturating_sub(2 + 2 + 4)
    }

    /// Get the size of this structure in bytes
    #[inline(always)]
    pub const fn size_of() -> usize {
        // 2 bytes - ResourceType
        // 2 bytes - header_size
        // 4 bytes - size
        2 + 2 + 4
    }
}

/// Raw representation of a value in a resource, supplying type information
///
/// See: https://cs.android.com/android/platform/superproject/+/android-latest-release:frameworks/base/libs/androidfw/include/androidfw/ResourceTypes.h;l=285
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct ResourceValue {
    /// Number of bytes in this structure
    pub(crate) size: u16,

    /// Always set to 0
    pub(crate) res0: u8,

    /// Type tag of the data value
    pub(crate) data_type: u8,

    /// Data itself
    pub(crate) data: u32,
}

impl ResourceValue {
    #[inline]
    pub fn parse(input: &mut &[u8]) -> ModalResult<ResourceValue> {
        (le_u16, le_u8, le_u8, le_u32)
            .map(|(size, res0, data_type, data)| ResourceValue {
                size,
                res0,
                data_type,
                data,
            })
            .parse_next(input)
    }

    /// Decode into the typed union, resolving string indices against `pool`
    pub fn decode(&self, pool: &StringPool) -> TypedValue {
        TypedValue::decode(self.data_type, self.data, pool)
    }

    /// Get the size of this structure in bytes
    #[inline(always)]
    pub const fn size_of() -> usize {
        2 + 1 + 1 + 4
    }
}

/// Unit tag of a dimension value
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DimensionUnit {
    Px,
    Dp,
    Sp,
    Pt,
    In,
    Mm,
    Unknown(u8),
}

impl From<u8> for DimensionUnit {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Px,
            1 => Self::Dp,
            2 => Self::Sp,
            3 => Self::Pt,
            4 => Self::In,
            5 => Self::Mm,
            v => Self::Unknown(v),
        }
    }
}

impl fmt::Display for DimensionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Px => f.write_str("px"),
            Self::Dp => f.write_str("dp"),
            Self::Sp => f.write_str("sp"),
            Self::Pt => f.write_str("pt"),
            Self::In => f.write_str("in"),
            Self::Mm => f.write_str("mm"),
            Self::Unknown(_) => Ok(()),
        }
    }
}

/// Unit tag of a fraction value
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FractionUnit {
    /// Fraction of the element itself
    Base,

    /// Fraction of the parent container
    Parent,
}

impl From<u8> for FractionUnit {
    fn from(value: u8) -> Self {
        match value & 0x1 {
            0 => Self::Base,
            _ => Self::Parent,
        }
    }
}

impl fmt::Display for FractionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => f.write_str("%"),
            Self::Parent => f.write_str("%p"),
        }
    }
}

/// Typed value carried by XML attributes and resource entries
///
/// The tag byte of the raw value selects the alternative; consumers match
/// exhaustively so new tags surface as compile errors instead of silent
/// misreads.
#[derive(Debug, PartialEq, Clone)]
pub enum TypedValue {
    Null,

    /// Reference to another resource table entry
    Reference(u32),

    /// Reference to an attribute resource identifier
    Attribute(u32),

    String(String),

    Float(f32),

    Dimension { value: f32, unit: DimensionUnit },

    Fraction { value: f32, unit: FractionUnit },

    /// Raw integer of the form n..n
    Dec(i32),

    /// Raw integer of the form 0xn..n
    Hex(u32),

    Boolean(bool),

    /// Packed #aarrggbb
    Color(u32),
}

impl TypedValue {
    const COMPLEX_UNIT_MASK: u32 = 0x0f;

    pub(crate) fn decode(data_type: u8, data: u32, pool: &StringPool) -> TypedValue {
        match data_type {
            0x00 => TypedValue::Null,
            0x01 => TypedValue::Reference(data),
            0x02 => TypedValue::Attribute(data),
            0x03 => TypedValue::String(pool.get(data).unwrap_or_default().to_owned()),
            0x04 => TypedValue::Float(f32::from_bits(data)),
            0x05 => TypedValue::Dimension {
                value: Self::complex_to_float(data),
                unit: DimensionUnit::from((data & Self::COMPLEX_UNIT_MASK) as u8),
            },
            0x06 => TypedValue::Fraction {
                value: Self::complex_to_float(data),
                unit: FractionUnit::from((data & Self::COMPLEX_UNIT_MASK) as u8),
            },
            0x10 => TypedValue::Dec(data as i32),
            0x11 => TypedValue::Hex(data),
            0x12 => TypedValue::Boolean(data != 0),
            0x1c..=0x1f => TypedValue::Color(data),
            _ => TypedValue::Dec(data as i32),
        }
    }

    /// Mantissa lives in the high 24 bits, the radix shift in bits 4..8
    #[inline(always)]
    fn complex_to_float(data: u32) -> f32 {
        ((data as i32) >> 8) as f32 / (1u32 << ((data >> 4) & 0x0f)) as f32
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Null => Ok(()),
            TypedValue::Reference(id) => write!(f, "@{:08x}", id),
            TypedValue::Attribute(id) => write!(f, "?{:08x}", id),
            TypedValue::String(s) => f.write_str(s),
            TypedValue::Float(v) => write!(f, "{}", v),
            TypedValue::Dimension { value, unit } => write!(f, "{}{}", value, unit),
            TypedValue::Fraction { value, unit } => write!(f, "{}{}", value * 100.0, unit),
            TypedValue::Dec(v) => write!(f, "{}", v),
            TypedValue::Hex(v) => write!(f, "0x{:08x}", v),
            TypedValue::Boolean(v) => f.write_str(if *v { "true" } else { "false" }),
            TypedValue::Color(v) => write!(f, "#{:08x}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_pool() -> StringPool {
        StringPool::default()
    }

    #[test]
    fn decode_reference() {
        let value = TypedValue::decode(0x01, 0x7f010000, &empty_pool());
        assert_eq!(value, TypedValue::Reference(0x7f010000));
        assert_eq!(value.to_string(), "@7f010000");
    }

    #[test]
    fn decode_dimension() {
        // 16dp: mantissa 16 << 8, radix 0, unit dp
        let value = TypedValue::decode(0x05, (16 << 8) | 0x01, &empty_pool());
        assert_eq!(
            value,
            TypedValue::Dimension {
                value: 16.0,
                unit: DimensionUnit::Dp
            }
        );
        assert_eq!(value.to_string(), "16dp");
    }

    #[test]
    fn decode_boolean() {
        assert_eq!(
            TypedValue::decode(0x12, u32::MAX, &empty_pool()),
            TypedValue::Boolean(true)
        );
        assert_eq!(
            TypedValue::decode(0x12, 0, &empty_pool()),
            TypedValue::Boolean(false)
        );
    }

    #[test]
    fn decode_unknown_tag_falls_back_to_dec() {
        assert_eq!(
            TypedValue::decode(0x42, 7, &empty_pool()),
            TypedValue::Dec(7)
        );
    }

    #[test]
    fn decode_string_out_of_range_is_empty() {
        let value = TypedValue::decode(0x03, 99, &empty_pool());
        assert_eq!(value, TypedValue::String(String::new()));
    }
}
