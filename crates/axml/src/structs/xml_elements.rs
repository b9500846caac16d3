use log::debug;
use winnow::binary::{le_u16, le_u32};
use winnow::combinator::repeat;
use winnow::prelude::*;
use winnow::token::take;

use crate::structs::{ResChunkHeader, ResourceValue};

/// Resource-id table mapping attribute name indices to system resource ids
#[derive(Debug, Default)]
pub(crate) struct XmlResourceMap {
    pub(crate) resource_ids: Vec<u32>,
}

impl XmlResourceMap {
    pub fn parse(header: ResChunkHeader, input: &mut &[u8]) -> ModalResult<XmlResourceMap> {
        let resource_ids = repeat(
            (header.size.saturating_sub(header.header_size as u32) / 4) as usize,
            le_u32,
        )
        .parse_next(input)?;

        Ok(XmlResourceMap { resource_ids })
    }
}

/// Common prefix of every XML tree node chunk
#[derive(Debug, Default)]
pub(crate) struct XmlNodeHeader {
    pub(crate) header: ResChunkHeader,

    /// Line number in the original source file at which this element appeared
    pub(crate) line_number: u32,

    /// Optional XML comment associated with this element; -1 if none
    pub(crate) comment: u32,
}

impl XmlNodeHeader {
    #[inline]
    pub fn parse(input: &mut &[u8], header: ResChunkHeader) -> ModalResult<XmlNodeHeader> {
        let (line_number, comment) = (le_u32, le_u32).parse_next(input)?;

        Ok(XmlNodeHeader {
            header,
            line_number,
            comment,
        })
    }

    /// Bytes left in the chunk after this prefix
    #[inline(always)]
    pub fn content_size(&self) -> u32 {
        self.header.content_size().saturating_sub(4 + 4)
    }
}

/// Namespace start/end node
#[derive(Debug)]
pub(crate) struct XmlNamespace {
    pub(crate) prefix: u32,
    pub(crate) uri: u32,
}

impl XmlNamespace {
    #[inline]
    pub fn parse(input: &mut &[u8]) -> ModalResult<XmlNamespace> {
        let (prefix, uri) = (le_u32, le_u32).parse_next(input)?;

        Ok(XmlNamespace { prefix, uri })
    }
}

#[derive(Debug)]
pub(crate) struct XmlAttributeElement {
    /// Namespace of this attribute
    pub(crate) namespace_uri: u32,

    /// Name of this attribute
    pub(crate) name: u32,

    /// The original raw string value of this attribute
    pub(crate) raw_value: u32,

    /// Processed typed value of this attribute
    pub(crate) typed_value: ResourceValue,
}

impl XmlAttributeElement {
    pub(crate) const DEFAULT_ATTRIBUTE_SIZE: u16 = 0x14;

    pub fn parse(
        attribute_size: u16,
    ) -> impl FnMut(&mut &[u8]) -> ModalResult<XmlAttributeElement> {
        move |input: &mut &[u8]| {
            let (namespace_uri, name, raw_value, typed_value) =
                (le_u32, le_u32, le_u32, ResourceValue::parse).parse_next(input)?;

            // sometimes attribute size != 20, scroll through the extra data
            if let Some(extra) = attribute_size.checked_sub(Self::DEFAULT_ATTRIBUTE_SIZE)
                && extra > 0
            {
                let _ = take(extra).parse_next(input)?;
            }

            Ok(XmlAttributeElement {
                namespace_uri,
                name,
                raw_value,
                typed_value,
            })
        }
    }
}

#[derive(Debug)]
pub(crate) struct XmlStartElement {
    pub(crate) node: XmlNodeHeader,

    /// Full namespace of this element
    pub(crate) namespace_uri: u32,

    /// Name of this node
    pub(crate) name: u32,

    /// Byte offset from the start of this structure where the attributes start
    pub(crate) attribute_start: u16,

    /// Size of one attribute structure
    pub(crate) attribute_size: u16,

    /// Number of attributes associated with the element
    pub(crate) attribute_count: u16,

    /// Index (1-based) of the "id" attribute. 0 if none.
    pub(crate) id_index: u16,

    /// Index (1-based) of the "class" attribute. 0 if none.
    pub(crate) class_index: u16,

    /// Index (1-based) of the "style" attribute. 0 if none.
    pub(crate) style_index: u16,

    /// List of associated attributes
    pub(crate) attributes: Vec<XmlAttributeElement>,
}

impl XmlStartElement {
    pub(crate) fn parse(input: &mut &[u8], node: XmlNodeHeader) -> ModalResult<XmlStartElement> {
        let start = input.len();

        let (
            namespace_uri,
            name,
            attribute_start,
            attribute_size,
            attribute_count,
            id_index,
            class_index,
            style_index,
        ) = (
            le_u32, // namespace_uri
            le_u32, // name
            le_u16, // attribute_start
            le_u16, // attribute_size
            le_u16, // attribute_count
            le_u16, // id_index
            le_u16, // class_index
            le_u16, // style_index
        )
            .parse_next(input)?;

        // hostile files pad between the fixed fields and the attribute array
        let padding = attribute_start.saturating_sub(XmlAttributeElement::DEFAULT_ATTRIBUTE_SIZE);
        if padding != 0 {
            debug!("skip {} padding bytes before attributes", padding);
            let _ = take(padding).parse_next(input)?;
        }

        let attributes = repeat(
            attribute_count as usize,
            XmlAttributeElement::parse(attribute_size),
        )
        .parse_next(input)?;

        // and between the last attribute and the declared chunk end
        let read_bytes = start - input.len();
        let trailing = node.content_size().saturating_sub(read_bytes as u32);
        if trailing != 0 {
            debug!("skip {} garbage bytes at chunk end", trailing);
            let _ = take(trailing).parse_next(input)?;
        }

        Ok(XmlStartElement {
            node,
            namespace_uri,
            name,
            attribute_start,
            attribute_size,
            attribute_count,
            id_index,
            class_index,
            style_index,
            attributes,
        })
    }
}

#[derive(Debug)]
pub(crate) struct XmlEndElement {
    pub(crate) namespace_uri: u32,
    pub(crate) name: u32,
}

impl XmlEndElement {
    #[inline]
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<XmlEndElement> {
        let (namespace_uri, name) = (le_u32, le_u32).parse_next(input)?;

        Ok(XmlEndElement {
            namespace_uri,
            name,
        })
    }
}

/// Character data node; surfaces in the tree as a `#text` child
#[derive(Debug)]
pub(crate) struct XmlCData {
    /// The raw character data
    pub(crate) data: u32,

    /// The typed value of the character data
    pub(crate) typed_data: ResourceValue,
}

impl XmlCData {
    #[inline]
    pub(crate) fn parse(input: &mut &[u8]) -> ModalResult<XmlCData> {
        let data = le_u32(input)?;
        let typed_data = ResourceValue::parse(input)?;

        Ok(XmlCData { data, typed_data })
    }
}
