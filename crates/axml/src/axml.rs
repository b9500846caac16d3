use log::warn;

use crate::dom::{Attribute, Document, Element};
use crate::errors::AxmlError;
use crate::structs::{
    ResChunkHeader, ResourceType, StringPool, XmlAttributeElement, XmlCData, XmlEndElement,
    XmlNamespace, XmlNodeHeader, XmlResourceMap, XmlStartElement,
};

/// Index value marking "no string" in node and attribute records
const NO_STRING: u32 = u32::MAX;

/// Parsed compiled-XML document
#[derive(Debug)]
pub struct Axml {
    string_pool: StringPool,
    resource_map: XmlResourceMap,

    pub document: Document,
}

impl Axml {
    pub fn new(data: &[u8]) -> Result<Axml, AxmlError> {
        // basic sanity check
        if data.len() < ResChunkHeader::size_of() {
            return Err(AxmlError::TooSmallError);
        }

        let mut input = data;
        let header = ResChunkHeader::parse(&mut input).map_err(|_| AxmlError::HeaderError)?;

        if header.type_ != ResourceType::Xml {
            return Err(AxmlError::NotBinaryXml);
        }

        // the document header declares the file size; a shorter buffer is a
        // truncated file
        let declared = header.size as usize;
        if declared > data.len() {
            return Err(AxmlError::ChunkOverrun);
        }
        if declared < ResChunkHeader::size_of() {
            return Err(AxmlError::HeaderError);
        }
        let mut input = &data[ResChunkHeader::size_of()..declared];

        let mut string_pool = StringPool::default();
        let mut resource_map = XmlResourceMap::default();
        let mut document = Document::default();
        let mut stack: Vec<Element> = Vec::new();

        while input.len() >= ResChunkHeader::size_of() {
            let chunk_start = input;
            let chunk_header =
                ResChunkHeader::parse(&mut input).map_err(|_| AxmlError::XmlTreeError)?;

            // a declared size below the header size cannot make progress
            if (chunk_header.size as usize) < ResChunkHeader::size_of() {
                return Err(AxmlError::ChunkOverrun);
            }

            // every chunk is handled inside its own slice and the cursor then
            // jumps to the declared chunk end
            let (chunk, rest) = chunk_start
                .split_at_checked(chunk_header.size as usize)
                .ok_or(AxmlError::ChunkOverrun)?;
            input = rest;

            let mut body = chunk
                .get(ResChunkHeader::size_of()..)
                .unwrap_or_default();

            match chunk_header.type_ {
                ResourceType::StringPool => {
                    let mut pool_input = chunk;
                    string_pool = StringPool::parse(&mut pool_input)
                        .map_err(|_| AxmlError::StringPoolError)?;
                }
                ResourceType::XmlResourceMap => {
                    resource_map = XmlResourceMap::parse(chunk_header, &mut body)
                        .map_err(|_| AxmlError::ResourceMapError)?;
                }
                ResourceType::XmlStartNamespace => {
                    XmlNodeHeader::parse(&mut body, chunk_header)
                        .map_err(|_| AxmlError::XmlTreeError)?;
                    let ns = XmlNamespace::parse(&mut body).map_err(|_| AxmlError::XmlTreeError)?;

                    let prefix = pool_string(&string_pool, ns.prefix).unwrap_or_default();
                    let uri = pool_string(&string_pool, ns.uri).unwrap_or_default();
                    document.namespaces.insert(prefix, uri);
                }
                ResourceType::XmlEndNamespace => {
                    // prefix mappings survive across the tree
                }
                ResourceType::XmlStartElement => {
                    let node = XmlNodeHeader::parse(&mut body, chunk_header)
                        .map_err(|_| AxmlError::XmlTreeError)?;
                    let start = XmlStartElement::parse(&mut body, node)
                        .map_err(|_| AxmlError::XmlTreeError)?;

                    stack.push(Self::build_element(&start, &string_pool, &resource_map));
                }
                ResourceType::XmlEndElement => {
                    XmlNodeHeader::parse(&mut body, chunk_header)
                        .map_err(|_| AxmlError::XmlTreeError)?;
                    let _ = XmlEndElement::parse(&mut body).map_err(|_| AxmlError::XmlTreeError)?;

                    if let Some(finished) = stack.pop() {
                        match stack.last_mut() {
                            Some(parent) => parent.children.push(finished),
                            None if document.root.is_none() => document.root = Some(finished),
                            None => warn!("extra root element {:?} dropped", finished.name),
                        }
                    }
                }
                ResourceType::XmlCdata => {
                    XmlNodeHeader::parse(&mut body, chunk_header)
                        .map_err(|_| AxmlError::XmlTreeError)?;
                    let cdata = XmlCData::parse(&mut body).map_err(|_| AxmlError::XmlTreeError)?;

                    if let Some(top) = stack.last_mut()
                        && let Some(data) = pool_string(&string_pool, cdata.data)
                    {
                        top.children.push(Element::new_text(data));
                    }
                }
                other => {
                    warn!("skipping unknown chunk {:?}", other);
                }
            }
        }

        // unwind elements whose end chunk never arrived
        while let Some(finished) = stack.pop() {
            match stack.last_mut() {
                Some(parent) => parent.children.push(finished),
                None if document.root.is_none() => document.root = Some(finished),
                None => {}
            }
        }

        Ok(Axml {
            string_pool,
            resource_map,
            document,
        })
    }

    fn build_element(
        start: &XmlStartElement,
        pool: &StringPool,
        resource_map: &XmlResourceMap,
    ) -> Element {
        // an out-of-range name index decodes to the empty string
        let name = pool.get(start.name).unwrap_or_default().to_owned();
        let namespace = pool_string(pool, start.namespace_uri);

        let mut element = Element::new(name, namespace);

        for attribute in &start.attributes {
            element.attributes.push(Self::build_attribute(
                attribute,
                pool,
                resource_map,
            ));
        }

        element
    }

    fn build_attribute(
        attribute: &XmlAttributeElement,
        pool: &StringPool,
        resource_map: &XmlResourceMap,
    ) -> Attribute {
        Attribute {
            name: pool.get(attribute.name).unwrap_or_default().to_owned(),
            namespace: pool_string(pool, attribute.namespace_uri),
            value: attribute.typed_value.decode(pool),
            raw: pool_string(pool, attribute.raw_value),
            resource_id: resource_map
                .resource_ids
                .get(attribute.name as usize)
                .copied(),
        }
    }

    /// Pool accessor used by consumers that still hold raw indices
    #[inline]
    pub fn string_pool(&self) -> &StringPool {
        &self.string_pool
    }

    /// Resource ids announced by the document id-table
    #[inline]
    pub fn resource_ids(&self) -> &[u32] {
        &self.resource_map.resource_ids
    }
}

/// `None` for the no-string sentinel, empty-or-missing pool entries stay `None`
fn pool_string(pool: &StringPool, idx: u32) -> Option<String> {
    if idx == NO_STRING {
        return None;
    }

    pool.get(idx).map(str::to_owned)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::structs::TypedValue;
    use crate::structs::res_string_pool::tests::encode_utf8_pool;

    fn chunk(type_: u16, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&type_.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes()); // node header size
        out.extend_from_slice(&((8 + body.len()) as u32).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    fn node_body(extra: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&1u32.to_le_bytes()); // line number
        body.extend_from_slice(&NO_STRING.to_le_bytes()); // comment
        body.extend_from_slice(extra);
        body
    }

    pub(crate) fn start_element(name_idx: u32, attrs: &[(u32, u8, u32)]) -> Vec<u8> {
        let mut extra = Vec::new();
        extra.extend_from_slice(&NO_STRING.to_le_bytes()); // namespace
        extra.extend_from_slice(&name_idx.to_le_bytes());
        extra.extend_from_slice(&0x14u16.to_le_bytes()); // attribute start
        extra.extend_from_slice(&0x14u16.to_le_bytes()); // attribute size
        extra.extend_from_slice(&(attrs.len() as u16).to_le_bytes());
        extra.extend_from_slice(&[0; 6]); // id/class/style indices

        for &(attr_name, value_type, data) in attrs {
            extra.extend_from_slice(&NO_STRING.to_le_bytes()); // attr namespace
            extra.extend_from_slice(&attr_name.to_le_bytes());
            extra.extend_from_slice(&NO_STRING.to_le_bytes()); // raw value
            extra.extend_from_slice(&8u16.to_le_bytes()); // value size
            extra.push(0); // res0
            extra.push(value_type);
            extra.extend_from_slice(&data.to_le_bytes());
        }

        chunk(0x0102, &node_body(&extra))
    }

    pub(crate) fn end_element(name_idx: u32) -> Vec<u8> {
        let mut extra = Vec::new();
        extra.extend_from_slice(&NO_STRING.to_le_bytes());
        extra.extend_from_slice(&name_idx.to_le_bytes());
        chunk(0x0103, &node_body(&extra))
    }

    pub(crate) fn document(pool: &[&str], inner: &[Vec<u8>]) -> Vec<u8> {
        let pool_bytes = encode_utf8_pool(pool);
        let body_len: usize = inner.iter().map(Vec::len).sum();

        let mut out = Vec::new();
        out.extend_from_slice(&0x0003u16.to_le_bytes()); // document chunk
        out.extend_from_slice(&8u16.to_le_bytes());
        out.extend_from_slice(&((8 + pool_bytes.len() + body_len) as u32).to_le_bytes());
        out.extend_from_slice(&pool_bytes);
        for part in inner {
            out.extend_from_slice(part);
        }
        out
    }

    #[test]
    fn rejects_wrong_magic() {
        let bytes = [0x02, 0x00, 0x08, 0x00, 0x08, 0x00, 0x00, 0x00];
        match Axml::new(&bytes) {
            Err(AxmlError::NotBinaryXml) => {}
            other => panic!("expected NotBinaryXml, got {:?}", other),
        }
    }

    #[test]
    fn rejects_truncated_file() {
        // declared size exceeds the buffer
        let bytes = [0x03, 0x00, 0x08, 0x00, 0xff, 0x00, 0x00, 0x00];
        assert!(matches!(Axml::new(&bytes), Err(AxmlError::ChunkOverrun)));
    }

    #[test]
    fn parses_simple_tree() {
        let bytes = document(
            &["manifest", "package", "com.example.app", "application"],
            &[
                start_element(0, &[(1, 0x03, 2)]),
                start_element(3, &[]),
                end_element(3),
                end_element(0),
            ],
        );

        let axml = Axml::new(&bytes).unwrap();
        let root = axml.document.root.as_ref().unwrap();

        assert_eq!(root.name, "manifest");
        assert_eq!(root.attr("package"), Some("com.example.app"));
        assert_eq!(root.children[0].name, "application");
    }

    #[test]
    fn out_of_range_name_index_is_empty() {
        let bytes = document(&["a"], &[start_element(99, &[]), end_element(99)]);

        let axml = Axml::new(&bytes).unwrap();
        assert_eq!(axml.document.root.as_ref().unwrap().name, "");
    }

    #[test]
    fn boolean_attribute_is_typed() {
        let bytes = document(
            &["application", "debuggable"],
            &[start_element(0, &[(1, 0x12, u32::MAX)]), end_element(0)],
        );

        let axml = Axml::new(&bytes).unwrap();
        let root = axml.document.root.as_ref().unwrap();
        assert_eq!(
            root.attribute("debuggable").map(|a| &a.value),
            Some(&TypedValue::Boolean(true))
        );
    }

    #[test]
    fn unknown_chunks_are_skipped() {
        let mut stray = Vec::new();
        stray.extend_from_slice(&0x0042u16.to_le_bytes());
        stray.extend_from_slice(&8u16.to_le_bytes());
        stray.extend_from_slice(&12u32.to_le_bytes());
        stray.extend_from_slice(&[0xaa; 4]);

        let bytes = document(
            &["manifest"],
            &[stray, start_element(0, &[]), end_element(0)],
        );

        let axml = Axml::new(&bytes).unwrap();
        assert_eq!(axml.document.root.as_ref().unwrap().name, "manifest");
    }
}
