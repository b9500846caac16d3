use std::collections::HashMap;

use log::warn;

use crate::errors::ArscError;
use crate::structs::{
    ResChunkHeader, ResTableConfig, ResTableEntry, ResTableEntryValue, ResTableHeader,
    ResTablePackage, ResourceType, StringPool, TypedValue,
};

/// Parsed compiled resource table: the global value pool plus every package
/// it declares. Immutable once built; lookups hand out borrowed views.
pub struct Arsc {
    global_pool: StringPool,
    packages: Vec<ResTablePackage>,
}

/// One `(configuration, entry)` view of a resource
#[derive(Debug)]
pub struct Resource<'a> {
    pub config: &'a ResTableConfig,

    /// Entry name from the package key pool
    pub key: String,

    pub value: EntryValue,
}

/// Decoded entry value
#[derive(Debug, PartialEq)]
pub enum EntryValue {
    Value(TypedValue),

    /// Bag of sub-values inheriting from `parent` (0 when none); keys are the
    /// hex renderings of the 32-bit sub-key ids
    Complex {
        parent: u32,
        map: HashMap<String, TypedValue>,
    },
}

impl Arsc {
    pub fn new(data: &[u8]) -> Result<Arsc, ArscError> {
        if data.len() < 12 {
            return Err(ArscError::TooSmallError);
        }

        let mut input = data;
        let header = ResTableHeader::parse(&mut input).map_err(|_| ArscError::HeaderError)?;

        if header.header.type_ != ResourceType::Table {
            return Err(ArscError::NotResourceTable);
        }

        let mut global_pool = None;
        let mut packages = Vec::new();

        while input.len() >= ResChunkHeader::size_of() {
            let chunk_start = input;
            let mut peek = input;
            let chunk_header =
                ResChunkHeader::parse(&mut peek).map_err(|_| ArscError::HeaderError)?;

            if (chunk_header.size as usize) < ResChunkHeader::size_of() {
                return Err(ArscError::ChunkOverrun);
            }

            match chunk_header.type_ {
                ResourceType::StringPool if global_pool.is_none() => {
                    global_pool = Some(
                        StringPool::parse(&mut input).map_err(|_| ArscError::StringPoolError)?,
                    );
                }
                ResourceType::TablePackage => {
                    packages
                        .push(ResTablePackage::parse(&mut input).map_err(|_| ArscError::PackageError)?);
                }
                other => {
                    warn!("skipping top-level chunk {:?}", other);
                    let (_, rest) = chunk_start
                        .split_at_checked(chunk_header.size as usize)
                        .ok_or(ArscError::ChunkOverrun)?;
                    input = rest;
                }
            }
        }

        if packages.len() != header.package_count as usize {
            warn!(
                "expected {} packages, parsed {}",
                header.package_count,
                packages.len()
            );
        }

        Ok(Arsc {
            global_pool: global_pool.unwrap_or_default(),
            packages,
        })
    }

    /// First entry matching the id, in any configuration
    pub fn resource(&self, id: u32) -> Option<Resource<'_>> {
        self.variants_iter(id).next()
    }

    /// Every `(configuration, entry)` pair declared for the id, in table
    /// order. This is the candidate list for the configuration matcher.
    pub fn variants(&self, id: u32) -> Vec<Resource<'_>> {
        self.variants_iter(id).collect()
    }

    fn variants_iter(&self, id: u32) -> impl Iterator<Item = Resource<'_>> {
        let (package_id, type_id, entry_id) = split_id(id);

        self.packages
            .iter()
            .filter(move |p| p.header.id as u8 == package_id)
            .flat_map(move |package| {
                package
                    .types
                    .iter()
                    .filter(move |t| t.id == type_id)
                    .filter_map(move |chunk| {
                        let entry = chunk.entries.get(entry_id as usize)?.as_ref()?;
                        Some(self.decode(package, &chunk.config, entry))
                    })
            })
    }

    fn decode<'a>(
        &'a self,
        package: &'a ResTablePackage,
        config: &'a ResTableConfig,
        entry: &'a ResTableEntry,
    ) -> Resource<'a> {
        let key = package
            .key_strings
            .get(entry.key_index)
            .unwrap_or_default()
            .to_owned();

        let value = match &entry.value {
            ResTableEntryValue::Value(v) => EntryValue::Value(v.decode(&self.global_pool)),
            ResTableEntryValue::Complex { parent, values } => EntryValue::Complex {
                parent: *parent,
                map: values
                    .iter()
                    .map(|(k, v)| (format!("0x{:08x}", k), v.decode(&self.global_pool)))
                    .collect(),
            },
        };

        Resource { config, key, value }
    }

    /// Name of the package carrying the given package id
    pub fn package_name(&self, package_id: u8) -> Option<String> {
        self.packages
            .iter()
            .find(|p| p.header.id as u8 == package_id)
            .map(|p| p.header.name())
    }

    #[inline]
    pub fn global_pool(&self) -> &StringPool {
        &self.global_pool
    }
}

/// `0xPPTTEEEE` → (package, type, entry)
#[inline(always)]
fn split_id(id: u32) -> (u8, u8, u16) {
    ((id >> 24) as u8, ((id >> 16) & 0xff) as u8, id as u16)
}
