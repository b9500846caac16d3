use apkvm_axml::{Activity, Arsc, Axml, DeviceConfig, Document, Manifest, Resolver};
use apkvm_dex::Dex;
use apkvm_jvm::{Conversion, EmittedClass, convert};
use log::warn;

use crate::errors::ApkError;

/// One unpacked application archive: parsed manifest, optional resource
/// table, and the translated classes of every bytecode payload.
///
/// Archive extraction stays with the caller; this type receives the already
/// extracted parts. The three pipelines are independent and share no state.
pub struct Apk {
    axml: Axml,
    manifest: Manifest,
    arsc: Option<Arsc>,
    conversion: Conversion,
}

impl Apk {
    /// Wire up all three pipelines for one archive.
    ///
    /// `dex_payloads` are the bytecode files in archive order. A payload or
    /// class that fails to convert is recorded in [`Apk::class_errors`]; it
    /// never fails the archive.
    pub fn from_parts(
        manifest_bytes: &[u8],
        resource_bytes: Option<&[u8]>,
        dex_payloads: &[Vec<u8>],
    ) -> Result<Apk, ApkError> {
        if manifest_bytes.is_empty() {
            return Err(ApkError::InvalidInput("manifest is empty"));
        }

        let axml = Axml::new(manifest_bytes)?;
        let manifest = Manifest::interpret(&axml.document);

        let arsc = resource_bytes.map(Arsc::new).transpose()?;

        let mut conversion = Conversion::default();
        for (index, payload) in dex_payloads.iter().enumerate() {
            match Dex::new(payload.clone()) {
                Ok(dex) => {
                    let part = convert(&dex);
                    conversion.classes.extend(part.classes);
                    conversion.errors.extend(part.errors);
                }
                Err(error) => {
                    warn!("dex payload {} rejected: {}", index, error);
                    conversion
                        .errors
                        .push(format!("payload {}: {}", index, error));
                }
            }
        }

        Ok(Apk {
            axml,
            manifest,
            arsc,
            conversion,
        })
    }

    /// Entry-point metadata from the manifest
    #[inline]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The parsed manifest document, for callers that need more than the
    /// interpreted surface
    #[inline]
    pub fn document(&self) -> &Document {
        &self.axml.document
    }

    /// First launcher activity, the conventional entry point
    pub fn launcher_activity(&self) -> Option<&Activity> {
        self.manifest.launcher_activities().next()
    }

    /// Configuration-aware resource lookups; `None` when the archive carried
    /// no resource table
    pub fn resolver(&self, device: DeviceConfig) -> Option<Resolver<'_>> {
        self.arsc.as_ref().map(|table| Resolver::new(table, device))
    }

    #[inline]
    pub fn resources(&self) -> Option<&Arsc> {
        self.arsc.as_ref()
    }

    /// Every translated class, addressed by internal name
    #[inline]
    pub fn classes(&self) -> &[EmittedClass] {
        &self.conversion.classes
    }

    /// Per-class conversion failures; the caller decides whether to proceed
    #[inline]
    pub fn class_errors(&self) -> &[String] {
        &self.conversion.errors
    }

    /// Class-file bytes for one internal name
    pub fn class_bytes(&self, internal_name: &str) -> Option<&[u8]> {
        self.conversion
            .classes
            .iter()
            .find(|class| class.name == internal_name)
            .map(|class| class.bytes.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_STRING: u32 = u32::MAX;

    // minimal binary-XML assembly, enough for a manifest with one attribute
    // per element

    fn pool(strings: &[&str]) -> Vec<u8> {
        let mut data = Vec::new();
        let mut offsets = Vec::new();
        for s in strings {
            offsets.push(data.len() as u32);
            data.push(s.chars().count() as u8);
            data.push(s.len() as u8);
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        }
        while data.len() % 4 != 0 {
            data.push(0);
        }

        let strings_start = 28 + 4 * strings.len() as u32;
        let mut out = Vec::new();
        out.extend_from_slice(&0x0001u16.to_le_bytes());
        out.extend_from_slice(&28u16.to_le_bytes());
        out.extend_from_slice(&(strings_start + data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(strings.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(1u32 << 8).to_le_bytes());
        out.extend_from_slice(&strings_start.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        for off in offsets {
            out.extend_from_slice(&off.to_le_bytes());
        }
        out.extend_from_slice(&data);
        out
    }

    fn element(open: bool, name_idx: u32, attr: Option<(u32, u32)>) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&NO_STRING.to_le_bytes());
        body.extend_from_slice(&NO_STRING.to_le_bytes());
        body.extend_from_slice(&name_idx.to_le_bytes());

        if open {
            body.extend_from_slice(&0x14u16.to_le_bytes());
            body.extend_from_slice(&0x14u16.to_le_bytes());
            body.extend_from_slice(&(attr.is_some() as u16).to_le_bytes());
            body.extend_from_slice(&[0; 6]);
            if let Some((attr_name, value)) = attr {
                body.extend_from_slice(&NO_STRING.to_le_bytes());
                body.extend_from_slice(&attr_name.to_le_bytes());
                body.extend_from_slice(&value.to_le_bytes()); // raw string
                body.extend_from_slice(&8u16.to_le_bytes());
                body.push(0);
                body.push(0x03); // string typed value
                body.extend_from_slice(&value.to_le_bytes());
            }
        }

        let mut out = Vec::new();
        out.extend_from_slice(&(if open { 0x0102u16 } else { 0x0103 }).to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(&((8 + body.len()) as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    fn manifest_bytes() -> Vec<u8> {
        // strings: 0 manifest, 1 package, 2 com.example
        let pool = pool(&["manifest", "package", "com.example"]);
        let parts = [
            element(true, 0, Some((1, 2))),
            element(false, 0, None),
        ];
        let body_len: usize = parts.iter().map(Vec::len).sum();

        let mut out = Vec::new();
        out.extend_from_slice(&0x0003u16.to_le_bytes());
        out.extend_from_slice(&8u16.to_le_bytes());
        out.extend_from_slice(&((8 + pool.len() + body_len) as u32).to_le_bytes());
        out.extend_from_slice(&pool);
        for part in &parts {
            out.extend_from_slice(part);
        }
        out
    }

    #[test]
    fn empty_manifest_is_rejected() {
        assert!(matches!(
            Apk::from_parts(&[], None, &[]),
            Err(ApkError::InvalidInput(_))
        ));
    }

    #[test]
    fn garbage_manifest_is_a_manifest_error() {
        assert!(matches!(
            Apk::from_parts(&[0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0], None, &[]),
            Err(ApkError::Manifest(_))
        ));
    }

    #[test]
    fn parses_package_name() {
        let apk = Apk::from_parts(&manifest_bytes(), None, &[]).unwrap();
        assert_eq!(apk.manifest().package, "com.example");
        assert!(apk.resolver(DeviceConfig::default()).is_none());
    }

    #[test]
    fn broken_dex_payload_is_recorded_not_fatal() {
        let apk = Apk::from_parts(&manifest_bytes(), None, &[vec![0u8; 4]]).unwrap();
        assert!(apk.classes().is_empty());
        assert_eq!(apk.class_errors().len(), 1);
    }
}
