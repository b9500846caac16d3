use crate::arsc::{Arsc, EntryValue, Resource};
use crate::matcher::best_match;
use crate::structs::{DeviceConfig, ResTableConfig, TypedValue};

/// Typed lookup surface over a resource table and a device configuration.
///
/// Holds a borrowed table and an owned configuration; every call selects the
/// best-matching variant and extracts the value when its kind matches.
pub struct Resolver<'a> {
    table: &'a Arsc,
    device: DeviceConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(table: &'a Arsc, device: DeviceConfig) -> Resolver<'a> {
        Resolver { table, device }
    }

    #[inline]
    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    pub fn resolve_string(&self, id: u32) -> Option<String> {
        match self.best_variant(id)?.value {
            EntryValue::Value(TypedValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Layout resources carry their file path as a string value
    #[inline]
    pub fn resolve_layout(&self, id: u32) -> Option<String> {
        self.resolve_string(id)
    }

    pub fn resolve_integer(&self, id: u32) -> Option<i32> {
        match self.best_variant(id)?.value {
            EntryValue::Value(TypedValue::Dec(v)) => Some(v),
            EntryValue::Value(TypedValue::Hex(v)) => Some(v as i32),
            _ => None,
        }
    }

    pub fn resolve_boolean(&self, id: u32) -> Option<bool> {
        match self.best_variant(id)?.value {
            EntryValue::Value(TypedValue::Boolean(v)) => Some(v),
            _ => None,
        }
    }

    /// Packed #aarrggbb
    pub fn resolve_color(&self, id: u32) -> Option<u32> {
        match self.best_variant(id)?.value {
            EntryValue::Value(TypedValue::Color(v)) => Some(v),
            _ => None,
        }
    }

    /// Numeric part of a dimension value; the unit tag is dropped
    pub fn resolve_dimension(&self, id: u32) -> Option<f32> {
        match self.best_variant(id)?.value {
            EntryValue::Value(TypedValue::Dimension { value, .. }) => Some(value),
            _ => None,
        }
    }

    fn best_variant(&self, id: u32) -> Option<Resource<'a>> {
        let mut variants = self.table.variants(id);

        match variants.len() {
            0 => None,
            // a single variant wins without consulting the matcher
            1 => variants.pop(),
            _ => {
                let configs: Vec<&ResTableConfig> = variants.iter().map(|v| v.config).collect();
                let index = best_match(&configs, &self.device)?;
                Some(variants.swap_remove(index))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arsc::tests::{TableBuilder, encode_config, encode_value, two_locale_table};
    use std::collections::HashMap;

    #[test]
    fn resolves_locale_variant() {
        let arsc = Arsc::new(&two_locale_table()).unwrap();

        let default_device = Resolver::new(&arsc, DeviceConfig::default());
        assert_eq!(
            default_device.resolve_string(0x7f01_0000).as_deref(),
            Some("hello")
        );

        let spanish = Resolver::new(
            &arsc,
            DeviceConfig {
                language: "es".to_owned(),
                ..DeviceConfig::default()
            },
        );
        assert_eq!(
            spanish.resolve_string(0x7f01_0000).as_deref(),
            Some("hola")
        );
    }

    #[test]
    fn missing_id_is_absent() {
        let arsc = Arsc::new(&two_locale_table()).unwrap();
        let resolver = Resolver::new(&arsc, DeviceConfig::default());
        assert_eq!(resolver.resolve_string(0x7f01_00ff), None);
    }

    #[test]
    fn kind_mismatch_is_absent() {
        let arsc = Arsc::new(&two_locale_table()).unwrap();
        let resolver = Resolver::new(&arsc, DeviceConfig::default());
        // the entry is a string, not an integer
        assert_eq!(resolver.resolve_integer(0x7f01_0000), None);
    }

    #[test]
    fn resolves_typed_kinds() {
        let table = TableBuilder {
            global: vec![],
            type_names: vec!["bool", "color", "integer"],
            key_names: vec!["flag", "accent", "count"],
            types: vec![
                (1, encode_config("", 0, 0, 0), vec![(0, 0, encode_value(0x12, 1))]),
                (
                    2,
                    encode_config("", 0, 0, 0),
                    vec![(0, 1, encode_value(0x1c, 0xff00_33cc))],
                ),
                (3, encode_config("", 0, 0, 0), vec![(0, 2, encode_value(0x10, 42))]),
            ],
            entry_counts: HashMap::from([(1u8, 1u16), (2, 1), (3, 1)]),
        }
        .build();

        let arsc = Arsc::new(&table).unwrap();
        let resolver = Resolver::new(&arsc, DeviceConfig::default());

        assert_eq!(resolver.resolve_boolean(0x7f01_0000), Some(true));
        assert_eq!(resolver.resolve_color(0x7f02_0000), Some(0xff00_33cc));
        assert_eq!(resolver.resolve_integer(0x7f03_0000), Some(42));
    }

    #[test]
    fn density_variant_selected_for_device() {
        let table = TableBuilder {
            global: vec!["mdpi", "xhdpi"],
            type_names: vec!["drawable"],
            key_names: vec!["icon"],
            types: vec![
                (
                    1,
                    encode_config("", 160, 0, 0),
                    vec![(0, 0, encode_value(0x03, 0))],
                ),
                (
                    1,
                    encode_config("", 320, 0, 0),
                    vec![(0, 0, encode_value(0x03, 1))],
                ),
            ],
            entry_counts: HashMap::from([(1u8, 1u16)]),
        }
        .build();

        let arsc = Arsc::new(&table).unwrap();
        let resolver = Resolver::new(
            &arsc,
            DeviceConfig {
                density: 240,
                ..DeviceConfig::default()
            },
        );

        // up-scale penalty prefers the denser candidate
        assert_eq!(
            resolver.resolve_string(0x7f01_0000).as_deref(),
            Some("xhdpi")
        );
    }
}
