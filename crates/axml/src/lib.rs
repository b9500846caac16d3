pub mod arsc;
pub mod axml;
pub mod dom;
pub mod errors;
pub mod manifest;
pub mod matcher;
pub mod resolver;

pub mod structs;

pub use arsc::{Arsc, EntryValue, Resource};
pub use axml::Axml;
pub use dom::{Attribute, Document, Element};
pub use errors::{ArscError, AxmlError};
pub use manifest::{Activity, Manifest};
pub use matcher::best_match;
pub use resolver::Resolver;
pub use structs::{DeviceConfig, DimensionUnit, FractionUnit, ResTableConfig, StringPool, TypedValue};
