pub mod apk;
pub mod errors;

pub use apk::Apk;
pub use errors::ApkError;

pub use apkvm_axml::{
    Activity, Arsc, DeviceConfig, Document, Element, Manifest, Resolver, TypedValue,
};
pub use apkvm_jvm::{Conversion, EmittedClass};
