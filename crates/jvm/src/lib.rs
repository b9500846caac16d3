pub mod classfile;
pub mod emit;
pub mod errors;
pub mod opcodes;
pub mod translate;

#[cfg(test)]
pub(crate) mod testdex;

pub use classfile::{ClassWriter, Code, CodeBuilder, ConstantPool};
pub use emit::{Conversion, EmittedClass, convert, emit_class};
pub use errors::JvmError;
pub use translate::{Category, MethodSignature, internal_name, is_supported, method_descriptor};
