pub mod dex;
pub mod errors;
pub mod insns;

pub use dex::{
    AccessFlags, ClassData, ClassItem, CodeItem, Dex, DexHeader, DexVersion, EncodedField,
    EncodedMethod, FieldItem, FieldRef, MethodItem, MethodRef, NO_INDEX, ProtoItem,
};
pub use errors::DexError;
pub use insns::{Instruction, decode};
