use thiserror::Error;

#[derive(Error, Debug)]
pub enum DexError {
    #[error("invalid dex header")]
    InvalidHeader,

    #[error("unknown dex version: {0:#x}")]
    UnknownVersion(u16),

    #[error("got error while parsing string section")]
    StringError,

    #[error("got error while parsing type section")]
    TypeError,

    #[error("got error while parsing proto section")]
    ProtoError,

    #[error("got error while parsing field section")]
    FieldError,

    #[error("got error while parsing method section")]
    MethodError,

    #[error("got error while parsing class defs")]
    ClassError,

    #[error("got error while parsing class data")]
    ClassDataError,

    #[error("got error while parsing code item")]
    CodeError,

    #[error("unknown opcode {opcode:#04x} at code unit {offset}")]
    UnknownOpcode { opcode: u8, offset: u32 },

    #[error("instruction at code unit {0} is truncated")]
    TruncatedInstruction(u32),
}
