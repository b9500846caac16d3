use apkvm_dex::DexError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JvmError {
    /// Method body contains an opcode outside the translated set
    #[error("unsupported opcode {0:#04x}")]
    UnsupportedOpcode(u8),

    /// Branch lands between instructions or outside the method
    #[error("branch target {0} does not start an instruction")]
    BadBranchTarget(u32),

    /// String, type, field or method index cannot be resolved
    #[error("unresolvable reference {0}")]
    BadReference(u32),

    /// More than 65534 constants in one class
    #[error("constant pool overflow")]
    PoolOverflow,

    /// Emitted branch distance does not fit the 16-bit offset form
    #[error("branch offset out of range")]
    BranchOutOfRange,

    #[error("malformed method body: {0}")]
    Malformed(&'static str),

    #[error("class has no name")]
    UnnamedClass,

    #[error(transparent)]
    Dex(#[from] DexError),
}
