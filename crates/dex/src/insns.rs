//! Dalvik instruction stream decoding.
//!
//! Every instruction is decoded into a flat operand bundle: register
//! indices, literals, a branch offset in 16-bit code units, and a constant
//! pool reference. The per-opcode format table drives both operand layout
//! and instruction length, so iteration over a method body stays aligned
//! even across instructions the translator does not support.

use crate::errors::DexError;

/// Instruction encodings, named after the dex format ids
///
/// See: <https://source.android.com/docs/core/runtime/instruction-formats>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    F10x,
    F12x,
    F11n,
    F11x,
    F10t,
    F20t,
    F22x,
    F21t,
    F21s,
    F21h,
    F21c,
    F23x,
    F22b,
    F22t,
    F22s,
    F22c,
    F30t,
    F32x,
    F31i,
    F31t,
    F31c,
    F35c,
    F3rc,
    F45cc,
    F4rcc,
    F51l,
    Unused,
}

impl Format {
    /// Length in 16-bit code units
    fn units(self) -> u16 {
        match self {
            Format::F10x | Format::F12x | Format::F11n | Format::F11x | Format::F10t => 1,
            Format::F20t
            | Format::F22x
            | Format::F21t
            | Format::F21s
            | Format::F21h
            | Format::F21c
            | Format::F23x
            | Format::F22b
            | Format::F22t
            | Format::F22s
            | Format::F22c => 2,
            Format::F30t
            | Format::F32x
            | Format::F31i
            | Format::F31t
            | Format::F31c
            | Format::F35c
            | Format::F3rc => 3,
            Format::F45cc | Format::F4rcc => 4,
            Format::F51l => 5,
            Format::Unused => 0,
        }
    }
}

/// Format of each of the 256 opcodes
///
/// See: <https://source.android.com/docs/core/runtime/dalvik-bytecode>
fn format_of(opcode: u8) -> Format {
    match opcode {
        0x00 => Format::F10x,                  // nop
        0x01 | 0x04 | 0x07 => Format::F12x,    // move, move-wide, move-object
        0x02 | 0x05 | 0x08 => Format::F22x,    // move*/from16
        0x03 | 0x06 | 0x09 => Format::F32x,    // move*/16
        0x0a..=0x0d => Format::F11x,           // move-result*, move-exception
        0x0e => Format::F10x,                  // return-void
        0x0f..=0x11 => Format::F11x,           // return*
        0x12 => Format::F11n,                  // const/4
        0x13 => Format::F21s,                  // const/16
        0x14 => Format::F31i,                  // const
        0x15 => Format::F21h,                  // const/high16
        0x16 => Format::F21s,                  // const-wide/16
        0x17 => Format::F31i,                  // const-wide/32
        0x18 => Format::F51l,                  // const-wide
        0x19 => Format::F21h,                  // const-wide/high16
        0x1a => Format::F21c,                  // const-string
        0x1b => Format::F31c,                  // const-string/jumbo
        0x1c => Format::F21c,                  // const-class
        0x1d | 0x1e => Format::F11x,           // monitor-enter/exit
        0x1f => Format::F21c,                  // check-cast
        0x20 => Format::F22c,                  // instance-of
        0x21 => Format::F12x,                  // array-length
        0x22 => Format::F21c,                  // new-instance
        0x23 => Format::F22c,                  // new-array
        0x24 => Format::F35c,                  // filled-new-array
        0x25 => Format::F3rc,                  // filled-new-array/range
        0x26 => Format::F31t,                  // fill-array-data
        0x27 => Format::F11x,                  // throw
        0x28 => Format::F10t,                  // goto
        0x29 => Format::F20t,                  // goto/16
        0x2a => Format::F30t,                  // goto/32
        0x2b | 0x2c => Format::F31t,           // packed-switch, sparse-switch
        0x2d..=0x31 => Format::F23x,           // cmp*
        0x32..=0x37 => Format::F22t,           // if-cmp
        0x38..=0x3d => Format::F21t,           // if-*z
        0x44..=0x51 => Format::F23x,           // aget*, aput*
        0x52..=0x5f => Format::F22c,           // iget*, iput*
        0x60..=0x6d => Format::F21c,           // sget*, sput*
        0x6e..=0x72 => Format::F35c,           // invoke-*
        0x74..=0x78 => Format::F3rc,           // invoke-*/range
        0x7b..=0x8f => Format::F12x,           // unary ops, conversions
        0x90..=0xaf => Format::F23x,           // binary ops
        0xb0..=0xcf => Format::F12x,           // binary ops /2addr
        0xd0..=0xd7 => Format::F22s,           // binary ops /lit16
        0xd8..=0xe2 => Format::F22b,           // binary ops /lit8
        0xfa => Format::F45cc,                 // invoke-polymorphic
        0xfb => Format::F4rcc,                 // invoke-polymorphic/range
        0xfc => Format::F35c,                  // invoke-custom
        0xfd => Format::F3rc,                  // invoke-custom/range
        0xfe | 0xff => Format::F21c,           // const-method-handle/-type
        _ => Format::Unused,
    }
}

/// Pseudo-opcode idents in the high byte of a `nop` unit
const PACKED_SWITCH_PAYLOAD: u16 = 0x01;
const SPARSE_SWITCH_PAYLOAD: u16 = 0x02;
const FILL_ARRAY_PAYLOAD: u16 = 0x03;

/// One decoded instruction with its format-determined operand bundle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u8,

    /// Code-unit index of this instruction's first unit within the method
    pub offset: u32,

    /// Length in 16-bit code units
    pub units: u16,

    pub reg_a: u16,
    pub reg_b: u16,
    pub reg_c: u16,

    /// Argument registers of the five-register call format, C..G order
    pub args: [u16; 5],

    /// Register count for the call formats
    pub arg_count: u8,

    /// First register of the range call format
    pub range_start: u16,

    /// Narrow or wide literal, sign-extended
    pub literal: i64,

    /// Signed branch offset in code units, relative to this instruction
    pub branch: i32,

    /// Type, field, method, or string index
    pub reference: u32,

    /// True for switch and array payload pseudo-instructions
    pub is_payload: bool,
}

/// Decode a whole instruction stream.
///
/// The resulting sequence preserves source order and covers every code unit;
/// branch targets are `instruction.offset + instruction.branch`.
pub fn decode(insns: &[u16]) -> Result<Vec<Instruction>, DexError> {
    let mut out = Vec::new();
    let mut pos = 0usize;

    while pos < insns.len() {
        let instruction = decode_at(insns, pos)?;
        pos += instruction.units as usize;
        out.push(instruction);
    }

    Ok(out)
}

fn decode_at(insns: &[u16], pos: usize) -> Result<Instruction, DexError> {
    let offset = pos as u32;
    let unit = insns[pos];
    let opcode = (unit & 0xff) as u8;
    let high = unit >> 8;

    // payload pseudo-instructions hide behind the nop opcode
    if opcode == 0x00 && high != 0 {
        return decode_payload(insns, pos, high);
    }

    let format = format_of(opcode);
    if format == Format::Unused {
        return Err(DexError::UnknownOpcode { opcode, offset });
    }

    let units = format.units();
    if pos + units as usize > insns.len() {
        return Err(DexError::TruncatedInstruction(offset));
    }

    let mut insn = Instruction {
        opcode,
        offset,
        units,
        ..Instruction::default()
    };

    let word = |i: usize| insns[pos + i];
    let dword = |i: usize| (word(i) as u32) | ((word(i + 1) as u32) << 16);

    match format {
        Format::F10x => {}
        Format::F12x => {
            insn.reg_a = high & 0xf;
            insn.reg_b = high >> 4;
        }
        Format::F11n => {
            insn.reg_a = high & 0xf;
            // 4-bit signed literal
            insn.literal = (((high >> 4) as i8) << 4 >> 4) as i64;
        }
        Format::F11x => insn.reg_a = high,
        Format::F10t => insn.branch = (high as u8 as i8) as i32,
        Format::F20t => insn.branch = word(1) as i16 as i32,
        Format::F22x => {
            insn.reg_a = high;
            insn.reg_b = word(1);
        }
        Format::F21t => {
            insn.reg_a = high;
            insn.branch = word(1) as i16 as i32;
        }
        Format::F21s => {
            insn.reg_a = high;
            insn.literal = word(1) as i16 as i64;
        }
        Format::F21h => {
            insn.reg_a = high;
            // the literal supplies the high 16 bits of a 32- or 64-bit zero
            insn.literal = if opcode == 0x19 {
                (word(1) as i16 as i64) << 48
            } else {
                (word(1) as i16 as i64) << 16
            };
        }
        Format::F21c => {
            insn.reg_a = high;
            insn.reference = word(1) as u32;
        }
        Format::F23x => {
            insn.reg_a = high;
            insn.reg_b = word(1) & 0xff;
            insn.reg_c = word(1) >> 8;
        }
        Format::F22b => {
            insn.reg_a = high;
            insn.reg_b = word(1) & 0xff;
            insn.literal = ((word(1) >> 8) as u8 as i8) as i64;
        }
        Format::F22t => {
            insn.reg_a = high & 0xf;
            insn.reg_b = high >> 4;
            insn.branch = word(1) as i16 as i32;
        }
        Format::F22s => {
            insn.reg_a = high & 0xf;
            insn.reg_b = high >> 4;
            insn.literal = word(1) as i16 as i64;
        }
        Format::F22c => {
            insn.reg_a = high & 0xf;
            insn.reg_b = high >> 4;
            insn.reference = word(1) as u32;
        }
        Format::F30t => insn.branch = dword(1) as i32,
        Format::F32x => {
            insn.reg_a = word(1);
            insn.reg_b = word(2);
        }
        Format::F31i => {
            insn.reg_a = high;
            insn.literal = dword(1) as i32 as i64;
        }
        Format::F31t => {
            insn.reg_a = high;
            insn.branch = dword(1) as i32;
        }
        Format::F31c => {
            insn.reg_a = high;
            insn.reference = dword(1);
        }
        Format::F35c => {
            insn.arg_count = (high >> 4) as u8;
            insn.reference = word(1) as u32;
            let regs = word(2);
            insn.args = [
                regs & 0xf,
                (regs >> 4) & 0xf,
                (regs >> 8) & 0xf,
                (regs >> 12) & 0xf,
                high & 0xf,
            ];
        }
        Format::F3rc => {
            insn.arg_count = high as u8;
            insn.reference = word(1) as u32;
            insn.range_start = word(2);
        }
        Format::F45cc | Format::F4rcc => {
            // decoded only far enough to keep the stream aligned
            insn.reference = word(1) as u32;
        }
        Format::F51l => {
            insn.reg_a = high;
            insn.literal = (dword(1) as u64 | ((dword(3) as u64) << 32)) as i64;
        }
        Format::Unused => unreachable!(),
    }

    Ok(insn)
}

/// Payload lengths per <https://source.android.com/docs/core/runtime/dalvik-bytecode>
fn decode_payload(insns: &[u16], pos: usize, ident: u16) -> Result<Instruction, DexError> {
    let offset = pos as u32;
    let available = insns.len() - pos;

    let units = match ident {
        PACKED_SWITCH_PAYLOAD => {
            if available < 2 {
                return Err(DexError::TruncatedInstruction(offset));
            }
            let size = insns[pos + 1] as usize;
            (size * 2 + 4) as u32
        }
        SPARSE_SWITCH_PAYLOAD => {
            if available < 2 {
                return Err(DexError::TruncatedInstruction(offset));
            }
            let size = insns[pos + 1] as usize;
            (size * 4 + 2) as u32
        }
        FILL_ARRAY_PAYLOAD => {
            if available < 4 {
                return Err(DexError::TruncatedInstruction(offset));
            }
            let width = insns[pos + 1] as usize;
            let size = (insns[pos + 2] as usize) | ((insns[pos + 3] as usize) << 16);
            (size * width).div_ceil(2) as u32 + 4
        }
        _ => {
            return Err(DexError::UnknownOpcode { opcode: 0x00, offset });
        }
    };

    if units as usize > available || units > u16::MAX as u32 {
        return Err(DexError::TruncatedInstruction(offset));
    }

    Ok(Instruction {
        opcode: 0x00,
        offset,
        units: units as u16,
        is_payload: true,
        ..Instruction::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_const4_and_return() {
        // const/4 v1, #-1 ; return-void
        let insns = [0xf112u16, 0x000e];
        let decoded = decode(&insns).unwrap();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].opcode, 0x12);
        assert_eq!(decoded[0].reg_a, 1);
        assert_eq!(decoded[0].literal, -1);
        assert_eq!(decoded[1].opcode, 0x0e);
        assert_eq!(decoded[1].offset, 1);
    }

    #[test]
    fn decodes_branches_with_code_unit_offsets() {
        // if-eqz v0, +4 ; nop ; nop ; return-void
        let insns = [0x0038u16, 0x0004, 0x0000, 0x0000, 0x000e];
        let decoded = decode(&insns).unwrap();

        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0].opcode, 0x38);
        assert_eq!(decoded[0].branch, 4);
        assert_eq!(decoded[0].offset + decoded[0].branch as u32, 4);
        assert_eq!(decoded[3].opcode, 0x0e);
        assert_eq!(decoded[3].offset, 4);
    }

    #[test]
    fn decodes_backward_branch() {
        // nop ; goto -1
        let insns = [0x0000u16, 0xff28];
        let decoded = decode(&insns).unwrap();
        assert_eq!(decoded[1].branch, -1);
    }

    #[test]
    fn decodes_invoke_35c_register_list() {
        // invoke-virtual {v2, v3}, method@8
        let insns = [0x206eu16, 0x0008, 0x0032];
        let decoded = decode(&insns).unwrap();

        let invoke = &decoded[0];
        assert_eq!(invoke.opcode, 0x6e);
        assert_eq!(invoke.arg_count, 2);
        assert_eq!(invoke.reference, 8);
        assert_eq!(&invoke.args[..2], &[2, 3]);
    }

    #[test]
    fn decodes_invoke_range() {
        // invoke-static/range {v4..v6}, method@2
        let insns = [0x0377u16, 0x0002, 0x0004];
        let decoded = decode(&insns).unwrap();

        assert_eq!(decoded[0].arg_count, 3);
        assert_eq!(decoded[0].range_start, 4);
    }

    #[test]
    fn decodes_wide_literal() {
        // const-wide v0, #0x1_0000_0001
        let insns = [0x0018u16, 0x0001, 0x0000, 0x0001, 0x0000];
        let decoded = decode(&insns).unwrap();

        assert_eq!(decoded[0].units, 5);
        assert_eq!(decoded[0].literal, 0x1_0000_0001);
    }

    #[test]
    fn const_high16_shifts_into_place() {
        // const/high16 v0, #0x7f00_0000
        let insns = [0x0015u16, 0x7f00];
        let decoded = decode(&insns).unwrap();
        assert_eq!(decoded[0].literal, 0x7f00_0000);

        // const-wide/high16 v0, #0x4010_0000_0000_0000 (2.0 as raw double bits)
        let insns = [0x0019u16, 0x4010];
        let decoded = decode(&insns).unwrap();
        assert_eq!(decoded[0].literal, 0x4010_0000_0000_0000);
    }

    #[test]
    fn payload_is_skipped_whole() {
        // packed-switch-payload, 2 targets
        let insns = [0x0100u16, 0x0002, 0x0000, 0x0000, 0x0005, 0x0000, 0x0007, 0x0000, 0x000e];
        let decoded = decode(&insns).unwrap();

        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].is_payload);
        assert_eq!(decoded[0].units, 8);
        assert_eq!(decoded[1].opcode, 0x0e);
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        let insns = [0x00e6u16];
        assert!(matches!(
            decode(&insns),
            Err(DexError::UnknownOpcode { opcode: 0xe6, .. })
        ));
    }

    #[test]
    fn truncated_instruction_is_an_error() {
        // const needs 3 units
        let insns = [0x0014u16, 0x0001];
        assert!(matches!(
            decode(&insns),
            Err(DexError::TruncatedInstruction(0))
        ));
    }
}
