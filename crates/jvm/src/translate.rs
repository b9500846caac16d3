//! Register-machine to stack-machine instruction translation.
//!
//! Source registers are untyped: the same register may hold an int in one
//! instruction and a reference in the next, and the destination verifier
//! will reject a local slot used at both types. Each source register is
//! therefore split into five destination slots, one per type category, and
//! every access picks the slot matching the value's category. A per-register
//! last-known-category table disambiguates the opcodes whose register type
//! is not implied by the opcode itself.

use apkvm_dex::{CodeItem, Dex, Instruction, MethodRef};
use smallvec::SmallVec;
use std::collections::HashMap;

use crate::classfile::{Code, CodeBuilder, ConstantPool, Label};
use crate::errors::JvmError;
use crate::opcodes::*;

/// Value categories; a source register owns one destination slot per category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Int = 0,
    Long = 1,
    Float = 2,
    Double = 3,
    Reference = 4,
}

/// Destination slots allocated per source register
pub const SLOTS_PER_REGISTER: u16 = 5;

impl Category {
    pub fn of_descriptor(descriptor: &str) -> Category {
        match descriptor.as_bytes().first() {
            Some(b'J') => Category::Long,
            Some(b'F') => Category::Float,
            Some(b'D') => Category::Double,
            Some(b'L') | Some(b'[') => Category::Reference,
            _ => Category::Int,
        }
    }

    fn width(self) -> u16 {
        match self {
            Category::Long | Category::Double => 2,
            _ => 1,
        }
    }

    fn load_op(self) -> u8 {
        match self {
            Category::Int => ILOAD,
            Category::Long => LLOAD,
            Category::Float => FLOAD,
            Category::Double => DLOAD,
            Category::Reference => ALOAD,
        }
    }

    fn store_op(self) -> u8 {
        match self {
            Category::Int => ISTORE,
            Category::Long => LSTORE,
            Category::Float => FSTORE,
            Category::Double => DSTORE,
            Category::Reference => ASTORE,
        }
    }

    fn return_op(self) -> u8 {
        match self {
            Category::Int => IRETURN,
            Category::Long => LRETURN,
            Category::Float => FRETURN,
            Category::Double => DRETURN,
            Category::Reference => ARETURN,
        }
    }
}

/// Shape of the method being translated
#[derive(Debug)]
pub struct MethodSignature<'a> {
    pub is_static: bool,

    /// Parameter type descriptors in order, receiver excluded
    pub parameters: &'a [String],

    /// Return type descriptor
    pub return_type: &'a str,
}

/// Whether the translator implements this instruction. A method containing
/// anything else must be stubbed whole; partial translation leaves the
/// operand stack inconsistent with the declared return type.
pub fn is_supported(instruction: &Instruction) -> bool {
    if instruction.is_payload {
        return false;
    }

    matches!(
        instruction.opcode,
        0x00..=0x0c          // nop, moves, move-results
        | 0x0e..=0x1b        // returns, consts, const-string
        | 0x1f..=0x23        // check-cast .. new-array
        | 0x27..=0x2a        // throw, gotos
        | 0x32..=0x3d        // if-cmp, if-*z
        | 0x44..=0x72        // array, instance, static accesses, invokes
        | 0x74..=0x78        // invoke-*/range
        | 0x90..=0x93        // add/sub/mul/div-int
        | 0xb0..=0xb3        // .. /2addr
        | 0xd0 | 0xd2 | 0xd3 // add/mul/div-int/lit16
        | 0xd8 | 0xda | 0xdb // add/mul/div-int/lit8
    )
}

/// Translate one fully-supported method body.
///
/// `instructions` is the decoded stream of `code_item.insns`; the caller has
/// already checked [`is_supported`] for each element.
pub fn translate(
    dex: &Dex,
    signature: &MethodSignature<'_>,
    code_item: &CodeItem,
    instructions: &[Instruction],
    pool: &mut ConstantPool,
) -> Result<Code, JvmError> {
    Translator::new(dex, signature, code_item, pool)?.run(instructions)
}

struct Translator<'a> {
    dex: &'a Dex,
    signature: &'a MethodSignature<'a>,
    builder: CodeBuilder<'a>,

    /// Host slots holding the incoming parameters (receiver included)
    param_slots: u16,

    /// First source register holding a parameter
    first_param_register: u16,

    registers: u16,

    /// Last-known category per source register
    categories: Vec<Category>,

    labels: HashMap<u32, Label>,

    /// Return descriptor of the preceding invoke, consumed by move-result
    last_invoke_return: Option<String>,

    /// Register whose uninitialized reference is still duplicated on the
    /// stack, waiting for its constructor call
    pending_new: Option<u16>,
}

impl<'a> Translator<'a> {
    fn new(
        dex: &'a Dex,
        signature: &'a MethodSignature<'a>,
        code_item: &'a CodeItem,
        pool: &'a mut ConstantPool,
    ) -> Result<Translator<'a>, JvmError> {
        let mut param_slots: u16 = if signature.is_static { 0 } else { 1 };
        for descriptor in signature.parameters {
            param_slots += Category::of_descriptor(descriptor).width();
        }

        let registers = code_item.registers_size;
        let first_param_register = registers.saturating_sub(code_item.ins_size);

        let total_slots =
            param_slots as u32 + registers as u32 * SLOTS_PER_REGISTER as u32 + 1;
        if total_slots > u16::MAX as u32 {
            return Err(JvmError::Malformed("method needs too many local slots"));
        }

        Ok(Translator {
            dex,
            signature,
            builder: CodeBuilder::new(pool),
            param_slots,
            first_param_register,
            registers,
            categories: vec![Category::Int; registers as usize],
            labels: HashMap::new(),
            last_invoke_return: None,
            pending_new: None,
        })
    }

    fn run(mut self, instructions: &[Instruction]) -> Result<Code, JvmError> {
        self.emit_prologue()?;
        self.collect_labels(instructions)?;

        for (index, instruction) in instructions.iter().enumerate() {
            if let Some(&label) = self.labels.get(&instruction.offset) {
                self.builder.bind(label);
            }

            let next = instructions.get(index + 1);
            self.emit(instruction, next)?;
        }

        let min_locals = self.param_slots + self.registers * SLOTS_PER_REGISTER;
        self.builder.finish(min_locals)
    }

    /// Mapped destination slot of a source register in one category
    fn slot(&self, register: u16, category: Category) -> u16 {
        self.param_slots + register * SLOTS_PER_REGISTER + category as u16
    }

    /// Copy every parameter from its host slot into the mapped region
    fn emit_prologue(&mut self) -> Result<(), JvmError> {
        let mut host_slot: u16 = 0;
        let mut register = self.first_param_register;

        if !self.signature.is_static {
            self.builder.visit_var(ALOAD, 0)?;
            self.builder
                .visit_var(ASTORE, self.slot(register, Category::Reference))?;
            self.set_category(register, Category::Reference);
            host_slot += 1;
            register += 1;
        }

        for descriptor in self.signature.parameters {
            let category = Category::of_descriptor(descriptor);
            self.builder.visit_var(category.load_op(), host_slot)?;
            self.builder
                .visit_var(category.store_op(), self.slot(register, category))?;
            self.set_category(register, category);
            host_slot += category.width();
            register += category.width();
        }

        Ok(())
    }

    /// First pass: a label per branch target, keyed by code-unit offset
    fn collect_labels(&mut self, instructions: &[Instruction]) -> Result<(), JvmError> {
        let starts: std::collections::HashSet<u32> =
            instructions.iter().map(|i| i.offset).collect();

        for instruction in instructions {
            if !matches!(instruction.opcode, 0x28..=0x2a | 0x32..=0x3d) {
                continue;
            }

            let target = instruction.offset as i64 + instruction.branch as i64;
            let target = u32::try_from(target)
                .map_err(|_| JvmError::BadBranchTarget(instruction.offset))?;
            if !starts.contains(&target) {
                return Err(JvmError::BadBranchTarget(target));
            }

            if !self.labels.contains_key(&target) {
                let label = self.builder.new_label();
                self.labels.insert(target, label);
            }
        }

        Ok(())
    }

    fn category(&self, register: u16) -> Category {
        self.categories
            .get(register as usize)
            .copied()
            .unwrap_or(Category::Int)
    }

    fn set_category(&mut self, register: u16, category: Category) {
        if let Some(slot) = self.categories.get_mut(register as usize) {
            *slot = category;
        }
    }

    fn label(&self, instruction: &Instruction) -> Result<Label, JvmError> {
        let target = (instruction.offset as i64 + instruction.branch as i64) as u32;
        self.labels
            .get(&target)
            .copied()
            .ok_or(JvmError::BadBranchTarget(target))
    }

    fn string_ref(&self, index: u32) -> Result<String, JvmError> {
        self.dex
            .get_string(index as usize)
            .map(|s| s.into_owned())
            .ok_or(JvmError::BadReference(index))
    }

    fn type_ref(&self, index: u32) -> Result<String, JvmError> {
        self.dex
            .get_type(index as usize)
            .map(|s| s.into_owned())
            .ok_or(JvmError::BadReference(index))
    }

    fn field_ref(&self, index: u32) -> Result<apkvm_dex::FieldRef, JvmError> {
        self.dex
            .field_ref(index)
            .ok_or(JvmError::BadReference(index))
    }

    fn method_ref(&self, index: u32) -> Result<MethodRef, JvmError> {
        self.dex
            .method_ref(index)
            .ok_or(JvmError::BadReference(index))
    }

    /// Load a register through its category slot
    fn load(&mut self, register: u16, category: Category) -> Result<(), JvmError> {
        self.builder
            .visit_var(category.load_op(), self.slot(register, category))
    }

    /// Store the stack top into a register's category slot and remember the
    /// category
    fn store(&mut self, register: u16, category: Category) -> Result<(), JvmError> {
        self.builder
            .visit_var(category.store_op(), self.slot(register, category))?;
        self.set_category(register, category);
        Ok(())
    }

    /// Category of a register that may hold either of two narrow types
    fn narrow_category(&self, register: u16) -> Category {
        match self.category(register) {
            Category::Float => Category::Float,
            _ => Category::Int,
        }
    }

    fn wide_category(&self, register: u16) -> Category {
        match self.category(register) {
            Category::Double => Category::Double,
            _ => Category::Long,
        }
    }

    fn emit(&mut self, insn: &Instruction, next: Option<&Instruction>) -> Result<(), JvmError> {
        match insn.opcode {
            // nop
            0x00 => self.builder.visit_insn(NOP)?,

            // move, move/from16, move/16
            0x01..=0x03 => {
                let category = self.narrow_category(insn.reg_b);
                self.load(insn.reg_b, category)?;
                self.store(insn.reg_a, category)?;
            }

            // move-wide family
            0x04..=0x06 => {
                let category = self.wide_category(insn.reg_b);
                self.load(insn.reg_b, category)?;
                self.store(insn.reg_a, category)?;
            }

            // move-object family
            0x07..=0x09 => {
                self.load(insn.reg_b, Category::Reference)?;
                self.store(insn.reg_a, Category::Reference)?;
            }

            // move-result, move-result-wide, move-result-object
            0x0a..=0x0c => {
                let descriptor = self
                    .last_invoke_return
                    .take()
                    .ok_or(JvmError::Malformed("move-result without invoke"))?;
                let category = match insn.opcode {
                    0x0c => Category::Reference,
                    _ => Category::of_descriptor(&descriptor),
                };
                self.store(insn.reg_a, category)?;
            }

            // return-void
            0x0e => self.builder.visit_insn(RETURN)?,

            // return, return-wide, return-object
            0x0f..=0x11 => {
                let category = Category::of_descriptor(self.signature.return_type);
                self.load(insn.reg_a, category)?;
                self.builder.visit_insn(category.return_op())?;
            }

            // const/4, const/16, const, const/high16
            0x12..=0x15 => {
                self.builder.const_int(insn.literal as i32)?;
                self.store(insn.reg_a, Category::Int)?;
            }

            // const-wide/16, /32, const-wide, /high16
            0x16..=0x19 => {
                self.builder.const_long(insn.literal)?;
                self.store(insn.reg_a, Category::Long)?;
            }

            // const-string, const-string/jumbo
            0x1a | 0x1b => {
                let value = self.string_ref(insn.reference)?;
                self.builder.const_string(&value)?;
                self.store(insn.reg_a, Category::Reference)?;
            }

            // check-cast
            0x1f => {
                let target = internal_name(&self.type_ref(insn.reference)?);
                self.load(insn.reg_a, Category::Reference)?;
                self.builder.visit_type(CHECKCAST, &target)?;
                self.store(insn.reg_a, Category::Reference)?;
            }

            // instance-of
            0x20 => {
                let target = internal_name(&self.type_ref(insn.reference)?);
                self.load(insn.reg_b, Category::Reference)?;
                self.builder.visit_type(INSTANCEOF, &target)?;
                self.store(insn.reg_a, Category::Int)?;
            }

            // array-length
            0x21 => {
                self.load(insn.reg_b, Category::Reference)?;
                self.builder.visit_insn(ARRAYLENGTH)?;
                self.store(insn.reg_a, Category::Int)?;
            }

            // new-instance
            0x22 => {
                let target = internal_name(&self.type_ref(insn.reference)?);
                self.builder.visit_type(NEW, &target)?;
                self.builder.visit_insn(DUP)?;
                self.store(insn.reg_a, Category::Reference)?;
                self.pending_new = Some(insn.reg_a);
            }

            // new-array
            0x23 => {
                let descriptor = self.type_ref(insn.reference)?;
                let element = descriptor
                    .strip_prefix('[')
                    .ok_or(JvmError::Malformed("new-array of non-array type"))?;

                self.load(insn.reg_b, Category::Int)?;
                match element.as_bytes().first() {
                    Some(b'L') | Some(b'[') => {
                        self.builder.visit_type(ANEWARRAY, &internal_name(element))?;
                    }
                    Some(primitive) => {
                        self.builder.visit_newarray(primitive_array_type(*primitive)?)?;
                    }
                    None => return Err(JvmError::Malformed("empty array descriptor")),
                }
                self.store(insn.reg_a, Category::Reference)?;
            }

            // throw
            0x27 => {
                self.load(insn.reg_a, Category::Reference)?;
                self.builder.visit_insn(ATHROW)?;
            }

            // goto, goto/16, goto/32
            0x28..=0x2a => {
                let label = self.label(insn)?;
                self.builder.visit_jump(GOTO, label)?;
            }

            // if-eq .. if-le
            0x32..=0x37 => self.emit_if_cmp(insn)?,

            // if-eqz .. if-lez
            0x38..=0x3d => self.emit_if_z(insn)?,

            // aget family
            0x44..=0x4a => self.emit_aget(insn)?,

            // aput family
            0x4b..=0x51 => self.emit_aput(insn)?,

            // iget family
            0x52..=0x58 => {
                let field = self.field_ref(insn.reference)?;
                let category = Category::of_descriptor(&field.descriptor);
                self.load(insn.reg_b, Category::Reference)?;
                self.builder.visit_field(
                    GETFIELD,
                    &internal_name(&field.owner),
                    &field.name,
                    &field.descriptor,
                )?;
                self.store(insn.reg_a, category)?;
            }

            // iput family
            0x59..=0x5f => {
                let field = self.field_ref(insn.reference)?;
                let category = Category::of_descriptor(&field.descriptor);
                self.load(insn.reg_b, Category::Reference)?;
                self.load(insn.reg_a, category)?;
                self.builder.visit_field(
                    PUTFIELD,
                    &internal_name(&field.owner),
                    &field.name,
                    &field.descriptor,
                )?;
            }

            // sget family
            0x60..=0x66 => {
                let field = self.field_ref(insn.reference)?;
                let category = Category::of_descriptor(&field.descriptor);
                self.builder.visit_field(
                    GETSTATIC,
                    &internal_name(&field.owner),
                    &field.name,
                    &field.descriptor,
                )?;
                self.store(insn.reg_a, category)?;
            }

            // sput family
            0x67..=0x6d => {
                let field = self.field_ref(insn.reference)?;
                let category = Category::of_descriptor(&field.descriptor);
                self.load(insn.reg_a, category)?;
                self.builder.visit_field(
                    PUTSTATIC,
                    &internal_name(&field.owner),
                    &field.name,
                    &field.descriptor,
                )?;
            }

            // invoke-virtual .. invoke-interface, and the range forms
            0x6e..=0x72 | 0x74..=0x78 => self.emit_invoke(insn)?,

            // add/sub/mul/div-int
            0x90..=0x93 => {
                self.load(insn.reg_b, Category::Int)?;
                self.load(insn.reg_c, Category::Int)?;
                self.builder.visit_insn(arith_op(insn.opcode - 0x90))?;
                self.store(insn.reg_a, Category::Int)?;
            }

            // add/sub/mul/div-int/2addr
            0xb0..=0xb3 => {
                self.load(insn.reg_a, Category::Int)?;
                self.load(insn.reg_b, Category::Int)?;
                self.builder.visit_insn(arith_op(insn.opcode - 0xb0))?;
                self.store(insn.reg_a, Category::Int)?;
            }

            // add/mul/div-int/lit16
            0xd0 | 0xd2 | 0xd3 => {
                self.load(insn.reg_b, Category::Int)?;
                self.builder.const_int(insn.literal as i32)?;
                self.builder.visit_insn(arith_op(insn.opcode - 0xd0))?;
                self.store(insn.reg_a, Category::Int)?;
            }

            // add/mul/div-int/lit8
            0xd8 | 0xda | 0xdb => {
                self.load(insn.reg_b, Category::Int)?;
                self.builder.const_int(insn.literal as i32)?;
                self.builder.visit_insn(arith_op(insn.opcode - 0xd8))?;
                self.store(insn.reg_a, Category::Int)?;
            }

            other => return Err(JvmError::UnsupportedOpcode(other)),
        }

        // a non-void invoke result nobody stores must be dropped so the
        // stack is empty at every instruction boundary
        if let Some(descriptor) = self.last_invoke_return.clone() {
            let consumed = matches!(next.map(|n| n.opcode), Some(0x0a..=0x0c));
            let is_invoke = matches!(insn.opcode, 0x6e..=0x72 | 0x74..=0x78);
            if is_invoke && !consumed {
                match Category::of_descriptor(&descriptor).width() {
                    2 => self.builder.visit_insn(POP2)?,
                    _ => self.builder.visit_insn(POP)?,
                }
                self.last_invoke_return = None;
            }
        }

        Ok(())
    }

    /// Binary compare-and-branch; `eq`/`ne` dispatch on the operand
    /// categories, the ordered forms are always integer
    fn emit_if_cmp(&mut self, insn: &Instruction) -> Result<(), JvmError> {
        let label = self.label(insn)?;
        let reference = self.category(insn.reg_a) == Category::Reference
            || self.category(insn.reg_b) == Category::Reference;

        let op = match (insn.opcode, reference) {
            (0x32, true) => IF_ACMPEQ,
            (0x33, true) => IF_ACMPNE,
            (0x32, false) => IF_ICMPEQ,
            (0x33, false) => IF_ICMPNE,
            (0x34, _) => IF_ICMPLT,
            (0x35, _) => IF_ICMPGE,
            (0x36, _) => IF_ICMPGT,
            (0x37, _) => IF_ICMPLE,
            _ => unreachable!(),
        };

        let category = if reference && insn.opcode <= 0x33 {
            Category::Reference
        } else {
            Category::Int
        };
        self.load(insn.reg_a, category)?;
        self.load(insn.reg_b, category)?;
        self.builder.visit_jump(op, label)
    }

    /// Test against zero or null by the register's last-known category
    fn emit_if_z(&mut self, insn: &Instruction) -> Result<(), JvmError> {
        let label = self.label(insn)?;
        let reference = self.category(insn.reg_a) == Category::Reference;

        let (op, category) = match (insn.opcode, reference) {
            (0x38, true) => (IFNULL, Category::Reference),
            (0x39, true) => (IFNONNULL, Category::Reference),
            (0x38, false) => (IFEQ, Category::Int),
            (0x39, false) => (IFNE, Category::Int),
            (0x3a, _) => (IFLT, Category::Int),
            (0x3b, _) => (IFGE, Category::Int),
            (0x3c, _) => (IFGT, Category::Int),
            (0x3d, _) => (IFLE, Category::Int),
            _ => unreachable!(),
        };

        self.load(insn.reg_a, category)?;
        self.builder.visit_jump(op, label)
    }

    fn emit_aget(&mut self, insn: &Instruction) -> Result<(), JvmError> {
        let (load_op, category) = match insn.opcode {
            0x44 => (IALOAD, Category::Int),
            0x45 => (LALOAD, Category::Long),
            0x46 => (AALOAD, Category::Reference),
            0x47 => (BALOAD, Category::Int), // boolean
            0x48 => (BALOAD, Category::Int), // byte
            0x49 => (CALOAD, Category::Int),
            0x4a => (SALOAD, Category::Int),
            _ => unreachable!(),
        };

        self.load(insn.reg_b, Category::Reference)?;
        self.load(insn.reg_c, Category::Int)?;
        self.builder.visit_insn(load_op)?;
        self.store(insn.reg_a, category)
    }

    fn emit_aput(&mut self, insn: &Instruction) -> Result<(), JvmError> {
        let (store_op, category) = match insn.opcode {
            0x4b => (IASTORE, Category::Int),
            0x4c => (LASTORE, Category::Long),
            0x4d => (AASTORE, Category::Reference),
            0x4e => (BASTORE, Category::Int), // boolean
            0x4f => (BASTORE, Category::Int), // byte
            0x50 => (CASTORE, Category::Int),
            0x51 => (SASTORE, Category::Int),
            _ => unreachable!(),
        };

        self.load(insn.reg_b, Category::Reference)?;
        self.load(insn.reg_c, Category::Int)?;
        self.load(insn.reg_a, category)?;
        self.builder.visit_insn(store_op)
    }

    fn emit_invoke(&mut self, insn: &Instruction) -> Result<(), JvmError> {
        let method = self.method_ref(insn.reference)?;
        let is_range = insn.opcode >= 0x74;
        let kind = if is_range {
            insn.opcode - 0x74
        } else {
            insn.opcode - 0x6e
        };

        let registers: SmallVec<[u16; 5]> = if is_range {
            (insn.range_start..insn.range_start + insn.arg_count as u16).collect()
        } else {
            SmallVec::from_slice(&insn.args[..insn.arg_count as usize])
        };

        let is_static = kind == 3;
        let mut cursor = registers.iter();

        if !is_static {
            let receiver = *cursor
                .next()
                .ok_or(JvmError::Malformed("invoke without receiver"))?;

            // a constructor call right after new-instance consumes the
            // reference the NEW/DUP pair left on the stack
            if kind == 2 && method.name == "<init>" && self.pending_new == Some(receiver) {
                self.pending_new = None;
            } else {
                self.load(receiver, Category::Reference)?;
            }
        }

        let remaining: SmallVec<[u16; 5]> = cursor.copied().collect();
        let mut next_register = 0usize;
        for descriptor in &method.parameters {
            let category = Category::of_descriptor(descriptor);
            let register = *remaining
                .get(next_register)
                .ok_or(JvmError::Malformed("invoke register list too short"))?;
            self.load(register, category)?;
            // a wide argument spans two consecutive source registers
            next_register += category.width() as usize;
        }

        let descriptor = method_descriptor(&method.parameters, &method.return_type);
        let owner = internal_name(&method.owner);

        let (op, interface) = match kind {
            0 => (INVOKEVIRTUAL, false),
            1 | 2 => (INVOKESPECIAL, false),
            3 => (INVOKESTATIC, false),
            4 => (INVOKEINTERFACE, true),
            _ => return Err(JvmError::UnsupportedOpcode(insn.opcode)),
        };

        self.builder
            .visit_method(op, &owner, &method.name, &descriptor, interface)?;

        // the pop for an unconsumed result happens in emit()
        self.last_invoke_return = if method.return_type != "V" {
            Some(method.return_type.clone())
        } else {
            None
        };

        Ok(())
    }
}

fn arith_op(index: u8) -> u8 {
    match index {
        0 => IADD,
        1 => ISUB,
        2 => IMUL,
        _ => IDIV,
    }
}

fn primitive_array_type(descriptor_byte: u8) -> Result<u8, JvmError> {
    Ok(match descriptor_byte {
        b'Z' => array_type::T_BOOLEAN,
        b'C' => array_type::T_CHAR,
        b'F' => array_type::T_FLOAT,
        b'D' => array_type::T_DOUBLE,
        b'B' => array_type::T_BYTE,
        b'S' => array_type::T_SHORT,
        b'I' => array_type::T_INT,
        b'J' => array_type::T_LONG,
        _ => return Err(JvmError::Malformed("unknown primitive array element")),
    })
}

/// `Lcom/x/Foo;` → `com/x/Foo`; array descriptors pass through unchanged
pub fn internal_name(descriptor: &str) -> String {
    descriptor
        .strip_prefix('L')
        .and_then(|s| s.strip_suffix(';'))
        .map(str::to_owned)
        .unwrap_or_else(|| descriptor.to_owned())
}

/// Rebuild the destination descriptor from source descriptors
pub fn method_descriptor(parameters: &[String], return_type: &str) -> String {
    let mut out = String::from("(");
    for parameter in parameters {
        out.push_str(parameter);
    }
    out.push(')');
    out.push_str(return_type);
    out
}
