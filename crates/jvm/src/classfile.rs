//! Class-file assembly: constant pool, method code, and final serialization.
//!
//! The code builder exposes ASM-flavoured `visit_*` methods and owns the
//! bookkeeping the translator must not do itself: operand stack depth,
//! local-slot high-water mark, and branch fixups.

use std::collections::HashMap;

use crate::errors::JvmError;
use crate::opcodes::*;

/// Class files are pinned to version 49.0, the newest version the verifier
/// accepts without stack-map frames.
pub const CLASS_MAJOR_VERSION: u16 = 49;
pub const CLASS_MINOR_VERSION: u16 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Constant {
    Utf8(String),
    Integer(i32),
    /// Raw bits; NaN payloads must deduplicate exactly
    Float(u32),
    Long(i64),
    /// Raw bits
    Double(u64),
    Class(u16),
    String(u16),
    Fieldref(u16, u16),
    Methodref(u16, u16),
    InterfaceMethodref(u16, u16),
    NameAndType(u16, u16),

    /// Second slot of a long or double entry
    Reserved,
}

impl Constant {
    fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => 1,
            Constant::Integer(_) => 3,
            Constant::Float(_) => 4,
            Constant::Long(_) => 5,
            Constant::Double(_) => 6,
            Constant::Class(_) => 7,
            Constant::String(_) => 8,
            Constant::Fieldref(..) => 9,
            Constant::Methodref(..) => 10,
            Constant::InterfaceMethodref(..) => 11,
            Constant::NameAndType(..) => 12,
            Constant::Reserved => 0,
        }
    }
}

/// Deduplicating constant pool builder
#[derive(Debug, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    lookup: HashMap<Constant, u16>,
}

impl ConstantPool {
    fn push(&mut self, constant: Constant) -> Result<u16, JvmError> {
        if let Some(&index) = self.lookup.get(&constant) {
            return Ok(index);
        }

        let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
        let index = self.entries.len() + 1;
        if index + wide as usize > 0xfffe {
            return Err(JvmError::PoolOverflow);
        }

        let index = index as u16;
        self.lookup.insert(constant.clone(), index);
        self.entries.push(constant);
        if wide {
            self.entries.push(Constant::Reserved);
        }

        Ok(index)
    }

    pub fn utf8(&mut self, value: &str) -> Result<u16, JvmError> {
        self.push(Constant::Utf8(value.to_owned()))
    }

    pub fn class(&mut self, internal_name: &str) -> Result<u16, JvmError> {
        let name = self.utf8(internal_name)?;
        self.push(Constant::Class(name))
    }

    pub fn string(&mut self, value: &str) -> Result<u16, JvmError> {
        let utf8 = self.utf8(value)?;
        self.push(Constant::String(utf8))
    }

    pub fn integer(&mut self, value: i32) -> Result<u16, JvmError> {
        self.push(Constant::Integer(value))
    }

    pub fn long(&mut self, value: i64) -> Result<u16, JvmError> {
        self.push(Constant::Long(value))
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16, JvmError> {
        let name = self.utf8(name)?;
        let descriptor = self.utf8(descriptor)?;
        self.push(Constant::NameAndType(name, descriptor))
    }

    pub fn field_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, JvmError> {
        let class = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        self.push(Constant::Fieldref(class, nat))
    }

    pub fn method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        interface: bool,
    ) -> Result<u16, JvmError> {
        let class = self.class(owner)?;
        let nat = self.name_and_type(name, descriptor)?;
        if interface {
            self.push(Constant::InterfaceMethodref(class, nat))
        } else {
            self.push(Constant::Methodref(class, nat))
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&((self.entries.len() + 1) as u16).to_be_bytes());

        for entry in &self.entries {
            match entry {
                Constant::Reserved => {}
                Constant::Utf8(s) => {
                    out.push(entry.tag());
                    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
                    out.extend_from_slice(s.as_bytes());
                }
                Constant::Integer(v) => {
                    out.push(entry.tag());
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Float(bits) => {
                    out.push(entry.tag());
                    out.extend_from_slice(&bits.to_be_bytes());
                }
                Constant::Long(v) => {
                    out.push(entry.tag());
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Double(bits) => {
                    out.push(entry.tag());
                    out.extend_from_slice(&bits.to_be_bytes());
                }
                Constant::Class(n) | Constant::String(n) => {
                    out.push(entry.tag());
                    out.extend_from_slice(&n.to_be_bytes());
                }
                Constant::Fieldref(a, b)
                | Constant::Methodref(a, b)
                | Constant::InterfaceMethodref(a, b)
                | Constant::NameAndType(a, b) => {
                    out.push(entry.tag());
                    out.extend_from_slice(&a.to_be_bytes());
                    out.extend_from_slice(&b.to_be_bytes());
                }
            }
        }
    }
}

/// Finished method body with the limits computed during building
#[derive(Debug, Clone)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
struct FieldInfo {
    access: u16,
    name: u16,
    descriptor: u16,
}

#[derive(Debug)]
struct MethodInfo {
    access: u16,
    name: u16,
    descriptor: u16,
    code: Option<Code>,
}

/// Assembles one class file
#[derive(Debug)]
pub struct ClassWriter {
    pub pool: ConstantPool,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodInfo>,
    code_attribute_name: u16,
}

impl ClassWriter {
    pub fn new(
        access: u16,
        internal_name: &str,
        super_name: &str,
        interfaces: &[String],
    ) -> Result<ClassWriter, JvmError> {
        let mut pool = ConstantPool::default();

        let this_class = pool.class(internal_name)?;
        let super_class = pool.class(super_name)?;
        let interfaces = interfaces
            .iter()
            .map(|name| pool.class(name))
            .collect::<Result<_, _>>()?;
        let code_attribute_name = pool.utf8("Code")?;

        Ok(ClassWriter {
            pool,
            access,
            this_class,
            super_class,
            interfaces,
            fields: Vec::new(),
            methods: Vec::new(),
            code_attribute_name,
        })
    }

    pub fn add_field(&mut self, access: u16, name: &str, descriptor: &str) -> Result<(), JvmError> {
        let name = self.pool.utf8(name)?;
        let descriptor = self.pool.utf8(descriptor)?;
        self.fields.push(FieldInfo {
            access,
            name,
            descriptor,
        });
        Ok(())
    }

    /// `code` is `None` for native and abstract methods
    pub fn add_method(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        code: Option<Code>,
    ) -> Result<(), JvmError> {
        let name = self.pool.utf8(name)?;
        let descriptor = self.pool.utf8(descriptor)?;
        self.methods.push(MethodInfo {
            access,
            name,
            descriptor,
            code,
        });
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();

        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&CLASS_MINOR_VERSION.to_be_bytes());
        out.extend_from_slice(&CLASS_MAJOR_VERSION.to_be_bytes());

        self.pool.write_to(&mut out);

        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());

        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }

        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for field in &self.fields {
            out.extend_from_slice(&field.access.to_be_bytes());
            out.extend_from_slice(&field.name.to_be_bytes());
            out.extend_from_slice(&field.descriptor.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes()); // no attributes
        }

        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            out.extend_from_slice(&method.access.to_be_bytes());
            out.extend_from_slice(&method.name.to_be_bytes());
            out.extend_from_slice(&method.descriptor.to_be_bytes());

            match &method.code {
                None => out.extend_from_slice(&0u16.to_be_bytes()),
                Some(code) => {
                    out.extend_from_slice(&1u16.to_be_bytes());
                    out.extend_from_slice(&self.code_attribute_name.to_be_bytes());
                    out.extend_from_slice(&(12 + code.bytes.len() as u32).to_be_bytes());
                    out.extend_from_slice(&code.max_stack.to_be_bytes());
                    out.extend_from_slice(&code.max_locals.to_be_bytes());
                    out.extend_from_slice(&(code.bytes.len() as u32).to_be_bytes());
                    out.extend_from_slice(&code.bytes);
                    out.extend_from_slice(&0u16.to_be_bytes()); // exception table
                    out.extend_from_slice(&0u16.to_be_bytes()); // code attributes
                }
            }
        }

        out.extend_from_slice(&0u16.to_be_bytes()); // class attributes

        out
    }
}

/// Branch target handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Builds one method body, tracking stack depth, locals, and label fixups
pub struct CodeBuilder<'a> {
    pool: &'a mut ConstantPool,
    code: Vec<u8>,

    stack: i32,
    max_stack: i32,
    max_locals: u16,

    labels: Vec<Option<u32>>,
    /// (opcode position, operand position, target)
    fixups: Vec<(usize, usize, Label)>,
}

impl<'a> CodeBuilder<'a> {
    pub fn new(pool: &'a mut ConstantPool) -> CodeBuilder<'a> {
        CodeBuilder {
            pool,
            code: Vec::new(),
            stack: 0,
            max_stack: 0,
            max_locals: 0,
            labels: Vec::new(),
            fixups: Vec::new(),
        }
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Pin a label to the current code position
    pub fn bind(&mut self, label: Label) {
        self.labels[label.0] = Some(self.code.len() as u32);
    }

    fn adjust(&mut self, delta: i32) -> Result<(), JvmError> {
        self.stack += delta;
        if self.stack < 0 {
            return Err(JvmError::Malformed("operand stack underflow"));
        }
        self.max_stack = self.max_stack.max(self.stack);
        Ok(())
    }

    fn touch_local(&mut self, slot: u16, width: u16) {
        self.max_locals = self.max_locals.max(slot + width);
    }

    /// No-operand instruction with a fixed stack effect
    pub fn visit_insn(&mut self, op: u8) -> Result<(), JvmError> {
        self.code.push(op);
        self.adjust(insn_stack_delta(op))
    }

    /// Local load or store; picks the short, one-byte, or wide encoding
    pub fn visit_var(&mut self, op: u8, slot: u16) -> Result<(), JvmError> {
        let (short_base, width, delta) = match op {
            ILOAD => (ILOAD_0, 1, 1),
            LLOAD => (LLOAD_0, 2, 2),
            FLOAD => (FLOAD_0, 1, 1),
            DLOAD => (DLOAD_0, 2, 2),
            ALOAD => (ALOAD_0, 1, 1),
            ISTORE => (ISTORE_0, 1, -1),
            LSTORE => (LSTORE_0, 2, -2),
            FSTORE => (FSTORE_0, 1, -1),
            DSTORE => (DSTORE_0, 2, -2),
            ASTORE => (ASTORE_0, 1, -1),
            _ => return Err(JvmError::Malformed("not a local variable instruction")),
        };

        if slot <= 3 {
            self.code.push(short_base + slot as u8);
        } else if slot <= 0xff {
            self.code.push(op);
            self.code.push(slot as u8);
        } else {
            self.code.push(WIDE);
            self.code.push(op);
            self.code.extend_from_slice(&slot.to_be_bytes());
        }

        self.touch_local(slot, width);
        self.adjust(delta)
    }

    pub fn visit_jump(&mut self, op: u8, label: Label) -> Result<(), JvmError> {
        let delta = match op {
            GOTO => 0,
            IFEQ | IFNE | IFLT | IFGE | IFGT | IFLE | IFNULL | IFNONNULL => -1,
            IF_ICMPEQ | IF_ICMPNE | IF_ICMPLT | IF_ICMPGE | IF_ICMPGT | IF_ICMPLE | IF_ACMPEQ
            | IF_ACMPNE => -2,
            _ => return Err(JvmError::Malformed("not a branch instruction")),
        };

        let opcode_pos = self.code.len();
        self.code.push(op);
        let operand_pos = self.code.len();
        self.code.extend_from_slice(&0u16.to_be_bytes());
        self.fixups.push((opcode_pos, operand_pos, label));

        self.adjust(delta)
    }

    /// NEW / ANEWARRAY / CHECKCAST / INSTANCEOF
    pub fn visit_type(&mut self, op: u8, internal_name: &str) -> Result<(), JvmError> {
        let index = self.pool.class(internal_name)?;
        self.code.push(op);
        self.code.extend_from_slice(&index.to_be_bytes());

        self.adjust(match op {
            NEW => 1,
            ANEWARRAY | CHECKCAST | INSTANCEOF => 0,
            _ => return Err(JvmError::Malformed("not a type instruction")),
        })
    }

    pub fn visit_newarray(&mut self, element_type: u8) -> Result<(), JvmError> {
        self.code.push(NEWARRAY);
        self.code.push(element_type);
        self.adjust(0)
    }

    pub fn visit_field(
        &mut self,
        op: u8,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<(), JvmError> {
        let index = self.pool.field_ref(owner, name, descriptor)?;
        self.code.push(op);
        self.code.extend_from_slice(&index.to_be_bytes());

        let width = descriptor_width(descriptor) as i32;
        self.adjust(match op {
            GETSTATIC => width,
            PUTSTATIC => -width,
            GETFIELD => width - 1,
            PUTFIELD => -width - 1,
            _ => return Err(JvmError::Malformed("not a field instruction")),
        })
    }

    pub fn visit_method(
        &mut self,
        op: u8,
        owner: &str,
        name: &str,
        descriptor: &str,
        interface: bool,
    ) -> Result<(), JvmError> {
        let index = self.pool.method_ref(owner, name, descriptor, interface)?;
        self.code.push(op);
        self.code.extend_from_slice(&index.to_be_bytes());

        let (args, ret) = descriptor_stack_usage(descriptor)?;
        let mut popped = args;
        if op != INVOKESTATIC {
            popped += 1;
        }

        if op == INVOKEINTERFACE {
            // count byte includes the receiver, then one reserved zero
            self.code.push((args + 1) as u8);
            self.code.push(0);
        }

        self.adjust(ret as i32 - popped as i32)
    }

    /// Integer constant through the smallest encoding
    pub fn const_int(&mut self, value: i32) -> Result<(), JvmError> {
        match value {
            -1..=5 => self.code.push((ICONST_0 as i32 + value) as u8),
            -128..=127 => {
                self.code.push(BIPUSH);
                self.code.push(value as u8);
            }
            -32768..=32767 => {
                self.code.push(SIPUSH);
                self.code.extend_from_slice(&(value as i16).to_be_bytes());
            }
            _ => {
                let index = self.pool.integer(value)?;
                self.emit_ldc(index);
            }
        }

        self.adjust(1)
    }

    pub fn const_long(&mut self, value: i64) -> Result<(), JvmError> {
        match value {
            0 => self.code.push(LCONST_0),
            1 => self.code.push(LCONST_1),
            _ => {
                let index = self.pool.long(value)?;
                self.code.push(LDC2_W);
                self.code.extend_from_slice(&index.to_be_bytes());
            }
        }

        self.adjust(2)
    }

    pub fn const_string(&mut self, value: &str) -> Result<(), JvmError> {
        let index = self.pool.string(value)?;
        self.emit_ldc(index);
        self.adjust(1)
    }

    fn emit_ldc(&mut self, index: u16) {
        if index <= 0xff {
            self.code.push(LDC);
            self.code.push(index as u8);
        } else {
            self.code.push(LDC_W);
            self.code.extend_from_slice(&index.to_be_bytes());
        }
    }

    /// Patch branch fixups and hand back the finished body.
    ///
    /// `min_locals` covers slots the code never touches (unused parameters
    /// and mapped registers).
    pub fn finish(mut self, min_locals: u16) -> Result<Code, JvmError> {
        for (opcode_pos, operand_pos, label) in &self.fixups {
            let target = self.labels[label.0].ok_or(JvmError::Malformed("unbound label"))?;

            let offset = target as i64 - *opcode_pos as i64;
            let offset =
                i16::try_from(offset).map_err(|_| JvmError::BranchOutOfRange)?;
            self.code[*operand_pos..*operand_pos + 2].copy_from_slice(&offset.to_be_bytes());
        }

        Ok(Code {
            max_stack: self.max_stack as u16,
            max_locals: self.max_locals.max(min_locals),
            bytes: self.code,
        })
    }

    /// Position of the next emitted byte; used by tests
    pub fn position(&self) -> usize {
        self.code.len()
    }
}

fn insn_stack_delta(op: u8) -> i32 {
    match op {
        NOP | RETURN | ARRAYLENGTH | CHECKCAST => 0,
        ACONST_NULL | DUP => 1,
        ICONST_M1..=ICONST_5 | FCONST_0 => 1,
        LCONST_0 | LCONST_1 | DCONST_0 => 2,
        IALOAD | FALOAD | AALOAD | BALOAD | CALOAD | SALOAD => -1,
        LALOAD | DALOAD => 0,
        IASTORE | FASTORE | AASTORE | BASTORE | CASTORE | SASTORE => -3,
        LASTORE | DASTORE => -4,
        POP | IRETURN | FRETURN | ARETURN | ATHROW => -1,
        POP2 | LRETURN | DRETURN => -2,
        IADD | ISUB | IMUL | IDIV => -1,
        _ => 0,
    }
}

/// Slot width of a field descriptor
pub fn descriptor_width(descriptor: &str) -> u16 {
    match descriptor.as_bytes().first() {
        Some(b'J') | Some(b'D') => 2,
        Some(b'V') => 0,
        _ => 1,
    }
}

/// (argument slots, return slots) of a method descriptor
fn descriptor_stack_usage(descriptor: &str) -> Result<(u16, u16), JvmError> {
    let inner = descriptor
        .strip_prefix('(')
        .and_then(|d| d.split_once(')'))
        .ok_or(JvmError::Malformed("bad method descriptor"))?;

    let (params, ret) = inner;
    let mut args = 0u16;
    let mut bytes = params.as_bytes();

    while let Some(&b) = bytes.first() {
        match b {
            b'J' | b'D' => {
                args += 2;
                bytes = &bytes[1..];
            }
            b'L' => {
                args += 1;
                let end = bytes
                    .iter()
                    .position(|&c| c == b';')
                    .ok_or(JvmError::Malformed("bad method descriptor"))?;
                bytes = &bytes[end + 1..];
            }
            b'[' => {
                // the array itself is one slot; skip to the element and over it
                args += 1;
                let mut rest = &bytes[1..];
                while rest.first() == Some(&b'[') {
                    rest = &rest[1..];
                }
                match rest.first() {
                    Some(b'L') => {
                        let end = rest
                            .iter()
                            .position(|&c| c == b';')
                            .ok_or(JvmError::Malformed("bad method descriptor"))?;
                        rest = &rest[end + 1..];
                    }
                    Some(_) => rest = &rest[1..],
                    None => return Err(JvmError::Malformed("bad method descriptor")),
                }
                bytes = rest;
            }
            _ => {
                args += 1;
                bytes = &bytes[1..];
            }
        }
    }

    Ok((args, descriptor_width(ret)))
}
