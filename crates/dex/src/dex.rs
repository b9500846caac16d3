use std::borrow::Cow;

use bitflags::bitflags;
use log::warn;
use winnow::binary::{be_u16, be_u32, le_u16, le_u32, u8};
use winnow::combinator::repeat;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;

use crate::errors::DexError;

/// The constant is used to indicate the endianness of the file.
///
/// This constant means - little-endian.
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#endian-constant>
pub const ENDIAN_CONSTANT: u32 = 0x12345678;

/// Byte-swapped [ENDIAN_CONSTANT] for big-endian files.
pub const REVERSE_ENDIAN_CONSTANT: u32 = 0x78563412;

/// The constant is used to indicate that an index value is absent.
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#no-index>
pub const NO_INDEX: u32 = u32::MAX;

#[derive(Debug)]
pub struct Dex {
    /// Raw bytes of the whole file; offsets in the id tables point into it
    data: Vec<u8>,

    pub header: DexHeader,

    /// Offsets of string data items
    pub string_ids: Vec<u32>,

    /// String indices of type descriptors
    pub type_ids: Vec<u32>,

    pub proto_ids: Vec<ProtoItem>,

    pub field_ids: Vec<FieldItem>,

    pub method_ids: Vec<MethodItem>,

    pub class_defs: Vec<ClassItem>,
}

impl Dex {
    /// Parse a dex file
    ///
    /// ```ignore
    /// let dex = Dex::new(data)?;
    /// for class in &dex.class_defs { ... }
    /// ```
    pub fn new(data: Vec<u8>) -> Result<Dex, DexError> {
        let input = &mut &data[..];

        let header = Self::parse_dex_header(input).map_err(|_| DexError::InvalidHeader)?;

        // corruption check only; plenty of real files ship a stale checksum
        if data.len() >= 12 {
            let checksum = simd_adler32::adler32(&&data[12..]);
            if checksum != header.checksum {
                warn!(
                    "dex checksum mismatch: header {:#010x}, computed {:#010x}",
                    header.checksum, checksum
                );
            }
        }

        let string_ids = Self::parse_id_table(&data, header.string_ids_off, header.string_ids_size)
            .map_err(|_| DexError::StringError)?;

        let type_ids = Self::parse_id_table(&data, header.type_ids_off, header.type_ids_size)
            .map_err(|_| DexError::TypeError)?;

        let proto_ids = Self::parse_section(
            &data,
            header.proto_ids_off,
            header.proto_ids_size,
            ProtoItem::parse,
        )
        .map_err(|_| DexError::ProtoError)?;

        let field_ids = Self::parse_section(
            &data,
            header.field_ids_off,
            header.field_ids_size,
            FieldItem::parse,
        )
        .map_err(|_| DexError::FieldError)?;

        let method_ids = Self::parse_section(
            &data,
            header.method_ids_off,
            header.method_ids_size,
            MethodItem::parse,
        )
        .map_err(|_| DexError::MethodError)?;

        let class_defs = Self::parse_section(
            &data,
            header.class_defs_off,
            header.class_defs_size,
            ClassItem::parse,
        )
        .map_err(|_| DexError::ClassError)?;

        Ok(Dex {
            data,
            header,
            string_ids,
            type_ids,
            proto_ids,
            field_ids,
            method_ids,
            class_defs,
        })
    }

    fn parse_dex_header(input: &mut &[u8]) -> ModalResult<DexHeader> {
        let (_, _, version, _) = (
            be_u32.verify(|magic| *magic == 0x6465780A),
            u8.verify(|v| *v == 0x30),
            be_u16.try_map(DexVersion::try_from),
            u8.verify(|v| *v == 0x00),
        )
            .parse_next(input)?;

        let (
            checksum,
            _signature,
            file_size,
            header_size,
            endian_tag,
            _link_size,
            _link_off,
            map_off,
            string_ids_size,
            string_ids_off,
            type_ids_size,
            type_ids_off,
            proto_ids_size,
            proto_ids_off,
            field_ids_size,
            field_ids_off,
            method_ids_size,
            method_ids_off,
            class_defs_size,
            class_defs_off,
            _data_size,
            _data_off,
        ) = (
            le_u32,         // checksum
            take(20usize),  // sha-1 signature
            le_u32,         // file_size
            le_u32,         // header_size
            le_u32.verify(|&tag| tag == ENDIAN_CONSTANT || tag == REVERSE_ENDIAN_CONSTANT),
            le_u32,                                         // link_size
            le_u32,                                         // link_off
            le_u32,                                         // map_off
            le_u32,                                         // string_ids_size
            le_u32,                                         // string_ids_off
            le_u32.verify(|&size| size <= u16::MAX.into()), // type_ids_size
            le_u32,                                         // type_ids_off
            le_u32.verify(|&size| size <= u16::MAX.into()), // proto_ids_size
            le_u32,                                         // proto_ids_off
            le_u32,                                         // field_ids_size
            le_u32,                                         // field_ids_off
            le_u32,                                         // method_ids_size
            le_u32,                                         // method_ids_off
            le_u32,                                         // class_defs_size
            le_u32,                                         // class_defs_off
            le_u32,                                         // data_size
            le_u32,                                         // data_off
        )
            .parse_next(input)?;

        Ok(DexHeader {
            version,
            checksum,
            file_size,
            header_size,
            endian_tag,
            map_off,
            string_ids_size,
            string_ids_off,
            type_ids_size,
            type_ids_off,
            proto_ids_size,
            proto_ids_off,
            field_ids_size,
            field_ids_off,
            method_ids_size,
            method_ids_off,
            class_defs_size,
            class_defs_off,
        })
    }

    fn parse_id_table(data: &[u8], off: u32, size: u32) -> ModalResult<Vec<u32>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let mut input = data
            .get(off as usize..)
            .ok_or_else(|| ErrMode::Cut(ContextError::new()))?;
        repeat(size as usize, le_u32).parse_next(&mut input)
    }

    fn parse_section<T>(
        data: &[u8],
        off: u32,
        size: u32,
        parser: fn(&mut &[u8]) -> ModalResult<T>,
    ) -> ModalResult<Vec<T>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let mut input = data
            .get(off as usize..)
            .ok_or_else(|| ErrMode::Cut(ContextError::new()))?;
        repeat(size as usize, parser).parse_next(&mut input)
    }

    /// String by index, MUTF-8 decoded
    pub fn get_string(&self, idx: usize) -> Option<Cow<'_, str>> {
        let offset = *self.string_ids.get(idx)? as usize;
        let mut data = self.data.get(offset..)?;

        let _utf16_size = Self::uleb128(&mut data).ok()?;
        let end = data.iter().position(|&b| b == 0)?;

        Some(simd_cesu8::mutf8::decode_lossy(&data[..end]))
    }

    #[inline]
    pub(crate) fn uleb128(input: &mut &[u8]) -> ModalResult<u64> {
        let mut val = 0u64;
        let mut shift = 0u32;

        let mut byte: u8;

        loop {
            byte = u8.parse_next(input)?;
            let b = (byte & 0x7f) as u64;
            val |= b
                .checked_shl(shift)
                .ok_or(ErrMode::Cut(ContextError::new()))?;

            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }

        Ok(val)
    }

    /// Type descriptor by type index
    #[inline]
    pub fn get_type(&self, idx: usize) -> Option<Cow<'_, str>> {
        let idx = *self.type_ids.get(idx)?;
        self.get_string(idx as usize)
    }

    /// Interfaces of a class, as type descriptors
    pub fn interfaces(&self, class: &ClassItem) -> Vec<String> {
        self.type_list(class.interfaces_off)
            .iter()
            .filter_map(|&idx| self.get_type(idx as usize))
            .map(Cow::into_owned)
            .collect()
    }

    /// `type_list` structure: u32 count then count u16 type indices
    pub(crate) fn type_list(&self, off: u32) -> Vec<u16> {
        if off == 0 {
            return Vec::new();
        }

        let Some(mut input) = self.data.get(off as usize..) else {
            return Vec::new();
        };

        let parsed: ModalResult<Vec<u16>> = (|| {
            let size = le_u32.parse_next(&mut input)?;
            repeat(size as usize, le_u16).parse_next(&mut input)
        })();

        parsed.unwrap_or_default()
    }

    /// Decoded `class_data_item`, `None` when the class declares no members
    pub fn class_data(&self, class: &ClassItem) -> Result<Option<ClassData>, DexError> {
        if class.class_data_off == 0 {
            return Ok(None);
        }

        let mut input = self
            .data
            .get(class.class_data_off as usize..)
            .ok_or(DexError::ClassDataError)?;

        ClassData::parse(&mut input)
            .map(Some)
            .map_err(|_| DexError::ClassDataError)
    }

    /// Decoded `code_item` at the given offset
    pub fn code_item(&self, off: u32) -> Result<CodeItem, DexError> {
        let mut input = self.data.get(off as usize..).ok_or(DexError::CodeError)?;

        CodeItem::parse(&mut input).map_err(|_| DexError::CodeError)
    }

    /// Full `(owner, name, descriptor)` view of a field reference
    pub fn field_ref(&self, idx: u32) -> Option<FieldRef> {
        let field = self.field_ids.get(idx as usize)?;

        Some(FieldRef {
            owner: field.get_class(self)?.into_owned(),
            name: field.get_name(self)?.into_owned(),
            descriptor: field.get_type(self)?.into_owned(),
        })
    }

    /// Full `(owner, name, descriptor)` view of a method reference
    pub fn method_ref(&self, idx: u32) -> Option<MethodRef> {
        let method = self.method_ids.get(idx as usize)?;
        let proto = self.proto_ids.get(method.proto_idx as usize)?;

        Some(MethodRef {
            owner: method.get_class(self)?.into_owned(),
            name: method.get_name(self)?.into_owned(),
            parameters: self.proto_parameters(proto),
            return_type: proto.return_type(self)?.into_owned(),
        })
    }

    /// Parameter type descriptors of a prototype, in order
    pub fn proto_parameters(&self, proto: &ProtoItem) -> Vec<String> {
        self.type_list(proto.parameters_off)
            .iter()
            .filter_map(|&idx| self.get_type(idx as usize))
            .map(Cow::into_owned)
            .collect()
    }
}

/// Known dex versions
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#dex-file-magic>
#[derive(Default, Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum DexVersion {
    #[default]
    DEX35,
    DEX36,
    DEX37,
    DEX38,
    DEX39,
    DEX40,
    DEX41,
}

impl TryFrom<u16> for DexVersion {
    type Error = DexError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x3335 => Ok(DexVersion::DEX35),
            0x3336 => Ok(DexVersion::DEX36),
            0x3337 => Ok(DexVersion::DEX37),
            0x3338 => Ok(DexVersion::DEX38),
            0x3339 => Ok(DexVersion::DEX39),
            0x3430 => Ok(DexVersion::DEX40),
            0x3431 => Ok(DexVersion::DEX41),
            _ => Err(DexError::UnknownVersion(value)),
        }
    }
}

/// Header fields this reader consumes
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#header-item>
#[derive(Default, Debug, Clone)]
pub struct DexHeader {
    pub version: DexVersion,

    /// Adler32 of everything past the first 12 bytes
    pub checksum: u32,

    pub file_size: u32,
    pub header_size: u32,
    pub endian_tag: u32,
    pub map_off: u32,

    pub string_ids_size: u32,
    pub string_ids_off: u32,
    pub type_ids_size: u32,
    pub type_ids_off: u32,
    pub proto_ids_size: u32,
    pub proto_ids_off: u32,
    pub field_ids_size: u32,
    pub field_ids_off: u32,
    pub method_ids_size: u32,
    pub method_ids_off: u32,
    pub class_defs_size: u32,
    pub class_defs_off: u32,
}

/// Abstraction over `proto_id_item`
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#proto-id-item>
#[derive(Debug)]
pub struct ProtoItem {
    /// Index of the short-form descriptor string
    pub shorty_idx: u32,

    /// Type index of the return type
    pub return_type_idx: u32,

    /// Offset to the parameter type list, 0 when there are no parameters
    pub parameters_off: u32,
}

impl ProtoItem {
    #[inline]
    fn parse(input: &mut &[u8]) -> ModalResult<ProtoItem> {
        (le_u32, le_u32, le_u32)
            .map(|(shorty_idx, return_type_idx, parameters_off)| ProtoItem {
                shorty_idx,
                return_type_idx,
                parameters_off,
            })
            .parse_next(input)
    }

    /// Return type descriptor of this prototype
    pub fn return_type<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_type(self.return_type_idx as usize)
    }
}

/// Abstraction over `field_id_item`
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#field-id-item>
#[derive(Debug)]
pub struct FieldItem {
    /// Type index of the declaring class
    pub class_idx: u16,

    /// Type index of the field type
    pub type_idx: u16,

    /// String index of the field name
    pub name_idx: u32,
}

impl FieldItem {
    #[inline]
    fn parse(input: &mut &[u8]) -> ModalResult<FieldItem> {
        (le_u16, le_u16, le_u32)
            .map(|(class_idx, type_idx, name_idx)| FieldItem {
                class_idx,
                type_idx,
                name_idx,
            })
            .parse_next(input)
    }

    #[inline]
    pub fn get_class<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_type(self.class_idx as usize)
    }

    #[inline]
    pub fn get_type<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_type(self.type_idx as usize)
    }

    #[inline]
    pub fn get_name<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_string(self.name_idx as usize)
    }
}

/// Abstraction over `method_id_item`
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#method-id-item>
#[derive(Debug)]
pub struct MethodItem {
    /// Type index of the declaring class
    pub class_idx: u16,

    /// Index into the proto table
    pub proto_idx: u16,

    /// String index of the method name
    pub name_idx: u32,
}

impl MethodItem {
    #[inline]
    fn parse(input: &mut &[u8]) -> ModalResult<MethodItem> {
        (le_u16, le_u16, le_u32)
            .map(|(class_idx, proto_idx, name_idx)| MethodItem {
                class_idx,
                proto_idx,
                name_idx,
            })
            .parse_next(input)
    }

    #[inline]
    pub fn get_class<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_type(self.class_idx as usize)
    }

    #[inline]
    pub fn get_name<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_string(self.name_idx as usize)
    }
}

/// Resolved field reference for code generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// Declaring class, as a type descriptor (`Lcom/x/Foo;`)
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

/// Resolved method reference for code generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    /// Declaring class, as a type descriptor
    pub owner: String,
    pub name: String,

    /// Parameter type descriptors in order
    pub parameters: Vec<String>,

    /// Return type descriptor
    pub return_type: String,
}

/// Abstraction over `class_def_item`
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#class-def-item>
#[derive(Debug)]
pub struct ClassItem {
    /// Type index of this class
    pub class_idx: u32,

    pub access_flags: AccessFlags,

    /// Type index of the superclass, [NO_INDEX] for root classes
    pub superclass_idx: u32,

    /// Offset to the interface type list, 0 when there are none
    pub interfaces_off: u32,

    /// String index of the source file name, [NO_INDEX] when unknown
    pub source_file_idx: u32,

    pub annotations_off: u32,

    /// Offset to the class data, 0 when the class declares no members
    pub class_data_off: u32,

    pub static_values_off: u32,
}

impl ClassItem {
    #[inline]
    fn parse(input: &mut &[u8]) -> ModalResult<ClassItem> {
        (
            le_u32,
            le_u32.map(AccessFlags::from_bits_truncate),
            le_u32,
            le_u32,
            le_u32,
            le_u32,
            le_u32,
            le_u32,
        )
            .map(
                |(
                    class_idx,
                    access_flags,
                    superclass_idx,
                    interfaces_off,
                    source_file_idx,
                    annotations_off,
                    class_data_off,
                    static_values_off,
                )| ClassItem {
                    class_idx,
                    access_flags,
                    superclass_idx,
                    interfaces_off,
                    source_file_idx,
                    annotations_off,
                    class_data_off,
                    static_values_off,
                },
            )
            .parse_next(input)
    }

    #[inline]
    pub fn get_name<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        dex.get_type(self.class_idx as usize)
    }

    #[inline]
    pub fn get_superclass<'a>(&self, dex: &'a Dex) -> Option<Cow<'a, str>> {
        if self.superclass_idx == NO_INDEX {
            return None;
        }

        dex.get_type(self.superclass_idx as usize)
    }
}

/// Decoded `class_data_item`
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#class-data-item>
#[derive(Debug, Default)]
pub struct ClassData {
    pub static_fields: Vec<EncodedField>,
    pub instance_fields: Vec<EncodedField>,
    pub direct_methods: Vec<EncodedMethod>,
    pub virtual_methods: Vec<EncodedMethod>,
}

impl ClassData {
    fn parse(input: &mut &[u8]) -> ModalResult<ClassData> {
        let static_fields_size = Dex::uleb128(input)?;
        let instance_fields_size = Dex::uleb128(input)?;
        let direct_methods_size = Dex::uleb128(input)?;
        let virtual_methods_size = Dex::uleb128(input)?;

        Ok(ClassData {
            static_fields: Self::parse_fields(input, static_fields_size)?,
            instance_fields: Self::parse_fields(input, instance_fields_size)?,
            direct_methods: Self::parse_methods(input, direct_methods_size)?,
            virtual_methods: Self::parse_methods(input, virtual_methods_size)?,
        })
    }

    /// Field indices are delta-encoded against the previous entry
    fn parse_fields(input: &mut &[u8], count: u64) -> ModalResult<Vec<EncodedField>> {
        let mut fields = Vec::with_capacity(count as usize);
        let mut field_idx = 0u32;

        for _ in 0..count {
            field_idx = field_idx.wrapping_add(Dex::uleb128(input)? as u32);
            let access_flags = AccessFlags::from_bits_truncate(Dex::uleb128(input)? as u32);

            fields.push(EncodedField {
                field_idx,
                access_flags,
            });
        }

        Ok(fields)
    }

    fn parse_methods(input: &mut &[u8], count: u64) -> ModalResult<Vec<EncodedMethod>> {
        let mut methods = Vec::with_capacity(count as usize);
        let mut method_idx = 0u32;

        for _ in 0..count {
            method_idx = method_idx.wrapping_add(Dex::uleb128(input)? as u32);
            let access_flags = AccessFlags::from_bits_truncate(Dex::uleb128(input)? as u32);
            let code_off = Dex::uleb128(input)? as u32;

            methods.push(EncodedMethod {
                method_idx,
                access_flags,
                code_off,
            });
        }

        Ok(methods)
    }
}

#[derive(Debug)]
pub struct EncodedField {
    /// Index into the field id table
    pub field_idx: u32,

    pub access_flags: AccessFlags,
}

#[derive(Debug)]
pub struct EncodedMethod {
    /// Index into the method id table
    pub method_idx: u32,

    pub access_flags: AccessFlags,

    /// Offset to the code item, 0 for native and abstract methods
    pub code_off: u32,
}

/// Decoded `code_item` header plus the raw instruction stream
///
/// See: <https://source.android.com/docs/core/runtime/dex-format#code-item>
#[derive(Debug)]
pub struct CodeItem {
    /// Total number of registers used by this code
    pub registers_size: u16,

    /// Number of registers holding incoming arguments (the last ones)
    pub ins_size: u16,

    /// Outgoing argument space; unused by the translation
    pub outs_size: u16,

    /// Instruction stream in 16-bit code units
    pub insns: Vec<u16>,
}

impl CodeItem {
    fn parse(input: &mut &[u8]) -> ModalResult<CodeItem> {
        let (registers_size, ins_size, outs_size, _tries_size, _debug_info_off, insns_size) =
            (le_u16, le_u16, le_u16, le_u16, le_u32, le_u32).parse_next(input)?;

        let insns = repeat(insns_size as usize, le_u16).parse_next(input)?;

        Ok(CodeItem {
            registers_size,
            ins_size,
            outs_size,
            insns,
        })
    }
}

bitflags! {
    /// Access flags for classes, fields, and methods.
    ///
    /// The bits up to 0x0800 coincide with the JVM class-file definitions;
    /// everything above is Dalvik-only.
    ///
    /// See: <https://source.android.com/docs/core/runtime/dex-format#access-flags>
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const BRIDGE = 0x0040;
        const TRANSIENT = 0x0080;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;

        /// Marks a constructor or static initializer (Dalvik-only)
        const CONSTRUCTOR = 0x10000;

        /// Declared synchronized (Dalvik-only)
        const DECLARED_SYNCHRONIZED = 0x20000;
    }
}

impl AccessFlags {
    #[inline]
    pub fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    #[inline]
    pub fn is_native(self) -> bool {
        self.contains(Self::NATIVE)
    }

    #[inline]
    pub fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }

    #[inline]
    pub fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }

    #[inline]
    pub fn is_constructor(self) -> bool {
        self.contains(Self::CONSTRUCTOR)
    }
}
