//! Per-class emission: access-flag mapping, descriptor conversion, the
//! supported-set pre-scan, and stub bodies for everything else.

use apkvm_dex::{ClassItem, Dex, EncodedMethod, MethodRef, insns};
use log::{debug, warn};

use crate::classfile::{ClassWriter, Code, CodeBuilder, ConstantPool};
use crate::errors::JvmError;
use crate::opcodes::*;
use crate::translate::{
    Category, MethodSignature, internal_name, is_supported, method_descriptor, translate,
};

/// One translated class, addressed by its internal name
#[derive(Debug)]
pub struct EmittedClass {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Classes that emitted plus per-class failures; a failed class never aborts
/// the rest of the file
#[derive(Debug, Default)]
pub struct Conversion {
    pub classes: Vec<EmittedClass>,
    pub errors: Vec<String>,
}

/// Convert every class definition in the file
pub fn convert(dex: &Dex) -> Conversion {
    let mut conversion = Conversion::default();

    for class in &dex.class_defs {
        match emit_class(dex, class) {
            Ok(emitted) => conversion.classes.push(emitted),
            Err(error) => {
                let name = class
                    .get_name(dex)
                    .map(|n| n.into_owned())
                    .unwrap_or_else(|| "<unnamed>".to_owned());
                warn!("skipping class {}: {}", name, error);
                conversion.errors.push(format!("{}: {}", name, error));
            }
        }
    }

    conversion
}

pub fn emit_class(dex: &Dex, class: &ClassItem) -> Result<EmittedClass, JvmError> {
    let descriptor = class.get_name(dex).ok_or(JvmError::UnnamedClass)?;
    let name = internal_name(&descriptor);

    let super_name = class
        .get_superclass(dex)
        .map(|d| internal_name(&d))
        .unwrap_or_else(|| "java/lang/Object".to_owned());

    let interfaces: Vec<String> = dex
        .interfaces(class)
        .iter()
        .map(|d| internal_name(d))
        .collect();

    // the low flag bits coincide between the two formats
    let mut class_access = (class.access_flags.bits() & 0xffff) as u16;
    if class_access & access::ACC_INTERFACE == 0 {
        class_access |= access::ACC_SUPER;
    }

    let mut writer = ClassWriter::new(class_access, &name, &super_name, &interfaces)?;

    if let Some(data) = dex.class_data(class)? {
        for field in data.static_fields.iter().chain(&data.instance_fields) {
            let field_ref = dex
                .field_ref(field.field_idx)
                .ok_or(JvmError::BadReference(field.field_idx))?;
            writer.add_field(
                (field.access_flags.bits() & 0xffff) as u16,
                &field_ref.name,
                &field_ref.descriptor,
            )?;
        }

        for method in data.direct_methods.iter().chain(&data.virtual_methods) {
            emit_method(dex, &mut writer, method)?;
        }
    }

    Ok(EmittedClass {
        name,
        bytes: writer.to_bytes(),
    })
}

fn emit_method(
    dex: &Dex,
    writer: &mut ClassWriter,
    method: &EncodedMethod,
) -> Result<(), JvmError> {
    let reference = dex
        .method_ref(method.method_idx)
        .ok_or(JvmError::BadReference(method.method_idx))?;
    let descriptor = method_descriptor(&reference.parameters, &reference.return_type);
    let access = (method.access_flags.bits() & 0xffff) as u16;

    let signature = MethodSignature {
        is_static: method.access_flags.is_static(),
        parameters: &reference.parameters,
        return_type: &reference.return_type,
    };

    let code = if method.access_flags.is_native() || method.access_flags.is_abstract() {
        None
    } else {
        Some(build_body(dex, &mut writer.pool, &signature, method, &reference)?)
    };

    writer.add_method(access, &reference.name, &descriptor, code)
}

/// Translate the body, or fall back to a stub on any failure. Stubbing is
/// per method; the surrounding class always emits.
fn build_body(
    dex: &Dex,
    pool: &mut ConstantPool,
    signature: &MethodSignature<'_>,
    method: &EncodedMethod,
    reference: &MethodRef,
) -> Result<Code, JvmError> {
    match try_translate(dex, pool, signature, method) {
        Ok(code) => Ok(code),
        Err(error) => {
            debug!(
                "stub for {}.{}: {}",
                reference.owner, reference.name, error
            );
            stub_body(pool, signature)
        }
    }
}

fn try_translate(
    dex: &Dex,
    pool: &mut ConstantPool,
    signature: &MethodSignature<'_>,
    method: &EncodedMethod,
) -> Result<Code, JvmError> {
    if method.code_off == 0 {
        return Err(JvmError::Malformed("concrete method without code"));
    }

    let code_item = dex.code_item(method.code_off)?;
    let instructions = insns::decode(&code_item.insns)?;

    // any opcode outside the set stubs the whole method; a partial body
    // would leave the stack shape inconsistent with the return type
    for instruction in &instructions {
        if !is_supported(instruction) {
            return Err(JvmError::UnsupportedOpcode(instruction.opcode));
        }
    }

    translate(dex, signature, &code_item, &instructions, pool)
}

/// Minimal verifier-passing body: push a category-matching zero value and
/// return it
pub(crate) fn stub_body(
    pool: &mut ConstantPool,
    signature: &MethodSignature<'_>,
) -> Result<Code, JvmError> {
    let mut builder = CodeBuilder::new(pool);

    if signature.return_type == "V" {
        builder.visit_insn(RETURN)?;
    } else {
        match Category::of_descriptor(signature.return_type) {
            Category::Int => {
                builder.visit_insn(ICONST_0)?;
                builder.visit_insn(IRETURN)?;
            }
            Category::Long => {
                builder.visit_insn(LCONST_0)?;
                builder.visit_insn(LRETURN)?;
            }
            Category::Float => {
                builder.visit_insn(FCONST_0)?;
                builder.visit_insn(FRETURN)?;
            }
            Category::Double => {
                builder.visit_insn(DCONST_0)?;
                builder.visit_insn(DRETURN)?;
            }
            Category::Reference => {
                builder.visit_insn(ACONST_NULL)?;
                builder.visit_insn(ARETURN)?;
            }
        }
    }

    let mut param_slots: u16 = if signature.is_static { 0 } else { 1 };
    for descriptor in signature.parameters {
        param_slots += crate::classfile::descriptor_width(descriptor);
    }

    builder.finish(param_slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdex::TestDex;

    fn signature<'a>(is_static: bool, parameters: &'a [String], ret: &'a str) -> MethodSignature<'a> {
        MethodSignature {
            is_static,
            parameters,
            return_type: ret,
        }
    }

    #[test]
    fn stub_bodies_per_category() {
        let cases: &[(&str, Vec<u8>)] = &[
            ("V", vec![RETURN]),
            ("I", vec![ICONST_0, IRETURN]),
            ("Z", vec![ICONST_0, IRETURN]),
            ("J", vec![LCONST_0, LRETURN]),
            ("F", vec![FCONST_0, FRETURN]),
            ("D", vec![DCONST_0, DRETURN]),
            ("Ljava/lang/String;", vec![ACONST_NULL, ARETURN]),
            ("[I", vec![ACONST_NULL, ARETURN]),
        ];

        for (descriptor, expected) in cases {
            let mut pool = ConstantPool::default();
            let code = stub_body(&mut pool, &signature(true, &[], descriptor)).unwrap();
            assert_eq!(&code.bytes, expected, "return {}", descriptor);
        }
    }

    #[test]
    fn stub_locals_cover_parameters() {
        let mut pool = ConstantPool::default();
        let parameters = vec!["J".to_owned(), "I".to_owned()];
        let code = stub_body(&mut pool, &signature(false, &parameters, "V")).unwrap();
        // receiver + long + int
        assert_eq!(code.max_locals, 4);
    }

    #[test]
    fn emits_simple_class() {
        let mut dex = TestDex::new();
        let class = dex.class("Lcom/example/Main;", 0x0001, "Ljava/lang/Object;");
        // static void run(): return-void
        dex.method(class, "run", "V", &[], 0x0009, Some((1, 0, vec![0x000e])));
        let dex = dex.build();

        let conversion = convert(&dex);
        assert!(conversion.errors.is_empty());
        assert_eq!(conversion.classes.len(), 1);

        let emitted = &conversion.classes[0];
        assert_eq!(emitted.name, "com/example/Main");
        assert_eq!(&emitted.bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    }

    #[test]
    fn descriptor_is_rebuilt_from_source_parts() {
        let mut dex = TestDex::new();
        let class = dex.class("Lcom/example/Main;", 0x0001, "Ljava/lang/Object;");
        dex.method(
            class,
            "compute",
            "Ljava/lang/String;",
            &["I", "J"],
            0x0009,
            // unsupported body: packed-switch; the descriptor must survive
            Some((1, 0, vec![0x012b, 0x0002, 0x0000])),
        );
        let dex = dex.build();

        let conversion = convert(&dex);
        assert!(conversion.errors.is_empty());

        let bytes = &conversion.classes[0].bytes;
        let descriptor = b"(IJ)Ljava/lang/String;";
        assert!(
            bytes.windows(descriptor.len()).any(|w| w == descriptor),
            "emitted class must carry the rebuilt descriptor"
        );
    }

    #[test]
    fn unsupported_method_is_stubbed_not_failed() {
        let mut dex = TestDex::new();
        let class = dex.class("Lcom/example/Main;", 0x0001, "Ljava/lang/Object;");
        // packed-switch is outside the translated set
        dex.method(
            class,
            "choose",
            "I",
            &[],
            0x0009,
            Some((1, 0, vec![0x012b, 0x0001, 0x0000])),
        );
        let dex = dex.build();

        let conversion = convert(&dex);
        assert!(conversion.errors.is_empty());
        assert_eq!(conversion.classes.len(), 1);

        // the stub body is ICONST_0 / IRETURN inside the Code attribute
        let bytes = &conversion.classes[0].bytes;
        assert!(bytes.windows(2).any(|w| w == [ICONST_0, IRETURN]));
    }

    #[test]
    fn native_and_abstract_methods_have_no_code() {
        let mut dex = TestDex::new();
        let class = dex.class("Lcom/example/Main;", 0x0001, "Ljava/lang/Object;");
        dex.method(class, "nativeOp", "V", &[], 0x0109, None); // native
        dex.method(class, "abstractOp", "V", &[], 0x0401, None); // abstract
        let dex = dex.build();

        let conversion = convert(&dex);
        assert!(conversion.errors.is_empty());

        // no Code attribute payload at all: the "Code" utf8 exists but both
        // methods declare zero attributes
        let bytes = &conversion.classes[0].bytes;
        assert!(!bytes.windows(2).any(|w| w == [ICONST_0, IRETURN]));
    }

    #[test]
    fn broken_class_is_reported_and_skipped() {
        let mut dex = TestDex::new();
        let good = dex.class("Lcom/example/Good;", 0x0001, "Ljava/lang/Object;");
        dex.method(good, "run", "V", &[], 0x0009, Some((1, 0, vec![0x000e])));
        dex.broken_class(0xffff);
        let dex = dex.build();

        let conversion = convert(&dex);
        assert_eq!(conversion.classes.len(), 1);
        assert_eq!(conversion.errors.len(), 1);
    }
}
