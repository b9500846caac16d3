//! Assembles minimal but structurally valid dex files for tests.

use apkvm_dex::Dex;

#[derive(Default)]
struct TestMethod {
    method_idx: u32,
    access: u32,
    code: Option<(u16, u16, Vec<u16>)>,
}

#[derive(Default)]
struct TestClass {
    class_idx: u32,
    access: u32,
    superclass_idx: u32,
    fields: Vec<(u32, u32)>,
    methods: Vec<TestMethod>,
}

#[derive(Default)]
pub struct TestDex {
    strings: Vec<String>,
    type_ids: Vec<u32>,
    protos: Vec<(u32, u32, Vec<u16>)>,
    field_ids: Vec<(u16, u16, u32)>,
    method_ids: Vec<(u16, u16, u32)>,
    classes: Vec<TestClass>,
}

impl TestDex {
    pub fn new() -> TestDex {
        TestDex::default()
    }

    pub fn string(&mut self, value: &str) -> u32 {
        if let Some(index) = self.strings.iter().position(|s| s == value) {
            return index as u32;
        }
        self.strings.push(value.to_owned());
        (self.strings.len() - 1) as u32
    }

    pub fn type_idx(&mut self, descriptor: &str) -> u16 {
        let string = self.string(descriptor);
        if let Some(index) = self.type_ids.iter().position(|&s| s == string) {
            return index as u16;
        }
        self.type_ids.push(string);
        (self.type_ids.len() - 1) as u16
    }

    fn proto(&mut self, return_type: &str, params: &[&str]) -> u16 {
        let shorty = self.string("X"); // unread by the consumer
        let return_idx = self.type_idx(return_type) as u32;
        let param_idxs: Vec<u16> = params.iter().map(|p| self.type_idx(p)).collect();

        self.protos.push((shorty, return_idx, param_idxs));
        (self.protos.len() - 1) as u16
    }

    /// Declare a class; returns a handle for member registration
    pub fn class(&mut self, descriptor: &str, access: u32, super_descriptor: &str) -> usize {
        let class_idx = self.type_idx(descriptor) as u32;
        let superclass_idx = self.type_idx(super_descriptor) as u32;

        self.classes.push(TestClass {
            class_idx,
            access,
            superclass_idx,
            ..TestClass::default()
        });
        self.classes.len() - 1
    }

    /// A class definition whose type index resolves to nothing
    pub fn broken_class(&mut self, bad_type_idx: u32) {
        self.classes.push(TestClass {
            class_idx: bad_type_idx,
            access: 0x0001,
            superclass_idx: bad_type_idx,
            ..TestClass::default()
        });
    }

    pub fn field(&mut self, class: usize, name: &str, descriptor: &str, access: u32) -> u32 {
        let class_type = self.classes[class].class_idx as u16;
        let type_idx = self.type_idx(descriptor);
        let name_idx = self.string(name);

        self.field_ids.push((class_type, type_idx, name_idx));
        let field_idx = (self.field_ids.len() - 1) as u32;
        self.classes[class].fields.push((field_idx, access));
        field_idx
    }

    /// Register a method; `code` is `(registers, ins, code units)`
    pub fn method(
        &mut self,
        class: usize,
        name: &str,
        return_type: &str,
        params: &[&str],
        access: u32,
        code: Option<(u16, u16, Vec<u16>)>,
    ) -> u32 {
        let class_type = self.classes[class].class_idx as u16;
        let proto = self.proto(return_type, params);
        let name_idx = self.string(name);

        self.method_ids.push((class_type, proto, name_idx));
        let method_idx = (self.method_ids.len() - 1) as u32;

        self.classes[class].methods.push(TestMethod {
            method_idx,
            access,
            code,
        });
        method_idx
    }

    /// Reference a method of another class without defining it
    pub fn extern_method(
        &mut self,
        owner: &str,
        name: &str,
        return_type: &str,
        params: &[&str],
    ) -> u32 {
        let class_type = self.type_idx(owner);
        let proto = self.proto(return_type, params);
        let name_idx = self.string(name);

        self.method_ids.push((class_type, proto, name_idx));
        (self.method_ids.len() - 1) as u32
    }

    pub fn extern_field(&mut self, owner: &str, name: &str, descriptor: &str) -> u32 {
        let class_type = self.type_idx(owner);
        let type_idx = self.type_idx(descriptor);
        let name_idx = self.string(name);

        self.field_ids.push((class_type, type_idx, name_idx));
        (self.field_ids.len() - 1) as u32
    }

    pub fn build(self) -> Dex {
        let header_size = 0x70usize;
        let string_ids_off = header_size;
        let type_ids_off = string_ids_off + 4 * self.strings.len();
        let proto_ids_off = type_ids_off + 4 * self.type_ids.len();
        let field_ids_off = proto_ids_off + 12 * self.protos.len();
        let method_ids_off = field_ids_off + 8 * self.field_ids.len();
        let class_defs_off = method_ids_off + 8 * self.method_ids.len();
        let data_off = class_defs_off + 32 * self.classes.len();

        let mut data = Vec::new();
        let abs = |data: &Vec<u8>| (data_off + data.len()) as u32;
        let align4 = |data: &mut Vec<u8>| {
            while (data_off + data.len()) % 4 != 0 {
                data.push(0);
            }
        };

        // parameter type lists
        let mut param_list_offs = Vec::new();
        for (_, _, params) in &self.protos {
            if params.is_empty() {
                param_list_offs.push(0u32);
                continue;
            }
            align4(&mut data);
            param_list_offs.push(abs(&data));
            data.extend_from_slice(&(params.len() as u32).to_le_bytes());
            for &p in params {
                data.extend_from_slice(&p.to_le_bytes());
            }
        }

        // string data: uleb char count, modified-utf8 bytes, NUL
        let mut string_offs = Vec::new();
        for s in &self.strings {
            string_offs.push(abs(&data));
            data.push(s.chars().count() as u8);
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        }

        // code items
        let mut code_offs: Vec<Vec<u32>> = Vec::new();
        for class in &self.classes {
            let mut offs = Vec::new();
            for method in &class.methods {
                match &method.code {
                    None => offs.push(0),
                    Some((registers, ins, insns)) => {
                        align4(&mut data);
                        offs.push(abs(&data));
                        data.extend_from_slice(&registers.to_le_bytes());
                        data.extend_from_slice(&ins.to_le_bytes());
                        data.extend_from_slice(&0u16.to_le_bytes()); // outs
                        data.extend_from_slice(&0u16.to_le_bytes()); // tries
                        data.extend_from_slice(&0u32.to_le_bytes()); // debug info
                        data.extend_from_slice(&(insns.len() as u32).to_le_bytes());
                        for &unit in insns {
                            data.extend_from_slice(&unit.to_le_bytes());
                        }
                    }
                }
            }
            code_offs.push(offs);
        }

        // class data items
        let mut class_data_offs = Vec::new();
        for (class, offs) in self.classes.iter().zip(&code_offs) {
            if class.fields.is_empty() && class.methods.is_empty() {
                class_data_offs.push(0u32);
                continue;
            }

            class_data_offs.push(abs(&data));
            uleb(&mut data, class.fields.len() as u64); // static fields
            uleb(&mut data, 0); // instance fields
            uleb(&mut data, class.methods.len() as u64); // direct methods
            uleb(&mut data, 0); // virtual methods

            let mut previous = 0u32;
            for &(field_idx, access) in &class.fields {
                uleb(&mut data, (field_idx - previous) as u64);
                uleb(&mut data, access as u64);
                previous = field_idx;
            }

            let mut previous = 0u32;
            for (method, &code_off) in class.methods.iter().zip(offs) {
                uleb(&mut data, (method.method_idx - previous) as u64);
                uleb(&mut data, method.access as u64);
                uleb(&mut data, code_off as u64);
                previous = method.method_idx;
            }
        }

        // assemble
        let file_size = (data_off + data.len()) as u32;
        let mut out = Vec::with_capacity(file_size as usize);

        out.extend_from_slice(b"dex\n035\0");
        out.extend_from_slice(&0u32.to_le_bytes()); // checksum, unchecked
        out.extend_from_slice(&[0u8; 20]); // signature
        out.extend_from_slice(&file_size.to_le_bytes());
        out.extend_from_slice(&(header_size as u32).to_le_bytes());
        out.extend_from_slice(&0x12345678u32.to_le_bytes()); // endian tag
        out.extend_from_slice(&0u32.to_le_bytes()); // link size
        out.extend_from_slice(&0u32.to_le_bytes()); // link off
        out.extend_from_slice(&0u32.to_le_bytes()); // map off

        let section = |out: &mut Vec<u8>, len: usize, off: usize| {
            out.extend_from_slice(&(len as u32).to_le_bytes());
            out.extend_from_slice(&(if len == 0 { 0 } else { off as u32 }).to_le_bytes());
        };
        section(&mut out, self.strings.len(), string_ids_off);
        section(&mut out, self.type_ids.len(), type_ids_off);
        section(&mut out, self.protos.len(), proto_ids_off);
        section(&mut out, self.field_ids.len(), field_ids_off);
        section(&mut out, self.method_ids.len(), method_ids_off);
        section(&mut out, self.classes.len(), class_defs_off);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data_off as u32).to_le_bytes());

        for off in string_offs {
            out.extend_from_slice(&off.to_le_bytes());
        }
        for &type_string in &self.type_ids {
            out.extend_from_slice(&type_string.to_le_bytes());
        }
        for ((shorty, return_idx, _), list_off) in self.protos.iter().zip(&param_list_offs) {
            out.extend_from_slice(&shorty.to_le_bytes());
            out.extend_from_slice(&return_idx.to_le_bytes());
            out.extend_from_slice(&list_off.to_le_bytes());
        }
        for &(class, type_idx, name) in &self.field_ids {
            out.extend_from_slice(&class.to_le_bytes());
            out.extend_from_slice(&type_idx.to_le_bytes());
            out.extend_from_slice(&name.to_le_bytes());
        }
        for &(class, proto, name) in &self.method_ids {
            out.extend_from_slice(&class.to_le_bytes());
            out.extend_from_slice(&proto.to_le_bytes());
            out.extend_from_slice(&name.to_le_bytes());
        }
        for (class, class_data_off) in self.classes.iter().zip(&class_data_offs) {
            out.extend_from_slice(&class.class_idx.to_le_bytes());
            out.extend_from_slice(&class.access.to_le_bytes());
            out.extend_from_slice(&class.superclass_idx.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes()); // interfaces
            out.extend_from_slice(&u32::MAX.to_le_bytes()); // source file
            out.extend_from_slice(&0u32.to_le_bytes()); // annotations
            out.extend_from_slice(&class_data_off.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes()); // static values
        }

        out.extend_from_slice(&data);

        Dex::new(out).expect("test dex must parse")
    }
}

fn uleb(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}
