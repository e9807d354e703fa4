#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use matcher_core::config::EnvOptions;
use matcher_core::env::{ClassEnvironment, EnvInputs};
use matcher_core::loader::{ClassRecord, FieldRecord, InstructionRef, MethodRecord};

pub fn method(name: &str, descriptor: &str, refs: Vec<InstructionRef>, code_size: u32) -> MethodRecord {
    MethodRecord {
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        access: 0x0001,
        refs,
        strings: Vec::new(),
        code_size: Some(code_size),
    }
}

pub fn field(name: &str, descriptor: &str) -> FieldRecord {
    FieldRecord { name: name.to_string(), descriptor: descriptor.to_string(), access: 0x0002 }
}

pub fn class(name: &str, fields: Vec<FieldRecord>, methods: Vec<MethodRecord>) -> ClassRecord {
    ClassRecord { fields, methods, ..ClassRecord::new(name) }
}

pub fn env(a: Vec<ClassRecord>, b: Vec<ClassRecord>) -> ClassEnvironment {
    let inputs = EnvInputs { a, b, ..EnvInputs::default() };
    ClassEnvironment::build(inputs, &EnvOptions::default())
}

/// Side A of the reference-graph scenario: `foo(I)I` reads `bar:I`.
pub fn foo_bar_side_a() -> Vec<ClassRecord> {
    vec![class(
        "p/Owner",
        vec![field("bar", "I")],
        vec![method("foo", "(I)I", vec![InstructionRef::field_read("p/Owner", "bar", "I")], 6)],
    )]
}

/// Same shape as [`foo_bar_side_a`] under obfuscated names, plus an unrelated method.
pub fn foo_bar_side_b() -> Vec<ClassRecord> {
    vec![class(
        "q/X",
        vec![field("b", "I")],
        vec![
            method("a", "(I)I", vec![InstructionRef::field_read("q/X", "b", "I")], 6),
            method("c", "()V", Vec::new(), 1),
        ],
    )]
}

/// One class with two structurally identical methods that differ only by position.
pub fn twin_methods(class_name: &str, first: &str, second: &str) -> ClassRecord {
    class(class_name, Vec::new(), vec![method(first, "()V", Vec::new(), 1), method(second, "()V", Vec::new(), 1)])
}

/// A small, structurally varied program.
pub fn sample_program() -> Vec<ClassRecord> {
    let object_init = || InstructionRef::call("java/lang/Object", "<init>", "()V");
    let listener = ClassRecord {
        access: 0x0601,
        methods: vec![MethodRecord {
            access: 0x0401,
            code_size: None,
            ..method("onEvent", "(Ljava/lang/String;)V", Vec::new(), 0)
        }],
        ..ClassRecord::new("app/Listener")
    };
    let mut store = class(
        "app/Store",
        vec![field("items", "[Lapp/Item;"), field("count", "I")],
        vec![
            method("<init>", "()V", vec![object_init()], 5),
            method("size", "()I", vec![InstructionRef::field_read("app/Store", "count", "I")], 5),
            method(
                "add",
                "(Lapp/Item;)V",
                vec![
                    InstructionRef::field_read("app/Store", "items", "[Lapp/Item;"),
                    InstructionRef::field_write("app/Store", "count", "I"),
                    InstructionRef::call("app/Item", "weight", "()J"),
                ],
                24,
            ),
        ],
    );
    store.methods[2].strings.push("store full".to_string());
    let item = class(
        "app/Item",
        vec![field("weight", "J")],
        vec![
            method("<init>", "(J)V", vec![object_init(), InstructionRef::field_write("app/Item", "weight", "J")], 10),
            method("weight", "()J", vec![InstructionRef::field_read("app/Item", "weight", "J")], 5),
        ],
    );
    let printer = ClassRecord {
        interface_names: vec!["app/Listener".to_string()],
        ..class(
            "app/Printer",
            Vec::new(),
            vec![
                method("<init>", "()V", vec![object_init()], 5),
                MethodRecord {
                    strings: vec!["event: ".to_string()],
                    ..method(
                        "onEvent",
                        "(Ljava/lang/String;)V",
                        vec![InstructionRef::call("java/io/PrintStream", "println", "(Ljava/lang/String;)V")],
                        12,
                    )
                },
            ],
        )
    };
    vec![listener, store, item, printer]
}

/// Bytecode fragments understood by [`ClassWriter`].
#[derive(Debug, Clone)]
pub enum Op {
    GetField(&'static str, &'static str, &'static str),
    PutField(&'static str, &'static str, &'static str),
    InvokeVirtual(&'static str, &'static str, &'static str),
    New(&'static str),
    Ldc(&'static str),
    Return,
}

#[derive(Clone, Hash, PartialEq, Eq)]
enum Constant {
    Utf8(String),
    Class(u16),
    String(u16),
    NameAndType(u16, u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
}

/// Minimal class-file writer for loader tests.
pub struct ClassWriter {
    pool: Vec<Constant>,
    index: HashMap<Constant, u16>,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<(u16, u16, u16)>,
    methods: Vec<Vec<u8>>,
}

impl ClassWriter {
    pub fn new(name: &str, super_name: &str) -> Self {
        let mut writer = Self {
            pool: Vec::new(),
            index: HashMap::new(),
            access: 0x0021,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        };
        writer.this_class = writer.class_ref(name);
        writer.super_class = writer.class_ref(super_name);
        writer
    }

    fn add(&mut self, constant: Constant) -> u16 {
        if let Some(index) = self.index.get(&constant) {
            return *index;
        }
        let index = self.pool.len() as u16 + 1;
        self.index.insert(constant.clone(), index);
        self.pool.push(constant);
        index
    }

    fn utf8(&mut self, value: &str) -> u16 {
        self.add(Constant::Utf8(value.to_string()))
    }

    fn class_ref(&mut self, name: &str) -> u16 {
        let utf8 = self.utf8(name);
        self.add(Constant::Class(utf8))
    }

    fn name_and_type(&mut self, name: &str, desc: &str) -> u16 {
        let name = self.utf8(name);
        let desc = self.utf8(desc);
        self.add(Constant::NameAndType(name, desc))
    }

    pub fn interface(mut self, name: &str) -> Self {
        let index = self.class_ref(name);
        self.interfaces.push(index);
        self
    }

    pub fn field(mut self, access: u16, name: &str, desc: &str) -> Self {
        let name = self.utf8(name);
        let desc = self.utf8(desc);
        self.fields.push((access, name, desc));
        self
    }

    pub fn method(mut self, access: u16, name: &str, desc: &str, body: &[Op]) -> Self {
        let name = self.utf8(name);
        let desc = self.utf8(desc);
        let mut code = Vec::new();
        for op in body {
            match op {
                Op::GetField(owner, n, d) | Op::PutField(owner, n, d) => {
                    let class = self.class_ref(owner);
                    let nat = self.name_and_type(n, d);
                    let index = self.add(Constant::FieldRef(class, nat));
                    code.push(if matches!(op, Op::GetField(..)) { 0xb4 } else { 0xb5 });
                    code.extend_from_slice(&index.to_be_bytes());
                }
                Op::InvokeVirtual(owner, n, d) => {
                    let class = self.class_ref(owner);
                    let nat = self.name_and_type(n, d);
                    let index = self.add(Constant::MethodRef(class, nat));
                    code.push(0xb6);
                    code.extend_from_slice(&index.to_be_bytes());
                }
                Op::New(owner) => {
                    let index = self.class_ref(owner);
                    code.push(0xbb);
                    code.extend_from_slice(&index.to_be_bytes());
                }
                Op::Ldc(value) => {
                    let utf8 = self.utf8(value);
                    let index = self.add(Constant::String(utf8));
                    code.push(0x13);
                    code.extend_from_slice(&index.to_be_bytes());
                }
                Op::Return => code.push(0xb1),
            }
        }

        let mut out = Vec::new();
        out.extend_from_slice(&access.to_be_bytes());
        out.extend_from_slice(&name.to_be_bytes());
        out.extend_from_slice(&desc.to_be_bytes());
        if access & 0x0400 != 0 {
            out.extend_from_slice(&0u16.to_be_bytes());
        } else {
            let code_name = self.utf8("Code");
            let mut attr = Vec::new();
            attr.extend_from_slice(&4u16.to_be_bytes());
            attr.extend_from_slice(&4u16.to_be_bytes());
            attr.extend_from_slice(&(code.len() as u32).to_be_bytes());
            attr.extend_from_slice(&code);
            attr.extend_from_slice(&0u16.to_be_bytes());
            attr.extend_from_slice(&0u16.to_be_bytes());
            out.extend_from_slice(&1u16.to_be_bytes());
            out.extend_from_slice(&code_name.to_be_bytes());
            out.extend_from_slice(&(attr.len() as u32).to_be_bytes());
            out.extend_from_slice(&attr);
        }
        self.methods.push(out);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());
        out.extend_from_slice(&(self.pool.len() as u16 + 1).to_be_bytes());
        for constant in &self.pool {
            match constant {
                Constant::Utf8(s) => {
                    out.push(1);
                    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
                    out.extend_from_slice(s.as_bytes());
                }
                Constant::Class(i) => {
                    out.push(7);
                    out.extend_from_slice(&i.to_be_bytes());
                }
                Constant::String(i) => {
                    out.push(8);
                    out.extend_from_slice(&i.to_be_bytes());
                }
                Constant::FieldRef(a, b) | Constant::MethodRef(a, b) | Constant::NameAndType(a, b) => {
                    out.push(match constant {
                        Constant::FieldRef(..) => 9,
                        Constant::MethodRef(..) => 10,
                        _ => 12,
                    });
                    out.extend_from_slice(&a.to_be_bytes());
                    out.extend_from_slice(&b.to_be_bytes());
                }
            }
        }
        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for i in &self.interfaces {
            out.extend_from_slice(&i.to_be_bytes());
        }
        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for (access, name, desc) in &self.fields {
            out.extend_from_slice(&access.to_be_bytes());
            out.extend_from_slice(&name.to_be_bytes());
            out.extend_from_slice(&desc.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
        }
        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for m in &self.methods {
            out.extend_from_slice(m);
        }
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }
}

/// Class bytes for a counter class with a field, a getter and a setter.
pub fn counter_class(name: &'static str) -> Vec<u8> {
    ClassWriter::new(name, "java/lang/Object")
        .field(0x0002, "value", "I")
        .method(0x0001, "get", "()I", &[Op::GetField(name, "value", "I"), Op::Return])
        .method(0x0001, "set", "(I)V", &[Op::PutField(name, "value", "I"), Op::Return])
        .finish()
}

/// Write a jar holding `entries` (`(path, bytes)`).
pub fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let file = std::fs::File::create(path).expect("create jar");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(*name, options).expect("start entry");
        zip.write_all(bytes).expect("write entry");
    }
    zip.finish().expect("finish jar");
}
