//! Class-file parser.
//!
//! Reads the constant pool, class header, fields and methods, and scans each
//! `Code` attribute for member accesses, type operands and string constants.
//! Attributes other than `Code` are skipped.

use crate::error::{MatcherError, MatcherResult};
use crate::loader::reader::ByteReader;
use crate::loader::{ClassRecord, FieldRecord, InstructionRef, MethodRecord};

const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Clone)]
enum CpEntry {
    Unused,
    Utf8(String),
    Class(u16),
    String(u16),
    MemberRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    Other,
}

struct ConstantPool {
    entries: Vec<CpEntry>,
}

impl ConstantPool {
    fn read(reader: &mut ByteReader<'_>) -> Result<Self, String> {
        let count = reader.read_u16()? as usize;
        let mut entries = vec![CpEntry::Unused; count.max(1)];
        let mut index = 1;

        while index < count {
            let tag = reader.read_u8()?;
            let entry = match tag {
                1 => {
                    let len = reader.read_u16()? as usize;
                    let bytes = reader.read_bytes(len)?;
                    CpEntry::Utf8(String::from_utf8_lossy(bytes).into_owned())
                }
                3 | 4 => {
                    reader.skip(4)?;
                    CpEntry::Other
                }
                5 | 6 => {
                    reader.skip(8)?;
                    entries[index] = CpEntry::Other;
                    // Long and double constants occupy two slots.
                    index += 2;
                    continue;
                }
                7 => CpEntry::Class(reader.read_u16()?),
                8 => CpEntry::String(reader.read_u16()?),
                9..=11 => CpEntry::MemberRef {
                    class: reader.read_u16()?,
                    name_and_type: reader.read_u16()?,
                },
                12 => CpEntry::NameAndType {
                    name: reader.read_u16()?,
                    descriptor: reader.read_u16()?,
                },
                15 => {
                    reader.skip(3)?;
                    CpEntry::Other
                }
                16 | 19 | 20 => {
                    reader.skip(2)?;
                    CpEntry::Other
                }
                17 | 18 => {
                    reader.skip(4)?;
                    CpEntry::Other
                }
                other => {
                    return Err(format!("unknown constant pool tag {other} at index {index}"))
                }
            };
            entries[index] = entry;
            index += 1;
        }

        Ok(ConstantPool { entries })
    }

    fn get(&self, index: u16) -> Result<&CpEntry, String> {
        match self.entries.get(index as usize) {
            Some(CpEntry::Unused) | None => Err(format!("invalid constant pool index {index}")),
            Some(entry) => Ok(entry),
        }
    }

    fn utf8(&self, index: u16) -> Result<&str, String> {
        match self.get(index)? {
            CpEntry::Utf8(s) => Ok(s),
            other => Err(format!("constant {index} is not utf8: {other:?}")),
        }
    }

    fn class_name(&self, index: u16) -> Result<&str, String> {
        match self.get(index)? {
            CpEntry::Class(name) => self.utf8(*name),
            other => Err(format!("constant {index} is not a class: {other:?}")),
        }
    }

    fn member_ref(&self, index: u16) -> Result<(&str, &str, &str), String> {
        match self.get(index)? {
            CpEntry::MemberRef { class, name_and_type } => {
                let owner = self.class_name(*class)?;
                match self.get(*name_and_type)? {
                    CpEntry::NameAndType { name, descriptor } => {
                        Ok((owner, self.utf8(*name)?, self.utf8(*descriptor)?))
                    }
                    other => Err(format!("constant {name_and_type} is not name-and-type: {other:?}")),
                }
            }
            other => Err(format!("constant {index} is not a member reference: {other:?}")),
        }
    }
}

/// Parse one class file. `origin` names the file or archive entry in errors.
pub fn parse_class(bytes: &[u8], origin: &str) -> MatcherResult<ClassRecord> {
    parse_inner(bytes).map_err(|message| MatcherError::malformed(origin, message))
}

fn parse_inner(bytes: &[u8]) -> Result<ClassRecord, String> {
    let mut reader = ByteReader::new(bytes);

    let magic = reader.read_u32()?;
    if magic != MAGIC {
        return Err(format!("bad magic 0x{magic:08X}"));
    }
    let _minor = reader.read_u16()?;
    let _major = reader.read_u16()?;

    let pool = ConstantPool::read(&mut reader)?;

    let access = reader.read_u16()?;
    let this_class = reader.read_u16()?;
    let binary_name = pool.class_name(this_class)?.to_string();
    let super_index = reader.read_u16()?;
    let super_name =
        if super_index == 0 { None } else { Some(pool.class_name(super_index)?.to_string()) };

    let interface_count = reader.read_u16()?;
    let mut interface_names = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        interface_names.push(pool.class_name(reader.read_u16()?)?.to_string());
    }

    let field_count = reader.read_u16()?;
    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        let access = reader.read_u16()?;
        let name = pool.utf8(reader.read_u16()?)?.to_string();
        let descriptor = pool.utf8(reader.read_u16()?)?.to_string();
        skip_attributes(&mut reader)?;
        fields.push(FieldRecord { name, descriptor, access });
    }

    let method_count = reader.read_u16()?;
    let mut methods = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        methods.push(read_method(&mut reader, &pool)?);
    }

    skip_attributes(&mut reader)?;

    Ok(ClassRecord { binary_name, super_name, interface_names, access, fields, methods })
}

fn skip_attributes(reader: &mut ByteReader<'_>) -> Result<(), String> {
    let count = reader.read_u16()?;
    for _ in 0..count {
        let _name = reader.read_u16()?;
        let len = reader.read_u32()? as usize;
        reader.skip(len)?;
    }
    Ok(())
}

fn read_method(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<MethodRecord, String> {
    let access = reader.read_u16()?;
    let name = pool.utf8(reader.read_u16()?)?.to_string();
    let descriptor = pool.utf8(reader.read_u16()?)?.to_string();
    let mut method =
        MethodRecord { name, descriptor, access, refs: Vec::new(), strings: Vec::new(), code_size: None };

    let attr_count = reader.read_u16()?;
    for _ in 0..attr_count {
        let attr_name = pool.utf8(reader.read_u16()?)?;
        let len = reader.read_u32()? as usize;
        let body = reader.read_bytes(len)?;
        if attr_name == "Code" {
            let mut code_reader = ByteReader::new(body);
            let _max_stack = code_reader.read_u16()?;
            let _max_locals = code_reader.read_u16()?;
            let code_len = code_reader.read_u32()? as usize;
            let code = code_reader.read_bytes(code_len)?;
            method.code_size = Some(code_len as u32);
            scan_code(code, pool, &mut method)
                .map_err(|e| format!("method {}{}: {e}", method.name, method.descriptor))?;
        }
    }

    Ok(method)
}

fn u16_at(code: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([code[at], code[at + 1]])
}

fn i32_at(code: &[u8], at: usize) -> Result<i32, String> {
    code.get(at..at + 4)
        .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| format!("truncated switch at offset {at}"))
}

/// Length in bytes of the instruction starting at `pc`.
fn instruction_len(code: &[u8], pc: usize) -> Result<usize, String> {
    let op = code[pc];
    let len = match op {
        0x00..=0x0f => 1,
        0x10 => 2,
        0x11 => 3,
        0x12 => 2,
        0x13 | 0x14 => 3,
        0x15..=0x19 => 2,
        0x1a..=0x35 => 1,
        0x36..=0x3a => 2,
        0x3b..=0x83 => 1,
        0x84 => 3,
        0x85..=0x98 => 1,
        0x99..=0xa8 => 3,
        0xa9 => 2,
        0xaa => {
            let pad = (4 - (pc + 1) % 4) % 4;
            let base = pc + 1 + pad;
            let low = i32_at(code, base + 4)?;
            let high = i32_at(code, base + 8)?;
            if high < low {
                return Err(format!("tableswitch with high < low at offset {pc}"));
            }
            let entries = (high as i64 - low as i64 + 1) as usize;
            1 + pad + 12 + entries * 4
        }
        0xab => {
            let pad = (4 - (pc + 1) % 4) % 4;
            let base = pc + 1 + pad;
            let pairs = i32_at(code, base + 4)?;
            if pairs < 0 {
                return Err(format!("lookupswitch with negative pair count at offset {pc}"));
            }
            1 + pad + 8 + pairs as usize * 8
        }
        0xac..=0xb1 => 1,
        0xb2..=0xb8 => 3,
        0xb9 | 0xba => 5,
        0xbb => 3,
        0xbc => 2,
        0xbd => 3,
        0xbe | 0xbf => 1,
        0xc0 | 0xc1 => 3,
        0xc2 | 0xc3 => 1,
        0xc4 => match code.get(pc + 1) {
            Some(0x84) => 6,
            Some(_) => 4,
            None => return Err(format!("truncated wide instruction at offset {pc}")),
        },
        0xc5 => 4,
        0xc6 | 0xc7 => 3,
        0xc8 | 0xc9 => 5,
        other => return Err(format!("unknown opcode 0x{other:02x} at offset {pc}")),
    };
    Ok(len)
}

fn scan_code(code: &[u8], pool: &ConstantPool, method: &mut MethodRecord) -> Result<(), String> {
    let mut pc = 0;
    while pc < code.len() {
        let op = code[pc];
        let len = instruction_len(code, pc)?;
        if pc + len > code.len() {
            return Err(format!("instruction 0x{op:02x} at offset {pc} runs past end of code"));
        }

        match op {
            0xb2 | 0xb4 => {
                let (owner, name, desc) = pool.member_ref(u16_at(code, pc + 1))?;
                method.refs.push(InstructionRef::field_read(owner, name, desc));
            }
            0xb3 | 0xb5 => {
                let (owner, name, desc) = pool.member_ref(u16_at(code, pc + 1))?;
                method.refs.push(InstructionRef::field_write(owner, name, desc));
            }
            0xb6..=0xb9 => {
                let (owner, name, desc) = pool.member_ref(u16_at(code, pc + 1))?;
                method.refs.push(InstructionRef::call(owner, name, desc));
            }
            0xbb | 0xbd | 0xc0 | 0xc1 | 0xc5 => {
                let owner = pool.class_name(u16_at(code, pc + 1))?;
                method.refs.push(InstructionRef::type_ref(owner));
            }
            0x12 => load_constant(pool, code[pc + 1] as u16, method)?,
            0x13 => load_constant(pool, u16_at(code, pc + 1), method)?,
            _ => {}
        }

        pc += len;
    }
    Ok(())
}

fn load_constant(pool: &ConstantPool, index: u16, method: &mut MethodRecord) -> Result<(), String> {
    match pool.get(index)? {
        CpEntry::String(utf8) => method.strings.push(pool.utf8(*utf8)?.to_string()),
        CpEntry::Class(name) => method.refs.push(InstructionRef::type_ref(pool.utf8(*name)?)),
        _ => {}
    }
    Ok(())
}
