//! JVM type descriptors.
//!
//! Type ids in the entity model use field-descriptor form: `I`, `La/b/C;`,
//! `[[La/b/C;`. Class files name classes by internal name (`a/b/C`) and name
//! array classes by descriptor, so [`type_id_for_internal`] bridges the two.

fn read_type(desc: &str, start: usize, allow_void: bool) -> Result<usize, String> {
    let bytes = desc.as_bytes();
    let mut pos = start;
    while bytes.get(pos) == Some(&b'[') {
        pos += 1;
    }
    let is_array = pos > start;
    match bytes.get(pos) {
        Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => Ok(pos + 1),
        Some(b'V') if allow_void && !is_array => Ok(pos + 1),
        Some(b'L') => {
            let end = desc[pos..]
                .find(';')
                .map(|i| pos + i)
                .ok_or_else(|| format!("unterminated class type in '{desc}'"))?;
            if end == pos + 1 {
                return Err(format!("empty class name in '{desc}'"));
            }
            Ok(end + 1)
        }
        Some(other) => Err(format!("unexpected '{}' at {pos} in '{desc}'", *other as char)),
        None => Err(format!("truncated descriptor '{desc}'")),
    }
}

/// Validate a field descriptor and return it as an owned type id.
pub fn parse_field_type(desc: &str) -> Result<String, String> {
    let end = read_type(desc, 0, false)?;
    if end != desc.len() {
        return Err(format!("trailing characters in field descriptor '{desc}'"));
    }
    Ok(desc.to_string())
}

/// Split a method descriptor into argument type ids and the return type id.
pub fn parse_method(desc: &str) -> Result<(Vec<String>, String), String> {
    if !desc.starts_with('(') {
        return Err(format!("method descriptor '{desc}' does not start with '('"));
    }
    let mut args = Vec::new();
    let mut pos = 1;
    loop {
        match desc.as_bytes().get(pos) {
            Some(b')') => break,
            Some(_) => {
                let end = read_type(desc, pos, false)?;
                args.push(desc[pos..end].to_string());
                pos = end;
            }
            None => return Err(format!("unterminated argument list in '{desc}'")),
        }
    }
    let ret_start = pos + 1;
    let end = read_type(desc, ret_start, true)?;
    if end != desc.len() {
        return Err(format!("trailing characters in method descriptor '{desc}'"));
    }
    Ok((args, desc[ret_start..end].to_string()))
}

/// Type id for a class-file class name (`a/b/C` or an array descriptor).
pub fn type_id_for_internal(name: &str) -> String {
    if name.starts_with('[') {
        name.to_string()
    } else {
        format!("L{name};")
    }
}

/// Display name for a type id: internal name for class types, the id itself otherwise.
pub fn display_name(type_id: &str) -> &str {
    type_id.strip_prefix('L').and_then(|s| s.strip_suffix(';')).unwrap_or(type_id)
}

/// Array dimensions and element type id, if `type_id` is an array.
pub fn array_element(type_id: &str) -> Option<(u8, &str)> {
    let dims = type_id.bytes().take_while(|b| *b == b'[').count();
    if dims == 0 {
        None
    } else {
        Some((dims.min(u8::MAX as usize) as u8, &type_id[dims..]))
    }
}

pub fn is_primitive(type_id: &str) -> bool {
    matches!(type_id, "B" | "C" | "D" | "F" | "I" | "J" | "S" | "Z" | "V")
}
