//! Reads the version baked into an installed Recaf jar.
//!
//! Recaf stores its version in the constant fields of a generated `RecafBuildConfig`
//! class. Only the constant pool and field table of that class are parsed.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;
use crate::error::InstallationError;
use crate::version::AppVersion;

/// Jar entry holding the build constants.
pub const BUILD_CONFIG_ENTRY: &str = "software/coley/recaf/RecafBuildConfig.class";

/// Returns the version of the jar at `jar_path`.
///
/// # Errors
/// Returns an [`InstallationError`] describing why no valid installation was found.
pub fn installed_version(jar_path: &Path) -> Result<AppVersion, InstallationError> {
    if !jar_path.is_file() {
        return Err(InstallationError::Missing(jar_path.to_path_buf()));
    }
    let unreadable = |reason: String| InstallationError::UnreadableBuildInfo {
        path: jar_path.to_path_buf(),
        reason,
    };

    let file = File::open(jar_path).map_err(|e| unreadable(e.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|e| unreadable(e.to_string()))?;
    let mut class_bytes = Vec::new();
    match archive.by_name(BUILD_CONFIG_ENTRY) {
        Ok(mut entry) => {
            entry
                .read_to_end(&mut class_bytes)
                .map_err(|e| unreadable(e.to_string()))?;
        }
        Err(ZipError::FileNotFound) => {
            return Err(InstallationError::MissingBuildInfo(jar_path.to_path_buf()));
        }
        Err(e) => return Err(unreadable(e.to_string())),
    }

    let fields = read_constant_fields(&class_bytes).map_err(|reason| InstallationError::InvalidBuildInfo {
        path: jar_path.to_path_buf(),
        reason,
    })?;
    let version = fields.get("VERSION").map(String::as_str).unwrap_or("0.0.0");
    let revision = fields
        .get("GIT_REVISION")
        .filter(|rev| !rev.is_empty() && rev.chars().all(|c| c.is_ascii_digit()))
        .and_then(|rev| rev.parse::<u32>().ok())
        // Builds without git metadata report revision 1.
        .filter(|rev| *rev != 1);
    Ok(AppVersion::new(version, revision))
}

enum Constant {
    Utf8(String),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(u16),
    Other,
}

struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    fn bytes(&mut self, len: usize) -> Result<&'a [u8], String> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.data.len());
        let end = end.ok_or_else(|| format!("truncated class file at offset {}", self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, String> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, String> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, String> {
        let b = self.bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }
}

/// Returns the `ConstantValue` of every field in a class file, rendered as strings.
pub fn read_constant_fields(class_bytes: &[u8]) -> Result<HashMap<String, String>, String> {
    let mut reader = ClassReader { data: class_bytes, pos: 0 };
    if reader.u32()? != 0xCAFE_BABE {
        return Err("not a class file".to_string());
    }
    // minor, major
    reader.u16()?;
    reader.u16()?;

    let pool_count = reader.u16()? as usize;
    let mut pool: Vec<Constant> = Vec::with_capacity(pool_count);
    pool.push(Constant::Other);
    while pool.len() < pool_count {
        let tag = reader.u8()?;
        let constant = match tag {
            1 => {
                let len = reader.u16()? as usize;
                Constant::Utf8(String::from_utf8_lossy(reader.bytes(len)?).into_owned())
            }
            3 => Constant::Integer(reader.u32()? as i32),
            4 => Constant::Float(f32::from_bits(reader.u32()?)),
            5 => Constant::Long(reader.u64()? as i64),
            6 => Constant::Double(f64::from_bits(reader.u64()?)),
            8 => Constant::String(reader.u16()?),
            7 | 16 | 19 | 20 => {
                reader.u16()?;
                Constant::Other
            }
            15 => {
                reader.bytes(3)?;
                Constant::Other
            }
            9 | 10 | 11 | 12 | 17 | 18 => {
                reader.u32()?;
                Constant::Other
            }
            other => return Err(format!("unknown constant pool tag {other}")),
        };
        // Longs and doubles occupy two slots.
        let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
        pool.push(constant);
        if wide {
            pool.push(Constant::Other);
        }
    }

    let utf8 = |index: u16| -> Result<&str, String> {
        match pool.get(index as usize) {
            Some(Constant::Utf8(value)) => Ok(value.as_str()),
            _ => Err(format!("constant #{index} is not a UTF-8 entry")),
        }
    };

    // access flags, this class, super class
    reader.u16()?;
    reader.u16()?;
    reader.u16()?;
    let interface_count = reader.u16()? as usize;
    reader.bytes(interface_count * 2)?;

    let mut fields = HashMap::new();
    let field_count = reader.u16()?;
    for _ in 0..field_count {
        reader.u16()?;
        let name = utf8(reader.u16()?)?.to_string();
        reader.u16()?;
        let attribute_count = reader.u16()?;
        for _ in 0..attribute_count {
            let attribute_name = utf8(reader.u16()?)?;
            let len = reader.u32()? as usize;
            if attribute_name != "ConstantValue" {
                reader.bytes(len)?;
                continue;
            }
            let value = match pool.get(reader.u16()? as usize) {
                Some(Constant::String(index)) => utf8(*index)?.to_string(),
                Some(Constant::Integer(v)) => v.to_string(),
                Some(Constant::Long(v)) => v.to_string(),
                Some(Constant::Float(v)) => v.to_string(),
                Some(Constant::Double(v)) => v.to_string(),
                _ => return Err(format!("field '{name}' has an invalid constant value")),
            };
            fields.insert(name.clone(), value);
        }
    }
    Ok(fields)
}

/// Class file builders shared by unit and integration tests.
#[doc(hidden)]
pub mod test_support {
    /// Assembles a minimal class with `String` constant fields.
    pub fn build_config_class(fields: &[(&str, &str)]) -> Vec<u8> {
        let mut pool: Vec<Vec<u8>> = Vec::new();
        let utf8 = |s: &str| {
            let mut entry = vec![1u8];
            entry.extend_from_slice(&(s.len() as u16).to_be_bytes());
            entry.extend_from_slice(s.as_bytes());
            entry
        };
        pool.push(utf8("Ljava/lang/String;")); // #1
        pool.push(utf8("ConstantValue")); // #2
        let mut field_refs = Vec::new();
        for (name, value) in fields {
            let name_index = pool.len() as u16 + 1;
            pool.push(utf8(name));
            let value_index = pool.len() as u16 + 1;
            pool.push(utf8(value));
            let string_index = pool.len() as u16 + 1;
            let mut string = vec![8u8];
            string.extend_from_slice(&value_index.to_be_bytes());
            pool.push(string);
            field_refs.push((name_index, string_index));
        }

        let mut class = vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 65];
        class.extend_from_slice(&(pool.len() as u16 + 1).to_be_bytes());
        for entry in &pool {
            class.extend_from_slice(entry);
        }
        class.extend_from_slice(&[0, 0x31, 0, 0, 0, 0, 0, 0]);
        class.extend_from_slice(&(field_refs.len() as u16).to_be_bytes());
        for (name_index, string_index) in field_refs {
            class.extend_from_slice(&0x19u16.to_be_bytes());
            class.extend_from_slice(&name_index.to_be_bytes());
            class.extend_from_slice(&1u16.to_be_bytes());
            class.extend_from_slice(&1u16.to_be_bytes());
            class.extend_from_slice(&2u16.to_be_bytes());
            class.extend_from_slice(&2u32.to_be_bytes());
            class.extend_from_slice(&string_index.to_be_bytes());
        }
        class.extend_from_slice(&[0, 0, 0, 0]);
        class
    }
}
