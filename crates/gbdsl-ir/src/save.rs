//! Save-data schema and record layout.
//!
//! A slot is laid out as `[magic?][version][fields...][checksum?]`. Fields
//! are packed in declaration order with no padding, 16-bit values little
//! endian. The checksum covers every byte before it.

use serde::{Deserialize, Serialize};

use crate::{IrError, Result};

/// Cartridge SRAM available for save slots.
pub const SRAM_SIZE: usize = 8 * 1024;

/// Field storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    U8,
    I8,
    U16,
    I16,
    Bool,
    /// 8.8 fixed point.
    Fixed,
}

impl FieldType {
    pub fn size(self) -> u16 {
        match self {
            FieldType::U8 | FieldType::I8 | FieldType::Bool => 1,
            FieldType::U16 | FieldType::I16 | FieldType::Fixed => 2,
        }
    }

    pub fn c_type(self) -> &'static str {
        match self {
            FieldType::U8 | FieldType::Bool => "uint8_t",
            FieldType::I8 => "int8_t",
            FieldType::U16 => "uint16_t",
            FieldType::I16 | FieldType::Fixed => "int16_t",
        }
    }

    fn encode(self, value: i32, out: &mut [u8]) {
        match self.size() {
            1 => out[0] = value as u8,
            _ => out[..2].copy_from_slice(&(value as u16).to_le_bytes()),
        }
    }

    fn decode(self, bytes: &[u8]) -> i32 {
        match self {
            FieldType::U8 => bytes[0] as i32,
            FieldType::Bool => (bytes[0] != 0) as i32,
            FieldType::I8 => bytes[0] as i8 as i32,
            FieldType::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as i32,
            FieldType::I16 | FieldType::Fixed => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
        }
    }
}

/// Integrity check appended to each slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumKind {
    None,
    Xor,
    /// CRC-8-CCITT: polynomial 0x07, initial value 0, MSB first.
    #[default]
    Crc8,
    /// Wrapping 16-bit sum of all bytes.
    Sum16,
}

impl ChecksumKind {
    pub fn size(self) -> u16 {
        match self {
            ChecksumKind::None => 0,
            ChecksumKind::Xor | ChecksumKind::Crc8 => 1,
            ChecksumKind::Sum16 => 2,
        }
    }

    pub fn compute(self, data: &[u8]) -> u16 {
        match self {
            ChecksumKind::None => 0,
            ChecksumKind::Xor => data.iter().fold(0u8, |acc, b| acc ^ b) as u16,
            ChecksumKind::Crc8 => crc8_ccitt(data) as u16,
            ChecksumKind::Sum16 => data.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16)),
        }
    }
}

fn crc8_ccitt(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &b in data {
        crc ^= b;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x07 } else { crc << 1 };
        }
    }
    crc
}

// ══════════════════════════════════════════════════════════════════════════════
// Schema
// ══════════════════════════════════════════════════════════════════════════════

/// A placed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveField {
    pub name: String,
    pub ty: FieldType,
    /// Byte offset from the start of the slot.
    pub offset: u16,
    /// Total bytes, including every array element.
    pub size: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_len: Option<u8>,
    #[serde(default)]
    pub default: i32,
}

impl SaveField {
    pub fn len(&self) -> usize {
        self.array_len.map_or(1, |n| n as usize)
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// The complete save layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSchema {
    fields: Vec<SaveField>,
    slots: u8,
    checksum: ChecksumKind,
    magic: Option<[u8; 4]>,
    version: u8,
}

impl SaveSchema {
    pub fn builder() -> SaveSchemaBuilder {
        SaveSchemaBuilder::default()
    }

    pub fn fields(&self) -> &[SaveField] {
        &self.fields
    }

    pub fn slots(&self) -> u8 {
        self.slots
    }

    pub fn checksum(&self) -> ChecksumKind {
        self.checksum
    }

    pub fn magic(&self) -> Option<[u8; 4]> {
        self.magic
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Magic marker (if any) plus the version byte.
    pub fn header_size(&self) -> u16 {
        self.magic.map_or(0, |_| 4) + 1
    }

    pub fn version_offset(&self) -> u16 {
        self.header_size() - 1
    }

    /// Offset of the checksum, equal to the number of covered bytes.
    pub fn checksum_offset(&self) -> u16 {
        self.header_size() + self.fields.iter().map(|f| f.size).sum::<u16>()
    }

    pub fn slot_size(&self) -> u16 {
        self.checksum_offset() + self.checksum.size()
    }

    /// Check a schema that did not come from the builder (deserialized
    /// JSON, hand-edited fields): it must match the layout the builder
    /// would assign to the same declarations.
    pub fn validate(&self) -> Result<()> {
        let mut builder = SaveSchema::builder()
            .slots(self.slots)
            .checksum(self.checksum)
            .version(self.version);
        if let Some(magic) = self.magic {
            builder = builder.magic(magic);
        }
        for f in &self.fields {
            builder = match f.array_len {
                Some(n) => builder.array(f.name.clone(), f.ty, n as usize, f.default),
                None => builder.field(f.name.clone(), f.ty, f.default),
            };
        }
        let rebuilt = builder.build()?;
        for (f, placed) in self.fields.iter().zip(rebuilt.fields()) {
            if f.offset != placed.offset || f.size != placed.size {
                return Err(IrError::invalid(format!(
                    "save field '{}' laid out at {}+{}, expected {}+{}",
                    f.name, f.offset, f.size, placed.offset, placed.size
                )));
            }
        }
        Ok(())
    }

    /// Look up a field; unknown names are an authoring error.
    pub fn field(&self, name: &str) -> Result<&SaveField> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| IrError::unknown("save field", name))
    }
}

/// Collects field declarations and assigns offsets on [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct SaveSchemaBuilder {
    fields: Vec<(String, FieldType, Option<usize>, i32)>,
    slots: u8,
    checksum: ChecksumKind,
    magic: Option<[u8; 4]>,
    version: u8,
}

impl Default for SaveSchemaBuilder {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            slots: 1,
            checksum: ChecksumKind::default(),
            magic: None,
            version: 1,
        }
    }
}

impl SaveSchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, ty: FieldType, default: i32) -> Self {
        self.fields.push((name.into(), ty, None, default));
        self
    }

    pub fn array(mut self, name: impl Into<String>, ty: FieldType, len: usize, default: i32) -> Self {
        self.fields.push((name.into(), ty, Some(len), default));
        self
    }

    pub fn slots(mut self, slots: u8) -> Self {
        self.slots = slots;
        self
    }

    pub fn checksum(mut self, checksum: ChecksumKind) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn magic(mut self, magic: [u8; 4]) -> Self {
        self.magic = Some(magic);
        self
    }

    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Place fields first-declared-first-placed and check the limits.
    pub fn build(self) -> Result<SaveSchema> {
        if self.slots == 0 {
            return Err(IrError::invalid("save schema needs at least one slot"));
        }
        let header = self.magic.map_or(0, |_| 4) + 1;
        let mut offset: u16 = header;
        let mut fields: Vec<SaveField> = Vec::with_capacity(self.fields.len());
        for (name, ty, len, default) in self.fields {
            if fields.iter().any(|f| f.name == name) {
                return Err(IrError::invalid(format!("duplicate save field '{name}'")));
            }
            let array_len = match len {
                None => None,
                Some(n) if (1..=255).contains(&n) => Some(n as u8),
                Some(n) => {
                    return Err(IrError::invalid(format!(
                        "save field '{name}' array length {n} outside 1..=255"
                    )))
                }
            };
            let size = ty.size() * array_len.map_or(1, u16::from);
            fields.push(SaveField {
                name,
                ty,
                offset,
                size,
                array_len,
                default,
            });
            offset = offset
                .checked_add(size)
                .ok_or_else(|| IrError::invalid("save slot exceeds 64 KiB"))?;
        }
        let schema = SaveSchema {
            fields,
            slots: self.slots,
            checksum: self.checksum,
            magic: self.magic,
            version: self.version,
        };
        let total = schema.slot_size() as usize * schema.slots as usize;
        if total > SRAM_SIZE {
            return Err(IrError::invalid(format!(
                "{} save slot(s) of {} bytes exceed {SRAM_SIZE} bytes of SRAM",
                schema.slots,
                schema.slot_size()
            )));
        }
        Ok(schema)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Host-side record image
// ══════════════════════════════════════════════════════════════════════════════

/// One slot's bytes, laid out exactly as the generated code lays them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveImage<'a> {
    schema: &'a SaveSchema,
    bytes: Vec<u8>,
}

impl<'a> SaveImage<'a> {
    /// A sealed slot holding every field's default value.
    pub fn new(schema: &'a SaveSchema) -> Self {
        let mut bytes = vec![0u8; schema.slot_size() as usize];
        if let Some(magic) = schema.magic {
            bytes[..4].copy_from_slice(&magic);
        }
        bytes[schema.version_offset() as usize] = schema.version;
        for field in &schema.fields {
            let elem = field.ty.size() as usize;
            for i in 0..field.len() {
                let at = field.offset as usize + i * elem;
                field.ty.encode(field.default, &mut bytes[at..at + elem]);
            }
        }
        let mut image = Self { schema, bytes };
        image.seal();
        image
    }

    /// Wrap raw slot bytes, e.g. read back from a cartridge dump.
    pub fn from_bytes(schema: &'a SaveSchema, bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != schema.slot_size() as usize {
            return Err(IrError::invalid(format!(
                "save slot is {} bytes, expected {}",
                bytes.len(),
                schema.slot_size()
            )));
        }
        Ok(Self { schema, bytes })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn get(&self, name: &str) -> Result<i32> {
        self.get_element(name, 0)
    }

    pub fn get_element(&self, name: &str, index: usize) -> Result<i32> {
        let field = self.schema.field(name)?;
        let at = Self::element_offset(field, index)?;
        Ok(field.ty.decode(&self.bytes[at..]))
    }

    /// Write a value. The checksum is stale until [`seal`](Self::seal).
    pub fn set(&mut self, name: &str, value: i32) -> Result<()> {
        self.set_element(name, 0, value)
    }

    pub fn set_element(&mut self, name: &str, index: usize, value: i32) -> Result<()> {
        let field = self.schema.field(name)?;
        let at = Self::element_offset(field, index)?;
        let elem = field.ty.size() as usize;
        field.ty.encode(value, &mut self.bytes[at..at + elem]);
        Ok(())
    }

    /// Recompute and store the checksum.
    pub fn seal(&mut self) {
        let end = self.schema.checksum_offset() as usize;
        let sum = self.schema.checksum.compute(&self.bytes[..end]);
        match self.schema.checksum.size() {
            0 => {}
            1 => self.bytes[end] = sum as u8,
            _ => self.bytes[end..end + 2].copy_from_slice(&sum.to_le_bytes()),
        }
    }

    /// Magic, version and checksum all match.
    pub fn is_valid(&self) -> bool {
        if let Some(magic) = self.schema.magic {
            if self.bytes[..4] != magic {
                return false;
            }
        }
        if self.bytes[self.schema.version_offset() as usize] != self.schema.version {
            return false;
        }
        let end = self.schema.checksum_offset() as usize;
        let sum = self.schema.checksum.compute(&self.bytes[..end]);
        match self.schema.checksum.size() {
            0 => true,
            1 => self.bytes[end] == sum as u8,
            _ => self.bytes[end..end + 2] == sum.to_le_bytes(),
        }
    }

    fn element_offset(field: &SaveField, index: usize) -> Result<usize> {
        if index >= field.len() {
            return Err(IrError::invalid(format!(
                "save field '{}' index {index} out of bounds (len {})",
                field.name,
                field.len()
            )));
        }
        Ok(field.offset as usize + index * field.ty.size() as usize)
    }
}
