//! Save data: slot layout, checksum and SRAM routines.
//!
//! The working copy lives in `save_buf`; accessors read and write it, and
//! `save_commit` / `save_load` move whole slots between it and cartridge
//! SRAM. Offsets match [`SaveSchema`] byte for byte, so a host-side
//! [`gbdsl_ir::save::SaveImage`] can read what the game writes.

use gbdsl_ir::save::{ChecksumKind, FieldType, SaveField, SaveSchema};
use tracing::debug;

use crate::context::LowerContext;
use crate::error::LowerResult;
use crate::symbols::{c_ident, upper_ident};

/// Start of cartridge SRAM in the address space.
const SRAM_BASE: u16 = 0xA000;

pub fn prototypes(ctx: &LowerContext<'_>) -> Vec<String> {
    let Some(schema) = &ctx.game.save else {
        return Vec::new();
    };
    let mut out = vec![
        "void save_reset(void);".to_string(),
        "uint8_t save_validate(void);".to_string(),
        "void save_commit(uint8_t slot);".to_string(),
        "uint8_t save_load(uint8_t slot);".to_string(),
    ];
    for field in schema.fields() {
        let (getter, setter) = accessor_signatures(field);
        out.push(format!("{getter};"));
        out.push(format!("{setter};"));
    }
    out
}

pub fn emit(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    let game = ctx.game;
    let Some(schema) = &game.save else {
        return Ok(());
    };
    schema.validate()?;
    ctx.banner();
    emit_layout(ctx, schema);
    emit_checksum(ctx, schema.checksum())?;
    for field in schema.fields() {
        emit_accessors(ctx, field)?;
    }
    emit_reset(ctx, schema)?;
    emit_slot_routines(ctx, schema)?;
    debug!(
        fields = schema.fields().len(),
        slot_size = schema.slot_size(),
        slots = schema.slots(),
        checksum = ?schema.checksum(),
        "save layout emitted"
    );
    Ok(())
}

fn emit_layout(ctx: &mut LowerContext<'_>, schema: &SaveSchema) {
    ctx.out
        .line(format!("#define SAVE_SLOTS {}", schema.slots()));
    ctx.out
        .line(format!("#define SAVE_SLOT_SIZE {}", schema.slot_size()));
    ctx.out
        .line(format!("#define SAVE_VERSION {}", schema.version()));
    ctx.out
        .line(format!("#define SAVE_OFF_VERSION {}", schema.version_offset()));
    ctx.out
        .line(format!("#define SAVE_OFF_CHECKSUM {}", schema.checksum_offset()));
    for field in schema.fields() {
        let name = upper_ident(&field.name);
        ctx.out
            .line(format!("#define SAVE_OFF_{name} {}", field.offset));
        if let Some(len) = field.array_len {
            ctx.out.line(format!("#define SAVE_{name}_LEN {len}"));
        }
    }
    if let Some(magic) = schema.magic() {
        let bytes: Vec<String> = magic.iter().map(|b| format!("0x{b:02X}")).collect();
        ctx.out.line(format!(
            "static const uint8_t save_magic[4] = {{{}}};",
            bytes.join(", ")
        ));
    }
    ctx.out.line("uint8_t save_buf[SAVE_SLOT_SIZE];");
    ctx.out.blank();
}

fn emit_checksum(ctx: &mut LowerContext<'_>, kind: ChecksumKind) -> LowerResult<()> {
    let signature = "static uint16_t save_checksum(const uint8_t *p, uint16_t n)";
    match kind {
        ChecksumKind::None => Ok(()),
        ChecksumKind::Xor => ctx.function("save_checksum", signature, |ctx| {
            ctx.out.line("uint8_t x = 0;");
            ctx.out.line("while (n--) x ^= *p++;");
            ctx.out.line("return x;");
            Ok(())
        }),
        ChecksumKind::Crc8 => ctx.function("save_checksum", signature, |ctx| {
            ctx.out.line("uint8_t crc = 0;");
            ctx.out.line("uint8_t b;");
            ctx.out.open("while (n--)");
            ctx.out.line("crc ^= *p++;");
            ctx.out.open("for (b = 0; b < 8; b++)");
            ctx.out
                .line("crc = (crc & 0x80) ? (uint8_t)((crc << 1) ^ 0x07) : (uint8_t)(crc << 1);");
            ctx.out.close();
            ctx.out.close();
            ctx.out.line("return crc;");
            Ok(())
        }),
        ChecksumKind::Sum16 => ctx.function("save_checksum", signature, |ctx| {
            ctx.out.line("uint16_t s = 0;");
            ctx.out.line("while (n--) s += *p++;");
            ctx.out.line("return s;");
            Ok(())
        }),
    }
}

// ── Field accessors ─────────────────────────────────────────────────────────

fn accessor_signatures(field: &SaveField) -> (String, String) {
    let name = c_ident(&field.name);
    let ty = field.ty.c_type();
    if field.array_len.is_some() {
        (
            format!("{ty} save_get_{name}(uint8_t i)"),
            format!("void save_set_{name}(uint8_t i, {ty} v)"),
        )
    } else {
        (
            format!("{ty} save_get_{name}(void)"),
            format!("void save_set_{name}({ty} v)"),
        )
    }
}

/// Byte offset of the accessed element, as a C expression.
fn element_offset(ctx: &LowerContext<'_>, field: &SaveField) -> String {
    let name = upper_ident(&field.name);
    let base = format!("SAVE_OFF_{name}");
    if field.array_len.is_none() {
        return base;
    }
    let index = if ctx.options.bounds_checks {
        format!("BOUNDS_CHECK(i, SAVE_{name}_LEN)")
    } else {
        "i".to_string()
    };
    match field.ty.size() {
        1 => format!("{base} + {index}"),
        n => format!("{base} + {index} * {n}"),
    }
}

fn emit_accessors(ctx: &mut LowerContext<'_>, field: &SaveField) -> LowerResult<()> {
    let (getter, setter) = accessor_signatures(field);
    let at = element_offset(ctx, field);
    let ty = field.ty.c_type();
    let name = c_ident(&field.name);

    ctx.function(&format!("save_get_{name}"), &getter, |ctx| {
        if field.array_len.is_some() || field.ty.size() == 2 {
            ctx.out.line(format!("uint16_t o = {at};"));
        }
        let o = if field.array_len.is_some() || field.ty.size() == 2 {
            "o".to_string()
        } else {
            at.clone()
        };
        let read = match field.ty {
            FieldType::U8 => format!("save_buf[{o}]"),
            FieldType::Bool => format!("save_buf[{o}] != 0"),
            FieldType::I8 => format!("(int8_t)save_buf[{o}]"),
            FieldType::U16 | FieldType::I16 | FieldType::Fixed => {
                format!("({ty})(save_buf[{o}] | ((uint16_t)save_buf[{o} + 1] << 8))")
            }
        };
        ctx.out.line(format!("return {read};"));
        Ok(())
    })?;

    ctx.function(&format!("save_set_{name}"), &setter, |ctx| {
        if field.array_len.is_some() || field.ty.size() == 2 {
            ctx.out.line(format!("uint16_t o = {at};"));
        }
        let o = if field.array_len.is_some() || field.ty.size() == 2 {
            "o".to_string()
        } else {
            at.clone()
        };
        match field.ty {
            FieldType::Bool => ctx.out.line(format!("save_buf[{o}] = v != 0;")),
            FieldType::U8 | FieldType::I8 => ctx.out.line(format!("save_buf[{o}] = (uint8_t)v;")),
            FieldType::U16 | FieldType::I16 | FieldType::Fixed => {
                ctx.out.line(format!("save_buf[{o}] = (uint8_t)v;"));
                ctx.out
                    .line(format!("save_buf[{o} + 1] = (uint8_t)((uint16_t)v >> 8);"));
            }
        }
        Ok(())
    })
}

// ── Slot routines ───────────────────────────────────────────────────────────

fn emit_reset(ctx: &mut LowerContext<'_>, schema: &SaveSchema) -> LowerResult<()> {
    ctx.function("save_reset", "void save_reset(void)", |ctx| {
        if schema.fields().iter().any(|f| f.array_len.is_some()) {
            ctx.out.line("uint8_t i;");
        }
        ctx.out.line("memset(save_buf, 0, SAVE_SLOT_SIZE);");
        write_header(ctx, schema);
        for field in schema.fields() {
            if field.default == 0 {
                continue;
            }
            let name = c_ident(&field.name);
            match field.array_len {
                Some(_) => ctx.out.line(format!(
                    "for (i = 0; i < SAVE_{}_LEN; i++) save_set_{name}(i, {});",
                    upper_ident(&field.name),
                    field.default
                )),
                None => ctx
                    .out
                    .line(format!("save_set_{name}({});", field.default)),
            }
        }
        Ok(())
    })
}

fn write_header(ctx: &mut LowerContext<'_>, schema: &SaveSchema) {
    if schema.magic().is_some() {
        ctx.out.line("memcpy(save_buf, save_magic, 4);");
    }
    ctx.out.line("save_buf[SAVE_OFF_VERSION] = SAVE_VERSION;");
}

fn emit_slot_routines(ctx: &mut LowerContext<'_>, schema: &SaveSchema) -> LowerResult<()> {
    let kind = schema.checksum();
    let slot_addr = format!("(uint8_t *)0x{SRAM_BASE:04X} + slot * SAVE_SLOT_SIZE");

    ctx.function("save_validate", "uint8_t save_validate(void)", |ctx| {
        if schema.magic().is_some() {
            ctx.out
                .line("if (memcmp(save_buf, save_magic, 4) != 0) return 0;");
        }
        ctx.out
            .line("if (save_buf[SAVE_OFF_VERSION] != SAVE_VERSION) return 0;");
        match kind {
            ChecksumKind::None => ctx.out.line("return 1;"),
            ChecksumKind::Xor | ChecksumKind::Crc8 => ctx.out.line(
                "return save_buf[SAVE_OFF_CHECKSUM] == (uint8_t)save_checksum(save_buf, SAVE_OFF_CHECKSUM);",
            ),
            ChecksumKind::Sum16 => {
                ctx.out.line(
                    "uint16_t stored = save_buf[SAVE_OFF_CHECKSUM] | ((uint16_t)save_buf[SAVE_OFF_CHECKSUM + 1] << 8);",
                );
                ctx.out
                    .line("return stored == save_checksum(save_buf, SAVE_OFF_CHECKSUM);");
            }
        }
        Ok(())
    })?;

    ctx.function("save_commit", "void save_commit(uint8_t slot)", |ctx| {
        if kind != ChecksumKind::None {
            ctx.out.line("uint16_t sum;");
        }
        ctx.out.line("if (slot >= SAVE_SLOTS) return;");
        write_header(ctx, schema);
        match kind {
            ChecksumKind::None => {}
            ChecksumKind::Xor | ChecksumKind::Crc8 => {
                ctx.out
                    .line("sum = save_checksum(save_buf, SAVE_OFF_CHECKSUM);");
                ctx.out.line("save_buf[SAVE_OFF_CHECKSUM] = (uint8_t)sum;");
            }
            ChecksumKind::Sum16 => {
                ctx.out
                    .line("sum = save_checksum(save_buf, SAVE_OFF_CHECKSUM);");
                ctx.out.line("save_buf[SAVE_OFF_CHECKSUM] = (uint8_t)sum;");
                ctx.out
                    .line("save_buf[SAVE_OFF_CHECKSUM + 1] = (uint8_t)(sum >> 8);");
            }
        }
        ctx.out.line("ENABLE_RAM;");
        ctx.out
            .line(format!("memcpy({slot_addr}, save_buf, SAVE_SLOT_SIZE);"));
        ctx.out.line("DISABLE_RAM;");
        Ok(())
    })?;

    ctx.function("save_load", "uint8_t save_load(uint8_t slot)", |ctx| {
        ctx.out.line("if (slot >= SAVE_SLOTS) return 0;");
        ctx.out.line("ENABLE_RAM;");
        ctx.out
            .line(format!("memcpy(save_buf, {slot_addr}, SAVE_SLOT_SIZE);"));
        ctx.out.line("DISABLE_RAM;");
        ctx.out.open("if (!save_validate())");
        ctx.out.line("save_reset();");
        ctx.out.line("return 0;");
        ctx.out.close();
        ctx.out.line("return 1;");
        Ok(())
    })
}
