use crate::cpu::address::EffectiveAddress;
use crate::cpu::instruction::{DecodedInstruction, Instruction, JumpCondition};
use crate::cpu::operand::{ExplicitDataSize, Operand};
use crate::cpu::register::Register;
use crate::error::Error;

/// if enabled, prints each instruction as it is decoded
const DEBUG_DECODER: bool = false;

#[cfg(test)]
#[path = "./decoder_test.rs"]
mod decoder_test;

/// which arithmetic opcode a `00100xxx`/`00101xxx`/`00111xxx`-style row decodes to.
/// MOV has no corresponding arithmetic tag; it's recognised by a disjoint set of rows.
#[derive(Copy, Clone, Debug, PartialEq)]
enum ArithTag {
    Add,
    Sub,
    Cmp,
}

/// which shape of instruction a recognised opcode byte decodes into. The field
/// extractor switches on this, not on the raw byte, so adding a row never touches
/// the extraction logic for the other kinds.
#[derive(Copy, Clone, Debug, PartialEq)]
enum OpcodeKind {
    /// mod-reg-r/m, register/memory to/from register (MOV or arithmetic)
    RmToFromReg(Option<ArithTag>),
    /// mod-000-r/m immediate to register/memory (MOV)
    ImmToRm,
    /// mod-reg-r/m immediate to register/memory, reg field picks Add/Sub/Cmp
    ArithImmToRm,
    /// register baked into the low 3 bits of byte 0, W in bit 3
    ImmToRegShort,
    /// direct address, AX <-> memory
    MemToFromAx { to_ax: bool },
    /// mod-0sr-r/m segment register move
    SegRmMove { to_seg: bool },
    /// imm to AX (arithmetic family)
    ArithImmToAx(ArithTag),
    /// 8-bit signed displacement conditional jump / loop family
    ShortBranch(JumpCondition),
    /// 16-bit signed displacement unconditional jump
    WideJump,
    /// software interrupt, 8-bit vector follows
    Interrupt,
}

struct OpcodeRow {
    mask: u8,
    value: u8,
    kind: OpcodeKind,
}

/// masked-prefix-match table, scanned in order. A row matches when
/// `first_byte & mask == value`; ties are broken by table order, so more specific
/// rows (larger masks) are listed before the families they overlap with.
fn opcode_table() -> &'static [OpcodeRow] {
    &[
        // conditional short jumps: exact bytes 0x70..0x7F
        OpcodeRow { mask: 0xF0, value: 0x70, kind: OpcodeKind::ShortBranch(JumpCondition::Always) },
        // loop family + jcxz: exact bytes 0xE0..0xE3
        OpcodeRow { mask: 0xFC, value: 0xE0, kind: OpcodeKind::ShortBranch(JumpCondition::Always) },
        // unconditional wide relative jump
        OpcodeRow { mask: 0xFF, value: 0xE9, kind: OpcodeKind::WideJump },
        // interrupt
        OpcodeRow { mask: 0xFF, value: 0xCD, kind: OpcodeKind::Interrupt },
        // segment-register moves
        OpcodeRow { mask: 0xFF, value: 0x8E, kind: OpcodeKind::SegRmMove { to_seg: true } },
        OpcodeRow { mask: 0xFF, value: 0x8C, kind: OpcodeKind::SegRmMove { to_seg: false } },
        // MOV mem <-> AX
        OpcodeRow { mask: 0xFE, value: 0xA0, kind: OpcodeKind::MemToFromAx { to_ax: true } },
        OpcodeRow { mask: 0xFE, value: 0xA2, kind: OpcodeKind::MemToFromAx { to_ax: false } },
        // MOV imm -> r (short form)
        OpcodeRow { mask: 0xF0, value: 0xB0, kind: OpcodeKind::ImmToRegShort },
        // MOV imm -> r/m
        OpcodeRow { mask: 0xFE, value: 0xC6, kind: OpcodeKind::ImmToRm },
        // MOV r/m <-> r
        OpcodeRow { mask: 0xFC, value: 0x88, kind: OpcodeKind::RmToFromReg(None) },
        // ADD r/m <-> r
        OpcodeRow { mask: 0xFC, value: 0x00, kind: OpcodeKind::RmToFromReg(Some(ArithTag::Add)) },
        // SUB r/m <-> r
        OpcodeRow { mask: 0xFC, value: 0x28, kind: OpcodeKind::RmToFromReg(Some(ArithTag::Sub)) },
        // CMP r/m <-> r
        OpcodeRow { mask: 0xFC, value: 0x38, kind: OpcodeKind::RmToFromReg(Some(ArithTag::Cmp)) },
        // ADD/SUB/CMP imm -> AX
        OpcodeRow { mask: 0xFE, value: 0x04, kind: OpcodeKind::ArithImmToAx(ArithTag::Add) },
        OpcodeRow { mask: 0xFE, value: 0x2C, kind: OpcodeKind::ArithImmToAx(ArithTag::Sub) },
        OpcodeRow { mask: 0xFE, value: 0x3C, kind: OpcodeKind::ArithImmToAx(ArithTag::Cmp) },
        // ADD/SUB/CMP imm -> r/m; reg field disambiguates, checked after this match
        OpcodeRow { mask: 0xFC, value: 0x80, kind: OpcodeKind::ArithImmToRm },
    ]
}

fn recognise(byte: u8) -> Option<&'static OpcodeRow> {
    opcode_table().iter().find(|row| byte & row.mask == row.value)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn read_u8(&mut self) -> Result<u8, Error> {
        let b = *self.bytes.get(self.pos).ok_or(Error::TruncatedInstruction)?;
        self.pos += 1;
        Ok(b)
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from(lo) | (u16::from(hi) << 8))
    }

    fn read_i8_sign_extended(&mut self) -> Result<u16, Error> {
        Ok(self.read_u8()? as i8 as i16 as u16)
    }

    fn peek(&self) -> Result<u8, Error> {
        self.bytes.get(self.pos).copied().ok_or(Error::TruncatedInstruction)
    }
}

/// mod/reg/r-m byte plus any trailing displacement, decoded into a register-memory
/// operand and the bare reg field (caller decides whether it's source or dest)
struct ModRegRm {
    reg_field: u8,
    rm_operand: Operand,
}

fn decode_mod_reg_rm(cur: &mut Cursor, wide: bool) -> Result<ModRegRm, Error> {
    let b = cur.read_u8()?;
    let mode = b >> 6;
    let reg_field = (b >> 3) & 7;
    let rm_field = b & 7;

    let rm_operand = match mode {
        0b11 => Operand::Register(Register::from_field(rm_field, wide)),
        0b00 => {
            if rm_field == 0b110 {
                let disp = cur.read_u16()?;
                Operand::MemoryLoc(EffectiveAddress::DirectAddress, disp)
            } else {
                Operand::MemoryLoc(EffectiveAddress::from_rm_field(rm_field), 0)
            }
        }
        0b01 => {
            let disp = cur.read_i8_sign_extended()?;
            Operand::MemoryLoc(EffectiveAddress::from_rm_field(rm_field), disp)
        }
        0b10 => {
            let disp = cur.read_u16()?;
            Operand::MemoryLoc(EffectiveAddress::from_rm_field(rm_field), disp)
        }
        _ => return Err(Error::MalformedEncoding),
    };

    Ok(ModRegRm { reg_field, rm_operand })
}

fn arith_instruction(tag: ArithTag, source: Operand, dest: Operand) -> Instruction {
    match tag {
        ArithTag::Add => Instruction::Add { source, dest },
        ArithTag::Sub => Instruction::Sub { source, dest },
        ArithTag::Cmp => Instruction::Compare { source, dest },
    }
}

fn short_branch_condition(byte: u8) -> Option<JumpCondition> {
    match byte {
        0x70 => Some(JumpCondition::Overflow),
        0x71 => Some(JumpCondition::NotOverflow),
        0x72 => Some(JumpCondition::Below),
        0x73 => Some(JumpCondition::AboveOrEqual),
        0x74 => Some(JumpCondition::Equal),
        0x75 => Some(JumpCondition::NotEqual),
        0x76 => Some(JumpCondition::BelowOrEqual),
        0x77 => Some(JumpCondition::Above),
        0x78 => Some(JumpCondition::Sign),
        0x79 => Some(JumpCondition::NotSign),
        0x7A => Some(JumpCondition::Parity),
        0x7B => Some(JumpCondition::NotParity),
        0x7C => Some(JumpCondition::Less),
        0x7D => Some(JumpCondition::GreaterOrEqual),
        0x7E => Some(JumpCondition::LessOrEqual),
        0x7F => Some(JumpCondition::Greater),
        0xE0 => Some(JumpCondition::LoopWhileNotZero),
        0xE1 => Some(JumpCondition::LoopWhileZero),
        0xE2 => Some(JumpCondition::Loop),
        0xE3 => Some(JumpCondition::CxZero),
        _ => None,
    }
}

/// decodes one instruction starting at `cur.pos`. Returns the instruction and the
/// byte position it started at; `cur.pos` is left just past the last consumed byte.
fn decode_one(cur: &mut Cursor) -> Result<(Instruction, u32), Error> {
    let start = cur.pos as u32;
    let b0 = cur.read_u8()?;
    let row = recognise(b0).ok_or(Error::UnknownOpcode(b0))?;

    let instruction = match row.kind {
        OpcodeKind::RmToFromReg(arith) => {
            let wide = b0 & 1 != 0;
            let dest_is_reg_field = b0 & 2 != 0;
            let modrm = decode_mod_reg_rm(cur, wide)?;
            let reg_operand = Operand::Register(Register::from_field(modrm.reg_field, wide));
            let (source, dest) = if dest_is_reg_field {
                (modrm.rm_operand, reg_operand)
            } else {
                (reg_operand, modrm.rm_operand)
            };
            match arith {
                None => Instruction::Move { source, dest },
                Some(tag) => arith_instruction(tag, source, dest),
            }
        }
        OpcodeKind::ImmToRm => {
            let wide = b0 & 1 != 0;
            let modrm = decode_mod_reg_rm(cur, wide)?;
            if modrm.reg_field != 0b000 {
                return Err(Error::MalformedEncoding);
            }
            let imm = if wide { cur.read_u16()? } else { u16::from(cur.read_u8()?) };
            let size = if modrm.rm_operand.is_memory() {
                if wide { ExplicitDataSize::Word } else { ExplicitDataSize::Byte }
            } else {
                ExplicitDataSize::None
            };
            Instruction::Move {
                source: Operand::Immediate(imm, size),
                dest: modrm.rm_operand,
            }
        }
        OpcodeKind::ArithImmToRm => {
            let wide = b0 & 1 != 0;
            let sign_extend = b0 & 2 != 0;
            let modrm = decode_mod_reg_rm(cur, wide)?;
            let tag = match modrm.reg_field {
                0b000 => ArithTag::Add,
                0b101 => ArithTag::Sub,
                0b111 => ArithTag::Cmp,
                _ => return Err(Error::MalformedEncoding),
            };
            let imm = if !wide {
                u16::from(cur.read_u8()?)
            } else if sign_extend {
                cur.read_i8_sign_extended()?
            } else {
                cur.read_u16()?
            };
            let size = if modrm.rm_operand.is_memory() {
                if wide { ExplicitDataSize::Word } else { ExplicitDataSize::Byte }
            } else {
                ExplicitDataSize::None
            };
            arith_instruction(tag, Operand::Immediate(imm, size), modrm.rm_operand)
        }
        OpcodeKind::ImmToRegShort => {
            let wide = b0 & 0b1000 != 0;
            let reg_field = b0 & 7;
            let dest = Operand::Register(Register::from_field(reg_field, wide));
            let imm = if wide { cur.read_u16()? } else { u16::from(cur.read_u8()?) };
            Instruction::Move { source: Operand::Immediate(imm, ExplicitDataSize::None), dest }
        }
        OpcodeKind::MemToFromAx { to_ax } => {
            let wide = b0 & 1 != 0;
            let addr = cur.read_u16()?;
            let ax = Operand::Register(if wide { Register::AX } else { Register::AL });
            let mem = Operand::MemoryLoc(EffectiveAddress::DirectAddress, addr);
            if to_ax {
                Instruction::Move { source: mem, dest: ax }
            } else {
                Instruction::Move { source: ax, dest: mem }
            }
        }
        OpcodeKind::SegRmMove { to_seg } => {
            let sr_field = (cur.peek()? >> 3) & 3;
            let modrm = decode_mod_reg_rm(cur, true)?;
            let seg = Operand::Register(Register::from_segment_field(sr_field));
            if to_seg {
                Instruction::Move { source: modrm.rm_operand, dest: seg }
            } else {
                Instruction::Move { source: seg, dest: modrm.rm_operand }
            }
        }
        OpcodeKind::ArithImmToAx(tag) => {
            let wide = b0 & 1 != 0;
            let ax = Operand::Register(if wide { Register::AX } else { Register::AL });
            let imm = if wide { cur.read_u16()? } else { u16::from(cur.read_u8()?) };
            arith_instruction(tag, Operand::Immediate(imm, ExplicitDataSize::None), ax)
        }
        OpcodeKind::ShortBranch(_) => {
            let condition = short_branch_condition(b0).ok_or(Error::UnknownOpcode(b0))?;
            let rel = cur.read_i8_sign_extended()? as i16 as i32;
            let length = (cur.pos as u32) - start;
            let target_byte = (start as i64 + length as i64 + rel as i64) as u32;
            Instruction::Jump { condition, rel_offset: rel, target_byte, target_index: None }
        }
        OpcodeKind::WideJump => {
            let rel = cur.read_u16()? as i16 as i32;
            let length = (cur.pos as u32) - start;
            let target_byte = (start as i64 + length as i64 + rel as i64) as u32;
            Instruction::Jump { condition: JumpCondition::Always, rel_offset: rel, target_byte, target_index: None }
        }
        OpcodeKind::Interrupt => {
            let vector = cur.read_u8()?;
            Instruction::Interrupt { vector }
        }
    };

    Ok((instruction, start))
}

/// decodes a full program image into a linear instruction list, then resolves every
/// jump's target byte position into a target instruction index.
pub fn decode_program(bytes: &[u8]) -> Result<Vec<DecodedInstruction>, Error> {
    let mut cur = Cursor { bytes, pos: 0 };
    let mut decoded = Vec::new();
    let mut starts = Vec::new();

    while cur.pos < bytes.len() {
        let (instruction, start) = decode_one(&mut cur)?;
        let length = (cur.pos as u32 - start) as u8;
        let text = instruction.to_string();
        if DEBUG_DECODER {
            println!("decoded {:04X}: {}", start, text);
        }
        starts.push(start);
        decoded.push(DecodedInstruction { instruction, byte_position: start, length, text });
    }

    for d in decoded.iter_mut() {
        if let Instruction::Jump { target_byte, target_index, .. } = &mut d.instruction {
            let idx = starts.iter().position(|&s| s == *target_byte);
            *target_index = Some(idx.ok_or(Error::UnresolvableBranchTarget(*target_byte))?);
            d.text = d.instruction.to_string();
        }
    }

    Ok(decoded)
}
