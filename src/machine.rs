use crate::config::SimulatorConfig;
use crate::cpu::{
    compute_flags, compute_result, taken, ArithOp, DecodedInstruction, ExplicitDataSize,
    FlagsWord, Instruction, Operand, Register, RegisterFile,
};
use crate::error::Error;
use crate::memory::Memory;

#[cfg(test)]
#[path = "./machine_test.rs"]
mod machine_test;

/// prints each instruction and the register file as it is executed
const DEBUG_STEP: bool = false;

/// a loaded program plus the CPU state it is executed against. `Machine` owns the
/// exclusive copy of everything a step can touch: registers, flags (inside
/// `RegisterFile`), memory, the decoded instruction list, and the halt marker.
pub struct Machine {
    pub regs: RegisterFile,
    pub memory: Memory,
    program: Vec<DecodedInstruction>,
    halted: bool,
    config: SimulatorConfig,
}

impl Machine {
    pub fn new(config: SimulatorConfig) -> Self {
        Machine {
            regs: RegisterFile::new(),
            memory: Memory::new(),
            program: Vec::new(),
            halted: false,
            config,
        }
    }

    /// decodes `bytes` and loads the result as the program to execute; resets all
    /// CPU state first
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.reset();
        self.program = crate::cpu::decode_program(bytes)?;
        Ok(())
    }

    /// zeroes registers, flags, memory and the halt marker; does not drop the
    /// currently loaded program
    pub fn reset(&mut self) {
        self.regs.reset();
        self.memory.reset();
        self.halted = false;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn program(&self) -> &[DecodedInstruction] {
        &self.program
    }

    /// executes one instruction. A no-op if already halted.
    pub fn step(&mut self) -> Result<(), Error> {
        if self.halted {
            return Ok(());
        }
        let ip = self.regs.ip as usize;
        let instr = self.program.get(ip).ok_or(Error::MalformedEncoding)?.instruction.clone();

        if DEBUG_STEP {
            println!("[{:04X}] {} ; {:?}", ip, instr, self.regs);
        }

        let mut branched = false;
        match &instr {
            Instruction::Move { source, dest } => {
                let wide = operand_width(source, dest);
                let value = self.read_operand(source, wide)?;
                self.write_operand(dest, value, wide)?;
            }
            Instruction::Add { source, dest } => {
                self.apply_arith(ArithOp::Add, source, dest, true)?;
            }
            Instruction::Sub { source, dest } => {
                self.apply_arith(ArithOp::Sub, source, dest, true)?;
            }
            Instruction::Compare { source, dest } => {
                self.apply_arith(ArithOp::Sub, source, dest, false)?;
            }
            Instruction::Jump { condition, target_index, .. } => {
                if taken(*condition, &mut self.regs) {
                    let target = target_index.ok_or(Error::MalformedEncoding)?;
                    self.regs.ip = target as u16;
                    branched = true;
                }
            }
            Instruction::Interrupt { .. } => {
                // decoded but never dispatched
            }
        }

        if !branched {
            let next = self.regs.ip as usize + 1;
            self.regs.ip = next as u16;
            if next >= self.program.len() {
                self.halted = true;
            }
        }
        Ok(())
    }

    /// runs until halted or `max_steps` instructions have executed, whichever
    /// comes first. `None` runs until halted.
    pub fn run(&mut self, max_steps: Option<usize>) -> Result<(), Error> {
        let ceiling = max_steps.or(self.config.max_steps);
        let mut count = 0;
        while !self.halted {
            if let Some(limit) = ceiling {
                if count >= limit {
                    break;
                }
            }
            self.step()?;
            count += 1;
        }
        Ok(())
    }

    fn apply_arith(&mut self, op: ArithOp, source: &Operand, dest: &Operand, store: bool) -> Result<(), Error> {
        let wide = operand_width(source, dest);
        let a = self.read_operand(dest, wide)?;
        let b = self.read_operand(source, wide)?;
        let result = compute_result(op, a, b, wide);
        self.regs.flags = compute_flags(op, a, b, wide);
        if store {
            self.write_operand(dest, result, wide)?;
        }
        Ok(())
    }

    /// resolves an operand's value at the given access width (relevant only for
    /// MEMORY_LOC, since REGISTER and IMMEDIATE already know their own width)
    fn read_operand(&self, operand: &Operand, wide: bool) -> Result<u16, Error> {
        match *operand {
            Operand::Register(r) => Ok(self.regs.read(r)),
            Operand::Immediate(value, _) => Ok(value),
            Operand::MemoryLoc(ea, disp) => {
                let index = ea.linear_index(disp, &self.regs) & 0xFFFF;
                if wide {
                    self.memory.read_u16(index)
                } else {
                    Ok(u16::from(self.memory.read_u8(index)?))
                }
            }
            Operand::None => Err(Error::InvalidOperand),
        }
    }

    fn write_operand(&mut self, operand: &Operand, value: u16, wide: bool) -> Result<(), Error> {
        match *operand {
            Operand::Register(r) => {
                self.regs.write(r, value);
                Ok(())
            }
            Operand::MemoryLoc(ea, disp) => {
                let index = ea.linear_index(disp, &self.regs) & 0xFFFF;
                if wide {
                    self.memory.write_u16(index, value)
                } else {
                    self.memory.write_u8(index, value as u8)
                }
            }
            Operand::Immediate(..) | Operand::None => Err(Error::InvalidOperand),
        }
    }

    /// textual dump of the full register file and flags, for REPL-style frontends
    pub fn dump_state(&self) -> String {
        let f = self.regs.flags;
        format!(
            "ip={:04X} ax={:04X} bx={:04X} cx={:04X} dx={:04X} sp={:04X} bp={:04X} si={:04X} di={:04X} \
             cs={:04X} ds={:04X} ss={:04X} es={:04X} flags=[{}{}{}{}{}{}]",
            self.regs.ip,
            self.regs.read(Register::AX),
            self.regs.read(Register::BX),
            self.regs.read(Register::CX),
            self.regs.read(Register::DX),
            self.regs.read(Register::SP),
            self.regs.read(Register::BP),
            self.regs.read(Register::SI),
            self.regs.read(Register::DI),
            self.regs.read(Register::CS),
            self.regs.read(Register::DS),
            self.regs.read(Register::SS),
            self.regs.read(Register::ES),
            if f.carry() { "C" } else { "-" },
            if f.zero() { "Z" } else { "-" },
            if f.sign() { "S" } else { "-" },
            if f.overflow() { "O" } else { "-" },
            if f.parity() { "P" } else { "-" },
            if f.auxiliary_carry() { "A" } else { "-" },
        )
    }
}

/// a MEMORY_LOC operand never carries its own access width: the width is implied
/// by whichever sibling operand in the instruction is a REGISTER or an explicitly
/// sized IMMEDIATE. REGISTER-to-REGISTER forms are width-consistent by the
/// decoder's invariant, so checking either one is sufficient.
fn operand_width(source: &Operand, dest: &Operand) -> bool {
    match *dest {
        Operand::Register(r) => return !r.is_byte(),
        Operand::Immediate(_, size) => return size != ExplicitDataSize::Byte,
        _ => {}
    }
    match *source {
        Operand::Register(r) => !r.is_byte(),
        Operand::Immediate(_, size) => size != ExplicitDataSize::Byte,
        _ => true,
    }
}
