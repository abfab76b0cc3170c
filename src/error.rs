quick_error! {
    /// errors raised by the decoder and the step engine
    #[derive(Debug, PartialEq)]
    pub enum Error {
        /// decoder found no table row matching the given first byte
        UnknownOpcode(byte: u8) {
            display("unknown opcode byte {:02X}", byte)
        }
        /// the byte slice ended before an instruction could be fully decoded
        TruncatedInstruction {
            display("truncated instruction: ran off the end of the byte slice")
        }
        /// a mod/reg/rm or other field combination had no valid interpretation
        MalformedEncoding {
            display("malformed encoding: unhandled field combination")
        }
        /// a JUMP's computed target byte position is not the start of any decoded instruction
        UnresolvableBranchTarget(byte_position: u32) {
            display("branch target {:04X} is not the start of any decoded instruction", byte_position)
        }
        /// execution attempted to write an IMMEDIATE operand, or read a NONE operand
        InvalidOperand {
            display("invalid operand: cannot write an immediate or read an unset operand")
        }
        /// effective-address evaluation produced an index outside the 64 KiB memory array
        MemoryOutOfBounds(index: u32) {
            display("memory access at {:06X} is out of bounds", index)
        }
    }
}
