use crate::config::SimulatorConfig;
use crate::cpu::FlagsWord;
use crate::cpu::Register;
use crate::machine::Machine;

fn machine() -> Machine {
    Machine::new(SimulatorConfig::default())
}

#[test]
fn single_byte_move_between_registers() {
    let mut m = machine();
    m.load(&[0x89, 0xD9]).unwrap();
    m.regs.write(Register::BX, 0x0007);
    m.step().unwrap();
    assert_eq!(0x0007, m.regs.read(Register::CX));
    assert_eq!(1, m.regs.ip);
    assert_eq!(0, m.regs.flags);
}

#[test]
fn immediate_to_wide_register() {
    let mut m = machine();
    m.load(&[0xB8, 0x39, 0x05]).unwrap();
    m.step().unwrap();
    assert_eq!(0x0539, m.regs.read(Register::AX));
}

#[test]
fn add_with_flag_update() {
    let mut m = machine();
    m.load(&[0x05, 0x00, 0x80]).unwrap();
    m.regs.write(Register::AX, 0x8000);
    m.step().unwrap();
    assert_eq!(0x0000, m.regs.read(Register::AX));
    let f = m.regs.flags;
    assert!(f.zero());
    assert!(f.carry());
    assert!(f.overflow());
    assert!(!f.sign());
    assert!(f.parity());
    assert!(!f.auxiliary_carry());
}

#[test]
fn compare_sets_flags_without_writing() {
    let mut m = machine();
    m.load(&[0x3D, 0x34, 0x12]).unwrap();
    m.regs.write(Register::AX, 0x1234);
    m.step().unwrap();
    assert_eq!(0x1234, m.regs.read(Register::AX));
    let f = m.regs.flags;
    assert!(f.zero());
    assert!(!f.sign());
    assert!(!f.carry());
    assert!(!f.overflow());
    assert!(f.parity());
    assert!(!f.auxiliary_carry());
}

#[test]
fn conditional_branch_taken_skips_the_intervening_move() {
    // cmp ax, 0 / jne +3 (skip the 3-byte mov ax,1) / mov ax, 1 / mov ax, 2
    let program = [0x3D, 0x00, 0x00, 0x75, 0x03, 0xB8, 0x01, 0x00, 0xB8, 0x02, 0x00];
    let mut m = machine();
    m.load(&program).unwrap();
    m.regs.write(Register::AX, 0x0005);
    m.step().unwrap(); // cmp
    m.step().unwrap(); // jne, taken
    m.step().unwrap(); // mov ax, 2
    assert_eq!(0x0002, m.regs.read(Register::AX));
}

#[test]
fn loop_runs_the_body_exactly_cx_times() {
    // mov cx, 3 / mov ax, ax / loop -4 (back to the mov ax, ax)
    let program = [0xB9, 0x03, 0x00, 0x89, 0xC0, 0xE2, 0xFC];
    let mut m = machine();
    m.load(&program).unwrap();
    m.run(Some(100)).unwrap();
    assert_eq!(0, m.regs.read(Register::CX));
    assert!(m.is_halted());
}

#[test]
fn run_respects_a_step_ceiling() {
    let program = [0xB9, 0x03, 0x00, 0x89, 0xC0, 0xE2, 0xFC];
    let mut m = Machine::new(SimulatorConfig { load_offset: 0, max_steps: Some(1) });
    m.load(&program).unwrap();
    m.run(None).unwrap();
    assert!(!m.is_halted());
    assert_eq!(3, m.regs.read(Register::CX));
}

#[test]
fn memory_operand_round_trips_through_effective_address() {
    // mov [bx], al ; mov al, [bx]
    let mut m = machine();
    m.load(&[0x88, 0x07, 0x8A, 0x27]).unwrap();
    m.regs.write(Register::BX, 0x10);
    m.regs.write(Register::AX, 0x00AB);
    m.step().unwrap();
    assert_eq!(0xAB, m.memory.read_u8(0x10).unwrap());
    m.regs.write(Register::AX, 0);
    m.step().unwrap();
    assert_eq!(0xAB, m.regs.read(Register::AL));
}

#[test]
fn reset_clears_registers_memory_and_halt_but_keeps_the_program() {
    let mut m = machine();
    m.load(&[0xB8, 0x39, 0x05]).unwrap();
    m.step().unwrap();
    assert!(m.is_halted());
    m.reset();
    assert_eq!(0, m.regs.read(Register::AX));
    assert!(!m.is_halted());
    assert_eq!(1, m.program().len());
}
