use crate::cpu::flags::{compute_flags, compute_result, ArithOp, FlagsWord, FLAG_ZERO};

#[test]
fn add_sets_zero_carry_overflow_on_wraparound() {
    let flags = compute_flags(ArithOp::Add, 0x8000, 0x8000, true);
    assert!(flags.zero());
    assert!(flags.carry());
    assert!(flags.overflow());
    assert!(!flags.sign());
    assert!(flags.parity());
    assert!(!flags.auxiliary_carry());
    assert_eq!(0, compute_result(ArithOp::Add, 0x8000, 0x8000, true));
}

#[test]
fn compare_of_equal_values_sets_zero_only() {
    let flags = compute_flags(ArithOp::Sub, 0x1234, 0x1234, true);
    assert!(flags.zero());
    assert!(!flags.sign());
    assert!(!flags.carry());
    assert!(!flags.overflow());
    assert!(flags.parity());
    assert!(!flags.auxiliary_carry());
}

#[test]
fn sub_sets_carry_on_borrow() {
    let flags = compute_flags(ArithOp::Sub, 0x00, 0x01, false);
    assert!(flags.carry());
    assert!(flags.sign());
    assert_eq!(0xFF, compute_result(ArithOp::Sub, 0x00, 0x01, false));
}

#[test]
fn byte_width_ignores_high_byte() {
    let flags = compute_flags(ArithOp::Add, 0x01, 0x02, false);
    assert_eq!(0x03, compute_result(ArithOp::Add, 0x0100, 0x0200, false));
    assert!(!flags.zero());
}

#[test]
fn flag_word_bit_twiddling_round_trips() {
    let mut w: u16 = 0;
    w.set_flag(FLAG_ZERO, true);
    assert!(w.zero());
    w.set_flag(FLAG_ZERO, false);
    assert!(!w.zero());
}
