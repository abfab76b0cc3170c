// these modules are re-exported as a single module

pub use self::register::*;
mod register;

pub use self::flags::*;
mod flags;

pub use self::address::*;
mod address;

pub use self::operand::*;
mod operand;

pub use self::instruction::*;
mod instruction;

pub use self::decoder::*;
mod decoder;

pub use self::branch::*;
mod branch;
