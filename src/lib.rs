#![allow(dead_code)]

#[macro_use]
extern crate quick_error;

#[macro_use]
extern crate serde_derive;

#[cfg(test)]
extern crate pretty_assertions;

pub mod config;
pub mod cpu;
pub mod error;
pub mod hex;
pub mod machine;
pub mod memory;
