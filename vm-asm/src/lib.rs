//! Atomic types and bytecode encoding: the lowest layer of the ternary VM.
//!
//! This crate knows nothing about stacks, tiers, or hooks. It defines the
//! fixed-width low-tier word ([`Digit81`]), the opcode table ([`Opcode`]),
//! and how to decode a byte buffer into [`Instruction`]s.

pub mod digit81;
pub mod error;
pub mod instruction;
pub mod opcode;

pub use digit81::{Cmp3, Digit81, DIGIT81_WIRE_LEN};
pub use error::AsmError;
pub use instruction::{Instruction, Operand};
pub use opcode::Opcode;
