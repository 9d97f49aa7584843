//! Pure disassembly of a [`Code`] buffer into a textual listing.
//!
//! Never touches a [`crate::vm::Vm`]; takes only the bytes it renders.

use core::fmt;

use vm_asm::{AsmError, Instruction, Operand as WireOperand};

use crate::code::Code;

/// One decoded (or failed) instruction at a given address.
#[derive(Debug, Clone, PartialEq)]
pub struct DisasmLine {
    pub address: usize,
    pub kind: DisasmLineKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisasmLineKind {
    Instruction {
        mnemonic: &'static str,
        operand: WireOperand,
    },
    Error {
        byte: u8,
        error: AsmError,
    },
}

impl fmt::Display for DisasmLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DisasmLineKind::Instruction { mnemonic, operand } => match operand {
                WireOperand::None => write!(f, "{:08x}  {}", self.address, mnemonic),
                WireOperand::Digit(d) => {
                    write!(f, "{:08x}  {} ({}, {}, {})", self.address, mnemonic, d.a, d.b, d.c)
                }
                WireOperand::DigitPair(x, y) => write!(
                    f,
                    "{:08x}  {} ({}, {}, {}) ({}, {}, {})",
                    self.address, mnemonic, x.a, x.b, x.c, y.a, y.b, y.c
                ),
                WireOperand::Address(addr) => {
                    write!(f, "{:08x}  {} {:#010x}", self.address, mnemonic, addr)
                }
            },
            DisasmLineKind::Error { byte, error } => {
                write!(f, "{:08x}  .byte {:#04x}  ; {error}", self.address, byte)
            }
        }
    }
}

/// Renders every instruction in `code`, advancing past errors one byte at a
/// time so a single malformed opcode does not hide the rest of the buffer.
pub fn disassemble(code: &Code) -> Vec<DisasmLine> {
    let bytes = code.bytes();
    let mut lines = Vec::new();
    let mut ip = 0usize;
    while ip < bytes.len() {
        match Instruction::decode(bytes, ip) {
            Ok((instruction, next_ip)) => {
                lines.push(DisasmLine {
                    address: ip,
                    kind: DisasmLineKind::Instruction {
                        mnemonic: instruction.opcode.mnemonic(),
                        operand: instruction.operand,
                    },
                });
                ip = next_ip;
            }
            Err(error) => {
                lines.push(DisasmLine {
                    address: ip,
                    kind: DisasmLineKind::Error {
                        byte: bytes[ip],
                        error,
                    },
                });
                ip += 1;
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use vm_asm::{Digit81, Opcode};

    #[test]
    fn disassemble_is_pure_and_deterministic() {
        let mut raw = vec![Opcode::Push as u8];
        raw.extend_from_slice(&Digit81::new(0, 0, 5).to_bytes());
        raw.push(Opcode::Halt as u8);
        let code = Code::load(&raw);

        let first = disassemble(&code);
        let second = disassemble(&code);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn unknown_byte_is_reported_and_skipped() {
        let code = Code::load(&[0xAB, Opcode::Halt as u8]);
        let lines = disassemble(&code);
        assert_eq!(lines.len(), 2);
        assert!(matches!(lines[0].kind, DisasmLineKind::Error { byte: 0xAB, .. }));
    }
}
