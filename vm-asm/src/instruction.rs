//! Decoding a byte sequence into opcodes and their inline operands.

use crate::{
    digit81::{Digit81, DIGIT81_WIRE_LEN},
    error::AsmError,
    opcode::Opcode,
};

/// The decoded inline operand of an [`Instruction`], if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    None,
    Digit(Digit81),
    DigitPair(Digit81, Digit81),
    Address(u32),
}

/// One decoded instruction: an opcode plus its inline operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Operand,
}

impl Instruction {
    /// Decode one instruction starting at `code[ip]`.
    ///
    /// Returns the instruction and the address of the byte immediately
    /// following it. Fails with [`AsmError::UnknownOpcode`] or
    /// [`AsmError::TruncatedOperand`]; neither error consumes any bytes.
    pub fn decode(code: &[u8], ip: usize) -> Result<(Self, usize), AsmError> {
        let op_byte = *code.get(ip).ok_or(AsmError::TruncatedOperand)?;
        let opcode = Opcode::try_from(op_byte)?;
        let operand_start = ip + 1;
        let operand_len = opcode.operand_len();
        let operand_bytes = code
            .get(operand_start..operand_start + operand_len)
            .ok_or(AsmError::TruncatedOperand)?;

        let operand = match opcode {
            Opcode::Push => Operand::Digit(Digit81::from_bytes(operand_bytes)?),
            Opcode::TnnAccum | Opcode::T81Matmul => {
                let first = Digit81::from_bytes(&operand_bytes[..DIGIT81_WIRE_LEN])?;
                let second = Digit81::from_bytes(&operand_bytes[DIGIT81_WIRE_LEN..])?;
                Operand::DigitPair(first, second)
            }
            Opcode::Jmp | Opcode::Jz | Opcode::Jnz | Opcode::Call => {
                let bytes: [u8; 4] = operand_bytes.try_into().expect("len checked above");
                Operand::Address(u32::from_be_bytes(bytes))
            }
            _ => Operand::None,
        };

        Ok((Self { opcode, operand }, operand_start + operand_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_push_digit() {
        let mut code = vec![Opcode::Push as u8];
        code.extend_from_slice(&Digit81::new(0, 0, 5).to_bytes());
        let (insn, next_ip) = Instruction::decode(&code, 0).unwrap();
        assert_eq!(insn.opcode, Opcode::Push);
        assert_eq!(insn.operand, Operand::Digit(Digit81::new(0, 0, 5)));
        assert_eq!(next_ip, code.len());
    }

    #[test]
    fn decodes_zero_operand_opcode() {
        let code = [Opcode::Add as u8];
        let (insn, next_ip) = Instruction::decode(&code, 0).unwrap();
        assert_eq!(insn.opcode, Opcode::Add);
        assert_eq!(insn.operand, Operand::None);
        assert_eq!(next_ip, 1);
    }

    #[test]
    fn decodes_jump_address() {
        let mut code = vec![Opcode::Jmp as u8];
        code.extend_from_slice(&42u32.to_be_bytes());
        let (insn, _) = Instruction::decode(&code, 0).unwrap();
        assert_eq!(insn.operand, Operand::Address(42));
    }

    #[test]
    fn truncated_push_operand_fails() {
        let code = [Opcode::Push as u8, 0, 0];
        assert_eq!(
            Instruction::decode(&code, 0),
            Err(AsmError::TruncatedOperand)
        );
    }

    #[test]
    fn unknown_opcode_fails() {
        let code = [0xABu8];
        assert_eq!(
            Instruction::decode(&code, 0),
            Err(AsmError::UnknownOpcode(0xAB))
        );
    }
}
