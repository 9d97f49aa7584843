//! Errors that can arise while decoding or evaluating atomic-tier values.

/// Errors produced by the wire-format and low-tier arithmetic layer.
///
/// `vm-core`'s `VmError` converts every variant here into a matching
/// top-level kind, keeping the decode/execute error split two layers deep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AsmError {
    /// A `mod` divisor was the canonical zero `Digit81`.
    #[error("division by zero")]
    DivByZero,
    /// Fewer bytes remained in the code buffer than the opcode's inline
    /// operand requires.
    #[error("truncated operand")]
    TruncatedOperand,
    /// The opcode byte does not match any entry in the canonical table.
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
}
